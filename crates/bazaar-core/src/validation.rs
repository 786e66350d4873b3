//! # Validation Module
//!
//! Input validation utilities for Bazaar.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Frontend (React forms)                                       │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Service (Rust)                                               │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: Business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bazaar_core::validation::{validate_pincode, validate_quantity};
//!
//! validate_pincode("560001").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::{Product, ShippingAddress};
use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Trims a free-text field and rejects it when blank.
///
/// ## Returns
/// The trimmed value.
pub fn required_text(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

/// Validates a product name.
///
/// ## Example
/// ```rust
/// use bazaar_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Handloom Saree").is_ok());
/// assert!(validate_product_name("").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    required_text("name", name, 200).map(|_| ())
}

/// Validates a size label such as "M" or "UK 9".
pub fn validate_size_value(label: &str) -> ValidationResult<()> {
    required_text("size_value", label, 20).map(|_| ())
}

/// Validates an Indian postal code (6 digits, first digit non-zero).
///
/// ## Example
/// ```rust
/// use bazaar_core::validation::validate_pincode;
///
/// assert!(validate_pincode("110001").is_ok());
/// assert!(validate_pincode("011001").is_err());
/// assert!(validate_pincode("1100").is_err());
/// ```
pub fn validate_pincode(pincode: &str) -> ValidationResult<()> {
    let pincode = pincode.trim();

    if pincode.is_empty() {
        return Err(ValidationError::Required {
            field: "pincode".to_string(),
        });
    }

    let valid = pincode.len() == 6
        && pincode.chars().all(|c| c.is_ascii_digit())
        && !pincode.starts_with('0');

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "pincode".to_string(),
            reason: "must be 6 digits and not start with 0".to_string(),
        });
    }

    Ok(())
}

/// Validates a 10-digit mobile number, optionally prefixed with +91.
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();
    let digits = phone.strip_prefix("+91").unwrap_or(phone).trim();

    if digits.is_empty() {
        return Err(ValidationError::Required {
            field: "phone".to_string(),
        });
    }

    if digits.len() != 10 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must be a 10-digit mobile number".to_string(),
        });
    }

    Ok(())
}

/// Loose email shape check: one `@`, non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@example.com".to_string(),
        });
    }

    Ok(())
}

/// Validates a delivery address captured at checkout.
pub fn validate_address(address: &ShippingAddress) -> ValidationResult<()> {
    required_text("full_name", &address.full_name, 100)?;
    validate_phone(&address.phone)?;
    required_text("line1", &address.line1, 200)?;
    required_text("city", &address.city, 100)?;
    required_text("state", &address.state, 100)?;
    validate_pincode(&address.pincode)?;
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a cart line quantity.
///
/// ## Rules
/// - Must be at least 1
/// - Must not exceed MAX_LINE_QUANTITY (99)
pub fn validate_quantity(qty: u32) -> ValidationResult<()> {
    if qty == 0 || qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY as i64,
        });
    }

    Ok(())
}

/// Validates a GST rate in basis points (0% to 100%).
pub fn validate_gst_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "gst_rate".to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates cart size before adding another line.
pub fn validate_cart_size(current_lines: usize) -> ValidationResult<()> {
    if current_lines >= MAX_CART_LINES {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 0,
            max: MAX_CART_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Catalog Validators
// =============================================================================

/// Validates a product and its sizes before they are stored.
///
/// ## Rules
/// - Name is present and at most 200 characters
/// - GST rate is within 0..=100%
/// - Base price and MRP are not negative
/// - Every size label is present, at most 20 characters and unique
pub fn validate_product(product: &Product) -> ValidationResult<()> {
    validate_product_name(&product.name)?;
    validate_gst_rate_bps(product.gst_rate.bps())?;

    if product.base_price.is_negative() {
        return Err(ValidationError::InvalidFormat {
            field: "base_price".to_string(),
            reason: "must not be negative".to_string(),
        });
    }
    if product.mrp.is_some_and(|m| m.is_negative()) {
        return Err(ValidationError::InvalidFormat {
            field: "mrp".to_string(),
            reason: "must not be negative".to_string(),
        });
    }

    for (i, size) in product.sizes.iter().enumerate() {
        validate_size_value(&size.size_value)?;
        let label = size.size_value.trim();
        if product.sizes[..i].iter().any(|s| s.size_value.trim() == label) {
            return Err(ValidationError::InvalidFormat {
                field: "size_value".to_string(),
                reason: format!("duplicate size '{}'", label),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
