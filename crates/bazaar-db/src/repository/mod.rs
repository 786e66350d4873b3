//! # Repository Module
//!
//! Database repository implementations for Bazaar.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  FulfillmentService                                                    │
//! │       │                                                                 │
//! │       │  db.orders().commit_transition(&updated, expected)             │
//! │       ▼                                                                 │
//! │  OrderRepository                                                       │
//! │  ├── insert(&self, order)          (order + items, one transaction)    │
//! │  ├── get_by_id(&self, id)                                              │
//! │  ├── list_by_user(&self, user_id)                                      │
//! │  └── commit_transition(&self, updated, expected_status)                │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows are read into private `FromRow` structs that mirror the columns,
//! then converted into `bazaar-core` types. A row that breaks a domain
//! invariant surfaces as [`crate::DbError::CorruptRow`].
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Products and their sizes
//! - [`OrderRepository`](order::OrderRepository) - Orders, items, status commits
//! - [`AdminRepository`](admin::AdminRepository) - Admin credential store

pub mod admin;
pub mod order;
pub mod product;

/// Generates a new entity ID (UUID v4).
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
