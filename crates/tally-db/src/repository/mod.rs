//! # Repository Module
//!
//! Database repository implementations for Tally POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  HTTP handler                                                          │
//! │       │                                                                 │
//! │       │  state.db.sales().create_sale(&request)                        │
//! │       ▼                                                                 │
//! │  SaleRepository ──────► product::reserve_stock / lookup_stock          │
//! │  ProductRepository       (same transaction, same connection)           │
//! │  UserRepository                                                        │
//! │  ReportRepository                                                      │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog CRUD, low stock, stock reservation
//! - [`SaleRepository`](sale::SaleRepository) - The Sale Ledger
//! - [`UserRepository`](user::UserRepository) - Staff accounts, password checks
//! - [`ReportRepository`](report::ReportRepository) - Summary, daily and top-product reports

pub mod product;
pub mod report;
pub mod sale;
pub mod user;
