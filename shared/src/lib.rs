//! Shared types and ledger logic for the restaurant operations platform
//!
//! This crate holds the domain models and the pure inventory, production and
//! servings rules. The backend runs them inside database transactions.

pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
