//! HTTP handlers for the restaurant operations API

pub mod conversion;
pub mod health;
pub mod menu;
pub mod order;
pub mod production;
pub mod purchasing;
pub mod recipe;
pub mod stock;

pub use conversion::*;
pub use health::*;
pub use menu::*;
pub use order::*;
pub use production::*;
pub use purchasing::*;
pub use recipe::*;
pub use stock::*;
