//! Business logic services for the restaurant operations backend

pub mod conversion;
pub mod menu;
pub mod order;
pub mod production;
pub mod purchasing;
pub mod recipe;
pub mod stock;

