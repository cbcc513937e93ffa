//! Domain models for the restaurant operations platform

mod deduction;
mod material;
mod order;
mod production;
mod receiving;
mod recipe;
mod servings;

pub use deduction::*;
pub use material::*;
pub use order::*;
pub use production::*;
pub use receiving::*;
pub use recipe::*;
pub use servings::*;
