//! Data models for Aroma

mod catalog;
mod user;

pub use catalog::*;
pub use user::*;
