//! Query functions, one module per table.

pub mod chapters;
pub mod plans;
