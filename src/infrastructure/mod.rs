pub mod engines;
pub mod staging;
