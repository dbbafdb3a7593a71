pub mod license;
pub mod process;
pub mod validation;
