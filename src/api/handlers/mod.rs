pub mod health;
pub mod license;
