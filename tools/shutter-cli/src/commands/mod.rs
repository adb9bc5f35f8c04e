pub mod check;
pub mod config;
pub mod devices;
pub mod record;
pub mod shoot;
