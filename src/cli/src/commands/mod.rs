pub mod capabilities;
pub mod config;
pub mod health;
pub mod probe;
