pub mod config;
pub mod duration;
pub mod error;
pub mod models;
