pub mod action;
pub mod org;
pub mod repo;
