pub mod actions;
pub mod engine;
pub mod exec;
pub mod git_ops;
