pub mod commands;
pub mod store;
