pub mod browse;
pub mod completions;
pub mod config;
pub mod manage;
pub mod queue;
pub mod session;
pub mod share;
pub mod transfer;
