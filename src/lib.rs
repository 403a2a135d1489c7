pub mod aggregate;
pub mod checks;
pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod exit;
pub mod logging;
pub mod metrics;
pub mod provider;
pub mod sink;
pub mod ui;
