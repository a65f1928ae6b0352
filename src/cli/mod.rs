//! CLI commands

pub mod check_config;
pub mod context;
pub mod simulate;
pub mod style;

pub use check_config::run_check_config;
pub use simulate::run_simulate;
