pub mod analytics;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod telemetry;
pub mod tournament;
