pub mod guidance;
pub mod items;
pub mod metrics;
pub mod metrics_log;
