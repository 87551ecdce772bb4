pub mod api;
pub mod metrics;
pub mod probe;
pub mod state;
