//! Quota Broker Library
//!
//! Sliding-window token quota allocation across the deployments of a model,
//! with the configuration, metrics and HTTP surface that serve it.

pub mod config;
pub mod metrics;
pub mod quota;
pub mod server;
