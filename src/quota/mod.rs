//! Token Quota Allocation Module
//!
//! This module tracks how many tokens each model deployment has handed out in
//! the trailing 60-second window and decides where a new request can go.
//!
//! # Features
//!
//! - Sliding-window ledger of admitted reservations per deployment
//! - Release-time simulation for the shortest possible wait
//! - First-fit selection across the deployments of a model
//! - Injectable clock for deterministic tests
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Admission Coordinator                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐         │
//! │  │  Resource   │  │  Wait-Time  │  │    Clock    │         │
//! │  │  Catalog    │  │  Estimator  │  │             │         │
//! │  └─────────────┘  └─────────────┘  └─────────────┘         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │          Quota Ledger (in-memory, one lock)          │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod catalog;
pub mod clock;
pub mod coordinator;
pub mod error;
pub mod estimator;
pub mod ledger;
pub mod model;

#[cfg(test)]
mod proptests;

pub use catalog::{Resource, ResourceCatalog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{AdmissionCoordinator, AdmissionOutcome, Denial, Grant};
pub use error::{CatalogError, QuotaError};
pub use estimator::{estimate_wait, WaitTime};
pub use ledger::{ConsumptionEvent, QuotaLedger, WINDOW_SECS};
pub use model::ModelName;
