//! Admission Coordinator
//!
//! Decides, per request, which deployment gets the tokens or how long the
//! caller has to wait.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::catalog::{Resource, ResourceCatalog};
use super::clock::{Clock, SystemClock};
use super::error::QuotaError;
use super::estimator::{estimate_wait, WaitTime};
use super::ledger::QuotaLedger;
use super::model::ModelName;

/// Tokens reserved on a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grant {
    /// Model the tokens were requested for
    pub model: ModelName,

    /// Resource that now holds the reservation
    pub resource: String,

    /// Raw tokens reserved
    pub tokens: u64,
}

/// Request that could not be placed right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Denial {
    /// Model the tokens were requested for
    pub model: ModelName,

    /// Resource the wait refers to
    pub resource: String,

    /// Raw tokens requested
    pub tokens: u64,

    /// Time until the resource could take the request
    pub wait: WaitTime,
}

/// Result of an admission attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AdmissionOutcome {
    /// Capacity reserved
    Granted(Grant),
    /// Retry after the indicated wait
    Denied(Denial),
}

impl AdmissionOutcome {
    /// Whether tokens were reserved
    pub fn is_granted(&self) -> bool {
        matches!(self, AdmissionOutcome::Granted(_))
    }

    /// Resource the outcome refers to
    pub fn resource(&self) -> &str {
        match self {
            AdmissionOutcome::Granted(g) => &g.resource,
            AdmissionOutcome::Denied(d) => &d.resource,
        }
    }
}

/// Owns the ledger and runs admission against the catalog
#[derive(Debug)]
pub struct AdmissionCoordinator {
    catalog: Arc<ResourceCatalog>,

    // One lock for every key; held for a single resource decision.
    ledger: Mutex<QuotaLedger>,

    clock: Arc<dyn Clock>,
}

impl AdmissionCoordinator {
    /// Create a coordinator on the wall clock
    pub fn new(catalog: Arc<ResourceCatalog>) -> Self {
        Self::with_clock(catalog, Arc::new(SystemClock))
    }

    /// Create a coordinator with an injected clock
    pub fn with_clock(catalog: Arc<ResourceCatalog>, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog,
            ledger: Mutex::new(QuotaLedger::new()),
            clock,
        }
    }

    /// Catalog this coordinator allocates from
    pub fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    fn lock_ledger(&self) -> MutexGuard<'_, QuotaLedger> {
        // Every ledger mutation is a single push or retain, so a poisoned
        // guard still holds a consistent ledger.
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reserve `tokens` on the first resource of `model` that can take them
    ///
    /// If none can, returns the denial with the shortest wait. Fails with
    /// [`QuotaError::StructuralQuotaExceeded`] when no resource could ever
    /// hold the request.
    pub fn request_quota(
        &self,
        model: ModelName,
        tokens: u64,
    ) -> Result<AdmissionOutcome, QuotaError> {
        let mut best: Option<Denial> = None;

        for resource in self.catalog.resources(model) {
            match self.try_resource(model, resource, tokens) {
                AdmissionOutcome::Granted(grant) => {
                    info!(
                        model = %model,
                        resource = %grant.resource,
                        tokens,
                        "Quota granted"
                    );
                    return Ok(AdmissionOutcome::Granted(grant));
                }
                AdmissionOutcome::Denied(denial) => {
                    debug!(
                        model = %model,
                        resource = %denial.resource,
                        tokens,
                        wait_seconds = %denial.wait,
                        "Resource denied request"
                    );
                    if best.as_ref().map_or(true, |b| denial.wait < b.wait) {
                        best = Some(denial);
                    }
                }
            }
        }

        match best {
            Some(denial) if denial.wait.is_finite() => {
                info!(
                    model = %model,
                    resource = %denial.resource,
                    tokens,
                    wait_seconds = %denial.wait,
                    "Quota denied, caller must wait"
                );
                Ok(AdmissionOutcome::Denied(denial))
            }
            _ => {
                warn!(model = %model, tokens, "Request exceeds every resource quota");
                Err(QuotaError::StructuralQuotaExceeded { model, tokens })
            }
        }
    }

    /// Grant-or-deny for one resource, atomically under the ledger lock
    pub fn try_resource(
        &self,
        model: ModelName,
        resource: &Resource,
        tokens: u64,
    ) -> AdmissionOutcome {
        if tokens > resource.capacity {
            return AdmissionOutcome::Denied(Denial {
                model,
                resource: resource.name.clone(),
                tokens,
                wait: WaitTime::Never,
            });
        }

        let mut ledger = self.lock_ledger();
        let now = self.clock.now();

        ledger.expire(model, &resource.name, now);
        let available = resource
            .capacity
            .saturating_sub(ledger.used_tokens(model, &resource.name));

        if available >= tokens {
            ledger.record(model, &resource.name, tokens, now);
            return AdmissionOutcome::Granted(Grant {
                model,
                resource: resource.name.clone(),
                tokens,
            });
        }

        let wait = estimate_wait(ledger.events(model, &resource.name), tokens, available, now);
        AdmissionOutcome::Denied(Denial {
            model,
            resource: resource.name.clone(),
            tokens,
            wait,
        })
    }

    /// Tokens currently held on each resource of `model`
    pub fn used_quotas(&self, model: ModelName) -> BTreeMap<String, u64> {
        self.catalog
            .resources(model)
            .iter()
            .map(|resource| {
                let mut ledger = self.lock_ledger();
                ledger.expire(model, &resource.name, self.clock.now());
                (
                    resource.name.clone(),
                    ledger.used_tokens(model, &resource.name),
                )
            })
            .collect()
    }

    /// Window capacity of each resource of `model`
    pub fn model_quotas(&self, model: ModelName) -> BTreeMap<String, u64> {
        self.catalog
            .resources(model)
            .iter()
            .map(|r| (r.name.clone(), r.capacity))
            .collect()
    }
}
