// Prometheus metrics for the quota broker
//
// Exposes metrics on the /metrics HTTP endpoint:
// - Admission outcomes per model (counter)
// - Tokens granted per resource (counter)
// - Advised wait times (histogram)
// - Catalog size (gauge)

use lazy_static::lazy_static;
use prometheus::{Encoder, HistogramVec, IntCounterVec, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

use crate::quota::{AdmissionOutcome, ModelName, QuotaError};

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    pub static ref QUOTA_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("quota_requests_total", "Quota requests by outcome"),
        &["model", "outcome"]
    ).expect("Failed to create quota requests metric");

    pub static ref QUOTA_TOKENS_GRANTED_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("quota_tokens_granted_total", "Raw tokens granted per resource"),
        &["model", "resource"]
    ).expect("Failed to create tokens granted metric");

    pub static ref QUOTA_WAIT_SECONDS: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new("quota_wait_seconds", "Wait advised to denied callers")
            .buckets(vec![0.0, 1.0, 5.0, 10.0, 20.0, 30.0, 45.0, 60.0]),
        &["model"]
    ).expect("Failed to create wait seconds metric");

    pub static ref QUOTA_CATALOG_RESOURCES: IntGauge = IntGauge::new(
        "quota_catalog_resources",
        "Number of resources loaded from the catalog"
    ).expect("Failed to create catalog resources metric");
}

/// Initialize metrics registry - must be called once at startup
pub fn init() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(QUOTA_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(QUOTA_TOKENS_GRANTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(QUOTA_WAIT_SECONDS.clone()))?;
    REGISTRY.register(Box::new(QUOTA_CATALOG_RESOURCES.clone()))?;
    Ok(())
}

/// Record the result of one admission request
pub fn observe_admission(model: ModelName, result: &Result<AdmissionOutcome, QuotaError>) {
    let model = model.as_str();
    match result {
        Ok(AdmissionOutcome::Granted(grant)) => {
            QUOTA_REQUESTS_TOTAL.with_label_values(&[model, "granted"]).inc();
            QUOTA_TOKENS_GRANTED_TOTAL
                .with_label_values(&[model, grant.resource.as_str()])
                .inc_by(grant.tokens);
        }
        Ok(AdmissionOutcome::Denied(denial)) => {
            QUOTA_REQUESTS_TOTAL.with_label_values(&[model, "denied"]).inc();
            if let Some(secs) = denial.wait.as_secs() {
                QUOTA_WAIT_SECONDS
                    .with_label_values(&[model])
                    .observe(secs as f64);
            }
        }
        Err(_) => {
            QUOTA_REQUESTS_TOTAL.with_label_values(&[model, "rejected"]).inc();
        }
    }
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::{Denial, Grant, WaitTime};

    #[test]
    fn test_observe_granted() {
        let model = ModelName::Embedding3Large;
        let before = QUOTA_TOKENS_GRANTED_TOTAL
            .with_label_values(&[model.as_str(), "metrics-test"])
            .get();

        observe_admission(
            model,
            &Ok(AdmissionOutcome::Granted(Grant {
                model,
                resource: "metrics-test".to_string(),
                tokens: 1500,
            })),
        );

        let after = QUOTA_TOKENS_GRANTED_TOTAL
            .with_label_values(&[model.as_str(), "metrics-test"])
            .get();
        assert_eq!(after - before, 1500);
    }

    #[test]
    fn test_observe_denied_and_rejected() {
        let model = ModelName::EmbeddingAda002;
        let denied_before = QUOTA_REQUESTS_TOTAL
            .with_label_values(&[model.as_str(), "denied"])
            .get();
        let rejected_before = QUOTA_REQUESTS_TOTAL
            .with_label_values(&[model.as_str(), "rejected"])
            .get();

        observe_admission(
            model,
            &Ok(AdmissionOutcome::Denied(Denial {
                model,
                resource: "east".to_string(),
                tokens: 10,
                wait: WaitTime::Seconds(12),
            })),
        );
        observe_admission(
            model,
            &Err(QuotaError::StructuralQuotaExceeded { model, tokens: 10 }),
        );

        assert!(
            QUOTA_REQUESTS_TOTAL
                .with_label_values(&[model.as_str(), "denied"])
                .get()
                > denied_before
        );
        assert!(
            QUOTA_REQUESTS_TOTAL
                .with_label_values(&[model.as_str(), "rejected"])
                .get()
                > rejected_before
        );
    }

    #[test]
    fn test_gather_after_init() {
        // May fail if already registered by another test, which is fine
        let _ = init();
        QUOTA_CATALOG_RESOURCES.set(3);

        let text = gather_metrics().unwrap();
        assert!(text.contains("quota_catalog_resources 3"));
    }
}
