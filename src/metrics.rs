use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Client-side metrics for the request gateway
pub struct Metrics {
    pub registry: Registry,

    // Request metrics
    pub requests_total: CounterVec,

    // Renewal metrics
    pub renewals_total: CounterVec,
    pub renewal_waiters: Gauge,
    pub forced_logouts_total: Counter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            Opts::new("formsync_requests_total", "Total number of API requests sent"),
            &["method", "status"],
        )?;

        let renewals_total = CounterVec::new(
            Opts::new(
                "formsync_renewals_total",
                "Credential renewals by outcome",
            ),
            &["outcome"], // success, rejected, missing_refresh_token, error
        )?;

        let renewal_waiters = Gauge::new(
            "formsync_renewal_waiters",
            "Requests currently queued behind an in-flight renewal",
        )?;

        let forced_logouts_total = Counter::new(
            "formsync_forced_logouts_total",
            "Times the session was torn down and re-authentication requested",
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(renewals_total.clone()))?;
        registry.register(Box::new(renewal_waiters.clone()))?;
        registry.register(Box::new(forced_logouts_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            renewals_total,
            renewal_waiters,
            forced_logouts_total,
        })
    }

    /// Prometheus text exposition of everything in the registry
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

/// Global metrics instance
pub static METRICS: once_cell::sync::Lazy<Arc<Metrics>> =
    once_cell::sync::Lazy::new(|| Arc::new(Metrics::default()));

pub fn render() -> anyhow::Result<String> {
    METRICS.render()
}
