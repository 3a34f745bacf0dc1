//! Metrics and tracing setup for the storage container manager.
//!
//! Provides a global [`ScmMetrics`] singleton backed by the `prometheus`
//! crate, plus an optional lightweight HTTP server for Prometheus scraping.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::net::SocketAddr;
use std::sync::OnceLock;

// ────────────────────────── Tracing ──────────────────────────

/// Initialize the tracing subscriber with env-filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

// ────────────────────────── Prometheus metrics ──────────────────────────

/// Global metrics instance.
static METRICS: OnceLock<ScmMetrics> = OnceLock::new();

/// Retrieve (or lazily create) the global metrics singleton.
pub fn metrics() -> &'static ScmMetrics {
    METRICS.get_or_init(ScmMetrics::new)
}

/// All Prometheus metrics for a container manager process.
pub struct ScmMetrics {
    pub registry: Registry,

    // ── RPC counters ──
    pub rpcs_received: IntCounter,
    pub rpcs_received_by_type: IntCounterVec,

    // ── RPC latency ──
    pub rpc_latency_secs: HistogramVec,

    // ── Containers ──
    pub containers_allocated: IntCounter,
    pub containers_tracked: IntGauge,
}

// Manual Debug impl because prometheus types don't derive Debug.
impl std::fmt::Debug for ScmMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScmMetrics").finish_non_exhaustive()
    }
}

/// Default histogram buckets (seconds) for RPC latency.
const LATENCY_BUCKETS: &[f64] = &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0];

impl ScmMetrics {
    fn new() -> Self {
        let registry = Registry::new();

        let rpcs_received = IntCounter::with_opts(Opts::new(
            "scm_rpcs_received_total",
            "Total inbound RPCs received",
        ))
        .expect("rpcs_received counter");
        let rpcs_received_by_type = IntCounterVec::new(
            Opts::new(
                "scm_rpcs_received_by_type_total",
                "Inbound RPCs received, by type",
            ),
            &["rpc_type"],
        )
        .expect("rpcs_received_by_type counter vec");

        let rpc_latency_secs = HistogramVec::new(
            HistogramOpts::new("scm_rpc_latency_seconds", "RPC latency in seconds")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["rpc_type"],
        )
        .expect("rpc_latency_secs histogram");

        let containers_allocated = IntCounter::with_opts(Opts::new(
            "scm_containers_allocated_total",
            "Containers allocated by this manager",
        ))
        .expect("containers_allocated counter");
        let containers_tracked = IntGauge::with_opts(Opts::new(
            "scm_containers_tracked",
            "Containers currently held in the registry",
        ))
        .expect("containers_tracked gauge");

        registry
            .register(Box::new(rpcs_received.clone()))
            .expect("register rpcs_received");
        registry
            .register(Box::new(rpcs_received_by_type.clone()))
            .expect("register rpcs_received_by_type");
        registry
            .register(Box::new(rpc_latency_secs.clone()))
            .expect("register rpc_latency_secs");
        registry
            .register(Box::new(containers_allocated.clone()))
            .expect("register containers_allocated");
        registry
            .register(Box::new(containers_tracked.clone()))
            .expect("register containers_tracked");

        Self {
            registry,
            rpcs_received,
            rpcs_received_by_type,
            rpc_latency_secs,
            containers_allocated,
            containers_tracked,
        }
    }
}

/// Encode all registered metrics in Prometheus text exposition format.
pub fn encode_metrics() -> String {
    let m = metrics();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    encoder
        .encode(&m.registry.gather(), &mut buf)
        .expect("prometheus text encoding");
    String::from_utf8(buf).expect("prometheus output is valid UTF-8")
}

/// Count an inbound RPC and start its latency timer. The returned guard
/// records elapsed time on drop.
pub fn record_rpc(rpc_type: &str) -> prometheus::HistogramTimer {
    let m = metrics();
    m.rpcs_received.inc();
    m.rpcs_received_by_type.with_label_values(&[rpc_type]).inc();
    m.rpc_latency_secs
        .with_label_values(&[rpc_type])
        .start_timer()
}

// ────────────────────────── Metrics HTTP server ──────────────────────────

use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

async fn metrics_handler(
    _req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, std::convert::Infallible> {
    let body = encode_metrics();
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain; version=0.0.4; charset=utf-8")
        .body(Full::new(Bytes::from(body)))
        .expect("valid HTTP response"))
}

/// Serve Prometheus metrics on the given address (`GET /metrics`).
///
/// Call from a `tokio::spawn`; runs until the listener fails.
pub async fn serve_metrics(
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("metrics server listening on http://{}/metrics", addr);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(metrics_handler))
                .await
            {
                tracing::debug!("metrics connection error: {}", e);
            }
        });
    }
}

// ────────────────────────── Tests ──────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Histogram;

    #[test]
    fn test_record_rpc_counts_by_type() {
        let m = metrics();
        let before = m.rpcs_received.get();
        let before_get = m
            .rpcs_received_by_type
            .with_label_values(&["test_get"])
            .get();

        drop(record_rpc("test_get"));
        drop(record_rpc("test_get"));

        assert_eq!(m.rpcs_received.get(), before + 2);
        assert_eq!(
            m.rpcs_received_by_type
                .with_label_values(&["test_get"])
                .get(),
            before_get + 2
        );
        let h: Histogram = m.rpc_latency_secs.with_label_values(&["test_get"]);
        assert_eq!(h.get_sample_count(), 2);
    }

    #[test]
    fn test_encode_metrics_format() {
        metrics().containers_allocated.inc();

        let output = encode_metrics();
        assert!(output.contains("scm_containers_allocated_total"));
        assert!(output.contains("scm_containers_tracked"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }
}
