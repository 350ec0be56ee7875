// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! `metrics`-backed stats surface (SPEC_FULL.md's ambient-crates table): whole-process
//! [`GlobalStats`] (the one count that belongs to no group or socket, spec.md §4.5 step 1's
//! `global.recv`), and a Prometheus exporter that reads every group's/socket's own stats and
//! counters straight out of `group`/`socket` on each scrape.
//!
//! Grounded on `dataplane/src/statistics/mod.rs`/`global_counters.rs`'s shape (a
//! `PrometheusHandler` wrapping a `PrometheusBuilder`-installed recorder, an axum `/metrics`
//! route, a `start_metrics_server` that spawns a current-thread tokio runtime on its own OS
//! thread) with the VPC/peering gauges this workspace has no concept of replaced by spec.md §6's
//! `GET_STATS`/`GROUP_STATS`/`GROUP_COUNTERS` fields.

#![deny(clippy::all, clippy::pedantic)]
#![deny(missing_docs)]
#![allow(clippy::cast_precision_loss)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use devmap::DevMap;
use group::GroupTable;
use metrics::{counter, describe_counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use socket::SocketTable;
use thiserror::Error;
use tracectl::trace_target;
use tracing::{LevelFilter, error, info};

trace_target!("pfq-stats", LevelFilter::INFO, &["stats"]);

const METRIC_GLOBAL_RECV: &str = "pfq_global_recv";
const METRIC_GLOBAL_LOST: &str = "pfq_global_lost";
const METRIC_GLOBAL_FORWARD_DISC: &str = "pfq_global_forward_disc";
const METRIC_GROUP_RECV: &str = "pfq_group_recv";
const METRIC_GROUP_DROP: &str = "pfq_group_drop";
const METRIC_GROUP_FRWD: &str = "pfq_group_frwd";
const METRIC_GROUP_KERN: &str = "pfq_group_kern";
const METRIC_SOCKET_RECV: &str = "pfq_socket_recv";
const METRIC_SOCKET_LOST: &str = "pfq_socket_lost";
const METRIC_SOCKET_DROP: &str = "pfq_socket_drop";
const METRIC_SOCKET_SENT: &str = "pfq_socket_sent";
const METRIC_SOCKET_DISC: &str = "pfq_socket_disc";
const METRIC_SOCKET_FAIL: &str = "pfq_socket_fail";
const METRIC_DEVMAP_MONITOR: &str = "pfq_devmap_monitor";
const METRIC_SCRAPES: &str = "pfq_metrics_scrapes_total";

/// Whole-process counters with no natural per-group/per-socket home (spec.md §4.5 step 1, §9
/// "Engine" deviation notes): every engine worker's [`engine::BatchStats`] folds in here once per
/// batch. Kept as plain `u64`, not `engine::BatchStats`, so this crate never needs to depend on
/// `engine` — the dependency runs the other way, from the binary that owns both.
#[derive(Debug, Default)]
pub struct GlobalStats {
    recv: AtomicU64,
    lost: AtomicU64,
    forward_disc: AtomicU64,
}

impl GlobalStats {
    /// A fresh, zeroed counter bank.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one batch's `(recv, lost, forward_disc)` deltas into the running totals.
    pub fn record(&self, recv: u64, lost: u64, forward_disc: u64) {
        self.recv.fetch_add(recv, Ordering::Relaxed);
        self.lost.fetch_add(lost, Ordering::Relaxed);
        self.forward_disc.fetch_add(forward_disc, Ordering::Relaxed);
    }

    /// Read the current totals.
    #[must_use]
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.recv.load(Ordering::Relaxed),
            self.lost.load(Ordering::Relaxed),
            self.forward_disc.load(Ordering::Relaxed),
        )
    }
}

/// Everything the Prometheus exporter reads on each scrape.
pub struct StatsRegistry {
    /// Whole-process counters.
    pub global: Arc<GlobalStats>,
    /// Per-group stats/counters source.
    pub groups: Arc<GroupTable>,
    /// Per-socket stats source.
    pub sockets: Arc<SocketTable>,
    /// Device→group map, scraped for its `monitor[if]` gate (spec.md §3).
    pub devmap: Arc<DevMap>,
    /// Highest ifindex to scrape `devmap.monitor()` for.
    pub max_ifindex: u32,
}

fn init_descriptions() {
    describe_counter!(METRIC_SCRAPES, "Total number of /metrics endpoint scrapes");
}

/// Push every group's/socket's/the process's current counters into the `metrics` registry.
/// Called once per scrape, not on the hot path (spec.md §5: control-plane-adjacent reads never
/// block the engine — this only reads atomics/`DashMap` snapshots already safe for concurrent
/// readers).
pub fn sync_to_prometheus(registry: &StatsRegistry) {
    counter!(METRIC_SCRAPES).increment(1);

    let (recv, lost, forward_disc) = registry.global.snapshot();
    gauge!(METRIC_GLOBAL_RECV).set(recv as f64);
    gauge!(METRIC_GLOBAL_LOST).set(lost as f64);
    gauge!(METRIC_GLOBAL_FORWARD_DISC).set(forward_disc as f64);

    for gid in registry.groups.ids() {
        let Some(group) = registry.groups.get(gid) else {
            continue;
        };
        let stats = group.stats();
        let gid_label = gid.index().to_string();
        gauge!(METRIC_GROUP_RECV, "gid" => gid_label.clone()).set(stats.recv as f64);
        gauge!(METRIC_GROUP_DROP, "gid" => gid_label.clone()).set(stats.drop as f64);
        gauge!(METRIC_GROUP_FRWD, "gid" => gid_label.clone()).set(stats.frwd as f64);
        gauge!(METRIC_GROUP_KERN, "gid" => gid_label).set(stats.kern as f64);
    }

    for sid in registry.sockets.ids() {
        let Some(socket) = registry.sockets.get(sid) else {
            continue;
        };
        let stats = socket.stats();
        let sid_label = sid.index().to_string();
        gauge!(METRIC_SOCKET_RECV, "sid" => sid_label.clone()).set(stats.recv as f64);
        gauge!(METRIC_SOCKET_LOST, "sid" => sid_label.clone()).set(stats.lost as f64);
        gauge!(METRIC_SOCKET_DROP, "sid" => sid_label.clone()).set(stats.drop as f64);
        gauge!(METRIC_SOCKET_SENT, "sid" => sid_label.clone()).set(stats.sent as f64);
        gauge!(METRIC_SOCKET_DISC, "sid" => sid_label.clone()).set(stats.disc as f64);
        gauge!(METRIC_SOCKET_FAIL, "sid" => sid_label).set(stats.fail as f64);
    }

    for ifindex in 0..registry.max_ifindex {
        if registry.devmap.monitor(ifindex) {
            gauge!(METRIC_DEVMAP_MONITOR, "ifindex" => ifindex.to_string()).set(1.0);
        }
    }
}

/// Failure starting the metrics HTTP server.
#[derive(Debug, Error)]
pub enum StatsServerError {
    /// The Prometheus recorder could not be installed (e.g. a recorder is already installed).
    #[error("failed to install prometheus recorder: {0}")]
    Recorder(#[from] metrics_exporter_prometheus::BuildError),
    /// The metrics-server OS thread could not be spawned.
    #[error("failed to spawn metrics server thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Clone)]
struct PrometheusHandler {
    handle: PrometheusHandle,
    registry: Arc<StatsRegistry>,
}

impl PrometheusHandler {
    fn render(&self) -> String {
        sync_to_prometheus(&self.registry);
        self.handle.render()
    }
}

async fn metrics_handler(
    axum::extract::State(handler): axum::extract::State<PrometheusHandler>,
) -> Response<String> {
    let body = handler.render();
    #[allow(clippy::unwrap_used)] // a static status/header pair never fails to build
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/plain; version=1.0.0; charset=utf-8")
        .body(body)
        .unwrap()
}

/// Start the `/metrics` Prometheus endpoint on `addr`, on its own OS thread running a
/// current-thread tokio runtime (mirrors `dataplane`'s prior `start_metrics_server`: the engine's
/// own per-CPU threads stay plain `std::thread`s with no tokio dependency).
///
/// # Errors
///
/// Returns [`StatsServerError::Recorder`] if a Prometheus recorder is already installed in this
/// process, or [`StatsServerError::Spawn`] if the server thread cannot be spawned.
pub fn start_metrics_server(
    addr: SocketAddr,
    registry: Arc<StatsRegistry>,
) -> Result<std::thread::JoinHandle<()>, StatsServerError> {
    init_descriptions();
    let handle = PrometheusBuilder::new().install_recorder()?;
    let handler = PrometheusHandler { handle, registry };

    let thread = std::thread::Builder::new()
        .name("pfq-metrics".to_owned())
        .spawn(move || {
            info!("starting metrics server thread");
            let Ok(rt) = tokio::runtime::Builder::new_current_thread().enable_all().build() else {
                error!("failed to build metrics server tokio runtime");
                return;
            };
            rt.block_on(async move {
                let app = Router::new()
                    .route("/metrics", get(metrics_handler))
                    .with_state(handler);
                info!("metrics server listening on {addr}");
                if let Err(e) = axum_server::bind(addr).serve(app.into_make_service()).await {
                    error!("metrics server error: {e}");
                }
            });
        })?;
    Ok(thread)
}

#[cfg(test)]
mod tests {
    use super::GlobalStats;

    #[test]
    fn records_accumulate_across_batches() {
        let stats = GlobalStats::new();
        stats.record(100, 2, 0);
        stats.record(60, 0, 5);
        assert_eq!(stats.snapshot(), (160, 2, 5));
    }
}
