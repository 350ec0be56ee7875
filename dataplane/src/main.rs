// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![deny(rustdoc::all)]
#![allow(rustdoc::missing_crate_level_docs)]

mod drivers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use args::{CmdArgs, Driver, Parser};
use caps::Capability;
use devmap::DevMap;
use engine::program::ProgramRegistry;
use group::{GroupTable, Policy};
use net::buffer::TestBuffer;
use socket::{GroupBindArgs, GroupJoinArgs, SockOpt, SocketTable};
use stats::{GlobalStats, StatsRegistry};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use drivers::kernel::SharedState;

/// Number of interfaces the device→group map and the stats scraper are sized for.
const MAX_INTERFACES: usize = 256;
/// Number of hardware queues per interface the device→group map is sized for.
const MAX_HW_QUEUES: usize = 16;

fn init_tracing(args: &CmdArgs) {
    let filter = args
        .tracing()
        .map_or_else(|| EnvFilter::new("info"), EnvFilter::new);
    tracing_subscriber::fmt()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_thread_names(true)
        .with_env_filter(filter)
        .init();
}

/// Load a [`config::Config`], apply every CLI override, and validate it against the online CPU
/// set.
fn build_config(args: &CmdArgs) -> Result<config::Config, ()> {
    let mut cfg = match args.config_path() {
        Some(path) => config::Config::from_file(std::path::Path::new(path)).map_err(|e| {
            error!("failed to load config file '{path}': {e}");
        })?,
        None => config::Config::default(),
    };
    if let Some(v) = args.capt_batch_len() {
        cfg = cfg.set_capt_batch_len(v);
    }
    if let Some(v) = args.xmit_batch_len() {
        cfg = cfg.set_xmit_batch_len(v);
    }
    if let Some(v) = args.skb_pool_size() {
        cfg = cfg.set_skb_pool_size(v);
    }
    if let Some(affinity) = args.tx_affinity() {
        cfg = cfg.set_tx_workers(affinity.to_vec());
    }
    cfg = cfg.set_capture_directions(args.capture_incoming(), args.capture_outgoing());
    cfg = cfg.set_vl_untag(args.vl_untag());

    let online = init::online_cpus().unwrap_or_else(|e| {
        warn!("could not discover online CPUs, skipping tx_affinity validation: {e}");
        cfg.tx_affinity.clone()
    });
    cfg.validate(&online).map_err(|e| {
        error!("invalid configuration: {e}");
    })?;
    Ok(cfg)
}

/// Open a group, join one pre-enabled socket to it with every traffic class, and bind every
/// resolved capture interface to it.
///
/// There is, by design, no wire control-plane in this workspace (spec.md §1's non-goal); this is
/// the bring-up a real control client would otherwise perform over `SockOpt`, done once at
/// startup so captured traffic has somewhere to be classified and delivered.
fn bootstrap_default_group(
    sockets: &SocketTable,
    devmap: &DevMap,
    interfaces: &[(u32, String)],
) -> Result<(), errno::PfqErrorKind> {
    let socket = sockets.open();
    let joined = sockets.apply(
        socket.id(),
        SockOpt::GroupJoin(GroupJoinArgs { gid: None, class_mask: u64::MAX, policy: Policy::Shared }),
    )?;
    let socket::SockOptResult::GroupJoined(gid) = joined else {
        return Err(errno::PfqErrorKind::Invalid);
    };
    sockets.apply(socket.id(), SockOpt::Enable(Some(0)))?;
    for (ifindex, name) in interfaces {
        match sockets.apply(
            socket.id(),
            SockOpt::GroupBind(GroupBindArgs { gid, ifindex: *ifindex, queue: devmap::QueueSelector::Any }),
        ) {
            Ok(_) => info!("bound group {gid} to interface '{name}' (ifindex {ifindex})"),
            Err(e) => warn!("failed to bind group {gid} to '{name}': {e:?}"),
        }
    }
    let _ = devmap;
    Ok(())
}

fn main() {
    let args = CmdArgs::parse();

    if args.show_tracing_tags() {
        for tag in tracectl::get_trace_ctl().get_tags() {
            println!("{tag}");
        }
        return;
    }
    if args.show_tracing_targets() || args.tracing_config_generate() {
        println!("{}", tracectl::get_trace_ctl().dump());
        return;
    }

    init_tracing(&args);
    info!("starting pfq-dataplane");

    let Ok(config) = build_config(&args) else {
        std::process::exit(1);
    };

    if args.driver() == Driver::Dpdk {
        error!("--driver dpdk was requested, but this binary only wires up the kernel driver");
        std::process::exit(1);
    }

    let devmap = Arc::new(DevMap::new(MAX_INTERFACES, MAX_HW_QUEUES));
    let groups = Arc::new(GroupTable::new(num_cpus_hint()));
    let sockets = Arc::new(SocketTable::new(Arc::clone(&groups), Arc::clone(&devmap)));
    let registry: ProgramRegistry<TestBuffer> = ProgramRegistry::new(Arc::clone(&groups));
    let global_stats = Arc::new(GlobalStats::new());
    let _ = &registry; // held for a future control-plane to install programs against; unused today

    let interfaces = drivers::kernel::resolve_interfaces(args.interfaces());
    if let Err(e) = bootstrap_default_group(&sockets, &devmap, &interfaces) {
        error!("failed to bootstrap default group: {e:?}");
        std::process::exit(1);
    }

    let stats_registry = Arc::new(StatsRegistry {
        global: Arc::clone(&global_stats),
        groups: Arc::clone(&groups),
        sockets: Arc::clone(&sockets),
        devmap: Arc::clone(&devmap),
        max_ifindex: u32::try_from(MAX_INTERFACES).unwrap_or(u32::MAX),
    });
    let metrics_addr: SocketAddr = args.metrics_address();
    if let Err(e) = stats::start_metrics_server(metrics_addr, stats_registry) {
        error!("failed to start metrics server: {e}");
        std::process::exit(1);
    }

    if let Err(e) = init::drop_capabilities(&[Capability::CAP_NET_RAW, Capability::CAP_NET_ADMIN]) {
        warn!("failed to drop capabilities: {e}");
    }

    let cli_ctx = cli::CliContext {
        devmap: Arc::clone(&devmap),
        groups: Arc::clone(&groups),
        sockets: Arc::clone(&sockets),
        global_stats: Arc::clone(&global_stats),
        max_ifindex: u32::try_from(MAX_INTERFACES).unwrap_or(u32::MAX),
    };
    std::thread::Builder::new()
        .name("pfq-cli".to_owned())
        .spawn(move || {
            if let Err(e) = cli::run(&cli_ctx) {
                error!("admin shell exited: {e}");
            }
        })
        .map(drop)
        .unwrap_or_else(|e| error!("failed to spawn admin shell thread: {e}"));

    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_handler = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || stop_for_handler.store(true, Ordering::Relaxed)) {
        warn!("failed to install SIGINT handler: {e}");
    }

    let state = SharedState { devmap, groups, sockets, global_stats };
    if let Err(e) = drivers::kernel::run(
        args.interfaces(),
        num_cpus_hint(),
        config.capt_batch_len,
        &config.tx_affinity,
        config.xmit_batch_len,
        &state,
        &stop,
    ) {
        error!("kernel driver exited with error: {e}");
        std::process::exit(1);
    }
    info!("shutting down pfq-dataplane");
}

/// Best-effort worker count when the online CPU set cannot be read (e.g. sysfs unavailable).
fn num_cpus_hint() -> usize {
    init::online_cpus().map(|cpus| cpus.len().max(1)).unwrap_or(1)
}
