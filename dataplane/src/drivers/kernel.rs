// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Kernel dataplane driver: `AF_PACKET` capture/injection feeding the engine (C7).
//!
//! One dispatcher thread polls a raw socket per captured interface, parses each frame into a
//! [`Packet<TestBuffer>`], and shards it by flow hash to one of a fixed pool of engine-worker
//! threads. Each worker owns an independent [`engine::Engine`] (spec.md §9: never shared mutably
//! across CPUs) and flushes its batch to a pair of sinks that write bytes back out a second,
//! write-only raw socket per interface.

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

use afpacket::sync::RawPacketStream;

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel as chan;

use devmap::DevMap;
use engine::{BatchStats, Engine, ForwardSink, HostStackSink};
use group::GroupTable;
use net::buffer::TestBuffer;
use net::packet::{HwQueue, InterfaceId, Packet};
use netdev::Interface;
use socket::SocketTable;
use stats::GlobalStats;
use tracing::{debug, error, info, warn};

/// A kernel interface opened for capture: one raw socket, registered with the poller.
pub struct Kif {
    ifindex: u32,
    token: Token,
    name: String,
    sock: RawPacketStream,
    raw_fd: RawFd,
}

impl Kif {
    fn new(ifindex: u32, name: &str, token: Token) -> io::Result<Self> {
        let mut sock = RawPacketStream::new().map_err(|e| {
            error!("failed to open raw sock for interface {name}: {e}");
            e
        })?;
        sock.set_non_blocking();
        sock.bind(name)
            .inspect_err(|e| error!("failed to bind raw sock for interface {name}: {e}"))?;
        let raw_fd = sock.as_raw_fd();
        debug!("opened capture socket on '{name}'");
        Ok(Self { ifindex, token, name: name.to_owned(), sock, raw_fd })
    }
}

/// A table of [`Kif`]s used for capture, keyed by poller token.
pub struct KifTable {
    poll: Poll,
    by_token: HashMap<Token, Kif>,
    next_token: usize,
}

impl KifTable {
    /// Create an empty interface table with a fresh poller.
    pub fn new() -> io::Result<Self> {
        Ok(Self { poll: Poll::new()?, next_token: 1, by_token: HashMap::new() })
    }

    /// Open a capture socket on `name` and register it with the poller.
    pub fn add(&mut self, ifindex: u32, name: &str) -> io::Result<()> {
        let token = Token(self.next_token);
        let interface = Kif::new(ifindex, name, token)?;
        let mut source = SourceFd(&interface.raw_fd);
        self.poll
            .registry()
            .register(&mut source, token, Interest::READABLE)
            .inspect_err(|e| error!("failed to register interface '{name}': {e}"))?;
        self.by_token.insert(token, interface);
        self.next_token += 1;
        info!("registered capture interface '{name}' (ifindex {ifindex}) as {token:?}");
        Ok(())
    }

    fn get_mut(&mut self, token: Token) -> Option<&mut Kif> {
        self.by_token.get_mut(&token)
    }
}

/// A raw socket opened purely for transmit, one per egress-capable interface, guarded by its own
/// lock so engine-worker threads can write concurrently without contending on the RX poller.
struct TxIface {
    name: String,
    sock: Mutex<RawPacketStream>,
}

/// Interface-indexed transmit handles shared by every engine worker's [`ForwardSink`].
pub struct TxIfaceMap {
    by_ifindex: HashMap<u32, TxIface>,
}

impl TxIfaceMap {
    /// Open one write-only capture socket per `(ifindex, name)` pair.
    pub fn build(interfaces: &[(u32, String)]) -> io::Result<Self> {
        let mut by_ifindex = HashMap::with_capacity(interfaces.len());
        for (ifindex, name) in interfaces {
            let mut sock = RawPacketStream::new()?;
            sock.set_non_blocking();
            sock.bind(name)
                .inspect_err(|e| error!("failed to bind tx sock for interface {name}: {e}"))?;
            by_ifindex.insert(*ifindex, TxIface { name: name.clone(), sock: Mutex::new(sock) });
        }
        Ok(Self { by_ifindex })
    }

    /// Write `frame` out `ifindex`. Returns `false` if the interface is unknown or the write
    /// fails.
    fn write_to(&self, ifindex: u32, frame: &[u8]) -> bool {
        let Some(iface) = self.by_ifindex.get(&ifindex) else {
            warn!("forward to unbound ifindex {ifindex}: dropping");
            return false;
        };
        #[allow(clippy::unwrap_used)] // a poisoned tx lock means a writer thread already panicked
        let mut sock = iface.sock.lock().unwrap();
        match sock.write_all(frame) {
            Ok(()) => true,
            Err(e) => {
                error!("tx failed on '{}': {e}", iface.name);
                false
            }
        }
    }
}

/// [`ForwardSink`] that writes bulk-forwarded frames out the interface named by the target
/// `ifindex`. The hardware queue selector is not meaningful for `AF_PACKET` sockets and is
/// ignored.
pub struct KernelForward {
    tx: Arc<TxIfaceMap>,
}

impl KernelForward {
    /// Wrap a shared transmit-interface map.
    #[must_use]
    pub fn new(tx: Arc<TxIfaceMap>) -> Self {
        Self { tx }
    }
}

impl ForwardSink for KernelForward {
    fn forward(&self, ifindex: InterfaceId, _queue: HwQueue, frames: &[&[u8]]) -> usize {
        frames.iter().filter(|frame| self.tx.write_to(ifindex.get_id(), frame)).count()
    }
}

/// [`HostStackSink`] for the kernel driver.
///
/// `AF_PACKET` capture is a passive copy: the kernel's own networking stack has already seen
/// every captured frame by the time this driver reads it, so a program's request to deliver a
/// directly-captured frame to the host stack is already satisfied and there is nothing further
/// to inject.
pub struct KernelHost;

impl HostStackSink for KernelHost {
    fn inject(&self, _frame: &[u8]) {}
}

/// [`tx_workers::TxSink`] that drains coalesced async-Tx batches out the same transmit sockets
/// the bulk-forward path uses.
pub struct KernelTxSink {
    tx: Arc<TxIfaceMap>,
}

impl KernelTxSink {
    /// Wrap a shared transmit-interface map.
    #[must_use]
    pub fn new(tx: Arc<TxIfaceMap>) -> Self {
        Self { tx }
    }
}

impl tx_workers::TxSink for KernelTxSink {
    fn transmit(&self, ifindex: u32, _qindex: u8, slots: &[shmem_queue::TxSlot]) -> usize {
        slots.iter().filter(|slot| self.tx.write_to(ifindex, &slot.payload)).count()
    }
}

fn get_interface_ifindex(interfaces: &[Interface], name: &str) -> Option<u32> {
    interfaces.iter().find(|i| i.name == name).map(|i| i.index)
}

/// Resolve the `--interface` list (or `ANY`, capturing on every interface) against the host's
/// current interface set.
#[must_use]
pub fn resolve_interfaces(names: &[String]) -> Vec<(u32, String)> {
    let interfaces = netdev::get_interfaces();
    if names.is_empty() {
        warn!("no interfaces configured: no packet will be captured or transmitted");
        return Vec::new();
    }
    if names.len() == 1 && names[0].eq_ignore_ascii_case("any") {
        return interfaces.into_iter().map(|i| (i.index, i.name)).collect();
    }
    names
        .iter()
        .filter_map(|name| {
            let ifindex = get_interface_ifindex(&interfaces, name);
            if ifindex.is_none() {
                warn!("could not find ifindex of interface '{name}'");
            }
            ifindex.map(|ifindex| (ifindex, name.clone()))
        })
        .collect()
}

fn build_kif_table(interfaces: &[(u32, String)]) -> io::Result<KifTable> {
    let mut table = KifTable::new()?;
    for (ifindex, name) in interfaces {
        if let Err(e) = table.add(*ifindex, name) {
            error!("skipping interface '{name}': {e}");
        }
    }
    Ok(table)
}

/// Try to drain every frame currently queued on `interface`'s capture socket, parsing each into a
/// [`Packet<TestBuffer>`] tagged with its arrival interface.
pub fn packet_recv(interface: &mut Kif) -> Vec<Packet<TestBuffer>> {
    let mut raw = [0u8; 2048];
    let mut pkts = Vec::with_capacity(32);
    loop {
        match interface.sock.read(&mut raw) {
            Ok(0) => break,
            Ok(bytes) => {
                let buf = TestBuffer::from_raw_data(&raw[..bytes]);
                match Packet::new(buf) {
                    Ok(mut incoming) => {
                        let meta = incoming.get_meta_mut();
                        meta.iif = InterfaceId::new(interface.ifindex);
                        meta.set_direct(true);
                        pkts.push(incoming);
                    }
                    Err(e) => {
                        if interface.name != "lo" {
                            error!("failed to parse packet on '{}': {e}", interface.name);
                        }
                    }
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => {
                error!("read error on '{}': {e}", interface.name);
                break;
            }
        }
    }
    pkts
}

/// Pick a worker index for `pkt` by a symmetric ECMP-style hash over its IP/transport headers, so
/// both directions of a flow land on the same worker (spec.md §9's single-CPU-ownership
/// invariant applies per flow, not just per packet).
#[must_use]
pub fn compute_worker_idx(pkt: &Packet<TestBuffer>, workers: usize) -> usize {
    let n = u8::try_from(workers.clamp(1, usize::from(u8::MAX) + 1)).unwrap_or(u8::MAX);
    usize::try_from(pkt.packet_hash_ecmp(0, n.saturating_sub(1))).unwrap_or(0)
}

type WorkerTx = chan::Sender<Packet<TestBuffer>>;

/// Shared tables and sinks every engine worker reads/writes; built once in `dataplane::main` and
/// handed to [`start`].
pub struct SharedState {
    /// Device→group map.
    pub devmap: Arc<DevMap>,
    /// Group table.
    pub groups: Arc<GroupTable>,
    /// Socket table.
    pub sockets: Arc<SocketTable>,
    /// Whole-process recv/lost/forward_disc counters.
    pub global_stats: Arc<GlobalStats>,
}

fn spawn_engine_worker(
    cpu: usize,
    capacity: usize,
    state: &SharedState,
    forward: Arc<KernelForward>,
    host: Arc<KernelHost>,
) -> WorkerTx {
    let (tx, rx) = chan::bounded::<Packet<TestBuffer>>(4096);
    let devmap = Arc::clone(&state.devmap);
    let groups = Arc::clone(&state.groups);
    let sockets = Arc::clone(&state.sockets);
    let global_stats = Arc::clone(&state.global_stats);
    let builder = thread::Builder::new().name(format!("pfq-engine-{cpu}"));
    #[allow(clippy::expect_used)] // failing to spawn a required worker thread is unrecoverable
    builder
        .spawn(move || {
            let mut engine: Engine<TestBuffer> = Engine::new(cpu, capacity, devmap, groups, sockets);
            let flush_every = Duration::from_millis(2);
            loop {
                match rx.recv_timeout(flush_every) {
                    Ok(pkt) => {
                        if !engine.admit(pkt) {
                            warn!(worker = cpu, "batch full; packet dropped");
                        }
                        if engine.batch_len() >= capacity {
                            flush(&mut engine, forward.as_ref(), host.as_ref(), &global_stats, cpu);
                        }
                    }
                    Err(chan::RecvTimeoutError::Timeout) => {
                        if engine.batch_len() > 0 {
                            flush(&mut engine, forward.as_ref(), host.as_ref(), &global_stats, cpu);
                        }
                    }
                    Err(chan::RecvTimeoutError::Disconnected) => break,
                }
            }
        })
        .expect("failed to spawn engine worker thread")
        ;
    tx
}

fn flush(
    engine: &mut Engine<TestBuffer>,
    forward: &dyn ForwardSink,
    host: &dyn HostStackSink,
    global_stats: &GlobalStats,
    cpu: usize,
) {
    let BatchStats { recv, lost, forward_disc } = engine.run_batch(forward, host);
    global_stats.record(recv, lost, forward_disc);
    debug!(worker = cpu, recv, lost, forward_disc, "flushed batch");
}

/// Run the kernel driver until interrupted: opens capture/transmit sockets on every resolved
/// interface, spawns `num_workers` engine workers plus one pinned Tx async worker per
/// `tx_affinity` entry, and polls for inbound traffic on the calling thread until `stop` is set.
///
/// # Errors
///
/// Returns an I/O error if the poller or any interface's sockets cannot be created.
pub fn run(
    interface_names: &[String],
    num_workers: usize,
    capt_batch_len: usize,
    tx_affinity: &[usize],
    xmit_batch_len: usize,
    state: &SharedState,
    stop: &std::sync::atomic::AtomicBool,
) -> io::Result<()> {
    let interfaces = resolve_interfaces(interface_names);
    let mut kiftable = build_kif_table(&interfaces)?;
    let tx_ifaces = Arc::new(TxIfaceMap::build(&interfaces)?);

    let num_workers = num_workers.max(1);
    let forward = Arc::new(KernelForward::new(Arc::clone(&tx_ifaces)));
    let host = Arc::new(KernelHost);
    let workers: Vec<WorkerTx> = (0..num_workers)
        .map(|cpu| spawn_engine_worker(cpu, capt_batch_len, state, Arc::clone(&forward), Arc::clone(&host)))
        .collect();
    info!("spawned {num_workers} engine worker(s) over {} interface(s)", interfaces.len());

    // No socket has issued TX_BIND in this bootstrap (spec.md §1: no wire control-plane here), so
    // every worker starts with an empty assignment list; a future control client's TX_BIND would
    // extend this via `tx_workers`' own API.
    let tx_specs: Vec<tx_workers::WorkerSpec> =
        tx_affinity.iter().map(|&cpu| tx_workers::WorkerSpec { cpu, assignments: Vec::new() }).collect();
    let tx_sink = Arc::new(KernelTxSink::new(Arc::clone(&tx_ifaces)));
    let tx_pool = if tx_specs.is_empty() {
        None
    } else {
        match tx_workers::TxWorkerPool::spawn(tx_specs, xmit_batch_len, tx_sink) {
            Ok(pool) => Some(pool),
            Err(e) => {
                error!("failed to start tx worker pool: {e}");
                None
            }
        }
    };

    let poll_timeout = Some(Duration::from_millis(50));
    let mut events = Events::with_capacity(256);
    while !stop.load(std::sync::atomic::Ordering::Relaxed) {
        if let Err(e) = kiftable.poll.poll(&mut events, poll_timeout) {
            if e.kind() != io::ErrorKind::Interrupted {
                warn!("poll error: {e}");
            }
            continue;
        }
        for event in &events {
            if !event.is_readable() {
                continue;
            }
            let Some(interface) = kiftable.get_mut(event.token()) else {
                continue;
            };
            for pkt in packet_recv(interface) {
                let idx = compute_worker_idx(&pkt, workers.len());
                if let Err(chan::TrySendError::Full(mut pkt) | chan::TrySendError::Disconnected(mut pkt)) =
                    workers[idx].try_send(pkt)
                {
                    warn!("worker {idx} queue full: dropping packet");
                    pkt.done_force(net::packet::DoneReason::InternalFailure);
                }
            }
        }
    }
    if let Some(pool) = tx_pool {
        pool.stop();
        pool.join();
    }
    Ok(())
}
