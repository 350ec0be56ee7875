// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Command-line surface for the `dataplane` binary.
//!
//! Everything here either overrides a [`config::Config`] field for a single run or controls
//! bring-up (driver, interfaces, metrics bind address, tracing). Values that persist across runs
//! belong in a config file loaded through `config::Config::from_file`, not here.

pub use clap::Parser;
use std::net::SocketAddr;

/// Which capture/injection driver the engine workers read from and write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Driver {
    /// AF_PACKET raw sockets, one per interface, dispatched to worker threads by flow hash.
    Kernel,
    /// DPDK poll-mode ingress. Retained as an alternative engine ingress driver; not wired up by
    /// this workspace.
    Dpdk,
}

#[derive(Parser)]
#[command(name = "pfq-dataplane")]
#[command(version = "1.0")]
#[command(
    about = "A userspace packet capture/filtering/injection dataplane",
    long_about = None
)]
#[allow(clippy::struct_excessive_bools)]
pub struct CmdArgs {
    /// Path to a YAML config file (see `dataplane-config`). CLI flags below override whatever
    /// it sets.
    #[arg(long, value_name = "PATH")]
    config: Option<String>,

    /// Packet driver to use.
    #[arg(long, value_enum, default_value_t = Driver::Kernel)]
    driver: Driver,

    #[arg(
        long,
        value_name = "interface name",
        value_delimiter = ',',
        help = "Interface to capture on and inject into. May be repeated or comma-separated.
E.g. --interface eth0 --interface eth1, or --interface eth0,eth1"
    )]
    interface: Vec<String>,

    /// Override `config::Config::capt_batch_len`.
    #[arg(long, value_name = "N")]
    capt_batch_len: Option<usize>,

    /// Override `config::Config::xmit_batch_len`.
    #[arg(long, value_name = "N")]
    xmit_batch_len: Option<usize>,

    /// Override `config::Config::skb_pool_size`.
    #[arg(long, value_name = "N")]
    skb_pool_size: Option<usize>,

    /// Override `config::Config::tx_affinity`: CPU indices to pin Tx worker threads to.
    #[arg(long, value_name = "CPU", value_delimiter = ',')]
    tx_affinity: Vec<usize>,

    /// Capture packets received by the kernel on the wire.
    #[arg(long, default_value_t = true, overrides_with = "no_capture_incoming")]
    capture_incoming: bool,
    #[arg(long, hide = true)]
    no_capture_incoming: bool,

    /// Also capture packets the host itself transmits.
    #[arg(long, default_value_t = false)]
    capture_outgoing: bool,

    /// Strip 802.1Q/802.1ad tags before classification.
    #[arg(long, default_value_t = true, overrides_with = "no_vl_untag")]
    vl_untag: bool,
    #[arg(long, hide = true)]
    no_vl_untag: bool,

    /// Prometheus metrics server bind address.
    #[arg(
        long,
        value_name = "ADDRESS",
        default_value_t = SocketAddr::from(([127, 0, 0, 1], 9090)),
        help = "Bind address and port for the Prometheus /metrics HTTP endpoint"
    )]
    metrics_address: SocketAddr,

    #[arg(long, default_value_t = false, help = "Show the available tracing tags and exit")]
    show_tracing_tags: bool,

    #[arg(
        long,
        default_value_t = false,
        help = "Show configurable tracing targets and exit"
    )]
    show_tracing_targets: bool,

    #[arg(long, help = "Generate tracing configuration as a string and exit")]
    tracing_config_generate: bool,

    #[arg(
        long,
        value_name = "tracing configuration",
        help = "Tracing config string as comma-separated sequence of tag=level, with level one in [off,error,warn,info,debug,trace].
Passing default=level sets the default log-level.
Passing all=level allows setting the log-level of all targets to level.
E.g. default=error,all=info,stats=debug will set the default target to error, and all the registered targets to info, but enable debug for stats"
    )]
    tracing: Option<String>,
}

impl CmdArgs {
    /// Path to a config file override, if one was given.
    #[must_use]
    pub fn config_path(&self) -> Option<&str> {
        self.config.as_deref()
    }

    #[must_use]
    pub fn driver(&self) -> Driver {
        self.driver
    }

    #[must_use]
    pub fn interfaces(&self) -> &[String] {
        &self.interface
    }

    #[must_use]
    pub fn capt_batch_len(&self) -> Option<usize> {
        self.capt_batch_len
    }

    #[must_use]
    pub fn xmit_batch_len(&self) -> Option<usize> {
        self.xmit_batch_len
    }

    #[must_use]
    pub fn skb_pool_size(&self) -> Option<usize> {
        self.skb_pool_size
    }

    /// `Some` only when the flag was actually used (clap gives us no other way to distinguish
    /// "not passed" from "passed empty" for a `Vec`, so callers that want the override treat an
    /// empty vec as "not set").
    #[must_use]
    pub fn tx_affinity(&self) -> Option<&[usize]> {
        if self.tx_affinity.is_empty() {
            None
        } else {
            Some(&self.tx_affinity)
        }
    }

    #[must_use]
    pub fn capture_incoming(&self) -> bool {
        self.capture_incoming && !self.no_capture_incoming
    }

    #[must_use]
    pub fn capture_outgoing(&self) -> bool {
        self.capture_outgoing
    }

    #[must_use]
    pub fn vl_untag(&self) -> bool {
        self.vl_untag && !self.no_vl_untag
    }

    #[must_use]
    pub fn metrics_address(&self) -> SocketAddr {
        self.metrics_address
    }

    #[must_use]
    pub fn show_tracing_tags(&self) -> bool {
        self.show_tracing_tags
    }

    #[must_use]
    pub fn show_tracing_targets(&self) -> bool {
        self.show_tracing_targets
    }

    #[must_use]
    pub fn tracing_config_generate(&self) -> bool {
        self.tracing_config_generate
    }

    #[must_use]
    pub fn tracing(&self) -> Option<&str> {
        self.tracing.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::{CmdArgs, Driver, Parser};

    #[test]
    fn parses_interface_list() {
        let args = CmdArgs::parse_from(["pfq-dataplane", "--interface", "eth0,eth1"]);
        assert_eq!(args.interfaces(), ["eth0", "eth1"]);
    }

    #[test]
    fn defaults_to_kernel_driver_and_incoming_capture() {
        let args = CmdArgs::parse_from(["pfq-dataplane"]);
        assert_eq!(args.driver(), Driver::Kernel);
        assert!(args.capture_incoming());
        assert!(!args.capture_outgoing());
        assert!(args.vl_untag());
    }

    #[test]
    fn negation_flags_override_defaults() {
        let args = CmdArgs::parse_from(["pfq-dataplane", "--no-capture-incoming", "--no-vl-untag"]);
        assert!(!args.capture_incoming());
        assert!(!args.vl_untag());
    }

    #[test]
    fn empty_tx_affinity_is_none() {
        let args = CmdArgs::parse_from(["pfq-dataplane"]);
        assert!(args.tx_affinity().is_none());
    }
}
