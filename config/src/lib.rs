// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Validated runtime tunables (spec.md §6 "Configuration"): `capt_batch_len`, `xmit_batch_len`,
//! `skb_pool_size`, `tx_thread_nr`/`tx_affinity`, `capture_incoming`/`capture_outgoing`, and
//! `vl_untag`.
//!
//! Mirrors the teacher workspace's `dataplane-config` crate's shape (a plain `Config` struct
//! built through a consuming `set_*` builder, loaded from YAML, validated once at startup) scaled
//! down to the handful of scalars spec.md's Configuration section actually names — this workspace
//! carries no VPC/overlay/routing configuration for this crate to own.

#![deny(clippy::all, clippy::pedantic)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on [`Config::capt_batch_len`] (spec.md §6).
pub const MAX_CAPT_BATCH_LEN: usize = 64;
/// Upper bound on [`Config::xmit_batch_len`] (spec.md §6).
pub const MAX_XMIT_BATCH_LEN: usize = 256;
/// Upper bound on [`Config::skb_pool_size`] (spec.md §6: `[0, MAX_POOL]`).
pub const MAX_POOL: usize = 1 << 16;

/// A rejected tunable: out-of-range value, or a `tx_affinity` pinning conflict.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// `capt_batch_len` is outside `[1, 64]`.
    #[error("capt_batch_len {0} out of range [1, {MAX_CAPT_BATCH_LEN}]")]
    CaptBatchLen(usize),
    /// `xmit_batch_len` is outside `[1, 256]`.
    #[error("xmit_batch_len {0} out of range [1, {MAX_XMIT_BATCH_LEN}]")]
    XmitBatchLen(usize),
    /// `skb_pool_size` is outside `[0, MAX_POOL]`.
    #[error("skb_pool_size {0} out of range [0, {MAX_POOL}]")]
    SkbPoolSize(usize),
    /// `tx_affinity` does not have exactly `tx_thread_nr` entries.
    #[error("tx_affinity has {have} entries, expected tx_thread_nr = {want}")]
    TxAffinityCount {
        /// Entries actually supplied.
        have: usize,
        /// `tx_thread_nr`.
        want: usize,
    },
    /// Two `tx_affinity` entries named the same CPU.
    #[error("tx_affinity cpu {0} is pinned by more than one worker")]
    TxAffinityDuplicate(usize),
    /// A `tx_affinity` entry named a CPU that is not online.
    #[error("tx_affinity cpu {0} is not in the online CPU set")]
    TxAffinityNotOnline(usize),
}

/// Validated tunables for one running engine process (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GC batch capacity per CPU (spec.md §4.1, §6): `[1, 64]`.
    pub capt_batch_len: usize,
    /// Tx flush granularity (spec.md §4.7, §6): `[1, 256]`.
    pub xmit_batch_len: usize,
    /// Recycle pool depth per CPU (spec.md §6): `[0, MAX_POOL]`.
    pub skb_pool_size: usize,
    /// Number of async Tx worker threads (spec.md §4.7).
    pub tx_thread_nr: usize,
    /// CPU pinning for each of the `tx_thread_nr` async Tx workers, in worker order.
    pub tx_affinity: Vec<usize>,
    /// Gate: capture frames received on an interface.
    pub capture_incoming: bool,
    /// Gate: capture frames transmitted out an interface (loopback of outbound traffic).
    pub capture_outgoing: bool,
    /// Strip a VLAN tag on capture and re-inline it into the Rx slot payload on delivery
    /// (spec.md §4.5 step 3, §6).
    pub vl_untag: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capt_batch_len: 64,
            xmit_batch_len: 256,
            skb_pool_size: 4096,
            tx_thread_nr: 0,
            tx_affinity: Vec::new(),
            capture_incoming: true,
            capture_outgoing: false,
            vl_untag: true,
        }
    }
}

impl Config {
    /// Start from [`Config::default`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override `capt_batch_len`.
    #[must_use]
    pub fn set_capt_batch_len(mut self, value: usize) -> Self {
        self.capt_batch_len = value;
        self
    }

    /// Override `xmit_batch_len`.
    #[must_use]
    pub fn set_xmit_batch_len(mut self, value: usize) -> Self {
        self.xmit_batch_len = value;
        self
    }

    /// Override `skb_pool_size`.
    #[must_use]
    pub fn set_skb_pool_size(mut self, value: usize) -> Self {
        self.skb_pool_size = value;
        self
    }

    /// Override the Tx worker count and its CPU pinning together.
    #[must_use]
    pub fn set_tx_workers(mut self, affinity: Vec<usize>) -> Self {
        self.tx_thread_nr = affinity.len();
        self.tx_affinity = affinity;
        self
    }

    /// Override the ingress direction gates.
    #[must_use]
    pub fn set_capture_directions(mut self, incoming: bool, outgoing: bool) -> Self {
        self.capture_incoming = incoming;
        self.capture_outgoing = outgoing;
        self
    }

    /// Override `vl_untag`.
    #[must_use]
    pub fn set_vl_untag(mut self, value: bool) -> Self {
        self.vl_untag = value;
        self
    }

    /// Parse a YAML document into a `Config`. Does not validate; call [`Config::validate`]
    /// separately once the online CPU set is known.
    ///
    /// # Errors
    ///
    /// Returns a YAML parse error wrapped in [`ConfigError`]'s `Display` via the caller.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml_ng::Error> {
        serde_yaml_ng::from_str(text)
    }

    /// Read and parse a YAML config file from `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if `path` cannot be read, or a YAML parse error if its contents are
    /// malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_yaml(&text)?)
    }

    /// Validate every tunable against spec.md §6's ranges, and `tx_affinity` against the
    /// process's online CPU set.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered.
    pub fn validate(&self, online_cpus: &[usize]) -> Result<(), ConfigError> {
        if !(1..=MAX_CAPT_BATCH_LEN).contains(&self.capt_batch_len) {
            return Err(ConfigError::CaptBatchLen(self.capt_batch_len));
        }
        if !(1..=MAX_XMIT_BATCH_LEN).contains(&self.xmit_batch_len) {
            return Err(ConfigError::XmitBatchLen(self.xmit_batch_len));
        }
        if self.skb_pool_size > MAX_POOL {
            return Err(ConfigError::SkbPoolSize(self.skb_pool_size));
        }
        if self.tx_affinity.len() != self.tx_thread_nr {
            return Err(ConfigError::TxAffinityCount {
                have: self.tx_affinity.len(),
                want: self.tx_thread_nr,
            });
        }
        for (i, cpu) in self.tx_affinity.iter().enumerate() {
            if self.tx_affinity[..i].contains(cpu) {
                return Err(ConfigError::TxAffinityDuplicate(*cpu));
            }
            if !online_cpus.contains(cpu) {
                return Err(ConfigError::TxAffinityNotOnline(*cpu));
            }
        }
        Ok(())
    }
}

/// Failure loading a [`Config`] from a file.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// The file could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The file's contents are not valid YAML for [`Config`].
    #[error(transparent)]
    Yaml(#[from] serde_yaml_ng::Error),
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigError, MAX_CAPT_BATCH_LEN, MAX_XMIT_BATCH_LEN};

    #[test]
    fn defaults_validate_with_no_tx_workers() {
        let config = Config::default();
        assert!(config.validate(&[]).is_ok());
    }

    #[test]
    fn rejects_capt_batch_len_out_of_range() {
        let config = Config::new().set_capt_batch_len(0);
        assert_eq!(config.validate(&[]), Err(ConfigError::CaptBatchLen(0)));

        let config = Config::new().set_capt_batch_len(MAX_CAPT_BATCH_LEN + 1);
        assert_eq!(
            config.validate(&[]),
            Err(ConfigError::CaptBatchLen(MAX_CAPT_BATCH_LEN + 1))
        );
    }

    #[test]
    fn rejects_xmit_batch_len_out_of_range() {
        let config = Config::new().set_xmit_batch_len(MAX_XMIT_BATCH_LEN + 1);
        assert_eq!(
            config.validate(&[]),
            Err(ConfigError::XmitBatchLen(MAX_XMIT_BATCH_LEN + 1))
        );
    }

    #[test]
    fn rejects_duplicate_tx_affinity() {
        let config = Config::new().set_tx_workers(vec![0, 1, 0]);
        assert_eq!(
            config.validate(&[0, 1, 2]),
            Err(ConfigError::TxAffinityDuplicate(0))
        );
    }

    #[test]
    fn rejects_tx_affinity_not_online() {
        let config = Config::new().set_tx_workers(vec![0, 7]);
        assert_eq!(
            config.validate(&[0, 1, 2]),
            Err(ConfigError::TxAffinityNotOnline(7))
        );
    }

    #[test]
    fn round_trips_through_yaml() {
        let config = Config::new()
            .set_capt_batch_len(32)
            .set_tx_workers(vec![1, 2])
            .set_vl_untag(false);
        let text = serde_yaml_ng::to_string(&config).unwrap();
        let parsed = Config::from_yaml(&text).unwrap();
        assert_eq!(parsed.capt_batch_len, 32);
        assert_eq!(parsed.tx_affinity, vec![1, 2]);
        assert!(!parsed.vl_untag);
    }
}
