// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Process bootstrap helpers (SPEC_FULL.md's ambient-crates table): online-CPU discovery (used
//! to validate `config::Config::tx_affinity` before any Tx worker is pinned) and capability
//! dropping once raw-socket/device setup is done.
//!
//! Scaled down from the teacher workspace's `dataplane-init` binary (which rebinds NIC kernel
//! drivers and mounts hugepage filesystems for a DPDK deployment) to the two bring-up concerns
//! spec.md's non-goals leave for this workspace to still own: "per-CPU bootstrap/teardown
//! plumbing" reduced to just naming which CPUs exist, and least-privilege operation once the
//! process has opened whatever raw sockets or device handles it needs.

#![deny(clippy::all, clippy::pedantic)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

use std::io::Read;

use caps::{CapSet, Capability};
use thiserror::Error;
use tracing::{info, warn};

/// Failure discovering the online CPU set or dropping capabilities.
#[derive(Debug, Error)]
pub enum InitError {
    /// Reading or parsing `/sys/devices/system/cpu/online` failed.
    #[error("failed to read online CPU set: {0}")]
    Sysfs(#[from] sysfs::SysfsErr),
    /// The online CPU set was not valid UTF-8/range syntax.
    #[error("malformed online CPU range: {0:?}")]
    MalformedRange(String),
    /// A `caps` crate operation failed.
    #[error("capability operation failed: {0}")]
    Caps(#[from] caps::errors::CapsError),
}

/// Parse a Linux CPU list range string (e.g. `"0-3,5,7-8"`, the format of
/// `/sys/devices/system/cpu/online`) into a sorted `Vec` of CPU indices.
fn parse_cpu_range(text: &str) -> Result<Vec<usize>, InitError> {
    let mut cpus = Vec::new();
    for part in text.trim().split(',').filter(|p| !p.is_empty()) {
        if let Some((lo, hi)) = part.split_once('-') {
            let lo: usize = lo
                .parse()
                .map_err(|_| InitError::MalformedRange(text.to_owned()))?;
            let hi: usize = hi
                .parse()
                .map_err(|_| InitError::MalformedRange(text.to_owned()))?;
            cpus.extend(lo..=hi);
        } else {
            let cpu: usize = part
                .parse()
                .map_err(|_| InitError::MalformedRange(text.to_owned()))?;
            cpus.push(cpu);
        }
    }
    cpus.sort_unstable();
    Ok(cpus)
}

/// The set of CPUs currently online, read from sysfs.
///
/// # Errors
///
/// Returns [`InitError::Sysfs`] if sysfs is not mounted or the online file cannot be opened, or
/// [`InitError::MalformedRange`] if its contents are not a recognized CPU range list.
pub fn online_cpus() -> Result<Vec<usize>, InitError> {
    let path = sysfs::sysfs_root().relative("devices/system/cpu/online")?;
    let mut file = sysfs::SysfsFile::open(path, std::fs::OpenOptions::new().read(true))?;
    let mut text = String::new();
    file.read_to_string(&mut text)
        .map_err(sysfs::SysfsErr::IoError)?;
    let cpus = parse_cpu_range(&text)?;
    info!("discovered {} online cpu(s): {cpus:?}", cpus.len());
    Ok(cpus)
}

/// Drop every capability except `keep` from the effective, permitted, and inheritable sets.
///
/// Meant to run once, after every raw socket/shared-memory region the process needs has already
/// been opened (capture sockets require `CAP_NET_RAW`; device/queue binding may require
/// `CAP_NET_ADMIN`) and before the hot-path engine loop starts processing untrusted input.
///
/// # Errors
///
/// Returns [`InitError::Caps`] if the capability sets cannot be read or written — typically
/// because the calling process does not hold `CAP_SETPCAP`, or capabilities are not supported on
/// this platform.
pub fn drop_capabilities(keep: &[Capability]) -> Result<(), InitError> {
    let wanted: std::collections::HashSet<Capability> = keep.iter().copied().collect();
    for set in [CapSet::Permitted, CapSet::Effective, CapSet::Inheritable] {
        caps::set(None, set, &wanted)?;
    }
    let dropped: Vec<_> = caps::all()
        .into_iter()
        .filter(|c| !wanted.contains(c))
        .collect();
    warn!("dropped {} capabilit(y/ies), kept {keep:?}", dropped.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_cpu_range;

    #[test]
    fn parses_mixed_ranges_and_singletons() {
        assert_eq!(parse_cpu_range("0-3,5,7-8").unwrap(), vec![0, 1, 2, 3, 5, 7, 8]);
    }

    #[test]
    fn parses_single_cpu() {
        assert_eq!(parse_cpu_range("0").unwrap(), vec![0]);
    }

    #[test]
    fn rejects_malformed_range() {
        assert!(parse_cpu_range("0-,bogus").is_err());
    }
}
