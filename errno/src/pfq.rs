// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Control-plane error kinds and their mapping onto [`StandardErrno`].
//!
//! The data path never propagates errors (see the crate-level docs); only control-plane
//! operations (join, bind, set-program, enable/disable, ...) return a [`PfqErrorKind`], and only
//! those operations need an errno-shaped representation for interfaces that expect one.

use crate::{EBADF, EBUSY, EEXIST, EINVAL, ENOMEM, EPERM, ERANGE, StandardErrno};

/// The kinds of control-plane error a PFQ-style interface can report.
///
/// These are *kinds*, not numeric codes: the numeric mapping is an implementation detail exposed
/// by [`PfqErrorKind::to_errno`] for interfaces that need to report a POSIX-shaped code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PfqErrorKind {
    /// An option value or configuration value is invalid.
    #[error("invalid argument")]
    Invalid,
    /// The caller is not permitted to perform the requested operation.
    #[error("permission denied")]
    PermissionDenied,
    /// A resource allocation failed (shared memory, batch capacity, symbol table).
    #[error("out of memory")]
    OutOfMemory,
    /// The caller's protocol/ABI version does not match.
    #[error("version mismatch")]
    VersionMismatch,
    /// The operation requires the socket to be enabled, but it is not.
    #[error("socket not enabled")]
    NotEnabled,
    /// The operation requires the socket to be disabled, but it is already enabled.
    #[error("socket already enabled")]
    AlreadyEnabled,
    /// The referenced group does not exist.
    #[error("no such group")]
    NoSuchGroup,
    /// The socket is not joined to the referenced group.
    #[error("not joined to group")]
    NotJoined,
    /// The supplied pfq-lang program failed validation or compilation.
    #[error("bad program")]
    BadProgram,
    /// An argument was malformed or out of range for reasons other than `Invalid`.
    #[error("bad argument")]
    BadArgument,
}

impl PfqErrorKind {
    /// Map this error kind onto the closest [`StandardErrno`] value.
    #[must_use]
    pub const fn to_errno(self) -> StandardErrno {
        match self {
            PfqErrorKind::Invalid => StandardErrno::InvalidArgument,
            PfqErrorKind::PermissionDenied => StandardErrno::PermissionDenied,
            PfqErrorKind::OutOfMemory => StandardErrno::NoMemory,
            PfqErrorKind::VersionMismatch => StandardErrno::InvalidArgument,
            PfqErrorKind::NotEnabled => StandardErrno::BadFileNumber,
            PfqErrorKind::AlreadyEnabled => StandardErrno::FileExists,
            PfqErrorKind::NoSuchGroup => StandardErrno::InvalidArgument,
            PfqErrorKind::NotJoined => StandardErrno::Busy,
            PfqErrorKind::BadProgram => StandardErrno::InvalidArgument,
            PfqErrorKind::BadArgument => StandardErrno::ResultTooLarge,
        }
    }

    /// Map this error kind onto the raw numeric errno value.
    #[must_use]
    pub const fn to_raw(self) -> i32 {
        match self {
            PfqErrorKind::Invalid
            | PfqErrorKind::VersionMismatch
            | PfqErrorKind::NoSuchGroup
            | PfqErrorKind::BadProgram => EINVAL,
            PfqErrorKind::PermissionDenied => EPERM,
            PfqErrorKind::OutOfMemory => ENOMEM,
            PfqErrorKind::NotEnabled => EBADF,
            PfqErrorKind::AlreadyEnabled => EEXIST,
            PfqErrorKind::NotJoined => EBUSY,
            PfqErrorKind::BadArgument => ERANGE,
        }
    }
}

#[cfg(test)]
mod test {
    use super::PfqErrorKind;

    #[test]
    fn maps_to_expected_standard_errno() {
        assert_eq!(
            PfqErrorKind::PermissionDenied.to_raw(),
            crate::EPERM,
            "PermissionDenied should map to EPERM"
        );
        assert_eq!(PfqErrorKind::OutOfMemory.to_raw(), crate::ENOMEM);
    }
}
