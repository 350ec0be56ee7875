// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Compiles validated pfq-lang programs and installs them onto a group (spec.md §4.4.5, §6
//! `GROUP_FUNCTION`).
//!
//! `socket::SocketTable::apply` stops at `SockOptResult::ValidatedProgram`: the control-plane
//! crate validates a descriptor but has no notion of the concrete packet buffer type the data
//! path runs against, so it hands the descriptor back to its caller. `ProgramRegistry` is that
//! caller: it owns the one process-wide [`pfq_lang::Catalogues`] every program compiles against
//! (spec.md §4.4.5: "the only place in the process that ever calls `Catalogue::register`") and
//! bridges `SocketTable::apply`'s result to [`group::GroupTable::set_program`].

use std::sync::Arc;

use group::GroupTable;
use net::buffer::PacketBufferMut;
use pfq_lang::{CompileError, Catalogues, ProgramDescr};
use socket::SockOptResult;
use thiserror::Error;

/// Failure compiling or installing a validated program.
#[derive(Debug, Error)]
pub enum ProgramError {
    /// `pfq_lang::compile` rejected the descriptor.
    #[error("program failed to compile: {0}")]
    Compile(#[from] CompileError),
    /// The group named by the descriptor no longer exists.
    #[error("group vanished between validation and install: {0}")]
    GroupGone(#[from] group::GroupError),
}

/// Owns the catalogues every compiled program links against, and wires `socket`'s validated
/// descriptors onto `group`'s program slot.
pub struct ProgramRegistry<Buf: PacketBufferMut + Sync + 'static> {
    catalogues: Catalogues<Buf>,
    groups: Arc<GroupTable>,
}

impl<Buf: PacketBufferMut + Sync + 'static> ProgramRegistry<Buf> {
    /// Build a registry with every built-in symbol already registered.
    #[must_use]
    pub fn new(groups: Arc<GroupTable>) -> Self {
        let catalogues = Catalogues::new();
        pfq_lang::builtins::register_builtins(&catalogues);
        Self { catalogues, groups }
    }

    /// Compile `descr` and install it as `gid`'s program, replacing whatever program (if any) was
    /// previously installed.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::Compile`] if the descriptor references an unresolved symbol or a
    /// node fails its `init` hook, or [`ProgramError::GroupGone`] if `gid` no longer exists.
    pub fn install(&self, gid: group::GroupId, descr: &ProgramDescr) -> Result<(), ProgramError> {
        let compiled = pfq_lang::compile(descr, &self.catalogues)?;
        self.groups
            .set_program(gid, Some(Arc::new(compiled)))
            .map_err(ProgramError::from)
    }

    /// Clear `gid`'s installed program, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::GroupGone`] if `gid` no longer exists.
    pub fn clear(&self, gid: group::GroupId) -> Result<(), ProgramError> {
        self.groups.set_program(gid, None).map_err(ProgramError::from)
    }

    /// Compile and install straight from a `socket::SocketTable::apply` result, ignoring any
    /// other `SockOptResult` variant (the caller is expected to have already matched on the
    /// option it issued; this is a convenience for `GROUP_FUNCTION`'s specific result shape).
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError`] as [`ProgramRegistry::install`] does. Returns `Ok(())` without
    /// installing anything if `result` is not [`SockOptResult::ValidatedProgram`].
    pub fn install_from_sockopt_result(&self, result: &SockOptResult) -> Result<(), ProgramError> {
        if let SockOptResult::ValidatedProgram(gid, descr) = result {
            self.install(*gid, descr)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use devmap::DevMap;
    use group::{GroupTable, Policy};
    use net::buffer::TestBuffer;
    use pfq_lang::{CombinatorOp, FunctionalDescr, ProgramDescr};
    use socket::{GroupJoinArgs, SockOpt, SocketTable};

    use super::ProgramRegistry;

    #[test]
    fn installs_a_validated_udp_drop_program() {
        let groups = Arc::new(GroupTable::new(1));
        let devmap = Arc::new(DevMap::new(4, 4));
        let sockets = SocketTable::new(Arc::clone(&groups), Arc::clone(&devmap));
        let registry: ProgramRegistry<TestBuffer> = ProgramRegistry::new(Arc::clone(&groups));

        let socket = sockets.open();
        let joined = sockets
            .apply(
                socket.id(),
                SockOpt::GroupJoin(GroupJoinArgs {
                    gid: None,
                    class_mask: 1,
                    policy: Policy::Shared,
                }),
            )
            .unwrap();
        let socket::SockOptResult::GroupJoined(gid) = joined else {
            panic!("expected GroupJoined");
        };

        let descr = ProgramDescr {
            entry_point: 0,
            nodes: vec![
                FunctionalDescr::Monadic {
                    symbol: "udp".to_string(),
                    arg: pfq_lang::Arg::None,
                    right: Some(1),
                    left: None,
                },
                FunctionalDescr::Monadic {
                    symbol: "drop".to_string(),
                    arg: pfq_lang::Arg::None,
                    right: None,
                    left: None,
                },
            ],
        };

        let result = sockets
            .apply(socket.id(), SockOpt::GroupFunction(gid, descr))
            .unwrap();
        registry.install_from_sockopt_result(&result).unwrap();

        let group = groups.get(gid).unwrap();
        assert!(group.program().is_some());
    }

    #[test]
    fn unresolved_symbol_surfaces_compile_error() {
        let groups = Arc::new(GroupTable::new(1));
        let registry: ProgramRegistry<TestBuffer> = ProgramRegistry::new(Arc::clone(&groups));
        let devmap = Arc::new(DevMap::new(4, 4));
        let sockets = SocketTable::new(Arc::clone(&groups), devmap);
        let socket = sockets.open();
        let joined = sockets
            .apply(
                socket.id(),
                SockOpt::GroupJoin(GroupJoinArgs {
                    gid: None,
                    class_mask: 1,
                    policy: Policy::Shared,
                }),
            )
            .unwrap();
        let socket::SockOptResult::GroupJoined(gid) = joined else {
            panic!("expected GroupJoined");
        };
        let descr = ProgramDescr {
            entry_point: 0,
            nodes: vec![FunctionalDescr::Monadic {
                symbol: "no_such_symbol".to_string(),
                arg: pfq_lang::Arg::None,
                right: None,
                left: None,
            }],
        };
        let result = sockets
            .apply(socket.id(), SockOpt::GroupFunction(gid, descr))
            .unwrap();
        let err = registry.install_from_sockopt_result(&result).unwrap_err();
        assert!(matches!(err, super::ProgramError::Compile(_)));
    }

    #[allow(dead_code)]
    fn unused_combinator_op_reference(_: CombinatorOp) {}
}
