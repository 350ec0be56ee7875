// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Program evaluation (spec.md §4.4.4).
//!
//! Ground truth: `original_source/kernel/pf_q-functional.c`'s `pfq_bind`/`pfq_apply`. One
//! deliberate simplification, recorded in `DESIGN.md`: the original threads a single mutable
//! `CB.right` flag through every call and has high-order functions lazily evaluate their guarded
//! predicate via the `EVAL_PREDICATE` macro. Predicate evaluation here has no side effects (it
//! only reads the packet), so it is evaluated eagerly, once, right before the node's function
//! runs, and the branch choice is returned by the function itself as part of [`Step`] instead of
//! being threaded through shared mutable state.

use net::buffer::PacketBufferMut;
use net::packet::Packet;

use crate::arg::Arg;
use crate::catalogue::{CombinatorFn, PredicateFn};

/// What a monadic/high-order node's call did to the program counter.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Step {
    /// Keep going: follow `right` if true, `left` if false.
    Continue {
        /// Which successor to follow next.
        right: bool,
    },
    /// Stop evaluating this program right away (the packet's `fanout.action` already reflects
    /// the verdict: `Drop`, `Stop`, or a terminal delivery decision).
    Halt,
}

/// Per-call context passed to every monadic/high-order function.
pub struct NodeCtx<'a> {
    /// The node's own bound argument.
    pub arg: &'a Arg,
    /// For high-order nodes, the (already evaluated) result of the guarding predicate. Plain
    /// monadic nodes ignore this.
    pub predicate: bool,
}

/// A compiled predicate/combinator subtree, evaluated against a packet to a single `bool`.
///
/// Built once per high-order node at compile time (spec.md §4.4.3 step 3: "link ... child
/// predicate pointers").
pub enum CompiledPredicate<Buf: PacketBufferMut> {
    /// A leaf predicate call.
    Leaf {
        /// The resolved predicate implementation.
        func: PredicateFn<Buf>,
        /// The leaf's bound argument.
        arg: Arg,
    },
    /// `and`/`or`/`xor` over two children, or `not` over one (right is then unused).
    Combine {
        /// The fixed logical operator.
        func: CombinatorFn,
        /// Left (or, for `not`, the only) child.
        left: Box<CompiledPredicate<Buf>>,
        /// Right child; absent for `not`.
        right: Option<Box<CompiledPredicate<Buf>>>,
    },
}

impl<Buf: PacketBufferMut> CompiledPredicate<Buf> {
    /// Evaluate this predicate/combinator tree against `pkt`.
    #[must_use]
    pub fn eval(&self, pkt: &Packet<Buf>) -> bool {
        match self {
            CompiledPredicate::Leaf { func, arg } => func(pkt, arg),
            CompiledPredicate::Combine { func, left, right } => {
                let l = left.eval(pkt);
                let r = right.as_ref().is_some_and(|r| r.eval(pkt));
                func(l, r)
            }
        }
    }
}

/// One compiled node: a resolved function plus its successor links.
pub struct CompiledNode<Buf: PacketBufferMut> {
    pub(crate) func: crate::catalogue::MonadicFn<Buf>,
    pub(crate) arg: Arg,
    pub(crate) predicate: Option<CompiledPredicate<Buf>>,
    pub(crate) right: Option<usize>,
    pub(crate) left: Option<usize>,
}

/// A fully compiled, ready-to-run program.
pub struct CompiledProgram<Buf: PacketBufferMut> {
    pub(crate) nodes: Vec<CompiledNode<Buf>>,
    pub(crate) entry_point: usize,
}

impl<Buf: PacketBufferMut> CompiledProgram<Buf> {
    /// Run this program against `pkt`, updating `pkt`'s [`net::packet::PacketMeta`] in place.
    ///
    /// Mirrors `pfq_bind`: each step evaluates the current node; a `Drop`/`Stop` action or
    /// `Step::Halt` ends evaluation immediately; otherwise the next node is `right` or `left`
    /// per the step's outcome, terminating when the chosen successor is absent.
    pub fn eval(&self, pkt: &mut Packet<Buf>) {
        let mut idx = self.entry_point;
        loop {
            let node = &self.nodes[idx];
            let predicate = node.predicate.as_ref().is_some_and(|p| p.eval(pkt));
            let ctx = NodeCtx {
                arg: &node.arg,
                predicate,
            };
            let step = (node.func)(pkt, &ctx);

            let action = pkt.get_meta().fanout.action;
            if action.is_drop() || action.is_stop() {
                return;
            }

            let right = match step {
                Step::Halt => return,
                Step::Continue { right } => right,
            };

            let node = &self.nodes[idx];
            let next = if right { node.right } else { node.left };
            match next {
                Some(n) => idx = n,
                None => return,
            }
        }
    }
}

impl<Buf: PacketBufferMut + Sync + 'static> group::CompiledProgram for CompiledProgram<Buf> {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
