// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The two symbol catalogues a program compiles against (spec.md §4.4.3/§4.8).
//!
//! Ground truth: `original_source/kernel/pf_q-functional.c`'s `pfq_computation_compile`, which
//! resolves monadic/high-order symbols against `pfq_monadic_cat` and predicate/combinator
//! symbols against `pfq_predicate_cat`. `symtab::Catalogue` is the generic registry underneath
//! both (C9); this module just picks the concrete function-pointer shapes pfq-lang needs.

use net::buffer::PacketBufferMut;
use net::packet::Packet;
use symtab::Catalogue;

use crate::arg::Arg;
use crate::eval::{NodeCtx, Step};

/// A monadic (or high-order) function: the implementation behind `tcp`, `drop`, `forward`, etc.
///
/// High-order and plain monadic nodes share one function shape and one catalogue, mirroring the
/// original's single `pfq_monadic_cat`: [`NodeCtx::predicate`] carries a high-order node's
/// (eagerly-evaluated) guarding predicate result and is simply unused by plain monadic functions.
pub type MonadicFn<Buf> = fn(&mut Packet<Buf>, &NodeCtx<'_>) -> Step;

/// A leaf predicate: the implementation behind `ip`, `has_port`, `has_addr`, etc.
pub type PredicateFn<Buf> = fn(&Packet<Buf>, &Arg) -> bool;

/// A combinator: `and`/`or`/`xor` take both children; `not` is only ever called with `left` and
/// ignores `right`.
pub type CombinatorFn = fn(left: bool, right: bool) -> bool;

/// The monadic and predicate catalogues, and the fixed combinator table, bundled together.
///
/// One instance is built per dataplane process (spec.md §4.8: "hot-path resolution only happens
/// at program compile time"); every group's compiled program borrows from it.
pub struct Catalogues<Buf: PacketBufferMut + 'static> {
    /// Monadic and high-order functions.
    pub monadic: Catalogue<MonadicFn<Buf>, Arg>,
    /// Leaf predicates.
    pub predicate: Catalogue<PredicateFn<Buf>, Arg>,
}

impl<Buf: PacketBufferMut + 'static> Catalogues<Buf> {
    /// Build empty catalogues. Use [`crate::builtins::register_builtins`] to populate them.
    #[must_use]
    pub fn new() -> Self {
        Self {
            monadic: Catalogue::new("monadic"),
            predicate: Catalogue::new("predicate"),
        }
    }
}

impl<Buf: PacketBufferMut + 'static> Default for Catalogues<Buf> {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve `op` to its fixed implementation. Combinators are a closed set of language
/// primitives, not a symtab extension point (see `descr.rs`'s module doc and `DESIGN.md`).
#[must_use]
pub fn combinator_fn(op: crate::descr::CombinatorOp) -> CombinatorFn {
    use crate::descr::CombinatorOp;
    match op {
        CombinatorOp::And => |l, r| l && r,
        CombinatorOp::Or => |l, r| l || r,
        CombinatorOp::Xor => |l, r| l ^ r,
        CombinatorOp::Not => |l, _r| !l,
    }
}
