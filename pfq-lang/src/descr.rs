// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The uncompiled program representation: a flat array of [`FunctionalDescr`] nodes plus an
//! entry point, exactly as handed down by a `GROUP_FUNCTION` control message (spec.md §4.4.1).
//!
//! Ground truth: `original_source/kernel/pf_q-functional.c`'s `pfq_computation_descr`/
//! `pfq_functional_descr`. Two deliberate departures from the raw C layout, both recorded in
//! `DESIGN.md`:
//!
//! - A high-order node's `pindex` gets its own named field rather than silently reusing
//!   `arg_size` (the original's `size_t pindex = descr->fun[n].arg_size;`).
//! - A combinator's `symbol` is folded into a closed [`CombinatorOp`] enum instead of going
//!   through the dynamic predicate catalogue: `and`/`or`/`xor`/`not` are fixed language
//!   primitives, not an extension point real programs redefine.

use crate::arg::Arg;

/// One node of a pfq-lang program (spec.md §4.4.1: "four kinds").
#[derive(Debug, Clone)]
pub enum FunctionalDescr {
    /// `SkBuff -> Action SkBuff`. May carry a POD argument.
    Monadic {
        /// Name resolved against the monadic catalogue.
        symbol: String,
        /// The node's bound argument, if any.
        arg: Arg,
        /// Successor index taken when `CB.right` is true.
        right: Option<usize>,
        /// Successor index taken when `CB.right` is false.
        left: Option<usize>,
    },
    /// `(... -> Predicate) -> SkBuff -> Action SkBuff`. Carries an index to a predicate node.
    ///
    /// The original C descriptor overloads a single `arg_size` field to carry `pindex`, since a
    /// node has only one generic argument slot (`DESIGN.md`). A Rust enum variant isn't limited
    /// to one field, so high-order nodes that also need data of their own (`tee`/`tap`'s target
    /// device, alongside their guarding predicate) carry both explicitly instead of losing one.
    HighOrder {
        /// Name resolved against the monadic catalogue.
        symbol: String,
        /// Index of the predicate/combinator node this function evaluates.
        pindex: usize,
        /// The node's own bound argument, if any (e.g. `tee`/`tap`'s target device).
        arg: Arg,
        /// Successor index taken when `CB.right` is true.
        right: Option<usize>,
        /// Successor index taken when `CB.right` is false.
        left: Option<usize>,
    },
    /// `SkBuff -> Bool`. May carry a POD argument.
    Predicate {
        /// Name resolved against the predicate catalogue.
        symbol: String,
        /// The node's bound argument, if any.
        arg: Arg,
    },
    /// `(Bool, Bool) -> Bool`, or unary `not`.
    Combinator {
        /// Which fixed logical operator this node applies.
        op: CombinatorOp,
        /// Index of the left (or, for `not`, the only) child predicate/combinator node.
        l_index: usize,
        /// Index of the right child predicate/combinator node. Always `None` for `not`.
        r_index: Option<usize>,
    },
}

impl FunctionalDescr {
    /// True for the two kinds `entry_point` and successor links may reference
    /// (spec.md §4.4.2: "monadic/high-order").
    #[must_use]
    pub fn is_monadic_kind(&self) -> bool {
        matches!(self, FunctionalDescr::Monadic { .. } | FunctionalDescr::HighOrder { .. })
    }

    /// True for the two kinds a `pindex`/`l_index`/`r_index` link may reference
    /// (spec.md §4.4.2: "predicate/combinator").
    #[must_use]
    pub fn is_predicate_kind(&self) -> bool {
        matches!(self, FunctionalDescr::Predicate { .. } | FunctionalDescr::Combinator { .. })
    }
}

/// The four fixed logical combinators (spec.md §4.4.5).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CombinatorOp {
    /// Logical AND of both children.
    And,
    /// Logical OR of both children.
    Or,
    /// Logical XOR of both children.
    Xor,
    /// Logical negation of the (only) child.
    Not,
}

/// A whole uncompiled program: the flat node array plus its entry point.
#[derive(Debug, Clone)]
pub struct ProgramDescr {
    /// Every node of the program, in descriptor order.
    pub nodes: Vec<FunctionalDescr>,
    /// Index, into `nodes`, of the first node `eval` calls.
    pub entry_point: usize,
}
