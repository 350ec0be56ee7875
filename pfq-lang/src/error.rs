// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Errors raised while validating, compiling, or resolving a pfq-lang program.

/// A program descriptor failed structural validation.
///
/// Carries the index of the first offending node (spec.md §4.4.2: "Validation returns
/// `EInvalidProgram` with the failing node index").
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("invalid program at node {index}: {reason}")]
pub struct InvalidProgram {
    /// Index of the first descriptor that failed validation.
    pub index: usize,
    /// What about it failed.
    pub reason: ValidationFailure,
}

/// Why a given node failed validation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ValidationFailure {
    /// `entry_point` is out of range, or does not name a monadic/high-order node.
    #[error("entry point is out of range or not monadic/high-order")]
    BadEntryPoint,
    /// A descriptor's `symbol` field is empty.
    #[error("null symbol")]
    NullSymbol,
    /// `arg_ptr`/`arg_size` disagree about whether an argument is present.
    #[error("argument pointer/size mismatch")]
    ArgMismatch,
    /// A high-order node's `pindex` is out of range or does not reference a
    /// predicate/combinator.
    #[error("pindex out of range or not predicate/combinator")]
    BadPindex,
    /// A combinator's `l_index`/`r_index` is out of range or does not reference a
    /// predicate/combinator.
    #[error("combinator child index out of range or not predicate/combinator")]
    BadCombinatorChild,
    /// A monadic/high-order node's `left`/`right` successor does not reference another
    /// monadic/high-order node.
    #[error("successor link does not reference a monadic/high-order node")]
    BadSuccessor,
}

/// Compilation of an already-validated descriptor array failed.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum CompileError {
    /// A descriptor's `symbol` was not found in the relevant catalogue.
    #[error("unresolved symbol at node {index}: {symbol}")]
    UnresolvedSymbol {
        /// The offending node.
        index: usize,
        /// The symbol that failed to resolve.
        symbol: String,
    },
    /// A node's `init` hook returned an error; every node successfully initialized before it
    /// has had its `fini` hook run, in reverse order, before this error is returned.
    #[error("init hook failed at node {index}")]
    InitFailed {
        /// The offending node.
        index: usize,
    },
}
