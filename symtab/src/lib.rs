// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The pfq-lang symbol table (C9): a registry of named function implementations, keyed by UTF-8
//! name, each carrying optional `init`/`fini` hooks.
//!
//! This crate is deliberately generic over the function-pointer type `F` and the per-node
//! argument type `A` a catalogue binds against: it has no notion of `SkBuff`, predicates, or
//! actions. The pfq-lang crate instantiates two [`Catalogue`]s — one for monadic/high-order
//! functions, one for predicates/combinators — over its own concrete types.
//!
//! Registration takes a reader-writer lock; resolution also takes the read lock, but only ever
//! happens once per program compilation, never per packet (spec.md §4.8/§5).

#![deny(clippy::all, clippy::pedantic)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

use concurrency::sync::RwLock;
use std::collections::HashMap;
use tracectl::trace_target;
use tracing::LevelFilter;

trace_target!("symtab", LevelFilter::INFO, &["pfq-lang"]);

/// Errors a catalogue operation can return.
#[derive(Debug, thiserror::Error)]
pub enum SymtabError {
    /// No entry is registered under this name in this catalogue.
    #[error("unresolved symbol: {0}")]
    Unresolved(String),
    /// An entry is already registered under this name.
    #[error("symbol already registered: {0}")]
    AlreadyRegistered(String),
}

/// One registered symbol: its implementation function, plus optional lifecycle hooks run over a
/// node's bound argument value `A` at program compile/teardown time.
#[derive(Copy, Clone)]
pub struct Registration<F: Copy, A> {
    /// The callable this symbol resolves to.
    pub func: F,
    /// Optional hook run once, when a node referencing this symbol is compiled into a program.
    pub init: Option<fn(&mut A) -> Result<(), SymtabError>>,
    /// Optional hook run once per successfully-`init`-ed node, in reverse compile order, on
    /// program teardown or on a failed compile (spec.md §4.4.3 step 4).
    pub fin: Option<fn(&mut A)>,
}

impl<F: Copy, A> Registration<F, A> {
    /// Build a registration with no lifecycle hooks.
    #[must_use]
    pub fn simple(func: F) -> Self {
        Self {
            func,
            init: None,
            fin: None,
        }
    }
}

/// A named catalogue of symbols sharing implementation shape `F` and argument type `A`.
pub struct Catalogue<F: Copy + 'static, A: 'static> {
    name: &'static str,
    entries: RwLock<HashMap<String, Registration<F, A>>>,
}

impl<F: Copy, A> Catalogue<F, A> {
    /// Create an empty, named catalogue (e.g. `"monadic"` or `"predicate"`).
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register `registration` under `symbol`.
    ///
    /// # Errors
    ///
    /// Returns [`SymtabError::AlreadyRegistered`] if `symbol` is already present.
    pub fn register(
        &self,
        symbol: &str,
        registration: Registration<F, A>,
    ) -> Result<(), SymtabError> {
        let mut guard = self.entries.write().unwrap_or_else(|p| p.into_inner());
        if guard.contains_key(symbol) {
            return Err(SymtabError::AlreadyRegistered(symbol.to_owned()));
        }
        guard.insert(symbol.to_owned(), registration);
        tracing::debug!(catalogue = self.name, symbol, "symbol registered");
        Ok(())
    }

    /// Remove the registration for `symbol`, if any.
    pub fn unregister(&self, symbol: &str) {
        let mut guard = self.entries.write().unwrap_or_else(|p| p.into_inner());
        guard.remove(symbol);
    }

    /// Resolve `symbol` to its registration. Called only at program compile time.
    ///
    /// # Errors
    ///
    /// Returns [`SymtabError::Unresolved`] if no such symbol is registered.
    pub fn resolve(&self, symbol: &str) -> Result<Registration<F, A>, SymtabError> {
        let guard = self.entries.read().unwrap_or_else(|p| p.into_inner());
        guard
            .get(symbol)
            .copied()
            .ok_or_else(|| SymtabError::Unresolved(symbol.to_owned()))
    }

    /// Number of symbols currently registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// True iff no symbols are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::{Catalogue, Registration, SymtabError};

    type TestFn = fn(u32) -> u32;

    #[test]
    fn register_then_resolve_round_trips() {
        let cat: Catalogue<TestFn, ()> = Catalogue::new("test");
        cat.register("double", Registration::simple(|x| x * 2))
            .unwrap();
        let reg = cat.resolve("double").unwrap();
        assert_eq!((reg.func)(21), 42);
    }

    #[test]
    fn resolving_unknown_symbol_errors() {
        let cat: Catalogue<TestFn, ()> = Catalogue::new("test");
        assert!(matches!(
            cat.resolve("nope"),
            Err(SymtabError::Unresolved(_))
        ));
    }

    #[test]
    fn double_registration_rejected() {
        let cat: Catalogue<TestFn, ()> = Catalogue::new("test");
        cat.register("id", Registration::simple(|x| x)).unwrap();
        assert!(matches!(
            cat.register("id", Registration::simple(|x| x)),
            Err(SymtabError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn unregister_then_resolve_fails() {
        let cat: Catalogue<TestFn, ()> = Catalogue::new("test");
        cat.register("id", Registration::simple(|x| x)).unwrap();
        cat.unregister("id");
        assert!(cat.resolve("id").is_err());
        assert!(cat.is_empty());
    }
}
