// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! pfq-lang (C5): the small typed functional language programs compile to before they run
//! against every captured packet (spec.md §4.4).
//!
//! A program is handed down as a flat [`descr::ProgramDescr`] (one [`descr::FunctionalDescr`]
//! per node), [`validate::validate`]d for structural well-formedness, then [`compile::compile`]d
//! against a process-wide [`catalogue::Catalogues`] into a [`eval::CompiledProgram`] a group can
//! install and the engine (C7) can run per packet via [`eval::CompiledProgram::eval`].
//!
//! [`builtins::register_builtins`] populates the catalogues with every symbol spec.md §4.4.5
//! names; `arg::Arg` and `bloom::BloomFilter` are the node-argument and bloom-predicate support
//! types those built-ins close over.

#![deny(clippy::all, clippy::pedantic)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod arg;
pub mod bloom;
pub mod builtins;
pub mod catalogue;
pub mod compile;
pub mod descr;
pub mod error;
pub mod eval;
pub mod validate;

use tracectl::trace_target;
use tracing::LevelFilter;

trace_target!("pfq-lang", LevelFilter::INFO, &["pfq-lang"]);

pub use arg::Arg;
pub use catalogue::Catalogues;
pub use compile::compile;
pub use descr::{CombinatorOp, FunctionalDescr, ProgramDescr};
pub use error::{CompileError, InvalidProgram, ValidationFailure};
pub use eval::{CompiledProgram, Step};
pub use validate::validate;

#[cfg(test)]
mod test {
    use super::{Arg, CombinatorOp, Catalogues, FunctionalDescr, ProgramDescr, compile, validate};
    use crate::builtins::register_builtins;
    use net::buffer::TestBuffer;
    use net::packet::test_utils::build_test_udp_ipv4_packet;

    /// Build `udp |> drop` (unconditionally classify then drop non-UDP) against a UDP packet,
    /// exercising the full validate → compile → eval pipeline end to end.
    #[test]
    fn udp_then_drop_runs_end_to_end() {
        let descr = ProgramDescr {
            nodes: vec![
                FunctionalDescr::Monadic {
                    symbol: "udp".to_string(),
                    arg: Arg::None,
                    right: Some(1),
                    left: None,
                },
                FunctionalDescr::Monadic {
                    symbol: "drop".to_string(),
                    arg: Arg::None,
                    right: None,
                    left: None,
                },
            ],
            entry_point: 0,
        };
        validate(&descr).expect("program should validate");

        let catalogues: Catalogues<TestBuffer> = Catalogues::new();
        register_builtins(&catalogues);
        let program = compile(&descr, &catalogues).expect("program should compile");

        let mut pkt = build_test_udp_ipv4_packet("10.0.0.1", "10.0.0.2", 1, 2);
        program.eval(&mut pkt);
        assert!(pkt.get_meta().fanout.action.is_drop());
    }

    /// A program referencing an unregistered symbol fails compilation, not validation.
    #[test]
    fn unresolved_symbol_fails_at_compile_time() {
        let descr = ProgramDescr {
            nodes: vec![FunctionalDescr::Monadic {
                symbol: "not_a_real_symbol".to_string(),
                arg: Arg::None,
                right: None,
                left: None,
            }],
            entry_point: 0,
        };
        validate(&descr).expect("program should validate");

        let catalogues: Catalogues<TestBuffer> = Catalogues::new();
        register_builtins(&catalogues);
        assert!(compile(&descr, &catalogues).is_err());
    }

    /// `tcp and udp |> drop` steers through a high-order node's combinator tree correctly.
    #[test]
    fn high_order_node_evaluates_combinator_guard() {
        let descr = ProgramDescr {
            nodes: vec![
                FunctionalDescr::HighOrder {
                    symbol: "tee".to_string(),
                    pindex: 1,
                    arg: Arg::Device {
                        ifindex: 9,
                        queue: None,
                    },
                    right: None,
                    left: None,
                },
                FunctionalDescr::Combinator {
                    op: CombinatorOp::And,
                    l_index: 2,
                    r_index: Some(3),
                },
                FunctionalDescr::Predicate {
                    symbol: "ip".to_string(),
                    arg: Arg::None,
                },
                FunctionalDescr::Predicate {
                    symbol: "udp".to_string(),
                    arg: Arg::None,
                },
            ],
            entry_point: 0,
        };
        validate(&descr).expect("program should validate");

        let catalogues: Catalogues<TestBuffer> = Catalogues::new();
        register_builtins(&catalogues);
        let program = compile(&descr, &catalogues).expect("program should compile");

        let mut pkt = build_test_udp_ipv4_packet("10.0.0.1", "10.0.0.2", 1, 2);
        program.eval(&mut pkt);
        assert_eq!(pkt.get_meta().fwd_log.num_targets(), 1);
        assert!(!pkt.get_meta().fanout.action.is_drop());
    }
}
