// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Compilation of a validated [`ProgramDescr`] into a runnable [`CompiledProgram`]
//! (spec.md §4.4.3).
//!
//! Ground truth: `original_source/kernel/pf_q-functional.c`'s `pfq_computation_compile`. Two
//! departures from the raw arena design, both recorded in `DESIGN.md`:
//!
//! - There is no contiguous POD context arena; each node simply owns a typed [`Arg`] (see
//!   `arg.rs`). This sidesteps `pfq_context_alloc`'s undersized-allocation bug by construction.
//! - Only nodes reachable as program steps (monadic/high-order) are stored in
//!   [`CompiledProgram::nodes`]; predicate/combinator subtrees are compiled inline into each
//!   high-order node's [`CompiledPredicate`] instead of occupying a parallel slot, so successor
//!   indices are remapped through a dense index rather than left sparse.

use net::buffer::PacketBufferMut;
use symtab::Catalogue;

use crate::arg::Arg;
use crate::catalogue::{Catalogues, combinator_fn};
use crate::descr::{FunctionalDescr, ProgramDescr};
use crate::error::CompileError;
use crate::eval::{CompiledNode, CompiledPredicate, CompiledProgram};

/// Compile `descr` against `catalogues`.
///
/// # Panics
///
/// Assumes `descr` already passed [`crate::validate::validate`]: out-of-range or mis-kinded
/// indices will panic rather than return an error, since validation is the contract's only
/// enforcement point for index well-formedness (spec.md §4.4.2/§4.4.3 are sequential phases).
///
/// # Errors
///
/// Returns [`CompileError::UnresolvedSymbol`] if a node's symbol isn't registered in the
/// relevant catalogue, or [`CompileError::InitFailed`] if a node's `init` hook fails — in which
/// case every node successfully initialized before it has its `fin` hook run, in reverse order,
/// before this returns (spec.md §4.4.3 step 4).
pub fn compile<Buf: PacketBufferMut + 'static>(
    descr: &ProgramDescr,
    catalogues: &Catalogues<Buf>,
) -> Result<CompiledProgram<Buf>, CompileError> {
    let mut index_map: Vec<Option<usize>> = vec![None; descr.nodes.len()];
    let mut order = Vec::new();
    for (i, node) in descr.nodes.iter().enumerate() {
        if node.is_monadic_kind() {
            index_map[i] = Some(order.len());
            order.push(i);
        }
    }

    let mut fini_stack: Vec<(fn(&mut Arg), Arg)> = Vec::new();
    let mut nodes = Vec::with_capacity(order.len());
    for &descr_idx in &order {
        match build_node(descr, descr_idx, catalogues, &index_map, &mut fini_stack) {
            Ok(node) => nodes.push(node),
            Err(e) => {
                run_fini(&mut fini_stack);
                return Err(e);
            }
        }
    }

    let entry_point = index_map[descr.entry_point]
        .expect("validated: entry_point names a monadic/high-order node");

    Ok(CompiledProgram { nodes, entry_point })
}

fn run_fini(stack: &mut Vec<(fn(&mut Arg), Arg)>) {
    while let Some((fin, mut arg)) = stack.pop() {
        fin(&mut arg);
    }
}

fn resolve_and_init<F: Copy>(
    cat: &Catalogue<F, Arg>,
    index: usize,
    symbol: &str,
    mut arg: Arg,
    fini_stack: &mut Vec<(fn(&mut Arg), Arg)>,
) -> Result<(F, Arg), CompileError> {
    let reg = cat
        .resolve(symbol)
        .map_err(|_| CompileError::UnresolvedSymbol {
            index,
            symbol: symbol.to_owned(),
        })?;
    if let Some(init) = reg.init {
        init(&mut arg).map_err(|_| CompileError::InitFailed { index })?;
        if let Some(fin) = reg.fin {
            fini_stack.push((fin, arg.clone()));
        }
    }
    Ok((reg.func, arg))
}

fn build_node<Buf: PacketBufferMut + 'static>(
    descr: &ProgramDescr,
    idx: usize,
    catalogues: &Catalogues<Buf>,
    index_map: &[Option<usize>],
    fini_stack: &mut Vec<(fn(&mut Arg), Arg)>,
) -> Result<CompiledNode<Buf>, CompileError> {
    let remap = |o: Option<usize>| o.map(|i| index_map[i].expect("validated successor link"));

    match &descr.nodes[idx] {
        FunctionalDescr::Monadic { symbol, arg, right, left } => {
            let (func, arg) =
                resolve_and_init(&catalogues.monadic, idx, symbol, arg.clone(), fini_stack)?;
            Ok(CompiledNode {
                func,
                arg,
                predicate: None,
                right: remap(*right),
                left: remap(*left),
            })
        }
        FunctionalDescr::HighOrder { symbol, pindex, arg, right, left } => {
            let (func, arg) =
                resolve_and_init(&catalogues.monadic, idx, symbol, arg.clone(), fini_stack)?;
            let predicate = build_predicate(descr, *pindex, catalogues, fini_stack)?;
            Ok(CompiledNode {
                func,
                arg,
                predicate: Some(predicate),
                right: remap(*right),
                left: remap(*left),
            })
        }
        FunctionalDescr::Predicate { .. } | FunctionalDescr::Combinator { .. } => {
            unreachable!("only monadic-kind nodes are ever passed to build_node")
        }
    }
}

fn build_predicate<Buf: PacketBufferMut + 'static>(
    descr: &ProgramDescr,
    idx: usize,
    catalogues: &Catalogues<Buf>,
    fini_stack: &mut Vec<(fn(&mut Arg), Arg)>,
) -> Result<CompiledPredicate<Buf>, CompileError> {
    match &descr.nodes[idx] {
        FunctionalDescr::Predicate { symbol, arg } => {
            let (func, arg) =
                resolve_and_init(&catalogues.predicate, idx, symbol, arg.clone(), fini_stack)?;
            Ok(CompiledPredicate::Leaf { func, arg })
        }
        FunctionalDescr::Combinator { op, l_index, r_index } => {
            let func = combinator_fn(*op);
            let left = Box::new(build_predicate(descr, *l_index, catalogues, fini_stack)?);
            let right = match r_index {
                Some(r) => Some(Box::new(build_predicate(descr, *r, catalogues, fini_stack)?)),
                None => None,
            };
            Ok(CompiledPredicate::Combine { func, left, right })
        }
        FunctionalDescr::Monadic { .. } | FunctionalDescr::HighOrder { .. } => {
            unreachable!("validated: pindex/l_index/r_index only name predicate-kind nodes")
        }
    }
}

#[cfg(test)]
mod test {
    use super::compile;
    use crate::arg::Arg;
    use crate::catalogue::Catalogues;
    use crate::descr::{CombinatorOp, FunctionalDescr, ProgramDescr};
    use crate::eval::{NodeCtx, Step};
    use crate::error::CompileError;
    use net::packet::test_utils::build_test_udp_ipv4_packet;
    use symtab::Registration;

    fn pass(_pkt: &mut net::packet::Packet<net::buffer::TestBuffer>, _ctx: &NodeCtx<'_>) -> Step {
        Step::Continue { right: true }
    }

    #[test]
    fn unresolved_symbol_reports_node_index() {
        let catalogues: Catalogues<net::buffer::TestBuffer> = Catalogues::new();
        let descr = ProgramDescr {
            nodes: vec![FunctionalDescr::Monadic {
                symbol: "nope".to_owned(),
                arg: Arg::None,
                right: None,
                left: None,
            }],
            entry_point: 0,
        };
        let err = compile(&descr, &catalogues).unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnresolvedSymbol { index: 0, .. }
        ));
    }

    #[test]
    fn simple_program_compiles_and_runs() {
        let catalogues: Catalogues<net::buffer::TestBuffer> = Catalogues::new();
        catalogues
            .monadic
            .register("pass", Registration::simple(pass as _))
            .unwrap();
        let descr = ProgramDescr {
            nodes: vec![FunctionalDescr::Monadic {
                symbol: "pass".to_owned(),
                arg: Arg::None,
                right: None,
                left: None,
            }],
            entry_point: 0,
        };
        let program = compile(&descr, &catalogues).unwrap();
        let mut pkt = build_test_udp_ipv4_packet("1.2.3.4", "5.6.7.8", 1000, 2000);
        program.eval(&mut pkt);
    }

    #[test]
    fn failed_init_rolls_back_previously_initialized_nodes() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static FINI_CALLS: AtomicUsize = AtomicUsize::new(0);

        fn init_ok(_arg: &mut Arg) -> Result<(), symtab::SymtabError> {
            Ok(())
        }
        fn fin_marks(_arg: &mut Arg) {
            FINI_CALLS.fetch_add(1, Ordering::SeqCst);
        }
        fn init_fails(_arg: &mut Arg) -> Result<(), symtab::SymtabError> {
            Err(symtab::SymtabError::Unresolved("boom".to_owned()))
        }

        let catalogues: Catalogues<net::buffer::TestBuffer> = Catalogues::new();
        catalogues
            .monadic
            .register(
                "good",
                Registration {
                    func: pass as _,
                    init: Some(init_ok),
                    fin: Some(fin_marks),
                },
            )
            .unwrap();
        catalogues
            .monadic
            .register(
                "bad",
                Registration {
                    func: pass as _,
                    init: Some(init_fails),
                    fin: None,
                },
            )
            .unwrap();

        let descr = ProgramDescr {
            nodes: vec![
                FunctionalDescr::Monadic {
                    symbol: "good".to_owned(),
                    arg: Arg::None,
                    right: Some(1),
                    left: None,
                },
                FunctionalDescr::Monadic {
                    symbol: "bad".to_owned(),
                    arg: Arg::None,
                    right: None,
                    left: None,
                },
            ],
            entry_point: 0,
        };

        let err = compile(&descr, &catalogues).unwrap_err();
        assert!(matches!(err, CompileError::InitFailed { index: 1 }));
        assert_eq!(FINI_CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn high_order_node_compiles_predicate_subtree() {
        fn guarded(pkt: &mut net::packet::Packet<net::buffer::TestBuffer>, ctx: &NodeCtx<'_>) -> Step {
            if ctx.predicate {
                pkt.get_meta_mut().fanout.action = net::packet::Action::Drop;
            }
            Step::Continue { right: true }
        }
        fn always_true(
            _pkt: &net::packet::Packet<net::buffer::TestBuffer>,
            _arg: &Arg,
        ) -> bool {
            true
        }

        let catalogues: Catalogues<net::buffer::TestBuffer> = Catalogues::new();
        catalogues
            .monadic
            .register("guarded", Registration::simple(guarded as _))
            .unwrap();
        catalogues
            .predicate
            .register("always_true", Registration::simple(always_true as _))
            .unwrap();

        let descr = ProgramDescr {
            nodes: vec![
                FunctionalDescr::HighOrder {
                    symbol: "guarded".to_owned(),
                    pindex: 1,
                    arg: Arg::None,
                    right: None,
                    left: None,
                },
                FunctionalDescr::Predicate {
                    symbol: "always_true".to_owned(),
                    arg: Arg::None,
                },
            ],
            entry_point: 0,
        };

        let program = compile(&descr, &catalogues).unwrap();
        let mut pkt = build_test_udp_ipv4_packet("1.2.3.4", "5.6.7.8", 1000, 2000);
        program.eval(&mut pkt);
        assert!(pkt.get_meta().fanout.action.is_drop());
    }

    #[test]
    fn combinator_not_negates_single_child() {
        fn guarded(pkt: &mut net::packet::Packet<net::buffer::TestBuffer>, ctx: &NodeCtx<'_>) -> Step {
            if !ctx.predicate {
                pkt.get_meta_mut().fanout.action = net::packet::Action::Drop;
            }
            Step::Continue { right: true }
        }
        fn always_true(
            _pkt: &net::packet::Packet<net::buffer::TestBuffer>,
            _arg: &Arg,
        ) -> bool {
            true
        }

        let catalogues: Catalogues<net::buffer::TestBuffer> = Catalogues::new();
        catalogues
            .monadic
            .register("guarded", Registration::simple(guarded as _))
            .unwrap();
        catalogues
            .predicate
            .register("always_true", Registration::simple(always_true as _))
            .unwrap();

        let descr = ProgramDescr {
            nodes: vec![
                FunctionalDescr::HighOrder {
                    symbol: "guarded".to_owned(),
                    pindex: 2,
                    arg: Arg::None,
                    right: None,
                    left: None,
                },
                FunctionalDescr::Predicate {
                    symbol: "always_true".to_owned(),
                    arg: Arg::None,
                },
                FunctionalDescr::Combinator {
                    op: CombinatorOp::Not,
                    l_index: 1,
                    r_index: None,
                },
            ],
            entry_point: 0,
        };

        let program = compile(&descr, &catalogues).unwrap();
        let mut pkt = build_test_udp_ipv4_packet("1.2.3.4", "5.6.7.8", 1000, 2000);
        program.eval(&mut pkt);
        // always_true negated by `not` is false, so `guarded` must not have dropped the packet.
        assert!(!pkt.get_meta().fanout.action.is_drop());
    }
}
