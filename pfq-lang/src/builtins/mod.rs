// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The built-in symbol set every dataplane process registers before compiling any program
//! (spec.md §4.4.5).

mod actions;
mod predicates;

use net::buffer::PacketBufferMut;
use symtab::Registration;

use crate::catalogue::Catalogues;

/// Register every built-in monadic, high-order, and predicate symbol into `catalogues`.
///
/// Mirrors `pfq_monadic_cat`/`pfq_predicate_cat`'s static initializer in the original: this is
/// the only place in the process that ever calls `Catalogue::register` (spec.md §4.8 — hot-path
/// resolution only happens once, at compile time, against catalogues built here).
///
/// # Panics
///
/// Panics if a symbol name collides with itself, which would indicate this function registered
/// the same name twice — a programming error in this module, not a runtime condition.
pub fn register_builtins<Buf: PacketBufferMut + 'static>(catalogues: &Catalogues<Buf>) {
    macro_rules! monadic {
        ($name:expr, $func:expr) => {
            catalogues
                .monadic
                .register($name, Registration::simple($func))
                .unwrap_or_else(|e| panic!("duplicate monadic symbol {}: {e}", $name));
        };
    }
    macro_rules! predicate {
        ($name:expr, $func:expr) => {
            catalogues
                .predicate
                .register($name, Registration::simple($func))
                .unwrap_or_else(|e| panic!("duplicate predicate symbol {}: {e}", $name));
        };
    }

    monadic!("unit", actions::unit);
    monadic!("ip", actions::ip);
    monadic!("udp", actions::udp);
    monadic!("tcp", actions::tcp);
    monadic!("kernel", actions::kernel);
    monadic!("broadcast", actions::broadcast);
    monadic!("drop", actions::drop_fn);
    monadic!("forward", actions::forward);
    monadic!("forwardIO", actions::forward_io);
    monadic!("bridge", actions::bridge);
    monadic!("tee", actions::tee);
    monadic!("tap", actions::tap);
    monadic!("mark", actions::mark);
    monadic!("put_state", actions::put_state);
    monadic!("inc", actions::inc);
    monadic!("dec", actions::dec);
    monadic!("log_msg", actions::log_msg);
    monadic!("log_packet", actions::log_packet);
    monadic!("log_buff", actions::log_buff);
    catalogues
        .monadic
        .register(
            "steer_rrobin",
            Registration {
                func: actions::steer_rrobin,
                init: Some(actions::init_rrobin_counter),
                fin: None,
            },
        )
        .unwrap_or_else(|e| panic!("duplicate monadic symbol steer_rrobin: {e}"));
    monadic!("steer_link", actions::steer_link);
    monadic!("steer_vlan", actions::steer_vlan);
    monadic!("steer_ip", actions::steer_ip);
    monadic!("steer_ip6", actions::steer_ip6);
    monadic!("steer_flow", actions::steer_flow);
    monadic!("steer_rtp", actions::steer_rtp);
    monadic!("steer_net", actions::steer_net);
    monadic!("steer_field", actions::steer_field);

    predicate!("ip", predicates::ip);
    predicate!("ip6", predicates::ip6);
    predicate!("udp", predicates::udp);
    predicate!("tcp", predicates::tcp);
    predicate!("icmp", predicates::icmp);
    predicate!("flow", predicates::flow);
    predicate!("vlan", predicates::vlan);
    predicate!("no_frag", predicates::no_frag);
    predicate!("no_more_frag", predicates::no_more_frag);
    predicate!("is_l3_proto", predicates::is_l3_proto);
    predicate!("is_l4_proto", predicates::is_l4_proto);
    predicate!("has_port", predicates::has_port);
    predicate!("has_src_port", predicates::has_src_port);
    predicate!("has_dst_port", predicates::has_dst_port);
    predicate!("has_addr", predicates::has_addr);
    predicate!("has_src_addr", predicates::has_src_addr);
    predicate!("has_dst_addr", predicates::has_dst_addr);
    predicate!("has_vlan", predicates::has_vlan);
    predicate!("has_vid", predicates::has_vid);
    predicate!("has_mark", predicates::has_mark);
    predicate!("has_state", predicates::has_state);
    predicate!("bloom_src", predicates::bloom_src);
    predicate!("bloom_dst", predicates::bloom_dst);
}

#[cfg(test)]
mod test {
    use super::register_builtins;
    use crate::catalogue::Catalogues;
    use net::buffer::TestBuffer;

    #[test]
    fn every_builtin_registers_without_collision() {
        let catalogues: Catalogues<TestBuffer> = Catalogues::new();
        register_builtins(&catalogues);
        assert!(catalogues.monadic.len() >= 27);
        assert!(catalogues.predicate.len() >= 23);
    }

    #[test]
    fn forward_and_ip_both_resolve() {
        let catalogues: Catalogues<TestBuffer> = Catalogues::new();
        register_builtins(&catalogues);
        assert!(catalogues.monadic.resolve("forward").is_ok());
        assert!(catalogues.predicate.resolve("has_addr").is_ok());
        assert!(catalogues.monadic.resolve("no_such_symbol").is_err());
    }
}
