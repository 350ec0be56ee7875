#![cfg_attr(not(test), no_std)] // This library should always compile without std (even if we never ship that way)
#![forbid(unsafe_code)] // Validation logic should always be strictly safe
#![deny(missing_docs, clippy::all, clippy::pedantic)] // yeah, I'm that guy.  I'm not sorry.
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Do you know where your towel is?

//! A library for working with and strictly validating link-layer frames and the header stack
//! carried within them.
//!
//! This crate is deliberately agnostic of any particular packet-processing engine: it only knows
//! how to parse, inspect, and re-serialize headers. The pfq-lang virtual machine builds its
//! predicates and properties on top of the accessors exposed here.

extern crate alloc;

#[cfg(all(kani, feature = "_fake_kani"))]
compile_error!("kani should not be used with internal _fake_kani feature.");

pub mod addr_parse_error;
pub mod buffer;
pub mod checksum;
pub mod eth;
pub mod headers;
pub mod icmp4;
pub mod icmp6;
pub mod icmp_any;
pub mod ip;
pub mod ip_auth;
pub mod ipv4;
pub mod ipv6;
pub mod packet;
pub mod parse;
pub mod tcp;
pub mod udp;
pub mod vlan;

/// Implement `From<Variant> for Enum` for a list of `Enum::Variant(Inner)` pairs.
///
/// Used throughout the header stack to build up the `Header` / `Transport` / `Net` sum types
/// without writing the same boilerplate by hand at every layer.
#[macro_export]
macro_rules! impl_from_for_enum {
    ($enum_name:ident, $($variant:ident => $inner:ty),+ $(,)?) => {
        $(
            impl From<$inner> for $enum_name {
                fn from(value: $inner) -> Self {
                    $enum_name::$variant(value)
                }
            }
        )+
    };
}
