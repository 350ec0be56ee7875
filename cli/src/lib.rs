// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Interactive administrative command tree for a running `dataplane` process (SPEC_FULL.md's
//! ambient-crates table: "Interactive/administrative command tree (`rustyline`-based), trimmed to
//! PFQ-relevant commands (group/socket inspection, stats dump)").
//!
//! Grounded on the teacher workspace's `mgmt`/gRPC control surface in *shape only* (a long-lived
//! administrative front-end distinct from the hot path) — this crate carries none of `mgmt`'s
//! gRPC/tonic machinery, since spec.md §1 explicitly puts control-plane *wire* framing out of
//! scope. What's left is the read side of spec.md §6's control surface: every command here is a
//! read-only inspection of state [`socket::SocketTable::apply`]'s getters already expose, printed
//! to a `rustyline` line editor instead of returned to a binary ioctl caller.

#![deny(clippy::all, clippy::pedantic)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

use std::sync::Arc;

use devmap::DevMap;
use group::GroupTable;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use socket::{SockOpt, SocketId, SocketTable};
use stats::GlobalStats;
use thiserror::Error;
use tracectl::trace_target;
use tracing::LevelFilter;

trace_target!("pfq-cli", LevelFilter::INFO, &["cli"]);

/// Failure running the REPL itself (not a command's own failure, which is just printed).
#[derive(Debug, Error)]
pub enum CliError {
    /// The line editor could not be constructed or failed to read a line.
    #[error("line editor error: {0}")]
    Readline(#[from] ReadlineError),
}

/// Everything a command may read. Held by reference for the REPL's whole lifetime; nothing here
/// is ever mutated by this crate (SPEC_FULL.md: "group/socket inspection, stats dump").
pub struct CliContext {
    /// Device→group map, inspected for its per-interface monitor gate.
    pub devmap: Arc<DevMap>,
    /// Group table, inspected for membership/stats/counters.
    pub groups: Arc<GroupTable>,
    /// Socket table, inspected for per-socket state and dispatched read-only `SockOpt`s.
    pub sockets: Arc<SocketTable>,
    /// Whole-process counters (spec.md §4.5 step 1's `global.recv`, etc).
    pub global_stats: Arc<GlobalStats>,
    /// Highest ifindex worth probing for `devmap <ifindex>`/`stats`.
    pub max_ifindex: u32,
}

/// One REPL command, already split on whitespace (`cmd` lowercased, `args` raw).
enum Command<'a> {
    Help,
    Groups,
    Group(&'a str),
    Sockets,
    Socket(&'a str),
    Devmap(&'a str),
    Stats,
    Quit,
    Unknown(&'a str),
}

fn parse<'a>(line: &'a str) -> Option<Command<'a>> {
    let mut parts = line.split_whitespace();
    let cmd = parts.next()?;
    let rest = parts.next();
    Some(match cmd {
        "help" | "?" => Command::Help,
        "groups" => Command::Groups,
        "group" => Command::Group(rest.unwrap_or("")),
        "sockets" => Command::Sockets,
        "socket" => Command::Socket(rest.unwrap_or("")),
        "devmap" => Command::Devmap(rest.unwrap_or("")),
        "stats" => Command::Stats,
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other),
    })
}

const HELP: &str = "\
commands:
  groups              list every currently-allocated group id
  group <gid>         dump one group's policy, per-class membership, and stats
  sockets             list every currently-open socket id
  socket <sid>        dump one socket's state (weight, caplen, joined groups, stats)
  devmap <ifindex>     show whether any group currently monitors an interface
  stats               dump whole-process recv/lost/forward_disc counters
  quit | exit          leave the shell";

fn run_help() -> String {
    HELP.to_owned()
}

fn run_groups(ctx: &CliContext) -> String {
    let mut ids = ctx.groups.ids();
    ids.sort_by_key(group::GroupId::index);
    if ids.is_empty() {
        return "(no groups allocated)".to_owned();
    }
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn run_group(ctx: &CliContext, arg: &str) -> String {
    let Ok(index) = arg.parse::<u32>() else {
        return "usage: group <gid>".to_owned();
    };
    let gid = group::GroupId::from_index(index);
    let Some(group) = ctx.groups.get(gid) else {
        return format!("no such group {gid}");
    };
    let stats = group.stats();
    format!(
        "group {gid}: policy={:?} owner={} vlan_filters_enabled={}\n\
         stats: recv={} drop={} frwd={} kern={}",
        group.policy(),
        group.owner(),
        group.vlan_filters_enabled(),
        stats.recv,
        stats.drop,
        stats.frwd,
        stats.kern,
    )
}

fn run_sockets(ctx: &CliContext) -> String {
    let mut ids = ctx.sockets.ids();
    ids.sort_by_key(SocketId::index);
    if ids.is_empty() {
        return "(no sockets open)".to_owned();
    }
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn run_socket(ctx: &CliContext, arg: &str) -> String {
    let Ok(index) = arg.parse::<u32>() else {
        return "usage: socket <sid>".to_owned();
    };
    let sid = SocketId::from_index(index);
    let Some(socket) = ctx.sockets.get(sid) else {
        return format!("no such socket {sid}");
    };
    let stats = socket.stats();
    let joined = socket.joined_groups();
    format!(
        "socket {sid}: enabled={} weight={} rx_caplen={} rx_slots={}\n\
         joined: {}\n\
         stats: recv={} lost={} drop={} sent={} disc={} fail={}",
        socket.is_enabled(),
        socket.weight(),
        socket.rx_caplen(),
        socket.rx_slots(),
        if joined.is_empty() {
            "(none)".to_owned()
        } else {
            joined.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        },
        stats.recv,
        stats.lost,
        stats.drop,
        stats.sent,
        stats.disc,
        stats.fail,
    )
}

fn run_devmap(ctx: &CliContext, arg: &str) -> String {
    let Ok(ifindex) = arg.parse::<u32>() else {
        return "usage: devmap <ifindex>".to_owned();
    };
    format!("ifindex {ifindex}: monitored = {}", ctx.devmap.monitor(ifindex))
}

fn run_stats(ctx: &CliContext) -> String {
    let (recv, lost, forward_disc) = ctx.global_stats.snapshot();
    let monitored: Vec<u32> = (0..ctx.max_ifindex).filter(|&i| ctx.devmap.monitor(i)).collect();
    format!(
        "global: recv={recv} lost={lost} forward_disc={forward_disc}\n\
         monitored interfaces: {monitored:?}"
    )
}

/// Dispatch one already-parsed command against `ctx`. `Ok(None)` means "stop the REPL".
fn dispatch(ctx: &CliContext, line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Some(String::new());
    }
    match parse(trimmed)? {
        Command::Help => Some(run_help()),
        Command::Groups => Some(run_groups(ctx)),
        Command::Group(arg) => Some(run_group(ctx, arg)),
        Command::Sockets => Some(run_sockets(ctx)),
        Command::Socket(arg) => Some(run_socket(ctx, arg)),
        Command::Devmap(arg) => Some(run_devmap(ctx, arg)),
        Command::Stats => Some(run_stats(ctx)),
        Command::Quit => None,
        Command::Unknown(cmd) => Some(format!("unknown command {cmd:?}; try \"help\"")),
    }
}

/// A socket handle this shell uses only for its read-only `GET_*` options, never opened for
/// capture. Reserved for a future command that wants to go through [`SocketTable::apply`] rather
/// than a table getter directly; unused today (every command above reads `group`/`socket`
/// directly), kept so a command added later doesn't have to plumb one through from scratch.
#[allow(dead_code)]
fn probe_via_sockopt(ctx: &CliContext, sid: SocketId) -> Result<bool, errno::PfqErrorKind> {
    matches!(ctx.sockets.apply(sid, SockOpt::GetStatus), Ok(socket::SockOptResult::Status(_)))
        .then_some(true)
        .ok_or(errno::PfqErrorKind::Invalid)
}

/// Run the REPL on the current thread until the user types `quit`/`exit` or sends EOF
/// (`Ctrl-D`).
///
/// # Errors
///
/// Returns [`CliError::Readline`] if the line editor cannot be constructed, or on an I/O failure
/// reading from the terminal other than EOF/interrupt (both of those end the loop normally).
pub fn run(ctx: &CliContext) -> Result<(), CliError> {
    let mut editor = DefaultEditor::new()?;
    println!("pfq-cli — type \"help\" for commands, \"quit\" to leave");
    loop {
        match editor.readline("pfq> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                match dispatch(ctx, &line) {
                    Some(output) => {
                        if !output.is_empty() {
                            println!("{output}");
                        }
                    }
                    None => break,
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use devmap::DevMap;
    use group::{GroupTable, Policy};
    use socket::{GroupJoinArgs, SockOpt, SocketTable};
    use stats::GlobalStats;

    use super::{CliContext, dispatch, parse};

    fn context() -> CliContext {
        let devmap = Arc::new(DevMap::new(4, 4));
        let groups = Arc::new(GroupTable::new(1));
        let sockets = Arc::new(SocketTable::new(Arc::clone(&groups), Arc::clone(&devmap)));
        CliContext {
            devmap,
            groups,
            sockets,
            global_stats: Arc::new(GlobalStats::new()),
            max_ifindex: 4,
        }
    }

    #[test]
    fn parses_known_commands_with_and_without_arguments() {
        assert!(matches!(parse("help"), Some(super::Command::Help)));
        assert!(matches!(parse("group 3"), Some(super::Command::Group("3"))));
        assert!(matches!(parse(""), None));
    }

    #[test]
    fn groups_lists_nothing_before_any_join() {
        let ctx = context();
        assert_eq!(dispatch(&ctx, "groups").unwrap(), "(no groups allocated)");
    }

    #[test]
    fn group_dump_reports_joined_state_after_a_join() {
        let ctx = context();
        let socket = ctx.sockets.open();
        let result = ctx
            .sockets
            .apply(
                socket.id(),
                SockOpt::GroupJoin(GroupJoinArgs { gid: None, class_mask: 1, policy: Policy::Shared }),
            )
            .unwrap();
        let socket::SockOptResult::GroupJoined(gid) = result else {
            panic!("expected GroupJoined");
        };
        let output = dispatch(&ctx, &format!("group {}", gid.index())).unwrap();
        assert!(output.contains("Shared"), "{output}");
    }

    #[test]
    fn unknown_command_does_not_stop_the_repl() {
        let ctx = context();
        assert!(dispatch(&ctx, "bogus").is_some());
    }

    #[test]
    fn quit_stops_the_repl() {
        let ctx = context();
        assert!(dispatch(&ctx, "quit").is_none());
    }

    #[test]
    fn devmap_reports_unmonitored_interface() {
        let ctx = context();
        assert!(dispatch(&ctx, "devmap 0").unwrap().contains("false"));
    }
}
