//! The `monitor` command sub-language, reached through `qRcmd`.
//!
//! Output destined for the user's console is built as plain text first
//! and hex-encoded once on the way out, either as `O` console-output
//! packets or as a bare hex-string reply (the form the counter commands
//! use), always followed by a terminating `OK` or `E<nn>`.

use std::fmt::Write;
use std::time::{Duration, Instant};

use chrono::Local;
use log::{error, trace};

use crate::conn::Transport;
use crate::target::{ResetKind, ResumeOutcome, Target};
use crate::trace::TraceFlags;

use super::{GdbServer, ServerError};

const GENERIC_HELP: &[&str] = &[
    "The following generic monitor commands are supported:\n",
    "  help\n",
    "    Produce this message\n",
    "  reset [cold | warm]\n",
    "    Reset the simulator (default warm)\n",
    "  exit\n",
    "    Exit the GDB server\n",
    "  timeout <interval>\n",
    "    Maximum time in seconds taken by continue packet\n",
    "  timestamp\n",
    "    Report the wall-clock time on the server\n",
    "  cyclecount\n",
    "    Report cycles executed since reset\n",
    "  instrcount\n",
    "    Report instructions executed since reset\n",
    "  echo <message>\n",
    "    Echo <message> on stdout of the gdbserver\n",
    "  set debug <flag> <0|1|on|off|true|false>\n",
    "    Turn a named trace flag on or off\n",
    "  show debug [<flag>]\n",
    "    Show the state of one or all trace flags\n",
];

impl<T: Target, C: Transport> GdbServer<T, C> {
    pub(super) fn monitor(&mut self, cmd: &str) -> Result<(), ServerError<C::Error>> {
        if self.trace_flags.rsp() {
            trace!("qRcmd: {}", cmd);
        }
        let cmd = cmd.trim();

        if cmd == "help" {
            return self.mon_help();
        }

        if cmd == "reset" || cmd == "reset warm" {
            return self.mon_reset(ResetKind::Warm);
        }
        if cmd == "reset cold" {
            return self.mon_reset(ResetKind::Cold);
        }

        if cmd == "exit" {
            // silent: the client hears nothing back
            self.exit_server = true;
            return Ok(());
        }

        if let Some(rest) = cmd.strip_prefix("timeout") {
            if let Ok(secs) = rest.trim().parse::<u64>() {
                let timeout = Duration::from_secs(secs);
                // a deadline that cannot be represented would never fire
                if Instant::now().checked_add(timeout).is_none() {
                    return self.send_str("E02");
                }
                self.timeout = timeout;
                return self.send_str("OK");
            }
        }

        if cmd == "timestamp" {
            let text = format!("{}\n", Local::now().format("%F %T"));
            self.pkt.pack_hex_str(&text);
            self.put()?;
            return self.send_str("OK");
        }

        if cmd == "cyclecount" {
            let text = format!("{}\n", self.cpu.cycle_count());
            self.pkt.pack_hex_str(&text);
            self.put()?;
            return self.send_str("OK");
        }

        if cmd == "instrcount" {
            let text = format!("{}\n", self.cpu.instr_count());
            self.pkt.pack_hex_str(&text);
            self.put()?;
            return self.send_str("OK");
        }

        if let Some(rest) = cmd.strip_prefix("echo") {
            println!("{}", rest.trim_start());
            return self.send_str("OK");
        }

        if let Some(rest) = cmd.strip_prefix("set ") {
            return self.mon_set(rest.trim_start());
        }

        if let Some(rest) = cmd.strip_prefix("show ") {
            return self.mon_show(rest.trim_start());
        }

        self.delegate(cmd)
    }

    /// Hand an unrecognized command to the target's own hook.
    fn delegate(&mut self, cmd: &str) -> Result<(), ServerError<C::Error>> {
        let mut out = String::new();
        if self.cpu.command(cmd, &mut out) {
            self.pkt.pack_rcmd_str(&out);
            self.put()?;
            self.send_str("OK")
        } else {
            self.send_str("E04")
        }
    }

    fn mon_reset(&mut self, kind: ResetKind) -> Result<(), ServerError<C::Error>> {
        // A target that cannot reset is corrupted beyond in-session repair.
        if self.cpu.reset(kind) != ResumeOutcome::Success {
            error!("failed to reset: terminating");
            return Err(ServerError::ResetFailed);
        }
        self.send_str("OK")
    }

    /// `set debug <flag> <value>`; anything else under `set` goes to the
    /// target with the `set ` prefix restored.
    fn mon_set(&mut self, rest: &str) -> Result<(), ServerError<C::Error>> {
        let tokens: Vec<&str> = rest.split_ascii_whitespace().collect();

        if tokens.len() == 3 && tokens[0] == "debug" {
            let name = tokens[1];
            if !TraceFlags::is_flag(name) {
                return self.send_str("E01");
            }

            let value = match tokens[2].to_ascii_lowercase().as_str() {
                "0" | "off" | "false" => false,
                "1" | "on" | "true" => true,
                _ => return self.send_str("E02"),
            };

            self.trace_flags.set_flag(name, value);
            return self.send_str("OK");
        }

        let full = format!("set {}", rest);
        self.delegate(&full)
    }

    /// `show debug [<flag>]`; anything else under `show` goes to the
    /// target with the `show ` prefix restored.
    fn mon_show(&mut self, rest: &str) -> Result<(), ServerError<C::Error>> {
        let tokens: Vec<&str> = rest.split_ascii_whitespace().collect();

        if tokens.len() == 1 && tokens[0] == "debug" {
            let mut out = String::new();
            for name in TraceFlags::names() {
                let state = if self.trace_flags.flag(name) { "ON" } else { "OFF" };
                let _ = writeln!(out, "{}: {}", name, state);
            }
            self.pkt.pack_rcmd_str(&out);
            self.put()?;
            return self.send_str("OK");
        }

        if tokens.len() == 2 && tokens[0] == "debug" {
            let name = tokens[1];
            if !TraceFlags::is_flag(name) {
                return self.send_str("E01");
            }

            let state = if self.trace_flags.flag(name) { "ON" } else { "OFF" };
            let out = format!("{}: {}\n", name, state);
            self.pkt.pack_rcmd_str(&out);
            self.put()?;
            return self.send_str("OK");
        }

        let full = format!("show {}", rest);
        self.delegate(&full)
    }

    fn mon_help(&mut self) -> Result<(), ServerError<C::Error>> {
        for line in GENERIC_HELP {
            self.pkt.pack_rcmd_str(line);
            self.put()?;
        }

        let mut out = String::new();
        if self.cpu.command("help", &mut out) {
            self.pkt
                .pack_rcmd_str("The following target specific monitor commands are supported:\n");
            self.put()?;
            for line in out.lines() {
                let line = format!("{}\n", line);
                self.pkt.pack_rcmd_str(&line);
                self.put()?;
            }
        } else {
            self.pkt
                .pack_rcmd_str("There are no target specific monitor commands\n");
            self.put()?;
        }

        self.send_str("OK")
    }
}
