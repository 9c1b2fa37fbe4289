//! The contract between the RSP dispatcher and a simulated CPU.
//!
//! The dispatcher owns a single [`Target`] for the lifetime of a session
//! and is the only code that touches it. A target implementation wraps
//! whatever simulator backs it (an interpreted core, a Verilated RTL
//! model, ...) and exposes the small capability set the protocol needs:
//! register and memory access, bounded-time resumption, reset, and a pair
//! of performance counters.

use core::fmt;
use std::time::Duration;

use crate::common::RegVal;

/// How the dispatcher wants the target to advance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResumeKind {
    /// Execute a single instruction.
    Step,
    /// Run freely, yielding back no later than the supplied timeout.
    Continue,
    /// Stop a running target. Used when a break or timeout fires.
    Stop,
}

/// What came of a [`Target::resume`] or [`Target::reset`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// Nothing to report (the outcome of [`ResumeKind::Stop`]).
    None,
    /// Reset completed.
    Success,
    /// Reset failed.
    Failure,
    /// A single step completed.
    Stepped,
    /// Execution stopped at a breakpoint or exception.
    Interrupted,
    /// The time slice expired without the target stopping.
    Timeout,
    /// The target executed the syscall trap sequence and expects the
    /// server to perform a host syscall on its behalf.
    Syscall,
}

impl fmt::Display for ResumeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResumeOutcome::None => "NONE",
            ResumeOutcome::Success => "SUCCESS",
            ResumeOutcome::Failure => "FAILURE",
            ResumeOutcome::Stepped => "STEPPED",
            ResumeOutcome::Interrupted => "INTERRUPTED",
            ResumeOutcome::Timeout => "TIMEOUT",
            ResumeOutcome::Syscall => "SYSCALL",
        };
        write!(f, "{}", name)
    }
}

/// The flavors of reset a target supports.
///
/// A cold reset takes the simulator back to its power-on state; a warm
/// reset preserves whatever the implementation considers persistent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetKind {
    Cold,
    Warm,
}

/// The set of operations a simulated CPU must provide to be debugged
/// through this server.
pub trait Target {
    /// Read register `reg`, returning its value and width in bytes.
    ///
    /// `None` means there is no such register.
    fn read_register(&mut self, reg: usize) -> Option<(RegVal, usize)>;

    /// Write register `reg`, returning the number of bytes written.
    ///
    /// A count different from the register's width is treated as a
    /// warning by the dispatcher, not an error.
    fn write_register(&mut self, reg: usize, val: RegVal) -> usize;

    /// Read `buf.len()` bytes of memory starting at `addr`, returning the
    /// number actually read. Short reads are allowed.
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> usize;

    /// Write `buf` to memory starting at `addr`, returning the number of
    /// bytes actually written. Short writes are allowed.
    fn write(&mut self, addr: u32, buf: &[u8]) -> usize;

    /// Advance (or stop) execution.
    ///
    /// With [`ResumeKind::Continue`] the target must return within
    /// `timeout` (plus bounded overhead), reporting
    /// [`ResumeOutcome::Timeout`] if nothing else happened first. The
    /// dispatcher relies on this bound to stay responsive to `Ctrl-C`.
    fn resume(&mut self, kind: ResumeKind, timeout: Option<Duration>) -> ResumeOutcome;

    /// Reset the target, returning [`ResumeOutcome::Success`] or
    /// [`ResumeOutcome::Failure`].
    fn reset(&mut self, kind: ResetKind) -> ResumeOutcome;

    /// Cycles executed. Monotone within a run.
    fn cycle_count(&self) -> u64;

    /// Instructions executed. Monotone within a run.
    fn instr_count(&self) -> u64;

    /// Hook for target-specific monitor commands.
    ///
    /// Invoked with any `monitor` command the generic layer does not
    /// recognize. Write human-readable output to `out` and return true if
    /// the command was accepted.
    fn command(&mut self, cmd: &str, out: &mut dyn fmt::Write) -> bool {
        let _ = (cmd, out);
        false
    }
}
