//! An implementation of the server side of the [GDB Remote Serial
//! Protocol] (RSP) for simulated RISC-V CPUs.
//!
//! The server sits between a GDB client and a [`Target`], the small
//! capability set a simulator implements to be debugged: register and
//! memory access, bounded-time resumption, reset, and a pair of
//! performance counters. Everything protocol-shaped lives here:
//!
//! - [`protocol`]: packet framing, checksums, hex codecs, and one-shot
//!   parsing of requests into typed commands.
//! - [`conn`]: the byte-transport seam and the RSP connection facade
//!   (acknowledgement, retransmission, `Ctrl-C` detection).
//! - [`matchpoint`]: bookkeeping for installed breakpoints.
//! - [`stub`]: the dispatcher itself: the command state machine, the
//!   continue/step loops, host-syscall forwarding via `F` packets, and
//!   the `monitor` command sub-language.
//!
//! A minimal session looks like:
//!
//! ```no_run
//! use riscv_gdbserver::conn::TcpTransport;
//! use riscv_gdbserver::stub::{GdbServer, KillBehaviour};
//! use riscv_gdbserver::trace::TraceFlags;
//! # struct Sim;
//! # impl riscv_gdbserver::target::Target for Sim {
//! #     fn read_register(&mut self, _: usize) -> Option<(u32, usize)> { None }
//! #     fn write_register(&mut self, _: usize, _: u32) -> usize { 0 }
//! #     fn read(&mut self, _: u32, _: &mut [u8]) -> usize { 0 }
//! #     fn write(&mut self, _: u32, _: &[u8]) -> usize { 0 }
//! #     fn resume(
//! #         &mut self,
//! #         _: riscv_gdbserver::target::ResumeKind,
//! #         _: Option<std::time::Duration>,
//! #     ) -> riscv_gdbserver::target::ResumeOutcome {
//! #         riscv_gdbserver::target::ResumeOutcome::Timeout
//! #     }
//! #     fn reset(
//! #         &mut self,
//! #         _: riscv_gdbserver::target::ResetKind,
//! #     ) -> riscv_gdbserver::target::ResumeOutcome {
//! #         riscv_gdbserver::target::ResumeOutcome::Success
//! #     }
//! #     fn cycle_count(&self) -> u64 { 0 }
//! #     fn instr_count(&self) -> u64 { 0 }
//! # }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = TcpTransport::bind("127.0.0.1:51000")?;
//! let mut server = GdbServer::new(
//!     transport,
//!     Sim, // your simulator's Target impl
//!     TraceFlags::default(),
//!     KillBehaviour::ExitOnKill,
//! );
//! server.serve()?;
//! # Ok(())
//! # }
//! ```
//!
//! [GDB Remote Serial Protocol]:
//!     https://sourceware.org/gdb/current/onlinedocs/gdb/Remote-Protocol.html

pub mod common;
pub mod conn;
pub mod matchpoint;
pub mod protocol;
pub mod stub;
pub mod target;
pub mod trace;

pub use common::TargetSignal;
pub use stub::{GdbServer, KillBehaviour, ServerError};
pub use target::Target;
pub use trace::TraceFlags;
