//! `Z`/`z` matchpoint handlers.
//!
//! Software (memory) breakpoints are implemented by recording the
//! instruction bytes at the address and planting a trap instruction over
//! them; removal is the strict inverse. Hardware breakpoints and
//! watchpoints answer with the empty packet, telling GDB the stub does
//! not support them.

use log::{trace, warn};

use crate::conn::Transport;
use crate::matchpoint::MpKind;
use crate::protocol::Matchpoint;
use crate::target::Target;

use super::{GdbServer, ServerError};

/// The RISC-V trap instruction planted over a software breakpoint.
const EBREAK: [u8; 4] = 0x0010_0073u32.to_le_bytes();
/// The compressed form, used when the client reports a 2-byte kind.
const C_EBREAK: [u8; 2] = 0x9002u16.to_le_bytes();

impl<T: Target, C: Transport> GdbServer<T, C> {
    pub(super) fn insert_matchpoint(&mut self, mp: Matchpoint) -> Result<(), ServerError<C::Error>> {
        if mp.len > EBREAK.len() {
            warn!(
                "matchpoint instruction length {} exceeds maximum of {}",
                mp.len,
                EBREAK.len()
            );
            return self.send_str("E01");
        }

        match mp.kind {
            MpKind::SwBreak => {
                let mut orig = vec![0u8; mp.len];
                if self.cpu.read(mp.addr, &mut orig) != mp.len {
                    warn!("failed to read memory when inserting breakpoint at {:#x}", mp.addr);
                }

                if self.trace_flags.breakpoints() {
                    trace!(
                        "inserting a breakpoint over the instruction {:02x?} at {:#x}",
                        orig,
                        mp.addr
                    );
                }

                // Record the displaced bytes and write the trap in their
                // place, sized to the reported kind.
                self.matchpoints.add(mp.kind, mp.addr, orig);

                let trap: &[u8] = if mp.len == C_EBREAK.len() {
                    &C_EBREAK
                } else {
                    &EBREAK
                };
                if self.cpu.write(mp.addr, trap) != trap.len() {
                    warn!("failed to write break instruction at {:#x}", mp.addr);
                }

                self.send_str("OK")
            }

            // Hardware breakpoints and watchpoints are not supported; the
            // empty reply makes GDB fall back on what the stub does have.
            _ => self.send_str(""),
        }
    }

    pub(super) fn remove_matchpoint(&mut self, mp: Matchpoint) -> Result<(), ServerError<C::Error>> {
        if mp.len > EBREAK.len() {
            warn!(
                "matchpoint instruction length {} exceeds maximum of {}",
                mp.len,
                EBREAK.len()
            );
            return self.send_str("E01");
        }

        match mp.kind {
            MpKind::SwBreak => match self.matchpoints.remove(mp.kind, mp.addr) {
                Some(orig) => {
                    if self.trace_flags.breakpoints() {
                        trace!("putting back the instruction {:02x?} at {:#x}", orig, mp.addr);
                    }

                    if self.cpu.write(mp.addr, &orig) != orig.len() {
                        warn!("failed to write memory removing breakpoint at {:#x}", mp.addr);
                    }

                    self.send_str("OK")
                }
                None => {
                    warn!("failed to remove software (memory) breakpoint from {:#x}", mp.addr);
                    self.send_str("E01")
                }
            },

            _ => self.send_str(""),
        }
    }
}
