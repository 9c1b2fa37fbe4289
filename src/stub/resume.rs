//! Execution control: continue, single step, the host-syscall
//! interleaving, and stop-reason reporting.

use std::time::{Duration, Instant};

use log::{error, trace, warn};

use crate::common::{RegVal, TargetSignal};
use crate::conn::Transport;
use crate::protocol::hex::hex_digit;
use crate::protocol::SyscallReply;
use crate::target::{ResumeKind, ResumeOutcome, Target};

use super::{GdbServer, ServerError, SyscallContinuation, INTERRUPT_TIMEOUT};

impl<T: Target, C: Transport> GdbServer<T, C> {
    /// Send an `S<xx>` stop-reason packet.
    pub(super) fn report_stop(&mut self, sig: TargetSignal) -> Result<(), ServerError<C::Error>> {
        if self.trace_flags.exec() {
            trace!("stopped with {}", sig);
        }
        self.pkt.clear();
        self.pkt.push(b'S');
        self.pkt.push(hex_digit(sig.code() >> 4));
        self.pkt.push(hex_digit(sig.code()));
        self.put()
    }

    /// `c`: run until something stops us.
    ///
    /// The target is driven in short slices so the dispatcher can notice a
    /// break byte between them; a user-set `monitor timeout` is measured
    /// against the accumulated run, never a single slice.
    pub(super) fn cont(&mut self) -> Result<(), ServerError<C::Error>> {
        // A timeout too large to land on a representable deadline never
        // fires.
        let deadline = if self.timeout == Duration::ZERO {
            None
        } else {
            Instant::now().checked_add(self.timeout)
        };

        // Check for break before resuming the machine.
        if self.rsp.have_break() {
            let _ = self.cpu.resume(ResumeKind::Stop, None);
            return self.report_stop(TargetSignal::Int);
        }

        loop {
            match self.cpu.resume(ResumeKind::Continue, Some(INTERRUPT_TIMEOUT)) {
                ResumeOutcome::Syscall => {
                    return self.syscall_request(SyscallContinuation::FinishContinue)
                }

                // at a breakpoint
                ResumeOutcome::Stepped | ResumeOutcome::Interrupted => {
                    return self.report_stop(TargetSignal::Trap)
                }

                ResumeOutcome::Timeout => {
                    if let Some(deadline) = deadline {
                        if Instant::now() > deadline {
                            let _ = self.cpu.resume(ResumeKind::Stop, None);
                            return self.report_stop(TargetSignal::Xcpu);
                        }
                    }

                    if self.rsp.have_break() {
                        let _ = self.cpu.resume(ResumeKind::Stop, None);
                        return self.report_stop(TargetSignal::Int);
                    }
                }

                other => {
                    error!("unrecognized continue result from resume: {}", other);
                    return Err(ServerError::UnexpectedResumeOutcome(other));
                }
            }
        }
    }

    /// `s`: single step one machine instruction.
    pub(super) fn step(&mut self) -> Result<(), ServerError<C::Error>> {
        if self.rsp.have_break() {
            let _ = self.cpu.resume(ResumeKind::Stop, None);
            return self.report_stop(TargetSignal::Int);
        }

        if self.cpu.resume(ResumeKind::Step, None) == ResumeOutcome::Syscall {
            return self.syscall_request(SyscallContinuation::FinishStep);
        }

        // Check for break now we've stopped.
        if self.rsp.have_break() {
            let _ = self.cpu.resume(ResumeKind::Stop, None);
            return self.report_stop(TargetSignal::Int);
        }

        self.report_stop(TargetSignal::Trap)
    }

    fn reg(&mut self, reg: usize) -> RegVal {
        match self.cpu.read_register(reg) {
            Some((val, _)) => val,
            None => {
                warn!("failed to read register {} for a syscall request", reg);
                0
            }
        }
    }

    /// Length of the NUL-terminated string at `addr`, counting the NUL,
    /// as the `F` request grammar requires.
    fn string_length(&mut self, addr: u32) -> usize {
        let mut count = 0usize;
        loop {
            let mut ch = [0u8];
            if self.cpu.read(addr.wrapping_add(count as u32), &mut ch) != 1 {
                break;
            }
            count += 1;
            if ch[0] == 0 {
                break;
            }
        }
        count
    }

    /// Turn the trapped syscall into an `F` request packet for the client.
    ///
    /// The arguments were placed in registers by the target program's
    /// newlib/libgloss stubs: the syscall number in a7, arguments in
    /// a0–a3. Numbering is Linux-style RISC-V.
    pub(super) fn syscall_request(
        &mut self,
        cont: SyscallContinuation,
    ) -> Result<(), ServerError<C::Error>> {
        if self.syscall_continuation != SyscallContinuation::None {
            warn!("there's already a syscall pending, first one lost?");
        }
        self.syscall_continuation = cont;

        let a0 = self.reg(10);
        let a1 = self.reg(11);
        let a2 = self.reg(12);
        let _a3 = self.reg(13);
        let a7 = self.reg(17);

        let req = match a7 {
            57 => format!("Fclose,{:x}", a0),
            62 => format!("Flseek,{:x},{:x},{:x}", a0, a1, a2),
            63 => format!("Fread,{:x},{:x},{:x}", a0, a1, a2),
            64 => format!("Fwrite,{:x},{:x},{:x}", a0, a1, a2),
            80 => format!("Ffstat,{:x},{:x}", a0, a1),
            93 => {
                // We never get a reply to an exit, so there is nothing to
                // resume afterwards.
                self.syscall_continuation = SyscallContinuation::None;
                format!("W{:x}", a0)
            }
            169 => format!("Fgettimeofday,{:x},{:x}", a0, a1),
            1024 => {
                let len = self.string_length(a0);
                format!("Fopen,{:x}/{:x},{:x},{:x}", a0, len, a1, a2)
            }
            1026 => {
                let len = self.string_length(a0);
                format!("Funlink,{:x}/{:x}", a0, len)
            }
            1038 => {
                let len = self.string_length(a0);
                format!("Fstat,{:x}/{:x},{:x}", a0, len, a1)
            }
            other => {
                warn!("unhandled syscall {}: reporting a trap", other);
                self.syscall_continuation = SyscallContinuation::None;
                return self.report_stop(TargetSignal::Trap);
            }
        };

        self.pkt.pack_str(&req);
        self.put()
    }

    /// Act on the `F` reply the client sends once the host call is done.
    pub(super) fn syscall_reply(
        &mut self,
        reply: SyscallReply,
    ) -> Result<(), ServerError<C::Error>> {
        // Snapshot and clear the continuation before the target can run
        // again; a nested syscall would clobber it otherwise.
        let cont = core::mem::replace(&mut self.syscall_continuation, SyscallContinuation::None);
        if cont == SyscallContinuation::None {
            warn!("syscall 'F' reply received when none expected");
        }

        // TODO: drop the -1 write-suppression once fstat after an
        // in-session reset stops returning -1.
        if reply.retcode != -1 {
            self.cpu.write_register(10, reply.retcode as RegVal);
        }

        if reply.ctrl_c {
            return self.report_stop(TargetSignal::Int);
        }

        match cont {
            // An unexpected reply is handled like a completed step; that
            // is the least bad choice.
            SyscallContinuation::None | SyscallContinuation::FinishStep => {
                self.report_stop(TargetSignal::Trap)
            }
            SyscallContinuation::FinishContinue => self.cont(),
        }
    }
}
