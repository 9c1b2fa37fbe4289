//! The RSP dispatcher: one request packet in, zero or more replies out,
//! plus possibly resuming the target.

mod base;
mod matchpoints;
mod monitor;
mod query;
mod resume;


use std::time::Duration;

use core::fmt;

use log::{error, warn};

use crate::common::TargetSignal;
use crate::conn::{CommsError, RspConnection, Transport};
use crate::matchpoint::MatchpointTable;
use crate::protocol::{Command, RspPacket};
use crate::target::{ResumeOutcome, Target};
use crate::trace::TraceFlags;

/// How long the target may run before control returns to the dispatcher
/// to look for an interrupt from GDB. This must always be less than one
/// second, the smallest overall timeout a user can set with
/// `monitor timeout`; it also bounds how long a `Ctrl-C` goes unnoticed.
pub(crate) const INTERRUPT_TIMEOUT: Duration = Duration::from_millis(100);

/// Capacity of the reply builder, advertised as `PacketSize` in the
/// `qSupported` reply. Comfortably holds a `g` reply carrying every
/// register.
pub const RSP_PKT_SIZE: usize = 4096;

/// What a `k` (kill) packet does to the server. Chosen at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KillBehaviour {
    /// `k` shuts the server down.
    ExitOnKill,
    /// `k` leaves the server running for the next session.
    ResetOnKill,
}

/// Action still owed to the target once a pending host syscall's `F`
/// reply arrives. At most one syscall is pending at any time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SyscallContinuation {
    None,
    /// The syscall trapped out of a single step; report the step done.
    FinishStep,
    /// The syscall trapped out of a continue; re-enter it.
    FinishContinue,
}

/// Fatal, non-recoverable errors reported by [`GdbServer::serve`].
///
/// Everything here indicates a bug or a corrupted target rather than a
/// misbehaving client; client trouble is handled in-session by dropping
/// the connection and waiting for a new one.
#[derive(Debug)]
pub enum ServerError<E> {
    /// A client connection could not be (re)established.
    ConnectFailed(E),
    /// The target failed a reset issued by `monitor reset`.
    ResetFailed,
    /// The target returned an outcome `resume` is not allowed to produce.
    UnexpectedResumeOutcome(ResumeOutcome),
    /// The framing layer gave up on the session. Handled internally by
    /// reconnecting; only surfaced if reconnection then fails.
    Comms(CommsError<E>),
}

impl<E: fmt::Display> fmt::Display for ServerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::ConnectFailed(e) => {
                write!(f, "unable to establish a client connection: {}", e)
            }
            ServerError::ResetFailed => write!(f, "target failed to reset"),
            ServerError::UnexpectedResumeOutcome(res) => {
                write!(f, "unrecognized resume outcome from target: {}", res)
            }
            ServerError::Comms(e) => write!(f, "session failed: {}", e),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for ServerError<E> {}

/// Debug a [`Target`] over the GDB Remote Serial Protocol.
///
/// The server owns the target and the transport for its whole lifetime.
/// [`GdbServer::serve`] loops accepting clients and dispatching their
/// requests until a `k` packet (under [`KillBehaviour::ExitOnKill`]), a
/// `monitor exit`, or a fatal error.
pub struct GdbServer<T: Target, C: Transport> {
    cpu: T,
    rsp: RspConnection<C>,
    pkt: RspPacket,
    matchpoints: MatchpointTable,
    trace_flags: TraceFlags,
    timeout: Duration,
    kill_behaviour: KillBehaviour,
    exit_server: bool,
    syscall_continuation: SyscallContinuation,
}

impl<T: Target, C: Transport> GdbServer<T, C> {
    /// Create a server. No timeout for run/continue by default.
    pub fn new(
        transport: C,
        cpu: T,
        trace_flags: TraceFlags,
        kill_behaviour: KillBehaviour,
    ) -> GdbServer<T, C> {
        GdbServer {
            cpu,
            rsp: RspConnection::new(transport),
            pkt: RspPacket::new(RSP_PKT_SIZE),
            matchpoints: MatchpointTable::new(),
            trace_flags,
            timeout: Duration::ZERO,
            kill_behaviour,
            exit_server: false,
            syscall_continuation: SyscallContinuation::None,
        }
    }

    /// The wrapped target.
    pub fn target_mut(&mut self) -> &mut T {
        &mut self.cpu
    }

    /// Main loop: listen for and act on RSP requests.
    ///
    /// Returns `Ok(())` when asked to exit (kill packet or `monitor
    /// exit`); only a fatal error ends the loop otherwise.
    pub fn serve(&mut self) -> Result<(), ServerError<C::Error>> {
        while !self.exit_server {
            while !self.rsp.is_connected() {
                if let Err(e) = self.rsp.connect() {
                    error!("unable to continue: {}", e);
                    return Err(ServerError::ConnectFailed(e));
                }

                // The previous session may have exited mid-syscall; the
                // new client knows nothing about it.
                self.syscall_continuation = SyscallContinuation::None;
            }

            match self.client_request() {
                Ok(()) => {}
                Err(ServerError::Comms(e)) => {
                    warn!("dropping client: {}", e);
                    self.rsp.close();
                }
                Err(fatal) => return Err(fatal),
            }
        }

        Ok(())
    }

    /// Read one request packet and act on it.
    fn client_request(&mut self) -> Result<(), ServerError<C::Error>> {
        let body = match self.rsp.get_pkt() {
            Ok(body) => body,
            Err(e) => {
                // comms failure: close and let the outer loop reconnect
                warn!("failed to read request: {}", e);
                self.rsp.close();
                return Ok(());
            }
        };

        match Command::parse(&body) {
            Command::ExtendedRemote => self.send_str("OK"),
            Command::LastSignal => self.report_stop(TargetSignal::Trap),
            Command::Argv => {
                warn!("RSP 'A' packet not supported: ignored");
                self.send_str("E01")
            }
            Command::Deprecated(b) => {
                warn!("deprecated RSP '{}' packet: ignored", b as char);
                Ok(())
            }
            Command::SyscallReply(reply) => self.syscall_reply(reply),
            Command::Continue => self.cont(),
            Command::Detach => {
                // Detach by dropping the client; execution rules say the
                // target keeps its state for the next session.
                self.send_str("OK")?;
                self.rsp.close();
                Ok(())
            }
            Command::ReadAllRegs => self.read_all_regs(),
            Command::WriteAllRegs(data) => self.write_all_regs(&data),
            Command::SetThread => self.send_str("OK"),
            Command::CycleStep => self.report_stop(TargetSignal::Trap),
            Command::Kill => {
                match self.kill_behaviour {
                    KillBehaviour::ExitOnKill => self.exit_server = true,
                    KillBehaviour::ResetOnKill => {}
                }
                Ok(())
            }
            Command::ReadMem { addr, len } => self.read_mem(addr, len),
            Command::WriteMem { addr, data } => self.write_mem(addr, &data),
            Command::ReadReg(reg) => self.read_reg(reg),
            Command::WriteReg { reg, val } => self.write_reg(reg, val),
            Command::Query(q) => self.query(q),
            Command::Set => self.send_str(""),
            Command::Restart => Ok(()),
            Command::Step => self.step(),
            Command::ThreadAlive => self.send_str("OK"),
            Command::VPacket => self.send_str(""),
            Command::WriteMemBin { addr, len, data } => self.write_mem_bin(addr, len, &data),
            Command::InsertMatchpoint(mp) => self.insert_matchpoint(mp),
            Command::RemoveMatchpoint(mp) => self.remove_matchpoint(mp),
            Command::Malformed(b) => {
                warn!(
                    "failed to parse RSP '{}' packet {:?}",
                    b as char,
                    String::from_utf8_lossy(&body)
                );
                self.send_str("E01")
            }
            Command::Unknown(b) => {
                warn!("unknown RSP request '{}': ignored", b as char);
                Ok(())
            }
        }
    }

    /// Send the current reply packet.
    fn put(&mut self) -> Result<(), ServerError<C::Error>> {
        self.rsp.put_pkt(&self.pkt).map_err(ServerError::Comms)
    }

    /// Send a literal string reply.
    fn send_str(&mut self, s: &str) -> Result<(), ServerError<C::Error>> {
        self.pkt.pack_str(s);
        self.put()
    }
}
