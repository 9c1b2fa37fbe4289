//! The RSP packet codec: framing, checksums, hex encoding, and one-shot
//! parsing of request packets into typed commands.

pub mod hex;

mod commands;
mod packet;

pub use commands::{Command, Matchpoint, Query, SyscallReply};
pub use packet::{checksum, escape, unescape, RspPacket};
