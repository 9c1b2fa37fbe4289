//! Request packets parsed into a typed [`Command`].
//!
//! The raw payload is parsed exactly once, here; the dispatcher pattern
//! matches on the result and never re-scans packet text.

use crate::common::RegVal;
use crate::matchpoint::MpKind;

use super::hex::{decode_hex, decode_hex_buf, decode_le};
use super::packet::unescape;

/// A parsed client request.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    /// `!`: extended remote mode requested.
    ExtendedRemote,
    /// `?`: report the last stop reason.
    LastSignal,
    /// `A`: argv initialization, unsupported.
    Argv,
    /// `b` `B` `d` `r` `t`: deprecated packets, ignored with a warning.
    Deprecated(u8),
    /// `F`: reply to a host syscall request.
    SyscallReply(SyscallReply),
    /// `c` / `C`: continue (any signal argument is ignored).
    Continue,
    /// `D`: detach.
    Detach,
    /// `g`: read all registers.
    ReadAllRegs,
    /// `G`: write all registers; carries the decoded little-endian bytes.
    WriteAllRegs(Vec<u8>),
    /// `H`: set thread for subsequent operations.
    SetThread,
    /// `i` / `I`: cycle step, unsupported.
    CycleStep,
    /// `k`: kill.
    Kill,
    /// `m<addr>,<len>`: read memory.
    ReadMem { addr: u32, len: usize },
    /// `M<addr>,<len>:<hex>`: write memory; data already decoded.
    WriteMem { addr: u32, data: Vec<u8> },
    /// `p<reg>`: read one register.
    ReadReg(usize),
    /// `P<reg>=<val>`: write one register.
    WriteReg { reg: usize, val: RegVal },
    /// `q…`: query.
    Query(Query),
    /// `Q…`: set; none supported.
    Set,
    /// `R`: restart, ignored.
    Restart,
    /// `s` / `S`: single step (any signal argument is ignored).
    Step,
    /// `T`: thread alive check.
    ThreadAlive,
    /// `v…`: none supported.
    VPacket,
    /// `X<addr>,<len>:<binary>`: write memory; data already unescaped.
    WriteMemBin { addr: u32, len: usize, data: Vec<u8> },
    /// `Z…`: insert a matchpoint.
    InsertMatchpoint(Matchpoint),
    /// `z…`: remove a matchpoint.
    RemoveMatchpoint(Matchpoint),
    /// A recognized request byte with an unparseable body.
    Malformed(u8),
    /// An unrecognized request byte.
    Unknown(u8),
}

/// The fields of a `Z`/`z` packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Matchpoint {
    pub kind: MpKind,
    pub addr: u32,
    pub len: usize,
}

/// A `q` sub-request.
#[derive(Debug, PartialEq, Eq)]
pub enum Query {
    /// `qC`: current thread id.
    CurrentThread,
    /// `qCRC…`: memory CRC, unsupported.
    Crc,
    /// `qfThreadInfo`.
    ThreadInfoFirst,
    /// `qsThreadInfo`.
    ThreadInfoNext,
    /// `qL…`: deprecated thread list.
    ThreadList,
    /// `qRcmd,<hex>`: monitor command, already decoded to text.
    Rcmd(String),
    /// `qSupported…`.
    Supported,
    /// `qSymbol:…`.
    Symbol,
    /// `qThreadExtraInfo,…`.
    ThreadExtraInfo,
    /// Anything else; answered with the empty packet.
    Other,
}

/// A parsed `F<retcode>[,<errno>][;C]` syscall reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyscallReply {
    pub retcode: i64,
    pub errno: Option<i64>,
    /// The user pressed `Ctrl-C` while the host call was in flight.
    pub ctrl_c: bool,
}

impl SyscallReply {
    fn parse(body: &[u8]) -> Option<SyscallReply> {
        let (head, ctrl_c) = match body.iter().position(|b| *b == b';') {
            Some(i) => (&body[..i], body.get(i + 1) == Some(&b'C')),
            None => (body, false),
        };

        let mut parts = head.split(|b| *b == b',');
        let retcode = parse_signed_hex(parts.next()?)?;
        let errno = match parts.next() {
            Some(field) => Some(parse_signed_hex(field)?),
            None => None,
        };
        if parts.next().is_some() {
            return None;
        }

        Some(SyscallReply {
            retcode,
            errno,
            ctrl_c,
        })
    }
}

fn parse_signed_hex(field: &[u8]) -> Option<i64> {
    match field.split_first() {
        Some((b'-', rest)) => decode_hex::<i64>(rest).ok().map(|v| -v),
        _ => decode_hex::<i64>(field).ok(),
    }
}

/// Parse `<prefix><addr>,<len>` with an optional trailing `:`, returning
/// the fields and the index just past the length digits.
fn parse_addr_len(body: &[u8]) -> Option<(u32, usize, usize)> {
    let comma = body.iter().position(|b| *b == b',')?;
    let addr = decode_hex::<u32>(&body[..comma]).ok()?;
    let rest = &body[comma + 1..];
    let end = rest
        .iter()
        .position(|b| *b == b':')
        .unwrap_or(rest.len());
    let len = decode_hex::<usize>(&rest[..end]).ok()?;
    Some((addr, len, comma + 1 + end))
}

fn parse_matchpoint(body: &[u8]) -> Option<Matchpoint> {
    // <type>,<addr>,<len>, all hex
    let mut fields = body.split(|b| *b == b',');
    let kind = MpKind::from_code(decode_hex::<u8>(fields.next()?).ok()?)?;
    let addr = decode_hex::<u32>(fields.next()?).ok()?;
    let len = decode_hex::<usize>(fields.next()?).ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(Matchpoint { kind, addr, len })
}

impl Command {
    /// Parse a packet payload (the bytes between `$` and `#`).
    pub fn parse(body: &[u8]) -> Command {
        let first = match body.first() {
            Some(b) => *b,
            None => return Command::Unknown(0),
        };
        let rest = &body[1..];

        match first {
            b'!' => Command::ExtendedRemote,
            b'?' => Command::LastSignal,
            b'A' => Command::Argv,
            b'b' | b'B' | b'd' | b'r' | b't' => Command::Deprecated(first),
            b'F' => match SyscallReply::parse(rest) {
                Some(reply) => Command::SyscallReply(reply),
                None => Command::Malformed(first),
            },
            b'c' | b'C' => Command::Continue,
            b'D' => Command::Detach,
            b'g' => Command::ReadAllRegs,
            b'G' => match decode_hex_buf(rest) {
                Some(data) => Command::WriteAllRegs(data),
                None => Command::Malformed(first),
            },
            b'H' => Command::SetThread,
            b'i' | b'I' => Command::CycleStep,
            b'k' => Command::Kill,
            b'm' => match parse_addr_len(rest) {
                Some((addr, len, _)) => Command::ReadMem { addr, len },
                None => Command::Malformed(first),
            },
            b'M' => Self::parse_write_mem(rest),
            b'p' => match decode_hex::<usize>(rest) {
                Ok(reg) => Command::ReadReg(reg),
                Err(_) => Command::Malformed(first),
            },
            b'P' => Self::parse_write_reg(rest),
            b'q' => Command::Query(Query::parse(body)),
            b'Q' => Command::Set,
            b'R' => Command::Restart,
            b's' | b'S' => Command::Step,
            b'T' => Command::ThreadAlive,
            b'v' => Command::VPacket,
            b'X' => Self::parse_write_mem_bin(rest),
            b'z' => match parse_matchpoint(rest) {
                Some(mp) => Command::RemoveMatchpoint(mp),
                None => Command::Malformed(first),
            },
            b'Z' => match parse_matchpoint(rest) {
                Some(mp) => Command::InsertMatchpoint(mp),
                None => Command::Malformed(first),
            },
            other => Command::Unknown(other),
        }
    }

    fn parse_write_mem(rest: &[u8]) -> Command {
        let parsed = (|| {
            let (addr, len, used) = parse_addr_len(rest)?;
            // the length field must agree with the hex data after ':'
            let hex = rest.get(used + 1..)?;
            if rest.get(used) != Some(&b':') || hex.len() != len * 2 {
                return None;
            }
            let data = decode_hex_buf(hex)?;
            Some(Command::WriteMem { addr, data })
        })();
        parsed.unwrap_or(Command::Malformed(b'M'))
    }

    fn parse_write_mem_bin(rest: &[u8]) -> Command {
        let parsed = (|| {
            let (addr, len, used) = parse_addr_len(rest)?;
            if rest.get(used) != Some(&b':') {
                return None;
            }
            let data = unescape(&rest[used + 1..]);
            Some(Command::WriteMemBin { addr, len, data })
        })();
        parsed.unwrap_or(Command::Malformed(b'X'))
    }

    fn parse_write_reg(rest: &[u8]) -> Command {
        let parsed = (|| {
            let eq = rest.iter().position(|b| *b == b'=')?;
            let reg = decode_hex::<usize>(&rest[..eq]).ok()?;
            let hex = &rest[eq + 1..];
            let width = core::mem::size_of::<RegVal>();
            if hex.len() != width * 2 {
                return None;
            }
            let val = decode_le(hex, width)? as RegVal;
            Some(Command::WriteReg { reg, val })
        })();
        parsed.unwrap_or(Command::Malformed(b'P'))
    }
}

impl Query {
    fn parse(body: &[u8]) -> Query {
        match body {
            b"qC" => Query::CurrentThread,
            b"qfThreadInfo" => Query::ThreadInfoFirst,
            b"qsThreadInfo" => Query::ThreadInfoNext,
            _ if body.starts_with(b"qCRC") => Query::Crc,
            _ if body.starts_with(b"qL") => Query::ThreadList,
            _ if body.starts_with(b"qRcmd,") => {
                match decode_hex_buf(&body[b"qRcmd,".len()..]) {
                    Some(bytes) => Query::Rcmd(String::from_utf8_lossy(&bytes).into_owned()),
                    None => Query::Other,
                }
            }
            _ if body.starts_with(b"qSupported") => Query::Supported,
            _ if body.starts_with(b"qSymbol:") => Query::Symbol,
            _ if body.starts_with(b"qThreadExtraInfo,") => Query::ThreadExtraInfo,
            _ => Query::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_commands() {
        assert_eq!(Command::parse(b"!"), Command::ExtendedRemote);
        assert_eq!(Command::parse(b"?"), Command::LastSignal);
        assert_eq!(Command::parse(b"c"), Command::Continue);
        assert_eq!(Command::parse(b"C05"), Command::Continue);
        assert_eq!(Command::parse(b"s"), Command::Step);
        assert_eq!(Command::parse(b"k"), Command::Kill);
        assert_eq!(Command::parse(b"D"), Command::Detach);
        assert_eq!(Command::parse(b"g"), Command::ReadAllRegs);
        assert_eq!(Command::parse(b"Hg0"), Command::SetThread);
        assert_eq!(Command::parse(b"b9600"), Command::Deprecated(b'b'));
        assert_eq!(Command::parse(b"vMustReplyEmpty"), Command::VPacket);
        assert_eq!(Command::parse(b"*"), Command::Unknown(b'*'));
    }

    #[test]
    fn read_mem() {
        assert_eq!(
            Command::parse(b"m1000,4"),
            Command::ReadMem {
                addr: 0x1000,
                len: 4
            }
        );
        // trailing colon form is also accepted
        assert_eq!(
            Command::parse(b"m1000,4:"),
            Command::ReadMem {
                addr: 0x1000,
                len: 4
            }
        );
        assert_eq!(Command::parse(b"mzz,4"), Command::Malformed(b'm'));
        assert_eq!(Command::parse(b"m1000"), Command::Malformed(b'm'));
    }

    #[test]
    fn write_mem() {
        assert_eq!(
            Command::parse(b"M1000,4:deadbeef"),
            Command::WriteMem {
                addr: 0x1000,
                data: vec![0xde, 0xad, 0xbe, 0xef]
            }
        );
        // length disagreeing with the data is rejected
        assert_eq!(Command::parse(b"M1000,4:dead"), Command::Malformed(b'M'));
        assert_eq!(Command::parse(b"M1000,4"), Command::Malformed(b'M'));
    }

    #[test]
    fn write_mem_bin() {
        let mut body = b"X1800,5:".to_vec();
        body.extend_from_slice(&[b'}', 0x04, 0x01, 0x02, b'}', 0x5d, 0x03]);
        assert_eq!(
            Command::parse(&body),
            Command::WriteMemBin {
                addr: 0x1800,
                len: 5,
                data: vec![0x24, 0x01, 0x02, 0x7d, 0x03]
            }
        );
    }

    #[test]
    fn registers() {
        assert_eq!(Command::parse(b"p11"), Command::ReadReg(0x11));
        assert_eq!(Command::parse(b"p"), Command::Malformed(b'p'));
        assert_eq!(
            Command::parse(b"P5=efbeadde"),
            Command::WriteReg {
                reg: 5,
                val: 0xdeadbeef
            }
        );
        assert_eq!(Command::parse(b"P5=dead"), Command::Malformed(b'P'));
    }

    #[test]
    fn write_all_regs() {
        assert_eq!(
            Command::parse(b"Gdeadbeef"),
            Command::WriteAllRegs(vec![0xde, 0xad, 0xbe, 0xef])
        );
        assert_eq!(Command::parse(b"Gxyz"), Command::Malformed(b'G'));
    }

    #[test]
    fn matchpoints() {
        assert_eq!(
            Command::parse(b"Z0,1200,4"),
            Command::InsertMatchpoint(Matchpoint {
                kind: MpKind::SwBreak,
                addr: 0x1200,
                len: 4
            })
        );
        assert_eq!(
            Command::parse(b"z2,2000,4"),
            Command::RemoveMatchpoint(Matchpoint {
                kind: MpKind::WatchWrite,
                addr: 0x2000,
                len: 4
            })
        );
        assert_eq!(Command::parse(b"Z9,0,4"), Command::Malformed(b'Z'));
        assert_eq!(Command::parse(b"Z0,1200"), Command::Malformed(b'Z'));
    }

    #[test]
    fn queries() {
        assert_eq!(Command::parse(b"qC"), Command::Query(Query::CurrentThread));
        assert_eq!(
            Command::parse(b"qSupported:multiprocess+"),
            Command::Query(Query::Supported)
        );
        assert_eq!(
            Command::parse(b"qfThreadInfo"),
            Command::Query(Query::ThreadInfoFirst)
        );
        assert_eq!(
            Command::parse(b"qL1160000000000000000"),
            Command::Query(Query::ThreadList)
        );
        // hex for "timeout 1"
        assert_eq!(
            Command::parse(b"qRcmd,74696d656f75742031"),
            Command::Query(Query::Rcmd("timeout 1".to_string()))
        );
        assert_eq!(Command::parse(b"qOffsets"), Command::Query(Query::Other));
    }

    #[test]
    fn syscall_replies() {
        assert_eq!(
            Command::parse(b"F5"),
            Command::SyscallReply(SyscallReply {
                retcode: 5,
                errno: None,
                ctrl_c: false
            })
        );
        assert_eq!(
            Command::parse(b"F-1,9"),
            Command::SyscallReply(SyscallReply {
                retcode: -1,
                errno: Some(9),
                ctrl_c: false
            })
        );
        assert_eq!(
            Command::parse(b"F0;C"),
            Command::SyscallReply(SyscallReply {
                retcode: 0,
                errno: None,
                ctrl_c: true
            })
        );
        assert_eq!(Command::parse(b"F"), Command::Malformed(b'F'));
        assert_eq!(Command::parse(b"Fzz"), Command::Malformed(b'F'));
    }
}
