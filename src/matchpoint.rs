//! Bookkeeping for matchpoints, GDB's umbrella term for breakpoints and
//! watchpoints.

use std::collections::HashMap;

/// The five matchpoint kinds named by `Z`/`z` packets, in wire order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MpKind {
    /// Software (memory) breakpoint, implemented by planting a trap
    /// instruction.
    SwBreak,
    /// Hardware breakpoint.
    HwBreak,
    /// Write watchpoint.
    WatchWrite,
    /// Read watchpoint.
    WatchRead,
    /// Access (read/write) watchpoint.
    WatchAccess,
}

impl MpKind {
    /// Decode the single-digit type field of a `Z`/`z` packet.
    pub fn from_code(code: u8) -> Option<MpKind> {
        match code {
            0 => Some(MpKind::SwBreak),
            1 => Some(MpKind::HwBreak),
            2 => Some(MpKind::WatchWrite),
            3 => Some(MpKind::WatchRead),
            4 => Some(MpKind::WatchAccess),
            _ => None,
        }
    }
}

/// Installed matchpoints, keyed by `(kind, address)`.
///
/// For software breakpoints the value holds the instruction bytes that
/// were displaced by the trap; the other kinds carry no payload but are
/// still recorded so removal can report whether anything was installed.
/// The same address under two distinct kinds is two records.
#[derive(Debug, Default)]
pub struct MatchpointTable {
    map: HashMap<(MpKind, u32), Vec<u8>>,
}

impl MatchpointTable {
    pub fn new() -> MatchpointTable {
        MatchpointTable::default()
    }

    /// Record a matchpoint, overwriting any previous entry for the same
    /// `(kind, addr)`.
    pub fn add(&mut self, kind: MpKind, addr: u32, instr: Vec<u8>) {
        self.map.insert((kind, addr), instr);
    }

    /// Remove a matchpoint, returning the stored instruction bytes.
    ///
    /// `None` reports that nothing was installed at `(kind, addr)`.
    pub fn remove(&mut self, kind: MpKind, addr: u32) -> Option<Vec<u8>> {
        self.map.remove(&(kind, addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_remove_roundtrip() {
        let mut table = MatchpointTable::new();
        table.add(MpKind::SwBreak, 0x1000, vec![0x13, 0x00, 0x00, 0x00]);
        assert_eq!(
            table.remove(MpKind::SwBreak, 0x1000),
            Some(vec![0x13, 0x00, 0x00, 0x00])
        );
        assert_eq!(table.remove(MpKind::SwBreak, 0x1000), None);
    }

    #[test]
    fn add_overwrites() {
        let mut table = MatchpointTable::new();
        table.add(MpKind::SwBreak, 0x1000, vec![0xaa]);
        table.add(MpKind::SwBreak, 0x1000, vec![0xbb]);
        assert_eq!(table.remove(MpKind::SwBreak, 0x1000), Some(vec![0xbb]));
    }

    #[test]
    fn kinds_are_distinct_keys() {
        let mut table = MatchpointTable::new();
        table.add(MpKind::SwBreak, 0x2000, vec![0x01]);
        table.add(MpKind::WatchWrite, 0x2000, vec![]);
        assert_eq!(table.remove(MpKind::SwBreak, 0x2000), Some(vec![0x01]));
        assert_eq!(table.remove(MpKind::WatchWrite, 0x2000), Some(vec![]));
    }

    #[test]
    fn remove_missing() {
        let mut table = MatchpointTable::new();
        assert_eq!(table.remove(MpKind::HwBreak, 0x3000), None);
    }
}
