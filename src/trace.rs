//! Run-time-switchable trace flags.
//!
//! Unlike the `log` level (fixed by whatever logger the embedding process
//! installs), these flags are owned by the server and can be toggled over
//! the wire with `monitor set debug <flag> <on|off>`.

use bitflags::bitflags;

bitflags! {
    /// Named boolean switches controlling optional diagnostics.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct TraceFlags: u32 {
        /// Trace RSP packet handling in the dispatcher.
        const RSP = 1 << 0;
        /// Trace connection-level events.
        const CONN = 1 << 1;
        /// Trace breakpoint insertion/removal.
        const BREAK = 1 << 2;
        /// Trace execution control (continue/step/stop).
        const EXEC = 1 << 3;
        /// Trace memory accesses made on behalf of the client.
        const MEM = 1 << 4;
    }
}

const FLAG_NAMES: &[(&str, TraceFlags)] = &[
    ("rsp", TraceFlags::RSP),
    ("conn", TraceFlags::CONN),
    ("break", TraceFlags::BREAK),
    ("exec", TraceFlags::EXEC),
    ("mem", TraceFlags::MEM),
];

impl TraceFlags {
    /// Is `name` a known flag?
    pub fn is_flag(name: &str) -> bool {
        FLAG_NAMES.iter().any(|(n, _)| *n == name)
    }

    /// Current value of the named flag. Unknown names read as off; callers
    /// that care should check [`TraceFlags::is_flag`] first.
    pub fn flag(&self, name: &str) -> bool {
        FLAG_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| self.contains(*f))
            .unwrap_or(false)
    }

    /// Set the named flag. Returns false if the name is unknown.
    pub fn set_flag(&mut self, name: &str, on: bool) -> bool {
        match FLAG_NAMES.iter().find(|(n, _)| *n == name) {
            Some((_, f)) => {
                self.set(*f, on);
                true
            }
            None => false,
        }
    }

    /// All flag names, in a stable order.
    pub fn names() -> impl Iterator<Item = &'static str> {
        FLAG_NAMES.iter().map(|(n, _)| *n)
    }

    pub fn rsp(&self) -> bool {
        self.contains(TraceFlags::RSP)
    }

    pub fn conn(&self) -> bool {
        self.contains(TraceFlags::CONN)
    }

    pub fn breakpoints(&self) -> bool {
        self.contains(TraceFlags::BREAK)
    }

    pub fn exec(&self) -> bool {
        self.contains(TraceFlags::EXEC)
    }

    pub fn mem(&self) -> bool {
        self.contains(TraceFlags::MEM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_by_name() {
        let mut flags = TraceFlags::default();
        assert!(!flags.rsp());
        assert!(flags.set_flag("rsp", true));
        assert!(flags.rsp());
        assert!(flags.flag("rsp"));
        assert!(flags.set_flag("rsp", false));
        assert!(!flags.flag("rsp"));
    }

    #[test]
    fn unknown_flag() {
        let mut flags = TraceFlags::default();
        assert!(!TraceFlags::is_flag("bogus"));
        assert!(!flags.set_flag("bogus", true));
        assert!(!flags.flag("bogus"));
    }

    #[test]
    fn names_cover_all_flags() {
        let mut flags = TraceFlags::default();
        for name in TraceFlags::names() {
            assert!(flags.set_flag(name, true));
        }
        assert_eq!(flags, TraceFlags::all());
    }
}
