//! Register and memory I/O handlers.

use core::mem::size_of;

use log::{trace, warn};

use crate::common::{RegVal, RISCV_NUM_REGS};
use crate::conn::Transport;
use crate::target::Target;

use super::{GdbServer, ServerError};

impl<T: Target, C: Transport> GdbServer<T, C> {
    /// `g`: every register's value, packed little-endian at its native
    /// width, in register-number order.
    pub(super) fn read_all_regs(&mut self) -> Result<(), ServerError<C::Error>> {
        self.pkt.clear();
        for reg in 0..RISCV_NUM_REGS {
            match self.cpu.read_register(reg) {
                Some((val, size)) => self.pkt.push_hex_le(u64::from(val), size),
                None => {
                    warn!("register {} unreadable: packing zeros", reg);
                    self.pkt.push_hex_le(0, size_of::<RegVal>());
                }
            }
        }
        self.put()
    }

    /// `G`: the reverse of `g`, advancing by the native register width.
    pub(super) fn write_all_regs(&mut self, data: &[u8]) -> Result<(), ServerError<C::Error>> {
        let width = size_of::<RegVal>();
        if data.len() != RISCV_NUM_REGS * width {
            warn!(
                "'G' packet carried {} bytes, expected {}: ignored",
                data.len(),
                RISCV_NUM_REGS * width
            );
            return self.send_str("E01");
        }

        for (reg, chunk) in data.chunks_exact(width).enumerate() {
            let val = RegVal::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let written = self.cpu.write_register(reg, val);
            if written != width {
                warn!("size != {} when writing reg {}", width, reg);
            }
        }

        self.send_str("OK")
    }

    /// `m<addr>,<len>`: reply with `2*len` hex digits, lowest address
    /// first. The length is clipped so the reply fits the packet buffer.
    pub(super) fn read_mem(&mut self, addr: u32, mut len: usize) -> Result<(), ServerError<C::Error>> {
        // 2 hex digits per byte; clip against the buffer without
        // multiplying the wire-supplied length
        let max = (self.pkt.buf_size() - 1) / 2;
        if len > max {
            warn!("memory read of {} bytes too large for RSP packet: truncated", len);
            len = max;
        }

        let mut buf = vec![0u8; len];
        let n = self.cpu.read(addr, &mut buf);
        if n < len {
            warn!("short memory read: {} of {} bytes at {:#x}", n, len, addr);
        }
        if self.trace_flags.mem() {
            trace!("read {} bytes at {:#x}", n, addr);
        }

        self.pkt.clear();
        self.pkt.push_hex_buf(&buf[..n]);
        self.put()
    }

    /// `M<addr>,<len>:<hex>`: the data length was validated against the
    /// length field at parse time.
    pub(super) fn write_mem(&mut self, addr: u32, data: &[u8]) -> Result<(), ServerError<C::Error>> {
        let n = self.cpu.write(addr, data);
        if n != data.len() {
            warn!("short memory write: {} of {} bytes at {:#x}", n, data.len(), addr);
        }
        if self.trace_flags.mem() {
            trace!("wrote {} bytes at {:#x}", n, addr);
        }
        self.send_str("OK")
    }

    /// `X<addr>,<len>:<binary>`: the payload arrives unescaped; a length
    /// disagreement is resolved toward the shorter of the two.
    pub(super) fn write_mem_bin(
        &mut self,
        addr: u32,
        len: usize,
        data: &[u8],
    ) -> Result<(), ServerError<C::Error>> {
        let mut len = len;
        if data.len() != len {
            let min = len.min(data.len());
            warn!(
                "binary write of {} bytes requested, but {} bytes supplied: {} will be written",
                len,
                data.len(),
                min
            );
            len = min;
        }

        let n = self.cpu.write(addr, &data[..len]);
        if n != len {
            warn!("failed to write {} bytes to {:#x}", len, addr);
        }
        self.send_str("OK")
    }

    /// `p<reg>`: one register, or `E01` if there is no such register.
    pub(super) fn read_reg(&mut self, reg: usize) -> Result<(), ServerError<C::Error>> {
        match self.cpu.read_register(reg) {
            Some((val, size)) => {
                self.pkt.clear();
                self.pkt.push_hex_le(u64::from(val), size);
                self.put()
            }
            None => {
                warn!("read of unknown register {}", reg);
                self.send_str("E01")
            }
        }
    }

    /// `P<reg>=<val>`: short writes warn but still reply `OK`.
    pub(super) fn write_reg(&mut self, reg: usize, val: RegVal) -> Result<(), ServerError<C::Error>> {
        let width = size_of::<RegVal>();
        let written = self.cpu.write_register(reg, val);
        if written != width {
            warn!("size != {} when writing reg {}", width, reg);
        }
        self.send_str("OK")
    }
}
