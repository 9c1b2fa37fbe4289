//! The byte-transport trait and the RSP connection facade.
//!
//! [`Transport`] is the seam to the outside world: a connectable,
//! in-order byte channel with a blocking read and a non-blocking peek.
//! [`RspConnection`] layers RSP framing on top: packet acknowledgement,
//! checksum verification, bounded retransmission, and detection of the
//! out-of-band break byte GDB sends on `Ctrl-C`.

mod impls;

pub use impls::TcpTransport;

use core::fmt;

use log::{trace, warn};

use crate::protocol::hex::digit_val;
use crate::protocol::{checksum, RspPacket};

/// Times a packet is re-sent (or re-requested) before the session is
/// abandoned.
const MAX_RETRIES: usize = 10;

/// The out-of-band interrupt byte sent by the client on `Ctrl-C`.
const BREAK_BYTE: u8 = 0x03;

/// An in-order, serial, byte-wise channel to the GDB client.
pub trait Transport {
    /// Transport-specific error type.
    type Error: fmt::Display;

    /// Block until a client is attached.
    fn connect(&mut self) -> Result<(), Self::Error>;

    /// Drop the current client, if any.
    fn close(&mut self);

    fn is_connected(&self) -> bool;

    /// Read a single byte, blocking until one arrives. End-of-stream is an
    /// error; the caller reacts by closing and reconnecting.
    fn read(&mut self) -> Result<u8, Self::Error>;

    /// Peek a single byte without consuming it. This MUST be
    /// non-blocking, returning `None` when nothing is pending; it is what
    /// lets the server notice a `Ctrl-C` between run slices.
    fn peek(&mut self) -> Result<Option<u8>, Self::Error>;

    /// Write the entire buffer, blocking until complete.
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error>;

    /// Flush any buffered output to the client.
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// A failure at the framing layer. Any of these ends the session; the
/// server's outer loop closes the connection and waits for a new client.
#[derive(Debug)]
pub enum CommsError<E> {
    /// The transport failed or reached end-of-stream.
    Transport(E),
    /// The client kept rejecting (or corrupting) the same packet.
    RetriesExhausted,
}

impl<E: fmt::Display> fmt::Display for CommsError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommsError::Transport(e) => write!(f, "transport error: {}", e),
            CommsError::RetriesExhausted => {
                write!(f, "too many retransmissions; giving up on the session")
            }
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for CommsError<E> {}

/// RSP framing over a [`Transport`].
pub struct RspConnection<C: Transport> {
    transport: C,
    have_break: bool,
}

impl<C: Transport> RspConnection<C> {
    pub fn new(transport: C) -> RspConnection<C> {
        RspConnection {
            transport,
            have_break: false,
        }
    }

    /// Block until a client is attached.
    pub fn connect(&mut self) -> Result<(), C::Error> {
        self.have_break = false;
        self.transport.connect()
    }

    pub fn close(&mut self) {
        self.transport.close();
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Direct access to the underlying transport.
    pub fn transport_mut(&mut self) -> &mut C {
        &mut self.transport
    }

    /// Has a break byte arrived?
    ///
    /// Drains any pending `0x03` bytes from the front of the input without
    /// consuming a framed packet. The latch is cleared by reporting it, so
    /// each break is delivered exactly once.
    pub fn have_break(&mut self) -> bool {
        while let Ok(Some(BREAK_BYTE)) = self.transport.peek() {
            let _ = self.transport.read();
            self.have_break = true;
        }
        core::mem::take(&mut self.have_break)
    }

    fn read_byte(&mut self) -> Result<u8, CommsError<C::Error>> {
        self.transport.read().map_err(CommsError::Transport)
    }

    fn send_byte(&mut self, byte: u8) -> Result<(), CommsError<C::Error>> {
        self.transport
            .write_all(&[byte])
            .and_then(|()| self.transport.flush())
            .map_err(CommsError::Transport)
    }

    /// Read one framed packet, acknowledging it, and return its payload.
    ///
    /// Bytes outside a frame are skipped (a break byte among them is
    /// latched). A checksum mismatch is nack'd and the packet re-awaited,
    /// up to [`MAX_RETRIES`] times.
    pub fn get_pkt(&mut self) -> Result<Vec<u8>, CommsError<C::Error>> {
        let mut attempts = 0;
        loop {
            // resync on the start-of-packet marker
            loop {
                match self.read_byte()? {
                    b'$' => break,
                    BREAK_BYTE => self.have_break = true,
                    _ => {}
                }
            }

            let mut body = Vec::new();
            loop {
                match self.read_byte()? {
                    b'#' => break,
                    // a stray '$' means the sender restarted the packet
                    b'$' => body.clear(),
                    b => body.push(b),
                }
            }

            let hi = self.read_byte()?;
            let lo = self.read_byte()?;
            let sent = digit_val(hi)
                .zip(digit_val(lo))
                .map(|(h, l)| (h << 4) | l);

            if sent == Some(checksum(&body)) {
                self.send_byte(b'+')?;
                trace!("<-- ${}#{:02x}", String::from_utf8_lossy(&body), checksum(&body));
                return Ok(body);
            }

            warn!(
                "bad checksum on inbound packet (got {:?}, calculated {:#04x}): requesting retransmission",
                sent,
                checksum(&body)
            );
            self.send_byte(b'-')?;
            attempts += 1;
            if attempts >= MAX_RETRIES {
                return Err(CommsError::RetriesExhausted);
            }
        }
    }

    /// Send a framed packet and wait for the client's acknowledgement,
    /// retransmitting on nack up to [`MAX_RETRIES`] times.
    pub fn put_pkt(&mut self, pkt: &RspPacket) -> Result<(), CommsError<C::Error>> {
        let frame = pkt.frame();
        trace!("--> {}", String::from_utf8_lossy(&frame));

        for _ in 0..MAX_RETRIES {
            self.transport
                .write_all(&frame)
                .and_then(|()| self.transport.flush())
                .map_err(CommsError::Transport)?;

            loop {
                match self.read_byte()? {
                    b'+' => return Ok(()),
                    b'-' => {
                        warn!("client nack'd reply packet: retransmitting");
                        break;
                    }
                    BREAK_BYTE => self.have_break = true,
                    other => trace!("ignoring {:#04x} while awaiting ack", other),
                }
            }
        }

        Err(CommsError::RetriesExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug)]
    struct Closed;

    impl fmt::Display for Closed {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "stream closed")
        }
    }

    /// A transport fed from a canned byte script.
    struct Scripted {
        rx: VecDeque<u8>,
        tx: Vec<u8>,
    }

    impl Scripted {
        fn new(rx: &[u8]) -> Scripted {
            Scripted {
                rx: rx.iter().copied().collect(),
                tx: Vec::new(),
            }
        }
    }

    impl Transport for Scripted {
        type Error = Closed;

        fn connect(&mut self) -> Result<(), Closed> {
            Ok(())
        }

        fn close(&mut self) {}

        fn is_connected(&self) -> bool {
            true
        }

        fn read(&mut self) -> Result<u8, Closed> {
            self.rx.pop_front().ok_or(Closed)
        }

        fn peek(&mut self) -> Result<Option<u8>, Closed> {
            Ok(self.rx.front().copied())
        }

        fn write_all(&mut self, buf: &[u8]) -> Result<(), Closed> {
            self.tx.extend_from_slice(buf);
            Ok(())
        }

        fn flush(&mut self) -> Result<(), Closed> {
            Ok(())
        }
    }

    #[test]
    fn get_pkt_acks_good_checksum() {
        let mut conn = RspConnection::new(Scripted::new(b"$OK#9a"));
        assert_eq!(conn.get_pkt().unwrap(), b"OK");
        assert_eq!(conn.transport_mut().tx, b"+");
    }

    #[test]
    fn get_pkt_skips_line_noise() {
        let mut conn = RspConnection::new(Scripted::new(b"xx$OK#9a"));
        assert_eq!(conn.get_pkt().unwrap(), b"OK");
    }

    #[test]
    fn get_pkt_nacks_bad_checksum_then_retries() {
        let mut conn = RspConnection::new(Scripted::new(b"$OK#00$OK#9a"));
        assert_eq!(conn.get_pkt().unwrap(), b"OK");
        assert_eq!(conn.transport_mut().tx, b"-+");
    }

    #[test]
    fn get_pkt_gives_up_after_max_retries() {
        let mut bad = Vec::new();
        for _ in 0..MAX_RETRIES {
            bad.extend_from_slice(b"$OK#00");
        }
        let mut conn = RspConnection::new(Scripted::new(&bad));
        assert!(matches!(
            conn.get_pkt(),
            Err(CommsError::RetriesExhausted)
        ));
    }

    #[test]
    fn put_pkt_retransmits_on_nack() {
        let mut conn = RspConnection::new(Scripted::new(b"-+"));
        let mut pkt = RspPacket::new(16);
        pkt.pack_str("OK");
        conn.put_pkt(&pkt).unwrap();
        assert_eq!(conn.transport_mut().tx, b"$OK#9a$OK#9a");
    }

    #[test]
    fn put_pkt_latches_break_while_waiting_for_ack() {
        let mut conn = RspConnection::new(Scripted::new(&[0x03, b'+']));
        let mut pkt = RspPacket::new(16);
        pkt.pack_str("OK");
        conn.put_pkt(&pkt).unwrap();
        assert!(conn.have_break());
        assert!(!conn.have_break());
    }

    #[test]
    fn break_byte_latched_during_resync() {
        let mut conn = RspConnection::new(Scripted::new(&[0x03, b'$', b'c', b'#', b'6', b'3']));
        assert_eq!(conn.get_pkt().unwrap(), b"c");
        assert!(conn.have_break());
    }

    #[test]
    fn have_break_consumes_pending_break_bytes() {
        let mut conn = RspConnection::new(Scripted::new(&[0x03, 0x03, b'$']));
        assert!(conn.have_break());
        // the '$' is still there for the next get_pkt
        assert_eq!(conn.transport_mut().rx.front(), Some(&b'$'));
    }
}
