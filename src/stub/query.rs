//! `q` query dispatch.
//!
//! Anything without an explicit reply here gets the empty packet, which
//! GDB reads as "not supported" and routes around; this keeps the stub
//! tolerant of query packets newer than it is.

use log::warn;

use crate::common::DUMMY_TID;
use crate::conn::Transport;
use crate::protocol::Query;
use crate::target::Target;

use super::{GdbServer, ServerError};

impl<T: Target, C: Transport> GdbServer<T, C> {
    pub(super) fn query(&mut self, q: Query) -> Result<(), ServerError<C::Error>> {
        match q {
            Query::CurrentThread => {
                let reply = format!("QC{:x}", DUMMY_TID);
                self.send_str(&reply)
            }
            Query::Crc => {
                warn!("RSP CRC query not supported");
                self.send_str("E01")
            }
            Query::ThreadInfoFirst => {
                let reply = format!("m{:x}", DUMMY_TID);
                self.send_str(&reply)
            }
            Query::ThreadInfoNext => self.send_str("l"),
            Query::ThreadList => {
                // deprecated and replaced by qfThreadInfo; accept and lie
                warn!("RSP qL deprecated: no info returned");
                self.send_str("qM001")
            }
            Query::Rcmd(cmd) => self.monitor(&cmd),
            Query::Supported => {
                let reply = format!("PacketSize={:x}", self.pkt.buf_size());
                self.send_str(&reply)
            }
            Query::Symbol => {
                // decline to look anything up
                self.send_str("OK")
            }
            Query::ThreadExtraInfo => {
                self.pkt.pack_hex_str("Runnable\0");
                self.put()
            }
            Query::Other => self.send_str(""),
        }
    }
}
