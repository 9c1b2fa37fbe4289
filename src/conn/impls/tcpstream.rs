use std::io;
use std::io::Read;
use std::io::Write;
use std::net::TcpListener;
use std::net::TcpStream;
use std::net::ToSocketAddrs;

use log::info;

use crate::conn::Transport;

/// TCP rendering of [`Transport`]: one listening socket, at most one
/// accepted client at a time.
pub struct TcpTransport {
    listener: TcpListener,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Wrap an already-bound listener.
    pub fn new(listener: TcpListener) -> TcpTransport {
        TcpTransport {
            listener,
            stream: None,
        }
    }

    /// Bind a listener on `addr`.
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<TcpTransport> {
        Ok(TcpTransport::new(TcpListener::bind(addr)?))
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no client attached"))
    }
}

impl Transport for TcpTransport {
    type Error = io::Error;

    fn connect(&mut self) -> io::Result<()> {
        let (stream, addr) = self.listener.accept()?;

        // The protocol is a stream of many small packets, each of which
        // blocks on its ack; leaving Nagle's algorithm on cripples it.
        stream.set_nodelay(true)?;

        info!("client connected from {}", addr);
        self.stream = Some(stream);
        Ok(())
    }

    fn close(&mut self) {
        self.stream = None;
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn read(&mut self) -> io::Result<u8> {
        let stream = self.stream()?;
        stream.set_nonblocking(false)?;

        let mut buf = [0u8];
        stream.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn peek(&mut self) -> io::Result<Option<u8>> {
        let stream = self.stream()?;
        stream.set_nonblocking(true)?;

        let mut buf = [0u8];
        match stream.peek(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let stream = self.stream()?;
        stream.set_nonblocking(false)?;
        Write::write_all(stream, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(self.stream()?)
    }
}
