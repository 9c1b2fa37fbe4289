mod tcpstream;

pub use tcpstream::TcpTransport;
