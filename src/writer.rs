// Copyright 2024 the fleetdns authors.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Destinations for encoded response messages.
//!
//! A [`Handler`](crate::handler::Handler) never touches sockets
//! directly; it writes its response through a [`ResponseWriter`]. The
//! UDP implementation sends one datagram per write back to the
//! requesting client, and the in-memory implementation captures the
//! octets for tests and for transports that frame messages themselves.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

use lazy_static::lazy_static;

use crate::pool::{Pool, Reset};

/// The destination of one DNS response.
pub trait ResponseWriter {
    /// The local address of the underlying transport, if any.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// The address of the client the response goes to, if any.
    fn remote_addr(&self) -> Option<SocketAddr>;

    /// Writes one complete response message.
    fn write(&mut self, payload: &[u8]) -> io::Result<usize>;
}

////////////////////////////////////////////////////////////////////////
// IN-MEMORY WRITER                                                   //
////////////////////////////////////////////////////////////////////////

/// A [`ResponseWriter`] that appends every write to a buffer.
#[derive(Clone, Debug, Default)]
pub struct MemoryResponseWriter {
    pub data: Vec<u8>,
    pub local: Option<SocketAddr>,
    pub remote: Option<SocketAddr>,
}

impl ResponseWriter for MemoryResponseWriter {
    fn local_addr(&self) -> Option<SocketAddr> {
        self.local
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote
    }

    fn write(&mut self, payload: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(payload);
        Ok(payload.len())
    }
}

////////////////////////////////////////////////////////////////////////
// UDP WRITER                                                         //
////////////////////////////////////////////////////////////////////////

/// A [`ResponseWriter`] that sends each write as one datagram to the
/// client that sent the request.
///
/// The socket is shared with the receive loop through an [`Arc`], so
/// many writers can answer from the same listener concurrently. A
/// default-constructed writer is detached; writes fail with
/// [`io::ErrorKind::NotConnected`] until [`attach`](Self::attach) is
/// called. Detached reusable writers live in a pool, see
/// [`acquire_udp_writer`].
#[derive(Debug, Default)]
pub struct UdpResponseWriter {
    conn: Option<Arc<UdpSocket>>,
    addr: Option<SocketAddr>,
}

impl UdpResponseWriter {
    pub fn new(conn: Arc<UdpSocket>, addr: SocketAddr) -> Self {
        Self {
            conn: Some(conn),
            addr: Some(addr),
        }
    }

    /// Points the writer at a socket and a client address, typically
    /// right after receiving a datagram from that client.
    pub fn attach(&mut self, conn: Arc<UdpSocket>, addr: SocketAddr) {
        self.conn = Some(conn);
        self.addr = Some(addr);
    }
}

impl Reset for UdpResponseWriter {
    fn reset(&mut self) {
        self.conn = None;
        self.addr = None;
    }
}

impl ResponseWriter for UdpResponseWriter {
    fn local_addr(&self) -> Option<SocketAddr> {
        self.conn.as_ref().and_then(|conn| conn.local_addr().ok())
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    fn write(&mut self, payload: &[u8]) -> io::Result<usize> {
        match (&self.conn, self.addr) {
            (Some(conn), Some(addr)) => conn.send_to(payload, addr),
            _ => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "response writer is not attached to a socket",
            )),
        }
    }
}

lazy_static! {
    static ref UDP_WRITER_POOL: Pool<UdpResponseWriter> = Pool::new();
}

/// Takes a detached [`UdpResponseWriter`] from the process-wide pool.
pub fn acquire_udp_writer() -> Box<UdpResponseWriter> {
    UDP_WRITER_POOL.acquire()
}

/// Returns a [`UdpResponseWriter`] to the process-wide pool, dropping
/// its socket reference.
pub fn release_udp_writer(writer: Box<UdpResponseWriter>) {
    UDP_WRITER_POOL.release(writer);
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_writer_accumulates_writes() {
        let mut writer = MemoryResponseWriter::default();
        writer.write(b"\x00\x01").unwrap();
        writer.write(b"\x02\x03").unwrap();
        assert_eq!(writer.data, b"\x00\x01\x02\x03");
        assert!(writer.local_addr().is_none());
        assert!(writer.remote_addr().is_none());
    }

    #[test]
    fn udp_writer_sends_to_the_attached_client() {
        let server = Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap());
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        let client_addr = client.local_addr().unwrap();

        let mut writer = acquire_udp_writer();
        assert!(writer.write(b"hello").is_err());

        writer.attach(Arc::clone(&server), client_addr);
        assert_eq!(writer.remote_addr(), Some(client_addr));
        assert_eq!(writer.local_addr(), Some(server.local_addr().unwrap()));
        assert_eq!(writer.write(b"hello").unwrap(), 5);

        let mut buf = [0u8; 16];
        let (len, from) = client.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"hello");
        assert_eq!(from, server.local_addr().unwrap());

        release_udp_writer(writer);
    }
}
