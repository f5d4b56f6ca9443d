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

//! A UDP client with a connected-socket pool.
//!
//! [`Client::exchange`] sends one query and receives one response over
//! a connected UDP socket drawn from a per-client pool. Sockets whose
//! last exchange completed cleanly are reused; any failed exchange
//! discards its socket, since a garbled or mismatched reply means the
//! genuine one may still be in flight and would surface as a stale
//! datagram on the next exchange.

use std::fmt;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Mutex;
use std::time::Duration;

use log::debug;
use rand::Rng;

use crate::message::{Message, ParseError};

/// The largest response datagram the client will accept. Plain DNS
/// over UDP caps at 512 octets, but many resolvers send more when the
/// client is EDNS-capable, so leave generous headroom.
const MAX_UDP_PAYLOAD: usize = 4096;

////////////////////////////////////////////////////////////////////////
// CLIENTS                                                            //
////////////////////////////////////////////////////////////////////////

/// A DNS client holding a pool of connected UDP sockets to one server.
pub struct Client {
    server: SocketAddr,
    timeout: Duration,
    max_conns: usize,
    state: Mutex<PoolState>,
}

/// `live` counts every socket this client has open, whether idle or
/// borrowed by an in-flight exchange; discarding a socket is the only
/// thing that decrements it.
struct PoolState {
    idle: Vec<UdpSocket>,
    live: usize,
}

impl Client {
    /// Creates a client for `server`. Every exchange uses `timeout` as
    /// the read timeout, and at most `max_conns` sockets are open at
    /// once.
    pub fn new(server: SocketAddr, timeout: Duration, max_conns: usize) -> Self {
        Self {
            server,
            timeout,
            max_conns,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                live: 0,
            }),
        }
    }

    /// Sends `req` and receives the matching response into `resp`.
    ///
    /// If the request's transaction ID is zero, a random nonzero ID is
    /// assigned first (and patched into the already-encoded raw
    /// octets). The response is parsed with full name validation, and
    /// its transaction ID must match the request's; a mismatch fails
    /// with [`ExchangeError::ReplyMismatch`] and poisons the socket.
    pub fn exchange(&self, req: &mut Message, resp: &mut Message) -> Result<(), ExchangeError> {
        if req.header.id == 0 {
            let id = rand::thread_rng().gen_range(1..=u16::MAX);
            req.header.id = id;
            if req.raw.len() >= 2 {
                req.raw[..2].copy_from_slice(&id.to_be_bytes());
            }
        }

        let conn = self.acquire_conn()?;
        match self.exchange_on(&conn, req, resp) {
            Ok(()) => {
                self.release_conn(conn);
                Ok(())
            }
            Err(err) => {
                debug!("discarding connection to {}: {}", self.server, err);
                self.discard_conn(conn);
                Err(err)
            }
        }
    }

    fn exchange_on(
        &self,
        conn: &UdpSocket,
        req: &Message,
        resp: &mut Message,
    ) -> Result<(), ExchangeError> {
        conn.send(&req.raw).map_err(ExchangeError::Transport)?;

        resp.raw.resize(MAX_UDP_PAYLOAD, 0);
        let len = conn.recv(&mut resp.raw).map_err(|err| {
            match err.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ExchangeError::Timeout,
                _ => ExchangeError::Transport(err),
            }
        })?;
        resp.raw.truncate(len);

        resp.parse(true).map_err(ExchangeError::BadReply)?;
        if resp.header.id != req.header.id {
            return Err(ExchangeError::ReplyMismatch);
        }
        Ok(())
    }

    fn acquire_conn(&self) -> Result<UdpSocket, ExchangeError> {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(conn) = state.idle.pop() {
                return Ok(conn);
            }
            if state.live >= self.max_conns {
                return Err(ExchangeError::PoolExhausted);
            }
            state.live += 1;
        }
        self.connect().map_err(|err| {
            self.state.lock().unwrap().live -= 1;
            ExchangeError::Transport(err)
        })
    }

    fn connect(&self) -> io::Result<UdpSocket> {
        let bind_addr: SocketAddr = if self.server.is_ipv4() {
            "0.0.0.0:0".parse().unwrap()
        } else {
            "[::]:0".parse().unwrap()
        };
        let conn = UdpSocket::bind(bind_addr)?;
        conn.connect(self.server)?;
        conn.set_read_timeout(Some(self.timeout))?;
        Ok(conn)
    }

    fn release_conn(&self, conn: UdpSocket) {
        self.state.lock().unwrap().idle.push(conn);
    }

    fn discard_conn(&self, conn: UdpSocket) {
        drop(conn);
        self.state.lock().unwrap().live -= 1;
    }

    #[cfg(test)]
    fn pool_counts(&self) -> (usize, usize) {
        let state = self.state.lock().unwrap();
        (state.idle.len(), state.live)
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error produced by [`Client::exchange`].
#[derive(Debug)]
pub enum ExchangeError {
    /// The connection cap was reached and no idle socket was
    /// available.
    PoolExhausted,
    /// No response arrived within the client's read timeout.
    Timeout,
    /// Sending or receiving failed at the socket level.
    Transport(io::Error),
    /// A datagram arrived but could not be parsed as a DNS response.
    BadReply(ParseError),
    /// A well-formed response arrived carrying the wrong transaction
    /// ID.
    ReplyMismatch,
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::PoolExhausted => f.write_str("connection pool exhausted"),
            Self::Timeout => f.write_str("timed out waiting for a response"),
            Self::Transport(err) => write!(f, "transport error: {err}"),
            Self::BadReply(err) => write!(f, "unparsable response: {err}"),
            Self::ReplyMismatch => f.write_str("response transaction ID does not match request"),
        }
    }
}

impl std::error::Error for ExchangeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            Self::BadReply(err) => Some(err),
            _ => None,
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{parse_message, writer, Rcode};
    use crate::rr::{Class, Type};

    /// Starts a resolver on the loopback interface that answers every
    /// A query with 1.2.4.8 for `answers` queries, then exits. `mangle`
    /// is applied to each reply before it is sent.
    fn spawn_responder<F>(answers: usize, mangle: F) -> SocketAddr
    where
        F: Fn(&mut Vec<u8>) + Send + 'static,
    {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = socket.local_addr().unwrap();
        std::thread::spawn(move || {
            let mut buf = [0u8; MAX_UDP_PAYLOAD];
            for _ in 0..answers {
                let (len, from) = socket.recv_from(&mut buf).unwrap();
                let mut req = Message::default();
                parse_message(&mut req, &buf[..len], true).unwrap();
                let mut reply = Vec::new();
                writer::append_header_question(&mut reply, &req, Rcode::NoError, 1, 1, 0, 0);
                writer::append_host_record(&mut reply, &req, 300, &["1.2.4.8".parse().unwrap()]);
                mangle(&mut reply);
                socket.send_to(&reply, from).unwrap();
            }
        });
        addr
    }

    #[test]
    fn exchange_round_trips_and_reuses_the_socket() {
        let server = spawn_responder(2, |_| {});
        let client = Client::new(server, Duration::from_secs(2), 8);

        let mut req = Message::default();
        let mut resp = Message::default();
        for _ in 0..2 {
            req.header.id = 0;
            req.set_question("hk.phus.lu", Type::A, Class::IN);
            client.exchange(&mut req, &mut resp).unwrap();

            assert_ne!(req.header.id, 0);
            assert_eq!(resp.header.id, req.header.id);
            assert_eq!(resp.header.ancount, 1);
            assert_eq!(resp.domain, b"hk.phus.lu".to_vec());

            let mut ips = Vec::new();
            resp.visit_resource_records(|rr| {
                ips.push(rr.rdata.to_vec());
                true
            })
            .unwrap();
            assert_eq!(ips, vec![vec![1, 2, 4, 8]]);

            // The socket went back to the pool after a clean exchange.
            assert_eq!(client.pool_counts(), (1, 1));
        }
    }

    #[test]
    fn exchange_discards_the_socket_on_timeout() {
        // A bound socket that never answers.
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let client = Client::new(
            server.local_addr().unwrap(),
            Duration::from_millis(50),
            8,
        );

        let mut req = Message::default();
        let mut resp = Message::default();
        req.set_question("hk.phus.lu", Type::A, Class::IN);
        let err = client.exchange(&mut req, &mut resp).unwrap_err();
        assert!(matches!(err, ExchangeError::Timeout));
        assert_eq!(client.pool_counts(), (0, 0));
    }

    #[test]
    fn exchange_fails_fast_when_the_pool_is_exhausted() {
        let client = Client::new(
            "127.0.0.1:5300".parse().unwrap(),
            Duration::from_millis(50),
            0,
        );
        let mut req = Message::default();
        let mut resp = Message::default();
        req.set_question("hk.phus.lu", Type::A, Class::IN);
        let err = client.exchange(&mut req, &mut resp).unwrap_err();
        assert!(matches!(err, ExchangeError::PoolExhausted));
    }

    #[test]
    fn exchange_discards_the_socket_on_unparsable_replies() {
        let server = spawn_responder(1, |reply| {
            reply.truncate(4);
        });
        let client = Client::new(server, Duration::from_secs(2), 8);

        let mut req = Message::default();
        let mut resp = Message::default();
        req.set_question("hk.phus.lu", Type::A, Class::IN);
        let err = client.exchange(&mut req, &mut resp).unwrap_err();
        assert!(matches!(err, ExchangeError::BadReply(_)));
        assert_eq!(client.pool_counts(), (0, 0));
    }

    #[test]
    fn exchange_rejects_replies_with_the_wrong_id() {
        let server = spawn_responder(1, |reply| {
            reply[0] ^= 0xff;
        });
        let client = Client::new(server, Duration::from_secs(2), 8);

        let mut req = Message::default();
        let mut resp = Message::default();
        req.set_question("hk.phus.lu", Type::A, Class::IN);
        let err = client.exchange(&mut req, &mut resp).unwrap_err();
        assert!(matches!(err, ExchangeError::ReplyMismatch));
        // The poisoned socket did not go back to the pool.
        assert_eq!(client.pool_counts(), (0, 0));
    }
}
