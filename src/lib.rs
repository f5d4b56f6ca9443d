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

//! A fast, allocation-conscious DNS wire-protocol engine.
//!
//! fleetdns provides the building blocks for DNS clients and
//! authoritative responders that care about per-query overhead:
//!
//! - [`message`] reads and writes wire-format messages. Parsing
//!   decodes only the header and question; resource records are
//!   visited lazily against the raw octets.
//! - [`pool`] recycles [`Message`] buffers so steady-state traffic
//!   stops allocating.
//! - [`handler`] and [`writer`] form the responder side: a
//!   [`Handler`] answers each request through a [`ResponseWriter`]
//!   using canned record responders.
//! - [`client`] is a UDP query client with a connected-socket pool.
//!
//! A minimal query looks like this:
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use fleetdns::{acquire_message, release_message, Class, Client, Type};
//!
//! # fn main() -> Result<(), fleetdns::ExchangeError> {
//! let client = Client::new("8.8.8.8:53".parse().unwrap(), Duration::from_secs(2), 16);
//! let mut req = acquire_message();
//! let mut resp = acquire_message();
//! req.set_question("example.com", Type::A, Class::IN);
//! client.exchange(&mut req, &mut resp)?;
//! resp.visit_resource_records(|rr| {
//!     println!("{} {} {:?}", rr.rr_type, rr.ttl, rr.rdata);
//!     true
//! })
//! .unwrap();
//! release_message(req);
//! release_message(resp);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod handler;
pub mod message;
pub mod pool;
pub mod rr;
pub mod writer;

mod util;

pub use client::{Client, ExchangeError};
pub use handler::Handler;
pub use message::{
    parse_message, Header, Message, Opcode, ParseError, Question, RawRecord, Rcode, RecordError,
};
pub use pool::{acquire_message, release_message};
pub use rr::{Class, MxRecord, Type};
pub use writer::{MemoryResponseWriter, ResponseWriter, UdpResponseWriter};
