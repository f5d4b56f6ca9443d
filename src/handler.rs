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

//! Request handling and canned responders.
//!
//! A [`Handler`] receives each parsed request together with a
//! [`ResponseWriter`] and answers it by calling one of the `respond_*`
//! functions, which rebuild the request's raw buffer in place as the
//! response and write it out. Reusing the request's buffer keeps the
//! reply path allocation-free once the buffer has warmed up.

use std::io;
use std::net::IpAddr;

use crate::message::{writer, Message, Rcode};
use crate::rr::MxRecord;
use crate::writer::ResponseWriter;

/// Implemented by any value that answers DNS requests.
pub trait Handler {
    fn serve_dns(&self, rw: &mut dyn ResponseWriter, req: &mut Message);
}

/// Encodes a response into the request's own raw buffer and writes it.
/// `append` receives the cleared buffer and the request's typed fields.
fn respond<F>(rw: &mut dyn ResponseWriter, req: &mut Message, append: F) -> io::Result<()>
where
    F: FnOnce(&mut Vec<u8>, &Message),
{
    let mut raw = std::mem::take(&mut req.raw);
    raw.clear();
    append(&mut raw, req);
    req.raw = raw;
    rw.write(&req.raw)?;
    Ok(())
}

/// Replies to the request with an empty response carrying `rcode`.
pub fn respond_error(
    rw: &mut dyn ResponseWriter,
    req: &mut Message,
    rcode: Rcode,
) -> io::Result<()> {
    respond(rw, req, |raw, req| {
        writer::append_header_question(raw, req, rcode, 0, 0, 0, 0);
    })
}

/// Replies to the request with one A or AAAA answer per address.
pub fn respond_host(
    rw: &mut dyn ResponseWriter,
    req: &mut Message,
    ttl: u32,
    ips: &[IpAddr],
) -> io::Result<()> {
    respond(rw, req, |raw, req| {
        writer::append_header_question(raw, req, Rcode::NoError, 1, ips.len() as u16, 0, 0);
        writer::append_host_record(raw, req, ttl, ips);
    })
}

/// Replies to the request with a CNAME chain, optionally resolved down
/// to addresses of the final target.
pub fn respond_cname(
    rw: &mut dyn ResponseWriter,
    req: &mut Message,
    ttl: u32,
    cnames: &[&str],
    ips: &[IpAddr],
) -> io::Result<()> {
    respond(rw, req, |raw, req| {
        let ancount = (cnames.len() + ips.len()) as u16;
        writer::append_header_question(raw, req, Rcode::NoError, 1, ancount, 0, 0);
        writer::append_cname_record(raw, req, ttl, cnames, ips);
    })
}

/// Replies to the request with one NS answer per name server.
pub fn respond_ns(
    rw: &mut dyn ResponseWriter,
    req: &mut Message,
    ttl: u32,
    nameservers: &[&str],
) -> io::Result<()> {
    respond(rw, req, |raw, req| {
        let ancount = nameservers.len() as u16;
        writer::append_header_question(raw, req, Rcode::NoError, 1, ancount, 0, 0);
        writer::append_ns_record(raw, req, ttl, nameservers);
    })
}

/// Replies to the request with a single SOA answer.
#[allow(clippy::too_many_arguments)]
pub fn respond_soa(
    rw: &mut dyn ResponseWriter,
    req: &mut Message,
    ttl: u32,
    mname: &str,
    rname: &str,
    serial: u32,
    refresh: u32,
    retry: u32,
    expire: u32,
    minimum: u32,
) -> io::Result<()> {
    respond(rw, req, |raw, req| {
        writer::append_header_question(raw, req, Rcode::NoError, 1, 1, 0, 0);
        writer::append_soa_record(
            raw, req, ttl, mname, rname, serial, refresh, retry, expire, minimum,
        );
    })
}

/// Replies to the request with a single SRV answer.
#[allow(clippy::too_many_arguments)]
pub fn respond_srv(
    rw: &mut dyn ResponseWriter,
    req: &mut Message,
    ttl: u32,
    target: &str,
    priority: u16,
    weight: u16,
    port: u16,
) -> io::Result<()> {
    respond(rw, req, |raw, req| {
        writer::append_header_question(raw, req, Rcode::NoError, 1, 1, 0, 0);
        writer::append_srv_record(raw, req, ttl, target, priority, weight, port);
    })
}

/// Replies to the request with one MX answer per exchange.
pub fn respond_mx(
    rw: &mut dyn ResponseWriter,
    req: &mut Message,
    ttl: u32,
    mxs: &[MxRecord],
) -> io::Result<()> {
    respond(rw, req, |raw, req| {
        writer::append_header_question(raw, req, Rcode::NoError, 1, mxs.len() as u16, 0, 0);
        writer::append_mx_record(raw, req, ttl, mxs);
    })
}

/// Replies to the request with a single PTR answer.
pub fn respond_ptr(
    rw: &mut dyn ResponseWriter,
    req: &mut Message,
    ttl: u32,
    ptr: &str,
) -> io::Result<()> {
    respond(rw, req, |raw, req| {
        writer::append_header_question(raw, req, Rcode::NoError, 1, 1, 0, 0);
        writer::append_ptr_record(raw, req, ttl, ptr);
    })
}

/// Replies to the request with a single TXT answer.
pub fn respond_txt(
    rw: &mut dyn ResponseWriter,
    req: &mut Message,
    ttl: u32,
    txt: &str,
) -> io::Result<()> {
    respond(rw, req, |raw, req| {
        writer::append_header_question(raw, req, Rcode::NoError, 1, 1, 0, 0);
        writer::append_txt_record(raw, req, ttl, txt);
    })
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
