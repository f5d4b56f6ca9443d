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

//! Renders responses in dig-like output formats.

use std::fmt::Write;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use fleetdns::{Message, RawRecord, Type};

/// Prints just the answer data, one record per line.
pub fn short(resp: &Message) {
    let _ = resp.visit_resource_records(|rr| {
        println!("{}", render_rdata(resp, rr));
        true
    });
}

/// Prints a full dig-style report of the exchange.
pub fn report(req: &Message, resp: &Message, server: IpAddr, elapsed: Duration) {
    let mut flags = String::new();
    for (set, name) in [
        (resp.header.qr, "qr"),
        (resp.header.aa, "aa"),
        (resp.header.tc, "tc"),
        (resp.header.rd, "rd"),
        (resp.header.ra, "ra"),
    ] {
        if set {
            if !flags.is_empty() {
                flags.push(' ');
            }
            flags.push_str(name);
        }
    }

    let domain = String::from_utf8_lossy(&req.domain);
    println!();
    println!(
        "; <<>> fleetdig {} <<>> {} {}",
        env!("CARGO_PKG_VERSION"),
        req.question.qtype,
        domain
    );
    println!(";; global options: +cmd +noedns");
    println!(";; Got answer:");
    println!(
        ";; ->>HEADER<<- opcode: {}, status: {}, id: {}",
        resp.header.opcode, resp.header.rcode, resp.header.id
    );
    println!(
        ";; flags: {}; QUERY: {}, ANSWER: {}, AUTHORITY: {}, ADDITIONAL: {}",
        flags, resp.header.qdcount, resp.header.ancount, resp.header.nscount, resp.header.arcount
    );

    println!();
    println!(";; QUESTION SECTION:");
    println!(
        ";{}.\t\t{}\t{}",
        domain, req.question.qclass, req.question.qtype
    );

    println!();
    if resp.header.ancount > 0 {
        println!(";; ANSWER SECTION:");
    } else {
        println!(";; AUTHORITY SECTION:");
    }
    let _ = resp.visit_resource_records(|rr| {
        let mut owner = Vec::new();
        if resp.decode_name(&mut owner, rr.name).is_err() {
            return false;
        }
        println!(
            "{}.\t{}\t{}\t{}\t{}",
            String::from_utf8_lossy(&owner),
            rr.ttl,
            rr.class,
            rr.rr_type,
            render_rdata(resp, rr)
        );
        true
    });

    println!();
    println!(";; Query time: {} msec", elapsed.as_millis());
    println!(";; SERVER: {server}#53({server})");
    println!(";; MSG SIZE  rcvd: {}", resp.raw.len());
    println!();
}

/// Renders one record's RDATA the way dig would, falling back to hex
/// for types without a presentation format here.
fn render_rdata(resp: &Message, rr: &RawRecord) -> String {
    match rr.rr_type {
        Type::A => match <[u8; 4]>::try_from(rr.rdata) {
            Ok(octets) => Ipv4Addr::from(octets).to_string(),
            Err(_) => hex_string(rr.rdata),
        },
        Type::AAAA => match <[u8; 16]>::try_from(rr.rdata) {
            Ok(octets) => Ipv6Addr::from(octets).to_string(),
            Err(_) => hex_string(rr.rdata),
        },
        Type::CNAME | Type::NS | Type::PTR => match decoded_name(resp, rr.rdata) {
            Some(name) => format!("{name}."),
            None => hex_string(rr.rdata),
        },
        Type::MX if rr.rdata.len() > 2 => {
            let priority = u16::from_be_bytes([rr.rdata[0], rr.rdata[1]]);
            match decoded_name(resp, &rr.rdata[2..]) {
                Some(host) => format!("{priority} {host}."),
                None => hex_string(rr.rdata),
            }
        }
        Type::TXT => match txt_chunks(rr.rdata) {
            Some(chunks) => chunks,
            None => hex_string(rr.rdata),
        },
        _ => hex_string(rr.rdata),
    }
}

/// Renders TXT RDATA as its quoted character-strings, one pair of
/// quotes per length-prefixed chunk. Returns `None` if a chunk length
/// overruns the data.
fn txt_chunks(rdata: &[u8]) -> Option<String> {
    let mut text = String::new();
    let mut rest = rdata;
    while !rest.is_empty() {
        let len = rest[0] as usize;
        let chunk = rest.get(1..1 + len)?;
        if !text.is_empty() {
            text.push(' ');
        }
        let _ = write!(text, "\"{}\"", String::from_utf8_lossy(chunk));
        rest = &rest[1 + len..];
    }
    Some(text)
}

fn decoded_name(resp: &Message, encoded: &[u8]) -> Option<String> {
    let mut name = Vec::new();
    resp.decode_name(&mut name, encoded).ok()?;
    String::from_utf8(name).ok()
}

fn hex_string(octets: &[u8]) -> String {
    let mut text = String::with_capacity(octets.len() * 2);
    for octet in octets {
        let _ = write!(text, "{octet:02x}");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::txt_chunks;

    #[test]
    fn txt_chunks_quotes_each_character_string() {
        assert_eq!(txt_chunks(b"\x05hello").unwrap(), "\"hello\"");

        // A two-chunk record: the interior length octet separates the
        // chunks instead of leaking into the text.
        let mut rdata = vec![0xff];
        rdata.extend_from_slice(&[b'a'; 0xff]);
        rdata.push(2);
        rdata.extend_from_slice(b"bc");
        let expected = format!("\"{}\" \"bc\"", "a".repeat(0xff));
        assert_eq!(txt_chunks(&rdata).unwrap(), expected);
    }

    #[test]
    fn txt_chunks_rejects_overrunning_lengths() {
        assert_eq!(txt_chunks(b"\x10abc"), None);
    }
}
