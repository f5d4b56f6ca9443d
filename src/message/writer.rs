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

//! Append-only encoding of DNS messages and resource records.
//!
//! All functions here append wire octets to a growable buffer and
//! never fail: the buffer is the message under construction, usually a
//! [`Message`]'s reused raw buffer. Record appenders compress owner
//! names with a pointer to the question name at its fixed offset of
//! 12, so they require that the buffer already starts with a header
//! and a question (see [`append_header_question`]).

use std::net::IpAddr;

use super::{Message, Rcode, HEADER_SIZE};
use crate::rr::{MxRecord, Type};

/// The offset of the question name in any message with a single
/// question, used as the compression target for record owner names.
const QUESTION_NAME_OFFSET: usize = HEADER_SIZE;

////////////////////////////////////////////////////////////////////////
// DOMAIN NAMES                                                       //
////////////////////////////////////////////////////////////////////////

/// Appends the uncompressed wire encoding of a dotted domain name:
/// one length-prefixed label per dot-separated component, then the
/// root octet. Empty components (from a trailing dot or doubled dots)
/// are skipped, so `"example.com."` and `"example.com"` encode
/// identically.
pub fn encode_domain(dst: &mut Vec<u8>, domain: &str) {
    for label in domain.split('.').filter(|label| !label.is_empty()) {
        dst.push(label.len() as u8);
        dst.extend_from_slice(label.as_bytes());
    }
    dst.push(0);
}

////////////////////////////////////////////////////////////////////////
// HEADERS AND QUESTIONS                                              //
////////////////////////////////////////////////////////////////////////

/// Appends a response header derived from `msg`'s header, followed by
/// `msg`'s question when `qdcount` is nonzero.
///
/// The QR bit is forced on (this always writes a response), the
/// response code and all four section counts come from the arguments,
/// and everything else (ID, opcode, flags) is echoed from the request.
pub fn append_header_question(
    dst: &mut Vec<u8>,
    msg: &Message,
    rcode: Rcode,
    qdcount: u16,
    ancount: u16,
    nscount: u16,
    arcount: u16,
) {
    let header = super::Header {
        qr: true,
        rcode,
        qdcount,
        ancount,
        nscount,
        arcount,
        ..msg.header
    };
    dst.extend_from_slice(&header.encode());
    if qdcount != 0 {
        append_question(dst, msg);
    }
}

/// Appends `msg`'s header and question verbatim, exactly as the typed
/// fields describe them. This is the encoding path for queries built
/// with [`Message::set_question`].
pub fn append_message(dst: &mut Vec<u8>, msg: &Message) {
    dst.extend_from_slice(&msg.header.encode());
    if msg.header.qdcount != 0 {
        append_question(dst, msg);
    }
}

fn append_question(dst: &mut Vec<u8>, msg: &Message) {
    dst.extend_from_slice(&msg.question.name);
    dst.extend_from_slice(&u16::from(msg.question.qtype).to_be_bytes());
    dst.extend_from_slice(&u16::from(msg.question.qclass).to_be_bytes());
}

////////////////////////////////////////////////////////////////////////
// RESOURCE RECORDS                                                   //
////////////////////////////////////////////////////////////////////////

/// Appends a compression pointer to `offset`.
fn append_pointer(dst: &mut Vec<u8>, offset: usize) {
    debug_assert!(offset < 0x4000, "compression pointer offset out of range");
    dst.push(0xc0 | (offset >> 8) as u8);
    dst.push(offset as u8);
}

/// Appends the fixed record fields up to and including a placeholder
/// RDLENGTH, returning the placeholder's position so the caller can
/// patch it once the RDATA has been appended.
fn append_record_header(
    dst: &mut Vec<u8>,
    name_offset: usize,
    rr_type: Type,
    msg: &Message,
    ttl: u32,
) -> usize {
    append_pointer(dst, name_offset);
    dst.extend_from_slice(&u16::from(rr_type).to_be_bytes());
    dst.extend_from_slice(&u16::from(msg.question.qclass).to_be_bytes());
    dst.extend_from_slice(&ttl.to_be_bytes());
    let rdlength_pos = dst.len();
    dst.extend_from_slice(&[0, 0]);
    rdlength_pos
}

/// Patches the RDLENGTH placeholder written by [`append_record_header`]
/// now that the RDATA runs from just past the placeholder to the
/// current end of the buffer.
fn patch_rdlength(dst: &mut Vec<u8>, rdlength_pos: usize) {
    let rdlength = (dst.len() - rdlength_pos - 2) as u16;
    dst[rdlength_pos..rdlength_pos + 2].copy_from_slice(&rdlength.to_be_bytes());
}

fn append_addresses(dst: &mut Vec<u8>, msg: &Message, ttl: u32, ips: &[IpAddr], name_offset: usize) {
    for ip in ips {
        let rr_type = match ip {
            IpAddr::V4(_) => Type::A,
            IpAddr::V6(_) => Type::AAAA,
        };
        let rdlength_pos = append_record_header(dst, name_offset, rr_type, msg, ttl);
        match ip {
            IpAddr::V4(addr) => dst.extend_from_slice(&addr.octets()),
            IpAddr::V6(addr) => dst.extend_from_slice(&addr.octets()),
        }
        patch_rdlength(dst, rdlength_pos);
    }
}

/// Appends one A or AAAA answer per address, owned by the question
/// name. Addresses can mix families freely.
pub fn append_host_record(dst: &mut Vec<u8>, msg: &Message, ttl: u32, ips: &[IpAddr]) {
    append_addresses(dst, msg, ttl, ips, QUESTION_NAME_OFFSET);
}

/// Appends a CNAME chain and, optionally, address answers for its
/// final target.
///
/// The first CNAME is owned by the question name; each subsequent
/// record is owned (via a compression pointer) by the previous
/// record's target, and the trailing address records are owned by the
/// last target. Callers count the total answers appended as
/// `cnames.len() + ips.len()`.
pub fn append_cname_record(
    dst: &mut Vec<u8>,
    msg: &Message,
    ttl: u32,
    cnames: &[&str],
    ips: &[IpAddr],
) {
    let mut name_offset = QUESTION_NAME_OFFSET;
    for cname in cnames {
        let rdlength_pos = append_record_header(dst, name_offset, Type::CNAME, msg, ttl);
        name_offset = dst.len();
        encode_domain(dst, cname);
        patch_rdlength(dst, rdlength_pos);
    }
    if !ips.is_empty() {
        append_addresses(dst, msg, ttl, ips, name_offset);
    }
}

/// Appends one NS answer per name server, owned by the question name.
pub fn append_ns_record(dst: &mut Vec<u8>, msg: &Message, ttl: u32, nameservers: &[&str]) {
    for nameserver in nameservers {
        let rdlength_pos = append_record_header(dst, QUESTION_NAME_OFFSET, Type::NS, msg, ttl);
        encode_domain(dst, nameserver);
        patch_rdlength(dst, rdlength_pos);
    }
}

/// Appends a single SOA answer owned by the question name.
#[allow(clippy::too_many_arguments)]
pub fn append_soa_record(
    dst: &mut Vec<u8>,
    msg: &Message,
    ttl: u32,
    mname: &str,
    rname: &str,
    serial: u32,
    refresh: u32,
    retry: u32,
    expire: u32,
    minimum: u32,
) {
    let rdlength_pos = append_record_header(dst, QUESTION_NAME_OFFSET, Type::SOA, msg, ttl);
    encode_domain(dst, mname);
    encode_domain(dst, rname);
    for value in [serial, refresh, retry, expire, minimum] {
        dst.extend_from_slice(&value.to_be_bytes());
    }
    patch_rdlength(dst, rdlength_pos);
}

/// Appends a single SRV answer owned by the question name.
pub fn append_srv_record(
    dst: &mut Vec<u8>,
    msg: &Message,
    ttl: u32,
    target: &str,
    priority: u16,
    weight: u16,
    port: u16,
) {
    let rdlength_pos = append_record_header(dst, QUESTION_NAME_OFFSET, Type::SRV, msg, ttl);
    dst.extend_from_slice(&priority.to_be_bytes());
    dst.extend_from_slice(&weight.to_be_bytes());
    dst.extend_from_slice(&port.to_be_bytes());
    encode_domain(dst, target);
    patch_rdlength(dst, rdlength_pos);
}

/// Appends one MX answer per exchange, owned by the question name.
pub fn append_mx_record(dst: &mut Vec<u8>, msg: &Message, ttl: u32, mxs: &[MxRecord]) {
    for mx in mxs {
        let rdlength_pos = append_record_header(dst, QUESTION_NAME_OFFSET, Type::MX, msg, ttl);
        dst.extend_from_slice(&mx.priority.to_be_bytes());
        encode_domain(dst, &mx.host);
        patch_rdlength(dst, rdlength_pos);
    }
}

/// Appends a single PTR answer owned by the question name.
pub fn append_ptr_record(dst: &mut Vec<u8>, msg: &Message, ttl: u32, ptr: &str) {
    let rdlength_pos = append_record_header(dst, QUESTION_NAME_OFFSET, Type::PTR, msg, ttl);
    encode_domain(dst, ptr);
    patch_rdlength(dst, rdlength_pos);
}

/// Appends a single TXT answer owned by the question name. Text longer
/// than 255 octets is split into maximal character-string chunks;
/// empty text becomes one zero-length chunk.
pub fn append_txt_record(dst: &mut Vec<u8>, msg: &Message, ttl: u32, txt: &str) {
    let rdlength_pos = append_record_header(dst, QUESTION_NAME_OFFSET, Type::TXT, msg, ttl);
    let mut rest = txt.as_bytes();
    while rest.len() > 0xff {
        dst.push(0xff);
        dst.extend_from_slice(&rest[..0xff]);
        rest = &rest[0xff..];
    }
    dst.push(rest.len() as u8);
    dst.extend_from_slice(rest);
    patch_rdlength(dst, rdlength_pos);
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::parse_message;
    use crate::rr::Class;
    use crate::util::hex;

    fn request() -> Message {
        let mut msg = Message::default();
        msg.header.id = 0x0002;
        msg.set_question("hk.phus.lu", Type::A, Class::IN);
        msg
    }

    #[test]
    fn append_message_round_trips_parsed_queries() {
        let vectors = [
            "00020100000100000000000002686b0470687573026c750000010001",
            "0001010000010000000000000131033530033136380331393207696e2d61646472046172706100000c0001",
        ];
        for vector in vectors {
            let payload = hex::decode(vector);
            let mut msg = Message::default();
            parse_message(&mut msg, &payload, true).unwrap();
            let mut dst = Vec::new();
            append_message(&mut dst, &msg);
            assert_eq!(hex::encode(&dst), *vector);
        }
    }

    #[test]
    fn append_header_question_forces_the_response_bit() {
        let msg = request();
        let mut dst = Vec::new();
        append_header_question(&mut dst, &msg, Rcode::NxDomain, 0, 0, 0, 0);
        assert_eq!(hex::encode(&dst), "000281030000000000000000");
    }

    #[test]
    fn append_host_record_encodes_a_answers() {
        let msg = request();
        let mut dst = Vec::new();
        append_header_question(&mut dst, &msg, Rcode::NoError, 1, 1, 0, 0);
        append_host_record(&mut dst, &msg, 300, &["1.2.4.8".parse().unwrap()]);
        assert_eq!(
            hex::encode(&dst),
            "00028100000100010000000002686b0470687573026c750000010001\
             c00c000100010000012c000401020408"
        );
    }

    #[test]
    fn append_host_record_encodes_aaaa_answers() {
        let msg = request();
        let mut dst = Vec::new();
        append_host_record(&mut dst, &msg, 300, &["::1".parse().unwrap()]);
        assert_eq!(
            hex::encode(&dst),
            "c00c001c00010000012c001000000000000000000000000000000001"
        );
    }

    #[test]
    fn append_cname_record_chains_owner_pointers() {
        let msg = request();
        let mut dst = Vec::new();
        append_header_question(&mut dst, &msg, Rcode::NoError, 1, 3, 0, 0);
        let question_end = dst.len();
        append_cname_record(
            &mut dst,
            &msg,
            300,
            &["cname.example.org", "a.example.net"],
            &["1.2.4.8".parse().unwrap()],
        );

        // First CNAME is owned by the question name.
        assert_eq!(&dst[question_end..question_end + 2], &[0xc0, 0x0c]);
        // The second CNAME's owner pointer targets the first record's
        // RDATA, which starts 12 octets into the first record.
        let first_rdata = question_end + 12;
        let second = first_rdata + "cname.example.org".len() + 2;
        assert_eq!(
            &dst[second..second + 2],
            &[0xc0 | (first_rdata >> 8) as u8, first_rdata as u8]
        );
        // The A record's owner pointer targets the second record's
        // RDATA.
        let second_rdata = second + 12;
        let a_record = second_rdata + "a.example.net".len() + 2;
        assert_eq!(
            &dst[a_record..a_record + 2],
            &[0xc0 | (second_rdata >> 8) as u8, second_rdata as u8]
        );
        assert_eq!(&dst[dst.len() - 4..], &[1, 2, 4, 8]);
    }

    #[test]
    fn append_soa_record_matches_the_reference_encoding() {
        let msg = request();
        let mut dst = Vec::new();
        append_header_question(&mut dst, &msg, Rcode::NoError, 1, 1, 0, 0);
        append_soa_record(
            &mut dst,
            &msg,
            300,
            "ns1.google.com",
            "dns-admin.google.com",
            0x40000000,
            900,
            900,
            1800,
            60,
        );
        assert_eq!(
            hex::encode(&dst),
            "00028100000100010000000002686b0470687573026c750000010001\
             c00c000600010000012c003a036e733106676f6f676c6503636f6d00\
             09646e732d61646d696e06676f6f676c6503636f6d00\
             400000000000038400000384000007080000003c"
        );
    }

    #[test]
    fn append_srv_record_matches_the_reference_encoding() {
        let msg = request();
        let mut dst = Vec::new();
        append_srv_record(&mut dst, &msg, 300, "service1.example.org", 1000, 1000, 80);
        assert_eq!(
            hex::encode(&dst),
            "c00c002100010000012c001c03e803e80050\
             087365727669636531076578616d706c65036f726700"
        );
    }

    #[test]
    fn append_mx_record_matches_the_reference_encoding() {
        let msg = request();
        let mut dst = Vec::new();
        append_mx_record(
            &mut dst,
            &msg,
            300,
            &[MxRecord {
                priority: 10,
                host: "mail.google.com".to_string(),
            }],
        );
        assert_eq!(
            hex::encode(&dst),
            "c00c000f00010000012c0013000a046d61696c06676f6f676c6503636f6d00"
        );
    }

    #[test]
    fn append_ptr_record_matches_the_reference_encoding() {
        let msg = request();
        let mut dst = Vec::new();
        append_ptr_record(&mut dst, &msg, 300, "ptr.example.org");
        assert_eq!(
            hex::encode(&dst),
            "c00c000c00010000012c001103707472076578616d706c65036f726700"
        );
    }

    #[test]
    fn append_txt_record_chunks_long_text() {
        let msg = request();
        let mut dst = Vec::new();
        let txt = "A".repeat(600);
        append_txt_record(&mut dst, &msg, 300, &txt);

        // RDLENGTH covers three chunks of 255, 255, and 90 octets plus
        // their length prefixes.
        assert_eq!(&dst[10..12], &603u16.to_be_bytes());
        assert_eq!(dst[12], 0xff);
        assert_eq!(dst[12 + 256], 0xff);
        assert_eq!(dst[12 + 512], 90);
        assert_eq!(dst.len(), 12 + 603);
    }

    #[test]
    fn append_txt_record_encodes_short_text() {
        let msg = request();
        let mut dst = Vec::new();
        append_txt_record(&mut dst, &msg, 300, "helloworld");
        assert_eq!(
            hex::encode(&dst),
            "c00c001000010000012c000b0a68656c6c6f776f726c64"
        );
    }
}
