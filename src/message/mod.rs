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

//! Reading and writing of on-the-wire DNS messages.
//!
//! A [`Message`] couples the raw octets of one DNS message with the
//! typed header and question decoded from them. Parsing is a single
//! linear pass that validates the header and the (exactly one)
//! question; resource records are never decoded eagerly, only visited
//! lazily through [`Message::visit_resource_records`]. Encoding is
//! append-only into a growable buffer; see [`writer`].

use std::fmt;

mod header;
mod name;
pub mod writer;

pub use header::{Header, Opcode, Rcode, HEADER_SIZE};

use crate::pool::Reset;
use crate::rr::{Class, Type};
use name::{DottedName, NameError};

////////////////////////////////////////////////////////////////////////
// QUESTIONS                                                          //
////////////////////////////////////////////////////////////////////////

/// The single question of a DNS message.
///
/// `name` holds the verbatim wire-encoded label sequence, including
/// the trailing root octet (or the trailing compression pointer, in
/// the unusual case of a compressed QNAME). Keeping the wire form
/// around lets response builders replay it without re-encoding.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Question {
    pub name: Vec<u8>,
    pub qtype: Type,
    pub qclass: Class,
}

////////////////////////////////////////////////////////////////////////
// MESSAGES                                                           //
////////////////////////////////////////////////////////////////////////

/// One DNS message, raw octets plus the fields decoded from them.
///
/// A `Message` is either parsed from received octets with
/// [`parse_message`] or built up for sending (see
/// [`Message::set_question`] and the [`writer`] appenders). All four
/// fields own their storage so that a pooled `Message` can be reused
/// across queries without reallocating: buffers are cleared, not
/// dropped, and keep their capacity. `domain` is the decompressed
/// dot-joined question name (no trailing dot) and is only populated
/// when parsing validates names.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    pub raw: Vec<u8>,
    pub domain: Vec<u8>,
    pub header: Header,
    pub question: Question,
}

/// A sensible starting capacity for the raw buffer: large enough for
/// any classic UDP DNS message.
const INITIAL_RAW_CAPACITY: usize = 512;

impl Default for Message {
    fn default() -> Self {
        Self {
            raw: Vec::with_capacity(INITIAL_RAW_CAPACITY),
            domain: Vec::new(),
            header: Header::default(),
            question: Question::default(),
        }
    }
}

impl Reset for Message {
    fn reset(&mut self) {
        self.raw.clear();
        self.domain.clear();
        self.header = Header::default();
        self.question.name.clear();
        self.question.qtype = Type::default();
        self.question.qclass = Class::default();
    }
}

impl Message {
    /// Returns the offset of the first resource record, immediately
    /// after the question's type and class fields.
    fn records_start(&self) -> usize {
        HEADER_SIZE + self.question.name.len() + 4
    }

    /// Parses the header and question out of the message's own raw
    /// buffer. See [`parse_message`] for the contract; this variant
    /// exists so that a caller that has received octets directly into
    /// [`Message::raw`] can decode them without another copy.
    pub fn parse(&mut self, validate: bool) -> Result<(), ParseError> {
        let parsed = parse_fields(&self.raw, validate)?;
        let Message {
            raw,
            domain,
            header,
            question,
        } = self;
        domain.clear();
        domain.extend_from_slice(&parsed.domain);
        question.name.clear();
        question
            .name
            .extend_from_slice(&raw[HEADER_SIZE..parsed.name_end]);
        question.qtype = parsed.qtype;
        question.qclass = parsed.qclass;
        *header = parsed.header;
        Ok(())
    }

    /// Sets the message up as a fresh recursion-desired query for
    /// `domain`, rebuilding the raw buffer from scratch. The
    /// transaction ID already present in the header is preserved.
    pub fn set_question(&mut self, domain: &str, qtype: Type, qclass: Class) {
        self.header = Header {
            id: self.header.id,
            rd: true,
            qdcount: 1,
            ..Header::default()
        };
        self.domain.clear();
        let trimmed = domain.strip_suffix('.').unwrap_or(domain);
        self.domain.extend_from_slice(trimmed.as_bytes());
        let mut qname = std::mem::take(&mut self.question.name);
        qname.clear();
        writer::encode_domain(&mut qname, domain);
        self.question.name = qname;
        self.question.qtype = qtype;
        self.question.qclass = qclass;
        let mut raw = std::mem::take(&mut self.raw);
        raw.clear();
        writer::append_message(&mut raw, self);
        self.raw = raw;
    }

    /// Visits the resource records of the message lazily, in wire
    /// order, starting from the octet after the question. Each record
    /// is decoded from the raw buffer and handed to `visit`; returning
    /// `false` stops the walk early. The sequence is stateless: every
    /// call starts over from the beginning.
    ///
    /// The walk is bounded by the header's ANCOUNT+NSCOUNT+ARCOUNT sum
    /// and by the end of the buffer, whichever comes first. A record
    /// that is truncated or structurally malformed aborts the walk
    /// with an error.
    pub fn visit_resource_records<F>(&self, mut visit: F) -> Result<(), RecordError>
    where
        F: FnMut(&RawRecord<'_>) -> bool,
    {
        let total = self.header.ancount as usize
            + self.header.nscount as usize
            + self.header.arcount as usize;
        let mut offset = self.records_start();
        for _ in 0..total {
            if offset >= self.raw.len() {
                break;
            }
            let name_len = name::skip_name(&self.raw, offset).map_err(RecordError::from)?;
            let fixed_start = offset + name_len;
            let fixed = self
                .raw
                .get(fixed_start..fixed_start + 10)
                .ok_or(RecordError::Truncated)?;
            let rr_type = Type::from(u16::from_be_bytes([fixed[0], fixed[1]]));
            let class = Class::from(u16::from_be_bytes([fixed[2], fixed[3]]));
            let ttl = u32::from_be_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);
            let rdlength = u16::from_be_bytes([fixed[8], fixed[9]]) as usize;
            let rdata_start = fixed_start + 10;
            let rdata = self
                .raw
                .get(rdata_start..rdata_start + rdlength)
                .ok_or(RecordError::Truncated)?;
            let record = RawRecord {
                name: &self.raw[offset..fixed_start],
                rr_type,
                class,
                ttl,
                rdata,
            };
            if !visit(&record) {
                break;
            }
            offset = rdata_start + rdlength;
        }
        Ok(())
    }

    /// Decompresses a wire-encoded name found anywhere in this message
    /// (typically inside a record's RDATA) and appends its dotted form
    /// to `dst`. Pointers are resolved against the message's raw
    /// buffer, with the same cycle/forward-reference protection as
    /// question parsing.
    pub fn decode_name(&self, dst: &mut Vec<u8>, encoded: &[u8]) -> Result<(), RecordError> {
        let mut staging = DottedName::new();
        let mut index = 0;
        loop {
            let len = *encoded.get(index).ok_or(RecordError::Truncated)?;
            if len & 0xc0 == 0xc0 {
                let lo = *encoded.get(index + 1).ok_or(RecordError::Truncated)?;
                let target = ((len & 0x3f) as usize) << 8 | lo as usize;
                name::append_name(&self.raw, target, &mut staging)?;
                break;
            } else if len > name::MAX_LABEL_LEN {
                return Err(RecordError::Malformed);
            } else if len == 0 {
                break;
            } else {
                let end = index + 1 + len as usize;
                let label = encoded.get(index + 1..end).ok_or(RecordError::Truncated)?;
                if !staging.is_empty() {
                    staging.try_push(b'.').or(Err(RecordError::Malformed))?;
                }
                staging
                    .try_extend_from_slice(label)
                    .or(Err(RecordError::Malformed))?;
                index = end;
            }
        }
        dst.extend_from_slice(&staging);
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////
// PARSING                                                            //
////////////////////////////////////////////////////////////////////////

/// Parses the wire-format message in `payload` into `msg`.
///
/// The payload is copied into the message's reused raw buffer, the
/// 12-octet header is decoded, and the single question is located and
/// validated. Messages shorter than a header or with a question count
/// other than one fail with [`ParseError::InvalidHeader`]; a question
/// whose name or type/class fields are truncated or malformed fails
/// with [`ParseError::InvalidQuestion`].
///
/// When `validate` is false the question name region is only skipped,
/// not decompressed: `msg.domain` is left empty and no pointer or
/// length validation beyond locating the type/class fields is
/// performed. This is the hot-path mode for callers that trust their
/// transport framing.
///
/// On failure the typed fields of `msg` are left untouched; no
/// partially decoded message is ever observable.
pub fn parse_message(msg: &mut Message, payload: &[u8], validate: bool) -> Result<(), ParseError> {
    msg.raw.clear();
    msg.raw.extend_from_slice(payload);
    msg.parse(validate)
}

/// Everything decoded from one message before any of it is committed
/// to the `Message`, so that failures leave the caller's message
/// untouched.
struct ParsedFields {
    header: Header,
    domain: DottedName,
    name_end: usize,
    qtype: Type,
    qclass: Class,
}

fn parse_fields(raw: &[u8], validate: bool) -> Result<ParsedFields, ParseError> {
    let header_octets: &[u8; HEADER_SIZE] = raw
        .get(..HEADER_SIZE)
        .and_then(|octets| octets.try_into().ok())
        .ok_or(ParseError::InvalidHeader)?;
    let header = Header::decode(header_octets);
    if header.qdcount != 1 {
        return Err(ParseError::InvalidHeader);
    }

    let mut domain = DottedName::new();
    let name_len = if validate {
        name::append_name(raw, HEADER_SIZE, &mut domain).or(Err(ParseError::InvalidQuestion))?
    } else {
        name::skip_name(raw, HEADER_SIZE).or(Err(ParseError::InvalidQuestion))?
    };

    let name_end = HEADER_SIZE + name_len;
    let type_class = raw
        .get(name_end..name_end + 4)
        .ok_or(ParseError::InvalidQuestion)?;
    let qtype = Type::from(u16::from_be_bytes([type_class[0], type_class[1]]));
    let qclass = Class::from(u16::from_be_bytes([type_class[2], type_class[3]]));

    Ok(ParsedFields {
        header,
        domain,
        name_end,
        qtype,
        qclass,
    })
}

////////////////////////////////////////////////////////////////////////
// RAW RECORDS                                                        //
////////////////////////////////////////////////////////////////////////

/// One resource record as seen by [`Message::visit_resource_records`]:
/// typed fixed fields plus borrowed views of the owner name and RDATA.
/// Records are never materialized into a collection; this view only
/// lives for the duration of one callback invocation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RawRecord<'a> {
    pub name: &'a [u8],
    pub rr_type: Type,
    pub class: Class,
    pub ttl: u32,
    pub rdata: &'a [u8],
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a message's header or question could not be
/// parsed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ParseError {
    /// The buffer is shorter than a DNS header, or the question count
    /// is not exactly one.
    InvalidHeader,
    /// The question name or its type/class fields are truncated or
    /// malformed.
    InvalidQuestion,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::InvalidHeader => f.write_str("invalid message header"),
            Self::InvalidQuestion => f.write_str("invalid message question"),
        }
    }
}

impl std::error::Error for ParseError {}

/// An error signaling that a resource record encountered during lazy
/// visiting is truncated or malformed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RecordError {
    Truncated,
    Malformed,
}

impl From<NameError> for RecordError {
    fn from(err: NameError) -> Self {
        match err {
            NameError::UnexpectedEom => Self::Truncated,
            _ => Self::Malformed,
        }
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Truncated => f.write_str("truncated resource record"),
            Self::Malformed => f.write_str("malformed resource record"),
        }
    }
}

impl std::error::Error for RecordError {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
