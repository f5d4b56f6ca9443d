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

//! The fixed 12-octet DNS message header and its bit-level layout.

use std::fmt;

/// The size of a DNS message header in octets.
pub const HEADER_SIZE: usize = 12;

const QR_MASK: u8 = 0x80;
const OPCODE_MASK: u8 = 0x78;
const OPCODE_SHIFT: usize = 3;
const AA_MASK: u8 = 0x04;
const TC_MASK: u8 = 0x02;
const RD_MASK: u8 = 0x01;
const RA_MASK: u8 = 0x80;
const Z_MASK: u8 = 0x70;
const Z_SHIFT: usize = 4;
const RCODE_MASK: u8 = 0x0f;

////////////////////////////////////////////////////////////////////////
// HEADER                                                             //
////////////////////////////////////////////////////////////////////////

/// The decoded fields of a DNS message header.
///
/// The wire layout ([RFC 1035 § 4.1.1]) packs the flag fields into the
/// two octets following the ID: octet 2 carries QR (bit 7), the opcode
/// (bits 6–3), AA (bit 2), TC (bit 1), and RD (bit 0); octet 3 carries
/// RA (bit 7), Z (bits 6–4), and the RCODE (bits 3–0). The
/// [`encode`](Header::encode)/[`decode`](Header::decode) pair is
/// bit-exact with that layout, and neither touches the heap.
///
/// [RFC 1035 § 4.1.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.1
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    pub id: u16,
    pub qr: bool,
    pub opcode: Opcode,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub z: u8,
    pub rcode: Rcode,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl Header {
    /// Decodes a header from its wire representation.
    pub fn decode(octets: &[u8; HEADER_SIZE]) -> Self {
        Self {
            id: u16::from_be_bytes([octets[0], octets[1]]),
            qr: octets[2] & QR_MASK != 0,
            opcode: ((octets[2] & OPCODE_MASK) >> OPCODE_SHIFT)
                .try_into()
                .unwrap(),
            aa: octets[2] & AA_MASK != 0,
            tc: octets[2] & TC_MASK != 0,
            rd: octets[2] & RD_MASK != 0,
            ra: octets[3] & RA_MASK != 0,
            z: (octets[3] & Z_MASK) >> Z_SHIFT,
            rcode: (octets[3] & RCODE_MASK).try_into().unwrap(),
            qdcount: u16::from_be_bytes([octets[4], octets[5]]),
            ancount: u16::from_be_bytes([octets[6], octets[7]]),
            nscount: u16::from_be_bytes([octets[8], octets[9]]),
            arcount: u16::from_be_bytes([octets[10], octets[11]]),
        }
    }

    /// Encodes the header into its wire representation.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let id = self.id.to_be_bytes();
        let qdcount = self.qdcount.to_be_bytes();
        let ancount = self.ancount.to_be_bytes();
        let nscount = self.nscount.to_be_bytes();
        let arcount = self.arcount.to_be_bytes();
        [
            id[0],
            id[1],
            (self.qr as u8) << 7
                | u8::from(self.opcode) << OPCODE_SHIFT
                | (self.aa as u8) << 2
                | (self.tc as u8) << 1
                | self.rd as u8,
            (self.ra as u8) << 7 | (self.z & 0x07) << Z_SHIFT | u8::from(self.rcode),
            qdcount[0],
            qdcount[1],
            ancount[0],
            ancount[1],
            nscount[0],
            nscount[1],
            arcount[0],
            arcount[1],
        ]
    }
}

impl Default for Header {
    fn default() -> Self {
        Self {
            id: 0,
            qr: false,
            opcode: Opcode::Query,
            aa: false,
            tc: false,
            rd: false,
            ra: false,
            z: 0,
            rcode: Rcode::NoError,
            qdcount: 0,
            ancount: 0,
            nscount: 0,
            arcount: 0,
        }
    }
}

////////////////////////////////////////////////////////////////////////
// OPCODES                                                            //
////////////////////////////////////////////////////////////////////////

/// The opcode value of the DNS message header.
///
/// A four-bit field indicating the kind of query the message makes.
/// The names are those listed by the IANA; values without an assigned
/// meaning decode to [`Opcode::Unassigned`].
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Opcode {
    Query,
    IQuery,
    Status,
    Notify,
    Update,
    Unassigned(u8),
}

impl TryFrom<u8> for Opcode {
    type Error = IntoOpcodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Query),
            1 => Ok(Self::IQuery),
            2 => Ok(Self::Status),
            4 => Ok(Self::Notify),
            5 => Ok(Self::Update),
            3 | 6..=15 => Ok(Self::Unassigned(value)),
            _ => Err(IntoOpcodeError),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        match value {
            Opcode::Query => 0,
            Opcode::IQuery => 1,
            Opcode::Status => 2,
            Opcode::Notify => 4,
            Opcode::Update => 5,
            Opcode::Unassigned(v) => v,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Query => f.write_str("QUERY"),
            Self::IQuery => f.write_str("IQUERY"),
            Self::Status => f.write_str("STATUS"),
            Self::Notify => f.write_str("NOTIFY"),
            Self::Update => f.write_str("UPDATE"),
            Self::Unassigned(v) => write!(f, "OPCODE{v}"),
        }
    }
}

/// An error signaling that the provided value is not a valid opcode.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct IntoOpcodeError;

impl fmt::Display for IntoOpcodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("not a valid opcode")
    }
}

impl std::error::Error for IntoOpcodeError {}

////////////////////////////////////////////////////////////////////////
// RCODES                                                             //
////////////////////////////////////////////////////////////////////////

/// The RCODE value of the DNS message header.
///
/// A four-bit field indicating success or failure in a DNS response.
/// Extended RCODEs carried in OPT pseudo-RRs are not implemented.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Rcode {
    NoError,
    FormErr,
    ServFail,
    NxDomain,
    NotImp,
    Refused,
    YxDomain,
    YxRrset,
    NxRrset,
    NotAuth,
    NotZone,
    Unassigned(u8),
}

impl TryFrom<u8> for Rcode {
    type Error = IntoRcodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::NoError),
            1 => Ok(Self::FormErr),
            2 => Ok(Self::ServFail),
            3 => Ok(Self::NxDomain),
            4 => Ok(Self::NotImp),
            5 => Ok(Self::Refused),
            6 => Ok(Self::YxDomain),
            7 => Ok(Self::YxRrset),
            8 => Ok(Self::NxRrset),
            9 => Ok(Self::NotAuth),
            10 => Ok(Self::NotZone),
            11..=15 => Ok(Self::Unassigned(value)),
            _ => Err(IntoRcodeError),
        }
    }
}

impl From<Rcode> for u8 {
    fn from(value: Rcode) -> Self {
        match value {
            Rcode::NoError => 0,
            Rcode::FormErr => 1,
            Rcode::ServFail => 2,
            Rcode::NxDomain => 3,
            Rcode::NotImp => 4,
            Rcode::Refused => 5,
            Rcode::YxDomain => 6,
            Rcode::YxRrset => 7,
            Rcode::NxRrset => 8,
            Rcode::NotAuth => 9,
            Rcode::NotZone => 10,
            Rcode::Unassigned(v) => v,
        }
    }
}

impl fmt::Display for Rcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::NoError => f.write_str("NOERROR"),
            Self::FormErr => f.write_str("FORMERR"),
            Self::ServFail => f.write_str("SERVFAIL"),
            Self::NxDomain => f.write_str("NXDOMAIN"),
            Self::NotImp => f.write_str("NOTIMP"),
            Self::Refused => f.write_str("REFUSED"),
            Self::YxDomain => f.write_str("YXDOMAIN"),
            Self::YxRrset => f.write_str("YXRRSET"),
            Self::NxRrset => f.write_str("NXRRSET"),
            Self::NotAuth => f.write_str("NOTAUTH"),
            Self::NotZone => f.write_str("NOTZONE"),
            Self::Unassigned(v) => write!(f, "RCODE{v}"),
        }
    }
}

/// An error signaling that the provided value is not a valid RCODE.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IntoRcodeError;

impl fmt::Display for IntoRcodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("not a valid RCODE")
    }
}

impl std::error::Error for IntoRcodeError {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trips_all_flag_combinations() {
        for bits in 0u8..16 {
            for opcode_raw in 0u8..16 {
                for rcode_raw in 0u8..16 {
                    let header = Header {
                        id: 0x1234,
                        qr: bits & 0x8 != 0,
                        opcode: opcode_raw.try_into().unwrap(),
                        aa: bits & 0x4 != 0,
                        tc: bits & 0x2 != 0,
                        rd: bits & 0x1 != 0,
                        ra: false,
                        z: 0,
                        rcode: rcode_raw.try_into().unwrap(),
                        qdcount: 1,
                        ancount: 2,
                        nscount: 3,
                        arcount: 4,
                    };
                    assert_eq!(Header::decode(&header.encode()), header);
                }
            }
        }
    }

    #[test]
    fn decode_standard_query_flags() {
        // Flags 0x0100: a standard query with only RD set.
        let header = Header::decode(b"\x00\x02\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00");
        assert_eq!(header.id, 2);
        assert!(!header.qr);
        assert_eq!(header.opcode, Opcode::Query);
        assert!(!header.aa && !header.tc && !header.ra);
        assert!(header.rd);
        assert_eq!(header.z, 0);
        assert_eq!(header.rcode, Rcode::NoError);
        assert_eq!(header.qdcount, 1);
    }

    #[test]
    fn decode_response_flags() {
        // Flags 0x8180: QR, RD and RA set.
        let header = Header::decode(b"\xe2\xd7\x81\x80\x00\x01\x00\x02\x00\x00\x00\x01");
        assert!(header.qr && header.rd && header.ra);
        assert!(!header.aa && !header.tc);
        assert_eq!(header.ancount, 2);
        assert_eq!(header.arcount, 1);
    }

    #[test]
    fn z_bits_occupy_bits_six_through_four() {
        let header = Header {
            z: 0x7,
            ..Default::default()
        };
        assert_eq!(header.encode()[3], 0x70);
        assert_eq!(Header::decode(&header.encode()).z, 0x7);
    }
}
