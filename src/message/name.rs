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

//! Decoding of on-the-wire domain names, compressed or not.

use std::fmt;

use arrayvec::ArrayVec;

/// The maximum length of a label (not counting its length octet).
pub(super) const MAX_LABEL_LEN: u8 = 63;

/// The maximum length of the dotted textual form of a name. The
/// uncompressed wire form is capped at 255 octets, so the dotted form
/// (one separator per label instead of one length octet, no root) is
/// strictly shorter.
pub(super) const MAX_DOTTED_LEN: usize = 253;

/// A fixed-capacity staging buffer for one decompressed dotted name.
/// Living on the stack, it both avoids heap traffic on the parse path
/// and enforces the name length limit through its capacity.
pub(super) type DottedName = ArrayVec<u8, MAX_DOTTED_LEN>;

////////////////////////////////////////////////////////////////////////
// NAME DECOMPRESSION                                                 //
////////////////////////////////////////////////////////////////////////

/// Decompresses the name starting at index `start` of `octets`,
/// appending its dot-joined labels (no trailing dot) to `staging`.
/// Pointers are followed, with targets interpreted as indices of
/// `octets`, so the caller passes the entire DNS message.
///
/// Every pointer must reference an index strictly before the chunk it
/// appears in, as required by RFC 1035 § 4.1.4. Besides rejecting
/// forward references, this makes pointer cycles impossible: each hop
/// strictly decreases the chunk start, so the walk must terminate.
///
/// Returns the wire length of the first chunk, i.e. the number of
/// octets the name occupies at `start` before any pointer is taken.
pub(super) fn append_name(
    octets: &[u8],
    start: usize,
    staging: &mut DottedName,
) -> Result<usize, NameError> {
    let mut chunk_start = start;
    let mut index = start;
    let mut first_chunk_len = None;

    loop {
        let len = *octets.get(index).ok_or(NameError::UnexpectedEom)?;
        if len & 0xc0 == 0xc0 {
            let lo = *octets.get(index + 1).ok_or(NameError::UnexpectedEom)?;
            let target = ((len & 0x3f) as usize) << 8 | lo as usize;
            if target >= chunk_start {
                return Err(NameError::InvalidPointer);
            }
            first_chunk_len.get_or_insert(index + 2 - start);
            chunk_start = target;
            index = target;
        } else if len > MAX_LABEL_LEN {
            return Err(NameError::BadLabel);
        } else if len == 0 {
            first_chunk_len.get_or_insert(index + 1 - start);
            return Ok(first_chunk_len.unwrap());
        } else {
            let end = index + 1 + len as usize;
            let label = octets.get(index + 1..end).ok_or(NameError::UnexpectedEom)?;
            if !staging.is_empty() {
                staging.try_push(b'.').or(Err(NameError::NameTooLong))?;
            }
            staging
                .try_extend_from_slice(label)
                .or(Err(NameError::NameTooLong))?;
            index = end;
        }
    }
}

/// Walks past the name starting at index `start` of `octets` without
/// resolving pointers, returning the wire length of its first chunk.
/// Only the label structure needed to locate the end of the name is
/// checked; this is the fast path used when the caller trusts the
/// message enough to skip full decompression.
pub(super) fn skip_name(octets: &[u8], start: usize) -> Result<usize, NameError> {
    let mut index = start;
    loop {
        let len = *octets.get(index).ok_or(NameError::UnexpectedEom)?;
        if len & 0xc0 == 0xc0 {
            if index + 1 >= octets.len() {
                return Err(NameError::UnexpectedEom);
            }
            return Ok(index + 2 - start);
        } else if len > MAX_LABEL_LEN {
            return Err(NameError::BadLabel);
        } else if len == 0 {
            return Ok(index + 1 - start);
        }
        index += 1 + len as usize;
        if index - start > MAX_DOTTED_LEN + 2 {
            return Err(NameError::NameTooLong);
        }
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that an on-the-wire name could not be decoded.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(super) enum NameError {
    UnexpectedEom,
    BadLabel,
    InvalidPointer,
    NameTooLong,
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::UnexpectedEom => f.write_str("unexpected end of message in name"),
            Self::BadLabel => f.write_str("invalid label length octet"),
            Self::InvalidPointer => {
                f.write_str("compression pointer does not reference a prior occurrence")
            }
            Self::NameTooLong => f.write_str("name exceeds the maximum length"),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(octets: &[u8], start: usize) -> Result<(Vec<u8>, usize), NameError> {
        let mut staging = DottedName::new();
        let len = append_name(octets, start, &mut staging)?;
        Ok((staging.to_vec(), len))
    }

    #[test]
    fn append_name_accepts_uncompressed_names() {
        let octets = b"junk\x07example\x04test\x00junk";
        assert_eq!(decode(octets, 4), Ok((b"example.test".to_vec(), 14)));
    }

    #[test]
    fn append_name_accepts_compressed_names() {
        let octets = b"junk\x04test\x00junk\x07example\xc0\x04junk";
        assert_eq!(decode(octets, 14), Ok((b"example.test".to_vec(), 10)));
    }

    #[test]
    fn compressed_and_uncompressed_forms_decode_identically() {
        let uncompressed = b"\x02hk\x04phus\x02lu\x00";
        let compressed = b"\x04phus\x02lu\x00pad\x02hk\xc0\x00";
        let (flat, _) = decode(uncompressed, 0).unwrap();
        let (via_pointer, len) = decode(compressed, 11).unwrap();
        assert_eq!(flat, via_pointer);
        assert_eq!(flat, b"hk.phus.lu".to_vec());
        assert_eq!(len, 5);
    }

    #[test]
    fn append_name_rejects_self_and_forward_pointers() {
        // A pointer to itself...
        assert_eq!(decode(b"\xc0\x00", 0), Err(NameError::InvalidPointer));
        // ...a two-pointer cycle...
        assert_eq!(
            decode(b"\x01a\x01b\xc0\x00", 2),
            Err(NameError::InvalidPointer)
        );
        // ...and a forward reference.
        assert_eq!(
            decode(b"\x01x\xc0\x08junk\x00", 0),
            Err(NameError::InvalidPointer)
        );
    }

    #[test]
    fn append_name_rejects_truncated_names() {
        assert_eq!(decode(b"\x07example\x04tes", 0), Err(NameError::UnexpectedEom));
        assert_eq!(decode(b"\x02hk\xc0", 0), Err(NameError::UnexpectedEom));
    }

    #[test]
    fn append_name_rejects_invalid_label_lengths() {
        // 0x80 has the reserved "10" top bits.
        assert_eq!(decode(b"\x80ab\x00", 0), Err(NameError::BadLabel));
    }

    #[test]
    fn append_name_rejects_names_over_the_length_limit() {
        let mut octets = Vec::new();
        for _ in 0..127 {
            octets.extend_from_slice(b"\x01x");
        }
        octets.extend_from_slice(b"\x3fyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyy");
        octets.push(0);
        assert_eq!(decode(&octets, 0), Err(NameError::NameTooLong));
    }

    #[test]
    fn skip_name_handles_both_forms() {
        assert_eq!(skip_name(b"\x07example\x04test\x00junk", 0), Ok(14));
        assert_eq!(skip_name(b"\x07example\xc0\x0cjunk", 0), Ok(10));
        assert_eq!(skip_name(b"\xc0\x0c", 0), Ok(2));
    }

    #[test]
    fn skip_name_rejects_truncation() {
        assert_eq!(skip_name(b"\x07examp", 0), Err(NameError::UnexpectedEom));
        assert_eq!(skip_name(b"\x07example\xc0", 0), Err(NameError::UnexpectedEom));
    }
}
