//! Parent-chain encoding
//!
//! A region's replication parents are stored as one blob in the barrier
//! family. Names are joined with a two-byte separator `0xFF 0x00`; a literal
//! `0xFF` inside a name is doubled. Decoding is the exact inverse, so any
//! list of non-empty names survives a round trip byte for byte.
//!
//! ```text
//! names:   ["a\xFFb", "c"]
//! encoded: 61 FF FF 62 FF 00 63
//! ```

use regionmeta_core::bytes::to_string_binary;
use regionmeta_core::{CatalogError, CatalogResult, RegionInfo};

const ESCAPE_BYTE: u8 = 0xFF;
const SEPARATED_BYTE: u8 = 0x00;

/// Join parent names into one blob
///
/// # Errors
///
/// `InvalidArgument` for an empty list or an empty name.
pub fn encode_parents<N: AsRef<[u8]>>(names: &[N]) -> CatalogResult<Vec<u8>> {
    if names.is_empty() {
        return Err(CatalogError::InvalidArgument(
            "parent chain must name at least one region".to_string(),
        ));
    }
    let mut out = Vec::with_capacity(names.iter().map(|n| n.as_ref().len() + 2).sum());
    for (i, name) in names.iter().enumerate() {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(CatalogError::InvalidArgument(format!(
                "parent name at position {} is empty",
                i
            )));
        }
        if i > 0 {
            out.push(ESCAPE_BYTE);
            out.push(SEPARATED_BYTE);
        }
        for &b in name {
            if b == ESCAPE_BYTE {
                out.push(ESCAPE_BYTE);
            }
            out.push(b);
        }
    }
    Ok(out)
}

/// Join the region names of `parents`
pub fn encode_parent_regions(parents: &[&RegionInfo]) -> CatalogResult<Vec<u8>> {
    let names: Vec<&[u8]> = parents.iter().map(|p| p.region_name()).collect();
    encode_parents(&names)
}

/// Split a blob back into parent names
///
/// An empty blob holds no parents.
///
/// # Errors
///
/// `MalformedAncestry` when an escape byte is followed by anything other
/// than another escape byte or the separator, or ends the blob.
pub fn decode_parents(bytes: &[u8]) -> CatalogResult<Vec<Vec<u8>>> {
    let mut parents = Vec::new();
    let mut current = Vec::new();
    let mut iter = bytes.iter().copied().enumerate();
    while let Some((pos, b)) = iter.next() {
        if b != ESCAPE_BYTE {
            current.push(b);
            continue;
        }
        match iter.next() {
            Some((_, ESCAPE_BYTE)) => current.push(ESCAPE_BYTE),
            Some((_, SEPARATED_BYTE)) => parents.push(std::mem::take(&mut current)),
            Some((_, other)) => {
                return Err(CatalogError::MalformedAncestry(format!(
                    "unexpected byte 0x{:02X} after escape at offset {} in '{}'",
                    other,
                    pos,
                    to_string_binary(bytes)
                )))
            }
            None => {
                return Err(CatalogError::MalformedAncestry(format!(
                    "dangling escape at end of '{}'",
                    to_string_binary(bytes)
                )))
            }
        }
    }
    if !current.is_empty() {
        parents.push(current);
    }
    Ok(parents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_name_is_verbatim() {
        assert_eq!(encode_parents(&[b"t,,1.abc."]).unwrap(), b"t,,1.abc.".to_vec());
    }

    #[test]
    fn test_escape_and_separator() {
        let names: [&[u8]; 2] = [b"a\xFFb", b"c"];
        let encoded = encode_parents(&names).unwrap();
        assert_eq!(encoded, vec![0x61, 0xFF, 0xFF, 0x62, 0xFF, 0x00, 0x63]);
        assert_eq!(decode_parents(&encoded).unwrap(), vec![b"a\xFFb".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_names_with_zero_bytes() {
        let names: [&[u8]; 3] = [b"\x00", b"\x00\xFF", b"\xFF\x00"];
        let encoded = encode_parents(&names).unwrap();
        let decoded = decode_parents(&encoded).unwrap();
        assert_eq!(decoded.len(), 3);
        for (d, n) in decoded.iter().zip(names.iter()) {
            assert_eq!(d.as_slice(), *n);
        }
    }

    #[test]
    fn test_empty_inputs() {
        let none: [&[u8]; 0] = [];
        assert!(matches!(encode_parents(&none), Err(CatalogError::InvalidArgument(_))));
        let with_empty: [&[u8]; 2] = [b"a", b""];
        assert!(matches!(encode_parents(&with_empty), Err(CatalogError::InvalidArgument(_))));
        assert!(decode_parents(b"").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_blobs() {
        assert!(matches!(decode_parents(b"abc\xFF"), Err(CatalogError::MalformedAncestry(_))));
        assert!(matches!(decode_parents(b"a\xFF\x01b"), Err(CatalogError::MalformedAncestry(_))));
    }

    proptest! {
        #[test]
        fn prop_parent_chain_roundtrip(
            names in prop::collection::vec(
                prop::collection::vec(prop_oneof![Just(0xFFu8), Just(0x00u8), any::<u8>()], 1..16),
                1..6,
            )
        ) {
            let encoded = encode_parents(&names).unwrap();
            prop_assert_eq!(decode_parents(&encoded).unwrap(), names);
        }
    }
}
