//! Byte-string helpers shared by codecs and log lines

/// Render bytes for humans: printable ASCII verbatim, everything else as `\xHH`
pub fn to_string_binary(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if (b' '..=b'~').contains(&b) && b != b'\\' {
            out.push(b as char);
        } else {
            out.push_str(&format!("\\x{:02X}", b));
        }
    }
    out
}

/// Encode a big-endian `u64`
#[inline]
pub fn u64_to_bytes(v: u64) -> Vec<u8> {
    v.to_be_bytes().to_vec()
}

/// Decode a big-endian `u64`, `None` unless exactly eight bytes
#[inline]
pub fn bytes_to_u64(bytes: &[u8]) -> Option<u64> {
    let arr: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(arr))
}

/// Whether `haystack` contains `needle` as a contiguous run
pub fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
