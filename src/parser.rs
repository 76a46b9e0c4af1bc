//! Request-line and `Host` header extraction.
//!
//! This is deliberately not a conforming HTTP parser: it performs no
//! validation beyond locating the two fields the rest of the engine needs,
//! and no URL decoding or header normalization. Two logically identical
//! GETs that differ in whitespace or URI encoding are distinct cache
//! entries — see [`request_key`].

const GET_PREFIX: &[u8] = b"GET";
const HOST_FIELD: &[u8] = b"Host: ";

/// A request is "GET-shaped" iff its first three bytes are exactly `GET`.
pub fn is_get_shaped(raw: &[u8]) -> bool {
    raw.len() >= GET_PREFIX.len() && &raw[..GET_PREFIX.len()] == GET_PREFIX
}

/// The cache key: bytes from offset 0 up to (not including) the first `\r`.
pub fn request_key(raw: &[u8]) -> Option<Vec<u8>> {
    let end = raw.iter().position(|&b| b == b'\r')?;
    Some(raw[..end].to_vec())
}

/// The bytes following the literal `Host: ` up to the next `\r`, verbatim.
/// The upstream fetcher always resolves this against the canonical `http`
/// service port (80) — see `fetch::connect_upstream` — so no port splitting
/// happens here. Returns `None` if the header is absent or its value is not
/// valid UTF-8.
pub fn extract_host(raw: &[u8]) -> Option<String> {
    let start = find_subslice(raw, HOST_FIELD)? + HOST_FIELD.len();
    let len = raw[start..].iter().position(|&b| b == b'\r')?;
    String::from_utf8(raw[start..start + len].to_vec()).ok()
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
