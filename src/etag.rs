//! Cache-validation tokens for `/faces`.
//!
//! Tokens are a pure function of `(version, frame)` so they can be checked
//! without a server.

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::with_capacity(13);
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// Weak entity tag for a store version and snapshot frame, e.g. `W/"2s-1a"`.
pub fn validation_token(version: u64, frame: u64) -> String {
    format!("W/\"{}-{}\"", to_base36(version), to_base36(frame))
}

/// Weak comparison of an `If-None-Match` header value against `token`.
///
/// Accepts a comma-separated list and `*`.
pub fn if_none_match(header: &str, token: &str) -> bool {
    let wanted = opaque_tag(token);
    header.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || (!candidate.is_empty() && opaque_tag(candidate) == wanted)
    })
}

fn opaque_tag(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}
