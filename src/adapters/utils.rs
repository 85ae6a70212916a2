//! Shared validation helpers.
//!
//! Used by the Wi-Fi adapter and by [`DeviceConfig::validate`](crate::config::DeviceConfig::validate).

/// Space through tilde only.
pub(crate) fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// Render bytes as uppercase hex pairs joined by `sep` (`None` = no separator).
pub(crate) fn hex_join(bytes: &[u8], sep: Option<char>) -> String {
    use core::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            if let Some(c) = sep {
                out.push(c);
            }
        }
        let _ = write!(out, "{b:02X}");
    }
    out
}
