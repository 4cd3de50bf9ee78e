// Hardware address normalization shared by every transport.
//
// Devices print addresses as `AA:BB:CC:DD:EE:FF`, `aabb.ccdd.eeff`,
// `AA-BB-CC-DD-EE-FF` or bare hex, and the telemetry agent returns raw
// octets. Everything is folded to lowercase colon-separated form so the
// three sources can be joined on it.

/// Normalize a textual hardware address. Returns `None` unless exactly
/// twelve hex digits remain after stripping separators.
pub fn normalize(raw: &str) -> Option<String> {
    let hex: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.' | ' '))
        .collect();
    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let lower = hex.to_ascii_lowercase();
    let pairs: Vec<&str> = (0..6).filter_map(|i| lower.get(i * 2..i * 2 + 2)).collect();
    Some(pairs.join(":"))
}

/// Format six raw octets, or fall back to parsing the bytes as text
/// (some agents return the address as a printable string).
pub fn from_octets(bytes: &[u8]) -> Option<String> {
    if let [a, b, c, d, e, f] = bytes {
        return Some(format!("{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{f:02x}"));
    }
    std::str::from_utf8(bytes).ok().and_then(normalize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_common_notations() {
        let want = Some("aa:bb:cc:dd:ee:01".to_owned());
        assert_eq!(normalize("AA:BB:CC:DD:EE:01"), want);
        assert_eq!(normalize("aa-bb-cc-dd-ee-01"), want);
        assert_eq!(normalize("aabb.ccdd.ee01"), want);
        assert_eq!(normalize("AABBCCDDEE01"), want);
    }

    #[test]
    fn rejects_wrong_length_and_non_hex() {
        assert_eq!(normalize("aa:bb:cc:dd:ee"), None);
        assert_eq!(normalize("zz:bb:cc:dd:ee:01"), None);
        assert_eq!(normalize(""), None);
    }

    #[test]
    fn formats_raw_octets() {
        assert_eq!(
            from_octets(&[0xe0, 0x67, 0xb3, 0x01, 0x02, 0xff]).as_deref(),
            Some("e0:67:b3:01:02:ff")
        );
        assert_eq!(
            from_octets(b"E0:67:B3:01:02:FF").as_deref(),
            Some("e0:67:b3:01:02:ff")
        );
        assert_eq!(from_octets(&[1, 2, 3]), None);
    }
}
