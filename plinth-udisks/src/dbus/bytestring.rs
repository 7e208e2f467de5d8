// SPDX-License-Identifier: GPL-3.0-only

//! UDisks2 passes paths as NUL-terminated byte arrays (`ay`).

pub fn encode_bytestring(value: &str) -> Vec<u8> {
    let mut bytes = value.as_bytes().to_vec();
    bytes.push(0);
    bytes
}

/// Decode a byte string, dropping its trailing NUL terminator.
pub fn decode_bytestring(bytes: &[u8]) -> String {
    let raw = bytes.strip_suffix(&[0u8]).unwrap_or(bytes);
    String::from_utf8_lossy(raw).to_string()
}

pub fn decode_bytestring_array<B: AsRef<[u8]>>(items: &[B]) -> Vec<String> {
    items
        .iter()
        .map(|item| decode_bytestring(item.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_drops_terminator_only() {
        assert_eq!(decode_bytestring(b"/dev/sdb1\0"), "/dev/sdb1");
        assert_eq!(decode_bytestring(b"/dev/sdb1"), "/dev/sdb1");
        assert_eq!(decode_bytestring(b"\0"), "");
        assert_eq!(decode_bytestring(b""), "");
    }

    #[test]
    fn encode_appends_terminator() {
        assert_eq!(encode_bytestring("/dev/sda"), b"/dev/sda\0".to_vec());
        assert_eq!(decode_bytestring(&encode_bytestring("/media/root/DISK")), "/media/root/DISK");
    }

    #[test]
    fn decode_array_keeps_order() {
        let decoded = decode_bytestring_array(&[
            b"/dev/disk/by-id/usb-Kingston\0".to_vec(),
            b"/dev/disk/by-uuid/1234\0".to_vec(),
        ]);

        assert_eq!(
            decoded,
            vec![
                "/dev/disk/by-id/usb-Kingston".to_string(),
                "/dev/disk/by-uuid/1234".to_string()
            ]
        );
    }
}
