//! EBML primitives for writing WebM.

/// Append an element ID. IDs are stored with their length marker
/// already encoded, so they are written as their minimal big-endian
/// bytes.
pub fn write_element_id(buf: &mut Vec<u8>, id: u32) {
    let bytes = id.to_be_bytes();
    let skip = bytes.iter().position(|&b| b != 0).unwrap_or(3);
    buf.extend_from_slice(&bytes[skip..]);
}

/// Append a size as an EBML VINT with the length-descriptor bit.
pub fn write_vint(buf: &mut Vec<u8>, value: u64) {
    // A length of n bytes carries 7n usable bits.
    let mut length = 1usize;
    while length < 8 && value >= (1u64 << (7 * length)) - 1 {
        length += 1;
    }

    let marker = 1u64 << (7 * length);
    let encoded = marker | value;
    let bytes = encoded.to_be_bytes();
    buf.extend_from_slice(&bytes[8 - length..]);
}

/// Append an unsigned integer as its minimal big-endian bytes.
fn uint_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().position(|&b| b != 0).unwrap_or(7);
    bytes[skip..].to_vec()
}

/// Append a complete element: ID, size, payload.
pub fn write_element(buf: &mut Vec<u8>, id: u32, payload: &[u8]) {
    write_element_id(buf, id);
    write_vint(buf, payload.len() as u64);
    buf.extend_from_slice(payload);
}

/// Append an unsigned-integer element.
pub fn write_uint(buf: &mut Vec<u8>, id: u32, value: u64) {
    write_element(buf, id, &uint_bytes(value));
}

/// Append a float element (8-byte IEEE 754).
pub fn write_float(buf: &mut Vec<u8>, id: u32, value: f64) {
    write_element(buf, id, &value.to_be_bytes());
}

/// Append a string element.
pub fn write_string(buf: &mut Vec<u8>, id: u32, value: &str) {
    write_element(buf, id, value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_id_minimal_bytes() {
        let mut buf = Vec::new();
        write_element_id(&mut buf, 0x1A45_DFA3);
        assert_eq!(buf, [0x1A, 0x45, 0xDF, 0xA3]);

        buf.clear();
        write_element_id(&mut buf, 0xE7);
        assert_eq!(buf, [0xE7]);
    }

    #[test]
    fn test_vint_one_byte() {
        let mut buf = Vec::new();
        write_vint(&mut buf, 0);
        assert_eq!(buf, [0x80]);

        buf.clear();
        write_vint(&mut buf, 0x7E);
        assert_eq!(buf, [0xFE]);
    }

    #[test]
    fn test_vint_two_bytes() {
        // 0x7F needs two bytes: one-byte all-ones is the reserved
        // unknown-size marker.
        let mut buf = Vec::new();
        write_vint(&mut buf, 0x7F);
        assert_eq!(buf, [0x40, 0x7F]);

        buf.clear();
        write_vint(&mut buf, 500);
        assert_eq!(buf, [0x41, 0xF4]);
    }

    #[test]
    fn test_uint_element() {
        let mut buf = Vec::new();
        write_uint(&mut buf, 0xD7, 1);
        assert_eq!(buf, [0xD7, 0x81, 0x01]);
    }

    #[test]
    fn test_uint_zero_keeps_one_byte() {
        let mut buf = Vec::new();
        write_uint(&mut buf, 0x83, 0);
        assert_eq!(buf, [0x83, 0x81, 0x00]);
    }
}
