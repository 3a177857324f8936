use crate::Error;

/// Big-endian encoding without leading zero bytes, zero encodes as empty
pub fn encode_u64(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    bytes[skip..].to_vec()
}

pub fn decode_u64(tag: u16, bytes: &[u8]) -> Result<u64, Error> {
    if bytes.len() > 8 {
        return Err(Error::InvalidInteger(tag));
    }

    Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
}

/// UTF-8 with a mandatory trailing NUL
pub fn encode_string(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len() + 1);
    out.extend_from_slice(value.as_bytes());
    out.push(0);
    out
}

pub fn decode_string(tag: u16, bytes: &[u8]) -> Result<String, Error> {
    match bytes.split_last() {
        Some((&0, text)) => {
            String::from_utf8(text.to_vec()).map_err(|_| Error::InvalidString(tag))
        }
        _ => Err(Error::InvalidString(tag)),
    }
}

/// Stores a decoded value for a field that must appear at most once
pub fn set_once<T>(slot: &mut Option<T>, value: T, tag: u16) -> Result<(), Error> {
    if slot.is_some() {
        return Err(Error::Duplicate(tag));
    }

    *slot = Some(value);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_minimal() {
        assert_eq!(encode_u64(0), Vec::<u8>::new());
        assert_eq!(encode_u64(1), vec![1]);
        assert_eq!(encode_u64(256), vec![1, 0]);
        assert_eq!(encode_u64(u64::MAX), vec![0xFF; 8]);
    }

    #[test]
    fn leading_zeros_are_tolerated() {
        assert_eq!(decode_u64(0x02, &[0, 0, 1]).unwrap(), 1);
    }

    #[test]
    fn integer_over_eight_bytes_fails() {
        assert!(matches!(
            decode_u64(0x02, &[1; 9]),
            Err(Error::InvalidInteger(0x02))
        ));
    }

    #[test]
    fn string_requires_terminator() {
        assert_eq!(decode_string(0x01, b"anon\0").unwrap(), "anon");
        assert!(decode_string(0x01, b"anon").is_err());
        assert!(decode_string(0x01, b"").is_err());
    }

    #[test]
    fn duplicate_field_is_rejected() {
        let mut slot = None;
        set_once(&mut slot, 1, 0x02).unwrap();

        assert!(matches!(
            set_once(&mut slot, 2, 0x02),
            Err(Error::Duplicate(0x02))
        ));
        assert_eq!(slot, Some(1));
    }
}
