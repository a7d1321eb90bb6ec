use der::asn1::{Int, Uint};

use crate::errors::{TspError, TspErrorKind, TspResult};

pub fn to_hex_str<T>(bytes: &T) -> String
where
    T: AsRef<[u8]> + ?Sized,
{
    let x = bytes.as_ref();

    x.iter()
        .map(|v| format!("{:02x}", v))
        .collect::<Vec<String>>()
        .join("")
}

/// Positive INTEGER with minimal DER content octets (leading 0x00 only when the high bit is set).
pub fn int_from_u64(value: u64) -> Result<Int, TspError> {
    let unsigned = Uint::new(&value.to_be_bytes()).map_app_err(TspErrorKind::InvalidInteger)?;

    Ok(unsigned.into())
}

pub fn int_from_be_bytes(bytes: &[u8]) -> Result<Int, TspError> {
    let unsigned = Uint::new(bytes).map_app_err(TspErrorKind::InvalidInteger)?;

    Ok(unsigned.into())
}

// None for negative values and values wider than 64 bits
pub fn int_to_u64(value: &Int) -> Option<u64> {
    let bytes = value.as_bytes();
    if bytes.first().is_some_and(|b| b & 0x80 != 0) {
        return None;
    }

    let bytes = match bytes {
        [0x00, rest @ ..] => rest,
        rest => rest,
    };
    if bytes.len() > 8 {
        return None;
    }

    Some(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_lowercase() {
        assert_eq!(to_hex_str(&[0xde, 0xad, 0x01]), "dead01");
    }

    #[test]
    fn zero_is_a_real_integer() {
        let zero = int_from_u64(0).unwrap();

        assert_eq!(zero.as_bytes(), &[0x00]);
        assert_eq!(int_to_u64(&zero), Some(0));
    }

    #[test]
    fn high_bit_gets_sign_padding() {
        let value = int_from_u64(0x80).unwrap();

        assert_eq!(value.as_bytes(), &[0x00, 0x80]);
        assert_eq!(int_to_u64(&value), Some(0x80));
        assert_eq!(int_to_u64(&int_from_u64(u64::MAX).unwrap()), Some(u64::MAX));
    }

    #[test]
    fn wide_integers_do_not_fit_u64() {
        let wide = int_from_be_bytes(&[0x01; 12]).unwrap();

        assert_eq!(int_to_u64(&wide), None);
    }
}
