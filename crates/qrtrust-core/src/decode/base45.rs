//! BASE45 codec (RFC 9285).

const ALPHABET: &[u8; 45] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

/// BASE45 decoding failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Base45Error {
    #[error("invalid character {character:?} at offset {offset}")]
    InvalidCharacter { character: char, offset: usize },

    #[error("invalid length {0}: trailing single character")]
    InvalidLength(usize),

    #[error("chunk at offset {offset} decodes to {value}, out of range")]
    Overflow { offset: usize, value: u32 },
}

fn value_of(c: u8, offset: usize) -> Result<u32, Base45Error> {
    ALPHABET
        .iter()
        .position(|a| *a == c)
        .map(|p| p as u32)
        .ok_or(Base45Error::InvalidCharacter {
            character: c as char,
            offset,
        })
}

/// Decode BASE45 text into bytes.
pub fn decode(input: &str) -> Result<Vec<u8>, Base45Error> {
    let bytes = input.as_bytes();
    if bytes.len() % 3 == 1 {
        return Err(Base45Error::InvalidLength(bytes.len()));
    }

    let mut out = Vec::with_capacity(bytes.len() / 3 * 2 + 1);
    for (index, chunk) in bytes.chunks(3).enumerate() {
        let offset = index * 3;
        let mut value = 0u32;
        let mut factor = 1u32;
        for (i, c) in chunk.iter().enumerate() {
            value += value_of(*c, offset + i)? * factor;
            factor *= 45;
        }

        if chunk.len() == 3 {
            if value > 0xFFFF {
                return Err(Base45Error::Overflow { offset, value });
            }
            out.push((value >> 8) as u8);
            out.push((value & 0xFF) as u8);
        } else {
            if value > 0xFF {
                return Err(Base45Error::Overflow { offset, value });
            }
            out.push(value as u8);
        }
    }

    Ok(out)
}

/// Encode bytes as BASE45 text.
pub fn encode(input: &[u8]) -> String {
    let mut out = String::with_capacity(input.len() / 2 * 3 + 2);
    for chunk in input.chunks(2) {
        if let [a, b] = chunk {
            let mut n = (u32::from(*a) << 8) | u32::from(*b);
            for _ in 0..3 {
                out.push(ALPHABET[(n % 45) as usize] as char);
                n /= 45;
            }
        } else {
            let n = u32::from(chunk[0]);
            out.push(ALPHABET[(n % 45) as usize] as char);
            out.push(ALPHABET[(n / 45) as usize] as char);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc_vectors() {
        assert_eq!(encode(b"AB"), "BB8");
        assert_eq!(encode(b"Hello!!"), "%69 VD92EX0");
        assert_eq!(encode(b"base-45"), "UJCLQE7W581");
        assert_eq!(decode("QED8WEX0").unwrap(), b"ietf!");
    }

    #[test]
    fn test_decode_rejects_lowercase() {
        let err = decode("not-valid-base45!!").unwrap_err();
        assert!(matches!(
            err,
            Base45Error::InvalidCharacter { character: 'n', offset: 0 }
        ));
    }

    #[test]
    fn test_decode_rejects_dangling_char() {
        assert_eq!(decode("BB8A").unwrap_err(), Base45Error::InvalidLength(4));
    }

    #[test]
    fn test_decode_rejects_overflow() {
        // ":::" = 44 + 44*45 + 44*2025 = 91124 > 65535
        assert!(matches!(
            decode(":::").unwrap_err(),
            Base45Error::Overflow { offset: 0, .. }
        ));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
        assert_eq!(encode(&[]), "");
    }
}
