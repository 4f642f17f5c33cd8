/*
 * Responsibility
 * - binary <-> URL-safe text conversion for cookie values and key identifiers
 * - callers never see padding: encode omits it, decode accepts it either way
 * - input is attacker-controlled (cookies), so decode only ever returns an error
 */
use base64::{
    Engine as _, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use thiserror::Error;

const ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed encoded text: {0}")]
    Decode(#[from] base64::DecodeError),
}

pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    ENGINE.encode(bytes)
}

pub fn decode(text: &str) -> Result<Vec<u8>, CodecError> {
    Ok(ENGINE.decode(text.as_bytes())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_ascii() {
        assert_eq!(encode("nil"), "bmls");
        assert_eq!(decode("bmls").unwrap(), b"nil");
    }

    #[test]
    fn encodes_non_ascii() {
        assert_eq!(encode("Äpfel"), "w4RwZmVs");
        assert_eq!(decode("w4RwZmVs").unwrap(), "Äpfel".as_bytes());
    }

    #[test]
    fn output_is_url_safe_without_padding() {
        let text = encode([0xfb, 0xff, 0xfe, 0x01]);
        assert!(!text.contains('='));
        assert!(!text.contains('+'));
        assert!(!text.contains('/'));
        assert_eq!(decode(&text).unwrap(), vec![0xfb, 0xff, 0xfe, 0x01]);
    }

    #[test]
    fn decode_accepts_padded_input() {
        assert_eq!(decode("bmlsbA==").unwrap(), b"nill");
        assert_eq!(decode("bmlsbA").unwrap(), b"nill");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode("not base64!").is_err());
        assert!(decode("a").is_err());
        assert!(decode("ab+/").is_err());
    }
}
