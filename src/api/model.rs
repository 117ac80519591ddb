use base64::engine::general_purpose;
use base64::{alphabet, engine, DecodeError, Engine};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Debug, Clone, Default, Ord, PartialOrd, Eq, PartialEq)]
pub(super) struct PresentRequest {
    pub domain: String,
    pub txt: String,
}

#[derive(Deserialize, Debug, Clone, Default, Ord, PartialOrd, Eq, PartialEq)]
pub(super) struct CleanupRequest {
    pub domain: String,
    pub txt: String,
}

#[derive(thiserror::Error, Debug)]
pub enum TxtValidationError {
    #[error("invalid encoding: {0}")]
    InvalidEncoding(DecodeError),
    #[error("invalid decoded length: found {actual} bytes, expected {expected}")]
    InvalidDecodedLength { actual: usize, expected: usize },
}

const DNS01_DECODED_LEN_BYTES: usize = 32;

lazy_static! {
    static ref BASE64_ENGINE: engine::GeneralPurpose =
        engine::GeneralPurpose::new(&alphabet::URL_SAFE, general_purpose::NO_PAD);
}

impl PresentRequest {
    pub fn valid_dns01(&self) -> Result<(), TxtValidationError> {
        let raw = BASE64_ENGINE
            .decode(&self.txt)
            .map_err(TxtValidationError::InvalidEncoding)?;
        match raw.len() {
            DNS01_DECODED_LEN_BYTES => Ok(()),
            actual => Err(TxtValidationError::InvalidDecodedLength {
                actual,
                expected: DNS01_DECODED_LEN_BYTES,
            }),
        }
    }
}

#[derive(Serialize, Debug, Clone, Default, Ord, PartialOrd, Eq, PartialEq)]
pub(super) struct PresentResult {
    pub txt: String,
    pub challenge_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(txt: &str) -> PresentRequest {
        PresentRequest {
            domain: "example.com".to_string(),
            txt: txt.to_string(),
        }
    }

    #[test]
    fn test_valid_dns01() {
        let digest = BASE64_ENGINE.encode([7u8; 32]);
        assert_eq!(digest.len(), 43);
        assert!(request(&digest).valid_dns01().is_ok());
    }

    #[test]
    fn test_cleanup_request_requires_txt() {
        let parsed: CleanupRequest =
            serde_json::from_str(r#"{"domain":"*.example.com","txt":"abc"}"#).unwrap();
        assert_eq!(parsed.txt, "abc");
        assert!(serde_json::from_str::<CleanupRequest>(r#"{"domain":"example.com"}"#).is_err());
    }

    #[test]
    fn test_invalid_dns01() {
        assert!(matches!(
            request(&BASE64_ENGINE.encode([7u8; 31])).valid_dns01(),
            Err(TxtValidationError::InvalidDecodedLength {
                actual: 31,
                expected: 32
            })
        ));
        // Padded and standard-alphabet encodings are rejected.
        let padded = format!("{}=", BASE64_ENGINE.encode([7u8; 32]));
        assert!(matches!(
            request(&padded).valid_dns01(),
            Err(TxtValidationError::InvalidEncoding(_))
        ));
        assert!(matches!(
            request("+/+/+/+/+/+/+/+/+/+/+/+/+/+/+/+/+/+/+/+/+/+").valid_dns01(),
            Err(TxtValidationError::InvalidEncoding(_))
        ));
        assert!(matches!(
            request("").valid_dns01(),
            Err(TxtValidationError::InvalidDecodedLength { actual: 0, .. })
        ));
    }
}
