use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha1::Sha1;
use sha2::Sha256;
use thiserror::Error;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

pub const SHA256_HEADER: &str = "x-hub-signature-256";
pub const SHA1_HEADER: &str = "x-hub-signature";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Sha1,
    Sha256,
}

impl SignatureAlgorithm {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureCheck {
    Verified(SignatureAlgorithm),
    /// No signature header. Accepted and logged by the caller.
    Missing,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is malformed: {0}")]
    Malformed(String),
    #[error("signature header uses unsupported algorithm `{0}`")]
    UnsupportedAlgorithm(String),
    #[error("{} signature does not match request body", .0.prefix())]
    Mismatch(SignatureAlgorithm),
    #[error("app secret cannot be used as an hmac key")]
    InvalidKey,
}

/// Verifies `X-Hub-Signature-256` / `X-Hub-Signature` headers against the raw
/// request body, keyed with the app secret.
#[derive(Clone, Debug)]
pub struct SignatureVerifier {
    app_secret: SecretString,
}

impl SignatureVerifier {
    pub fn new(app_secret: SecretString) -> Self {
        Self { app_secret }
    }

    /// The sha256 header wins when both are present.
    pub fn verify(
        &self,
        sha256_header: Option<&str>,
        sha1_header: Option<&str>,
        body: &[u8],
    ) -> Result<SignatureCheck, SignatureError> {
        let Some(header) = sha256_header.or(sha1_header) else {
            return Ok(SignatureCheck::Missing);
        };

        let (algorithm, expected) = parse_header(header)?;
        let key = self.app_secret.expose_secret().as_bytes();
        let verified = match algorithm {
            SignatureAlgorithm::Sha1 => {
                let mut mac = HmacSha1::new_from_slice(key).map_err(|_| SignatureError::InvalidKey)?;
                mac.update(body);
                mac.verify_slice(&expected).is_ok()
            }
            SignatureAlgorithm::Sha256 => {
                let mut mac =
                    HmacSha256::new_from_slice(key).map_err(|_| SignatureError::InvalidKey)?;
                mac.update(body);
                mac.verify_slice(&expected).is_ok()
            }
        };

        if verified {
            Ok(SignatureCheck::Verified(algorithm))
        } else {
            Err(SignatureError::Mismatch(algorithm))
        }
    }

    /// Header value for `body`, e.g. `sha256=ab12...`.
    pub fn sign(&self, algorithm: SignatureAlgorithm, body: &[u8]) -> Result<String, SignatureError> {
        let key = self.app_secret.expose_secret().as_bytes();
        let digest = match algorithm {
            SignatureAlgorithm::Sha1 => {
                let mut mac = HmacSha1::new_from_slice(key).map_err(|_| SignatureError::InvalidKey)?;
                mac.update(body);
                encode_hex(mac.finalize().into_bytes().as_slice())
            }
            SignatureAlgorithm::Sha256 => {
                let mut mac =
                    HmacSha256::new_from_slice(key).map_err(|_| SignatureError::InvalidKey)?;
                mac.update(body);
                encode_hex(mac.finalize().into_bytes().as_slice())
            }
        };
        Ok(format!("{}={digest}", algorithm.prefix()))
    }
}

fn parse_header(header: &str) -> Result<(SignatureAlgorithm, Vec<u8>), SignatureError> {
    let (method, hash) = header
        .trim()
        .split_once('=')
        .ok_or_else(|| SignatureError::Malformed("expected `<method>=<hex digest>`".to_owned()))?;

    let algorithm = match method.to_ascii_lowercase().as_str() {
        "sha1" => SignatureAlgorithm::Sha1,
        "sha256" => SignatureAlgorithm::Sha256,
        other => return Err(SignatureError::UnsupportedAlgorithm(other.to_owned())),
    };

    let digest = decode_hex(hash)
        .ok_or_else(|| SignatureError::Malformed("digest is not valid hex".to_owned()))?;
    Ok((algorithm, digest))
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

fn decode_hex(value: &str) -> Option<Vec<u8>> {
    if value.is_empty() || value.len() % 2 != 0 {
        return None;
    }
    (0..value.len())
        .step_by(2)
        .map(|index| value.get(index..index + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect()
}
