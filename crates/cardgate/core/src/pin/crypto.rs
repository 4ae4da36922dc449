//! RSA encryption of PINs under the agent's trusted key

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};

use super::PinError;

const SPKI_LABEL: &str = "-----BEGIN PUBLIC KEY-----";
const PKCS1_LABEL: &str = "-----BEGIN RSA PUBLIC KEY-----";

/// Parse a public key given as PEM (SPKI or PKCS#1) or bare base64 DER
pub fn parse_public_key(key: &str) -> Result<RsaPublicKey, PinError> {
    let key = key.trim();
    if key.starts_with(SPKI_LABEL) {
        return RsaPublicKey::from_public_key_pem(key).map_err(|e| PinError::InvalidKey(e.to_string()));
    }
    if key.starts_with(PKCS1_LABEL) {
        return RsaPublicKey::from_pkcs1_pem(key).map_err(|e| PinError::InvalidKey(e.to_string()));
    }

    let compact: String = key.split_whitespace().collect();
    let der = STANDARD
        .decode(compact)
        .map_err(|e| PinError::InvalidKey(e.to_string()))?;
    RsaPublicKey::from_public_key_der(&der)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(&der))
        .map_err(|e| PinError::InvalidKey(e.to_string()))
}

/// Encrypt `pin` with RSA PKCS#1 v1.5 and encode the ciphertext as base64
pub fn encrypt_pin(key: &RsaPublicKey, pin: &[u8]) -> Result<String, PinError> {
    let ciphertext = key
        .encrypt(&mut rand_v8::thread_rng(), Pkcs1v15Encrypt, pin)
        .map_err(|e| PinError::Encryption(e.to_string()))?;
    Ok(STANDARD.encode(ciphertext))
}
