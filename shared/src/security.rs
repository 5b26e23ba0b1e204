use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use rand::{thread_rng, Rng};
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Envelope encryption for third-party credentials.
///
/// AES-256-GCM under a process-wide key, fresh IV per call. Serialized form is
/// `base64(iv):base64(tag):base64(ciphertext)` so a blob is self-describing
/// and key rotation tooling can re-wrap it offline.
#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    /// Build from the configured 64-hex-char key.
    pub fn from_hex_key(hex_key: &str) -> Result<Self> {
        let key_bytes = hex::decode(hex_key)
            .map_err(|_| Error::Configuration("encryption key is not valid hex".to_string()))?;
        if key_bytes.len() != 32 {
            return Err(Error::Configuration(
                "encryption key must decode to exactly 32 bytes".to_string(),
            ));
        }
        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    pub fn encrypt_to_string(&self, plaintext: &str) -> Result<String> {
        let mut iv = [0u8; IV_LEN];
        thread_rng().fill(&mut iv);
        let nonce = Nonce::from_slice(&iv);

        // aes-gcm appends the 16-byte tag to the ciphertext
        let mut sealed = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| Error::Encryption("AES-GCM encryption failed".to_string()))?;
        let tag = sealed.split_off(sealed.len() - TAG_LEN);

        Ok(format!(
            "{}:{}:{}",
            general_purpose::STANDARD.encode(iv),
            general_purpose::STANDARD.encode(&tag),
            general_purpose::STANDARD.encode(&sealed),
        ))
    }

    pub fn decrypt_from_string(&self, blob: &str) -> Result<String> {
        let segments: Vec<&str> = blob.split(':').collect();
        if segments.len() != 3 {
            return Err(Error::Decryption(format!(
                "expected 3 segments, got {}",
                segments.len()
            )));
        }

        let iv = general_purpose::STANDARD
            .decode(segments[0])
            .map_err(|_| Error::Decryption("invalid IV encoding".to_string()))?;
        let tag = general_purpose::STANDARD
            .decode(segments[1])
            .map_err(|_| Error::Decryption("invalid tag encoding".to_string()))?;
        let ciphertext = general_purpose::STANDARD
            .decode(segments[2])
            .map_err(|_| Error::Decryption("invalid ciphertext encoding".to_string()))?;

        if iv.len() != IV_LEN {
            return Err(Error::Decryption(format!("IV must be {IV_LEN} bytes")));
        }
        if tag.len() != TAG_LEN {
            return Err(Error::Decryption(format!("tag must be {TAG_LEN} bytes")));
        }

        let mut sealed = ciphertext;
        sealed.extend_from_slice(&tag);

        let nonce = Nonce::from_slice(&iv);
        let plaintext = self
            .cipher
            .decrypt(nonce, sealed.as_slice())
            .map_err(|_| Error::DecryptionAuthFailed)?;

        String::from_utf8(plaintext).map_err(|_| Error::Decryption("plaintext is not UTF-8".to_string()))
    }
}

/// Byte comparison whose duration does not depend on where the first
/// difference sits. Inputs of different lengths compare unequal, but the
/// caller is expected to burn a comparison first (see webhook verification).
pub fn timing_safe_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
