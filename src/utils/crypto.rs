//! # Cryptography Helpers
//!
//! Primitives used by the channel handshake and the encrypted transport.
//!
//! ## Components
//! - **SessionCipher**: AES-256 transport cipher keyed by the negotiated session key
//! - **UniverseKeys**: RSA public keys per universe, used to wrap the session key
//! - **SHA-1**: raw digest for machine-auth files, hex digest for machine fingerprints
//!
//! ## Transport Scheme
//! ```text
//! encrypt: iv = random(16)
//!          out = AES-ECB(key, iv) || AES-CBC-PKCS7(key, iv, plaintext)
//! decrypt: iv = AES-ECB^-1(key, in[..16])
//!          plaintext = AES-CBC-PKCS7^-1(key, iv, in[16..])
//! ```
//!
//! ## Security
//! - Session keys are zeroed on drop
//! - Payloads that are not a whole number of AES blocks are rejected, never passed through

use crate::error::{constants, ProtocolError, Result};
use crate::protocol::emsg::EUniverse;
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use aes::Aes256;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a session key in bytes (AES-256).
pub const SESSION_KEY_LEN: usize = 32;

const BLOCK_LEN: usize = 16;

type CbcEnc = cbc::Encryptor<Aes256>;
type CbcDec = cbc::Decryptor<Aes256>;

/// DER-encoded RSA public key of the public universe.
const PUBLIC_UNIVERSE_KEY: [u8; 160] = [
    0x30, 0x81, 0x9D, 0x30, 0x0D, 0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x01,
    0x05, 0x00, 0x03, 0x81, 0x8B, 0x00, 0x30, 0x81, 0x87, 0x02, 0x81, 0x81, 0x00, 0xDF, 0xEC, 0x1A,
    0xD6, 0x2C, 0x10, 0x66, 0x2C, 0x17, 0x35, 0x3A, 0x14, 0xB0, 0x7C, 0x59, 0x11, 0x7F, 0x9D, 0xD3,
    0xD8, 0x2B, 0x7A, 0xE3, 0xE0, 0x15, 0xCD, 0x19, 0x1E, 0x46, 0xE8, 0x7B, 0x87, 0x74, 0xA2, 0x18,
    0x46, 0x31, 0xA9, 0x03, 0x14, 0x79, 0x82, 0x8E, 0xE9, 0x45, 0xA2, 0x49, 0x12, 0xA9, 0x23, 0x68,
    0x73, 0x89, 0xCF, 0x69, 0xA1, 0xB1, 0x61, 0x46, 0xBD, 0xC1, 0xBE, 0xBF, 0xD6, 0x01, 0x1B, 0xD8,
    0x81, 0xD4, 0xDC, 0x90, 0xFB, 0xFE, 0x4F, 0x52, 0x73, 0x66, 0xCB, 0x95, 0x70, 0xD7, 0xC5, 0x8E,
    0xBA, 0x1C, 0x7A, 0x33, 0x75, 0xA1, 0x62, 0x34, 0x46, 0xBB, 0x60, 0xB7, 0x80, 0x68, 0xFA, 0x13,
    0xA7, 0x7A, 0x8A, 0x37, 0x4B, 0x9E, 0xC6, 0xF4, 0x5D, 0x5F, 0x3A, 0x99, 0xF9, 0x9E, 0xC4, 0x3A,
    0xE9, 0x63, 0xA2, 0xBB, 0x88, 0x19, 0x28, 0xE0, 0xE7, 0x14, 0xC0, 0x42, 0x89, 0x02, 0x01, 0x11,
];

/// A freshly generated 32-byte session key, zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_LEN]);

impl SessionKey {
    /// Generate a random key from the operating system RNG.
    pub fn generate() -> Self {
        let mut key = [0u8; SESSION_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// AES-256 transport cipher.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SessionCipher {
    key: [u8; SESSION_KEY_LEN],
}

impl SessionCipher {
    /// Build a cipher from a raw key, which must be exactly 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self> {
        let key: [u8; SESSION_KEY_LEN] = key
            .try_into()
            .map_err(|_| ProtocolError::InvalidKeyLength(key.len()))?;
        Ok(Self { key })
    }

    pub fn from_session_key(key: &SessionKey) -> Self {
        Self { key: key.0 }
    }

    /// Encrypt a whole message under a random IV.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut iv = [0u8; BLOCK_LEN];
        OsRng.fill_bytes(&mut iv);

        let ecb = Aes256::new_from_slice(&self.key).map_err(|_| ProtocolError::EncryptionFailure)?;
        let mut wrapped_iv = aes::Block::clone_from_slice(&iv);
        ecb.encrypt_block(&mut wrapped_iv);

        let body = CbcEnc::new_from_slices(&self.key, &iv)
            .map_err(|_| ProtocolError::EncryptionFailure)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut out = Vec::with_capacity(BLOCK_LEN + body.len());
        out.extend_from_slice(&wrapped_iv);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Decrypt a message produced by [`SessionCipher::encrypt`].
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < 2 * BLOCK_LEN || ciphertext.len() % BLOCK_LEN != 0 {
            return Err(ProtocolError::DecryptionFailure);
        }

        let (wrapped_iv, body) = ciphertext.split_at(BLOCK_LEN);

        let ecb = Aes256::new_from_slice(&self.key).map_err(|_| ProtocolError::DecryptionFailure)?;
        let mut iv = aes::Block::clone_from_slice(wrapped_iv);
        ecb.decrypt_block(&mut iv);

        let plaintext = CbcDec::new_from_slices(&self.key, &iv)
            .map_err(|_| ProtocolError::DecryptionFailure)?
            .decrypt_padded_vec_mut::<Pkcs7>(body)
            .map_err(|_| ProtocolError::DecryptionFailure)?;
        Ok(plaintext)
    }
}

impl std::fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionCipher(..)")
    }
}

/// RSA public keys used to wrap session keys, looked up by universe.
#[derive(Debug, Clone)]
pub struct UniverseKeys {
    keys: HashMap<EUniverse, RsaPublicKey>,
}

impl Default for UniverseKeys {
    fn default() -> Self {
        Self::builtin()
    }
}

impl UniverseKeys {
    /// Keys shipped with the crate (public universe only).
    pub fn builtin() -> Self {
        let mut keys = HashMap::new();
        if let Ok(key) = RsaPublicKey::from_public_key_der(&PUBLIC_UNIVERSE_KEY) {
            keys.insert(EUniverse::Public, key);
        }
        Self { keys }
    }

    /// An empty lookup; pair with [`UniverseKeys::insert`].
    pub fn empty() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    pub fn insert(&mut self, universe: EUniverse, key: RsaPublicKey) -> &mut Self {
        self.keys.insert(universe, key);
        self
    }

    /// Parse and register a DER SubjectPublicKeyInfo key.
    pub fn insert_der(&mut self, universe: EUniverse, der: &[u8]) -> Result<&mut Self> {
        let key = RsaPublicKey::from_public_key_der(der)
            .map_err(|e| ProtocolError::SecurityError(format!("invalid universe key: {e}")))?;
        Ok(self.insert(universe, key))
    }

    pub fn get(&self, universe: EUniverse) -> Option<&RsaPublicKey> {
        self.keys.get(&universe)
    }

    /// RSA-OAEP (SHA-1) encrypt `data` under the key for `universe`.
    pub fn encrypt(&self, universe: EUniverse, data: &[u8]) -> Result<Vec<u8>> {
        let key = self.get(universe).ok_or_else(|| {
            ProtocolError::SecurityError(format!("{} {universe:?}", constants::ERR_NO_UNIVERSE_KEY))
        })?;
        rsa_encrypt(key, data)
    }
}

/// RSA-OAEP encrypt with a SHA-1 digest.
pub fn rsa_encrypt(key: &RsaPublicKey, data: &[u8]) -> Result<Vec<u8>> {
    key.encrypt(&mut OsRng, Oaep::new::<Sha1>(), data)
        .map_err(|_| ProtocolError::SecurityError(constants::ERR_RSA_ENCRYPT.into()))
}

/// Raw SHA-1 digest.
pub fn sha1(data: &[u8]) -> [u8; 20] {
    Sha1::digest(data).into()
}

/// Lowercase hex SHA-1 digest.
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(sha1(data))
}
