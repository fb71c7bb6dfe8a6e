//! Cookie envelope
//!
//! A sealed cookie value has the form `<body>.<mac>`, where `mac` is the
//! URL-safe base64 HMAC-SHA256 of the cookie name and the body, each
//! length-prefixed. Binding the cookie name into the MAC keeps values from
//! one named session from being replayed under another.
//!
//! Without encryption keys the body is `<id>.<issued-at>`. With them it is
//! the URL-safe base64 of an AES-256-GCM nonce followed by the encrypted
//! `<id>.<issued-at>`, so the identifier never travels in the clear. Every
//! character used is legal in a cookie value.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

use crate::error::{SessionError, SessionResult};

type HmacSha256 = Hmac<Sha256>;

/// Random bytes per session identifier
const ID_BYTES: usize = 32;

/// AES-GCM nonce length
const NONCE_BYTES: usize = 12;

/// Generate a fresh session identifier
///
/// Identifiers never contain `.`, which the envelope uses as a separator.
pub fn generate_id() -> String {
    let mut bytes = [0u8; ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Signs session identifiers into cookie values and verifies them
#[derive(Clone)]
pub struct CookieEnvelope {
    /// First key signs, all keys verify
    keys: Vec<Vec<u8>>,
    /// First cipher encrypts, all ciphers decrypt; empty means plaintext
    ciphers: Vec<Aes256Gcm>,
    /// Reject cookies issued longer ago than this many seconds
    max_age: Option<i64>,
}

impl std::fmt::Debug for CookieEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieEnvelope")
            .field("keys", &self.keys.len())
            .field("ciphers", &self.ciphers.len())
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl CookieEnvelope {
    /// Create an envelope from an ordered list of secret keys
    ///
    /// The first key signs new cookies. Older keys can be kept after it so
    /// cookies issued before a rotation still verify.
    pub fn new<I, K>(keys: I) -> SessionResult<Self>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let keys: Vec<Vec<u8>> = keys.into_iter().map(|k| k.as_ref().to_vec()).collect();

        if keys.is_empty() {
            return Err(SessionError::Configuration(
                "at least one secret key is required".to_string(),
            ));
        }
        if keys.iter().any(|k| k.is_empty()) {
            return Err(SessionError::Configuration(
                "secret keys must not be empty".to_string(),
            ));
        }

        Ok(Self {
            keys,
            ciphers: Vec::new(),
            max_age: None,
        })
    }

    /// Encrypt the cookie body with AES-256-GCM
    ///
    /// Each key is hashed with SHA-256 into a cipher key. The first key
    /// encrypts, any of them decrypts. An empty list leaves cookies
    /// unencrypted.
    pub fn with_encryption_keys<I, K>(mut self, keys: I) -> SessionResult<Self>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let mut ciphers = Vec::new();
        for key in keys {
            let key = key.as_ref();
            if key.is_empty() {
                return Err(SessionError::Configuration(
                    "encryption keys must not be empty".to_string(),
                ));
            }
            ciphers.push(Aes256Gcm::new(&Sha256::digest(key)));
        }

        self.ciphers = ciphers;
        Ok(self)
    }

    /// Reject cookies older than `max_age` seconds; `None` or a non-positive
    /// value disables the check
    pub fn with_max_age(mut self, max_age: Option<i64>) -> Self {
        self.max_age = max_age.filter(|age| *age > 0);
        self
    }

    /// Whether cookie bodies are encrypted
    pub fn is_encrypted(&self) -> bool {
        !self.ciphers.is_empty()
    }

    /// Produce the cookie value for `id` under cookie `name`
    pub fn seal(&self, name: &str, id: &str) -> SessionResult<String> {
        self.seal_at(name, id, Utc::now().timestamp())
    }

    /// Recover the identifier from a cookie value, failing with
    /// `InvalidCookie` on any tampering
    pub fn open(&self, name: &str, value: &str) -> SessionResult<String> {
        self.open_at(name, value, Utc::now().timestamp())
    }

    fn seal_at(&self, name: &str, id: &str, issued_at: i64) -> SessionResult<String> {
        if !is_valid_id(id) {
            return Err(SessionError::Configuration(format!(
                "session identifier is not cookie-safe: {:?}",
                id
            )));
        }

        let plain = format!("{}.{}", id, issued_at);
        let body = match self.ciphers.first() {
            Some(cipher) => Self::encrypt(cipher, &plain)?,
            None => plain,
        };

        let mac = Self::mac(&self.keys[0], name, &body)?;
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", body, signature))
    }

    fn open_at(&self, name: &str, value: &str, now: i64) -> SessionResult<String> {
        let (body, signature) = value.rsplit_once('.').ok_or(SessionError::InvalidCookie)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SessionError::InvalidCookie)?;

        let verified = self.keys.iter().any(|key| {
            Self::mac(key, name, body)
                .map(|mac| mac.verify_slice(&signature).is_ok())
                .unwrap_or(false)
        });
        if !verified {
            return Err(SessionError::InvalidCookie);
        }

        let plain = if self.ciphers.is_empty() {
            body.to_string()
        } else {
            self.decrypt(body)?
        };

        let (id, issued_at) = plain.split_once('.').ok_or(SessionError::InvalidCookie)?;
        if !is_valid_id(id) {
            return Err(SessionError::InvalidCookie);
        }
        let timestamp: i64 = issued_at
            .parse()
            .map_err(|_| SessionError::InvalidCookie)?;

        if let Some(max_age) = self.max_age {
            if timestamp < now - max_age {
                return Err(SessionError::InvalidCookie);
            }
        }

        Ok(id.to_string())
    }

    fn encrypt(cipher: &Aes256Gcm, plain: &str) -> SessionResult<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plain.as_bytes())
            .map_err(|e| SessionError::Configuration(format!("cookie encryption failed: {}", e)))?;

        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    fn decrypt(&self, body: &str) -> SessionResult<String> {
        let sealed = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| SessionError::InvalidCookie)?;
        if sealed.len() <= NONCE_BYTES {
            return Err(SessionError::InvalidCookie);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_BYTES);
        let nonce = Nonce::from_slice(nonce);

        let plain = self
            .ciphers
            .iter()
            .find_map(|cipher| cipher.decrypt(nonce, ciphertext).ok())
            .ok_or(SessionError::InvalidCookie)?;

        String::from_utf8(plain).map_err(|_| SessionError::InvalidCookie)
    }

    fn mac(key: &[u8], name: &str, body: &str) -> SessionResult<HmacSha256> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
            .map_err(|e| SessionError::Configuration(format!("invalid secret key: {}", e)))?;
        for field in [name.as_bytes(), body.as_bytes()] {
            mac.update(&(field.len() as u64).to_be_bytes());
            mac.update(field);
        }
        Ok(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> CookieEnvelope {
        CookieEnvelope::new([b"secret"]).unwrap()
    }

    #[test]
    fn test_seal_open() {
        let envelope = envelope();
        let id = generate_id();
        let value = envelope.seal("session", &id).unwrap();

        assert_eq!(envelope.open("session", &value).unwrap(), id);
    }

    #[test]
    fn test_value_is_cookie_safe() {
        let value = envelope().seal("session", &generate_id()).unwrap();
        assert!(
            value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        );
    }

    #[test]
    fn test_junk_suffix_is_rejected() {
        let envelope = envelope();
        let value = envelope.seal("session", &generate_id()).unwrap();

        let tampered = format!("{}junk", value);
        assert!(matches!(
            envelope.open("session", &tampered),
            Err(SessionError::InvalidCookie)
        ));
    }

    #[test]
    fn test_any_mutated_byte_is_rejected() {
        let envelope = envelope();
        let value = envelope.seal("session", &generate_id()).unwrap();

        for i in 0..value.len() {
            let mut bytes = value.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            assert!(
                envelope.open("session", &tampered).is_err(),
                "mutation at {} was accepted",
                i
            );
        }
    }

    #[test]
    fn test_name_is_bound() {
        let envelope = envelope();
        let value = envelope.seal("session1", &generate_id()).unwrap();

        assert!(envelope.open("session2", &value).is_err());
    }

    #[test]
    fn test_other_key_is_rejected() {
        let value = envelope().seal("session", &generate_id()).unwrap();
        let other = CookieEnvelope::new([b"another secret"]).unwrap();

        assert!(other.open("session", &value).is_err());
    }

    #[test]
    fn test_key_rotation() {
        let old = CookieEnvelope::new([b"old"]).unwrap();
        let id = generate_id();
        let value = old.seal("session", &id).unwrap();

        let rotated = CookieEnvelope::new([b"new".as_slice(), b"old".as_slice()]).unwrap();
        assert_eq!(rotated.open("session", &value).unwrap(), id);

        // new cookies are signed with the first key only
        let fresh = rotated.seal("session", &id).unwrap();
        assert!(old.open("session", &fresh).is_err());

        let retired = CookieEnvelope::new([b"new"]).unwrap();
        assert!(retired.open("session", &value).is_err());
    }

    #[test]
    fn test_old_cookie_is_rejected_when_max_age_set() {
        let envelope = envelope().with_max_age(Some(60));
        let id = generate_id();
        let now = Utc::now().timestamp();

        let stale = envelope.seal_at("session", &id, now - 61).unwrap();
        assert!(envelope.open_at("session", &stale, now).is_err());

        let recent = envelope.seal_at("session", &id, now - 59).unwrap();
        assert_eq!(envelope.open_at("session", &recent, now).unwrap(), id);
    }

    #[test]
    fn test_malformed_values() {
        let envelope = envelope();
        for value in ["", "abc", "a.b", "a.b.c.d", ".1.abc", "id.notanumber.abc", "id.1."] {
            assert!(envelope.open("session", value).is_err(), "{:?}", value);
        }
    }

    #[test]
    fn test_key_validation() {
        assert!(matches!(
            CookieEnvelope::new(Vec::<Vec<u8>>::new()),
            Err(SessionError::Configuration(_))
        ));
        assert!(matches!(
            CookieEnvelope::new([b"".as_slice()]),
            Err(SessionError::Configuration(_))
        ));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert!(!a.contains('.'));
    }

    #[test]
    fn test_name_and_id_boundary_is_unambiguous() {
        let envelope = envelope();
        let value = envelope.seal("x|y", "z").unwrap();

        // moving the end of the name into the value must not verify
        assert!(envelope.open("x", &format!("y|{}", value)).is_err());
        assert!(envelope.open("x|", &format!("y{}", value)).is_err());
        assert_eq!(envelope.open("x|y", &value).unwrap(), "z");
    }

    #[test]
    fn test_ids_outside_the_cookie_alphabet_are_refused() {
        let envelope = envelope();
        for id in ["", "a|b", "a.b", "a b", "a;b"] {
            assert!(
                matches!(
                    envelope.seal("session", id),
                    Err(SessionError::Configuration(_))
                ),
                "{:?}",
                id
            );
        }
    }

    fn encrypted() -> CookieEnvelope {
        envelope().with_encryption_keys([b"block key"]).unwrap()
    }

    #[test]
    fn test_encrypted_seal_open() {
        let envelope = encrypted();
        assert!(envelope.is_encrypted());

        let id = generate_id();
        let value = envelope.seal("session", &id).unwrap();

        assert!(!value.contains(&id), "identifier leaked: {}", value);
        assert_eq!(value.matches('.').count(), 1);
        assert_eq!(envelope.open("session", &value).unwrap(), id);
    }

    #[test]
    fn test_encrypted_values_differ_per_seal() {
        let envelope = encrypted();
        let id = generate_id();

        let a = envelope.seal("session", &id).unwrap();
        let b = envelope.seal("session", &id).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_encrypted_tampering_is_rejected() {
        let envelope = encrypted();
        let value = envelope.seal("session", &generate_id()).unwrap();

        for i in 0..value.len() {
            let mut bytes = value.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            assert!(envelope.open("session", &tampered).is_err(), "{}", i);
        }
        assert!(envelope.open("other", &value).is_err());
    }

    #[test]
    fn test_encryption_key_must_match() {
        let value = encrypted().seal("session", &generate_id()).unwrap();

        // right signing key, wrong encryption key
        let other = envelope().with_encryption_keys([b"other block key"]).unwrap();
        assert!(other.open("session", &value).is_err());

        // a plaintext envelope does not accept encrypted values, and back
        assert!(envelope().open("session", &value).is_err());
        let plain = envelope().seal("session", &generate_id()).unwrap();
        assert!(encrypted().open("session", &plain).is_err());
    }

    #[test]
    fn test_encryption_key_rotation() {
        let id = generate_id();
        let value = encrypted().seal("session", &id).unwrap();

        let rotated = envelope()
            .with_encryption_keys([b"new block key".as_slice(), b"block key".as_slice()])
            .unwrap();
        assert_eq!(rotated.open("session", &value).unwrap(), id);

        let fresh = rotated.seal("session", &id).unwrap();
        assert!(encrypted().open("session", &fresh).is_err());
    }

    #[test]
    fn test_encryption_key_validation() {
        assert!(matches!(
            envelope().with_encryption_keys([b"".as_slice()]),
            Err(SessionError::Configuration(_))
        ));

        let plain = envelope()
            .with_encryption_keys(Vec::<Vec<u8>>::new())
            .unwrap();
        assert!(!plain.is_encrypted());
    }
}
