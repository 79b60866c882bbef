//! Symmetric-key token service.
//!
//! Tokens are an HS256 JWS wrapped in XChaCha20-Poly1305:
//! `base64url(nonce || ciphertext(jws))`.

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::schema::CredentialsConfig;
use crate::token::{Claim, ClaimSet, TokenDescriptor, TokenError, TokenService, TokenValidationParameters};

const NONCE_LEN: usize = 24;

/// Minimum HMAC key size in bytes.
pub const MIN_SIGNING_KEY_LEN: usize = 32;

/// Required encryption key size in bytes.
pub const ENCRYPTION_KEY_LEN: usize = 32;

#[derive(Debug, Serialize)]
struct TokenPayload<'a> {
    iss: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
    #[serde(rename = "tkn_typ")]
    token_type: &'a str,
    claims: &'a ClaimSet,
}

#[derive(Debug, Deserialize)]
struct DecodedPayload {
    iss: String,
    aud: String,
    iat: u64,
    exp: u64,
    #[serde(rename = "tkn_typ")]
    token_type: String,
    claims: Vec<Claim>,
}

/// Token service holding its signing and encryption keys in memory.
pub struct LocalTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    cipher: XChaCha20Poly1305,
}

impl fmt::Debug for LocalTokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTokenService").finish_non_exhaustive()
    }
}

impl LocalTokenService {
    /// Create a service from raw key material.
    pub fn new(signing_key: &[u8], encryption_key: &[u8]) -> Result<Self, TokenError> {
        if signing_key.len() < MIN_SIGNING_KEY_LEN {
            return Err(TokenError::Backend(format!(
                "signing key must be at least {MIN_SIGNING_KEY_LEN} bytes"
            )));
        }
        let cipher = XChaCha20Poly1305::new_from_slice(encryption_key).map_err(|_| {
            TokenError::Backend(format!("encryption key must be {ENCRYPTION_KEY_LEN} bytes"))
        })?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(signing_key),
            decoding_key: DecodingKey::from_secret(signing_key),
            cipher,
        })
    }

    /// Create a service with random keys. Tokens do not survive a restart.
    pub fn ephemeral() -> Self {
        let mut signing_key = [0u8; MIN_SIGNING_KEY_LEN];
        let mut encryption_key = [0u8; ENCRYPTION_KEY_LEN];
        OsRng.fill_bytes(&mut signing_key);
        OsRng.fill_bytes(&mut encryption_key);

        Self {
            encoding_key: EncodingKey::from_secret(&signing_key),
            decoding_key: DecodingKey::from_secret(&signing_key),
            cipher: XChaCha20Poly1305::new(Key::from_slice(&encryption_key)),
        }
    }

    /// Create a service from base64 keys in the configuration, or ephemeral
    /// keys when none are configured.
    pub fn from_config(config: &CredentialsConfig) -> Result<Self, TokenError> {
        match (&config.signing_key, &config.encryption_key) {
            (Some(signing_key), Some(encryption_key)) => {
                let signing_key = decode_key("signing_key", signing_key)?;
                let encryption_key = decode_key("encryption_key", encryption_key)?;
                Self::new(&signing_key, &encryption_key)
            }
            (None, None) => {
                tracing::warn!("No credentials configured, using ephemeral token keys");
                Ok(Self::ephemeral())
            }
            _ => Err(TokenError::Backend(
                "signing_key and encryption_key must be configured together".to_string(),
            )),
        }
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<String, TokenError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|_| TokenError::Backend("encryption failed".to_string()))?;

        let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        envelope.extend_from_slice(&nonce);
        envelope.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(envelope))
    }

    fn decrypt(&self, token: &str) -> Result<Vec<u8>, TokenError> {
        let envelope = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|err| TokenError::Malformed(err.to_string()))?;
        if envelope.len() <= NONCE_LEN {
            return Err(TokenError::Malformed("token is too short".to_string()));
        }

        let (nonce, ciphertext) = envelope.split_at(NONCE_LEN);
        self.cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| TokenError::Decryption)
    }
}

/// Decode a base64 key from configuration.
pub fn decode_key(name: &str, value: &str) -> Result<Vec<u8>, TokenError> {
    STANDARD
        .decode(value)
        .map_err(|err| TokenError::Backend(format!("{name} is not valid base64: {err}")))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidIssuer => TokenError::InvalidIssuer,
        ErrorKind::InvalidAudience => TokenError::InvalidAudience,
        _ => TokenError::Malformed(err.to_string()),
    }
}

#[async_trait]
impl TokenService for LocalTokenService {
    async fn sign_and_encrypt(
        &self,
        claims: &ClaimSet,
        descriptor: &TokenDescriptor,
    ) -> Result<String, TokenError> {
        let iat = now_secs();
        let exp = iat
            .checked_add(descriptor.lifetime.as_secs())
            .ok_or_else(|| TokenError::Backend("token lifetime is out of range".to_string()))?;
        let payload = TokenPayload {
            iss: &descriptor.issuer,
            aud: &descriptor.audience,
            iat,
            exp,
            token_type: &descriptor.token_type,
            claims,
        };

        let jws = encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)
            .map_err(|err| TokenError::Backend(err.to_string()))?;
        self.encrypt(jws.as_bytes())
    }

    async fn validate(
        &self,
        token: &str,
        parameters: &TokenValidationParameters,
    ) -> Result<ClaimSet, TokenError> {
        let plaintext = self.decrypt(token)?;
        let jws = String::from_utf8(plaintext)
            .map_err(|_| TokenError::Malformed("token is not UTF-8".to_string()))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.set_issuer(&[&parameters.issuer]);
        validation.set_audience(&[&parameters.audience]);

        let payload = decode::<DecodedPayload>(&jws, &self.decoding_key, &validation)
            .map_err(map_jwt_error)?
            .claims;

        if payload.token_type != parameters.token_type {
            return Err(TokenError::InvalidType {
                expected: parameters.token_type.clone(),
                actual: payload.token_type,
            });
        }

        ClaimSet::from_claims(payload.claims)
    }
}
