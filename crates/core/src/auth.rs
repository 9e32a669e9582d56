//! Outbound authentication schemes and header injection.
//!
//! [`AuthScheme`] is a tagged union covering every authentication mode a
//! tenant can declare on a connection or webhook. Applying a scheme is a
//! pure header mutation with no I/O; HMAC signatures are computed over the
//! exact byte sequence that will be transmitted, never a re-serialization.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::CoreError;

/// Default header carrying an API key.
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Default header carrying an HMAC payload signature.
pub const DEFAULT_SIGNATURE_HEADER: &str = "X-Signature";

type HmacSha256 = Hmac<Sha256>;

// ---------------------------------------------------------------------------
// AuthSurface
// ---------------------------------------------------------------------------

/// The kind of registration an auth scheme is attached to.
///
/// API connections and webhooks accept different scheme subsets: HMAC
/// signing only makes sense where we control the payload (webhooks), while
/// basic auth and OAuth2 bearer tokens are connection-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSurface {
    Api,
    Webhook,
}

// ---------------------------------------------------------------------------
// AuthScheme
// ---------------------------------------------------------------------------

/// A declared outbound authentication scheme with its credentials.
///
/// Serialized as a tagged JSON object (`auth_type` discriminant), which is
/// also the storage format of the `auth_config` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "auth_type", rename_all = "snake_case")]
pub enum AuthScheme {
    /// No credentials attached.
    None,

    /// A static key sent in a configurable header.
    ApiKey {
        #[serde(default = "default_api_key_header")]
        header: String,
        key: String,
    },

    /// `Authorization: Bearer <token>`.
    BearerToken { token: String },

    /// `Authorization: Basic <base64(username:password)>`.
    BasicAuth { username: String, password: String },

    /// An already-obtained OAuth2 access token, sent as a bearer token.
    /// Token acquisition and refresh happen elsewhere.
    Oauth2 { access_token: String },

    /// HMAC-SHA256 signature over the transmitted payload, hex-encoded and
    /// sent as `sha256=<hex>` in a configurable header. Webhooks only.
    HmacSignature {
        secret_key: String,
        #[serde(default = "default_signature_header")]
        signature_header: String,
    },
}

impl Default for AuthScheme {
    fn default() -> Self {
        Self::None
    }
}

fn default_api_key_header() -> String {
    DEFAULT_API_KEY_HEADER.to_string()
}

fn default_signature_header() -> String {
    DEFAULT_SIGNATURE_HEADER.to_string()
}

impl AuthScheme {
    /// Return the wire-format discriminant for this variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ApiKey { .. } => "api_key",
            Self::BearerToken { .. } => "bearer_token",
            Self::BasicAuth { .. } => "basic_auth",
            Self::Oauth2 { .. } => "oauth2",
            Self::HmacSignature { .. } => "hmac_signature",
        }
    }

    /// Inject credentials into `headers`.
    ///
    /// Pure: no side effects beyond header mutation. Empty credential
    /// values skip injection entirely and the remote rejects the call with
    /// its own auth error; registration validation normally prevents that
    /// state (see [`AuthScheme::validate_for`]).
    ///
    /// `body` must be the exact bytes that will be transmitted — signature
    /// schemes sign it as-is.
    pub fn apply(&self, headers: &mut HashMap<String, String>, body: &[u8]) {
        match self {
            Self::None => {}
            Self::ApiKey { header, key } => {
                if !key.is_empty() {
                    let name = if header.is_empty() {
                        DEFAULT_API_KEY_HEADER
                    } else {
                        header.as_str()
                    };
                    headers.insert(name.to_string(), key.clone());
                }
            }
            Self::BearerToken { token } | Self::Oauth2 { access_token: token } => {
                if !token.is_empty() {
                    headers.insert("Authorization".to_string(), format!("Bearer {token}"));
                }
            }
            Self::BasicAuth { username, password } => {
                if !username.is_empty() && !password.is_empty() {
                    let credentials = BASE64.encode(format!("{username}:{password}"));
                    headers.insert("Authorization".to_string(), format!("Basic {credentials}"));
                }
            }
            Self::HmacSignature {
                secret_key,
                signature_header,
            } => {
                if !secret_key.is_empty() {
                    let name = if signature_header.is_empty() {
                        DEFAULT_SIGNATURE_HEADER
                    } else {
                        signature_header.as_str()
                    };
                    let signature = sign_hmac(secret_key, body);
                    headers.insert(name.to_string(), format!("sha256={signature}"));
                }
            }
        }
    }

    /// Check that this scheme is allowed on `surface` and that every
    /// required credential is present.
    ///
    /// Registration goes through this check so an incomplete scheme is
    /// rejected up front instead of silently skipping header injection at
    /// dispatch time.
    pub fn validate_for(&self, surface: AuthSurface) -> Result<(), CoreError> {
        match (self, surface) {
            (Self::BasicAuth { .. } | Self::Oauth2 { .. }, AuthSurface::Webhook) => {
                return Err(CoreError::Validation(format!(
                    "auth type '{}' is not supported for webhooks",
                    self.type_name()
                )));
            }
            (Self::HmacSignature { .. }, AuthSurface::Api) => {
                return Err(CoreError::Validation(
                    "auth type 'hmac_signature' is only supported for webhooks".to_string(),
                ));
            }
            _ => {}
        }

        match self {
            Self::None => Ok(()),
            Self::ApiKey { key, .. } => require(!key.is_empty(), "api_key auth requires a key"),
            Self::BearerToken { token } => {
                require(!token.is_empty(), "bearer_token auth requires a token")
            }
            Self::BasicAuth { username, password } => require(
                !username.is_empty() && !password.is_empty(),
                "basic_auth requires both username and password",
            ),
            Self::Oauth2 { access_token } => require(
                !access_token.is_empty(),
                "oauth2 auth requires an access token",
            ),
            Self::HmacSignature { secret_key, .. } => require(
                !secret_key.is_empty(),
                "hmac_signature auth requires a secret key",
            ),
        }
    }
}

fn require(condition: bool, message: &str) -> Result<(), CoreError> {
    if condition {
        Ok(())
    } else {
        Err(CoreError::Validation(message.to_string()))
    }
}

// ---------------------------------------------------------------------------
// HMAC signing
// ---------------------------------------------------------------------------

/// Compute the hex-encoded HMAC-SHA256 of `payload` under `secret`.
pub fn sign_hmac(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

// ---------------------------------------------------------------------------
// hex encoding helper (no extra dep)
// ---------------------------------------------------------------------------

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
