//! Out-of-band token codec.
//!
//! Tokens carry a transport descriptor (and, for invites, the session key)
//! through a link, QR code or pasted text. Both kinds share one pipeline:
//!
//! ```text
//! json({ "t": kind, "s": descriptor, "k": base64(key)? }) -> zstd -> base64url (no padding)
//! ```
//!
//! Decoding is lenient about older token shapes and tries, in order:
//! compressed tokens, plain base64 JSON, then raw JSON. The first branch
//! that yields a well-formed payload with a non-empty descriptor wins.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use pairlink_crypto::SessionKey;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::transport::Descriptor;

/// Longest pasted token we attempt to decode.
pub const MAX_TOKEN_LEN: usize = 32 * 1024;

/// Cap on decompressed payload size.
pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024;

const COMPRESSION_LEVEL: i32 = 19;

/// What a token is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Host to guest: descriptor plus session key.
    Invite,
    /// Guest to host: descriptor only.
    Response,
}

/// Errors while producing a token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Failed to serialize token payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to compress token payload: {0}")]
    Compress(#[from] std::io::Error),
}

/// Which decoding branch accepted a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFormat {
    Compressed,
    PlainBase64,
    RawJson,
}

/// A successfully decoded token.
pub struct DecodedToken {
    pub kind: TokenKind,
    pub format: TokenFormat,
    pub descriptor: Descriptor,
    /// Raw key bytes; present exactly when `kind` is `Invite`.
    pub key: Option<Zeroizing<Vec<u8>>>,
}

impl std::fmt::Debug for DecodedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedToken")
            .field("kind", &self.kind)
            .field("format", &self.format)
            .field("descriptor", &self.descriptor)
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct TokenPayload {
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    kind: Option<TokenKind>,
    #[serde(rename = "s")]
    descriptor: Descriptor,
    #[serde(rename = "k", default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
}

/// Encode the host's invite: descriptor plus exported session key.
pub fn encode_invite(descriptor: &Descriptor, key: &SessionKey) -> Result<String, TokenError> {
    let raw_key = Zeroizing::new(key.export());
    let mut payload = TokenPayload {
        kind: Some(TokenKind::Invite),
        descriptor: descriptor.clone(),
        key: Some(STANDARD.encode(raw_key.as_slice())),
    };
    let token = encode_payload(&payload);
    payload.key.zeroize();
    token
}

/// Encode the guest's response. Never carries a key.
pub fn encode_response(descriptor: &Descriptor) -> Result<String, TokenError> {
    encode_payload(&TokenPayload {
        kind: Some(TokenKind::Response),
        descriptor: descriptor.clone(),
        key: None,
    })
}

fn encode_payload(payload: &TokenPayload) -> Result<String, TokenError> {
    let json = Zeroizing::new(serde_json::to_vec(payload)?);
    let compressed = zstd::bulk::compress(&json, COMPRESSION_LEVEL)?;
    Ok(URL_SAFE_NO_PAD.encode(compressed))
}

/// Decode any supported token shape. Returns `None` for malformed input.
pub fn decode(input: &str) -> Option<DecodedToken> {
    let token = input.trim();
    if token.is_empty() || token.len() > MAX_TOKEN_LEN {
        return None;
    }

    let decoded = decode_compressed(token)
        .or_else(|| decode_plain_base64(token))
        .or_else(|| decode_raw_json(token));

    match &decoded {
        Some(d) => debug!(kind = ?d.kind, format = ?d.format, "Decoded token"),
        None => debug!(len = token.len(), "Token rejected by every decoder"),
    }
    decoded
}

fn decode_compressed(token: &str) -> Option<DecodedToken> {
    let compressed = URL_SAFE_NO_PAD.decode(token).ok()?;
    let json = Zeroizing::new(zstd::bulk::decompress(&compressed, MAX_PAYLOAD_BYTES).ok()?);
    parse_payload(&json, TokenFormat::Compressed)
}

fn decode_plain_base64(token: &str) -> Option<DecodedToken> {
    let json = [STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(token).ok())
        .map(Zeroizing::new)?;
    parse_payload(&json, TokenFormat::PlainBase64)
}

fn decode_raw_json(token: &str) -> Option<DecodedToken> {
    parse_payload(token.as_bytes(), TokenFormat::RawJson)
}

fn parse_payload(bytes: &[u8], format: TokenFormat) -> Option<DecodedToken> {
    let payload: TokenPayload = serde_json::from_slice(bytes).ok()?;
    if payload.descriptor.is_empty() {
        return None;
    }

    let key = match payload.key {
        Some(encoded) => {
            let encoded = Zeroizing::new(encoded);
            let raw = STANDARD.decode(encoded.as_bytes()).ok()?;
            Some(Zeroizing::new(raw))
        }
        None => None,
    };

    // Untagged tokens predate the kind field; infer it from the key.
    let kind = match (payload.kind, key.is_some()) {
        (Some(TokenKind::Invite), true) | (None, true) => TokenKind::Invite,
        (Some(TokenKind::Response), false) | (None, false) => TokenKind::Response,
        (Some(TokenKind::Invite), false) | (Some(TokenKind::Response), true) => return None,
    };

    Some(DecodedToken {
        kind,
        format,
        descriptor: payload.descriptor,
        key,
    })
}
