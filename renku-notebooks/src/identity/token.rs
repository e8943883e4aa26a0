//! Decoding of the identity material forwarded by the gateway.
//!
//! The id-token's signature is *not* verified here. The gateway in front of the service
//! has already done so, and no verification key is available to this crate. Deploying
//! without such a gateway means trusting arbitrary callers.
use std::collections::BTreeMap;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Base64url, as used by compact JWS segments. Padding is optional.
const URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Standard base64, as used by the git credentials header. Padding is optional.
const STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Error, Debug)]
pub enum IdTokenError {
    #[error("expected 3 dot-separated segments, found {0}")]
    Segments(usize),
    #[error("claims segment is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("claims segment is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("credentials are not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("credentials are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected credentials for exactly one git host, found {0}")]
    EntryCount(usize),
    #[error("invalid git host URL '{0}': {1}")]
    Url(String, #[source] url::ParseError),
    #[error("authorization header has no token")]
    MissingToken,
}

/// The claims of an id-token that identify a registered user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Claims {
    pub email: String,
    pub name: String,
    pub preferred_username: String,
    #[serde(rename = "iss")]
    pub issuer: String,
    #[serde(rename = "sub")]
    pub subject: String,
}

impl Claims {
    /// Decode the claims of a compact `header.claims.signature` token, without
    /// verifying its signature.
    pub fn decode_unverified(token: &str) -> Result<Self, IdTokenError> {
        let segments = token.trim().split('.').collect::<Vec<_>>();
        let [_, claims, _] = segments.as_slice() else {
            return Err(IdTokenError::Segments(segments.len()));
        };
        let json = URL_SAFE.decode(claims)?;

        serde_json::from_slice(&json).map_err(IdTokenError::from)
    }
}

/// Credentials for the single git host a registered user is delegated to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCredentials {
    /// Base URL of the git host.
    pub url: Url,
    /// The full authorization header value, eg. `Bearer <token>`.
    pub authorization: String,
    /// The token part of the authorization header.
    pub token: String,
}

#[derive(Deserialize)]
struct Entry {
    #[serde(rename = "AuthorizationHeader")]
    authorization_header: String,
}

impl GitCredentials {
    /// Decode the base64 encoded JSON object mapping a git host URL to its
    /// authorization header.
    ///
    /// The object must hold exactly one entry.
    pub fn decode(blob: &str) -> Result<Self, CredentialsError> {
        let blob = blob
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect::<String>();
        let json = STANDARD.decode(blob)?;
        let entries: BTreeMap<String, Entry> = serde_json::from_slice(&json)?;

        if entries.len() != 1 {
            return Err(CredentialsError::EntryCount(entries.len()));
        }
        let Some((url, entry)) = entries.into_iter().next() else {
            return Err(CredentialsError::EntryCount(0));
        };
        let token = token(&entry.authorization_header).ok_or(CredentialsError::MissingToken)?;

        Ok(Self {
            url: Url::parse(&url).map_err(|e| CredentialsError::Url(url.clone(), e))?,
            token: token.to_owned(),
            authorization: entry.authorization_header,
        })
    }
}

/// Everything after the first run of whitespace in `<scheme> <token>`.
fn token(header: &str) -> Option<&str> {
    let (_, token) = header.trim_start().split_once(char::is_whitespace)?;
    let token = token.trim_start();

    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod test {
    use base64::Engine as _;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test::fixtures;

    #[test]
    fn test_claims_decode() {
        let token = fixtures::id_token("alice", "a@x.com", "Alice", "https://idp", "123");
        let claims = Claims::decode_unverified(&token).unwrap();

        assert_eq!(
            claims,
            Claims {
                email: "a@x.com".to_owned(),
                name: "Alice".to_owned(),
                preferred_username: "alice".to_owned(),
                issuer: "https://idp".to_owned(),
                subject: "123".to_owned(),
            }
        );
    }

    #[test]
    fn test_claims_decode_padded() {
        let claims = serde_json::json!({
            "email": "b@x.com", "name": "B", "preferred_username": "b", "iss": "i", "sub": "s"
        });
        let segment = base64::engine::general_purpose::URL_SAFE.encode(claims.to_string());
        let token = format!("e30.{segment}.c2ln");

        assert_eq!(Claims::decode_unverified(&token).unwrap().preferred_username, "b");
    }

    #[test]
    fn test_claims_decode_malformed() {
        assert!(matches!(
            Claims::decode_unverified("not-a-token"),
            Err(IdTokenError::Segments(1))
        ));
        assert!(matches!(
            Claims::decode_unverified("a.b.c.d"),
            Err(IdTokenError::Segments(4))
        ));
        assert!(matches!(
            Claims::decode_unverified("e30.!!!.c2ln"),
            Err(IdTokenError::Base64(_))
        ));
        // `{}` is missing every claim.
        assert!(matches!(
            Claims::decode_unverified("e30.e30.c2ln"),
            Err(IdTokenError::Json(_))
        ));
    }

    #[test]
    fn test_credentials_decode() {
        let blob = fixtures::git_credentials("https://git.example", "Bearer tok123");
        let creds = GitCredentials::decode(&blob).unwrap();

        assert_eq!(creds.url, Url::parse("https://git.example").unwrap());
        assert_eq!(creds.authorization, "Bearer tok123");
        assert_eq!(creds.token, "tok123");
    }

    #[test]
    fn test_credentials_decode_wrapped() {
        let blob = fixtures::git_credentials("https://git.example", "Bearer tok123");
        let (head, tail) = blob.split_at(10);
        let wrapped = format!("{head}\n{tail}\n");

        assert_eq!(GitCredentials::decode(&wrapped).unwrap().token, "tok123");
    }

    #[test]
    fn test_credentials_entry_count() {
        let encode = |v: serde_json::Value| STANDARD.encode(v.to_string());
        let empty = encode(serde_json::json!({}));
        let many = encode(serde_json::json!({
            "https://a.example": { "AuthorizationHeader": "Bearer a" },
            "https://b.example": { "AuthorizationHeader": "Bearer b" },
        }));

        assert!(matches!(
            GitCredentials::decode(&empty),
            Err(CredentialsError::EntryCount(0))
        ));
        assert!(matches!(
            GitCredentials::decode(&many),
            Err(CredentialsError::EntryCount(2))
        ));
    }

    #[test]
    fn test_credentials_missing_token() {
        let blob = fixtures::git_credentials("https://git.example", "Bearer");
        assert!(matches!(
            GitCredentials::decode(&blob),
            Err(CredentialsError::MissingToken)
        ));
    }

    #[test]
    fn test_credentials_invalid_url() {
        let blob = fixtures::git_credentials("not a url", "Bearer tok");
        assert!(matches!(
            GitCredentials::decode(&blob),
            Err(CredentialsError::Url(..))
        ));
    }

    #[test]
    fn test_token() {
        assert_eq!(token("Bearer tok"), Some("tok"));
        assert_eq!(token("Bearer \t  tok"), Some("tok"));
        assert_eq!(token("token a b"), Some("a b"));
        assert_eq!(token("Bearer tok \t"), Some("tok \t"));
        assert_eq!(token("  Bearer tok"), Some("tok"));
        assert_eq!(token("Bearer "), None);
        assert_eq!(token("tok"), None);
    }
}
