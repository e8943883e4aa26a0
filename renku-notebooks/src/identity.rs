pub mod token;

use std::fmt;
use std::fmt::Write as _;

use axum::http::HeaderMap;
use thiserror::Error;
use url::Url;

use crate::config::Config;

pub use token::{Claims, CredentialsError, GitCredentials, IdTokenError};

/// Header carrying the caller's access token.
pub const ACCESS_TOKEN_HEADER: &str = "Renku-Auth-Access-Token";
/// Header carrying the caller's OIDC id-token.
pub const ID_TOKEN_HEADER: &str = "Renku-Auth-Id-Token";
/// Header carrying the caller's delegated git credentials.
pub const GIT_CREDENTIALS_HEADER: &str = "Renku-Auth-Git-Credentials";
/// Header carrying an anonymous caller's opaque id.
pub const ANON_ID_HEADER: &str = "Renku-Auth-Anon-Id";

/// Escape character of [`safe_username`].
const ESCAPE: char = '-';

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid id token: {0}")]
    IdToken(#[from] IdTokenError),
    #[error("invalid git credentials: {0}")]
    GitCredentials(#[from] CredentialsError),
    #[error("header '{0}' is not valid ASCII")]
    InvalidHeader(&'static str),
    #[error("anonymous sessions are not enabled")]
    AnonymousDisabled,
}

/// A caller that has been authenticated, either through the gateway or through
/// an anonymous id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Registered(Registered),
    Anonymous(Anonymous),
}

impl Identity {
    pub fn username(&self) -> &str {
        match self {
            Self::Registered(user) => &user.username,
            Self::Anonymous(user) => &user.id,
        }
    }

    pub fn safe_username(&self) -> &str {
        match self {
            Self::Registered(user) => &user.safe_username,
            Self::Anonymous(user) => &user.safe_username,
        }
    }

    pub fn full_name(&self) -> Option<&str> {
        self.registered().map(|u| u.full_name.as_str())
    }

    pub fn email(&self) -> Option<&str> {
        self.registered().map(|u| u.email.as_str())
    }

    pub fn oidc_issuer(&self) -> Option<&str> {
        self.registered().map(|u| u.oidc_issuer.as_str())
    }

    pub fn subject_id(&self) -> Option<&str> {
        self.registered().map(|u| u.subject_id.as_str())
    }

    pub fn git_token(&self) -> Option<&str> {
        self.registered().map(|u| u.git_token.as_str())
    }

    pub fn registered(&self) -> Option<&Registered> {
        match self {
            Self::Registered(user) => Some(user),
            Self::Anonymous(_) => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous(_))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered(user) => user.fmt(f),
            Self::Anonymous(user) => user.fmt(f),
        }
    }
}

impl From<Registered> for Identity {
    fn from(user: Registered) -> Self {
        Self::Registered(user)
    }
}

impl From<Anonymous> for Identity {
    fn from(user: Anonymous) -> Self {
        Self::Anonymous(user)
    }
}

/// A user known to the identity provider, with delegated git credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub username: String,
    pub safe_username: String,
    pub full_name: String,
    pub email: String,
    pub oidc_issuer: String,
    pub subject_id: String,
    pub git_url: Url,
    pub git_token: String,
}

impl Registered {
    /// Headers that must all be present for a registered caller.
    pub const HEADERS: [&'static str; 3] =
        [ACCESS_TOKEN_HEADER, ID_TOKEN_HEADER, GIT_CREDENTIALS_HEADER];

    /// Build a user from its id-token claims and git credentials.
    pub fn new(claims: Claims, credentials: GitCredentials) -> Self {
        Self {
            safe_username: safe_username(&claims.preferred_username),
            username: claims.preferred_username,
            full_name: claims.name,
            email: claims.email,
            oidc_issuer: claims.issuer,
            subject_id: claims.subject,
            git_url: credentials.url,
            git_token: credentials.token,
        }
    }

    /// Authenticate a registered user from request headers.
    ///
    /// Returns `None` if any of the [`Registered::HEADERS`] is missing. The id-token is
    /// decoded without verifying its signature.
    pub fn from_headers(headers: &HeaderMap) -> Result<Option<Self>, Error> {
        if !Self::HEADERS.iter().all(|h| headers.contains_key(*h)) {
            return Ok(None);
        }
        let id_token = header(headers, ID_TOKEN_HEADER)?;
        let credentials = header(headers, GIT_CREDENTIALS_HEADER)?;

        let claims = Claims::decode_unverified(id_token)?;
        let credentials = GitCredentials::decode(credentials)?;

        Ok(Some(Self::new(claims, credentials)))
    }
}

impl fmt::Display for Registered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<registered user username:{} name:{} email:{}>",
            self.username, self.full_name, self.email
        )
    }
}

/// A caller identified only by an opaque id of its own choosing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anonymous {
    /// The anonymous id; it doubles as the username.
    pub id: String,
    pub safe_username: String,
}

impl Anonymous {
    pub const HEADER: &'static str = ANON_ID_HEADER;

    /// Authenticate an anonymous caller from request headers.
    ///
    /// Fails before looking at any header when anonymous sessions are disabled.
    /// Returns `None` if the id is missing, empty or does not start with an ASCII
    /// alphanumeric character.
    pub fn from_headers(headers: &HeaderMap, config: &Config) -> Result<Option<Self>, Error> {
        if !config.anonymous_sessions_enabled {
            return Err(Error::AnonymousDisabled);
        }
        let Some(id) = headers.get(Self::HEADER).and_then(|v| v.to_str().ok()) else {
            return Ok(None);
        };
        if !id.starts_with(|c: char| c.is_ascii_alphanumeric()) {
            return Ok(None);
        }
        Ok(Some(Self {
            id: id.to_owned(),
            safe_username: safe_username(id),
        }))
    }
}

impl fmt::Display for Anonymous {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.id.chars().take(5).collect::<String>();
        write!(f, "<anonymous id:{prefix}****>")
    }
}

/// Transform a username into a lowercase string made of `[a-z0-9-]` only.
///
/// Every byte of a character outside `[A-Za-z0-9]` is written as `-` followed by two hex
/// digits. Since the escape character is itself escaped, distinct usernames map to
/// distinct results, up to ASCII case.
pub fn safe_username(username: &str) -> String {
    let mut safe = String::with_capacity(username.len());
    let mut buf = [0; 4];

    for c in username.chars() {
        if c.is_ascii_alphanumeric() {
            safe.push(c.to_ascii_lowercase());
            continue;
        }
        for byte in c.encode_utf8(&mut buf).bytes() {
            // Writing to a `String` cannot fail.
            let _ = write!(safe, "{ESCAPE}{byte:02x}");
        }
    }
    safe
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, Error> {
    headers
        .get(name)
        .ok_or(Error::InvalidHeader(name))?
        .to_str()
        .map_err(|_| Error::InvalidHeader(name))
}
