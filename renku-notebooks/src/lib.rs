#![allow(clippy::match_like_matches_macro)]
#![cfg_attr(not(test), warn(clippy::unwrap_used))]
//! Caller identity resolution and autosave branch lifecycle for Renku sessions.
//!
//! Requests are resolved into an [`Identity`] by [`auth::Resolver`], which trusts the
//! identity headers it is given. It must only be deployed behind a gateway that has
//! already verified the id-token's signature.
//!
//! Autosave branches are discovered, evaluated and removed through
//! [`autosave::lifecycle::Autosaves`]. No state is kept between calls: every operation
//! rebuilds its view from the git host.
pub mod ancestry;
pub mod auth;
pub mod autosave;
pub mod cache;
pub mod config;
pub mod host;
pub mod identity;
#[cfg(any(test, feature = "test"))]
pub mod test;

pub use auth::{Caller, Resolver};
pub use autosave::lifecycle::Autosaves;
pub use autosave::AutosaveBranch;
pub use cache::ProjectCache;
pub use config::Config;
pub use identity::Identity;

pub mod prelude {
    use super::*;

    pub use ancestry::Relation;
    pub use auth::{Caller, Resolver};
    pub use autosave::{lifecycle::Autosaves, name::AutosaveName, AbbrevOid, AutosaveBranch};
    pub use cache::ProjectCache;
    pub use config::Config;
    pub use host::{Connect, GitHost};
    pub use identity::{Anonymous, Identity, Registered};
}

pub mod logger {
    use tracing::dispatcher::Dispatch;

    pub fn init() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
        tracing::dispatcher::set_global_default(Dispatch::new(subscriber()))
    }

    #[cfg(feature = "logfmt")]
    pub fn subscriber() -> impl tracing::Subscriber {
        use tracing_subscriber::layer::SubscriberExt as _;
        use tracing_subscriber::EnvFilter;

        tracing_subscriber::Registry::default()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .with(tracing_logfmt::layer())
    }

    #[cfg(not(feature = "logfmt"))]
    pub fn subscriber() -> impl tracing::Subscriber {
        tracing_subscriber::FmtSubscriber::builder()
            .with_target(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish()
    }
}
