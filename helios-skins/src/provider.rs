//!
//! Upstream identity providers that hand out signed textures.
//!

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::{error::BuildError, texture::TEXTURES_PROPERTY, Identity, TexturePayload};

pub const DEFAULT_SESSION_SERVER: &str = "https://sessionserver.mojang.com";
pub const DEFAULT_PROFILE_API: &str = "https://api.mojang.com";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The provider affirmatively knows no such identity. Never retried.
    #[error("identity not found")]
    NotFound,
    /// Network or provider hiccup that might succeed on retry.
    #[error("transient upstream failure: {0}")]
    Transient(String),
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// Source of signed textures.
#[async_trait]
pub trait TextureProvider: Send + Sync {
    async fn fetch_texture(&self, identity: &Identity) -> Result<TexturePayload, FetchError>;
}

#[derive(Debug, Deserialize)]
struct SessionProfile {
    #[serde(default)]
    properties: Vec<SessionProperty>,
}

#[derive(Debug, Deserialize)]
struct SessionProperty {
    name: String,
    value: String,
    #[serde(default)]
    signature: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NameLookup {
    id: String,
}

/// Client for Mojang's session server and profile API.
#[derive(Debug, Clone)]
pub struct MojangProvider {
    http: reqwest::Client,
    session_server: Url,
    profile_api: Url,
}

impl MojangProvider {
    pub fn new() -> Result<Self, BuildError> {
        Self::with_endpoints(
            parse_endpoint(DEFAULT_SESSION_SERVER)?,
            parse_endpoint(DEFAULT_PROFILE_API)?,
            DEFAULT_REQUEST_TIMEOUT,
        )
    }

    /// Endpoints may carry a path prefix, with or without a trailing slash.
    pub fn with_endpoints(
        session_server: Url,
        profile_api: Url,
        request_timeout: Duration,
    ) -> Result<Self, BuildError> {
        for base in [&session_server, &profile_api] {
            if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
                return Err(BuildError::InvalidEndpoint(base.to_string()));
            }
        }
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            session_server,
            profile_api,
        })
    }

    /// Appends `prefix` and then `segment` to the path of `base`, percent-encoding each one.
    ///
    /// `segment` is caller input, so it must stay a single path segment. Values
    /// that would be dropped or resolved as dot segments are reported as not found.
    fn endpoint(base: &Url, prefix: &[&str], segment: &str) -> Result<Url, FetchError> {
        if matches!(segment, "" | "." | "..") {
            return Err(FetchError::NotFound);
        }
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Transient(format!("{base} cannot take a path")))?
            .pop_if_empty()
            .extend(prefix)
            .push(segment);
        Ok(url)
    }

    /// Resolves a player name to its account identity.
    pub async fn resolve_name(&self, name: &str) -> Result<Identity, FetchError> {
        let url = Self::endpoint(&self.profile_api, &["users", "profiles", "minecraft"], name)?;
        let response = self.http.get(url).send().await.map_err(transport_error)?;
        classify_status(response.status())?;
        let lookup: NameLookup = response.json().await.map_err(transport_error)?;
        Ok(Identity::from(lookup.id))
    }
}

fn parse_endpoint(value: &str) -> Result<Url, BuildError> {
    Url::parse(value).map_err(|e| BuildError::InvalidEndpoint(format!("{value}: {e}")))
}

#[async_trait]
impl TextureProvider for MojangProvider {
    async fn fetch_texture(&self, identity: &Identity) -> Result<TexturePayload, FetchError> {
        let mut url = Self::endpoint(
            &self.session_server,
            &["session", "minecraft", "profile"],
            &identity.undashed(),
        )?;
        url.query_pairs_mut().append_pair("unsigned", "false");

        let response = self.http.get(url).send().await.map_err(transport_error)?;
        classify_status(response.status())?;
        let profile: SessionProfile = response.json().await.map_err(transport_error)?;

        let property = profile
            .properties
            .into_iter()
            .find(|p| p.name == TEXTURES_PROPERTY)
            .ok_or(FetchError::NotFound)?;
        // An unsigned property is handed on as is; verification rejects it.
        Ok(TexturePayload::new(
            property.value,
            property.signature.unwrap_or_default(),
        ))
    }
}

fn transport_error(error: reqwest::Error) -> FetchError {
    FetchError::Transient(error.to_string())
}

fn classify_status(status: StatusCode) -> Result<(), FetchError> {
    if status == StatusCode::NO_CONTENT {
        return Err(FetchError::NotFound);
    }
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        return Err(FetchError::Transient(format!("upstream responded {status}")));
    }
    Err(FetchError::NotFound)
}
