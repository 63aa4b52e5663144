//! Authenticated HTTP client for the Talk to Refugee backend
//!
//! Wraps reqwest::Client with base-URL joining and bearer token injection.
//! Every request carries `Authorization: Bearer` except the sign-in route.

use anyhow::{bail, Context};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::config::Config;

/// Sign-in endpoint; the only route sent without a bearer token.
pub const AUTH_ROUTE: &str = "/interlocutor/auth";

/// Errors from the REST backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("401 Unauthorized for {url}. Token may be invalid -- run 't2r-cli login'.")]
    Unauthorized { url: String },
    #[error("HTTP {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("not signed in. Run 't2r-cli login' first.")]
    NotSignedIn,
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("invalid URL {url}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl ApiError {
    /// The `title` of an RFC 7807 problem body, when the server sent one.
    pub fn problem_title(&self) -> Option<String> {
        match self {
            ApiError::Status { body, .. } => serde_json::from_str::<serde_json::Value>(body)
                .ok()?
                .get("title")?
                .as_str()
                .map(String::from),
            _ => None,
        }
    }
}

/// Whether a request path needs the bearer token.
pub fn requires_auth(path: &str) -> bool {
    !path.contains(AUTH_ROUTE)
}

/// Join a base URL and an endpoint path, tolerating missing or doubled slashes.
pub fn join_url(base: &str, path: &str) -> Result<Url, ApiError> {
    let joined = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|source| ApiError::Url {
        url: joined,
        source,
    })
}

/// Authenticated client for the REST backend.
pub struct T2rClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl T2rClient {
    /// Build a client from explicit parts.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, ApiError> {
        let base_url = base_url.into();
        // Validate eagerly so every later join only fails on bad paths.
        join_url(&base_url, "/")?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            token,
        })
    }

    /// Client without credentials, for sign-in and sign-up.
    pub fn anonymous(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(config.api_url.clone(), None)?)
    }

    /// Client using the stored token. Fails if the user never signed in or the token expired.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let stored = config
            .auth_token
            .as_ref()
            .context("Not signed in. Run 't2r-cli login' first.")?;
        if stored.is_expired() {
            bail!("Session expired. Run 't2r-cli login'.");
        }
        Ok(Self::new(config.api_url.clone(), Some(stored.token.clone()))?)
    }

    /// Load config from disk and build an authenticated client.
    pub fn load() -> anyhow::Result<Self> {
        let config = Config::load()?;
        Self::from_config(&config)
    }

    fn request(&self, method: Method, path: &str) -> Result<(reqwest::RequestBuilder, String), ApiError> {
        let url = join_url(&self.base_url, path)?;
        let url_str = url.to_string();
        tracing::debug!("{} {}", method, url_str);

        let mut req = self.http.request(method, url);
        if requires_auth(path) {
            let token = self.token.as_deref().ok_or(ApiError::NotSignedIn)?;
            req = req.bearer_auth(token);
        }
        Ok((req, url_str))
    }

    /// GET and decode a JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let (req, url) = self.request(Method::GET, path)?;
        let resp = execute(req, &url).await?;
        decode_json(resp, &url).await
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let (req, url) = self.request(Method::POST, path)?;
        let resp = execute(req.json(body), &url).await?;
        decode_json(resp, &url).await
    }

    /// POST a JSON body, returning the raw response text (may be empty).
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<String, ApiError> {
        let (req, url) = self.request(Method::POST, path)?;
        let resp = execute(req.json(body), &url).await?;
        read_text(resp, &url).await
    }

    /// PUT a JSON body, ignoring the response body.
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let (req, url) = self.request(Method::PUT, path)?;
        execute(req.json(body), &url).await?;
        Ok(())
    }
}

/// Send a request and map transport failures and error statuses to `ApiError`.
pub(crate) async fn execute(
    req: reqwest::RequestBuilder,
    url: &str,
) -> Result<reqwest::Response, ApiError> {
    let resp = req.send().await.map_err(|source| ApiError::Network {
        url: url.to_string(),
        source,
    })?;
    check_response(resp, url).await
}

async fn read_text(resp: reqwest::Response, url: &str) -> Result<String, ApiError> {
    resp.text().await.map_err(|source| ApiError::Network {
        url: url.to_string(),
        source,
    })
}

pub(crate) async fn decode_json<T: DeserializeOwned>(resp: reqwest::Response, url: &str) -> Result<T, ApiError> {
    let text = read_text(resp, url).await?;
    serde_json::from_str(&text).map_err(|source| ApiError::Decode {
        url: url.to_string(),
        source,
    })
}

/// Check HTTP response status code and return a clear error on failure.
async fn check_response(resp: reqwest::Response, url: &str) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized {
            url: url.to_string(),
        });
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            url: url.to_string(),
            body,
        });
    }
    Ok(resp)
}
