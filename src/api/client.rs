use crate::config::ApiConfig;
use crate::error::{ApiError, RepcoachError, Result};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use tracing::{debug, trace};

/// Longest response body kept in a `ServerError`
const MAX_ERROR_BODY: usize = 200;

/// Opaque bearer token handed over by the login provider
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(token.into())
    }

    /// Build a credential from an optional token, ignoring blank values
    pub fn from_token(token: Option<&str>) -> Option<Self> {
        token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(Self::new)
    }

    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// HTTP transport to the analysis backend
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                RepcoachError::component("api_client".to_string(), format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn post(&self, path: &str, credential: &Credential) -> RequestBuilder {
        self.http
            .post(self.url(path))
            .header(reqwest::header::AUTHORIZATION, credential.bearer_header())
    }

    pub(crate) fn get(&self, path: &str, credential: &Credential) -> RequestBuilder {
        self.http
            .get(self.url(path))
            .header(reqwest::header::AUTHORIZATION, credential.bearer_header())
    }

    /// Send a request and map transport failures and non-2xx statuses
    pub(crate) async fn send(&self, request: RequestBuilder) -> std::result::Result<Response, ApiError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        trace!("Backend answered {} for {}", status, response.url());

        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized {
                status: status.as_u16(),
            });
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        debug!("Backend error {}: {}", status, body);

        Err(ApiError::ServerError {
            status: status.as_u16(),
            body,
        })
    }

    /// Send a request and decode the JSON body
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<T, ApiError> {
        let response = self.send(request).await?;
        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                ApiError::Decode {
                    details: e.to_string(),
                }
            } else {
                transport_error(e)
            }
        })
    }
}

fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_decode() {
        ApiError::Decode {
            details: e.to_string(),
        }
    } else {
        ApiError::Unreachable {
            details: e.to_string(),
        }
    }
}
