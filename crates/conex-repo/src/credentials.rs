//! Credentials and the HTTP client every server call goes through
//!
//! Key security features:
//! - Credentials are bound to the origin of the first URL of a request
//! - NEVER sends credentials after a cross-origin redirect
//! - Redirects are followed manually, at most 10 times

use std::time::Duration;

use base64::Engine;
use reqwest::{Method, StatusCode};
use url::Url;

use crate::error::{RepoError, Result, response_message};

const MAX_REDIRECTS: u32 = 10;
const TIMEOUT_SECS: u64 = 30;

/// Credential types supported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Basic authentication, also used for Artifactory access tokens
    Basic { username: String, password: String },

    /// Bearer token authentication
    Bearer { token: String },

    /// Status Page API key
    OAuth { token: String },
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Credentials::Bearer {
            token: token.into(),
        }
    }

    pub fn oauth(token: impl Into<String>) -> Self {
        Credentials::OAuth {
            token: token.into(),
        }
    }

    /// Value of the `Authorization` header
    pub fn auth_header(&self) -> String {
        match self {
            Credentials::Basic { username, password } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, password));
                format!("Basic {}", encoded)
            }
            Credentials::Bearer { token } => format!("Bearer {}", token),
            Credentials::OAuth { token } => format!("OAuth {}", token),
        }
    }
}

/// Check if two URLs are same-origin (for redirect safety)
pub fn same_origin(url1: &str, url2: &str) -> bool {
    match (Url::parse(url1), Url::parse(url2)) {
        (Ok(u1), Ok(u2)) => {
            u1.scheme() == u2.scheme()
                && u1.host() == u2.host()
                && u1.port_or_known_default() == u2.port_or_known_default()
        }
        _ => false,
    }
}

/// Request payload
#[derive(Debug, Clone, Default)]
pub enum Body {
    #[default]
    Empty,
    /// Sent as `application/json`
    Json(String),
    /// Sent as `text/plain`
    Text(String),
    /// Sent as `application/octet-stream`
    Bytes(Vec<u8>),
}

impl Body {
    pub fn json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Body::Json(serde_json::to_string(value)?))
    }

    fn content_type(&self) -> Option<&'static str> {
        match self {
            Body::Empty => None,
            Body::Json(_) => Some("application/json"),
            Body::Text(_) => Some("text/plain"),
            Body::Bytes(_) => Some("application/octet-stream"),
        }
    }
}

/// Client construction options
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientOptions {
    /// Skip TLS certificate verification
    pub insecure: bool,
}

/// Secure HTTP client wrapper with redirect protection
pub struct SecureHttpClient {
    client: reqwest::Client,
    credentials: Option<Credentials>,
}

impl SecureHttpClient {
    /// Create a new secure HTTP client
    pub fn new(credentials: Option<Credentials>) -> Result<Self> {
        Self::with_options(credentials, ClientOptions::default())
    }

    pub fn with_options(credentials: Option<Credentials>, options: ClientOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            // Redirects are followed by hand so credentials stay on one origin
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .danger_accept_invalid_certs(options.insecure)
            .user_agent(concat!("conex/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RepoError::NetworkError {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            credentials,
        })
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Send a request and return the response body
    ///
    /// Any 2xx status is a success; other statuses become the matching
    /// [`RepoError`] with the server's message.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        body: Body,
        headers: &[(&str, String)],
    ) -> Result<String> {
        let original_url = url.to_string();
        let mut current_url = url.to_string();
        let mut method = method;
        let mut body = body;
        let mut redirects = 0;

        loop {
            tracing::debug!("{} {}", method, current_url);
            let mut request = self.client.request(method.clone(), &current_url);
            for (name, value) in headers {
                request = request.header(*name, value.as_str());
            }
            if let Some(content_type) = body.content_type() {
                request = request.header(reqwest::header::CONTENT_TYPE, content_type);
            }
            request = match &body {
                Body::Empty => request,
                Body::Json(text) | Body::Text(text) => request.body(text.clone()),
                Body::Bytes(bytes) => request.body(bytes.clone()),
            };

            // Add auth ONLY if same origin as original URL
            if same_origin(&original_url, &current_url) {
                if let Some(creds) = &self.credentials {
                    request = request.header(reqwest::header::AUTHORIZATION, creds.auth_header());
                }
            } else if self.credentials.is_some() {
                tracing::warn!(
                    "Cross-origin redirect from {} to {} - credentials not forwarded",
                    original_url,
                    current_url
                );
            }

            let response = request.send().await?;
            let status = response.status();

            if status.is_redirection() {
                redirects += 1;
                if redirects > MAX_REDIRECTS {
                    return Err(RepoError::NetworkError {
                        message: format!("Too many redirects (max {})", MAX_REDIRECTS),
                    });
                }

                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| RepoError::NetworkError {
                        message: "Redirect without Location header".to_string(),
                    })?;

                let base = Url::parse(&current_url)?;
                current_url = base.join(location)?.to_string();

                // 307/308 replay the request, the others turn it into a GET
                let replay = matches!(
                    status,
                    StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
                );
                if !replay && method != Method::GET && method != Method::HEAD {
                    method = Method::GET;
                    body = Body::Empty;
                }
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60);

                return Err(RepoError::RateLimited { retry_after });
            }

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            let text = response.text().await?;

            if let Some(error) = RepoError::from_status(
                status.as_u16(),
                response_message(
                    status.as_u16(),
                    status.canonical_reason().unwrap_or_default(),
                    content_type.as_deref(),
                    &text,
                ),
            ) {
                tracing::debug!("{} {} failed with {}", method, current_url, status);
                return Err(error);
            }

            return Ok(text);
        }
    }

    pub async fn get(&self, url: &str) -> Result<String> {
        self.send(Method::GET, url, Body::Empty, &[]).await
    }
}
