//! Event-stream client with cookie-based credentials

use crate::sse::decode_event_stream;
use crate::transport::{EventTransport, FrameStream};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::{
    cookie::Jar,
    header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CACHE_CONTROL, CONTENT_TYPE},
    Client, Response, Url,
};
use signage_core::{Error, LiveConfig, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument};

const LAST_EVENT_ID: HeaderName = HeaderName::from_static("last-event-id");

/// Opens the admin event stream over HTTP.
///
/// Credentials are carried by a cookie jar seeded with the session cookie,
/// so every connection and reconnection authenticates the same way the
/// REST client does.
#[derive(Clone)]
pub struct HttpEventTransport {
    http: Client,
    url: String,
    connect_timeout: Duration,
}

impl HttpEventTransport {
    /// Build a transport for the endpoint described by `config`
    pub fn new(config: &LiveConfig) -> Result<Self> {
        let base: Url = config
            .base_url
            .parse()
            .map_err(|e| Error::Config(format!("invalid base URL {}: {}", config.base_url, e)))?;

        let jar = Arc::new(Jar::default());
        if let Some(cookie) = &config.session_cookie {
            jar.add_cookie_str(cookie, &base);
        }

        // No overall request timeout: the body is a long-lived stream
        let http = Client::builder()
            .cookie_provider(jar)
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self {
            http,
            url: config.events_url(),
            connect_timeout: config.connect_timeout(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn default_headers(last_event_id: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        if let Some(id) = last_event_id {
            if let Ok(value) = HeaderValue::from_str(id) {
                headers.insert(LAST_EVENT_ID, value);
            }
        }

        headers
    }

    /// Map an unusable response to the matching error
    fn check_response(response: &Response) -> Result<()> {
        let status = response.status();
        match status.as_u16() {
            401 => return Err(Error::AuthenticationError("Session expired".to_string())),
            403 => return Err(Error::AuthenticationError("Access forbidden".to_string())),
            _ if !status.is_success() => return Err(Error::HttpStatus(status.as_u16())),
            _ => {}
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !content_type.starts_with("text/event-stream") {
            return Err(Error::InvalidContentType(content_type.to_string()));
        }

        Ok(())
    }

    /// Connect and return the decoded frame stream
    #[instrument(skip(self))]
    async fn connect(&self, last_event_id: Option<String>) -> Result<FrameStream> {
        debug!("Opening event stream: {}", self.url);

        let request = self
            .http
            .get(&self.url)
            .headers(Self::default_headers(last_event_id.as_deref()))
            .send();

        let response = tokio::time::timeout(self.connect_timeout, request)
            .await
            .map_err(|_| {
                Error::Transport(format!(
                    "timed out after {}ms opening event stream",
                    self.connect_timeout.as_millis()
                ))
            })??;

        if let Err(e) = Self::check_response(&response) {
            error!("Event stream rejected: {}", e);
            return Err(e);
        }

        debug!("Event stream open, status {}", response.status());
        Ok(decode_event_stream(response.bytes_stream()))
    }
}

impl EventTransport for HttpEventTransport {
    fn open(&self, last_event_id: Option<String>) -> BoxFuture<'static, Result<FrameStream>> {
        let this = self.clone();
        async move { this.connect(last_event_id).await }.boxed()
    }
}
