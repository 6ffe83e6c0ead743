use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, Response};
use serde::Deserialize;
use url::Url;

use crate::Error;

const USER_AGENT: &str = concat!("docbench-client/", env!("CARGO_PKG_VERSION"));

#[derive(Debug)]
struct ClientBuilderInner {
    service_url: Url,
    reqwest_builder: reqwest::ClientBuilder,
}

/// Builder to create a [`Client`].
#[must_use]
#[derive(Debug)]
pub struct ClientBuilder(crate::Result<ClientBuilderInner>);

impl ClientBuilder {
    /// Creates a new [`ClientBuilder`], configured with the given `service_url`.
    pub fn new(service_url: impl reqwest::IntoUrl) -> Self {
        let service_url = match service_url.into_url() {
            Ok(url) => url,
            Err(err) => return Self(Err(err.into())),
        };

        // Benchmarks hammer a single host, so keep plenty of idle connections around. The
        // timeouts are generous since a loaded cluster can take a while to answer.
        let reqwest_builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(60))
            .timeout(Duration::from_secs(300))
            .pool_idle_timeout(Duration::from_secs(1800))
            .user_agent(USER_AGENT);

        Self(Ok(ClientBuilderInner {
            service_url,
            reqwest_builder,
        }))
    }

    /// Sets the total request timeout for the [`reqwest::Client`].
    /// For more fine-grained configuration, use [`Self::configure_reqwest`].
    pub fn timeout(self, timeout: Duration) -> Self {
        self.configure_reqwest(|builder| builder.timeout(timeout))
    }

    /// Calls the closure with the underlying [`reqwest::ClientBuilder`].
    pub fn configure_reqwest<F>(self, closure: F) -> Self
    where
        F: FnOnce(reqwest::ClientBuilder) -> reqwest::ClientBuilder,
    {
        let Ok(inner) = self.0 else { return self };
        Self(Ok(ClientBuilderInner {
            service_url: inner.service_url,
            reqwest_builder: closure(inner.reqwest_builder),
        }))
    }

    /// Returns a [`Client`] that uses this [`ClientBuilder`] configuration.
    ///
    /// # Errors
    ///
    /// This method fails if:
    /// - the given `service_url` is invalid or cannot be used as a base URL
    /// - the [`reqwest::Client`] fails to build. Refer to [`reqwest::ClientBuilder::build`] for
    ///   more information on when this can happen.
    pub fn build(self) -> crate::Result<Client> {
        let inner = self.0?;
        if inner.service_url.cannot_be_a_base() {
            return Err(Error::InvalidUrl {
                message: format!("`{}` cannot be used as a base URL", inner.service_url),
            });
        }

        Ok(Client {
            inner: Arc::new(ClientInner {
                reqwest: inner.reqwest_builder.build()?,
                service_url: inner.service_url,
            }),
        })
    }
}

/// The index (and optionally the legacy mapping type) that documents are written to.
///
/// When a type is set, requests use the typed URL layout of older servers, for instance
/// `/{index}/{type}/{id}/_create`. Otherwise the typeless layout is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    name: String,
    doc_type: Option<String>,
}

impl Index {
    /// Creates a reference to a typeless index.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc_type: None,
        }
    }

    /// Uses the given mapping type for all document requests.
    ///
    /// An empty type is treated as no type.
    pub fn with_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into()).filter(|t| !t.is_empty());
        self
    }

    /// The index name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The mapping type, if any.
    #[inline]
    pub fn doc_type(&self) -> Option<&str> {
        self.doc_type.as_deref()
    }
}

#[derive(Debug)]
pub(crate) struct ClientInner {
    reqwest: reqwest::Client,
    service_url: Url,
}

/// A client for an Elasticsearch-compatible document service.
///
/// Use [`Client::builder`] to configure and construct this.
#[derive(Debug, Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

impl Client {
    /// Convenience function to create a [`ClientBuilder`].
    pub fn builder(service_url: impl reqwest::IntoUrl) -> ClientBuilder {
        ClientBuilder::new(service_url)
    }

    /// The base URL of the service.
    pub fn service_url(&self) -> &Url {
        &self.inner.service_url
    }

    /// Resolves the given path segments against the service URL, percent-encoding each of them.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> crate::Result<Url> {
        let mut url = self.inner.service_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl {
                message: format!("`{}` cannot be used as a base URL", self.inner.service_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.inner.reqwest.request(method, url)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed { error: ErrorDetail },
    Plain { error: String },
}

#[derive(Deserialize)]
struct ErrorDetail {
    reason: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Turns non-success responses into [`Error::Status`], extracting the service's reason.
pub(crate) async fn check_status(response: Response) -> crate::Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!(%status, %body, "request failed");

    let reason = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody::Detailed { error }) => error.reason.or(error.kind).unwrap_or(body),
        Ok(ErrorBody::Plain { error }) => error,
        Err(_) if body.is_empty() => status.canonical_reason().unwrap_or("unknown").to_owned(),
        Err(_) => body,
    };

    Err(Error::Status { status, reason })
}
