//! Outbound transport.
//!
//! Anything implementing `tower::Service<Invocation, Response = StatusCode>`
//! can carry invocations; [`ReqwestTransport`] is the production one. Its
//! client is configured through [`TransportSettings`].

pub mod http;
pub mod reqwest_integration;

use std::time::Duration;

use bon::Builder;
use snafu::ResultExt;

pub use reqwest_integration::ReqwestTransport;

use crate::config::{BuildClientSnafu, ConfigError};

pub const DEFAULT_USER_AGENT: &str = "Benchmark/1.0";

/// Connection and timeout settings for the HTTP client.
///
/// | Parameter | Default |
/// |-----------|---------|
/// | `user_agent` | `Benchmark/1.0` |
/// | `max_idle_per_host` | 5 |
/// | `connect_timeout` | 1 s |
/// | `request_timeout` | none |
/// | `max_redirects` | 0 (redirects are not followed) |
/// | `keep_alive` | true |
///
/// ```rust
/// use std::time::Duration;
/// use http_pressure::transport::TransportSettings;
///
/// let settings = TransportSettings::builder()
///     .max_idle_per_host(50)
///     .request_timeout(Duration::from_secs(3))
///     .build();
/// ```
#[derive(Clone, Debug, Builder)]
pub struct TransportSettings {
    #[builder(default = DEFAULT_USER_AGENT.to_string(), into)]
    pub(super) user_agent: String,

    /// Idle connections kept per host between requests.
    #[builder(default = 5)]
    pub(super) max_idle_per_host: usize,

    #[builder(default = Duration::from_millis(1000))]
    pub(super) connect_timeout: Duration,

    /// Total time allowed for a request, response body included.
    pub(super) request_timeout: Option<Duration>,

    /// Redirects are followed only when this is greater than zero.
    #[builder(default = 0)]
    pub(super) max_redirects: usize,

    /// When false, idle connections are dropped right away.
    #[builder(default = true)]
    pub(super) keep_alive: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl TransportSettings {
    pub fn build_client(&self) -> Result<reqwest::Client, ConfigError> {
        let redirect = if self.max_redirects > 0 {
            reqwest::redirect::Policy::limited(self.max_redirects)
        } else {
            reqwest::redirect::Policy::none()
        };
        let max_idle = if self.keep_alive {
            self.max_idle_per_host
        } else {
            0
        };

        let mut builder = reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(max_idle)
            .redirect(redirect);
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().context(BuildClientSnafu)
    }

    pub fn build_transport(&self) -> Result<ReqwestTransport, ConfigError> {
        self.build_client().map(ReqwestTransport::new_with_client)
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn max_idle_per_host(&self) -> usize {
        self.max_idle_per_host
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }
}
