use crate::config::ModemConfig;
use crate::error::{ModemError, Result};
use crate::metrics::registry::MetricRegistry;
use crate::metrics::schema::{REQUEST_DURATION, SCRAPE_RESULT};
use crate::modem::transport::Transport;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Instant;

// Unlikely that the modem cares, but it is easy enough to look like a browser
const BROWSER_HEADERS: &[(&str, &str)] = &[
    (
        "user-agent",
        "Mozilla/5.0 (X11; Linux x86_64; rv:123.4) Gecko/20100101 Firefox/123.4",
    ),
    ("accept", "*/*"),
    ("accept-language", "en-US,en;q=0.5"),
    ("content-type", "application/x-www-form-urlencoded; charset=utf-8"),
    ("x-requested-with", "XMLHttpRequest"),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "same-origin"),
    ("pragma", "no-cache"),
    ("cache-control", "no-cache"),
];

/// Which request a measurement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeTarget {
    Login,
    ConnectionData,
    ProductInfo,
}

impl ScrapeTarget {
    pub fn label(&self) -> &'static str {
        match self {
            ScrapeTarget::Login => "login",
            ScrapeTarget::ConnectionData => "connection_data",
            ScrapeTarget::ProductInfo => "product_info",
        }
    }
}

#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub body: String,
    /// Raw `Set-Cookie` header values
    pub set_cookies: Vec<String>,
}

pub struct Client {
    transport: Transport,
    base_url: String,
    status_path: String,
    info_path: String,
    headers: HeaderMap,
    credential_fragment: String,
    registry: Arc<dyn MetricRegistry>,
}

impl Client {
    pub fn new(config: &ModemConfig, registry: Arc<dyn MetricRegistry>) -> Result<Self> {
        let credentials = STANDARD.encode(format!("{}:{}", config.username, config.password()?));

        let mut headers = HeaderMap::new();
        for &(name, value) in BROWSER_HEADERS {
            headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }
        let authorization = HeaderValue::from_str(&format!("Basic {}", credentials))
            .map_err(|e| anyhow::anyhow!("invalid authorization header: {}", e))?;
        headers.insert(header::AUTHORIZATION, authorization);

        Ok(Self {
            transport: Transport::new(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            status_path: config.status_path.clone(),
            info_path: config.info_path.clone(),
            headers,
            credential_fragment: urlencoding::encode(&credentials).into_owned(),
            registry,
        })
    }

    /// The modem wants a portion of the basic auth string in the URL as well
    /// as the full string in the header.
    pub fn login_path(&self) -> String {
        format!("{}?login_{}", self.status_path, self.credential_fragment)
    }

    pub fn data_path(&self, target: ScrapeTarget, token: &str) -> String {
        let path = match target {
            ScrapeTarget::ProductInfo => &self.info_path,
            ScrapeTarget::Login | ScrapeTarget::ConnectionData => &self.status_path,
        };
        format!("{}?ct_{}", path, token)
    }

    /// Sends one GET, recording its duration and status code.
    pub async fn get(
        &self,
        target: ScrapeTarget,
        path_and_query: &str,
        cookie_header: Option<&str>,
    ) -> Result<Response, ModemError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let mut headers = self.headers.clone();
        if let Some(cookies) = cookie_header.filter(|c| !c.is_empty()) {
            // a value the header can't carry is sent without cookies
            match HeaderValue::from_str(cookies) {
                Ok(value) => {
                    headers.insert(header::COOKIE, value);
                }
                Err(e) => tracing::warn!(error = %e, "Dropping unsendable cookie header"),
            }
        }

        let start = Instant::now();
        let sent = self.transport.get(&url, headers).await;
        let elapsed = start.elapsed().as_secs_f64();
        if let Err(e) = self
            .registry
            .observe_summary(&REQUEST_DURATION, &[target.label()], elapsed)
        {
            tracing::warn!(error = %e, "Failed to record request duration");
        }

        let response = sent.map_err(|source| ModemError::Transport {
            target: target.label(),
            source,
        })?;
        let status = response.status;
        if let Err(e) = self
            .registry
            .increment_counter(&SCRAPE_RESULT, &[status.as_str(), target.label()])
        {
            tracing::warn!(error = %e, "Failed to record scrape result");
        }

        let set_cookies = response
            .headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(String::from)
            .collect();

        tracing::debug!(scrape_target = target.label(), %status, elapsed, "Modem responded");
        Ok(Response {
            status,
            body: response.body,
            set_cookies,
        })
    }

    pub async fn login(&self) -> Result<Response, ModemError> {
        self.get(ScrapeTarget::Login, &self.login_path(), None).await
    }

    /// Fetches an authenticated page. Anything but 200 means the device is
    /// not in a state to serve data.
    pub async fn fetch(
        &self,
        target: ScrapeTarget,
        token: &str,
        cookie_header: &str,
    ) -> Result<String, ModemError> {
        let response = self
            .get(target, &self.data_path(target, token), Some(cookie_header))
            .await?;
        if response.status != StatusCode::OK {
            return Err(ModemError::DeviceUnavailable {
                target: target.label(),
                status: response.status.as_u16(),
            });
        }
        Ok(response.body)
    }
}
