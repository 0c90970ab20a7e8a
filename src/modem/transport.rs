//! HTTP transport to the modem's web interface.
//!
//! The modem presents a self-signed certificate for a bare IP address and
//! only negotiates `AES128-GCM-SHA256` over TLS 1.2. Certificate and hostname
//! checks are off for this peer. By default requests go through reqwest on
//! the platform TLS library, whose default cipher list still carries the
//! modem's suite. Setting `MODEM_TLS_CIPHER_SUITE` to an OpenSSL cipher list
//! switches to a dedicated OpenSSL connector that offers only that list.

use crate::config::ModemConfig;
use crate::error::{ModemError, TransportError};
use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderValue};
use http::{Request, StatusCode, Uri};
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode, SslVersion};
use std::pin::Pin;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_openssl::SslStream;

/// A response with its body read to the end.
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

pub enum Transport {
    Default(reqwest::Client),
    Pinned(PinnedTls),
}

impl Transport {
    pub fn new(config: &ModemConfig) -> Result<Self, ModemError> {
        match config.tls_cipher_suite.as_deref() {
            Some(ciphers) if config.base_url.starts_with("https://") => {
                tracing::debug!(cipher_suite = ciphers, "Pinning TLS cipher suite");
                Ok(Transport::Pinned(PinnedTls::new(
                    ciphers,
                    config.request_timeout(),
                )?))
            }
            pinned => {
                if pinned.is_some() {
                    tracing::warn!(
                        base_url = %config.base_url,
                        "Cipher suite ignored for plain HTTP"
                    );
                }
                let client = reqwest::Client::builder()
                    .danger_accept_invalid_certs(true)
                    .danger_accept_invalid_hostnames(true)
                    .timeout(config.request_timeout())
                    .build()
                    .map_err(|e| ModemError::Tls(e.to_string()))?;
                Ok(Transport::Default(client))
            }
        }
    }

    /// Sends a GET and reads the whole body.
    pub async fn get(&self, url: &str, headers: HeaderMap) -> Result<RawResponse, TransportError> {
        match self {
            Transport::Default(client) => {
                let response = client.get(url).headers(headers).send().await?;
                let status = response.status();
                let headers = response.headers().clone();
                let body = response.text().await.map_err(TransportError::Body)?;
                Ok(RawResponse {
                    status,
                    headers,
                    body,
                })
            }
            Transport::Pinned(tls) => tls.get(url, headers).await,
        }
    }
}

/// One-connection-per-request HTTP/1.1 over an OpenSSL connector restricted
/// to a single cipher list.
pub struct PinnedTls {
    connector: SslConnector,
    timeout: Duration,
}

impl PinnedTls {
    /// `ciphers` is an OpenSSL cipher list, e.g. `AES128-GCM-SHA256`.
    pub fn new(ciphers: &str, timeout: Duration) -> Result<Self, ModemError> {
        let tls_error = |e: openssl::error::ErrorStack| {
            ModemError::Tls(format!("cipher suite {ciphers}: {e}"))
        };
        let mut builder = SslConnector::builder(SslMethod::tls_client()).map_err(tls_error)?;
        builder.set_cipher_list(ciphers).map_err(tls_error)?;
        // TLS 1.3 suites are configured separately and would bypass the pin
        builder
            .set_max_proto_version(Some(SslVersion::TLS1_2))
            .map_err(tls_error)?;
        builder.set_verify(SslVerifyMode::NONE);

        Ok(Self {
            connector: builder.build(),
            timeout,
        })
    }

    async fn get(&self, url: &str, headers: HeaderMap) -> Result<RawResponse, TransportError> {
        tokio::time::timeout(self.timeout, self.exchange(url, headers))
            .await
            .map_err(|_| TransportError::Timeout)?
    }

    async fn exchange(&self, url: &str, headers: HeaderMap) -> Result<RawResponse, TransportError> {
        let uri: Uri = url
            .parse()
            .map_err(|_| TransportError::InvalidUrl(url.to_string()))?;
        let (host, authority) = match (uri.host(), uri.authority()) {
            (Some(host), Some(authority)) => (host, authority.as_str()),
            _ => return Err(TransportError::InvalidUrl(url.to_string())),
        };
        let port = uri.port_u16().unwrap_or(443);

        let tcp = TcpStream::connect((host, port))
            .await
            .map_err(TransportError::Connect)?;
        let mut config = self.connector.configure()?;
        config.set_verify_hostname(false);
        config.set_use_server_name_indication(false);
        let mut stream = SslStream::new(config.into_ssl(host)?, tcp)?;
        Pin::new(&mut stream)
            .connect()
            .await
            .map_err(TransportError::Handshake)?;

        let (mut sender, connection) =
            hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "Modem connection closed with error");
            }
        });

        let path = uri.path_and_query().map_or("/", |p| p.as_str());
        let mut request = Request::get(path)
            .header(header::HOST, HeaderValue::from_str(authority)?)
            .body(Empty::<Bytes>::new())?;
        request.headers_mut().extend(headers);

        let response = sender.send_request(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await?.to_bytes();

        Ok(RawResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::config::TestModemConfigBuilder;
    use crate::test_utils::tls::LegacyTlsServer;

    const MODEM_SUITE: &str = "AES128-GCM-SHA256";

    fn transport(url: &str, ciphers: Option<&str>) -> Transport {
        let mut builder = TestModemConfigBuilder::new().with_base_url(url);
        if let Some(ciphers) = ciphers {
            builder = builder.with_tls_cipher_suite(ciphers);
        }
        Transport::new(&builder.build()).unwrap()
    }

    mod succeeds {
        use super::*;

        #[tokio::test]
        async fn test_default_transport_reaches_legacy_only_server() {
            let server = LegacyTlsServer::start(MODEM_SUITE, "abc123").await;

            let url = format!("{}/cmconnectionstatus.html?login_x", server.url());
            let response = transport(&server.url(), None)
                .get(&url, HeaderMap::new())
                .await
                .unwrap();

            assert_eq!(response.status, StatusCode::OK);
            assert_eq!(response.body, "abc123");
        }

        #[tokio::test]
        async fn test_pinned_transport_reaches_legacy_only_server() {
            let server = LegacyTlsServer::start(MODEM_SUITE, "abc123").await;
            let transport = transport(&server.url(), Some(MODEM_SUITE));
            assert!(matches!(transport, Transport::Pinned(_)));

            let mut headers = HeaderMap::new();
            headers.insert(header::COOKIE, HeaderValue::from_static("sessionId=42"));
            let response = transport
                .get(&format!("{}/cmswinfo.html?ct_abc123", server.url()), headers)
                .await
                .unwrap();

            assert_eq!(response.status, StatusCode::OK);
            assert_eq!(response.body, "abc123");
            assert_eq!(
                server.last_request_line().as_deref(),
                Some("GET /cmswinfo.html?ct_abc123 HTTP/1.1")
            );
        }

        #[test]
        fn test_pin_is_ignored_for_plain_http() {
            let transport = transport("http://127.0.0.1:9", Some(MODEM_SUITE));
            assert!(matches!(transport, Transport::Default(_)));
        }
    }

    mod fails {
        use super::*;
        use crate::error::FailureKind;

        #[tokio::test]
        async fn test_pin_the_server_does_not_offer() {
            let server = LegacyTlsServer::start(MODEM_SUITE, "abc123").await;

            let err = transport(&server.url(), Some("ECDHE-RSA-AES128-GCM-SHA256"))
                .get(&format!("{}/cmswinfo.html", server.url()), HeaderMap::new())
                .await
                .unwrap_err();

            assert!(matches!(err, TransportError::Handshake(_)));
            let err = ModemError::Transport {
                target: "login",
                source: err,
            };
            assert_eq!(err.kind(), FailureKind::DeviceUnavailable);
        }

        #[test]
        fn test_unknown_cipher_name_is_rejected() {
            let config = TestModemConfigBuilder::new()
                .with_base_url("https://192.168.100.1")
                .with_tls_cipher_suite("NOT-A-CIPHER")
                .build();

            let err = Transport::new(&config).err().unwrap();
            assert!(matches!(err, ModemError::Tls(ref m) if m.contains("NOT-A-CIPHER")));
        }
    }
}
