//! HttpTransport - one plain HTTP GET per call.
//!
//! Connections are never pooled: every call dials the host, sends
//! `Connection: close` and drops the connection when the response (or the
//! error) has been read.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url, header};
use tracing::debug;

use crate::codec::EncodedPayload;
use crate::config::TrackerConfig;
use crate::domain::TransportError;
use crate::ports::Transport;

/// Body the API answers with when the event was recorded.
const RECORDED_MARKER: &[u8] = b"1";

pub struct HttpTransport {
    host: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(host: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .map_err(TransportError::Http)?;
        Ok(Self {
            host: host.into(),
            timeout,
            client,
        })
    }

    pub fn from_config(config: &TrackerConfig) -> Result<Self, TransportError> {
        Self::new(config.api_host.clone(), config.api_timeout)
    }

    /// `http://{host}/{endpoint}?{payload}`; the host may carry a port.
    fn request_url(&self, payload: &EncodedPayload, endpoint: &str) -> Result<Url, TransportError> {
        let host = self.host.trim();
        let invalid = host.is_empty()
            || host.contains(|c: char| c.is_whitespace() || matches!(c, '/' | '@' | '?' | '#'));
        if invalid {
            return Err(TransportError::InvalidHost(self.host.clone()));
        }

        let raw = format!(
            "http://{host}/{path}?{payload}",
            path = endpoint.trim_start_matches('/'),
        );
        Url::parse(&raw).map_err(|_| TransportError::InvalidHost(self.host.clone()))
    }

    fn classify(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else if err.is_connect() {
            TransportError::Connect {
                host: self.host.clone(),
                source: err,
            }
        } else {
            TransportError::Http(err)
        }
    }
}

/// Reason phrase as sent. hyper only keeps the phrase when it differs from
/// the canonical one for the status code.
fn reason_phrase(response: &reqwest::Response) -> String {
    match response.extensions().get::<hyper::ext::ReasonPhrase>() {
        Some(phrase) => String::from_utf8_lossy(phrase.as_bytes()).into_owned(),
        None => response
            .status()
            .canonical_reason()
            .unwrap_or_default()
            .to_string(),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        payload: &EncodedPayload,
        endpoint: &str,
    ) -> Result<bool, TransportError> {
        let url = self.request_url(payload, endpoint)?;
        debug!(host = %self.host, endpoint, "sending tracking request");

        let response = self
            .client
            .get(url)
            .header(header::CONNECTION, "close")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let reason = reason_phrase(&response);
        debug!(host = %self.host, status = status.as_u16(), %reason, "tracking response received");

        if status != StatusCode::OK || reason != "OK" {
            return Err(TransportError::Status {
                status: status.as_u16(),
                reason,
            });
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        Ok(body.as_ref() == RECORDED_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, StubServer, ok_response, unreachable_addr};
    use rstest::rstest;

    fn payload() -> EncodedPayload {
        crate::codec::PayloadCodec::from_config(&TrackerConfig::default())
            .build_event_params("event_foo", &crate::domain::Properties::new(), 1)
            .unwrap()
    }

    fn transport(host: impl Into<String>) -> HttpTransport {
        HttpTransport::new(host, Duration::from_secs(5)).unwrap()
    }

    #[rstest]
    #[case("api.mixpanel.com", "http://api.mixpanel.com/track/")]
    #[case("127.0.0.1:60000", "http://127.0.0.1:60000/track/")]
    #[case("[::1]:8080", "http://[::1]:8080/track/")]
    fn url_is_built_from_host_and_endpoint(#[case] host: &str, #[case] expected: &str) {
        let url = transport(host).request_url(&payload(), "/track/").unwrap();
        assert!(url.as_str().starts_with(expected));
        assert_eq!(url.query(), Some(payload().as_str()));
    }

    #[rstest]
    #[case("")]
    #[case("http://api.mixpanel.com")]
    #[case("host:notaport")]
    #[case(":80")]
    #[case("user@host")]
    fn bad_hosts_are_rejected(#[case] host: &str) {
        assert!(matches!(
            transport(host).request_url(&payload(), "/track/"),
            Err(TransportError::InvalidHost(_))
        ));
    }

    #[tokio::test]
    async fn recorded_event_returns_true() {
        let server = StubServer::start(vec![Reply::Raw(ok_response("1"))]).await;

        let recorded = transport(server.host())
            .send(&payload(), "/track/")
            .await
            .unwrap();
        assert!(recorded);

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("GET /track/?data="));
        assert!(requests[0].contains("&test=1 HTTP/1.1\r\n"));
        let head = requests[0].to_ascii_lowercase();
        assert!(head.contains("connection: close\r\n"));
        assert!(head.contains(&format!("host: {}\r\n", server.host())));
    }

    #[rstest]
    #[case::zero("0")]
    #[case::trailing_newline("1\n")]
    #[case::padded(" 1 ")]
    #[case::empty("")]
    #[tokio::test]
    async fn only_exact_marker_counts_as_recorded(#[case] body: &str) {
        let server = StubServer::start(vec![Reply::Raw(ok_response(body))]).await;

        assert!(!transport(server.host()).send(&payload(), "/track/").await.unwrap());
    }

    #[tokio::test]
    async fn chunked_and_unframed_bodies_are_read() {
        let chunked =
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n1\r\n1\r\n0\r\n\r\n".to_string();
        let unframed = "HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n1".to_string();
        let server = StubServer::start(vec![Reply::Raw(chunked), Reply::Raw(unframed)]).await;
        let t = transport(server.host());

        assert!(t.send(&payload(), "/track/").await.unwrap());
        assert!(t.send(&payload(), "/track/").await.unwrap());
    }

    #[rstest]
    #[case::not_found("HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n", 404)]
    #[case::server_error("HTTP/1.1 503 Service Unavailable\r\nContent-Length: 1\r\n\r\n0", 503)]
    #[case::odd_reason("HTTP/1.1 200 Fine\r\nContent-Length: 1\r\n\r\n1", 200)]
    #[tokio::test]
    async fn non_ok_responses_are_errors(#[case] raw: &str, #[case] expected: u16) {
        let server = StubServer::start(vec![Reply::Raw(raw.to_string())]).await;

        let err = transport(server.host())
            .send(&payload(), "/track/")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Status { status, .. } if status == expected));
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let err = transport(unreachable_addr().await)
            .send(&payload(), "/track/")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let server = StubServer::start(vec![Reply::Hang]).await;
        let t = HttpTransport::new(server.host(), Duration::from_millis(100)).unwrap();

        let err = t.send(&payload(), "/track/").await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(d) if d == Duration::from_millis(100)));
    }

    #[rstest]
    #[case::truncated("HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n1")]
    #[case::huge_length("HTTP/1.1 200 OK\r\nContent-Length: 18446744073709551615\r\n\r\n1")]
    #[case::huge_chunk("HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nffffffffffffffff\r\nab\r\n0\r\n\r\n")]
    #[case::garbage("not http at all\r\n\r\n")]
    #[tokio::test]
    async fn malformed_responses_are_errors(#[case] raw: &str) {
        let server = StubServer::start(vec![Reply::Raw(raw.to_string())]).await;

        let err = transport(server.host())
            .send(&payload(), "/track/")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Http(_)), "got {err:?}");
    }

    #[rstest]
    #[case::server_error("HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n")]
    #[case::truncated("HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n1")]
    #[case::recorded("HTTP/1.1 200 OK\r\nContent-Length: 1\r\n\r\n1")]
    #[tokio::test]
    async fn connection_is_closed_after_every_response(#[case] raw: &str) {
        let server = StubServer::start(vec![Reply::Raw(raw.to_string())]).await;

        let _ = transport(server.host()).send(&payload(), "/track/").await;

        tokio::time::timeout(Duration::from_secs(2), server.wait_for_closed(1))
            .await
            .expect("client should close the connection");
    }
}
