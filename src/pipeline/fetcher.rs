use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderName, ACCEPT, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use tracing::debug;

use crate::config::DEFAULT_USER_AGENT;
use crate::errors::{FetchError, FetchErrorKind};
use crate::pipeline::traits::{FeedFetcher, FetchOptions, FetchOutcome, FetchedFeed};

/// MIME types a feed may be served as, most specific first.
pub const FEED_ACCEPT: &str = "application/rss+xml, application/atom+xml, \
application/rdf+xml;q=0.9, application/xml;q=0.8, text/xml;q=0.8, */*;q=0.5";

const MAX_REDIRECTS: usize = 10;

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Self {
        Self {
            client: Client::builder()
                .user_agent(user_agent)
                .redirect(Policy::limited(MAX_REDIRECTS))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn classify(url: &str, err: reqwest::Error) -> FetchError {
        let message = error_chain(&err);
        let status = err.status().map(|s| s.as_u16());

        let kind = if err.is_timeout() {
            FetchErrorKind::Timeout
        } else if let Some(status) = status {
            FetchErrorKind::from_status(status)
        } else if err.is_connect() || err.is_redirect() {
            FetchErrorKind::Network
        } else {
            match FetchErrorKind::from_message(&message) {
                FetchErrorKind::Unknown if err.is_body() || err.is_request() => {
                    FetchErrorKind::Network
                }
                kind => kind,
            }
        };

        FetchError {
            kind,
            url: url.to_string(),
            status,
            message,
            source: Some(err),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_USER_AGENT)
    }
}

impl FeedFetcher for HttpFetcher {
    fn fetch(&self, feed_url: &str, options: &FetchOptions) -> Result<FetchOutcome, FetchError> {
        let mut request = self
            .client
            .get(feed_url)
            .timeout(options.timeout)
            .header(ACCEPT, FEED_ACCEPT);

        if let Some(etag) = options.etag.as_deref() {
            request = request.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = options.last_modified.as_deref() {
            request = request.header(IF_MODIFIED_SINCE, last_modified);
        }
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .map_err(|e| Self::classify(feed_url, e))?;

        let status = response.status();
        let etag = header_value(&response, ETAG);
        let last_modified = header_value(&response, LAST_MODIFIED);

        debug!(url = feed_url, status = status.as_u16(), "fetched feed");

        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified {
                etag: etag.or_else(|| options.etag.clone()),
                last_modified: last_modified.or_else(|| options.last_modified.clone()),
            });
        }

        if !status.is_success() {
            return Err(FetchError::from_status(feed_url, status.as_u16()));
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .map_err(|e| Self::classify(feed_url, e))?;

        Ok(FetchOutcome::Modified(FetchedFeed {
            body,
            final_url,
            status: status.as_u16(),
            etag,
            last_modified,
        }))
    }
}

fn header_value(response: &Response, name: HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;
    use tiny_http::{Header, Request, Response as HttpResponse, Server, StatusCode as HttpStatus};

    const BODY: &str = "<rss><channel><title>T</title></channel></rss>";

    /// Serve `requests` requests on a random local port with `handler`.
    fn spawn_server<F>(requests: usize, handler: F) -> String
    where
        F: Fn(Request) + Send + 'static,
    {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();

        thread::spawn(move || {
            for request in server.incoming_requests().take(requests) {
                handler(request);
            }
        });

        format!("http://127.0.0.1:{}", port)
    }

    fn request_header(request: &Request, name: &'static str) -> Option<String> {
        request
            .headers()
            .iter()
            .find(|h| h.field.equiv(name))
            .map(|h| h.value.as_str().to_string())
    }

    fn header(name: &str, value: &str) -> Header {
        Header::from_bytes(name, value).unwrap()
    }

    #[test]
    fn test_modified_then_not_modified() {
        let base = spawn_server(2, |request| {
            let response = if request_header(&request, "If-None-Match").as_deref() == Some("\"v1\"") {
                HttpResponse::from_string("")
                    .with_status_code(HttpStatus(304))
                    .with_header(header("ETag", "\"v1\""))
            } else {
                HttpResponse::from_string(BODY)
                    .with_header(header("ETag", "\"v1\""))
                    .with_header(header("Last-Modified", "Mon, 01 Jan 2024 00:00:00 GMT"))
            };
            let _ = request.respond(response);
        });
        let url = format!("{}/feed.xml", base);
        let fetcher = HttpFetcher::default();

        let first = fetcher.fetch(&url, &FetchOptions::default()).unwrap();
        let fetched = match first {
            FetchOutcome::Modified(fetched) => fetched,
            other => panic!("expected a modified response, got {:?}", other),
        };
        assert_eq!(fetched.body, BODY);
        assert_eq!(fetched.status, 200);
        assert_eq!(fetched.etag.as_deref(), Some("\"v1\""));
        assert_eq!(fetched.last_modified.as_deref(), Some("Mon, 01 Jan 2024 00:00:00 GMT"));

        let options = FetchOptions::default().with_validators(fetched.etag, fetched.last_modified);
        let second = fetcher.fetch(&url, &options).unwrap();
        assert_eq!(
            second,
            FetchOutcome::NotModified {
                etag: Some("\"v1\"".to_string()),
                last_modified: Some("Mon, 01 Jan 2024 00:00:00 GMT".to_string()),
            }
        );
    }

    #[test]
    fn test_sends_accept_user_agent_and_custom_headers() {
        let base = spawn_server(1, |request| {
            let body = format!(
                "{}|{}|{}",
                request_header(&request, "Accept").unwrap_or_default(),
                request_header(&request, "User-Agent").unwrap_or_default(),
                request_header(&request, "X-Trace").unwrap_or_default(),
            );
            let _ = request.respond(HttpResponse::from_string(body));
        });

        let fetcher = HttpFetcher::new("feedsmith-test/1.0");
        let options = FetchOptions::default().with_header("X-Trace", "abc");
        let outcome = fetcher.fetch(&base, &options).unwrap();

        let FetchOutcome::Modified(fetched) = outcome else {
            panic!("expected a modified response");
        };
        let parts: Vec<&str> = fetched.body.split('|').collect();
        assert!(parts[0].contains("application/rss+xml"));
        assert!(parts[0].contains("application/atom+xml"));
        assert_eq!(parts[1], "feedsmith-test/1.0");
        assert_eq!(parts[2], "abc");
    }

    #[test]
    fn test_status_codes_are_classified() {
        let base = spawn_server(4, |request| {
            let status: u16 = request.url().trim_start_matches('/').parse().unwrap_or(500);
            let _ = request.respond(HttpResponse::from_string("nope").with_status_code(HttpStatus(status)));
        });
        let fetcher = HttpFetcher::default();

        for (status, kind) in [
            (404, FetchErrorKind::NotFound),
            (403, FetchErrorKind::Forbidden),
            (401, FetchErrorKind::Unauthorized),
            (500, FetchErrorKind::Unknown),
        ] {
            let err = fetcher
                .fetch(&format!("{}/{}", base, status), &FetchOptions::default())
                .unwrap_err();
            assert_eq!(err.kind, kind, "status {}", status);
            assert_eq!(err.status, Some(status));
        }
    }

    #[test]
    fn test_redirect_reports_final_url() {
        let base = spawn_server(2, |request| {
            let response = if request.url() == "/old" {
                HttpResponse::from_string("")
                    .with_status_code(HttpStatus(301))
                    .with_header(header("Location", "/new.xml"))
            } else {
                HttpResponse::from_string(BODY)
            };
            let _ = request.respond(response);
        });

        let outcome = HttpFetcher::default()
            .fetch(&format!("{}/old", base), &FetchOptions::default())
            .unwrap();

        let FetchOutcome::Modified(fetched) = outcome else {
            panic!("expected a modified response");
        };
        assert!(fetched.final_url.ends_with("/new.xml"));
        assert_eq!(fetched.body, BODY);
    }

    #[test]
    fn test_timeout_is_reported() {
        let base = spawn_server(1, |request| {
            thread::sleep(Duration::from_millis(1500));
            let _ = request.respond(HttpResponse::from_string(BODY));
        });

        let options = FetchOptions::default().with_timeout(Duration::from_millis(200));
        let err = HttpFetcher::default().fetch(&base, &options).unwrap_err();

        assert_eq!(err.kind, FetchErrorKind::Timeout);
        assert_eq!(err.code(), "TIMEOUT");
    }

    #[test]
    fn test_connection_refused_is_network_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = HttpFetcher::default()
            .fetch(&format!("http://127.0.0.1:{}/feed", port), &FetchOptions::default())
            .unwrap_err();

        assert_eq!(err.kind, FetchErrorKind::Network);
        assert!(err.source.is_some());
    }
}
