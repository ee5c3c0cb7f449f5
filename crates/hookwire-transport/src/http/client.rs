//! `reqwest`-backed webhook transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use hookwire_core::{
    Settings, SharedSettings, TransportError, TransportResult, WebhookPayload, WebhookResult,
    WebhookTransport,
};

use crate::sanitize::sanitize_url;

/// `User-Agent` sent with every webhook request.
pub const USER_AGENT: &str = concat!("hookwire-webhook/", env!("CARGO_PKG_VERSION"));

/// Logs at info when webhook call logging is on, debug otherwise.
macro_rules! call_log {
    ($settings:expr, $($arg:tt)+) => {
        if $settings.log_webhook_calls {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

/// HTTP webhook transport.
///
/// Timeout and retry behavior are read from a settings snapshot at the start
/// of each call, so changes apply to the next dispatch.
#[derive(Clone)]
pub struct WebhookClient {
    client: Client,
    settings: SharedSettings,
}

impl WebhookClient {
    /// Creates a client with its own connection pool.
    pub fn new(settings: SharedSettings) -> TransportResult<Self> {
        let client = ClientBuilder::new()
            .user_agent(USER_AGENT)
            .build()
            .map_err(request_error)?;
        Ok(Self { client, settings })
    }

    /// Wraps an existing `reqwest` client.
    pub fn with_client(client: Client, settings: SharedSettings) -> Self {
        Self { client, settings }
    }

    /// Runs one POST attempt, bounded by `timeout` including the body read.
    async fn post_once(
        &self,
        url: &str,
        payload: &WebhookPayload,
        timeout: Duration,
    ) -> TransportResult<Value> {
        let attempt = async {
            let response = self
                .client
                .post(url)
                .json(payload)
                .send()
                .await
                .map_err(request_error)?;
            check_status(&response)?;

            let body = response.bytes().await.map_err(request_error)?;
            // Endpoints often answer with plain "Accepted".
            Ok::<_, TransportError>(
                serde_json::from_slice(&body).unwrap_or_else(|_| Value::Object(Map::new())),
            )
        };

        tokio::time::timeout(timeout, attempt)
            .await
            .map_err(|_| timeout_error(timeout))?
    }

    async fn get_once(&self, url: &str, timeout: Duration) -> TransportResult<()> {
        let attempt = async {
            let response = self.client.get(url).send().await.map_err(request_error)?;
            check_status(&response)?;
            response.bytes().await.map_err(request_error)?;
            Ok::<_, TransportError>(())
        };

        tokio::time::timeout(timeout, attempt)
            .await
            .map_err(|_| timeout_error(timeout))?
    }

    async fn trigger_with(
        &self,
        settings: &Settings,
        url: &str,
        payload: &WebhookPayload,
    ) -> WebhookResult {
        let target = sanitize_url(url);
        if let Err(e) = Url::parse(url) {
            let error = TransportError::InvalidUrl {
                reason: e.to_string(),
            };
            warn!(url = %target, error = %error, "Refusing to call webhook");
            return WebhookResult::failed(error.to_string());
        }

        let attempts = settings.attempts();
        let timeout = settings.webhook_timeout();
        let mut last_error = None;

        for attempt in 1..=attempts {
            call_log!(
                settings,
                url = %target,
                service = %payload.service,
                attempt,
                attempts,
                "Calling webhook"
            );

            match self.post_once(url, payload, timeout).await {
                Ok(data) => {
                    call_log!(settings, url = %target, attempt, "Webhook call succeeded");
                    let message = data
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    return WebhookResult::ok(message, data);
                }
                Err(e) => {
                    warn!(url = %target, attempt, attempts, error = %e, "Webhook attempt failed");
                    last_error = Some(e);
                }
            }

            if attempt < attempts {
                tokio::time::sleep(settings.backoff(attempt)).await;
            }
        }

        let last = last_error.map(|e| e.to_string()).unwrap_or_default();
        WebhookResult::failed(format!("Webhook failed after {attempts} attempts: {last}"))
    }
}

#[async_trait]
impl WebhookTransport for WebhookClient {
    async fn trigger(&self, url: &str, payload: &WebhookPayload) -> WebhookResult {
        let settings = self.settings.snapshot();
        self.trigger_with(&settings, url, payload).await
    }

    async fn trigger_legacy(
        &self,
        url: &str,
        task_name: &str,
        task_description: &str,
    ) -> TransportResult<()> {
        let settings = self.settings.snapshot();
        let mut target = Url::parse(url).map_err(|e| TransportError::InvalidUrl {
            reason: e.to_string(),
        })?;
        target
            .query_pairs_mut()
            .append_pair("taskName", task_name)
            .append_pair("taskDescription", task_description);

        call_log!(settings, url = %sanitize_url(url), "Calling legacy task webhook");
        self.get_once(target.as_str(), settings.webhook_timeout())
            .await
    }
}

impl std::fmt::Debug for WebhookClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookClient").finish_non_exhaustive()
    }
}

fn check_status(response: &reqwest::Response) -> TransportResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    Err(TransportError::Status {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or_default().to_string(),
    })
}

fn request_error(e: reqwest::Error) -> TransportError {
    // reqwest errors may echo the full URL.
    TransportError::Request(e.without_url().to_string())
}

fn timeout_error(timeout: Duration) -> TransportError {
    TransportError::Timeout {
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode, header};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use hookwire_core::ServiceTag;
    use parking_lot::Mutex;
    use serde_json::json;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn client(settings: Settings) -> WebhookClient {
        WebhookClient::new(SharedSettings::new(settings)).unwrap()
    }

    fn fast_settings() -> Settings {
        Settings {
            webhook_timeout_ms: 2000,
            retry_attempts: 3,
            retry_delay_ms: 50,
            ..Default::default()
        }
    }

    fn payload() -> WebhookPayload {
        let to = "to".to_string();
        let addr = "team@company.com".to_string();
        WebhookPayload::new(
            ServiceTag::Gmail,
            "!r:example.org",
            "@alice:example.org",
            "$evt",
            "@make gmail to:team@company.com subject:Hi",
        )
        .with_fields([(&to, &addr)])
    }

    #[tokio::test]
    async fn test_retries_until_success_with_linear_backoff() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/hook/secret",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    if hits.fetch_add(1, Ordering::SeqCst) < 2 {
                        StatusCode::INTERNAL_SERVER_ERROR.into_response()
                    } else {
                        Json(json!({ "message": "Card created", "id": 7 })).into_response()
                    }
                }),
            )
            .with_state(Arc::clone(&hits));
        let addr = serve(app).await;

        let started = Instant::now();
        let result = client(fast_settings())
            .trigger(&format!("http://{addr}/hook/secret"), &payload())
            .await;

        assert!(result.success, "{result:?}");
        assert_eq!(result.message.as_deref(), Some("Card created"));
        assert_eq!(result.data, Some(json!({ "message": "Card created", "id": 7 })));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        // 50ms after the first failure, 100ms after the second.
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_gives_up_after_all_attempts() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/hook",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    StatusCode::INTERNAL_SERVER_ERROR
                }),
            )
            .with_state(Arc::clone(&hits));
        let addr = serve(app).await;

        let settings = Settings {
            retry_attempts: 2,
            retry_delay_ms: 10,
            ..fast_settings()
        };
        let result = client(settings)
            .trigger(&format!("http://{addr}/hook"), &payload())
            .await;

        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Webhook failed after 2 attempts: HTTP 500: Internal Server Error")
        );
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_calls_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/hook",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    "Accepted"
                }),
            )
            .with_state(Arc::clone(&hits));
        let addr = serve(app).await;

        let settings = Settings {
            retry_attempts: 0,
            ..fast_settings()
        };
        let result = client(settings)
            .trigger(&format!("http://{addr}/hook"), &payload())
            .await;

        assert!(result.success);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_bounds_each_attempt() {
        let app = Router::new().route(
            "/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let addr = serve(app).await;

        let settings = Settings {
            webhook_timeout_ms: 100,
            retry_attempts: 1,
            ..fast_settings()
        };
        let started = Instant::now();
        let result = client(settings)
            .trigger(&format!("http://{addr}/slow"), &payload())
            .await;

        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Webhook failed after 1 attempts: Webhook request timed out after 100ms")
        );
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_sends_payload_and_user_agent() {
        type Seen = Arc<Mutex<Option<(String, Value)>>>;
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route(
                "/hook",
                post(
                    |State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>| async move {
                        let agent = headers
                            .get(header::USER_AGENT)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        *seen.lock() = Some((agent, body));
                        "OK"
                    },
                ),
            )
            .with_state(Arc::clone(&seen));
        let addr = serve(app).await;

        let result = client(fast_settings())
            .trigger(&format!("http://{addr}/hook"), &payload())
            .await;

        // A non-JSON body still counts as success with empty data.
        assert!(result.success);
        assert_eq!(result.message, None);
        assert_eq!(result.data, Some(json!({})));

        let (agent, body) = seen.lock().take().unwrap();
        assert_eq!(agent, USER_AGENT);
        assert_eq!(body["service"], "gmail");
        assert_eq!(body["roomId"], "!r:example.org");
        assert_eq!(body["messageId"], "$evt");
        assert_eq!(body["extractedData"]["to"], "team@company.com");
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_request() {
        let result = client(fast_settings()).trigger("not a url", &payload()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("invalid webhook URL"));
    }

    #[tokio::test]
    async fn test_legacy_trigger_sends_query() {
        type Seen = Arc<Mutex<Vec<HashMap<String, String>>>>;
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route(
                "/legacy",
                get(
                    |State(seen): State<Seen>, Query(q): Query<HashMap<String, String>>| async move {
                        seen.lock().push(q);
                        StatusCode::OK
                    },
                ),
            )
            .with_state(Arc::clone(&seen));
        let addr = serve(app).await;

        client(fast_settings())
            .trigger_legacy(
                &format!("http://{addr}/legacy"),
                "Fix login & logout",
                "Users cannot log in",
            )
            .await
            .unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["taskName"], "Fix login & logout");
        assert_eq!(seen[0]["taskDescription"], "Users cannot log in");
    }

    #[tokio::test]
    async fn test_legacy_trigger_is_single_attempt() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/legacy",
                get(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Response::builder()
                        .status(StatusCode::BAD_GATEWAY)
                        .body(axum::body::Body::empty())
                        .unwrap()
                }),
            )
            .with_state(Arc::clone(&hits));
        let addr = serve(app).await;

        let err = client(fast_settings())
            .trigger_legacy(&format!("http://{addr}/legacy"), "a", "b")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TransportError::Status {
                status: 502,
                reason: "Bad Gateway".into()
            }
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
