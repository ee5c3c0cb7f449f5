//! Per-message orchestration.
//!
//! [`MessageRouter`] receives every timeline event, filters out what must not
//! be processed, runs the legacy `Task:` / `Description:` flow and otherwise
//! dispatches each pattern match to its webhook.
//!
//! # Processing Order
//!
//! 1. Take a [`Settings`] snapshot; the whole event is processed with it
//! 2. Drop the event if automation is disabled
//! 3. Drop events older than the catch-up window before startup
//! 4. Drop non-message events and events without a non-empty text body
//! 5. Drop the automation's own replies (bot reply prefix)
//! 6. Legacy flow: a complete task and a configured legacy URL end here
//! 7. General flow: every match is dispatched, in registration order
//!
//! Failures never propagate out of [`route`](MessageRouter::route): they are
//! logged and, depending on settings, reported to the room with a generic
//! message.
//!
//! # Tower Integration
//!
//! `MessageRouter` implements `tower::Service<InboundEvent>`:
//!
//! ```rust,ignore
//! use tower::ServiceExt;
//!
//! let outcome = router.clone().oneshot(event).await?;
//! ```

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use hookwire_core::{
    BoxedChatSender, BoxedTransport, InboundEvent, Settings, SharedSettings, WebhookPayload,
};
use serde_json::{Map, Value};
use tower::Service;
use tracing::{Instrument, Level, debug, info, span, warn};

use crate::legacy::parse_task_and_description;
use crate::matcher::RuleMatch;
use crate::registry::RuleRegistry;

/// How far before startup an event may be and still be processed.
pub const DEFAULT_CATCH_UP_WINDOW: Duration = Duration::from_secs(60);

const LEGACY_SUCCESS_REPLY: &str = "Task Created in Trello";
const LEGACY_FAILURE_REPLY: &str = "Failed to create Trello task";
const DISPATCH_SUCCESS_REPLY: &str = "Automation triggered successfully";
const DISPATCH_FAILURE_REPLY: &str = "Automation failed";

/// Why an event was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Automation is globally disabled.
    Disabled,
    /// The event predates the catch-up window.
    Stale,
    /// The event is not a chat message.
    NotMessage,
    /// The body is missing, empty or not a string.
    NotText,
    /// The body carries the automation reply prefix.
    BotReply,
}

/// Counters for the general flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Pattern matches found in the body.
    pub matched: usize,
    /// Matches for which a webhook was found and triggered.
    pub dispatched: usize,
    /// Dispatches the endpoint acknowledged.
    pub succeeded: usize,
}

/// Result of routing one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The event was dropped before any matching.
    Ignored(IgnoreReason),
    /// The legacy flow handled the event.
    Legacy {
        /// Whether the legacy webhook accepted the task.
        success: bool,
    },
    /// The general flow ran.
    Dispatched(DispatchSummary),
}

impl RouteOutcome {
    /// Returns true if at least one webhook was called.
    pub fn triggered(&self) -> bool {
        match self {
            Self::Ignored(_) => false,
            Self::Legacy { .. } => true,
            Self::Dispatched(summary) => summary.dispatched > 0,
        }
    }
}

struct RouterInner {
    registry: Arc<RuleRegistry>,
    settings: SharedSettings,
    transport: BoxedTransport,
    chat: BoxedChatSender,
    legacy_url: Option<String>,
    started_at_ms: i64,
    catch_up_window: Duration,
}

/// Routes inbound chat events to webhooks.
///
/// Cloning is cheap; clones share the registry and collaborators.
#[derive(Clone)]
pub struct MessageRouter {
    inner: Arc<RouterInner>,
}

impl MessageRouter {
    /// Starts building a router.
    pub fn builder(
        registry: Arc<RuleRegistry>,
        settings: SharedSettings,
        transport: BoxedTransport,
        chat: BoxedChatSender,
    ) -> RouterBuilder {
        RouterBuilder {
            registry,
            settings,
            transport,
            chat,
            legacy_url: None,
            started_at_ms: None,
            catch_up_window: DEFAULT_CATCH_UP_WINDOW,
        }
    }

    /// Returns the shared registry.
    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.inner.registry
    }

    /// Returns the shared settings handle.
    pub fn settings(&self) -> &SharedSettings {
        &self.inner.settings
    }

    /// Returns the legacy webhook URL, if configured.
    pub fn legacy_url(&self) -> Option<&str> {
        self.inner.legacy_url.as_deref()
    }

    /// Processes one event.
    pub async fn route(&self, event: InboundEvent) -> RouteOutcome {
        let span = span!(
            Level::DEBUG,
            "route",
            event_id = %event.event_id,
            room_id = %event.room_id
        );
        self.route_inner(event).instrument(span).await
    }

    async fn route_inner(&self, event: InboundEvent) -> RouteOutcome {
        let settings = self.inner.settings.snapshot();

        if let Some(reason) = self.ignore_reason(&event, &settings) {
            debug!(?reason, "Ignoring event");
            return RouteOutcome::Ignored(reason);
        }
        // ignore_reason already rejected events without a text body.
        let Some(body) = event.text_body() else {
            return RouteOutcome::Ignored(IgnoreReason::NotText);
        };

        if let Some(url) = self.inner.legacy_url.as_deref() {
            let task = parse_task_and_description(body);
            if let Some((name, description)) = task.complete() {
                let success = self
                    .run_legacy(&event, &settings, url, name, description)
                    .await;
                return RouteOutcome::Legacy { success };
            }
        }

        let matches = self.inner.registry.matcher().parse(body, None);
        let mut summary = DispatchSummary {
            matched: matches.len(),
            ..Default::default()
        };

        for m in &matches {
            match self.dispatch(&event, body, &settings, m).await {
                Some(true) => {
                    summary.dispatched += 1;
                    summary.succeeded += 1;
                }
                Some(false) => summary.dispatched += 1,
                None => {}
            }
        }

        if summary.matched > 0 {
            debug!(
                matched = summary.matched,
                dispatched = summary.dispatched,
                succeeded = summary.succeeded,
                "Finished dispatch"
            );
        }
        RouteOutcome::Dispatched(summary)
    }

    fn ignore_reason(&self, event: &InboundEvent, settings: &Settings) -> Option<IgnoreReason> {
        if !settings.global_enabled {
            return Some(IgnoreReason::Disabled);
        }
        let window = i64::try_from(self.inner.catch_up_window.as_millis()).unwrap_or(i64::MAX);
        if event.timestamp_ms < self.inner.started_at_ms.saturating_sub(window) {
            return Some(IgnoreReason::Stale);
        }
        if !event.is_message() {
            return Some(IgnoreReason::NotMessage);
        }
        match event.text_body() {
            None => Some(IgnoreReason::NotText),
            Some(body) if settings.is_bot_reply(body) => Some(IgnoreReason::BotReply),
            Some(_) => None,
        }
    }

    async fn run_legacy(
        &self,
        event: &InboundEvent,
        settings: &Settings,
        url: &str,
        name: &str,
        description: &str,
    ) -> bool {
        info!(task = name, "Creating task through legacy webhook");
        match self
            .inner
            .transport
            .trigger_legacy(url, name, description)
            .await
        {
            Ok(()) => {
                if settings.default_bot_reply {
                    self.reply(&event.room_id, &settings.reply(LEGACY_SUCCESS_REPLY))
                        .await;
                }
                true
            }
            Err(e) => {
                warn!(error = %e, "Legacy webhook failed");
                if settings.error_notifications {
                    self.reply(&event.room_id, &settings.reply(LEGACY_FAILURE_REPLY))
                        .await;
                }
                false
            }
        }
    }

    /// Dispatches one match. `None` means no webhook was selected.
    async fn dispatch(
        &self,
        event: &InboundEvent,
        body: &str,
        settings: &Settings,
        m: &RuleMatch,
    ) -> Option<bool> {
        let Some(webhook) = self
            .inner
            .registry
            .find_webhook_for_rule(m.service(), &event.room_id)
        else {
            debug!(rule = %m.rule.id, service = %m.service(), "No webhook for matched rule");
            return None;
        };

        let payload = WebhookPayload::new(
            m.service(),
            &event.room_id,
            &event.sender,
            &event.event_id,
            body,
        )
        .with_fields(&m.fields)
        .with_names(event.room_name.clone(), event.sender_display_name.clone())
        .with_metadata(dispatch_metadata(m, &webhook.id));

        let result = self.inner.transport.trigger(&webhook.url, &payload).await;

        if result.success {
            let count = self.inner.registry.record_trigger(&webhook.id);
            info!(
                webhook = %webhook.id,
                rule = %m.rule.id,
                trigger_count = count.unwrap_or_default(),
                "Webhook triggered"
            );
            if settings.default_bot_reply {
                let text = result
                    .message
                    .as_deref()
                    .unwrap_or(DISPATCH_SUCCESS_REPLY);
                self.reply(&event.room_id, &settings.reply(text)).await;
            }
            Some(true)
        } else {
            warn!(
                webhook = %webhook.id,
                rule = %m.rule.id,
                error = result.error.as_deref().unwrap_or("unknown error"),
                "Webhook dispatch failed"
            );
            if settings.error_notifications {
                self.reply(&event.room_id, &settings.reply(DISPATCH_FAILURE_REPLY))
                    .await;
            }
            Some(false)
        }
    }

    async fn reply(&self, room_id: &str, text: &str) {
        if let Err(e) = self.inner.chat.send_message(room_id, text).await {
            warn!(room_id, error = %e, "Failed to send automation reply");
        }
    }
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("registry", &self.inner.registry)
            .field("legacy_url", &self.inner.legacy_url.is_some())
            .field("started_at_ms", &self.inner.started_at_ms)
            .field("catch_up_window", &self.inner.catch_up_window)
            .finish()
    }
}

impl Service<InboundEvent> for MessageRouter {
    type Response = RouteOutcome;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: InboundEvent) -> Self::Future {
        let router = self.clone();
        async move { Ok(router.route(event).await) }.boxed()
    }
}

/// Builder for [`MessageRouter`].
pub struct RouterBuilder {
    registry: Arc<RuleRegistry>,
    settings: SharedSettings,
    transport: BoxedTransport,
    chat: BoxedChatSender,
    legacy_url: Option<String>,
    started_at_ms: Option<i64>,
    catch_up_window: Duration,
}

impl RouterBuilder {
    /// Enables the legacy flow with the given webhook URL.
    pub fn legacy_url(mut self, url: impl Into<String>) -> Self {
        self.legacy_url = Some(url.into());
        self
    }

    /// Sets the legacy webhook URL from an optional value.
    pub fn maybe_legacy_url(mut self, url: Option<String>) -> Self {
        self.legacy_url = url;
        self
    }

    /// Overrides the catch-up window.
    pub fn catch_up_window(mut self, window: Duration) -> Self {
        self.catch_up_window = window;
        self
    }

    /// Overrides the startup time (milliseconds since the Unix epoch).
    pub fn started_at(mut self, millis: i64) -> Self {
        self.started_at_ms = Some(millis);
        self
    }

    /// Builds the router. The startup time defaults to now.
    pub fn build(self) -> MessageRouter {
        MessageRouter {
            inner: Arc::new(RouterInner {
                registry: self.registry,
                settings: self.settings,
                transport: self.transport,
                chat: self.chat,
                legacy_url: self.legacy_url,
                started_at_ms: self.started_at_ms.unwrap_or_else(hookwire_core::now_millis),
                catch_up_window: self.catch_up_window,
            }),
        }
    }
}

fn dispatch_metadata(m: &RuleMatch, webhook_id: &str) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("ruleId".into(), Value::String(m.rule.id.clone()));
    metadata.insert("ruleName".into(), Value::String(m.rule.name.clone()));
    metadata.insert("webhookId".into(), Value::String(webhook_id.to_string()));
    metadata
}
