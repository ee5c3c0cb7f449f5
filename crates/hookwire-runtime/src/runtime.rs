//! Runtime orchestration.
//!
//! [`HookwireRuntime`] turns a [`HookwireConfig`] into a running relay: it
//! installs logging, fills the [`RuleRegistry`] from the built-in and
//! configured rules, builds the [`MessageRouter`] and pumps inbound events
//! through it until shutdown.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use hookwire_runtime::HookwireRuntime;
//!
//! let runtime = HookwireRuntime::builder()
//!     .config_file("hookwire.toml")
//!     .build()?;
//!
//! let (events_tx, events_rx) = runtime.event_channel();
//! // Hand events_tx to the chat sync client...
//! runtime.run(chat_sender, events_rx).await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use hookwire_core::{BoxedChatSender, BoxedTransport, InboundEvent, SharedSettings};
use hookwire_framework::{MessageRouter, RuleRegistry};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{ConfigLoader, HookwireConfig, LEGACY_URL_ENV, validate_config};
use crate::error::RuntimeResult;
use crate::logging;
use crate::pump::{EventPump, PumpStats};

/// The assembled relay.
pub struct HookwireRuntime {
    config: HookwireConfig,
    settings: SharedSettings,
    registry: Arc<RuleRegistry>,
    transport: Option<BoxedTransport>,
    shutdown: CancellationToken,
}

impl HookwireRuntime {
    /// Creates a runtime builder that loads configuration from the default
    /// locations.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Installs logging (unless a subscriber already exists), validates the
    /// configuration, and registers the configured parsers after the
    /// built-in ones, followed by the configured webhooks.
    pub fn from_config(config: &HookwireConfig) -> RuntimeResult<Self> {
        logging::init_from_config(&config.logging);
        validate_config(config)?;

        let registry = RuleRegistry::with_defaults();
        for parser in &config.parsers {
            registry.add_pattern_rule(parser.clone())?;
        }
        for webhook in &config.webhooks {
            registry.add_webhook(webhook.clone())?;
        }

        if config.legacy.webhook_url.is_none() {
            warn!("{LEGACY_URL_ENV} is not set, legacy task creation is disabled");
        }

        info!(
            enabled = config.automation.global_enabled,
            parsers = registry.pattern_rules().len(),
            webhooks = registry.webhook_count(),
            log_level = %config.logging.level,
            "Runtime initialized from configuration"
        );

        Ok(Self {
            config: config.clone(),
            settings: SharedSettings::new(config.automation.clone()),
            registry: Arc::new(registry),
            transport: None,
            shutdown: CancellationToken::new(),
        })
    }

    /// Replaces the built-in HTTP client.
    pub fn with_transport(mut self, transport: BoxedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Returns the configuration the runtime was built from.
    pub fn config(&self) -> &HookwireConfig {
        &self.config
    }

    /// Returns the live settings handle.
    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    /// Returns the shared rule registry.
    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    /// Creates the inbound event channel, sized from `router.queue_capacity`.
    pub fn event_channel(&self) -> (mpsc::Sender<InboundEvent>, mpsc::Receiver<InboundEvent>) {
        mpsc::channel(self.config.router.queue_capacity.max(1))
    }

    /// Builds a router that replies through `chat`.
    pub fn router(&self, chat: BoxedChatSender) -> RuntimeResult<MessageRouter> {
        let router = MessageRouter::builder(
            Arc::clone(&self.registry),
            self.settings.clone(),
            self.transport()?,
            chat,
        )
        .maybe_legacy_url(self.config.legacy.webhook_url.clone())
        .catch_up_window(self.config.router.catch_up_window())
        .build();
        Ok(router)
    }

    fn transport(&self) -> RuntimeResult<BoxedTransport> {
        if let Some(transport) = &self.transport {
            return Ok(Arc::clone(transport));
        }

        #[cfg(feature = "http-client")]
        {
            let client = hookwire_transport::WebhookClient::new(self.settings.clone())?;
            Ok(Arc::new(client))
        }

        #[cfg(not(feature = "http-client"))]
        {
            Err(crate::error::RuntimeError::NoTransport)
        }
    }

    /// Requests shutdown of a running pump.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Routes events until Ctrl+C, SIGTERM, [`shutdown`](Self::shutdown) or
    /// the event channel closing.
    pub async fn run(
        &self,
        chat: BoxedChatSender,
        events: mpsc::Receiver<InboundEvent>,
    ) -> RuntimeResult<PumpStats> {
        info!("Hookwire is now running. Press Ctrl+C to stop.");
        self.run_until(chat, events, wait_for_shutdown()).await
    }

    /// Routes events until `shutdown` resolves,
    /// [`shutdown`](Self::shutdown) is called or the event channel closes.
    pub async fn run_until<F>(
        &self,
        chat: BoxedChatSender,
        events: mpsc::Receiver<InboundEvent>,
        shutdown: F,
    ) -> RuntimeResult<PumpStats>
    where
        F: Future<Output = ()>,
    {
        let router = self.router(chat)?;
        let cancel = self.shutdown.child_token();
        let pump = EventPump::new(
            router,
            self.config.router.room_queue_capacity,
            cancel.clone(),
        )
        .idle_timeout(self.config.router.room_idle_timeout());

        let run = pump.run(events);
        tokio::pin!(run);
        tokio::pin!(shutdown);

        let stats = tokio::select! {
            stats = &mut run => stats,
            () = &mut shutdown => {
                cancel.cancel();
                run.await
            }
        };
        Ok(stats)
    }
}

impl std::fmt::Debug for HookwireRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookwireRuntime")
            .field("registry", &self.registry)
            .field("custom_transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}

/// Waits for Ctrl+C or, on Unix, SIGTERM.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`HookwireRuntime`] with custom configuration sources.
///
/// ```rust,ignore
/// let runtime = HookwireRuntime::builder()
///     .config_file("config/hookwire.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    transport: Option<BoxedTransport>,
}

impl RuntimeBuilder {
    /// Creates a builder over the default configuration sources.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            transport: None,
        }
    }

    /// Loads exactly this configuration file.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Uses `config` in place of the built-in defaults.
    pub fn defaults(mut self, config: HookwireConfig) -> Self {
        self.config_loader = self.config_loader.defaults(config);
        self
    }

    /// Sets a single configuration value on top of every other source.
    pub fn set<T: serde::Serialize>(mut self, key: &str, value: T) -> Self {
        self.config_loader = self.config_loader.set(key, value);
        self
    }

    /// Uses `transport` instead of the built-in HTTP client.
    pub fn transport(mut self, transport: BoxedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Loads the configuration and builds the runtime.
    pub fn build(self) -> RuntimeResult<HookwireRuntime> {
        let config = self.config_loader.load()?;
        let runtime = HookwireRuntime::from_config(&config)?;
        Ok(match self.transport {
            Some(transport) => runtime.with_transport(transport),
            None => runtime,
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use hookwire_core::{
        ChatResult, ChatSender, PatternRule, ServiceTag, TransportResult, WebhookPayload,
        WebhookResult, WebhookRule, WebhookTransport,
    };
    use hookwire_framework::{IgnoreReason, RegistryError, RouteOutcome};
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::sync::Notify;

    use crate::config::ConfigError;
    use crate::error::RuntimeError;

    /// Records calls; "@make block" waits until a "@make release" arrives.
    #[derive(Default)]
    struct FakeTransport {
        calls: Mutex<Vec<(String, String)>>,
        gate: Notify,
    }

    #[async_trait]
    impl WebhookTransport for FakeTransport {
        async fn trigger(&self, _url: &str, payload: &WebhookPayload) -> WebhookResult {
            let action = payload
                .extracted_data
                .get("service")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            match action {
                "block" => self.gate.notified().await,
                "release" => self.gate.notify_one(),
                _ => {}
            }
            self.calls
                .lock()
                .push((payload.room_id.clone(), payload.original_message.clone()));
            WebhookResult::ok(None, json!({}))
        }

        async fn trigger_legacy(&self, _url: &str, _name: &str, _desc: &str) -> TransportResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct NullChat;

    #[async_trait]
    impl ChatSender for NullChat {
        async fn send_message(&self, _room_id: &str, _body: &str) -> ChatResult<()> {
            Ok(())
        }
    }

    fn base_config() -> HookwireConfig {
        let mut config = HookwireConfig::default();
        config.webhooks.push(WebhookRule::new(
            "custom",
            "Custom",
            "https://hook.example.com/custom",
            ServiceTag::Custom,
            "@admin:example.org",
        ));
        config
    }

    fn runtime(transport: Arc<FakeTransport>) -> HookwireRuntime {
        HookwireRuntime::from_config(&base_config())
            .unwrap()
            .with_transport(transport)
    }

    fn event(room: &str, body: &str) -> InboundEvent {
        InboundEvent::message("$e", room, "@alice:example.org", body, hookwire_core::now_millis())
    }

    #[tokio::test]
    async fn test_pump_keeps_room_order_and_drains_on_close() {
        let transport = Arc::new(FakeTransport::default());
        let runtime = runtime(transport.clone());
        let (tx, rx) = runtime.event_channel();

        for i in 0..5 {
            tx.send(event("!a:x", &format!("@make step {i}"))).await.unwrap();
            if i < 3 {
                tx.send(event("!b:x", &format!("@make step {i}"))).await.unwrap();
            }
        }
        drop(tx);

        let stats = runtime
            .run_until(Arc::new(NullChat), rx, std::future::pending())
            .await
            .unwrap();
        assert_eq!(stats.received, 8);
        assert_eq!(stats.routed, 8);
        assert_eq!(stats.rooms, 2);

        let calls = transport.calls.lock();
        let room_a: Vec<_> = calls
            .iter()
            .filter(|(room, _)| room == "!a:x")
            .map(|(_, body)| body.as_str())
            .collect();
        assert_eq!(
            room_a,
            ["@make step 0", "@make step 1", "@make step 2", "@make step 3", "@make step 4"]
        );
    }

    #[tokio::test]
    async fn test_rooms_are_processed_concurrently() {
        let transport = Arc::new(FakeTransport::default());
        let runtime = runtime(transport.clone());
        let (tx, rx) = runtime.event_channel();

        // Room a stalls until room b's event has been dispatched.
        tx.send(event("!a:x", "@make block now")).await.unwrap();
        tx.send(event("!b:x", "@make release now")).await.unwrap();
        drop(tx);

        let stats = tokio::time::timeout(
            Duration::from_secs(2),
            runtime.run_until(Arc::new(NullChat), rx, std::future::pending()),
        )
        .await
        .expect("rooms should not block each other")
        .unwrap();

        assert_eq!(stats.routed, 2);
        assert_eq!(transport.calls.lock()[0].0, "!b:x");
    }

    #[tokio::test]
    async fn test_full_room_queue_does_not_starve_other_rooms() {
        let transport = Arc::new(FakeTransport::default());
        let mut config = base_config();
        config.router.room_queue_capacity = 1;
        let runtime = HookwireRuntime::from_config(&config)
            .unwrap()
            .with_transport(transport.clone());
        let (tx, rx) = runtime.event_channel();

        // Room a stalls on its first event and overflows its one-slot queue.
        tx.send(event("!a:x", "@make block now")).await.unwrap();
        tx.send(event("!a:x", "@make step 1")).await.unwrap();
        tx.send(event("!a:x", "@make step 2")).await.unwrap();
        tx.send(event("!b:x", "@make release now")).await.unwrap();
        drop(tx);

        let stats = tokio::time::timeout(
            Duration::from_secs(2),
            runtime.run_until(Arc::new(NullChat), rx, std::future::pending()),
        )
        .await
        .expect("a full room queue must not hold up other rooms")
        .unwrap();

        assert_eq!(stats.received, 4);
        assert!(stats.dropped >= 1);
        assert_eq!(stats.routed + stats.dropped, 4);
        let calls = transport.calls.lock();
        assert!(calls.iter().any(|(room, _)| room == "!b:x"));
    }

    #[tokio::test]
    async fn test_shutdown_stops_pump_with_open_channel() {
        let runtime = Arc::new(runtime(Arc::new(FakeTransport::default())));
        let (tx, rx) = runtime.event_channel();
        tx.send(event("!a:x", "@make step 1")).await.unwrap();

        let handle = tokio::spawn({
            let runtime = Arc::clone(&runtime);
            async move {
                runtime
                    .run_until(Arc::new(NullChat), rx, std::future::pending())
                    .await
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        runtime.shutdown();
        let stats = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("pump should stop on shutdown")
            .unwrap()
            .unwrap();
        assert_eq!(stats.received, 1);
        drop(tx);
    }

    #[tokio::test]
    async fn test_shutdown_future() {
        let runtime = runtime(Arc::new(FakeTransport::default()));
        let (_tx, rx) = runtime.event_channel();

        let stats = tokio::time::timeout(
            Duration::from_secs(2),
            runtime.run_until(
                Arc::new(NullChat),
                rx,
                tokio::time::sleep(Duration::from_millis(20)),
            ),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(stats, PumpStats::default());
    }

    #[test]
    fn test_from_config_registers_rules() {
        let mut config = base_config();
        config.parsers.push(
            PatternRule::new("deploy", "Deploy", r"^!deploy\s+(\w+)", ServiceTag::Custom)
                .with_fields(["env"]),
        );
        let runtime = HookwireRuntime::from_config(&config).unwrap();

        assert_eq!(runtime.registry().webhook_count(), 1);
        assert!(runtime.registry().matcher().has_match("!deploy prod", None));
    }

    #[test]
    fn test_from_config_rejects_bad_configuration() {
        let mut config = base_config();
        config.automation.webhook_timeout_ms = 0;
        assert!(matches!(
            HookwireRuntime::from_config(&config),
            Err(RuntimeError::Config(ConfigError::ValidationError { .. }))
        ));

        let mut config = base_config();
        config
            .parsers
            .push(PatternRule::new("trello-task", "Clash", "x", ServiceTag::Trello));
        assert!(matches!(
            HookwireRuntime::from_config(&config),
            Err(RuntimeError::Registry(RegistryError::Rule(_)))
        ));
    }

    #[tokio::test]
    async fn test_settings_changes_reach_router() {
        let transport = Arc::new(FakeTransport::default());
        let runtime = runtime(transport.clone());
        let router = runtime.router(Arc::new(NullChat)).unwrap();

        assert!(!runtime.settings().toggle_enabled());
        assert_eq!(
            router.route(event("!a:x", "@make step 1")).await,
            RouteOutcome::Ignored(IgnoreReason::Disabled)
        );

        assert!(runtime.settings().toggle_enabled());
        assert!(router.route(event("!a:x", "@make step 1")).await.triggered());
        assert_eq!(transport.calls.lock().len(), 1);
    }

    #[cfg(feature = "http-client")]
    #[test]
    fn test_default_transport_is_http_client() {
        let runtime = HookwireRuntime::from_config(&base_config()).unwrap();
        assert!(runtime.router(Arc::new(NullChat)).is_ok());
    }
}
