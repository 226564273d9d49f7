//! Runtime orchestration.
//!
//! ```rust,ignore
//! use courier_runtime::CourierRuntime;
//!
//! let runtime = CourierRuntime::builder()
//!     .config_file("config/courier.toml")
//!     .profile("production")
//!     .build()?;
//!
//! runtime.register_adapter::<ShellAdapter>()?;
//! runtime.robot().register_script(badger)?;
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use courier_core::{ConfigurableAdapter, EventName, LifecycleEvent, RegistryError};
use courier_framework::Robot;
use courier_transport::{AppState, HttpServer, ServerHandle, build_client};
use tokio::signal;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ConfigLoader, CourierConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// Owns the robot and drives its lifecycle.
pub struct CourierRuntime {
    config: CourierConfig,
    robot: Arc<Robot>,
    running: RwLock<bool>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for CourierRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourierRuntime")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CourierRuntime {
    /// Loads configuration from the default locations.
    pub fn new() -> RuntimeResult<Self> {
        Self::builder().build()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Validates `config`, installs logging and creates the robot.
    pub fn from_config(config: CourierConfig) -> RuntimeResult<Self> {
        validate_config(&config)?;
        logging::init_from_config(&config.logging);

        let robot = Robot::new(config.robot.name.as_str())
            .with_host(config.robot.host.as_str())
            .with_tokens(config.robot.tokens.iter().cloned());

        info!(
            robot = %config.robot.name,
            log_level = %config.logging.level,
            addr = %config.server.addr,
            "Runtime initialized from configuration"
        );

        Ok(Self {
            config,
            robot: Arc::new(robot),
            running: RwLock::new(false),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    pub fn robot(&self) -> &Arc<Robot> {
        &self.robot
    }

    /// A token whose cancellation makes [`run`](Self::run) return.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Builds adapter `A` from its `adapters.<key>` table, or from its
    /// default configuration when there is none, and registers it.
    pub fn register_adapter<A>(&self) -> RuntimeResult<()>
    where
        A: ConfigurableAdapter + 'static,
    {
        let key = A::config_key();
        let config: A::Config = match self.config.adapters.get(key) {
            Some(value) => value.deserialize().map_err(|e| {
                RuntimeError::AdapterConfigDeserialize(format!(
                    "Failed to deserialize config for adapter '{key}': {e}"
                ))
            })?,
            None => {
                warn!(adapter = key, "No configuration found for adapter, using default");
                A::Config::default()
            }
        };

        self.robot.register_adapter(Arc::new(A::from_config(config)?));
        Ok(())
    }

    /// Generates a random token when none is configured and returns it.
    pub fn ensure_token(&self) -> Option<String> {
        if self.robot.has_tokens() {
            return None;
        }
        let token = Uuid::new_v4().to_string();
        self.robot.add_token(token.clone());
        Some(token)
    }

    /// Runs the boot sequence.
    pub async fn start(&self) -> RuntimeResult<()> {
        {
            let mut running = self.running.write().await;
            if *running {
                warn!("Runtime is already running");
                return Ok(());
            }
            *running = true;
        }

        info!(robot = %self.robot.name(), "Starting Courier runtime");

        if let Some(token) = self.ensure_token() {
            warn!(token = %token, "No token configured, generated one");
        }

        self.robot
            .emit(LifecycleEvent::bare(EventName::InitializedStore))
            .await;

        match self.robot.register_help() {
            Ok(()) | Err(RegistryError::AlreadyRegistered { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        self.robot.start_adapters().await;
        self.robot.init_slash_commands().await;

        let programs = self
            .robot
            .register_programs(&self.config.program_scripts)
            .await;
        debug!(programs, "Program scripts registered");

        self.robot
            .emit(LifecycleEvent::bare(EventName::Initialized))
            .await;
        self.robot.emit(LifecycleEvent::bare(EventName::Started)).await;

        info!(
            scripts = self.robot.scripts().len(),
            commands = self.robot.commands().len(),
            "Runtime started"
        );
        Ok(())
    }

    /// Shuts adapters down and closes the event bus.
    pub async fn stop(&self) {
        {
            let mut running = self.running.write().await;
            if !*running {
                warn!("Runtime is not running");
                return;
            }
            *running = false;
        }

        info!("Stopping Courier runtime");
        self.robot.stop_adapters().await;
        self.robot.bus().close();
        self.shutdown.cancel();
        info!("Runtime stopped");
    }

    /// Binds the HTTP surface on `server.addr`.
    pub async fn serve(&self) -> RuntimeResult<ServerHandle> {
        let client = build_client(self.config.robot.skip_insecure)
            .map_err(|e| RuntimeError::HttpClient(e.to_string()))?;
        let state = AppState::new(self.robot.clone(), self.config.relay.to_settings(), client);
        Ok(HttpServer::new(state).bind(&self.config.server.addr).await?)
    }

    /// Runs until Ctrl+C, SIGTERM or [`shutdown_token`](Self::shutdown_token)
    /// cancellation.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs until `shutdown` completes or the shutdown token is cancelled.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        let server = match self.serve().await {
            Ok(server) => server,
            Err(e) => {
                self.stop().await;
                return Err(e);
            }
        };

        info!(addr = %server.local_addr(), "Courier runtime is now running. Press Ctrl+C to stop.");

        tokio::select! {
            _ = shutdown => {}
            _ = self.shutdown.cancelled() => {
                info!("Shutdown requested");
            }
        }

        server.shutdown().await;
        self.stop().await;
        Ok(())
    }
}

/// Waits for Ctrl+C, or SIGTERM on unix.
async fn wait_for_shutdown() {
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
            Err(e) => error!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`CourierRuntime`] with custom configuration sources.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir().with_user_config_dir(),
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: CourierConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    pub fn build(self) -> RuntimeResult<CourierRuntime> {
        CourierRuntime::from_config(self.config_loader.load()?)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use courier_core::{Adapter, AdapterContext, AdapterError, AdapterResult, Envelope};
    use figment::value::Value;
    use serde::{Deserialize, Serialize};
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct FakeConfig {
        #[serde(default)]
        label: String,
        #[serde(default)]
        reject: bool,
    }

    struct FakeAdapter {
        name: String,
        started: AtomicBool,
    }

    #[async_trait]
    impl Adapter for FakeAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn send(&self, _: &Envelope, _: &str) -> AdapterResult<()> {
            Ok(())
        }

        async fn reply(&self, _: &Envelope, _: &str) -> AdapterResult<()> {
            Ok(())
        }

        async fn on_start(&self, _ctx: Arc<dyn AdapterContext>) -> AdapterResult<()> {
            self.started.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    impl ConfigurableAdapter for FakeAdapter {
        type Config = FakeConfig;

        fn config_key() -> &'static str {
            "fake"
        }

        fn from_config(config: FakeConfig) -> AdapterResult<Self> {
            if config.reject {
                return Err(AdapterError::Config("rejected".into()));
            }
            let name = if config.label.is_empty() {
                "fake".to_string()
            } else {
                config.label
            };
            Ok(Self {
                name,
                started: AtomicBool::new(false),
            })
        }
    }

    fn runtime(config: CourierConfig) -> CourierRuntime {
        CourierRuntime::from_config(config).unwrap()
    }

    #[test]
    fn test_register_adapter_from_table() {
        let mut config = CourierConfig::default();
        config.adapters.insert(
            "fake".to_string(),
            Value::serialize(FakeConfig {
                label: "configured".into(),
                reject: false,
            })
            .unwrap(),
        );
        let runtime = runtime(config);
        assert_ok!(runtime.register_adapter::<FakeAdapter>());
        assert_eq!(runtime.robot().adapters().len(), 1);
        assert!(runtime.robot().find_adapter("configured").is_some());
    }

    #[test]
    fn test_register_adapter_errors() {
        let mut config = CourierConfig::default();
        config.adapters.insert(
            "fake".to_string(),
            Value::serialize(FakeConfig {
                label: String::new(),
                reject: true,
            })
            .unwrap(),
        );
        let runtime = runtime(config);
        assert!(matches!(
            runtime.register_adapter::<FakeAdapter>(),
            Err(RuntimeError::Adapter(_))
        ));

        let mut config = CourierConfig::default();
        config
            .adapters
            .insert("fake".to_string(), Value::serialize(42u8).unwrap());
        let runtime = super::CourierRuntime::from_config(config).unwrap();
        assert!(matches!(
            runtime.register_adapter::<FakeAdapter>(),
            Err(RuntimeError::AdapterConfigDeserialize(_))
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = CourierConfig::default();
        config.relay.max_attempts = 0;
        assert_err!(CourierRuntime::from_config(config));
    }

    #[tokio::test]
    async fn test_boot_sequence() {
        let runtime = runtime(CourierConfig::default());
        let fake = Arc::new(FakeAdapter::from_config(FakeConfig::default()).unwrap());
        runtime.robot().register_adapter(fake.clone());

        let mut events = runtime.robot().on_any();
        let collector = tokio::spawn(async move {
            let mut names = Vec::new();
            while names.len() < 3 {
                match events.recv().await {
                    Some(delivery) => names.push(delivery.into_event().name),
                    None => break,
                }
            }
            names
        });

        assert_ok!(runtime.start().await);
        assert!(runtime.is_running().await);

        assert_eq!(
            collector.await.unwrap(),
            vec![EventName::InitializedStore, EventName::Initialized, EventName::Started]
        );
        assert!(runtime.robot().has_tokens());
        assert!(runtime.robot().scripts().snapshot().iter().any(|s| s.name == "help"));

        assert!(fake.started.load(Ordering::SeqCst));

        runtime.stop().await;
        assert!(!runtime.is_running().await);
        assert!(runtime.shutdown_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_configured_token_is_kept() {
        let mut config = CourierConfig::default();
        config.robot.tokens = vec!["fixed".to_string()];
        let runtime = runtime(config);
        assert_eq!(runtime.ensure_token(), None);
        assert!(runtime.robot().is_valid_token("fixed"));

        let runtime = self::runtime(CourierConfig::default());
        let generated = runtime.ensure_token().unwrap();
        assert!(Uuid::parse_str(&generated).is_ok());
        assert!(runtime.robot().is_valid_token(&generated));
    }

    #[tokio::test]
    async fn test_missing_program_is_skipped() {
        let mut config = CourierConfig::default();
        config.program_scripts = vec![courier_framework::ProgramScript {
            path: "/nonexistent/courier-program".into(),
            args: Vec::new(),
        }];
        let runtime = runtime(config);
        assert_ok!(runtime.start().await);
        assert_eq!(runtime.robot().scripts().len(), 1);
        runtime.stop().await;
    }

    #[tokio::test]
    async fn test_run_until_serves_and_stops() {
        let mut config = CourierConfig::default();
        config.server.addr = "127.0.0.1:0".to_string();
        let runtime = runtime(config);

        let token = runtime.shutdown_token();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            token.cancel();
        });

        assert_ok!(runtime.run_until(futures::future::pending()).await);
        assert!(!runtime.is_running().await);
    }
}
