//! Entry points for the hosting process.

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::poller::{LogPoller, PollerStats};
use biogate_core::{DeviceSettings, constants::DEFAULT_PULSE_SECONDS};
use biogate_network::{DeviceLink, RelayController};
use biogate_storage::MembershipRepository;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

struct PollingTask {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the device link, the relay controller and the poll loop.
///
/// # Example
///
/// ```no_run
/// use biogate_agent::{AgentConfig, BiometricService};
/// use biogate_storage::{Database, DatabaseConfig, SqliteMembershipRepository};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AgentConfig::from_env()?;
/// let db = Database::new(DatabaseConfig::new(&config.database_path)).await?;
/// let repo = Arc::new(SqliteMembershipRepository::new(db.pool().clone()));
///
/// let service = BiometricService::new(repo, config);
/// service.start_polling();
/// // ...
/// service.stop_polling().await;
/// # Ok(())
/// # }
/// ```
pub struct BiometricService<R> {
    repo: Arc<R>,
    config: AgentConfig,
    link: Arc<DeviceLink>,
    relay: Arc<RelayController>,
    poller: Arc<LogPoller<R, RelayController>>,
    polling: Mutex<Option<PollingTask>>,
}

impl<R> BiometricService<R>
where
    R: MembershipRepository + 'static,
{
    pub fn new(repo: Arc<R>, config: AgentConfig) -> Self {
        let link = Arc::new(DeviceLink::new(config.link.clone()));
        let relay = Arc::new(RelayController::new(Arc::clone(&link)));
        let poller = Arc::new(LogPoller::new(
            Arc::clone(&repo),
            Arc::clone(&link),
            Arc::clone(&relay),
        ));

        Self {
            repo,
            config,
            link,
            relay,
            poller,
            polling: Mutex::new(None),
        }
    }

    /// Start the background poll loop.
    ///
    /// Returns `false` without starting anything when this process is not an
    /// edge install or when called outside a tokio runtime. A second call
    /// replaces the running loop.
    pub fn start_polling(&self) -> bool {
        if !self.config.edge {
            info!("Not an edge install, biometric polling disabled");
            return false;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime available, biometric polling not started");
            return false;
        };

        let shutdown = CancellationToken::new();
        let handle = runtime.spawn(
            Arc::clone(&self.poller).run(self.config.poll_interval, shutdown.clone()),
        );

        let previous = self
            .polling
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(PollingTask { shutdown, handle });
        if let Some(previous) = previous {
            previous.shutdown.cancel();
            info!("Replaced running poll loop");
        }

        true
    }

    /// Stop the poll loop, wait for it to finish and close the device link.
    pub async fn stop_polling(&self) {
        let task = self
            .polling
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(task) = task {
            task.shutdown.cancel();
            if let Err(e) = task.handle.await {
                warn!(error = %AgentError::Task(e.to_string()), "Poll loop ended abnormally");
            }
        }

        self.link.close().await;
    }

    pub fn is_polling(&self) -> bool {
        self.polling
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Open a fresh connection to the terminal.
    pub async fn test_connection(&self, settings: &DeviceSettings) -> bool {
        self.link.connect(settings).await
    }

    /// Pulse the door relay by hand. Defaults to one second.
    pub async fn pulse_relay(&self, settings: &DeviceSettings, seconds: Option<u8>) -> bool {
        if !self.link.ensure_connected(settings).await {
            warn!(device = %settings, "Relay pulse skipped, terminal unreachable");
            return false;
        }

        self.relay
            .unlock(settings, seconds.unwrap_or(DEFAULT_PULSE_SECONDS))
            .await
    }

    /// Current terminal settings from the repository.
    ///
    /// # Errors
    ///
    /// Fails when the settings cannot be read or no terminal address is set.
    pub async fn load_settings(&self) -> Result<DeviceSettings> {
        let raw = self.repo.get_settings().await?;
        Ok(DeviceSettings::from_settings(&raw)?)
    }

    pub fn stats(&self) -> PollerStats {
        self.poller.stats()
    }

    pub fn link(&self) -> &Arc<DeviceLink> {
        &self.link
    }
}
