// ── SoftAP controller ──
//
// Public entry point. Wires the stores, the event monitor and the hostapd
// manager together, runs the state machine task, and exposes command
// execution plus reactive status, event and client streams.

use std::sync::{Arc, Mutex, PoisonError};

use softap_hal::{ApInterface, NetworkService, ServiceRegistry};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::{ManagerConfig, SoftApConfiguration};
use crate::error::CoreError;
use crate::lifecycle::HostapdManager;
use crate::machine::{Message, QueueListener, SoftApMachine};
use crate::model::{AccessControlEntry, HotspotEvent, MachineState, SoftApStatus};
use crate::monitor::{ApMonitor, EventListener};
use crate::platform::TetheringControl;
use crate::store::{AccessControlStore, ClientTable, Settings, SettingsStore};
use crate::stream::ClientStream;

const EVENT_CHANNEL_SIZE: usize = 64;

/// The remote objects the controller drives.
#[derive(Clone)]
pub struct Backends {
    pub registry: Arc<dyn ServiceRegistry>,
    pub ap_interface: Arc<dyn ApInterface>,
    pub network: Arc<dyn NetworkService>,
    pub tethering: Arc<dyn TetheringControl>,
}

/// State shared between the controller handle and the machine task.
pub(crate) struct Shared {
    pub(crate) config: ManagerConfig,
    pub(crate) backends: Backends,
    pub(crate) manager: HostapdManager,
    pub(crate) monitor: Arc<ApMonitor>,
    pub(crate) settings: Arc<SettingsStore>,
    pub(crate) acl: Arc<AccessControlStore>,
    pub(crate) clients: Arc<ClientTable>,
    pub(crate) status_tx: watch::Sender<SoftApStatus>,
    pub(crate) event_tx: broadcast::Sender<HotspotEvent>,
}

/// Handle to a soft AP. Cheaply cloneable.
///
/// Create with [`new`](Self::new), then [`launch`](Self::launch) the state
/// machine from within a Tokio runtime before executing commands.
#[derive(Clone)]
pub struct SoftApController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    shared: Arc<Shared>,
    message_tx: mpsc::UnboundedSender<Message>,
    message_rx: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SoftApController {
    pub fn new(config: ManagerConfig, backends: Backends) -> Self {
        let defaults = Settings {
            auto_disable_secs: config.default_auto_disable.as_secs(),
            ..Settings::default()
        };
        let settings = Arc::new(SettingsStore::with_defaults(
            &config.paths.settings_file,
            defaults,
        ));
        let acl = Arc::new(AccessControlStore::new(
            &config.paths.acl_file,
            Arc::clone(&settings),
        ));
        let monitor = Arc::new(ApMonitor::new(config.handshake));
        let manager = HostapdManager::new(Arc::clone(&backends.registry), Arc::clone(&monitor));
        let (status_tx, _) = watch::channel(SoftApStatus::default());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (message_tx, message_rx) = mpsc::unbounded_channel();

        let listener: Arc<dyn EventListener> = Arc::new(QueueListener(message_tx.clone()));
        monitor.register_all(backends.ap_interface.interface_name(), &listener);

        Self {
            inner: Arc::new(ControllerInner {
                shared: Arc::new(Shared {
                    config,
                    backends,
                    manager,
                    monitor,
                    settings,
                    acl,
                    clients: Arc::new(ClientTable::new()),
                    status_tx,
                    event_tx,
                }),
                message_tx,
                message_rx: Mutex::new(Some(message_rx)),
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.shared.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the state machine task. Must be called within a Tokio runtime.
    pub fn launch(&self) -> Result<(), CoreError> {
        let rx = self
            .inner
            .message_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| CoreError::Internal("controller already launched".into()))?;
        let machine = SoftApMachine::new(
            Arc::clone(&self.inner.shared),
            self.inner.message_tx.clone(),
            self.inner.cancel.clone(),
        );
        let handle = tokio::spawn(machine.run(rx));
        *self.inner.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        info!(
            iface = self.inner.shared.backends.ap_interface.interface_name(),
            "soft AP controller launched"
        );
        Ok(())
    }

    /// Stop the AP if it is running, then stop the machine task and drop
    /// the daemon connection.
    pub async fn shutdown(&self) {
        if self.current_status().state == MachineState::Started {
            if let Err(e) = self.execute(Command::Stop).await {
                warn!(error = %e, "stop during shutdown failed");
            }
        }
        self.inner.cancel.cancel();
        let handle = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.inner.shared.monitor.stop_all_monitoring();
        self.inner.shared.manager.deinitialize();
        debug!("soft AP controller shut down");
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Queue a command and wait for the machine to process it.
    pub async fn execute(&self, command: Command) -> Result<CommandResult, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::ControllerStopped);
        }
        let (tx, rx) = oneshot::channel();
        self.inner
            .message_tx
            .send(Message::Command(CommandEnvelope {
                command,
                response_tx: tx,
            }))
            .map_err(|_| CoreError::ControllerStopped)?;
        rx.await.map_err(|_| CoreError::ControllerStopped)?
    }

    pub async fn start(&self, config: SoftApConfiguration) -> Result<CommandResult, CoreError> {
        self.execute(Command::Start(Box::new(config))).await
    }

    pub async fn stop(&self) -> Result<CommandResult, CoreError> {
        self.execute(Command::Stop).await
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn status(&self) -> watch::Receiver<SoftApStatus> {
        self.inner.shared.status_tx.subscribe()
    }

    pub fn current_status(&self) -> SoftApStatus {
        self.inner.shared.status_tx.borrow().clone()
    }

    pub fn events(&self) -> broadcast::Receiver<HotspotEvent> {
        self.inner.shared.event_tx.subscribe()
    }

    pub fn clients(&self) -> ClientStream {
        ClientStream::new(self.inner.shared.clients.subscribe())
    }

    /// Read the persisted allow-list without going through the machine.
    pub fn allowed_devices(&self) -> Vec<AccessControlEntry> {
        self.inner.shared.acl.list_all()
    }

    pub fn settings(&self) -> Settings {
        self.inner.shared.settings.get()
    }
}
