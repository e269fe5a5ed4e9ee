// ── Polling coordinator ──
//
// Owns the refresh cycle for one controller site: fetches devices,
// clients and WANs, fans out per-device detail/statistics requests,
// assembles a `Snapshot`, and publishes it. Runs on a fixed interval
// once started, or on demand through `refresh()`.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use futures_util::future::join_all;
use futures_util::{StreamExt, stream};
use serde_json::Value;
use strum::Display;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use unipoll_api::{IntegrationClient, Record};

use crate::config::ControllerConfig;
use crate::error::{CoreError, RefreshError, RefreshErrorKind};
use crate::snapshot::{DeviceFetchError, DeviceSnapshot, Snapshot};

const EVENT_CHANNEL_SIZE: usize = 16;

// ── Observable state ─────────────────────────────────────────────

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CoordinatorState {
    Idle,
    Refreshing,
    /// The controller rejected the API key. Scheduled polling has
    /// stopped; build a new coordinator with fresh credentials. Manual
    /// refreshes still publish snapshots but do not leave this state.
    ReauthRequired,
    Stopped,
}

/// Published to subscribers after every cycle.
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    Updated(Arc<Snapshot>),
    /// The previous snapshot (if any) is still current.
    Failed(Arc<RefreshError>),
}

/// Result of a refresh trigger that did not fail.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Completed(Arc<Snapshot>),
    /// Another cycle was in flight; this trigger was dropped.
    AlreadyRunning,
    /// `shutdown()` has been called.
    Stopped,
}

// ── Coordinator ──────────────────────────────────────────────────

/// Polls one site and publishes aggregated snapshots.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    client: IntegrationClient,
    config: ControllerConfig,
    snapshot: ArcSwapOption<Snapshot>,
    last_error: ArcSwapOption<RefreshError>,
    /// Held for the duration of a cycle; taken with `try_lock`.
    cycle_lock: Mutex<()>,
    state: watch::Sender<CoordinatorState>,
    event_tx: broadcast::Sender<CoordinatorEvent>,
    /// Cancelled by `shutdown()`.
    cancel: CancellationToken,
    /// Child of `cancel`; also cancelled on authentication failure.
    scheduler: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    /// Wrap an existing client. Does not contact the controller.
    pub fn new(client: IntegrationClient, config: ControllerConfig) -> Self {
        let (state, _) = watch::channel(CoordinatorState::Idle);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let scheduler = cancel.child_token();

        Self {
            inner: Arc::new(CoordinatorInner {
                client,
                config,
                snapshot: ArcSwapOption::empty(),
                last_error: ArcSwapOption::empty(),
                cycle_lock: Mutex::new(()),
                state,
                event_tx,
                cancel,
                scheduler,
                task: Mutex::new(None),
            }),
        }
    }

    /// Build the HTTP client from `config` and wrap it.
    pub fn connect(config: ControllerConfig) -> Result<Self, CoreError> {
        let client = IntegrationClient::new(&config.host, &config.api_key, &config.transport())?;
        Ok(Self::new(client, config))
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &IntegrationClient {
        &self.inner.client
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Run the first refresh and, if it succeeds, spawn the interval task.
    ///
    /// Calling `start` again on a running coordinator only refreshes.
    /// Fails without contacting the controller once the API key has been
    /// rejected.
    pub async fn start(&self) -> Result<Arc<Snapshot>, RefreshError> {
        if *self.inner.state.borrow() == CoordinatorState::ReauthRequired {
            return Err(RefreshError {
                kind: RefreshErrorKind::AuthenticationFailed,
                message: "API key was rejected; reconnect with new credentials".into(),
            });
        }

        let snapshot = match self.refresh().await? {
            RefreshOutcome::Completed(snapshot) => snapshot,
            RefreshOutcome::AlreadyRunning => {
                return Err(RefreshError {
                    kind: RefreshErrorKind::UpdateFailed,
                    message: "a refresh cycle is already in flight".into(),
                });
            }
            RefreshOutcome::Stopped => {
                return Err(RefreshError {
                    kind: RefreshErrorKind::UpdateFailed,
                    message: "coordinator has been shut down".into(),
                });
            }
        };

        let period = self.inner.config.poll_interval;
        let mut task = self.inner.task.lock().await;
        if task.is_none() && !period.is_zero() {
            let cancel = self.inner.scheduler.clone();
            *task = Some(tokio::spawn(poll_task(self.clone(), period, cancel)));
            debug!(interval = ?period, "poll task started");
        }

        Ok(snapshot)
    }

    /// Cancel the interval task and wait for it to exit.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let handle = self.inner.task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "poll task ended abnormally");
            }
        }

        self.inner.state.send_replace(CoordinatorState::Stopped);
        debug!("coordinator stopped");
    }

    // ── Refresh ──────────────────────────────────────────────────

    /// Run one cycle now, unless one is already in flight.
    ///
    /// On failure the previous snapshot stays current; the error is also
    /// stored in [`last_error`](Self::last_error) and broadcast.
    pub async fn refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        if self.inner.cancel.is_cancelled() {
            return Ok(RefreshOutcome::Stopped);
        }

        let Ok(_guard) = self.inner.cycle_lock.try_lock() else {
            debug!("refresh already in flight, skipping");
            return Ok(RefreshOutcome::AlreadyRunning);
        };

        self.set_state(CoordinatorState::Refreshing);

        match self.run_cycle().await {
            Ok(snapshot) => {
                self.inner.snapshot.store(Some(Arc::clone(&snapshot)));
                self.inner.last_error.store(None);
                self.set_state(CoordinatorState::Idle);

                info!(
                    devices = snapshot.devices.len(),
                    device_errors = snapshot.device_errors.len(),
                    clients = snapshot.client_count,
                    wans = snapshot.wans.len(),
                    "refresh complete"
                );
                let _ = self
                    .inner
                    .event_tx
                    .send(CoordinatorEvent::Updated(Arc::clone(&snapshot)));

                Ok(RefreshOutcome::Completed(snapshot))
            }
            Err(err) => {
                warn!(kind = %err.kind, error = %err, "refresh failed");

                let err = Arc::new(err);
                self.inner.last_error.store(Some(Arc::clone(&err)));

                if err.requires_reauth() {
                    self.inner.scheduler.cancel();
                    self.set_state(CoordinatorState::ReauthRequired);
                } else {
                    self.set_state(CoordinatorState::Idle);
                }

                let _ = self
                    .inner
                    .event_tx
                    .send(CoordinatorEvent::Failed(Arc::clone(&err)));

                Err(RefreshError::clone(&err))
            }
        }
    }

    async fn run_cycle(&self) -> Result<Arc<Snapshot>, RefreshError> {
        let client = &self.inner.client;
        let site_id = self.inner.config.site_id.as_str();

        let (devices, clients, wans) = tokio::try_join!(
            client.get_devices(site_id),
            client.get_clients(site_id),
            client.get_wans(site_id),
        )?;
        debug!(
            devices = devices.len(),
            clients = clients.len(),
            wans = wans.len(),
            "fetched site listings"
        );

        let (devices, device_errors) = self.fetch_device_data(devices).await;

        Ok(Arc::new(Snapshot::assemble(
            devices,
            clients,
            wans,
            device_errors,
        )))
    }

    /// Fetch details and statistics for every listed device.
    ///
    /// Results come back in listing order. A failed device becomes a
    /// placeholder plus a `DeviceFetchError`.
    async fn fetch_device_data(
        &self,
        listing: Vec<Record>,
    ) -> (Vec<DeviceSnapshot>, Vec<DeviceFetchError>) {
        let client = &self.inner.client;
        let site_id = self.inner.config.site_id.as_str();

        let tasks = listing.into_iter().filter_map(|info| {
            let Some(id) = info.get("id").and_then(Value::as_str).map(str::to_owned) else {
                warn!("device listing entry has no id, skipping");
                return None;
            };
            Some(fetch_device(client, site_id, id, info))
        });

        let results: Vec<(DeviceSnapshot, Option<DeviceFetchError>)> =
            match self.inner.config.max_device_fetches {
                Some(limit) => stream::iter(tasks).buffered(limit.max(1)).collect().await,
                None => join_all(tasks).await,
            };

        let mut devices = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for (device, error) in results {
            devices.push(device);
            errors.extend(error);
        }
        (devices, errors)
    }

    // ── Observation ──────────────────────────────────────────────

    /// The latest successful snapshot. Lock-free.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.snapshot.load_full()
    }

    /// The failure of the most recent cycle, cleared by the next success.
    pub fn last_error(&self) -> Option<Arc<RefreshError>> {
        self.inner.last_error.load_full()
    }

    /// Subscribe to cycle results. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn state(&self) -> watch::Receiver<CoordinatorState> {
        self.inner.state.subscribe()
    }

    /// `Stopped` is final. `ReauthRequired` only gives way to `Stopped`.
    fn set_state(&self, next: CoordinatorState) {
        self.inner.state.send_if_modified(|current| {
            let locked = match *current {
                CoordinatorState::Stopped => true,
                CoordinatorState::ReauthRequired => next != CoordinatorState::Stopped,
                CoordinatorState::Idle | CoordinatorState::Refreshing => false,
            };
            if locked || *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

// ── Per-device fetch ─────────────────────────────────────────────

async fn fetch_device(
    client: &IntegrationClient,
    site_id: &str,
    id: String,
    info: Record,
) -> (DeviceSnapshot, Option<DeviceFetchError>) {
    let result = tokio::try_join!(
        client.get_device_details(site_id, &id),
        client.get_device_statistics(site_id, &id),
    );

    match result {
        Ok((details, statistics)) => (
            DeviceSnapshot {
                id,
                info,
                details,
                statistics,
            },
            None,
        ),
        Err(e) => {
            warn!(device_id = %id, error = %e, "failed to fetch device data");
            let error = DeviceFetchError {
                device_id: id.clone(),
                message: e.to_string(),
            };
            (DeviceSnapshot::placeholder(id, info), Some(error))
        }
    }
}

// ── Background task ──────────────────────────────────────────────

/// Refresh on a fixed interval until cancelled or the API key is rejected.
async fn poll_task(coordinator: Coordinator, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = coordinator.refresh() => result,
        };

        match result {
            Ok(RefreshOutcome::AlreadyRunning) => {
                debug!("scheduled refresh skipped, cycle in flight");
            }
            Ok(RefreshOutcome::Stopped) => break,
            Ok(RefreshOutcome::Completed(_)) => {}
            Err(e) if e.requires_reauth() => break,
            // Logged by `refresh`; the next tick retries.
            Err(_) => {}
        }
    }

    debug!("poll task exited");
}
