// unipoll-core: Polling coordinator and aggregated snapshots over unipoll-api.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod setup;
pub mod snapshot;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ControllerConfig, TlsVerification};
pub use coordinator::{Coordinator, CoordinatorEvent, CoordinatorState, RefreshOutcome};
pub use error::{CoreError, RefreshError, RefreshErrorKind};
pub use setup::{SetupError, SetupProbe};
pub use snapshot::{ClientCounts, ClientType, DeviceFetchError, DeviceSnapshot, Record, Snapshot};

pub use unipoll_api::{IntegrationClient, Site};
