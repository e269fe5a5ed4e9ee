// ── Aggregated snapshot ──
//
// The immutable result of one successful refresh cycle. Built from
// scratch every cycle and published behind an `Arc`; never mutated once
// published.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use strum::{Display, EnumString};

pub use unipoll_api::Record;

// ── DeviceSnapshot ───────────────────────────────────────────────

/// Everything fetched for one device in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    pub id: String,
    /// The device's entry from the device listing.
    pub info: Record,
    /// `GET .../devices/{id}`; empty when the per-device fetch failed.
    pub details: Record,
    /// `GET .../devices/{id}/statistics/latest`; empty when the per-device fetch failed.
    pub statistics: Record,
}

impl DeviceSnapshot {
    /// Placeholder kept in the snapshot when details or statistics could
    /// not be fetched.
    pub fn placeholder(id: impl Into<String>, info: Record) -> Self {
        Self {
            id: id.into(),
            info,
            details: Record::new(),
            statistics: Record::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.details.is_empty() && self.statistics.is_empty()
    }

    /// `name` from details, falling back to the listing.
    pub fn name(&self) -> Option<&str> {
        self.details
            .get("name")
            .or_else(|| self.info.get("name"))
            .and_then(serde_json::Value::as_str)
    }
}

/// A per-device fetch that failed and was replaced by a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceFetchError {
    pub device_id: String,
    pub message: String,
}

// ── Client classification ────────────────────────────────────────

/// Client connection type, parsed from the record's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum ClientType {
    Wired,
    Wireless,
    Vpn,
}

impl ClientType {
    /// Classify a raw client record. `None` for missing or unrecognized types.
    pub fn of(record: &Record) -> Option<Self> {
        record
            .get("type")
            .and_then(serde_json::Value::as_str)
            .and_then(|t| Self::from_str(t).ok())
    }
}

/// Client totals per connection type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClientCounts {
    pub total: usize,
    pub wired: usize,
    pub wireless: usize,
    pub vpn: usize,
}

impl ClientCounts {
    pub fn tally<'a>(clients: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut counts = Self::default();
        for client in clients {
            counts.total += 1;
            match ClientType::of(client) {
                Some(ClientType::Wired) => counts.wired += 1,
                Some(ClientType::Wireless) => counts.wireless += 1,
                Some(ClientType::Vpn) => counts.vpn += 1,
                None => {}
            }
        }
        counts
    }
}

// ── Snapshot ─────────────────────────────────────────────────────

/// Complete state of one site as of the last successful cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Keyed by device id, in listing order.
    pub devices: IndexMap<String, DeviceSnapshot>,
    pub clients: Vec<Record>,
    pub wans: Vec<Record>,
    pub client_count: usize,
    pub client_count_wired: usize,
    pub client_count_wireless: usize,
    pub client_count_vpn: usize,
    pub refreshed_at: DateTime<Utc>,
    /// Devices that were replaced by placeholders this cycle.
    pub device_errors: Vec<DeviceFetchError>,
}

impl Snapshot {
    /// Build a snapshot from the pieces of one cycle. Client counts are
    /// derived here.
    pub fn assemble(
        devices: impl IntoIterator<Item = DeviceSnapshot>,
        clients: Vec<Record>,
        wans: Vec<Record>,
        device_errors: Vec<DeviceFetchError>,
    ) -> Self {
        let counts = ClientCounts::tally(&clients);
        Self {
            devices: devices.into_iter().map(|d| (d.id.clone(), d)).collect(),
            clients,
            wans,
            client_count: counts.total,
            client_count_wired: counts.wired,
            client_count_wireless: counts.wireless,
            client_count_vpn: counts.vpn,
            refreshed_at: Utc::now(),
            device_errors,
        }
    }

    pub fn counts(&self) -> ClientCounts {
        ClientCounts {
            total: self.client_count,
            wired: self.client_count_wired,
            wireless: self.client_count_wireless,
            vpn: self.client_count_vpn,
        }
    }

    pub fn device(&self, id: &str) -> Option<&DeviceSnapshot> {
        self.devices.get(id)
    }
}
