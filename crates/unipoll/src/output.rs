//! Output formatting: table or JSON.
//!
//! Renders data in the format selected by `--output`. Tables use `tabled`,
//! structured formats serialize the original data via serde.

use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::Value;
use tabled::{Table, Tabled, settings::Style};

use unipoll_core::{CoordinatorState, DeviceSnapshot, Record, Site, Snapshot};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

pub fn paint_state(state: CoordinatorState, color: bool) -> String {
    if !color {
        return state.to_string();
    }
    match state {
        CoordinatorState::Idle => state.green().to_string(),
        CoordinatorState::Refreshing => state.cyan().to_string(),
        CoordinatorState::ReauthRequired => state.red().bold().to_string(),
        CoordinatorState::Stopped => state.dimmed().to_string(),
    }
}

// ── Rows ─────────────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct SiteRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Reference")]
    pub reference: String,
}

impl From<&Site> for SiteRow {
    fn from(site: &Site) -> Self {
        Self {
            id: site.id.clone(),
            name: site.display_name().to_owned(),
            reference: site.internal_reference.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
pub struct DeviceRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Model")]
    pub model: String,
    #[tabled(rename = "State")]
    pub state: String,
    #[tabled(rename = "Uptime")]
    pub uptime: String,
    #[tabled(rename = "CPU %")]
    pub cpu: String,
}

impl From<&DeviceSnapshot> for DeviceRow {
    fn from(dev: &DeviceSnapshot) -> Self {
        let uptime = dev
            .statistics
            .get("uptimeSec")
            .and_then(Value::as_u64)
            .map(|secs| humantime::format_duration(Duration::from_secs(secs)).to_string());
        let cpu = dev
            .statistics
            .get("cpuUtilizationPct")
            .and_then(Value::as_f64)
            .map(|pct| format!("{pct:.1}"));

        Self {
            id: dev.id.clone(),
            name: dev.name().unwrap_or("-").to_owned(),
            model: field(&dev.info, "model"),
            state: field(&dev.info, "state"),
            uptime: uptime.unwrap_or_else(|| "-".into()),
            cpu: cpu.unwrap_or_else(|| "-".into()),
        }
    }
}

fn field(record: &Record, key: &str) -> String {
    record
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("-")
        .to_owned()
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render any serializable value as JSON, or via `table_fn` for tables.
pub fn render<T: Serialize + ?Sized>(
    format: OutputFormat,
    data: &T,
    table_fn: impl FnOnce(&T) -> String,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => Ok(table_fn(data)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
        OutputFormat::JsonCompact => Ok(serde_json::to_string(data)?),
    }
}

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Device table followed by client/WAN totals.
pub fn snapshot_table(snapshot: &Snapshot) -> String {
    let rows: Vec<DeviceRow> = snapshot.devices.values().map(DeviceRow::from).collect();
    let mut out = render_table(&rows);
    out.push('\n');
    out.push_str(&summary_line(snapshot));
    for err in &snapshot.device_errors {
        out.push_str(&format!("\n  ! {}: {}", err.device_id, err.message));
    }
    out
}

/// One-line cycle summary.
pub fn summary_line(snapshot: &Snapshot) -> String {
    let counts = snapshot.counts();
    format!(
        "{} devices ({} degraded), {} clients ({} wired, {} wireless, {} vpn), {} WANs @ {}",
        snapshot.devices.len(),
        snapshot.device_errors.len(),
        counts.total,
        counts.wired,
        counts.wireless,
        counts.vpn,
        snapshot.wans.len(),
        snapshot.refreshed_at.format("%H:%M:%S"),
    )
}

/// Print the rendered output to stdout.
pub fn print_output(output: &str) -> Result<(), CliError> {
    if output.is_empty() {
        return Ok(());
    }
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{output}")?;
    Ok(())
}
