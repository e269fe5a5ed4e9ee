//! Command handlers.

pub mod probe;
pub mod snapshot;
pub mod watch;

use tracing::debug;

use unipoll_core::setup::{self, SetupProbe};
use unipoll_core::{ControllerConfig, Coordinator, IntegrationClient};

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Resolve config and dispatch to the selected command.
pub async fn dispatch(command: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let controller_config = config::resolve_controller_config(global)?;
    debug!(command = ?command, host = %controller_config.host, "dispatching command");

    match command {
        Command::Probe => probe::handle(controller_config, global).await,
        Command::Snapshot(args) => snapshot::handle(args, controller_config, global).await,
        Command::Watch(args) => watch::handle(args, controller_config, global).await,
    }
}

/// Build the HTTP client for `config`.
pub(crate) fn build_client(config: &ControllerConfig) -> Result<IntegrationClient, CliError> {
    IntegrationClient::new(&config.host, &config.api_key, &config.transport())
        .map_err(|e| CliError::from(unipoll_core::CoreError::from(e)))
}

/// Run the setup probe against `config.host`.
pub(crate) async fn run_probe(
    client: &IntegrationClient,
    config: &ControllerConfig,
) -> Result<SetupProbe, CliError> {
    setup::probe(client)
        .await
        .map_err(|e| CliError::from_setup(e, &config.host))
}

/// Probe the controller, pin the selected site, and wrap it in a coordinator.
pub(crate) async fn prepare_coordinator(
    mut config: ControllerConfig,
) -> Result<Coordinator, CliError> {
    let client = build_client(&config)?;
    let probe = run_probe(&client, &config).await?;

    let selector = (!config.site_id.is_empty()).then_some(config.site_id.as_str());
    let site = probe.select_site(selector)?;
    debug!(site_id = %site.id, site = site.display_name(), "site selected");
    config.site_id.clone_from(&site.id);

    Ok(Coordinator::new(client, config))
}
