use serde::Serialize;

use unipoll_core::setup;
use unipoll_core::{ControllerConfig, Site};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output::{self, SiteRow};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProbeReport<'a> {
    host: &'a str,
    application_version: Option<&'a str>,
    /// Site chosen automatically when the key sees exactly one.
    default_site: Option<&'a str>,
    sites: &'a [Site],
}

pub async fn handle(config: ControllerConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let client = super::build_client(&config)?;
    let probe = super::run_probe(&client, &config).await?;

    let report = ProbeReport {
        host: &config.host,
        application_version: probe.info.application_version.as_deref(),
        default_site: probe.default_site().map(|s| s.id.as_str()),
        sites: &probe.sites,
    };

    let out = output::render(global.output, &report, |r| {
        let rows: Vec<SiteRow> = r.sites.iter().map(SiteRow::from).collect();
        let mut out = format!(
            "Controller {} (Network {})\n",
            r.host,
            r.application_version.unwrap_or("unknown")
        );
        out.push_str(&output::render_table(&rows));
        if let Some(site) = probe.default_site() {
            out.push_str(&format!(
                "\nDefault: {}",
                setup::entry_title(&config.host, site)
            ));
        }
        out
    })?;
    output::print_output(&out)
}
