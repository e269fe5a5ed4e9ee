use unipoll_core::{ControllerConfig, RefreshError, RefreshErrorKind, RefreshOutcome};

use crate::cli::{GlobalOpts, SnapshotArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    args: SnapshotArgs,
    mut config: ControllerConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.max_device_fetches.is_some() {
        config.max_device_fetches = args.max_device_fetches;
    }

    let coordinator = super::prepare_coordinator(config).await?;

    let snapshot = match coordinator.refresh().await? {
        RefreshOutcome::Completed(snapshot) => snapshot,
        RefreshOutcome::AlreadyRunning | RefreshOutcome::Stopped => {
            return Err(RefreshError {
                kind: RefreshErrorKind::UpdateFailed,
                message: "refresh did not run".into(),
            }
            .into());
        }
    };

    let out = output::render(global.output, snapshot.as_ref(), output::snapshot_table)?;
    output::print_output(&out)
}
