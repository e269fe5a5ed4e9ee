use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use unipoll_core::{ControllerConfig, CoordinatorEvent, CoordinatorState, Snapshot};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    args: WatchArgs,
    mut config: ControllerConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(interval) = args.interval {
        config.poll_interval = interval;
    }
    if args.max_device_fetches.is_some() {
        config.max_device_fetches = args.max_device_fetches;
    }

    let coordinator = super::prepare_coordinator(config).await?;
    let color = output::should_color(global.color);

    // Subscribe before the first load so no cycle is missed.
    let mut events = coordinator.subscribe();
    let first = coordinator.start().await?;
    print_snapshot(global.output, &first)?;
    let _ = events.try_recv();

    info!(
        interval = ?coordinator.config().poll_interval,
        "watching; press Ctrl-C to stop"
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            event = events.recv() => match event {
                Ok(CoordinatorEvent::Updated(snapshot)) => {
                    if let Err(e) = print_snapshot(global.output, &snapshot) {
                        break Err(e);
                    }
                }
                Ok(CoordinatorEvent::Failed(err)) => {
                    let state = *coordinator.state().borrow();
                    eprintln!("[{}] {err}", output::paint_state(state, color));
                    if state == CoordinatorState::ReauthRequired {
                        break Err(CliError::from(err.as_ref().clone()));
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "output fell behind"),
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    coordinator.shutdown().await;
    result
}

fn print_snapshot(format: OutputFormat, snapshot: &Arc<Snapshot>) -> Result<(), CliError> {
    let line = match format {
        OutputFormat::Table => output::summary_line(snapshot),
        OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(snapshot.as_ref())?,
    };
    output::print_output(&line)
}
