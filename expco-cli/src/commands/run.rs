use crate::shutdown::spawn_shutdown_listener;
use crate::state::AppState;
use clap::{Subcommand, ValueEnum};
use expco_core::processors::{Coordinator, ProcessReport};
use expco_sdk::client::BrokerClient;
use std::sync::Arc;
use std::time::Duration;

#[derive(Subcommand, Debug)]
pub enum RunCommand {
    /// Fetch and process the oldest message or event
    Single {
        #[arg(value_enum)]
        queue: QueueKind,
    },

    /// Drain a queue and process everything in it
    All {
        #[arg(value_enum)]
        queue: QueueKind,
    },

    /// Drain both queues every interval until interrupted
    Forever {
        /// Seconds to sleep between cycles
        #[arg(long, default_value_t = 60)]
        interval: u64,

        /// Log a failed cycle and continue instead of exiting
        #[arg(long, default_value = "false")]
        keep_going: bool,
    },

    /// Set everything up and tear it down again without processing
    Check,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Message,
    Event,
}

pub async fn execute(cmd: RunCommand, state: &AppState) -> anyhow::Result<()> {
    let pool = state.connect_db().await?;
    let coordinator = state.coordinator(pool.clone());

    let result = run(cmd, &coordinator).await;

    tracing::info!("Closing database connections...");
    pool.close().await;
    tracing::info!("Shutdown complete");

    result
}

async fn run(cmd: RunCommand, coordinator: &Coordinator<Arc<BrokerClient>>) -> anyhow::Result<()> {
    match cmd {
        RunCommand::Single { queue } => {
            let report = match queue {
                QueueKind::Message => coordinator.single_message().await,
                QueueKind::Event => coordinator.single_event().await,
            };
            match report? {
                Some(report) => log_report(&report),
                None => tracing::info!(?queue, "Queue is empty, nothing to process"),
            }
            Ok(())
        }
        RunCommand::All { queue } => {
            let report = match queue {
                QueueKind::Message => coordinator.all_messages().await?,
                QueueKind::Event => coordinator.all_events().await?,
            };
            log_report(&report);
            Ok(())
        }
        RunCommand::Forever {
            interval,
            keep_going,
        } => {
            tracing::info!("Starting experiment coordinator...");
            let shutdown_rx = spawn_shutdown_listener()?;
            coordinator
                .run_forever(Duration::from_secs(interval), !keep_going, shutdown_rx)
                .await
                .map_err(Into::into)
        }
        RunCommand::Check => {
            let message_handlers: Vec<_> =
                coordinator.message_dispatcher().handler_names().collect();
            let event_handlers: Vec<_> = coordinator.event_dispatcher().handler_names().collect();
            tracing::info!(
                ?message_handlers,
                ?event_handlers,
                "Setup complete, tearing down"
            );
            Ok(())
        }
    }
}

fn log_report(report: &ProcessReport) {
    tracing::info!(
        handled = report.succeeded.len(),
        handlers = ?report.succeeded,
        "Processing finished without errors"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Cli {
        #[command(subcommand)]
        cmd: RunCommand,
    }

    #[test]
    fn test_forever_defaults_exit_on_failure() {
        let cli = Cli::try_parse_from(["run", "forever"]).unwrap();
        match cli.cmd {
            RunCommand::Forever {
                interval,
                keep_going,
            } => {
                assert_eq!(interval, 60);
                assert!(!keep_going);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_queue_kind_parsing() {
        let cli = Cli::try_parse_from(["run", "single", "event"]).unwrap();
        assert!(matches!(
            cli.cmd,
            RunCommand::Single {
                queue: QueueKind::Event
            }
        ));
        assert!(Cli::try_parse_from(["run", "all", "status"]).is_err());
    }
}
