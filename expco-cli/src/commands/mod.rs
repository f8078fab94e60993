//! Subcommands of the `expco` binary.
//!
//! - `run`: poll the queues and dispatch to the handlers
//! - `s3i`: talk to the broker directly
//! - `data`: manage devices and export stored images

pub mod data;
pub mod run;
pub mod s3i;

use crate::state::AppState;
use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the experiment coordinator
    #[command(subcommand)]
    Run(run::RunCommand),

    /// Play around with the S³I broker
    #[command(subcommand)]
    S3i(s3i::S3iCommand),

    /// Inspect and manage stored data
    #[command(subcommand)]
    Data(data::DataCommand),
}

pub async fn execute(command: Command, state: &AppState) -> anyhow::Result<()> {
    match command {
        Command::Run(cmd) => run::execute(cmd, state).await,
        Command::S3i(cmd) => s3i::execute(cmd, state).await,
        Command::Data(cmd) => data::execute(cmd, state).await,
    }
}
