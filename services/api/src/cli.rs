use crate::demo::{run_demo, run_schedule_preview, DemoArgs, SchedulePreviewArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use ledgerpulse::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Ledgerpulse",
    about = "Capture client financial snapshots, detect meaningful changes, and queue update drafts",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect recurrence schedules without touching any client data
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommand,
    },
    /// Run the full snapshot-to-draft pipeline against the built-in demo ledger
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum ScheduleCommand {
    /// Print the upcoming run times for a cadence
    Preview(SchedulePreviewArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Schedule {
            command: ScheduleCommand::Preview(args),
        } => run_schedule_preview(args),
        Command::Demo(args) => run_demo(args).await,
    }
}
