use crate::quote::{run_quote, run_tiers, QuoteArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use enrollment_pay::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Enrollment Payments",
    about = "Run the enrollment payment service or price program tiers from the command line",
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
    /// Price a tier with optional extra seats and support hours
    Quote(QuoteArgs),
    /// List the configured program tiers
    Tiers,
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
        Command::Quote(args) => run_quote(args),
        Command::Tiers => run_tiers(),
    }
}
