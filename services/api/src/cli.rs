use crate::demo::{run_demo, run_score};
use crate::server;
use clap::{Args, Parser, Subcommand};
use crediscore::bureau::domain::Provider;
use crediscore::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Crediscore",
    about = "Run the credit bureau scoring service or score documents from the command line",
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
    /// Score a single document against the demo transport and print the result
    Score(ScoreArgs),
    /// Walk every provider through the scoring pipeline with sample documents
    Demo,
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

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Document to score (cédula, with or without punctuation)
    pub(crate) documento: String,
    /// Provider to fetch from
    #[arg(long, value_parser = parse_provider, default_value = "equifax")]
    pub(crate) provider: Provider,
    /// Print the historical flat response instead of the full result
    #[arg(long)]
    pub(crate) legacy: bool,
    /// Skip the score cache
    #[arg(long)]
    pub(crate) force_refresh: bool,
    /// Use the provider's sandbox environment
    #[arg(long)]
    pub(crate) sandbox: bool,
}

fn parse_provider(raw: &str) -> Result<Provider, String> {
    Provider::from_tag(raw).ok_or_else(|| format!("unknown provider '{raw}'"))
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Score(args) => run_score(args).await,
        Command::Demo => run_demo().await,
    }
}
