use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use rust_decimal::Decimal;
use xconv::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for xconv::AppCommand {
    fn from(cmd: Commands) -> xconv::AppCommand {
        match cmd {
            Commands::Currencies => xconv::AppCommand::Currencies,
            Commands::Convert { amount, from, to } => {
                xconv::AppCommand::Convert(xconv::ConvertRequest { amount, from, to })
            }
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// List supported fiat and crypto currencies
    Currencies,
    /// Convert an amount into one or more currencies
    Convert {
        /// Amount in the source currency
        #[arg(allow_negative_numbers = true)]
        amount: Decimal,

        /// Source currency code, defaults to the last one used
        #[arg(short, long)]
        from: Option<String>,

        /// Comma separated target currency codes, defaults to the last selection
        #[arg(short, long, value_delimiter = ',')]
        to: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => xconv::cli::setup::setup(),
        Some(cmd) => xconv::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
