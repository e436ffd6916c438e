use clap::{CommandFactory, Parser, Subcommand};
use std::process::ExitCode;
use xrate::cli::ui;
use xrate::core::log::init_logging;
use xrate::ConversionError;

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

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Convert an amount between two currencies, e.g. `xrate convert BTC EUR --value 0.5`
    Convert {
        /// The currency to convert from (case-insensitive)
        #[arg(value_parser = currency_code)]
        from: String,
        /// The currency to convert to (case-insensitive)
        #[arg(value_parser = currency_code)]
        to: String,
        /// The amount to convert
        #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
        value: f64,
        /// Print `{"result": ...}` instead of a sentence
        #[arg(long)]
        json: bool,
    },
    /// Display the current crypto and fiat rates
    Rates {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep refreshing rates until interrupted
    Watch,
}

impl From<Commands> for xrate::AppCommand {
    fn from(cmd: Commands) -> xrate::AppCommand {
        match cmd {
            Commands::Convert {
                from,
                to,
                value,
                json,
            } => xrate::AppCommand::Convert {
                from,
                to,
                value,
                json,
            },
            Commands::Rates { json } => xrate::AppCommand::Rates { json },
            Commands::Watch => xrate::AppCommand::Watch,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

/// Currency codes are 3 or 4 characters, uppercased here.
fn currency_code(raw: &str) -> Result<String, String> {
    let code = raw.trim();
    if !(3..=4).contains(&code.chars().count()) {
        return Err(format!("expected a 3 or 4 letter code, got '{raw}'"));
    }
    Ok(code.to_uppercase())
}

/// Client-side mistakes exit with 2, everything else with 1.
fn exit_status_for(error: &anyhow::Error) -> u8 {
    let client_error = error
        .downcast_ref::<ConversionError>()
        .is_some_and(ConversionError::is_client_error);
    if client_error { 2 } else { 1 }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => xrate::cli::setup::setup(),
        Some(cmd) => xrate::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => Cli::command().print_help().map_err(Into::into),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Application failed");
            eprintln!("{}", ui::style_text(&format!("Error: {e:#}"), ui::StyleType::Error));
            ExitCode::from(exit_status_for(&e))
        }
    }
}
