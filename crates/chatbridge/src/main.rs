mod cli;
mod error;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chatbridge_config::Config;
use chatbridge_irc::Listener;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = load_config(&cli)?;
    cli.apply(&mut config);

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let gateway = config.to_gateway_config()?;
    let listener = Listener::bind(gateway).await?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

    listener.serve(shutdown).await?;
    info!("gateway stopped");
    Ok(())
}

/// An explicit `--config` must exist; the default location may not.
fn load_config(cli: &Cli) -> Result<Config, CliError> {
    match cli.config {
        Some(ref path) => {
            if !path.is_file() {
                return Err(CliError::NoConfig {
                    path: path.display().to_string(),
                });
            }
            Ok(chatbridge_config::load_from(path)?)
        }
        None => Ok(chatbridge_config::load_config()?),
    }
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        return;
    }
    info!("interrupt received, shutting down");
    shutdown.cancel();
}
