//! Clap derive structures for the `chatbridge` binary.

use std::path::PathBuf;

use clap::Parser;

use chatbridge_config::Config;

/// chatbridge -- talk to Lingr rooms from any IRC client
#[derive(Debug, Parser)]
#[command(
    name = "chatbridge",
    version,
    about = "IRC gateway for Lingr chat rooms",
    long_about = "Runs a local IRC server. Each client that registers with\n\
        PASS/NICK/USER is logged into the chat backend with those\n\
        credentials and sees its rooms as IRC channels."
)]
pub struct Cli {
    /// Config file (default: platform config dir)
    #[arg(long, short = 'c', env = "CHATBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, short = 'l')]
    pub listen: Option<String>,

    /// Port to listen on
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Backlog messages to replay per room
    #[arg(long, short = 'b')]
    pub backlog: Option<usize>,

    /// Backend application key
    #[arg(long, env = "CHATBRIDGE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Close clients on the first backend failure instead of retrying
    #[arg(long)]
    pub no_reconnect: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub print_config: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Layer command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(ref listen) = self.listen {
            config.listen.clone_from(listen);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(backlog) = self.backlog {
            config.backlog_depth = backlog;
        }
        if let Some(ref key) = self.api_key {
            config.api_key = Some(key.clone());
        }
        if self.no_reconnect {
            config.auto_reconnect = false;
        }
    }
}
