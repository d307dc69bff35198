//! presence-daemon: single-writer presence session tracker.
//!
//! Reads newline-delimited JSON requests on stdin and answers each with one
//! JSON line on stdout. Requests are handled strictly in arrival order.
//!
//! ## Subcommands
//!
//! - `run`: Consume events and report requests until stdin closes
//! - `report [@name]`: Render a report from the state file and exit

mod handler;
mod input;
mod logging;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use presence_core::{PresenceTracker, TrackerConfig};
use presence_protocol::Response;
use tracing::{error, info, warn};

use input::Inbound;

#[derive(Parser)]
#[command(name = "presence-daemon")]
#[command(about = "Presence session tracker")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.presence-tracker/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process requests from stdin until it closes
    Run,

    /// Print a report and exit
    Report {
        /// Identity name reference; omit for the aggregate report
        #[arg(value_name = "NAME")]
        identity: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match TrackerConfig::load(cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("presence-daemon: failed to load config: {}", err);
            process::exit(1);
        }
    };

    let _logging_guard = logging::init(config.log_dir.as_deref());

    let directory = config.directory();
    let tracker = match PresenceTracker::start(&config, &directory) {
        Ok(tracker) => tracker,
        Err(err) => {
            error!(error = %err, "Failed to start tracker");
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Run => run(&tracker),
        Commands::Report { identity } => match tracker.report(identity.as_deref()) {
            Ok(outcome) => {
                println!("{}\n\n{}", outcome.caption(), outcome.text());
            }
            Err(err) => {
                error!(error = %err, "Failed to generate report");
                process::exit(1);
            }
        },
    }
}

fn run(tracker: &PresenceTracker) {
    info!(tracked = tracker.tracked_count(), "presence-daemon started");

    let inbound = input::spawn_reader(io::BufReader::new(io::stdin()));
    let stdout = io::stdout();

    for item in inbound {
        let response = match item {
            Inbound::Request(request) => handler::handle_request(request, tracker),
            Inbound::Rejected(err) => {
                warn!(code = %err.code, message = %err.message, "Rejected request");
                Response::failure(None, err)
            }
        };
        if let Err(err) = write_response(&mut stdout.lock(), &response) {
            warn!(error = %err, "Failed to write response, stopping");
            break;
        }
    }

    info!("Input closed, presence-daemon stopping");
}

fn write_response<W: Write>(writer: &mut W, response: &Response) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, response)?;
    writer.write_all(b"\n")?;
    writer.flush()
}
