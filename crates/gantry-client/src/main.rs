use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use gantry_client::GantryClient;
use gantry_config::{Config, SocketEndpoint};

/// Command-line control client for the gantry hardware daemon.
#[derive(Debug, Parser)]
#[command(name = "gantry", version, about)]
struct Cli {
    /// Daemon socket URL, e.g. tcp://127.0.0.1:8989 or unix:///run/gantryd.sock.
    #[arg(long, value_name = "URL")]
    connect: Option<SocketEndpoint>,

    /// Daemon configuration file to read the socket from.
    #[arg(long, value_name = "FILE", conflicts_with = "connect")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Calls a remote method and prints its result as JSON.
    Call {
        /// Endpoint name, e.g. psu or gantry.
        endpoint: String,
        /// Wire method name, e.g. get_voltage.
        method: String,
        /// Positional arguments; each parsed as JSON, falling back to a
        /// plain string.
        args: Vec<String>,
    },
    /// Claims the operator lock for this invocation's caller identity.
    Claim {
        /// Take the lock away from the current holder.
        #[arg(long)]
        force: bool,
    },
    /// Releases the operator lock.
    Release,
    /// Prints whether this caller identity currently holds the lock.
    Operator,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("gantry: {error}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let endpoint = resolve_endpoint(&cli)?;
    let mut client = GantryClient::connect(&endpoint)?;

    match cli.command {
        Command::Call {
            endpoint,
            method,
            args,
        } => {
            let args: Vec<Value> = args.iter().map(|arg| parse_arg(arg)).collect();
            let value = client.call(&endpoint, &method, args, Map::new())?;
            if !value.is_null() {
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
        }
        Command::Claim { force } => client.claim_operator(force)?,
        Command::Release => client.release_operator()?,
        Command::Operator => println!("{}", client.is_operator()?),
    }
    Ok(())
}

fn resolve_endpoint(cli: &Cli) -> Result<SocketEndpoint, Box<dyn std::error::Error>> {
    if let Some(endpoint) = &cli.connect {
        return Ok(endpoint.clone());
    }
    if let Some(path) = &cli.config {
        return Ok(Config::load(path)?.listen);
    }
    Ok(Config::default().listen)
}

fn parse_arg(arg: &str) -> Value {
    serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.to_string()))
}
