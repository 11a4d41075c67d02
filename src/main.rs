//! Calcbox CLI
//!
//! Entry point for the `calcbox` command-line tool.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use calcbox::client::ApiClient;
use calcbox::config::ClientConfig;
use calcbox::poll::{CancelToken, PollConfig, PollObserver, PollOutcome, Poller};
use calcbox::protocol::{CalculationStatus, InvokeRequest};
use calcbox::run::invoke_and_wait;
use calcbox::structure::{build_scene, MeshKind, StructureDocument};

#[derive(Parser)]
#[command(name = "calcbox")]
#[command(about = "Client for a remote calculation service", version)]
struct Cli {
    /// Path to config file (default: calcbox.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Service base URL, overriding the config file
    #[arg(long, global = true)]
    server: Option<String>,

    /// Print each status snapshot while polling
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered applications
    Apps {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List available commands
    Commands {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List known calculations
    Calculations {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Invoke a command and wait for the calculation to finish
    Invoke {
        /// Application slug
        #[arg(long)]
        app: String,

        /// Application version
        #[arg(long, default_value = "latest")]
        app_version: String,

        /// Command name
        #[arg(long)]
        command: String,

        /// Command argument as key=value (repeatable); values parse as JSON
        /// where possible, otherwise as strings
        #[arg(long = "arg", value_name = "KEY=VALUE")]
        args: Vec<String>,

        /// Submit only; print the calculation handle and exit
        #[arg(long)]
        no_wait: bool,

        /// Output the final report in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Fetch one status snapshot for a calculation
    Status {
        /// Calculation handle
        id: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Poll a calculation until it reaches a terminal status
    Watch {
        /// Calculation handle
        id: String,

        /// Output the final snapshot in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Validate a structure file and summarise its scene
    Structure {
        /// Path to structure.json
        path: PathBuf,

        /// Output the scene summary in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref(), cli.server.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Apps { json } => run_apps(&config, json),
        Commands::Commands { json } => run_commands(&config, json),
        Commands::Calculations { json } => run_calculations(&config, json),
        Commands::Invoke {
            app,
            app_version,
            command,
            args,
            no_wait,
            json,
        } => run_invoke(&config, &app, &app_version, &command, &args, no_wait, json, cli.verbose),
        Commands::Status { id, json } => run_status(&config, &id, json),
        Commands::Watch { id, json } => run_watch(&config, &id, json, cli.verbose),
        Commands::Structure { path, json } => run_structure(&path, json),
    }
}

fn load_config(
    path: Option<&std::path::Path>,
    server: Option<&str>,
) -> Result<ClientConfig, String> {
    let mut config = match path {
        Some(path) => ClientConfig::from_file(path).map_err(|e| e.to_string())?,
        None => ClientConfig::load_or_default(std::path::Path::new("calcbox.toml"))
            .map_err(|e| e.to_string())?,
    };
    if let Some(url) = server {
        config.server_url = url.to_string();
    }
    Ok(config)
}

fn connect(config: &ClientConfig) -> ApiClient {
    match ApiClient::from_config(config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error creating client: {}", e);
            process::exit(1);
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn run_apps(config: &ClientConfig, json_output: bool) {
    let client = connect(config);
    match client.list_applications() {
        Ok(apps) => {
            if json_output {
                print_json(&apps);
            } else if apps.is_empty() {
                println!("No applications registered.");
            } else {
                println!("Registered applications ({} total):\n", apps.len());
                for app in apps {
                    let version = app.version.as_deref().unwrap_or("unversioned");
                    println!("  {} ({})", app.name, version);
                    if let Some(ref slug) = app.slug {
                        println!("    Slug: {}", slug);
                    }
                    if let Some(ref description) = app.description {
                        println!("    {}", description);
                    }
                    println!();
                }
            }
        }
        Err(e) => {
            eprintln!("Error listing applications: {}", e);
            process::exit(1);
        }
    }
}

fn run_commands(config: &ClientConfig, json_output: bool) {
    let client = connect(config);
    match client.list_commands() {
        Ok(commands) => {
            if json_output {
                print_json(&commands);
            } else if commands.is_empty() {
                println!("No commands available.");
            } else {
                println!("Available commands ({} total):\n", commands.len());
                for command in commands {
                    println!("  {}", command.name);
                    for (name, dtype) in &command.parameters {
                        println!("    {}: {}", name, dtype);
                    }
                    println!();
                }
            }
        }
        Err(e) => {
            eprintln!("Error listing commands: {}", e);
            process::exit(1);
        }
    }
}

fn run_calculations(config: &ClientConfig, json_output: bool) {
    let client = connect(config);
    match client.list_calculations() {
        Ok(calculations) => {
            if json_output {
                print_json(&calculations);
            } else if calculations.is_empty() {
                println!("No calculations recorded.");
            } else {
                for calculation in calculations {
                    let status = calculation
                        .status
                        .as_ref()
                        .map(|s| s.as_str())
                        .unwrap_or("unknown");
                    match calculation.started_at {
                        Some(started) => println!(
                            "  {}  {}  (started {})",
                            calculation.calculation_id, status, started
                        ),
                        None => println!("  {}  {}", calculation.calculation_id, status),
                    }
                }
            }
        }
        Err(e) => {
            eprintln!("Error listing calculations: {}", e);
            process::exit(1);
        }
    }
}

/// Parse a `key=value` argument; the value side parses as JSON where
/// possible, otherwise stays a string
fn parse_arg(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("Invalid argument '{}': expected key=value", raw))?;
    if key.is_empty() {
        return Err(format!("Invalid argument '{}': empty key", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Observer printing poll progress to stderr
struct ProgressObserver {
    verbose: bool,
}

impl PollObserver for ProgressObserver {
    fn on_snapshot(&mut self, snapshot: &CalculationStatus) {
        if self.verbose {
            eprintln!("  status: {}", snapshot.status.as_str());
        }
    }

    fn on_elapsed(&mut self, elapsed: Duration) {
        if self.verbose {
            eprintln!("  still running ({}s elapsed)", elapsed.as_secs());
        }
    }

    fn on_failure(&mut self, message: &str) {
        eprintln!("{}", message);
    }
}

/// Install a Ctrl-C handler that flips the poller's cancellation token
fn wire_interrupt(token: CancelToken) {
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("Interrupt received, stopping after the current poll...");
        token.cancel();
    }) {
        eprintln!("Warning: could not install interrupt handler: {}", e);
    }
}

fn poll_config(config: &ClientConfig) -> PollConfig {
    PollConfig {
        interval: config.poll_interval(),
        max_polls: config.max_polls,
    }
}

#[allow(clippy::too_many_arguments)]
fn run_invoke(
    config: &ClientConfig,
    app: &str,
    app_version: &str,
    command: &str,
    raw_args: &[String],
    no_wait: bool,
    json_output: bool,
    verbose: bool,
) {
    let mut request = InvokeRequest::new(app, app_version, command);
    for raw in raw_args {
        match parse_arg(raw) {
            Ok((key, value)) => request = request.with_arg(&key, value),
            Err(e) => {
                eprintln!("{}", e);
                process::exit(1);
            }
        }
    }

    let client = connect(config);

    if no_wait {
        match client.invoke(&request) {
            Ok(receipt) => {
                if json_output {
                    print_json(&json!({"calculation_id": receipt.calculation_id, "msg": receipt.msg}));
                } else {
                    println!("{}", receipt.calculation_id);
                }
            }
            Err(e) => {
                eprintln!("Error invoking command: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    let poller = Poller::with_config(&client, poll_config(config));
    wire_interrupt(poller.token());
    let mut observer = ProgressObserver { verbose };

    let report = invoke_and_wait(&client, &request, &poller, &mut observer, |receipt| {
        eprintln!("Submitted calculation {}", receipt.calculation_id);
    });

    match report {
        Ok(report) => {
            if json_output {
                print_json(&report);
            } else {
                println!("Calculation {}: {}", report.calculation_id, report.disposition);
                if let Some(ref stdout) = report.stdout {
                    print!("{}", stdout);
                }
                if let Some(ref result) = report.result {
                    println!("Result: {}", result);
                }
                if let Some(ref error) = report.error {
                    eprintln!("Error: {}", error);
                }
                println!("Finished in {}ms", report.duration_ms);
            }
            exit_for_disposition(&report.disposition);
        }
        Err(e) => {
            eprintln!("Error invoking command: {}", e);
            process::exit(1);
        }
    }
}

fn run_status(config: &ClientConfig, id: &str, json_output: bool) {
    let client = connect(config);
    match client.calculation_status(id) {
        Ok(snapshot) => {
            if json_output {
                print_json(&snapshot);
            } else {
                println!("{}  {}", snapshot.calculation_id, snapshot.status.as_str());
                if let Some(ref error) = snapshot.error {
                    println!("  error: {}", error);
                }
            }
        }
        Err(e) => {
            eprintln!("Error fetching status: {}", e);
            process::exit(1);
        }
    }
}

fn run_watch(config: &ClientConfig, id: &str, json_output: bool, verbose: bool) {
    let client = connect(config);
    let poller = Poller::with_config(&client, poll_config(config));
    wire_interrupt(poller.token());
    let mut observer = ProgressObserver { verbose };

    let outcome = poller.wait(id, &mut observer);
    let disposition = match &outcome {
        PollOutcome::Succeeded(_) => "successful",
        PollOutcome::ServiceError(_) => "error",
        PollOutcome::FetchFailed(_) => "fetch_failed",
        PollOutcome::Cancelled => "cancelled",
        PollOutcome::AttemptsExhausted { .. } => "attempts_exhausted",
    };

    if json_output {
        match outcome.snapshot() {
            Some(snapshot) => print_json(snapshot),
            None => print_json(&json!({"calculation_id": id, "disposition": disposition})),
        }
    } else {
        println!("Calculation {}: {}", id, disposition);
        if let Some(result) = outcome.result() {
            println!("Result: {}", result);
        }
    }
    exit_for_disposition(disposition);
}

fn run_structure(path: &std::path::Path, json_output: bool) {
    let document = match StructureDocument::from_file(path) {
        Ok(document) => document,
        Err(e) => {
            eprintln!("Invalid structure file: {}", e);
            process::exit(1);
        }
    };

    let scene = build_scene(&document);
    let count = |kind: MeshKind| scene.nodes.iter().filter(|n| n.kind == kind).count();
    let spheres = count(MeshKind::Sphere);
    let rings = count(MeshKind::RingMarker);
    let bonds = count(MeshKind::BondCylinder);

    if json_output {
        print_json(&json!({
            "atoms": document.atoms.len(),
            "bonds": document.bonds.len(),
            "colours": document.colours,
            "nodes": {
                "spheres": spheres,
                "ring_markers": rings,
                "bond_cylinders": bonds,
            },
            "camera_position": scene.camera_position.to_array(),
            "root_rotation": scene.root_rotation.to_array(),
        }));
    } else {
        println!("Structure valid: {}", path.display());
        println!();
        println!("  Atoms: {}", document.atoms.len());
        println!("  Bonds: {}", document.bonds.len());
        println!("  Colours: {}", document.colours.join(", "));
        println!(
            "  Scene nodes: {} spheres, {} ring markers, {} bond cylinders",
            spheres, rings, bonds
        );
    }
}

fn exit_for_disposition(disposition: &str) -> ! {
    match disposition {
        "successful" => process::exit(0),
        "cancelled" => process::exit(130),
        _ => process::exit(2),
    }
}
