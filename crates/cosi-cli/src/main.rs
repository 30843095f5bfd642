//! CoSi CLI
//!
//! Collectively sign a file, verify a signature, probe the liveness of a
//! cosigning group, or run a cosigning server:
//! - `cosi sign FILE` asks the group for a collective signature
//! - `cosi verify FILE` checks a signature against the group
//! - `cosi check` runs a probe round with every member and pair
//! - `cosi server` serves as one member of a collective

mod config;

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use cosi_core::service::SignResponse;
use cosi_core::tree::{Roster, ServerIdentity};
use cosi_net::{CosiClient, CosiNode};

use config::{GroupConfig, ServerConfig, DEFAULT_GROUP_FILE, DEFAULT_SERVER_CONFIG};

/// CoSi - collective signing
#[derive(Parser)]
#[command(name = "cosi")]
#[command(about = "Collectively sign a file or verify its signature")]
#[command(version)]
struct Cli {
    /// Debug level: 0 for quiet, 5 for maximal
    #[arg(short, long, global = true, default_value_t = 1)]
    debug: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collectively sign a file and write the signature to standard output
    #[command(visible_alias = "s")]
    Sign {
        /// File to sign
        file: PathBuf,

        /// CoSi group definition file
        #[arg(short, long, default_value = DEFAULT_GROUP_FILE)]
        group: PathBuf,

        /// Write the signature to this file instead of standard output
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Verify the collective signature of a file
    #[command(visible_alias = "v")]
    Verify {
        /// File whose signature to verify
        file: PathBuf,

        /// CoSi group definition file
        #[arg(short, long, default_value = DEFAULT_GROUP_FILE)]
        group: PathBuf,

        /// Read the signature from this file instead of standard input
        #[arg(short, long)]
        signature: Option<PathBuf>,
    },

    /// Check if the servers in the group definition are up and running
    #[command(visible_alias = "c")]
    Check {
        /// CoSi group definition file
        #[arg(short, long, default_value = DEFAULT_GROUP_FILE)]
        group: PathBuf,
    },

    /// Act as a cosigning server
    Server {
        /// Server configuration file
        #[arg(short, long, default_value = DEFAULT_SERVER_CONFIG)]
        config: PathBuf,

        #[command(subcommand)]
        command: Option<ServerCommands>,
    },
}

#[derive(Subcommand)]
enum ServerCommands {
    /// Create the configuration for a new server
    #[command(visible_alias = "s")]
    Setup {
        /// host:port the server listens on and advertises to the group
        #[arg(long)]
        address: String,

        /// Free-form server description
        #[arg(long, default_value = "")]
        description: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = match cli.debug {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    if let Err(err) = run(cli.command).await {
        eprintln!("[-] {err:#}");
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Sign { file, group, out } => sign_file(&file, &group, out.as_deref()).await,
        Commands::Verify {
            file,
            group,
            signature,
        } => verify_file(&file, &group, signature.as_deref()).await,
        Commands::Check { group } => check_group(&group).await,
        Commands::Server { config, command } => match command {
            Some(ServerCommands::Setup {
                address,
                description,
            }) => setup_server(&config, address, description),
            None => run_server(&config).await,
        },
    }
}

/// Request a collective signature over a file and write the JSON
/// signature object
async fn sign_file(file: &Path, group: &Path, out: Option<&Path>) -> Result<()> {
    let content = std::fs::read(file)
        .with_context(|| format!("couldn't read file to be signed: {}", file.display()))?;
    let roster = GroupConfig::load(group)?.roster()?;

    info!(file = %file.display(), cosigners = roster.len(), "requesting signature");
    let response = CosiClient::new()
        .sign(&roster, &content)
        .await
        .context("couldn't create signature")?;
    // never hand out a signature we would not accept back
    response
        .verify(&roster.publics(), &content)
        .context("group returned an invalid signature")?;

    let json = serde_json::to_string_pretty(&response)?;
    match out {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("couldn't write signature to {}", path.display()))?;
            info!(out = %path.display(), "signature written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Check a file against its JSON signature object
async fn verify_file(file: &Path, group: &Path, signature: Option<&Path>) -> Result<()> {
    let content = std::fs::read(file)
        .with_context(|| format!("couldn't open message file: {}", file.display()))?;
    let signature_bytes = match signature {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("couldn't read signature file: {}", path.display()))?,
        None => {
            println!("[+] Reading signature from standard input ...");
            let mut buffer = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buffer)
                .context("couldn't read signature from standard input")?;
            buffer
        }
    };
    let response: SignResponse =
        serde_json::from_slice(&signature_bytes).context("couldn't decode signature object")?;
    let roster = GroupConfig::load(group)?.roster()?;

    response
        .verify(&roster.publics(), &content)
        .context("signature verification failed")?;
    println!("[+] OK: Signature is valid.");
    Ok(())
}

/// Probe every single member and every ordered pair of the group with a
/// signing round over the literal statement `verification`
async fn check_group(group: &Path) -> Result<()> {
    let group_config = GroupConfig::load(group)?;
    let roster = group_config.roster()?;
    let names = group_config.names();
    let client = CosiClient::new();

    println!("[+] Checking the availability and responsiveness of the servers in the group...");
    let mut failures = 0usize;
    for index in 0..roster.len() {
        if !check_subset(&client, &roster, &names, &[index]).await {
            failures += 1;
        }
    }
    if roster.len() > 1 {
        for first in 0..roster.len() {
            for second in first + 1..roster.len() {
                if !check_subset(&client, &roster, &names, &[first, second]).await {
                    failures += 1;
                }
                if !check_subset(&client, &roster, &names, &[second, first]).await {
                    failures += 1;
                }
            }
        }
    }
    if failures > 0 {
        bail!("{failures} check(s) failed");
    }
    Ok(())
}

/// One probe round over the listed roster members, leader first
async fn check_subset(
    client: &CosiClient,
    roster: &Roster,
    names: &[String],
    indices: &[usize],
) -> bool {
    let servers: Vec<ServerIdentity> = indices
        .iter()
        .filter_map(|&index| roster.get(index).cloned())
        .collect();
    let subset = match Roster::new(servers) {
        Ok(subset) => subset,
        Err(_) => return false,
    };
    let label: Vec<&str> = indices.iter().map(|&index| names[index].as_str()).collect();
    print!("[+] Checking server(s) {}: ", label.join(" "));

    let message = b"verification";
    let outcome = match client.sign(&subset, message).await {
        Ok(response) => response.verify(&subset.publics(), message),
        Err(err) => Err(err),
    };
    match outcome {
        Ok(()) => {
            println!("Success");
            true
        }
        Err(err) => {
            println!("Error: {err}");
            false
        }
    }
}

/// Run a cosigning server from its configuration file
async fn run_server(config_path: &Path) -> Result<()> {
    if !config_path.exists() {
        bail!(
            "configuration file does not exist: {}. Use `cosi server setup` to create one",
            config_path.display()
        );
    }
    let config = ServerConfig::load(config_path)?;
    let (private, public) = config.keypair()?;
    let node = CosiNode::new(private, public);
    let listener = tokio::net::TcpListener::bind(&config.address)
        .await
        .with_context(|| format!("couldn't bind {}", config.address))?;
    println!("[+] CoSi server listening on {}", config.address);
    node.serve(listener).await?;
    Ok(())
}

/// Generate a fresh server keypair and configuration file
fn setup_server(config_path: &Path, address: String, description: String) -> Result<()> {
    if config_path.exists() {
        bail!(
            "configuration file already exists: {}",
            config_path.display()
        );
    }
    let config = ServerConfig::generate(address, description);
    config.save(config_path)?;
    println!(
        "[+] Server configuration written to {}",
        config_path.display()
    );
    println!("[+] Add this record to the group definition file:");
    let snippet = toml::to_string_pretty(&GroupConfig {
        servers: vec![config.group_record()],
    })?;
    println!("{snippet}");
    Ok(())
}
