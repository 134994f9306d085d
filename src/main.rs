//! Hosting router
//!
//! Resolves a request's host, port, context path and path to a mount of
//! a hierarchical virtual host configuration.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────────┐
//!                 │                      HOSTING ROUTER                       │
//!                 │                                                           │
//!   hosts.toml ───┼─▶ config ──▶ builder ──▶ VirtualHosts ◀── HostingManager  │
//!   (watched)     │   loader     (issues)     registry         (swap, stale)  │
//!                 │   validate                   │                            │
//!                 │                              ▼                            │
//!   Host header ──┼──────────────────────▶ match_virtual_host ──▶ cache       │
//!                 │                              │                            │
//!                 │                              ▼                            │
//!                 │                         match_mount ──▶ ResolvedMount     │
//!                 │                                                           │
//!                 │  ┌─────────────────────────────────────────────────────┐ │
//!                 │  │ admin API (axum) │ observability │ lifecycle/signals │ │
//!                 │  └─────────────────────────────────────────────────────┘ │
//!                 └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Commands
//! - `check`: build the configuration and print every issue
//! - `resolve`: resolve one host (and path) and print the mount as JSON
//! - `serve`: admin API, hot reload and metrics until shutdown

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use hosting_router::config::loader::load_config;
use hosting_router::hosting::{BuildPolicy, Builder, Severity};
use hosting_router::lifecycle::startup;
use hosting_router::observability::logging::init_tracing;

#[derive(Parser)]
#[command(name = "hosting-router")]
#[command(about = "Virtual host and mount resolution", long_about = None)]
struct Cli {
    /// Hosting configuration file.
    #[arg(short, long, default_value = "hosts.toml")]
    config: PathBuf,

    /// Reject configurations with any error, not just fatal ones.
    #[arg(long)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the configuration and report its issues
    Check,
    /// Resolve a host and request path to a mount
    Resolve {
        /// Host header value, optionally with `:port`
        host: String,
        #[arg(long)]
        context_path: Option<String>,
        #[arg(long, default_value = "/")]
        path: String,
    },
    /// Run the admin API with hot reload
    Serve,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let policy = if cli.strict {
        BuildPolicy::Strict
    } else {
        BuildPolicy::Lenient
    };

    let config = load_config(&cli.config)?;
    init_tracing(&config.observability);

    tracing::info!(
        config = %cli.config.display(),
        host_groups = config.host_groups.len(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Check => match Builder::new(&config).policy(policy).build(1) {
            Ok(hosts) => {
                for issue in hosts.issues() {
                    println!("{}", issue);
                }
                println!(
                    "ok: {} host groups, {} virtual hosts, {} mounts, {} issues",
                    hosts.host_group_names().len(),
                    hosts.tree().hosts().len(),
                    hosts.tree().mounts().len(),
                    hosts.issues().len()
                );
                Ok(ExitCode::SUCCESS)
            }
            Err(failure) => {
                for issue in &failure.issues {
                    println!("{}", issue);
                }
                let blocking = failure.at_least(Severity::Error).count();
                eprintln!("rejected: {} blocking issues", blocking);
                Ok(ExitCode::FAILURE)
            }
        },
        Commands::Resolve {
            host,
            context_path,
            path,
        } => {
            let hosts = Builder::new(&config).policy(policy).build(1)?;
            match hosts.match_mount(&host, context_path.as_deref(), &path)? {
                Some(mount) => {
                    println!("{}", serde_json::to_string_pretty(&mount.summary())?);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    eprintln!("no mount for host '{}' and path '{}'", host, path);
                    Ok(ExitCode::from(2))
                }
            }
        }
        Commands::Serve => {
            startup::serve(&cli.config, config, policy).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
