mod handlers;
mod server;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use slotline_core::infrastructure::Directory;
use slotline_core::infrastructure_in_memory::InMemoryDirectory;
use slotline_core::seed::DirectorySeed;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "slotline",
    about = "Slotline — appointment slot coordination for clinics and doctors",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Slotline HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3200", env = "SLOTLINE_PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0", env = "SLOTLINE_HOST")]
        host: String,

        /// Storage backend: "memory" or "sqlite:<path>"
        #[arg(long, default_value = "memory", env = "SLOTLINE_STORAGE")]
        storage: String,

        /// JSON file with clinics, doctors and patients to load at startup
        #[arg(long, env = "SLOTLINE_DIRECTORY")]
        directory: Option<PathBuf>,

        /// Load the built-in demo clinics and doctors
        #[arg(long, env = "SLOTLINE_SEED_DEMO")]
        seed_demo: bool,

        /// Maximum request body size in bytes
        #[arg(long, default_value = "65536")]
        body_limit: usize,
    },

    /// Validate a directory seed file (JSON on stdin) and print a summary
    Check,

    /// Print version information
    Version,
}

fn load_seed(path: &Path) -> Result<DirectorySeed, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read '{}': {}", path.display(), e))?;
    serde_json::from_str(&raw).map_err(|e| format!("invalid directory file '{}': {}", path.display(), e))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            host,
            storage,
            directory,
            seed_demo,
            body_limit,
        } => {
            let client = match server::create_client(&storage) {
                Ok(client) => client,
                Err(e) => {
                    tracing::error!("{}", e);
                    std::process::exit(1);
                }
            };

            let mut seeds = Vec::new();
            if seed_demo {
                seeds.push(DirectorySeed::demo());
            }
            if let Some(path) = directory {
                match load_seed(&path) {
                    Ok(seed) => seeds.push(seed),
                    Err(e) => {
                        tracing::error!("{}", e);
                        std::process::exit(1);
                    }
                }
            }
            for seed in seeds {
                if let Err(e) = seed.apply(client.directory()) {
                    tracing::error!("Failed to load directory: {}", e);
                    std::process::exit(1);
                }
                tracing::info!(
                    clinics = seed.clinics.len(),
                    doctors = seed.doctors.len(),
                    patients = seed.patients.len(),
                    "Directory loaded"
                );
            }

            if let Err(e) = server::run(&host, port, client, body_limit).await {
                tracing::error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Check => {
            eprintln!("Reading directory seed from stdin...");
            let mut input = String::new();
            if let Err(e) = std::io::Read::read_to_string(&mut std::io::stdin(), &mut input) {
                eprintln!("Failed to read stdin: {}", e);
                std::process::exit(1);
            }

            let seed: DirectorySeed = match serde_json::from_str(&input) {
                Ok(seed) => seed,
                Err(e) => {
                    eprintln!("Invalid JSON directory: {}", e);
                    std::process::exit(1);
                }
            };

            let directory = InMemoryDirectory::new();
            let summary = seed.apply(&directory).and_then(|_| {
                Ok(serde_json::json!({
                    "clinics": directory.clinics()?.len(),
                    "doctors": directory.doctors()?.len(),
                    "patients": seed.patients.len(),
                }))
            });
            match summary {
                Ok(summary) => println!("{:#}", summary),
                Err(e) => {
                    eprintln!("Directory rejected: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Version => {
            println!("slotline {}", env!("CARGO_PKG_VERSION"));
            println!("Appointment slot coordination kernel for clinics and doctors");
        }
    }
}
