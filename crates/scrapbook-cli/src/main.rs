use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "scrapbook", version, about = "Scrapbook question queue and session timer")]
struct Cli {
    /// Vault directory holding the questions file and notes
    #[arg(long, global = true, env = "SCRAPBOOK_VAULT", default_value = ".")]
    vault: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the control API server and session timers
    Serve(commands::serve::ServeArgs),
    /// Settings management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print the parsed question queue as JSON
    Queue,
    /// List markdown documents in the vault
    Files,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Serve(args) => commands::serve::run(&cli.vault, args),
        Commands::Config { action } => commands::config::run(action),
        Commands::Queue => commands::queue::show(&cli.vault),
        Commands::Files => commands::queue::files(&cli.vault),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
