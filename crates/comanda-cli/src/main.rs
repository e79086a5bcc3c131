//! Comanda CLI — command-line interface for the workflow engine.
//!
//! Reuses the same core domain logic (comanda-core) and HTTP bootstrap
//! (comanda-server) that back the streaming API.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "comanda", version, about = "Comanda — compose LLM workflows over files, URLs, and databases")]
pub struct Cli {
    /// Enable verbose output (echo prompts and responses).
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Enable debug-level logging.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one or more workflow YAML files in sequence.
    Process {
        /// Workflow YAML files to run, in order.
        files: Vec<String>,
    },

    /// Start the Comanda HTTP server.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long)]
        port: Option<u16>,
        /// Password to decrypt the config store, if encrypted.
        #[arg(long, env = "COMANDA_PASSWORD")]
        password: Option<String>,
    },

    /// Inspect or modify the configuration store.
    Configure {
        /// Print the current configuration (secrets redacted).
        #[arg(long)]
        list: bool,
        /// Edit server settings (port, data dir, bearer token, CORS).
        #[arg(long)]
        server: bool,
        /// Encrypt the config file in place.
        #[arg(long)]
        encrypt: bool,
        /// Remove a configured model by name.
        #[arg(long, value_name = "MODEL")]
        remove: Option<String>,
        /// Replace a provider's API key.
        #[arg(long, value_name = "PROVIDER")]
        update_key: Option<String>,
    },

    /// Generate a workflow skeleton from a natural-language prompt.
    Generate {
        /// Output YAML file path.
        out: String,
        /// Prompt describing the workflow to generate.
        prompt: String,
    },

    /// Print version information.
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "comanda_core=debug,comanda_server=debug,comanda_cli=debug"
    } else if cli.verbose {
        "comanda_core=info,comanda_server=info,comanda_cli=info"
    } else {
        "comanda_core=warn,comanda_server=warn,comanda_cli=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .init();

    let result = match cli.command {
        Commands::Process { files } => commands::process::run(&files, cli.verbose).await,
        Commands::Serve { host, port, password } => commands::serve::run(host, port, password).await,
        Commands::Configure { list, server, encrypt, remove, update_key } => {
            commands::configure::run(list, server, encrypt, remove.as_deref(), update_key.as_deref()).await
        }
        Commands::Generate { out, prompt } => commands::generate::run(&out, &prompt).await,
        Commands::Version => {
            println!("comanda {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
