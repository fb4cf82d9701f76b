use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "scheme",
    about = "Serve custom-scheme requests through pull-based responders",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive one request through the responders and report what came back.
    ///
    /// Paused reads on the deferred target are resumed by a background
    /// trigger every --resume-interval milliseconds.
    Fetch {
        /// Request URL, e.g. client://tests/handler.html
        url: String,
        /// Request method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        /// Request header as "Name: value" (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        /// Request body
        #[arg(short, long)]
        data: Option<String>,
        /// Bytes requested per read
        #[arg(long, default_value = "4096")]
        chunk_size: usize,
        /// Path to scheme.toml (default: built-in client://tests/ setup)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Resume trigger interval in milliseconds
        #[arg(long, default_value = "50")]
        resume_interval: u64,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
        /// Write the response body to this file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Generate a scheme.toml scaffold
    Init {
        #[arg(short, long, default_value = ".")]
        path: String,
        /// Scheme name to register
        #[arg(short, long, default_value = "client")]
        scheme: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scheme=info".parse()?)
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            url,
            method,
            headers,
            data,
            chunk_size,
            config,
            resume_interval,
            format,
            out,
        } => {
            let args = commands::fetch::FetchArgs {
                url,
                method,
                headers,
                data,
                chunk_size,
                config,
                resume_interval,
                out,
            };
            commands::fetch::fetch(args, &format).await
        }
        Commands::Init { path, scheme } => commands::init::init(&path, &scheme),
    }
}
