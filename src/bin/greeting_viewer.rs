use std::process::ExitCode;

use clap::Parser;
use greetshell::viewer::{GreetingViewer, HttpGreetingSource};
use tracing_subscriber::EnvFilter;

/// Shows the server's current greeting.
#[derive(Debug, Parser)]
#[command(name = "greeting-viewer", version)]
struct Args {
    #[arg(long, env = "GREETING_VIEWER_BASE_URL", default_value = "http://127.0.0.1:8080")]
    base_url: String,

    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let default_filter = if args.debug { "greetshell=debug" } else { "greetshell=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let source = match HttpGreetingSource::new(&args.base_url) {
        Ok(source) => source,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut viewer = GreetingViewer::mount(source);
    println!("{}", viewer.render());
    if viewer.changed().await {
        println!("{}", viewer.render());
    }
    ExitCode::SUCCESS
}
