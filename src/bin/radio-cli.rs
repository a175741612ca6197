use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "radio-cli")]
#[command(about = "Query a running radio-gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:9000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show listener and pending-removal counts
    Status,
    /// Print only the current listener count
    Listeners,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/status", cli.url)).send().await?;
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    match cli.command {
        Commands::Status => println!("{}", serde_json::to_string_pretty(&json)?),
        Commands::Listeners => println!("{}", json["listeners"]),
    }

    Ok(())
}
