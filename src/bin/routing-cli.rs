use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "routing-cli")]
#[command(about = "Management CLI for repository routing", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Service status
    Status,
    /// Routing status of every repository
    List,
    /// Routing status of one repository
    Show { id: String },
    /// Entries of a repository's prefix file
    Prefixes { id: String },
    /// Request a prefix file update
    Update {
        id: String,
        /// Cancel a running update and start over
        #[arg(long)]
        force: bool,
    },
    /// Ask whether a proxy would go remote for a path
    Admit { id: String, path: String },
    /// Repositories with a running update job
    Jobs,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match &cli.command {
        Commands::Status => client.get(format!("{}/admin/status", base)),
        Commands::List => client.get(format!("{}/admin/routing", base)),
        Commands::Show { id } => client.get(format!("{}/admin/routing/{}", base, id)),
        Commands::Prefixes { id } => client.get(format!("{}/admin/routing/{}/prefixes", base, id)),
        Commands::Update { id, force } => client
            .post(format!("{}/admin/routing/{}/update", base, id))
            .query(&[("force", force.to_string())]),
        Commands::Admit { id, path } => client
            .get(format!("{}/admin/routing/{}/admit", base, id))
            .query(&[("path", path)]),
        Commands::Jobs => client.get(format!("{}/admin/routing/jobs", base)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
