use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "hosts-cli")]
#[command(about = "Management CLI for the hosting router admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "HOSTS_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Registry generation, host groups and counts
    Status,
    /// Configuration issues of the current registry
    Issues,
    /// Resolve a host and path to a mount
    Resolve {
        host: String,
        #[arg(long)]
        context_path: Option<String>,
        #[arg(long)]
        path: Option<String>,
    },
    /// Show a mount by identifier
    Mount { identifier: String },
    /// Show a mount by host group, alias and type
    Alias {
        group: String,
        alias: String,
        #[arg(default_value = "live")]
        mount_type: String,
    },
    /// Lock a mount for a user
    Lock { identifier: String, user: String },
    /// Release a user's lock on a mount
    Unlock { identifier: String, user: String },
    /// Mark the registry stale so it is rebuilt on next use
    Invalidate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)),
        Commands::Issues => client.get(format!("{}/admin/issues", cli.url)),
        Commands::Resolve {
            host,
            context_path,
            path,
        } => {
            let mut query = vec![("host", host)];
            if let Some(context_path) = context_path {
                query.push(("context_path", context_path));
            }
            if let Some(path) = path {
                query.push(("path", path));
            }
            client.get(format!("{}/admin/resolve", cli.url)).query(&query)
        }
        Commands::Mount { identifier } => client.get(format!("{}/admin/mounts/{}", cli.url, identifier)),
        Commands::Alias {
            group,
            alias,
            mount_type,
        } => client.get(format!("{}/admin/aliases/{}/{}/{}", cli.url, group, alias, mount_type)),
        Commands::Lock { identifier, user } => client
            .post(format!("{}/admin/mounts/{}/lock", cli.url, identifier))
            .json(&serde_json::json!({ "user": user })),
        Commands::Unlock { identifier, user } => client
            .delete(format!("{}/admin/mounts/{}/lock", cli.url, identifier))
            .json(&serde_json::json!({ "user": user })),
        Commands::Invalidate => client.post(format!("{}/admin/invalidate", cli.url)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await?;

    Ok(())
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

    if status == reqwest::StatusCode::NO_CONTENT {
        println!("{}", status);
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
