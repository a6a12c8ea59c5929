use clap::{Parser, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use flockmatch::config::{MatchmakingConfig, ServerConfig};
use flockmatch::matchmaking::{CancelResult, Faction, MatchRequest, QueueDepth};
use flockmatch::node::Node;
use flockmatch::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "flockmatch")]
#[command(version)]
#[command(about = "Sheep-versus-Wolf matchmaking server")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the matchmaking server
    Server(ServerArgs),

    /// Match request commands
    Match {
        #[command(flatten)]
        client: ClientArgs,

        #[command(subcommand)]
        command: MatchCommands,
    },

    /// Queue inspection commands
    Queue {
        #[command(flatten)]
        client: ClientArgs,

        #[command(subcommand)]
        command: QueueCommands,
    },
}

// =============================================================================
// Server Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ServerArgs {
    /// Port for the HTTP API
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// How often the driver loop flushes queued jobs, in milliseconds
    #[arg(long, default_value = "50")]
    driver_interval_ms: u64,

    /// Rank-point window for a freshly queued request
    #[arg(long, default_value = "50")]
    window_start: i64,

    /// Rank points added to the window per widening interval
    #[arg(long, default_value = "25")]
    widen_step: i64,

    /// Milliseconds between window widenings
    #[arg(long, default_value = "5000")]
    widen_interval_ms: u64,

    /// Largest rank-point window, however long a player waits
    #[arg(long, default_value = "400")]
    max_window: i64,

    /// Milliseconds after which an unmatched request expires
    #[arg(long, default_value = "60000")]
    max_wait_ms: u64,

    /// Milliseconds between matching sweeps
    #[arg(long, default_value = "500")]
    sweep_interval_ms: u64,

    /// Rank points won or lost between equally ranked players
    #[arg(long, default_value = "20")]
    rank_delta_base: i64,

    /// Rank gap worth one extra point of win/loss adjustment
    #[arg(long, default_value = "25")]
    rank_delta_divisor: i64,

    /// Seconds finished outcomes stay queryable
    #[arg(long, default_value = "600")]
    outcome_retention_secs: u64,
}

impl ServerArgs {
    fn server_config(&self) -> Result<ServerConfig, std::net::AddrParseError> {
        let listen_addr: SocketAddr = format!("{}:{}", self.host, self.port).parse()?;

        let matchmaking = MatchmakingConfig {
            window_start: self.window_start,
            widen_step: self.widen_step,
            widen_interval_ticks: self.widen_interval_ms,
            max_window: self.max_window,
            max_wait_ticks: self.max_wait_ms,
            sweep_interval_ticks: self.sweep_interval_ms,
            rank_delta_base: self.rank_delta_base,
            rank_delta_divisor: self.rank_delta_divisor,
        };

        Ok(ServerConfig {
            listen_addr,
            driver_interval_ms: self.driver_interval_ms,
            outcome_retention_secs: self.outcome_retention_secs,
            matchmaking,
        })
    }
}

// =============================================================================
// Client Arguments (shared by match and queue commands)
// =============================================================================

#[derive(Parser, Debug)]
struct ClientArgs {
    /// Server address
    #[arg(long, short = 'a', default_value = "http://127.0.0.1:8080")]
    addr: String,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(clap::Subcommand, Debug)]
enum MatchCommands {
    /// Submit a match request
    Submit {
        #[arg(long)]
        user_id: u64,

        /// sheep or wolf
        #[arg(long)]
        faction: Faction,

        #[arg(long)]
        rank: i64,

        #[arg(long)]
        session_id: Option<String>,

        #[arg(long)]
        name: Option<String>,

        /// Resolve against a bot instead of a real player
        #[arg(long)]
        test: bool,
    },
    /// Cancel a queued request
    Cancel { user_id: u64 },
    /// Show the latest outcome for a user
    Status { user_id: u64 },
}

#[derive(clap::Subcommand, Debug)]
enum QueueCommands {
    /// Show how many players wait per faction
    Depth,
}

#[derive(Serialize)]
struct SubmitOutput {
    user_id: u64,
    accepted: bool,
}

// =============================================================================
// Server Implementation
// =============================================================================

async fn run_server(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = args.server_config()?;

    tracing::info!(
        listen_addr = %config.listen_addr,
        driver_interval_ms = config.driver_interval_ms,
        window_start = config.matchmaking.window_start,
        max_window = config.matchmaking.max_window,
        max_wait_ms = config.matchmaking.max_wait_ticks,
        rank_delta_base = config.matchmaking.rank_delta_base,
        "Starting flockmatch server"
    );

    let node = Node::new(config)?;
    let shutdown = install_shutdown_handler();
    node.run(shutdown).await?;

    Ok(())
}

// =============================================================================
// Client Command Handlers
// =============================================================================

/// Turn a non-2xx response into an error carrying the server's message.
async fn check(
    response: reqwest::Response,
) -> Result<reqwest::Response, Box<dyn std::error::Error>> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let message = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| status.to_string());
    Err(format!("{} ({})", message, status).into())
}

async fn handle_match_submit(
    http: &reqwest::Client,
    client: &ClientArgs,
    request: MatchRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = http
        .post(format!("{}/api/match", client.addr))
        .json(&request)
        .send()
        .await?;
    check(response).await?;

    match client.output {
        OutputFormat::Json => {
            let output = SubmitOutput {
                user_id: request.user_id,
                accepted: true,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            println!("Match request accepted");
            println!("User:    {}", request.user_id);
            println!("Faction: {}", request.faction);
            println!("Rank:    {}", request.rank_point);
            if request.is_test {
                println!("Mode:    test (bot opponent)");
            }
        }
    }
    Ok(())
}

async fn handle_match_cancel(
    http: &reqwest::Client,
    client: &ClientArgs,
    user_id: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = http
        .delete(format!("{}/api/match/{}", client.addr, user_id))
        .send()
        .await?;
    let result: CancelResult = check(response).await?.json().await?;

    match client.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Table => {
            if result.found {
                println!("Cancelled match request for user {}", result.user_id);
            } else {
                println!("User {} was not queued", result.user_id);
            }
        }
    }
    Ok(())
}

async fn handle_match_status(
    http: &reqwest::Client,
    client: &ClientArgs,
    user_id: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = http
        .get(format!("{}/api/match/{}", client.addr, user_id))
        .send()
        .await?;
    let entry: Value = check(response).await?.json().await?;

    match client.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entry)?),
        OutputFormat::Table => {
            println!("User:     {}", user_id);
            println!("Status:   {}", entry["status"].as_str().unwrap_or("unknown"));
            if let Some(opponent) = entry["opponent_id"].as_u64() {
                println!("Match:    {}", entry["match_id"].as_str().unwrap_or("-"));
                println!(
                    "Opponent: {} ({})",
                    entry["opponent_name"].as_str().unwrap_or("-"),
                    opponent
                );
                println!(
                    "On win:   {:+}",
                    entry["rank_on_win"].as_i64().unwrap_or_default()
                );
                println!(
                    "On loss:  {:+}",
                    entry["rank_on_loss"].as_i64().unwrap_or_default()
                );
            }
            if let Some(updated) = entry["updated_at"].as_str() {
                println!("Updated:  {}", updated);
            }
        }
    }
    Ok(())
}

async fn handle_queue_depth(
    http: &reqwest::Client,
    client: &ClientArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = http
        .get(format!("{}/api/queue", client.addr))
        .send()
        .await?;
    let depth: QueueDepth = check(response).await?.json().await?;

    match client.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&depth)?),
        OutputFormat::Table => {
            println!("{:<8} WAITING", "FACTION");
            println!("{}", "-".repeat(20));
            println!("{:<8} {}", "sheep", depth.sheep);
            println!("{:<8} {}", "wolf", depth.wolf);
        }
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Server(server_args) => {
            run_server(server_args).await?;
        }
        Commands::Match { client, command } => {
            let http = reqwest::Client::new();
            match command {
                MatchCommands::Submit {
                    user_id,
                    faction,
                    rank,
                    session_id,
                    name,
                    test,
                } => {
                    let mut request = MatchRequest::new(user_id, faction, rank);
                    if let Some(session_id) = session_id {
                        request.session_id = session_id;
                    }
                    if let Some(name) = name {
                        request.user_name = name;
                    }
                    request.is_test = test;
                    handle_match_submit(&http, &client, request).await?;
                }
                MatchCommands::Cancel { user_id } => {
                    handle_match_cancel(&http, &client, user_id).await?;
                }
                MatchCommands::Status { user_id } => {
                    handle_match_status(&http, &client, user_id).await?;
                }
            }
        }
        Commands::Queue { client, command } => {
            let http = reqwest::Client::new();
            match command {
                QueueCommands::Depth => handle_queue_depth(&http, &client).await?,
            }
        }
    }

    Ok(())
}
