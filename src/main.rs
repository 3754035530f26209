use batch_transfer::{
    config::{database, settings},
    core::{
        ApiResponse, BatchTransferService,
        batch::{self, CreateBatchRequest},
        history,
    },
    entities::TransferStatus,
    errors::{Error, Result},
    gateway::HttpTransferGateway,
};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use serde_json::json;
use std::{path::PathBuf, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Batch transfer back-office tool
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Settings file
    #[arg(short, long, env = "BATCH_TRANSFER_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a batch from a TOML request file
    Create {
        /// Request file with name, mode, fixed_account_id and [[relations]]
        file: PathBuf,
    },
    /// Run every pending relation of a batch
    Execute {
        /// Batch id
        batch_id: i64,
        /// Let the provider complete 2FA automatically
        #[arg(long)]
        auto_2fa: bool,
    },
    /// Pick up a batch again, processing what is still pending
    Resume {
        /// Batch id
        batch_id: i64,
        /// Let the provider complete 2FA automatically
        #[arg(long)]
        auto_2fa: bool,
    },
    /// Re-run a single relation
    Retry {
        /// Relation id
        relation_id: i64,
        /// Let the provider complete 2FA automatically
        #[arg(long)]
        auto_2fa: bool,
    },
    /// Show a batch with its relations and history
    Show {
        /// Batch id
        batch_id: i64,
    },
    /// List batches, newest first
    List {
        /// Only batches in this status (pending, processing, completed, failed)
        #[arg(long)]
        status: Option<String>,
    },
}

fn parse_status(value: &str) -> Result<TransferStatus> {
    serde_json::from_value(json!(value)).map_err(|_| Error::Config {
        message: format!("Unknown status: {value}"),
    })
}

async fn run(service: &BatchTransferService, command: Command) -> ApiResponse {
    let db = service.database();
    match command {
        Command::Create { file } => {
            let request: Result<CreateBatchRequest> = std::fs::read_to_string(&file)
                .map_err(Error::from)
                .and_then(|contents| {
                    toml::from_str(&contents).map_err(|e| Error::Config {
                        message: format!("Invalid batch request {}: {e}", file.display()),
                    })
                });
            match request {
                Ok(request) => ApiResponse::from_result(service.create_batch(request).await, |_| {
                    "Batch transfer created".to_string()
                }),
                Err(e) => ApiResponse::failure(&e),
            }
        }
        Command::Execute { batch_id, auto_2fa } => ApiResponse::from_result(
            service.execute_batch(batch_id, auto_2fa).await,
            |summary| summary.message.clone(),
        ),
        Command::Resume { batch_id, auto_2fa } => {
            let result = service.resume_batch(batch_id, auto_2fa).await;
            let failed = matches!(&result, Ok(summary) if summary.processed == 0
                && summary.status == TransferStatus::Failed);
            let response = ApiResponse::from_result(result, |summary| summary.message.clone());
            if failed {
                response.with_success(false)
            } else {
                response
            }
        }
        Command::Retry {
            relation_id,
            auto_2fa,
        } => {
            let result = service.process_relation(relation_id, auto_2fa).await;
            let success = matches!(&result, Ok(outcome) if outcome.success);
            ApiResponse::from_result(result, |outcome| {
                if outcome.success {
                    "Transfer succeeded".to_string()
                } else {
                    "Transfer failed".to_string()
                }
            })
            .with_success(success)
        }
        Command::Show { batch_id } => {
            let result = async {
                let batch = batch::require_batch(db, batch_id).await?;
                let relations = batch::get_relations(db, batch_id).await?;
                let history = history::get_history(db, batch_id).await?;
                Ok::<_, Error>(json!({ "batch": batch, "relations": relations, "history": history }))
            }
            .await;
            ApiResponse::from_result(result, |_| "Batch transfer details".to_string())
        }
        Command::List { status } => {
            let result = match status.as_deref().map(parse_status).transpose() {
                Ok(status) => batch::list_batches(db, status).await,
                Err(e) => Err(e),
            };
            ApiResponse::from_result(result, |batches| format!("{} batch transfers", batches.len()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // 2. Load .env file, non-fatal: env vars can be set externally
    dotenv().ok();

    let cli = Cli::parse();

    // 3. Load settings
    let app_config = settings::load_app_configuration(&cli.config)
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Connect and ensure tables
    let database_url = database::get_database_url(app_config.database.url.as_deref());
    let db = database::create_connection(&database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;
    info!("Database initialized successfully.");

    // 5. Wire the gateway into the service
    let gateway = HttpTransferGateway::new(&app_config.gateway)?;
    info!("Transfer gateway at {}", gateway.endpoint());
    let service = BatchTransferService::new(db, Arc::new(gateway));

    let response = run(&service, cli.command).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}
