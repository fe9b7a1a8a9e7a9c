use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use fnl_inference::{ClassifierService, ModelBackend, DEFAULT_API_URL, DEFAULT_MODEL};
use fnl_scrappers::{handle_command, GenericScraper, IngestManager, ScraperCommands};
use fnl_storage::{create_storage, StorageConfig};
use fnl_web::AppState;
use tracing::{info, warn};

const DEV_SECRET: &str = "dev-secret";

#[derive(Parser, Debug)]
#[command(author, version, about = "Fake news credibility lab", long_about = None)]
pub struct Cli {
    /// `memory`, `sqlite` or `sqlite:<path>`
    #[arg(long, env = "DATABASE_URL", default_value = "memory")]
    database_url: String,
    /// Names the SQLite file when the database URL is a bare `sqlite`
    #[arg(long, env = "DATABASE_NAME", default_value = "fake_news_lab")]
    database_name: String,
    #[arg(
        long,
        env = "MODEL_BACKEND",
        default_value = "huggingface",
        help = "Classifier backend. Available backends: huggingface (default), onnx, dummy"
    )]
    model_backend: ModelBackend,
    #[arg(long, env = "HUGGINGFACE_MODEL", default_value = DEFAULT_MODEL)]
    model: String,
    #[arg(long, env = "HUGGINGFACE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,
    #[arg(long, env = "HUGGINGFACE_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,
    /// Directory with `model.onnx`, `tokenizer.json` and `config.json`
    #[arg(long, env = "MODEL_DIR")]
    model_dir: Option<PathBuf>,
    #[arg(long, env = "DEBUG")]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the JSON HTTP API
    Serve {
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: String,
        #[arg(long, env = "PORT", default_value_t = 5000)]
        port: u16,
        #[arg(long, env = "SECRET_KEY", default_value = DEV_SECRET, hide_env_values = true)]
        secret_key: String,
    },
    #[command(flatten)]
    Scrape(ScraperCommands),
}

impl Cli {
    fn inference_config(&self) -> fnl_inference::Config {
        fnl_inference::Config {
            backend: self.model_backend,
            model_name: self.model.clone(),
            api_key: self.api_token.clone().filter(|t| !t.is_empty()),
            api_url: self.api_url.clone(),
            model_dir: self.model_dir.clone(),
            ..Default::default()
        }
    }

    fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            database_url: self.database_url.clone(),
            database_name: self.database_name.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    fnl_core::logging::init_logging(cli.debug);

    let stores = create_storage(&cli.storage_config())
        .await
        .context("Failed to open storage")?;

    // The model itself loads on the first classification.
    let classifier = Arc::new(ClassifierService::new(cli.inference_config()));
    info!("🧠 Classifier configured (backend {}, model {})", cli.model_backend, cli.model);

    let scraper = Arc::new(GenericScraper::new().context("Failed to build HTTP client")?);

    match cli.command {
        Commands::Serve {
            host,
            port,
            secret_key,
        } => {
            if secret_key == DEV_SECRET {
                warn!("⚠️ SECRET_KEY is not set; sessions are signed with the development secret");
            }
            let state = AppState::new(stores, classifier, scraper, &secret_key);
            let app = fnl_web::create_app(state);

            let listener = tokio::net::TcpListener::bind((host.as_str(), port))
                .await
                .with_context(|| format!("Failed to bind {}:{}", host, port))?;
            info!("🌐 Listening on http://{}", listener.local_addr()?);
            axum::serve(listener, app).await?;
        }
        Commands::Scrape(command) => {
            let manager = IngestManager::new(scraper, classifier, stores.articles);
            handle_command(command, &manager).await?;
        }
    }

    Ok(())
}
