use clap::Subcommand;
use fnl_core::{InputType, Result};

use crate::manager::IngestManager;

#[derive(Subcommand, Debug, Clone)]
pub enum ScraperCommands {
    /// Fetch a URL and print the extracted article text
    Extract {
        /// The article URL
        url: String,
        /// Print the full result as JSON instead of the text
        #[arg(long)]
        json: bool,
    },
    /// Classify pasted text or a URL and store the result
    Classify {
        /// Article text to classify
        #[arg(long, conflicts_with = "url")]
        text: Option<String>,
        /// Article URL to fetch and classify
        #[arg(long)]
        url: Option<String>,
        /// Owner of the stored record
        #[arg(long, default_value = "cli")]
        user: String,
    },
}

pub async fn handle_command(command: ScraperCommands, manager: &IngestManager) -> Result<()> {
    match command {
        ScraperCommands::Extract { url, json } => {
            let result = manager.extract(&url).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if let Some(error) = &result.metadata.error {
                eprintln!("❌ {}", error);
            } else {
                if let Some(title) = &result.metadata.title {
                    println!("📰 {}\n", title);
                }
                println!("{}", result.text);
            }
        }
        ScraperCommands::Classify { text, url, user } => {
            let input_type = if url.is_some() { InputType::Url } else { InputType::Text };
            let record = manager
                .ingest(&user, input_type, text.as_deref(), url.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }
    Ok(())
}
