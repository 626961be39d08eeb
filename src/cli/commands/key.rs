use clap::Subcommand;
use serde_json::json;

use crate::auth::{generate_api_key, hash_api_key};
use crate::cli::utils::{output_fields, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum KeyCommands {
    #[command(about = "Generate a new API key with its display prefix and hash")]
    Generate,

    #[command(about = "Print the stored hash of an API key")]
    Hash {
        #[arg(help = "Plaintext API key")]
        key: String,
    },
}

pub async fn handle(cmd: KeyCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        KeyCommands::Generate => {
            let config = AppConfig::load()?;
            let key = generate_api_key(&config.security.api_key_prefix);

            match output_format {
                OutputFormat::Json => output_success(
                    output_format,
                    "API key generated",
                    Some(json!({ "key": key.plaintext, "key_prefix": key.display_prefix, "key_hash": key.hash })),
                ),
                OutputFormat::Text => {
                    output_fields(&[
                        ("key", key.plaintext),
                        ("prefix", key.display_prefix),
                        ("hash", key.hash),
                    ]);
                    Ok(())
                }
            }
        }
        KeyCommands::Hash { key } => {
            let hash = hash_api_key(&key);
            match output_format {
                OutputFormat::Json => output_success(output_format, "API key hashed", Some(json!({ "key_hash": hash }))),
                OutputFormat::Text => {
                    println!("{}", hash);
                    Ok(())
                }
            }
        }
    }
}
