use anyhow::Context;
use chrono::Duration;
use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{issue_session_token, Claims};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Sign a session token for a user")]
    Issue {
        #[arg(long, help = "User id (token subject)")]
        user: Uuid,
        #[arg(long, help = "Workspace to select; defaults to the user's oldest membership")]
        workspace: Option<Uuid>,
        #[arg(long, help = "Lifetime in hours; defaults to the configured expiry")]
        hours: Option<u64>,
    },
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Issue { user, workspace, hours } => {
            let config = AppConfig::load()?;
            let hours = hours.unwrap_or(config.security.jwt_expiry_hours);
            let ttl = Duration::hours(i64::try_from(hours).context("--hours is too large")?);

            let claims = Claims::new(user, workspace, ttl);
            let token = issue_session_token(&config.security.jwt_secret, &claims)?;

            match output_format {
                OutputFormat::Json => output_success(
                    output_format,
                    "Session token issued",
                    Some(json!({ "token": token, "expires_at": claims.exp })),
                ),
                OutputFormat::Text => {
                    // Token alone on stdout
                    println!("{}", token);
                    Ok(())
                }
            }
        }
    }
}
