use anyhow::{bail, Context};
use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::utils::{output_fields, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::models::{Membership, Tenant};
use crate::database::{DatabaseManager, PgStore};
use crate::types::Role;

#[derive(Subcommand)]
pub enum DbCommands {
    #[command(about = "Create tables and indexes (idempotent)")]
    Init,

    #[command(about = "Create a workspace and make a user its owner")]
    CreateTenant {
        #[arg(long, help = "Display name")]
        name: String,
        #[arg(long, help = "URL-safe unique slug")]
        slug: String,
        #[arg(long, help = "Plan name; defaults to the catalogue default")]
        plan: Option<String>,
        #[arg(long, help = "User id of the owner")]
        owner: Uuid,
    },
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgStore> {
    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to the database")?;
    Ok(PgStore::new(pool))
}

pub async fn handle(cmd: DbCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    match cmd {
        DbCommands::Init => {
            let store = connect(&config).await?;
            let applied = store.apply_schema().await?;
            output_success(
                output_format,
                &format!("Schema applied ({} statements)", applied),
                Some(json!({ "statements": applied })),
            )
        }
        DbCommands::CreateTenant { name, slug, plan, owner } => {
            let plan = plan.unwrap_or_else(|| config.plans.default_plan.clone());
            if !config.plans.plans.contains_key(&plan) {
                bail!("unknown plan '{}'", plan);
            }
            if slug.is_empty() || !slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
                bail!("slug must be lowercase letters, digits and dashes");
            }

            let store = connect(&config).await?;
            let tenant = Tenant::new(name, slug, plan);
            store.create_tenant(&tenant).await?;
            store
                .add_membership(&Membership::new(owner, tenant.id, Role::Owner))
                .await?;

            match output_format {
                OutputFormat::Json => output_success(
                    output_format,
                    "Tenant created",
                    Some(json!({ "tenant": tenant, "owner": owner })),
                ),
                OutputFormat::Text => {
                    output_success(output_format, "Tenant created", None)?;
                    output_fields(&[
                        ("id", tenant.id.to_string()),
                        ("name", tenant.name.clone()),
                        ("slug", tenant.slug.clone()),
                        ("plan", tenant.plan.clone()),
                        ("owner", owner.to_string()),
                    ]);
                    Ok(())
                }
            }
        }
    }
}
