use anyhow::bail;
use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::{AppConfig, PlanDefinition};
use crate::types::{Feature, Resource};

#[derive(Subcommand)]
pub enum PlanCommands {
    #[command(about = "Show features and limits for one or all plans")]
    Show {
        #[arg(long, help = "Plan name")]
        plan: Option<String>,
    },
}

pub async fn handle(cmd: PlanCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        PlanCommands::Show { plan } => {
            let config = AppConfig::load()?;
            let catalog = &config.plans;

            let selected: Vec<(&String, &PlanDefinition)> = match &plan {
                Some(name) => match catalog.plans.get_key_value(name) {
                    Some(entry) => vec![entry],
                    None => bail!(
                        "unknown plan '{}' (known: {})",
                        name,
                        catalog.plans.keys().cloned().collect::<Vec<_>>().join(", ")
                    ),
                },
                None => catalog.plans.iter().collect(),
            };

            match output_format {
                OutputFormat::Json => {
                    let plans: serde_json::Map<String, serde_json::Value> = selected
                        .iter()
                        .map(|(name, definition)| (name.to_string(), json!(definition)))
                        .collect();
                    output_success(
                        output_format,
                        "Plan catalogue",
                        Some(json!({ "default_plan": catalog.default_plan, "plans": plans })),
                    )
                }
                OutputFormat::Text => {
                    for (name, definition) in selected {
                        let marker = if *name == catalog.default_plan { " (default)" } else { "" };
                        println!("{}{}", name, marker);
                        print_plan(definition);
                        println!();
                    }
                    Ok(())
                }
            }
        }
    }
}

fn print_plan(definition: &PlanDefinition) {
    let features: Vec<&str> = Feature::ALL
        .iter()
        .filter(|f| definition.has_feature(**f))
        .map(|f| f.as_str())
        .collect();
    println!("  features: {}", if features.is_empty() { "-".to_string() } else { features.join(", ") });

    for resource in Resource::ALL {
        let limit = definition
            .limit(*resource)
            .map(|l| l.to_string())
            .unwrap_or_else(|| "unlimited".to_string());
        println!("  {:<10} {}", resource.as_str(), limit);
    }
}
