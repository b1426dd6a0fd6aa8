//! bistro is a CLI that synthesizes the restaurant-finder agent's cloud
//! infrastructure into deployment templates in one pass.

mod cli;

use anyhow::{Context, Result, bail};
use clap::Parser;
use comfy_table::Table;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};

use bistro_infra::{Assembly, BISTRO_CONF_FILENAME, DeployContext, compose};
use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    // If a config file is provided, load it (with environment overrides);
    // otherwise build the context from CLI arguments.
    let ctx = if let Some(config_path) = &cli.config {
        tracing::info!(config_path = %config_path, "Loading deploy context from config file...");
        load_context(config_path)?
    } else {
        context_from_flags(&cli)?
    };
    ctx.validate()?;

    tracing::info!(
        app_name = %ctx.app_name,
        region = %ctx.region,
        account_id = %ctx.account_id,
        "Composing deployment..."
    );

    let assembly = compose(&ctx)?.synth()?;
    assembly.write_to_dir(&cli.outdata)?;

    // Persist the context next to the templates so the exact synthesis can be
    // reproduced later with --config.
    ctx.save_to_file(&cli.outdata.join(BISTRO_CONF_FILENAME))?;

    print_summary(&assembly);
    Ok(())
}

/// Load the context from a TOML file, letting `BISTRO_`-prefixed environment
/// variables override individual fields.
fn load_context(path: &str) -> Result<DeployContext> {
    if !std::path::Path::new(path).exists() {
        bail!("Context file not found: {}", path);
    }
    Figment::from(Toml::file(path))
        .merge(Env::prefixed("BISTRO_"))
        .extract()
        .context(format!("Failed to load deploy context from {}", path))
}

fn context_from_flags(cli: &Cli) -> Result<DeployContext> {
    let Some(account_id) = &cli.account_id else {
        bail!("--account-id (or BISTRO_ACCOUNT_ID) is required unless --config is given");
    };

    let mut ctx = DeployContext::new(&cli.app_name, &cli.region, account_id);
    if let Some(uri) = &cli.image_uri {
        ctx = ctx.with_image_uri(uri);
    }
    ctx.tool_schema_path = cli.tool_schema.clone();
    Ok(ctx)
}

fn print_summary(assembly: &Assembly) {
    let mut stacks = Table::new();
    stacks.set_header(vec!["Stack", "Resources", "Depends on", "Digest"]);
    for stack in &assembly.stacks {
        let resource_count = stack.template["Resources"]
            .as_object()
            .map(|resources| resources.len())
            .unwrap_or(0);
        let depends_on: Vec<&str> = stack.depends_on.iter().map(|d| d.as_str()).collect();
        let digest: String = stack.digest.chars().take(19).collect();
        stacks.add_row(vec![
            stack.name.to_string(),
            resource_count.to_string(),
            depends_on.join(", "),
            digest,
        ]);
    }
    println!("{stacks}");

    let mut outputs = Table::new();
    outputs.set_header(vec!["Stack", "Output", "Exported as"]);
    for stack in &assembly.stacks {
        for output in &stack.outputs {
            outputs.add_row(vec![
                stack.name.to_string(),
                output.name.clone(),
                output.export_name.to_string(),
            ]);
        }
    }
    println!("{outputs}");
}
