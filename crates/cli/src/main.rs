//! `feishu-project` CLI entry-point.
//!
//! Available sub-commands:
//! - `operations` — list every `resource:operation` pair.
//! - `schema`     — print the node's parameter schema as JSON.
//! - `auth`       — test the configured credentials.
//! - `run`        — execute one operation over a batch of items.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use client::credentials::DEFAULT_HOST;
use client::{Credentials, ProjectClient, TokenType};
use engine::{EngineError, ItemExecutor, OperationRegistry};
use nodes::{ExecutionContext, ItemParameters};

#[derive(Parser)]
#[command(
    name = "feishu-project",
    about = "Run Feishu Project API operations over batches of items",
    version
)]
struct Cli {
    /// Feishu Project host, or a full base URL.
    #[arg(long, env = "FEISHU_PROJECT_HOST", default_value = DEFAULT_HOST)]
    host: String,

    #[arg(long, env = "FEISHU_PROJECT_PLUGIN_ID")]
    plugin_id: Option<String>,

    #[arg(long, env = "FEISHU_PROJECT_PLUGIN_SECRET", hide_env_values = true)]
    plugin_secret: Option<String>,

    #[arg(long, env = "FEISHU_PROJECT_TOKEN_TYPE", value_enum, default_value_t = TokenTypeArg::PluginAccessToken)]
    token_type: TokenTypeArg,

    /// User the plugin acts for (`X-USER-KEY`).
    #[arg(long, env = "FEISHU_PROJECT_USER_KEY")]
    user_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum TokenTypeArg {
    PluginAccessToken,
    VirtualPluginToken,
}

impl From<TokenTypeArg> for TokenType {
    fn from(arg: TokenTypeArg) -> Self {
        match arg {
            TokenTypeArg::PluginAccessToken => TokenType::PluginAccessToken,
            TokenTypeArg::VirtualPluginToken => TokenType::VirtualPluginToken,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List the available operations.
    Operations,
    /// Print the full parameter schema.
    Schema,
    /// Exchange the credentials for a plugin token.
    Auth,
    /// Execute an operation for every input item.
    Run {
        #[arg(long)]
        resource: String,
        #[arg(long)]
        operation: String,
        /// JSON object with the node-level parameters.
        #[arg(long)]
        parameters: Option<PathBuf>,
        /// JSON array of input items; object items also override parameters.
        #[arg(long)]
        items: Option<PathBuf>,
        /// Emit an error record for a failing item instead of aborting.
        #[arg(long)]
        continue_on_fail: bool,
    },
}

impl Cli {
    fn credentials(&self) -> Result<Credentials> {
        let plugin_id = self
            .plugin_id
            .clone()
            .context("--plugin-id (or FEISHU_PROJECT_PLUGIN_ID) is required")?;
        let plugin_secret = self
            .plugin_secret
            .clone()
            .context("--plugin-secret (or FEISHU_PROJECT_PLUGIN_SECRET) is required")?;
        let user_key = self
            .user_key
            .clone()
            .context("--user-key (or FEISHU_PROJECT_USER_KEY) is required")?;

        Ok(Credentials::new(&self.host, plugin_id, plugin_secret, user_key)
            .with_token_type(self.token_type.into()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let registry = OperationRegistry::new(operations::catalog())?;

    match &cli.command {
        Command::Operations => {
            for resource in registry.resources() {
                for op in &resource.operations {
                    println!("{}:{}\t{} / {}", resource.resource, op.operation, resource.name, op.name);
                }
            }
        }
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(&registry.build())?);
        }
        Command::Auth => {
            let client = ProjectClient::new(cli.credentials()?)?;
            client.verify().await.context("credential test failed")?;
            info!("credentials are valid");
        }
        Command::Run {
            resource,
            operation,
            parameters,
            items,
            continue_on_fail,
        } => {
            let mut params = match parameters {
                Some(path) => ItemParameters::from_value(read_json(path)?)?,
                None => ItemParameters::default(),
            };
            params.set("resource", Value::String(resource.clone()));
            params.set("operation", Value::String(operation.clone()));

            let items = match items {
                Some(path) => match read_json(path)? {
                    Value::Array(items) => items,
                    _ => bail!("{} must contain a JSON array", path.display()),
                },
                None => vec![Value::Object(Map::new())],
            };
            let overrides = items
                .iter()
                .map(|item| item.as_object().cloned().unwrap_or_default())
                .collect();
            let params = params.with_item_overrides(overrides);

            let client = ProjectClient::new(cli.credentials()?)?;
            let ctx = ExecutionContext::new(items, Arc::new(params))
                .with_client(Arc::new(client))
                .with_continue_on_fail(*continue_on_fail);

            let executor = ItemExecutor::new(Arc::new(registry));
            match executor.execute(Arc::new(ctx)).await {
                Ok(groups) => println!("{}", serde_json::to_string_pretty(&groups)?),
                Err(EngineError::ItemFailed { item_index, source, emitted }) => {
                    println!("{}", serde_json::to_string_pretty(&vec![emitted])?);
                    bail!("item {item_index} failed: {source}");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}
