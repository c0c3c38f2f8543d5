use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{issue_token, Claims, Role};
use crate::config::{AppConfig, MAX_JWT_EXPIRY_HOURS};

#[derive(Parser)]
#[command(name = "agro")]
#[command(about = "Agro API - tenant-aware backend for the farm management app")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Port to bind, overrides API_PORT")]
        port: Option<u16>,
    },

    #[command(about = "Mint a signed token for local development")]
    Token {
        #[arg(long, help = "Tenant identity (account email)")]
        identity: String,

        #[arg(long, default_value = "member", value_parser = parse_role)]
        role: Role,

        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(i64).range(1..=MAX_JWT_EXPIRY_HOURS as i64))]
        hours: i64,
    },
}

fn parse_role(value: &str) -> Result<Role, String> {
    value.parse()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli, mut config: AppConfig) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.api.port = port;
            }
            crate::server::serve(Arc::new(config)).await
        }
        Commands::Token { identity, role, hours } => {
            mint_token(&config, &identity, role, hours, &output_format)
        }
    }
}

fn mint_token(
    config: &AppConfig,
    identity: &str,
    role: Role,
    hours: i64,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    if hours <= 0 {
        anyhow::bail!("--hours must be positive");
    }
    let ttl = chrono::Duration::try_hours(hours)
        .ok_or_else(|| anyhow::anyhow!("--hours {} is out of range", hours))?;
    let identity = crate::database::cache_key(identity)?;
    let claims = Claims::new(&identity, role, ttl)?;
    let token = issue_token(&config.security.jwt_secret, &claims)?;

    match output_format {
        OutputFormat::Json => {
            let out = json!({
                "success": true,
                "token": token,
                "identity": identity,
                "role": role,
                "exp": claims.exp,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => println!("{}", token),
    }
    Ok(())
}
