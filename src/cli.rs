//! Command-line interface

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::auth;
use crate::config::{CompletionSettings, Config};
use crate::error::{ReplyError, Result};
use crate::mailbox::GmailMailbox;
use crate::pipeline::{self, RunOptions, RunReport};
use crate::reply::OpenAiReplyGenerator;

#[derive(Parser, Debug)]
#[command(name = "gmail-autoreply")]
#[command(version)]
#[command(about = "Draft AI-generated replies to recent Gmail messages", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 client secret file (overrides config)
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Path to token cache file (overrides config)
    #[arg(long)]
    pub token_cache: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Draft replies for the most recent messages
    Run {
        /// Number of messages to process (overrides config)
        #[arg(short = 'n', long)]
        max_results: Option<u32>,

        /// Generate replies without saving drafts
        #[arg(long)]
        dry_run: bool,
    },

    /// Authenticate with Gmail API
    Auth {
        /// Force re-authentication even if token exists
        #[arg(long)]
        force: bool,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    /// Apply path overrides from the command line
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(path) = &self.credentials {
            config.auth.credentials_path = path.clone();
        }
        if let Some(path) = &self.token_cache {
            config.auth.token_path = path.clone();
        }
    }
}

async fn connect(config: &Config) -> Result<GmailMailbox> {
    let provider = auth::google_provider(&config.auth.credentials_path, &config.auth.token_path);
    let credential = provider.obtain().await?;
    let hub = auth::build_hub(&credential)?;
    Ok(GmailMailbox::new(hub, config.mailbox.user_id.clone()))
}

/// `run`: draft replies for recent messages
pub async fn run_command(cli: &Cli, max_results: Option<u32>, dry_run: bool) -> Result<RunReport> {
    let mut config = Config::load(&cli.config).await?;
    cli.apply_overrides(&mut config);
    if let Some(limit) = max_results {
        config.mailbox.max_results = limit;
    }
    if dry_run {
        config.execution.dry_run = true;
    }
    config.validate()?;

    // Resolved before any mailbox work so a missing key fails fast
    let settings = CompletionSettings::from_env(&config.completion)?;
    let generator = OpenAiReplyGenerator::new(&settings);

    let mailbox = connect(&config).await?;
    info!("Authenticated with Gmail API");

    let options = RunOptions {
        limit: config.mailbox.max_results,
        dry_run: config.execution.dry_run,
    };

    let mut out = std::io::stdout();
    pipeline::run(&mailbox, &generator, options, &mut out).await
}

/// `auth`: obtain credentials and report the connected account
pub async fn auth_command(cli: &Cli, force: bool) -> Result<String> {
    let mut config = Config::load(&cli.config).await?;
    cli.apply_overrides(&mut config);

    if force {
        let store = auth::TokenStore::new(&config.auth.token_path);
        if store.remove().await? {
            info!("Removed existing token cache");
        }
    }

    let mailbox = connect(&config).await?;
    let address = mailbox.account_address().await?;

    println!("Successfully authenticated with Gmail API");
    println!("Token cached at: {:?}", config.auth.token_path);
    println!("Connected to account: {}", address);
    Ok(address)
}

/// `init-config`: write the default configuration
pub async fn init_config_command(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(ReplyError::Config(format!(
            "Configuration file already exists at {:?}. Use --force to overwrite.",
            output
        )));
    }

    Config::create_example(output).await?;
    println!("Created example configuration file at: {:?}", output);
    Ok(())
}
