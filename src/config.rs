use anyhow::{Context, Result, ensure};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::{env, fs, path::PathBuf, time::Duration};

use crate::{
    models::storage::PreservationBucket,
    services::{catalog::RegistryConfig, checker::DEFAULT_MAX_DAYS_SINCE_FIXITY_CHECK},
};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub registry_url: String,
    pub registry_api_version: String,
    pub registry_api_user: String,
    pub registry_api_key: String,
    pub registry_timeout_secs: u64,
    pub buckets_file: Option<PathBuf>,
    pub max_days_since_fixity_check: i64,
    pub is_e2e_test: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Fixity verification and audit for preserved files")]
pub struct Args {
    /// Registry base URL (overrides FIXITY_REGISTRY_URL)
    #[arg(long, global = true)]
    pub registry_url: Option<String>,

    /// JSON file listing preservation buckets (overrides FIXITY_BUCKETS_FILE)
    #[arg(long, global = true)]
    pub buckets_file: Option<PathBuf>,

    /// Minimum days between checks of the same file (overrides MAX_DAYS_SINCE_LAST_FIXITY)
    #[arg(long, global = true)]
    pub max_days_since_fixity_check: Option<i64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Audit the files listed in an input file and write CSV to stdout
    Audit(AuditArgs),
    /// Serve the fixity worker over HTTP
    Serve(ServeArgs),
}

#[derive(ClapArgs, Debug)]
pub struct AuditArgs {
    /// Input file with one generic file id per line
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Run a full fixity check when the quick match is inconclusive
    #[arg(short = 'f', long = "full")]
    pub full: bool,

    /// Number of files audited at once
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,
}

#[derive(ClapArgs, Debug)]
pub struct ServeArgs {
    /// Host to bind to (overrides FIXITY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FIXITY_PORT)
    #[arg(long)]
    pub port: Option<u16>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the chosen command.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_registry_url =
            env::var("FIXITY_REGISTRY_URL").unwrap_or_else(|_| "http://localhost:8080".into());
        let env_api_version =
            env::var("FIXITY_REGISTRY_API_VERSION").unwrap_or_else(|_| "v3".into());
        let env_api_user = env::var("FIXITY_REGISTRY_API_USER").unwrap_or_default();
        let env_api_key = env::var("FIXITY_REGISTRY_API_KEY").unwrap_or_default();
        let env_timeout = parse_env("FIXITY_REGISTRY_TIMEOUT_SECS", 60u64)?;
        let env_buckets = env::var("FIXITY_BUCKETS_FILE").ok().map(PathBuf::from);
        let env_max_days =
            parse_env("MAX_DAYS_SINCE_LAST_FIXITY", DEFAULT_MAX_DAYS_SINCE_FIXITY_CHECK)?;
        let is_e2e_test = env::var("FIXITY_E2E").map(|v| v == "true").unwrap_or(false);

        // --- Merge ---
        let cfg = Self {
            registry_url: args.registry_url.unwrap_or(env_registry_url),
            registry_api_version: env_api_version,
            registry_api_user: env_api_user,
            registry_api_key: env_api_key,
            registry_timeout_secs: env_timeout,
            buckets_file: args.buckets_file.or(env_buckets),
            max_days_since_fixity_check: validate_max_days(
                args.max_days_since_fixity_check.unwrap_or(env_max_days),
            )?,
            is_e2e_test,
        };

        Ok((cfg, args.command))
    }

    pub fn registry(&self) -> RegistryConfig {
        RegistryConfig {
            base_url: self.registry_url.clone(),
            api_version: self.registry_api_version.clone(),
            api_user: self.registry_api_user.clone(),
            api_key: self.registry_api_key.clone(),
            timeout: Duration::from_secs(self.registry_timeout_secs),
        }
    }

    /// Load preservation buckets; none configured means nothing can be resolved.
    pub fn load_buckets(&self) -> Result<Vec<PreservationBucket>> {
        let Some(path) = &self.buckets_file else {
            return Ok(Vec::new());
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading buckets file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing buckets file {}", path.display()))
    }
}

impl ServeArgs {
    pub fn addr(&self) -> Result<String> {
        let host = match &self.host {
            Some(host) => host.clone(),
            None => env::var("FIXITY_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        };
        let port = match self.port {
            Some(port) => port,
            None => parse_env("FIXITY_PORT", 3000u16)?,
        };
        Ok(format!("{}:{}", host, port))
    }
}

/// A negative interval would put the cutoff in the future and skip every file.
fn validate_max_days(days: i64) -> Result<i64> {
    ensure!(
        days >= 0,
        "max days since last fixity check must not be negative, got {}",
        days
    );
    Ok(days)
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
