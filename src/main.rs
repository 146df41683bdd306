use anyhow::{Context, Result};
use axum::Router;
use fixity_audit::{
    batch,
    config::{self, AuditArgs, Command, ServeArgs},
    routes,
    services::{
        auditor::Auditor,
        catalog::{Catalog, RegistryClient},
        checker::{Checker, CheckerSettings},
        storage_resolver::{BucketResolver, LocationResolver},
    },
    state::AppState,
};
use std::{fs, io, io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    // stdout carries the audit CSV, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    // --- Parse config + command ---
    let (cfg, command) = config::AppConfig::from_env_and_args()?;

    tracing::debug!("Starting fixity-audit with config: {:?}", cfg);

    // --- Shared clients ---
    let buckets = cfg.load_buckets()?;
    tracing::info!("Loaded {} preservation buckets", buckets.len());

    let catalog: Arc<dyn Catalog> =
        Arc::new(RegistryClient::new(cfg.registry()).context("building registry client")?);
    let http = reqwest::Client::builder()
        .build()
        .context("building object store client")?;
    let resolver: Arc<dyn LocationResolver> =
        Arc::new(BucketResolver::with_http_clients(buckets.clone(), http));

    let auditor = Auditor::new(catalog.clone(), resolver.clone());

    match command {
        Command::Audit(args) => run_audit(&auditor, args).await,
        Command::Serve(args) => {
            let settings = CheckerSettings {
                max_days_since_fixity_check: cfg.max_days_since_fixity_check,
                is_e2e_test: cfg.is_e2e_test,
                ..CheckerSettings::default()
            };
            let state = AppState {
                checker: Arc::new(Checker::new(catalog, resolver, settings)),
                auditor: Arc::new(auditor),
                buckets: Arc::new(buckets),
            };
            serve(state, args).await
        }
    }
}

/// Audit every file listed in the input file; CSV goes to stdout.
async fn run_audit(auditor: &Auditor, args: AuditArgs) -> Result<()> {
    let Some(input) = args.input else {
        tracing::error!("Param -i (input file) is required");
        std::process::exit(1);
    };

    let contents = fs::read_to_string(&input)
        .with_context(|| format!("Cannot read input file {}", input.display()))?;
    let ids = batch::parse_file_ids(&contents);
    tracing::info!("Auditing {} files (full check: {})", ids.len(), args.full);

    let mut out = io::stdout();
    let summary = batch::run_batch(auditor, &ids, args.full, args.concurrency, &mut out)
        .await
        .context("writing CSV output")?;

    tracing::info!(
        "Audit complete: {} checked, {} passed, {} failed, {} write errors",
        summary.checked,
        summary.passed,
        summary.failed,
        summary.write_errors
    );
    Ok(())
}

async fn serve(state: AppState, args: ServeArgs) -> Result<()> {
    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(state);

    // --- Start server ---
    let addr = args.addr()?;
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(args.host.as_deref(), None | Some("0.0.0.0" | "::")) =>
        {
            let port = addr.rsplit(':').next().unwrap_or("3000");
            let fallback_addr = format!("127.0.0.1:{}", port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Fixity worker listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
