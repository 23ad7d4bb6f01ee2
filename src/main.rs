//! Model Viewer - upload, convert and annotate 3D plant models.
//!
//! This binary starts the HTTP server and provides a few operator commands.

use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use model_viewer::{
    config::{CheckConfig, Cli, Command, HashPasswordConfig, ServeConfig, TokenConfig},
    server::{create_router, hash_password, AppState, RouterConfig, TokenAuth},
    store::ModelStore,
    PgRepository,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::HashPassword(config) => run_hash_password(config),
        Command::Token(config) => run_token(config),
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    print_banner();

    info!("Configuration:");
    info!("  Upload dir: {}", config.upload_dir.display());
    info!("  Models dir: {}", config.models_dir.display());
    info!("  Max upload: {} bytes", config.max_upload_bytes);
    info!("  Token TTL: {}s", config.token_ttl);
    if config.uses_default_secret() {
        warn!("  JWT secret: using the built-in development secret");
        warn!("              Set --jwt-secret or JWT_SECRET before deploying");
    }

    info!("");
    info!("Connecting to database...");
    let repo = match PgRepository::connect(&config.database_url, config.max_connections).await {
        Ok(repo) => {
            info!("  Connected successfully");
            repo
        }
        Err(e) => {
            error!("  Failed to connect to database: {}", e);
            error!("");
            error!("  Please check:");
            error!("    - DATABASE_URL points at a running Postgres server");
            error!("    - The credentials and database name are correct");
            return ExitCode::FAILURE;
        }
    };

    if config.init_schema {
        if let Err(e) = repo.init_schema().await {
            error!("Failed to initialize schema: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let store = ModelStore::new(config.upload_dir.clone(), config.models_dir.clone());
    if let Err(e) = store.ensure_dirs().await {
        error!("Failed to prepare storage directories: {}", e);
        return ExitCode::FAILURE;
    }

    let auth = TokenAuth::new(&config.jwt_secret, config.token_ttl());
    let state = AppState::new(repo, store, auth);
    let router = create_router(state, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!(
        "    curl -X POST http://{}/api/login -H 'Content-Type: application/json' \\",
        addr
    );
    info!("         -d '{{\"username\":\"<user>\",\"password\":\"<password>\"}}'");
    info!("");
    info!("  Open the viewer in your browser:");
    info!("    open http://{}/", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("");
    info!("███╗   ███╗ ██████╗ ██████╗ ███████╗██╗     ");
    info!("████╗ ████║██╔═══██╗██╔══██╗██╔════╝██║     ");
    info!("██╔████╔██║██║   ██║██║  ██║█████╗  ██║     ");
    info!("██║╚██╔╝██║██║   ██║██║  ██║██╔══╝  ██║     ");
    info!("██║ ╚═╝ ██║╚██████╔╝██████╔╝███████╗███████╗");
    info!("╚═╝     ╚═╝ ╚═════╝ ╚═════╝ ╚══════╝╚══════╝");
    info!("");
    info!("               viewer v{}", version);
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "model_viewer=debug,tower_http=debug"
    } else {
        "model_viewer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_max_upload_bytes(config.max_upload_bytes)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Hash Password Command
// =============================================================================

fn run_hash_password(config: HashPasswordConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match hash_password(&config.password, config.cost) {
        Ok(hash) => {
            println!("{}", hash);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Token Command
// =============================================================================

fn run_token(config: TokenConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let auth = TokenAuth::new(&config.secret, Duration::from_secs(config.ttl));
    match auth.issue(config.id, &config.username) {
        Ok((token, expires_at)) => {
            println!("{}", token);
            eprintln!();
            eprintln!("Expires at {} (unix seconds)", expires_at);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("Model Viewer Configuration Check");
    println!("════════════════════════════════");
    println!();

    print!("Connecting to database... ");
    let repo = match PgRepository::connect(&config.database_url, 1).await {
        Ok(repo) => {
            println!("✓ success");
            repo
        }
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            println!();
            println!("Please check:");
            println!("  - DATABASE_URL points at a running Postgres server");
            println!("  - The credentials and database name are correct");
            return ExitCode::FAILURE;
        }
    };

    println!();
    println!("Tables:");
    let status = match repo.table_status().await {
        Ok(status) => status,
        Err(e) => {
            println!("✗ Could not inspect tables: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut missing = 0;
    for table in &status {
        if table.exists {
            println!("  ✓ {}", table.name);
        } else {
            println!("  ✗ {} (missing)", table.name);
            missing += 1;
        }
    }

    println!();
    if missing > 0 {
        println!("{} table(s) missing. Run `serve --init-schema` to create them.", missing);
        return ExitCode::FAILURE;
    }
    println!("All checks passed.");
    ExitCode::SUCCESS
}
