use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use mediafront::content::renderer::BrowserRenderer;
use mediafront::content::scanner;
use mediafront::http::{self, state::AppState};
use mediafront::net::interfaces::NetworkConfiguration;
use mediafront::net::ip_filter::IpFilter;
use mediafront::server::{HttpServer, ServerStatus};
use mediafront::{cli, config};

/// Set to true once the first Ctrl+C is received. Second Ctrl+C force-exits.
static SHUTTING_DOWN: AtomicBool = AtomicBool::new(false);

/// Block until Ctrl+C. A second Ctrl+C during shutdown exits immediately.
fn wait_for_shutdown(signals: &tokio::runtime::Runtime) {
    if let Err(e) = signals.block_on(tokio::signal::ctrl_c()) {
        eprintln!("error: failed to install Ctrl+C handler: {e}");
        std::process::exit(1);
    }
    SHUTTING_DOWN.store(true, Ordering::SeqCst);
    signals.spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() && SHUTTING_DOWN.load(Ordering::SeqCst) {
            eprintln!("\nmediafront: forced exit");
            std::process::exit(1);
        }
    });
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        )
        .init();

    let args = cli::Args::parse();

    let file_config = config::find_config_file(args.config.as_deref())
        .and_then(|path| {
            match config::load_config(&path) {
                Ok(cfg) => {
                    tracing::debug!("Loaded config from {}", path.display());
                    Some(cfg)
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config file: {}", e);
                    None
                }
            }
        });

    let config = config::Config::resolve(file_config, &args);

    for path in &config.paths {
        if !path.is_dir() {
            eprintln!("error: not a directory: {}", path.display());
            std::process::exit(1);
        }
    }

    tracing::info!("mediafront \"{}\" on port {} ({:?} engine)", config.name, config.port, config.engine);

    let tree = scanner::scan(&config.paths, &config.name);
    let server_config = config.server_config();
    let state = AppState {
        tree: Arc::new(tree),
        renderer: Arc::new(BrowserRenderer::new()),
        api_filter: Arc::clone(&server_config.ip_filter),
        control_allow: Arc::new(IpFilter::parse(&config.control_allow)),
        server_name: config.name.clone(),
        web_control: config.web_control,
    };
    tracing::info!("IP filter: {}", state.api_filter);

    let network = Arc::new(NetworkConfiguration::system());
    let mut server = HttpServer::new(server_config, network, http::build_router(state));

    // The listener runs on its own threads; this runtime only watches for signals.
    let signals = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to start signal runtime: {e}");
            std::process::exit(1);
        }
    };

    match server.start() {
        Ok(()) => tracing::info!("Web interface available at {}/api/", server.url().unwrap_or_default()),
        Err(e) => tracing::warn!("HTTP server is not listening ({}); waiting for Ctrl+C", e),
    }
    if let ServerStatus::BindFailed(reason) = server.status() {
        eprintln!("mediafront: {reason}");
    }

    wait_for_shutdown(&signals);
    tracing::info!("Shutting down...");
    server.stop();
    tracing::info!("Goodbye.");
}
