#[macro_use]
extern crate log;

mod checkpoints;
mod cli;
mod config;
mod constants;
mod credentials;
mod event_hubs;
mod http;
mod lag;
mod logging;
mod monitor;
mod prometheus_metrics;
mod scheduler;

use std::process;
use std::sync::Arc;

use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cli::Cli;
use crate::config::EmitterConfig;
use crate::constants::{EVENTHUBS_SCOPE, MONITOR_SCOPE, STORAGE_SCOPE, USER_AGENT};
use crate::scheduler::PollScheduler;

const HTTP_CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    let cli = parse_cli_and_init_logging();
    let config = build_config_or_exit(&cli);

    let shutdown_token = build_shutdown_token();

    // Init `prometheus_metrics` module
    let metrics = Arc::new(prometheus_metrics::init(&config));

    let http_client = build_http_client();

    // Init `credentials` module, and warm up the token of every scope
    let tokens = credentials::init(&config.credential, http_client.clone(), metrics.clone());
    tokens.prefetch(&[MONITOR_SCOPE, EVENTHUBS_SCOPE, STORAGE_SCOPE]).await;

    // Init `event_hubs` and `checkpoints` modules
    let hub_client = Arc::new(
        event_hubs::init(http_client.clone(), tokens.clone(), &config).unwrap_or_else(|e| exit_config_error(e)),
    );
    let checkpoint_store = Arc::new(
        checkpoints::init(http_client.clone(), tokens.clone(), &config).unwrap_or_else(|e| exit_config_error(e)),
    );

    // Reader groups and partitions are resolved once
    let topology = match event_hubs::resolve_topology(hub_client.as_ref(), &config.reader_groups).await {
        Ok(t) => t,
        Err(e) => {
            error!("Unable to resolve Consumer Groups and Partitions of '{}': {e}", config.event_hub);
            process::exit(exit_code::SERVICE_UNAVAILABLE);
        },
    };

    // Init `lag` module
    let aggregator = lag::init(hub_client, checkpoint_store, config.max_concurrent_lookups, metrics.clone());

    // Init `monitor` module
    let publisher = monitor::init(&config, http_client, tokens, metrics.clone());

    // Bind the internal metrics endpoint before polling starts
    let listener = http::bind(cli.listen_on()).await.unwrap_or_else(|e| {
        error!("Unable to listen on '{}': {e}", cli.listen_on());
        process::exit(exit_code::SERVICE_UNAVAILABLE);
    });

    let scheduler = Arc::new(PollScheduler::new(
        topology,
        aggregator,
        publisher,
        config.poll_interval,
        metrics.clone(),
    ));
    let scheduler_handle = scheduler.spawn(shutdown_token.clone());

    // Serve internal metrics until shutdown
    let mut failed = false;
    if let Err(e) = http::serve(listener, shutdown_token.clone(), metrics).await {
        error!("HTTP server terminated with error: {e}");
        shutdown_token.cancel();
        failed = true;
    }

    match scheduler_handle.await {
        Ok(state) => info!("Scheduler terminated: {state:?}"),
        Err(e) => {
            error!("Scheduler task failed: {e}");
            failed = true;
        },
    }

    if failed {
        process::exit(exit_code::SOFTWARE_ERROR);
    }
}

fn parse_cli_and_init_logging() -> Cli {
    // Parse command line input and initialize logging
    let cli = Cli::parse_and_validate();
    logging::init(cli.verbosity_level());

    cli
}

fn build_config_or_exit(cli: &Cli) -> EmitterConfig {
    cli.build_emitter_config().unwrap_or_else(|e| exit_config_error(e))
}

fn exit_config_error(e: config::ConfigError) -> ! {
    error!("{e}");
    process::exit(exit_code::CONFIG_ERROR);
}

fn build_shutdown_token() -> CancellationToken {
    let shutdown_token = CancellationToken::new();

    // Setup shutdown signal handler:
    // when it's time to shutdown, cancels the token and all clones get notified.
    //
    // NOTE: This handler will be listening on its own dedicated thread.
    let shutdown_token_clone = shutdown_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Shutting down...");
        shutdown_token_clone.cancel();
    }) {
        error!("Failed to register signal handler: {e}");
    }

    shutdown_token
}

fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder().user_agent(USER_AGENT).timeout(HTTP_CLIENT_TIMEOUT).build().unwrap_or_else(|e| {
        error!("Failed to build HTTP client: {e}");
        process::exit(exit_code::SOFTWARE_ERROR);
    })
}
