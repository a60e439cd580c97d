mod cli;

use clap::Parser;
use cli::Cli;
use reef_worker::config::WorkerConfig;
use reef_worker::worker::Worker;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = WorkerConfig::load().unwrap_or_else(|err| {
        eprintln!("configuration error: {err}");
        std::process::exit(1);
    });

    if cli.config_check {
        print_config_summary(&config);
        return Ok(());
    }

    let worker = Worker::bootstrap(config).await.unwrap_or_else(|err| {
        tracing::error!(error = %err, "startup failed");
        std::process::exit(1);
    });

    let exit_code = worker.run().await;
    std::process::exit(exit_code);
}

/// Print a human-readable config summary for `--config-check` (spec
/// SPEC_FULL.md CLI module: a container health-check probe that loads
/// and validates config without entering the polling loop).
fn print_config_summary(config: &WorkerConfig) {
    println!("configuration OK");
    println!("  api_endpoint:     {}", config.api_endpoint);
    println!(
        "  job_types:        {}",
        config
            .job_types
            .iter()
            .map(|t| t.as_tag())
            .collect::<Vec<_>>()
            .join(",")
    );
    println!("  data_path:        {}", config.data_path.display());
    println!("  cache_path:       {}", config.cache_path.display());
    println!("  aws_region:       {}", config.aws_region);
    println!("  s3_endpoint:      {}", config.s3_endpoint.as_deref().unwrap_or("(default)"));
    println!("  poll_interval_ms: {}", config.poll_interval_ms);
    println!("  idle_timeout_ms:  {}", config.idle_timeout_ms);
    println!(
        "  sentry:           {}",
        if config.sentry_dsn.is_some() { "enabled" } else { "disabled" }
    );
}
