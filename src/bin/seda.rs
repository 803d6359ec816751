//! seda CLI: exercise and inspect SEDA endpoints.

use clap::{Parser, Subcommand};
use seda_rs::config::{Config, EndpointConfig};
use seda_rs::consumer::Processor;
use seda_rs::endpoint::SedaEndpoint;
use seda_rs::model::{Exchange, ExchangePattern, SubmitOptions, WaitForTaskToComplete};
use seda_rs::telemetry::{TelemetryConfig, init_telemetry};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

#[derive(Parser)]
#[command(name = "seda", about = "Queue-mediated hand-off between producers and consumers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit exchanges to an echo consumer and report each outcome
    Demo {
        /// Endpoint URI (defaults to SEDA_ENDPOINT, then seda:default)
        #[arg(long)]
        endpoint: Option<String>,
        /// Number of exchanges to submit concurrently
        #[arg(long, default_value_t = 5)]
        count: usize,
        /// Per-call wait policy override (never, if-reply-expected, always)
        #[arg(long)]
        wait: Option<WaitForTaskToComplete>,
        /// Per-call timeout override in ms (<= 0 waits indefinitely)
        #[arg(long, allow_hyphen_values = true)]
        timeout_ms: Option<i64>,
        /// Simulated processing time per exchange
        #[arg(long, default_value_t = 100)]
        delay_ms: u64,
        /// Fail every Nth exchange in the consumer
        #[arg(long)]
        fail_every: Option<u64>,
        /// Submit one-way exchanges instead of request/reply
        #[arg(long)]
        in_only: bool,
    },
    /// Parse an endpoint URI and print its configuration
    Endpoint {
        /// e.g. seda:orders?size=100&timeout=5000
        uri: String,
    },
    /// Validate a TOML file of [[endpoint]] tables and print them
    Endpoints {
        /// Path to the TOML file
        file: PathBuf,
    },
}

/// Echoes the request body back after a delay.
struct EchoProcessor {
    delay: Duration,
    fail_every: Option<u64>,
}

impl Processor for EchoProcessor {
    async fn process(&self, exchange: &mut Exchange) -> Result<(), String> {
        tokio::time::sleep(self.delay).await;
        let n = exchange.body.get("n").and_then(|v| v.as_u64()).unwrap_or(0);
        if let Some(every) = self.fail_every.filter(|every| *every > 0) {
            if n % every == 0 {
                return Err(format!("exchange {n} rejected by echo processor"));
            }
        }
        exchange.out = Some(serde_json::json!({ "echo": exchange.body.clone() }));
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Demo {
            endpoint,
            count,
            wait,
            timeout_ms,
            delay_ms,
            fail_every,
            in_only,
        } => {
            let options = SubmitOptions {
                wait,
                timeout_ms,
            };
            let pattern = if in_only {
                ExchangePattern::InOnly
            } else {
                ExchangePattern::InOut
            };
            let processor = EchoProcessor {
                delay: Duration::from_millis(delay_ms),
                fail_every,
            };
            cmd_demo(endpoint, count, options, pattern, processor).await
        }
        Command::Endpoint { uri } => {
            let config = EndpointConfig::from_uri(&uri)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Command::Endpoints { file } => {
            let endpoints = EndpointConfig::load_toml(&file)?;
            if endpoints.is_empty() {
                println!("No endpoints defined.");
                return Ok(());
            }
            println!(
                "{:<32}  {:<8}  {:<9}  {:<16}  TIMEOUT_MS",
                "URI", "SIZE", "CONSUMERS", "WAIT"
            );
            println!("{}", "-".repeat(84));
            for e in &endpoints {
                println!(
                    "{:<32}  {:<8}  {:<9}  {:<16}  {}",
                    e.uri(),
                    e.size,
                    e.concurrent_consumers,
                    e.wait_for_task_to_complete,
                    e.timeout_ms
                );
            }
            Ok(())
        }
    }
}

async fn cmd_demo(
    endpoint_uri: Option<String>,
    count: usize,
    options: SubmitOptions,
    pattern: ExchangePattern,
    processor: EchoProcessor,
) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "seda".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let endpoint = match endpoint_uri {
        Some(uri) => SedaEndpoint::from_uri(&uri)?,
        None => SedaEndpoint::new(config.endpoint)?,
    };
    let consumer = endpoint.create_consumer(processor);
    let producer = endpoint.create_producer();
    producer.start();

    let started = Instant::now();
    let mut submissions = JoinSet::new();
    for n in 0..count {
        let producer = producer.clone();
        submissions.spawn(async move {
            let mut exchange = Exchange::with_pattern(pattern, serde_json::json!({ "n": n }));
            let result = producer.submit_with(&mut exchange, options).await;
            (n, exchange, result)
        });
    }

    let mut rows = Vec::with_capacity(count);
    while let Some(joined) = submissions.join_next().await {
        rows.push(joined?);
    }
    rows.sort_by_key(|(n, _, _)| *n);

    println!("{:<5}  {:<8}  {:<10}  RESPONSE", "N", "ID", "OUTCOME");
    println!("{}", "-".repeat(72));
    for (n, exchange, result) in &rows {
        let (outcome, detail) = match result {
            Err(e) => ("rejected", e.to_string()),
            Ok(()) => match exchange.failure {
                Some(ref failure) => ("failed", failure.to_string()),
                None => match exchange.out {
                    Some(ref out) => ("completed", out.to_string()),
                    None => ("enqueued", "-".to_string()),
                },
            },
        };
        println!("{:<5}  {:<8}  {:<10}  {}", n, exchange.id(), outcome, detail);
    }

    // Let fire-and-forget exchanges drain before exiting.
    producer.stop();
    endpoint.close();
    consumer.join().await;

    println!(
        "\n{} exchange(s) in {}ms",
        rows.len(),
        started.elapsed().as_millis()
    );
    Ok(())
}
