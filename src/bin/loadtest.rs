// Paced load generator for exercising the limiter and balancer services.

use std::time::{Duration, Instant};

use clap::Parser;
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tokio::time;

#[derive(Parser, Debug)]
#[command(name = "loadtest")]
#[command(about = "Paced HTTP load generator for the rate limiter stack")]
struct Args {
    /// Desired requests per second
    #[arg(long, default_value_t = 100)]
    rps: u32,

    /// Test duration in seconds
    #[arg(long, default_value_t = 10)]
    duration: u64,

    /// Target URL
    #[arg(long, default_value = "http://localhost:8080")]
    url: String,
}

struct Outcome {
    status: Option<StatusCode>,
    latency: Duration,
}

#[derive(Debug, Default)]
struct Stats {
    success: u64,
    limited: u64,
    errors: u64,
    total_latency: Duration,
    min_latency: Option<Duration>,
    max_latency: Duration,
}

impl Stats {
    fn record(&mut self, outcome: &Outcome) {
        match outcome.status {
            Some(StatusCode::OK) => self.success += 1,
            Some(StatusCode::TOO_MANY_REQUESTS) => self.limited += 1,
            _ => self.errors += 1,
        }

        if outcome.status.is_some() {
            self.total_latency += outcome.latency;
            self.max_latency = self.max_latency.max(outcome.latency);
            self.min_latency = Some(
                self.min_latency
                    .map_or(outcome.latency, |min| min.min(outcome.latency)),
            );
        }
    }

    fn total(&self) -> u64 {
        self.success + self.limited + self.errors
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let client = reqwest::Client::new();

    println!(
        "Starting load test: {} rps for {}s against {}",
        args.rps, args.duration, args.url
    );

    let (tx, mut rx) = mpsc::unbounded_channel::<Outcome>();
    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut pacer = time::interval(Duration::from_secs_f64(1.0 / f64::from(args.rps.max(1))));

    let started = Instant::now();
    while Instant::now() < deadline {
        pacer.tick().await;

        let client = client.clone();
        let url = args.url.clone();
        let tx = tx.clone();

        tokio::spawn(async move {
            let begin = Instant::now();
            let status = match client.get(&url).send().await {
                Ok(response) => Some(response.status()),
                Err(err) => {
                    eprintln!("request error: {err}");
                    None
                }
            };
            let _ = tx.send(Outcome {
                status,
                latency: begin.elapsed(),
            });
        });
    }
    drop(tx);

    // In-flight requests hold sender clones; draining waits them out.
    let mut stats = Stats::default();
    while let Some(outcome) = rx.recv().await {
        stats.record(&outcome);
    }

    print_summary(&stats, started.elapsed());
}

fn print_summary(stats: &Stats, elapsed: Duration) {
    let total = stats.total();
    let actual_rps = (stats.success + stats.limited) as f64 / elapsed.as_secs_f64();

    println!("\nLoad Test Results:");
    println!("Duration: {elapsed:.2?}");
    println!("Total Requests: {total}");
    println!("Successful: {}", stats.success);
    println!("Rate Limited: {}", stats.limited);
    println!("Errors: {}", stats.errors);
    println!("Actual RPS: {actual_rps:.2}");
    println!("Latency:");
    println!("  Min: {:?}", stats.min_latency.unwrap_or_default());
    println!("  Max: {:?}", stats.max_latency);
    if total > 0 {
        println!("  Avg: {:?}", stats.total_latency / total as u32);
    }
}
