use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loadpool_runtime::telemetry::SysinfoTelemetry;
use loadpool_runtime::{
    BoundedChannel, CapacityScore, ChannelConfig, ChannelError, LoadSample, LoadSampler,
    PoolError, PoolSizer, SamplerConfig, SizerConfig,
};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "loadpoolctl", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the load sampler against this host and print each sample
    Sample {
        /// Number of cycles to print before exiting
        #[arg(long, default_value_t = 3)]
        cycles: u64,
        /// Delay before the first cycle (e.g. 10s, 250ms)
        #[arg(long, value_parser = humantime::parse_duration)]
        initial_delay: Option<Duration>,
        /// Delay between cycles
        #[arg(long, value_parser = humantime::parse_duration)]
        interval: Option<Duration>,
        /// Print samples as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Resolve a pool size and print it
    Size {
        #[arg(long, allow_negative_numbers = true)]
        requested: i64,
        /// Scale the request by the current capacity score
        #[arg(long)]
        use_load: bool,
        /// Use this capacity score instead of sampling the host
        #[arg(long)]
        score: Option<u32>,
        #[arg(long, env = "LOADPOOL_MAX_POOL_SIZE")]
        max_pool_size: Option<usize>,
    },
    /// Producer/consumer hand-off through a bounded channel
    Handoff {
        #[arg(long, default_value_t = 10)]
        messages: usize,
        #[arg(long, default_value_t = 2)]
        consumers: usize,
        #[arg(long, env = "LOADPOOL_CHANNEL_CAPACITY")]
        capacity: Option<usize>,
    },
    /// Time two summation loops run concurrently on a load-sized pool, then serially
    Bench {
        #[arg(long, default_value_t = 100_000_000)]
        count: u64,
    },
    /// Print version and exit
    Version,
}

fn init_tracing() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Sample {
            cycles,
            initial_delay,
            interval,
            json,
        } => {
            let defaults = SamplerConfig::from_env();
            let config = SamplerConfig {
                initial_delay: initial_delay.unwrap_or(defaults.initial_delay),
                interval: interval.unwrap_or(defaults.interval),
            };
            run_sample(config, cycles, json).await?;
        }
        Commands::Size {
            requested,
            use_load,
            score,
            max_pool_size,
        } => {
            let mut config = SizerConfig::from_env();
            if let Some(max) = max_pool_size {
                config = config.with_max_pool_size(max);
            }
            let score = match (use_load, score) {
                (_, Some(score)) => score,
                (true, None) => sample_once().await?.score,
                (false, None) => 0,
            };
            let sizer = PoolSizer::new(Arc::new(CapacityScore::with_score(score)), config);
            match sizer.executor_service(use_load, requested) {
                Ok(pool) => {
                    println!("{}", pool.size());
                    pool.shutdown();
                }
                Err(e @ PoolError::InvalidArgument { .. }) => {
                    eprintln!("Error: {e}");
                    std::process::exit(2);
                }
                Err(e) => return Err(e).context("failed to create worker pool"),
            }
        }
        Commands::Handoff {
            messages,
            consumers,
            capacity,
        } => {
            let config = match capacity {
                Some(capacity) => ChannelConfig { capacity },
                None => ChannelConfig::from_env(),
            };
            tokio::task::spawn_blocking(move || handoff(messages, consumers, &config))
                .await
                .context("hand-off task panicked")??;
        }
        Commands::Bench { count } => {
            run_bench(count).await?;
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
    }
    Ok(())
}

async fn sample_once() -> Result<LoadSample> {
    let mut sampler = LoadSampler::new(
        Arc::new(SysinfoTelemetry::new()),
        Arc::new(CapacityScore::new()),
        SamplerConfig::default(),
    );
    tokio::task::spawn_blocking(move || sampler.sample())
        .await
        .context("telemetry read panicked")
}

async fn run_sample(config: SamplerConfig, cycles: u64, json: bool) -> Result<()> {
    let sampler = LoadSampler::new(
        Arc::new(SysinfoTelemetry::new()),
        Arc::new(CapacityScore::new()),
        config,
    );
    let handle = sampler.spawn();
    let mut samples = handle.subscribe();

    for _ in 0..cycles {
        samples
            .changed()
            .await
            .context("load sampler stopped unexpectedly")?;
        let Some(sample) = samples.borrow_and_update().clone() else {
            continue;
        };
        if json {
            println!("{}", serde_json::to_string(&sample)?);
        } else {
            println!(
                "score={} load={} sys_cpu={:.3} proc_cpu={:.3} memory={:.3} threads={:.3} swap_free={:.3}{}",
                sample.score,
                sample.load(),
                sample.system_cpu_load,
                sample.process_cpu_load,
                sample.memory_usage_ratio,
                sample.thread_ratio,
                sample.swap_free_ratio,
                if sample.is_partial() { " (partial)" } else { "" },
            );
        }
    }

    if let Err(e) = handle.shutdown().await {
        warn!(error = %e, "Load sampler task did not stop cleanly");
    }
    Ok(())
}

fn handoff(messages: usize, consumers: usize, config: &ChannelConfig) -> Result<()> {
    let channel = Arc::new(BoundedChannel::<String>::with_config(config));
    info!(
        messages,
        consumers,
        capacity = channel.capacity(),
        "Starting hand-off"
    );

    let mut handles = Vec::with_capacity(consumers);
    for n in 1..=consumers.max(1) {
        let channel = Arc::clone(&channel);
        let name = format!("consumer-{n}");
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || loop {
                match channel.pop() {
                    Ok(message) => println!("{name} {message}"),
                    Err(ChannelError::Closed) => return Ok(()),
                    Err(e) => return Err(e),
                }
            })
            .with_context(|| format!("failed to spawn consumer {n}"))?;
        handles.push(handle);
    }

    for i in 1..=messages {
        channel
            .push(format!("message{i}"))
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        thread::sleep(Duration::from_millis(10));
    }
    channel.close();

    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("consumer thread panicked"))??;
    }
    Ok(())
}

fn sum_up(count: u64) -> u64 {
    let mut a: u64 = 0;
    for _ in 0..count {
        a = black_box(a.wrapping_add(5));
    }
    a
}

fn count_down(count: u64) -> u64 {
    let mut b = count;
    for _ in 0..count {
        b = black_box(b.wrapping_sub(1));
    }
    b
}

async fn run_bench(count: u64) -> Result<()> {
    let capacity = Arc::new(CapacityScore::with_score(sample_once().await?.score));
    let sizer = PoolSizer::new(capacity, SizerConfig::from_env());
    let pool = sizer
        .executor_service(true, 10)
        .context("failed to create benchmark pool")?;

    let start = Instant::now();
    let (up_tx, up_rx) = oneshot::channel();
    let (down_tx, down_rx) = oneshot::channel();
    pool.execute(move || {
        let _ = up_tx.send(sum_up(count));
    })?;
    pool.execute(move || {
        let _ = down_tx.send(count_down(count));
    })?;
    let a = up_rx.await.context("summation job dropped its result")?;
    let b = down_rx.await.context("summation job dropped its result")?;
    let concurrent = start.elapsed();
    pool.shutdown();
    println!(
        "concurrency: {} a={a} b={b}",
        humantime::format_duration(concurrent)
    );

    let serial = tokio::task::spawn_blocking(move || {
        let start = Instant::now();
        let a = sum_up(count);
        let b = count_down(count);
        (start.elapsed(), a, b)
    })
    .await
    .context("serial benchmark panicked")?;
    println!(
        "serial: {} a={} b={}",
        humantime::format_duration(serial.0),
        serial.1,
        serial.2
    );
    Ok(())
}
