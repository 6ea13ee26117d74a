// Fri Oct 16 2026 - Alex

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use koncurrent::{EngineConfig, ExecutionContext, ExecutionOutcome, Runtime, TaskError};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author = "Alex")]
#[command(version = "1.0.0")]
#[command(about = "Staged task execution demo", long_about = None)]
struct Args {
    /// JSON engine config
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    workers: Option<usize>,

    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Tasks in the parallel stage
    #[arg(short, long, default_value_t = 4)]
    tasks: usize,

    #[arg(long, default_value_t = 200)]
    sleep_ms: u64,

    /// Make the task at this index fail
    #[arg(long)]
    fail: Option<usize>,

    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long)]
    log_level: Option<String>,

    #[arg(long)]
    no_color: bool,
}

fn main() {
    let args = Args::parse();

    if args.no_color {
        colored::control::set_override(false);
    }

    match run(args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {:#}", "[!]".red(), e);
            std::process::exit(1);
        }
    }
}

fn run(args: Args) -> anyhow::Result<bool> {
    let config = load_config(&args)?;
    setup_logging(&config.log_level);

    let runtime = Runtime::new(config.clone()).context("Failed to start runtime")?;
    println!(
        "{} Pool: {} workers, queue capacity {}",
        "[*]".blue(),
        config.pool_workers,
        config.pool_queue_capacity
    );

    let sleep = Duration::from_millis(args.sleep_ms);
    let task_count = args.tasks;
    let prepare = runtime.immediate("prepare", move |_| {
        log::info!("Preparing {} tasks", task_count);
        Ok(())
    });

    let workers = (0..args.tasks).map(|index| {
        let fail = args.fail == Some(index);
        runtime.pooled(&format!("work-{}", index), move |ctx| {
            ctx.sleep(sleep)?;
            if fail {
                return Err(TaskError::msg(format!("task {} failed", index)));
            }
            log::debug!("Task {} done", index);
            Ok(())
        })
    });

    let execution = koncurrent::execute_serial([prepare]).execute_parallel(workers);

    let root = ExecutionContext::background();
    let ctx = match args.timeout_ms {
        Some(ms) => root.with_timeout(Duration::from_millis(ms)),
        None => root,
    };

    println!(
        "{} Running {} stages, {} tasks",
        "[*]".blue(),
        execution.stage_count(),
        execution.task_count()
    );
    let start = Instant::now();
    let outcome = execution.wait(&ctx);
    let elapsed = start.elapsed();

    print_outcome(&outcome);
    println!("{} Finished in {:.2?}", "[*]".blue(), elapsed);

    runtime.shutdown();
    let stats = runtime.stats();
    log::debug!(
        "Pool stats: submitted {}, completed {}, unrecovered panics {}",
        stats.submitted,
        stats.completed,
        stats.unrecovered_panics
    );

    Ok(outcome.is_ok())
}

fn load_config(args: &Args) -> anyhow::Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    if let Some(workers) = args.workers {
        config = config.with_pool_workers(workers);
    }
    if let Some(capacity) = args.queue_capacity {
        config = config.with_pool_queue_capacity(capacity);
    }
    if let Some(level) = &args.log_level {
        config = config.with_log_level(level.as_str());
    }

    config.validate()?;
    Ok(config)
}

fn setup_logging(level: &str) {
    let level = match level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}

fn print_outcome(outcome: &ExecutionOutcome) {
    for (stage, slots) in outcome.results.stages().iter().enumerate() {
        println!("{}", format!("Stage {}", stage).cyan().bold());
        for (slot, result) in slots.iter().enumerate() {
            match result {
                None => println!("  {} task {}", "[+]".green(), slot),
                Some(error) if error.is_interrupted() => {
                    println!("  {} task {}: {}", "[-]".yellow(), slot, error)
                }
                Some(error) => println!("  {} task {}: {}", "[!]".red(), slot, error),
            }
        }
    }

    if let Some(reason) = outcome.results.interrupted() {
        println!("{} Interrupted: {}", "[-]".yellow(), reason);
    }
    match &outcome.error {
        None => println!("{} All tasks succeeded", "[+]".green()),
        Some(error) => println!("{} {}", "[!]".red(), error.to_string().red()),
    }
}
