use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::host::{RecordingSurface, StdoutSink, Surface};
use crate::init::InitBuilder;
use crate::interpreter::{check, Program, Runtime, RuntimeError};

#[derive(Parser)]
#[command(name = "linescript")]
#[command(about = "linescript - run line-oriented scripts", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a program
    Run {
        /// Program file
        file: PathBuf,

        /// Echo every line before it runs
        #[arg(long)]
        trace: bool,

        /// Stop the run after this many milliseconds
        #[arg(long = "for", value_name = "MS")]
        duration_ms: Option<u64>,
    },

    /// Report unknown statements and unterminated blocks without running
    Check {
        /// Program file
        file: PathBuf,
    },
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

/// Internal function that handles CLI commands
async fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Eagerly load and validate configuration before executing any command
    let config = Config::builder()
        .config_path(cli.config.clone())
        .build()
        .context("Failed to load configuration")?;

    init_logging(&config.log.filter);

    match cli.command {
        Commands::Run {
            file,
            trace,
            duration_ms,
        } => run_file(config, &file, trace, duration_ms.map(Duration::from_millis)).await,
        Commands::Check { file } => check_file(&file),
    }
}

/// `RUST_LOG` wins over the configured filter. Logs go to stderr so program
/// output owns stdout.
fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    // An embedder may have installed a subscriber already
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_source(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

async fn run_file(
    config: Config,
    file: &Path,
    trace: bool,
    limit: Option<Duration>,
) -> Result<()> {
    let source = read_source(file)?;

    let mut builder = InitBuilder::new().config(config).output(Arc::new(StdoutSink));
    if trace {
        builder = builder.trace(true);
    }
    let mut runtime = builder.init()?;

    // Headless: draw calls are recorded, not shown
    let surface = Arc::new(RecordingSurface::new());

    let limiter = limit.map(|limit| {
        let stopper = runtime.stop_handle();
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            info!(limit_ms = limit.as_millis() as u64, "time limit reached");
            stopper.stop();
        })
    });

    let finished = drive(&mut runtime, &source, surface.clone()).await;
    if let Some(limiter) = limiter {
        limiter.abort();
    }

    runtime.stop();
    debug!(draw_ops = surface.ops().len(), "run finished");

    finished.with_context(|| format!("{} failed", file.display()))?;
    runtime
        .settle()
        .await
        .with_context(|| format!("{} failed in the background", file.display()))?;
    Ok(())
}

/// Run the top level, wait for its loops, then keep timers alive until
/// Ctrl-C or HALT
async fn drive(
    runtime: &mut Runtime,
    source: &str,
    surface: Arc<RecordingSurface>,
) -> Result<(), RuntimeError> {
    let surface: Arc<dyn Surface> = surface;
    runtime.start(source, Some(surface)).await?;
    runtime.settle().await?;

    let Some(ctx) = runtime.context().cloned() else {
        return Ok(());
    };
    if ctx.tasks.has_timers() && !ctx.is_halted() {
        info!(tasks = ctx.tasks.live(), "timers running, press Ctrl-C to stop");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("interrupted"),
            _ = ctx.cancelled() => {}
        }
    }
    Ok(())
}

fn check_file(file: &Path) -> Result<()> {
    let source = read_source(file)?;
    let program = Program::from_source(&source);
    let diagnostics = check(&program);

    if diagnostics.is_empty() {
        println!("✓ {} ({} lines)", file.display(), program.len());
        return Ok(());
    }

    for diagnostic in &diagnostics {
        eprintln!("{}: {}", file.display(), diagnostic);
    }
    anyhow::bail!("{} problem(s) found in {}", diagnostics.len(), file.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from(["linescript", "run", "game.ls", "--trace", "--for", "500"]).unwrap();
        match cli.command {
            Commands::Run {
                file,
                trace,
                duration_ms,
            } => {
                assert_eq!(file, PathBuf::from("game.ls"));
                assert!(trace);
                assert_eq!(duration_ms, Some(500));
            }
            Commands::Check { .. } => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_config_is_global() {
        let cli = Cli::try_parse_from(["linescript", "check", "game.ls", "--config", "alt.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
    }

    #[test]
    fn test_check_file() {
        let mut good = tempfile::NamedTempFile::new().unwrap();
        writeln!(good, "SET x TO 1\nWHILE x < 3\nADD x BY 1\nENDWHILE").unwrap();
        assert!(check_file(good.path()).is_ok());

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "SET x TO 1\nWHILE x < 3\nWIGGLE").unwrap();
        let err = check_file(bad.path()).unwrap_err();
        assert!(err.to_string().starts_with("2 problem(s) found"));
    }

    #[tokio::test]
    async fn test_run_file_with_time_limit() {
        let mut program = tempfile::NamedTempFile::new().unwrap();
        writeln!(program, "SET n TO 0\nEVERY 5\nADD n BY 1\nENDEVERY").unwrap();

        let config = Config::builder().isolated().build().unwrap();
        let started = std::time::Instant::now();
        run_file(config, program.path(), false, Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_time_limit_interrupts_top_level() {
        let mut program = tempfile::NamedTempFile::new().unwrap();
        writeln!(program, "SET a TO 1\nSLEEP 600000\nPRINT a").unwrap();

        let config = Config::builder().isolated().build().unwrap();
        let started = std::time::Instant::now();
        run_file(config, program.path(), false, Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
