//! code-executor CLI - run submissions without the HTTP service

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use code_executor_core::request::SubmittedRequest;
use code_executor_core::{
    EntryPoint, ExecutionResult, Executor, ExecutorConfig, ExecutorError, ValidationError,
};
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "code-executor")]
#[command(author, version, about = "Run untrusted Python code in an isolated worker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Interpreter used for workers
    #[arg(long, global = true)]
    python: Option<PathBuf>,

    /// Log level (logs go to stderr)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Read one JSON request from stdin, write one JSON result to stdout
    Batch,

    /// Execute code given on the command line
    Run {
        /// Code to execute (or - for stdin)
        code: String,

        /// Timeout in seconds
        #[arg(short, long, default_value = "30")]
        timeout: u64,

        /// Memory limit in MB
        #[arg(short, long)]
        memory: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = ExecutorConfig::default();
    config.apply_env()?;
    if let Some(python) = cli.python {
        config.python_path = python;
    }

    match cli.command.unwrap_or(Commands::Batch) {
        Commands::Batch => {
            let mut body = Vec::new();
            std::io::stdin()
                .read_to_end(&mut body)
                .context("failed to read stdin")?;

            let result = match Executor::new(config) {
                Ok(executor) => batch_result(executor.execute_body(&body, EntryPoint::Batch).await),
                Err(e) => batch_result(Err(e)),
            };
            emit(&serde_json::to_string(&result)?)?;
        }

        Commands::Run {
            code,
            timeout,
            memory,
        } => {
            let code = if code == "-" {
                let mut code = String::new();
                std::io::stdin()
                    .read_to_string(&mut code)
                    .context("failed to read stdin")?;
                code
            } else {
                code
            };

            if let Some(mb) = memory {
                config.limits.address_space = memory_limit_bytes(mb)?;
            }
            let executor = Executor::new(config)?;
            let submitted = SubmittedRequest {
                code: Some(code),
                timeout: i64::try_from(timeout).ok(),
            };
            let request = executor.validator().validate(submitted, EntryPoint::Batch)?;

            let result = executor.execute(&request).await?;
            emit(&serde_json::to_string_pretty(&result)?)?;
        }
    }

    Ok(())
}

/// Every outcome of a batch run, failures included, becomes one result object
fn batch_result(outcome: code_executor_core::Result<ExecutionResult>) -> ExecutionResult {
    match outcome {
        Ok(result) => result,
        Err(ExecutorError::Validation(ValidationError::MalformedJson(_) | ValidationError::Encoding)) => {
            ExecutionResult::rejected("Invalid JSON input")
        }
        Err(ExecutorError::Validation(e)) => ExecutionResult::rejected(e.to_string()),
        Err(e) => {
            tracing::error!(error = %e, "batch execution failed");
            ExecutionResult::rejected(format!("Executor error: {e}"))
        }
    }
}

fn memory_limit_bytes(mb: u64) -> Result<u64> {
    mb.checked_mul(1024 * 1024)
        .with_context(|| format!("invalid --memory: {mb}MB does not fit in a byte count"))
}

fn emit(line: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()?;
    Ok(())
}
