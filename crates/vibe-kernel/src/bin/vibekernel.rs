use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vibe_kernel::{JsonLinesTransport, Kernel, KernelConfig, KernelResult, Session};

/// Native stack for the interpreter thread; guest recursion is deep.
const INTERPRETER_STACK: usize = 64 * 1024 * 1024;

/// Serve kernel requests as JSON lines on stdin and stdout.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, env = "VIBEKERNEL_CONFIG")]
    config: Option<PathBuf>,

    /// Guest call depth limit (overrides the config file)
    #[arg(long)]
    max_call_depth: Option<usize>,

    /// Log filter, e.g. "debug" or "vibe_kernel=trace"
    #[arg(long, env = "VIBEKERNEL_LOG", default_value = "info")]
    log: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries protocol messages, so logs go to stderr.
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let worker = thread::Builder::new()
        .name("interpreter".into())
        .stack_size(INTERPRETER_STACK)
        .spawn(move || serve(config));
    let outcome = match worker {
        Ok(handle) => handle.join(),
        Err(err) => {
            error!(%err, "failed to start interpreter thread");
            return ExitCode::FAILURE;
        }
    };
    match outcome {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(err)) => {
            error!(%err, "kernel stopped with an error");
            ExitCode::FAILURE
        }
        Err(_) => {
            error!("interpreter thread panicked");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> KernelResult<KernelConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            KernelConfig::from_file(path)?
        }
        None => KernelConfig::default(),
    };
    if let Some(depth) = cli.max_call_depth {
        config.max_call_depth = depth;
    }
    config.validate()?;
    Ok(config)
}

fn serve(config: KernelConfig) -> KernelResult<()> {
    info!(kernel = %config.kernel_name, max_call_depth = config.max_call_depth, "starting kernel");
    let transport = JsonLinesTransport::new(io::stdout());
    let mut kernel = Kernel::new(Session::with_config(config), transport);
    kernel.run(io::stdin().lock())
}
