//! Tether - remote interactive evaluation console

mod config;

use std::io::{self, BufReader};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tether_console::{Channel, Console, SessionEnd, Terminal};
use tether_host::bindings;
use tether_host::process::CommandSpawner;
use tether_host::runner::TestRunner;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

use crate::config::AppConfig;

/// Serve an interactive Tether console over stdio or TCP
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Serve TCP connections on this address, one console per connection
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<String>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match &args.listen {
        Some(addr) => {
            serve_tcp(addr, &config)?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            let session_config = config.clone();
            let end = on_session_thread(&config, move || {
                let terminal = Terminal::new(io::stdin().lock(), io::stdout().lock());
                serve(terminal, &session_config)
            })
            .context("console session failed")?;
            Ok(match end {
                SessionEnd::ChannelClosed => ExitCode::SUCCESS,
                SessionEnd::Exited(code) => ExitCode::from(exit_status(code)),
            })
        }
    }
}

/// Process exit status for `exit(code)`: the low byte, as a shell sees it.
fn exit_status(code: i32) -> u8 {
    (code & 0xff) as u8
}

/// Logs go to stderr, never to the channel.
fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .without_time()
        .with_target(false)
        .with_ansi(false)
        .compact()
        .with_filter(level);
    Registry::default().with(layer).init();
}

/// Run one console session on `channel`.
fn serve<C: Channel>(channel: C, config: &AppConfig) -> Result<SessionEnd> {
    let mut console = Console::new(channel, config.console.clone());
    if let Some(host) = &config.host {
        bindings::install(
            console.interpreter_mut(),
            TestRunner::new(CommandSpawner, host.clone()),
        );
    }
    Ok(console.run()?)
}

/// Stack beyond the evaluation budget for the session loop and the parser.
const SESSION_STACK_HEADROOM: usize = 4 * 1024 * 1024;

/// Run a session on its own thread, sized for the configured stack limit.
fn on_session_thread<T: Send + 'static>(
    config: &AppConfig,
    session: impl FnOnce() -> Result<T> + Send + 'static,
) -> Result<T> {
    thread::Builder::new()
        .name("console".into())
        .stack_size(config.console.stack_limit.saturating_add(SESSION_STACK_HEADROOM))
        .spawn(session)
        .context("cannot start console thread")?
        .join()
        .map_err(|_| anyhow!("console thread panicked"))?
}

/// Accept connections one at a time; each gets a fresh console.
fn serve_tcp(addr: &str, config: &AppConfig) -> Result<()> {
    let listener = TcpListener::bind(addr).with_context(|| format!("cannot listen on {addr}"))?;
    info!(addr = %listener.local_addr()?, "listening");
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                warn!(%err, "accept failed");
                continue;
            }
        };
        let peer = stream
            .peer_addr()
            .map_or_else(|_| "unknown".to_string(), |addr| addr.to_string());
        info!(%peer, "connection accepted");
        let reader = BufReader::new(stream.try_clone()?);
        let session_config = config.clone();
        let session = move || serve(Terminal::new(reader, stream), &session_config);
        match on_session_thread(config, session) {
            Ok(end) => info!(%peer, ?end, "connection finished"),
            Err(err) => warn!(%peer, "connection failed: {err:#}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_keeps_low_byte() {
        assert_eq!(exit_status(0), 0);
        assert_eq!(exit_status(4), 4);
        assert_eq!(exit_status(-1), 255);
        assert_eq!(exit_status(256), 0);
        assert_eq!(exit_status(i32::MIN), 0);
    }
}
