//! # CAN Logger Entry Point
//!
//! Waits for the sniffer to come up, then records its log to
//! `ets_can_log_<timestamp>.csv` until Ctrl+C.

use can_logger::poll::Watermark;
use can_logger::record::session_file_name;
use can_logger::{
    ConnectionGate, ConsoleReporter, CsvRecordWriter, HttpDevice, LoggerConfig, PollLoop,
};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "can-logger")]
#[command(about = "Record a WiFi CAN sniffer's log to CSV", long_about = None)]
struct Cli {
    /// Device address (IP, host or URL)
    #[arg(env = "CAN_LOGGER_DEVICE", default_value = can_logger::config::DEFAULT_DEVICE_ADDR)]
    device: String,

    /// Directory to write the session CSV into
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Milliseconds between polls
    #[arg(long, default_value_t = 200, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_ms: u64,

    /// Milliseconds to wait after a failed poll (raised to twice the poll
    /// interval if shorter)
    #[arg(long, default_value_t = 1000)]
    failure_backoff_ms: u64,

    /// Print every CAN frame, not just marks
    #[arg(short, long)]
    verbose: bool,

    /// Disable ANSI colours
    #[arg(long)]
    no_color: bool,
}

impl From<Cli> for LoggerConfig {
    fn from(cli: Cli) -> Self {
        LoggerConfig {
            device_addr: cli.device,
            output_dir: cli.output_dir,
            verbose: cli.verbose,
            color: !cli.no_color,
            ..LoggerConfig::default()
        }
        .with_poll_timing(
            Duration::from_millis(cli.poll_interval_ms),
            Duration::from_millis(cli.failure_backoff_ms),
        )
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let config = LoggerConfig::from(Cli::parse());

    let base_url = config.base_url()?;
    let output_file = config
        .output_dir
        .join(session_file_name(&chrono::Local::now()));

    println!("ETS CAN Bus Logger");
    println!("==================");
    println!("Device address: {}", base_url);
    println!("Output file:    {}", output_file.display());
    println!();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let device = HttpDevice::new(base_url, config.request_timeout)?;
    let mut reporter = ConsoleReporter::new(config.verbose, config.color, config.progress_every);

    print!("Connecting to device...");
    let _ = std::io::stdout().flush();
    let gate = ConnectionGate::new(&device, config.gate.clone());
    if gate.await_reachable(&mut reporter, &cancel).await.is_none() {
        println!("\n\nCancelled before the device answered; nothing recorded.");
        return Ok(());
    }

    let mut sink = match CsvRecordWriter::create(&output_file) {
        Ok(sink) => sink,
        Err(e) => {
            eprintln!("✗ Failed to open record: {}", e);
            return Err(e.into());
        }
    };
    println!(
        "Logging to {} -- press Ctrl+C to stop\n",
        output_file.display()
    );

    let poll_loop = PollLoop::new(&device, config.poll.clone());
    let summary = match poll_loop
        .run(Watermark::default(), &mut sink, &mut reporter, &cancel)
        .await
    {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("\n✗ Logging stopped: {}", e);
            eprintln!("  Rows flushed so far remain in {}", output_file.display());
            return Err(e.into());
        }
    };

    println!(
        "\n\nDone. {} messages and {} marks saved to {}",
        summary.entries_appended,
        summary.annotations_appended,
        output_file.display()
    );

    Ok(())
}
