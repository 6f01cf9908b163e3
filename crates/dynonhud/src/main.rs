mod logging;
mod server;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use dynonhud_cache::TelemetryCache;
use dynonhud_decoder::EfisEmsDecoder;
use dynonhud_feed::FeedLoop;
use dynonhud_link::{LinkConfig, SerialLink};
use tracing::info;

use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::server::StatusServer;

#[derive(Parser, Debug)]
#[command(
    name = "dynonhud",
    version,
    about = "Dynon EFIS/EMS serial bridge with an HTTP status view"
)]
struct Cli {
    /// Serial device to read. Repeat for multiple feeds, one thread each.
    #[arg(
        long = "device",
        value_name = "PATH",
        default_values_t = vec![String::from("/dev/ttyUSB0"), String::from("/dev/ttyUSB1")]
    )]
    devices: Vec<String>,

    /// TCP port for the HTTP status view.
    #[arg(long, value_name = "PORT", default_value_t = 8180)]
    http_port: u16,

    /// Seconds a decoded package stays servable without a fresh frame.
    #[arg(long, value_name = "SECONDS", default_value_t = 1.0, value_parser = positive_seconds, allow_negative_numbers = true)]
    max_age: f64,

    /// Upper bound, in seconds, on a single serial read.
    #[arg(long, value_name = "SECONDS", default_value_t = 10.0, value_parser = positive_seconds, allow_negative_numbers = true)]
    read_timeout: f64,

    /// Seconds of silence on an open link before forcing a reconnect.
    #[arg(long, value_name = "SECONDS", default_value_t = 30.0, value_parser = positive_seconds, allow_negative_numbers = true)]
    idle_reconnect: f64,

    /// Log output format.
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Minimum log level.
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Append logs to this file instead of stderr.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

/// Duration flags feed `Duration::from_secs_f64`, which rejects negative and
/// non-finite values by panicking; gate them at the parser instead.
fn positive_seconds(text: &str) -> Result<f64, String> {
    let value: f64 = text
        .parse()
        .map_err(|_| format!("{text:?} is not a number"))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("{text:?} is not a positive number of seconds"))
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = init_logging(cli.log_format, cli.log_level, cli.log_file.as_deref()) {
        eprintln!("error: cannot open log file: {err}");
        std::process::exit(1);
    }

    if let Err(err) = ctrlc::set_handler(|| {
        info!("shutdown requested");
        std::process::exit(0);
    }) {
        eprintln!("error: cannot install shutdown handler: {err}");
        std::process::exit(1);
    }

    let max_age = Duration::from_secs_f64(cli.max_age);
    let efis = Arc::new(TelemetryCache::new(max_age));
    let ems = Arc::new(TelemetryCache::new(max_age));
    let decoder = Arc::new(EfisEmsDecoder::new(efis, ems));

    for device in &cli.devices {
        let mut config = LinkConfig::new(device);
        config.read_timeout = Duration::from_secs_f64(cli.read_timeout);
        config.idle_reconnect = Duration::from_secs_f64(cli.idle_reconnect);

        let feed = FeedLoop::new(SerialLink::new(config), Arc::clone(&decoder));
        let spawned = thread::Builder::new()
            .name(format!("feed {device}"))
            .spawn(move || feed.run());
        if let Err(err) = spawned {
            eprintln!("error: cannot start feed for {device}: {err}");
            std::process::exit(1);
        }
        info!(device = %device, "feed started");
    }

    match StatusServer::bind(cli.http_port, Arc::clone(&decoder)) {
        Ok(server) => server.serve(),
        Err(err) => {
            eprintln!("error: cannot bind status port {}: {err}", cli.http_port);
            std::process::exit(1);
        }
    }
}
