//! The roomcast relay server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin roomcast-server -- --bind 0.0.0.0:3000
//! ```

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use roomcast::logger::setup_logger;
use roomcast::prelude::*;

#[derive(Debug, Parser)]
#[command(name = "roomcast-server", version, about = "Minimal real-time chat relay")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = roomcast::DEFAULT_BIND)]
    bind: String,

    /// Seconds between idle checks for each room.
    #[arg(long, default_value_t = 30)]
    reap_interval_secs: u64,

    /// Seconds a room must stay empty before it is deleted.
    #[arg(long, default_value_t = 30)]
    idle_grace_secs: u64,

    /// Maximum queued messages per subscriber.
    #[arg(long, default_value_t = 256)]
    inbox_capacity: usize,

    /// What to do when a subscriber's inbox is full: `disconnect` or
    /// `drop-newest`.
    #[arg(long, default_value_t = OverflowPolicy::Disconnect)]
    overflow: OverflowPolicy,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn room_config(&self) -> RoomConfig {
        RoomConfig {
            reap_interval: Duration::from_secs(self.reap_interval_secs),
            idle_grace: Duration::from_secs(self.idle_grace_secs),
            inbox: InboxConfig {
                capacity: self.inbox_capacity,
                overflow: self.overflow,
            },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    setup_logger(&args.log_level);

    let server = match RoomcastServer::builder()
        .bind(&args.bind)
        .room_config(args.room_config())
        .build()
        .await
    {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(bind = %args.bind, error = %e, "failed to start");
            return ExitCode::FAILURE;
        }
    };

    let result = server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
        })
        .await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server error");
            ExitCode::FAILURE
        }
    }
}
