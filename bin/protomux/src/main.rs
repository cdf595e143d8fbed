use std::net::SocketAddr;

use clap::Parser;
use protomux::{wait_for_signal, MuxConfig, MuxServer, Stopped};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Share one TCP port between an SSH and an HTTP backend by sniffing the
/// first bytes of each connection.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Listen address shared by both protocols
    #[arg(env, long, default_value = "0.0.0.0:8022")]
    listen: SocketAddr,

    /// SSH backend address
    #[arg(env, long, default_value = "127.0.0.1:22")]
    ssh_dest: SocketAddr,

    /// HTTP backend address, also the fallback for unrecognized prefixes
    #[arg(env, long, default_value = "127.0.0.1:80")]
    http_dest: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    //if RUST_LOG env is not set, set it to info
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    let args = Args::parse();
    tracing_subscriber::registry().with(fmt::layer()).with(EnvFilter::from_default_env()).init();

    let server = MuxServer::bind(MuxConfig {
        listen: args.listen,
        ssh_dest: args.ssh_dest,
        http_dest: args.http_dest,
    })
    .await?;

    log::info!("listening on {}", server.local_addr());
    log::info!("proxying SSH to {}", args.ssh_dest);
    log::info!("proxying HTTP to {}", args.http_dest);

    match server.run(wait_for_signal()).await {
        Stopped::Signal(signal) => {
            log::info!("shutdown complete ({signal})");
            Ok(())
        }
        Stopped::AcceptError(e) => {
            log::error!("shutdown after accept error: {e}");
            Err(e.into())
        }
    }
}
