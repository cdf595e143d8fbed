//! Single-listener TCP protocol multiplexer: one external port shared by
//! an SSH and an HTTP backend. Each accepted connection is classified by
//! peeking its first 3 bytes (`SSH` banner or not) and relayed untouched
//! to the matching backend.

use std::{future::Future, io, net::SocketAddr};

use anyhow::Context;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

mod acceptor;
mod detect;
mod peek;
mod session;

pub use detect::{detect, Protocol, Upstreams, PRELUDE_LEN};
pub use peek::Peekable;

pub struct MuxConfig {
    pub listen: SocketAddr,
    pub ssh_dest: SocketAddr,
    pub http_dest: SocketAddr,
}

/// Why the multiplexer stopped. A signal-driven stop is a clean exit;
/// an accept error is fatal.
#[derive(Debug, Error)]
pub enum Stopped {
    #[error("received signal {0}")]
    Signal(&'static str),
    #[error("accept error: {0}")]
    AcceptError(#[source] io::Error),
}

pub struct MuxServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    upstreams: Upstreams,
}

impl MuxServer {
    pub async fn bind(cfg: MuxConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(cfg.listen).await.with_context(|| format!("bind {}", cfg.listen))?;
        let local_addr = listener.local_addr().context("listener local addr")?;
        Ok(Self {
            listener,
            local_addr,
            upstreams: Upstreams {
                ssh: cfg.ssh_dest,
                http: cfg.http_dest,
            },
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run until the acceptor fails or `shutdown` resolves, whichever
    /// comes first. The two actors share a cancellation token: the first
    /// to finish cancels it, which closes the listener (unblocking the
    /// pending accept) and wakes the other actor; both are joined before
    /// the outcome is reported.
    ///
    /// `shutdown` is the injectable signal source, resolving to the name
    /// of whatever triggered it; production passes [`wait_for_signal`].
    pub async fn run<F>(self, shutdown: F) -> Stopped
    where
        F: Future<Output = &'static str> + Send + 'static,
    {
        let token = CancellationToken::new();

        let acceptor = {
            let token = token.clone();
            let upstreams = self.upstreams;
            let listener = self.listener;
            tokio::spawn(async move {
                let res = acceptor::accept_loop(listener, upstreams, token.clone()).await;
                token.cancel();
                res
            })
        };
        let signals = {
            let token = token.clone();
            tokio::spawn(async move {
                let signal = tokio::select! {
                    signal = shutdown => Some(signal),
                    _ = token.cancelled() => None,
                };
                token.cancel();
                signal
            })
        };

        let (accepted, signaled) = tokio::join!(acceptor, signals);
        match accepted.expect("acceptor task panicked") {
            Err(e) => Stopped::AcceptError(e),
            // An error-free acceptor exit only happens via cancellation,
            // so the signal actor finished first and knows the trigger.
            Ok(()) => Stopped::Signal(signaled.expect("signal task panicked").unwrap_or("shutdown")),
        }
    }
}

/// Resolves with the name of the first termination signal received.
#[cfg(unix)]
pub async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).expect("should register SIGTERM handler");
    let mut interrupt = signal(SignalKind::interrupt()).expect("should register SIGINT handler");

    tokio::select! {
        _ = terminate.recv() => "SIGTERM",
        _ = interrupt.recv() => "SIGINT",
    }
}

#[cfg(windows)]
pub async fn wait_for_signal() -> &'static str {
    use tokio::signal::windows;

    let mut signal_c = windows::ctrl_c().expect("should register ctrl-c handler");
    let mut signal_break = windows::ctrl_break().expect("should register ctrl-break handler");
    let mut signal_close = windows::ctrl_close().expect("should register ctrl-close handler");
    let mut signal_shutdown = windows::ctrl_shutdown().expect("should register ctrl-shutdown handler");

    tokio::select! {
        _ = signal_c.recv() => "CTRL_C",
        _ = signal_break.recv() => "CTRL_BREAK",
        _ = signal_close.recv() => "CTRL_CLOSE",
        _ = signal_shutdown.recv() => "CTRL_SHUTDOWN",
    }
}
