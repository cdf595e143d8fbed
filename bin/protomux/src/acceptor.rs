use std::io;

use tokio::{net::TcpListener, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{detect::Upstreams, session};

/// Accept loop. Owns the listener; every accepted connection gets its own
/// session task, so a stalled or slow client never blocks the next
/// accept. Terminates on accept error (returned to the coordinator as
/// fatal) or on cancellation; either way the listener is released and
/// in-flight sessions are aborted, closing their connection pairs.
pub(crate) async fn accept_loop(listener: TcpListener, upstreams: Upstreams, shutdown: CancellationToken) -> io::Result<()> {
    let mut sessions = JoinSet::new();
    let result = loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                log::info!("[Acceptor] shutdown requested, closing listener");
                break Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    log::info!("[Acceptor] new conn from {remote}");
                    sessions.spawn(session::serve(stream, remote, upstreams));
                }
                Err(e) => {
                    log::error!("[Acceptor] accept error: {e}");
                    break Err(e);
                }
            },
            Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
        }
    };
    drop(listener);
    sessions.shutdown().await;
    result
}
