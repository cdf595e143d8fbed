use std::net::SocketAddr;

use tokio::{
    io::{copy, split, AsyncRead, AsyncWrite},
    net::TcpStream,
};

use crate::{
    detect::{detect, Upstreams, PRELUDE_LEN},
    peek::Peekable,
};

/// Serve one accepted connection: classify it by its prefix, dial the
/// selected backend once and relay bytes in both directions until either
/// leg ends. Returning from here drops both streams, so whichever copy
/// loop finishes first tears the whole session down and unblocks the
/// other side.
pub(crate) async fn serve<S>(stream: S, remote: SocketAddr, upstreams: Upstreams)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut peer = Peekable::new(stream);
    let protocol = match peer.peek(PRELUDE_LEN).await {
        Ok(prelude) => {
            log::info!("[Session] [{remote}] prelude {}", String::from_utf8_lossy(prelude));
            detect(prelude)
        }
        Err(e) => {
            log::warn!("[Session] [{remote}] prelude read error: {e}");
            return;
        }
    };

    let dest = upstreams.dest_for(protocol);
    log::info!("[Session] [{remote}] <{dest}> starting {protocol:?}");
    let mut upstream = match TcpStream::connect(dest).await {
        Ok(upstream) => upstream,
        Err(e) => {
            log::error!("[Session] [{remote}] <{dest}> dial error: {e}");
            return;
        }
    };

    let (mut peer_rd, mut peer_wr) = split(peer);
    let (mut upstream_rd, mut upstream_wr) = upstream.split();

    // First direction to end (EOF or error) wins; the losing copy future
    // is dropped here and both connections close when we return.
    let outcome = tokio::select! {
        res = copy(&mut peer_rd, &mut upstream_wr) => res,
        res = copy(&mut upstream_rd, &mut peer_wr) => res,
    };

    match outcome {
        Ok(bytes) => log::info!("[Session] [{remote}] <{dest}> finished, {bytes} bytes on closing leg"),
        Err(e) => log::info!("[Session] [{remote}] <{dest}> finished: {e}"),
    }
}
