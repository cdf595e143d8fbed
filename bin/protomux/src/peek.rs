use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};

/// Stream wrapper with a small read-ahead buffer so a prefix can be
/// inspected without consuming it. Bytes returned by [`Peekable::peek`]
/// are replayed, in order, by subsequent reads before the inner stream
/// is read again.
pub struct Peekable<S> {
    inner: S,
    buffer: Vec<u8>,
    pos: usize,
}

impl<S> Peekable<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            pos: 0,
        }
    }
}

impl<S: AsyncRead + Unpin> Peekable<S> {
    /// Returns the next `n` bytes of the stream without advancing the
    /// read position. Idempotent: peeking again returns the same bytes.
    /// Fails with `UnexpectedEof` if the peer closes before `n` bytes
    /// arrive; the connection should be dropped by the caller then.
    ///
    /// Must only be called before any read has consumed buffered bytes.
    pub async fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        debug_assert_eq!(self.pos, 0, "peek after read is not supported");
        while self.buffer.len() < n {
            let mut chunk = [0u8; 16];
            let want = (n - self.buffer.len()).min(chunk.len());
            let read = self.inner.read(&mut chunk[..want]).await?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("peer closed after {} of {} prefix bytes", self.buffer.len(), n),
                ));
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
        Ok(&self.buffer[..n])
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for Peekable<S> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.pos < this.buffer.len() {
            let n = buf.remaining().min(this.buffer.len() - this.pos);
            buf.put_slice(&this.buffer[this.pos..this.pos + n]);
            this.pos += n;
            if this.pos == this.buffer.len() {
                this.buffer.clear();
                this.pos = 0;
            }
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for Peekable<S> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<Result<usize, io::Error>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::Peekable;

    #[tokio::test]
    async fn peek_does_not_consume() {
        let (mut client, server) = tokio::io::duplex(64);
        client.write_all(b"SSH-2.0-test").await.expect("should write");

        let mut peekable = Peekable::new(server);
        assert_eq!(peekable.peek(3).await.expect("should peek"), b"SSH");

        let mut read = vec![0u8; 12];
        peekable.read_exact(&mut read).await.expect("should read");
        assert_eq!(&read, b"SSH-2.0-test");
    }

    #[tokio::test]
    async fn peek_is_idempotent() {
        let (mut client, server) = tokio::io::duplex(64);
        client.write_all(b"GET / HTTP/1.1").await.expect("should write");

        let mut peekable = Peekable::new(server);
        assert_eq!(peekable.peek(3).await.expect("should peek"), b"GET");
        assert_eq!(peekable.peek(3).await.expect("should peek"), b"GET");

        let mut read = vec![0u8; 14];
        peekable.read_exact(&mut read).await.expect("should read");
        assert_eq!(&read, b"GET / HTTP/1.1");
    }

    #[tokio::test]
    async fn peek_survives_fragmented_arrival() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut peekable = Peekable::new(server);

        let writer = tokio::spawn(async move {
            client.write_all(b"S").await.expect("should write");
            client.flush().await.expect("should flush");
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            client.write_all(b"SH-2.0").await.expect("should write");
            client
        });

        assert_eq!(peekable.peek(3).await.expect("should peek"), b"SSH");
        drop(writer.await.expect("writer should finish"));

        let mut rest = Vec::new();
        peekable.read_to_end(&mut rest).await.expect("should read");
        assert_eq!(&rest, b"SSH-2.0");
    }

    #[tokio::test]
    async fn peek_fails_on_early_close() {
        let (mut client, server) = tokio::io::duplex(64);
        client.write_all(b"SS").await.expect("should write");
        drop(client);

        let mut peekable = Peekable::new(server);
        let err = peekable.peek(3).await.expect_err("peek should fail");
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }
}
