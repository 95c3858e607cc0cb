#[cfg(test)]
mod tests {
    //! Tests for connection byte accounting.

    use async_trait::async_trait;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncWrite, AsyncWriteExt};
    use tracing::Span;

    use crate::http::accounting::{reconcile_bytes_written, ByteCounter, ConnBytes, CountingConn};
    use crate::http::header::HeaderCollection;
    use crate::http::writer::{respond, Flush, Http1ResponseWriter, ResponseSink};

    /// Sink that claims everything it is given and optionally supports flushing.
    #[derive(Default)]
    struct FakeSink {
        headers: HeaderCollection,
        flushable: bool,
        flushes: usize,
    }

    #[async_trait]
    impl ResponseSink for FakeSink {
        fn headers_mut(&mut self) -> &mut HeaderCollection {
            &mut self.headers
        }

        async fn write_status(&mut self, _code: u16) -> io::Result<()> {
            Ok(())
        }

        async fn write(&mut self, body: &[u8]) -> io::Result<usize> {
            Ok(body.len())
        }

        fn flusher(&mut self) -> Option<&mut dyn Flush> {
            if self.flushable {
                Some(self)
            } else {
                None
            }
        }
    }

    #[async_trait]
    impl Flush for FakeSink {
        async fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    struct FixedConn(u64);

    impl ConnBytes for FixedConn {
        fn bytes_written(&self) -> u64 {
            self.0
        }
    }

    /// Accepts `limit` bytes in total, then fails like a peer that went away.
    struct LimitedWriter {
        limit: usize,
        taken: usize,
    }

    impl AsyncWrite for LimitedWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let room = self.limit - self.taken;
            if room == 0 {
                return Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)));
            }
            let n = room.min(buf.len());
            self.taken += n;
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_connection_count_replaces_reported_count() {
        let mut sink = FakeSink {
            flushable: true,
            ..Default::default()
        };
        let conn = FixedConn(73);

        let got = reconcile_bytes_written(&mut sink, Some(&conn), 100, &Span::none()).await;
        assert_eq!(got, 73);
        assert_eq!(sink.flushes, 1);
    }

    #[tokio::test]
    async fn test_reported_count_without_counting_connection() {
        let mut sink = FakeSink {
            flushable: true,
            ..Default::default()
        };
        let got = reconcile_bytes_written(&mut sink, None, 100, &Span::none()).await;
        assert_eq!(got, 100);
        assert_eq!(sink.flushes, 1);
    }

    #[tokio::test]
    async fn test_non_flushable_sink_still_reads_counter() {
        let mut sink = FakeSink::default();
        let conn = FixedConn(42);
        let got = reconcile_bytes_written(&mut sink, Some(&conn), 100, &Span::none()).await;
        assert_eq!(got, 42);
        assert_eq!(sink.flushes, 0);
    }

    #[tokio::test]
    async fn test_counting_conn_counts_accepted_bytes() {
        let mut conn = CountingConn::new(Vec::new());
        let counter = conn.counter();

        conn.write_all(b"hello ").await.unwrap();
        conn.write_all(b"world").await.unwrap();

        assert_eq!(counter.get(), 11);
        assert_eq!(conn.bytes_written(), 11);
        assert_eq!(conn.into_inner(), b"hello world".to_vec());
    }

    #[tokio::test]
    async fn test_client_disconnect_mid_body() {
        let mut headers = HeaderCollection::new();
        headers.add("Content-Length", "100");

        let conn = CountingConn::new(LimitedWriter { limit: 73, taken: 0 });
        let counter = conn.counter();
        let mut writer = Http1ResponseWriter::new(conn);

        // Everything fits the write buffer, so the sink reports the full body.
        let reported = respond(&mut writer, 200, &headers, &[b'x'; 100], false)
            .await
            .unwrap();
        assert_eq!(reported, 100);
        assert_eq!(counter.get(), 0);

        let got = reconcile_bytes_written(&mut writer, Some(&counter), reported, &Span::none()).await;
        assert_eq!(got, 73);
    }

    #[test]
    fn test_byte_counter_is_shared_between_clones() {
        let a = ByteCounter::new();
        let b = a.clone();
        a.add(5);
        b.add(7);
        assert_eq!(a.get(), 12);
        assert_eq!(b.bytes_written(), 12);
    }
}
