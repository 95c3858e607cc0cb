#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::http::server::parse::{read_request, Limits, ReadError};

    async fn read(raw: &str) -> Result<Option<crate::http::request::ClientRequest>, ReadError> {
        let mut rd = raw.as_bytes();
        read_request(&mut rd, "10.0.0.5:443", &Limits::default()).await
    }

    #[tokio::test]
    async fn test_reads_head_and_body() {
        let req = read("POST /submit?x=1 HTTP/1.1\r\nHost: edge.test\r\nContent-Length: 5\r\nX-A: 1\r\nX-A: 2\r\n\r\nhello")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(req.method, "POST");
        assert_eq!(req.target, "/submit?x=1");
        assert_eq!(req.version, 1);
        assert_eq!(req.remote_addr, "10.0.0.5:443");
        assert_eq!(req.headers.get("host"), Some("edge.test"));
        assert_eq!(req.headers.get_all("X-A"), &["1".to_string(), "2".to_string()]);
        assert_eq!(req.body, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_keep_alive_requests_are_read_in_turn() {
        let raw = "GET /a HTTP/1.1\r\nHost: e\r\n\r\nGET /b HTTP/1.0\r\n\r\n";
        let mut rd = raw.as_bytes();
        let limits = Limits::default();

        let a = read_request(&mut rd, "p:1", &limits).await.unwrap().unwrap();
        let b = read_request(&mut rd, "p:1", &limits).await.unwrap().unwrap();
        let end = read_request(&mut rd, "p:1", &limits).await.unwrap();

        assert_eq!(a.target, "/a");
        assert!(a.wants_keep_alive());
        assert_eq!(b.target, "/b");
        assert_eq!(b.version, 0);
        assert!(!b.wants_keep_alive());
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_leading_empty_lines_are_skipped() {
        let req = read("\r\n\r\nGET / HTTP/1.1\r\n\r\n").await.unwrap().unwrap();
        assert_eq!(req.target, "/");
    }

    #[tokio::test]
    async fn test_chunked_request_body_is_refused() {
        let err = read("POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n")
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::UnsupportedTransferEncoding(_)));
    }

    #[tokio::test]
    async fn test_malformed_and_truncated_heads() {
        assert!(matches!(read("GET\r\n\r\n").await.unwrap_err(), ReadError::Malformed(_)));
        assert!(matches!(read("GET / HTTP/1.1\r\nHost: e\r\n").await.unwrap_err(), ReadError::Io(_)));
        assert!(matches!(
            read("POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nshort").await.unwrap_err(),
            ReadError::Io(_)
        ));
    }

    #[tokio::test]
    async fn test_conflicting_content_length() {
        let err = read("POST / HTTP/1.1\r\nContent-Length: 1\r\nContent-Length: 2\r\n\r\nab")
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::InvalidContentLength(_)));

        let err = read("POST / HTTP/1.1\r\nContent-Length: -1\r\n\r\n").await.unwrap_err();
        assert!(matches!(err, ReadError::InvalidContentLength(_)));
    }

    #[tokio::test]
    async fn test_content_length_must_be_plain_digits() {
        for value in ["+3", " ", "3 3", "0x3", "3,"] {
            let raw = format!("POST / HTTP/1.1\r\nHost: e\r\nContent-Length: {}\r\n\r\nabc", value);
            let err = read(&raw).await.unwrap_err();
            assert!(
                matches!(err, ReadError::InvalidContentLength(_)),
                "accepted Content-Length {:?}",
                value
            );
        }

        let req = read("POST / HTTP/1.1\r\nContent-Length: 3, 3\r\n\r\nabc")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(req.body, Bytes::from_static(b"abc"));
    }

    #[tokio::test]
    async fn test_head_and_body_limits() {
        let limits = Limits {
            max_head_size: 32,
            max_body_size: 4,
            ..Limits::default()
        };

        let raw = format!("GET / HTTP/1.1\r\nX-Long: {}\r\n\r\n", "a".repeat(64));
        let mut rd = raw.as_bytes();
        let err = read_request(&mut rd, "p:1", &limits).await.unwrap_err();
        assert!(matches!(err, ReadError::HeadTooLarge(32)));

        let mut rd = "POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello".as_bytes();
        let err = read_request(&mut rd, "p:1", &limits).await.unwrap_err();
        assert!(matches!(err, ReadError::BodyTooLarge(4)));
    }
}
