#[cfg(test)]
mod tests {
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    use crate::shutdown::GracefulShutdown;

    #[tokio::test]
    async fn test_waits_for_registered_tasks() {
        let token = CancellationToken::new();
        let gsh = GracefulShutdown::new(token.clone()).with_timeout(Duration::from_secs(5));
        gsh.add(2);

        for delay in [10u64, 30] {
            let gsh = gsh.clone();
            let token = token.clone();
            tokio::spawn(async move {
                token.cancelled().await;
                tokio::time::sleep(Duration::from_millis(delay)).await;
                gsh.done();
            });
        }

        token.cancel();
        gsh.await_shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_times_out_on_stuck_task() {
        let token = CancellationToken::new();
        let gsh = GracefulShutdown::new(token.clone()).with_timeout(Duration::from_millis(50));
        gsh.add(1);

        token.cancel();
        assert!(gsh.await_shutdown().await.is_err());
    }

    #[tokio::test]
    async fn test_nothing_registered_returns_immediately() {
        let token = CancellationToken::new();
        let gsh = GracefulShutdown::new(token.clone());
        token.cancel();
        gsh.await_shutdown().await.unwrap();
    }
}
