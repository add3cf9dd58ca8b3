use std::future::Future;

use crate::contract::context::CallContext;
use crate::domain::error::DomainError;

/// Drive `work` unless the call is cancelled or its deadline passes first.
/// The losing future is dropped at its current await point.
pub async fn run<T, F>(ctx: &CallContext, work: F) -> Result<T, DomainError>
where
    F: Future<Output = Result<T, DomainError>>,
{
    if ctx.is_cancelled() {
        return Err(DomainError::cancelled());
    }
    if ctx.is_expired() {
        return Err(DomainError::deadline_exceeded());
    }

    let raced = async {
        tokio::select! {
            biased;
            _ = ctx.cancel_token().cancelled() => Err(DomainError::cancelled()),
            res = work => res,
        }
    };

    match ctx.deadline() {
        Some(deadline) => tokio::time::timeout_at(deadline, raced)
            .await
            .unwrap_or_else(|_| Err(DomainError::deadline_exceeded())),
        None => raced.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn passes_result_through() {
        let ctx = CallContext::new();
        let out = run(&ctx, async { Ok::<_, DomainError>(7) }).await.unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn cancelled_before_start_never_polls() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = CallContext::new().with_cancel(token);

        let polled = std::sync::atomic::AtomicBool::new(false);
        let res = run(&ctx, async {
            polled.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok::<_, DomainError>(())
        })
        .await;

        assert!(matches!(res, Err(DomainError::Cancelled)));
        assert!(!polled.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancellation_interrupts_pending_work() {
        let token = CancellationToken::new();
        let ctx = CallContext::new().with_cancel(token.clone());

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });
        let res = run(&ctx, async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, DomainError>(())
        })
        .await;
        trigger.await.unwrap();

        assert!(matches!(res, Err(DomainError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_pending_work() {
        let ctx = CallContext::new().with_timeout(Duration::from_millis(50));
        let res = run(&ctx, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, DomainError>(())
        })
        .await;
        assert!(matches!(res, Err(DomainError::DeadlineExceeded)));
    }
}
