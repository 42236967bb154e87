use async_trait::async_trait;
use engine_core::{
    connectors::{
        estimate::LagEstimator,
        feed::{FeedPage, FeedReader, ReadRequest, StartFrom},
        observer::{CloseReason, Observer, ObserverContext},
    },
    error::{ObserverError, ReadError},
};
use model::{ChangeBatch, ChangeRecord, ContinuationToken};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Deterministic change feed: every partition holds `pages * page_size`
/// records at positions `1..=total`, continuations are `lsn:<n>`.
pub struct SyntheticFeed {
    pages: u64,
    page_size: u64,
}

impl SyntheticFeed {
    pub fn new(pages: u64, page_size: u64) -> Self {
        Self { pages, page_size }
    }

    fn total(&self) -> u64 {
        self.pages.saturating_mul(self.page_size)
    }

    fn parse(token: &ContinuationToken) -> Result<u64, ReadError> {
        token
            .as_str()
            .strip_prefix("lsn:")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| ReadError::Fatal(format!("unrecognized continuation '{token}'")))
    }

    fn position(&self, request: &ReadRequest) -> Result<u64, ReadError> {
        match &request.continuation {
            Some(token) => Self::parse(token),
            None => Ok(match request.start_from {
                StartFrom::Beginning => 0,
                // Nothing is "new" in a finite synthetic stream.
                StartFrom::Now | StartFrom::Time(_) => self.total(),
            }),
        }
    }
}

#[async_trait]
impl FeedReader for SyntheticFeed {
    async fn read_next(&self, request: ReadRequest) -> Result<FeedPage, ReadError> {
        let position = self.position(&request)?;
        let end = self
            .total()
            .min(position.saturating_add(self.page_size.min(request.max_item_count as u64)));

        if end <= position {
            return Ok(FeedPage::NotModified {
                continuation: format!("lsn:{position}").into(),
            });
        }

        let records = (position + 1..=end)
            .map(|seq| {
                ChangeRecord::new(
                    format!("{}/{seq}", request.partition_id),
                    seq,
                    json!({ "partition": request.partition_id, "seq": seq }),
                )
            })
            .collect();
        Ok(FeedPage::Changes {
            records,
            continuation: format!("lsn:{end}").into(),
        })
    }
}

#[async_trait]
impl LagEstimator for SyntheticFeed {
    async fn estimate_lag(
        &self,
        _partition_id: &str,
        continuation: Option<&ContinuationToken>,
    ) -> Result<u64, ReadError> {
        let position = match continuation {
            Some(token) => Self::parse(token)?,
            None => 0,
        };
        Ok(self.total().saturating_sub(position))
    }
}

/// Logs every delivered batch.
#[derive(Default)]
pub struct LoggingObserver {
    records: AtomicU64,
}

#[async_trait]
impl Observer for LoggingObserver {
    async fn open(&self, partition_id: &str) -> Result<(), ObserverError> {
        info!(partition = %partition_id, "Observer opened");
        Ok(())
    }

    async fn process_changes(
        &self,
        ctx: &ObserverContext,
        batch: &ChangeBatch,
    ) -> Result<(), ObserverError> {
        let total = self.records.fetch_add(batch.len() as u64, Ordering::Relaxed) + batch.len() as u64;
        info!(
            partition = %ctx.partition_id,
            batch_id = %ctx.batch_id,
            records = batch.len(),
            continuation = %ctx.continuation,
            total,
            "Processed batch"
        );
        Ok(())
    }

    async fn close(&self, partition_id: &str, reason: CloseReason) -> Result<(), ObserverError> {
        info!(
            partition = %partition_id,
            reason = %reason,
            records = self.records.load(Ordering::Relaxed),
            "Observer closed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(continuation: Option<&str>, start_from: StartFrom) -> ReadRequest {
        ReadRequest {
            partition_id: "p-0".into(),
            continuation: continuation.map(Into::into),
            max_item_count: 100,
            start_from,
        }
    }

    #[tokio::test]
    async fn pages_through_then_goes_idle() {
        let feed = SyntheticFeed::new(2, 3);

        let first = feed
            .read_next(request(None, StartFrom::Beginning))
            .await
            .unwrap();
        assert_eq!(first.continuation().as_str(), "lsn:3");
        let FeedPage::Changes { records, .. } = &first else {
            panic!("expected changes");
        };
        assert_eq!(records.iter().map(|r| r.sequence).collect::<Vec<_>>(), vec![1, 2, 3]);

        let second = feed
            .read_next(request(Some("lsn:3"), StartFrom::Beginning))
            .await
            .unwrap();
        assert_eq!(second.continuation().as_str(), "lsn:6");

        let idle = feed
            .read_next(request(Some("lsn:6"), StartFrom::Beginning))
            .await
            .unwrap();
        assert!(idle.is_empty());
        assert_eq!(idle.continuation().as_str(), "lsn:6");
    }

    #[tokio::test]
    async fn start_from_now_skips_history() {
        let feed = SyntheticFeed::new(2, 3);
        let page = feed.read_next(request(None, StartFrom::Now)).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(page.continuation().as_str(), "lsn:6");
    }

    #[tokio::test]
    async fn respects_max_item_count() {
        let feed = SyntheticFeed::new(1, 10);
        let mut req = request(None, StartFrom::Beginning);
        req.max_item_count = 4;
        let page = feed.read_next(req).await.unwrap();
        assert_eq!(page.continuation().as_str(), "lsn:4");
    }

    #[tokio::test]
    async fn lag_counts_unread_records() {
        let feed = SyntheticFeed::new(2, 5);
        assert_eq!(feed.estimate_lag("p-0", None).await.unwrap(), 10);
        assert_eq!(feed.estimate_lag("p-0", Some(&"lsn:7".into())).await.unwrap(), 3);
        assert_eq!(feed.estimate_lag("p-0", Some(&"lsn:12".into())).await.unwrap(), 0);
        assert!(feed.estimate_lag("p-0", Some(&"etag-1".into())).await.is_err());
    }

    #[tokio::test]
    async fn foreign_continuation_is_fatal() {
        let feed = SyntheticFeed::new(1, 10);
        let err = feed
            .read_next(request(Some("etag-17"), StartFrom::Beginning))
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::Fatal(_)));
    }
}
