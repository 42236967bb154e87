use crate::error::ReadError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{ChangeRecord, ContinuationToken};

/// Where to start reading a partition that has never been checkpointed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StartFrom {
    Beginning,
    #[default]
    Now,
    Time(DateTime<Utc>),
}

/// Parameters of one page request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub partition_id: String,
    /// `None` until the partition has a read position; then `start_from` applies.
    pub continuation: Option<ContinuationToken>,
    pub max_item_count: usize,
    pub start_from: StartFrom,
}

/// One page of the partition's change stream.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedPage {
    /// New changes, in stream order, and the position right after them.
    Changes {
        records: Vec<ChangeRecord>,
        continuation: ContinuationToken,
    },
    /// Nothing new since `continuation`.
    NotModified { continuation: ContinuationToken },
}

impl FeedPage {
    pub fn continuation(&self) -> &ContinuationToken {
        match self {
            FeedPage::Changes { continuation, .. } | FeedPage::NotModified { continuation } => {
                continuation
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FeedPage::Changes { records, .. } => records.is_empty(),
            FeedPage::NotModified { .. } => true,
        }
    }
}

/// Paginated access to a partition's changes.
///
/// Implementations wrap the transport to the source service. A split or merged
/// partition must be reported as [`ReadError::PartitionGone`], throttling and
/// timeouts as [`ReadError::Transient`].
#[async_trait]
pub trait FeedReader: Send + Sync {
    async fn read_next(&self, request: ReadRequest) -> Result<FeedPage, ReadError>;
}
