//! Conversation source port.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::errors::EvaluationResult;
use crate::domain::models::{Conversation, SelectionQuery};

/// Lazy, finite, forward-only sequence of conversations.
///
/// Not restartable: a second pass requires resolving the query again.
pub type ConversationStream = BoxStream<'static, EvaluationResult<Conversation>>;

/// A resolved selection: the total is known before the first conversation is read.
pub struct ConversationBatch {
    /// Number of conversations the stream will yield
    pub total: u64,
    /// The conversations, in selection order
    pub conversations: ConversationStream,
}

impl std::fmt::Debug for ConversationBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationBatch")
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

/// Executes selection queries against the extracted conversation store.
#[async_trait]
pub trait ConversationSource: Send + Sync {
    /// Resolve a selection query.
    ///
    /// Errors here are `SelectionFailure`s and fail the job.
    async fn resolve(&self, query: &SelectionQuery) -> EvaluationResult<ConversationBatch>;
}
