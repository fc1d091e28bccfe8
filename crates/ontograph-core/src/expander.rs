use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// One child topic proposed by the capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub topic: String,
    /// Centrality score (0-10). Drives the gating threshold when the
    /// suggested node is later considered for expansion.
    pub importance: u8,
}

impl Suggestion {
    pub fn new(topic: impl Into<String>, importance: u8) -> Self {
        Suggestion {
            topic: topic.into(),
            importance,
        }
    }
}

/// Boundary to the external suggestion capability.
///
/// Implementations are injected into the engine, which makes the capability
/// trivially replaceable with a deterministic double in tests. The engine
/// treats any returned error as a capability failure: logged, node
/// finalized, never retried, never propagated.
#[async_trait]
pub trait TopicExpander: Send + Sync {
    /// Propose child topics for `topic`. `hierarchy` is the ordered list
    /// of topic labels from the root to the node being expanded, inclusive.
    /// An empty return is a legitimate answer meaning "nothing below this".
    async fn expand(&self, topic: &str, hierarchy: &[String]) -> Result<Vec<Suggestion>>;
}

#[async_trait]
impl<T: TopicExpander + ?Sized> TopicExpander for Arc<T> {
    async fn expand(&self, topic: &str, hierarchy: &[String]) -> Result<Vec<Suggestion>> {
        (**self).expand(topic, hierarchy).await
    }
}

/// Drop suggestions whose topic is blank after trimming and clamp
/// importance to [0, 10]. Applied to every capability response before
/// merge resolution; dropped suggestions are not errors.
pub fn sanitize(suggestions: Vec<Suggestion>) -> Vec<Suggestion> {
    suggestions
        .into_iter()
        .filter_map(|s| {
            let topic = s.topic.trim();
            if topic.is_empty() {
                return None;
            }
            Some(Suggestion {
                topic: topic.to_string(),
                importance: s.importance.min(10),
            })
        })
        .collect()
}
