//! Batched generation with concurrency control.
//!
//! Failed prompts do not abort the batch; each result records its own
//! error and results come back in the original prompt order.
//!
//! # Example
//!
//! ```rust,ignore
//! use hallucination_core::llm::{BatchExecutor, GenerationRequest};
//!
//! let executor = BatchExecutor::new(registry).with_max_parallel(2);
//! let results = executor
//!     .execute(prompts, &GenerationRequest::new("").with_max_tokens(150))
//!     .await;
//! ```

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::client::TextGenerator;
use super::types::{Generation, GenerationRequest};

/// Default maximum parallel generations.
pub const DEFAULT_MAX_PARALLEL: usize = 1;

/// Result of a single prompt in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    /// Index of this prompt in the original batch.
    pub index: usize,
    /// Generation (if successful).
    pub generation: Option<Generation>,
    /// Error message (if failed).
    pub error: Option<String>,
}

impl BatchItem {
    pub fn success(index: usize, generation: Generation) -> Self {
        Self {
            index,
            generation: Some(generation),
            error: None,
        }
    }

    pub fn failure(index: usize, error: impl Into<String>) -> Self {
        Self {
            index,
            generation: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.generation.is_some()
    }

    /// Generated text, or an empty string for failures.
    pub fn text(&self) -> &str {
        self.generation.as_ref().map_or("", |g| g.text.as_str())
    }
}

/// Results of a batch, in original prompt order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    pub items: Vec<BatchItem>,
    pub success_count: usize,
    pub failure_count: usize,
    pub total_tokens: u64,
}

impl BatchResults {
    pub fn from_items(mut items: Vec<BatchItem>) -> Self {
        items.sort_by_key(|r| r.index);

        let success_count = items.iter().filter(|r| r.is_success()).count();
        let failure_count = items.len() - success_count;
        let total_tokens = items
            .iter()
            .filter_map(|r| r.generation.as_ref().map(|g| g.tokens_used))
            .sum();

        Self {
            items,
            success_count,
            failure_count,
            total_tokens,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failure_count == 0
    }

    /// Error messages for failed prompts.
    pub fn errors(&self) -> Vec<(usize, &str)> {
        self.items
            .iter()
            .filter_map(|r| r.error.as_deref().map(|e| (r.index, e)))
            .collect()
    }
}

/// Runs many prompts against one generator.
///
/// Uses a semaphore so at most `max_parallel` calls are in flight.
pub struct BatchExecutor {
    generator: Arc<dyn TextGenerator>,
    max_parallel: usize,
}

impl BatchExecutor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }

    /// Set the maximum parallel generations (at least 1).
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = max.max(1);
        self
    }

    /// Generate a response for every prompt using `template`'s parameters.
    pub async fn execute(
        &self,
        prompts: Vec<String>,
        template: &GenerationRequest,
    ) -> BatchResults {
        let total = prompts.len();
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));

        let tasks: Vec<_> = prompts
            .into_iter()
            .enumerate()
            .map(|(index, prompt)| {
                let generator = Arc::clone(&self.generator);
                let semaphore = Arc::clone(&semaphore);
                let request = template.for_prompt(prompt);

                async move {
                    let Ok(_permit) = semaphore.acquire().await else {
                        return BatchItem::failure(index, "Semaphore closed");
                    };
                    debug!(index, total, "Generating batch item");
                    match generator.generate(request).await {
                        Ok(generation) => BatchItem::success(index, generation),
                        Err(e) => {
                            warn!(index, error = %e, "Batch generation failed");
                            BatchItem::failure(index, e.to_string())
                        }
                    }
                }
            })
            .collect();

        BatchResults::from_items(join_all(tasks).await)
    }
}
