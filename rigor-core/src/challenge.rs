//! Challenge catalog.
//!
//! [`ChallengeProvider`] asks the model for a handful of fresh challenges.
//! It never fails: a missing client, a timeout or a malformed answer all
//! yield [`fallback_catalog`], so a session can always be started.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rigor_models::ClientFactory;
use tracing::{info, warn};

use crate::guard::guard_with_outcome;
use crate::prompt;
use crate::types::{Challenge, ChallengeId, Difficulty};

/// Default deadline for a challenge listing.
pub const DEFAULT_CHALLENGE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Default number of challenges requested.
pub const DEFAULT_CHALLENGE_COUNT: usize = 3;

/// Anything that can hand out challenges.
#[async_trait]
pub trait ChallengeSource: Send + Sync {
    /// List available challenges. Never empty.
    async fn list_challenges(&self) -> Vec<Challenge>;
}

/// Model-backed challenge source with a built-in fallback catalog.
pub struct ChallengeProvider {
    factory: Arc<dyn ClientFactory>,
    deadline: Duration,
    count: usize,
}

impl ChallengeProvider {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            deadline: DEFAULT_CHALLENGE_TIMEOUT,
            count: DEFAULT_CHALLENGE_COUNT,
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    #[must_use]
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count.max(1);
        self
    }
}

#[async_trait]
impl ChallengeSource for ChallengeProvider {
    async fn list_challenges(&self) -> Vec<Challenge> {
        let provider = match self.factory.build() {
            Ok(provider) => provider,
            Err(e) => {
                warn!(error = %e, "model client unavailable, using built-in challenges");
                return fallback_catalog();
            }
        };

        let request = prompt::challenge_request(provider.model(), self.count);
        let operation = async move {
            let response = provider.chat(request).await?;
            prompt::parse_challenges(&response.content)
        };

        let guarded = guard_with_outcome(operation, self.deadline, fallback_catalog()).await;
        info!(
            count = guarded.value.len(),
            fallback = guarded.outcome.is_fallback(),
            "challenges listed"
        );
        guarded.value
    }
}

/// Built-in challenges used whenever the model cannot supply any.
pub fn fallback_catalog() -> Vec<Challenge> {
    vec![
        Challenge {
            id: ChallengeId::new("url-shortener"),
            title: "Global URL Shortener".to_string(),
            description: "Design a URL shortening service that issues short codes and \
                          redirects visitors with low latency worldwide."
                .to_string(),
            difficulty: Difficulty::Senior,
            context: "100M new links per month, 10B redirects per month, read-heavy \
                      100:1, links never expire unless deleted."
                .to_string(),
        },
        Challenge {
            id: ChallengeId::new("rate-limiter"),
            title: "Distributed Rate Limiter".to_string(),
            description: "Design a rate limiter shared by a fleet of API gateways that \
                          enforces per-customer quotas."
                .to_string(),
            difficulty: Difficulty::Staff,
            context: "2,000 gateway instances across 4 regions, 1M requests per second \
                      peak, quota changes must apply within 10 seconds."
                .to_string(),
        },
        Challenge {
            id: ChallengeId::new("payments-ledger"),
            title: "Multi-Region Payments Ledger".to_string(),
            description: "Design the double-entry ledger behind a payments platform that \
                          must never lose or duplicate money movements."
                .to_string(),
            difficulty: Difficulty::Principal,
            context: "Active-active in 3 regions, regulatory audit trail, 50k writes per \
                      second, strict reconciliation with external banks."
                .to_string(),
        },
    ]
}
