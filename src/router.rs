//! Query router: keyword rules over backends, with readiness-aware fallback.
//!
//! Classification is an ordered rule table matched case-insensitively against
//! the query; the first hit wins. A rule targeting a domain index only fires
//! if that index was actually built, otherwise classification falls through
//! to the combined plan. The SQL agent has no readiness gate.
//!
//! The combined plan queries both indexes and concatenates the answers with
//! per-source labels, technical first.

use std::sync::Arc;

use crate::index::{KnowledgeBase, Readiness};
use crate::models::Answer;
use crate::retrieval::RetrievalEngine;
use crate::sql_agent::{AgentError, QueryAgent};

/// Backend a rule dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    SqlAgent,
    Diet,
    Technical,
}

/// One keyword rule. Order in the table is match priority.
pub struct RouteRule {
    pub keyword: &'static str,
    pub target: RouteTarget,
}

/// The default rule table. "patient" outranks the domain keywords, so a
/// query mentioning both goes to the SQL agent.
pub fn default_rules() -> Vec<RouteRule> {
    vec![
        RouteRule {
            keyword: "patient",
            target: RouteTarget::SqlAgent,
        },
        RouteRule {
            keyword: "diet",
            target: RouteTarget::Diet,
        },
        RouteRule {
            keyword: "technical",
            target: RouteTarget::Technical,
        },
    ]
}

/// Resolved dispatch plan for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePlan {
    Sql,
    Diet,
    Technical,
    /// No rule fired (or the matched index is unavailable): ask both indexes.
    Combined,
}

#[derive(Debug)]
pub enum RouteError {
    /// Both indexes failed to build; knowledge queries cannot be served.
    NotInitialized,
    /// The combined plan needs an index that was not built.
    IndexNotReady(String),
    Agent(AgentError),
    Retrieval(anyhow::Error),
}

impl std::fmt::Display for RouteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteError::NotInitialized => write!(f, "knowledge base is not initialized"),
            RouteError::IndexNotReady(label) => write!(f, "{} index is not ready", label),
            RouteError::Agent(e) => write!(f, "{}", e),
            RouteError::Retrieval(e) => write!(f, "retrieval failed: {}", e),
        }
    }
}

impl std::error::Error for RouteError {}

pub struct QueryRouter {
    rules: Vec<RouteRule>,
    kb: Arc<KnowledgeBase>,
    retrieval: RetrievalEngine,
    agent: Arc<dyn QueryAgent>,
}

impl QueryRouter {
    pub fn new(
        rules: Vec<RouteRule>,
        kb: Arc<KnowledgeBase>,
        retrieval: RetrievalEngine,
        agent: Arc<dyn QueryAgent>,
    ) -> Self {
        Self {
            rules,
            kb,
            retrieval,
            agent,
        }
    }

    /// Pure classification: first matching rule whose backend is available.
    pub fn classify(&self, query: &str) -> RoutePlan {
        let lowered = query.to_lowercase();
        for rule in &self.rules {
            if !lowered.contains(rule.keyword) {
                continue;
            }
            match rule.target {
                RouteTarget::SqlAgent => return RoutePlan::Sql,
                RouteTarget::Diet if self.kb.diet.is_some() => return RoutePlan::Diet,
                RouteTarget::Technical if self.kb.technical.is_some() => {
                    return RoutePlan::Technical
                }
                // Matched a domain whose index is missing: fall through.
                _ => {}
            }
        }
        RoutePlan::Combined
    }

    /// Dispatch `query` per the rule table and return a labeled answer.
    ///
    /// Refused outright when no index was built, before any classification
    /// or dispatch. No backend is invoked in that state.
    pub async fn route(&self, query: &str) -> Result<Answer, RouteError> {
        if self.kb.readiness() == Readiness::Uninitialized {
            return Err(RouteError::NotInitialized);
        }

        match self.classify(query) {
            RoutePlan::Sql => {
                let text = self.agent.run(query).await.map_err(RouteError::Agent)?;
                Ok(Answer::from_source("sql", text))
            }
            RoutePlan::Technical => {
                let index = self
                    .kb
                    .technical
                    .as_ref()
                    .ok_or_else(|| RouteError::IndexNotReady("technical".to_string()))?;
                let text = self
                    .retrieval
                    .answer(query, index)
                    .await
                    .map_err(RouteError::Retrieval)?;
                Ok(Answer::from_source("technical", text))
            }
            RoutePlan::Diet => {
                let index = self
                    .kb
                    .diet
                    .as_ref()
                    .ok_or_else(|| RouteError::IndexNotReady("diet".to_string()))?;
                let text = self
                    .retrieval
                    .answer(query, index)
                    .await
                    .map_err(RouteError::Retrieval)?;
                Ok(Answer::from_source("diet", text))
            }
            RoutePlan::Combined => self.answer_combined(query).await,
        }
    }

    /// Query both indexes, label each answer with its source, technical
    /// first. Requires both indexes.
    async fn answer_combined(&self, query: &str) -> Result<Answer, RouteError> {
        let technical = self
            .kb
            .technical
            .as_ref()
            .ok_or_else(|| RouteError::IndexNotReady("technical".to_string()))?;
        let diet = self
            .kb
            .diet
            .as_ref()
            .ok_or_else(|| RouteError::IndexNotReady("diet".to_string()))?;

        let technical_answer = self
            .retrieval
            .answer(query, technical)
            .await
            .map_err(RouteError::Retrieval)?;
        let diet_answer = self
            .retrieval
            .answer(query, diet)
            .await
            .map_err(RouteError::Retrieval)?;

        Ok(Answer {
            text: format!(
                "From technical: {}\n\nFrom diet: {}",
                technical_answer, diet_answer
            ),
            sources: vec!["technical".to_string(), "diet".to_string()],
        })
    }
}
