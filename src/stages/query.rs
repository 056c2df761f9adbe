//! Query generation across search strategies.
//!
//! Each strategy yields its queries in priority order (0 first). The
//! merged list takes the top query of every strategy, then round-robins
//! over the rest, so any prefix of it stays diverse. Executing the first
//! `max_executed` queries is therefore the same selection rule as
//! generating the first `max_generated`.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::QueryConfig;
use crate::profile::ClientProfile;

/// Strategy that produced a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryStrategy {
    /// Primary keywords alone, optionally with the market site filter.
    Direct,
    /// Pairs of the leading keywords.
    Combo,
    /// Focus keywords combined with the client's regions.
    Geographic,
    /// Focus keywords plus role nouns such as "provider".
    CompetitiveTerm,
    /// Focus keywords plus sector terms.
    SectorTerm,
    /// "Alternatives to {domain}" style templates.
    Alternatives,
}

impl QueryStrategy {
    /// Strategies in generation order.
    pub const ALL: [Self; 6] = [
        Self::Direct,
        Self::Combo,
        Self::Geographic,
        Self::CompetitiveTerm,
        Self::SectorTerm,
        Self::Alternatives,
    ];

    /// Kebab-case name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Combo => "combo",
            Self::Geographic => "geographic",
            Self::CompetitiveTerm => "competitive-term",
            Self::SectorTerm => "sector-term",
            Self::Alternatives => "alternatives",
        }
    }
}

impl fmt::Display for QueryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One search query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Query text as sent to providers.
    pub text: String,
    /// Strategy that produced it.
    pub strategy: QueryStrategy,
    /// Rank within the strategy, 0 = highest.
    pub priority: usize,
}

/// Generated queries and the subset selected for execution.
#[derive(Debug, Clone, Default)]
pub struct QueryPlan {
    /// Everything generated, capped at `max_generated`.
    pub generated: Vec<SearchQuery>,
    /// Queries to execute, capped at `max_executed`.
    pub selected: Vec<SearchQuery>,
}

impl QueryPlan {
    /// Texts of the selected queries.
    pub fn selected_texts(&self) -> Vec<String> {
        self.selected.iter().map(|q| q.text.clone()).collect()
    }
}

/// Generate queries for a profile.
///
/// `client_domain` is the normalised domain returned by
/// [`ClientProfile::validate`].
pub fn generate_queries(
    profile: &ClientProfile,
    client_domain: &str,
    config: &QueryConfig,
) -> QueryPlan {
    let primary: Vec<String> = profile
        .primary_keywords
        .iter()
        .map(|k| collapse(k))
        .filter(|k| !k.is_empty())
        .collect();
    let keywords = profile.keywords();
    let focus: Vec<&String> = keywords.iter().take(config.focus_keywords).collect();
    let regions: Vec<String> = if profile.regions.is_empty() {
        config.market_regions.clone()
    } else {
        profile.regions.clone()
    };
    let site_filter = config
        .site_filter
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty());

    let mut seen = HashSet::new();
    let mut buckets: Vec<Vec<SearchQuery>> = Vec::with_capacity(QueryStrategy::ALL.len());

    for strategy in QueryStrategy::ALL {
        let mut texts: Vec<String> = Vec::new();
        match strategy {
            QueryStrategy::Direct => {
                for kw in primary.iter().take(config.direct_keywords) {
                    texts.push(match site_filter {
                        Some(filter) => format!("{kw} {filter}"),
                        None => kw.clone(),
                    });
                    if !config.services_term.trim().is_empty() {
                        texts.push(format!("{kw} {}", config.services_term.trim()));
                    }
                }
            }
            QueryStrategy::Combo => {
                let top: Vec<&String> = keywords.iter().take(config.combo_keywords).collect();
                for (i, a) in top.iter().enumerate() {
                    for b in top.iter().skip(i + 1) {
                        texts.push(format!("{a} {b}"));
                    }
                }
            }
            QueryStrategy::Geographic => {
                for kw in &focus {
                    for region in &regions {
                        texts.push(format!("{kw} {}", region.trim()));
                    }
                }
            }
            QueryStrategy::CompetitiveTerm => {
                for kw in &focus {
                    for role in &config.role_nouns {
                        texts.push(format!("{kw} {}", role.trim()));
                    }
                }
            }
            QueryStrategy::SectorTerm => {
                for kw in &focus {
                    for term in &config.sector_terms {
                        texts.push(format!("{kw} {}", term.trim()));
                    }
                }
            }
            QueryStrategy::Alternatives => {
                for template in &config.alternative_templates {
                    let base = template.replace("{domain}", client_domain);
                    texts.push(base.clone());
                    if config.alternatives_with_keyword {
                        if let Some(kw) = keywords.first() {
                            texts.push(format!("{base} {kw}"));
                        }
                    }
                }
            }
        }

        let mut bucket = Vec::new();
        for text in texts {
            let text = collapse(&text);
            if text.is_empty() || !seen.insert(text.to_lowercase()) {
                continue;
            }
            bucket.push(SearchQuery {
                priority: bucket.len(),
                text,
                strategy,
            });
        }
        buckets.push(bucket);
    }

    let generated = round_robin(&buckets, config.max_generated);
    let selected: Vec<SearchQuery> = generated
        .iter()
        .take(config.max_executed)
        .cloned()
        .collect();

    tracing::debug!(
        generated = generated.len(),
        selected = selected.len(),
        "queries generated"
    );
    for query in &selected {
        tracing::trace!(strategy = %query.strategy, priority = query.priority, text = %query.text, "query selected");
    }

    QueryPlan {
        generated,
        selected,
    }
}

fn round_robin(buckets: &[Vec<SearchQuery>], cap: usize) -> Vec<SearchQuery> {
    let mut out = Vec::new();
    let longest = buckets.iter().map(Vec::len).max().unwrap_or(0);
    for round in 0..longest {
        for bucket in buckets {
            if out.len() == cap {
                return out;
            }
            if let Some(query) = bucket.get(round) {
                out.push(query.clone());
            }
        }
    }
    out
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
