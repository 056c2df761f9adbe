//! Configuration types for the discovery pipeline.
//!
//! Every section uses `#[serde(default)]`, so a TOML file only needs the
//! keys it overrides. Exclusion lists and patterns live here and are
//! passed to the stages explicitly for each run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{DiscoveryError, Result};

/// Top-level configuration for a discovery run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Query generation strategies and caps.
    pub queries: QueryConfig,
    /// Provider fan-out bounds and shared HTTP behaviour.
    pub search: SearchSettings,
    /// Which search providers are enabled, with their quotas.
    pub providers: ProvidersConfig,
    /// PreFilter disallow-lists and listing patterns.
    pub filters: FilterConfig,
    /// Landing-page enrichment.
    pub enrichment: EnrichmentConfig,
    /// Relevance classification.
    pub classifier: ClassifierConfig,
    /// Embedding similarity.
    pub semantic: SemanticConfig,
    /// Media exclusion and business-signal validation.
    pub validation: ValidationConfig,
    /// Combined-score weights.
    pub ranking: RankingWeights,
    /// Per-category caps.
    pub diversity: DiversityConfig,
    /// Thresholds, relaxation and result bounds.
    pub final_filter: FinalFilterConfig,
}

/// Query generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Number of primary keywords used by the direct strategy.
    pub direct_keywords: usize,
    /// Number of leading keywords paired by the combo strategy.
    pub combo_keywords: usize,
    /// Number of leading keywords used by the geographic, competitive and
    /// sector strategies.
    pub focus_keywords: usize,
    /// Jurisdiction / suffix filter appended to direct queries (e.g. `site:.fr`).
    pub site_filter: Option<String>,
    /// Generic term appended by the direct "services" variant.
    pub services_term: String,
    /// Region names relevant to the client's market.
    pub market_regions: Vec<String>,
    /// Role nouns for the competitive-term strategy.
    pub role_nouns: Vec<String>,
    /// Sector acronyms / phrases for the sector-term strategy.
    pub sector_terms: Vec<String>,
    /// Alternatives templates; `{domain}` is replaced by the client domain.
    pub alternative_templates: Vec<String>,
    /// Also emit each alternatives template followed by the top keyword.
    pub alternatives_with_keyword: bool,
    /// Maximum number of queries generated.
    pub max_generated: usize,
    /// Maximum number of queries executed.
    pub max_executed: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            direct_keywords: 3,
            combo_keywords: 4,
            focus_keywords: 2,
            site_filter: None,
            services_term: "services".into(),
            market_regions: vec![
                "United States".into(),
                "United Kingdom".into(),
                "Europe".into(),
            ],
            role_nouns: vec![
                "provider".into(),
                "partner".into(),
                "integrator".into(),
                "expert".into(),
                "specialist".into(),
            ],
            sector_terms: vec!["B2B".into(), "SMB".into()],
            alternative_templates: vec![
                "alternatives to {domain}".into(),
                "competitor of {domain}".into(),
                "similar to {domain}".into(),
            ],
            alternatives_with_keyword: true,
            max_generated: 60,
            max_executed: 30,
        }
    }
}

/// Fan-out bounds and shared HTTP behaviour for providers and fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Maximum provider calls in flight at once.
    pub max_in_flight: usize,
    /// Per-call timeout in seconds.
    pub call_timeout_secs: u64,
    /// Maximum hits kept per query per provider.
    pub per_provider_cap: usize,
    /// Interface language / market hint (e.g. `en-US`).
    pub locale: String,
    /// Request safe-search filtering.
    pub safe_search: bool,
    /// Fixed User-Agent (None = rotate built-in browser strings).
    pub user_agent: Option<String>,
    /// Provider result cache TTL in seconds (0 disables the cache).
    pub cache_ttl_secs: u64,
    /// Maximum cached hit lists per provider.
    pub cache_entries: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            call_timeout_secs: 10,
            per_provider_cap: 20,
            locale: "en-US".into(),
            safe_search: true,
            user_agent: None,
            cache_ttl_secs: 3_600,
            cache_entries: 1_000,
        }
    }
}

/// Settings for one search provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Whether the provider takes part in fan-outs.
    pub enabled: bool,
    /// Requests per minute (0 = unlimited).
    pub requests_per_minute: u32,
    /// Burst allowance on top of the steady rate.
    pub burst: u32,
    /// Name of the environment variable holding the API key, if any.
    pub api_key_env: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 30,
            burst: 5,
            api_key_env: None,
        }
    }
}

/// Search provider selection and health settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Consecutive failures before a provider's circuit opens.
    pub breaker_failure_threshold: u32,
    /// Seconds a provider stays disabled once its circuit opens.
    pub breaker_cooldown_secs: u64,
    /// DuckDuckGo HTML (free).
    pub duckduckgo: ProviderSettings,
    /// Bing HTML (free).
    pub bing: ProviderSettings,
    /// Brave Search API (premium, needs a key).
    pub brave: ProviderSettings,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            breaker_failure_threshold: 5,
            breaker_cooldown_secs: 60,
            duckduckgo: ProviderSettings::default(),
            bing: ProviderSettings {
                enabled: false,
                ..ProviderSettings::default()
            },
            brave: ProviderSettings {
                requests_per_minute: 60,
                burst: 10,
                api_key_env: Some("BRAVE_API_KEY".into()),
                ..ProviderSettings::default()
            },
        }
    }
}

/// PreFilter rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// File extensions of non-HTML documents.
    pub document_extensions: Vec<String>,
    /// Domain suffixes never considered competitors (government, education, archives).
    pub disallowed_suffixes: Vec<String>,
    /// Analytics / SEO-tooling platforms.
    pub analytics_domains: Vec<String>,
    /// Business directories and listing sites.
    pub directory_domains: Vec<String>,
    /// Review aggregators.
    pub review_domains: Vec<String>,
    /// Case-insensitive regexes for listing language in titles / snippets.
    pub listing_patterns: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            document_extensions: strings(&[
                "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "rtf", "csv",
                "zip", "txt",
            ]),
            disallowed_suffixes: strings(&[
                ".gov", ".gouv.fr", ".gov.uk", ".edu", ".ac.uk", ".mil", ".int", "archive.org",
                "arxiv.org", "hal.science", "zenodo.org", "europa.eu",
            ]),
            analytics_domains: strings(&[
                "similarweb.com",
                "semrush.com",
                "ahrefs.com",
                "moz.com",
                "builtwith.com",
                "wappalyzer.com",
                "spyfu.com",
                "statista.com",
                "siteprice.org",
                "websiteoutlook.com",
            ]),
            directory_domains: strings(&[
                "yelp.com",
                "yellowpages.com",
                "crunchbase.com",
                "linkedin.com",
                "facebook.com",
                "instagram.com",
                "youtube.com",
                "wikipedia.org",
                "clutch.co",
                "goodfirms.co",
                "sortlist.com",
                "designrush.com",
                "manta.com",
                "kompass.com",
                "upwork.com",
                "fiverr.com",
                "reddit.com",
                "quora.com",
                "medium.com",
            ]),
            review_domains: strings(&[
                "trustpilot.com",
                "g2.com",
                "capterra.com",
                "getapp.com",
                "softwareadvice.com",
                "glassdoor.com",
                "trustradius.com",
                "gartner.com",
            ]),
            listing_patterns: strings(&[
                r"\btop\s*\d+\b",
                r"\bbest\s+of\b",
                r"\b\d+\s+best\b",
                r"\brankings?\b",
                r"\blist\s+of\b",
                r"\bdirectory\b",
                r"\bcompared\b",
            ]),
        }
    }
}

/// Enricher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Number of top candidates (by source score) whose pages are fetched.
    pub top_k: usize,
    /// Maximum fetches in flight at once.
    pub max_in_flight: usize,
    /// Per-fetch timeout in seconds.
    pub fetch_timeout_secs: u64,
    /// Retry a fetch once after a transport failure.
    pub retry_transient: bool,
    /// Maximum service phrases kept per candidate.
    pub max_services: usize,
    /// Maximum activity keywords kept per candidate.
    pub max_keywords: usize,
    /// Maximum characters of the description.
    pub max_description_chars: usize,
    /// Activity vocabulary matched against page text (profile keywords are added per run).
    pub vocabulary: Vec<String>,
    /// Phrases marking an active business (matched in text and link labels).
    pub indicator_phrases: Vec<String>,
    /// Region tokens detected on pages for the geographic signal.
    pub known_regions: Vec<String>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            top_k: 50,
            max_in_flight: 8,
            fetch_timeout_secs: 8,
            retry_transient: true,
            max_services: 3,
            max_keywords: 5,
            max_description_chars: 240,
            vocabulary: strings(&[
                "hosting",
                "cloud",
                "migration",
                "consulting",
                "integration",
                "development",
                "design",
                "marketing",
                "seo",
                "software",
                "saas",
                "managed services",
                "support",
                "training",
                "audit",
                "security",
                "devops",
                "ecommerce",
                "automation",
                "analytics",
                "implementation",
                "maintenance",
                "outsourcing",
                "strategy",
                "infrastructure",
            ]),
            indicator_phrases: strings(&[
                "contact",
                "get in touch",
                "request a quote",
                "quote",
                "book a demo",
                "free trial",
                "pricing",
                "portfolio",
                "case study",
                "case studies",
                "our clients",
                "latest news",
                "mailto",
                "tel",
            ]),
            known_regions: strings(&[
                "united states",
                "usa",
                "canada",
                "north america",
                "united kingdom",
                "uk",
                "london",
                "europe",
                "france",
                "paris",
                "germany",
                "berlin",
                "spain",
                "italy",
                "netherlands",
                "belgium",
                "switzerland",
                "australia",
                "india",
            ]),
        }
    }
}

/// Relevance classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Use the HTTP classifier (false = always fall back).
    pub enabled: bool,
    /// Candidates per classification request.
    pub batch_size: usize,
    /// Score assigned when classification is unavailable.
    pub fallback_score: f64,
    /// Minimum score for a direct competitor.
    pub direct_threshold: f64,
    /// Minimum score for an indirect competitor.
    pub indirect_threshold: f64,
    /// OpenAI-compatible API base URL.
    pub base_url: String,
    /// Chat model name.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: 10,
            fallback_score: 0.6,
            direct_threshold: 0.8,
            indirect_threshold: 0.6,
            base_url: "https://api.openai.com".into(),
            model: "gpt-4o-mini".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            timeout_secs: 30,
        }
    }
}

/// Semantic similarity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    /// Use the HTTP embedder (false = similarity defaults to 0).
    pub enabled: bool,
    /// Maximum candidates embedded per run.
    pub max_batch: usize,
    /// OpenAI-compatible API base URL.
    pub base_url: String,
    /// Embedding model name.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_batch: 30,
            base_url: "https://api.openai.com".into(),
            model: "text-embedding-3-small".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            timeout_secs: 30,
        }
    }
}

/// ContentValidator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Known news / media domains.
    pub media_domains: Vec<String>,
    /// Domain labels that mark a media outlet (`dailynews.example`, `tech-journal.example`).
    pub media_domain_tokens: Vec<String>,
    /// Content phrases that mark a media outlet.
    pub media_phrases: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            media_domains: strings(&[
                "nytimes.com",
                "theguardian.com",
                "bbc.co.uk",
                "bbc.com",
                "forbes.com",
                "techcrunch.com",
                "reuters.com",
                "bloomberg.com",
                "lemonde.fr",
                "lefigaro.fr",
                "zdnet.com",
                "wired.com",
                "theverge.com",
                "businessinsider.com",
            ]),
            media_domain_tokens: strings(&[
                "news", "journal", "magazine", "mag", "gazette", "herald", "tribune",
                "times",
            ]),
            media_phrases: strings(&[
                "breaking news",
                "latest headlines",
                "editor's picks",
                "subscribe to read",
                "our journalists",
            ]),
        }
    }
}

/// Combined-score weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    /// Weight of the relevance score.
    pub relevance: f64,
    /// Weight of the semantic similarity.
    pub similarity: f64,
    /// Weight of the cross-validation flag.
    pub cross_validation: f64,
    /// Weight of the geographic match flag.
    pub geo: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            relevance: 0.50,
            similarity: 0.25,
            cross_validation: 0.15,
            geo: 0.10,
        }
    }
}

/// Rounding applied to the fair-share category cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapRounding {
    /// `ceil(requested / categories)`.
    #[default]
    Up,
    /// `floor(requested / categories)`.
    Down,
    /// Nearest integer, halves rounded up.
    Nearest,
}

/// DiversityEnforcer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiversityConfig {
    /// Whether per-category caps apply at all.
    pub enabled: bool,
    /// Rounding of the fair share.
    pub rounding: CapRounding,
    /// Fixed cap overriding the fair share.
    pub cap_override: Option<usize>,
    /// Lowest cap ever applied.
    pub min_cap: usize,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rounding: CapRounding::Up,
            cap_override: None,
            min_cap: 1,
        }
    }
}

/// ConfidenceScorer + FinalFilter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalFilterConfig {
    /// Strict combined-score threshold.
    pub min_combined: f64,
    /// Strict confidence threshold.
    pub min_confidence: f64,
    /// Lowest combined-score threshold relaxation may reach.
    pub floor_combined: f64,
    /// Lowest confidence threshold relaxation may reach.
    pub floor_confidence: f64,
    /// Amount both thresholds drop per relaxation step.
    pub relax_step: f64,
    /// Minimum number of competitors to aim for.
    pub min_results: usize,
    /// Absolute maximum number of competitors.
    pub hard_cap: usize,
}

impl Default for FinalFilterConfig {
    fn default() -> Self {
        Self {
            min_combined: 0.45,
            min_confidence: 0.35,
            floor_combined: 0.20,
            floor_confidence: 0.10,
            relax_step: 0.05,
            min_results: 10,
            hard_cap: 20,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

fn unit_interval(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(DiscoveryError::Config(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

impl DiscoveryConfig {
    /// Validate cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        let q = &self.queries;
        if q.max_executed == 0 {
            return Err(DiscoveryError::Config("queries.max_executed must be greater than 0".into()));
        }
        if q.max_generated < q.max_executed {
            return Err(DiscoveryError::Config(
                "queries.max_generated must be at least queries.max_executed".into(),
            ));
        }
        if self.search.max_in_flight == 0 || self.enrichment.max_in_flight == 0 {
            return Err(DiscoveryError::Config("max_in_flight must be greater than 0".into()));
        }
        if self.search.call_timeout_secs == 0 || self.enrichment.fetch_timeout_secs == 0 {
            return Err(DiscoveryError::Config("timeouts must be greater than 0".into()));
        }
        if self.classifier.batch_size == 0 {
            return Err(DiscoveryError::Config("classifier.batch_size must be greater than 0".into()));
        }
        unit_interval("classifier.fallback_score", self.classifier.fallback_score)?;
        unit_interval("classifier.direct_threshold", self.classifier.direct_threshold)?;
        unit_interval("classifier.indirect_threshold", self.classifier.indirect_threshold)?;
        if self.classifier.indirect_threshold > self.classifier.direct_threshold {
            return Err(DiscoveryError::Config(
                "classifier.indirect_threshold must not exceed direct_threshold".into(),
            ));
        }

        let w = &self.ranking;
        for (name, value) in [
            ("ranking.relevance", w.relevance),
            ("ranking.similarity", w.similarity),
            ("ranking.cross_validation", w.cross_validation),
            ("ranking.geo", w.geo),
        ] {
            unit_interval(name, value)?;
        }
        let total = w.relevance + w.similarity + w.cross_validation + w.geo;
        if (total - 1.0).abs() > 1e-6 {
            return Err(DiscoveryError::Config(format!(
                "ranking weights must sum to 1, got {total}"
            )));
        }

        let f = &self.final_filter;
        unit_interval("final_filter.min_combined", f.min_combined)?;
        unit_interval("final_filter.min_confidence", f.min_confidence)?;
        unit_interval("final_filter.floor_combined", f.floor_combined)?;
        unit_interval("final_filter.floor_confidence", f.floor_confidence)?;
        if f.floor_combined > f.min_combined || f.floor_confidence > f.min_confidence {
            return Err(DiscoveryError::Config(
                "final_filter floors must not exceed the strict thresholds".into(),
            ));
        }
        if f.relax_step <= 0.0 || f.relax_step > 1.0 {
            return Err(DiscoveryError::Config("final_filter.relax_step must be within (0, 1]".into()));
        }
        if f.hard_cap == 0 {
            return Err(DiscoveryError::Config("final_filter.hard_cap must be greater than 0".into()));
        }
        if self.diversity.min_cap == 0 {
            return Err(DiscoveryError::Config("diversity.min_cap must be greater than 0".into()));
        }
        if let Some(pattern) = self
            .filters
            .listing_patterns
            .iter()
            .find(|p| regex::Regex::new(p).is_err())
        {
            return Err(DiscoveryError::Config(format!("invalid listing pattern: {pattern}")));
        }
        Ok(())
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| DiscoveryError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| DiscoveryError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/rivalscope/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("rivalscope").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("rivalscope")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/rivalscope-config/config.toml")
        }
    }
}
