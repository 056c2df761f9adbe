//! Rivalscope: automated competitor discovery and validation.
//!
//! Given a [`ClientProfile`] (the client's domain and keywords), a run
//! generates search queries, fans them out across search providers, merges
//! the hits per domain and walks the candidates through a fixed sequence of
//! stages:
//!
//! queries → search → dedupe → prefilter → enrich → cross-validate →
//! classify → similarity → content validation → rank → diversity →
//! final filter
//!
//! Every stage either annotates a candidate or excludes it with a recorded
//! reason. Classification and embeddings are optional capabilities; when
//! they are missing or failing the run completes on fallback values and
//! reports the degradation in [`PipelineResult::degraded`].

pub mod candidate;
pub mod capability;
pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod profile;
pub mod providers;
pub mod result;
pub mod stages;

pub use candidate::{
    BusinessCategory, Candidate, ExclusionReason, InclusionRule, InclusionStatus, RelevanceLabel,
};
pub use capability::{
    Classification, ClassifierError, EmbeddingError, EmbeddingService, TextClassifier,
};
pub use config::DiscoveryConfig;
pub use error::{DiscoveryError, Result};
pub use job::{DiscoveryJob, JobStatus};
pub use pipeline::{CompetitorPipeline, build_providers};
pub use profile::ClientProfile;
pub use result::{CandidateView, DegradedEvent, DegradedStage, PipelineResult, ThresholdReport};
