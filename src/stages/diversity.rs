//! Business-category inference and per-category caps.

use std::collections::BTreeMap;

use crate::candidate::{BusinessCategory, Candidate};
use crate::config::{CapRounding, DiversityConfig};
use crate::stages::contains_term;

const INTEGRATOR_MARKERS: &[&str] = &[
    "integrator",
    "systems integrator",
    "integration partner",
    "implementation partner",
    "certified partner",
    "reseller",
    "integration services",
];
const AGENCY_MARKERS: &[&str] = &[
    "agency",
    "studio",
    "web design",
    "digital marketing",
    "creative",
    "branding",
];
const CONSULTANCY_MARKERS: &[&str] = &[
    "consulting",
    "consultancy",
    "consultants",
    "advisory",
    "advisors",
];
const FREELANCER_MARKERS: &[&str] = &[
    "freelance",
    "freelancer",
    "independent consultant",
    "hire me",
    "my portfolio",
];
const VENDOR_MARKERS: &[&str] = &[
    "saas",
    "platform",
    "software",
    "free trial",
    "book a demo",
    "sign up",
    "pricing",
];

fn markers(category: BusinessCategory) -> &'static [&'static str] {
    match category {
        BusinessCategory::Integrator => INTEGRATOR_MARKERS,
        BusinessCategory::Agency => AGENCY_MARKERS,
        BusinessCategory::Consultancy => CONSULTANCY_MARKERS,
        BusinessCategory::Freelancer => FREELANCER_MARKERS,
        BusinessCategory::Vendor => VENDOR_MARKERS,
        BusinessCategory::Other => &[],
    }
}

/// Infer a candidate's business category from its hit and page text.
///
/// The category with the most marker matches wins; ties go to the
/// earlier category in [`BusinessCategory::ALL`]. No match gives `Other`.
pub fn infer_category(candidate: &Candidate) -> BusinessCategory {
    let mut text = candidate.searchable_text();
    if let Some(e) = candidate.enriched() {
        text.push(' ');
        text.push_str(&e.indicators.join(" "));
    }

    let mut best = (BusinessCategory::Other, 0usize);
    for category in BusinessCategory::ALL {
        let hits = markers(category)
            .iter()
            .filter(|m| contains_term(&text, m))
            .count();
        if hits > best.1 {
            best = (category, hits);
        }
    }
    best.0
}

/// Cap per category for `requested` results spread over `categories`.
pub fn category_cap(requested: usize, categories: usize, config: &DiversityConfig) -> usize {
    let cap = match config.cap_override {
        Some(cap) => cap,
        None if categories == 0 => requested,
        None => match config.rounding {
            CapRounding::Up => requested.div_ceil(categories),
            CapRounding::Down => requested / categories,
            CapRounding::Nearest => (requested + categories / 2) / categories,
        },
    };
    cap.max(config.min_cap)
}

/// What the enforcer decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiversityOutcome {
    /// Cap applied per category (None when disabled).
    pub cap: Option<usize>,
    /// Ranked candidates per category.
    pub categories: BTreeMap<BusinessCategory, usize>,
    /// Number of candidates deferred.
    pub deferred: usize,
}

/// Categorise ranked candidates and defer those over their category's cap.
///
/// `ranking` holds candidate indices best first. Within each category the
/// best `cap` candidates stay eligible; the rest are flagged
/// `diversity_deferred`, never excluded here.
pub fn enforce_diversity(
    candidates: &mut [Candidate],
    ranking: &[usize],
    requested: usize,
    config: &DiversityConfig,
) -> DiversityOutcome {
    let mut categories: BTreeMap<BusinessCategory, usize> = BTreeMap::new();
    for &i in ranking {
        let category = infer_category(&candidates[i]);
        candidates[i].business_category = Some(category);
        candidates[i].diversity_deferred = false;
        *categories.entry(category).or_default() += 1;
    }

    if !config.enabled {
        return DiversityOutcome {
            cap: None,
            categories,
            deferred: 0,
        };
    }

    let cap = category_cap(requested, categories.len(), config);
    let mut kept: BTreeMap<BusinessCategory, usize> = BTreeMap::new();
    let mut deferred = 0;
    for &i in ranking {
        let Some(category) = candidates[i].business_category else {
            continue;
        };
        let count = kept.entry(category).or_default();
        if *count >= cap {
            candidates[i].diversity_deferred = true;
            deferred += 1;
            tracing::debug!(domain = %candidates[i].domain, category = %category, cap, "deferred by diversity cap");
        } else {
            *count += 1;
        }
    }

    tracing::info!(
        categories = categories.len(),
        cap,
        deferred,
        "diversity enforced"
    );
    DiversityOutcome {
        cap: Some(cap),
        categories,
        deferred,
    }
}
