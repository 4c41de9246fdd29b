// tests/gap_fill.rs
mod common;

use common::{quick_policy, req, Failing, Fixed, FocusOnly};
use fact_aggregator::ingest::config::{GapFillConfig, GapStrategy};
use fact_aggregator::{Orchestrator, OrchestratorSettings, RawFact, SourceDescriptor, SourceError};

fn settings(strategies: Vec<GapStrategy>) -> OrchestratorSettings {
    OrchestratorSettings {
        retry: quick_policy(),
        gap_fill: GapFillConfig {
            enabled: true,
            min_facts: 20,
            strategies,
        },
        ..OrchestratorSettings::default()
    }
}

fn housing_strategy() -> GapStrategy {
    GapStrategy {
        category: "housing".into(),
        source: "census".into(),
        query: "{category} units {query}".into(),
    }
}

#[tokio::test(start_paused = true)]
async fn targeted_pass_fills_a_mapped_gap() {
    let bls = Fixed::new("bls", vec![RawFact::new("average wages", 31.5).year(2024)]);
    let census = FocusOnly::new(vec![
        RawFact::new("median rent", 950i64).year(2023).category("housing"),
        RawFact::new("household size", 2.5).category("population"),
    ]);
    let sources = vec![
        SourceDescriptor::new("bls", 1, 100, 1000, bls),
        SourceDescriptor::new("census", 2, 100, 1000, census.clone()),
    ];
    let orch = Orchestrator::new(sources, settings(vec![housing_strategy()])).unwrap();

    let (facts, report) = orch
        .extract("Ohio 2023", &req(&["wages", "housing"]), None)
        .await;

    assert!(report.targeted_pass);
    assert!(report.gaps_identified.is_empty());
    assert_eq!(report.unique_facts, 2);
    // empty on the first pass, productive on the targeted one
    assert!(report.sources_empty.is_empty());
    assert!(facts.iter().any(|f| f.metric() == "median rent" && f.source() == "census"));

    let seen = census.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].focus_category, None);
    assert_eq!(seen[1].focus_category.as_deref(), Some("housing"));
    assert_eq!(seen[1].query, "housing units Ohio 2023");
}

#[tokio::test(start_paused = true)]
async fn unmapped_gap_goes_to_highest_priority_source() {
    let top = Fixed::new("bls", vec![]);
    let low = Fixed::new("web", vec![RawFact::new("something else", 1i64)]);
    let sources = vec![
        SourceDescriptor::new("web", 1, 100, 1000, low.clone()).with_priority(40),
        SourceDescriptor::new("bls", 2, 100, 1000, top.clone()).with_priority(95),
    ];
    let orch = Orchestrator::new(sources, settings(vec![])).unwrap();

    let (_, report) = orch.extract("Ohio", &req(&["education"]), None).await;

    assert!(report.targeted_pass);
    assert_eq!(report.gaps_identified, vec!["education"]);
    let seen = top.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].query, "education Ohio");
    assert_eq!(low.seen.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn no_pass_when_enough_facts_or_disabled() {
    let many: Vec<RawFact> = (0..25).map(|i| RawFact::new(format!("m{i}"), i as i64)).collect();
    let src = Fixed::new("bls", many);
    let orch = Orchestrator::new(
        vec![SourceDescriptor::new("bls", 1, 100, 1000, src.clone())],
        settings(vec![]),
    )
    .unwrap();
    let (_, report) = orch.extract("q", &req(&["housing"]), None).await;
    assert!(!report.targeted_pass);
    assert_eq!(report.gaps_identified, vec!["housing"]);

    // explicit threshold overrides config
    let (_, report) = orch.extract("q", &req(&["housing"]), Some(100)).await;
    assert!(report.targeted_pass);

    let mut off = settings(vec![]);
    off.gap_fill.enabled = false;
    let orch = Orchestrator::new(
        vec![SourceDescriptor::new("bls", 1, 100, 1000, Fixed::new("bls", vec![]))],
        off,
    )
    .unwrap();
    let (_, report) = orch.extract("q", &req(&["housing"]), None).await;
    assert!(!report.targeted_pass);
}

#[tokio::test(start_paused = true)]
async fn failing_gap_source_is_recorded_not_raised() {
    let bls = Fixed::new("bls", vec![RawFact::new("wages", 1.0)]);
    let census = Failing::new("census", SourceError::Transient("http 502".into()));
    let sources = vec![
        SourceDescriptor::new("bls", 1, 100, 1000, bls),
        SourceDescriptor::new("census", 2, 100, 1000, census),
    ];
    let orch = Orchestrator::new(sources, settings(vec![housing_strategy()])).unwrap();

    let (facts, report) = orch.extract("Ohio", &req(&["wages", "housing"]), None).await;
    assert_eq!(facts.len(), 1);
    assert!(report.targeted_pass);
    assert_eq!(report.gaps_identified, vec!["housing"]);
    assert_eq!(report.sources_failed.len(), 1);
    assert_eq!(report.sources_failed[0].source, "census");
}

#[tokio::test(start_paused = true)]
async fn source_recovered_by_targeted_pass_is_not_failed() {
    let bls = Fixed::new("bls", vec![RawFact::new("average wages", 31.5)]);
    let census = FocusOnly::failing_unfocused(
        vec![RawFact::new("median rent", 950i64).year(2023).category("housing")],
        SourceError::Transient("http 503".into()),
    );
    let sources = vec![
        SourceDescriptor::new("bls", 1, 100, 1000, bls),
        SourceDescriptor::new("census", 2, 100, 1000, census.clone()),
    ];
    let orch = Orchestrator::new(sources, settings(vec![housing_strategy()])).unwrap();

    let (facts, report) = orch
        .extract("Ohio 2023", &req(&["wages", "housing"]), None)
        .await;

    assert!(report.targeted_pass);
    assert!(facts.iter().any(|f| f.metric() == "median rent" && f.source() == "census"));
    assert!(report.sources_failed.is_empty(), "{:?}", report.sources_failed);
    assert!(report.sources_empty.is_empty());
    // three attempts on the tier pass, one on the targeted pass
    assert_eq!(census.seen.lock().unwrap().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn source_empty_then_failed_is_listed_once() {
    let bls = Fixed::new("bls", vec![RawFact::new("average wages", 31.5)]);
    let census = FocusOnly::failing_focused(SourceError::Transient("http 502".into()));
    let sources = vec![
        SourceDescriptor::new("bls", 1, 100, 1000, bls),
        SourceDescriptor::new("census", 2, 100, 1000, census),
    ];
    let orch = Orchestrator::new(sources, settings(vec![housing_strategy()])).unwrap();

    let (_, report) = orch
        .extract("Ohio 2023", &req(&["wages", "housing"]), None)
        .await;

    assert!(report.targeted_pass);
    assert_eq!(report.sources_failed.len(), 1);
    assert_eq!(report.sources_failed[0].source, "census");
    assert_eq!(report.sources_failed[0].reason, "http 502");
    assert!(report.sources_empty.is_empty());
}

/// Tags only; no fallback to metric text.
struct TagsOnly;

impl fact_aggregator::CategoryMatcher for TagsOnly {
    fn matches(&self, fact: &fact_aggregator::Fact, category: &str) -> bool {
        fact.categories().iter().any(|c| c.eq_ignore_ascii_case(category))
    }
}

#[tokio::test(start_paused = true)]
async fn custom_matcher_drives_gap_detection() {
    let bls = Fixed::new("bls", vec![RawFact::new("average wages", 31.5)]);
    let sources = vec![SourceDescriptor::new("bls", 1, 100, 1000, bls)];
    let mut off = settings(vec![]);
    off.gap_fill.enabled = false;

    let default = Orchestrator::new(sources.clone(), off.clone()).unwrap();
    let (_, report) = default.extract("Ohio", &req(&["wages"]), None).await;
    assert!(report.gaps_identified.is_empty());

    let strict = Orchestrator::new(sources, off)
        .unwrap()
        .with_matcher(std::sync::Arc::new(TagsOnly));
    let (facts, report) = strict.extract("Ohio", &req(&["wages"]), None).await;
    assert_eq!(report.gaps_identified, vec!["wages"]);
    let facts = facts.into_vec();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].metric(), "average wages");
}
