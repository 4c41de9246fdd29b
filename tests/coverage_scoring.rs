// tests/coverage_scoring.rs
mod common;

use common::req;
use fact_aggregator::{CoverageScorer, Fact, GapAnalyzer, Recommendation};

fn fact(metric: &str) -> Fact {
    Fact::new(metric, 1.0, "bls", 95, 0.9)
}

#[test]
fn empty_required_is_exactly_point_eight() {
    let s = CoverageScorer::default();
    assert_eq!(s.data_quality(&[], &[]), 0.8);
    assert_eq!(s.data_quality(&[fact("anything")], &[]), 0.8);
}

#[test]
fn half_coverage_with_tiny_volume() {
    let s = CoverageScorer::default();
    let facts = vec![fact("a metric")];
    let score = s.data_quality(&facts, &req(&["a", "b"]));
    let eps = 1.0 / 50.0;
    assert!((score - (0.7 * 0.5 + 0.3 * eps)).abs() < 1e-12, "score {score}");
}

#[test]
fn volume_saturates_at_fifty() {
    let s = CoverageScorer::default();
    let facts: Vec<Fact> = (0..120).map(|i| fact(&format!("wages {i}"))).collect();
    assert!((s.data_quality(&facts, &req(&["wages"])) - 1.0).abs() < 1e-12);
}

#[test]
fn gaps_list_uncovered_categories() {
    let g = GapAnalyzer::default();
    let facts = vec![
        fact("median household income").with_entity("Ohio"),
        fact("rent").with_category("housing"),
    ];
    assert_eq!(
        g.missing(&facts, &req(&["income", "housing", "education"])),
        req(&["education"])
    );
    assert!(g.missing(&facts, &[]).is_empty());
}

#[test]
fn analysis_confidence_components() {
    let s = CoverageScorer::default();
    let facts: Vec<Fact> = (0..50).map(|i| fact(&format!("wages {i}"))).collect();

    let c = s.analysis_confidence(&facts, &req(&["wages"]), 6, 0);
    assert!((c.components.data_quality - 1.0).abs() < 1e-12);
    assert_eq!(c.components.agreement, 0.9);
    assert_eq!(c.components.citation_compliance, 1.0);
    assert!((c.overall - 0.97).abs() < 1e-9);
    assert_eq!(c.recommendation, Recommendation::High);

    let c = s.analysis_confidence(&facts, &req(&["wages", "housing"]), 2, 3);
    // dq 0.65, agreement 0.75, compliance 0.25
    assert!((c.overall - (0.65 * 0.4 + 0.75 * 0.3 + 0.25 * 0.3)).abs() < 1e-12);
    assert_eq!(c.recommendation, Recommendation::Medium);
}

#[test]
fn unit_matches_untagged_facts() {
    let g = GapAnalyzer::default();
    let facts = vec![fact("headline figure").with_unit("Percent")];
    assert!(g.missing(&facts, &req(&["percent"])).is_empty());
    assert_eq!(g.missing(&facts, &req(&["dollars"])), req(&["dollars"]));
}
