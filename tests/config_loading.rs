// tests/config_loading.rs
use std::path::PathBuf;
use std::{env, fs};

use fact_aggregator::ingest::config::{AggregatorConfig, ConnectorKind, ENV_PATH};
use fact_aggregator::Orchestrator;

fn fixture(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
        .display()
        .to_string()
}

#[test]
fn sample_config_parses() {
    let p = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/aggregator.toml");
    let cfg = AggregatorConfig::load_from(&p).unwrap();
    assert_eq!(cfg.sources.len(), 2);
    assert_eq!(cfg.sources[1].priority, Some(90));
    assert_eq!(cfg.sources[0].kind, ConnectorKind::Static);
    assert_eq!(cfg.gap_fill.strategies[0].source, "census");
    assert!(cfg.classifier.tables.contains_key("housing"));
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_PATH);

    // nothing on disk → defaults
    let cfg = AggregatorConfig::load_default().unwrap();
    assert!(cfg.sources.is_empty());
    assert_eq!(cfg.retry.max_retries, 3);

    // JSON fallback
    fs::create_dir_all("config").unwrap();
    fs::write("config/aggregator.json", r#"{"run":{"max_concurrency":2}}"#).unwrap();
    assert_eq!(AggregatorConfig::load_default().unwrap().run.max_concurrency, 2);

    // TOML beats JSON
    fs::write("config/aggregator.toml", "[run]\nmax_concurrency = 4\n").unwrap();
    assert_eq!(AggregatorConfig::load_default().unwrap().run.max_concurrency, 4);

    // env beats both
    let p = tmp.path().join("elsewhere.toml");
    fs::write(&p, "[run]\nmax_concurrency = 6\n").unwrap();
    env::set_var(ENV_PATH, p.display().to_string());
    assert_eq!(AggregatorConfig::load_default().unwrap().run.max_concurrency, 6);

    // env pointing nowhere is an error, not a silent fallback
    env::set_var(ENV_PATH, tmp.path().join("missing.toml").display().to_string());
    assert!(AggregatorConfig::load_default().is_err());

    env::remove_var(ENV_PATH);
    env::set_current_dir(&old).unwrap();
}

#[tokio::test]
async fn config_driven_run_over_static_fixtures() {
    let toml = format!(
        r#"
        [gap_fill]
        min_facts = 1

        [[sources]]
        name = "bls"
        tier = 1
        fixture = "{bls}"

        [[sources]]
        name = "census"
        tier = 2
        fixture = "{census}"
        confidence = 0.8
        "#,
        bls = fixture("bls_labor.json").replace('\\', "/"),
        census = fixture("census_housing.json").replace('\\', "/"),
    );
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("agg.toml");
    fs::write(&p, toml).unwrap();

    let cfg = AggregatorConfig::load_from(&p).unwrap();
    let orch = Orchestrator::from_config(&cfg).unwrap();
    assert_eq!(orch.sources()[0].priority(), 95);
    assert_eq!(orch.sources()[1].confidence(), 0.8);

    let required = vec!["labor".to_string(), "housing".to_string(), "wages".to_string()];
    let (facts, report) = orch.extract("unemployment and rent in Ohio", &required, None).await;

    // both default to priority 95; the census copy carries a 0.7 override and loses on confidence
    assert_eq!(report.total_facts, 8);
    assert_eq!(report.unique_facts, 7);
    let ur = facts.by_metric("unemployment rate").next().unwrap();
    assert_eq!(ur.source(), "bls");
    assert!(report.gaps_identified.is_empty());
    assert!(report.sources_failed.is_empty());
    assert!(!report.targeted_pass);
}
