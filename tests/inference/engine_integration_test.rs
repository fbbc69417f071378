use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relscout::config::Settings;
use relscout::model::{Column, SchemaSnapshot, Table};
use relscout::semantic::inference::verify::VerifyResult;
use relscout::semantic::inference::{
    Cardinality, DeferVerifier, DetectionConfig, EmbedError, Embedder, NoSampler, OverlapOutcome,
    PatternRule, Provenance, RelationshipDetector, RelationshipKey, RuleBasedVerifier, SampleSet,
    Status, VerificationRequest, VerificationVerdict, Verifier,
};
use serde_json::{json, Value};

fn ints(values: impl IntoIterator<Item = i64>) -> Vec<Value> {
    values.into_iter().map(Value::from).collect()
}

fn customers_orders() -> SchemaSnapshot {
    SchemaSnapshot::new([
        Table::new("customers").column(Column::new("id", "integer").primary_key()),
        Table::new("orders")
            .column(Column::new("id", "integer").primary_key())
            .column(Column::new("customer_id", "integer").references("customers", "id")),
    ])
    .unwrap()
}

fn shop() -> SchemaSnapshot {
    SchemaSnapshot::new([
        Table::new("customers")
            .column(Column::new("id", "integer").primary_key())
            .column(Column::new("name", "text"))
            .with_row_count(100),
        Table::new("orders")
            .column(Column::new("id", "integer").primary_key())
            .column(Column::new("customer_id", "integer").references("customers", "id"))
            .column(Column::new("created_at", "timestamp"))
            .with_row_count(1_000),
        Table::new("categories")
            .column(Column::new("id", "integer").primary_key())
            .column(Column::new("name", "text")),
        Table::new("products")
            .column(Column::new("id", "integer").primary_key())
            .column(Column::new("category_id", "integer"))
            .column(Column::new("name", "text")),
        Table::new("order_items")
            .column(Column::new("id", "integer").primary_key())
            .column(Column::new("order_id", "integer"))
            .column(Column::new("product_id", "integer"))
            .column(Column::new("quantity", "integer"))
            .column(Column::new("price", "numeric(10,2)")),
    ])
    .unwrap()
}

fn shop_samples() -> SampleSet {
    SampleSet::new()
        .with("customers", "id", ints(1..=20))
        .with("orders", "id", ints(1..=50))
        .with("orders", "customer_id", ints([1, 2, 2, 3, 5, 8, 13]))
        .with("categories", "id", ints(1..=5))
        .with("products", "id", ints(1..=30))
        .with("products", "category_id", ints([1, 1, 2, 3, 4, 5]))
        .with("order_items", "order_id", ints([1, 2, 3, 4, 10, 20]))
        .with("order_items", "product_id", ints([3, 6, 9, 12]))
}

/// Keeps every non-declared candidate in the uncertain band.
fn verifying_config() -> DetectionConfig {
    DetectionConfig::default().with_accept_threshold(0.99)
}

struct SlowVerifier {
    delay: Duration,
}

#[async_trait]
impl Verifier for SlowVerifier {
    async fn verify_batch(
        &self,
        requests: &[VerificationRequest],
    ) -> VerifyResult<Vec<VerificationVerdict>> {
        tokio::time::sleep(self.delay).await;
        Ok(requests
            .iter()
            .map(|r| VerificationVerdict {
                key: r.key.clone(),
                accepted: true,
                explanation: None,
                cardinality: None,
                confidence: None,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "slow"
    }
}

#[derive(Default)]
struct CountingVerifier {
    calls: AtomicUsize,
    requests: AtomicUsize,
}

#[async_trait]
impl Verifier for CountingVerifier {
    async fn verify_batch(
        &self,
        requests: &[VerificationRequest],
    ) -> VerifyResult<Vec<VerificationVerdict>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.fetch_add(requests.len(), Ordering::SeqCst);
        Ok(requests
            .iter()
            .map(|r| VerificationVerdict {
                key: r.key.clone(),
                accepted: false,
                explanation: Some("not a key".to_string()),
                cardinality: None,
                confidence: None,
            })
            .collect())
    }
}

struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Err(EmbedError::Backend("model not loaded".to_string()))
    }
}

#[test]
fn test_declared_foreign_key_without_samples() {
    let report = RelationshipDetector::default().detect(&customers_orders(), &SampleSet::new());

    assert_eq!(report.accepted.len(), 1);
    let rel = &report.accepted[0];
    assert_eq!(
        rel.key(),
        RelationshipKey::new("orders", "customer_id", "customers", "id")
    );
    assert_eq!(rel.confidence, 1.0);
    assert_eq!(rel.cardinality, Cardinality::ManyToOne);
    assert_eq!(rel.provenance, Provenance::Declared);
    assert_eq!(rel.status, Status::Accepted);
    // Diagnostics are still computed
    assert!(rel.signals.semantic.is_some());
    assert!(rel.signals.overlap.is_indeterminate());
}

#[test]
fn test_every_declared_key_is_accepted() {
    let report = RelationshipDetector::default().detect(&shop(), &shop_samples());
    let snapshot = shop();

    for (table, column, reference) in snapshot.declared_foreign_keys() {
        let key = RelationshipKey::new(&table.name, &column.name, &reference.table, &reference.column);
        let rel = report
            .accepted
            .iter()
            .find(|c| c.key() == key)
            .unwrap_or_else(|| panic!("declared key {key} not accepted"));
        assert_eq!(rel.confidence, 1.0);
        assert_eq!(rel.provenance, Provenance::Declared);
    }
}

#[test]
fn test_undeclared_suffix_id_is_detected() {
    let report = RelationshipDetector::default().detect(&shop(), &shop_samples());
    let key = RelationshipKey::new("products", "category_id", "categories", "id");

    let rel = report.find(&key).expect("products.category_id candidate");
    assert_ne!(rel.status, Status::Rejected);
    assert_eq!(rel.rule.as_deref(), Some("suffix_id"));
    assert_eq!(rel.provenance, Provenance::Detected);
    assert_eq!(rel.cardinality, Cardinality::ManyToOne);
    assert!(rel.signals.semantic.is_some_and(|s| s > 0.0));
    assert!(matches!(
        rel.signals.overlap,
        OverlapOutcome::Measured { containment, .. } if containment == 1.0
    ));
    // pattern 0.8 and full containment alone put it at 0.66
    assert!(rel.confidence >= 0.66);
    assert!(rel.confidence > DetectionConfig::default().acceptance_floor);
}

#[test]
fn test_junction_is_reported_as_many_to_many() {
    let report = RelationshipDetector::default().detect(&shop(), &shop_samples());

    assert_eq!(report.many_to_many.len(), 1);
    let bridge = &report.many_to_many[0];
    assert_eq!(bridge.junction_table, "order_items");
    assert_eq!(bridge.left_table, "orders");
    assert_eq!(bridge.right_table, "products");
    assert_eq!(
        bridge.members,
        [
            RelationshipKey::new("order_items", "order_id", "orders", "id"),
            RelationshipKey::new("order_items", "product_id", "products", "id"),
        ]
    );

    assert!(report
        .direct_relationships()
        .all(|c| !c.source_table.eq_ignore_ascii_case("order_items")));
    for key in &bridge.members {
        let member = report.find(key).unwrap();
        assert_eq!(member.junction.as_deref(), Some("order_items"));
    }
}

#[test]
fn test_type_mismatch_skips_sampling() {
    let snapshot = SchemaSnapshot::new([
        Table::new("events").column(Column::new("id", "timestamp").primary_key()),
        Table::new("logs")
            .column(Column::new("id", "integer").primary_key())
            .column(Column::new("event_id", "text")),
    ])
    .unwrap();
    let detector = RelationshipDetector::default();

    let requests = detector.sample_requests(&snapshot);
    assert!(requests.iter().all(|r| r.column != "event_id"));

    let samples = SampleSet::new()
        .with("logs", "event_id", vec![json!("a")])
        .with("events", "id", vec![json!("2024-01-01")]);
    let report = detector.detect(&snapshot, &samples);
    let key = RelationshipKey::new("logs", "event_id", "events", "id");
    let rel = report.find(&key).expect("pattern candidate is kept for diagnostics");
    assert!(rel.signals.overlap.is_type_mismatch());
    assert_eq!(rel.signals.overlap.score(), Some(0.0));
    assert!(rel.evidence.iter().any(|e| e.starts_with("type mismatch")));
}

#[test]
fn test_more_overlap_never_lowers_confidence() {
    let detector = RelationshipDetector::default();
    let snapshot = shop();
    let key = RelationshipKey::new("products", "category_id", "categories", "id");

    let mut previous = 0.0;
    for found in 0..=5 {
        let source: Vec<i64> = (1..=5).collect();
        let target: Vec<i64> = (1..=found).collect();
        let samples = SampleSet::new()
            .with("products", "category_id", ints(source))
            .with("categories", "id", ints(if target.is_empty() { vec![99] } else { target }));
        let report = detector.detect(&snapshot, &samples);
        let confidence = report.find(&key).map(|c| c.confidence).unwrap();
        assert!(
            confidence >= previous,
            "confidence fell from {previous} to {confidence} at {found} matches"
        );
        previous = confidence;
    }
}

#[test]
fn test_output_independent_of_table_order() {
    let tables: Vec<Table> = shop().tables().cloned().collect();
    let mut reversed = tables.clone();
    reversed.reverse();
    let forward = SchemaSnapshot::new(tables).unwrap();
    let backward = SchemaSnapshot::new(reversed).unwrap();

    let detector = RelationshipDetector::default();
    assert_eq!(detector.propose(&forward), detector.propose(&backward));
    assert_eq!(
        detector.detect(&forward, &shop_samples()),
        detector.detect(&backward, &shop_samples())
    );
}

#[test]
fn test_accepted_pairs_are_unique() {
    let report = RelationshipDetector::new(DetectionConfig::high_recall())
        .detect(&shop(), &shop_samples());
    let mut pairs = std::collections::HashSet::new();
    for rel in &report.accepted {
        assert!(pairs.insert(rel.key().pair_key()), "duplicate pair for {rel}");
    }
}

#[test]
fn test_embedder_failure_degrades_to_note() {
    let detector = RelationshipDetector::default().with_embedder(Arc::new(FailingEmbedder));
    let report = detector.detect(&shop(), &shop_samples());

    assert!(report
        .notes
        .iter()
        .any(|n| n.contains("semantic signal unavailable") && n.contains("model not loaded")));
    assert!(report.candidates().all(|c| c.signals.semantic.is_none()));
    assert!(report
        .find(&RelationshipKey::new("orders", "customer_id", "customers", "id"))
        .is_some_and(|c| c.status == Status::Accepted));
}

#[test]
fn test_custom_regex_rule_from_config() {
    let snapshot = SchemaSnapshot::new([
        Table::new("customers").column(Column::new("id", "integer").primary_key()),
        Table::new("invoices")
            .column(Column::new("id", "integer").primary_key())
            .column(Column::new("ref_customer", "integer")),
    ])
    .unwrap();

    let key = RelationshipKey::new("invoices", "ref_customer", "customers", "id");

    let settings = Settings::from_toml(
        r#"
[[patterns]]
name = "ref_regex"
kind = "regex"
pattern = "^ref_(?P<table>[a-z]+)$"
weight = 0.85
"#,
    )
    .unwrap();
    let detector = RelationshipDetector::new(settings.to_detection_config().unwrap());
    assert!(detector.propose(&snapshot).contains(&key));

    let report = detector.detect(&snapshot, &SampleSet::new());
    let rel = report.find(&key).unwrap();
    assert_eq!(rel.rule.as_deref(), Some("ref_regex"));
}

#[test]
fn test_appended_rule_via_builder() {
    let snapshot = SchemaSnapshot::new([
        Table::new("customers").column(Column::new("id", "integer").primary_key()),
        Table::new("invoices")
            .column(Column::new("id", "integer").primary_key())
            .column(Column::new("customer_no", "integer")),
    ])
    .unwrap();
    let key = RelationshipKey::new("invoices", "customer_no", "customers", "id");
    let config = DetectionConfig::default().with_rule(PatternRule::suffix("suffix_no", "_no", 0.7));
    let keys = RelationshipDetector::new(config).propose(&snapshot);
    assert!(keys.contains(&key));

    let report = RelationshipDetector::new(
        DetectionConfig::default().with_rule(PatternRule::suffix("suffix_no", "_no", 0.7)),
    )
    .detect(&snapshot, &SampleSet::new());
    assert_eq!(report.find(&key).unwrap().rule.as_deref(), Some("suffix_no"));
}

#[tokio::test]
async fn test_analyze_collects_samples() {
    let detector = RelationshipDetector::default();
    let report = detector
        .analyze(&shop(), &shop_samples(), &DeferVerifier)
        .await;
    let key = RelationshipKey::new("products", "category_id", "categories", "id");
    assert!(matches!(
        report.find(&key).unwrap().signals.overlap,
        OverlapOutcome::Measured { .. }
    ));
}

#[tokio::test]
async fn test_defer_verifier_leaves_candidates_unverified() {
    let detector = RelationshipDetector::new(verifying_config());
    let report = detector.analyze(&shop(), &NoSampler, &DeferVerifier).await;

    assert!(report.uncertain.is_empty());
    assert!(!report.unverified.is_empty());
    assert!(report
        .notes
        .iter()
        .any(|n| n.contains("defer verifier returned no verdict")));
}

#[tokio::test]
async fn test_verifier_timeout_marks_unverified() {
    let detector = RelationshipDetector::new(
        verifying_config().with_verifier_timeout(Duration::from_millis(10)),
    );
    let verifier = SlowVerifier {
        delay: Duration::from_secs(5),
    };
    let report = detector.analyze(&shop(), &NoSampler, &verifier).await;

    assert!(!report.unverified.is_empty());
    assert!(report.unverified.iter().all(|c| c.verdict.is_none()));
    assert!(report.notes.iter().any(|n| n.contains("timed out")));
    // Declared keys never wait on the verifier
    assert!(report
        .find(&RelationshipKey::new("orders", "customer_id", "customers", "id"))
        .is_some_and(|c| c.status == Status::Accepted));
}

#[tokio::test]
async fn test_budget_caps_verifier_calls() {
    let detector = RelationshipDetector::new(
        verifying_config()
            .with_verification_budget(1)
            .with_verification_batch_size(1),
    );
    let verifier = CountingVerifier::default();
    let report = detector.analyze(&shop(), &NoSampler, &verifier).await;

    assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    assert_eq!(verifier.requests.load(Ordering::SeqCst), 1);
    assert!(report
        .rejected
        .iter()
        .any(|c| c.verdict.as_ref().is_some_and(|v| !v.accepted)));
    assert!(!report.unverified.is_empty());
    assert!(report
        .notes
        .iter()
        .any(|n| n.contains("exceeded the verification budget of 1")));
}

#[tokio::test]
async fn test_rule_based_verifier_decides_uncertain_band() {
    let detector = RelationshipDetector::new(verifying_config());
    let report = detector
        .analyze(&shop(), &shop_samples(), &RuleBasedVerifier::default())
        .await;

    assert!(report.uncertain.is_empty());
    assert!(report.unverified.is_empty());
    let key = RelationshipKey::new("products", "category_id", "categories", "id");
    let rel = report.find(&key).unwrap();
    assert!(rel.verdict.is_some());
    assert!(rel.evidence.iter().any(|e| e.starts_with("verifier:")));
}

fn users_profiles() -> SchemaSnapshot {
    SchemaSnapshot::new([
        Table::new("users").column(Column::new("id", "integer").primary_key()),
        Table::new("profiles")
            .column(Column::new("user_id", "integer").primary_key())
            .column(Column::new("bio", "text")),
    ])
    .unwrap()
}

#[test]
fn test_shared_primary_key_is_one_to_one() {
    let samples = SampleSet::new()
        .with("users", "id", ints(1..=10))
        .with("profiles", "user_id", ints(1..=10));
    let detector = RelationshipDetector::default();
    let key = RelationshipKey::new("profiles", "user_id", "users", "id");
    assert!(detector.propose(&users_profiles()).contains(&key));

    let report = detector.detect(&users_profiles(), &samples);
    let rel = report.find(&key).expect("shared key detected");
    assert_ne!(rel.status, Status::Rejected);
    assert_eq!(rel.cardinality, Cardinality::OneToOne);
    assert_eq!(rel.provenance, Provenance::Detected);
    assert_eq!(rel.rule.as_deref(), Some("suffix_id"));
    assert!(rel.evidence.contains(&"source column is unique".to_string()));
}

#[tokio::test]
async fn test_rule_based_verifier_keeps_one_to_one() {
    let snapshot = SchemaSnapshot::new([
        Table::new("users")
            .column(Column::new("id", "integer").primary_key())
            .with_row_count(10),
        Table::new("passports")
            .column(Column::new("id", "integer").primary_key())
            .column(Column::new("user_id", "integer").with_stats(10, 0))
            .with_row_count(10),
    ])
    .unwrap();
    let samples = SampleSet::new()
        .with("users", "id", ints(1..=10))
        .with("passports", "user_id", ints(1..=10));
    let key = RelationshipKey::new("passports", "user_id", "users", "id");
    let detector = RelationshipDetector::new(verifying_config());

    let before = detector.detect(&snapshot, &samples);
    let rel = before.find(&key).unwrap();
    assert_eq!(rel.status, Status::Uncertain);
    assert_eq!(rel.cardinality, Cardinality::OneToOne);

    let verifier = RuleBasedVerifier {
        min_confidence: 0.5,
    };
    let after = detector.analyze(&snapshot, &samples, &verifier).await;
    let rel = after.find(&key).unwrap();
    assert_eq!(rel.status, Status::Accepted);
    assert_eq!(rel.cardinality, Cardinality::OneToOne);
}

#[test]
fn test_column_free_tables_add_no_embedding_note() {
    let snapshot = SchemaSnapshot::new([Table::new("staging"), Table::new("scratch")]).unwrap();
    let report = RelationshipDetector::default().detect(&snapshot, &SampleSet::new());
    assert!(report.notes.is_empty());
    assert_eq!(report.candidates().count(), 0);
}
