use relscout::semantic::inference::{
    CandidateRelationship, Cardinality, Provenance, RankingConfig, SignalScores, Status,
};

fn candidate(from: (&str, &str), to: (&str, &str), confidence: f64) -> CandidateRelationship {
    CandidateRelationship {
        source_table: from.0.to_string(),
        source_column: from.1.to_string(),
        target_table: to.0.to_string(),
        target_column: to.1.to_string(),
        signals: SignalScores::default(),
        confidence,
        cardinality: Cardinality::ManyToOne,
        provenance: Provenance::Detected,
        rule: None,
        evidence: vec![],
        ambiguous: false,
        status: Status::Uncertain,
        verdict: None,
        junction: None,
    }
}

fn declared(from: (&str, &str), to: (&str, &str)) -> CandidateRelationship {
    CandidateRelationship {
        provenance: Provenance::Declared,
        rule: Some("declared_fk".to_string()),
        ..candidate(from, to, 1.0)
    }
}

fn names(ranked: &[CandidateRelationship]) -> Vec<String> {
    ranked.iter().map(ToString::to_string).collect()
}

#[test]
fn test_bands() {
    let config = RankingConfig::default();
    assert_eq!(config.band(0.80), Status::Accepted);
    assert_eq!(config.band(0.7999), Status::Uncertain);
    assert_eq!(config.band(0.50), Status::Uncertain);
    assert_eq!(config.band(0.4999), Status::Rejected);
}

#[test]
fn test_best_candidate_per_source_column() {
    let ranked = RankingConfig::default().rank(vec![
        candidate(("orders", "account_id"), ("accounts", "id"), 0.9),
        candidate(("orders", "account_id"), ("account", "id"), 0.7),
    ]);

    assert_eq!(names(&ranked), vec!["orders.account_id → accounts.id"]);
    assert_eq!(ranked[0].status, Status::Accepted);
    assert!(!ranked[0].ambiguous);
}

#[test]
fn test_near_ties_are_ambiguous_and_uncertain() {
    let ranked = RankingConfig::default().rank(vec![
        candidate(("orders", "owner_id"), ("users", "id"), 0.92),
        candidate(("orders", "owner_id"), ("owners", "id"), 0.89),
        candidate(("orders", "owner_id"), ("teams", "id"), 0.70),
    ]);

    assert_eq!(
        names(&ranked),
        vec!["orders.owner_id → users.id", "orders.owner_id → owners.id"]
    );
    for rel in &ranked {
        assert!(rel.ambiguous);
        assert_eq!(rel.status, Status::Uncertain);
    }
}

#[test]
fn test_declared_wins_its_column() {
    let ranked = RankingConfig::default().rank(vec![
        candidate(("orders", "customer_id"), ("clients", "id"), 0.99),
        declared(("orders", "customer_id"), ("customers", "id")),
    ]);

    assert_eq!(names(&ranked), vec!["orders.customer_id → customers.id"]);
    assert_eq!(ranked[0].status, Status::Accepted);
    assert!(!ranked[0].ambiguous);
}

#[test]
fn test_unordered_pair_dedup() {
    let ranked = RankingConfig::default().rank(vec![
        candidate(("users", "profile_id"), ("profiles", "id"), 0.85),
        candidate(("profiles", "id"), ("users", "profile_id"), 0.60),
    ]);

    assert_eq!(names(&ranked), vec!["users.profile_id → profiles.id"]);
}

#[test]
fn test_pair_dedup_prefers_declared_on_ties() {
    let ranked = RankingConfig::default().rank(vec![
        candidate(("a", "b_id"), ("b", "id"), 1.0),
        declared(("b", "id"), ("a", "b_id")),
    ]);

    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].provenance, Provenance::Declared);
}

#[test]
fn test_output_order() {
    let ranked = RankingConfig::default().rank(vec![
        candidate(("payments", "order_id"), ("orders", "id"), 0.7),
        candidate(("invoices", "order_id"), ("orders", "id"), 0.7),
        candidate(("shipments", "order_id"), ("orders", "id"), 0.95),
        candidate(("returns", "order_id"), ("orders", "id"), 0.3),
    ]);

    assert_eq!(
        names(&ranked),
        vec![
            "shipments.order_id → orders.id",
            "invoices.order_id → orders.id",
            "payments.order_id → orders.id",
            "returns.order_id → orders.id",
        ]
    );
    let statuses: Vec<Status> = ranked.iter().map(|c| c.status).collect();
    assert_eq!(
        statuses,
        vec![
            Status::Accepted,
            Status::Uncertain,
            Status::Uncertain,
            Status::Rejected
        ]
    );
}

#[test]
fn test_custom_thresholds() {
    let config = RankingConfig {
        accept_threshold: 0.9,
        acceptance_floor: 0.4,
        ambiguity_tolerance: 0.0,
    };
    let ranked = config.rank(vec![
        candidate(("a", "x_id"), ("x", "id"), 0.85),
        candidate(("a", "x_id"), ("xs", "id"), 0.84),
    ]);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].status, Status::Uncertain);
}
