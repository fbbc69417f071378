use insta::assert_snapshot;
use relscout::semantic::inference::{
    render_report, CandidateRelationship, Cardinality, DetectionReport, ManyToManyRelationship,
    Provenance, RelationshipKey, SignalScores, Status, VerificationVerdict,
};

fn candidate(
    from: (&str, &str),
    to: (&str, &str),
    confidence: f64,
    status: Status,
) -> CandidateRelationship {
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
        status,
        verdict: None,
        junction: None,
    }
}

fn shop_report() -> DetectionReport {
    let declared = CandidateRelationship {
        provenance: Provenance::Declared,
        rule: Some("declared_fk".to_string()),
        evidence: vec!["declared foreign key".to_string()],
        ..candidate(("orders", "customer_id"), ("customers", "id"), 1.0, Status::Accepted)
    };
    let member = |column: &str, table: &str, confidence| CandidateRelationship {
        junction: Some("order_items".to_string()),
        ..candidate(("order_items", column), (table, "id"), confidence, Status::Accepted)
    };
    let tie = |table: &str, confidence| CandidateRelationship {
        ambiguous: true,
        ..candidate(("orders", "store_id"), (table, "id"), confidence, Status::Uncertain)
    };

    DetectionReport {
        accepted: vec![
            declared,
            member("order_id", "orders", 0.9),
            member("product_id", "products", 0.84),
        ],
        uncertain: vec![tie("stores", 0.72), tie("shops", 0.70)],
        unverified: vec![candidate(
            ("payments", "ref"),
            ("invoices", "id"),
            0.55,
            Status::Unverified,
        )],
        rejected: vec![candidate(
            ("orders", "note"),
            ("notes", "id"),
            0.3,
            Status::Rejected,
        )],
        many_to_many: vec![ManyToManyRelationship {
            left_table: "orders".to_string(),
            right_table: "products".to_string(),
            junction_table: "order_items".to_string(),
            members: [
                RelationshipKey::new("order_items", "order_id", "orders", "id"),
                RelationshipKey::new("order_items", "product_id", "products", "id"),
            ],
            confidence: 0.84,
        }],
        notes: vec!["semantic signal unavailable: embedding failed".to_string()],
    }
}

#[test]
fn test_render_report() {
    assert_snapshot!(render_report(&shop_report()), @r"
    ============================================================
    DETECTED RELATIONSHIPS
    ============================================================

    HIGH CONFIDENCE (>= 80%)
    ----------------------------------------
    orders.customer_id → customers.id  100.0%  N:1  declared
        - declared foreign key

    MEDIUM CONFIDENCE (60-79%)
    ----------------------------------------
    orders.store_id → stores.id  72.0%  N:1  detected  (ambiguous)
    orders.store_id → shops.id  70.0%  N:1  detected  (ambiguous)

    LOW CONFIDENCE (< 60%)
    ----------------------------------------
    1 low-confidence relationship(s) found

    MANY-TO-MANY
    ----------------------------------------
    orders ⟷ products (via order_items)  84.0%

    NOTES
      * semantic signal unavailable: embedding failed

    Total relationships: 5
    ");
}

fn verified_report() -> DetectionReport {
    let confirmed = CandidateRelationship {
        cardinality: Cardinality::OneToOne,
        verdict: Some(VerificationVerdict {
            key: RelationshipKey::new("orders", "customer_id", "customers", "id"),
            accepted: true,
            explanation: Some("ids line up".to_string()),
            cardinality: Some(Cardinality::OneToOne),
            confidence: Some(0.9),
        }),
        ..candidate(("orders", "customer_id"), ("customers", "id"), 0.85, Status::Accepted)
    };
    let refused = CandidateRelationship {
        verdict: Some(VerificationVerdict {
            key: RelationshipKey::new("orders", "note", "notes", "id"),
            accepted: false,
            explanation: Some("free text".to_string()),
            cardinality: None,
            confidence: None,
        }),
        ..candidate(("orders", "note"), ("notes", "id"), 0.72, Status::Rejected)
    };

    DetectionReport {
        accepted: vec![confirmed],
        rejected: vec![refused],
        ..DetectionReport::default()
    }
}

#[test]
fn test_render_verification_section() {
    assert_snapshot!(render_report(&verified_report()), @r"
    ============================================================
    DETECTED RELATIONSHIPS
    ============================================================

    HIGH CONFIDENCE (>= 80%)
    ----------------------------------------
    orders.customer_id → customers.id  85.0%  1:1  detected

    VERIFICATION
    ----------------------------------------
    1 valid, 1 invalid
    orders.customer_id → customers.id  valid
        cardinality: 1:1
        verifier confidence: 90.0%
        ids line up
    orders.note → notes.id  invalid
        cardinality: N:1
        free text

    Total relationships: 1
    ");
}

#[test]
fn test_unverified_report_has_no_verification_section() {
    assert!(!render_report(&shop_report()).contains("VERIFICATION"));
}

#[test]
fn test_render_empty_report() {
    let rendered = render_report(&DetectionReport::default());
    assert!(rendered.contains("DETECTED RELATIONSHIPS"));
    assert!(!rendered.contains("HIGH CONFIDENCE"));
    assert!(!rendered.contains("NOTES"));
    assert!(rendered.ends_with("Total relationships: 0"));
}

#[test]
fn test_junction_members_not_rendered_individually() {
    let rendered = render_report(&shop_report());
    assert!(!rendered.contains("order_items.order_id"));
    assert!(!rendered.contains("order_items.product_id"));
    // Rejected candidates are not shown either
    assert!(!rendered.contains("orders.note"));
}

#[test]
fn test_direct_relationships_skip_junction_members() {
    let report = shop_report();
    let direct: Vec<String> = report.direct_relationships().map(ToString::to_string).collect();
    assert_eq!(direct, vec!["orders.customer_id → customers.id"]);
    assert_eq!(report.candidates().count(), 7);
}

#[test]
fn test_find_searches_every_list() {
    let report = shop_report();

    let rejected = report
        .find(&RelationshipKey::new("orders", "note", "notes", "id"))
        .unwrap();
    assert_eq!(rejected.status, Status::Rejected);

    let unverified = report
        .find(&RelationshipKey::new("Payments", "REF", "invoices", "id"))
        .unwrap();
    assert_eq!(unverified.status, Status::Unverified);

    assert!(report
        .find(&RelationshipKey::new("orders", "store_id", "regions", "id"))
        .is_none());
}

#[test]
fn test_report_json() {
    let json = shop_report().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["accepted"].as_array().unwrap().len(), 3);
    assert_eq!(value["accepted"][0]["provenance"], "declared");
    assert_eq!(value["accepted"][0]["cardinality"], "many_to_one");
    assert_eq!(value["accepted"][1]["junction"], "order_items");
    assert_eq!(value["uncertain"][0]["ambiguous"], true);
    assert_eq!(value["many_to_many"][0]["junction_table"], "order_items");
    assert_eq!(value["many_to_many"][0]["members"][1]["to_table"], "products");
    assert_eq!(value["notes"][0], "semantic signal unavailable: embedding failed");

    // Optional fields are omitted when unset
    assert!(value["rejected"][0].get("verdict").is_none());
    assert!(value["rejected"][0].get("rule").is_none());
}
