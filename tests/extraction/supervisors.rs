use std::{fs, sync::atomic::Ordering};

use certex::{
    cache::{CONSOLIDATION_NAMESPACE, ContentAddressedCache, namespace_dir},
    extraction::{
        consolidation::ConsolidationSupervisor,
        error::ExtractionErrorKind,
        mapping::MappingSupervisor,
        prompts::consolidation_cache_context,
        supervisor::SUPERVISOR_CACHE_KEY,
        types::{ConsolidatedReport, MeasurementMappingEntry},
    },
};
use serde_json::json;

use crate::support::{FakeSupervisor, approx, canonical, report, supervisor, task, work_dir};

#[tokio::test]
async fn consolidation_returns_report_and_adds_cost_once() {
    let root = work_dir("supervisor");
    let expected = report(vec![vec!["Density", "pH"], vec!["Density"]]);
    let port = FakeSupervisor::answering(serde_json::to_value(&expected).expect("serializes"));
    let calls = port.calls();
    let prompt = port.last_prompt();
    let consolidator = ConsolidationSupervisor::new(supervisor("gpt-4o", port), &root);

    let first = task("consolidate", vec![], false);
    let outputs = vec!["expert zero".to_string(), "expert one".to_string()];
    let report = consolidator
        .consolidate(&first, &outputs)
        .await
        .expect("consolidation succeeds");
    assert_eq!(report, expected);
    assert!(approx(first.cost(), 0.0025 + 0.01));

    let sent = prompt.lock().expect("prompt lock").clone().expect("prompt recorded");
    assert!(sent.user.contains("# Expert 0\n\nexpert zero"));
    assert!(sent.user.contains("# Expert 1\n\nexpert one"));

    let second = task("consolidate", vec![], false);
    let cached = consolidator
        .consolidate(&second, &outputs)
        .await
        .expect("cached consolidation succeeds");
    assert_eq!(cached, expected);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.cost(), 0.0);

    let _ = fs::remove_dir_all(&root);
}

#[tokio::test]
async fn parse_error_is_fatal_and_nothing_is_cached() {
    let root = work_dir("supervisor");
    let port = FakeSupervisor::unparseable("I could not find any batches");
    let calls = port.calls();
    let consolidator = ConsolidationSupervisor::new(supervisor("gpt-4o", port), &root);

    let task = task("parse", vec![], false);
    for attempt in 1..=2 {
        let err = consolidator
            .consolidate(&task, &["text".to_string()])
            .await
            .expect_err("parse error must surface");
        assert_eq!(err.kind, ExtractionErrorKind::StructuredParse);
        assert_eq!(err.model.as_deref(), Some("gpt-4o"));
        assert_eq!(calls.load(Ordering::SeqCst), attempt);
    }
    assert_eq!(task.cost(), 0.0);

    let _ = fs::remove_dir_all(&root);
}

#[tokio::test]
async fn output_not_matching_schema_is_a_parse_error() {
    let root = work_dir("supervisor");
    let port = FakeSupervisor::answering(json!({"batches": "none"}));
    let consolidator = ConsolidationSupervisor::new(supervisor("gpt-4o", port), &root);

    let task = task("schema", vec![], false);
    let err = consolidator
        .consolidate(&task, &["text".to_string()])
        .await
        .expect_err("schema mismatch must surface");
    assert_eq!(err.kind, ExtractionErrorKind::StructuredParse);

    let _ = fs::remove_dir_all(&root);
}

#[tokio::test]
async fn corrupt_cache_entry_fails_instead_of_calling_again() {
    let root = work_dir("supervisor");
    let cache = ContentAddressedCache::open(
        namespace_dir(&root, "corrupt", CONSOLIDATION_NAMESPACE),
        &consolidation_cache_context().expect("context builds"),
    )
    .expect("cache opens");
    cache.put(SUPERVISOR_CACHE_KEY, "{truncated").expect("put works");

    let port = FakeSupervisor::answering(json!({}));
    let calls = port.calls();
    let consolidator = ConsolidationSupervisor::new(supervisor("gpt-4o", port), &root);

    let task = task("corrupt", vec![], false);
    let err = consolidator
        .consolidate(&task, &["text".to_string()])
        .await
        .expect_err("corrupt entry must fail");
    assert_eq!(err.kind, ExtractionErrorKind::CacheStorage);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let _ = fs::remove_dir_all(&root);
}

#[tokio::test]
async fn mapping_table_is_post_processed_before_caching() {
    let root = work_dir("supervisor");
    let port = FakeSupervisor::answering(json!({
        "entries": [
            {"raw_description": "dens @25C", "mapped_to_canonical_id": "A"},
            {"raw_description": "Colour", "mapped_to_canonical_id": "?"},
            {"raw_description": "Viscosity", "mapped_to_canonical_id": "Z"}
        ]
    }));
    let calls = port.calls();
    let prompt = port.last_prompt();
    let mapper = MappingSupervisor::new(supervisor("gpt-4o", port), &root);

    let measurements = vec![canonical("A", "Density"), canonical("B", "pH")];
    let consolidated: ConsolidatedReport =
        report(vec![vec!["dens @25C", "Colour"], vec!["Viscosity", "dens @25C"]]);
    let expected = vec![
        MeasurementMappingEntry::new("dens @25C", "A"),
        MeasurementMappingEntry::new("Density", "A"),
        MeasurementMappingEntry::new("pH", "B"),
    ];

    let first = task("mapping", measurements.clone(), false);
    let table = mapper.map(&first, &consolidated).await.expect("mapping succeeds");
    assert_eq!(table.entries, expected);

    let sent = prompt.lock().expect("prompt lock").clone().expect("prompt recorded");
    assert!(sent.user.contains("Colour\nViscosity\ndens @25C"));
    assert!(sent.user.contains("A: Density\nB: pH"));
    assert_eq!(sent.user.matches("dens @25C").count(), 1);

    let second = task("mapping", measurements, false);
    let cached = mapper.map(&second, &consolidated).await.expect("cached mapping succeeds");
    assert_eq!(cached.entries, expected);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.cost(), 0.0);

    let _ = fs::remove_dir_all(&root);
}
