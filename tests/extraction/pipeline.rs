use std::{fs, sync::atomic::Ordering};

use serde_json::json;

use certex::extraction::{ExtractionPipeline, error::ExtractionErrorKind};

use crate::support::{
    FakeExpert, FakeSupervisor, approx, canonical, expert, report, supervisor, task, work_dir,
};

#[tokio::test]
async fn extraction_runs_all_stages_and_remaps_results() {
    let root = work_dir("pipeline");
    let consolidated = report(vec![
        vec!["Density", "dens @25C", "Colour"],
        vec!["dens @25C", "pH value"],
    ]);
    let consolidator =
        FakeSupervisor::answering(serde_json::to_value(&consolidated).expect("serializes"));
    let mapper = FakeSupervisor::answering(json!({
        "entries": [
            {"raw_description": "dens @25C", "mapped_to_canonical_id": "A"},
            {"raw_description": "pH value", "mapped_to_canonical_id": "B"},
            {"raw_description": "Colour", "mapped_to_canonical_id": "?"}
        ]
    }));
    let consolidator_prompt = consolidator.last_prompt();

    let pipeline = ExtractionPipeline::new(
        vec![
            expert("gpt-4o", FakeExpert::answering("expert A says density 1.26")),
            expert("claude-3-5-sonnet-20240620", FakeExpert::answering("expert B says 1.27")),
        ],
        supervisor("gpt-4o", consolidator),
        supervisor("gpt-4o-mini", mapper),
        &root,
    );

    let task = task(
        "full",
        vec![canonical("A", "Density"), canonical("B", "pH")],
        false,
    );
    let result = pipeline.extract(&task, &[]).await.expect("extraction succeeds");

    assert_eq!(result.request_id, "full");
    assert!(result.errors.is_none());
    let first = &result.consolidated_report.batches[0].results;
    assert_eq!(first[0].id.as_deref(), Some("A"));
    assert_eq!(first[1].id, None);
    assert_eq!(first[2].id, None);
    let second = &result.consolidated_report.batches[1].results;
    assert_eq!(second[0].id.as_deref(), Some("A"));
    assert_eq!(second[1].id.as_deref(), Some("B"));

    let sent = consolidator_prompt
        .lock()
        .expect("prompt lock")
        .clone()
        .expect("consolidator prompted");
    let a = sent.user.find("expert A says").expect("first expert present");
    let b = sent.user.find("expert B says").expect("second expert present");
    assert!(a < b);

    // gpt-4o expert + sonnet expert + gpt-4o consolidator + gpt-4o-mini mapper
    let expected = (0.0025 + 0.01) + (0.003 + 0.015) + (0.0025 + 0.01) + (0.00015 + 0.0006);
    assert!(approx(task.cost(), expected), "cost was {}", task.cost());

    let _ = fs::remove_dir_all(&root);
}

#[tokio::test]
async fn rerun_is_served_from_cache() {
    let root = work_dir("pipeline");
    let port = FakeExpert::answering("text");
    let expert_calls = port.calls();
    let consolidator = FakeSupervisor::answering(
        serde_json::to_value(report(vec![vec!["Density"]])).expect("serializes"),
    );
    let consolidator_calls = consolidator.calls();
    let mapper = FakeSupervisor::answering(json!({"entries": []}));
    let mapper_calls = mapper.calls();

    let pipeline = ExtractionPipeline::new(
        vec![expert("gpt-4o", port)],
        supervisor("gpt-4o", consolidator),
        supervisor("gpt-4o", mapper),
        &root,
    );

    let measurements = vec![canonical("A", "Density")];
    let first = task("rerun", measurements.clone(), false);
    let initial = pipeline.extract(&first, &[]).await.expect("first run succeeds");

    let second = task("rerun", measurements, false);
    let rerun = pipeline.extract(&second, &[]).await.expect("rerun succeeds");

    assert_eq!(rerun.consolidated_report, initial.consolidated_report);
    assert_eq!(rerun.consolidated_report.batches[0].results[0].id.as_deref(), Some("A"));
    assert_eq!(expert_calls.load(Ordering::SeqCst), 1);
    assert_eq!(consolidator_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mapper_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.cost(), 0.0);

    let _ = fs::remove_dir_all(&root);
}

#[tokio::test]
async fn live_extraction_without_experts_is_rejected() {
    let root = work_dir("pipeline");
    let pipeline = ExtractionPipeline::new(
        vec![],
        supervisor("gpt-4o", FakeSupervisor::answering(json!({}))),
        supervisor("gpt-4o", FakeSupervisor::answering(json!({}))),
        &root,
    );

    let task = task("empty", vec![], false);
    let err = pipeline.extract(&task, &[]).await.expect_err("no experts must fail");
    assert_eq!(err.kind, ExtractionErrorKind::InvalidRequest);
    assert!(!root.exists());
}

#[tokio::test]
async fn mapping_failure_keeps_cost_already_spent() {
    let root = work_dir("pipeline");
    let pipeline = ExtractionPipeline::new(
        vec![expert("gpt-4o", FakeExpert::answering("text"))],
        supervisor(
            "gpt-4o",
            FakeSupervisor::answering(
                serde_json::to_value(report(vec![vec!["Density"]])).expect("serializes"),
            ),
        ),
        supervisor("gpt-4o", FakeSupervisor::unparseable("no table")),
        &root,
    );

    let task = task("partial", vec![canonical("A", "Density")], false);
    let err = pipeline.extract(&task, &[]).await.expect_err("mapping parse failure is fatal");
    assert_eq!(err.kind, ExtractionErrorKind::StructuredParse);
    assert!(approx(task.cost(), 2.0 * (0.0025 + 0.01)));

    let _ = fs::remove_dir_all(&root);
}

#[tokio::test]
async fn ids_in_the_consolidator_reply_are_ignored() {
    let root = work_dir("pipeline");
    let consolidator = FakeSupervisor::answering(json!({
        "order_number": "PO-1001",
        "product_name": null,
        "flag_identification_warning": false,
        "batches": [{
            "batch_number": "B-0",
            "expiration_date": null,
            "results": [
                {"id": "Z", "description": "viscosity", "value": 1.0, "accept": true, "flag_disagreement": false},
                {"id": "A", "description": "colour", "value": true, "accept": true, "flag_disagreement": false},
                {"description": "Density", "value": 1.26, "accept": true, "flag_disagreement": false}
            ]
        }]
    }));
    let pipeline = ExtractionPipeline::new(
        vec![expert("gpt-4o", FakeExpert::answering("text"))],
        supervisor("gpt-4o", consolidator),
        supervisor("gpt-4o", FakeSupervisor::answering(json!({"entries": []}))),
        &root,
    );

    let task = task("planted", vec![canonical("A", "Density")], false);
    let result = pipeline.extract(&task, &[]).await.expect("extraction succeeds");
    let ids = result.consolidated_report.batches[0]
        .results
        .iter()
        .map(|r| r.id.as_deref())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![None, None, Some("A")]);

    let rerun = pipeline.extract(&task, &[]).await.expect("cached rerun succeeds");
    assert_eq!(rerun.consolidated_report, result.consolidated_report);

    let _ = fs::remove_dir_all(&root);
}
