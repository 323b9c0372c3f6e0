//! Scenario tests for the execution driver.
//!
//! Every test drives `MockOperation`, so no HTTP client is involved. Timing
//! tests run on a paused clock and compare the instants at which the mock saw
//! each call.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::{run_items, BatchConfig, EngineError, ItemExecutor, OperationRegistry};
use nodes::mock::{MockBehaviour, MockOperation};
use nodes::{
    ExecutionContext, ItemParameters, OperationDescriptor, OperationError, OutputGroups, OutputRecord,
    ResourceDescriptor,
};

/// Context with `n` input items and the given node-level parameters.
fn context(n: usize, params: Value) -> ExecutionContext {
    let items = (0..n).map(|i| json!({ "index": i })).collect();
    let params = ItemParameters::from_value(params).unwrap();
    ExecutionContext::new(items, Arc::new(params))
}

fn batching(batch_size: u64, batch_interval: u64) -> Value {
    json!({ "batching": { "batch": { "batchSize": batch_size, "batchInterval": batch_interval } } })
}

fn executor_for(op: Arc<MockOperation>) -> ItemExecutor {
    let registry = OperationRegistry::new(vec![ResourceDescriptor::new("space", "Space", 10)
        .operation(OperationDescriptor::new("list", "List spaces", op))])
    .unwrap();
    ItemExecutor::new(Arc::new(registry))
}

async fn run(
    ctx: ExecutionContext,
    op: &Arc<MockOperation>,
    batch: BatchConfig,
) -> Result<OutputGroups, EngineError> {
    run_items(Arc::new(ctx), "space", "list", op.clone(), batch).await
}

fn port0(groups: &OutputGroups) -> &[OutputRecord] {
    assert_eq!(groups.len(), 1, "expected exactly one output port");
    &groups[0]
}

fn indices(records: &[OutputRecord]) -> Vec<usize> {
    records.iter().filter_map(OutputRecord::item_index).collect()
}

fn is_error(record: &OutputRecord) -> bool {
    record.json.get("error").is_some()
}

/// Start offsets (ms) of each item's call, relative to the first call.
fn start_offsets(op: &MockOperation) -> Vec<(usize, u128)> {
    let mut starts = op.start_times();
    starts.sort_by_key(|(item, _)| *item);
    let base = starts.iter().map(|(_, t)| *t).min().unwrap();
    starts
        .into_iter()
        .map(|(item, t)| (item, (t - base).as_millis()))
        .collect()
}

fn two_groups() -> OutputGroups {
    vec![
        vec![OutputRecord::for_item(json!({ "branch": "true" }), 1)],
        vec![OutputRecord::for_item(json!({ "branch": "false" }), 1)],
    ]
}

// ============================================================
// Serial strategy
// ============================================================

#[tokio::test]
async fn serial_all_items_succeed_in_order() {
    let op = Arc::new(MockOperation::returning("list", json!({ "ok": true })));
    let groups = run(context(3, json!({})), &op, BatchConfig::default()).await.unwrap();

    let records = port0(&groups);
    assert_eq!(records.len(), 3);
    assert_eq!(indices(records), vec![0, 1, 2]);
    assert_eq!(records[2].json, json!({ "operation": "list", "item": 2, "ok": true }));
    assert_eq!(op.called_items(), vec![0, 1, 2]);
}

#[tokio::test]
async fn serial_continue_on_fail_keeps_error_in_place() {
    let op = Arc::new(
        MockOperation::returning("list", json!({}))
            .on_item(1, MockBehaviour::Fail("space not found".into())),
    );
    let ctx = context(3, json!({})).with_continue_on_fail(true);
    let groups = run(ctx, &op, BatchConfig::default()).await.unwrap();

    let records = port0(&groups);
    assert_eq!(records.len(), 3);
    assert!(!is_error(&records[0]));
    assert!(is_error(&records[1]));
    assert!(!is_error(&records[2]));
    assert_eq!(records[1].json["error"], json!("space not found"));
    assert_eq!(indices(records), vec![0, 1, 2]);
}

#[tokio::test]
async fn serial_failure_aborts_before_later_items() {
    let op = Arc::new(
        MockOperation::returning("list", json!({}))
            .on_item(1, MockBehaviour::Fail("boom".into())),
    );
    let err = run(context(3, json!({})), &op, BatchConfig::default())
        .await
        .unwrap_err();

    match err {
        EngineError::ItemFailed { item_index, emitted, source } => {
            assert_eq!(item_index, 1);
            assert_eq!(indices(&emitted), vec![0]);
            assert_eq!(source.to_string(), "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(op.called_items(), vec![0, 1]);
}

#[tokio::test]
async fn serial_abort_emits_only_items_before_the_failure() {
    for failing in 0..4 {
        let op = Arc::new(
            MockOperation::returning("list", json!({}))
                .on_item(failing, MockBehaviour::Fail("nope".into())),
        );
        let err = run(context(4, json!({})), &op, BatchConfig::default())
            .await
            .unwrap_err();

        let EngineError::ItemFailed { emitted, .. } = err else {
            panic!("expected ItemFailed");
        };
        assert_eq!(emitted.len(), failing);
        assert_eq!(op.call_count(), failing + 1);
    }
}

#[tokio::test]
async fn serial_no_output_ends_the_run_with_nothing() {
    let op = Arc::new(MockOperation::returning("list", json!({})).on_item(1, MockBehaviour::ReturnNone));
    let groups = run(context(3, json!({})), &op, BatchConfig::default()).await.unwrap();

    assert!(groups.is_empty());
    assert_eq!(op.called_items(), vec![0, 1]);
}

#[tokio::test]
async fn serial_multiple_output_is_returned_verbatim() {
    let op = Arc::new(
        MockOperation::returning("list", json!({}))
            .on_item(0, MockBehaviour::Fail("ignored".into()))
            .on_item(1, MockBehaviour::ReturnMultiple(two_groups())),
    );
    let ctx = context(3, json!({})).with_continue_on_fail(true);
    let groups = run(ctx, &op, BatchConfig::default()).await.unwrap();

    assert_eq!(groups, two_groups());
    assert_eq!(op.called_items(), vec![0, 1]);
}

#[tokio::test]
async fn array_payload_yields_one_record_per_element() {
    let op = Arc::new(
        MockOperation::returning("list", json!({}))
            .on_item(0, MockBehaviour::ReturnRaw(json!([{ "id": "a" }, { "id": "b" }]))),
    );
    let groups = run(context(2, json!({})), &op, BatchConfig::default()).await.unwrap();

    let records = port0(&groups);
    assert_eq!(indices(records), vec![0, 0, 1]);
    assert_eq!(records[1].json, json!({ "id": "b" }));
}

#[tokio::test]
async fn empty_batch_yields_one_empty_port() {
    let op = Arc::new(MockOperation::returning("list", json!({})));
    let groups = run(context(0, json!({})), &op, BatchConfig::default()).await.unwrap();
    assert_eq!(groups, vec![Vec::new()]);
    assert_eq!(op.call_count(), 0);
}

// ============================================================
// Parallel strategy
// ============================================================

#[tokio::test(start_paused = true)]
async fn parallel_output_follows_input_order_not_completion_order() {
    // Later items finish first.
    let mut op = MockOperation::returning("list", json!({}));
    for item in 0..5 {
        op = op.delay_item(item, Duration::from_millis(10 * (5 - item as u64)));
    }
    let op = Arc::new(op);

    let groups = run(context(5, json!({})), &op, BatchConfig::batched(2, 0)).await.unwrap();

    assert_eq!(indices(port0(&groups)), vec![0, 1, 2, 3, 4]);
    assert_eq!(op.max_in_flight(), 5);
}

#[tokio::test(start_paused = true)]
async fn parallel_continue_on_fail_covers_every_index_in_order() {
    let mut op = MockOperation::returning("list", json!({}))
        .on_item(1, MockBehaviour::Fail("first".into()))
        .on_item(4, MockBehaviour::Fail("second".into()));
    for item in 0..6 {
        op = op.delay_item(item, Duration::from_millis(((item as u64) * 7) % 5 * 10));
    }
    let op = Arc::new(op);
    let ctx = context(6, json!({})).with_continue_on_fail(true);

    let groups = run(ctx, &op, BatchConfig::batched(3, 0)).await.unwrap();

    let records = port0(&groups);
    assert_eq!(indices(records), vec![0, 1, 2, 3, 4, 5]);
    let failed: Vec<usize> = records
        .iter()
        .filter(|r| is_error(r))
        .filter_map(OutputRecord::item_index)
        .collect();
    assert_eq!(failed, vec![1, 4]);
}

#[tokio::test]
async fn parallel_failure_without_continue_surfaces_first_failing_index() {
    let op = Arc::new(
        MockOperation::returning("list", json!({}))
            .on_item(2, MockBehaviour::Fail("late".into()))
            .on_item(3, MockBehaviour::Fail("later".into())),
    );
    let err = run(context(5, json!({})), &op, BatchConfig::batched(2, 0))
        .await
        .unwrap_err();

    let EngineError::ItemFailed { item_index, emitted, .. } = err else {
        panic!("expected ItemFailed");
    };
    assert_eq!(item_index, 2);
    assert_eq!(indices(&emitted), vec![0, 1]);
    // Every item was launched before reconciliation started.
    assert_eq!(op.call_count(), 5);
}

#[tokio::test]
async fn parallel_no_output_skips_only_that_item() {
    let op = Arc::new(MockOperation::returning("list", json!({})).on_item(1, MockBehaviour::ReturnNone));
    let groups = run(context(3, json!({})), &op, BatchConfig::batched(2, 0)).await.unwrap();

    assert_eq!(indices(port0(&groups)), vec![0, 2]);
    assert_eq!(op.call_count(), 3);
}

#[tokio::test]
async fn parallel_multiple_output_wins_over_later_failures() {
    let op = Arc::new(
        MockOperation::returning("list", json!({}))
            .on_item(1, MockBehaviour::ReturnMultiple(two_groups()))
            .on_item(2, MockBehaviour::Fail("unreconciled".into())),
    );
    let groups = run(context(3, json!({})), &op, BatchConfig::batched(50, 0)).await.unwrap();
    assert_eq!(groups, two_groups());
}

#[tokio::test]
async fn serial_panic_is_captured_as_item_failure() {
    let op = Arc::new(
        MockOperation::returning("list", json!({}))
            .on_item(1, MockBehaviour::Panic("handler blew up".into())),
    );
    let ctx = context(3, json!({})).with_continue_on_fail(true);
    let groups = run(ctx, &op, BatchConfig::default()).await.unwrap();

    let records = port0(&groups);
    assert_eq!(indices(records), vec![0, 1, 2]);
    assert!(is_error(&records[1]));
    assert!(!is_error(&records[2]));
    assert_eq!(records[1].json["error"], json!("operation task aborted: handler panicked: handler blew up"));
    assert_eq!(op.called_items(), vec![0, 1, 2]);
}

#[tokio::test]
async fn serial_panic_without_continue_aborts_the_run() {
    let op = Arc::new(
        MockOperation::returning("list", json!({}))
            .on_item(1, MockBehaviour::Panic("handler blew up".into())),
    );
    let err = run(context(3, json!({})), &op, BatchConfig::default()).await.unwrap_err();

    match err {
        EngineError::ItemFailed { item_index, source, emitted } => {
            assert_eq!(item_index, 1);
            assert!(matches!(source, OperationError::Aborted(_)));
            assert_eq!(indices(&emitted), vec![0]);
        }
        other => panic!("expected ItemFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn parallel_panic_is_captured_as_item_failure() {
    let op = Arc::new(
        MockOperation::returning("list", json!({}))
            .on_item(1, MockBehaviour::Panic("handler blew up".into())),
    );
    let ctx = context(3, json!({})).with_continue_on_fail(true);
    let groups = run(ctx, &op, BatchConfig::batched(2, 0)).await.unwrap();

    let records = port0(&groups);
    assert_eq!(indices(records), vec![0, 1, 2]);
    assert!(is_error(&records[1]));
    let message = records[1].json["error"].as_str().unwrap();
    assert!(message.starts_with("operation task aborted"), "got {message}");
}

#[tokio::test(start_paused = true)]
async fn parallel_pauses_between_waves() {
    let op = Arc::new(MockOperation::returning("list", json!({})));
    run(context(5, json!({})), &op, BatchConfig::batched(2, 100)).await.unwrap();

    assert_eq!(
        start_offsets(&op),
        vec![(0, 0), (1, 0), (2, 100), (3, 100), (4, 200)]
    );
}

#[tokio::test(start_paused = true)]
async fn zero_batch_size_behaves_like_one() {
    let zero = Arc::new(MockOperation::returning("list", json!({})));
    let ctx = context(3, json!({ "options": batching(0, 50) }));
    let cfg = BatchConfig::resolve(&ctx);
    let zero_out = run(ctx, &zero, cfg).await.unwrap();

    let one = Arc::new(MockOperation::returning("list", json!({})));
    let ctx = context(3, json!({ "options": batching(1, 50) }));
    let cfg = BatchConfig::resolve(&ctx);
    let one_out = run(ctx, &one, cfg).await.unwrap();

    assert_eq!(zero_out, one_out);
    assert_eq!(start_offsets(&zero), start_offsets(&one));
    assert_eq!(start_offsets(&zero), vec![(0, 0), (1, 50), (2, 100)]);
}

// ============================================================
// Dispatch through ItemExecutor
// ============================================================

#[tokio::test]
async fn unresolved_operation_fails_before_any_item() {
    let op = Arc::new(MockOperation::returning("list", json!({})));
    let executor = executor_for(op.clone());
    let ctx = context(2, json!({ "resource": "space", "operation": "delete" }));

    let err = executor.execute(Arc::new(ctx)).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::UnimplementedOperation { ref resource, ref operation }
            if resource == "space" && operation == "delete"
    ));
    assert_eq!(op.call_count(), 0);
}

#[tokio::test]
async fn missing_selector_is_reported() {
    let op = Arc::new(MockOperation::returning("list", json!({})));
    let executor = executor_for(op.clone());
    let ctx = context(1, json!({ "operation": "list" }));

    let err = executor.execute(Arc::new(ctx)).await.unwrap_err();
    assert!(matches!(err, EngineError::MissingSelector("resource")));
    assert_eq!(op.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn batching_is_read_from_first_item_only() {
    // Item 1 asks for batching, item 0 does not: the run stays serial.
    let mut item1 = Map::new();
    item1.insert("options".into(), batching(10, 0));
    let params = ItemParameters::from_value(json!({ "resource": "space", "operation": "list" }))
        .unwrap()
        .with_item_overrides(vec![Map::new(), item1]);
    let items = vec![json!({}), json!({}), json!({})];

    let mut op = MockOperation::returning("list", json!({}));
    for item in 0..3 {
        op = op.delay_item(item, Duration::from_millis(20));
    }
    let op = Arc::new(op);
    let executor = executor_for(op.clone());

    let ctx = ExecutionContext::new(items, Arc::new(params));
    let groups = executor.execute(Arc::new(ctx)).await.unwrap();

    assert_eq!(indices(port0(&groups)), vec![0, 1, 2]);
    assert_eq!(op.max_in_flight(), 1);
    assert_eq!(start_offsets(&op), vec![(0, 0), (1, 20), (2, 40)]);
}

#[tokio::test(start_paused = true)]
async fn batching_on_first_item_runs_concurrently() {
    let mut op = MockOperation::returning("list", json!({}));
    for item in 0..3 {
        op = op.delay_item(item, Duration::from_millis(20));
    }
    let op = Arc::new(op);
    let executor = executor_for(op.clone());
    let ctx = context(
        3,
        json!({ "resource": "space", "operation": "list", "options": batching(10, 0) }),
    );

    executor.execute(Arc::new(ctx)).await.unwrap();
    assert_eq!(op.max_in_flight(), 3);
}

#[tokio::test]
async fn rerunning_the_same_items_gives_identical_output() {
    let op = Arc::new(
        MockOperation::returning("list", json!({ "name": "demo" }))
            .on_item(2, MockBehaviour::Fail("flaky".into())),
    );
    let executor = executor_for(op.clone());
    let params = json!({ "resource": "space", "operation": "list", "options": batching(2, 0) });

    let first = executor
        .execute(Arc::new(context(4, params.clone()).with_continue_on_fail(true)))
        .await
        .unwrap();
    let second = executor
        .execute(Arc::new(context(4, params).with_continue_on_fail(true)))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(op.call_count(), 8);
}
