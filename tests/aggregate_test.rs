//! Tests for the aggregation hook over grouped records.

use rstest::{fixture, rstest};
use serde_json::{json, Value};

use regroup::aggregate::extract_values;
use regroup::util::testing::init_test_setup;
use regroup::{aggregate, aggregates, group, Dimension, FieldSel, GroupTree, Record};

fn records_from(values: &[Value]) -> Vec<Record> {
    values
        .iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect()
}

fn sum(values: Vec<Value>) -> f64 {
    values.iter().filter_map(Value::as_f64).sum()
}

#[fixture]
fn pop_tree() -> GroupTree {
    let records = records_from(&[
        json!({"c": "US", "s": "CA", "pop": 39.0}),
        json!({"c": "US", "s": "NY", "pop": 19.0}),
        json!({"c": "CA", "s": "ON", "pop": 14.0}),
    ]);
    group(&records, &[Dimension::field("c"), Dimension::field("s")]).unwrap()
}

// ============================================================
// Value Extraction
// ============================================================

#[rstest]
fn given_field_name_when_extracting_then_values_in_record_order(pop_tree: GroupTree) {
    init_test_setup();
    let us = pop_tree.node(pop_tree.lookup_key("US").unwrap()).unwrap();

    let values = extract_values(us, &FieldSel::Name("pop"));
    assert_eq!(values, vec![json!(39.0), json!(19.0)]);
}

#[rstest]
fn given_missing_field_when_extracting_then_nulls(pop_tree: GroupTree) {
    let us = pop_tree.node(pop_tree.lookup_key("US").unwrap()).unwrap();

    let values = extract_values(us, &FieldSel::Name("area"));
    assert_eq!(values, vec![Value::Null, Value::Null]);
}

// ============================================================
// Reductions
// ============================================================

#[rstest]
fn given_sum_reduction_when_aggregating_node_then_total(pop_tree: GroupTree) {
    let us = pop_tree.node(pop_tree.lookup_key("US").unwrap()).unwrap();

    let total = aggregate(us, &FieldSel::Name("pop"), sum);
    assert_eq!(total, 58.0);
}

#[rstest]
fn given_func_selector_when_aggregating_then_transform_applied(pop_tree: GroupTree) {
    let us = pop_tree.node(pop_tree.lookup_key("US").unwrap()).unwrap();

    let doubled = |r: &Record| json!(r.get("pop").and_then(Value::as_f64).unwrap_or(0.0) * 2.0);
    let total = aggregate(us, &FieldSel::Func(&doubled), sum);
    assert_eq!(total, 116.0);
}

#[rstest]
fn given_list_when_aggregating_then_one_result_per_member(pop_tree: GroupTree) {
    let totals = aggregates(&pop_tree, pop_tree.roots(), &FieldSel::Name("pop"), sum);
    assert_eq!(totals, vec![58.0, 14.0]);
}

#[rstest]
fn given_leaf_list_when_aggregating_then_document_order(pop_tree: GroupTree) {
    let leaves = pop_tree.leaf_nodes();
    let totals = aggregates(&pop_tree, &leaves, &FieldSel::Name("pop"), sum);
    assert_eq!(totals, vec![39.0, 19.0, 14.0]);
}

#[rstest]
fn given_no_selection_when_aggregating_then_whole_records_reduced(pop_tree: GroupTree) {
    let us = pop_tree.node(pop_tree.lookup_key("US").unwrap()).unwrap();

    let values = extract_values(us, &FieldSel::All);
    assert_eq!(values[0], json!({"c": "US", "s": "CA", "pop": 39.0}));

    let count = aggregate(us, &FieldSel::All, |records| records.len());
    assert_eq!(count, 2);
}

#[rstest]
fn given_mean_layered_on_hook_when_aggregating_then_average(pop_tree: GroupTree) {
    let mean = |values: Vec<Value>| {
        let nums: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
        if nums.is_empty() {
            0.0
        } else {
            nums.iter().sum::<f64>() / nums.len() as f64
        }
    };
    let us = pop_tree.node(pop_tree.lookup_key("US").unwrap()).unwrap();
    assert_eq!(aggregate(us, &FieldSel::Name("pop"), mean), 29.0);
}
