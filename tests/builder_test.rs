//! Tests for GroupBuilder: partitioning, multi-level builds, options.

use std::rc::Rc;

use rstest::{fixture, rstest};
use serde_json::{json, Value};

use regroup::util::testing::init_test_setup;
use regroup::{group, Dimension, FanOut, GroupBuilder, GroupError, GroupOptions, Record};

fn records_from(values: &[Value]) -> Vec<Record> {
    values
        .iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect()
}

#[fixture]
fn geo_records() -> Vec<Record> {
    records_from(&[
        json!({"c": "US", "s": "CA", "pop": 39}),
        json!({"c": "US", "s": "NY", "pop": 19}),
        json!({"c": "CA", "s": "ON", "pop": 14}),
    ])
}

// ============================================================
// Single and Multi-Level Grouping
// ============================================================

#[rstest]
fn given_country_state_records_when_grouping_two_levels_then_structure_matches(
    geo_records: Vec<Record>,
) {
    init_test_setup();
    let dims = [Dimension::field("c"), Dimension::field("s")];
    let tree = group(&geo_records, &dims).unwrap();

    assert_eq!(tree.roots().len(), 2);

    let us = tree.lookup_key("US").unwrap();
    let us_node = tree.node(us).unwrap();
    assert_eq!(us_node.records.len(), 2);
    assert_eq!(us_node.depth, 0);
    let us_children = us_node.children.as_ref().unwrap();
    assert_eq!(us_children.len(), 2);

    let ca_state = us_children.lookup("CA").unwrap();
    let ca_node = tree.node(ca_state).unwrap();
    assert_eq!(ca_node.depth, 1);
    assert_eq!(ca_node.records.len(), 1);

    let canada = tree.lookup_key("CA").unwrap();
    let canada_node = tree.node(canada).unwrap();
    assert_eq!(canada_node.records.len(), 1);
    assert_eq!(canada_node.children.as_ref().unwrap().len(), 1);
}

#[rstest]
fn given_records_when_grouping_then_sibling_records_union_to_input(geo_records: Vec<Record>) {
    let tree = group(&geo_records, &[Dimension::field("c")]).unwrap();

    let total: usize = tree
        .roots()
        .iter()
        .map(|idx| tree.node(idx).unwrap().records.len())
        .sum();
    assert_eq!(total, geo_records.len());
}

#[rstest]
fn given_same_input_when_grouping_twice_then_results_identical(geo_records: Vec<Record>) {
    let dims = [Dimension::field("c"), Dimension::field("s")];
    let first = group(&geo_records, &dims).unwrap();
    let second = group(&geo_records, &dims).unwrap();

    let keys = |t: &regroup::GroupTree| -> Vec<String> {
        t.flatten()
            .iter()
            .map(|idx| t.node(idx).unwrap().identity())
            .collect()
    };
    assert_eq!(keys(&first), keys(&second));

    let counts = |t: &regroup::GroupTree| -> Vec<usize> {
        t.flatten()
            .iter()
            .map(|idx| t.node(idx).unwrap().records.len())
            .collect()
    };
    assert_eq!(counts(&first), counts(&second));
}

#[test]
fn given_records_when_grouping_then_first_seen_key_order_is_kept() {
    let records = records_from(&[
        json!({"k": "b"}),
        json!({"k": "a"}),
        json!({"k": "b"}),
        json!({"k": "c"}),
    ]);
    let tree = group(&records, &[Dimension::field("k")]).unwrap();

    let order: Vec<String> = tree
        .roots()
        .iter()
        .map(|idx| tree.node(idx).unwrap().identity())
        .collect();
    assert_eq!(order, vec!["b", "a", "c"]);
}

#[test]
fn given_huge_numeric_keys_when_grouping_then_groups_stay_distinct() {
    let records = records_from(&[json!({"n": 1e300}), json!({"n": 2e300})]);
    let tree = group(&records, &[Dimension::field("n")]).unwrap();

    assert_eq!(tree.roots().len(), 2);
    for idx in tree.roots().iter() {
        assert_eq!(tree.node(idx).unwrap().records.len(), 1);
    }
}

#[test]
fn given_no_records_when_grouping_then_tree_is_empty() {
    let tree = group(&[], &[Dimension::field("k")]).unwrap();
    assert!(tree.roots().is_empty());
    assert_eq!(tree.depth(), 0);
}

// ============================================================
// Options
// ============================================================

#[test]
fn given_blank_values_when_truncate_enabled_then_records_dropped() {
    let records = records_from(&[
        json!({"k": "a"}),
        json!({"k": ""}),
        json!({"k": null}),
        json!({"other": 1}),
        json!({"k": "b"}),
    ]);
    let opts = GroupOptions {
        truncate_on_empty: true,
        ..Default::default()
    };
    let tree = GroupBuilder::with_options(opts)
        .build(&records, &[Dimension::field("k")])
        .unwrap();

    assert_eq!(tree.roots().len(), 2);
    assert_eq!(tree.records().len(), 2);
}

#[test]
fn given_blank_values_when_truncate_disabled_then_empty_key_group_exists() {
    let records = records_from(&[json!({"k": "a"}), json!({"k": null})]);
    let tree = group(&records, &[Dimension::field("k")]).unwrap();

    assert_eq!(tree.roots().len(), 2);
    let blank = tree.lookup_key("").unwrap();
    assert_eq!(tree.node(blank).unwrap().records.len(), 1);
}

#[test]
fn given_exclude_values_when_grouping_then_branch_skipped() {
    let records = records_from(&[json!({"k": "a"}), json!({"k": "b"}), json!({"k": "a"})]);
    let opts = GroupOptions {
        exclude_values: vec!["a".to_string()],
        ..Default::default()
    };
    let tree = GroupBuilder::with_options(opts)
        .build(&records, &[Dimension::field("k")])
        .unwrap();

    assert_eq!(tree.roots().len(), 1);
    assert!(tree.lookup_key("a").is_none());
}

#[test]
fn given_pre_hook_when_grouping_then_records_transformed_first() {
    let records = records_from(&[
        json!({"k": "a", "keep": true}),
        json!({"k": "b", "keep": false}),
    ]);
    let opts = GroupOptions {
        pre_hook: Some(Rc::new(|recs: Vec<Record>| {
            recs.into_iter()
                .filter(|r| r.get("keep") == Some(&json!(true)))
                .collect()
        })),
        ..Default::default()
    };
    let tree = GroupBuilder::with_options(opts)
        .build(&records, &[Dimension::field("k")])
        .unwrap();

    assert_eq!(tree.roots().len(), 1);
    assert!(tree.lookup_key("b").is_none());
}

#[test]
fn given_dim_names_override_when_grouping_then_nodes_carry_display_name() {
    let records = records_from(&[json!({"c": "US"})]);
    let opts = GroupOptions {
        dim_names: vec!["Country".to_string()],
        ..Default::default()
    };
    let tree = GroupBuilder::with_options(opts)
        .build(&records, &[Dimension::field("c")])
        .unwrap();

    let node = tree.node(tree.lookup_key("US").unwrap()).unwrap();
    assert_eq!(node.dim_name, "Country");
    assert_eq!(tree.roots().dim_name(), "Country");
}

#[test]
fn given_derived_dimension_when_grouping_then_key_function_applies() {
    let records = records_from(&[json!({"n": 3}), json!({"n": 12}), json!({"n": 7})]);
    let bucket = Dimension::derived("bucket", |r| {
        let n = r.get("n").and_then(Value::as_i64).unwrap_or(0);
        json!(if n < 10 { "small" } else { "large" })
    });
    let tree = group(&records, &[bucket]).unwrap();

    assert_eq!(tree.roots().len(), 2);
    let small = tree.node(tree.lookup_key("small").unwrap()).unwrap();
    assert_eq!(small.records.len(), 2);
}

// ============================================================
// Fan-Out Membership
// ============================================================

#[test]
fn given_multivalued_field_when_fan_out_then_record_in_every_group() {
    let records = records_from(&[
        json!({"tags": ["red", "blue"]}),
        json!({"tags": ["blue"]}),
    ]);
    let opts = GroupOptions {
        fan_out: FanOut::All,
        ..Default::default()
    };
    let tree = GroupBuilder::with_options(opts)
        .build(&records, &[Dimension::field("tags")])
        .unwrap();

    assert_eq!(tree.roots().len(), 2);
    let red = tree.node(tree.lookup_key("red").unwrap()).unwrap();
    let blue = tree.node(tree.lookup_key("blue").unwrap()).unwrap();
    assert_eq!(red.records.len(), 1);
    assert_eq!(blue.records.len(), 2);
}

#[test]
fn given_multi_level_fan_out_without_whitelist_then_error() {
    let records = records_from(&[json!({"tags": ["x"], "k": "a"})]);
    let opts = GroupOptions {
        fan_out: FanOut::All,
        ..Default::default()
    };
    let result = GroupBuilder::with_options(opts).build(
        &records,
        &[Dimension::field("tags"), Dimension::field("k")],
    );
    assert_eq!(result.unwrap_err(), GroupError::AmbiguousMultiValuedConfig);
}

#[test]
fn given_multi_level_fan_out_with_whitelist_then_only_named_dim_fans_out() {
    let records = records_from(&[
        json!({"tags": ["red", "blue"], "k": "a"}),
        json!({"tags": ["red"], "k": "b"}),
    ]);
    let opts = GroupOptions {
        fan_out: FanOut::Dims(vec!["tags".to_string()]),
        ..Default::default()
    };
    let tree = GroupBuilder::with_options(opts)
        .build(
            &records,
            &[Dimension::field("tags"), Dimension::field("k")],
        )
        .unwrap();

    let red = tree.node(tree.lookup_key("red").unwrap()).unwrap();
    assert_eq!(red.records.len(), 2);
    // second level partitions exclusively
    let red_children = red.children.as_ref().unwrap();
    assert_eq!(red_children.len(), 2);
}

// ============================================================
// Adding Levels
// ============================================================

#[rstest]
fn given_one_level_tree_when_adding_level_then_children_built(geo_records: Vec<Record>) {
    let mut tree = group(&geo_records, &[Dimension::field("c")]).unwrap();
    let us = tree.lookup_key("US").unwrap();

    tree.add_level(us, &Dimension::field("s"), &GroupOptions::default())
        .unwrap();

    let children = tree.node(us).unwrap().children.as_ref().unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(tree.node(children.get(0).unwrap()).unwrap().depth, 1);
}

#[rstest]
fn given_existing_children_when_adding_level_again_then_overwritten(geo_records: Vec<Record>) {
    let mut tree = group(&geo_records, &[Dimension::field("c")]).unwrap();
    let us = tree.lookup_key("US").unwrap();

    tree.add_level(us, &Dimension::field("s"), &GroupOptions::default())
        .unwrap();
    tree.add_level(us, &Dimension::field("pop"), &GroupOptions::default())
        .unwrap();

    let children = tree.node(us).unwrap().children.as_ref().unwrap();
    assert_eq!(children.dim_name(), "pop");
    assert!(children.lookup("39").is_some());
}

#[rstest]
fn given_tree_when_adding_level_to_all_leaves_then_every_branch_extended(
    geo_records: Vec<Record>,
) {
    let mut tree = group(&geo_records, &[Dimension::field("c")]).unwrap();
    tree.add_level_all(&Dimension::field("s"), &GroupOptions::default())
        .unwrap();

    for idx in tree.roots().iter() {
        assert!(!tree.node(idx).unwrap().is_leaf());
    }
    assert_eq!(tree.depth(), 2);
}
