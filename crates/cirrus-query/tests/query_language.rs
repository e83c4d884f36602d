// cirrus-query/tests/query_language.rs
// ============================================================================
// Module: Query Language Tests
// Description: End-to-end coverage of the query dialect over in-memory
//              partition slices.
// Purpose: Validate projections, joins, predicates, aggregates, ordering,
//          and three-valued semantics against realistic documents.
// Dependencies: cirrus-query, serde_json
// ============================================================================

//! Language-level tests: each case parses query text and executes it against
//! literal partition slices, asserting on the emitted rows.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions use unwrap for clarity."
)]

use std::collections::BTreeMap;

use cirrus_query::QueryError;
use cirrus_query::QueryOptions;
use cirrus_query::execute;
use cirrus_query::parse_query;
use serde_json::Value;
use serde_json::json;

fn params(entries: &[(&str, Value)]) -> BTreeMap<String, Value> {
    entries.iter().map(|(name, value)| ((*name).to_string(), value.clone())).collect()
}

fn run_with(text: &str, bound: &BTreeMap<String, Value>, docs: Vec<Value>) -> Vec<Value> {
    let query = parse_query(text).expect("query parses");
    let options = QueryOptions {
        page_size: usize::MAX,
        ..QueryOptions::default()
    };
    let page =
        execute(&query, text, bound, &[docs], &options).expect("query executes");
    assert!(page.continuation.is_none(), "unbounded page must not truncate");
    page.rows
}

fn run(text: &str, docs: Vec<Value>) -> Vec<Value> {
    run_with(text, &BTreeMap::new(), docs)
}

fn fail(text: &str, docs: Vec<Value>) -> QueryError {
    let query = parse_query(text).expect("query parses");
    let options = QueryOptions::default();
    execute(&query, text, &BTreeMap::new(), &[docs], &options).expect_err("query must fail")
}

#[test]
fn value_projection_with_parameter_filters_by_three_valued_logic() {
    let docs = vec![json!({"v": 1}), json!({"v": 2}), json!({"v": "x"})];
    let rows = run_with(
        "SELECT VALUE c.v FROM c WHERE c.v >= @min",
        &params(&[("@min", json!(1))]),
        docs,
    );
    assert_eq!(rows, vec![json!(1), json!(2)], "the string is filtered, not erroed on");
}

#[test]
fn where_equality_never_matches_undefined_or_other_kinds() {
    let docs = vec![
        json!({"id": "a", "x": 1}),
        json!({"id": "b", "x": "1"}),
        json!({"id": "c"}),
        json!({"id": "d", "x": 1.0}),
    ];
    let rows = run("SELECT VALUE c.id FROM c WHERE c.x = 1", docs);
    assert_eq!(rows, vec![json!("a"), json!("d")]);
}

#[test]
fn star_projection_returns_documents_in_insertion_order() {
    let docs = vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})];
    let rows = run("SELECT * FROM c", docs.clone());
    assert_eq!(rows, docs);
}

#[test]
fn item_projection_names_members_from_aliases_paths_and_positions() {
    let docs = vec![json!({"name": "n", "address": {"city": "Oslo"}, "v": 7})];
    let rows = run(
        "SELECT c.name, c.address.city, c.v + 1 AS next, c.v * 2 FROM c",
        docs,
    );
    assert_eq!(
        rows,
        vec![json!({"name": "n", "city": "Oslo", "next": 8, "$4": 14})]
    );
}

#[test]
fn item_projection_omits_undefined_members() {
    let docs = vec![json!({"a": 1})];
    let rows = run("SELECT c.a, c.missing FROM c", docs);
    assert_eq!(rows, vec![json!({"a": 1})]);
}

#[test]
fn flattening_from_emits_one_row_per_element() {
    let docs = vec![
        json!({"tags": ["x", "y"]}),
        json!({"tags": []}),
        json!({"tags": "not-an-array"}),
        json!({}),
        json!({"tags": ["z"]}),
    ];
    let rows = run("SELECT VALUE t FROM t IN c.tags", docs);
    assert_eq!(rows, vec![json!("x"), json!("y"), json!("z")]);
}

#[test]
fn joins_flatten_nested_arrays_and_drop_rowless_documents() {
    let docs = vec![
        json!({"id": "a", "orders": [{"lines": [1, 2]}, {"lines": [3]}]}),
        json!({"id": "b", "orders": []}),
        json!({"id": "c", "orders": [{"lines": []}]}),
    ];
    let rows = run(
        "SELECT c.id, l FROM c JOIN o IN c.orders JOIN l IN o.lines",
        docs,
    );
    assert_eq!(
        rows,
        vec![
            json!({"id": "a", "l": 1}),
            json!({"id": "a", "l": 2}),
            json!({"id": "a", "l": 3}),
        ]
    );
}

#[test]
fn order_by_sorts_stably_with_undefined_last() {
    let docs = vec![
        json!({"id": "a", "v": 2}),
        json!({"id": "b"}),
        json!({"id": "c", "v": 1}),
        json!({"id": "d", "v": 2}),
    ];
    let rows = run("SELECT VALUE c.id FROM c ORDER BY c.v", docs.clone());
    assert_eq!(rows, vec![json!("c"), json!("a"), json!("d"), json!("b")]);
    let rows = run("SELECT VALUE c.id FROM c ORDER BY c.v DESC", docs);
    assert_eq!(rows, vec![json!("a"), json!("d"), json!("c"), json!("b")]);
}

#[test]
fn order_by_compares_kinds_by_fixed_rank() {
    let docs = vec![
        json!({"id": "s", "v": "text"}),
        json!({"id": "n", "v": 5}),
        json!({"id": "b", "v": true}),
        json!({"id": "z", "v": null}),
    ];
    let rows = run("SELECT VALUE c.id FROM c ORDER BY c.v", docs);
    assert_eq!(rows, vec![json!("z"), json!("b"), json!("n"), json!("s")]);
}

#[test]
fn multi_key_order_by_uses_later_keys_as_tiebreakers() {
    let docs = vec![
        json!({"g": 1, "n": "b"}),
        json!({"g": 2, "n": "a"}),
        json!({"g": 1, "n": "a"}),
    ];
    let rows = run("SELECT c.g, c.n FROM c ORDER BY c.g ASC, c.n DESC", docs);
    assert_eq!(
        rows,
        vec![
            json!({"g": 1, "n": "b"}),
            json!({"g": 1, "n": "a"}),
            json!({"g": 2, "n": "a"}),
        ]
    );
}

#[test]
fn distinct_removes_duplicate_projected_rows() {
    let docs = vec![
        json!({"v": 1}),
        json!({"v": 2}),
        json!({"v": 1}),
        json!({"v": 3}),
        json!({"v": 2}),
    ];
    let rows = run("SELECT DISTINCT VALUE c.v FROM c", docs);
    assert_eq!(rows, vec![json!(1), json!(2), json!(3)]);
}

#[test]
fn top_offset_and_limit_bound_the_stream() {
    let docs: Vec<Value> = (0 .. 10).map(|n| json!({"n": n})).collect();
    let rows = run("SELECT TOP 3 VALUE c.n FROM c", docs.clone());
    assert_eq!(rows, vec![json!(0), json!(1), json!(2)]);
    let rows = run("SELECT VALUE c.n FROM c OFFSET 4 LIMIT 3", docs.clone());
    assert_eq!(rows, vec![json!(4), json!(5), json!(6)]);
    let rows = run("SELECT VALUE c.n FROM c ORDER BY c.n DESC OFFSET 1 LIMIT 2", docs);
    assert_eq!(rows, vec![json!(8), json!(7)]);
}

#[test]
fn value_aggregates_combine_the_whole_stream() {
    let docs = vec![
        json!({"v": 1}),
        json!({"v": 4}),
        json!({"v": 2}),
        json!({"other": true}),
    ];
    assert_eq!(run("SELECT VALUE COUNT(1) FROM c", docs.clone()), vec![json!(4)]);
    assert_eq!(run("SELECT VALUE COUNT(c.v) FROM c", docs.clone()), vec![json!(3)]);
    assert_eq!(run("SELECT VALUE SUM(c.v) FROM c", docs.clone()), vec![json!(7)]);
    assert_eq!(run("SELECT VALUE MIN(c.v) FROM c", docs.clone()), vec![json!(1)]);
    assert_eq!(run("SELECT VALUE MAX(c.v) FROM c", docs.clone()), vec![json!(4)]);
    let avg = run("SELECT VALUE AVG(c.v) FROM c", docs);
    assert_eq!(avg.len(), 1);
    let delta = (avg[0].as_f64().unwrap() - 7.0 / 3.0).abs();
    assert!(delta < 1e-12);
}

#[test]
fn sum_over_mixed_kinds_is_undefined_and_drops_the_row() {
    let docs = vec![json!({"v": 1}), json!({"v": "x"})];
    assert_eq!(run("SELECT VALUE SUM(c.v) FROM c", docs), Vec::<Value>::new());
}

#[test]
fn count_over_an_empty_stream_is_zero() {
    assert_eq!(run("SELECT VALUE COUNT(1) FROM c", Vec::new()), vec![json!(0)]);
    assert_eq!(run("SELECT VALUE SUM(c.v) FROM c", Vec::new()), Vec::<Value>::new());
}

#[test]
fn group_by_partitions_rows_and_pairs_with_aggregates() {
    let docs = vec![
        json!({"dept": "eng", "salary": 10}),
        json!({"dept": "ops", "salary": 5}),
        json!({"dept": "eng", "salary": 20}),
        json!({"salary": 1}),
    ];
    let rows = run(
        "SELECT c.dept, COUNT(1) AS n, SUM(c.salary) AS total FROM c GROUP BY c.dept",
        docs,
    );
    assert_eq!(
        rows,
        vec![
            json!({"dept": "eng", "n": 2, "total": 30}),
            json!({"dept": "ops", "n": 1, "total": 5}),
            // The undefined-key group keeps its members; the key member is
            // omitted from the projected object.
            json!({"n": 1, "total": 1}),
        ]
    );
}

#[test]
fn aggregate_misuse_is_rejected_structurally() {
    let docs = vec![json!({"v": 1})];
    assert!(matches!(
        fail("SELECT VALUE COUNT(1) FROM c WHERE COUNT(1) > 0", docs.clone()),
        QueryError::InvalidQuery(_)
    ));
    assert!(matches!(
        fail("SELECT c.v, COUNT(1) FROM c", docs.clone()),
        QueryError::InvalidQuery(_)
    ));
    assert!(matches!(
        fail("SELECT VALUE COUNT(1) FROM c ORDER BY c.v", docs.clone()),
        QueryError::InvalidQuery(_)
    ));
    assert!(matches!(
        fail("SELECT c.other, COUNT(1) FROM c GROUP BY c.v", docs),
        QueryError::InvalidQuery(_)
    ));
}

#[test]
fn structural_validation_rejects_bad_alias_use() {
    let docs = vec![json!({"v": 1})];
    assert!(matches!(
        fail("SELECT VALUE d.v FROM c", docs.clone()),
        QueryError::InvalidQuery(_)
    ));
    assert!(matches!(
        fail("SELECT TOP 1 VALUE c.v FROM c OFFSET 0 LIMIT 1", docs.clone()),
        QueryError::InvalidQuery(_)
    ));
    assert!(matches!(
        fail("SELECT * FROM c JOIN t IN c.tags", docs.clone()),
        QueryError::InvalidQuery(_)
    ));
    assert!(matches!(
        fail("SELECT VALUE c.v FROM c WHERE c.v >= @min", docs),
        QueryError::UnknownParameter(_)
    ));
}

#[test]
fn cross_partition_scan_merges_in_partition_order() {
    let partitions = vec![
        vec![json!({"p": 0, "n": 0}), json!({"p": 0, "n": 1})],
        vec![json!({"p": 1, "n": 0})],
        Vec::new(),
        vec![json!({"p": 3, "n": 0})],
    ];
    let text = "SELECT c.p, c.n FROM c";
    let query = parse_query(text).expect("parses");
    let options = QueryOptions {
        page_size: usize::MAX,
        ..QueryOptions::default()
    };
    let page = execute(&query, text, &BTreeMap::new(), &partitions, &options).expect("executes");
    assert_eq!(
        page.rows,
        vec![
            json!({"p": 0, "n": 0}),
            json!({"p": 0, "n": 1}),
            json!({"p": 1, "n": 0}),
            json!({"p": 3, "n": 0}),
        ]
    );
}

#[test]
fn cross_partition_order_by_merges_under_the_sort_key() {
    let partitions = vec![
        vec![json!({"v": 5}), json!({"v": 1})],
        vec![json!({"v": 4}), json!({"v": 2})],
        vec![json!({"v": 3})],
    ];
    let text = "SELECT VALUE c.v FROM c ORDER BY c.v";
    let query = parse_query(text).expect("parses");
    let options = QueryOptions {
        page_size: usize::MAX,
        ..QueryOptions::default()
    };
    let page = execute(&query, text, &BTreeMap::new(), &partitions, &options).expect("executes");
    assert_eq!(page.rows, vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);
}

#[test]
fn repeated_execution_over_an_unchanged_store_is_identical() {
    let docs: Vec<Value> = (0 .. 50)
        .map(|n| json!({"id": format!("d{n}"), "v": (n * 7) % 13, "tag": n % 3}))
        .collect();
    let text = "SELECT c.id FROM c WHERE c.tag = 1 ORDER BY c.v, c.id";
    let first = run(text, docs.clone());
    let second = run(text, docs);
    assert_eq!(first, second);
}

#[test]
fn cancellation_stops_execution_without_a_continuation() {
    let docs: Vec<Value> = (0 .. 10).map(|n| json!({"n": n})).collect();
    let text = "SELECT * FROM c";
    let query = parse_query(text).expect("parses");
    let options = QueryOptions::default();
    options.cancel.cancel();
    let error = execute(&query, text, &BTreeMap::new(), &[docs], &options).unwrap_err();
    assert_eq!(error, QueryError::Cancelled);
}
