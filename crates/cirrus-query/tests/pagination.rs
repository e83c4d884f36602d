// cirrus-query/tests/pagination.rs
// ============================================================================
// Module: Pagination Tests
// Description: Continuation-token behavior across pages and partitions.
// Purpose: Assert that page concatenation equals the unbounded result and
//          that tokens are scoped to one query signature.
// Dependencies: cirrus-query, serde_json
// ============================================================================

//! Continuation coverage: faithfulness of page concatenation, cross-partition
//! resumption, join-row boundaries, and fingerprint scoping.

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

/// Drains every page of a query at the given page size.
fn paginate(
    text: &str,
    params: &BTreeMap<String, Value>,
    partitions: &[Vec<Value>],
    page_size: usize,
) -> (Vec<Value>, usize) {
    let query = parse_query(text).expect("query parses");
    let mut collected = Vec::new();
    let mut continuation: Option<String> = None;
    let mut pages = 0;
    loop {
        let options = QueryOptions {
            page_size,
            continuation: continuation.take(),
            ..QueryOptions::default()
        };
        let page = execute(&query, text, params, partitions, &options).expect("page executes");
        pages += 1;
        collected.extend(page.rows);
        match page.continuation {
            Some(token) => continuation = Some(token),
            None => break,
        }
        assert!(pages < 10_000, "pagination did not terminate");
    }
    (collected, pages)
}

/// Runs the query as one unbounded page.
fn unbounded(text: &str, params: &BTreeMap<String, Value>, partitions: &[Vec<Value>]) -> Vec<Value> {
    let query = parse_query(text).expect("query parses");
    let options = QueryOptions {
        page_size: usize::MAX,
        ..QueryOptions::default()
    };
    let page = execute(&query, text, params, partitions, &options).expect("query executes");
    assert!(page.continuation.is_none());
    page.rows
}

fn three_partitions(docs_per_partition: usize) -> Vec<Vec<Value>> {
    (0 .. 3)
        .map(|p| {
            (0 .. docs_per_partition)
                .map(|n| json!({"id": format!("p{p}-d{n}"), "p": p, "n": n, "v": n % 10}))
                .collect()
        })
        .collect()
}

#[test]
fn cross_partition_pagination_yields_exactly_the_expected_pages() {
    let partitions = three_partitions(1000);
    let text = "SELECT VALUE c.id FROM c";
    let (rows, pages) = paginate(text, &BTreeMap::new(), &partitions, 500);
    assert_eq!(pages, 6, "3000 rows at 500 per page is exactly 6 pages");
    assert_eq!(rows.len(), 3000);
    assert_eq!(rows, unbounded(text, &BTreeMap::new(), &partitions));
}

#[test]
fn page_concatenation_equals_the_unbounded_result_for_filters() {
    let partitions = three_partitions(100);
    let params: BTreeMap<String, Value> =
        [("@min".to_string(), json!(4))].into_iter().collect();
    let text = "SELECT c.id, c.v FROM c WHERE c.v >= @min";
    for page_size in [1, 7, 50, 1000] {
        let (rows, _) = paginate(text, &params, &partitions, page_size);
        assert_eq!(rows, unbounded(text, &params, &partitions), "page size {page_size}");
    }
}

#[test]
fn page_concatenation_equals_the_unbounded_result_for_ordered_queries() {
    let partitions = three_partitions(50);
    let text = "SELECT VALUE c.id FROM c ORDER BY c.v DESC, c.id";
    for page_size in [1, 9, 64] {
        let (rows, _) = paginate(text, &BTreeMap::new(), &partitions, page_size);
        assert_eq!(rows, unbounded(text, &BTreeMap::new(), &partitions), "page size {page_size}");
    }
}

#[test]
fn join_rows_split_cleanly_across_page_boundaries() {
    let partitions = vec![vec![
        json!({"id": "a", "tags": [1, 2, 3]}),
        json!({"id": "b", "tags": [4, 5]}),
        json!({"id": "c", "tags": [6]}),
    ]];
    let text = "SELECT c.id, t FROM c JOIN t IN c.tags";
    for page_size in [1, 2, 4] {
        let (rows, _) = paginate(text, &BTreeMap::new(), &partitions, page_size);
        assert_eq!(rows, unbounded(text, &BTreeMap::new(), &partitions), "page size {page_size}");
    }
}

#[test]
fn offset_limit_applies_across_the_merged_paginated_stream() {
    let partitions = three_partitions(40);
    let text = "SELECT VALUE c.id FROM c OFFSET 25 LIMIT 60";
    let (rows, _) = paginate(text, &BTreeMap::new(), &partitions, 13);
    let full = unbounded(text, &BTreeMap::new(), &partitions);
    assert_eq!(rows.len(), 60);
    assert_eq!(rows, full);
}

#[test]
fn distinct_queries_paginate_consistently() {
    let partitions = three_partitions(30);
    let text = "SELECT DISTINCT VALUE c.v FROM c";
    let (rows, _) = paginate(text, &BTreeMap::new(), &partitions, 3);
    assert_eq!(rows, unbounded(text, &BTreeMap::new(), &partitions));
}

#[test]
fn tokens_from_a_different_query_are_rejected() {
    let partitions = three_partitions(10);
    let text_a = "SELECT VALUE c.id FROM c";
    let query_a = parse_query(text_a).expect("parses");
    let options = QueryOptions {
        page_size: 5,
        ..QueryOptions::default()
    };
    let page = execute(&query_a, text_a, &BTreeMap::new(), &partitions, &options)
        .expect("first page");
    let token = page.continuation.expect("token present");

    let text_b = "SELECT VALUE c.n FROM c";
    let query_b = parse_query(text_b).expect("parses");
    let replay = QueryOptions {
        page_size: 5,
        continuation: Some(token),
        ..QueryOptions::default()
    };
    let error =
        execute(&query_b, text_b, &BTreeMap::new(), &partitions, &replay).unwrap_err();
    assert!(matches!(error, QueryError::BadContinuation(_)));
}

#[test]
fn tokens_from_different_parameter_sets_are_rejected() {
    let partitions = three_partitions(10);
    let text = "SELECT VALUE c.id FROM c WHERE c.v >= @min";
    let query = parse_query(text).expect("parses");
    let one: BTreeMap<String, Value> = [("@min".to_string(), json!(1))].into_iter().collect();
    let two: BTreeMap<String, Value> = [("@min".to_string(), json!(2))].into_iter().collect();
    let options = QueryOptions {
        page_size: 3,
        ..QueryOptions::default()
    };
    let page = execute(&query, text, &one, &partitions, &options).expect("first page");
    let token = page.continuation.expect("token present");
    let replay = QueryOptions {
        page_size: 3,
        continuation: Some(token),
        ..QueryOptions::default()
    };
    let error = execute(&query, text, &two, &partitions, &replay).unwrap_err();
    assert!(matches!(error, QueryError::BadContinuation(_)));
}

#[test]
fn final_pages_carry_no_continuation() {
    let partitions = three_partitions(4);
    let text = "SELECT VALUE c.id FROM c";
    let query = parse_query(text).expect("parses");
    // 12 rows at page size 12: one page, no token.
    let options = QueryOptions {
        page_size: 12,
        ..QueryOptions::default()
    };
    let page = execute(&query, text, &BTreeMap::new(), &partitions, &options).expect("page");
    assert_eq!(page.rows.len(), 12);
    assert!(page.continuation.is_none());
}
