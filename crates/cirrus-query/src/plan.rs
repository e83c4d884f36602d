// cirrus-query/src/plan.rs
// ============================================================================
// Module: Query Planner and Pipeline
// Description: Lowers a parsed query into a linear operator pipeline and
//              executes it against partition slices.
// Purpose: Scan → Join* → Filter → Group? → Project → Distinct? → Sort? →
//          Offset? → Limit?, with cross-partition merge and pagination.
// Dependencies: cirrus-core, serde_json, crate::{ast, continuation, error,
//               eval}
// ============================================================================

//! ## Overview
//! Execution picks one of two strategies. Queries whose output depends on
//! the whole input (ORDER BY, GROUP BY, aggregates, DISTINCT) materialize
//! the merged stream and paginate by row offset. Plain scans run
//! incrementally with per-partition document cursors, so a page touches only
//! the documents it emits. Both strategies share the scan/join/filter/project
//! stages and both honor the cancellation flag between operator steps and at
//! partition boundaries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering as AtomicOrdering;

use cirrus_core::value::number_from_f64;
use cirrus_core::value::order_compare;
use serde_json::Map;
use serde_json::Value;

use crate::ast::Expr;
use crate::ast::Projection;
use crate::ast::Query;
use crate::continuation;
use crate::continuation::ContinuationToken;
use crate::continuation::Cursor;
use crate::error::QueryError;
use crate::error::QueryResult;
use crate::eval;
use crate::eval::Row;
use crate::eval::Truth;

// ============================================================================
// SECTION: Options and Results
// ============================================================================

/// Default page cap when the caller does not set one.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Rows between cancellation checks inside a partition.
const CANCEL_CHECK_INTERVAL: usize = 256;

/// Cooperative cancellation flag polled by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    /// Shared cancelled bit.
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    /// Creates a fresh, uncancelled flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; the pipeline stops at its next poll.
    pub fn cancel(&self) {
        self.cancelled.store(true, AtomicOrdering::Relaxed);
    }

    /// Returns true when cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::Relaxed)
    }
}

/// Execution options for one page.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Maximum rows in the page.
    pub page_size: usize,
    /// Raw continuation token from a prior page.
    pub continuation: Option<String>,
    /// Cancellation flag tied to the client connection.
    pub cancel: CancellationFlag,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            continuation: None,
            cancel: CancellationFlag::new(),
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage {
    /// Result rows in emission order.
    pub rows: Vec<Value>,
    /// Encoded continuation token when more data exists.
    pub continuation: Option<String>,
}

// ============================================================================
// SECTION: Execution Entry Point
// ============================================================================

/// Executes a query against partition slices and returns one page.
///
/// `partitions` holds each partition's documents in insertion order; the
/// slice shape must be stable across pages of one query (the store
/// guarantees this for a fixed collection).
///
/// # Errors
///
/// Returns [`QueryError`] for structural problems, bad continuation tokens,
/// or cancellation.
pub fn execute(
    query: &Query,
    text: &str,
    params: &BTreeMap<String, Value>,
    partitions: &[Vec<Value>],
    options: &QueryOptions,
) -> QueryResult<QueryPage> {
    validate(query, params)?;
    let fingerprint = continuation::query_fingerprint(text, params);
    let token = match &options.continuation {
        Some(raw) => Some(continuation::decode(raw, &fingerprint)?),
        None => None,
    };
    // A zero cap would never make progress; the smallest useful page is one.
    let mut options = options.clone();
    options.page_size = options.page_size.max(1);
    if needs_materialization(query) {
        execute_materialized(query, params, partitions, &options, &fingerprint, token)
    } else {
        execute_scan(query, params, partitions, &options, &fingerprint, token)
    }
}

/// Returns true when the query needs the whole input before emitting a row.
fn needs_materialization(query: &Query) -> bool {
    query.distinct
        || !query.order_by.is_empty()
        || !query.group_by.is_empty()
        || projection_has_aggregates(&query.projection)
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Structural validation run before any document is touched.
fn validate(query: &Query, params: &BTreeMap<String, Value>) -> QueryResult<()> {
    // Alias bindings.
    let mut bound: BTreeSet<&str> = BTreeSet::new();
    bound.insert(query.from.alias.as_str());
    if let Some(source) = &query.from.source {
        let root = source.root_alias().ok_or_else(|| {
            QueryError::InvalidQuery("FROM source must be a property path".to_string())
        })?;
        if root == query.from.alias {
            return Err(QueryError::InvalidQuery(format!(
                "FROM alias '{root}' cannot reference itself"
            )));
        }
    }
    for join in &query.joins {
        let root = join.source.root_alias().ok_or_else(|| {
            QueryError::InvalidQuery("JOIN source must be a property path".to_string())
        })?;
        if !bound.contains(root) {
            return Err(QueryError::InvalidQuery(format!(
                "JOIN source references unbound alias '{root}'"
            )));
        }
        if !bound.insert(join.alias.as_str()) {
            return Err(QueryError::InvalidQuery(format!(
                "alias '{}' is bound more than once",
                join.alias
            )));
        }
    }

    // Alias and parameter references in every clause.
    let mut failure: Option<QueryError> = None;
    visit_clause_exprs(query, &mut |expr, in_projection_root| {
        if failure.is_some() {
            return;
        }
        match expr {
            Expr::Alias(name) => {
                if !bound.contains(name.as_str()) {
                    failure = Some(QueryError::InvalidQuery(format!(
                        "identifier '{name}' could not be resolved"
                    )));
                }
            }
            Expr::Param(name) => {
                if !params.contains_key(name) {
                    failure = Some(QueryError::UnknownParameter(name.clone()));
                }
            }
            Expr::Call {
                function,
                args,
            } if eval::is_aggregate(function) => {
                if !in_projection_root {
                    failure = Some(QueryError::InvalidQuery(format!(
                        "aggregate {function} is only allowed as a top-level projection"
                    )));
                } else if args.len() != 1 {
                    failure = Some(QueryError::WrongArity {
                        function: function.clone(),
                        expected: "exactly 1",
                        actual: args.len(),
                    });
                }
            }
            _ => {}
        }
    });
    if let Some(error) = failure {
        return Err(error);
    }

    // Aggregate placement rules.
    let has_aggregates = projection_has_aggregates(&query.projection);
    if has_aggregates {
        if !query.order_by.is_empty() {
            return Err(QueryError::InvalidQuery(
                "ORDER BY cannot be combined with aggregates".to_string(),
            ));
        }
        if query.group_by.is_empty() && !projection_is_all_aggregates(&query.projection) {
            return Err(QueryError::InvalidQuery(
                "mixing aggregate and non-aggregate projections requires GROUP BY".to_string(),
            ));
        }
    }
    if !query.group_by.is_empty() {
        if !query.order_by.is_empty() {
            return Err(QueryError::InvalidQuery(
                "ORDER BY cannot be combined with GROUP BY".to_string(),
            ));
        }
        // Non-aggregate projections must repeat a grouping key.
        let items: Vec<&Expr> = match &query.projection {
            Projection::Star => {
                return Err(QueryError::InvalidQuery(
                    "SELECT * cannot be combined with GROUP BY".to_string(),
                ));
            }
            Projection::Value(expr) => vec![expr],
            Projection::Items(items) => items.iter().map(|item| &item.expr).collect(),
        };
        for item in items {
            if is_aggregate_call(item) {
                continue;
            }
            if !query.group_by.iter().any(|key| key == item) {
                return Err(QueryError::InvalidQuery(
                    "non-aggregate projections must appear in GROUP BY".to_string(),
                ));
            }
        }
    }

    if query.top.is_some() && query.offset_limit.is_some() {
        return Err(QueryError::InvalidQuery(
            "TOP cannot be combined with OFFSET LIMIT".to_string(),
        ));
    }
    if matches!(query.projection, Projection::Star) && !query.joins.is_empty() {
        return Err(QueryError::InvalidQuery(
            "SELECT * is only valid with a single source".to_string(),
        ));
    }
    Ok(())
}

/// Visits every expression in the query; the callback learns whether the
/// node is the root of a projection item.
fn visit_clause_exprs<'a>(query: &'a Query, visit: &mut impl FnMut(&'a Expr, bool)) {
    if let Some(source) = &query.from.source {
        // The implicit root of the FROM source is bound to the document and
        // checked separately, so alias nodes are skipped here.
        source.walk(&mut |node| {
            if !matches!(node, Expr::Alias(_)) {
                visit(node, false);
            }
        });
    }
    for join in &query.joins {
        join.source.walk(&mut |node| visit(node, false));
    }
    if let Some(filter) = &query.filter {
        filter.walk(&mut |node| visit(node, false));
    }
    for key in &query.group_by {
        key.walk(&mut |node| visit(node, false));
    }
    for term in &query.order_by {
        term.expr.walk(&mut |node| visit(node, false));
    }
    match &query.projection {
        Projection::Star => {}
        Projection::Value(expr) => visit_projection_root(expr, visit),
        Projection::Items(items) => {
            for item in items {
                visit_projection_root(&item.expr, visit);
            }
        }
    }
}

/// Visits a projection root and its children.
///
/// The root itself is flagged so aggregate placement can be checked; an
/// aggregate root's arguments are walked as ordinary expressions, which also
/// rejects nested aggregates.
fn visit_projection_root<'a>(expr: &'a Expr, visit: &mut impl FnMut(&'a Expr, bool)) {
    visit(expr, true);
    if let Expr::Call {
        function,
        args,
    } = expr
    {
        if eval::is_aggregate(function) {
            for arg in args {
                arg.walk(&mut |node| visit(node, false));
            }
            return;
        }
    }
    expr.walk(&mut |node| {
        if !std::ptr::eq(node, expr) {
            visit(node, false);
        }
    });
}

/// Returns true when the expression is an aggregate call node.
fn is_aggregate_call(expr: &Expr) -> bool {
    matches!(expr, Expr::Call { function, .. } if eval::is_aggregate(function))
}

/// Returns true when any projection root is an aggregate call.
fn projection_has_aggregates(projection: &Projection) -> bool {
    match projection {
        Projection::Star => false,
        Projection::Value(expr) => is_aggregate_call(expr),
        Projection::Items(items) => items.iter().any(|item| is_aggregate_call(&item.expr)),
    }
}

/// Returns true when every projection root is an aggregate call.
fn projection_is_all_aggregates(projection: &Projection) -> bool {
    match projection {
        Projection::Star => false,
        Projection::Value(expr) => is_aggregate_call(expr),
        Projection::Items(items) => items.iter().all(|item| is_aggregate_call(&item.expr)),
    }
}

// ============================================================================
// SECTION: Scan and Join Stages
// ============================================================================

/// Produces the pipeline rows of one document: the scan binding plus every
/// flattening join, with the filter applied.
fn document_rows(
    query: &Query,
    document: &Value,
    params: &BTreeMap<String, Value>,
) -> QueryResult<Vec<Row>> {
    let mut rows: Vec<Row> = match &query.from.source {
        None => vec![Row::single(&query.from.alias, document.clone())],
        Some(source) => {
            let root = source
                .root_alias()
                .ok_or_else(|| QueryError::Internal("unvalidated FROM source".to_string()))?;
            let env = Row::single(root, document.clone());
            match eval::eval(source, &env, params)? {
                Some(Value::Array(items)) => items
                    .into_iter()
                    .map(|item| Row::single(&query.from.alias, item))
                    .collect(),
                _ => Vec::new(),
            }
        }
    };
    for join in &query.joins {
        let mut joined = Vec::new();
        for row in rows {
            match eval::eval(&join.source, &row, params)? {
                Some(Value::Array(items)) => {
                    for item in items {
                        joined.push(row.extended(&join.alias, item));
                    }
                }
                // Empty and non-array sources drop the row.
                _ => {}
            }
        }
        rows = joined;
    }
    if let Some(filter) = &query.filter {
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            if eval::eval_predicate(filter, &row, params)? == Truth::True {
                kept.push(row);
            }
        }
        rows = kept;
    }
    Ok(rows)
}

// ============================================================================
// SECTION: Projection Stage
// ============================================================================

/// Projects a row; `None` means the row produced no value (undefined VALUE
/// projection) and is dropped from the stream.
fn project_row(
    query: &Query,
    row: &Row,
    params: &BTreeMap<String, Value>,
) -> QueryResult<Option<Value>> {
    match &query.projection {
        Projection::Star => Ok(row.get(&query.from.alias).cloned()),
        Projection::Value(expr) => eval::eval(expr, row, params),
        Projection::Items(items) => {
            let mut object = Map::new();
            for (index, item) in items.iter().enumerate() {
                if let Some(value) = eval::eval(&item.expr, row, params)? {
                    object.insert(projection_name(item.alias.as_deref(), &item.expr, index), value);
                }
            }
            Ok(Some(Value::Object(object)))
        }
    }
}

/// Infers the member name of a projection item.
fn projection_name(alias: Option<&str>, expr: &Expr, index: usize) -> String {
    if let Some(alias) = alias {
        return alias.to_string();
    }
    if let Some(name) = expr.trailing_name() {
        return name.to_string();
    }
    format!("${}", index + 1)
}

// ============================================================================
// SECTION: Materialized Execution
// ============================================================================

/// Executes ordered, grouped, distinct, or aggregate queries by
/// materializing the merged stream and paginating by row offset.
fn execute_materialized(
    query: &Query,
    params: &BTreeMap<String, Value>,
    partitions: &[Vec<Value>],
    options: &QueryOptions,
    fingerprint: &str,
    token: Option<ContinuationToken>,
) -> QueryResult<QueryPage> {
    let skip = match token {
        None => 0,
        Some(ContinuationToken {
            cursor: Cursor::Offset {
                skip, ..
            },
            ..
        }) => usize::try_from(skip).unwrap_or(usize::MAX),
        Some(_) => {
            return Err(QueryError::BadContinuation(
                "token mode does not match the query shape".to_string(),
            ));
        }
    };

    // Scan → Join → Filter across all partitions, merged in partition order.
    let mut rows: Vec<Row> = Vec::new();
    let mut since_check = 0_usize;
    for partition in partitions {
        check_cancelled(&options.cancel)?;
        for document in partition {
            since_check += 1;
            if since_check >= CANCEL_CHECK_INTERVAL {
                since_check = 0;
                check_cancelled(&options.cancel)?;
            }
            rows.extend(document_rows(query, document, params)?);
        }
    }

    // Group? → Project.
    let mut projected: Vec<(Value, Option<Vec<Option<Value>>>)> =
        if !query.group_by.is_empty() || projection_has_aggregates(&query.projection) {
            group_and_project(query, &rows, params)?
                .into_iter()
                .map(|value| (value, None))
                .collect()
        } else {
            let mut out = Vec::with_capacity(rows.len());
            for row in &rows {
                check_every(&options.cancel, &mut since_check)?;
                let keys = if query.order_by.is_empty() {
                    None
                } else {
                    let mut keys = Vec::with_capacity(query.order_by.len());
                    for term in &query.order_by {
                        keys.push(eval::eval(&term.expr, row, params)?);
                    }
                    Some(keys)
                };
                if let Some(value) = project_row(query, row, params)? {
                    out.push((value, keys));
                }
            }
            out
        };

    // Distinct?
    if query.distinct {
        let mut seen = HashSet::new();
        projected.retain(|(value, _)| {
            let key = serde_json::to_string(value).unwrap_or_default();
            seen.insert(key)
        });
    }

    // Sort? (stable; undefined keys order after every defined value).
    if !query.order_by.is_empty() {
        check_cancelled(&options.cancel)?;
        projected.sort_by(|(_, a), (_, b)| {
            let (Some(a), Some(b)) = (a, b) else {
                return std::cmp::Ordering::Equal;
            };
            for (term, (key_a, key_b)) in query.order_by.iter().zip(a.iter().zip(b.iter())) {
                let step = match (key_a, key_b) {
                    (None, None) => std::cmp::Ordering::Equal,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (Some(key_a), Some(key_b)) => {
                        let ordered = order_compare(key_a, key_b);
                        if term.descending {
                            ordered.reverse()
                        } else {
                            ordered
                        }
                    }
                };
                if step != std::cmp::Ordering::Equal {
                    return step;
                }
            }
            std::cmp::Ordering::Equal
        });
    }

    // Offset? → Limit? over the merged stream.
    let offset = query.offset_limit.map_or(0, |ol| usize::try_from(ol.offset).unwrap_or(0));
    let limit = effective_limit(query);
    let mut bounded: Vec<(Value, Option<Vec<Option<Value>>>)> =
        projected.into_iter().skip(offset).collect();
    if let Some(limit) = limit {
        bounded.truncate(limit);
    }

    // Page slice.
    let total = bounded.len();
    let start = skip.min(total);
    let end = start.saturating_add(options.page_size).min(total);
    let order_key = if end > start {
        bounded.get(end - 1).and_then(|(_, keys)| {
            keys.as_ref().map(|keys| {
                Value::Array(keys.iter().map(|k| k.clone().unwrap_or(Value::Null)).collect())
            })
        })
    } else {
        None
    };
    let rows: Vec<Value> = bounded.drain(start .. end).map(|(value, _)| value).collect();
    let continuation = if end < total {
        Some(continuation::encode(&ContinuationToken {
            fingerprint: fingerprint.to_string(),
            cursor: Cursor::Offset {
                skip: end as u64,
                order_key,
            },
        }))
    } else {
        None
    };
    Ok(QueryPage {
        rows,
        continuation,
    })
}

/// Bounds the stream under `TOP` or `OFFSET LIMIT`.
fn effective_limit(query: &Query) -> Option<usize> {
    if let Some(top) = query.top {
        return Some(usize::try_from(top).unwrap_or(usize::MAX));
    }
    query.offset_limit.map(|ol| usize::try_from(ol.limit).unwrap_or(usize::MAX))
}

// ============================================================================
// SECTION: Group and Aggregate Stage
// ============================================================================

/// One group under construction.
struct GroupState {
    /// Representative row used for key projections.
    representative: Row,
    /// All member rows.
    rows: Vec<Row>,
}

/// Groups rows and projects each group.
fn group_and_project(
    query: &Query,
    rows: &[Row],
    params: &BTreeMap<String, Value>,
) -> QueryResult<Vec<Value>> {
    // Group rows by their key tuple, preserving first-seen order.
    let mut order: Vec<String> = Vec::new();
    let mut groups: BTreeMap<String, GroupState> = BTreeMap::new();
    if query.group_by.is_empty() {
        // Aggregates without GROUP BY form a single group over all rows,
        // even when the input is empty.
        order.push(String::new());
        groups.insert(
            String::new(),
            GroupState {
                representative: Row::default(),
                rows: rows.to_vec(),
            },
        );
    } else {
        for row in rows {
            let mut key_parts = Vec::with_capacity(query.group_by.len());
            for key in &query.group_by {
                // Tag defined/undefined so `null` and missing stay distinct.
                key_parts.push(match eval::eval(key, row, params)? {
                    Some(value) => serde_json::json!({"d": value}),
                    None => serde_json::json!({"u": true}),
                });
            }
            let key = serde_json::to_string(&key_parts).unwrap_or_default();
            if let Some(group) = groups.get_mut(&key) {
                group.rows.push(row.clone());
            } else {
                order.push(key.clone());
                groups.insert(
                    key,
                    GroupState {
                        representative: row.clone(),
                        rows: vec![row.clone()],
                    },
                );
            }
        }
    }

    // Project each group in first-seen order.
    let mut out = Vec::with_capacity(order.len());
    for key in &order {
        let group = groups
            .get(key)
            .ok_or_else(|| QueryError::Internal("group vanished during projection".to_string()))?;
        match &query.projection {
            Projection::Star => {
                return Err(QueryError::Internal(
                    "star projection reached the group stage".to_string(),
                ));
            }
            Projection::Value(expr) => {
                if let Some(value) = project_group_expr(expr, group, params)? {
                    out.push(value);
                }
            }
            Projection::Items(items) => {
                let mut object = Map::new();
                for (index, item) in items.iter().enumerate() {
                    if let Some(value) = project_group_expr(&item.expr, group, params)? {
                        object.insert(
                            projection_name(item.alias.as_deref(), &item.expr, index),
                            value,
                        );
                    }
                }
                out.push(Value::Object(object));
            }
        }
    }
    Ok(out)
}

/// Projects one expression for a group: aggregate calls combine the member
/// rows, anything else evaluates against the representative row.
fn project_group_expr(
    expr: &Expr,
    group: &GroupState,
    params: &BTreeMap<String, Value>,
) -> QueryResult<Option<Value>> {
    let Expr::Call {
        function,
        args,
    } = expr
    else {
        return eval::eval(expr, &group.representative, params);
    };
    if !eval::is_aggregate(function) {
        return eval::eval(expr, &group.representative, params);
    }
    let arg = args
        .first()
        .ok_or_else(|| QueryError::Internal("unvalidated aggregate arity".to_string()))?;
    let mut values: Vec<Value> = Vec::new();
    for row in &group.rows {
        if let Some(value) = eval::eval(arg, row, params)? {
            values.push(value);
        }
    }
    Ok(combine_aggregate(function, &values))
}

/// Combines defined member values under an aggregate function.
fn combine_aggregate(function: &str, values: &[Value]) -> Option<Value> {
    match function {
        "COUNT" => Some(Value::from(values.len())),
        "SUM" | "AVG" => {
            if values.is_empty() {
                return None;
            }
            let mut sum = 0.0;
            for value in values {
                sum += value.as_f64()?;
            }
            let result = if function == "AVG" {
                #[allow(clippy::cast_precision_loss)]
                let count = values.len() as f64;
                sum / count
            } else {
                sum
            };
            number_from_f64(result)
        }
        "MIN" | "MAX" => {
            if values.is_empty() {
                return None;
            }
            // Ordering across scalars uses the fixed kind rank; a single
            // array or object member makes the aggregate undefined.
            if values.iter().any(|value| {
                !cirrus_core::value::ValueKind::of(value).is_scalar()
            }) {
                return None;
            }
            let mut best = &values[0];
            for value in &values[1 ..] {
                let ordered = order_compare(value, best);
                let better = if function == "MIN" {
                    ordered == std::cmp::Ordering::Less
                } else {
                    ordered == std::cmp::Ordering::Greater
                };
                if better {
                    best = value;
                }
            }
            Some(best.clone())
        }
        _ => None,
    }
}

// ============================================================================
// SECTION: Incremental Scan Execution
// ============================================================================

/// Executes plain scans incrementally with per-partition cursors.
fn execute_scan(
    query: &Query,
    params: &BTreeMap<String, Value>,
    partitions: &[Vec<Value>],
    options: &QueryOptions,
    fingerprint: &str,
    token: Option<ContinuationToken>,
) -> QueryResult<QueryPage> {
    let mut cursors: Vec<usize> = vec![0; partitions.len()];
    let mut row_in_doc: usize = 0;
    let mut remaining_offset: usize =
        query.offset_limit.map_or(0, |ol| usize::try_from(ol.offset).unwrap_or(0));
    let mut remaining_limit: Option<usize> = effective_limit(query);
    if let Some(token) = token {
        let Cursor::Scan {
            cursors: saved,
            row_in_doc: saved_row,
            remaining_offset: saved_offset,
            remaining_limit: saved_limit,
        } = token.cursor
        else {
            return Err(QueryError::BadContinuation(
                "token mode does not match the query shape".to_string(),
            ));
        };
        if saved.len() != partitions.len() {
            return Err(QueryError::BadContinuation(
                "token partition shape does not match the collection".to_string(),
            ));
        }
        cursors = saved.iter().map(|&c| usize::try_from(c).unwrap_or(usize::MAX)).collect();
        row_in_doc = usize::try_from(saved_row).unwrap_or(0);
        remaining_offset = usize::try_from(saved_offset).unwrap_or(0);
        remaining_limit = saved_limit.map(|l| usize::try_from(l).unwrap_or(usize::MAX));
    }

    let mut page: Vec<Value> = Vec::new();
    let mut since_check = 0_usize;

    'partitions: for (index, partition) in partitions.iter().enumerate() {
        check_cancelled(&options.cancel)?;
        while cursors[index] < partition.len() {
            if remaining_limit == Some(0) {
                break 'partitions;
            }
            let document = &partition[cursors[index]];
            let rows = document_rows(query, document, params)?;
            let skip_rows = row_in_doc;
            row_in_doc = 0;
            let mut handled = skip_rows;
            for row in rows.iter().skip(skip_rows) {
                check_every(&options.cancel, &mut since_check)?;
                if remaining_offset > 0 {
                    remaining_offset -= 1;
                    handled += 1;
                    continue;
                }
                if remaining_limit == Some(0) {
                    break;
                }
                if page.len() >= options.page_size {
                    // Page is full mid-document; record the partial position.
                    row_in_doc = handled;
                    return Ok(finish_scan_page(
                        page,
                        &cursors,
                        row_in_doc,
                        remaining_offset,
                        remaining_limit,
                        fingerprint,
                    ));
                }
                if let Some(value) = project_row(query, row, params)? {
                    page.push(value);
                    if let Some(limit) = remaining_limit.as_mut() {
                        *limit -= 1;
                    }
                }
                handled += 1;
            }
            cursors[index] += 1;
        }
    }

    // Stream exhausted (or limit reached): emit the final page. A full page
    // that ends exactly at the stream end still needs no token.
    Ok(QueryPage {
        rows: page,
        continuation: None,
    })
}

/// Builds a truncated scan page with its continuation token.
fn finish_scan_page(
    rows: Vec<Value>,
    cursors: &[usize],
    row_in_doc: usize,
    remaining_offset: usize,
    remaining_limit: Option<usize>,
    fingerprint: &str,
) -> QueryPage {
    let token = ContinuationToken {
        fingerprint: fingerprint.to_string(),
        cursor: Cursor::Scan {
            cursors: cursors.iter().map(|&c| c as u64).collect(),
            row_in_doc: row_in_doc as u64,
            remaining_offset: remaining_offset as u64,
            remaining_limit: remaining_limit.map(|l| l as u64),
        },
    };
    QueryPage {
        rows,
        continuation: Some(continuation::encode(&token)),
    }
}

// ============================================================================
// SECTION: Cancellation Helpers
// ============================================================================

/// Fails when cancellation was requested.
fn check_cancelled(flag: &CancellationFlag) -> QueryResult<()> {
    if flag.is_cancelled() {
        return Err(QueryError::Cancelled);
    }
    Ok(())
}

/// Periodic cancellation check between operator steps.
fn check_every(flag: &CancellationFlag, since: &mut usize) -> QueryResult<()> {
    *since += 1;
    if *since >= CANCEL_CHECK_INTERVAL {
        *since = 0;
        check_cancelled(flag)?;
    }
    Ok(())
}
