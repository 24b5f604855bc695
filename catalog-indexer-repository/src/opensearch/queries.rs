//! OpenSearch request body builders.
//!
//! Wraps the compiled query node in a search request envelope carrying
//! sorting and paging.

use serde_json::{json, Map, Value};

use super::converter::QueryConverter;
use crate::errors::QueryConversionError;
use catalog_indexer_shared::{SearchQuery, Sort, SortOrder};

/// Default page size when the request sets no limit.
pub const DEFAULT_LIMIT: u64 = 10;

/// Upper bound for a single page.
pub const MAX_LIMIT: u64 = 1000;

/// Build the body of a `_search` request.
///
/// - `query` is compiled through the handler chain
/// - `sort` becomes an array of `{field: {"order": ..}}` objects
/// - `skip` and `limit` become `from` and `size` (`limit` capped at [`MAX_LIMIT`])
pub fn build_search_body(
    query: &SearchQuery,
    index: &str,
    converter: &QueryConverter,
) -> Result<Value, QueryConversionError> {
    let mut body = Map::new();

    body.insert("query".to_string(), converter.convert(&query.query, index)?);

    if !query.sort.is_empty() {
        body.insert("sort".to_string(), build_sort(&query.sort));
    }

    body.insert("from".to_string(), json!(query.skip.unwrap_or(0)));
    body.insert(
        "size".to_string(),
        json!(query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)),
    );

    Ok(Value::Object(body))
}

fn build_sort(sort: &[Sort]) -> Value {
    let keys: Vec<Value> = sort
        .iter()
        .map(|key| {
            let order = match key.order {
                SortOrder::Asc => "asc",
                SortOrder::Desc => "desc",
            };
            json!({ &key.field: { "order": order } })
        })
        .collect();

    Value::Array(keys)
}
