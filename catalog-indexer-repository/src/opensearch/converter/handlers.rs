//! One handler per query node kind.

use serde_json::{json, Map, Value};

use super::{ConvertHandler, ConvertResult, QueryConverter};
use crate::errors::QueryConversionError;
use catalog_indexer_shared::query::TextOperator;
use catalog_indexer_shared::{AbstractQuery, BoolQuery, TermValue};

fn term_value(value: &TermValue) -> Value {
    match value {
        TermValue::Bool(value) => json!(value),
        TermValue::Integer(value) => json!(value),
        TermValue::Float(value) => json!(value),
        TermValue::String(value) => json!(value),
    }
}

/// `term` → `{"term": {field: value}}`
pub struct TermHandler;

impl ConvertHandler for TermHandler {
    fn try_convert(&self, query: &AbstractQuery, _index: &str, _: &QueryConverter) -> ConvertResult {
        let AbstractQuery::Term { field, value } = query else {
            return None;
        };

        Some(Ok(json!({ "term": { field: term_value(value) } })))
    }
}

/// `terms` → `{"terms": {field: [values]}}`
pub struct TermsHandler;

impl ConvertHandler for TermsHandler {
    fn try_convert(&self, query: &AbstractQuery, _index: &str, _: &QueryConverter) -> ConvertResult {
        let AbstractQuery::Terms { field, values } = query else {
            return None;
        };

        let values: Vec<Value> = values.iter().map(term_value).collect();
        Some(Ok(json!({ "terms": { field: values } })))
    }
}

/// `text` → `multi_match` over the requested fields.
pub struct TextHandler;

impl ConvertHandler for TextHandler {
    fn try_convert(&self, query: &AbstractQuery, _index: &str, _: &QueryConverter) -> ConvertResult {
        let AbstractQuery::Text {
            text,
            fields,
            operator,
        } = query
        else {
            return None;
        };

        if fields.is_empty() {
            return Some(Err(QueryConversionError::invalid(
                "text query requires at least one field",
            )));
        }

        let operator = match operator {
            TextOperator::And => "and",
            TextOperator::Or => "or",
        };

        Some(Ok(json!({
            "multi_match": {
                "query": text,
                "fields": fields,
                "operator": operator
            }
        })))
    }
}

/// `ids` → `{"ids": {"values": [...]}}`
pub struct IdsHandler;

impl ConvertHandler for IdsHandler {
    fn try_convert(&self, query: &AbstractQuery, _index: &str, _: &QueryConverter) -> ConvertResult {
        let AbstractQuery::Ids { ids } = query else {
            return None;
        };

        Some(Ok(json!({ "ids": { "values": ids } })))
    }
}

/// `range` → `{"range": {field: {gt/gte/lt/lte}}}`
pub struct RangeHandler;

impl ConvertHandler for RangeHandler {
    fn try_convert(&self, query: &AbstractQuery, _index: &str, _: &QueryConverter) -> ConvertResult {
        let AbstractQuery::Range(range) = query else {
            return None;
        };

        let mut bounds = Map::new();
        for (name, bound) in [
            ("lt", &range.lt),
            ("lte", &range.lte),
            ("gt", &range.gt),
            ("gte", &range.gte),
        ] {
            if let Some(value) = bound {
                bounds.insert(name.to_string(), term_value(value));
            }
        }

        if bounds.is_empty() {
            return Some(Err(QueryConversionError::invalid(format!(
                "range query on '{}' has no bounds",
                range.field
            ))));
        }

        Some(Ok(json!({ "range": { &range.field: bounds } })))
    }
}

/// `bool` → `bool` with every child compiled through the full chain.
pub struct BoolHandler;

impl ConvertHandler for BoolHandler {
    fn try_convert(
        &self,
        query: &AbstractQuery,
        index: &str,
        converter: &QueryConverter,
    ) -> ConvertResult {
        let AbstractQuery::Bool(bool_query) = query else {
            return None;
        };

        Some(convert_bool(bool_query, index, converter))
    }
}

fn convert_bool(
    bool_query: &BoolQuery,
    index: &str,
    converter: &QueryConverter,
) -> Result<Value, QueryConversionError> {
    let mut clauses = Map::new();

    for (name, children) in [
        ("must", &bool_query.must),
        ("should", &bool_query.should),
        ("filter", &bool_query.filter),
        ("must_not", &bool_query.must_not),
    ] {
        if !children.is_empty() {
            let converted = converter.convert_all(children, index)?;
            clauses.insert(name.to_string(), Value::Array(converted));
        }
    }

    // A disjunction must match at least one branch even next to `must`.
    if !bool_query.should.is_empty() {
        clauses.insert("minimum_should_match".to_string(), json!(1));
    }

    Ok(json!({ "bool": clauses }))
}

/// `matchAll` → `{"match_all": {}}`
pub struct MatchAllHandler;

impl ConvertHandler for MatchAllHandler {
    fn try_convert(&self, query: &AbstractQuery, _index: &str, _: &QueryConverter) -> ConvertResult {
        let AbstractQuery::MatchAll {} = query else {
            return None;
        };

        Some(Ok(json!({ "match_all": {} })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_indexer_shared::RangeQuery;

    fn convert(handler: &dyn ConvertHandler, query: &AbstractQuery) -> ConvertResult {
        handler.try_convert(query, "catalog", &QueryConverter::default())
    }

    #[test]
    fn test_term_handler() {
        let result = convert(&TermHandler, &AbstractQuery::term("duration", 60i64));
        assert_eq!(result, Some(Ok(json!({ "term": { "duration": 60 } }))));

        assert_eq!(convert(&TermHandler, &AbstractQuery::MatchAll {}), None);
    }

    #[test]
    fn test_terms_handler() {
        let query = AbstractQuery::Terms {
            field: "channel".to_string(),
            values: vec!["ARD".into(), "ZDF".into()],
        };

        assert_eq!(
            convert(&TermsHandler, &query),
            Some(Ok(json!({ "terms": { "channel": ["ARD", "ZDF"] } })))
        );
    }

    #[test]
    fn test_text_handler() {
        let query = AbstractQuery::Text {
            text: "tatort münster".to_string(),
            fields: vec!["title".to_string(), "topic".to_string()],
            operator: TextOperator::And,
        };

        let result = convert(&TextHandler, &query).unwrap().unwrap();
        assert_eq!(result["multi_match"]["query"], "tatort münster");
        assert_eq!(result["multi_match"]["operator"], "and");
        assert_eq!(result["multi_match"]["fields"], json!(["title", "topic"]));
    }

    #[test]
    fn test_text_handler_requires_fields() {
        let query = AbstractQuery::Text {
            text: "x".to_string(),
            fields: vec![],
            operator: TextOperator::Or,
        };

        assert!(matches!(
            convert(&TextHandler, &query),
            Some(Err(QueryConversionError::InvalidQuery(_)))
        ));
    }

    #[test]
    fn test_range_handler() {
        let query = AbstractQuery::Range(RangeQuery {
            field: "timestamp".to_string(),
            gte: Some(100i64.into()),
            lt: Some(200i64.into()),
            ..Default::default()
        });

        assert_eq!(
            convert(&RangeHandler, &query),
            Some(Ok(json!({ "range": { "timestamp": { "gte": 100, "lt": 200 } } })))
        );
    }

    #[test]
    fn test_range_handler_without_bounds() {
        let query = AbstractQuery::Range(RangeQuery {
            field: "timestamp".to_string(),
            ..Default::default()
        });

        assert!(matches!(
            convert(&RangeHandler, &query),
            Some(Err(QueryConversionError::InvalidQuery(_)))
        ));
    }

    #[test]
    fn test_bool_handler() {
        let query = AbstractQuery::Bool(BoolQuery {
            filter: vec![AbstractQuery::Ids {
                ids: vec!["abc".to_string()],
            }],
            should: vec![AbstractQuery::MatchAll {}],
            ..Default::default()
        });

        let result = convert(&BoolHandler, &query).unwrap().unwrap();
        assert_eq!(result["bool"]["filter"][0], json!({ "ids": { "values": ["abc"] } }));
        assert_eq!(result["bool"]["should"][0], json!({ "match_all": {} }));
        assert_eq!(result["bool"]["minimum_should_match"], 1);
        assert!(result["bool"].get("must").is_none());
    }
}
