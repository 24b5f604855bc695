//! Compiles abstract queries into OpenSearch query DSL.
//!
//! Conversion is a chain of [`ConvertHandler`]s, one per query node kind. The
//! converter asks each handler in registration order and uses the first one
//! that accepts the node. A node no handler accepts fails the whole
//! conversion; clauses are never dropped.

mod handlers;

use serde_json::Value;
use tracing::debug;

use crate::errors::QueryConversionError;
use catalog_indexer_shared::AbstractQuery;

pub use handlers::{
    BoolHandler, IdsHandler, MatchAllHandler, RangeHandler, TermHandler, TermsHandler,
    TextHandler,
};

/// Outcome of offering a node to a handler: `None` if the handler does not
/// handle this node kind.
pub type ConvertResult = Option<Result<Value, QueryConversionError>>;

/// Converts one query node kind.
///
/// Handlers of compound nodes use the `converter` to compile their children,
/// so children go through the full chain again.
pub trait ConvertHandler: Send + Sync {
    fn try_convert(&self, query: &AbstractQuery, index: &str, converter: &QueryConverter)
        -> ConvertResult;
}

/// Ordered registry of handlers.
pub struct QueryConverter {
    handlers: Vec<Box<dyn ConvertHandler>>,
}

impl QueryConverter {
    /// A converter without handlers. Every conversion fails until handlers
    /// are registered.
    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a handler after the existing ones.
    pub fn with_handler(mut self, handler: impl ConvertHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Convert a query node for the given index.
    pub fn convert(&self, query: &AbstractQuery, index: &str) -> Result<Value, QueryConversionError> {
        for handler in &self.handlers {
            if let Some(result) = handler.try_convert(query, index, self) {
                return result;
            }
        }

        debug!(kind = query.kind(), "No handler for query node");
        Err(QueryConversionError::unsupported(query.kind()))
    }

    /// Convert every node of a list, failing on the first error.
    pub fn convert_all(
        &self,
        queries: &[AbstractQuery],
        index: &str,
    ) -> Result<Vec<Value>, QueryConversionError> {
        queries.iter().map(|query| self.convert(query, index)).collect()
    }
}

impl Default for QueryConverter {
    /// A converter that handles every node kind of [`AbstractQuery`].
    fn default() -> Self {
        Self::empty()
            .with_handler(TermHandler)
            .with_handler(TermsHandler)
            .with_handler(TextHandler)
            .with_handler(IdsHandler)
            .with_handler(RangeHandler)
            .with_handler(BoolHandler)
            .with_handler(MatchAllHandler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_indexer_shared::RangeQuery;
    use serde_json::json;

    #[test]
    fn test_unhandled_kind_fails() {
        let converter = QueryConverter::empty().with_handler(TermHandler);
        let query = AbstractQuery::Range(RangeQuery {
            field: "duration".to_string(),
            gte: Some(60.into()),
            ..Default::default()
        });

        assert_eq!(
            converter.convert(&query, "catalog"),
            Err(QueryConversionError::UnsupportedQuery("range".to_string()))
        );
    }

    #[test]
    fn test_unhandled_child_fails_whole_query() {
        // The bool handler is present but one child kind is not.
        let converter = QueryConverter::empty()
            .with_handler(BoolHandler)
            .with_handler(TermHandler);
        let query = AbstractQuery::and(vec![
            AbstractQuery::term("channel", "ARD"),
            AbstractQuery::MatchAll {},
        ]);

        assert!(matches!(
            converter.convert(&query, "catalog"),
            Err(QueryConversionError::UnsupportedQuery(kind)) if kind == "matchAll"
        ));
    }

    #[test]
    fn test_first_matching_handler_wins() {
        struct Shadow;
        impl ConvertHandler for Shadow {
            fn try_convert(&self, query: &AbstractQuery, _: &str, _: &QueryConverter) -> ConvertResult {
                matches!(query, AbstractQuery::Term { .. }).then(|| Ok(json!({ "shadow": true })))
            }
        }

        let converter = QueryConverter::empty()
            .with_handler(Shadow)
            .with_handler(TermHandler);

        let result = converter
            .convert(&AbstractQuery::term("channel", "ARD"), "catalog")
            .unwrap();
        assert_eq!(result, json!({ "shadow": true }));
    }

    #[test]
    fn test_default_converter_handles_nested_query() {
        let converter = QueryConverter::default();
        let query = AbstractQuery::and(vec![
            AbstractQuery::term("channel", "ARD"),
            AbstractQuery::not(AbstractQuery::term("topic", "Sport")),
            AbstractQuery::or(vec![
                AbstractQuery::term("title", "a"),
                AbstractQuery::term("title", "b"),
            ]),
        ]);

        let result = converter.convert(&query, "catalog").unwrap();
        let must = result["bool"]["must"].as_array().unwrap();
        assert_eq!(must.len(), 3);
        assert_eq!(must[0], json!({ "term": { "channel": "ARD" } }));
        assert_eq!(
            must[1]["bool"]["must_not"][0],
            json!({ "term": { "topic": "Sport" } })
        );
        assert_eq!(must[2]["bool"]["should"].as_array().unwrap().len(), 2);
    }
}
