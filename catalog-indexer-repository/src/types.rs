//! Request types for store operations.

/// A single operation of a [`StoreTransaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOp {
    /// Move the value of `from` to `to`, replacing `to`. `from` must exist.
    Rename { from: String, to: String },
    /// Delete a key. Deleting a missing key is not an error.
    Delete { key: String },
}

/// An ordered list of key operations executed all-or-nothing.
///
/// ```ignore
/// let tx = StoreTransaction::new()
///     .rename(&keys.staged_entries, &keys.current_entries)
///     .delete(&keys.added_entries);
/// store.exec(tx).await?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreTransaction {
    ops: Vec<TransactionOp>,
}

impl StoreTransaction {
    /// Create an empty transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rename.
    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.ops.push(TransactionOp::Rename {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// Append a delete.
    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.ops.push(TransactionOp::Delete { key: key.into() });
        self
    }

    /// The queued operations, in execution order.
    pub fn ops(&self) -> &[TransactionOp] {
        &self.ops
    }

    /// Whether no operation is queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
