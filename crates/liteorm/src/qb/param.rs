//! Positional parameter collection.

use crate::value::StorageValue;

/// Parameters bound to `?N` placeholders, in placeholder order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamList {
    params: Vec<StorageValue>,
}

impl ParamList {
    /// Create a new empty parameter list.
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Add a parameter and return its 1-based index.
    pub fn push(&mut self, value: StorageValue) -> usize {
        self.params.push(value);
        self.params.len()
    }

    /// Add a parameter and return its `?N` placeholder.
    pub fn placeholder(&mut self, value: StorageValue) -> String {
        format!("?{}", self.push(value))
    }

    /// Get the current parameter count.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn as_slice(&self) -> &[StorageValue] {
        &self.params
    }

    pub fn into_vec(self) -> Vec<StorageValue> {
        self.params
    }
}
