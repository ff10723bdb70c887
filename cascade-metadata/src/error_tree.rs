// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// The broad reason a test failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCause {
    /// An error was returned.
    Error,

    /// A panic was caught.
    Panic,

    /// The test did not finish within its timeout.
    Timeout,

    /// A policy turned an otherwise non-failing result into a failure.
    Other,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Panic => f.write_str("panic"),
            Self::Timeout => f.write_str("timeout"),
            Self::Other => f.write_str("other"),
        }
    }
}

/// A flattened tree of errors, as reported for a failed test.
///
/// The tree is stored as parallel lists in depth-first pre-order. Each entry records the index of
/// its parent, with [`ErrorMetadata::ROOT_PARENT`] (`-1`) for top-level entries. A reporter can
/// rebuild the tree from the parent indices alone.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ErrorMetadata {
    /// The broad reason for the failure.
    pub cause: FailureCause,

    /// The type name of each error.
    pub types: Vec<String>,

    /// The message of each error.
    pub messages: Vec<String>,

    /// The stack trace of each error, if one was captured.
    pub stack_traces: Vec<Option<String>>,

    /// The parent index of each error.
    pub parent_indices: Vec<i32>,
}

impl ErrorMetadata {
    /// The parent index recorded for top-level errors.
    pub const ROOT_PARENT: i32 = -1;

    /// Creates an empty tree.
    pub fn new(cause: FailureCause) -> Self {
        Self {
            cause,
            types: Vec::new(),
            messages: Vec::new(),
            stack_traces: Vec::new(),
            parent_indices: Vec::new(),
        }
    }

    /// Creates a tree containing a single top-level error.
    pub fn single(
        cause: FailureCause,
        type_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut metadata = Self::new(cause);
        metadata.push(None, type_name, message, None);
        metadata
    }

    /// Appends an error, returning its index.
    ///
    /// `parent` must be the index of an entry that was already pushed.
    pub fn push(
        &mut self,
        parent: Option<usize>,
        type_name: impl Into<String>,
        message: impl Into<String>,
        stack_trace: Option<String>,
    ) -> usize {
        let parent_index = match parent {
            Some(parent) => {
                assert!(
                    parent < self.len(),
                    "parent index {parent} out of range (len: {})",
                    self.len()
                );
                parent as i32
            }
            None => Self::ROOT_PARENT,
        };

        self.types.push(type_name.into());
        self.messages.push(message.into());
        self.stack_traces.push(stack_trace);
        self.parent_indices.push(parent_index);
        self.len() - 1
    }

    /// Returns the number of errors in the tree.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if the tree has no errors.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterates over the entries in the tree, in depth-first pre-order.
    pub fn entries(&self) -> impl Iterator<Item = ErrorEntry<'_>> + '_ {
        (0..self.len()).map(move |index| self.entry(index))
    }

    /// Returns the entry at the given index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn entry(&self, index: usize) -> ErrorEntry<'_> {
        ErrorEntry {
            index,
            type_name: &self.types[index],
            message: &self.messages[index],
            stack_trace: self.stack_traces[index].as_deref(),
            parent: usize::try_from(self.parent_indices[index]).ok(),
        }
    }

    /// Returns the indices of the direct children of `index`.
    pub fn children_of(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.parent_indices
            .iter()
            .enumerate()
            .filter(move |(_, parent)| usize::try_from(**parent).ok() == Some(index))
            .map(|(child, _)| child)
    }
}

/// One error within an [`ErrorMetadata`] tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ErrorEntry<'a> {
    /// The index of this entry.
    pub index: usize,

    /// The type name of the error.
    pub type_name: &'a str,

    /// The error message.
    pub message: &'a str,

    /// The stack trace, if one was captured.
    pub stack_trace: Option<&'a str>,

    /// The index of the parent entry, or `None` for top-level entries.
    pub parent: Option<usize>,
}
