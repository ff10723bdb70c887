// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// A stable unique identifier for one element of the test hierarchy.
///
/// Unique IDs are produced by discovery and are opaque to the runner: they are only compared and
/// reported.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueId(SmolStr);

impl UniqueId {
    /// Creates a new unique ID.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(SmolStr::new(id))
    }

    /// Returns the ID as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UniqueId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for UniqueId {
    fn from(s: String) -> Self {
        Self(SmolStr::from(s))
    }
}

/// A level of the test hierarchy.
///
/// Ordered from the outermost level to the innermost one.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScopeLevel {
    /// A test assembly: the outermost unit of a run.
    Assembly,
    /// A test collection within an assembly.
    Collection,
    /// A test class within a collection.
    Class,
    /// A test method within a class.
    Method,
    /// A test case: one parameterization of a test method.
    TestCase,
    /// A single test.
    Test,
}

impl ScopeLevel {
    /// Returns a human-readable name for this level.
    pub fn to_static_str(self) -> &'static str {
        match self {
            Self::Assembly => "assembly",
            Self::Collection => "collection",
            Self::Class => "class",
            Self::Method => "method",
            Self::TestCase => "test case",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_static_str())
    }
}

/// The chain of unique IDs identifying an element of the test hierarchy.
///
/// Every event carries the full chain that applies to it, so that listeners can correlate events
/// without tracking any state themselves. Levels below the element being described are `None`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IdentityChain {
    /// The assembly ID. Always present.
    pub assembly: UniqueId,

    /// The collection ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<UniqueId>,

    /// The class ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<UniqueId>,

    /// The method ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<UniqueId>,

    /// The test case ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_case: Option<UniqueId>,

    /// The test ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<UniqueId>,
}

impl IdentityChain {
    /// Creates a chain that identifies an assembly.
    pub fn for_assembly(assembly: impl Into<UniqueId>) -> Self {
        Self {
            assembly: assembly.into(),
            collection: None,
            class: None,
            method: None,
            test_case: None,
            test: None,
        }
    }

    /// Returns a copy of this chain extended with a collection ID.
    pub fn with_collection(mut self, collection: impl Into<UniqueId>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Returns a copy of this chain extended with a class ID.
    pub fn with_class(mut self, class: impl Into<UniqueId>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Returns a copy of this chain extended with a method ID.
    pub fn with_method(mut self, method: impl Into<UniqueId>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Returns a copy of this chain extended with a test case ID.
    pub fn with_test_case(mut self, test_case: impl Into<UniqueId>) -> Self {
        self.test_case = Some(test_case.into());
        self
    }

    /// Returns a copy of this chain extended with a test ID.
    pub fn with_test(mut self, test: impl Into<UniqueId>) -> Self {
        self.test = Some(test.into());
        self
    }

    /// Returns the deepest level populated in this chain.
    pub fn level(&self) -> ScopeLevel {
        if self.test.is_some() {
            ScopeLevel::Test
        } else if self.test_case.is_some() {
            ScopeLevel::TestCase
        } else if self.method.is_some() {
            ScopeLevel::Method
        } else if self.class.is_some() {
            ScopeLevel::Class
        } else if self.collection.is_some() {
            ScopeLevel::Collection
        } else {
            ScopeLevel::Assembly
        }
    }

    /// Returns the ID at the deepest populated level.
    pub fn leaf_id(&self) -> &UniqueId {
        self.test
            .as_ref()
            .or(self.test_case.as_ref())
            .or(self.method.as_ref())
            .or(self.class.as_ref())
            .or(self.collection.as_ref())
            .unwrap_or(&self.assembly)
    }

    /// Returns a copy of this chain truncated to the given level.
    ///
    /// Levels deeper than `level` are cleared.
    pub fn truncate(&self, level: ScopeLevel) -> Self {
        let keep = |at: ScopeLevel, id: &Option<UniqueId>| {
            if at <= level { id.clone() } else { None }
        };
        Self {
            assembly: self.assembly.clone(),
            collection: keep(ScopeLevel::Collection, &self.collection),
            class: keep(ScopeLevel::Class, &self.class),
            method: keep(ScopeLevel::Method, &self.method),
            test_case: keep(ScopeLevel::TestCase, &self.test_case),
            test: keep(ScopeLevel::Test, &self.test),
        }
    }

    /// Returns the chain of the test case this element belongs to.
    ///
    /// A test whose chain has no test case ID forms a test case of its own, identified by the
    /// test's ID.
    pub fn test_case_chain(&self) -> Self {
        let mut chain = self.truncate(ScopeLevel::TestCase);
        if chain.test_case.is_none() {
            chain.test_case = self.test.clone();
        }
        chain
    }
}

impl fmt::Display for IdentityChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.assembly)?;
        for id in [
            &self.collection,
            &self.class,
            &self.method,
            &self.test_case,
            &self.test,
        ]
        .into_iter()
        .flatten()
        {
            write!(f, "/{id}")?;
        }
        Ok(())
    }
}
