//! Source descriptors for initial vertex scans.

use std::fmt;

use serde::{Deserialize, Serialize};
use tmachine_core::{Value, VertexId};

/// Describes which vertices an initial scan produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VertexSelector {
    /// Every vertex, in storage order.
    All,
    /// The given vertices, in the given order. Unknown ids are skipped.
    Ids {
        /// The vertex ids.
        ids: Vec<VertexId>,
    },
    /// Vertices carrying the given label.
    Label {
        /// The vertex label.
        label: String,
    },
    /// Vertices whose property `key` equals `value`.
    Property {
        /// The property key.
        key: String,
        /// The expected value.
        value: Value,
    },
}

impl VertexSelector {
    /// Selects the given vertex ids.
    #[must_use]
    pub fn ids(ids: impl IntoIterator<Item = VertexId>) -> Self {
        Self::Ids { ids: ids.into_iter().collect() }
    }

    /// Selects vertices by label.
    #[must_use]
    pub fn label(label: impl Into<String>) -> Self {
        Self::Label { label: label.into() }
    }

    /// Selects vertices by property value.
    #[must_use]
    pub fn property(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Property { key: key.into(), value: value.into() }
    }
}

impl fmt::Display for VertexSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => Ok(()),
            Self::Ids { ids } => {
                for (i, id) in ids.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", id.as_u64())?;
                }
                Ok(())
            }
            Self::Label { label } => write!(f, "label={label}"),
            Self::Property { key, value } => write!(f, "{key}={value}"),
        }
    }
}
