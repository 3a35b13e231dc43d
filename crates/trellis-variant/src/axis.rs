//! A single build-dimension value.

use std::fmt;

/// One value of a build dimension: a build type or a product flavor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct VariantAxis {
    pub name: String,
    /// The flavor dimension this value belongs to. Build types have none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
}

impl VariantAxis {
    /// An axis outside any dimension.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            dimension: None,
        }
    }

    /// An axis belonging to `dimension`.
    pub fn in_dimension(name: &str, dimension: &str) -> Self {
        Self {
            name: name.to_owned(),
            dimension: Some(dimension.to_owned()),
        }
    }
}

impl fmt::Display for VariantAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
