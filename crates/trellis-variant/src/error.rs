//! Error types for trellis-variant.

/// Invalid build-dimension declarations. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariantError {
    /// Dimensions are declared but an axis does not name one.
    #[error("flavor `{axis}` has no flavor dimension")]
    MissingDimension { axis: String },

    /// An axis names a dimension that is not in the declared order.
    #[error("flavor `{axis}` has unknown dimension `{dimension}`")]
    UnknownDimension { axis: String, dimension: String },

    /// A declared dimension has no axis values.
    #[error("no flavor is associated with flavor dimension `{dimension}`: dimension has no values")]
    EmptyDimension { dimension: String },

    /// A build type or flavor name is reserved.
    #[error("{kind} names cannot {reason}: `{name}`")]
    ReservedName {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },

    /// A name is declared twice, or as both a build type and a flavor.
    #[error("`{name}` is declared more than once across build types and flavors")]
    NameCollision { name: String },

    /// The configured test build type is not a declared build type.
    #[error("test build type `{name}` does not exist")]
    UnknownTestBuildType { name: String },

    /// No build type was declared.
    #[error("at least one build type is required")]
    NoBuildTypes,
}
