//! The kind of output a variant produces.

use std::fmt;

/// What a variant builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantType {
    /// An installable application package.
    Application,
    /// A library bundle.
    Library,
    /// An instrumented test package for a tested variant.
    InstrumentedTest,
    /// A unit test run for a tested variant.
    UnitTest,
}

impl VariantType {
    /// Prefix of this type's source-set names.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Application | Self::Library => "",
            Self::InstrumentedTest => "androidTest",
            Self::UnitTest => "test",
        }
    }

    /// Suffix appended to the variant name.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Application | Self::Library => "",
            Self::InstrumentedTest => "AndroidTest",
            Self::UnitTest => "UnitTest",
        }
    }

    pub fn is_for_testing(self) -> bool {
        matches!(self, Self::InstrumentedTest | Self::UnitTest)
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Application => "application",
            Self::Library => "library",
            Self::InstrumentedTest => "instrumented-test",
            Self::UnitTest => "unit-test",
        };
        f.write_str(label)
    }
}
