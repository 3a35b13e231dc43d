//! Identity and source-set layout of one variant.

use crate::axis::VariantAxis;
use crate::combo::VariantCombo;
use crate::name::{capitalize, configuration_name};
use crate::variant_type::VariantType;

/// Everything needed to resolve and wire one variant.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct VariantDescriptor {
    /// Full name, e.g. `freeDebug` or `freeDebugAndroidTest`.
    pub name: String,
    /// Dash-separated name used for output directories, e.g. `free-debug`.
    pub base_name: String,
    pub variant_type: VariantType,
    pub build_type: String,
    pub flavors: Vec<VariantAxis>,
    /// Combined flavor name, empty when the variant has no flavors.
    pub flavor_name: String,
    /// Name of the variant under test, for test variants.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tested_variant: Option<String>,
}

impl VariantDescriptor {
    /// Describe the `build_type` x `combo` variant.
    pub fn new(build_type: &str, combo: &VariantCombo, variant_type: VariantType) -> Self {
        let flavor_name = combo.name();
        let mut name = if combo.is_empty() {
            build_type.to_owned()
        } else {
            format!("{flavor_name}{}", capitalize(build_type))
        };
        name.push_str(variant_type.suffix());

        let mut base_name = if combo.is_empty() {
            build_type.to_owned()
        } else {
            format!("{flavor_name}-{build_type}")
        };
        if variant_type.is_for_testing() {
            base_name.push('-');
            base_name.push_str(variant_type.prefix());
        }

        Self {
            name,
            base_name,
            variant_type,
            build_type: build_type.to_owned(),
            flavors: combo.axes.clone(),
            flavor_name,
            tested_variant: None,
        }
    }

    /// Describe a test variant of `tested`.
    pub fn test_of(tested: &Self, variant_type: VariantType) -> Self {
        let combo = VariantCombo {
            axes: tested.flavors.clone(),
        };
        let mut descriptor = Self::new(&tested.build_type, &combo, variant_type);
        descriptor.tested_variant = Some(tested.name.clone());
        descriptor
    }

    pub fn is_library(&self) -> bool {
        self.variant_type == VariantType::Library
    }

    pub fn is_for_testing(&self) -> bool {
        self.variant_type.is_for_testing()
    }

    /// The variant-specific source set: `freeDebug`, `androidTestFreeDebug`.
    pub fn source_set_name(&self) -> String {
        let stem = self
            .name
            .strip_suffix(self.variant_type.suffix())
            .unwrap_or(&self.name);
        match self.variant_type.prefix() {
            "" => stem.to_owned(),
            prefix => format!("{prefix}{}", capitalize(stem)),
        }
    }

    /// Source sets contributing configurations, highest priority first.
    ///
    /// Non-test variants: the variant source set (when flavored), the build
    /// type, the multi-flavor source set (two or more flavors), each flavor,
    /// then `main`. Test variants: the build type's test source set (unit
    /// tests only), each flavor's test source set, then the default test
    /// source set.
    pub fn source_sets(&self) -> Vec<String> {
        let mut sets = Vec::new();
        let prefix = self.variant_type.prefix();

        if !self.is_for_testing() {
            if !self.flavors.is_empty() {
                sets.push(self.name.clone());
            }
            sets.push(self.build_type.clone());
            if self.flavors.len() > 1 {
                sets.push(self.flavor_name.clone());
            }
            sets.extend(self.flavors.iter().map(|f| f.name.clone()));
            sets.push("main".to_owned());
            return sets;
        }

        if self.variant_type == VariantType::UnitTest {
            sets.push(format!("{prefix}{}", capitalize(&self.build_type)));
        }
        sets.extend(
            self.flavors
                .iter()
                .map(|f| format!("{prefix}{}", capitalize(&f.name))),
        );
        sets.push(prefix.to_owned());
        sets
    }

    /// Configurations resolved for compilation: each source set's
    /// `Compile` and `Provided` configurations.
    pub fn compile_configurations(&self) -> Vec<String> {
        self.role_configurations(&["Compile", "Provided"])
    }

    /// Configurations resolved for packaging: each source set's
    /// `Compile` and `Apk` configurations.
    pub fn package_configurations(&self) -> Vec<String> {
        self.role_configurations(&["Compile", "Apk"])
    }

    fn role_configurations(&self, roles: &[&str]) -> Vec<String> {
        let mut names = Vec::new();
        for source_set in self.source_sets() {
            for role in roles {
                names.push(configuration_name(&source_set, role));
            }
        }
        names
    }
}
