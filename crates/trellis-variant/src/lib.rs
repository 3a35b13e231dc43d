#![forbid(unsafe_code)]
//! Build dimensions, variant enumeration, and variant naming for Trellis.

pub mod axis;
pub mod combo;
pub mod descriptor;
pub mod error;
pub mod name;
pub mod variant_type;

pub use axis::VariantAxis;
pub use combo::{create_combinations, VariantCombo};
pub use descriptor::VariantDescriptor;
pub use error::VariantError;
pub use variant_type::VariantType;
