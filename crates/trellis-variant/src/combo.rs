//! Cartesian product of flavor dimensions.

use std::fmt;

use crate::axis::VariantAxis;
use crate::error::VariantError;
use crate::name::{capitalize, decapitalize};

/// An ordered selection of one axis per flavor dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VariantCombo {
    pub axes: Vec<VariantAxis>,
}

impl VariantCombo {
    /// Combined flavor name: `free` + `Arm` = `freeArm`. Empty for no axes.
    pub fn name(&self) -> String {
        let mut name = String::new();
        for (i, axis) in self.axes.iter().enumerate() {
            if i == 0 {
                name.push_str(&decapitalize(&axis.name));
            } else {
                name.push_str(&capitalize(&axis.name));
            }
        }
        name
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }
}

impl fmt::Display for VariantCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Enumerate every combination of `axes` across `dimensions`.
///
/// Without dimensions each axis is its own combination, in input order.
/// With dimensions the product is taken depth first: the first dimension
/// varies slowest, and values within a dimension keep their input order.
///
/// # Errors
/// Returns `VariantError::MissingDimension` when dimensions are declared and
/// an axis has none, `UnknownDimension` when an axis names an undeclared
/// dimension, and `EmptyDimension` when a dimension has no axes.
pub fn create_combinations(
    dimensions: &[String],
    axes: &[VariantAxis],
) -> Result<Vec<VariantCombo>, VariantError> {
    if dimensions.is_empty() {
        return Ok(axes
            .iter()
            .map(|axis| VariantCombo {
                axes: vec![axis.clone()],
            })
            .collect());
    }

    let mut groups: Vec<Vec<&VariantAxis>> = vec![Vec::new(); dimensions.len()];
    for axis in axes {
        let Some(dimension) = &axis.dimension else {
            return Err(VariantError::MissingDimension {
                axis: axis.name.clone(),
            });
        };
        let Some(group) = dimensions
            .iter()
            .position(|d| d == dimension)
            .and_then(|i| groups.get_mut(i))
        else {
            return Err(VariantError::UnknownDimension {
                axis: axis.name.clone(),
                dimension: dimension.clone(),
            });
        };
        group.push(axis);
    }

    for (dimension, group) in dimensions.iter().zip(&groups) {
        if group.is_empty() {
            return Err(VariantError::EmptyDimension {
                dimension: dimension.clone(),
            });
        }
    }

    let mut combos = Vec::new();
    let mut current = Vec::with_capacity(dimensions.len());
    product(&groups, &mut current, &mut combos);
    Ok(combos)
}

fn product(groups: &[Vec<&VariantAxis>], current: &mut Vec<VariantAxis>, out: &mut Vec<VariantCombo>) {
    let Some((first, rest)) = groups.split_first() else {
        out.push(VariantCombo {
            axes: current.clone(),
        });
        return;
    };
    for axis in first {
        current.push((*axis).clone());
        product(rest, current, out);
        current.pop();
    }
}
