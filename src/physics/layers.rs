//! Collision layer table
//!
//! A symmetric matrix over at most [`MAX_LAYERS`] object layers, fixed at
//! world creation and mapped onto the engine's interaction groups. Two
//! bodies collide only when the matrix allows their layer pair.

use rapier3d::prelude::{Group, InteractionGroups};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Widest supported layer count (one bit per layer in an interaction group)
pub const MAX_LAYERS: u8 = 32;

/// Symmetric collision matrix over object layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerTable {
    layer_count: u8,
    rows: [u32; MAX_LAYERS as usize],
}

impl LayerTable {
    /// Empty table: no layer collides with anything until allowed.
    pub fn new(layer_count: u8) -> EngineResult<Self> {
        if layer_count == 0 || layer_count > MAX_LAYERS {
            return Err(EngineError::EngineInitFailed {
                reason: format!(
                    "layer count {} not in 1..={}",
                    layer_count, MAX_LAYERS
                ),
            });
        }
        Ok(Self {
            layer_count,
            rows: [0; MAX_LAYERS as usize],
        })
    }

    /// Table where every layer pair collides.
    pub fn all(layer_count: u8) -> EngineResult<Self> {
        let mut table = Self::new(layer_count)?;
        let mask = if layer_count == MAX_LAYERS {
            u32::MAX
        } else {
            (1u32 << layer_count) - 1
        };
        for row in table.rows[..layer_count as usize].iter_mut() {
            *row = mask;
        }
        Ok(table)
    }

    pub fn layer_count(&self) -> u8 {
        self.layer_count
    }

    pub fn contains(&self, layer: u8) -> bool {
        layer < self.layer_count
    }

    /// Allow collisions between `a` and `b` (in both directions).
    pub fn allow(&mut self, a: u8, b: u8) {
        if self.contains(a) && self.contains(b) {
            self.rows[a as usize] |= 1 << b;
            self.rows[b as usize] |= 1 << a;
        }
    }

    /// Deny collisions between `a` and `b` (in both directions).
    pub fn deny(&mut self, a: u8, b: u8) {
        if self.contains(a) && self.contains(b) {
            self.rows[a as usize] &= !(1 << b);
            self.rows[b as usize] &= !(1 << a);
        }
    }

    pub fn collides(&self, a: u8, b: u8) -> bool {
        self.contains(a) && self.contains(b) && self.rows[a as usize] & (1 << b) != 0
    }

    /// Interaction groups for a body living on `layer`: membership is the
    /// layer bit, the filter is the layer's matrix row.
    pub(crate) fn interaction_groups(&self, layer: u8) -> InteractionGroups {
        InteractionGroups::new(
            Group::from_bits_truncate(1 << layer),
            Group::from_bits_truncate(self.rows[layer as usize]),
        )
    }
}

impl Default for LayerTable {
    fn default() -> Self {
        // Infallible: MAX_LAYERS is a valid layer count.
        Self::all(MAX_LAYERS).unwrap_or(Self {
            layer_count: MAX_LAYERS,
            rows: [u32::MAX; MAX_LAYERS as usize],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_layer_counts() {
        assert!(LayerTable::new(0).is_err());
        assert!(LayerTable::new(MAX_LAYERS + 1).is_err());
        assert!(LayerTable::new(MAX_LAYERS).is_ok());
    }

    #[test]
    fn allow_and_deny_are_symmetric() {
        let mut table = LayerTable::new(4).unwrap();
        assert!(!table.collides(1, 2));

        table.allow(1, 2);
        assert!(table.collides(1, 2));
        assert!(table.collides(2, 1));

        table.deny(2, 1);
        assert!(!table.collides(1, 2));
        assert!(!table.collides(2, 1));
    }

    #[test]
    fn all_table_allows_every_in_range_pair() {
        let table = LayerTable::all(3).unwrap();
        for a in 0..3 {
            for b in 0..3 {
                assert!(table.collides(a, b));
            }
        }
        assert!(!table.collides(0, 3));
    }

    #[test]
    fn interaction_groups_carry_membership_and_row() {
        let mut table = LayerTable::new(4).unwrap();
        table.allow(0, 2);
        let groups = table.interaction_groups(0);
        assert_eq!(groups.memberships.bits(), 1);
        assert_eq!(groups.filter.bits(), 1 << 2);
    }
}
