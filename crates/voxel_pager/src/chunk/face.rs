//! Block faces and the pluggable face-culling policy.

use crate::block::{Block, BlockShape};

/// One of the six axis-aligned faces of a block cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl Face {
    /// All faces, in the same order as [`Location::neighbors`](crate::Location::neighbors).
    pub const ALL: [Face; 6] = [
        Face::PosX,
        Face::NegX,
        Face::PosY,
        Face::NegY,
        Face::PosZ,
        Face::NegZ,
    ];

    /// Offset to the cell across this face.
    pub const fn offset(&self) -> [i32; 3] {
        match self {
            Face::PosX => [1, 0, 0],
            Face::NegX => [-1, 0, 0],
            Face::PosY => [0, 1, 0],
            Face::NegY => [0, -1, 0],
            Face::PosZ => [0, 0, 1],
            Face::NegZ => [0, 0, -1],
        }
    }
}

/// Decides whether a block face next to `neighbor` should be drawn.
///
/// Must be a pure function of its inputs; it is called from mesh workers.
pub trait FaceVisibility: Send + Sync {
    fn is_visible(&self, block: &Block, neighbor: Option<&Block>) -> bool;
}

impl<F> FaceVisibility for F
where
    F: Fn(&Block, Option<&Block>) -> bool + Send + Sync,
{
    fn is_visible(&self, block: &Block, neighbor: Option<&Block>) -> bool {
        self(block, neighbor)
    }
}

/// Standard culling table.
///
/// A face is visible when any of these hold:
/// - there is no neighbor
/// - the neighbor is transparent and the block is not
/// - both blocks are foliage
/// - the neighbor's shape does not cover a full cell
#[derive(Clone, Debug)]
pub struct DefaultFaceVisibility {
    full_cube_shapes: Vec<BlockShape>,
}

impl DefaultFaceVisibility {
    pub fn new() -> Self {
        Self { full_cube_shapes: vec![BlockShape::Cube] }
    }

    /// Treat additional shapes as full cubes, e.g. a custom cube variant.
    pub fn with_full_cube_shapes(shapes: impl IntoIterator<Item = BlockShape>) -> Self {
        Self { full_cube_shapes: shapes.into_iter().collect() }
    }

    pub fn is_full_cube(&self, shape: BlockShape) -> bool {
        self.full_cube_shapes.contains(&shape)
    }
}

impl Default for DefaultFaceVisibility {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceVisibility for DefaultFaceVisibility {
    fn is_visible(&self, block: &Block, neighbor: Option<&Block>) -> bool {
        let Some(neighbor) = neighbor else {
            return true;
        };
        (neighbor.is_transparent() && !block.is_transparent())
            || (block.kind().is_foliage() && neighbor.kind().is_foliage())
            || !self.is_full_cube(neighbor.shape())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockDef, BlockKind};

    fn stone() -> Block {
        Block::new(BlockDef::solid("stone"))
    }

    fn glass() -> Block {
        Block::new(BlockDef::transparent("glass", BlockKind::Glass))
    }

    fn leaves() -> Block {
        Block::new(BlockDef::transparent("leaves", BlockKind::Leaves))
    }

    #[test]
    fn visible_without_neighbor() {
        let rule = DefaultFaceVisibility::new();
        assert!(rule.is_visible(&stone(), None));
        assert!(rule.is_visible(&glass(), None));
    }

    #[test]
    fn opaque_next_to_transparent() {
        let rule = DefaultFaceVisibility::new();
        assert!(rule.is_visible(&stone(), Some(&glass())));
        // Transparent next to transparent full cube is culled.
        assert!(!rule.is_visible(&glass(), Some(&glass())));
    }

    #[test]
    fn foliage_pairs_are_drawn() {
        let rule = DefaultFaceVisibility::new();
        assert!(rule.is_visible(&leaves(), Some(&leaves())));
    }

    #[test]
    fn non_cube_neighbor() {
        let rule = DefaultFaceVisibility::new();
        let slab = Block::new(BlockDef::solid("slab").with_shape(BlockShape::Slab));
        assert!(rule.is_visible(&stone(), Some(&slab)));
        assert!(rule.is_visible(&glass(), Some(&slab)));
    }

    #[test]
    fn opaque_cubes_cull() {
        let rule = DefaultFaceVisibility::new();
        assert!(!rule.is_visible(&stone(), Some(&stone())));
    }

    #[test]
    fn configurable_full_cube_set() {
        let rule = DefaultFaceVisibility::with_full_cube_shapes([BlockShape::Cube, BlockShape::Custom(7)]);
        let custom = Block::new(BlockDef::solid("ore").with_shape(BlockShape::Custom(7)));
        assert!(!rule.is_visible(&stone(), Some(&custom)));
    }

    #[test]
    fn closures_are_policies() {
        let always = |_: &Block, _: Option<&Block>| true;
        assert!(always.is_visible(&stone(), Some(&stone())));
    }

    #[test]
    fn face_offsets() {
        let offsets: Vec<[i32; 3]> = Face::ALL.iter().map(|face| face.offset()).collect();
        let neighbors: Vec<[i32; 3]> = crate::Location::ZERO
            .neighbors()
            .iter()
            .map(|n| [n.x, n.y, n.z])
            .collect();
        assert_eq!(offsets, neighbors);
    }
}
