//! Immutable, interned block definitions.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Geometric shape of a block, as seen by face culling.
///
/// Geometry emission is left to the mesh generator; the core only needs
/// to know whether a shape covers a whole cell face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockShape {
    Cube,
    Slab,
    Stairs,
    Cross,
    Fence,
    Pane,
    /// Shape identifier owned by the embedding application.
    Custom(u16),
}

/// Material category of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Solid,
    Liquid,
    Glass,
    Leaves,
    Plant,
    Custom(u16),
}

impl BlockKind {
    /// Foliage blocks draw faces between each other.
    pub fn is_foliage(&self) -> bool {
        matches!(self, BlockKind::Leaves | BlockKind::Plant)
    }
}

/// Description used to create a [`Block`].
#[derive(Clone, Debug, PartialEq)]
pub struct BlockDef {
    pub name: String,
    pub shape: BlockShape,
    pub kind: BlockKind,
    pub uses_multiple_images: bool,
    pub is_transparent: bool,
    pub is_solid: bool,
}

impl BlockDef {
    /// Opaque solid full cube.
    pub fn solid(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape: BlockShape::Cube,
            kind: BlockKind::Solid,
            uses_multiple_images: false,
            is_transparent: false,
            is_solid: true,
        }
    }

    /// Transparent, non-solid full cube.
    pub fn transparent(name: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            name: name.into(),
            shape: BlockShape::Cube,
            kind,
            uses_multiple_images: false,
            is_transparent: true,
            is_solid: false,
        }
    }

    pub fn with_shape(mut self, shape: BlockShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_multiple_images(mut self) -> Self {
        self.uses_multiple_images = true;
        self
    }
}

/// Shared, read-only block value.
///
/// Cloning is a reference-count bump. Two blocks are equal when they share
/// an allocation or carry the same name.
#[derive(Clone)]
pub struct Block(Arc<BlockDef>);

impl Block {
    pub fn new(def: BlockDef) -> Self {
        Self(Arc::new(def))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn shape(&self) -> BlockShape {
        self.0.shape
    }

    pub fn kind(&self) -> BlockKind {
        self.0.kind
    }

    pub fn uses_multiple_images(&self) -> bool {
        self.0.uses_multiple_images
    }

    pub fn is_transparent(&self) -> bool {
        self.0.is_transparent
    }

    pub fn is_solid(&self) -> bool {
        self.0.is_solid
    }

    pub fn def(&self) -> &BlockDef {
        &self.0
    }

    /// Whether both handles point at the same interned definition.
    pub fn ptr_eq(&self, other: &Block) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0.name == other.0.name
    }
}

impl Eq for Block {}

impl Hash for Block {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block({})", self.0.name)
    }
}

/// Interning table: one [`Block`] per name.
#[derive(Debug, Default)]
pub struct BlockRegistry {
    blocks: HashMap<String, Block>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a definition.
    ///
    /// If a block with the same name exists it is returned unchanged and the
    /// new definition is ignored.
    pub fn register(&mut self, def: BlockDef) -> Block {
        if let Some(existing) = self.blocks.get(&def.name) {
            if existing.def() != &def {
                log::warn!("block '{}' already registered with a different definition", def.name);
            }
            return existing.clone();
        }
        let block = Block::new(def);
        self.blocks.insert(block.name().to_owned(), block.clone());
        block
    }

    pub fn get(&self, name: &str) -> Option<Block> {
        self.blocks.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_interns_by_name() {
        let mut registry = BlockRegistry::new();
        let a = registry.register(BlockDef::solid("stone"));
        let b = registry.register(BlockDef::solid("stone"));

        assert!(a.ptr_eq(&b));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("stone"), Some(a));
        assert!(registry.get("dirt").is_none());
    }

    #[test]
    fn register_keeps_first_definition() {
        let mut registry = BlockRegistry::new();
        registry.register(BlockDef::solid("glass"));
        let again = registry.register(BlockDef::transparent("glass", BlockKind::Glass));

        assert!(!again.is_transparent());
    }

    #[test]
    fn equality_by_name() {
        let a = Block::new(BlockDef::solid("stone"));
        let b = Block::new(BlockDef::solid("stone"));
        let c = Block::new(BlockDef::solid("dirt"));

        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
        assert_ne!(a, c);
    }

    #[test]
    fn def_builders() {
        let leaves = Block::new(BlockDef::transparent("leaves", BlockKind::Leaves));
        assert!(leaves.kind().is_foliage());
        assert!(!leaves.is_solid());

        let slab = Block::new(BlockDef::solid("slab").with_shape(BlockShape::Slab).with_multiple_images());
        assert_eq!(slab.shape(), BlockShape::Slab);
        assert!(slab.uses_multiple_images());
        assert!(!BlockKind::Glass.is_foliage());
    }
}
