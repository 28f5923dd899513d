//! Scene node types

use std::sync::Arc;

use crate::tiles::geometry::TilePatch;
use crate::tiles::texture::Material;

/// Stable handle to a scene node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneNodeId(pub u64);

/// What a scene node contributes to rendering.
#[derive(Clone)]
pub enum NodeContent {
    /// Organizational node with no geometry of its own.
    Group,
    /// A renderable curved surface with its material.
    Surface {
        patch: Arc<TilePatch>,
        material: Material,
    },
}

/// One node of the scene graph.
pub struct SceneNode {
    pub id: SceneNodeId,
    pub name: String,
    pub parent: Option<SceneNodeId>,
    pub children: Vec<SceneNodeId>,
    pub visible: bool,
    pub content: NodeContent,
}

impl SceneNode {
    pub fn new(id: SceneNodeId, name: impl Into<String>, content: NodeContent) -> Self {
        Self {
            id,
            name: name.into(),
            parent: None,
            children: Vec::new(),
            visible: true,
            content,
        }
    }
}
