//! Scene graph — CPU-side set of renderable nodes.
//!
//! The tile manager attaches one Surface node per visible tile under a
//! group; the host renderer calls `visible_surfaces()` each frame to
//! collect what to draw.

use std::collections::HashMap;
use std::sync::Arc;

use crate::tiles::geometry::TilePatch;
use crate::tiles::texture::Material;

use super::node::{NodeContent, SceneNode, SceneNodeId};

/// One drawable entry collected from the graph.
pub struct RenderSurface {
    pub node: SceneNodeId,
    pub patch: Arc<TilePatch>,
    pub material: Material,
}

/// CPU-side scene graph organizing renderable surfaces under a root
/// group.
pub struct SceneGraph {
    nodes: HashMap<SceneNodeId, SceneNode>,
    root: SceneNodeId,
    next_id: u64,
}

impl SceneGraph {
    /// Create a new scene graph with a root Group node.
    pub fn new() -> Self {
        let root_id = SceneNodeId(0);
        let root_node = SceneNode::new(root_id, "root", NodeContent::Group);

        let mut nodes = HashMap::new();
        nodes.insert(root_id, root_node);

        Self {
            nodes,
            root: root_id,
            next_id: 1,
        }
    }

    /// Get the root node ID.
    pub fn root(&self) -> SceneNodeId {
        self.root
    }

    /// Allocate a fresh node ID.
    fn alloc_id(&mut self) -> SceneNodeId {
        let id = SceneNodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add a child node under `parent`. Returns the new node's ID.
    pub fn add_child(
        &mut self,
        parent: SceneNodeId,
        name: impl Into<String>,
        content: NodeContent,
    ) -> SceneNodeId {
        let id = self.alloc_id();
        let mut node = SceneNode::new(id, name, content);
        node.parent = Some(parent);

        self.nodes.insert(id, node);

        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.push(id);
        }

        id
    }

    /// Remove a node and its entire subtree. Cannot remove the root.
    pub fn remove(&mut self, id: SceneNodeId) {
        if id == self.root {
            return;
        }

        // Collect subtree IDs (BFS)
        let mut to_remove = vec![id];
        let mut i = 0;
        while i < to_remove.len() {
            let current = to_remove[i];
            if let Some(node) = self.nodes.get(&current) {
                to_remove.extend_from_slice(&node.children);
            }
            i += 1;
        }

        // Detach from parent
        if let Some(node) = self.nodes.get(&id) {
            if let Some(parent_id) = node.parent {
                if let Some(parent) = self.nodes.get_mut(&parent_id) {
                    parent.children.retain(|c| *c != id);
                }
            }
        }

        for nid in to_remove {
            self.nodes.remove(&nid);
        }
    }

    /// Set the visibility of a node and its subtree.
    pub fn set_visible(&mut self, id: SceneNodeId, visible: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.visible = visible;
        }
    }

    /// Replace the material of a Surface node.
    pub fn set_surface_material(&mut self, id: SceneNodeId, material: Material) {
        if let Some(node) = self.nodes.get_mut(&id) {
            if let NodeContent::Surface {
                material: existing, ..
            } = &mut node.content
            {
                *existing = material;
            }
        }
    }

    /// Get an immutable reference to a node.
    pub fn get(&self, id: SceneNodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    /// Iterate over the children of a node.
    pub fn children(&self, id: SceneNodeId) -> impl Iterator<Item = SceneNodeId> + '_ {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .copied()
    }

    /// Total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Walk the tree and collect every visible surface.
    pub fn visible_surfaces(&self) -> Vec<RenderSurface> {
        let mut out = Vec::new();
        self.collect_visible(self.root, &mut out);
        out
    }

    fn collect_visible(&self, node_id: SceneNodeId, out: &mut Vec<RenderSurface>) {
        let node = match self.nodes.get(&node_id) {
            Some(n) => n,
            None => return,
        };

        if !node.visible {
            return;
        }

        if let NodeContent::Surface { patch, material } = &node.content {
            out.push(RenderSurface {
                node: node.id,
                patch: patch.clone(),
                material: material.clone(),
            });
        }

        for &child_id in &node.children {
            self.collect_visible(child_id, out);
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::coord::TileCoord;
    use crate::tiles::geometry::build_patch;

    fn surface() -> NodeContent {
        NodeContent::Surface {
            patch: Arc::new(build_patch(TileCoord::new(1, 0, 0), 2, 1.0)),
            material: Material::untextured(1, 8),
        }
    }

    #[test]
    fn test_new_scene_graph() {
        let graph = SceneGraph::new();
        assert_eq!(graph.node_count(), 1); // root only
        assert!(graph.get(graph.root()).is_some());
        assert_eq!(graph.get(graph.root()).unwrap().name, "root");
    }

    #[test]
    fn test_add_child() {
        let mut graph = SceneGraph::new();
        let root = graph.root();

        let child = graph.add_child(root, "tiles", NodeContent::Group);

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.get(child).unwrap().parent, Some(root));
        assert!(graph.children(root).any(|c| c == child));
    }

    #[test]
    fn test_remove_subtree() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let group = graph.add_child(root, "tiles", NodeContent::Group);
        let a = graph.add_child(group, "a", surface());
        let b = graph.add_child(group, "b", surface());

        assert_eq!(graph.node_count(), 4);

        graph.remove(group);

        assert_eq!(graph.node_count(), 1);
        assert!(graph.get(a).is_none());
        assert!(graph.get(b).is_none());
        assert_eq!(graph.children(root).count(), 0);
    }

    #[test]
    fn test_cannot_remove_root() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        graph.remove(root);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_visible_surfaces_collects_attached_tiles() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let group = graph.add_child(root, "tiles", NodeContent::Group);
        graph.add_child(group, "a", surface());
        graph.add_child(group, "b", surface());

        let surfaces = graph.visible_surfaces();
        assert_eq!(surfaces.len(), 2);
    }

    #[test]
    fn test_hidden_subtree_excluded() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let group = graph.add_child(root, "tiles", NodeContent::Group);
        graph.add_child(group, "a", surface());

        graph.set_visible(group, false);
        assert!(graph.visible_surfaces().is_empty());

        graph.set_visible(group, true);
        assert_eq!(graph.visible_surfaces().len(), 1);
    }

    #[test]
    fn test_set_surface_material() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let node = graph.add_child(root, "a", surface());

        let mut material = Material::untextured(1, 8);
        material.texture = Some(Arc::new(crate::tiles::texture::TileTexture {
            width: 1,
            height: 1,
            pixels: vec![0; 4],
        }));
        graph.set_surface_material(node, material);

        let surfaces = graph.visible_surfaces();
        assert!(surfaces[0].material.is_textured());
    }
}
