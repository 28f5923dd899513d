//! Tile quadtree and LOD selection
//!
//! Owns every piece of cross-cutting state in the tile system: the node
//! map, the texture cache, the load scheduler, and the scene subtree the
//! host renders. `update` runs once per frame on the cooperative thread;
//! fetch completions are applied there and nowhere else, so none of the
//! shared structures need locking.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use glam::Vec3;

use crate::core::camera::Camera;
use crate::scene::{NodeContent, SceneGraph, SceneNodeId, Viewport};
use crate::tiles::cache::TextureCache;
use crate::tiles::config::TileConfig;
use crate::tiles::coord::TileCoord;
use crate::tiles::geometry::{TilePatch, build_globe, build_patch};
use crate::tiles::loader::{HttpFetcher, LoadRequest, TextureLoader, TileFetcher};
use crate::tiles::lod::{is_back_facing, projected_size_px, should_subdivide};
use crate::tiles::texture::{Material, TileTexture};

/// Fetch and bind state of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    /// No request outstanding; eligible for enqueue.
    Idle,
    /// Fetch dispatched, result pending.
    Requested,
    /// Imagery bound to the material.
    Loaded,
}

/// One quadtree cell and its render payload.
pub struct TileNode {
    pub coord: TileCoord,
    /// Bounds midpoint on the sphere, scene units.
    pub center: Vec3,
    /// Surface arc across the tile, scene units.
    pub arc_length: f32,
    pub patch: Arc<TilePatch>,
    pub material: Material,
    pub state: TileState,
    /// Key of the parent cell; `None` for root tiles.
    pub parent: Option<TileCoord>,
    /// Either no children or all four, created and destroyed as a unit.
    pub children: Option<[TileCoord; 4]>,
    scene_node: Option<SceneNodeId>,
}

impl TileNode {
    /// Whether the tile's mesh is currently in the scene.
    pub fn is_attached(&self) -> bool {
        self.scene_node.is_some()
    }
}

/// Streams and selects planetary surface tiles.
///
/// Root tiles are created eagerly at `min_level`; everything deeper is
/// created when the LOD selector subdivides and destroyed when it
/// collapses. A whole-sphere placeholder mesh stands in until the first
/// tile texture arrives.
pub struct TileManager {
    config: TileConfig,
    nodes: HashMap<TileCoord, TileNode>,
    roots: Vec<TileCoord>,
    cache: TextureCache,
    loader: TextureLoader,
    scene: SceneGraph,
    tiles_group: SceneNodeId,
    placeholder: Option<SceneNodeId>,
    any_loaded: bool,
    disposed: bool,
}

impl TileManager {
    /// Manager fetching tiles over HTTP.
    pub fn new(config: TileConfig) -> Self {
        Self::with_fetcher(config, Arc::new(HttpFetcher::new()))
    }

    /// Manager with a custom tile source.
    pub fn with_fetcher(config: TileConfig, fetcher: Arc<dyn TileFetcher>) -> Self {
        let config = config.sanitized();
        let loader = TextureLoader::new(
            fetcher,
            config.max_concurrent_fetches,
            config.radius,
            config.fetch_timeout,
        );
        Self::assemble(config, loader)
    }

    fn assemble(config: TileConfig, loader: TextureLoader) -> Self {
        let mut scene = SceneGraph::new();
        let tiles_group = scene.add_child(scene.root(), "tiles", NodeContent::Group);
        let globe = Arc::new(build_globe(config.segments, config.radius));
        let placeholder = scene.add_child(
            scene.root(),
            "globe_placeholder",
            NodeContent::Surface {
                patch: globe,
                material: Material::untextured(0, config.anisotropy),
            },
        );
        let roots = TileCoord::level_grid(config.min_level);

        let mut manager = Self {
            nodes: HashMap::with_capacity(roots.len()),
            roots: roots.clone(),
            cache: TextureCache::new(config.cache_capacity),
            loader,
            scene,
            tiles_group,
            placeholder: Some(placeholder),
            any_loaded: false,
            disposed: false,
            config,
        };
        for coord in roots {
            manager.create_tile(coord, None);
        }
        log::info!(
            "tile manager initialized with {} root tiles at level {}",
            manager.roots.len(),
            manager.config.min_level
        );
        manager
    }

    /// Per-frame tile selection and streaming step.
    ///
    /// Never fails: fetch errors are absorbed and logged, and missing
    /// imagery degrades to coarser or placeholder detail.
    pub fn update(&mut self, camera: &Camera, viewport: &Viewport) {
        if self.disposed {
            return;
        }

        self.apply_completions();

        let mut retained = HashSet::new();
        let roots = self.roots.clone();
        for root in roots {
            self.select(root, camera, viewport, &mut retained);
        }
        self.sweep(&retained);

        self.loader
            .reprioritize(camera.position, camera.forward());
        for coord in self.loader.drain() {
            if let Some(node) = self.nodes.get_mut(&coord) {
                node.state = TileState::Requested;
            }
        }
    }

    /// Attach point for the host scene.
    pub fn renderable_root(&self) -> SceneNodeId {
        self.scene.root()
    }

    /// Scene subtree owned by the manager.
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn config(&self) -> &TileConfig {
        &self.config
    }

    pub fn cache(&self) -> &TextureCache {
        &self.cache
    }

    pub fn loader(&self) -> &TextureLoader {
        &self.loader
    }

    pub fn node(&self, coord: TileCoord) -> Option<&TileNode> {
        self.nodes.get(&coord)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn roots(&self) -> &[TileCoord] {
        &self.roots
    }

    /// Whether the fallback globe is still in the scene.
    pub fn placeholder_attached(&self) -> bool {
        self.placeholder.is_some()
    }

    /// Release every tile, cached texture, and the placeholder mesh.
    /// Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        self.loader.clear_queue();
        let coords: Vec<TileCoord> = self.nodes.keys().copied().collect();
        for coord in coords {
            if let Some(mut node) = self.nodes.remove(&coord) {
                if let Some(id) = node.scene_node.take() {
                    self.scene.remove(id);
                }
            }
        }
        self.roots.clear();
        self.cache.clear();
        if let Some(id) = self.placeholder.take() {
            self.scene.remove(id);
        }
        log::debug!("tile manager disposed");
    }

    // --- Per-frame selection ---

    fn select(
        &mut self,
        coord: TileCoord,
        camera: &Camera,
        viewport: &Viewport,
        retained: &mut HashSet<TileCoord>,
    ) {
        let (center, arc_length, level, has_children, state) = {
            let Some(node) = self.nodes.get(&coord) else {
                return;
            };
            (
                node.center,
                node.arc_length,
                node.coord.level,
                node.children.is_some(),
                node.state,
            )
        };
        retained.insert(coord);

        // Back-facing tiles leave the scene and stop the descent here;
        // their children fall out of the retained set and get reaped.
        if is_back_facing(center, camera.position) {
            self.detach(coord);
            return;
        }

        // A failed fetch left the tile idle; this traversal still wants
        // it, so ask again.
        if state == TileState::Idle {
            self.request_texture(coord);
        }

        let distance = camera.position.distance(center);
        let px = projected_size_px(arc_length, distance, viewport.height as f32, camera.fov_y);

        if should_subdivide(px, level, self.config.max_level) {
            let children = match self.nodes.get(&coord).and_then(|n| n.children) {
                Some(children) => children,
                None => self.subdivide(coord),
            };
            for child in children {
                self.select(child, camera, viewport, retained);
            }
            // Bridge the gap: the parent keeps rendering until all four
            // children carry their own imagery.
            let all_loaded = children.iter().all(|c| {
                self.nodes
                    .get(c)
                    .is_some_and(|n| n.state == TileState::Loaded)
            });
            if all_loaded {
                self.detach(coord);
            } else {
                self.attach(coord);
            }
        } else {
            if has_children {
                self.collapse(coord);
            }
            self.attach(coord);
        }
    }

    /// Create all four children of a tile.
    fn subdivide(&mut self, coord: TileCoord) -> [TileCoord; 4] {
        let children = coord.children();
        log::debug!("subdividing tile {:?}", coord);
        for child in children {
            self.create_tile(child, Some(coord));
        }
        if let Some(node) = self.nodes.get_mut(&coord) {
            node.children = Some(children);
        }
        children
    }

    /// Destroy a tile's subtree; the tile itself survives as a leaf.
    fn collapse(&mut self, coord: TileCoord) {
        let Some(children) = self.nodes.get_mut(&coord).and_then(|n| n.children.take()) else {
            return;
        };
        log::debug!("collapsing tile {:?}", coord);
        for child in children {
            self.destroy_subtree(child);
        }
    }

    /// Drop tracked tiles that fell out of the retained set, whole
    /// sibling groups at a time so the 0-or-4 child invariant holds.
    fn sweep(&mut self, retained: &HashSet<TileCoord>) {
        // Topmost dropped nodes: not retained themselves, parent still
        // retained. Destroying those subtrees covers every descendant.
        let doomed: Vec<TileCoord> = self
            .nodes
            .values()
            .filter(|n| !retained.contains(&n.coord))
            .filter(|n| n.parent.is_none_or(|p| retained.contains(&p)))
            .map(|n| n.coord)
            .collect();
        for coord in doomed {
            if let Some(parent) = self.nodes.get(&coord).and_then(|n| n.parent) {
                if let Some(parent_node) = self.nodes.get_mut(&parent) {
                    parent_node.children = None;
                }
            }
            self.destroy_subtree(coord);
        }
    }

    /// Remove a tile and its descendants: detach meshes, abandon queued
    /// fetches, drop the nodes. In-flight fetches finish on their own
    /// and at most warm the cache.
    fn destroy_subtree(&mut self, coord: TileCoord) {
        let Some(mut node) = self.nodes.remove(&coord) else {
            return;
        };
        if let Some(id) = node.scene_node.take() {
            self.scene.remove(id);
        }
        self.loader.cancel(coord);
        if let Some(children) = node.children {
            for child in children {
                self.destroy_subtree(child);
            }
        }
    }

    // --- Tile lifecycle ---

    /// Create a tile node, attach its mesh, and request its texture.
    fn create_tile(&mut self, coord: TileCoord, parent: Option<TileCoord>) {
        let patch = Arc::new(build_patch(coord, self.config.segments, self.config.radius));
        let center = patch.center;
        let arc_length = self.config.radius * patch.lat_span;
        let node = TileNode {
            coord,
            center,
            arc_length,
            patch,
            material: Material::untextured(coord.level, self.config.anisotropy),
            state: TileState::Idle,
            parent,
            children: None,
            scene_node: None,
        };
        self.nodes.insert(coord, node);
        self.attach(coord);
        self.request_texture(coord);
    }

    /// Queue a texture fetch for an idle tile. Cache-resident imagery
    /// binds immediately, skipping the network round trip.
    fn request_texture(&mut self, coord: TileCoord) {
        let (state, center) = match self.nodes.get(&coord) {
            Some(node) => (node.state, node.center),
            None => return,
        };
        if state != TileState::Idle || self.loader.is_pending(coord) {
            return;
        }
        let url = coord.url(&self.config.base_url, &self.config.extension);
        if let Some(texture) = self.cache.get(&url) {
            self.bind_texture(coord, texture);
            return;
        }
        self.loader.enqueue(LoadRequest { coord, url, center });
    }

    /// Bind a texture to a tile and its scene node.
    fn bind_texture(&mut self, coord: TileCoord, texture: Arc<TileTexture>) {
        let Some(node) = self.nodes.get_mut(&coord) else {
            return;
        };
        node.material.texture = Some(texture);
        node.state = TileState::Loaded;
        if let Some(id) = node.scene_node {
            let material = node.material.clone();
            self.scene.set_surface_material(id, material);
        }
        self.first_texture_loaded();
    }

    /// Apply fetch completions on the cooperative thread.
    fn apply_completions(&mut self) {
        for outcome in self.loader.poll() {
            match outcome.result {
                Ok(texture) => {
                    let texture = Arc::new(texture);
                    // A completed fetch warms the cache even when its
                    // tile was collapsed in the meantime.
                    self.cache.put(outcome.url, texture.clone());
                    self.bind_texture(outcome.coord, texture);
                }
                Err(err) => {
                    log::warn!("tile {:?} fetch failed: {err}", outcome.coord);
                    if let Some(node) = self.nodes.get_mut(&outcome.coord) {
                        if node.state == TileState::Requested {
                            node.state = TileState::Idle;
                        }
                    }
                }
            }
        }
    }

    /// Swap the placeholder globe out after the first successful load.
    fn first_texture_loaded(&mut self) {
        if self.any_loaded {
            return;
        }
        self.any_loaded = true;
        if let Some(id) = self.placeholder.take() {
            self.scene.remove(id);
            log::debug!("placeholder globe discarded");
        }
    }

    fn attach(&mut self, coord: TileCoord) {
        let Some(node) = self.nodes.get_mut(&coord) else {
            return;
        };
        if node.scene_node.is_some() {
            return;
        }
        let content = NodeContent::Surface {
            patch: node.patch.clone(),
            material: node.material.clone(),
        };
        let name = format!("tile_{}_{}_{}", coord.level, coord.col, coord.row);
        let id = self.scene.add_child(self.tiles_group, name, content);
        node.scene_node = Some(id);
    }

    fn detach(&mut self, coord: TileCoord) {
        let Some(node) = self.nodes.get_mut(&coord) else {
            return;
        };
        if let Some(id) = node.scene_node.take() {
            self.scene.remove(id);
        }
    }
}
