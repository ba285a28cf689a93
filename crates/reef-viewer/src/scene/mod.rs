//! Scene graph and mesh assets.
//!
//! The graph is a flat arena: parents are indices, children lists are owned
//! by the parent, and nodes are stored in insertion order with parents
//! always preceding their children. That makes transform propagation a
//! single forward pass and keeps the structure free of reference cycles.

pub mod gltf;
pub mod obj;

use glam::Mat4;

/// Interleaved vertex layout shared by the scene and coral meshes.
/// Must match the vertex inputs in `scene.vs.wgsl` / `coral.vs.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    const ATTRS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub local: Mat4,
    pub world: Mat4,
    pub mesh: Option<usize>,
}

/// Emitted by [`Graph::walk`] in draw order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Node(usize),
    Material(usize),
    Primitive { mesh: usize, primitive: usize },
}

/// The CPU side of the scene: topology, transforms, and the material id of
/// every primitive. GPU resources live in [`Scene`] and are indexed by the
/// events this graph emits.
#[derive(Debug, Default)]
pub struct Graph {
    pub nodes: Vec<Node>,
    /// Per mesh: material id of each primitive, pre-sorted ascending so
    /// material switches are minimized within a mesh.
    pub mesh_materials: Vec<Vec<usize>>,
}

impl Graph {
    /// Appends a node; the parent must already exist.
    pub fn add_node(&mut self, parent: Option<usize>, local: Mat4, mesh: Option<usize>) -> usize {
        debug_assert!(parent.map_or(true, |p| p < self.nodes.len()));
        let index = self.nodes.len();
        if let Some(p) = parent {
            self.nodes[p].children.push(index);
        }
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            local,
            world: Mat4::IDENTITY,
            mesh,
        });
        index
    }

    /// Recomputes every world transform top-down. Insertion order guarantees
    /// a parent's world matrix is final before its children read it.
    pub fn propagate_transforms(&mut self) {
        for i in 0..self.nodes.len() {
            let parent_world = match self.nodes[i].parent {
                Some(p) => self.nodes[p].world,
                None => Mat4::IDENTITY,
            };
            self.nodes[i].world = parent_world * self.nodes[i].local;
        }
    }

    /// Depth-first traversal. `Material` events fire only when the material
    /// id differs from the previous primitive's.
    pub fn walk(&self, mut visit: impl FnMut(Visit)) {
        let mut last_material = None;
        let roots: Vec<usize> = (0..self.nodes.len())
            .filter(|&i| self.nodes[i].parent.is_none())
            .collect();
        let mut stack: Vec<usize> = roots.into_iter().rev().collect();
        while let Some(i) = stack.pop() {
            visit(Visit::Node(i));
            if let Some(mesh) = self.nodes[i].mesh {
                for (prim, &material) in self.mesh_materials[mesh].iter().enumerate() {
                    if last_material != Some(material) {
                        visit(Visit::Material(material));
                        last_material = Some(material);
                    }
                    visit(Visit::Primitive {
                        mesh,
                        primitive: prim,
                    });
                }
            }
            for &child in self.nodes[i].children.iter().rev() {
                stack.push(child);
            }
        }
    }
}

/// One drawable index range with its GPU buffers.
pub struct Primitive {
    pub vertex_buf: wgpu::Buffer,
    pub index_buf: wgpu::Buffer,
    pub index_count: u32,
    pub material: usize,
}

pub struct Mesh {
    pub primitives: Vec<Primitive>,
}

pub struct Material {
    pub base_color: [f32; 4],
    pub bind: wgpu::BindGroup,
}

/// Per mesh-node model matrix UBO.
pub struct NodeBind {
    pub ubo: wgpu::Buffer,
    pub bind: wgpu::BindGroup,
}

/// A fully uploaded scene: the graph plus every GPU resource it refers to.
pub struct Scene {
    pub graph: Graph,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    /// Parallel to `graph.nodes`; `Some` only for mesh nodes.
    pub node_binds: Vec<Option<NodeBind>>,
}

impl Scene {
    /// Empty scene; the stage still renders ocean, coral and lights.
    pub fn empty() -> Self {
        Self {
            graph: Graph::default(),
            meshes: Vec::new(),
            materials: Vec::new(),
            node_binds: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn propagation_multiplies_parent_chain() {
        let mut graph = Graph::default();
        let root = graph.add_node(None, Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)), None);
        let mid = graph.add_node(
            Some(root),
            Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)),
            None,
        );
        let leaf = graph.add_node(
            Some(mid),
            Mat4::from_translation(Vec3::new(0.0, 0.0, 3.0)),
            None,
        );
        graph.propagate_transforms();
        let p = graph.nodes[leaf].world.transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-6);
    }

    #[test]
    fn walk_is_depth_first() {
        let mut graph = Graph::default();
        let root = graph.add_node(None, Mat4::IDENTITY, None);
        let a = graph.add_node(Some(root), Mat4::IDENTITY, None);
        let a_child = graph.add_node(Some(a), Mat4::IDENTITY, None);
        let b = graph.add_node(Some(root), Mat4::IDENTITY, None);

        let mut order = Vec::new();
        graph.walk(|v| {
            if let Visit::Node(i) = v {
                order.push(i);
            }
        });
        assert_eq!(order, vec![root, a, a_child, b]);
    }

    #[test]
    fn material_fires_only_on_change() {
        let mut graph = Graph::default();
        graph.mesh_materials = vec![vec![0, 0, 1], vec![1, 2]];
        let root = graph.add_node(None, Mat4::IDENTITY, Some(0));
        graph.add_node(Some(root), Mat4::IDENTITY, Some(1));

        let mut materials = Vec::new();
        let mut primitives = 0;
        graph.walk(|v| match v {
            Visit::Material(m) => materials.push(m),
            Visit::Primitive { .. } => primitives += 1,
            Visit::Node(_) => {}
        });
        // Mesh 1 starts with material 1, already bound by mesh 0's tail.
        assert_eq!(materials, vec![0, 1, 2]);
        assert_eq!(primitives, 5);
    }
}
