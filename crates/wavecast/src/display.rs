//! Showing a [`SceneGraph`] as Bevy entities

use bevy::asset::RenderAssetUsages;
use bevy::ecs::system::SystemParam;
use bevy::mesh::{Indices, PrimitiveTopology};
use bevy::prelude::*;
use bevy::render::render_resource::Face;
use bevy::window::RequestRedraw;
use wavecast_mesh::{IndexedMesh, SceneDisplay, SceneGraph, SceneObject, SurfaceSide, Tube};

/// Background colour of the viewport
pub const CLEAR_COLOR: Color = Color::srgb_u8(0xCF, 0xCD, 0xBE);

const OUTSIDE_COLOR: Color = Color::srgb_u8(0x43, 0xAA, 0x8B);
const INSIDE_COLOR: Color = Color::srgb_u8(0x43, 0x78, 0xAB);
const TUBE_COLOR: Color = Color::srgb_u8(0xFF, 0x6F, 0x59);
const VERTEX_COLOR: Color = Color::srgb_u8(0x25, 0x44, 0x41);
const ORIGIN_COLOR: Color = Color::srgb_u8(0xFF, 0xE0, 0xBD);

/// Opacity of both surface sides
const SURFACE_ALPHA: f32 = 0.5;

/// Marks the root entity of the displayed model
#[derive(Component, Debug)]
pub struct LiveModel;

/// Which part of the model an entity draws
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelPart {
    Surface(SurfaceSide),
    Edge,
    Vertex,
    Origin,
}

/// Shared materials for every model part
#[derive(Resource, Debug, Clone)]
pub struct ModelMaterials {
    pub outside: Handle<StandardMaterial>,
    pub inside: Handle<StandardMaterial>,
    pub tube: Handle<StandardMaterial>,
    pub vertex: Handle<StandardMaterial>,
    pub origin: Handle<StandardMaterial>,
}

impl FromWorld for ModelMaterials {
    fn from_world(world: &mut World) -> Self {
        let mut materials = world.resource_mut::<Assets<StandardMaterial>>();
        Self {
            outside: materials.add(surface_material(OUTSIDE_COLOR, Face::Back)),
            inside: materials.add(surface_material(INSIDE_COLOR, Face::Front)),
            tube: materials.add(flat_material(TUBE_COLOR)),
            vertex: materials.add(flat_material(VERTEX_COLOR)),
            origin: materials.add(flat_material(ORIGIN_COLOR)),
        }
    }
}

/// Unlit translucent material showing one side of the surface.
///
/// The outside culls back faces and the inside culls front faces, so each
/// side of a closed model gets its own colour.
fn surface_material(color: Color, cull: Face) -> StandardMaterial {
    StandardMaterial {
        base_color: color.with_alpha(SURFACE_ALPHA),
        alpha_mode: AlphaMode::Blend,
        cull_mode: Some(cull),
        unlit: true,
        ..default()
    }
}

fn flat_material(color: Color) -> StandardMaterial {
    StandardMaterial {
        base_color: color,
        unlit: true,
        ..default()
    }
}

/// Bevy mesh for an indexed surface
pub fn surface_mesh(geometry: &IndexedMesh) -> Mesh {
    let indices: Vec<u32> = geometry.triangles.iter().flatten().copied().collect();

    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    )
    .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, geometry.vertices.clone())
    .with_inserted_indices(Indices::U32(indices));
    mesh.compute_normals();
    mesh
}

/// Placement of a tube's cylinder, `None` for a zero-length tube
pub fn tube_transform(tube: &Tube) -> Option<Transform> {
    let direction = Vec3::from_array(tube.direction()?);
    Some(
        Transform::from_translation(Vec3::from_array(tube.midpoint()))
            .with_rotation(Quat::from_rotation_arc(Vec3::Y, direction)),
    )
}

fn tube_mesh(tube: &Tube) -> Mesh {
    Cylinder::new(tube.radius, tube.length())
        .mesh()
        .resolution(tube.radial_segments.max(3))
        .segments(tube.tubular_segments.max(1))
        .build()
}

/// Renders scenes by spawning one root entity with a child per object.
///
/// Detaching despawns the root, which takes its children with it.
#[derive(SystemParam)]
pub struct BevyDisplay<'w, 's> {
    commands: Commands<'w, 's>,
    meshes: ResMut<'w, Assets<Mesh>>,
    materials: Res<'w, ModelMaterials>,
    redraw: MessageWriter<'w, RequestRedraw>,
}

impl BevyDisplay<'_, '_> {
    fn spawn_part(
        &mut self,
        root: Entity,
        part: ModelPart,
        mesh: Handle<Mesh>,
        material: Handle<StandardMaterial>,
        transform: Transform,
    ) {
        self.commands.spawn((
            part,
            Mesh3d(mesh),
            MeshMaterial3d(material),
            transform,
            ChildOf(root),
        ));
    }
}

impl SceneDisplay for BevyDisplay<'_, '_> {
    type Handle = Entity;

    fn attach(&mut self, scene: SceneGraph) -> Entity {
        let root = self
            .commands
            .spawn((LiveModel, Transform::default(), Visibility::default()))
            .id();

        let has_faces = scene.mesh.triangle_count() > 0;
        let surface = has_faces.then(|| self.meshes.add(surface_mesh(&scene.mesh)));
        let mut vertex_sphere = None;

        for object in &scene.root.objects {
            match object {
                SceneObject::Surface { side, .. } => {
                    let Some(mesh) = surface.clone() else {
                        continue;
                    };
                    let material = match side {
                        SurfaceSide::Outside => self.materials.outside.clone(),
                        SurfaceSide::Inside => self.materials.inside.clone(),
                    };
                    self.spawn_part(
                        root,
                        ModelPart::Surface(*side),
                        mesh,
                        material,
                        Transform::default(),
                    );
                }
                SceneObject::Tube(tube) => {
                    let Some(transform) = tube_transform(tube) else {
                        trace!("Skipping zero-length edge at {:?}", tube.start);
                        continue;
                    };
                    let mesh = self.meshes.add(tube_mesh(tube));
                    let material = self.materials.tube.clone();
                    self.spawn_part(root, ModelPart::Edge, mesh, material, transform);
                }
                SceneObject::VertexMarker { position, radius } => {
                    let mesh = vertex_sphere
                        .get_or_insert_with(|| self.meshes.add(Sphere::new(*radius)))
                        .clone();
                    let material = self.materials.vertex.clone();
                    let transform = Transform::from_translation(Vec3::from_array(*position));
                    self.spawn_part(root, ModelPart::Vertex, mesh, material, transform);
                }
                SceneObject::OriginMarker { radius } => {
                    let mesh = self.meshes.add(Sphere::new(*radius));
                    let material = self.materials.origin.clone();
                    let transform = Transform::default();
                    self.spawn_part(root, ModelPart::Origin, mesh, material, transform);
                }
            }
        }

        debug!(
            "Spawned model root {:?} with {} objects",
            root,
            scene.root.objects.len()
        );
        root
    }

    fn detach(&mut self, handle: Entity) {
        if let Ok(mut root) = self.commands.get_entity(handle) {
            root.despawn();
        }
    }

    fn request_redraw(&mut self) {
        self.redraw.write(RequestRedraw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::message::Messages;
    use bevy::ecs::system::RunSystemOnce;
    use std::sync::Arc;
    use wavecast_mesh::{build, extract_edges, SceneStyle};

    fn test_world() -> World {
        let mut world = World::new();
        world.init_resource::<Assets<Mesh>>();
        world.init_resource::<Assets<StandardMaterial>>();
        world.init_resource::<Messages<RequestRedraw>>();
        world.init_resource::<ModelMaterials>();
        world
    }

    fn triangle_scene() -> SceneGraph {
        let mesh = IndexedMesh::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![[0, 1, 2]],
        );
        let edges = extract_edges(&mesh);
        build(Arc::new(mesh), &edges, &SceneStyle::default())
    }

    fn part_count(world: &mut World) -> usize {
        world.query::<&ModelPart>().iter(world).count()
    }

    #[test]
    fn test_attach_spawns_children() {
        let mut world = test_world();
        let scene = triangle_scene();
        let expected = scene.root.objects.len();

        let root = world
            .run_system_once(move |mut display: BevyDisplay| {
                display.attach(scene.clone())
            })
            .unwrap();

        // 2 surfaces, 3 edges, 3 vertices and the origin
        assert_eq!(expected, 9);
        assert_eq!(part_count(&mut world), expected);
        let children = world.get::<Children>(root).expect("Root has children");
        assert_eq!(children.len(), expected);
        assert!(world.get::<LiveModel>(root).is_some());
    }

    #[test]
    fn test_detach_removes_everything() {
        let mut world = test_world();
        let scene = triangle_scene();

        let root = world
            .run_system_once(move |mut display: BevyDisplay| {
                display.attach(scene.clone())
            })
            .unwrap();
        world
            .run_system_once(move |mut display: BevyDisplay| display.detach(root))
            .unwrap();

        assert!(world.get_entity(root).is_err());
        assert_eq!(part_count(&mut world), 0);
    }

    #[test]
    fn test_request_redraw_writes_message() {
        let mut world = test_world();
        world
            .run_system_once(|mut display: BevyDisplay| display.request_redraw())
            .unwrap();
        assert_eq!(world.resource::<Messages<RequestRedraw>>().len(), 1);
    }

    #[test]
    fn test_surface_mesh_layout() {
        let mesh = IndexedMesh::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
            vec![[0, 1, 2], [1, 3, 2]],
        );
        let bevy_mesh = surface_mesh(&mesh);

        assert_eq!(bevy_mesh.count_vertices(), 4);
        match bevy_mesh.indices() {
            Some(Indices::U32(indices)) => assert_eq!(indices, &vec![0, 1, 2, 1, 3, 2]),
            other => panic!("Unexpected indices: {:?}", other),
        }
        assert!(bevy_mesh.attribute(Mesh::ATTRIBUTE_NORMAL).is_some());
    }

    #[test]
    fn test_tube_transform() {
        let tube = Tube {
            start: [0.0, 0.0, 0.0],
            end: [2.0, 0.0, 0.0],
            radius: 0.015,
            tubular_segments: 1,
            radial_segments: 4,
        };
        let transform = tube_transform(&tube).unwrap();
        let offset = transform.translation - Vec3::new(1.0, 0.0, 0.0);
        assert!(offset.length() < 1e-6);
        // The cylinder's axis (local Y) now points along the edge
        let axis = transform.rotation * Vec3::Y;
        assert!((axis - Vec3::X).length() < 1e-5);

        let degenerate = Tube {
            end: tube.start,
            ..tube
        };
        assert!(tube_transform(&degenerate).is_none());
    }
}
