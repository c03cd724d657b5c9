use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::error::Error;
use crate::geometry::Geometry;

/// A glTF file whose meshes can be read into [`Geometry`].
pub struct GltfModel {
    gltf: gltf::Gltf,
    root: PathBuf,
    buffer_registry: HashMap<usize, Vec<u8>>,
}

impl GltfModel {
    pub fn open(path: &Path) -> Result<Self> {
        let absolute_path = path.canonicalize()?;

        if !absolute_path.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("The given path is not a file: {}", path.display()),
            )
            .into());
        }

        let root = match absolute_path.parent() {
            Some(root) => root.to_path_buf(),
            None => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!(
                        "Unable to find the parent directory of the given path: {}",
                        path.display()
                    ),
                )
                .into())
            }
        };

        log::debug!("Opening model {}", absolute_path.display());

        Ok(Self {
            gltf: gltf::Gltf::open(&absolute_path)?,
            root,
            buffer_registry: HashMap::new(),
        })
    }

    /// Reads every triangle primitive of the first mesh into a single geometry.
    pub fn load_first_mesh(&mut self) -> Result<Geometry> {
        let mesh_index = match self.gltf.meshes().next() {
            Some(mesh) => mesh.index(),
            None => return Err(Error::new(String::from("The model contains no mesh.")).into()),
        };

        self.load_mesh(mesh_index)
    }

    pub fn load_mesh(&mut self, mesh_index: usize) -> Result<Geometry> {
        let primitive_indices: Vec<usize> = match self.gltf.meshes().nth(mesh_index) {
            Some(mesh) => mesh
                .primitives()
                .filter(|primitive| primitive.mode() == gltf::mesh::Mode::Triangles)
                .map(|primitive| primitive.index())
                .collect(),
            None => {
                return Err(
                    Error::new(format!("The given mesh ID is invalid: {mesh_index}")).into(),
                )
            }
        };

        let mut geometry = Geometry::default();

        for primitive_index in primitive_indices {
            let part = self.load_primitive(mesh_index, primitive_index)?;
            append_geometry(&mut geometry, part);
        }

        log::debug!(
            "Loaded mesh {mesh_index}: {} vertices, {} indices",
            geometry.vertex_count(),
            geometry.index_count()
        );

        Ok(geometry)
    }

    fn load_primitive(&mut self, mesh_index: usize, primitive_index: usize) -> Result<Geometry> {
        let accessors = self.primitive_accessors(mesh_index, primitive_index)?;

        for accessor_id in [
            Some(accessors.position),
            accessors.normal,
            accessors.texture_coordinate,
            accessors.indices,
        ]
        .into_iter()
        .flatten()
        {
            self.load_accessor_buffer(accessor_id)?;
        }

        let positions: Vec<[f32; 3]> = self.read_accessor(accessors.position)?;
        let normals: Vec<[f32; 3]> = match accessors.normal {
            Some(accessor_id) => self.read_accessor(accessor_id)?,
            None => vec![],
        };
        let texture_coordinates: Vec<[f32; 2]> = match accessors.texture_coordinate {
            Some(accessor_id) => self.read_accessor(accessor_id)?,
            None => vec![],
        };
        let indices = match accessors.indices {
            Some(accessor_id) => self.read_indices(accessor_id)?,
            None => (0..positions.len() as u32).collect(),
        };

        Ok(Geometry {
            positions,
            normals,
            texture_coordinates,
            colors: None,
            indices,
        })
    }

    fn primitive_accessors(
        &self,
        mesh_index: usize,
        primitive_index: usize,
    ) -> Result<PrimitiveAccessors> {
        let primitive = match self
            .gltf
            .meshes()
            .nth(mesh_index)
            .and_then(|mesh| mesh.primitives().nth(primitive_index))
        {
            Some(primitive) => primitive,
            None => {
                return Err(Error::new(format!(
                    "No primitive {primitive_index} exists in mesh {mesh_index}"
                ))
                .into())
            }
        };

        let position = match primitive.get(&gltf::Semantic::Positions) {
            Some(accessor) => accessor.index(),
            None => {
                return Err(Error::new(format!(
                    "Primitive {primitive_index} of mesh {mesh_index} has no positions"
                ))
                .into())
            }
        };

        Ok(PrimitiveAccessors {
            position,
            normal: primitive
                .get(&gltf::Semantic::Normals)
                .map(|accessor| accessor.index()),
            texture_coordinate: primitive
                .get(&gltf::Semantic::TexCoords(0))
                .map(|accessor| accessor.index()),
            indices: primitive.indices().map(|accessor| accessor.index()),
        })
    }

    fn accessor(&self, accessor_id: usize) -> Result<gltf::Accessor> {
        match self.gltf.accessors().nth(accessor_id) {
            Some(accessor) => Ok(accessor),
            None => {
                Err(Error::new(format!("The given accessor ID is invalid: {accessor_id}")).into())
            }
        }
    }

    fn load_accessor_buffer(&mut self, accessor_id: usize) -> Result<()> {
        let buffer = match self.accessor(accessor_id)?.view() {
            Some(view) => view.buffer(),
            None => {
                return Err(Error::new(format!(
                    "The specified accessor has no buffer view: {accessor_id}"
                ))
                .into())
            }
        };

        let buffer_id = buffer.index();
        if self.buffer_registry.contains_key(&buffer_id) {
            return Ok(());
        }

        let data = match buffer.source() {
            gltf::buffer::Source::Uri(uri) => std::fs::read(self.root.join(uri))?,
            gltf::buffer::Source::Bin => match &self.gltf.blob {
                Some(blob) => blob.clone(),
                None => {
                    return Err(Error::new(String::from(
                        "The model refers to a binary chunk it does not contain.",
                    ))
                    .into())
                }
            },
        };

        self.buffer_registry.insert(buffer_id, data);

        Ok(())
    }

    fn read_accessor<T: bytemuck::Pod>(&self, accessor_id: usize) -> Result<Vec<T>> {
        let accessor = self.accessor(accessor_id)?;
        let element_size = std::mem::size_of::<T>();

        if accessor.size() != element_size {
            return Err(Error::new(format!(
                "Accessor {accessor_id} holds {} byte elements, expected {element_size}",
                accessor.size()
            ))
            .into());
        }

        let view = match accessor.view() {
            Some(view) => view,
            None => {
                return Err(Error::new(format!(
                    "The specified accessor has no buffer view: {accessor_id}"
                ))
                .into())
            }
        };

        let data = match self.buffer_registry.get(&view.buffer().index()) {
            Some(data) => data,
            None => {
                return Err(Error::new(format!(
                    "The buffer of accessor {accessor_id} is not loaded"
                ))
                .into())
            }
        };

        let stride = view.stride().unwrap_or(element_size);
        let start = view.offset() + accessor.offset();

        (0..accessor.count())
            .map(|element| -> Result<T> {
                let offset = start + element * stride;
                match data.get(offset..offset + element_size) {
                    Some(bytes) => Ok(bytemuck::pod_read_unaligned(bytes)),
                    None => Err(Error::new(format!(
                        "Accessor {accessor_id} reads past the end of its buffer"
                    ))
                    .into()),
                }
            })
            .collect()
    }

    fn read_indices(&self, accessor_id: usize) -> Result<Vec<u32>> {
        match self.accessor(accessor_id)?.data_type() {
            gltf::accessor::DataType::U8 => Ok(self
                .read_accessor::<u8>(accessor_id)?
                .into_iter()
                .map(u32::from)
                .collect()),
            gltf::accessor::DataType::U16 => Ok(self
                .read_accessor::<u16>(accessor_id)?
                .into_iter()
                .map(u32::from)
                .collect()),
            gltf::accessor::DataType::U32 => self.read_accessor::<u32>(accessor_id),
            data_type => Err(Error::new(format!(
                "Indices of type {data_type:?} are not supported"
            ))
            .into()),
        }
    }
}

struct PrimitiveAccessors {
    position: usize,
    normal: Option<usize>,
    texture_coordinate: Option<usize>,
    indices: Option<usize>,
}

fn append_geometry(geometry: &mut Geometry, part: Geometry) {
    let base = geometry.vertex_count() as u32;
    let complete = |existing: usize, added: usize| existing == base as usize && added > 0;

    // attributes are kept only if every part provides them
    let keep_normals = complete(geometry.normals.len(), part.normals.len());
    let keep_texture_coordinates = complete(
        geometry.texture_coordinates.len(),
        part.texture_coordinates.len(),
    );

    geometry.positions.extend(part.positions);
    match keep_normals {
        true => geometry.normals.extend(part.normals),
        false => geometry.normals.clear(),
    }
    match keep_texture_coordinates {
        true => geometry.texture_coordinates.extend(part.texture_coordinates),
        false => geometry.texture_coordinates.clear(),
    }
    geometry
        .indices
        .extend(part.indices.into_iter().map(|index| index + base));
}

/// Scales and moves `geometry` so that it is `height` tall, centred on the Y axis and standing on
/// `y = 0`.
pub fn fit_to_height(geometry: &mut Geometry, height: f32) {
    if geometry.positions.is_empty() {
        return;
    }

    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for position in geometry.positions.iter() {
        for axis in 0..3 {
            min[axis] = min[axis].min(position[axis]);
            max[axis] = max[axis].max(position[axis]);
        }
    }

    let extent = max[1] - min[1];
    let scale = match extent > f32::EPSILON {
        true => height / extent,
        false => 1.0,
    };
    let center_x = (min[0] + max[0]) / 2.0;
    let center_z = (min[2] + max[2]) / 2.0;

    for position in geometry.positions.iter_mut() {
        *position = [
            (position[0] - center_x) * scale,
            (position[1] - min[1]) * scale,
            (position[2] - center_z) * scale,
        ];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{make_cube, make_rect};

    #[test]
    fn appended_parts_keep_their_own_vertices() {
        let mut geometry = Geometry::default();
        append_geometry(&mut geometry, make_rect(1.0, 1.0));
        append_geometry(&mut geometry, make_rect(1.0, 1.0));

        assert_eq!(geometry.vertex_count(), 8);
        assert_eq!(&geometry.indices[6..], &[4, 5, 6, 6, 7, 4]);
        assert_eq!(geometry.normals.len(), 8);
    }

    #[test]
    fn parts_without_normals_drop_them_for_the_whole_mesh() {
        let mut geometry = Geometry::default();
        append_geometry(&mut geometry, make_rect(1.0, 1.0));

        let mut bare = make_rect(1.0, 1.0);
        bare.normals.clear();
        append_geometry(&mut geometry, bare);

        assert!(geometry.normals.is_empty());
        assert_eq!(geometry.texture_coordinates.len(), 8);
    }

    #[test]
    fn fitted_models_stand_on_the_ground() {
        let mut cube = make_cube(4.0);
        fit_to_height(&mut cube, 1.0);

        let lowest = cube
            .positions
            .iter()
            .map(|position| position[1])
            .fold(f32::MAX, f32::min);
        let highest = cube
            .positions
            .iter()
            .map(|position| position[1])
            .fold(f32::MIN, f32::max);

        assert!(lowest.abs() < 1e-6);
        assert!((highest - 1.0).abs() < 1e-6);
    }

    #[test]
    fn missing_files_are_reported() {
        assert!(GltfModel::open(Path::new("does/not/exist.gltf")).is_err());
    }
}
