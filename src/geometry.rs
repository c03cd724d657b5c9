use crate::backend::VertexAttribute;

/// Parallel per-vertex arrays plus an optional triangle index list.
///
/// An empty `indices` list means the vertices are drawn in order, three per triangle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub texture_coordinates: Vec<[f32; 2]>,
    pub colors: Option<Vec<[f32; 4]>>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }

    /// Number of elements a draw call of this geometry covers.
    pub fn element_count(&self) -> usize {
        match self.is_indexed() {
            true => self.index_count(),
            false => self.vertex_count(),
        }
    }

    pub fn has_attribute(&self, attribute: VertexAttribute) -> bool {
        match attribute {
            VertexAttribute::Position => !self.positions.is_empty(),
            VertexAttribute::Normal => self.normals.len() == self.positions.len(),
            VertexAttribute::TextureCoordinate => {
                self.texture_coordinates.len() == self.positions.len()
            }
            VertexAttribute::Color => match &self.colors {
                Some(colors) => colors.len() == self.positions.len(),
                None => false,
            },
        }
    }

    pub fn with_colors(mut self, colors: Vec<[f32; 4]>) -> Self {
        self.colors = Some(colors);
        self
    }
}

/// An axis aligned cube centred on the origin with the given edge length.
pub fn make_cube(size: f32) -> Geometry {
    let s = size / 2.0;

    // (normal, tangent u, tangent v) for each face
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];

    let mut geometry = Geometry::default();

    for (normal, u, v) in faces.iter() {
        let base = geometry.positions.len() as u32;

        for (corner_u, corner_v, tex) in [
            (-1.0, -1.0, [0.0, 0.0]),
            (1.0, -1.0, [1.0, 0.0]),
            (1.0, 1.0, [1.0, 1.0]),
            (-1.0, 1.0, [0.0, 1.0]),
        ] {
            let position = [
                s * (normal[0] + corner_u * u[0] + corner_v * v[0]),
                s * (normal[1] + corner_u * u[1] + corner_v * v[1]),
                s * (normal[2] + corner_u * u[2] + corner_v * v[2]),
            ];
            geometry.positions.push(position);
            geometry.normals.push(*normal);
            geometry.texture_coordinates.push(tex);
        }

        geometry
            .indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    geometry
}

/// A rectangle in the XY plane facing +Z, spanning `[-width, width] x [-height, height]`.
pub fn make_rect(width: f32, height: f32) -> Geometry {
    Geometry {
        positions: vec![
            [-width, -height, 0.0],
            [width, -height, 0.0],
            [width, height, 0.0],
            [-width, height, 0.0],
        ],
        normals: vec![[0.0, 0.0, 1.0]; 4],
        texture_coordinates: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
        colors: None,
        indices: vec![0, 1, 2, 2, 3, 0],
    }
}

pub fn make_sphere(radius: f32, latitude_bands: u32, longitude_bands: u32) -> Geometry {
    let latitude_bands = latitude_bands.max(2);
    let longitude_bands = longitude_bands.max(3);

    let mut geometry = Geometry::default();

    for latitude in 0..=latitude_bands {
        let theta = latitude as f32 * std::f32::consts::PI / latitude_bands as f32;
        let (sin_theta, cos_theta) = theta.sin_cos();

        for longitude in 0..=longitude_bands {
            let phi = longitude as f32 * 2.0 * std::f32::consts::PI / longitude_bands as f32;
            let (sin_phi, cos_phi) = phi.sin_cos();

            let normal = [cos_phi * sin_theta, cos_theta, sin_phi * sin_theta];

            geometry
                .positions
                .push([radius * normal[0], radius * normal[1], radius * normal[2]]);
            geometry.normals.push(normal);
            geometry.texture_coordinates.push([
                1.0 - longitude as f32 / longitude_bands as f32,
                1.0 - latitude as f32 / latitude_bands as f32,
            ]);
        }
    }

    for latitude in 0..latitude_bands {
        for longitude in 0..longitude_bands {
            let first = latitude * (longitude_bands + 1) + longitude;
            let second = first + longitude_bands + 1;

            geometry
                .indices
                .extend_from_slice(&[first, first + 1, second, second, first + 1, second + 1]);
        }
    }

    geometry
}

/// An open cylinder around the Z axis, from `z = 0` to `z = length`, closed with two caps.
pub fn make_cylinder(radius: f32, length: f32, segments: u32) -> Geometry {
    let segments = segments.max(3);
    let mut geometry = Geometry::default();

    for segment in 0..=segments {
        let angle = segment as f32 * 2.0 * std::f32::consts::PI / segments as f32;
        let (sin, cos) = angle.sin_cos();
        let u = segment as f32 / segments as f32;

        for (z, v) in [(0.0, 0.0), (length, 1.0)] {
            geometry.positions.push([radius * cos, radius * sin, z]);
            geometry.normals.push([cos, sin, 0.0]);
            geometry.texture_coordinates.push([u, v]);
        }
    }

    for segment in 0..segments {
        let bottom = segment * 2;
        geometry.indices.extend_from_slice(&[
            bottom,
            bottom + 2,
            bottom + 1,
            bottom + 1,
            bottom + 2,
            bottom + 3,
        ]);
    }

    for (z, normal_z) in [(0.0, -1.0), (length, 1.0)] {
        let center = geometry.positions.len() as u32;
        geometry.positions.push([0.0, 0.0, z]);
        geometry.normals.push([0.0, 0.0, normal_z]);
        geometry.texture_coordinates.push([0.5, 0.5]);

        for segment in 0..=segments {
            let angle = segment as f32 * 2.0 * std::f32::consts::PI / segments as f32;
            let (sin, cos) = angle.sin_cos();
            geometry.positions.push([radius * cos, radius * sin, z]);
            geometry.normals.push([0.0, 0.0, normal_z]);
            geometry
                .texture_coordinates
                .push([0.5 + 0.5 * cos, 0.5 + 0.5 * sin]);
        }

        for segment in 0..segments {
            let rim = center + 1 + segment;
            match normal_z > 0.0 {
                true => geometry.indices.extend_from_slice(&[center, rim, rim + 1]),
                false => geometry.indices.extend_from_slice(&[center, rim + 1, rim]),
            }
        }
    }

    geometry
}
