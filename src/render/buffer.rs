use wgpu::util::DeviceExt;

use crate::backend::VertexAttribute;
use crate::geometry::Geometry;

const DEFAULT_NORMAL: [f32; 3] = [0.0, 0.0, 1.0];
const DEFAULT_TEXTURE_COORDINATE: [f32; 2] = [0.0, 0.0];
const DEFAULT_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

pub struct VertexBuffer {
    pub gpu_buffer: wgpu::Buffer,
    pub attribute: VertexAttribute,
}

pub struct IndexBuffer {
    pub gpu_buffer: wgpu::Buffer,
    pub type_: wgpu::IndexFormat,
}

/// GPU copy of a [`Geometry`]. Every attribute gets a buffer; attributes the geometry lacks are
/// filled with a constant so any program can draw it.
pub struct GeometryBuffers {
    pub vertex_buffers: Vec<VertexBuffer>,
    pub index_buffer: Option<IndexBuffer>,
    pub count: u32,
}

impl GeometryBuffers {
    pub fn from_geometry(geometry: &Geometry, name: &str, device: &wgpu::Device) -> Self {
        let vertex_count = geometry.vertex_count();

        let vertex_buffers = VertexAttribute::ALL
            .iter()
            .map(|attribute| {
                let contents: Vec<u8> = match attribute {
                    VertexAttribute::Position => {
                        bytemuck::cast_slice(&geometry.positions).to_vec()
                    }
                    VertexAttribute::Normal => match geometry.has_attribute(*attribute) {
                        true => bytemuck::cast_slice(&geometry.normals).to_vec(),
                        false => bytemuck::cast_slice(&vec![DEFAULT_NORMAL; vertex_count]).to_vec(),
                    },
                    VertexAttribute::TextureCoordinate => match geometry.has_attribute(*attribute)
                    {
                        true => bytemuck::cast_slice(&geometry.texture_coordinates).to_vec(),
                        false => {
                            bytemuck::cast_slice(&vec![DEFAULT_TEXTURE_COORDINATE; vertex_count])
                                .to_vec()
                        }
                    },
                    VertexAttribute::Color => match &geometry.colors {
                        Some(colors) if geometry.has_attribute(*attribute) => {
                            bytemuck::cast_slice(colors).to_vec()
                        }
                        _ => bytemuck::cast_slice(&vec![DEFAULT_COLOR; vertex_count]).to_vec(),
                    },
                };

                VertexBuffer {
                    gpu_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!(
                            "{name}_{}_VERTEX_BUFFER",
                            attribute.name().to_uppercase()
                        )),
                        contents: &contents,
                        usage: wgpu::BufferUsages::VERTEX,
                    }),
                    attribute: *attribute,
                }
            })
            .collect();

        let index_buffer = match geometry.is_indexed() {
            true => Some(IndexBuffer {
                gpu_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{name}_INDEX_BUFFER")),
                    contents: bytemuck::cast_slice(&geometry.indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
                type_: wgpu::IndexFormat::Uint32,
            }),
            false => None,
        };

        Self {
            vertex_buffers,
            index_buffer,
            count: geometry.element_count() as u32,
        }
    }

    pub fn vertex_buffer(&self, attribute: VertexAttribute) -> Option<&VertexBuffer> {
        self.vertex_buffers
            .iter()
            .find(|vertex_buffer| vertex_buffer.attribute == attribute)
    }
}
