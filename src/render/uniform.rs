use anyhow::Result;

use crate::backend::{ProgramDescriptor, UniformKind, UniformValue};
use crate::error::Error;

/// Bytes reserved for the uniform block of every program. All programs share one bind group
/// layout, so every block is bound with this size.
pub const UNIFORM_BLOCK_SIZE: u64 = 1024;

#[derive(Clone, Debug, PartialEq)]
pub struct UniformField {
    /// The name nodes look the uniform up by, e.g. `u_material.ambient`.
    pub name: String,
    /// The member name inside the generated WGSL struct, e.g. `u_material_ambient`.
    pub member_name: String,
    pub kind: UniformKind,
    pub wgsl_type: &'static str,
    pub offset: usize,
}

/// Offsets of every named uniform of a program inside its block, following the WGSL uniform
/// address space layout rules.
#[derive(Clone, Debug, PartialEq)]
pub struct UniformLayout {
    pub fields: Vec<UniformField>,
    pub size: usize,
}

impl UniformLayout {
    pub fn from_descriptor(descriptor: &ProgramDescriptor) -> Result<Self> {
        let mut fields = Vec::with_capacity(descriptor.uniforms.len());
        let mut end = 0;

        for (name, kind) in descriptor.uniforms.iter() {
            let offset = align_to(end, alignment_of(*kind));
            end = offset + size_of(*kind);

            fields.push(UniformField {
                name: name.clone(),
                member_name: name.replace('.', "_"),
                kind: *kind,
                wgsl_type: wgsl_type_of(*kind),
                offset,
            });
        }

        // a struct is as large as a multiple of its widest member alignment
        let size = align_to(end.max(1), 16);

        if size as u64 > UNIFORM_BLOCK_SIZE {
            return Err(Error::new(format!(
                "The uniforms of program {} need {size} bytes, only {UNIFORM_BLOCK_SIZE} are available",
                descriptor.name
            ))
            .into());
        }

        Ok(Self { fields, size })
    }

    pub fn slot(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }
}

/// CPU copy of a program's uniform block. Values persist between draws until overwritten.
pub struct UniformBlock {
    pub layout: UniformLayout,
    data: Vec<u8>,
}

impl UniformBlock {
    pub fn new(layout: UniformLayout) -> Self {
        Self {
            data: vec![0; layout.size],
            layout,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn write(&mut self, slot: usize, value: UniformValue) {
        let field = match self.layout.fields.get(slot) {
            Some(field) => field,
            None => return,
        };

        if field.kind != value.kind() {
            log::warn!(
                "Ignoring {:?} written to {:?} uniform {}",
                value.kind(),
                field.kind,
                field.name
            );
            return;
        }

        let offset = field.offset;

        match value {
            UniformValue::Int(value) => self.put(offset, bytemuck::bytes_of(&value)),
            UniformValue::Float(value) => self.put(offset, bytemuck::bytes_of(&value)),
            UniformValue::Vec3(value) => self.put(offset, bytemuck::cast_slice(&value)),
            UniformValue::Vec4(value) => self.put(offset, bytemuck::cast_slice(&value)),
            UniformValue::Mat3(columns) => {
                // every column occupies a full vec4 slot
                for (index, column) in columns.iter().enumerate() {
                    self.put(offset + index * 16, bytemuck::cast_slice(column));
                }
            }
            UniformValue::Mat4(columns) => self.put(offset, bytemuck::cast_slice(&columns)),
        }
    }

    fn put(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

pub fn align_to(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

fn alignment_of(kind: UniformKind) -> usize {
    match kind {
        UniformKind::Int | UniformKind::Float => 4,
        UniformKind::Vec3 | UniformKind::Vec4 | UniformKind::Mat3 | UniformKind::Mat4 => 16,
    }
}

fn size_of(kind: UniformKind) -> usize {
    match kind {
        UniformKind::Int | UniformKind::Float => 4,
        UniformKind::Vec3 => 12,
        UniformKind::Vec4 => 16,
        UniformKind::Mat3 => 48,
        UniformKind::Mat4 => 64,
    }
}

fn wgsl_type_of(kind: UniformKind) -> &'static str {
    match kind {
        UniformKind::Int => "i32",
        UniformKind::Float => "f32",
        UniformKind::Vec3 => "vec3<f32>",
        UniformKind::Vec4 => "vec4<f32>",
        UniformKind::Mat3 => "mat3x3<f32>",
        UniformKind::Mat4 => "mat4x4<f32>",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset_of(layout: &UniformLayout, name: &str) -> usize {
        layout.fields[layout.slot(name).unwrap()].offset
    }

    #[test]
    fn scalars_pack_behind_vec3() {
        let descriptor = ProgramDescriptor::new("TEST", "a", "b")
            .with_uniform("u_lightPos", UniformKind::Vec3)
            .with_uniform("u_spotLight.angle", UniformKind::Float)
            .with_uniform("u_spotLight.cutoff", UniformKind::Float)
            .with_uniform("u_normalMatrix", UniformKind::Mat3);
        let layout = UniformLayout::from_descriptor(&descriptor).unwrap();

        assert_eq!(offset_of(&layout, "u_lightPos"), 0);
        assert_eq!(offset_of(&layout, "u_spotLight.angle"), 12);
        assert_eq!(offset_of(&layout, "u_spotLight.cutoff"), 16);
        assert_eq!(offset_of(&layout, "u_normalMatrix"), 32);
        assert_eq!(layout.size, 80);
        assert_eq!(layout.fields[1].member_name, "u_spotLight_angle");
    }

    #[test]
    fn stock_programs_fit_in_a_block() {
        for descriptor in [
            ProgramDescriptor::phong(),
            ProgramDescriptor::single(),
            ProgramDescriptor::depth(),
        ] {
            let layout = UniformLayout::from_descriptor(&descriptor).unwrap();
            assert!(layout.size as u64 <= UNIFORM_BLOCK_SIZE);
            assert_eq!(layout.size % 16, 0);
        }
    }

    #[test]
    fn matrix3_columns_are_padded() {
        let descriptor =
            ProgramDescriptor::new("TEST", "a", "b").with_uniform("u_normalMatrix", UniformKind::Mat3);
        let mut block = UniformBlock::new(UniformLayout::from_descriptor(&descriptor).unwrap());

        block.write(
            0,
            UniformValue::Mat3([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]),
        );

        let floats: Vec<f32> = block
            .data()
            .chunks_exact(4)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        assert_eq!(&floats[0..3], &[1.0, 2.0, 3.0]);
        assert_eq!(&floats[4..7], &[4.0, 5.0, 6.0]);
        assert_eq!(&floats[8..11], &[7.0, 8.0, 9.0]);
    }

    #[test]
    fn mismatched_writes_leave_the_block_untouched() {
        let descriptor =
            ProgramDescriptor::new("TEST", "a", "b").with_uniform("u_alpha", UniformKind::Float);
        let mut block = UniformBlock::new(UniformLayout::from_descriptor(&descriptor).unwrap());

        block.write(0, UniformValue::Int(7));
        block.write(4, UniformValue::Float(1.0));

        assert!(block.data().iter().all(|byte| *byte == 0));
    }

    #[test]
    fn oversized_programs_are_rejected() {
        let mut descriptor = ProgramDescriptor::new("HUGE", "a", "b");
        for index in 0..20 {
            descriptor = descriptor.with_uniform(&format!("u_matrix{index}"), UniformKind::Mat4);
        }

        assert!(UniformLayout::from_descriptor(&descriptor).is_err());
    }
}
