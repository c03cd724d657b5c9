use cgmath::{One, Rotation3, Zero};

/// Translation, rotation and scale composed as `T * R * S`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    pub translation: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: cgmath::Vector3::zero(),
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3 {
                x: 1.0,
                y: 1.0,
                z: 1.0,
            },
        }
    }
}

impl Transform {
    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        Self {
            translation: cgmath::Vector3::new(x, y, z),
            ..Default::default()
        }
    }

    pub fn with_rotation(mut self, rotation: cgmath::Quaternion<f32>) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_rotation_x(self, angle: impl Into<cgmath::Rad<f32>>) -> Self {
        self.with_rotation(cgmath::Quaternion::from_angle_x(angle.into()))
    }

    pub fn with_rotation_y(self, angle: impl Into<cgmath::Rad<f32>>) -> Self {
        self.with_rotation(cgmath::Quaternion::from_angle_y(angle.into()))
    }

    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = cgmath::Vector3::new(scale, scale, scale);
        self
    }

    pub fn matrix(&self) -> cgmath::Matrix4<f32> {
        (*self).into()
    }
}

impl From<Transform> for cgmath::Matrix4<f32> {
    fn from(value: Transform) -> Self {
        cgmath::Matrix4::from_translation(value.translation)
            * cgmath::Matrix4::from(value.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(value.scale.x, value.scale.y, value.scale.z)
    }
}
