//! The shadow mapping showcase: a model turning on a textured floor, lit by a point light that
//! circles it, with a walking character, a translucent cube, a sweeping spot light and a dim
//! directional fill light.

use std::path::Path;

use anyhow::Result;

use crate::backend::{ProgramDescriptor, RenderBackend, TextureUnit};
use crate::data::transform::Transform;
use crate::frame::FrameRenderer;
use crate::geometry::{make_cube, make_cylinder, make_rect, make_sphere, Geometry};
use crate::resource::image::{checkerboard, load_rgba};
use crate::resource::model::{fit_to_height, GltfModel};
use crate::scene::light::{DirectionalLightNode, LightColors, PointLightNode, SpotLightNode};
use crate::scene::material::{Material, MaterialNode, TransparentMaterialNode};
use crate::scene::render::RenderNode;
use crate::scene::shader::ShaderNode;
use crate::scene::shadow::ShadowNode;
use crate::scene::texture::TextureNode;
use crate::scene::transform::TransformNode;
use crate::scene::{NodeId, NodeKind, SceneNode};

pub const FLOOR_TEXTURE_UNIT: TextureUnit = TextureUnit(2);
pub const SHADOW_MAP_UNIT: TextureUnit = TextureUnit(3);

const FLOOR_HEIGHT: f32 = -1.5;
const MODEL_HEIGHT: f32 = 2.0;
const GLASS_ALPHA: f32 = 0.5;

const BODY_RADIUS: f32 = 0.3;
const LIMB_RADIUS: f32 = 0.05;
const LEG_LENGTH: f32 = 0.4;
const ARM_LENGTH: f32 = 0.35;
const HIP_HEIGHT: f32 = -0.25;
/// Height of the body centre above the floor with the legs straight down.
const BODY_HEIGHT: f32 = LEG_LENGTH - HIP_HEIGHT;
const SHOULDER_OFFSET: f32 = 0.28;
/// The character walks back and forth between `-WALK_RANGE` and `WALK_RANGE` on x.
const WALK_RANGE: f32 = 2.5;
const WALK_Z: f32 = -2.0;
/// Walking speed in units per millisecond.
const WALK_SPEED: f32 = 0.0005;
const STEP_BOB: f32 = 0.15;
const ARM_SWING: cgmath::Deg<f32> = cgmath::Deg(15.0);

/// Inputs of the demo that may come from files.
#[derive(Default)]
pub struct DemoAssets {
    pub model: Option<Geometry>,
    pub floor_texture: Option<image::RgbaImage>,
}

impl DemoAssets {
    pub fn load(model: Option<&Path>, floor_texture: Option<&Path>) -> Result<Self> {
        let model = match model {
            Some(path) => Some(GltfModel::open(path)?.load_first_mesh()?),
            None => None,
        };

        let floor_texture = match floor_texture {
            Some(path) => Some(load_rgba(path)?),
            None => None,
        };

        Ok(Self {
            model,
            floor_texture,
        })
    }
}

pub struct DemoScene {
    pub root: SceneNode,
    pub light: NodeId,
    pub shadow: NodeId,
    /// Walk translation of the character.
    pub character: NodeId,
    /// Geometry of the character's left arm, below the walk and the arm swing.
    pub left_arm: NodeId,
    rotate_light: NodeId,
    rotate_model: NodeId,
    swing_arms: NodeId,
    spot_light: NodeId,
    glass: NodeId,
}

impl DemoScene {
    /// Uploads the demo resources and assembles the graph. The light and shadow node are attached
    /// to `frame`.
    pub fn build(
        backend: &mut dyn RenderBackend,
        frame: &mut FrameRenderer,
        assets: DemoAssets,
    ) -> Result<Self> {
        let phong = backend.create_program(&ProgramDescriptor::phong())?;
        let single = backend.create_program(&ProgramDescriptor::single())?;

        let mut model = match assets.model {
            Some(model) => model,
            None => make_sphere(0.5, 32, 32),
        };
        fit_to_height(&mut model, MODEL_HEIGHT);
        let model = backend.create_geometry(&model)?;

        let light_sphere = make_sphere(0.2, 10, 10);
        let light_sphere_colors = vec![[1.0, 0.9, 0.4, 1.0]; light_sphere.vertex_count()];
        let light_sphere = backend.create_geometry(&light_sphere.with_colors(light_sphere_colors))?;

        let cube = backend.create_geometry(&make_cube(1.0))?;
        let floor = backend.create_geometry(&make_rect(2.0, 2.0))?;

        let floor_texture = match assets.floor_texture {
            Some(floor_texture) => floor_texture,
            None => checkerboard(
                256,
                8,
                [210, 210, 210, 255],
                [90, 90, 90, 255],
            ),
        };
        let floor_texture = backend.create_texture(&floor_texture)?;

        let (map_width, map_height) = (frame.settings().map_width, frame.settings().map_height);
        let mut shadow = SceneNode::new(ShadowNode::new(
            frame.depth_texture(),
            SHADOW_MAP_UNIT,
            map_width,
            map_height,
        ));
        let shadow_id = shadow.id();

        let light = SceneNode::new(PointLightNode::new(cgmath::Vector3::new(0.0, 0.0, 0.0)).with_colors(
            LightColors {
                ambient: [0.2, 0.2, 0.2, 1.0],
                diffuse: [0.8, 0.8, 0.8, 1.0],
                specular: [1.0, 1.0, 1.0, 1.0],
            },
        ))
        .with_child(
            SceneNode::new(ShaderNode::new(single))
                .with_child(SceneNode::new(RenderNode::new(light_sphere)))
                .without_shadow(),
        );
        let light_id = light.id();

        let rotate_light = SceneNode::new(TransformNode::default()).with_child(
            SceneNode::new(TransformNode::from(Transform::from_translation(0.0, 5.0, 7.0)))
                .with_child(light),
        );
        let rotate_light_id = rotate_light.id();
        shadow.append(rotate_light);

        shadow.append(SceneNode::new(
            DirectionalLightNode::new(cgmath::Vector3::new(-1.0, -1.0, -1.0)).with_colors(
                LightColors {
                    ambient: [0.0, 0.0, 0.0, 1.0],
                    diffuse: [0.15, 0.15, 0.2, 1.0],
                    specular: [0.0, 0.0, 0.0, 1.0],
                },
            ),
        ));

        let spot_light = SceneNode::new(
            SpotLightNode::new(
                cgmath::Vector3::new(2.0, 3.0, 1.0),
                cgmath::Vector3::new(0.0, -1.0, 0.0),
                cgmath::Deg(25.0),
                10.0,
            )
            .with_colors(LightColors {
                ambient: [0.0, 0.0, 0.0, 1.0],
                diffuse: [0.6, 0.3, 0.3, 1.0],
                specular: [0.5, 0.5, 0.5, 1.0],
            }),
        );
        let spot_light_id = spot_light.id();
        shadow.append(spot_light);

        let gold = Material::default()
            .with_ambient([0.24725, 0.1995, 0.0745, 1.0])
            .with_diffuse([0.75164, 0.60648, 0.22648, 1.0])
            .with_specular([0.628281, 0.555802, 0.366065, 1.0])
            .with_shininess(0.4);
        let rotate_model = SceneNode::new(TransformNode::default()).with_child(
            SceneNode::new(TransformNode::from(Transform::from_translation(
                0.0,
                FLOOR_HEIGHT,
                0.0,
            )))
            .with_child(
                SceneNode::new(MaterialNode::new(gold))
                    .with_child(SceneNode::new(RenderNode::new(model))),
            ),
        );
        let rotate_model_id = rotate_model.id();
        shadow.append(rotate_model);

        let character = Character::build(backend)?;
        let (character_id, swing_arms_id, left_arm_id) =
            (character.walk.id(), character.swing_arms, character.left_arm);
        shadow.append(character.walk);

        let dark = Material::default()
            .with_ambient([0.0, 0.0, 0.0, 1.0])
            .with_diffuse([0.1, 0.1, 0.1, 1.0])
            .with_specular([0.5, 0.5, 0.5, 1.0])
            .with_shininess(50.0);
        shadow.append(
            SceneNode::new(TransformNode::from(
                Transform::from_translation(0.0, FLOOR_HEIGHT, 0.0)
                    .with_rotation_x(cgmath::Deg(-90.0))
                    .with_uniform_scale(3.0),
            ))
            .with_child(
                SceneNode::new(MaterialNode::new(dark)).with_child(
                    SceneNode::new(TextureNode::new(floor_texture, FLOOR_TEXTURE_UNIT))
                        .with_child(SceneNode::new(RenderNode::new(floor))),
                ),
            )
            .without_shadow(),
        );

        // blended subtrees write no depth and go after everything opaque
        let glass = Material::default()
            .with_ambient([0.0, 0.1, 0.2, 1.0])
            .with_diffuse([0.2, 0.4, 0.9, 1.0])
            .with_specular([0.8, 0.8, 0.8, 1.0])
            .with_shininess(30.0);
        let glass = SceneNode::new(TransparentMaterialNode::new(glass, GLASS_ALPHA))
            .with_child(SceneNode::new(RenderNode::new(cube)));
        let glass_id = glass.id();
        shadow.append(
            SceneNode::new(TransformNode::from(Transform::from_translation(
                1.6,
                FLOOR_HEIGHT + 0.5,
                1.2,
            )))
            .with_child(glass),
        );

        let root = SceneNode::new(ShaderNode::new(phong)).with_child(shadow);
        frame.attach(light_id, shadow_id);

        log::info!("Demo scene assembled");

        Ok(Self {
            root,
            light: light_id,
            shadow: shadow_id,
            character: character_id,
            left_arm: left_arm_id,
            rotate_light: rotate_light_id,
            rotate_model: rotate_model_id,
            swing_arms: swing_arms_id,
            spot_light: spot_light_id,
            glass: glass_id,
        })
    }

    /// Moves the animated nodes to where they are at `time_ms`. Runs before the frame is rendered.
    pub fn animate(&mut self, time_ms: f64) {
        let time_ms = time_ms as f32;

        let matrices = [
            (self.rotate_model, cgmath::Matrix4::from_angle_y(cgmath::Deg(time_ms * -0.01))),
            (self.rotate_light, cgmath::Matrix4::from_angle_y(cgmath::Deg(time_ms * 0.05))),
            (self.character, walk_matrix(time_ms)),
            (self.swing_arms, swing_matrix(time_ms)),
        ];

        for (id, matrix) in matrices {
            match self.root.find_mut(id) {
                Some(node) => {
                    node.set_matrix(matrix);
                }
                None => log::warn!("Animated node {id:?} is no longer in the scene"),
            }
        }

        let sweep = (time_ms * 0.001).sin() * 0.5;
        match self.root.find_mut(self.spot_light).map(SceneNode::kind_mut) {
            Some(NodeKind::SpotLight(spot_light)) => {
                spot_light.set_direction(cgmath::Vector3::new(sweep, -1.0, 0.0))
            }
            _ => log::warn!("The spot light is no longer in the scene"),
        }

        match self.root.find_mut(self.glass).map(SceneNode::kind_mut) {
            Some(NodeKind::TransparentMaterial(glass)) => glass.set_alpha(glass_alpha(time_ms)),
            _ => log::warn!("The glass cube is no longer in the scene"),
        }
    }
}

fn glass_alpha(time_ms: f32) -> f32 {
    GLASS_ALPHA + 0.2 * (time_ms * 0.002).sin()
}

/// Places the character on its walk: back and forth on x with a bob per step.
fn walk_matrix(time_ms: f32) -> cgmath::Matrix4<f32> {
    let phase = (time_ms * WALK_SPEED) % (4.0 * WALK_RANGE);
    let x = (phase - 2.0 * WALK_RANGE).abs() - WALK_RANGE;
    let bob = (time_ms * 0.005).cos().abs() * STEP_BOB;

    cgmath::Matrix4::from_translation(cgmath::Vector3::new(
        x,
        FLOOR_HEIGHT + BODY_HEIGHT + bob,
        WALK_Z,
    ))
}

/// Rocks both arms around the body centre in step with the walk.
fn swing_matrix(time_ms: f32) -> cgmath::Matrix4<f32> {
    cgmath::Matrix4::from_angle_z(ARM_SWING * (time_ms * 0.005).cos())
}

/// A sphere body on two legs with two arms that swing together.
struct Character {
    walk: SceneNode,
    swing_arms: NodeId,
    left_arm: NodeId,
}

impl Character {
    fn build(backend: &mut dyn RenderBackend) -> Result<Self> {
        let body = backend.create_geometry(&make_sphere(BODY_RADIUS, 16, 16))?;
        let leg = backend.create_geometry(&make_cylinder(LIMB_RADIUS, LEG_LENGTH, 8))?;
        let arm = backend.create_geometry(&make_cylinder(LIMB_RADIUS, ARM_LENGTH, 8))?;

        // cylinders run along +z; legs are turned to point down, arms to point sideways
        let legs = [-0.12, 0.12].map(|x| {
            SceneNode::new(TransformNode::from(
                Transform::from_translation(x, HIP_HEIGHT, 0.0).with_rotation_x(cgmath::Deg(90.0)),
            ))
            .with_child(SceneNode::new(RenderNode::new(leg)))
        });

        let left_arm = SceneNode::new(RenderNode::new(arm));
        let left_arm_id = left_arm.id();
        let arms = [
            SceneNode::new(TransformNode::from(
                Transform::from_translation(-SHOULDER_OFFSET, 0.0, 0.0)
                    .with_rotation_y(cgmath::Deg(-90.0)),
            ))
            .with_child(left_arm),
            SceneNode::new(TransformNode::from(
                Transform::from_translation(SHOULDER_OFFSET, 0.0, 0.0)
                    .with_rotation_y(cgmath::Deg(90.0)),
            ))
            .with_child(SceneNode::new(RenderNode::new(arm))),
        ];

        let swing_arms = SceneNode::new(TransformNode::default()).with_children(arms);
        let swing_arms_id = swing_arms.id();

        let spirit = Material::default()
            .with_ambient([0.3, 0.3, 0.4, 1.0])
            .with_diffuse([0.6, 0.7, 0.9, 1.0])
            .with_specular([0.4, 0.4, 0.4, 1.0])
            .with_emission([0.05, 0.05, 0.1, 1.0])
            .with_shininess(20.0);
        let walk = SceneNode::new(TransformNode::default()).with_child(
            SceneNode::new(MaterialNode::new(spirit))
                .with_child(SceneNode::new(RenderNode::new(body)))
                .with_children(legs)
                .with_child(swing_arms),
        );

        Ok(Self {
            walk,
            swing_arms: swing_arms_id,
            left_arm: left_arm_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{Command, RecordingBackend};
    use crate::backend::PassTarget;
    use crate::camera::Camera;
    use crate::data::projection::PerspectiveProjection;
    use crate::frame::ShadowSettings;

    fn camera() -> Camera {
        Camera::look_at(
            cgmath::Point3::new(0.0, 1.0, -10.0),
            cgmath::Point3::new(0.0, 0.0, 0.0),
            PerspectiveProjection {
                aspect_ratio: 4.0 / 3.0,
                fovy: cgmath::Deg(30.0).into(),
                znear: 0.01,
                zfar: 100.0,
            },
        )
    }

    #[test]
    fn floor_and_light_sphere_stay_out_of_the_shadow_pass() {
        let mut backend = RecordingBackend::new();
        let mut frame = FrameRenderer::new(&mut backend, ShadowSettings::default()).unwrap();
        let mut demo = DemoScene::build(&mut backend, &mut frame, DemoAssets::default()).unwrap();

        demo.animate(1000.0);
        backend.clear_commands();
        frame
            .render_frame(&mut backend, &mut demo.root, &camera(), 1000.0)
            .unwrap();

        // shadow pass: model, five character parts and cube
        // camera pass: light sphere, model, five character parts, floor and cube
        assert_eq!(backend.draw_count(), 16);
    }

    #[test]
    fn animation_moves_the_light() {
        let mut backend = RecordingBackend::new();
        let mut frame = FrameRenderer::new(&mut backend, ShadowSettings::default()).unwrap();
        let mut demo = DemoScene::build(&mut backend, &mut frame, DemoAssets::default()).unwrap();

        let light_at = |demo: &DemoScene| {
            let matrix = demo.root.accumulated_matrix(demo.light).unwrap();
            matrix * cgmath::Vector4::new(0.0, 0.0, 0.0, 1.0)
        };

        demo.animate(0.0);
        let start = light_at(&demo);
        assert!((start.z - 7.0).abs() < 1e-4);

        // a quarter turn
        demo.animate(1800.0);
        let turned = light_at(&demo);
        assert!((turned.x - 7.0).abs() < 1e-3);
        assert!(turned.z.abs() < 1e-3);
        assert!((turned.y - 5.0).abs() < 1e-4);
    }

    #[test]
    fn blended_draws_come_after_every_opaque_draw() {
        let mut backend = RecordingBackend::new();
        let mut frame = FrameRenderer::new(&mut backend, ShadowSettings::default()).unwrap();
        let mut demo = DemoScene::build(&mut backend, &mut frame, DemoAssets::default()).unwrap();

        demo.animate(0.0);
        backend.clear_commands();
        frame
            .render_frame(&mut backend, &mut demo.root, &camera(), 0.0)
            .unwrap();

        let commands = backend.commands();
        let camera_pass = commands
            .iter()
            .position(|command| *command == Command::BeginPass(PassTarget::Screen))
            .unwrap();

        let mut blended = false;
        let mut draws = Vec::new();
        for command in &commands[camera_pass..] {
            match command {
                Command::SetBlendMode(blend_mode) => blended = blend_mode.is_some(),
                Command::Draw { geometry, .. } => draws.push((*geometry, blended)),
                _ => {}
            }
        }

        let first_blended = draws.iter().position(|(_, blended)| *blended).unwrap();
        let late_opaque: Vec<_> = draws[first_blended..]
            .iter()
            .filter(|(_, blended)| !blended)
            .collect();
        assert!(late_opaque.is_empty(), "opaque after blended: {draws:?}");
    }

    #[test]
    fn limbs_follow_the_walk_and_the_swing() {
        let mut backend = RecordingBackend::new();
        let mut frame = FrameRenderer::new(&mut backend, ShadowSettings::default()).unwrap();
        let mut demo = DemoScene::build(&mut backend, &mut frame, DemoAssets::default()).unwrap();

        let hand_at = |demo: &DemoScene| {
            let matrix = demo.root.accumulated_matrix(demo.left_arm).unwrap();
            matrix * cgmath::Vector4::new(0.0, 0.0, ARM_LENGTH, 1.0)
        };
        let expected_hand = |walk_x: f32, swing: cgmath::Deg<f32>| {
            // the arm reaches left from the shoulder and swings about the body centre
            let reach = -(SHOULDER_OFFSET + ARM_LENGTH);
            let angle = cgmath::Rad::from(swing).0;
            cgmath::Vector3::new(
                walk_x + reach * angle.cos(),
                FLOOR_HEIGHT + BODY_HEIGHT + STEP_BOB + reach * angle.sin(),
                WALK_Z,
            )
        };
        let assert_near = |actual: cgmath::Vector4<f32>, expected: cgmath::Vector3<f32>| {
            for (a, e) in [
                (actual.x, expected.x),
                (actual.y, expected.y),
                (actual.z, expected.z),
            ] {
                assert!((a - e).abs() < 1e-4, "{actual:?} != {expected:?}");
            }
        };

        // the walk starts at the right end with the arms swung fully one way
        demo.animate(0.0);
        assert_near(hand_at(&demo), expected_hand(WALK_RANGE, cgmath::Deg(15.0)));

        // half a swing later the character has walked left and the arms swung the other way
        let half_swing = std::f64::consts::PI / 0.005;
        demo.animate(half_swing);
        assert_near(
            hand_at(&demo),
            expected_hand(
                WALK_RANGE - std::f32::consts::PI / 10.0,
                cgmath::Deg(-15.0),
            ),
        );
    }

    #[test]
    fn animation_sweeps_the_spot_light_and_pulses_the_glass() {
        let mut backend = RecordingBackend::new();
        let mut frame = FrameRenderer::new(&mut backend, ShadowSettings::default()).unwrap();
        let mut demo = DemoScene::build(&mut backend, &mut frame, DemoAssets::default()).unwrap();

        let state = |demo: &DemoScene| {
            let direction = match demo.root.find(demo.spot_light).map(SceneNode::kind) {
                Some(NodeKind::SpotLight(spot_light)) => spot_light.direction(),
                _ => panic!("spot light is gone"),
            };
            let alpha = match demo.root.find(demo.glass).map(SceneNode::kind) {
                Some(NodeKind::TransparentMaterial(glass)) => glass.alpha(),
                _ => panic!("glass is gone"),
            };
            (direction, alpha)
        };

        demo.animate(0.0);
        let (direction, alpha) = state(&demo);
        assert!(direction.x.abs() < 1e-6);
        assert!((alpha - GLASS_ALPHA).abs() < 1e-6);

        // the pulse peaks first
        demo.animate(std::f64::consts::FRAC_PI_2 / 0.002);
        let (_, alpha) = state(&demo);
        assert!((alpha - 0.7).abs() < 1e-4);

        // a quarter period of the sweep
        demo.animate(std::f64::consts::FRAC_PI_2 * 1000.0);
        let (direction, _) = state(&demo);
        assert!((direction.x - 0.5).abs() < 1e-4);
    }
}
