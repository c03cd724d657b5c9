use scene_graph_viewer::backend::recording::{Command, RecordingBackend};
use scene_graph_viewer::backend::{ProgramDescriptor, RenderBackend, UniformValue};
use scene_graph_viewer::data::transform::Transform;
use scene_graph_viewer::geometry::make_cube;
use scene_graph_viewer::scene::context::{PassKind, RenderContext};
use scene_graph_viewer::scene::material::{Material, MaterialNode};
use scene_graph_viewer::scene::render::RenderNode;
use scene_graph_viewer::scene::shader::ShaderNode;
use scene_graph_viewer::scene::transform::TransformNode;
use scene_graph_viewer::scene::SceneNode;

#[test]
fn shaded_translated_cube_draws_once_with_its_material() {
    let mut backend = RecordingBackend::new();
    let program = backend
        .create_program(&ProgramDescriptor::phong())
        .unwrap();
    let cube = backend.create_geometry(&make_cube(1.0)).unwrap();

    let root = SceneNode::new(ShaderNode::new(program)).with_child(
        SceneNode::new(TransformNode::from(Transform::from_translation(
            0.0, -1.0, 0.0,
        )))
        .with_child(
            SceneNode::new(MaterialNode::new(
                Material::default().with_ambient([1.0, 0.0, 0.0, 1.0]),
            ))
            .with_child(SceneNode::new(RenderNode::new(cube))),
        ),
    );

    {
        let mut context = RenderContext::new(&mut backend, PassKind::Camera);
        root.render(&mut context);

        assert_eq!(context.shader, None);
    }

    let draws: Vec<&Command> = backend
        .commands()
        .iter()
        .filter(|command| matches!(command, Command::Draw { .. }))
        .collect();
    assert_eq!(
        draws,
        vec![&Command::Draw {
            program,
            geometry: cube,
            count: 36,
            indexed: true,
        }]
    );

    let expected_model_view: [[f32; 4]; 4] = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, -1.0, 0.0, 1.0],
    ];
    assert_eq!(
        backend.uniform_value(program, "u_modelView"),
        Some(UniformValue::Mat4(expected_model_view))
    );
    assert_eq!(
        backend.uniform_value(program, "u_material.ambient"),
        Some(UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]))
    );
    assert_eq!(backend.active_program(), None);
}
