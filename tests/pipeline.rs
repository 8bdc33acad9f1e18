use std::sync::Mutex;

use nalgebra::{Matrix4, Point3, Vector2, Vector3, Vector4};

use shade::graphics::{
    DepthTesting, Framebuffer, IndexedRenderCall, Pipeline, Rasterizer, WindingOrder,
};
use shade::shading::{
    BonePalette, DeferredLightShader, GBuffer, GeometryTexel, LightPassData, LightingConfig,
    PointLight, SkinPassData, SkinShader, SkinnedVertex, SkinningUniforms, default_light_hint,
    fullscreen_triangle, shade_fragment,
};

const EPS: f32 = 1e-4;

fn pipeline<T: shade::graphics::Shader>(shader: T) -> Pipeline<T> {
    Pipeline {
        depth: DepthTesting {
            test: false,
            write: false,
        },
        cull_back: false,
        winding_order: WindingOrder::CounterClockwise,
        shader,
    }
}

fn uniform_plane(
    width: usize,
    height: usize,
    value: Vector4<f32>,
) -> shade::graphics::Image<Vector4<f32>> {
    shade::graphics::Image::filled(width, height, value)
}

#[test]
fn geometry_pass_writes_view_space_records() {
    let palette = BonePalette::new(vec![Matrix4::identity()]).unwrap();

    let corners = [
        Point3::new(-1.0, -1.0, 0.5),
        Point3::new(3.0, -1.0, 0.5),
        Point3::new(-1.0, 3.0, 0.5),
    ];

    let vertices = Box::from_iter(corners.iter().map(|position| SkinnedVertex {
        position: *position,
        normal: Vector3::z(),
        texcoord: Vector2::zeros(),
        skin: Vector4::new(0.0, 0.0, 1.0, 0.0),
    }));

    let data = SkinPassData {
        uniforms: SkinningUniforms {
            projection: Matrix4::identity(),
            model_view: Matrix4::identity(),
            normal_matrix: Matrix4::identity(),
            palette,
            armature_enabled: true,
            light_hint: default_light_hint(),
        },
        vertices,
    };

    let mut fb: Framebuffer<GeometryTexel> =
        Framebuffer::new(2, 2, true, GeometryTexel::default());

    Rasterizer::new().render_indexed(&IndexedRenderCall {
        pipeline: &pipeline(SkinShader),
        framebuffer: Mutex::new(&mut fb),
        vertex_offset: 0,
        first_instance: 0,
        instance_count: 1,
        scissor: None,
        indices: &[0, 1, 2],
        data: &data,
    });

    for (x, y) in fb.color_attachment().coordinates() {
        let texel = fb.color_attachment().at(x, y).unwrap();

        // identity transforms: the stored position is the NDC pixel center
        let expected_x = ((x as f32 + 0.5) / 2.0) * 2.0 - 1.0;
        let expected_y = ((y as f32 + 0.5) / 2.0) * 2.0 - 1.0;

        assert!((texel.position.x - expected_x).abs() < EPS);
        assert!((texel.position.y - expected_y).abs() < EPS);
        assert!((texel.position.z - 0.5).abs() < EPS);
        assert!((texel.position.w - 1.0).abs() < EPS);

        assert!((texel.normal - Vector4::new(0.0, 0.0, 1.0, 1.0)).norm() < EPS);
    }
}

#[test]
fn lighting_pass_matches_direct_shading() {
    // slightly tilted per-pixel normals so every pixel shades differently
    let tag = |x: usize, y: usize| Vector4::new(x as f32 * 0.1, y as f32 * 0.1, 1.0, 0.0);

    let gbuffer = GBuffer::new(
        shade::graphics::Image::from_fn(2, 2, tag),
        shade::graphics::Image::from_fn(2, 2, |x, y| {
            Vector4::new(x as f32 - 0.5, y as f32 - 0.5, -2.0, 1.0)
        }),
        uniform_plane(2, 2, Vector4::new(1.0, 1.0, 1.0, 1.0)),
        uniform_plane(2, 2, Vector4::new(0.1, 0.1, 0.1, 0.0)),
    )
    .unwrap();

    let data = LightPassData {
        vertices: fullscreen_triangle(),
        gbuffer,
        light: PointLight {
            position: Vector3::new(0.0, 1.0, 0.0),
            color: Vector3::new(1.0, 1.0, 1.0),
        },
        config: LightingConfig::default(),
    };

    let mut fb: Framebuffer<Vector4<f32>> = Framebuffer::new(2, 2, false, Vector4::zeros());

    Rasterizer::new().render_indexed(&IndexedRenderCall {
        pipeline: &pipeline(DeferredLightShader),
        framebuffer: Mutex::new(&mut fb),
        vertex_offset: 0,
        first_instance: 0,
        instance_count: 1,
        scissor: None,
        indices: &[0, 1, 2],
        data: &data,
    });

    for (x, y) in fb.color_attachment().coordinates() {
        let u = (x as f32 + 0.5) / 2.0;
        let v = (y as f32 + 0.5) / 2.0;

        let expected = shade_fragment(&data.gbuffer.sample(u, v), &data.light, &data.config);
        let actual = fb.color_attachment().at(x, y).unwrap();

        assert!(
            (actual - expected).norm() < EPS,
            "pixel ({x}, {y}) diverges from direct shading"
        );
    }
}
