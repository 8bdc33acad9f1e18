use std::error::Error;
use std::sync::Mutex;

use nalgebra::{
    Matrix4, Perspective3, Point3, Rotation3, Translation3, Vector2, Vector3, Vector4,
};

use shade::graphics::{
    DepthTesting, Framebuffer, Image, IndexedRenderCall, Pipeline, Rasterizer, WindingOrder,
};
use shade::shading::{
    BonePalette, DeferredLightShader, GBuffer, GeometryTexel, LightPassData, LightingConfig,
    PointLight, SkinPassData, SkinShader, SkinnedVertex, SkinningUniforms, default_light_hint,
    fullscreen_triangle,
};

const WIDTH: usize = 800;
const HEIGHT: usize = 450;

/// A vertical strip of quads weighted between a root bone and a bent tip bone.
fn build_strip() -> (Box<[SkinnedVertex]>, Vec<u16>) {
    let rows = 8;
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for row in 0..=rows {
        let t = row as f32 / rows as f32;
        let y = t * 2.0 - 1.0;

        for x in [-0.25f32, 0.25] {
            vertices.push(SkinnedVertex {
                position: Point3::new(x, y, 0.0),
                normal: Vector3::z(),
                texcoord: Vector2::new((x + 0.25) * 2.0, t),
                skin: Vector4::new(0.0, 1.0, 1.0 - t, t),
            });
        }
    }

    for row in 0..rows as u16 {
        let base = row * 2;
        indices.extend_from_slice(&[base, base + 1, base + 2]);
        indices.extend_from_slice(&[base + 1, base + 3, base + 2]);
    }

    (vertices.into_boxed_slice(), indices)
}

fn dump_image(data: &Image<Vector4<f32>>, path: &str) -> Result<(), Box<dyn Error>> {
    let (width, height) = data.size();
    let mut image = bmp::Image::new(width as u32, height as u32);

    for (x, y) in image.coordinates() {
        let color = data
            .at(x as usize, y as usize)
            .copied()
            .unwrap_or_else(Vector4::zeros);

        let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0) as u8;

        image.set_pixel(
            x,
            y,
            bmp::Pixel {
                r: channel(color.x),
                g: channel(color.y),
                b: channel(color.z),
            },
        );
    }

    image.save(path)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let (vertices, indices) = build_strip();

    // root stays put, the tip bone bends the strip sideways
    let palette = BonePalette::new(vec![
        Matrix4::identity(),
        Rotation3::from_axis_angle(&Vector3::z_axis(), 0.6).to_homogeneous(),
    ])?;
    palette.validate(&vertices)?;

    let skin_pass = SkinPassData {
        uniforms: SkinningUniforms {
            projection: Perspective3::new(WIDTH as f32 / HEIGHT as f32, 1.0, 0.1, 100.0)
                .to_homogeneous(),
            model_view: Translation3::new(0.0, 0.0, -3.0).to_homogeneous(),
            normal_matrix: Matrix4::identity(),
            palette,
            armature_enabled: true,
            light_hint: default_light_hint(),
        },
        vertices,
    };

    let rast = Rasterizer::new();

    let mut geometry: Framebuffer<GeometryTexel> =
        Framebuffer::new(WIDTH, HEIGHT, true, GeometryTexel::default());

    rast.render_indexed(&IndexedRenderCall {
        pipeline: &Pipeline {
            depth: DepthTesting {
                test: true,
                write: true,
            },
            cull_back: false,
            winding_order: WindingOrder::CounterClockwise,
            shader: SkinShader,
        },
        framebuffer: Mutex::new(&mut geometry),
        vertex_offset: 0,
        first_instance: 0,
        instance_count: 1,
        scissor: None,
        indices: &indices,
        data: &skin_pass,
    });

    println!("Geometry pass done");

    // no shadow pass in this demo: fully lit mask, faint ambient ping
    let shadow = Image::filled(WIDTH, HEIGHT, Vector4::new(1.0, 1.0, 1.0, 1.0));
    let ping = Image::filled(WIDTH, HEIGHT, Vector4::new(0.05, 0.05, 0.08, 0.0));

    let light_pass = LightPassData {
        vertices: fullscreen_triangle(),
        gbuffer: GBuffer::from_geometry(geometry.into_color(), shadow, ping)?,
        light: PointLight {
            position: Vector3::new(1.0, 1.0, -1.0),
            color: Vector3::new(1.0, 0.9, 0.7),
        },
        config: LightingConfig::default(),
    };

    let mut target: Framebuffer<Vector4<f32>> =
        Framebuffer::new(WIDTH, HEIGHT, false, Vector4::zeros());

    rast.render_indexed(&IndexedRenderCall {
        pipeline: &Pipeline {
            depth: DepthTesting {
                test: false,
                write: false,
            },
            cull_back: false,
            winding_order: WindingOrder::CounterClockwise,
            shader: DeferredLightShader,
        },
        framebuffer: Mutex::new(&mut target),
        vertex_offset: 0,
        first_instance: 0,
        instance_count: 1,
        scissor: None,
        indices: &[0, 1, 2],
        data: &light_pass,
    });

    println!("Lighting pass done");

    dump_image(target.color_attachment(), "deferred.bmp")?;
    println!("Dumped deferred.bmp");

    Ok(())
}
