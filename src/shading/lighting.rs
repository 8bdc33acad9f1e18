use log::debug;
use nalgebra::{Point3, Vector2, Vector3, Vector4};
use thiserror::Error;

use crate::graphics::{Blendable, FragmentContext, Image, Shader, VertexContext, VertexOutput};

use super::skinning::GeometryTexel;

/// Per-light shading constants. `Default` restores the stock specular
/// exponent and diffuse divisor.
#[derive(Debug, Clone, Copy)]
pub struct LightingConfig {
    pub exponent: f32,
    pub intensity_divisor: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        LightingConfig {
            exponent: 100.0,
            intensity_divisor: 3.0,
        }
    }
}

/// One point light in view space.
pub struct PointLight {
    pub position: Vector3<f32>,
    pub color: Vector3<f32>,
}

#[derive(Debug, Error)]
pub enum GBufferError {
    #[error("g-buffer planes must not be empty")]
    Empty,

    #[error("g-buffer plane sizes differ: {0}x{1} vs {2}x{3}")]
    SizeMismatch(usize, usize, usize, usize),
}

/// One screen pixel's worth of G-buffer data.
#[derive(Clone, Copy)]
pub struct GBufferSample {
    pub normal: Vector4<f32>,
    pub position: Vector4<f32>,
    pub shadow: Vector4<f32>,
    pub ping: Vector4<f32>,
}

/// The four planes a lighting pass reads: view-space normal, view-space
/// position, the multiplicative shadow mask, and the light accumulated by
/// previous passes.
pub struct GBuffer {
    normal: Image<Vector4<f32>>,
    position: Image<Vector4<f32>>,
    shadow: Image<Vector4<f32>>,
    ping: Image<Vector4<f32>>,
}

impl GBuffer {
    pub fn new(
        normal: Image<Vector4<f32>>,
        position: Image<Vector4<f32>>,
        shadow: Image<Vector4<f32>>,
        ping: Image<Vector4<f32>>,
    ) -> Result<GBuffer, GBufferError> {
        let size = normal.size();
        if size.0 == 0 || size.1 == 0 {
            return Err(GBufferError::Empty);
        }

        for other in [position.size(), shadow.size(), ping.size()] {
            if other != size {
                return Err(GBufferError::SizeMismatch(size.0, size.1, other.0, other.1));
            }
        }

        debug!("g-buffer assembled at {}x{}", size.0, size.1);

        Ok(GBuffer {
            normal,
            position,
            shadow,
            ping,
        })
    }

    /// Splits a finished geometry pass target into normal/position planes and
    /// joins them with externally produced shadow and ping planes.
    pub fn from_geometry(
        geometry: Image<GeometryTexel>,
        shadow: Image<Vector4<f32>>,
        ping: Image<Vector4<f32>>,
    ) -> Result<GBuffer, GBufferError> {
        let (width, height) = geometry.size();

        let plane = |f: fn(&GeometryTexel) -> Vector4<f32>| {
            Image::from_fn(width, height, |x, y| {
                geometry
                    .at(x, y)
                    .map(f)
                    .unwrap_or_else(Vector4::zeros)
            })
        };

        GBuffer::new(
            plane(|texel| texel.normal),
            plane(|texel| texel.position),
            shadow,
            ping,
        )
    }

    pub fn size(&self) -> (usize, usize) {
        self.normal.size()
    }

    /// Nearest-texel fetch of all four planes, clamped to the edge.
    pub fn sample(&self, u: f32, v: f32) -> GBufferSample {
        let fetch = |image: &Image<Vector4<f32>>| {
            image.sample(u, v).copied().unwrap_or_else(Vector4::zeros)
        };

        GBufferSample {
            normal: fetch(&self.normal),
            position: fetch(&self.position),
            shadow: fetch(&self.shadow),
            ping: fetch(&self.ping),
        }
    }
}

fn reflect(incident: &Vector3<f32>, normal: &Vector3<f32>) -> Vector3<f32> {
    incident - normal * (2.0 * normal.dot(incident))
}

/// Blinn-Phong contribution of one light, packed as RGB diffuse plus the
/// specular factor in the alpha channel. Assumes view space with the camera
/// at the origin.
pub fn calc_light(
    normal: &Vector3<f32>,
    position: &Vector3<f32>,
    light: &PointLight,
    config: &LightingConfig,
) -> Vector4<f32> {
    let light_direction = (light.position - position).normalize();

    let diffuse_factor = normal.dot(&light_direction).max(0.0) / config.intensity_divisor;

    let eye = (-position).normalize();
    let reflection = reflect(&-light_direction, normal);
    let specular = reflection.dot(&eye).max(0.0);

    let specular_factor = specular.powf(config.exponent);

    let rgb = light.color * diffuse_factor;
    Vector4::new(rgb.x, rgb.y, rgb.z, specular_factor)
}

/// Full per-pixel composition: shadow mask attenuates this light's
/// contribution, previously accumulated light is added back on top.
pub fn shade_fragment(
    sample: &GBufferSample,
    light: &PointLight,
    config: &LightingConfig,
) -> Vector4<f32> {
    // upstream passes are expected to write unit normals; renormalize anyway
    let normal = sample.normal.xyz().normalize();

    let light_res = calc_light(&normal, &sample.position.xyz(), light, config);

    sample.shadow.component_mul(&light_res) + sample.ping
}

/// Fullscreen-pass vertex: NDC position plus the screen coordinate used to
/// sample the G-buffer.
pub struct ScreenVertex {
    pub position: Point3<f32>,
    pub texcoord: Vector2<f32>,
}

/// One oversized triangle covering the whole target.
pub fn fullscreen_triangle() -> Box<[ScreenVertex]> {
    Box::new([
        ScreenVertex {
            position: Point3::new(-1.0, -1.0, 0.5),
            texcoord: Vector2::new(0.0, 0.0),
        },
        ScreenVertex {
            position: Point3::new(3.0, -1.0, 0.5),
            texcoord: Vector2::new(2.0, 0.0),
        },
        ScreenVertex {
            position: Point3::new(-1.0, 3.0, 0.5),
            texcoord: Vector2::new(0.0, 2.0),
        },
    ])
}

pub struct ScreenVarying {
    pub texcoord: Vector2<f32>,
}

impl Blendable for ScreenVarying {
    fn blend(corners: &[(&Self, f32)]) -> Self {
        ScreenVarying {
            texcoord: Vector2::blend(&Vec::from_iter(
                corners.iter().map(|(w, weight)| (&w.texcoord, *weight)),
            )),
        }
    }
}

pub struct LightPassData {
    pub vertices: Box<[ScreenVertex]>,
    pub gbuffer: GBuffer,
    pub light: PointLight,
    pub config: LightingConfig,
}

/// Deferred lighting shader: one fullscreen pass per light, composited over
/// whatever earlier passes accumulated.
pub struct DeferredLightShader;

impl Shader for DeferredLightShader {
    type Uniform = LightPassData;
    type Working = ScreenVarying;
    type Target = Vector4<f32>;

    fn vertex_stage(&self, context: &VertexContext<Self::Uniform>) -> VertexOutput<Self::Working> {
        let vertex = &context.data.vertices[context.vertex_id];

        VertexOutput {
            position: vertex.position,
            data: ScreenVarying {
                texcoord: vertex.texcoord,
            },
        }
    }

    fn fragment_stage(
        &self,
        context: &FragmentContext<Self::Uniform, Self::Working>,
    ) -> Self::Target {
        let texcoord = &context.working.texcoord;
        let sample = context.data.gbuffer.sample(texcoord.x, texcoord.y);

        shade_fragment(&sample, &context.data.light, &context.data.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn white_light(position: Vector3<f32>) -> PointLight {
        PointLight {
            position,
            color: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    #[test]
    fn diffuse_factor_stays_within_the_divided_bound() {
        let config = LightingConfig::default();
        let position = Vector3::new(0.0, 0.0, -1.0);

        let directions = [
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 0.0, -1.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.6, 0.8, 0.0),
            Vector3::new(-0.6, 0.0, 0.8),
        ];

        for normal in directions {
            let res = calc_light(
                &normal,
                &position,
                &white_light(Vector3::zeros()),
                &config,
            );

            for channel in [res.x, res.y, res.z] {
                assert!((0.0..=1.0 / 3.0 + EPS).contains(&channel));
            }
        }
    }

    #[test]
    fn specular_factor_is_bounded_and_monotonic() {
        let config = LightingConfig::default();
        let normal = Vector3::new(0.0, 0.0, 1.0);

        // sweep the light away from the mirror direction; the specular factor
        // must fall off monotonically and stay in [0, 1]
        let mut previous = f32::INFINITY;
        for step in 0..10 {
            let angle = step as f32 * 0.15;
            let light_position = Vector3::new(angle.sin(), 0.0, angle.cos());

            let res = calc_light(
                &normal,
                &Vector3::new(0.0, 0.0, -1.0),
                &white_light(light_position * 10.0),
                &config,
            );

            assert!((0.0..=1.0 + EPS).contains(&res.w));
            assert!(res.w <= previous + EPS);
            previous = res.w;
        }
    }

    #[test]
    fn head_on_light_yields_one_third_diffuse() {
        let res = calc_light(
            &Vector3::new(0.0, 0.0, 1.0),
            &Vector3::new(0.0, 0.0, -1.0),
            &white_light(Vector3::zeros()),
            &LightingConfig::default(),
        );

        assert!((res.x - 1.0 / 3.0).abs() < EPS);
        assert!((res.y - 1.0 / 3.0).abs() < EPS);
        assert!((res.z - 1.0 / 3.0).abs() < EPS);

        // mirror reflection lines up with the eye exactly
        assert!((res.w - 1.0).abs() < EPS);
    }

    #[test]
    fn zero_shadow_passes_ping_through_untouched() {
        let ping = Vector4::new(0.2, 0.2, 0.2, 0.0);

        let sample = GBufferSample {
            normal: Vector4::new(0.0, 0.0, 1.0, 0.0),
            position: Vector4::new(0.0, 0.0, -1.0, 1.0),
            shadow: Vector4::zeros(),
            ping,
        };

        let color = shade_fragment(
            &sample,
            &white_light(Vector3::zeros()),
            &LightingConfig::default(),
        );

        assert_eq!(color, ping);
    }

    #[test]
    fn drifted_normals_are_renormalized() {
        let sample = |scale: f32| GBufferSample {
            normal: Vector4::new(0.0, 0.0, scale, 0.0),
            position: Vector4::new(0.0, 0.0, -1.0, 1.0),
            shadow: Vector4::new(1.0, 1.0, 1.0, 1.0),
            ping: Vector4::zeros(),
        };

        let config = LightingConfig::default();
        let light = white_light(Vector3::zeros());

        let unit = shade_fragment(&sample(1.0), &light, &config);
        let drifted = shade_fragment(&sample(0.25), &light, &config);

        assert!((unit - drifted).norm() < EPS);
    }

    #[test]
    fn custom_divisor_and_exponent_are_honored() {
        let config = LightingConfig {
            exponent: 1.0,
            intensity_divisor: 2.0,
        };

        let res = calc_light(
            &Vector3::new(0.0, 0.0, 1.0),
            &Vector3::new(0.0, 0.0, -1.0),
            &white_light(Vector3::zeros()),
            &config,
        );

        assert!((res.x - 0.5).abs() < EPS);
        assert!((res.w - 1.0).abs() < EPS);
    }

    #[test]
    fn gbuffer_rejects_mismatched_planes() {
        let normal = Image::from_fn(2, 2, |_, _| Vector4::zeros());
        let position = Image::from_fn(2, 2, |_, _| Vector4::zeros());
        let shadow = Image::from_fn(3, 2, |_, _| Vector4::zeros());
        let ping = Image::from_fn(2, 2, |_, _| Vector4::zeros());

        assert!(matches!(
            GBuffer::new(normal, position, shadow, ping),
            Err(GBufferError::SizeMismatch(2, 2, 3, 2))
        ));
    }

    #[test]
    fn gbuffer_sample_clamps_out_of_range_coordinates() {
        let tag = |x: usize, y: usize| Vector4::new(x as f32, y as f32, 0.0, 0.0);

        let gbuffer = GBuffer::new(
            Image::from_fn(2, 2, tag),
            Image::from_fn(2, 2, |_, _| Vector4::zeros()),
            Image::from_fn(2, 2, |_, _| Vector4::zeros()),
            Image::from_fn(2, 2, |_, _| Vector4::zeros()),
        )
        .unwrap();

        assert_eq!(gbuffer.sample(-1.0, -1.0).normal, tag(0, 0));
        assert_eq!(gbuffer.sample(2.0, 2.0).normal, tag(1, 1));
    }
}
