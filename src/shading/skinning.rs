use nalgebra::{Matrix4, Point3, Vector2, Vector3, Vector4};
use thiserror::Error;

use crate::graphics::{Blendable, FragmentContext, Shader, VertexContext, VertexOutput};

/// One vertex of a skinned mesh. The skin datum packs
/// `[bone0, bone1, weight0, weight1]` as four floats; the weights are expected
/// to sum to one, which is the caller's responsibility.
pub struct SkinnedVertex {
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
    pub texcoord: Vector2<f32>,
    pub skin: Vector4<f32>,
}

#[derive(Debug, Error)]
pub enum PaletteError {
    #[error("bone palette must contain at least one matrix")]
    Empty,

    #[error("vertex {vertex} references bone {bone} but the palette has {len} matrices")]
    BoneOutOfRange {
        vertex: usize,
        bone: usize,
        len: usize,
    },

    #[error("vertex {vertex} carries a non-finite bone index")]
    BadIndex { vertex: usize },
}

/// Engine-owned bone matrix buffer. Indices are validated against the palette
/// at upload time; lookups inside the vertex stage clamp instead of panicking,
/// so a stale index renders wrong rather than aborting the draw.
pub struct BonePalette {
    matrices: Vec<Matrix4<f32>>,
}

impl BonePalette {
    pub fn new(matrices: Vec<Matrix4<f32>>) -> Result<BonePalette, PaletteError> {
        if matrices.is_empty() {
            return Err(PaletteError::Empty);
        }

        Ok(BonePalette { matrices })
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    pub fn matrix(&self, index: usize) -> &Matrix4<f32> {
        &self.matrices[index.min(self.matrices.len() - 1)]
    }

    /// Upload-time boundary check for a vertex buffer that will be skinned
    /// against this palette.
    pub fn validate(&self, vertices: &[SkinnedVertex]) -> Result<(), PaletteError> {
        for (i, vertex) in vertices.iter().enumerate() {
            for raw in [vertex.skin.x, vertex.skin.y] {
                if !raw.is_finite() || raw < 0.0 {
                    return Err(PaletteError::BadIndex { vertex: i });
                }

                let bone = raw as usize;
                if bone >= self.matrices.len() {
                    return Err(PaletteError::BoneOutOfRange {
                        vertex: i,
                        bone,
                        len: self.matrices.len(),
                    });
                }
            }
        }

        Ok(())
    }
}

pub struct SkinningUniforms {
    pub projection: Matrix4<f32>,
    pub model_view: Matrix4<f32>,
    pub normal_matrix: Matrix4<f32>,

    pub palette: BonePalette,

    /// When disabled the bone blend is skipped and vertices pass through the
    /// model-view transform untouched.
    pub armature_enabled: bool,

    /// View-space light hint forwarded to later passes, transformed by the
    /// model-view matrix. Defaults to the classic overhead point.
    pub light_hint: Point3<f32>,
}

/// Stock overhead light point used when no scene light is supplied.
pub fn default_light_hint() -> Point3<f32> {
    Point3::new(0.0, 5.0, 0.0)
}

pub struct SkinnedOutput {
    pub clip_position: Vector4<f32>,
    pub view_position: Vector4<f32>,
    pub normal: Vector4<f32>,
    pub light_position: Vector4<f32>,
    pub texcoord: Vector2<f32>,
}

/// Two-bone linear blend of the homogeneous position.
pub fn skin_position(
    position: &Point3<f32>,
    skin: &Vector4<f32>,
    palette: &BonePalette,
) -> Vector4<f32> {
    let homogeneous = position.to_homogeneous();

    let m0 = palette.matrix(skin.x as usize);
    let w0 = skin.z;

    let m1 = palette.matrix(skin.y as usize);
    let w1 = skin.w;

    let position0 = m0 * homogeneous;
    let position1 = m1 * homogeneous;

    position0 * w0 + position1 * w1
}

/// The full vertex-stage contract: clip position for the rasterizer plus the
/// interpolated view-space outputs.
pub fn skin_vertex(vertex: &SkinnedVertex, uniforms: &SkinningUniforms) -> SkinnedOutput {
    let blended = match uniforms.armature_enabled {
        true => skin_position(&vertex.position, &vertex.skin, &uniforms.palette),
        false => vertex.position.to_homogeneous(),
    };

    let view_position = uniforms.model_view * blended;
    let clip_position = uniforms.projection * view_position;

    // the normal follows only the normal-matrix path, not the bone blend,
    // and carries w = 1.0
    let normal = uniforms.normal_matrix * vertex.normal.push(1.0);

    let light_position = uniforms.model_view * uniforms.light_hint.to_homogeneous();

    SkinnedOutput {
        clip_position,
        view_position,
        normal,
        light_position,
        texcoord: vertex.texcoord,
    }
}

/// Per-pixel record written by the geometry pass and consumed by the deferred
/// lighting pass.
#[derive(Clone, Copy)]
pub struct GeometryTexel {
    pub normal: Vector4<f32>,
    pub position: Vector4<f32>,
}

impl Default for GeometryTexel {
    fn default() -> Self {
        GeometryTexel {
            normal: Vector4::zeros(),
            position: Vector4::zeros(),
        }
    }
}

pub struct SkinnedVarying {
    pub texcoord: Vector2<f32>,
    pub normal: Vector4<f32>,
    pub view_position: Vector4<f32>,
    pub light_position: Vector4<f32>,
}

impl Blendable for SkinnedVarying {
    fn blend(corners: &[(&Self, f32)]) -> Self {
        let pick = |f: fn(&Self) -> &Vector4<f32>| {
            Vector4::blend(&Vec::from_iter(
                corners.iter().map(|(w, weight)| (f(*w), *weight)),
            ))
        };

        SkinnedVarying {
            texcoord: Vector2::blend(&Vec::from_iter(
                corners.iter().map(|(w, weight)| (&w.texcoord, *weight)),
            )),
            normal: pick(|w| &w.normal),
            view_position: pick(|w| &w.view_position),
            light_position: pick(|w| &w.light_position),
        }
    }
}

pub struct SkinPassData {
    pub vertices: Box<[SkinnedVertex]>,
    pub uniforms: SkinningUniforms,
}

/// Geometry-pass shader: skins each vertex and writes the view-space
/// normal/position record into the G-buffer target.
pub struct SkinShader;

impl Shader for SkinShader {
    type Uniform = SkinPassData;
    type Working = SkinnedVarying;
    type Target = GeometryTexel;

    fn vertex_stage(&self, context: &VertexContext<Self::Uniform>) -> VertexOutput<Self::Working> {
        let vertex = &context.data.vertices[context.vertex_id];
        let out = skin_vertex(vertex, &context.data.uniforms);

        let ndc = out.clip_position / out.clip_position.w;

        VertexOutput {
            position: Point3::new(ndc.x, ndc.y, ndc.z),
            data: SkinnedVarying {
                texcoord: out.texcoord,
                normal: out.normal,
                view_position: out.view_position,
                light_position: out.light_position,
            },
        }
    }

    fn fragment_stage(
        &self,
        context: &FragmentContext<Self::Uniform, Self::Working>,
    ) -> Self::Target {
        GeometryTexel {
            normal: context.working.normal,
            position: context.working.view_position,
        }
    }
}
