use nalgebra::{Point3, Vector2, Vector3, Vector4};

pub struct VertexContext<'a, U> {
    pub vertex_id: usize,
    pub instance_id: usize,
    pub data: &'a U,
}

pub struct FragmentContext<'a, U, W> {
    pub instance_id: usize,

    /// NDC x/y of the pixel center plus the perspective-corrected depth.
    pub position: Point3<f32>,

    pub data: &'a U,
    pub working: W,
}

pub struct VertexOutput<W> {
    /// NDC position after the perspective divide.
    pub position: Point3<f32>,
    pub data: W,
}

/// Per-vertex data interpolated across the face. Weights are
/// perspective-corrected by the rasterizer and sum to one.
pub trait Blendable {
    fn blend(corners: &[(&Self, f32)]) -> Self;
}

impl Blendable for f32 {
    fn blend(corners: &[(&Self, f32)]) -> Self {
        corners.iter().map(|(value, weight)| *value * weight).sum()
    }
}

impl Blendable for Vector2<f32> {
    fn blend(corners: &[(&Self, f32)]) -> Self {
        corners
            .iter()
            .fold(Vector2::zeros(), |acc, (value, weight)| acc + *value * *weight)
    }
}

impl Blendable for Vector3<f32> {
    fn blend(corners: &[(&Self, f32)]) -> Self {
        corners
            .iter()
            .fold(Vector3::zeros(), |acc, (value, weight)| acc + *value * *weight)
    }
}

impl Blendable for Vector4<f32> {
    fn blend(corners: &[(&Self, f32)]) -> Self {
        corners
            .iter()
            .fold(Vector4::zeros(), |acc, (value, weight)| acc + *value * *weight)
    }
}

pub trait Shader {
    type Uniform: Sync;
    type Working: Blendable + Sync;

    /// Texel type written by the fragment stage.
    type Target: Sized + Copy + Send;

    fn vertex_stage(&self, context: &VertexContext<Self::Uniform>) -> VertexOutput<Self::Working>;
    fn fragment_stage(&self, context: &FragmentContext<Self::Uniform, Self::Working>)
    -> Self::Target;
}
