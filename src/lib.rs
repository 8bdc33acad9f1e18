pub mod graphics;
pub mod shading;
