mod skinning;
mod lighting;

pub use skinning::*;
pub use lighting::*;
