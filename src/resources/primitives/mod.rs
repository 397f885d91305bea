//! Built-in meshes.

pub mod box_shape;
pub mod plane;
pub mod sphere;

pub use box_shape::create_box;
pub use plane::{PlaneOptions, create_plane, create_quad};
pub use sphere::{SphereOptions, create_sphere};
