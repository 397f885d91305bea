//! Cameras: view parameters plus the queue of draws submitted against them.

pub mod camera;

pub use camera::{Camera, CameraClearFlags, CameraProjection};
