//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::rc::Rc;

use glam::UVec2;

use myth_gl::renderer::device::{DeviceCommand, RecordedUniform};
use myth_gl::{GraphicsContext, GraphicsContextConfig, HeadlessDevice, Material, Shader};

pub const VERTEX_SHADER: &str = r"#version 330 core

layout(location = 0) in vec3 aPos;

uniform mat4 uViewProjMat;
uniform mat4 uModelMat;

void main()
{
    gl_Position = uViewProjMat * uModelMat * vec4(aPos, 1.0);
}
";

pub const FRAGMENT_SHADER: &str = r"#version 330 core

uniform vec4 uColor;
uniform int uIndex;
uniform sampler2D uDiffuse;

out vec4 FragColor;

void main()
{
    FragColor = uColor * texture(uDiffuse, vec2(0.5));
}
";

/// Takes its model matrix per instance instead of through `uModelMat`.
pub const INSTANCED_VERTEX_SHADER: &str = r"#version 330 core

layout(location = 0) in vec3 aPos;
layout(location = 6) in mat4 aModelMat;

uniform mat4 uViewProjMat;

void main()
{
    gl_Position = uViewProjMat * aModelMat * vec4(aPos, 1.0);
}
";

/// Two color outputs, for multiple-render-target passes.
pub const MRT_FRAGMENT_SHADER: &str = r"#version 330 core

uniform vec4 uColor;

layout(location = 0) out vec4 Color0;
layout(location = 1) out vec4 Color1;

void main()
{
    Color0 = uColor;
    Color1 = vec4(1.0) - uColor;
}
";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A context over a fresh headless device, plus the device for inspection.
pub fn headless_context() -> (Rc<HeadlessDevice>, GraphicsContext) {
    init_logging();
    let device = Rc::new(HeadlessDevice::new());
    let config = GraphicsContextConfig {
        window_dimensions: UVec2::new(64, 48),
        ..GraphicsContextConfig::default()
    };
    let ctx = GraphicsContext::new(device.clone(), config).expect("headless context");
    device.clear_commands();
    (device, ctx)
}

pub fn basic_shader(ctx: &GraphicsContext) -> Shader {
    Shader::new(ctx, VERTEX_SHADER, FRAGMENT_SHADER).expect("basic shader compiles")
}

pub fn basic_material(ctx: &GraphicsContext) -> Material {
    Material::new(basic_shader(ctx))
}

/// Every value written to the uniform at `location`, in order.
pub fn uniform_writes(device: &HeadlessDevice, location: i32) -> Vec<RecordedUniform> {
    device
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            DeviceCommand::SetUniform { location: l, value } if l == location => Some(value),
            _ => None,
        })
        .collect()
}

/// The `int` values written to the uniform at `location`, in order.
pub fn int_writes(device: &HeadlessDevice, location: i32) -> Vec<i32> {
    uniform_writes(device, location)
        .into_iter()
        .filter_map(|v| match v {
            RecordedUniform::Int(i) => Some(i),
            _ => None,
        })
        .collect()
}
