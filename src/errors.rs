//! Error Types
//!
//! This module defines the error types used throughout the renderer.
//!
//! # Overview
//!
//! The main error type [`GraphicsError`] covers the recoverable failure modes:
//! - Graphics context construction (including a second live context)
//! - Hardware object allocation
//! - Shader compilation and program linking
//!
//! Caller bugs (mismatched pixel counts, malformed render targets, invalid
//! cubemap dimensions) are not represented here: they trip an assertion.
//!
//! # Usage
//!
//! Fallible public APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, GraphicsError>`.
//!
//! ```rust,ignore
//! use myth_gl::errors::Result;
//!
//! fn build_shader(ctx: &GraphicsContext) -> Result<Shader> {
//!     Shader::new(ctx, VERTEX_SRC, FRAGMENT_SRC)
//! }
//! ```

use std::fmt;

use thiserror::Error;

/// A programmable pipeline stage, used to label compilation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Geometry,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Geometry => "geometry",
            ShaderStage::Fragment => "fragment",
        };
        f.write_str(name)
    }
}

/// The main error type for the renderer.
#[derive(Error, Debug)]
pub enum GraphicsError {
    // ========================================================================
    // Context Errors
    // ========================================================================
    /// A `GraphicsContext` is already alive on this thread.
    #[error("A graphics context is already active on this thread")]
    ContextAlreadyActive,

    /// The hardware backend could not be initialized.
    #[error("Failed to initialize graphics device: {0}")]
    DeviceInit(String),

    // ========================================================================
    // Resource Allocation Errors
    // ========================================================================
    /// The device refused to allocate an object.
    #[error("Failed to create {kind}: {message}")]
    ObjectCreation {
        /// What was being created (e.g. "texture", "framebuffer")
        kind: &'static str,
        /// Driver-provided message
        message: String,
    },

    // ========================================================================
    // Shader Errors
    // ========================================================================
    /// A shader stage failed to compile.
    #[error("Failed to compile {stage} shader: {log}")]
    ShaderCompilation {
        /// The stage that failed
        stage: ShaderStage,
        /// Compiler info log
        log: String,
    },

    /// The stages compiled but the program failed to link.
    #[error("Failed to link shader program: {0}")]
    ProgramLink(String),
}

impl GraphicsError {
    pub(crate) fn object_creation(kind: &'static str, message: impl Into<String>) -> Self {
        GraphicsError::ObjectCreation {
            kind,
            message: message.into(),
        }
    }
}

/// Alias for `Result<T, GraphicsError>`.
pub type Result<T> = std::result::Result<T, GraphicsError>;
