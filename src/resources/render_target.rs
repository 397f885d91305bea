use glam::UVec2;

use crate::resources::color::Color;
use crate::resources::render_texture::{RenderBuffer, RenderBufferType};

/// What happens to an attachment's previous contents when a pass begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderBufferLoadAction {
    #[default]
    Clear,
    Load,
}

/// What happens to a multisampled attachment when a pass ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderBufferStoreAction {
    #[default]
    Resolve,
    DontCare,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargetColorAttachment {
    pub buffer: RenderBuffer,
    pub load_action: RenderBufferLoadAction,
    pub store_action: RenderBufferStoreAction,
    pub clear_color: Color,
}

impl RenderTargetColorAttachment {
    #[must_use]
    pub fn new(buffer: RenderBuffer) -> Self {
        Self {
            buffer,
            load_action: RenderBufferLoadAction::Clear,
            store_action: RenderBufferStoreAction::Resolve,
            clear_color: Color::CLEAR,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargetDepthAttachment {
    pub buffer: RenderBuffer,
    pub load_action: RenderBufferLoadAction,
    pub store_action: RenderBufferStoreAction,
}

impl RenderTargetDepthAttachment {
    #[must_use]
    pub fn new(buffer: RenderBuffer) -> Self {
        Self {
            buffer,
            load_action: RenderBufferLoadAction::Clear,
            store_action: RenderBufferStoreAction::DontCare,
        }
    }
}

/// Ordered color attachments plus exactly one depth/stencil attachment.
///
/// All attachments must share pixel dimensions and anti-aliasing level.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTarget {
    pub colors: Vec<RenderTargetColorAttachment>,
    pub depth: RenderTargetDepthAttachment,
}

impl RenderTarget {
    #[must_use]
    pub fn new(colors: Vec<RenderTargetColorAttachment>, depth: RenderTargetDepthAttachment) -> Self {
        Self { colors, depth }
    }

    fn reference_buffer(&self) -> &RenderBuffer {
        self.colors.first().map_or(&self.depth.buffer, |c| &c.buffer)
    }

    #[must_use]
    pub fn dimensions(&self) -> UVec2 {
        self.reference_buffer().dimensions()
    }

    #[must_use]
    pub fn anti_aliasing_level(&self) -> u32 {
        self.reference_buffer().anti_aliasing_level()
    }

    /// Panics on a malformed target.
    pub(crate) fn validate(&self) {
        let dimensions = self.dimensions();
        let aa = self.anti_aliasing_level();

        for (i, color) in self.colors.iter().enumerate() {
            assert_eq!(
                color.buffer.buffer_type(),
                RenderBufferType::Color,
                "color attachment {i} must be a color buffer"
            );
            assert_eq!(
                color.buffer.dimensions(),
                dimensions,
                "color attachment {i} has different dimensions from the first attachment"
            );
            assert_eq!(
                color.buffer.anti_aliasing_level(),
                aa,
                "color attachment {i} has a different anti-aliasing level from the first attachment"
            );
        }

        assert_eq!(
            self.depth.buffer.buffer_type(),
            RenderBufferType::Depth,
            "the depth attachment must be a depth buffer"
        );
        assert_eq!(
            self.depth.buffer.dimensions(),
            dimensions,
            "the depth attachment has different dimensions from the color attachments"
        );
        assert_eq!(
            self.depth.buffer.anti_aliasing_level(),
            aa,
            "the depth attachment has a different anti-aliasing level from the color attachments"
        );
    }
}
