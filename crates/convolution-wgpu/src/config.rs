//! Renderer configuration

use crate::frame::FillOrientation;

/// Settings fixed for the lifetime of a renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    /// How video frames are fitted onto the capture canvas
    pub fill_orientation: FillOrientation,
    /// Color every pass clears its target to before drawing
    pub clear_color: wgpu::Color,
    /// Adapter preference when creating the GPU context
    pub power_preference: wgpu::PowerPreference,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fill_orientation: FillOrientation::Vertical,
            clear_color: wgpu::Color::TRANSPARENT,
            power_preference: wgpu::PowerPreference::HighPerformance,
        }
    }
}

impl RenderConfig {
    /// Replaces the fill orientation
    pub fn with_fill_orientation(self, fill_orientation: FillOrientation) -> Self {
        Self { fill_orientation, ..self }
    }

    /// Replaces the adapter preference
    pub fn with_power_preference(self, power_preference: wgpu::PowerPreference) -> Self {
        Self { power_preference, ..self }
    }
}
