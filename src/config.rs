//! Renderer configuration and runtime toggles.

/// Features that can be switched on and off between frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameToggles {
    /// Run the ambient occlusion passes. When off, the occlusion term is 1.
    pub ssao: bool,
    /// Draw per-light volumes. When off, only ambient lighting remains.
    pub dynamic_lighting: bool,
    /// Forward rendering request. Recorded and reported, the pipeline is
    /// always deferred.
    pub forward: bool,
}

impl Default for FrameToggles {
    fn default() -> Self {
        Self {
            ssao: true,
            dynamic_lighting: true,
            forward: false,
        }
    }
}

/// Ambient occlusion sampling parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SsaoSettings {
    /// Seed for the sample kernel and noise tile.
    pub seed: u64,
    /// View-space sampling radius.
    pub radius: f32,
    /// Depth bias against self-occlusion.
    pub bias: f32,
}

impl Default for SsaoSettings {
    fn default() -> Self {
        Self {
            seed: 0x5ca1_ab1e,
            radius: 0.5,
            bias: 0.025,
        }
    }
}

/// Configuration for window creation and the renderer.
///
/// # Example
///
/// ```no_run
/// use gloam::RendererConfig;
///
/// let config = RendererConfig::new()
///     .title("Lights")
///     .size(1920, 1080)
///     .vsync(false)
///     .ssao(false);
/// ```
#[derive(Clone, Debug)]
pub struct RendererConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Block on presentation (Fifo). Off selects a non-blocking present mode.
    pub vsync: bool,
    pub toggles: FrameToggles,
    pub ssao_settings: SsaoSettings,
    /// Scale applied to albedo by the ambient pass.
    pub ambient_strength: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            title: "gloam".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            toggles: FrameToggles::default(),
            ssao_settings: SsaoSettings::default(),
            ambient_strength: 0.3,
        }
    }
}

impl RendererConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn ssao(mut self, enabled: bool) -> Self {
        self.toggles.ssao = enabled;
        self
    }

    pub fn dynamic_lighting(mut self, enabled: bool) -> Self {
        self.toggles.dynamic_lighting = enabled;
        self
    }

    pub fn ssao_seed(mut self, seed: u64) -> Self {
        self.ssao_settings.seed = seed;
        self
    }

    pub fn ambient_strength(mut self, strength: f32) -> Self {
        self.ambient_strength = strength;
        self
    }

    /// Present mode to request, given what the surface supports.
    pub fn present_mode(&self, supported: &[wgpu::PresentMode]) -> wgpu::PresentMode {
        if self.vsync {
            return wgpu::PresentMode::Fifo;
        }
        [wgpu::PresentMode::Immediate, wgpu::PresentMode::Mailbox]
            .into_iter()
            .find(|mode| supported.contains(mode))
            .unwrap_or(wgpu::PresentMode::Fifo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let config = RendererConfig::new()
            .title("x")
            .size(320, 200)
            .ssao(false)
            .dynamic_lighting(false)
            .ssao_seed(9);
        assert_eq!(config.title, "x");
        assert_eq!((config.width, config.height), (320, 200));
        assert!(!config.toggles.ssao);
        assert!(!config.toggles.dynamic_lighting);
        assert_eq!(config.ssao_settings.seed, 9);
    }

    #[test]
    fn vsync_selects_fifo() {
        let config = RendererConfig::new();
        let supported = [wgpu::PresentMode::Immediate, wgpu::PresentMode::Fifo];
        assert_eq!(config.present_mode(&supported), wgpu::PresentMode::Fifo);
    }

    #[test]
    fn no_vsync_prefers_immediate() {
        let config = RendererConfig::new().vsync(false);
        let supported = [wgpu::PresentMode::Fifo, wgpu::PresentMode::Mailbox];
        assert_eq!(config.present_mode(&supported), wgpu::PresentMode::Mailbox);
        let fifo_only = [wgpu::PresentMode::Fifo];
        assert_eq!(config.present_mode(&fifo_only), wgpu::PresentMode::Fifo);
    }
}
