//! Renderer configuration.

/// Settings fixed for the lifetime of a renderer.
///
/// Built with the same chained-setter style as the rest of the crate:
///
/// ```
/// use phalanx::RendererConfig;
///
/// let config = RendererConfig::new()
///     .clear_color(0.0, 0.0, 0.0)
///     .power_preference(wgpu::PowerPreference::LowPower);
/// assert_eq!(config.clear_color.r, 0.0);
/// ```
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Background the color attachment is cleared to at the start of every frame.
    pub clear_color: wgpu::Color,
    pub power_preference: wgpu::PowerPreference,
    pub present_mode: wgpu::PresentMode,
    /// When set, the platform presents the surface texture itself (browsers do
    /// this at the end of the animation frame) and the explicit present call
    /// is skipped.
    pub implicit_present: bool,
    /// Label given to the wgpu device.
    pub label: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            clear_color: wgpu::Color {
                r: 0.1,
                g: 0.2,
                b: 0.3,
                a: 1.0,
            },
            power_preference: wgpu::PowerPreference::default(),
            present_mode: wgpu::PresentMode::Fifo,
            implicit_present: cfg!(target_arch = "wasm32"),
            label: "Phalanx Device".to_string(),
        }
    }
}

impl RendererConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_color(mut self, r: f64, g: f64, b: f64) -> Self {
        self.clear_color = wgpu::Color { r, g, b, a: 1.0 };
        self
    }

    pub fn power_preference(mut self, preference: wgpu::PowerPreference) -> Self {
        self.power_preference = preference;
        self
    }

    pub fn present_mode(mut self, mode: wgpu::PresentMode) -> Self {
        self.present_mode = mode;
        self
    }

    pub fn implicit_present(mut self, implicit: bool) -> Self {
        self.implicit_present = implicit;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}
