use afterimage_gpu::{
    Accumulation, BilateralParams, ClipBox, Neighborhood, UpsampleParams,
    EPSILON, MAX_HISTORY, MAX_RADIUS, MAX_SAMPLES,
};

/// Parameters of the temporal and spatial filters shared by effects.
#[derive(Clone, Debug, PartialEq)]
pub struct DenoiseConfig {
    /// Number of taps on each side of the bilateral filter
    pub kernel_radius: u32,

    /// Standard deviation of the bilateral filter, in texels
    pub sigma: f32,

    /// Maximum depth difference (in view-space units) between two pixels for
    /// them to be considered the same surface
    pub depth_threshold: f32,

    /// Difference between history and the current frame at which history
    /// gets dropped
    pub critical_value: f32,

    /// Whether to estimate and filter at half resolution, upsampling the
    /// result afterwards
    pub half_resolution: bool,
}

impl DenoiseConfig {
    pub fn sanitized(&self) -> Self {
        Self {
            kernel_radius: self.kernel_radius.min(MAX_RADIUS),
            sigma: sanitize(self.sigma),
            depth_threshold: sanitize(self.depth_threshold),
            critical_value: sanitize(self.critical_value),
            half_resolution: self.half_resolution,
        }
    }

    pub fn bilateral(&self) -> BilateralParams {
        BilateralParams {
            radius: self.kernel_radius,
            sigma: self.sigma,
            depth_threshold: self.depth_threshold,
        }
    }

    pub fn upsample(&self) -> UpsampleParams {
        UpsampleParams {
            depth_threshold: self.depth_threshold,
        }
    }

    pub fn accumulation(&self) -> Accumulation {
        Accumulation::Confidence {
            critical_value: self.critical_value,
            max_history: MAX_HISTORY,
        }
    }
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            kernel_radius: 4,
            sigma: 2.0,
            depth_threshold: 0.1,
            critical_value: 0.1,
            half_resolution: false,
        }
    }
}

/// Switches shared by denoised effects.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectConfig {
    pub enabled: bool,

    /// Whether to accumulate the estimate over time; requires motion vectors
    pub temporal: bool,

    /// Whether to run the bilateral filter over the accumulated estimate
    pub bilateral: bool,

    pub denoise: DenoiseConfig,
}

impl EffectConfig {
    pub fn sanitized(&self) -> Self {
        Self {
            denoise: self.denoise.sanitized(),
            ..self.clone()
        }
    }
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            temporal: true,
            bilateral: true,
            denoise: Default::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TaaConfig {
    pub enabled: bool,
    pub clip: ClipBox,
    pub neighborhood: Neighborhood,

    /// How much of the history survives each frame, `<0.0, 1.0>`
    pub history_weight: f32,
}

impl TaaConfig {
    pub fn sanitized(&self) -> Self {
        let clip = match self.clip {
            ClipBox::MinMax => ClipBox::MinMax,
            ClipBox::Variance { gamma } => ClipBox::Variance {
                gamma: if gamma.is_finite() { gamma.max(0.0) } else { 1.0 },
            },
        };

        let history_weight = if self.history_weight.is_finite() {
            self.history_weight.clamp(0.0, 1.0)
        } else {
            Accumulation::DEFAULT_HISTORY_WEIGHT
        };

        Self {
            enabled: self.enabled,
            clip,
            neighborhood: self.neighborhood,
            history_weight,
        }
    }

    pub fn accumulation(&self) -> Accumulation {
        Accumulation::Clip {
            neighborhood: self.neighborhood,
            clip: self.clip,
            history_weight: self.history_weight,
        }
    }
}

impl Default for TaaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            clip: ClipBox::MinMax,
            neighborhood: Neighborhood::Box3x3,
            history_weight: Accumulation::DEFAULT_HISTORY_WEIGHT,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SsaoConfig {
    pub effect: EffectConfig,

    /// Radius of the sampling disk, in full-resolution pixels
    pub radius: f32,

    pub samples: u32,

    /// Minimum depth difference for a tap to count as an occluder
    pub bias: f32,

    pub intensity: f32,

    /// Depth difference past which occluders stop contributing
    pub max_distance: f32,
}

impl SsaoConfig {
    pub fn sanitized(&self) -> Self {
        Self {
            effect: self.effect.sanitized(),
            radius: if self.radius.is_finite() {
                self.radius.max(0.0)
            } else {
                0.0
            },
            samples: self.samples.clamp(1, MAX_SAMPLES),
            bias: if self.bias.is_finite() {
                self.bias.max(0.0)
            } else {
                0.0
            },
            intensity: if self.intensity.is_finite() {
                self.intensity.max(0.0)
            } else {
                0.0
            },
            max_distance: sanitize(self.max_distance),
        }
    }
}

impl Default for SsaoConfig {
    fn default() -> Self {
        Self {
            effect: Default::default(),
            radius: 8.0,
            samples: 16,
            bias: 0.025,
            intensity: 1.0,
            max_distance: 1.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SsgiConfig {
    pub effect: EffectConfig,
}

impl SsgiConfig {
    pub fn sanitized(&self) -> Self {
        Self {
            effect: self.effect.sanitized(),
        }
    }
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value.max(EPSILON)
    } else {
        EPSILON
    }
}
