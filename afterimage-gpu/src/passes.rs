use bytemuck::{Pod, Zeroable};

use crate::{
    Accumulation, Axis, BilateralParams, ClipBox, Neighborhood, SsaoParams,
    UpsampleParams,
};

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct AccumulatePassParams {
    /// 0 = clip, 1 = confidence
    pub mode: u32,

    /// 0 = single, 1 = 3x3 box
    pub neighborhood: u32,

    /// 0 = min-max, 1 = variance
    pub clip: u32,

    pub _pad0: u32,
    pub history_weight: f32,
    pub gamma: f32,
    pub critical_value: f32,
    pub max_history: f32,
}

impl AccumulatePassParams {
    pub fn policy(&self) -> Accumulation {
        if self.mode == 1 {
            Accumulation::Confidence {
                critical_value: self.critical_value,
                max_history: self.max_history,
            }
        } else {
            Accumulation::Clip {
                neighborhood: if self.neighborhood == 0 {
                    Neighborhood::Single
                } else {
                    Neighborhood::Box3x3
                },
                clip: if self.clip == 0 {
                    ClipBox::MinMax
                } else {
                    ClipBox::Variance { gamma: self.gamma }
                },
                history_weight: self.history_weight,
            }
        }
    }
}

impl From<Accumulation> for AccumulatePassParams {
    fn from(policy: Accumulation) -> Self {
        match policy {
            Accumulation::Clip {
                neighborhood,
                clip,
                history_weight,
            } => {
                let (clip, gamma) = match clip {
                    ClipBox::MinMax => (0, 0.0),
                    ClipBox::Variance { gamma } => (1, gamma),
                };

                Self {
                    mode: 0,
                    neighborhood: match neighborhood {
                        Neighborhood::Single => 0,
                        Neighborhood::Box3x3 => 1,
                    },
                    clip,
                    gamma,
                    history_weight,
                    ..Default::default()
                }
            }

            Accumulation::Confidence {
                critical_value,
                max_history,
            } => Self {
                mode: 1,
                critical_value,
                max_history,
                ..Default::default()
            },
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BilateralPassParams {
    pub radius: u32,

    /// 0 = horizontal, 1 = vertical
    pub axis: u32,

    pub sigma: f32,
    pub depth_threshold: f32,
}

impl BilateralPassParams {
    pub fn new(params: BilateralParams, axis: Axis) -> Self {
        Self {
            radius: params.radius,
            axis: match axis {
                Axis::Horizontal => 0,
                Axis::Vertical => 1,
            },
            sigma: params.sigma,
            depth_threshold: params.depth_threshold,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct UpsamplePassParams {
    pub depth_threshold: f32,
    pub _pad0: u32,
    pub _pad1: u32,
    pub _pad2: u32,
}

impl From<UpsampleParams> for UpsamplePassParams {
    fn from(params: UpsampleParams) -> Self {
        Self {
            depth_threshold: params.depth_threshold,
            ..Default::default()
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SsaoPassParams {
    pub radius: f32,
    pub samples: u32,
    pub bias: f32,
    pub intensity: f32,
    pub max_distance: f32,
    pub frame: u32,
    pub _pad0: u32,
    pub _pad1: u32,
}

impl From<SsaoParams> for SsaoPassParams {
    fn from(params: SsaoParams) -> Self {
        Self {
            radius: params.radius,
            samples: params.samples,
            bias: params.bias,
            intensity: params.intensity,
            max_distance: params.max_distance,
            frame: params.frame,
            ..Default::default()
        }
    }
}
