//! Configuration types: pipeline tunables and regime rule settings.

mod metrics;
mod regime;

pub use metrics::{
    AdaptiveParams, AlignmentCoeffs, AnalyticsConfig, DteScaling, FlowParams, HeatmapParams,
    SessionParams, UgchWeights,
};
pub use regime::RegimeSettings;
