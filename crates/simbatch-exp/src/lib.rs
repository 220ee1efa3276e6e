//! Parameter spaces and the experiment contract used by campaigns.

mod space;
mod spec;

pub use space::{Axis, ParameterPoint, ParameterSpace, Points};
pub use spec::{
    ExperimentArtifacts, ExperimentSpec, InputSchema, FLOWS_FILE, PROVENANCE_FILE,
    TOPOLOGY_FILE,
};
