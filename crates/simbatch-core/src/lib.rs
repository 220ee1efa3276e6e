#![deny(missing_docs)]
#![doc = "Error model and canonical serialization shared by every simbatch crate."]

pub mod errors;
pub mod hash;
pub mod serde;

pub use errors::{BatchError, ErrorInfo, FailureReport, RunFailure};
pub use hash::stable_hash_string;
pub use crate::serde::{
    from_json_slice, to_artifact_bytes, to_canonical_json_bytes, to_normalized_value,
};
