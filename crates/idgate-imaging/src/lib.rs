//! Image handling for the idgate capture pipeline: normalization of captured
//! frames to the fixed submission format, and base64/data-URI payload codecs.

pub mod normalize;
pub mod payload;

pub use normalize::{normalize, CropStrategy, NormalizeConfig, NormalizeError};
pub use payload::{decode_image_payload, encode_image_payload, PayloadError};
