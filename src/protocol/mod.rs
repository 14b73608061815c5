pub mod decoder;

pub use decoder::{decode_frame, DecodeError};
