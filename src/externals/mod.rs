pub mod landmark_source;
pub mod transport;
