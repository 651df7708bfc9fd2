//! Graph file front-ends.

pub mod yaml;
