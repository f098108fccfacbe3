pub mod artifact;
pub mod pipeline;
