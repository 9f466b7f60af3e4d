pub mod daemon;
pub mod job;
pub mod tangle;
pub mod weave;
