pub mod anchor;
pub mod workflow;
