//! Version domain - semantic versions and bump policy

mod semantic;

pub use semantic::{BumpType, SemanticVersion};
