//! Registry infrastructure - File-backed model version store

mod model_registry;

pub use model_registry::{
    ModelRegistry, ARTIFACTS_DIR, METADATA_FILE, MODELS_DIR, REGISTRY_INDEX_FILE,
};
