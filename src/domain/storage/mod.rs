//! Storage domain - persistence seam for whole-document indexes

mod entity;
mod repository;

pub use entity::StorageDocument;
pub use repository::DocumentStore;

#[cfg(test)]
pub use repository::mock;
