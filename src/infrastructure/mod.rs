//! Infrastructure layer - File-backed stores, services and logging

pub mod experiment;
pub mod locks;
pub mod logging;
pub mod registry;
pub mod services;
pub mod storage;
