//! Stored OpenAPI documents: model, typed tree, structural editor and the
//! swagger-comment extractor.

pub mod editor;
mod model;
pub mod openapi;
mod service;
pub mod swagger;

pub use model::{
    ApiSpec, ApiSpecFilter, ApiSpecHistoryEntry, ApiSpecPatch, ApiSpecSnapshot, ApiSpecVersion,
    NewApiSpec, OperationChange, SourceType,
};
pub(crate) use service::{no_operations, ApiSpecDraft};
