// Library root: exposes the draft service, its collaborators and config so
// the binary and integration tests share one API.

pub mod catalog;
pub mod config;
pub mod db;
pub mod registration;
pub mod repo;
pub mod service;

pub use service::{DraftService, EngineKind, ServiceError, Stores};
