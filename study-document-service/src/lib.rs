pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod tasks;

pub use config::{ContentStrategyKind, ServiceConfig};
pub use error::{StudyError, StudyResult};
pub use models::*;
pub use service::{AppState, build_router, create_app};
