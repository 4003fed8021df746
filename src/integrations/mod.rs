//! 外部接口：HTTP（axum）

pub mod http;

pub use http::{create_router, HttpState};
