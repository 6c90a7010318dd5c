//! 中间件模块

mod request;

pub use request::request_context;
