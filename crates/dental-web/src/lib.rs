//! # 牙科 Web 模块
//!
//! REST API：路由、处理器、JWT 认证中间件以及错误到 HTTP 状态码的映射

pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod server;

pub use auth::{AuthService, AuthUser};
pub use error::{ApiError, ApiResult};
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use server::{create_app, AppState, WebServer, WebSettings};
