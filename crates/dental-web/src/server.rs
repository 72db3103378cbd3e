//! Web服务器

use axum::{
    extract::{DefaultBodyLimit, FromRef, MatchedPath, Request, State},
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use dental_admin::Metrics;
use dental_core::{DentalError, Result};
use dental_workflow::ClinicEngine;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::auth::{
    auth_middleware, create_user_handler, get_current_user, list_users_handler, login_handler,
    AuthService,
};
use crate::handlers::{analyses, api_root, health, metrics_handler, patients, photos, stats, treatments};

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    pub engine: ClinicEngine,
    pub auth: Arc<AuthService>,
    pub metrics: Metrics,
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

/// HTTP 层参数
#[derive(Debug, Clone)]
pub struct WebSettings {
    pub body_limit_bytes: usize,
    /// 为空时允许任意源
    pub cors_allowed_origins: Vec<String>,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            body_limit_bytes: 25 * 1024 * 1024,
            cors_allowed_origins: Vec::new(),
        }
    }
}

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState, settings: &WebSettings) -> Self {
        let app = create_app(state, settings);
        Self { addr, app }
    }

    /// 运行直到 `shutdown` 完成
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| DentalError::Internal(format!("web server failed: {}", e)))?;

        info!("Web server stopped");
        Ok(())
    }
}

/// 构建完整路由
pub fn create_app(state: AppState, settings: &WebSettings) -> Router {
    let protected = api_routes()
        .route("/auth/me", get(get_current_user))
        .route("/users", get(list_users_handler).post(create_user_handler))
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ));

    let api = Router::new()
        .route("/auth/login", post(login_handler))
        .merge(protected);

    Router::new()
        // 根路径
        .route("/", get(api_root))
        // 健康检查
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        // API路由
        .nest("/api/v1", api)
        .layer(middleware::from_fn_with_state(state.clone(), track_metrics))
        // 全局中间件
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&settings.cors_allowed_origins))
                .layer(DefaultBodyLimit::max(settings.body_limit_bytes)),
        )
        .with_state(state)
}

/// API v1 路由（需要认证）
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/patients", get(patients::list).post(patients::create))
        .route(
            "/patients/:id",
            get(patients::get).put(patients::update).delete(patients::delete),
        )
        .route("/patients/:id/summary", get(patients::summary))
        .route("/patients/:id/activate", post(patients::activate))
        .route("/patients/:id/deactivate", post(patients::deactivate))
        .route("/patients/:id/archive", post(patients::archive))
        .route(
            "/patients/:id/treatments",
            get(treatments::list_for_patient).post(treatments::create),
        )
        .route("/treatments", get(treatments::list))
        .route(
            "/treatments/:id",
            get(treatments::get)
                .put(treatments::update)
                .delete(treatments::delete),
        )
        .route("/treatments/:id/start", post(treatments::start))
        .route("/treatments/:id/complete", post(treatments::complete))
        .route("/treatments/:id/hold", post(treatments::hold))
        .route("/treatments/:id/resume", post(treatments::resume))
        .route("/treatments/:id/cancel", post(treatments::cancel))
        .route(
            "/treatments/:id/photos",
            get(photos::list_for_treatment).post(photos::register),
        )
        .route("/photos/:id", get(photos::get).delete(photos::delete))
        .route(
            "/photos/:id/content",
            put(photos::upload_content).get(photos::download_content),
        )
        .route("/photos/:id/archive", post(photos::archive))
        .route(
            "/photos/:id/analyses",
            get(analyses::list_for_photo).post(analyses::request),
        )
        .route("/analyses/:id", get(analyses::get).delete(analyses::delete))
        .route("/analyses/:id/start", post(analyses::start))
        .route("/analyses/:id/complete", post(analyses::complete))
        .route("/analyses/:id/fail", post(analyses::fail))
        .route("/analyses/:id/cancel", post(analyses::cancel))
        .route("/analyses/:id/retry", post(analyses::retry))
        .route("/stats", get(stats))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(parsed)
}

/// 记录请求计数与延迟，标签使用路由模板
async fn track_metrics(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    state.metrics.record_http_request(
        &method,
        &route,
        response.status().as_u16(),
        started.elapsed(),
    );
    response
}
