//! Prometheus 指标

use anyhow::{Context, Result};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::time::{Duration, Instant};
use tracing::debug;

/// 服务指标收集器
#[derive(Debug, Clone)]
pub struct Metrics {
    /// Prometheus指标注册表
    registry: Registry,
    /// HTTP请求计数器
    http_requests_total: IntCounterVec,
    /// HTTP请求延迟直方图
    http_request_duration: HistogramVec,
    /// 业务事件计数器（实体 + 事件）
    domain_events_total: IntCounterVec,
    started: Instant,
}

impl Metrics {
    /// 创建并注册所有指标
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("dental".to_string()), None)
            .context("Failed to create metrics registry")?;

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "route", "status"],
        )?;

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["method", "route"],
        )?;

        let domain_events_total = IntCounterVec::new(
            Opts::new("domain_events_total", "Status changes applied to clinic records"),
            &["entity", "event"],
        )?;

        let start_time_seconds = IntGauge::with_opts(Opts::new(
            "start_time_seconds",
            "Unix time the server started",
        ))?;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        start_time_seconds.set(now.as_secs() as i64);

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;
        registry.register(Box::new(domain_events_total.clone()))?;
        registry.register(Box::new(start_time_seconds.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration,
            domain_events_total,
            started: Instant::now(),
        })
    }

    /// 记录HTTP请求，`route` 应为路由模板而非实际路径
    pub fn record_http_request(&self, method: &str, route: &str, status: u16, duration: Duration) {
        debug!("HTTP request: {} {} - {} in {:?}", method, route, status, duration);

        self.http_requests_total
            .with_label_values(&[method, route, &status.to_string()])
            .inc();
        self.http_request_duration
            .with_label_values(&[method, route])
            .observe(duration.as_secs_f64());
    }

    /// 记录业务状态变更
    pub fn record_domain_event(&self, entity: &str, event: &str) {
        self.domain_events_total
            .with_label_values(&[entity, event])
            .inc();
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// 文本格式导出
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        String::from_utf8(buffer).context("Metrics output is not UTF-8")
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_recorded_samples() {
        let metrics = Metrics::new().unwrap();
        metrics.record_http_request("GET", "/api/v1/patients/:id", 200, Duration::from_millis(12));
        metrics.record_http_request("GET", "/api/v1/patients/:id", 404, Duration::from_millis(3));
        metrics.record_domain_event("treatment", "Start");

        let text = metrics.render().unwrap();
        assert!(text.contains("dental_http_requests_total"));
        assert!(text.contains("route=\"/api/v1/patients/:id\""));
        assert!(text.contains("status=\"404\""));
        assert!(text.contains("dental_domain_events_total{entity=\"treatment\",event=\"Start\"} 1"));
        assert!(text.contains("dental_start_time_seconds"));
    }

    #[test]
    fn test_registries_are_independent() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();
        first.record_domain_event("photo", "Archive");
        assert!(!second.render().unwrap().contains("event=\"Archive\""));
    }
}
