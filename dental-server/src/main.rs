//! 牙科诊所服务器主程序

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dental_admin::{init_logging, DentalConfig, Metrics};
use dental_database::{ConnectionSettings, DatabasePool, DatabaseQueries, Repositories};
use dental_storage::StorageManager;
use dental_web::{AppState, AuthService, WebServer, WebSettings};
use dental_workflow::{ClinicEngine, WorkflowSettings};
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// 牙科诊所管理服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "dental-server", version)]
#[command(about = "牙科诊所管理服务：患者、治疗、照片与AI分析的 REST API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 启动 HTTP 服务（默认）
    Serve(ServeArgs),
    /// 写出默认配置文件
    InitConfig {
        /// 目标路径
        path: PathBuf,
        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 监听主机，覆盖配置
    #[arg(long)]
    host: Option<String>,

    /// 监听端口，覆盖配置
    #[arg(short, long)]
    port: Option<u16>,

    /// 日志级别，覆盖配置
    #[arg(short, long)]
    log_level: Option<String>,

    /// 使用内存存储代替 PostgreSQL（数据不持久化）
    #[arg(long)]
    memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => serve(args).await,
        Command::InitConfig { path, force } => init_config(&path, force),
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists, use --force to overwrite", path.display());
    }
    DentalConfig::default().write_to(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

async fn serve(args: ServeArgs) -> Result<()> {
    let mut config = DentalConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    init_logging(&config.logging)?;
    config.validate()?;

    info!("启动牙科诊所服务器...");
    info!("  服务名称: {}", config.server.name);
    info!("  存储目录: {}", config.storage.root_path);

    let repos = if args.memory {
        warn!("Using in-memory storage, data will be lost on shutdown");
        Repositories::in_memory()
    } else {
        let settings = ConnectionSettings {
            url: config.database.url.clone(),
            max_connections: config.database.max_connections,
            min_connections: config.database.min_connections,
            acquire_timeout: config.database.acquire_timeout(),
            idle_timeout: config.database.idle_timeout(),
        };
        let pool = DatabasePool::connect(&settings)
            .await
            .context("Failed to connect to PostgreSQL")?;
        DatabaseQueries::new(pool.clone())
            .create_tables()
            .await
            .context("Failed to create database schema")?;
        Repositories::postgres(pool)
    };

    let storage = StorageManager::new(&config.storage.root_path);
    storage.ensure_ready().await?;

    let auth = Arc::new(AuthService::new(
        repos.users.clone(),
        &config.auth.jwt_secret,
        config.auth.token_expiry_hours,
    ));
    if config.auth.bootstrap_admin {
        auth.bootstrap_admin(
            &config.auth.admin_username,
            &config.auth.admin_email,
            &config.auth.admin_password,
        )
        .await?;
    }

    let engine = ClinicEngine::new(
        repos,
        storage,
        WorkflowSettings {
            max_photo_bytes: config.storage.max_photo_bytes,
        },
    );
    let state = AppState {
        engine,
        auth,
        metrics: Metrics::new()?,
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;
    let web_settings = WebSettings {
        body_limit_bytes: config.server.body_limit_bytes,
        cors_allowed_origins: config.server.cors_allowed_origins.clone(),
    };

    let server = WebServer::new(addr, state, &web_settings);
    if let Err(e) = server.run(shutdown_signal()).await {
        error!("服务器运行失败: {}", e);
        return Err(e.into());
    }

    info!("服务器已关闭");
    Ok(())
}

async fn shutdown_signal() {
    wait_for_shutdown(tokio::signal::ctrl_c()).await
}

/// 等待关闭信号；无法监听信号时一直运行
async fn wait_for_shutdown<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => {
            error!("Failed to listen for shutdown signal, graceful shutdown disabled: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_completes_shutdown() {
        let signal = async { Ok::<(), std::io::Error>(()) };
        let result = tokio::time::timeout(Duration::from_secs(1), wait_for_shutdown(signal)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_signal_error_keeps_server_running() {
        let failing = async {
            Err::<(), _>(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no signal handler",
            ))
        };
        let result =
            tokio::time::timeout(Duration::from_millis(100), wait_for_shutdown(failing)).await;
        assert!(result.is_err(), "shutdown future must not resolve when signal setup fails");
    }

    #[test]
    fn test_cli_defaults_to_serve() {
        let cli = Cli::try_parse_from(["dental-server"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["dental-server", "serve", "--memory", "--port", "9090"])
            .unwrap();
        match cli.command {
            Some(Command::Serve(args)) => {
                assert!(args.memory);
                assert_eq!(args.port, Some(9090));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
