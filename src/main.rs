use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fastgets::{wait_for_shutdown_signal, AppMode, Application, ShutdownManager};
use fastgets_core::config::LogFormat;
use fastgets_core::{init_logging, AppConfig, JobDefinition};
use serde::Serialize;
use tracing::{error, info, warn};

/// fastgets 命令行
#[derive(Parser, Debug)]
#[command(name = "fastgets")]
#[command(version)]
#[command(about = "分布式任务调度与爬虫Worker框架")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件路径，不指定时按默认路径查找
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short = 'l', long, global = true, value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// 日志格式，覆盖配置文件
    #[arg(long, global = true, value_parser = ["json", "pretty"])]
    log_format: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 运行Worker
    Worker {
        /// 实例ID，默认为 `主机名-进程号`
        #[arg(long)]
        instance_id: Option<String>,
    },
    /// 运行管理接口
    Api {
        /// 监听地址，覆盖配置文件
        #[arg(long)]
        bind: Option<String>,
    },
    /// 在同一进程中运行Worker和管理接口
    All,
    /// 任务定义管理
    Job(JobCommands),
    /// 错误日志
    Errors(ErrorCommands),
    /// 查看某个实例产生或认领的任务
    Tasks {
        #[arg(long)]
        instance_id: String,
    },
    /// 在任务池之外执行一次执行器，并记录脚本日志
    Script {
        /// 执行器名称或任务名
        #[arg(short, long)]
        name: String,
        /// 任务参数 (JSON格式)
        #[arg(short, long)]
        payload: Option<String>,
    },
}

#[derive(Args, Debug)]
struct JobCommands {
    #[command(subcommand)]
    action: JobActions,
}

#[derive(Subcommand, Debug)]
enum JobActions {
    /// 新增或替换任务定义
    Add {
        #[arg(short, long)]
        name: String,
        /// Cron表达式，5段或6段
        #[arg(short, long)]
        trigger: String,
        /// 任务参数 (JSON格式)
        #[arg(short, long)]
        payload: Option<String>,
        /// 保存为停用状态
        #[arg(long)]
        disabled: bool,
    },
    /// 按名称删除任务定义
    Delete {
        name: String,
    },
    /// 列出任务定义
    List,
}

#[derive(Args, Debug)]
struct ErrorCommands {
    #[command(subcommand)]
    action: ErrorActions,
}

#[derive(Subcommand, Debug)]
enum ErrorActions {
    /// 列出最新的错误记录
    List {
        #[arg(long, default_value_t = fastgets_coordinator::DEFAULT_ERROR_LIST_LIMIT)]
        limit: usize,
    },
    /// 清空错误记录
    Flush,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())
        .with_context(|| format!("加载配置失败: {}", cli.config.as_deref().unwrap_or("默认路径")))?;
    apply_overrides(&mut config, &cli)?;

    init_logging(&config.logging)?;

    match cli.command {
        Commands::Worker { .. } => run_service(config, AppMode::Worker).await,
        Commands::Api { .. } => run_service(config, AppMode::Api).await,
        Commands::All => run_service(config, AppMode::All).await,
        Commands::Job(job) => {
            let app = Application::new(config).await?;
            run_job_command(&app, job.action).await
        }
        Commands::Errors(errors) => {
            let app = Application::new(config).await?;
            let sink = &app.services().sink;
            match errors.action {
                ErrorActions::List { limit } => print_json(&sink.list_errors(limit).await?),
                ErrorActions::Flush => {
                    let removed = sink.flush_all().await?;
                    println!("已清空 {removed} 条错误记录");
                    Ok(())
                }
            }
        }
        Commands::Tasks { instance_id } => {
            let app = Application::new(config).await?;
            print_json(&app.services().pool.tasks_for_instance(&instance_id).await?)
        }
        Commands::Script { name, payload } => {
            let app = Application::new(config).await?;
            let payload = parse_payload(payload.as_deref())?;
            let result = app.run_script(&name, payload).await?;
            print_json(&result)
        }
    }
}

/// 命令行参数覆盖配置文件
fn apply_overrides(config: &mut AppConfig, cli: &Cli) -> Result<()> {
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = match format.as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
    }
    match &cli.command {
        Commands::Worker {
            instance_id: Some(id),
        } => config.worker.instance_id = Some(id.clone()),
        Commands::Api { bind: Some(bind) } => config.api.bind_address = bind.clone(),
        _ => {}
    }
    config.validate()
}

async fn run_service(config: AppConfig, mode: AppMode) -> Result<()> {
    info!("启动 fastgets，模式: {:?}", mode);

    let mut app = Application::new(config).await?;
    if mode != AppMode::Worker {
        app.install_metrics()?;
    }

    let shutdown_manager = ShutdownManager::new();
    let shutdown_rx = shutdown_manager.subscribe().await;
    let mut app_handle = tokio::spawn(async move { app.run(mode, shutdown_rx).await });

    let finished_early = tokio::select! {
        _ = wait_for_shutdown_signal() => None,
        result = &mut app_handle => Some(result),
    };

    let result = match finished_early {
        Some(result) => result,
        None => {
            info!("收到关闭信号，开始优雅关闭...");
            shutdown_manager.shutdown().await;
            match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("应用关闭超时，强制退出");
                    return Ok(());
                }
            }
        }
    };

    match result.context("应用任务异常终止")? {
        Ok(()) => {
            info!("fastgets 已退出");
            Ok(())
        }
        Err(e) => {
            error!("应用运行失败: {:#}", e);
            Err(e)
        }
    }
}

async fn run_job_command(app: &Application, action: JobActions) -> Result<()> {
    let registry = &app.services().registry;
    match action {
        JobActions::Add {
            name,
            trigger,
            payload,
            disabled,
        } => {
            let definition = JobDefinition::new(name, trigger)
                .with_payload(parse_payload(payload.as_deref())?)
                .enabled(!disabled);
            let job = registry.upsert_definition(definition).await?;
            if let Some(next) = registry.next_fire_time(&job.name, chrono::Utc::now()).await? {
                println!("下次触发时间: {}", next.to_rfc3339());
            }
            print_json(&job)
        }
        JobActions::Delete { name } => {
            registry.delete(&name).await?;
            println!("已删除任务定义: {name}");
            Ok(())
        }
        JobActions::List => print_json(&registry.list().await?),
    }
}

fn parse_payload(raw: Option<&str>) -> Result<serde_json::Value> {
    match raw {
        Some(raw) => serde_json::from_str(raw).context("任务参数不是合法的JSON"),
        None => Ok(serde_json::json!({})),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
