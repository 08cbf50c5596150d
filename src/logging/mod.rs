//! 基于 tracing 的日志子系统.
//!
//! 控制台输出带颜色与源码位置; 文件输出写入 `<directory>/<prefix>.<YYYY-MM-DD>.log`,
//! 跨日后自动切换到新文件. 历史日志按保留天数清理, 可选 gzip 压缩.
//! 库 crate 通过 `log` 门面输出, 由 tracing-subscriber 统一收集.

use anyhow::{Context, Result, bail};
use chrono::{Datelike, Local, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

mod task;

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 过滤级别 (EnvFilter 语法), 设置了 `RUST_LOG` 时以环境变量为准
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub console: bool,
    #[serde(default)]
    pub file: bool,
    #[serde(default = "default_directory")]
    pub directory: String,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_true")]
    pub compress_history: bool,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_directory() -> String {
    "logs".to_string()
}

fn default_file_prefix() -> String {
    "avclite".to_string()
}

fn default_retention_days() -> i64 {
    30
}

fn default_cleanup_interval() -> u64 {
    3600
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            console: true,
            file: false,
            directory: default_directory(),
            file_prefix: default_file_prefix(),
            retention_days: default_retention_days(),
            compress_history: true,
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
static LOG_MAINTENANCE: Mutex<Option<task::LogMaintenance>> = Mutex::new(None);

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// 安装全局日志订阅器
///
/// 每个进程只能成功调用一次, 再次调用返回错误.
pub fn init(config: &LoggingConfig) -> Result<()> {
    if LOG_GUARD.get().is_some() {
        bail!("日志系统已初始化");
    }

    let console_layer = config.console.then(|| {
        fmt::Layer::default()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .event_format(ConsoleFormatter)
            .with_filter(build_filter(&config.level))
    });

    let mut guard = None;
    let file_layer = if config.file {
        std::fs::create_dir_all(&config.directory)
            .with_context(|| format!("创建日志目录失败, path={}", config.directory))?;
        task::cleanup_logs(config)?;
        let writer = CurrentFileWriter::new(Path::new(&config.directory), &config.file_prefix)?;
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(writer);
        guard = Some(worker_guard);
        Some(
            fmt::Layer::default()
                .with_writer(non_blocking)
                .with_ansi(false)
                .event_format(FileFormatter)
                .with_filter(build_filter(&config.level)),
        )
    } else {
        None
    };

    // try_init 同时安装 log -> tracing 桥接
    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("安装全局日志订阅器失败")?;

    if let Some(guard) = guard {
        LOG_GUARD.set(guard).ok();
        match task::LogMaintenance::spawn(config.clone()) {
            Ok(maintenance) => {
                if let Ok(mut slot) = LOG_MAINTENANCE.lock() {
                    *slot = Some(maintenance);
                }
            }
            Err(err) => tracing::error!("{:#}", err),
        }
    }
    Ok(())
}

/// 停止后台日志维护线程, 未启动时无操作
pub fn shutdown() {
    let maintenance = LOG_MAINTENANCE.lock().ok().and_then(|mut slot| slot.take());
    if let Some(maintenance) = maintenance {
        maintenance.stop();
    }
}

/// 按日期切换的日志文件写入器
struct CurrentFileWriter {
    directory: PathBuf,
    prefix: String,
    date: NaiveDate,
    file: File,
}

impl CurrentFileWriter {
    fn new(directory: &Path, prefix: &str) -> Result<Self> {
        let date = Local::now().date_naive();
        let file = open_append_file(&build_current_log_path(directory, prefix, date))?;
        Ok(Self {
            directory: directory.to_path_buf(),
            prefix: prefix.to_string(),
            date,
            file,
        })
    }

    fn roll_if_needed(&mut self) -> std::io::Result<()> {
        let today = Local::now().date_naive();
        if today == self.date {
            return Ok(());
        }
        let path = build_current_log_path(&self.directory, &self.prefix, today);
        self.file = open_append_file(&path).map_err(std::io::Error::other)?;
        self.date = today;
        Ok(())
    }
}

impl Write for CurrentFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.roll_if_needed()?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

fn open_append_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("打开日志文件失败, path={}", path.display()))
}

pub(crate) fn build_current_log_path(directory: &Path, prefix: &str, date: NaiveDate) -> PathBuf {
    directory.join(format!("{}.{}.log", prefix, date.format("%Y-%m-%d")))
}

fn write_timestamp(writer: &mut Writer<'_>) -> std::fmt::Result {
    let now = Local::now();
    write!(
        writer,
        "[{:02}-{:02} {:02}:{:02}:{:02}.{:03}] ",
        now.month(),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.timestamp_subsec_millis()
    )
}

struct ConsoleFormatter;

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        write_timestamp(&mut writer)?;
        let color = match *meta.level() {
            tracing::Level::ERROR => "\x1b[31m",
            tracing::Level::WARN => "\x1b[33m",
            tracing::Level::INFO => "\x1b[32m",
            _ => "\x1b[34m",
        };
        write!(
            writer,
            "{}{:5}\x1b[0m {} > ",
            color,
            meta.level().to_string(),
            meta.target()
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        write_timestamp(&mut writer)?;
        write!(
            writer,
            "{:5} {}:{} > ",
            meta.level().to_string(),
            meta.file().unwrap_or("unknown"),
            meta.line().unwrap_or(0)
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_current_log_path() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 6);
        match date {
            Some(date) => {
                let path = build_current_log_path(Path::new("logs"), "avclite", date);
                assert_eq!(path, PathBuf::from("logs/avclite.2026-02-06.log"));
            }
            None => panic!("测试日期初始化失败"),
        }
    }

    #[test]
    fn test_logging_config_defaults_from_json() {
        let config: LoggingConfig = match serde_json::from_str(r#"{"level": "debug", "file": true}"#)
        {
            Ok(config) => config,
            Err(err) => panic!("解析日志配置失败: {}", err),
        };
        assert_eq!(config.level, "debug");
        assert!(config.file);
        assert!(config.console);
        assert_eq!(config.file_prefix, "avclite");
        assert_eq!(config.retention_days, 30);
    }

    #[test]
    fn test_current_file_writer_appends() {
        let temp_dir = match tempfile::TempDir::new() {
            Ok(dir) => dir,
            Err(err) => panic!("创建临时目录失败: {}", err),
        };
        let mut writer = match CurrentFileWriter::new(temp_dir.path(), "unit") {
            Ok(writer) => writer,
            Err(err) => panic!("创建日志写入器失败: {}", err),
        };
        assert!(writer.write_all(b"hello\n").is_ok());
        assert!(writer.flush().is_ok());
        let path = build_current_log_path(temp_dir.path(), "unit", Local::now().date_naive());
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        assert_eq!(content, "hello\n");
    }
}
