//! 历史日志维护: 按保留天数删除, 可选 gzip 压缩.

use super::LoggingConfig;
use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Local, NaiveDate};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::error;

/// 后台日志维护线程句柄
///
/// 线程按 `cleanup_interval_seconds` 周期清理, 收到停止信号或发送端关闭后立即退出.
pub(super) struct LogMaintenance {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl LogMaintenance {
    pub(super) fn spawn(config: LoggingConfig) -> Result<Self> {
        let interval = Duration::from_secs(config.cleanup_interval_seconds.max(1));
        let (shutdown, signal) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("avclite-log-maintenance".into())
            .spawn(move || run_maintenance(&config, interval, &signal))
            .context("启动日志维护线程失败")?;
        Ok(Self { shutdown, handle })
    }

    /// 通知线程退出并等待其结束
    pub(super) fn stop(self) {
        let _ = self.shutdown.send(());
        if self.handle.join().is_err() {
            error!("日志维护线程异常退出");
        }
    }
}

fn run_maintenance(config: &LoggingConfig, interval: Duration, signal: &Receiver<()>) {
    loop {
        match signal.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                if let Err(err) = cleanup_logs(config) {
                    error!("清理日志失败: {}", err);
                }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// 删除超过保留期的日志, 压缩今天以前的未压缩日志
pub(super) fn cleanup_logs(config: &LoggingConfig) -> Result<()> {
    let directory = Path::new(&config.directory);
    if !directory.exists() {
        return Ok(());
    }

    let today = Local::now().date_naive();
    let cutoff = today - ChronoDuration::days(config.retention_days);

    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some((date, compressed)) = parse_rotated_log_name(&file_name, &config.file_prefix)
        else {
            continue;
        };

        let path = entry.path();
        if date < cutoff {
            let _ = fs::remove_file(&path);
        } else if config.compress_history && !compressed && date < today {
            compress_to_gz(&path)?;
        }
    }
    Ok(())
}

fn compress_to_gz(path: &Path) -> Result<()> {
    let gz_path = PathBuf::from(format!("{}.gz", path.display()));
    if gz_path.exists() {
        return Ok(());
    }

    let mut input =
        File::open(path).with_context(|| format!("打开待压缩日志失败, path={}", path.display()))?;
    let output = File::create(&gz_path)
        .with_context(|| format!("创建压缩日志失败, path={}", gz_path.display()))?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;

    fs::remove_file(path)
        .with_context(|| format!("删除已压缩日志失败, path={}", path.display()))?;
    Ok(())
}

/// 解析 `<prefix>.<YYYY-MM-DD>.log[.gz]`, 返回 (日期, 是否已压缩)
fn parse_rotated_log_name(file_name: &str, prefix: &str) -> Option<(NaiveDate, bool)> {
    let rest = file_name.strip_prefix(prefix)?.strip_prefix('.')?;
    let (date_part, compressed) = if let Some(d) = rest.strip_suffix(".log.gz") {
        (d, true)
    } else {
        (rest.strip_suffix(".log")?, false)
    };
    if date_part.len() != 10 {
        return None;
    }
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
    Some((date, compressed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::build_current_log_path;
    use tempfile::TempDir;

    fn config_for(dir: &Path) -> LoggingConfig {
        LoggingConfig {
            directory: dir.to_string_lossy().to_string(),
            file_prefix: "worker".to_string(),
            retention_days: 7,
            file: true,
            ..LoggingConfig::default()
        }
    }

    #[test]
    fn test_parse_rotated_log_name() {
        let prefix = "worker";
        assert_eq!(
            parse_rotated_log_name("worker.2026-02-06.log", prefix),
            NaiveDate::from_ymd_opt(2026, 2, 6).map(|d| (d, false))
        );
        assert_eq!(
            parse_rotated_log_name("worker.2026-02-06.log.gz", prefix),
            NaiveDate::from_ymd_opt(2026, 2, 6).map(|d| (d, true))
        );
        assert!(parse_rotated_log_name("worker.log", prefix).is_none());
        assert!(parse_rotated_log_name("other.2026-02-06.log", prefix).is_none());
    }

    #[test]
    fn test_cleanup_removes_expired_and_compresses_history() {
        let temp_dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(err) => panic!("创建临时目录失败: {}", err),
        };
        let config = config_for(temp_dir.path());
        let today = Local::now().date_naive();
        let dir = temp_dir.path();

        let expired = build_current_log_path(dir, "worker", today - ChronoDuration::days(30));
        let yesterday = build_current_log_path(dir, "worker", today - ChronoDuration::days(1));
        let current = build_current_log_path(dir, "worker", today);
        for path in [&expired, &yesterday, &current] {
            assert!(fs::write(path, b"line\n").is_ok());
        }

        let result = cleanup_logs(&config);
        assert!(result.is_ok(), "清理日志失败: {:?}", result.err());

        assert!(!expired.exists(), "过期日志应被删除");
        assert!(!yesterday.exists(), "历史日志应被压缩");
        assert!(PathBuf::from(format!("{}.gz", yesterday.display())).exists());
        assert!(current.exists(), "当天日志应保留");
    }

    #[test]
    fn test_maintenance_thread_stops_without_waiting_interval() {
        let temp_dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(err) => panic!("创建临时目录失败: {}", err),
        };
        let config = LoggingConfig {
            cleanup_interval_seconds: 3600,
            ..config_for(temp_dir.path())
        };

        let started = std::time::Instant::now();
        let maintenance = match LogMaintenance::spawn(config) {
            Ok(m) => m,
            Err(err) => panic!("启动维护线程失败: {}", err),
        };
        maintenance.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_maintenance_thread_cleans_on_interval() {
        let temp_dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(err) => panic!("创建临时目录失败: {}", err),
        };
        let config = LoggingConfig {
            cleanup_interval_seconds: 1,
            ..config_for(temp_dir.path())
        };
        let today = Local::now().date_naive();
        let expired =
            build_current_log_path(temp_dir.path(), "worker", today - ChronoDuration::days(30));
        assert!(fs::write(&expired, b"line\n").is_ok());

        let maintenance = match LogMaintenance::spawn(config) {
            Ok(m) => m,
            Err(err) => panic!("启动维护线程失败: {}", err),
        };
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while expired.exists() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(100));
        }
        maintenance.stop();
        assert!(!expired.exists(), "周期清理应删除过期日志");
    }
}
