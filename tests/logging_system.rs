use avclite::logging::{LoggingConfig, init, shutdown};
use std::fs;
use std::path::Path;
use std::time::Duration;

// 注意: 由于 tracing 的全局订阅器只能初始化一次,
// 涉及 init() 的测试必须单独运行或使用 #[ignore] 标记

fn file_config(directory: &Path, prefix: &str) -> LoggingConfig {
    LoggingConfig {
        level: "debug".to_string(),
        console: false,
        file: true,
        directory: directory.to_string_lossy().to_string(),
        file_prefix: prefix.to_string(),
        retention_days: 7,
        compress_history: false,
        cleanup_interval_seconds: 3600,
    }
}

#[test]
#[ignore] // 需要单独运行: cargo test --test logging_system test_logging_file_output -- --ignored
fn test_logging_file_output() {
    let temp_dir = tempfile::TempDir::new().expect("创建临时目录失败");
    let log_dir = temp_dir.path().join("logs");
    let config = file_config(&log_dir, "avclite-test");

    init(&config).expect("日志初始化失败");
    assert!(log_dir.exists(), "日志目录应该被创建");

    tracing::info!("测试信息日志");
    tracing::warn!("测试警告日志");
    // 库 crate 的 log 宏经桥接进入同一订阅器
    let mut decoder = avclite::codec::DecoderSession::default();
    let _ = decoder.decode_annex_b(&[0x00, 0x00, 0x01, 0x67, 0x42]);

    std::thread::sleep(Duration::from_millis(200));

    let today = chrono::Local::now().date_naive();
    let log_path = log_dir.join(format!("avclite-test.{}.log", today.format("%Y-%m-%d")));
    let content = fs::read_to_string(&log_path).expect("读取日志文件失败");
    assert!(content.contains("测试信息日志"), "日志文件应包含 info 日志");
    assert!(content.contains("WARN"), "日志文件应包含级别");

    let second = init(&config);
    assert!(second.is_err(), "重复初始化应返回错误");

    // 维护线程周期为一小时, 停止时不应等待
    let started = std::time::Instant::now();
    shutdown();
    assert!(started.elapsed() < Duration::from_secs(5));
    shutdown();
}

#[test]
fn test_logging_config_serde_roundtrip() {
    let config = file_config(Path::new("logs"), "roundtrip");
    let json = serde_json::to_string(&config).expect("序列化失败");
    let back: LoggingConfig = serde_json::from_str(&json).expect("反序列化失败");
    assert_eq!(back, config);
}
