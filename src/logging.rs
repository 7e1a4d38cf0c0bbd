use crate::config::LoggingConfig;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// 日志输出目标
#[derive(Debug, Clone)]
pub enum LogSink {
    Stdout,
    /// 按天滚动的日志文件
    File { directory: PathBuf, file_prefix: String },
    /// 内存缓冲，测试中用来断言日志内容
    Buffer(CaptureBuffer),
}

impl LogSink {
    pub fn from_config(config: &LoggingConfig) -> Result<Self, String> {
        match config.sink.trim().to_lowercase().as_str() {
            "stdout" | "console" => Ok(LogSink::Stdout),
            "file" => Ok(LogSink::File {
                directory: config.directory.clone(),
                file_prefix: config.file_prefix.clone(),
            }),
            other => Err(format!("unknown log sink '{}'", other)),
        }
    }
}

/// 可共享的内存日志缓冲
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(|p| p.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

pub struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CaptureBuffer {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter(Arc::clone(&self.0))
    }
}

pub type BoxedSubscriber = Box<dyn Subscriber + Send + Sync + 'static>;

/// 构建日志订阅者；文件输出时返回的 guard 需保持存活直到进程退出
///
/// `RUST_LOG` 优先于配置的级别（内存缓冲除外）。
pub fn build_subscriber(level: &str, sink: LogSink) -> (BoxedSubscriber, Option<WorkerGuard>) {
    let filter = match sink {
        LogSink::Buffer(_) => EnvFilter::new(level),
        _ => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
    };

    // 使用本地时间格式
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true);

    match sink {
        LogSink::Stdout => (Box::new(builder.finish()), None),
        LogSink::File {
            directory,
            file_prefix,
        } => {
            let appender = tracing_appender::rolling::daily(directory, file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let subscriber = builder.with_ansi(false).with_writer(writer).finish();
            (Box::new(subscriber), Some(guard))
        }
        LogSink::Buffer(buffer) => {
            let subscriber = builder.with_ansi(false).with_writer(buffer).finish();
            (Box::new(subscriber), None)
        }
    }
}

/// 安装全局日志订阅者
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let sink = LogSink::from_config(config)?;
    let (subscriber, guard) = build_subscriber(&config.level, sink);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sink_captures_events_at_configured_level() {
        let buffer = CaptureBuffer::new();
        let (subscriber, guard) = build_subscriber("info", LogSink::Buffer(buffer.clone()));
        assert!(guard.is_none());

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("row 7 skipped");
            tracing::debug!("hidden detail");
        });

        let output = buffer.contents();
        assert!(output.contains("WARN"));
        assert!(output.contains("row 7 skipped"));
        assert!(!output.contains("hidden detail"));
    }

    #[test]
    fn unknown_sink_is_rejected() {
        let config = LoggingConfig {
            level: "info".into(),
            sink: "syslog".into(),
            directory: PathBuf::from("./logs"),
            file_prefix: "x.log".into(),
        };
        assert!(LogSink::from_config(&config).is_err());
    }

    #[test]
    fn file_sink_writes_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::File {
            directory: dir.path().to_path_buf(),
            file_prefix: "sync.log".into(),
        };
        let (subscriber, guard) = build_subscriber("info", sink);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("written to file");
        });
        drop(guard);

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
