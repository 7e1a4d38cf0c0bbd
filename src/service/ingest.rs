use crate::config::FtpConfig;
use crate::error::{SyncError, TransferError};
use crate::models::CsvRow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};

/// 库存文件来源
#[async_trait]
pub trait FileSource: Send + Sync {
    /// 远端文件的最后修改时间
    async fn last_modified(&self) -> Result<DateTime<Utc>, TransferError>;

    /// 下载文件内容
    async fn fetch(&self) -> Result<Vec<u8>, TransferError>;
}

/// FTP 数据源，每次操作建立独立连接，阻塞 I/O 放在 blocking 线程池
pub struct FtpSource {
    config: FtpConfig,
}

impl FtpSource {
    pub fn new(config: FtpConfig) -> Self {
        Self { config }
    }

    async fn with_session<T, F>(&self, op: F) -> Result<T, TransferError>
    where
        F: FnOnce(&mut FtpStream, &str) -> Result<T, FtpError> + Send + 'static,
        T: Send + 'static,
    {
        let config = self.config.clone();
        let timeout_secs = config.timeout_secs;

        let task = tokio::task::spawn_blocking(move || {
            let mut ftp = connect(&config)?;
            let result = op(&mut ftp, &config.remote_path)
                .map_err(|e| TransferError::Remote(e.to_string()));
            if let Err(e) = ftp.quit() {
                tracing::debug!("FTP QUIT failed: {}", e);
            }
            result
        });

        match tokio::time::timeout(Duration::from_secs(timeout_secs), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(TransferError::Join(join_error.to_string())),
            Err(_) => Err(TransferError::Timeout(timeout_secs)),
        }
    }
}

fn connect(config: &FtpConfig) -> Result<FtpStream, TransferError> {
    let addr = format!("{}:{}", config.host, config.port);
    let mut ftp = FtpStream::connect(addr.as_str()).map_err(|e| TransferError::Connect {
        host: addr.clone(),
        reason: e.to_string(),
    })?;

    ftp.login(config.user.as_str(), config.password.as_str())
        .map_err(|_| TransferError::Login {
            user: config.user.clone(),
        })?;
    ftp.transfer_type(FileType::Binary)
        .map_err(|e| TransferError::Remote(e.to_string()))?;

    Ok(ftp)
}

#[async_trait]
impl FileSource for FtpSource {
    async fn last_modified(&self) -> Result<DateTime<Utc>, TransferError> {
        let naive = self.with_session(|ftp, path| ftp.mdtm(path)).await?;
        Ok(naive.and_utc())
    }

    async fn fetch(&self) -> Result<Vec<u8>, TransferError> {
        let cursor = self
            .with_session(|ftp, path| ftp.retr_as_buffer(path))
            .await?;
        let bytes = cursor.into_inner();
        tracing::info!("Downloaded {} bytes from {}", bytes.len(), self.config.remote_path);
        Ok(bytes)
    }
}

/// 解析后的库存文件
#[derive(Debug, Clone, Default)]
pub struct InventoryFile {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
}

/// 把下载内容写入本地暂存目录，返回文件路径
pub async fn stage_file(dir: &Path, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

/// 解析分号分隔的库存 CSV（首行为表头）
///
/// 一次性读完全部行。单行错误只记日志并跳过；表头无法读取
/// 或底层读取失败时返回 `SyncError::Parse`。
pub fn parse_inventory<R: Read>(reader: R) -> Result<InventoryFile, SyncError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .byte_headers()?
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            let decoded = String::from_utf8_lossy(raw);
            let header: &str = if idx == 0 {
                decoded.trim_start_matches('\u{feff}')
            } else {
                &decoded
            };
            header.trim().to_string()
        })
        .collect();

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.byte_records() {
        let record = match result {
            Ok(record) => record,
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
            Err(e) => {
                skipped += 1;
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                tracing::warn!("Skipping malformed CSV row at line {}: {}", line, e);
                continue;
            }
        };

        let row: CsvRow = headers
            .iter()
            .zip(record.iter())
            .filter(|(header, _)| !header.is_empty())
            .map(|(header, value)| (header.clone(), String::from_utf8_lossy(value).into_owned()))
            .collect();

        if row.values().all(|v| v.trim().is_empty()) {
            continue;
        }
        rows.push(row);
    }

    tracing::info!(
        "Parsed inventory CSV: {} columns, {} rows, {} malformed rows skipped",
        headers.len(),
        rows.len(),
        skipped
    );

    Ok(InventoryFile { headers, rows })
}
