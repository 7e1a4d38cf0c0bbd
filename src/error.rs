use thiserror::Error;

/// 文档存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store operation timed out after {0}s")]
    Timeout(u64),

    #[error("document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store rejected the operation: {0}")]
    Rejected(String),
}

/// 文件传输错误 (FTP)
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("cannot connect to {host}: {reason}")]
    Connect { host: String, reason: String },

    #[error("login rejected for user {user}")]
    Login { user: String },

    #[error("remote command failed: {0}")]
    Remote(String),

    #[error("transfer timed out after {0}s")]
    Timeout(u64),

    #[error("transfer task aborted: {0}")]
    Join(String),
}

/// 同步任务错误
///
/// 均为致命错误，由 HTTP 层统一转换为 500。单行问题只记日志，不进入此类型。
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("inventory file unreadable: {0}")]
    Parse(String),

    #[error("no data to sync")]
    EmptyDataset,

    #[error("cannot stage inventory file: {0}")]
    Staging(#[from] std::io::Error),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl From<csv::Error> for SyncError {
    fn from(e: csv::Error) -> Self {
        SyncError::Parse(e.to_string())
    }
}
