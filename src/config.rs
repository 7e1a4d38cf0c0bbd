use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ftp: FtpConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 手动上传 CSV 的最大字节数
    pub upload_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct FtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub remote_path: String,
    pub timeout_secs: u64,
}

// 不打印密码
impl std::fmt::Debug for FtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("remote_path", &self.remote_path)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// 单批写入上限，超过 500 时按 500 处理
    pub batch_size: usize,
    /// 供应商列的候选表头，按顺序匹配（忽略大小写）
    pub supplier_columns: Vec<String>,
    pub staging_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// stdout | file
    pub sink: String,
    pub directory: PathBuf,
    pub file_prefix: String,
}

impl AppConfig {
    /// 从环境变量加载配置
    ///
    /// 变量以 `__` 分隔层级，例如 `DATABASE__URL`、`FTP__REMOTE_PATH`。
    /// 缺少必填项（数据库地址、FTP 凭据与路径）时直接返回错误。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::default())
    }

    pub fn load(env: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.upload_limit", 32 * 1024 * 1024)?
            .set_default("database.max_connections", 10)?
            .set_default("ftp.port", 21)?
            .set_default("ftp.timeout_secs", 60)?
            .set_default("sync.batch_size", 500)?
            .set_default(
                "sync.supplier_columns",
                vec!["Supplier", "Leverandør", "Leverandor", "Vendor"],
            )?
            .set_default("sync.staging_dir", "./staging")?
            .set_default("logging.level", "info")?
            .set_default("logging.sink", "stdout")?
            .set_default("logging.directory", "./logs")?
            .set_default("logging.file_prefix", "inventory-sync.log")?
            .add_source(
                env.separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("sync.supplier_columns"),
            )
            .build()?
            .try_deserialize()
    }
}
