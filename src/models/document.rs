use serde_json::{Map, Value};

/// 文档内容：字段名 -> JSON 值（有序，保证差异结果稳定）
pub type Document = Map<String, Value>;

/// 存储中的集合名
pub mod collections {
    pub const ARTICLES: &str = "articles";
    pub const PRODUCTS: &str = "products";
    pub const LOGS: &str = "logs";
    pub const SETTINGS: &str = "settings";
    pub const DAILY_PRODUCT_SALES: &str = "dailyProductSales";
    pub const SNAPSHOTS: &str = "snapshots";
}

/// 已持久化的文档
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Document,
}

impl StoredDocument {
    pub fn new(id: impl Into<String>, data: Document) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// 读取字符串字段（去除首尾空白，空串视为缺失）
    pub fn text(&self, field: &str) -> Option<String> {
        match self.data.get(field)? {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// 单个写操作，按批提交
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// 新建完整文档
    Create {
        collection: &'static str,
        id: String,
        data: Document,
    },
    /// 字段级合并更新，不删除未出现的字段
    Update {
        collection: &'static str,
        id: String,
        patch: Document,
    },
    /// 覆盖写入（不存在则创建）
    Set {
        collection: &'static str,
        id: String,
        data: Document,
    },
    /// 数值字段累加；文档不存在时以 seed 创建
    Increment {
        collection: &'static str,
        id: String,
        field: String,
        amount: i64,
        seed: Document,
    },
}

impl WriteOp {
    pub fn collection(&self) -> &'static str {
        match self {
            WriteOp::Create { collection, .. }
            | WriteOp::Update { collection, .. }
            | WriteOp::Set { collection, .. }
            | WriteOp::Increment { collection, .. } => collection,
        }
    }
}
