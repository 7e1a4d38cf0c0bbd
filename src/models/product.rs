use super::article::{parse_stock, ArticleRecord};
use super::document::Document;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// 商品分组/对账标识 (货号, 品名, 供应商)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductKey {
    pub item_number: String,
    pub product_name: String,
    pub supplier: String,
}

impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.item_number, self.product_name, self.supplier)
    }
}

/// 商品聚合：同一货号+品名+供应商下的所有明细
#[derive(Debug, Clone, PartialEq)]
pub struct ProductAggregate {
    pub key: ProductKey,
    pub category: Option<String>,
    pub season: Option<String>,
    pub status: Option<String>,
    pub items: Vec<ArticleRecord>,
    pub sizes: IndexSet<String>,
    pub total_stock: i64,
}

impl ProductAggregate {
    /// 以首行的分类/季节/状态创建空聚合
    pub fn new(key: ProductKey, first: &ArticleRecord) -> Self {
        Self {
            key,
            category: first.category.clone(),
            season: first.season.clone(),
            status: first.status.clone(),
            items: Vec::new(),
            sizes: IndexSet::new(),
            total_stock: 0,
        }
    }

    /// 加入一个明细；库存合计溢出时不加入，原样退回
    pub fn add_article(&mut self, article: ArticleRecord) -> Result<(), ArticleRecord> {
        let Some(total) = self.total_stock.checked_add(article.stock) else {
            return Err(article);
        };
        if let Some(size) = &article.size {
            self.sizes.insert(size.clone());
        }
        self.total_stock = total;
        self.items.push(article);
        Ok(())
    }

    /// 尺码集合的存储形式 ("M, L")
    pub fn sizes_label(&self) -> String {
        self.sizes.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
    }

    /// 转为存储文档（不含 id 与创建时间）
    pub fn to_document(&self) -> Result<Document, serde_json::Error> {
        let mut doc = Document::new();
        doc.insert("itemNumber".into(), Value::from(self.key.item_number.clone()));
        doc.insert("productName".into(), Value::from(self.key.product_name.clone()));
        doc.insert("supplier".into(), Value::from(self.key.supplier.clone()));
        for (field, value) in [
            ("category", &self.category),
            ("season", &self.season),
            ("status", &self.status),
        ] {
            if let Some(v) = value {
                doc.insert(field.into(), Value::from(v.clone()));
            }
        }
        doc.insert("sizes".into(), Value::from(self.sizes_label()));
        doc.insert("totalStock".into(), Value::from(self.total_stock));
        doc.insert("items".into(), serde_json::to_value(&self.items)?);
        Ok(doc)
    }
}

/// 汇总视图的指标序列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricSeries {
    Stock,
    Sold,
    InPurchase,
    Disponibel,
}

/// 商品的按尺码汇总视图：指标 -> (尺码 -> 数量)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedItem {
    pub product_id: String,
    pub item_number: String,
    pub product_name: String,
    pub supplier: String,
    pub sizes: Vec<String>,
    pub metrics: BTreeMap<MetricSeries, IndexMap<String, i64>>,
}

impl ConsolidatedItem {
    /// 从商品文档的 items 数组汇总，同尺码不同颜色相加
    ///
    /// 可售 (disponibel) = 库存 + 在途采购。
    pub fn from_document(product_id: &str, doc: &Document) -> Self {
        let text = |field: &str| {
            doc.get(field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let mut metrics: BTreeMap<MetricSeries, IndexMap<String, i64>> = BTreeMap::new();
        let mut sizes: IndexSet<String> = IndexSet::new();

        let items = doc.get("items").and_then(Value::as_array);
        for item in items.into_iter().flatten() {
            let size = item
                .get("size")
                .and_then(Value::as_str)
                .unwrap_or("-")
                .to_string();
            sizes.insert(size.clone());

            let stock = coerce_int(item.get("stock"));
            let sold = coerce_int(item.get("sold"));
            let in_purchase = coerce_int(item.get("inPurchase"));

            for (series, amount) in [
                (MetricSeries::Stock, stock),
                (MetricSeries::Sold, sold),
                (MetricSeries::InPurchase, in_purchase),
                (MetricSeries::Disponibel, stock.saturating_add(in_purchase)),
            ] {
                let cell = metrics
                    .entry(series)
                    .or_default()
                    .entry(size.clone())
                    .or_insert(0);
                *cell = cell.saturating_add(amount);
            }
        }

        Self {
            product_id: product_id.to_string(),
            item_number: text("itemNumber"),
            product_name: text("productName"),
            supplier: text("supplier"),
            sizes: sizes.into_iter().collect(),
            metrics,
        }
    }
}

/// 文档值转整数：数字取整，字符串按前导整数解析，其余为 0
pub fn coerce_int(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => parse_stock(s),
        _ => 0,
    }
}
