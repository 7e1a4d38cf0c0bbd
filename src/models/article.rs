use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// CSV 一行：表头 -> 单元格（保持表头顺序）
pub type CsvRow = IndexMap<String, String>;

/// 库存导出文件的固定表头
pub mod columns {
    pub const ITEM_NUMBER: &str = "Item number";
    pub const SIZE: &str = "Size";
    pub const COLOR: &str = "Color";
    pub const BRAND: &str = "Brand";
    pub const PRODUCT_NAME: &str = "Product name";
    pub const CATEGORY: &str = "Category";
    pub const COST_PRICE: &str = "Cost price";
    pub const REC_RETAIL: &str = "Rec Retail";
    pub const EAN: &str = "EAN";
    pub const STOCK: &str = "Stock";
    pub const SKU: &str = "SKU";
    pub const QUALITY: &str = "Quality";
    pub const SEASON: &str = "Season";
    pub const SOLD: &str = "Sold";
    pub const IN_PURCHASE: &str = "In Purchase";
    pub const DELIVERY_WEEK: &str = "Leveringsuge";
    pub const STATUS: &str = "Varestatus";
    pub const INACTIVE: &str = "Inaktiv";
    pub const SALE_PRICE: &str = "Sale price";
    pub const SUGGESTED_RETAIL: &str = "Suggested retail";
}

/// 对账用的文章标识 (SKU, 货号)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArticleKey {
    pub sku: String,
    pub item_number: String,
}

/// 库存明细 (一个 SKU/尺码/颜色)
///
/// 缺失或空白的字段在序列化时省略；库存数量始终为整数。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    pub sku: String,
    pub item_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rec_retail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ean: Option<String>,
    #[serde(default)]
    pub stock: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sold: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_purchase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_week: Option<String>,
    pub supplier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_retail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inactive: Option<String>,
}

impl ArticleRecord {
    /// 由 CSV 行构建；缺少 SKU 或货号时返回 None
    pub fn from_row(row: &CsvRow, supplier: String) -> Option<Self> {
        let sku = cell(row, columns::SKU)?;
        let item_number = cell(row, columns::ITEM_NUMBER)?;

        Some(Self {
            sku,
            item_number,
            size: cell(row, columns::SIZE),
            color: cell(row, columns::COLOR),
            brand: cell(row, columns::BRAND),
            product_name: cell(row, columns::PRODUCT_NAME),
            category: cell(row, columns::CATEGORY),
            cost_price: cell(row, columns::COST_PRICE),
            rec_retail: cell(row, columns::REC_RETAIL),
            ean: cell(row, columns::EAN),
            stock: cell(row, columns::STOCK).map(|s| parse_stock(&s)).unwrap_or(0),
            quality: cell(row, columns::QUALITY),
            season: cell(row, columns::SEASON),
            sold: cell(row, columns::SOLD),
            in_purchase: cell(row, columns::IN_PURCHASE),
            delivery_week: cell(row, columns::DELIVERY_WEEK),
            supplier,
            sale_price: cell(row, columns::SALE_PRICE),
            suggested_retail: cell(row, columns::SUGGESTED_RETAIL),
            status: cell(row, columns::STATUS),
            inactive: cell(row, columns::INACTIVE),
        })
    }

    pub fn key(&self) -> ArticleKey {
        ArticleKey {
            sku: self.sku.clone(),
            item_number: self.item_number.clone(),
        }
    }

    /// 已售数量，无法解析时为 0
    pub fn sold_count(&self) -> i64 {
        self.sold.as_deref().map(parse_stock).unwrap_or(0)
    }
}

/// 读取单元格，去除首尾空白，空值视为缺失
pub fn cell(row: &CsvRow, column: &str) -> Option<String> {
    row.get(column)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// 按前导整数解析库存数量 ("12 stk" -> 12)，无数字时为 0
pub fn parse_stock(raw: &str) -> i64 {
    let s = raw.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    match digits[..end].parse::<i64>() {
        Ok(n) if negative => -n,
        Ok(n) => n,
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> CsvRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parse_stock_follows_leading_integer() {
        assert_eq!(parse_stock("12"), 12);
        assert_eq!(parse_stock(" 7 stk"), 7);
        assert_eq!(parse_stock("3.9"), 3);
        assert_eq!(parse_stock("-2"), -2);
        assert_eq!(parse_stock("abc"), 0);
        assert_eq!(parse_stock(""), 0);
    }

    #[test]
    fn from_row_requires_sku_and_item_number() {
        let missing_sku = row(&[("Item number", "100"), ("SKU", "  ")]);
        assert!(ArticleRecord::from_row(&missing_sku, "Acme".into()).is_none());

        let missing_item = row(&[("SKU", "100-M")]);
        assert!(ArticleRecord::from_row(&missing_item, "Acme".into()).is_none());
    }

    #[test]
    fn blank_fields_are_left_out_of_the_document() {
        let r = row(&[
            ("Item number", "100"),
            ("SKU", "100-M"),
            ("Size", "M"),
            ("Color", ""),
            ("Stock", "x"),
        ]);
        let article = ArticleRecord::from_row(&r, "Acme".into()).unwrap();
        assert_eq!(article.stock, 0);

        let value = serde_json::to_value(&article).unwrap();
        let doc = value.as_object().unwrap();
        assert_eq!(doc["size"], "M");
        assert_eq!(doc["stock"], 0);
        assert!(!doc.contains_key("color"));
        assert!(!doc.contains_key("brand"));
    }
}
