use crate::models::product::coerce_int;
use crate::models::{
    collections, ArticleKey, DailyProductSales, Document, ProductKey, StoredDocument, WriteOp,
};
use crate::service::grouping::{Grouping, UNKNOWN_SUPPLIER};
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde_json::{Number, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;
use uuid::Uuid;

/// 计算字段级差异
///
/// 只比较新数据中出现的字段；旧文档里多出的字段不会被删除。
/// 旧值为数字时把新字符串按数字比较（`"5.0"` 等于 `5`），否则按去空白后的字符串比较。
pub fn compute_delta(existing: &Document, incoming: &Document) -> Document {
    incoming
        .iter()
        .filter_map(|(field, value)| {
            changed_value(value, existing.get(field)).map(|v| (field.clone(), v))
        })
        .collect()
}

/// 新值与旧值规范化后不同则返回要写入的值
fn changed_value(new: &Value, old: Option<&Value>) -> Option<Value> {
    let Some(old) = old else {
        return Some(trimmed(new));
    };

    match (new, old) {
        (Value::String(s), Value::Number(n)) => {
            let text = s.trim();
            match (parse_decimal(text), to_decimal(n)) {
                (Some(a), Some(b)) if a == b => None,
                (Some(a), _) => Some(decimal_to_value(&a)),
                (None, _) => Some(Value::String(text.to_string())),
            }
        }
        (Value::String(s), Value::String(o)) => {
            (s.trim() != o.trim()).then(|| Value::String(s.trim().to_string()))
        }
        (Value::Number(a), Value::Number(b)) => match (to_decimal(a), to_decimal(b)) {
            (Some(x), Some(y)) if x == y => None,
            _ if a == b => None,
            _ => Some(new.clone()),
        },
        (Value::Number(a), Value::String(o)) => {
            (a.to_string() != o.trim()).then(|| new.clone())
        }
        _ => (new != old).then(|| trimmed(new)),
    }
}

fn trimmed(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    }
}

/// 指数绝对值上限；超出的值按文本处理
const MAX_DECIMAL_EXPONENT: i64 = 64;

/// 解析十进制数字符串，接受单个逗号作为小数点 ("12,50")
///
/// 指数过大的值（如 `1e200000000`）返回 None，比较时会按文本处理。
pub fn parse_decimal(text: &str) -> Option<BigDecimal> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let normalized = if !text.contains('.') && text.matches(',').count() == 1 {
        text.replace(',', ".")
    } else {
        text.to_string()
    };
    bounded_decimal(&normalized)
}

fn to_decimal(n: &Number) -> Option<BigDecimal> {
    bounded_decimal(&n.to_string())
}

fn bounded_decimal(text: &str) -> Option<BigDecimal> {
    let d = BigDecimal::from_str(text).ok()?;
    let (_, exponent) = d.as_bigint_and_exponent();
    (exponent.abs() <= MAX_DECIMAL_EXPONENT).then_some(d)
}

/// 整数值写为整数，其余写为浮点
fn decimal_to_value(d: &BigDecimal) -> Value {
    if d.with_scale(0) == *d {
        if let Some(i) = d.to_i64() {
            return Value::from(i);
        }
    }
    d.to_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(d.to_string()))
}

/// 找出在不同文档中既存为数字又存为字符串的字段
///
/// 这种数据下按旧值类型规范化的结果取决于具体文档，只做告警。
pub fn mixed_type_fields(docs: &[StoredDocument]) -> Vec<String> {
    const NUMBER: u8 = 0b01;
    const STRING: u8 = 0b10;

    let mut kinds: BTreeMap<&str, u8> = BTreeMap::new();
    for doc in docs {
        for (field, value) in &doc.data {
            let kind = match value {
                Value::Number(_) => NUMBER,
                Value::String(_) => STRING,
                _ => continue,
            };
            *kinds.entry(field.as_str()).or_insert(0) |= kind;
        }
    }

    kinds
        .into_iter()
        .filter(|(_, k)| *k == NUMBER | STRING)
        .map(|(field, _)| field.to_string())
        .collect()
}

/// 已存储文档的快照，按自然标识索引
#[derive(Debug, Default)]
pub struct Snapshot {
    products: HashMap<ProductKey, StoredDocument>,
    articles: HashMap<ArticleKey, StoredDocument>,
}

impl Snapshot {
    pub fn from_documents(products: Vec<StoredDocument>, articles: Vec<StoredDocument>) -> Self {
        let mut snapshot = Self::default();

        for doc in products {
            let Some(item_number) = doc.text("itemNumber") else {
                tracing::warn!("Stored product {} has no itemNumber, ignored", doc.id);
                continue;
            };
            let key = ProductKey {
                item_number,
                product_name: doc.text("productName").unwrap_or_default(),
                supplier: doc
                    .text("supplier")
                    .unwrap_or_else(|| UNKNOWN_SUPPLIER.to_string()),
            };
            if let Some(first) = snapshot.products.get(&key) {
                tracing::warn!("Duplicate stored product {} (keeping {})", doc.id, first.id);
                continue;
            }
            snapshot.products.insert(key, doc);
        }

        for doc in articles {
            let (Some(sku), Some(item_number)) = (doc.text("sku"), doc.text("itemNumber")) else {
                tracing::warn!("Stored article {} has no sku/itemNumber, ignored", doc.id);
                continue;
            };
            let key = ArticleKey { sku, item_number };
            if let Some(first) = snapshot.articles.get(&key) {
                tracing::warn!("Duplicate stored article {} (keeping {})", doc.id, first.id);
                continue;
            }
            snapshot.articles.insert(key, doc);
        }

        snapshot
    }

    pub fn product(&self, key: &ProductKey) -> Option<&StoredDocument> {
        self.products.get(key)
    }

    pub fn article(&self, key: &ArticleKey) -> Option<&StoredDocument> {
        self.articles.get(key)
    }
}

/// 一次对账的结果：待写操作与统计
#[derive(Debug, Default)]
pub struct SyncPlan {
    pub ops: Vec<WriteOp>,
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub articles_created: usize,
    pub articles_updated: usize,
    /// 同一 (SKU, 货号) 重复出现而跳过的行
    pub skipped_rows: usize,
}

impl SyncPlan {
    /// 商品与明细的写操作数（不含销量累计）
    pub fn entity_writes(&self) -> usize {
        self.created.len() + self.updated.len() + self.articles_created + self.articles_updated
    }
}

/// 对分组结果与快照做对账，生成写操作
///
/// 每个商品的写操作后紧跟其明细的写操作；销量累计放在最后。
pub fn plan_changes(
    grouping: &Grouping,
    snapshot: &Snapshot,
    now: DateTime<Utc>,
) -> SyncPlan {
    let mut plan = SyncPlan::default();
    let mut seen_articles: HashSet<ArticleKey> = HashSet::new();
    // 商品 id -> (品名, 新增销量)
    let mut sales: IndexMap<String, (String, i64)> = IndexMap::new();

    for product in grouping.products.values() {
        let name = if product.key.product_name.is_empty() {
            product.key.item_number.clone()
        } else {
            product.key.product_name.clone()
        };

        let doc = match product.to_document() {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!("Product {} skipped: {}", product.key, e);
                plan.skipped_rows += product.items.len();
                continue;
            }
        };

        let existing = snapshot.product(&product.key);
        let product_id = existing
            .map(|stored| stored.id.clone())
            .unwrap_or_else(new_id);

        match existing {
            None => {
                plan.ops.push(WriteOp::Create {
                    collection: collections::PRODUCTS,
                    id: product_id.clone(),
                    data: with_created_at(doc, now),
                });
                plan.created.push(name.clone());
            }
            Some(stored) => {
                let patch = compute_delta(&stored.data, &doc);
                if !patch.is_empty() {
                    tracing::debug!("Product {} changed fields: {:?}", product.key, patch.keys());
                    plan.ops.push(WriteOp::Update {
                        collection: collections::PRODUCTS,
                        id: product_id.clone(),
                        patch,
                    });
                    plan.updated.push(name.clone());
                }
            }
        }

        for article in &product.items {
            let key = article.key();
            if !seen_articles.insert(key.clone()) {
                tracing::warn!(
                    "Duplicate article SKU {} / item {} skipped",
                    key.sku,
                    key.item_number
                );
                plan.skipped_rows += 1;
                continue;
            }

            let mut doc = match serde_json::to_value(article) {
                Ok(Value::Object(doc)) => doc,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("Article {} skipped: {}", key.sku, e);
                    plan.skipped_rows += 1;
                    continue;
                }
            };
            doc.insert("productId".into(), Value::from(product_id.clone()));

            match snapshot.article(&key) {
                None => {
                    plan.ops.push(WriteOp::Create {
                        collection: collections::ARTICLES,
                        id: new_id(),
                        data: with_created_at(doc, now),
                    });
                    plan.articles_created += 1;
                }
                Some(stored) => {
                    let sold_before = coerce_int(stored.data.get("sold"));
                    let sold_now = article.sold_count();
                    if sold_now > sold_before {
                        match sold_now.checked_sub(sold_before) {
                            Some(increase) => {
                                let entry = sales
                                    .entry(product_id.clone())
                                    .or_insert_with(|| (name.clone(), 0));
                                entry.1 = entry.1.saturating_add(increase);
                            }
                            None => tracing::warn!(
                                "Sales of SKU {} not recorded: sold {} -> {} out of range",
                                key.sku,
                                sold_before,
                                sold_now
                            ),
                        }
                    }

                    let patch = compute_delta(&stored.data, &doc);
                    if !patch.is_empty() {
                        plan.ops.push(WriteOp::Update {
                            collection: collections::ARTICLES,
                            id: stored.id.clone(),
                            patch,
                        });
                        plan.articles_updated += 1;
                    }
                }
            }
        }
    }

    let today = now.date_naive();
    for (product_id, (product_name, quantity)) in sales {
        plan.ops.push(sales_increment(today, &product_id, &product_name, quantity));
    }

    plan
}

fn sales_increment(date: NaiveDate, product_id: &str, product_name: &str, quantity: i64) -> WriteOp {
    let mut seed = Document::new();
    seed.insert("date".into(), Value::from(date.format("%Y-%m-%d").to_string()));
    seed.insert("productId".into(), Value::from(product_id));
    seed.insert("productName".into(), Value::from(product_name));

    WriteOp::Increment {
        collection: collections::DAILY_PRODUCT_SALES,
        id: DailyProductSales::document_id(date, product_id),
        field: "quantity".into(),
        amount: quantity,
        seed,
    }
}

fn with_created_at(mut doc: Document, now: DateTime<Utc>) -> Document {
    doc.insert("createdAt".into(), Value::from(now.to_rfc3339()));
    doc
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::grouping::{group_rows, SupplierColumns};
    use crate::service::ingest::parse_inventory;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn numeric_string_equal_to_stored_number_is_not_a_change() {
        let delta = compute_delta(&doc(json!({ "count": 5 })), &doc(json!({ "count": "5" })));
        assert!(delta.is_empty());
    }

    #[test]
    fn numeric_string_different_from_stored_number_is_written_as_number() {
        let delta = compute_delta(&doc(json!({ "count": 5 })), &doc(json!({ "count": "6" })));
        assert_eq!(Value::Object(delta), json!({ "count": 6 }));
    }

    #[test]
    fn decimal_forms_compare_by_value() {
        let existing = doc(json!({ "a": 5, "b": "hello", "price": 12.5 }));
        let incoming = doc(json!({ "a": "5.0", "b": "Hello", "price": "12,50" }));
        let delta = compute_delta(&existing, &incoming);
        assert_eq!(Value::Object(delta), json!({ "b": "Hello" }));
    }

    #[test]
    fn strings_are_compared_trimmed_and_absent_fields_are_kept() {
        let existing = doc(json!({ "color": "Red", "note": "manual" }));
        let incoming = doc(json!({ "color": " Red ", "size": " M" }));
        let delta = compute_delta(&existing, &incoming);
        assert_eq!(Value::Object(delta), json!({ "size": "M" }));
    }

    #[test]
    fn non_numeric_text_replaces_stored_number() {
        let delta = compute_delta(&doc(json!({ "week": 12 })), &doc(json!({ "week": "uge 12" })));
        assert_eq!(Value::Object(delta), json!({ "week": "uge 12" }));
    }

    #[test]
    fn huge_exponent_is_compared_as_text() {
        assert!(parse_decimal("1e200000000").is_none());
        assert_eq!(parse_decimal("1.5e3"), parse_decimal("1500"));

        let delta = compute_delta(
            &doc(json!({ "sold": 5 })),
            &doc(json!({ "sold": "1e200000000" })),
        );
        assert_eq!(Value::Object(delta), json!({ "sold": "1e200000000" }));
    }

    #[test]
    fn stored_string_is_never_coerced() {
        let delta = compute_delta(&doc(json!({ "ean": "0123" })), &doc(json!({ "ean": "123" })));
        assert_eq!(Value::Object(delta), json!({ "ean": "123" }));
    }

    #[test]
    fn delta_is_deterministic() {
        let existing = doc(json!({ "a": 1, "b": "x", "c": 3 }));
        let incoming = doc(json!({ "c": "4", "a": "2", "b": "y" }));
        let first = compute_delta(&existing, &incoming);
        for _ in 0..10 {
            assert_eq!(compute_delta(&existing, &incoming), first);
        }
        assert_eq!(first.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn reports_fields_with_mixed_stored_types() {
        let docs = vec![
            StoredDocument::new("1", doc(json!({ "stock": 3, "sku": "A" }))),
            StoredDocument::new("2", doc(json!({ "stock": "4", "sku": "B" }))),
        ];
        assert_eq!(mixed_type_fields(&docs), vec!["stock".to_string()]);
    }

    const CSV: &str = "Item number;Product name;Supplier;Size;Stock;SKU;Sold\n\
                       100;Shirt;Acme;M;3;100-M;1\n\
                       100;Shirt;Acme;L;5;100-L;0\n";

    fn grouping(csv: &str) -> Grouping {
        let file = parse_inventory(csv.as_bytes()).unwrap();
        group_rows(&file, &SupplierColumns::new(["Supplier"]))
    }

    /// 把计划中的写操作应用到快照文档上
    fn applied(plan: &SyncPlan) -> (Vec<StoredDocument>, Vec<StoredDocument>) {
        let mut products = Vec::new();
        let mut articles = Vec::new();
        for op in &plan.ops {
            if let WriteOp::Create { collection, id, data } = op {
                let stored = StoredDocument::new(id.clone(), data.clone());
                match *collection {
                    collections::PRODUCTS => products.push(stored),
                    collections::ARTICLES => articles.push(stored),
                    _ => {}
                }
            }
        }
        (products, articles)
    }

    #[test]
    fn first_run_creates_everything() {
        let plan = plan_changes(&grouping(CSV), &Snapshot::default(), Utc::now());

        assert_eq!(plan.created, vec!["Shirt"]);
        assert_eq!(plan.articles_created, 2);
        assert_eq!(plan.ops.len(), 3);

        let (products, articles) = applied(&plan);
        assert_eq!(products[0].data["totalStock"], 8);
        assert_eq!(products[0].data["sizes"], "M, L");
        assert!(articles.iter().all(|a| a.data["productId"] == Value::from(products[0].id.clone())));
    }

    #[test]
    fn second_run_over_same_data_is_a_no_op() {
        let first = plan_changes(&grouping(CSV), &Snapshot::default(), Utc::now());
        let (products, articles) = applied(&first);
        let snapshot = Snapshot::from_documents(products, articles);

        let second = plan_changes(&grouping(CSV), &snapshot, Utc::now());
        assert!(second.ops.is_empty());
        assert_eq!(second.entity_writes(), 0);
    }

    #[test]
    fn stock_change_patches_product_and_article_only() {
        let first = plan_changes(&grouping(CSV), &Snapshot::default(), Utc::now());
        let (products, articles) = applied(&first);
        let snapshot = Snapshot::from_documents(products, articles);

        let changed = CSV.replace("100;Shirt;Acme;L;5;100-L;0", "100;Shirt;Acme;L;2;100-L;3");
        let plan = plan_changes(&grouping(&changed), &snapshot, Utc::now());

        assert_eq!(plan.updated, vec!["Shirt"]);
        assert_eq!(plan.articles_updated, 1);
        assert!(plan.created.is_empty());

        let product_patch = plan
            .ops
            .iter()
            .find_map(|op| match op {
                WriteOp::Update { collection: collections::PRODUCTS, patch, .. } => Some(patch),
                _ => None,
            })
            .unwrap();
        assert_eq!(product_patch["totalStock"], 5);
        assert!(!product_patch.contains_key("sizes"));

        let sales = plan
            .ops
            .iter()
            .find_map(|op| match op {
                WriteOp::Increment { amount, .. } => Some(*amount),
                _ => None,
            })
            .unwrap();
        assert_eq!(sales, 3);
    }

    #[test]
    fn duplicate_article_keys_are_skipped() {
        let csv = "Item number;Product name;Supplier;SKU;Stock\n\
                   1;Sock;Acme;1-A;1\n\
                   1;Sock;Acme;1-A;2\n";
        let plan = plan_changes(&grouping(csv), &Snapshot::default(), Utc::now());
        assert_eq!(plan.articles_created, 1);
        assert_eq!(plan.skipped_rows, 1);
    }

    #[test]
    fn out_of_range_sales_increase_is_not_recorded() {
        let stored = |id: &str, sku: &str, sold: Value| {
            StoredDocument::new(
                id,
                doc(json!({ "sku": sku, "itemNumber": "100", "sold": sold })),
            )
        };
        let snapshot = Snapshot::from_documents(
            vec![],
            vec![
                stored("a1", "100-M", json!(i64::MIN)),
                stored("a2", "100-L", json!(0)),
                stored("a3", "100-S", json!(0)),
            ],
        );
        let csv = "Item number;Product name;Supplier;SKU;Sold\n\
                   100;Shirt;Acme;100-M;9223372036854775807\n\
                   100;Shirt;Acme;100-L;9223372036854775807\n\
                   100;Shirt;Acme;100-S;5\n";

        let plan = plan_changes(&grouping(csv), &snapshot, Utc::now());
        let sales: Vec<i64> = plan
            .ops
            .iter()
            .filter_map(|op| match op {
                WriteOp::Increment { amount, .. } => Some(*amount),
                _ => None,
            })
            .collect();
        // 第一行差值溢出被跳过，其余两行的合计饱和到上限
        assert_eq!(sales, vec![i64::MAX]);
    }
}
