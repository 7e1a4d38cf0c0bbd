use crate::models::article::cell;
use crate::models::{ArticleRecord, ProductAggregate, ProductKey};
use crate::service::ingest::InventoryFile;
use indexmap::IndexMap;

/// 无法识别供应商时的占位名
pub const UNKNOWN_SUPPLIER: &str = "Unknown Supplier";

/// 供应商列候选表头（有序，忽略大小写）
#[derive(Debug, Clone)]
pub struct SupplierColumns {
    aliases: Vec<String>,
}

impl SupplierColumns {
    pub fn new<I, S>(aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            aliases: aliases
                .into_iter()
                .map(Into::into)
                .map(|a: String| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
        }
    }

    /// 返回表头中第一个命中的候选列的实际名称
    pub fn resolve<'a>(&self, headers: &'a [String]) -> Option<&'a str> {
        self.aliases.iter().find_map(|alias| {
            let alias = alias.to_lowercase();
            headers
                .iter()
                .find(|h| h.to_lowercase() == alias)
                .map(String::as_str)
        })
    }
}

/// 分组结果
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    /// 按首次出现顺序排列
    pub products: IndexMap<ProductKey, ProductAggregate>,
    /// 缺少 SKU 或货号而丢弃的行数
    pub dropped_rows: usize,
    /// 库存合计溢出而拒绝的行数
    pub rejected_rows: usize,
}

impl Grouping {
    pub fn article_count(&self) -> usize {
        self.products.values().map(|p| p.items.len()).sum()
    }

    pub fn total_stock(&self) -> i64 {
        self.products
            .values()
            .fold(0i64, |total, p| total.saturating_add(p.total_stock))
    }
}

/// 把扁平的 CSV 行按 (货号, 品名, 供应商) 分组为商品聚合
pub fn group_rows(file: &InventoryFile, suppliers: &SupplierColumns) -> Grouping {
    let supplier_column = suppliers.resolve(&file.headers);
    if supplier_column.is_none() {
        tracing::warn!(
            "No supplier column found in headers, using '{}' for all rows",
            UNKNOWN_SUPPLIER
        );
    }

    let mut grouping = Grouping::default();
    for row in &file.rows {
        let supplier = supplier_column
            .and_then(|column| cell(row, column))
            .unwrap_or_else(|| UNKNOWN_SUPPLIER.to_string());

        let Some(article) = ArticleRecord::from_row(row, supplier) else {
            grouping.dropped_rows += 1;
            continue;
        };

        let key = ProductKey {
            item_number: article.item_number.clone(),
            product_name: article.product_name.clone().unwrap_or_default(),
            supplier: article.supplier.clone(),
        };

        let product = grouping
            .products
            .entry(key.clone())
            .or_insert_with(|| ProductAggregate::new(key, &article));
        if let Err(article) = product.add_article(article) {
            tracing::warn!(
                "Article SKU {} skipped: stock {} overflows total of product {}",
                article.sku,
                article.stock,
                product.key
            );
            grouping.rejected_rows += 1;
        }
    }

    tracing::info!(
        "Grouped {} articles into {} products ({} rows without SKU/item number dropped)",
        grouping.article_count(),
        grouping.products.len(),
        grouping.dropped_rows
    );

    grouping
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ingest::parse_inventory;

    fn suppliers() -> SupplierColumns {
        SupplierColumns::new(["Supplier", "Leverandør"])
    }

    #[test]
    fn groups_two_sizes_of_one_shirt() {
        let csv = "Item number;Product name;Supplier;Size;Stock;SKU\n\
                   100;Shirt;Acme;M;3;100-M\n\
                   100;Shirt;Acme;L;5;100-L\n";
        let file = parse_inventory(csv.as_bytes()).unwrap();
        let grouping = group_rows(&file, &suppliers());

        assert_eq!(grouping.products.len(), 1);
        let product = grouping.products.values().next().unwrap();
        assert_eq!(product.total_stock, 8);
        assert_eq!(product.sizes_label(), "M, L");
        assert_eq!(product.items.len(), 2);
        assert_eq!(product.key.supplier, "Acme");
    }

    #[test]
    fn rows_without_sku_or_item_number_are_dropped() {
        let csv = "Item number;Product name;Supplier;Size;Stock;SKU\n\
                   100;Shirt;Acme;M;3;100-M\n\
                   100;Shirt;Acme;L;5;\n\
                   ;Shirt;Acme;S;7;100-S\n";
        let file = parse_inventory(csv.as_bytes()).unwrap();
        let grouping = group_rows(&file, &suppliers());

        assert_eq!(grouping.dropped_rows, 2);
        let product = grouping.products.values().next().unwrap();
        assert_eq!(product.total_stock, 3);
        assert!(product.items.iter().all(|a| a.sku == "100-M"));
    }

    #[test]
    fn total_stock_treats_unparsable_stock_as_zero() {
        let csv = "Item number;Product name;Stock;SKU\n\
                   7;Cap;4;7-1\n\
                   7;Cap;n/a;7-2\n\
                   7;Cap;2 pcs;7-3\n";
        let file = parse_inventory(csv.as_bytes()).unwrap();
        let grouping = group_rows(&file, &suppliers());

        let product = grouping.products.values().next().unwrap();
        assert_eq!(product.total_stock, 6);
        let sum: i64 = product.items.iter().map(|a| a.stock).sum();
        assert_eq!(product.total_stock, sum);
    }

    #[test]
    fn supplier_alias_order_and_case_are_respected() {
        let headers = vec!["SKU".to_string(), "LEVERANDØR".to_string(), "supplier".to_string()];
        assert_eq!(suppliers().resolve(&headers), Some("supplier"));

        let only_danish = vec!["SKU".to_string(), "leverandør".to_string()];
        assert_eq!(suppliers().resolve(&only_danish), Some("leverandør"));
    }

    #[test]
    fn missing_or_blank_supplier_falls_back_to_unknown() {
        let csv = "Item number;Product name;Supplier;SKU\n1;Sock;;1-A\n";
        let file = parse_inventory(csv.as_bytes()).unwrap();
        let grouping = group_rows(&file, &suppliers());
        assert_eq!(grouping.products.keys().next().unwrap().supplier, UNKNOWN_SUPPLIER);

        let csv = "Item number;Product name;SKU\n1;Sock;1-A\n";
        let file = parse_inventory(csv.as_bytes()).unwrap();
        let grouping = group_rows(&file, &suppliers());
        assert_eq!(grouping.products.keys().next().unwrap().supplier, UNKNOWN_SUPPLIER);
    }

    #[test]
    fn same_item_number_with_different_supplier_is_a_separate_product() {
        let csv = "Item number;Product name;Supplier;SKU;Stock\n\
                   1;Sock;Acme;1-A;1\n\
                   1;Sock;Other;1-B;2\n";
        let file = parse_inventory(csv.as_bytes()).unwrap();
        let grouping = group_rows(&file, &suppliers());
        assert_eq!(grouping.products.len(), 2);
        assert_eq!(grouping.total_stock(), 3);
    }

    #[test]
    fn stock_overflow_rejects_the_row_and_keeps_an_exact_total() {
        let csv = "Item number;Product name;SKU;Stock\n\
                   1;A;1-a;9223372036854775807\n\
                   1;A;1-b;1\n\
                   2;B;2-a;9223372036854775807\n";
        let file = parse_inventory(csv.as_bytes()).unwrap();
        let grouping = group_rows(&file, &suppliers());

        assert_eq!(grouping.rejected_rows, 1);
        assert_eq!(grouping.article_count(), 2);
        let product = grouping.products.values().next().unwrap();
        assert_eq!(product.total_stock, i64::MAX);
        assert!(product.items.iter().all(|a| a.sku == "1-a"));
        assert_eq!(grouping.total_stock(), i64::MAX);
    }
}
