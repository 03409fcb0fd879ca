//! Grouped aggregate features.
//!
//! Four aggregates are computed from the records, each a table keyed by its
//! grouping identifier with exactly one value column. The value column names
//! are consumed downstream by warehouse users, so they must not change.

use std::collections::BTreeMap;

use super::records::SalesRecord;

pub const CUSTOMER_SALES_SUM: &str = "customers.SUM(sales.Sales)";
pub const CUSTOMER_QUANTITY_MAX: &str = "customers.MAX(sales.Quantity)";
pub const PRODUCT_SALES_SUM: &str = "products.SUM(sales.Sales)";
pub const PRODUCT_SALES_MEAN: &str = "products.MEAN(sales.Sales)";

/// A keyed table with one computed column, ordered by key.
///
/// A group whose measure was empty on every row holds `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate<V> {
    values: BTreeMap<String, Option<V>>,
}

impl<V: Copy> Aggregate<V> {
    fn new(values: BTreeMap<String, Option<V>>) -> Self {
        Self { values }
    }

    /// Left-join lookup: `None` when the key is absent or its value is null.
    pub fn get(&self, key: Option<&str>) -> Option<V> {
        key.and_then(|k| self.values.get(k).copied().flatten())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Iterate `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<V>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// The four aggregate tables joined into the fact table.
#[derive(Debug, Clone, PartialEq)]
pub struct Features {
    pub customer_sales_sum: Aggregate<f64>,
    pub customer_quantity_max: Aggregate<i64>,
    pub product_sales_sum: Aggregate<f64>,
    pub product_sales_mean: Aggregate<f64>,
}

#[derive(Default)]
struct SalesAccumulator {
    sum: f64,
    count: usize,
}

impl SalesAccumulator {
    fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Compute the aggregate features. Rows with an empty key join no group.
pub fn engineer_features(records: &[SalesRecord]) -> Features {
    let mut customer_sales: BTreeMap<String, SalesAccumulator> = BTreeMap::new();
    let mut customer_quantity: BTreeMap<String, Option<i64>> = BTreeMap::new();
    let mut product_sales: BTreeMap<String, SalesAccumulator> = BTreeMap::new();

    for record in records {
        if let Some(customer) = &record.customer_id {
            customer_sales
                .entry(customer.clone())
                .or_default()
                .add(record.sales);

            let max = customer_quantity.entry(customer.clone()).or_default();
            *max = match (*max, record.quantity) {
                (Some(current), Some(q)) => Some(current.max(q)),
                (current, q) => current.or(q),
            };
        }

        if let Some(product) = &record.product_id {
            product_sales
                .entry(product.clone())
                .or_default()
                .add(record.sales);
        }
    }

    let sums = |groups: &BTreeMap<String, SalesAccumulator>| -> BTreeMap<String, Option<f64>> {
        groups
            .iter()
            .map(|(k, acc)| (k.clone(), Some(acc.sum)))
            .collect()
    };

    Features {
        customer_sales_sum: Aggregate::new(sums(&customer_sales)),
        customer_quantity_max: Aggregate::new(customer_quantity),
        product_sales_sum: Aggregate::new(sums(&product_sales)),
        product_sales_mean: Aggregate::new(
            product_sales
                .iter()
                .map(|(k, acc)| (k.clone(), acc.mean()))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        customer: Option<&str>,
        product: &str,
        sales: Option<f64>,
        quantity: i64,
    ) -> SalesRecord {
        SalesRecord {
            customer_id: customer.map(String::from),
            product_id: Some(product.to_string()),
            sales,
            quantity: Some(quantity),
            ..SalesRecord::default()
        }
    }

    #[test]
    fn test_customer_and_product_aggregates() {
        let records = vec![
            record(Some("C-2"), "P-1", Some(10.0), 2),
            record(Some("C-1"), "P-1", Some(20.0), 5),
            record(Some("C-2"), "P-2", Some(5.5), 7),
        ];
        let features = engineer_features(&records);

        assert_eq!(features.customer_sales_sum.get(Some("C-2")), Some(15.5));
        assert_eq!(features.customer_sales_sum.get(Some("C-1")), Some(20.0));
        assert_eq!(features.customer_quantity_max.get(Some("C-2")), Some(7));
        assert_eq!(features.product_sales_sum.get(Some("P-1")), Some(30.0));
        assert_eq!(features.product_sales_mean.get(Some("P-1")), Some(15.0));
        assert_eq!(features.product_sales_mean.get(Some("P-2")), Some(5.5));
    }

    #[test]
    fn test_aggregates_are_ordered_by_key() {
        let records = vec![
            record(Some("C-9"), "P-1", Some(1.0), 1),
            record(Some("C-1"), "P-1", Some(1.0), 1),
        ];
        let features = engineer_features(&records);
        let keys: Vec<&str> = features
            .customer_sales_sum
            .iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["C-1", "C-9"]);
    }

    #[test]
    fn test_null_keys_join_no_group() {
        let records = vec![
            record(None, "P-1", Some(10.0), 2),
            record(Some("C-1"), "P-1", Some(1.0), 1),
        ];
        let features = engineer_features(&records);
        assert_eq!(features.customer_sales_sum.len(), 1);
        assert_eq!(features.customer_sales_sum.get(None), None);
        assert_eq!(features.product_sales_sum.get(Some("P-1")), Some(11.0));
    }

    #[test]
    fn test_missing_measures_are_skipped() {
        let records = vec![
            record(Some("C-1"), "P-1", None, 3),
            record(Some("C-2"), "P-2", None, 1),
            record(Some("C-2"), "P-2", Some(4.0), 1),
        ];
        let features = engineer_features(&records);

        assert_eq!(features.customer_sales_sum.get(Some("C-1")), Some(0.0));
        assert_eq!(features.product_sales_mean.get(Some("P-1")), None);
        assert_eq!(features.product_sales_mean.get(Some("P-2")), Some(4.0));
    }
}
