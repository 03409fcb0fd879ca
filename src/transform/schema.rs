//! Star schema construction.
//!
//! Four dimension tables are extracted from the records by deduplicating on
//! their key (first occurrence wins) and one fact table carries every record,
//! left-joined with the aggregate features.

use arrow::array::{
    ArrayRef, Date32Array, Float64Array, Int32Array, Int64Array, RecordBatch, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use chrono::{Datelike, NaiveDate};
use snafu::prelude::*;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::features::{
    CUSTOMER_QUANTITY_MAX, CUSTOMER_SALES_SUM, Features, PRODUCT_SALES_MEAN, PRODUCT_SALES_SUM,
};
use super::records::{
    CATEGORY, CITY, COUNTRY, CUSTOMER_ID, CUSTOMER_NAME, DISCOUNT, ORDER_DATE, ORDER_ID,
    POSTAL_CODE, PRODUCT_ID, PRODUCT_NAME, PROFIT, QUANTITY, SALES, SEGMENT, SHIP_MODE, STATE,
    SUB_CATEGORY, SalesRecord,
};
use crate::error::{ArrowSnafu, TransformError};

pub const SALE_ID: &str = "Sale ID";
pub const DATE: &str = "Date";
pub const DAY: &str = "Day";
pub const MONTH: &str = "Month";
pub const QUARTER: &str = "Quarter";
pub const YEAR: &str = "Year";

/// Days between 0001-01-01 (CE day 1) and the Unix epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// The five destination tables, in write order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableName {
    CustomerDim,
    ProductDim,
    OrderDim,
    TimeDim,
    SalesFact,
}

impl TableName {
    pub const ALL: [TableName; 5] = [
        TableName::CustomerDim,
        TableName::ProductDim,
        TableName::OrderDim,
        TableName::TimeDim,
        TableName::SalesFact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::CustomerDim => "customer_dim",
            TableName::ProductDim => "product_dim",
            TableName::OrderDim => "order_dim",
            TableName::TimeDim => "time_dim",
            TableName::SalesFact => "sales_fact",
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRow {
    pub customer_id: String,
    pub customer_name: Option<String>,
    pub segment: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductRow {
    pub product_id: String,
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub order_id: String,
    pub order_date: Option<NaiveDate>,
    pub ship_mode: Option<String>,
}

/// Calendar attributes of one order date.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeRow {
    pub date: NaiveDate,
    pub day: i32,
    pub month: i32,
    pub quarter: i32,
    pub year: i32,
}

impl TimeRow {
    pub fn from_date(date: NaiveDate) -> Self {
        let month = date.month() as i32;
        Self {
            date,
            day: date.day() as i32,
            month,
            quarter: (month - 1) / 3 + 1,
            year: date.year(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SalesFactRow {
    pub sale_id: i64,
    pub order_id: Option<String>,
    pub product_id: Option<String>,
    pub customer_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub sales: Option<f64>,
    pub quantity: Option<i64>,
    pub discount: Option<f64>,
    pub profit: Option<f64>,
    pub customer_sales_sum: Option<f64>,
    pub customer_quantity_max: Option<i64>,
    pub product_sales_sum: Option<f64>,
    pub product_sales_mean: Option<f64>,
}

/// All five tables of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StarSchema {
    pub customers: Vec<CustomerRow>,
    pub products: Vec<ProductRow>,
    pub orders: Vec<OrderRow>,
    pub times: Vec<TimeRow>,
    pub sales: Vec<SalesFactRow>,
}

/// Keep the first row produced for each key, in input order.
fn first_by_key<'a, T>(
    records: &'a [SalesRecord],
    key: impl Fn(&'a SalesRecord) -> Option<&'a str>,
    row: impl Fn(&'a str, &'a SalesRecord) -> T,
) -> Vec<T> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|record| {
            let k = key(record)?;
            seen.insert(k).then(|| row(k, record))
        })
        .collect()
}

/// Build the dimension tables and the fact table.
pub fn build_star_schema(records: &[SalesRecord], features: &Features) -> StarSchema {
    let customers = first_by_key(
        records,
        |r| r.customer_id.as_deref(),
        |id, r| CustomerRow {
            customer_id: id.to_string(),
            customer_name: r.customer_name.clone(),
            segment: r.segment.clone(),
            country: r.country.clone(),
            city: r.city.clone(),
            state: r.state.clone(),
            postal_code: r.postal_code.clone(),
        },
    );

    let products = first_by_key(
        records,
        |r| r.product_id.as_deref(),
        |id, r| ProductRow {
            product_id: id.to_string(),
            product_name: r.product_name.clone(),
            category: r.category.clone(),
            sub_category: r.sub_category.clone(),
        },
    );

    let orders = first_by_key(
        records,
        |r| r.order_id.as_deref(),
        |id, r| OrderRow {
            order_id: id.to_string(),
            order_date: r.order_date,
            ship_mode: r.ship_mode.clone(),
        },
    );

    let mut seen_dates = HashSet::new();
    let times = records
        .iter()
        .filter_map(|r| r.order_date)
        .filter(|date| seen_dates.insert(*date))
        .map(TimeRow::from_date)
        .collect();

    let sales = records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let customer = r.customer_id.as_deref();
            let product = r.product_id.as_deref();
            SalesFactRow {
                sale_id: i as i64 + 1,
                order_id: r.order_id.clone(),
                product_id: r.product_id.clone(),
                customer_id: r.customer_id.clone(),
                date: r.order_date,
                sales: r.sales,
                quantity: r.quantity,
                discount: r.discount,
                profit: r.profit,
                customer_sales_sum: features.customer_sales_sum.get(customer),
                customer_quantity_max: features.customer_quantity_max.get(customer),
                product_sales_sum: features.product_sales_sum.get(product),
                product_sales_mean: features.product_sales_mean.get(product),
            }
        })
        .collect();

    StarSchema {
        customers,
        products,
        orders,
        times,
        sales,
    }
}

fn date32(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

fn utf8<'a>(values: impl Iterator<Item = Option<&'a str>>) -> ArrayRef {
    Arc::new(values.collect::<StringArray>())
}

fn key(name: &str, data_type: DataType) -> Field {
    Field::new(name, data_type, false)
}

fn col(name: &str, data_type: DataType) -> Field {
    Field::new(name, data_type, true)
}

pub fn customer_dim_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        key(CUSTOMER_ID, DataType::Utf8),
        col(CUSTOMER_NAME, DataType::Utf8),
        col(SEGMENT, DataType::Utf8),
        col(COUNTRY, DataType::Utf8),
        col(CITY, DataType::Utf8),
        col(STATE, DataType::Utf8),
        col(POSTAL_CODE, DataType::Utf8),
    ]))
}

pub fn product_dim_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        key(PRODUCT_ID, DataType::Utf8),
        col(PRODUCT_NAME, DataType::Utf8),
        col(CATEGORY, DataType::Utf8),
        col(SUB_CATEGORY, DataType::Utf8),
    ]))
}

pub fn order_dim_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        key(ORDER_ID, DataType::Utf8),
        col(ORDER_DATE, DataType::Date32),
        col(SHIP_MODE, DataType::Utf8),
    ]))
}

pub fn time_dim_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        key(DATE, DataType::Date32),
        key(DAY, DataType::Int32),
        key(MONTH, DataType::Int32),
        key(QUARTER, DataType::Int32),
        key(YEAR, DataType::Int32),
    ]))
}

pub fn sales_fact_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        key(SALE_ID, DataType::Int64),
        col(ORDER_ID, DataType::Utf8),
        col(PRODUCT_ID, DataType::Utf8),
        col(CUSTOMER_ID, DataType::Utf8),
        col(DATE, DataType::Date32),
        col(SALES, DataType::Float64),
        col(QUANTITY, DataType::Int64),
        col(DISCOUNT, DataType::Float64),
        col(PROFIT, DataType::Float64),
        col(CUSTOMER_SALES_SUM, DataType::Float64),
        col(CUSTOMER_QUANTITY_MAX, DataType::Int64),
        col(PRODUCT_SALES_SUM, DataType::Float64),
        col(PRODUCT_SALES_MEAN, DataType::Float64),
    ]))
}

impl StarSchema {
    pub fn row_count(&self, table: TableName) -> usize {
        match table {
            TableName::CustomerDim => self.customers.len(),
            TableName::ProductDim => self.products.len(),
            TableName::OrderDim => self.orders.len(),
            TableName::TimeDim => self.times.len(),
            TableName::SalesFact => self.sales.len(),
        }
    }

    /// Convert one table into an Arrow record batch.
    pub fn to_record_batch(&self, table: TableName) -> Result<RecordBatch, TransformError> {
        let (schema, columns): (SchemaRef, Vec<ArrayRef>) = match table {
            TableName::CustomerDim => {
                let rows = &self.customers;
                (
                    customer_dim_schema(),
                    vec![
                        utf8(rows.iter().map(|r| Some(r.customer_id.as_str()))),
                        utf8(rows.iter().map(|r| r.customer_name.as_deref())),
                        utf8(rows.iter().map(|r| r.segment.as_deref())),
                        utf8(rows.iter().map(|r| r.country.as_deref())),
                        utf8(rows.iter().map(|r| r.city.as_deref())),
                        utf8(rows.iter().map(|r| r.state.as_deref())),
                        utf8(rows.iter().map(|r| r.postal_code.as_deref())),
                    ],
                )
            }
            TableName::ProductDim => {
                let rows = &self.products;
                (
                    product_dim_schema(),
                    vec![
                        utf8(rows.iter().map(|r| Some(r.product_id.as_str()))),
                        utf8(rows.iter().map(|r| r.product_name.as_deref())),
                        utf8(rows.iter().map(|r| r.category.as_deref())),
                        utf8(rows.iter().map(|r| r.sub_category.as_deref())),
                    ],
                )
            }
            TableName::OrderDim => {
                let rows = &self.orders;
                (
                    order_dim_schema(),
                    vec![
                        utf8(rows.iter().map(|r| Some(r.order_id.as_str()))),
                        Arc::new(Date32Array::from_iter(
                            rows.iter().map(|r| r.order_date.map(date32)),
                        )),
                        utf8(rows.iter().map(|r| r.ship_mode.as_deref())),
                    ],
                )
            }
            TableName::TimeDim => {
                let rows = &self.times;
                (
                    time_dim_schema(),
                    vec![
                        Arc::new(Date32Array::from_iter_values(
                            rows.iter().map(|r| date32(r.date)),
                        )),
                        Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.day))),
                        Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.month))),
                        Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.quarter))),
                        Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.year))),
                    ],
                )
            }
            TableName::SalesFact => {
                let rows = &self.sales;
                (
                    sales_fact_schema(),
                    vec![
                        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.sale_id))),
                        utf8(rows.iter().map(|r| r.order_id.as_deref())),
                        utf8(rows.iter().map(|r| r.product_id.as_deref())),
                        utf8(rows.iter().map(|r| r.customer_id.as_deref())),
                        Arc::new(Date32Array::from_iter(
                            rows.iter().map(|r| r.date.map(date32)),
                        )),
                        Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.sales))),
                        Arc::new(Int64Array::from_iter(rows.iter().map(|r| r.quantity))),
                        Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.discount))),
                        Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.profit))),
                        Arc::new(Float64Array::from_iter(
                            rows.iter().map(|r| r.customer_sales_sum),
                        )),
                        Arc::new(Int64Array::from_iter(
                            rows.iter().map(|r| r.customer_quantity_max),
                        )),
                        Arc::new(Float64Array::from_iter(
                            rows.iter().map(|r| r.product_sales_sum),
                        )),
                        Arc::new(Float64Array::from_iter(
                            rows.iter().map(|r| r.product_sales_mean),
                        )),
                    ],
                )
            }
        };

        RecordBatch::try_new(schema, columns).context(ArrowSnafu {
            table: table.as_str(),
        })
    }

    /// All five tables as record batches, in write order.
    pub fn to_tables(&self) -> Result<Vec<(TableName, RecordBatch)>, TransformError> {
        TableName::ALL
            .into_iter()
            .map(|table| Ok((table, self.to_record_batch(table)?)))
            .collect()
    }
}
