//! Typed view of the raw sales extract.
//!
//! [`parse_records`] checks that every required column is present, then turns
//! each raw row into a [`SalesRecord`]. Cells are trimmed of surrounding
//! whitespace, so keys differing only in padding are the same key. Empty cells
//! and the usual missing-value markers (`NA`, `NaN`, `NULL`, ...) become `None`.

use chrono::NaiveDate;
use csv::StringRecord;
use snafu::prelude::*;
use tracing::warn;

use crate::config::{NullKeyPolicy, default_date_formats};
use crate::emit;
use crate::error::{
    DateParseSnafu, InvalidNumberSnafu, MissingColumnSnafu, NullKeySnafu, TransformError,
};
use crate::metrics::events::NullKeysSkipped;
use crate::source::RawTable;

pub const ORDER_ID: &str = "Order ID";
pub const ORDER_DATE: &str = "Order Date";
pub const SHIP_MODE: &str = "Ship Mode";
pub const CUSTOMER_ID: &str = "Customer ID";
pub const CUSTOMER_NAME: &str = "Customer Name";
pub const SEGMENT: &str = "Segment";
pub const COUNTRY: &str = "Country";
pub const CITY: &str = "City";
pub const STATE: &str = "State";
pub const POSTAL_CODE: &str = "Postal Code";
pub const REGION: &str = "Region";
pub const PRODUCT_ID: &str = "Product ID";
pub const PRODUCT_NAME: &str = "Product Name";
pub const CATEGORY: &str = "Category";
pub const SUB_CATEGORY: &str = "Sub-Category";
pub const SALES: &str = "Sales";
pub const QUANTITY: &str = "Quantity";
pub const DISCOUNT: &str = "Discount";
pub const PROFIT: &str = "Profit";

/// Cell values read as missing, matched after trimming.
const NULL_TOKENS: [&str; 19] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>",
    "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null", "",
];

/// Columns the extract must carry. Any other column is ignored.
pub const REQUIRED_COLUMNS: [&str; 19] = [
    CUSTOMER_ID,
    CUSTOMER_NAME,
    SEGMENT,
    COUNTRY,
    CITY,
    STATE,
    POSTAL_CODE,
    PRODUCT_ID,
    PRODUCT_NAME,
    CATEGORY,
    SUB_CATEGORY,
    ORDER_ID,
    ORDER_DATE,
    SHIP_MODE,
    REGION,
    SALES,
    QUANTITY,
    DISCOUNT,
    PROFIT,
];

/// One row of the extract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalesRecord {
    pub order_id: Option<String>,
    pub order_date: Option<NaiveDate>,
    pub ship_mode: Option<String>,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub segment: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub region: Option<String>,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub sales: Option<f64>,
    pub quantity: Option<i64>,
    pub discount: Option<f64>,
    pub profit: Option<f64>,
}

/// Settings for turning raw rows into records.
#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub date_formats: Vec<String>,
    pub null_keys: NullKeyPolicy,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            date_formats: default_date_formats(),
            null_keys: NullKeyPolicy::Skip,
        }
    }
}

/// Resolved positions of the required columns.
struct ColumnIndex([usize; REQUIRED_COLUMNS.len()]);

impl ColumnIndex {
    fn resolve(table: &RawTable) -> Result<Self, TransformError> {
        let mut positions = [0; REQUIRED_COLUMNS.len()];
        for (slot, column) in positions.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = table
                .column_index(column)
                .context(MissingColumnSnafu { column })?;
        }
        Ok(Self(positions))
    }

    fn get<'r>(&self, row: &'r StringRecord, column: &str) -> Option<&'r str> {
        let slot = REQUIRED_COLUMNS.iter().position(|c| *c == column)?;
        row.get(self.0[slot])
            .map(str::trim)
            .filter(|value| !NULL_TOKENS.contains(value))
    }
}

/// Convert the raw table into typed records, in input order.
pub fn parse_records(
    table: &RawTable,
    options: &RecordOptions,
) -> Result<Vec<SalesRecord>, TransformError> {
    let columns = ColumnIndex::resolve(table)?;

    let records = table
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| parse_row(&columns, row, i + 1, options))
        .collect::<Result<Vec<_>, _>>()?;

    report_null_keys(&records);
    Ok(records)
}

fn parse_row(
    columns: &ColumnIndex,
    row: &StringRecord,
    line: usize,
    options: &RecordOptions,
) -> Result<SalesRecord, TransformError> {
    let text = |column: &str| columns.get(row, column).map(str::to_string);

    if options.null_keys == NullKeyPolicy::Reject {
        for column in [ORDER_ID, ORDER_DATE, CUSTOMER_ID, PRODUCT_ID] {
            ensure!(
                columns.get(row, column).is_some(),
                NullKeySnafu { row: line, column }
            );
        }
    }

    let order_date = columns
        .get(row, ORDER_DATE)
        .map(|value| {
            parse_date(value, &options.date_formats).context(DateParseSnafu { row: line, value })
        })
        .transpose()?;

    Ok(SalesRecord {
        order_id: text(ORDER_ID),
        order_date,
        ship_mode: text(SHIP_MODE),
        customer_id: text(CUSTOMER_ID),
        customer_name: text(CUSTOMER_NAME),
        segment: text(SEGMENT),
        country: text(COUNTRY),
        city: text(CITY),
        state: text(STATE),
        postal_code: text(POSTAL_CODE),
        region: text(REGION),
        product_id: text(PRODUCT_ID),
        product_name: text(PRODUCT_NAME),
        category: text(CATEGORY),
        sub_category: text(SUB_CATEGORY),
        sales: parse_float(columns.get(row, SALES), line, SALES)?,
        quantity: parse_int(columns.get(row, QUANTITY), line, QUANTITY)?,
        discount: parse_float(columns.get(row, DISCOUNT), line, DISCOUNT)?,
        profit: parse_float(columns.get(row, PROFIT), line, PROFIT)?,
    })
}

/// Parse a calendar date, trying each format in order.
///
/// A trailing time of day (`2024-03-15 00:00:00`, `2024-03-15T00:00:00`) is
/// ignored.
pub fn parse_date(value: &str, formats: &[String]) -> Option<NaiveDate> {
    let parse = |text: &str| {
        formats
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
    };

    parse(value).or_else(|| {
        let (date_part, _) = value.split_once(['T', ' '])?;
        parse(date_part)
    })
}

/// Non-finite values (`inf`, `-infinity`) are read as missing.
fn parse_float(
    value: Option<&str>,
    row: usize,
    column: &'static str,
) -> Result<Option<f64>, TransformError> {
    let parsed = value
        .map(|v| {
            v.parse::<f64>().ok().context(InvalidNumberSnafu {
                row,
                column,
                value: v,
            })
        })
        .transpose()?;
    Ok(parsed.filter(|f| f.is_finite()))
}

fn parse_int(
    value: Option<&str>,
    row: usize,
    column: &'static str,
) -> Result<Option<i64>, TransformError> {
    value
        .map(|v| {
            v.parse::<i64>()
                .ok()
                .or_else(|| {
                    // Spreadsheet tools sometimes write whole numbers as "3.0".
                    v.parse::<f64>()
                        .ok()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| f as i64)
                })
                .context(InvalidNumberSnafu {
                    row,
                    column,
                    value: v,
                })
        })
        .transpose()
}

fn report_null_keys(records: &[SalesRecord]) {
    let counts = [
        (ORDER_ID, records.iter().filter(|r| r.order_id.is_none()).count()),
        (ORDER_DATE, records.iter().filter(|r| r.order_date.is_none()).count()),
        (CUSTOMER_ID, records.iter().filter(|r| r.customer_id.is_none()).count()),
        (PRODUCT_ID, records.iter().filter(|r| r.product_id.is_none()).count()),
    ];

    for (column, count) in counts {
        if count > 0 {
            warn!(
                "{} rows have an empty '{}'; they are kept in the fact table but left out \
                 of groupings",
                count, column
            );
            emit!(NullKeysSkipped {
                column,
                count: count as u64,
            });
        }
    }
}
