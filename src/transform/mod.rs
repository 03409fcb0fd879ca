//! Transformation stages: typed records, aggregate features and the star schema.

pub mod features;
pub mod records;
pub mod schema;

pub use features::{Aggregate, Features, engineer_features};
pub use records::{RecordOptions, SalesRecord, parse_records};
pub use schema::{StarSchema, TableName, build_star_schema};
