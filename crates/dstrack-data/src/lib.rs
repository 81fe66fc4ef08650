//! Tabular datasets for dstrack: CSV frames, schemas, digests and sources.

pub mod dataset;
pub mod digest;
pub mod frame;
pub mod schema;
pub mod source;

pub use dataset::{Dataset, DatasetProfile, DEFAULT_DATASET_NAME};
pub use digest::{compute_digest, compute_digest_with_limit, DEFAULT_DIGEST_ROWS, DIGEST_LEN};
pub use frame::{read_csv, read_csv_from_reader, Column, DataType, Frame, Value};
pub use schema::{ColumnSpec, Schema};
pub use source::DatasetSource;
