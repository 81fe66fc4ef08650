use dstrack_core::errors::TrackError;
use dstrack_core::serde::{from_json_str, to_canonical_json_string};
use serde::{Deserialize, Serialize};

use crate::frame::{DataType, Frame};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub dtype: DataType,
    /// True when the column holds no missing values.
    pub required: bool,
}

/// Column names and types of a dataset, in column order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn infer(frame: &Frame) -> Self {
        let columns = frame
            .columns()
            .iter()
            .map(|column| ColumnSpec {
                name: column.name.clone(),
                dtype: column.dtype,
                required: column.null_count() == 0,
            })
            .collect();
        Self { columns }
    }

    pub fn to_json(&self) -> Result<String, TrackError> {
        to_canonical_json_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, TrackError> {
        from_json_str(text)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|spec| spec.name == name)
    }
}
