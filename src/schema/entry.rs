//! Data dictionary entries

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cocos::CocosLabel;
use crate::error::OdsError;
use crate::ods::NodeKind;

/// Storage type of a schema location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    /// Named sub-fields
    Structure,
    /// Array of structures
    StructArray,
    /// Floating point data with the given number of dimensions
    Float(u8),
    /// Integer data with the given number of dimensions
    Int(u8),
    /// String data with the given number of dimensions
    Str(u8),
    /// Free-form code parameters, exempt from schema checks below this point
    CodeParameters,
}

impl DataType {
    /// Kind of node that lives at a location of this type
    pub fn node_kind(&self) -> NodeKind {
        match self {
            DataType::Structure => NodeKind::Mapping,
            DataType::StructArray => NodeKind::Sequence,
            _ => NodeKind::Leaf,
        }
    }

    /// Number of dimensions for data types
    pub fn ndim(&self) -> Option<u8> {
        match self {
            DataType::Float(n) | DataType::Int(n) | DataType::Str(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float(_))
    }

    pub fn is_data(&self) -> bool {
        self.ndim().is_some()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Structure => f.write_str("structure"),
            DataType::StructArray => f.write_str("struct_array"),
            DataType::Float(n) => write!(f, "FLT_{}D", n),
            DataType::Int(n) => write!(f, "INT_{}D", n),
            DataType::Str(n) => write!(f, "STR_{}D", n),
            DataType::CodeParameters => f.write_str("code_parameters"),
        }
    }
}

impl From<DataType> for String {
    fn from(dt: DataType) -> Self {
        dt.to_string()
    }
}

impl TryFrom<String> for DataType {
    type Error = OdsError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "structure" => return Ok(DataType::Structure),
            "struct_array" => return Ok(DataType::StructArray),
            "code_parameters" => return Ok(DataType::CodeParameters),
            _ => {}
        }
        let invalid = || OdsError::Configuration(format!("Unknown data type `{}`", s));
        let (prefix, dims) = s.split_once('_').ok_or_else(invalid)?;
        let ndim = dims
            .strip_suffix('D')
            .and_then(|n| n.parse::<u8>().ok())
            .ok_or_else(invalid)?;
        match prefix {
            "FLT" => Ok(DataType::Float(ndim)),
            "INT" => Ok(DataType::Int(ndim)),
            "STR" => Ok(DataType::Str(ndim)),
            _ => Err(invalid()),
        }
    }
}

/// How a quantity evolves in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeType {
    #[default]
    Static,
    Constant,
    Dynamic,
}

/// One location of the data dictionary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaEntry {
    pub data_type: DataType,
    #[serde(default, rename = "type")]
    pub time_type: TimeType,
    /// Coordinate locations (wildcard form) or `1...N` for free dimensions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coordinates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    /// Coordinate-convention transformation applied to this quantity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cocos: Option<CocosLabel>,
}

impl SchemaEntry {
    pub(crate) fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            time_type: TimeType::Static,
            coordinates: Vec::new(),
            units: None,
            documentation: None,
            cocos: None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.time_type == TimeType::Dynamic
    }
}
