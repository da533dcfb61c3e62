use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use crate::error::{PublishError, Result};

/// Scalar BigQuery types accepted for named query parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScalarType {
    String,
    Bytes,
    Int64,
    Float64,
    Numeric,
    Bignumeric,
    Bool,
    Date,
    Datetime,
    Time,
    Timestamp,
    Geography,
    Json,
}

impl ScalarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::String => "STRING",
            ScalarType::Bytes => "BYTES",
            ScalarType::Int64 => "INT64",
            ScalarType::Float64 => "FLOAT64",
            ScalarType::Numeric => "NUMERIC",
            ScalarType::Bignumeric => "BIGNUMERIC",
            ScalarType::Bool => "BOOL",
            ScalarType::Date => "DATE",
            ScalarType::Datetime => "DATETIME",
            ScalarType::Time => "TIME",
            ScalarType::Timestamp => "TIMESTAMP",
            ScalarType::Geography => "GEOGRAPHY",
            ScalarType::Json => "JSON",
        }
    }
}

impl FromStr for ScalarType {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self> {
        let ty = match s.to_ascii_uppercase().as_str() {
            "STRING" => ScalarType::String,
            "BYTES" => ScalarType::Bytes,
            "INT64" | "INTEGER" => ScalarType::Int64,
            "FLOAT64" | "FLOAT" => ScalarType::Float64,
            "NUMERIC" => ScalarType::Numeric,
            "BIGNUMERIC" => ScalarType::Bignumeric,
            "BOOL" | "BOOLEAN" => ScalarType::Bool,
            "DATE" => ScalarType::Date,
            "DATETIME" => ScalarType::Datetime,
            "TIME" => ScalarType::Time,
            "TIMESTAMP" => ScalarType::Timestamp,
            "GEOGRAPHY" => ScalarType::Geography,
            "JSON" => ScalarType::Json,
            other => {
                return Err(PublishError::InvalidParameter(format!(
                    "unknown parameter type '{}'",
                    other
                )))
            }
        };
        Ok(ty)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub param_type: ScalarType,
    pub value: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, param_type: ScalarType, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            value: value.into(),
        }
    }

    /// Parses every `name:TYPE:value` flag and rejects duplicate names.
    pub fn parse_all<I, S>(flags: I) -> Result<Vec<Parameter>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut parameters = Vec::new();

        for flag in flags {
            let parameter: Parameter = flag.as_ref().parse()?;
            if !seen.insert(parameter.name.clone()) {
                return Err(PublishError::InvalidParameter(format!(
                    "parameter '{}' supplied more than once",
                    parameter.name
                )));
            }
            parameters.push(parameter);
        }

        Ok(parameters)
    }

    fn validate_value(&self) -> Result<()> {
        let ok = match self.param_type {
            ScalarType::Int64 => self.value.parse::<i64>().is_ok(),
            ScalarType::Float64 => self.value.parse::<f64>().is_ok(),
            ScalarType::Bool => matches!(self.value.to_ascii_lowercase().as_str(), "true" | "false"),
            ScalarType::Date => NaiveDate::parse_from_str(&self.value, "%Y-%m-%d").is_ok(),
            _ => true,
        };

        if ok {
            Ok(())
        } else {
            Err(PublishError::InvalidParameter(format!(
                "'{}' is not a valid {} value for parameter '{}'",
                self.value, self.param_type, self.name
            )))
        }
    }
}

impl FromStr for Parameter {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, ':');
        let (name, ty, value) = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(ty), Some(value)) => (name, ty, value),
            _ => {
                return Err(PublishError::InvalidParameter(format!(
                    "'{}' (expected name:TYPE:value)",
                    s
                )))
            }
        };

        let valid_name = name
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_name {
            return Err(PublishError::InvalidParameter(format!(
                "'{}' is not a valid parameter name",
                name
            )));
        }

        let parameter = Parameter::new(name, ty.parse()?, value);
        parameter.validate_value()?;
        Ok(parameter)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.param_type, self.value)
    }
}
