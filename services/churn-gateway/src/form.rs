//! Submission decoding into a [`FeatureRecord`].
//!
//! Decoding only extracts the twelve named keys. Values are not coerced or validated here;
//! a missing key is `None` and a bad value travels on until the model input is built.

use axum::extract::Multipart;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::PredictError;

/// Form keys in model-schema order.
pub const FEATURE_COLUMNS: [&str; 12] = [
    "credit_score",
    "France",
    "Germany",
    "Spain",
    "gender",
    "age",
    "tenure",
    "balance",
    "products_number",
    "credit_card",
    "active_member",
    "estimated_salary",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Numeric view used when the model input matrix is built.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            Scalar::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for Scalar { fn from(v: i64) -> Self { Scalar::Int(v) } }
impl From<f64> for Scalar { fn from(v: f64) -> Self { Scalar::Float(v) } }
impl From<&str> for Scalar { fn from(v: &str) -> Self { Scalar::Text(v.to_string()) } }

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureRecord {
    pub credit_score: Option<Scalar>,
    #[serde(rename = "France")]
    pub france: Option<Scalar>,
    #[serde(rename = "Germany")]
    pub germany: Option<Scalar>,
    #[serde(rename = "Spain")]
    pub spain: Option<Scalar>,
    pub gender: Option<Scalar>,
    pub age: Option<Scalar>,
    pub tenure: Option<Scalar>,
    pub balance: Option<Scalar>,
    pub products_number: Option<Scalar>,
    pub credit_card: Option<Scalar>,
    pub active_member: Option<Scalar>,
    pub estimated_salary: Option<Scalar>,
}

impl FeatureRecord {
    /// Fields paired with their column names, in [`FEATURE_COLUMNS`] order.
    pub fn fields(&self) -> [(&'static str, Option<&Scalar>); 12] {
        [
            (FEATURE_COLUMNS[0], self.credit_score.as_ref()),
            (FEATURE_COLUMNS[1], self.france.as_ref()),
            (FEATURE_COLUMNS[2], self.germany.as_ref()),
            (FEATURE_COLUMNS[3], self.spain.as_ref()),
            (FEATURE_COLUMNS[4], self.gender.as_ref()),
            (FEATURE_COLUMNS[5], self.age.as_ref()),
            (FEATURE_COLUMNS[6], self.tenure.as_ref()),
            (FEATURE_COLUMNS[7], self.balance.as_ref()),
            (FEATURE_COLUMNS[8], self.products_number.as_ref()),
            (FEATURE_COLUMNS[9], self.credit_card.as_ref()),
            (FEATURE_COLUMNS[10], self.active_member.as_ref()),
            (FEATURE_COLUMNS[11], self.estimated_salary.as_ref()),
        ]
    }

    /// Reads the twelve keys out of a generic key/value submission. Other keys are ignored.
    pub fn from_pairs(form: &HashMap<String, String>) -> Self {
        let get = |key: &str| form.get(key).map(|v| Scalar::Text(v.clone()));
        FeatureRecord {
            credit_score: get("credit_score"),
            france: get("France"),
            germany: get("Germany"),
            spain: get("Spain"),
            gender: get("gender"),
            age: get("age"),
            tenure: get("tenure"),
            balance: get("balance"),
            products_number: get("products_number"),
            credit_card: get("credit_card"),
            active_member: get("active_member"),
            estimated_salary: get("estimated_salary"),
        }
    }

    pub fn present_count(&self) -> usize { self.fields().iter().filter(|(_, v)| v.is_some()).count() }
}

/// How the request body is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionFormat { UrlEncoded, Json }

pub fn decode(body: &[u8], format: SubmissionFormat) -> Result<FeatureRecord, PredictError> {
    match format {
        SubmissionFormat::UrlEncoded => {
            let text = std::str::from_utf8(body).map_err(|e| PredictError::Decode(format!("form body is not utf-8: {e}")))?;
            let pairs: HashMap<String, String> =
                serde_urlencoded::from_str(text).map_err(|e| PredictError::Decode(e.to_string()))?;
            Ok(FeatureRecord::from_pairs(&pairs))
        }
        SubmissionFormat::Json => {
            let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| PredictError::Decode(e.to_string()))?;
            if !value.is_object() {
                return Err(PredictError::Decode("expected a JSON object".into()));
            }
            serde_json::from_value(value).map_err(|e| PredictError::Decode(e.to_string()))
        }
    }
}

/// Reads a `multipart/form-data` submission, one text value per named part. A malformed stream is a decode error.
pub async fn decode_multipart(mut multipart: Multipart) -> Result<FeatureRecord, PredictError> {
    let mut pairs = HashMap::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| PredictError::Decode(e.to_string()))? {
        let Some(name) = field.name().map(str::to_owned) else { continue };
        let value = field.text().await.map_err(|e| PredictError::Decode(format!("field `{name}`: {e}")))?;
        pairs.insert(name, value);
    }
    Ok(FeatureRecord::from_pairs(&pairs))
}
