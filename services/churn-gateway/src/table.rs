//! Single-row tabular view of a [`FeatureRecord`], the shape the model consumes.

use serde::Serialize;

use crate::error::PredictError;
use crate::form::{FeatureRecord, Scalar};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: &'static str,
    pub values: Vec<Option<Scalar>>,
}

/// One column per feature, each holding a one-element sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabularRow {
    columns: Vec<Column>,
}

impl TabularRow {
    /// Lifts the record as-is. Shape is fixed (1 x 12) whatever the values are.
    pub fn from_record(record: &FeatureRecord) -> Self {
        let columns = record
            .fields()
            .into_iter()
            .map(|(name, value)| Column { name, values: vec![value.cloned()] })
            .collect();
        TabularRow { columns }
    }

    pub fn columns(&self) -> &[Column] { &self.columns }

    pub fn column_names(&self) -> Vec<&'static str> { self.columns.iter().map(|c| c.name).collect() }

    pub fn n_rows(&self) -> usize { self.columns.first().map(|c| c.values.len()).unwrap_or(0) }

    pub fn n_cols(&self) -> usize { self.columns.len() }

    /// Row-major numeric matrix in column order. Missing or non-numeric cells are a schema mismatch.
    pub fn to_matrix(&self) -> Result<Vec<Vec<f64>>, PredictError> {
        let mut rows = vec![Vec::with_capacity(self.n_cols()); self.n_rows()];
        for col in &self.columns {
            for (r, cell) in col.values.iter().enumerate() {
                let v = match cell {
                    None => return Err(PredictError::SchemaMismatch(format!("column `{}` is missing", col.name))),
                    Some(s) => s.as_f64().ok_or_else(|| {
                        PredictError::SchemaMismatch(format!("column `{}` has non-numeric value {s}", col.name))
                    })?,
                };
                rows[r].push(v);
            }
        }
        Ok(rows)
    }
}
