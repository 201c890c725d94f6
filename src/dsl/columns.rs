//! Column mapping: positional meaning of row cells.

use std::collections::HashMap;

use super::error::PredicateError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    /// Cell holds a comma-separated list of values.
    pub multi_value: bool,
}

impl Column {
    pub fn single(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            multi_value: false,
        }
    }

    pub fn multi(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            multi_value: true,
        }
    }
}

/// Ordered, unique column names with a precomputed name-to-index table.
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
}

impl ColumnMapping {
    pub fn new(columns: Vec<Column>) -> Result<Self, PredicateError> {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if index.insert(column.name.clone(), i).is_some() {
                return Err(PredicateError::DuplicateColumn(column.name.clone()));
            }
        }
        Ok(Self { columns, index })
    }

    /// Single-value columns from plain names.
    pub fn from_names<I, S>(names: I) -> Result<Self, PredicateError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(names.into_iter().map(Column::single).collect())
    }

    /// Mark the named columns as multi-value.
    pub fn with_multi_value<'a, I>(mut self, names: I) -> Result<Self, PredicateError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for name in names {
            let idx = self.index_of(name).ok_or_else(|| PredicateError::UnknownField {
                field: name.to_string(),
            })?;
            self.columns[idx].multi_value = true;
        }
        Ok(self)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn is_multi_value(&self, idx: usize) -> bool {
        self.columns.get(idx).is_some_and(|c| c.multi_value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_by_name() {
        let mapping = ColumnMapping::from_names(["UF", "EMAIL", "CNAE"])
            .unwrap()
            .with_multi_value(["CNAE"])
            .unwrap();
        assert_eq!(mapping.index_of("EMAIL"), Some(1));
        assert_eq!(mapping.index_of("email"), None);
        assert!(mapping.is_multi_value(2));
        assert!(!mapping.is_multi_value(0));
        assert_eq!(mapping.len(), 3);
    }

    #[test]
    fn rejects_duplicates() {
        let err = ColumnMapping::from_names(["UF", "UF"]).unwrap_err();
        assert_eq!(err, PredicateError::DuplicateColumn("UF".into()));
    }

    #[test]
    fn multi_value_requires_known_column() {
        let err = ColumnMapping::from_names(["UF"])
            .unwrap()
            .with_multi_value(["CNAE"])
            .unwrap_err();
        assert!(err.is_lookup());
    }
}
