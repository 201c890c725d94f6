use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::dsl::{
    Column, ColumnMapping, CustomRegistry, Operand, OperandKind, Operator, Pattern, Predicate,
    PredicateError, condition, parse_bool, parse_filter_with, parse_number, validate,
};
use crate::expr::{cel_custom, compile_cel};

/// Header of the registry's establishment extract ("Estabelecimentos").
pub const CNPJ_COLUMNS: [&str; 30] = [
    "CNPJ_BASICO",
    "CNPJ_ORDEM",
    "CNPJ_DV",
    "IDENTIFICADOR_MATRIZ_FILIAL",
    "NOME_FANTASIA",
    "SITUACAO_CADASTRAL",
    "DATA_SITUACAO_CADASTRAL",
    "MOTIVO_SITUACAO_CADASTRAL",
    "NOME_CIDADE_EXTERIOR",
    "PAIS",
    "DATA_INICIO_ATIVIDADE",
    "CNAE_FISCAL_PRINCIPAL",
    "CNAE_FISCAL_SECUNDARIA",
    "TIPO_LOGRADOURO",
    "LOGRADOURO",
    "NUMERO",
    "COMPLEMENTO",
    "BAIRRO",
    "CEP",
    "UF",
    "MUNICIPIO",
    "DDD_1",
    "TELEFONE_1",
    "DDD_2",
    "TELEFONE_2",
    "DDD_FAX",
    "FAX",
    "CORREIO_ELETRONICO",
    "SITUACAO_ESPECIAL",
    "DATA_SITUACAO_ESPECIAL",
];

/// Secondary activity codes are a comma-separated list.
pub const CNPJ_MULTI_VALUE: [&str; 1] = ["CNAE_FISCAL_SECUNDARIA"];

pub const DEFAULT_BATCH_SIZE: usize = 10_000;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FiltersConfig {
    /// Empty means the registry header.
    pub columns: Vec<ColumnConfig>,
    pub filter: FilterExpr,
    pub customs: Vec<CustomConfig>,
    pub contacts: ContactsConfig,
}

impl FiltersConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()
            .with_context(|| format!("Config: Failed to read {:?}", path))?;
        Ok(settings.try_deserialize()?)
    }

    pub fn from_yaml(source: &str) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from_str(source, ::config::FileFormat::Yaml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn column_mapping(&self) -> Result<ColumnMapping, PredicateError> {
        if self.columns.is_empty() {
            return ColumnMapping::from_names(CNPJ_COLUMNS)?.with_multi_value(CNPJ_MULTI_VALUE);
        }
        ColumnMapping::new(self.columns.iter().map(ColumnConfig::to_column).collect())
    }

    /// Resolve columns, customs and the filter, and check the filter against the columns.
    ///
    /// `filter_override` (filter text) replaces the configured filter.
    pub fn compile(&self, filter_override: Option<&str>) -> anyhow::Result<CompiledConfig> {
        let columns = self
            .column_mapping()
            .context("Config: Invalid column mapping")?;

        let mut customs = CustomRegistry::with_builtins();
        for custom in &self.customs {
            let program = compile_cel(&custom.cel)
                .with_context(|| format!("Config: Invalid CEL for custom '{}'", custom.name))?;
            tracing::debug!("Custom '{}': {}", custom.name, program.source());
            customs.register(cel_custom(&custom.name, program));
        }

        let filter = match filter_override {
            Some(text) => parse_filter_with(text, &customs).context("Config: Invalid --filter")?,
            None => self
                .filter
                .compile(&customs)
                .context("Config: Invalid filter")?,
        };

        validate(&filter, &columns).context("Config: Filter does not fit the column mapping")?;

        Ok(CompiledConfig {
            columns,
            filter,
            contacts: self.contacts.clone(),
        })
    }
}

/// Filter and column mapping ready for evaluation.
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    pub columns: ColumnMapping,
    pub filter: Predicate,
    pub contacts: ContactsConfig,
}

/// Options that come from the command line rather than the filter file.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub delimiter: u8,
    pub quote: u8,
    pub has_header: bool,
    pub batch_size: usize,
    /// Encoding label that bypasses detection.
    pub encoding: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            delimiter: b';',
            quote: b'"',
            has_header: true,
            batch_size: DEFAULT_BATCH_SIZE,
            encoding: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ColumnConfig {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        multi_value: bool,
    },
}

impl ColumnConfig {
    fn to_column(&self) -> Column {
        match self {
            ColumnConfig::Name(name) => Column::single(name.clone()),
            ColumnConfig::Detailed { name, multi_value } => Column {
                name: name.clone(),
                multi_value: *multi_value,
            },
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FilterExpr {
    All { all: Vec<FilterExpr> },
    Any { any: Vec<FilterExpr> },
    Not { not: Box<FilterExpr> },
    Condition(ConditionConfig),
    Text(String),
}

impl Default for FilterExpr {
    fn default() -> Self {
        FilterExpr::All { all: Vec::new() }
    }
}

impl FilterExpr {
    pub fn compile(&self, customs: &CustomRegistry) -> Result<Predicate, PredicateError> {
        match self {
            FilterExpr::All { all } => Ok(Predicate::And(
                all.iter()
                    .map(|e| e.compile(customs))
                    .collect::<Result<_, _>>()?,
            )),
            FilterExpr::Any { any } => Ok(Predicate::Or(
                any.iter()
                    .map(|e| e.compile(customs))
                    .collect::<Result<_, _>>()?,
            )),
            FilterExpr::Not { not } => Ok(Predicate::Not(Box::new(not.compile(customs)?))),
            FilterExpr::Condition(cond) => cond.compile(customs),
            FilterExpr::Text(text) => parse_filter_with(text, customs),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ConditionConfig {
    pub field: String,
    pub op: String,
    #[serde(default)]
    pub value: Option<ConditionValue>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ConditionConfig {
    /// Coerce the configured value to the operand kind the operator expects.
    pub fn compile(&self, customs: &CustomRegistry) -> Result<Predicate, PredicateError> {
        let op: Operator = self.op.parse()?;
        let mismatch = || PredicateError::OperandMismatch {
            field: self.field.clone(),
            op,
            expected: op.operand_kind(),
        };
        let value = self.value.as_ref().ok_or_else(mismatch)?;

        let operand = match (op.operand_kind(), value) {
            (OperandKind::Text | OperandKind::Date, ConditionValue::Text(s)) => {
                Operand::Text(s.clone())
            }
            (OperandKind::Text | OperandKind::Date, ConditionValue::Number(n)) => {
                Operand::Text(n.to_string())
            }
            (OperandKind::Text, ConditionValue::Bool(b)) => Operand::Text(b.to_string()),
            (OperandKind::Number, ConditionValue::Number(n)) if !n.is_finite() => {
                return Err(PredicateError::NonFiniteNumber {
                    field: self.field.clone(),
                    op,
                    value: *n,
                });
            }
            (OperandKind::Number, ConditionValue::Number(n)) => Operand::Number(*n),
            (OperandKind::Number, ConditionValue::Text(s)) => {
                Operand::Number(parse_number(s).ok_or_else(mismatch)?)
            }
            (OperandKind::Bool, ConditionValue::Bool(b)) => Operand::Bool(*b),
            (OperandKind::Bool, ConditionValue::Text(s)) => {
                Operand::Bool(parse_bool(s).ok_or_else(mismatch)?)
            }
            (OperandKind::Pattern, ConditionValue::Text(s)) => Operand::Pattern(Pattern::new(s)),
            (OperandKind::Custom, ConditionValue::Text(name)) => Operand::Custom(
                customs
                    .get(name)
                    .cloned()
                    .ok_or_else(|| PredicateError::UnknownCustom(name.clone()))?,
            ),
            _ => return Err(mismatch()),
        };

        Ok(condition(self.field.clone(), op, operand))
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CustomConfig {
    pub name: String,
    /// CEL expression over the string variable `value`.
    pub cel: String,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContactsConfig {
    /// `code;name` table for turning municipality codes into names.
    pub municipalities: Option<PathBuf>,
}
