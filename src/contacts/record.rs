use anyhow::{Result, bail};

use super::Municipalities;
use crate::dsl::ColumnMapping;

pub const CONTACT_HEADER: [&str; 14] = [
    "name",
    "cnpj",
    "website",
    "address",
    "address2",
    "numero",
    "bairro",
    "city",
    "state",
    "zip",
    "phone",
    "telefones_principais",
    "todos_os_telefones",
    "todos_os_e_mails",
];

pub const REQUIRED_COLUMNS: [&str; 9] = [
    "NOME_FANTASIA",
    "CNPJ_BASICO",
    "CNPJ_ORDEM",
    "CNPJ_DV",
    "LOGRADOURO",
    "MUNICIPIO",
    "UF",
    "PAIS",
    "CEP",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactRecord {
    pub name: String,
    pub cnpj: String,
    pub website: String,
    pub address: String,
    pub address2: String,
    pub numero: String,
    pub bairro: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub phone: String,
    pub telefones_principais: String,
    pub todos_os_telefones: String,
    pub todos_os_e_mails: String,
}

impl ContactRecord {
    /// Fields in [`CONTACT_HEADER`] order.
    pub fn into_fields(self) -> Vec<String> {
        vec![
            self.name,
            self.cnpj,
            self.website,
            self.address,
            self.address2,
            self.numero,
            self.bairro,
            self.city,
            self.state,
            self.zip,
            self.phone,
            self.telefones_principais,
            self.todos_os_telefones,
            self.todos_os_e_mails,
        ]
    }
}

/// Source column positions, resolved once per column mapping.
#[derive(Debug, Clone)]
struct SourceColumns {
    nome_fantasia: usize,
    cnpj_basico: usize,
    cnpj_ordem: usize,
    cnpj_dv: usize,
    logradouro: usize,
    municipio: usize,
    uf: usize,
    cep: usize,
    tipo_logradouro: Option<usize>,
    numero: Option<usize>,
    complemento: Option<usize>,
    bairro: Option<usize>,
    email: Option<usize>,
    phones: [(Option<usize>, Option<usize>); 3],
}

#[derive(Debug, Clone)]
pub struct ContactTransformer {
    source: SourceColumns,
    municipalities: Municipalities,
}

impl ContactTransformer {
    pub fn new(columns: &ColumnMapping, municipalities: Municipalities) -> Result<Self> {
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|name| columns.index_of(name).is_none())
            .collect();
        if !missing.is_empty() {
            bail!(
                "Config: Contacts output is missing required columns: {}",
                missing.join(", ")
            );
        }

        let required = |name: &str| columns.index_of(name).unwrap_or_default();
        let optional = |name: &str| columns.index_of(name);

        let source = SourceColumns {
            nome_fantasia: required("NOME_FANTASIA"),
            cnpj_basico: required("CNPJ_BASICO"),
            cnpj_ordem: required("CNPJ_ORDEM"),
            cnpj_dv: required("CNPJ_DV"),
            logradouro: required("LOGRADOURO"),
            municipio: required("MUNICIPIO"),
            uf: required("UF"),
            cep: required("CEP"),
            tipo_logradouro: optional("TIPO_LOGRADOURO"),
            numero: optional("NUMERO"),
            complemento: optional("COMPLEMENTO"),
            bairro: optional("BAIRRO"),
            email: optional("CORREIO_ELETRONICO"),
            phones: [
                (optional("DDD_1"), optional("TELEFONE_1")),
                (optional("DDD_2"), optional("TELEFONE_2")),
                (optional("DDD_FAX"), optional("FAX")),
            ],
        };

        Ok(Self {
            source,
            municipalities,
        })
    }

    pub fn transform<S: AsRef<str>>(&self, row: &[S]) -> ContactRecord {
        let cell = |idx: usize| row.get(idx).map(|v| v.as_ref().trim()).unwrap_or("");
        let optional = |idx: Option<usize>| idx.map(cell).unwrap_or("");
        let src = &self.source;

        let email = optional(src.email);
        let phones: Vec<String> = src
            .phones
            .iter()
            .filter_map(|&(ddd, number)| format_phone(optional(ddd), optional(number)))
            .collect();
        let phone = format_phone(optional(src.phones[0].0), optional(src.phones[0].1));
        let all_phones = phones.join(";");

        let municipio = cell(src.municipio);
        let city = self
            .municipalities
            .name_for(municipio)
            .unwrap_or(municipio)
            .to_string();

        ContactRecord {
            name: cell(src.nome_fantasia).to_string(),
            cnpj: format!(
                "{:0>8}{:0>4}{:0>2}",
                cell(src.cnpj_basico),
                cell(src.cnpj_ordem),
                cell(src.cnpj_dv)
            ),
            website: email_domain(email).unwrap_or_default().to_string(),
            address: format!("{} {}", optional(src.tipo_logradouro), cell(src.logradouro))
                .trim()
                .to_string(),
            address2: optional(src.complemento).to_string(),
            numero: optional(src.numero).to_string(),
            bairro: optional(src.bairro).to_string(),
            city,
            state: cell(src.uf).to_string(),
            zip: cell(src.cep).to_string(),
            phone: phone.unwrap_or_default(),
            telefones_principais: all_phones.clone(),
            todos_os_telefones: all_phones,
            todos_os_e_mails: email.to_string(),
        }
    }
}

/// Area code and number as integers, concatenated; `None` if either part is blank or not numeric.
fn format_phone(ddd: &str, number: &str) -> Option<String> {
    let ddd: u64 = ddd.trim().parse().ok()?;
    let number: u64 = number.trim().parse().ok()?;
    Some(format!("{}{}", ddd, number))
}

fn email_domain(email: &str) -> Option<&str> {
    email
        .split_once('@')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
}
