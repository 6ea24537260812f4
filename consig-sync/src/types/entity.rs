use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::types::{SourceRow, SourceValue};

/// The three kinds of rows copied by a sync run.
///
/// The declaration order is the foreign-key order and therefore the processing order: sales
/// reference members and installments reference sales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Members,
    Sales,
    Installments,
}

impl EntityKind {
    /// Every kind in processing order.
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Members,
        EntityKind::Sales,
        EntityKind::Installments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Members => "members",
            EntityKind::Sales => "sales",
            EntityKind::Installments => "installments",
        }
    }

    /// Singular noun used when naming a single row.
    pub fn row_noun(&self) -> &'static str {
        match self {
            EntityKind::Members => "member",
            EntityKind::Sales => "sale",
            EntityKind::Installments => "installment",
        }
    }

    /// Names a legacy row by its raw key columns, as in `member 1/2221`.
    ///
    /// Works on rows that failed mapping: null or blank key columns render as `?`.
    pub fn describe_row(&self, row: &SourceRow) -> String {
        let key = self
            .spec()
            .key_columns
            .iter()
            .map(|column| match row.get(column) {
                SourceValue::Null => "?".to_string(),
                SourceValue::Text(value) if value.trim().is_empty() => "?".to_string(),
                SourceValue::Text(value) => value.trim().to_string(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("/");

        format!("{} {key}", self.row_noun())
    }

    /// Returns the static description of where rows of this kind live.
    pub fn spec(&self) -> &'static EntitySpec {
        match self {
            EntityKind::Members => &ENTITY_SPECS[0],
            EntityKind::Sales => &ENTITY_SPECS[1],
            EntityKind::Installments => &ENTITY_SPECS[2],
        }
    }

    /// Returns the kind whose rows must exist before rows of this kind can be written.
    pub fn parent(&self) -> Option<EntityKind> {
        match self {
            EntityKind::Members => None,
            EntityKind::Sales => Some(EntityKind::Members),
            EntityKind::Installments => Some(EntityKind::Sales),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("`{0}` is not an entity kind, expected one of: members, sales, installments")]
pub struct ParseEntityKindError(String);

impl FromStr for EntityKind {
    type Err = ParseEntityKindError;

    /// Accepts the English names and the legacy table names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "members" | "member" | "socios" => Ok(EntityKind::Members),
            "sales" | "sale" | "vendas" => Ok(EntityKind::Sales),
            "installments" | "installment" | "parcelas" => Ok(EntityKind::Installments),
            _ => Err(ParseEntityKindError(s.to_string())),
        }
    }
}

/// Static description of the legacy table backing an [`EntityKind`].
#[derive(Debug)]
pub struct EntitySpec {
    pub kind: EntityKind,
    /// Table in the legacy store.
    pub source_table: &'static str,
    /// Columns forming the natural key, organization code first.
    pub key_columns: &'static [&'static str],
    /// Column holding the last modification time, used for incremental runs.
    pub changed_at_column: &'static str,
    /// Columns read by the extractor. Anything else in the table is ignored.
    pub columns: &'static [&'static str],
}

pub static ENTITY_SPECS: [EntitySpec; 3] = [
    EntitySpec {
        kind: EntityKind::Members,
        source_table: "socios",
        key_columns: &["empresa", "matricula"],
        changed_at_column: "data_alteracao",
        columns: &[
            "empresa",
            "matricula",
            "nome",
            "cpf",
            "email",
            "celular",
            "ativo",
            "bloqueado",
            "limite",
            "data_alteracao",
        ],
    },
    EntitySpec {
        kind: EntityKind::Sales,
        source_table: "vendas",
        key_columns: &["empresa", "sequencia"],
        changed_at_column: "data_alteracao",
        columns: &[
            "empresa",
            "sequencia",
            "matricula",
            "convenio",
            "data_emissao",
            "qtd_parcelas",
            "valor_parcela",
            "cancelada",
            "data_alteracao",
        ],
    },
    EntitySpec {
        kind: EntityKind::Installments,
        source_table: "parcelas",
        key_columns: &["empresa", "sequencia", "parcela"],
        changed_at_column: "data_alteracao",
        columns: &[
            "empresa",
            "sequencia",
            "parcela",
            "matricula",
            "vencimento",
            "valor",
            "baixa",
            "data_baixa",
            "data_alteracao",
        ],
    },
];
