use std::fmt;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::types::EntityKind;

/// A member (sócio) enrolled with an organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    pub organization: String,
    pub enrollment: String,
    pub name: Option<String>,
    pub cpf: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub active: Option<bool>,
    pub blocked: Option<bool>,
    pub credit_limit: Option<BigDecimal>,
}

/// A payroll-deducted credit sale (venda) owned by a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleRecord {
    pub organization: String,
    pub sequence: String,
    /// Enrollment of the owning member.
    pub enrollment: String,
    /// Merchant (convênio) code.
    pub merchant: Option<String>,
    pub issued_on: Option<NaiveDate>,
    pub installment_count: Option<i32>,
    pub installment_value: Option<BigDecimal>,
    pub cancelled: Option<bool>,
}

/// One scheduled payroll deduction (parcela) of a sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallmentRecord {
    pub organization: String,
    pub sale_sequence: String,
    /// 1-based position within the sale.
    pub index: i32,
    pub enrollment: String,
    pub due_on: Option<NaiveDate>,
    pub amount: Option<BigDecimal>,
    pub paid: Option<bool>,
    pub paid_on: Option<NaiveDate>,
}

/// Identity of a row in both stores, always scoped by organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NaturalKey {
    Member {
        organization: String,
        enrollment: String,
    },
    Sale {
        organization: String,
        sequence: String,
    },
    Installment {
        organization: String,
        sale_sequence: String,
        index: i32,
    },
}

impl NaturalKey {
    pub fn kind(&self) -> EntityKind {
        match self {
            NaturalKey::Member { .. } => EntityKind::Members,
            NaturalKey::Sale { .. } => EntityKind::Sales,
            NaturalKey::Installment { .. } => EntityKind::Installments,
        }
    }

    pub fn member(organization: impl Into<String>, enrollment: impl Into<String>) -> Self {
        NaturalKey::Member {
            organization: organization.into(),
            enrollment: enrollment.into(),
        }
    }

    pub fn sale(organization: impl Into<String>, sequence: impl Into<String>) -> Self {
        NaturalKey::Sale {
            organization: organization.into(),
            sequence: sequence.into(),
        }
    }

    pub fn installment(
        organization: impl Into<String>,
        sale_sequence: impl Into<String>,
        index: i32,
    ) -> Self {
        NaturalKey::Installment {
            organization: organization.into(),
            sale_sequence: sale_sequence.into(),
            index,
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NaturalKey::Member {
                organization,
                enrollment,
            } => write!(f, "member {organization}/{enrollment}"),
            NaturalKey::Sale {
                organization,
                sequence,
            } => write!(f, "sale {organization}/{sequence}"),
            NaturalKey::Installment {
                organization,
                sale_sequence,
                index,
            } => write!(f, "installment {organization}/{sale_sequence}#{index}"),
        }
    }
}

/// A typed record of any kind, as produced by the mapper and stored by destinations.
///
/// Equality covers mapped business fields only. Destination-managed ids and timestamps live
/// outside the record and never influence change detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Member(MemberRecord),
    Sale(SaleRecord),
    Installment(InstallmentRecord),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Member(_) => EntityKind::Members,
            Record::Sale(_) => EntityKind::Sales,
            Record::Installment(_) => EntityKind::Installments,
        }
    }

    pub fn natural_key(&self) -> NaturalKey {
        match self {
            Record::Member(member) => {
                NaturalKey::member(&member.organization, &member.enrollment)
            }
            Record::Sale(sale) => NaturalKey::sale(&sale.organization, &sale.sequence),
            Record::Installment(installment) => NaturalKey::installment(
                &installment.organization,
                &installment.sale_sequence,
                installment.index,
            ),
        }
    }

    /// Returns the key of the row this record references, if any.
    pub fn parent_key(&self) -> Option<NaturalKey> {
        match self {
            Record::Member(_) => None,
            Record::Sale(sale) => Some(NaturalKey::member(&sale.organization, &sale.enrollment)),
            Record::Installment(installment) => Some(NaturalKey::sale(
                &installment.organization,
                &installment.sale_sequence,
            )),
        }
    }
}

impl Record {
    /// Returns whether `parent`, the row stored under [`Record::parent_key`], is the one this
    /// record belongs to. Installments repeat their sale's member enrollment, which must agree.
    pub fn agrees_with_parent(&self, parent: &Record) -> bool {
        match (self, parent) {
            (Record::Installment(installment), Record::Sale(sale)) => {
                installment.enrollment == sale.enrollment
            }
            _ => true,
        }
    }

    /// Describes the parent row this record needs, for error details.
    pub fn parent_reference(&self) -> String {
        match (self, self.parent_key()) {
            (Record::Installment(installment), Some(parent)) => {
                format!("{parent} of enrollment {}", installment.enrollment)
            }
            (_, Some(parent)) => parent.to_string(),
            (_, None) => "no parent".to_string(),
        }
    }
}

impl From<MemberRecord> for Record {
    fn from(record: MemberRecord) -> Self {
        Record::Member(record)
    }
}

impl From<SaleRecord> for Record {
    fn from(record: SaleRecord) -> Self {
        Record::Sale(record)
    }
}

impl From<InstallmentRecord> for Record {
    fn from(record: InstallmentRecord) -> Self {
        Record::Installment(record)
    }
}
