use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::bail;
use crate::destination::{Destination, RowId, StoredRecord};
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::types::{InstallmentRecord, MemberRecord, NaturalKey, Record, SaleRecord};

const FIND_MEMBER: &str = r#"
    select id, empresa, matricula, nome, cpf, email, celular, ativo, bloqueado, limite
    from socios
    where empresa = $1 and matricula = $2
"#;

const FIND_SALE: &str = r#"
    select v.id, v.empresa, v.sequencia, s.matricula, v.convenio, v.data_emissao,
        v.qtd_parcelas, v.valor_parcela, v.cancelada
    from vendas v
    join socios s on s.id = v.socio_id
    where v.empresa = $1 and v.sequencia = $2
"#;

const FIND_INSTALLMENT: &str = r#"
    select id, empresa, sequencia, numero, matricula, vencimento, valor, paga, data_pagamento
    from parcelas
    where empresa = $1 and sequencia = $2 and numero = $3
"#;

const INSERT_MEMBER: &str = r#"
    insert into socios (empresa, matricula, nome, cpf, email, celular, ativo, bloqueado, limite)
    values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
    returning id
"#;

const INSERT_SALE: &str = r#"
    insert into vendas (socio_id, empresa, sequencia, convenio, data_emissao, qtd_parcelas,
        valor_parcela, cancelada)
    select s.id, $1, $2, $4, $5, $6, $7, $8
    from socios s
    where s.empresa = $1 and s.matricula = $3
    returning id
"#;

const INSERT_INSTALLMENT: &str = r#"
    insert into parcelas (venda_id, empresa, sequencia, numero, matricula, vencimento, valor,
        paga, data_pagamento)
    select v.id, $1, $2, $3, $4, $5, $6, $7, $8
    from vendas v
    join socios s on s.id = v.socio_id
    where v.empresa = $1 and v.sequencia = $2 and s.matricula = $4
    returning id
"#;

const UPDATE_MEMBER: &str = r#"
    update socios
    set nome = $2, cpf = $3, email = $4, celular = $5, ativo = $6, bloqueado = $7,
        limite = $8, updated_at = now()
    where id = $1
    returning id
"#;

const UPDATE_SALE: &str = r#"
    update vendas v
    set socio_id = s.id, convenio = $4, data_emissao = $5, qtd_parcelas = $6,
        valor_parcela = $7, cancelada = $8, updated_at = now()
    from socios s
    where v.id = $1 and s.empresa = $2 and s.matricula = $3
    returning v.id
"#;

const UPDATE_INSTALLMENT: &str = r#"
    update parcelas p
    set venda_id = v.id, matricula = $4, vencimento = $5, valor = $6, paga = $7,
        data_pagamento = $8, updated_at = now()
    from vendas v
    join socios s on s.id = v.socio_id
    where p.id = $1 and v.empresa = $2 and v.sequencia = $3 and s.matricula = $4
    returning p.id
"#;

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: i64,
    empresa: String,
    matricula: String,
    nome: Option<String>,
    cpf: Option<String>,
    email: Option<String>,
    celular: Option<String>,
    ativo: Option<bool>,
    bloqueado: Option<bool>,
    limite: Option<BigDecimal>,
}

impl From<MemberRow> for StoredRecord {
    fn from(row: MemberRow) -> Self {
        StoredRecord {
            id: row.id,
            record: Record::Member(MemberRecord {
                organization: row.empresa,
                enrollment: row.matricula,
                name: row.nome,
                cpf: row.cpf,
                email: row.email,
                phone: row.celular,
                active: row.ativo,
                blocked: row.bloqueado,
                credit_limit: row.limite,
            }),
        }
    }
}

#[derive(sqlx::FromRow)]
struct SaleRow {
    id: i64,
    empresa: String,
    sequencia: String,
    matricula: String,
    convenio: Option<String>,
    data_emissao: Option<NaiveDate>,
    qtd_parcelas: Option<i32>,
    valor_parcela: Option<BigDecimal>,
    cancelada: Option<bool>,
}

impl From<SaleRow> for StoredRecord {
    fn from(row: SaleRow) -> Self {
        StoredRecord {
            id: row.id,
            record: Record::Sale(SaleRecord {
                organization: row.empresa,
                sequence: row.sequencia,
                enrollment: row.matricula,
                merchant: row.convenio,
                issued_on: row.data_emissao,
                installment_count: row.qtd_parcelas,
                installment_value: row.valor_parcela,
                cancelled: row.cancelada,
            }),
        }
    }
}

#[derive(sqlx::FromRow)]
struct InstallmentRow {
    id: i64,
    empresa: String,
    sequencia: String,
    numero: i32,
    matricula: String,
    vencimento: Option<NaiveDate>,
    valor: Option<BigDecimal>,
    paga: Option<bool>,
    data_pagamento: Option<NaiveDate>,
}

impl From<InstallmentRow> for StoredRecord {
    fn from(row: InstallmentRow) -> Self {
        StoredRecord {
            id: row.id,
            record: Record::Installment(InstallmentRecord {
                organization: row.empresa,
                sale_sequence: row.sequencia,
                index: row.numero,
                enrollment: row.matricula,
                due_on: row.vencimento,
                amount: row.valor,
                paid: row.paga,
                paid_on: row.data_pagamento,
            }),
        }
    }
}

/// Writes records into the `socios`, `vendas` and `parcelas` tables.
///
/// Every operation is a single statement on a pooled connection. Foreign keys are resolved
/// inside the statement from the parent's natural key, so a missing parent shows up as zero
/// affected rows. An installment only resolves a sale of the same member enrollment.
#[derive(Debug, Clone)]
pub struct PostgresDestination {
    pool: PgPool,
}

impl PostgresDestination {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_member(
        &self,
        organization: &str,
        enrollment: &str,
    ) -> SyncResult<Option<StoredRecord>> {
        let row = sqlx::query_as::<_, MemberRow>(FIND_MEMBER)
            .bind(organization)
            .bind(enrollment)
            .fetch_optional(&self.pool)
            .await
            .map_err(SyncError::from_destination)?;

        Ok(row.map(Into::into))
    }

    async fn find_sale(
        &self,
        organization: &str,
        sequence: &str,
    ) -> SyncResult<Option<StoredRecord>> {
        let row = sqlx::query_as::<_, SaleRow>(FIND_SALE)
            .bind(organization)
            .bind(sequence)
            .fetch_optional(&self.pool)
            .await
            .map_err(SyncError::from_destination)?;

        Ok(row.map(Into::into))
    }

    async fn find_installment(
        &self,
        organization: &str,
        sale_sequence: &str,
        index: i32,
    ) -> SyncResult<Option<StoredRecord>> {
        let row = sqlx::query_as::<_, InstallmentRow>(FIND_INSTALLMENT)
            .bind(organization)
            .bind(sale_sequence)
            .bind(index)
            .fetch_optional(&self.pool)
            .await
            .map_err(SyncError::from_destination)?;

        Ok(row.map(Into::into))
    }
}

impl Destination for PostgresDestination {
    fn name() -> &'static str {
        "postgres"
    }

    async fn find(&self, key: &NaturalKey) -> SyncResult<Option<StoredRecord>> {
        match key {
            NaturalKey::Member {
                organization,
                enrollment,
            } => self.find_member(organization, enrollment).await,
            NaturalKey::Sale {
                organization,
                sequence,
            } => self.find_sale(organization, sequence).await,
            NaturalKey::Installment {
                organization,
                sale_sequence,
                index,
            } => {
                self.find_installment(organization, sale_sequence, *index)
                    .await
            }
        }
    }

    async fn insert(&self, record: &Record) -> SyncResult<RowId> {
        let id = match record {
            Record::Member(member) => sqlx::query_scalar::<_, i64>(INSERT_MEMBER)
                .bind(&member.organization)
                .bind(&member.enrollment)
                .bind(&member.name)
                .bind(&member.cpf)
                .bind(&member.email)
                .bind(&member.phone)
                .bind(member.active)
                .bind(member.blocked)
                .bind(&member.credit_limit)
                .fetch_optional(&self.pool)
                .await,
            Record::Sale(sale) => sqlx::query_scalar::<_, i64>(INSERT_SALE)
                .bind(&sale.organization)
                .bind(&sale.sequence)
                .bind(&sale.enrollment)
                .bind(&sale.merchant)
                .bind(sale.issued_on)
                .bind(sale.installment_count)
                .bind(&sale.installment_value)
                .bind(sale.cancelled)
                .fetch_optional(&self.pool)
                .await,
            Record::Installment(installment) => sqlx::query_scalar::<_, i64>(INSERT_INSTALLMENT)
                .bind(&installment.organization)
                .bind(&installment.sale_sequence)
                .bind(installment.index)
                .bind(&installment.enrollment)
                .bind(installment.due_on)
                .bind(&installment.amount)
                .bind(installment.paid)
                .bind(installment.paid_on)
                .fetch_optional(&self.pool)
                .await,
        }
        .map_err(SyncError::from_destination)?;

        match id {
            Some(id) => Ok(id),
            None => missing_parent(record),
        }
    }

    async fn update(&self, id: RowId, record: &Record) -> SyncResult<()> {
        let updated = match record {
            Record::Member(member) => sqlx::query_scalar::<_, i64>(UPDATE_MEMBER)
                .bind(id)
                .bind(&member.name)
                .bind(&member.cpf)
                .bind(&member.email)
                .bind(&member.phone)
                .bind(member.active)
                .bind(member.blocked)
                .bind(&member.credit_limit)
                .fetch_optional(&self.pool)
                .await,
            Record::Sale(sale) => sqlx::query_scalar::<_, i64>(UPDATE_SALE)
                .bind(id)
                .bind(&sale.organization)
                .bind(&sale.enrollment)
                .bind(&sale.merchant)
                .bind(sale.issued_on)
                .bind(sale.installment_count)
                .bind(&sale.installment_value)
                .bind(sale.cancelled)
                .fetch_optional(&self.pool)
                .await,
            Record::Installment(installment) => sqlx::query_scalar::<_, i64>(UPDATE_INSTALLMENT)
                .bind(id)
                .bind(&installment.organization)
                .bind(&installment.sale_sequence)
                .bind(&installment.enrollment)
                .bind(installment.due_on)
                .bind(&installment.amount)
                .bind(installment.paid)
                .bind(installment.paid_on)
                .fetch_optional(&self.pool)
                .await,
        }
        .map_err(SyncError::from_destination)?;

        match (updated, record) {
            (Some(_), _) => Ok(()),
            (None, Record::Member(_)) => bail!(
                ErrorKind::DestinationQueryFailed,
                "No row with the given id",
                format!("{} (id {id})", record.natural_key())
            ),
            (None, _) => missing_parent(record),
        }
    }
}

fn missing_parent<T>(record: &Record) -> SyncResult<T> {
    bail!(
        ErrorKind::MissingParent,
        "Parent row does not exist",
        format!(
            "{} references {}",
            record.natural_key(),
            record.parent_reference()
        )
    )
}
