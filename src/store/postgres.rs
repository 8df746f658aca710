//! PostgreSQL card table via sqlx
//!
//! Schema (created if missing):
//! `card_id TEXT PRIMARY KEY, person_id TEXT NOT NULL,
//!  last_check_in TIMESTAMP NULL, visits INTEGER NOT NULL DEFAULT 0`
//!
//! Every value goes through a bind parameter. The table name cannot be bound,
//! so it is validated as a plain identifier and quoted once at connect time.

use super::{CheckInTransaction, StoreError, StoreGateway};
use crate::domain::{CardId, CardRecord, PersonId, VisitTotal};
use crate::infra::config::Config;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

type RecordRow = (String, String, Option<NaiveDateTime>, i32);
type VisitRow = (String, i32);

/// Statement text for one validated table
#[derive(Debug)]
struct Statements {
    create: String,
    select: String,
    select_for_update: String,
    insert: String,
    update: String,
    visits_all: String,
    visits_one: String,
}

impl Statements {
    fn for_table(table: &str) -> Result<Self, StoreError> {
        let t = quote_table(table)?;
        Ok(Self {
            create: format!(
                "CREATE TABLE IF NOT EXISTS {t} (\
                 card_id TEXT PRIMARY KEY, \
                 person_id TEXT NOT NULL, \
                 last_check_in TIMESTAMP NULL, \
                 visits INTEGER NOT NULL DEFAULT 0)"
            ),
            select: format!(
                "SELECT card_id, person_id, last_check_in, visits FROM {t} WHERE card_id = $1"
            ),
            select_for_update: format!(
                "SELECT card_id, person_id, last_check_in, visits FROM {t} \
                 WHERE card_id = $1 FOR UPDATE"
            ),
            insert: format!("INSERT INTO {t} (card_id, person_id, visits) VALUES ($1, $2, $3)"),
            update: format!(
                "UPDATE {t} SET last_check_in = $1, visits = $2 WHERE card_id = $3"
            ),
            visits_all: format!("SELECT person_id, visits FROM {t} ORDER BY visits DESC"),
            visits_one: format!(
                "SELECT person_id, visits FROM {t} WHERE person_id = $1 ORDER BY visits DESC"
            ),
        })
    }
}

/// Validate a table name and return it double-quoted
pub fn quote_table(table: &str) -> Result<String, StoreError> {
    let mut chars = table.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    // Postgres truncates identifiers longer than 63 bytes
    if !valid_start || !valid_rest || table.len() > 63 {
        return Err(StoreError::InvalidTable(table.to_string()));
    }
    Ok(format!("\"{}\"", table))
}

fn to_record(row: RecordRow) -> Result<CardRecord, StoreError> {
    let (card_id, person_id, last_check_in, visits) = row;
    let visit_count = from_db_count(&card_id, visits)?;
    Ok(CardRecord {
        card_id: CardId(card_id),
        person_id: PersonId(person_id),
        last_check_in,
        visit_count,
    })
}

/// Reject stored counts that do not fit; rewriting them would lose the total
fn from_db_count(key: &str, count: i32) -> Result<u32, StoreError> {
    u32::try_from(count).map_err(|_| {
        StoreError::Database(format!("stored visit count {} for {} is invalid", count, key))
    })
}

fn to_db_count(count: u32) -> Result<i32, StoreError> {
    i32::try_from(count)
        .map_err(|_| StoreError::Database(format!("visit count {} out of range", count)))
}

#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
    statements: Arc<Statements>,
}

impl PostgresStore {
    /// Connect with the session's credentials and ensure the table exists
    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        let statements = Arc::new(Statements::for_table(config.store_table())?);

        let mut options = PgConnectOptions::new()
            .host(config.store_host())
            .port(config.store_port())
            .database(config.store_database())
            .username(config.store_user());
        if let Some(password) = config.resolved_store_password() {
            options = options.password(&password);
        }

        // One connection per session; the coordinator serializes access
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_millis(config.store_timeout_ms()))
            .connect_with(options)
            .await?;

        sqlx::query(&statements.create).execute(&pool).await?;

        info!(
            host = %config.store_host(),
            database = %config.store_database(),
            table = %config.store_table(),
            "postgres_store_connected"
        );

        Ok(Self { pool, statements })
    }
}

#[async_trait]
impl StoreGateway for PostgresStore {
    async fn find_by_card_id(&self, card_id: &CardId) -> Result<Option<CardRecord>, StoreError> {
        let row: Option<RecordRow> = sqlx::query_as(&self.statements.select)
            .bind(card_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(to_record).transpose()
    }

    async fn insert(
        &self,
        card_id: &CardId,
        person_id: &PersonId,
        initial_visits: u32,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(&self.statements.insert)
            .bind(card_id.as_str())
            .bind(person_id.as_str())
            .bind(to_db_count(initial_visits)?)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Duplicate(card_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn begin_check_in(
        &self,
        card_id: &CardId,
    ) -> Result<Box<dyn CheckInTransaction>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row: Option<RecordRow> = sqlx::query_as(&self.statements.select_for_update)
            .bind(card_id.as_str())
            .fetch_optional(&mut *tx)
            .await?;

        Ok(Box::new(PgCheckIn {
            tx,
            statements: self.statements.clone(),
            record: row.map(to_record).transpose()?,
        }))
    }

    async fn list_visits(
        &self,
        person_id: Option<&PersonId>,
    ) -> Result<Vec<VisitTotal>, StoreError> {
        let rows: Vec<VisitRow> = match person_id {
            Some(person) => {
                sqlx::query_as(&self.statements.visits_one)
                    .bind(person.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => sqlx::query_as(&self.statements.visits_all).fetch_all(&self.pool).await?,
        };

        rows.into_iter()
            .map(|(person, visits)| {
                let visits = from_db_count(&person, visits)?;
                Ok(VisitTotal { person_id: PersonId(person), visits })
            })
            .collect()
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("postgres_store_closed");
    }
}

/// Row-locked check-in; rolls back on drop unless committed
struct PgCheckIn {
    tx: Transaction<'static, Postgres>,
    statements: Arc<Statements>,
    record: Option<CardRecord>,
}

#[async_trait]
impl CheckInTransaction for PgCheckIn {
    fn record(&self) -> Option<&CardRecord> {
        self.record.as_ref()
    }

    async fn update_check_in(
        &mut self,
        at: NaiveDateTime,
        visit_count: u32,
    ) -> Result<(), StoreError> {
        let Some(record) = self.record.as_ref() else {
            return Err(StoreError::Database("no record to update".to_string()));
        };

        sqlx::query(&self.statements.update)
            .bind(at)
            .bind(to_db_count(visit_count)?)
            .bind(record.card_id.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
