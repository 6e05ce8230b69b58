//! Durable donation store repository.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::{debug, warn};

use super::model::{
    DonationIntent, DonationStatus, NewDonationIntent, NewOfflineDonation, OfflineDonationRecord,
    StatusCounts,
};
use super::schema;
use crate::id::generate_id;
use crate::{Error, Result};

const OFFLINE_COLUMNS: &str = "id, client_id, amount, donation_type, donor_email, payload, \
                               status, attempts, last_error, created_at, updated_at";

/// Repository for donation intents and offline donation records.
///
/// Every write is one transaction; partial writes are never observable.
#[derive(Debug, Clone)]
pub struct DonationStore {
    pool: SqlitePool,
}

impl DonationStore {
    /// Open (or create) the store at the given database path.
    ///
    /// Creates the database and migrates the schema to the current version.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or migration fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        Self::from_pool(pool).await
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or migration fails.
    pub async fn in_memory() -> Result<Self> {
        // A single connection that never expires; the database lives in it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, migrating its schema first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Migration`] if the schema cannot be brought up to date.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let version = schema::migrate(&pool).await?;
        debug!(version, "Donation store ready");
        Ok(Self { pool })
    }

    /// Schema version of the open database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn schema_version(&self) -> Result<i64> {
        schema::current_version(&self.pool).await
    }

    // ---- Donation intents ----

    /// Record a donation intent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub async fn record_intent(&self, intent: &NewDonationIntent) -> Result<DonationIntent> {
        let record = DonationIntent {
            id: generate_id("intent"),
            source_url: intent.source_url.clone(),
            amount: intent.amount,
            recurring: intent.recurring,
            created_at: Utc::now(),
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r"
            INSERT INTO donation_intents (id, source_url, amount, recurring, created_at)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(&record.id)
        .bind(&record.source_url)
        .bind(record.amount)
        .bind(record.recurring)
        .bind(timestamp(record.created_at))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(id = %record.id, amount = ?record.amount, "Recorded donation intent");
        Ok(record)
    }

    /// List all intents, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_intents(&self) -> Result<Vec<DonationIntent>> {
        let rows = sqlx::query(
            r"
            SELECT id, source_url, amount, recurring, created_at
            FROM donation_intents
            ORDER BY created_at ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(row_to_intent).collect())
    }

    /// Get an intent by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_intent(&self, id: &str) -> Result<Option<DonationIntent>> {
        let row = sqlx::query(
            r"
            SELECT id, source_url, amount, recurring, created_at
            FROM donation_intents
            WHERE id = ?
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().and_then(row_to_intent))
    }

    /// Delete an intent the user dismissed. Returns false if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub async fn dismiss_intent(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(r"DELETE FROM donation_intents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    // ---- Offline donations ----

    /// Capture an offline donation as `pending_online`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails. Callers must not
    /// acknowledge the submission in that case.
    pub async fn enqueue_offline(
        &self,
        donation: &NewOfflineDonation,
    ) -> Result<OfflineDonationRecord> {
        let client_id = generate_id("offline");
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r"
            INSERT INTO offline_donations
                (client_id, amount, donation_type, donor_email, payload, status,
                 attempts, last_error, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 0, NULL, ?, ?)
            ",
        )
        .bind(&client_id)
        .bind(donation.amount)
        .bind(&donation.donation_type)
        .bind(&donation.donor_email)
        .bind(&donation.payload)
        .bind(DonationStatus::PendingOnline.as_str())
        .bind(timestamp(now))
        .bind(timestamp(now))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let record = OfflineDonationRecord {
            id: result.last_insert_rowid(),
            client_id,
            amount: donation.amount,
            donation_type: donation.donation_type.clone(),
            donor_email: donation.donor_email.clone(),
            payload: donation.payload.clone(),
            status: DonationStatus::PendingOnline,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        };

        debug!(id = record.id, client_id = %record.client_id, "Captured offline donation");
        Ok(record)
    }

    /// Get an offline donation by store id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_offline(&self, id: i64) -> Result<Option<OfflineDonationRecord>> {
        let sql = format!("SELECT {OFFLINE_COLUMNS} FROM offline_donations WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().and_then(row_to_offline))
    }

    /// Get an offline donation by its client-generated id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_offline_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<OfflineDonationRecord>> {
        let sql = format!("SELECT {OFFLINE_COLUMNS} FROM offline_donations WHERE client_id = ?");
        let row = sqlx::query(&sql)
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().and_then(row_to_offline))
    }

    /// List every offline donation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_offline(&self) -> Result<Vec<OfflineDonationRecord>> {
        let sql = format!(
            "SELECT {OFFLINE_COLUMNS} FROM offline_donations ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        Ok(rows.iter().filter_map(row_to_offline).collect())
    }

    /// List offline donations with the given status, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_status(&self, status: DonationStatus) -> Result<Vec<OfflineDonationRecord>> {
        let sql = format!(
            "SELECT {OFFLINE_COLUMNS} FROM offline_donations \
             WHERE status = ? ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().filter_map(row_to_offline).collect())
    }

    /// Records waiting for replay, in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn pending_online(&self) -> Result<Vec<OfflineDonationRecord>> {
        self.list_by_status(DonationStatus::PendingOnline).await
    }

    /// Mark a replayed record as accepted by the server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless the record is `pending_online`.
    pub async fn mark_processed(&self, id: i64) -> Result<()> {
        self.transition(id, DonationStatus::Processed, None, true)
            .await
    }

    /// Mark a replayed record as rejected by the server. Terminal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless the record is `pending_online`.
    pub async fn mark_failed(&self, id: i64, reason: &str) -> Result<()> {
        self.transition(id, DonationStatus::Failed, Some(reason), true)
            .await
    }

    /// Move a `failed` record back to `pending_online`.
    ///
    /// Only ever called on explicit user or operator request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless the record is `failed`.
    pub async fn resubmit_failed(&self, id: i64) -> Result<()> {
        self.transition(id, DonationStatus::PendingOnline, None, false)
            .await
    }

    /// Count a transient replay failure; the record stays `pending_online`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub async fn record_attempt(&self, id: i64, error: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r"
            UPDATE offline_donations
            SET attempts = attempts + 1, last_error = ?, updated_at = ?
            WHERE id = ? AND status = ?
            ",
        )
        .bind(error)
        .bind(timestamp(Utc::now()))
        .bind(id)
        .bind(DonationStatus::PendingOnline.as_str())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            warn!(id, "Replay attempt recorded for a record that is no longer pending");
        }
        Ok(())
    }

    /// Count offline donations per status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count_by_status(&self) -> Result<StatusCounts> {
        let rows = sqlx::query(
            r"
            SELECT status, COUNT(*) as count
            FROM offline_donations
            GROUP BY status
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = StatusCounts::default();
        for row in &rows {
            let status: String = row.get("status");
            let count = u64::try_from(row.get::<i64, _>("count")).unwrap_or_default();
            match status.parse::<DonationStatus>() {
                Ok(DonationStatus::PendingOnline) => counts.pending_online = count,
                Ok(DonationStatus::Processed) => counts.processed = count,
                Ok(DonationStatus::Failed) => counts.failed = count,
                Err(_) => warn!(%status, "Ignoring unknown donation status"),
            }
        }
        Ok(counts)
    }

    /// Apply a status change inside one transaction, enforcing forward-only moves.
    async fn transition(
        &self,
        id: i64,
        to: DonationStatus,
        error: Option<&str>,
        count_attempt: bool,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> =
            sqlx::query_scalar(r"SELECT status FROM offline_donations WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let from = current
            .ok_or_else(|| Error::RecordNotFound(format!("offline donation {id}")))?
            .parse::<DonationStatus>()?;

        if !from.can_transition_to(to) {
            return Err(Error::InvalidTransition { id, from, to });
        }

        sqlx::query(
            r"
            UPDATE offline_donations
            SET status = ?, last_error = ?, updated_at = ?, attempts = attempts + ?
            WHERE id = ? AND status = ?
            ",
        )
        .bind(to.as_str())
        .bind(error)
        .bind(timestamp(Utc::now()))
        .bind(i64::from(count_attempt))
        .bind(id)
        .bind(from.as_str())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(id, %from, %to, "Offline donation status changed");
        Ok(())
    }
}

/// Fixed-width UTC timestamp; sorts lexically in time order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn row_to_intent(row: &SqliteRow) -> Option<DonationIntent> {
    let created_at_str: String = row.get("created_at");

    Some(DonationIntent {
        id: row.get("id"),
        source_url: row.get("source_url"),
        amount: row.get("amount"),
        recurring: row.get::<bool, _>("recurring"),
        created_at: parse_timestamp(&created_at_str)?,
    })
}

fn row_to_offline(row: &SqliteRow) -> Option<OfflineDonationRecord> {
    let created_at_str: String = row.get("created_at");
    let updated_at_str: Option<String> = row.get("updated_at");
    let status_str: String = row.get("status");

    let created_at = parse_timestamp(&created_at_str)?;
    let updated_at = updated_at_str
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(created_at);

    Some(OfflineDonationRecord {
        id: row.get("id"),
        client_id: row.get("client_id"),
        amount: row.get("amount"),
        donation_type: row.get("donation_type"),
        donor_email: row.get("donor_email"),
        payload: row.get("payload"),
        status: status_str.parse().ok()?,
        attempts: u32::try_from(row.get::<i64, _>("attempts")).unwrap_or_default(),
        last_error: row.get("last_error"),
        created_at,
        updated_at,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn donation(amount: f64) -> NewOfflineDonation {
        NewOfflineDonation {
            amount: Some(amount),
            donation_type: "one_time".to_string(),
            donor_email: Some("a@b.com".to_string()),
            payload: format!(r#"{{"amount":{amount}}}"#),
        }
    }

    #[tokio::test]
    async fn test_schema_is_current() {
        let store = DonationStore::in_memory().await.unwrap();
        assert_eq!(store.schema_version().await.unwrap(), schema::SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_record_and_dismiss_intent() {
        let store = DonationStore::in_memory().await.unwrap();

        let intent = store
            .record_intent(&NewDonationIntent {
                source_url: "https://give.example.org/donate?amount=25".to_string(),
                amount: Some(25.0),
                recurring: true,
            })
            .await
            .unwrap();

        let fetched = store.get_intent(&intent.id).await.unwrap().unwrap();
        assert_eq!(fetched.amount, Some(25.0));
        assert!(fetched.recurring);
        assert_eq!(store.list_intents().await.unwrap().len(), 1);

        assert!(store.dismiss_intent(&intent.id).await.unwrap());
        assert!(!store.dismiss_intent(&intent.id).await.unwrap());
        assert!(store.list_intents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_is_pending_online() {
        let store = DonationStore::in_memory().await.unwrap();

        let record = store.enqueue_offline(&donation(25.0)).await.unwrap();
        assert_eq!(record.status, DonationStatus::PendingOnline);

        let fetched = store.get_offline(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.client_id, record.client_id);
        assert_eq!(fetched.amount, Some(25.0));
        assert_eq!(fetched.donor_email.as_deref(), Some("a@b.com"));

        let by_client = store
            .get_offline_by_client_id(&record.client_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_client.id, record.id);
    }

    #[tokio::test]
    async fn test_pending_online_in_creation_order() {
        let store = DonationStore::in_memory().await.unwrap();

        let first = store.enqueue_offline(&donation(5.0)).await.unwrap();
        let second = store.enqueue_offline(&donation(10.0)).await.unwrap();
        let third = store.enqueue_offline(&donation(15.0)).await.unwrap();
        store.mark_processed(second.id).await.unwrap();

        let pending: Vec<i64> = store
            .pending_online()
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(pending, vec![first.id, third.id]);
    }

    #[tokio::test]
    async fn test_forward_only_transitions() {
        let store = DonationStore::in_memory().await.unwrap();
        let record = store.enqueue_offline(&donation(25.0)).await.unwrap();

        store.mark_processed(record.id).await.unwrap();
        let err = store.mark_failed(record.id, "late rejection").await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: DonationStatus::Processed,
                to: DonationStatus::Failed,
                ..
            }
        ));
        assert!(store.resubmit_failed(record.id).await.is_err());

        let fetched = store.get_offline(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, DonationStatus::Processed);
        assert_eq!(fetched.attempts, 1);
    }

    #[tokio::test]
    async fn test_failed_can_be_resubmitted() {
        let store = DonationStore::in_memory().await.unwrap();
        let record = store.enqueue_offline(&donation(25.0)).await.unwrap();

        store.mark_failed(record.id, "invalid email").await.unwrap();
        let failed = store.get_offline(record.id).await.unwrap().unwrap();
        assert_eq!(failed.status, DonationStatus::Failed);
        assert_eq!(failed.last_error.as_deref(), Some("invalid email"));

        store.resubmit_failed(record.id).await.unwrap();
        let pending = store.get_offline(record.id).await.unwrap().unwrap();
        assert_eq!(pending.status, DonationStatus::PendingOnline);
        assert_eq!(pending.last_error, None);
    }

    #[tokio::test]
    async fn test_missing_record() {
        let store = DonationStore::in_memory().await.unwrap();
        assert!(matches!(
            store.mark_processed(42).await,
            Err(Error::RecordNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_record_attempt_keeps_pending() {
        let store = DonationStore::in_memory().await.unwrap();
        let record = store.enqueue_offline(&donation(25.0)).await.unwrap();

        store.record_attempt(record.id, "connection refused").await.unwrap();
        store.record_attempt(record.id, "timeout").await.unwrap();

        let fetched = store.get_offline(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, DonationStatus::PendingOnline);
        assert_eq!(fetched.attempts, 2);
        assert_eq!(fetched.last_error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_count_by_status() {
        let store = DonationStore::in_memory().await.unwrap();
        let a = store.enqueue_offline(&donation(1.0)).await.unwrap();
        let b = store.enqueue_offline(&donation(2.0)).await.unwrap();
        store.enqueue_offline(&donation(3.0)).await.unwrap();
        store.mark_processed(a.id).await.unwrap();
        store.mark_failed(b.id, "rejected").await.unwrap();

        let counts = store.count_by_status().await.unwrap();
        assert_eq!(counts.pending_online, 1);
        assert_eq!(counts.processed, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.total(), 3);
    }

    #[tokio::test]
    async fn test_upgrade_keeps_existing_intents() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        assert_eq!(schema::migrate_to(&pool, 1).await.unwrap(), 1);
        sqlx::query(
            r"
            INSERT INTO donation_intents (id, source_url, amount, recurring, created_at)
            VALUES ('intent-old', '/donate', 50.0, 0, '2026-01-01T00:00:00.000000Z')
            ",
        )
        .execute(&pool)
        .await
        .unwrap();

        let store = DonationStore::from_pool(pool).await.unwrap();
        assert_eq!(store.schema_version().await.unwrap(), schema::SCHEMA_VERSION);

        let intent = store.get_intent("intent-old").await.unwrap().unwrap();
        assert_eq!(intent.amount, Some(50.0));
        store.enqueue_offline(&donation(5.0)).await.unwrap();
    }

    #[tokio::test]
    async fn test_newer_schema_is_rejected() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("PRAGMA user_version = 99")
            .execute(&pool)
            .await
            .unwrap();

        let err = DonationStore::from_pool(pool).await.unwrap_err();
        assert!(matches!(err, Error::Migration { version: 99, .. }));
    }
}
