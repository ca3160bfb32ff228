//! SQLite implementation of the GrantStore trait.
//!
//! Uses rusqlite with bundled SQLite, wrapped in async via
//! `tokio::task::spawn_blocking`. Every read-then-write operation runs inside
//! one `IMMEDIATE` transaction, so it either commits entirely or leaves the
//! database untouched.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{
    params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior,
};

use careaccess_core::{
    evaluate, Decision, DenyReason, DoctorId, Grant, GrantId, MedicalRecord, PatientId,
    RecordId, RecordPayload, RenewalPolicy, TokenDigest,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{CommitOutcome, GrantStore};

const ROLE_PATIENT: i64 = 1;
const ROLE_DOCTOR: i64 = 2;

const GRANT_COLUMNS: &str = "grant_id, patient_id, doctor_id, token_digest, issued_at, \
     expires_at, revoked, revoked_at, max_uses, use_count";

const RECORD_COLUMNS: &str = "record_id, patient_id, doctor_id, grant_id, diagnosis, \
     symptoms, prescriptions, notes, created_at";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Execute a blocking operation on the connection off the runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn register(&self, subject: String, role: i64, now: i64) -> Result<bool> {
        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO principals (subject, role, registered_at)
                 VALUES (?1, ?2, ?3)",
                params![subject, role, now],
            )?;
            Ok(inserted == 1)
        })
        .await
    }

    async fn is_registered(&self, subject: String, role: i64) -> Result<bool> {
        self.run(move |conn| is_registered(conn, &subject, role)).await
    }
}

fn is_registered(conn: &Connection, subject: &str, role: i64) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM principals WHERE subject = ?1 AND role = ?2)",
        params![subject, role],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn ensure_patient(conn: &Connection, patient: &str) -> Result<()> {
    if is_registered(conn, patient, ROLE_PATIENT)? {
        Ok(())
    } else {
        Err(StoreError::NotFound(format!("patient {patient}")))
    }
}

fn blob_array<const N: usize>(bytes: Vec<u8>, idx: usize, name: &str) -> rusqlite::Result<[u8; N]> {
    bytes
        .try_into()
        .map_err(|_| rusqlite::Error::InvalidColumnType(idx, name.into(), Type::Blob))
}

fn conversion_error(idx: usize, ty: Type, e: impl ToString) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, e.to_string().into())
}

// Helper to convert a row to Grant
fn row_to_grant(row: &Row<'_>) -> rusqlite::Result<Grant> {
    let patient_id: String = row.get(1)?;
    let doctor_id: String = row.get(2)?;

    Ok(Grant {
        id: GrantId::from_bytes(blob_array(row.get(0)?, 0, "grant_id")?),
        patient_id: PatientId::new(patient_id).map_err(|e| conversion_error(1, Type::Text, e))?,
        doctor_id: DoctorId::new(doctor_id).map_err(|e| conversion_error(2, Type::Text, e))?,
        token_digest: TokenDigest::from_bytes(blob_array(row.get(3)?, 3, "token_digest")?),
        issued_at: row.get(4)?,
        expires_at: row.get(5)?,
        revoked: row.get(6)?,
        revoked_at: row.get(7)?,
        max_uses: row.get(8)?,
        use_count: row.get(9)?,
    })
}

// Helper to convert a row to MedicalRecord
fn row_to_record(row: &Row<'_>) -> rusqlite::Result<MedicalRecord> {
    let patient_id: String = row.get(1)?;
    let doctor_id: String = row.get(2)?;
    let symptoms: Vec<u8> = row.get(5)?;
    let prescriptions: Vec<u8> = row.get(6)?;

    Ok(MedicalRecord {
        id: RecordId::from_bytes(blob_array(row.get(0)?, 0, "record_id")?),
        patient_id: PatientId::new(patient_id).map_err(|e| conversion_error(1, Type::Text, e))?,
        doctor_id: DoctorId::new(doctor_id).map_err(|e| conversion_error(2, Type::Text, e))?,
        grant_id: GrantId::from_bytes(blob_array(row.get(3)?, 3, "grant_id")?),
        payload: RecordPayload {
            diagnosis: row.get(4)?,
            symptoms: decode_list(&symptoms).map_err(|e| conversion_error(5, Type::Blob, e))?,
            prescriptions: decode_list(&prescriptions)
                .map_err(|e| conversion_error(6, Type::Blob, e))?,
            notes: row.get(7)?,
        },
        created_at: row.get(8)?,
    })
}

// Helper to encode a string list to CBOR
fn encode_list(list: &[String]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(&list, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_list(bytes: &[u8]) -> std::result::Result<Vec<String>, ciborium::de::Error<std::io::Error>> {
    ciborium::from_reader(bytes)
}

fn load_grants(conn: &Connection, patient: &str) -> Result<Vec<Grant>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {GRANT_COLUMNS} FROM grants WHERE patient_id = ?1 ORDER BY issued_at, rowid"
    ))?;
    let grants = stmt
        .query_map(params![patient], row_to_grant)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(grants)
}

/// Revoke active grants; mirrors `Grant::revoke`.
fn revoke_active(conn: &Connection, patient: &str, doctor: &str, now: i64) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE grants SET revoked = 1, revoked_at = ?3
         WHERE patient_id = ?1 AND doctor_id = ?2 AND revoked = 0 AND expires_at > ?3
           AND (max_uses IS NULL OR use_count < max_uses)",
        params![patient, doctor, now],
    )?;
    Ok(changed)
}

#[async_trait]
impl GrantStore for SqliteStore {
    async fn register_patient(&self, patient: &PatientId, now: i64) -> Result<bool> {
        self.register(patient.as_str().to_string(), ROLE_PATIENT, now).await
    }

    async fn register_doctor(&self, doctor: &DoctorId, now: i64) -> Result<bool> {
        self.register(doctor.as_str().to_string(), ROLE_DOCTOR, now).await
    }

    async fn has_patient(&self, patient: &PatientId) -> Result<bool> {
        self.is_registered(patient.as_str().to_string(), ROLE_PATIENT).await
    }

    async fn has_doctor(&self, doctor: &DoctorId) -> Result<bool> {
        self.is_registered(doctor.as_str().to_string(), ROLE_DOCTOR).await
    }

    async fn insert_grant(
        &self,
        grant: &Grant,
        renewal: RenewalPolicy,
        now: i64,
    ) -> Result<usize> {
        let grant = grant.clone();

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            ensure_patient(&tx, grant.patient_id.as_str())?;

            let superseded = match renewal {
                RenewalPolicy::Append => 0,
                RenewalPolicy::Replace => revoke_active(
                    &tx,
                    grant.patient_id.as_str(),
                    grant.doctor_id.as_str(),
                    now,
                )?,
            };

            let inserted = tx.execute(
                &format!(
                    "INSERT INTO grants ({GRANT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    grant.id.as_bytes().as_slice(),
                    grant.patient_id.as_str(),
                    grant.doctor_id.as_str(),
                    grant.token_digest.as_bytes().as_slice(),
                    grant.issued_at,
                    grant.expires_at,
                    grant.revoked,
                    grant.revoked_at,
                    grant.max_uses,
                    grant.use_count,
                ],
            );

            match inserted {
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    return Err(StoreError::Invariant(format!(
                        "grant {} collides with an existing grant",
                        grant.id
                    )));
                }
                other => {
                    other?;
                }
            }

            tx.commit()?;
            Ok(superseded)
        })
        .await
    }

    async fn revoke_grants(
        &self,
        patient: &PatientId,
        doctor: &DoctorId,
        now: i64,
    ) -> Result<usize> {
        let patient = patient.as_str().to_string();
        let doctor = doctor.as_str().to_string();

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            ensure_patient(&tx, &patient)?;
            let revoked = revoke_active(&tx, &patient, &doctor, now)?;
            tx.commit()?;
            Ok(revoked)
        })
        .await
    }

    async fn authorize(
        &self,
        patient: &PatientId,
        doctor: &DoctorId,
        presented: &TokenDigest,
        now: i64,
    ) -> Result<Decision> {
        let patient = patient.as_str().to_string();
        let doctor = doctor.clone();
        let presented = *presented;

        self.run(move |conn| {
            let tx = conn.transaction()?;
            ensure_patient(&tx, &patient)?;
            let mut grants = load_grants(&tx, &patient)?;

            let decision = match evaluate(&grants, &doctor, &presented, now) {
                Ok(index) => Decision::Authorized(grants.swap_remove(index)),
                Err(reason) => Decision::Denied(reason),
            };

            tx.commit()?;
            Ok(decision)
        })
        .await
    }

    async fn list_grants(&self, patient: &PatientId) -> Result<Vec<Grant>> {
        let patient = patient.as_str().to_string();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            ensure_patient(&tx, &patient)?;
            let grants = load_grants(&tx, &patient)?;
            tx.commit()?;
            Ok(grants)
        })
        .await
    }

    async fn purge_grants(&self, cutoff: i64) -> Result<usize> {
        self.run(move |conn| {
            let purged = conn.execute("DELETE FROM grants WHERE expires_at < ?1", params![cutoff])?;
            Ok(purged)
        })
        .await
    }

    async fn commit_record(&self, record: &MedicalRecord, now: i64) -> Result<CommitOutcome> {
        let record = record.clone();

        self.run(move |conn| {
            let symptoms = encode_list(&record.payload.symptoms)?;
            let prescriptions = encode_list(&record.payload.prescriptions)?;

            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            ensure_patient(&tx, record.patient_id.as_str())?;

            let grant = tx
                .query_row(
                    &format!(
                        "SELECT {GRANT_COLUMNS} FROM grants WHERE grant_id = ?1 AND patient_id = ?2"
                    ),
                    params![record.grant_id.as_bytes().as_slice(), record.patient_id.as_str()],
                    row_to_grant,
                )
                .optional()?;

            let Some(grant) = grant else {
                return Ok(CommitOutcome::Lapsed(DenyReason::NoSuchGrant));
            };
            if grant.doctor_id != record.doctor_id {
                return Err(StoreError::Invariant(format!(
                    "grant {} does not belong to doctor {}",
                    grant.id, record.doctor_id
                )));
            }
            if let Err(reason) = grant.validate_for_commit(now) {
                return Ok(CommitOutcome::Lapsed(reason));
            }

            tx.execute(
                "UPDATE grants SET use_count = use_count + 1 WHERE grant_id = ?1",
                params![grant.id.as_bytes().as_slice()],
            )?;
            tx.execute(
                &format!(
                    "INSERT INTO records ({RECORD_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    record.id.as_bytes().as_slice(),
                    record.patient_id.as_str(),
                    record.doctor_id.as_str(),
                    record.grant_id.as_bytes().as_slice(),
                    record.payload.diagnosis,
                    symptoms,
                    prescriptions,
                    record.payload.notes,
                    record.created_at,
                ],
            )?;

            tx.commit()?;
            Ok(CommitOutcome::Committed)
        })
        .await
    }

    async fn list_records(&self, patient: &PatientId) -> Result<Vec<MedicalRecord>> {
        let patient = patient.as_str().to_string();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            ensure_patient(&tx, &patient)?;
            let records = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {RECORD_COLUMNS} FROM records WHERE patient_id = ?1
                     ORDER BY created_at, rowid"
                ))?;
                let rows = stmt
                    .query_map(params![patient], row_to_record)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            };
            tx.commit()?;
            Ok(records)
        })
        .await
    }
}
