use std::collections::HashMap;
use std::convert::TryFrom;
use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2;

use log::{debug, info};

use crate::{database::{Database, DatabaseError}, miner::{Reading, RejectionReason, StoredReading}, schema};

type DbPool = r2d2::Pool<r2d2::ConnectionManager<SqliteConnection>>;
type DbConnection = r2d2::PooledConnection<r2d2::ConnectionManager<SqliteConnection>>;

diesel_migrations::embed_migrations!("./migrations/");

no_arg_sql_function!(last_insert_rowid, diesel::sql_types::Integer);

/// The collector is the only writer, one connection is all it needs.
const POOL_SIZE: u32 = 1;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
/// Stays under SQLite's default limit of 999 bound parameters.
const IN_CLAUSE_CHUNK: usize = 500;
/// Newest row of every host; equal capture times go to the later insert.
const LATEST_PER_HOST: &str = "id IN (SELECT id FROM (\
    SELECT id, ROW_NUMBER() OVER (PARTITION BY hostname ORDER BY \"timestamp\" DESC, id DESC) AS rn \
    FROM MinerStats) WHERE rn = 1)";

#[derive(Debug)]
struct ConnectionOptions {
    busy_timeout: Duration
}

impl r2d2::CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
                "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
                self.busy_timeout.as_millis()))
            .map_err(r2d2::Error::QueryError)
    }
}

#[derive(Clone)]
pub struct SqliteDatabase {
    pool: DbPool
}

impl SqliteDatabase {
    pub fn new(path: &str) -> Result<Self, DatabaseError> {
        let db_manager = r2d2::ConnectionManager::<SqliteConnection>::new(path);
        let db_pool = r2d2::Pool::builder()
            .max_size(POOL_SIZE)
            .connection_customizer(Box::new(ConnectionOptions { busy_timeout: BUSY_TIMEOUT }))
            .build(db_manager)
            .map_err(|err| DatabaseError::Other(format!("Could not create database pool: {}", err)))?;

        info!("Database {} connected", path);
        {
            let migration_connection = db_pool.get().map_err(|_| DatabaseError::Busy)?;
            embedded_migrations::run(&*migration_connection)
                .map_err(|err| DatabaseError::Other(format!("Migration failed: {}", err)))?;
        }

        Ok(SqliteDatabase {
            pool: db_pool
        })
    }

    fn connection_or_busy(&self) -> Result<DbConnection, DatabaseError> {
        self.pool.get()
            .map_err(|_| DatabaseError::Busy)
    }

    fn to_rejection_reason(dto: &schema::RejectionReasonDTO) -> RejectionReason {
        RejectionReason {
            message: dto.message.clone(),
            // the column is CHECKed non-negative, only a value past u32 can fail here
            count: u32::try_from(dto.count).unwrap_or(u32::MAX)
        }
    }

    fn insert_reading(conn: &SqliteConnection, reading: &Reading, reasons: &[RejectionReason])
        -> QueryResult<i32> {

        conn.transaction(|| {
            diesel::insert_into(schema::MinerStats::table)
                .values(reading)
                .execute(conn)?;

            // Same connection and same transaction, so this is our row.
            let id = diesel::select(last_insert_rowid).get_result::<i32>(conn)?;

            for reason in reasons {
                diesel::insert_into(schema::ShareRejectionReasons::table)
                    .values(schema::AddRejectionReasonDTO {
                        mining_stats_id: id,
                        message: &reason.message,
                        count: i64::from(reason.count)
                    })
                    .execute(conn)?;
            }

            Ok(id)
        })
    }

    fn load_reasons(conn: &SqliteConnection, ids: &[i32])
        -> QueryResult<HashMap<i32, Vec<RejectionReason>>> {

        let mut by_reading: HashMap<i32, Vec<RejectionReason>> = HashMap::new();
        for chunk in ids.chunks(IN_CLAUSE_CHUNK) {
            let dtos = schema::ShareRejectionReasons::table
                .filter(schema::ShareRejectionReasons::mining_stats_id.eq_any(chunk.to_vec()))
                .order_by(schema::ShareRejectionReasons::id.asc())
                .load::<schema::RejectionReasonDTO>(conn)?;

            for dto in dtos.iter() {
                by_reading.entry(dto.mining_stats_id)
                    .or_insert_with(Vec::new)
                    .push(Self::to_rejection_reason(dto));
            }
        }
        Ok(by_reading)
    }

    fn attach_reasons(conn: &SqliteConnection, rows: Vec<(i32, Reading)>) -> QueryResult<Vec<StoredReading>> {
        let ids: Vec<i32> = rows.iter().map(|(id, _)| *id).collect();
        let mut reasons = Self::load_reasons(conn, &ids)?;

        Ok(rows
            .into_iter()
            .map(|(id, reading)| StoredReading {
                id,
                reading,
                rejection_reasons: reasons.remove(&id).unwrap_or_default()
            })
            .collect())
    }

    fn latest_per_host(conn: &SqliteConnection) -> QueryResult<Vec<(i32, Reading)>> {
        use schema::MinerStats::dsl::*;

        MinerStats
            .filter(diesel::dsl::sql::<diesel::sql_types::Bool>(LATEST_PER_HOST))
            .order_by(hostname.asc())
            .select((id, schema::READING_COLUMNS))
            .load::<(i32, Reading)>(conn)
    }

    fn sql_error_to_db_error(err: diesel::result::Error) -> DatabaseError {
        match err {
            diesel::result::Error::NotFound => DatabaseError::NotFound,
            diesel::result::Error::AlreadyInTransaction => DatabaseError::Busy,
            diesel::result::Error::DatabaseError(_, _) => {
                let lowercase_err = err.to_string().to_lowercase();
                if lowercase_err.contains("database is locked") {
                    DatabaseError::Busy
                } else if lowercase_err.contains("constraint failed") || lowercase_err.contains("is not unique") {
                    DatabaseError::Conflict(err.to_string())
                } else {
                    DatabaseError::Other(format!("{:?}", err))
                }
            },
            err => DatabaseError::Other(err.to_string())
        }
    }
}

impl Database for SqliteDatabase {
    type ReadingHandle = i32;

    fn add_reading(&self, reading: &Reading, reasons: &[RejectionReason])
        -> Result<Self::ReadingHandle, DatabaseError> {

        self.connection_or_busy()
            .and_then(|conn| {
                Self::insert_reading(&conn, reading, reasons)
                    .map_err(Self::sql_error_to_db_error)
            })
            .map(|id| {
                debug!("Stored reading {} of {} with {} rejection reasons", id, reading.hostname, reasons.len());
                id
            })
    }

    fn get_latest_readings(&self) -> Result<Vec<StoredReading>, DatabaseError> {
        self.connection_or_busy()
            .and_then(|conn| {
                Self::latest_per_host(&conn)
                    .and_then(|rows| Self::attach_reasons(&conn, rows))
                    .map_err(Self::sql_error_to_db_error)
            })
    }

    fn get_readings(&self, host: &str) -> Result<Vec<StoredReading>, DatabaseError> {
        use schema::MinerStats::dsl::*;

        self.connection_or_busy()
            .and_then(|conn| {
                MinerStats
                    .filter(hostname.eq(host))
                    .order_by((timestamp.asc(), id.asc()))
                    .select((id, schema::READING_COLUMNS))
                    .load::<(i32, Reading)>(&conn)
                    .and_then(|rows| Self::attach_reasons(&conn, rows))
                    .map_err(Self::sql_error_to_db_error)
            })
    }

    fn count_readings(&self) -> Result<i64, DatabaseError> {
        self.connection_or_busy()
            .and_then(|conn| {
                schema::MinerStats::table
                    .count()
                    .get_result::<i64>(&conn)
                    .map_err(Self::sql_error_to_db_error)
            })
    }
}
