//! Single writer thread. Every mutation runs here, one immediate transaction per job.

use std::any::Any;

use diesel::SqliteConnection;
use log::error;
use tokio::sync::{mpsc, oneshot};

use fieldsync_core::errors::{DatabaseError, Error, Result};

use super::{get_connection, DbPool};
use crate::errors::StorageError;

type BoxedValue = Box<dyn Any + Send>;
type Job = Box<dyn FnOnce(&mut SqliteConnection) -> Result<BoxedValue> + Send>;
type Reply = oneshot::Sender<Result<BoxedValue>>;

/// Cloneable handle to the writer thread.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<(Job, Reply)>,
}

impl std::fmt::Debug for WriteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl WriteHandle {
    /// Runs `job` inside a write transaction and returns its result.
    ///
    /// An `Err` from the job rolls the transaction back.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |conn| job(conn).map(|value| Box::new(value) as BoxedValue));
        self.tx
            .send((job, reply_tx))
            .map_err(|_| writer_unavailable())?;

        let value = reply_rx.await.map_err(|_| writer_unavailable())??;
        value.downcast::<T>().map(|v| *v).map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "Writer returned an unexpected value type".to_string(),
            ))
        })
    }
}

fn writer_unavailable() -> Error {
    Error::Database(DatabaseError::ConnectionFailed(
        "Database writer is not running".to_string(),
    ))
}

enum TxError {
    Job(Error),
    Diesel(diesel::result::Error),
}

impl From<diesel::result::Error> for TxError {
    fn from(err: diesel::result::Error) -> Self {
        TxError::Diesel(err)
    }
}

fn run_job(pool: &DbPool, job: Job) -> Result<BoxedValue> {
    let mut conn = get_connection(pool)?;
    conn.immediate_transaction::<_, TxError, _>(|tx| job(tx).map_err(TxError::Job))
        .map_err(|err| match err {
            TxError::Job(err) => err,
            TxError::Diesel(err) => StorageError::from(err).into(),
        })
}

/// Starts the writer thread. It stops once every handle is dropped.
pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<(Job, Reply)>();
    let spawned = std::thread::Builder::new()
        .name("fieldsync-db-writer".to_string())
        .spawn(move || {
            while let Some((job, reply)) = rx.blocking_recv() {
                let result = run_job(&pool, job);
                // Caller may have given up waiting.
                let _ = reply.send(result);
            }
        });
    if let Err(err) = spawned {
        error!("[Storage] Failed to start database writer: {}", err);
    }
    WriteHandle { tx }
}
