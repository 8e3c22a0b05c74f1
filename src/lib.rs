use connection::holder::ConnectionHolder;
use sqlx::{pool::PoolConnection, Connection, PgConnection, Postgres, Transaction};

use crate::{errors::TreeError, model::TreeTable};

pub mod bulk;
pub mod connection;
pub mod encoding;
pub mod errors;
pub mod health;
pub mod model;
pub mod mutate;
pub mod position;
pub mod query;
pub mod sort;
pub mod telemetry;

/// Holds either a pooled connection, a direct one, or an open transaction,
/// and tracks whether this processor is itself the transaction boundary —
/// mirrors the teacher crate's `dal::StorageProcessor` so the same processor
/// can be handed to any number of `TreeDal`s without them caring which kind
/// of connection backs it.
#[derive(Debug)]
pub struct StorageProcessor<'a> {
    conn: ConnectionHolder<'a>,
    in_transaction: bool,
}

impl<'a> StorageProcessor<'a> {
    pub async fn establish_connection(database_url: &str) -> Result<StorageProcessor<'static>, TreeError> {
        let connection = PgConnection::connect(database_url).await?;
        Ok(StorageProcessor {
            conn: ConnectionHolder::Direct(connection),
            in_transaction: false,
        })
    }

    pub async fn start_transaction<'c: 'b, 'b>(
        &'c mut self,
    ) -> Result<StorageProcessor<'b>, TreeError> {
        let transaction = self.conn().begin().await?;
        let mut processor = StorageProcessor::from_transaction(transaction);
        processor.in_transaction = true;
        Ok(processor)
    }

    pub fn from_transaction(conn: Transaction<'a, Postgres>) -> Self {
        Self {
            conn: ConnectionHolder::Transaction(conn),
            in_transaction: true,
        }
    }

    pub fn from_pool(conn: PoolConnection<Postgres>) -> Self {
        Self {
            conn: ConnectionHolder::Pooled(conn),
            in_transaction: false,
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Borrows a `TreeDal` scoped to `table` against this processor's
    /// connection. Cheap and reusable: callers typically call this once per
    /// operation rather than holding it across awaits that also need
    /// `&mut self.storage`.
    pub fn tree_dal(&mut self, table: TreeTable) -> TreeDal<'_, 'a> {
        TreeDal {
            storage: self,
            table,
        }
    }

    pub(crate) fn conn(&mut self) -> &mut PgConnection {
        match &mut self.conn {
            ConnectionHolder::Pooled(conn) => conn,
            ConnectionHolder::Direct(conn) => conn,
            ConnectionHolder::Transaction(conn) => conn,
        }
    }

    pub async fn commit(self) -> Result<(), TreeError> {
        if let ConnectionHolder::Transaction(transaction) = self.conn {
            transaction.commit().await?;
            Ok(())
        } else {
            panic!("StorageProcessor::commit can only be invoked after calling StorageProcessor::start_transaction");
        }
    }
}

/// The per-concern DAL struct: a `TreeTable` paired with the connection that
/// operates on it. `'a` is the DAL's own borrow lifetime, `'c` the
/// connection's (matches the teacher's `XxxDal<'a, 'c>` convention).
pub struct TreeDal<'a, 'c> {
    pub(crate) storage: &'a mut StorageProcessor<'c>,
    pub(crate) table: TreeTable,
}
