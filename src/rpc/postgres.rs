//! `Rpc` over a direct Postgres connection.

use super::{interpret_result, Params, Procedure, Rpc, RpcError};
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement, Value};

pub struct PgRpc {
    db: DatabaseConnection,
}

impl PgRpc {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// `SELECT (name(p_a => $1, p_b => $2))::text AS result`
    ///
    /// Named notation lets procedures declare parameters in any order. The
    /// text cast covers void, scalar and json returns alike.
    pub(crate) fn build_statement(procedure: Procedure, params: Params) -> Statement {
        let mut args = Vec::with_capacity(params.len());
        let mut values: Vec<Value> = Vec::with_capacity(params.len());

        for (i, (name, arg)) in params.into_inner().into_iter().enumerate() {
            args.push(format!("{} => ${}", name, i + 1));
            values.push(arg.into());
        }

        let sql = format!(
            "SELECT ({}({}))::text AS result",
            procedure.name(),
            args.join(", ")
        );

        Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
    }
}

#[async_trait]
impl Rpc for PgRpc {
    async fn call(
        &self,
        procedure: Procedure,
        params: Params,
    ) -> Result<serde_json::Value, RpcError> {
        log::debug!("rpc: {} ({} args)", procedure, params.len());

        let statement = Self::build_statement(procedure, params);
        let row = self.db.query_one(statement).await?;

        let raw = match row {
            Some(row) => row.try_get::<Option<String>>("", "result")?,
            None => None,
        };

        interpret_result(raw)
    }
}
