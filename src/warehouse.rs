use std::collections::HashMap;
use std::future::Future;

use anyhow::Context;
use sqlx::postgres::Postgres;
use sqlx::{Connection, PgConnection, QueryBuilder, Row};

use crate::configuration::{DatabaseSettings, SubscriberQuerySettings};
use crate::domain::Subscriber;
use crate::helpers::{quote_ident, quote_table};

/// The tabular store the ingestion pipeline loads into.
pub trait Warehouse {
    fn table_exists(
        &mut self,
        table: &str,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// Largest value of `column`, rendered as text. `None` for an empty table.
    fn max_value(
        &mut self,
        table: &str,
        column: &str,
    ) -> impl Future<Output = Result<Option<String>, sqlx::Error>> + Send;

    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Option<String>>],
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
}

pub struct PgWarehouse {
    connection: PgConnection,
    column_types: HashMap<String, HashMap<String, String>>,
}

impl PgWarehouse {
    #[tracing::instrument(
        name = "Connecting to the warehouse",
        skip(settings),
        fields(host = %settings.host, database = %settings.database_name)
    )]
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, sqlx::Error> {
        let connection = PgConnection::connect_with(&settings.with_db()).await?;
        Ok(Self {
            connection,
            column_types: HashMap::new(),
        })
    }

    pub async fn close(self) -> Result<(), sqlx::Error> {
        self.connection.close().await
    }

    pub fn connection(&mut self) -> &mut PgConnection {
        &mut self.connection
    }

    /// Destination column types, looked up once per table.
    async fn column_types(&mut self, table: &str) -> Result<&HashMap<String, String>, sqlx::Error> {
        if !self.column_types.contains_key(table) {
            let (schema, name) = split_table(table);
            let rows = sqlx::query(
                r#"
                SELECT column_name, data_type
                FROM information_schema.columns
                WHERE table_name = $1 AND table_schema = COALESCE($2, current_schema())
                "#,
            )
            .bind(name)
            .bind(schema)
            .fetch_all(&mut self.connection)
            .await?;

            let types = rows
                .into_iter()
                .map(|row| Ok((row.try_get("column_name")?, row.try_get("data_type")?)))
                .collect::<Result<HashMap<String, String>, sqlx::Error>>()?;
            self.column_types.insert(table.to_string(), types);
        }
        Ok(&self.column_types[table])
    }
}

fn split_table(table: &str) -> (Option<&str>, &str) {
    match table.split_once('.') {
        Some((schema, name)) => (Some(schema), name),
        None => (None, table),
    }
}

/// Bound values are sent as text; cast them to the column's declared type.
fn cast_for(data_type: Option<&String>) -> Option<&str> {
    match data_type.map(String::as_str) {
        None | Some("USER-DEFINED") | Some("ARRAY") | Some("text") => None,
        Some(other) => Some(other),
    }
}

impl Warehouse for PgWarehouse {
    async fn table_exists(&mut self, table: &str) -> Result<bool, sqlx::Error> {
        let (schema, name) = split_table(table);
        sqlx::query_scalar::<Postgres, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_name = $1 AND table_schema = COALESCE($2, current_schema())
            )
            "#,
        )
        .bind(name)
        .bind(schema)
        .fetch_one(&mut self.connection)
        .await
    }

    async fn max_value(&mut self, table: &str, column: &str) -> Result<Option<String>, sqlx::Error> {
        let query = format!(
            "SELECT max({})::text FROM {}",
            quote_ident(column),
            quote_table(table)
        );
        sqlx::query_scalar::<Postgres, Option<String>>(&query)
            .fetch_one(&mut self.connection)
            .await
    }

    async fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Option<String>>],
    ) -> Result<u64, sqlx::Error> {
        let types = self.column_types(table).await?;
        let casts: Vec<Option<String>> = columns
            .iter()
            .map(|c| cast_for(types.get(c)).map(|t| format!("::{t}")))
            .collect();

        let column_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO {} ({column_list}) ", quote_table(table)));
        builder.push_values(rows, |mut b, row| {
            for (cell, cast) in row.iter().zip(&casts) {
                b.push_bind(cell.clone());
                if let Some(cast) = cast {
                    b.push_unseparated(cast);
                }
            }
        });

        let result = builder.build().execute(&mut self.connection).await?;
        Ok(result.rows_affected())
    }
}

#[tracing::instrument(name = "Fetching opted-in subscribers", skip(connection))]
pub async fn fetch_subscribers(
    connection: &mut PgConnection,
    query: &SubscriberQuerySettings,
) -> Result<Vec<Result<Subscriber, anyhow::Error>>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {first}::text AS first_name, {last}::text AS last_name, {email}::text AS email
        FROM {table}
        WHERE {email} IS NOT NULL AND {status}::text = $1
        "#,
        first = quote_ident(&query.first_name_column),
        last = quote_ident(&query.last_name_column),
        email = quote_ident(&query.email_column),
        status = quote_ident(&query.status_column),
        table = quote_table(&query.table),
    );

    let rows = sqlx::query(&sql)
        .bind(&query.opt_in_value)
        .fetch_all(connection)
        .await?;

    let subscribers = rows
        .into_iter()
        .map(|row| {
            let first_name: Option<String> = row.try_get("first_name")?;
            let last_name: Option<String> = row.try_get("last_name")?;
            let email: String = row.try_get("email")?;
            Subscriber::parse(
                first_name.unwrap_or_default(),
                last_name.unwrap_or_default(),
                email,
            )
            .map_err(|e| anyhow::anyhow!(e))
            .context("Stored subscriber details are invalid.")
        })
        .collect();

    Ok(subscribers)
}
