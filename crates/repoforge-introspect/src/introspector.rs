//! Catalog introspection: builds the generation schema model.
//!
//! Each table is assembled from a fixed battery of catalog queries. A
//! failure while introspecting one table drops that table from the output
//! with a warning; partial tables are never emitted. The returned schema is
//! sorted by table name so downstream fingerprinting is stable.

use repoforge_core::{gotype, Column, ForeignKey, ForgeError, Index, Result, Schema, Table};

use crate::connection::{format_pg_error, PgConnection};

/// Introspects one schema of a connected database
pub struct Introspector<'a> {
    conn: &'a PgConnection,
    schema: String,
}

impl<'a> Introspector<'a> {
    pub fn new(conn: &'a PgConnection, schema: impl Into<String>) -> Self {
        Self {
            conn,
            schema: schema.into(),
        }
    }

    /// Build the schema model. With an empty `requested` list every base
    /// table in the schema is introspected; otherwise exactly the requested
    /// set is used and missing names are warned about and skipped.
    #[tracing::instrument(skip(self, requested))]
    pub async fn introspect(&self, requested: &[String]) -> Result<Schema> {
        self.conn.ping().await?;

        let all = self.list_tables().await?;
        let selected = select_requested(all, requested);

        let mut schema = Schema::new(self.schema.clone());
        for name in selected {
            match self.table(&name).await {
                Ok(table) => schema.tables.push(table),
                Err(e) => {
                    tracing::warn!(table = %name, error = %e, "skipping table after failed introspection");
                }
            }
        }
        schema.sort_tables();

        tracing::info!(schema = %self.schema, tables = schema.tables.len(), "introspection complete");
        Ok(schema)
    }

    /// All base tables of the schema, in name order. A failure here is
    /// fatal for the run.
    #[tracing::instrument(skip(self))]
    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = self
            .conn
            .client()
            .query(
                "SELECT table_name::text
                 FROM information_schema.tables
                 WHERE table_schema = $1 AND table_type = 'BASE TABLE'
                 ORDER BY table_name",
                &[&self.schema],
            )
            .await
            .map_err(|e| ForgeError::Connection(format_pg_error(&e)))?;

        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }

    /// Assemble one table. Any failed sub-query fails the whole table.
    async fn table(&self, name: &str) -> Result<Table> {
        let comment = self.table_comment(name).await?;
        let primary_keys = self.primary_keys(name).await?;
        let columns = self.columns(name).await?;
        let indexes = self.indexes(name).await?;
        let foreign_keys = self.foreign_keys(name).await?;

        let mut table = Table {
            name: name.to_string(),
            comment,
            columns,
            primary_keys,
            indexes,
            foreign_keys,
        };
        table.reconcile_primary_keys();
        Ok(table)
    }

    #[tracing::instrument(skip(self))]
    async fn table_comment(&self, table: &str) -> Result<String> {
        let rows = self
            .conn
            .client()
            .query(
                "SELECT obj_description(c.oid, 'pg_class')
                 FROM pg_class c
                 JOIN pg_namespace n ON n.oid = c.relnamespace
                 WHERE n.nspname = $1 AND c.relname = $2",
                &[&self.schema, &table],
            )
            .await
            .map_err(|e| self.query_error(table, "table comment", e))?;

        Ok(rows
            .first()
            .and_then(|row| row.get::<_, Option<String>>(0))
            .unwrap_or_default())
    }

    #[tracing::instrument(skip(self))]
    async fn columns(&self, table: &str) -> Result<Vec<Column>> {
        let rows = self
            .conn
            .client()
            .query(
                "SELECT c.column_name::text,
                        c.ordinal_position::int4,
                        c.data_type::text,
                        (c.is_nullable = 'YES'),
                        c.column_default::text,
                        col_description(format('%I.%I', c.table_schema, c.table_name)::regclass::oid,
                                        c.ordinal_position::int4)
                 FROM information_schema.columns c
                 WHERE c.table_schema = $1 AND c.table_name = $2
                 ORDER BY c.ordinal_position",
                &[&self.schema, &table],
            )
            .await
            .map_err(|e| self.query_error(table, "columns", e))?;

        let columns = rows
            .iter()
            .map(|row| {
                let name: String = row.get(0);
                let position: i32 = row.get(1);
                let db_type: String = row.get(2);
                let is_nullable: bool = row.get(3);
                let default_value: Option<String> = row.get(4);
                let comment: Option<String> = row.get(5);

                Column {
                    go_type: gotype::go_type(&db_type, is_nullable),
                    name,
                    db_type,
                    is_primary_key: false, // reconciled against primary_keys
                    is_nullable,
                    default_value,
                    comment: comment.unwrap_or_default(),
                    position: position as u32,
                }
            })
            .collect();

        Ok(renumber(columns))
    }

    /// Primary-key column names in attribute-number order
    #[tracing::instrument(skip(self))]
    async fn primary_keys(&self, table: &str) -> Result<Vec<String>> {
        let rows = self
            .conn
            .client()
            .query(
                "SELECT a.attname::text
                 FROM pg_index i
                 JOIN pg_class c ON c.oid = i.indrelid
                 JOIN pg_namespace n ON n.oid = c.relnamespace
                 JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = ANY(i.indkey)
                 WHERE i.indisprimary AND n.nspname = $1 AND c.relname = $2
                 ORDER BY array_position(i.indkey, a.attnum)",
                &[&self.schema, &table],
            )
            .await
            .map_err(|e| self.query_error(table, "primary key", e))?;

        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }

    /// Secondary indexes with ordered column lists; the primary-key index
    /// is excluded.
    #[tracing::instrument(skip(self))]
    async fn indexes(&self, table: &str) -> Result<Vec<Index>> {
        let rows = self
            .conn
            .client()
            .query(
                "SELECT i.relname::text AS index_name,
                        ix.indisunique,
                        array_agg(a.attname::text
                                  ORDER BY array_position(ix.indkey, a.attnum)) AS columns
                 FROM pg_class t
                 JOIN pg_index ix ON t.oid = ix.indrelid
                 JOIN pg_class i ON i.oid = ix.indexrelid
                 JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
                 JOIN pg_namespace n ON n.oid = t.relnamespace
                 WHERE n.nspname = $1 AND t.relname = $2 AND NOT ix.indisprimary
                 GROUP BY i.relname, ix.indisunique, ix.indkey
                 ORDER BY i.relname",
                &[&self.schema, &table],
            )
            .await
            .map_err(|e| self.query_error(table, "indexes", e))?;

        let indexes = rows
            .iter()
            .map(|row| Index {
                name: row.get(0),
                is_unique: row.get(1),
                columns: row.get(2),
            })
            .collect();

        Ok(indexes)
    }

    /// Foreign keys in constraint-name order. References into another
    /// schema are qualified as `other.table`.
    #[tracing::instrument(skip(self))]
    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>> {
        let rows = self
            .conn
            .client()
            .query(
                "SELECT tc.constraint_name::text,
                        kcu.column_name::text,
                        ccu.table_schema::text,
                        ccu.table_name::text,
                        ccu.column_name::text
                 FROM information_schema.table_constraints tc
                 JOIN information_schema.key_column_usage kcu
                   ON tc.constraint_name = kcu.constraint_name
                   AND tc.table_schema = kcu.table_schema
                 JOIN information_schema.constraint_column_usage ccu
                   ON ccu.constraint_name = tc.constraint_name
                   AND ccu.constraint_schema = tc.constraint_schema
                 WHERE tc.constraint_type = 'FOREIGN KEY'
                   AND tc.table_schema = $1
                   AND tc.table_name = $2
                 ORDER BY tc.constraint_name",
                &[&self.schema, &table],
            )
            .await
            .map_err(|e| self.query_error(table, "foreign keys", e))?;

        let fks = rows
            .iter()
            .map(|row| {
                let referenced_schema: String = row.get(2);
                let referenced_table: String = row.get(3);
                ForeignKey {
                    name: row.get(0),
                    column: row.get(1),
                    referenced_table: qualify(&self.schema, &referenced_schema, &referenced_table),
                    referenced_column: row.get(4),
                }
            })
            .collect();

        Ok(fks)
    }

    fn query_error(&self, table: &str, what: &str, error: tokio_postgres::Error) -> ForgeError {
        ForgeError::Query(format!(
            "{} query failed for {}.{}: {}",
            what,
            self.schema,
            table,
            format_pg_error(&error)
        ))
    }
}

/// Qualify a referenced table name when it lives outside the source schema.
fn qualify(own_schema: &str, referenced_schema: &str, referenced_table: &str) -> String {
    if referenced_schema == own_schema {
        referenced_table.to_string()
    } else {
        format!("{}.{}", referenced_schema, referenced_table)
    }
}

/// Restore dense 1-based positions. The catalog's ordinal_position mirrors
/// attnum, which keeps gaps after dropped columns.
fn renumber(mut columns: Vec<Column>) -> Vec<Column> {
    for (i, col) in columns.iter_mut().enumerate() {
        col.position = i as u32 + 1;
    }
    columns
}

/// Apply the explicit table selection. Missing names warn and are omitted.
fn select_requested(all: Vec<String>, requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        return all;
    }
    let mut selected = Vec::with_capacity(requested.len());
    for name in requested {
        if all.iter().any(|t| t == name) {
            selected.push(name.clone());
        } else {
            tracing::warn!(table = %name, "requested table not found in schema");
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualify_leaves_same_schema_bare() {
        assert_eq!(qualify("public", "public", "users"), "users");
        assert_eq!(qualify("public", "auth", "users"), "auth.users");
    }

    #[test]
    fn select_requested_empty_means_all() {
        let all = vec!["a".to_string(), "b".to_string()];
        assert_eq!(select_requested(all.clone(), &[]), all);
    }

    #[test]
    fn renumber_closes_attnum_gaps() {
        let make = |name: &str, position: u32| Column {
            name: name.to_string(),
            db_type: "text".to_string(),
            go_type: "string".to_string(),
            is_primary_key: false,
            is_nullable: false,
            default_value: None,
            comment: String::new(),
            position,
        };
        // A dropped second column leaves attnum positions 1, 3, 4.
        let columns = renumber(vec![make("a", 1), make("c", 3), make("d", 4)]);
        let positions: Vec<u32> = columns.iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn select_requested_keeps_request_order_and_drops_missing() {
        let all = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let requested = vec!["c".to_string(), "missing".to_string(), "a".to_string()];
        assert_eq!(
            select_requested(all, &requested),
            vec!["c".to_string(), "a".to_string()]
        );
    }
}
