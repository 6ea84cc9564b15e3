//! In-memory schema model produced by catalog introspection.
//!
//! The model is deliberately smaller than what the catalog exposes: it keeps
//! exactly the attributes the generator consumes. Tables are sorted by name
//! and columns by ordinal position so that downstream fingerprinting is
//! stable across runs.

use serde::{Deserialize, Serialize};

/// A fully introspected database schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Source schema name (e.g. `public`)
    pub name: String,
    /// Tables in name order
    pub tables: Vec<Table>,
}

impl Schema {
    /// Create an empty schema
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
        }
    }

    /// Look up a table by name
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Restore the name ordering invariant after mutation
    pub fn sort_tables(&mut self) {
        self.tables.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

/// A single base table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(default)]
    pub comment: String,
    /// Columns in ordinal-position order
    pub columns: Vec<Column>,
    /// Primary-key column names in attribute-number order
    pub primary_keys: Vec<String>,
    /// Secondary indexes in name order; primary-key indexes are excluded
    pub indexes: Vec<Index>,
    /// Foreign keys in name order
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns that are not part of the primary key, in position order.
    /// These are the SQL parameter lists of generated INSERT/UPDATE statements.
    pub fn value_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| !c.is_primary_key).collect()
    }

    /// The single primary-key column, when exactly one is declared.
    /// Composite and absent primary keys both return `None`; callers fall
    /// back to the placeholder key.
    pub fn single_primary_key(&self) -> Option<&Column> {
        match self.primary_keys.as_slice() {
            [name] => self.column(name),
            _ => None,
        }
    }

    /// Columns covered by a single-column unique index that is not the
    /// primary key. These drive the generated `FindBy*` extensions.
    pub fn unique_single_columns(&self) -> Vec<&Column> {
        let mut out = Vec::new();
        for index in &self.indexes {
            if !index.is_unique || index.columns.len() != 1 {
                continue;
            }
            let name = &index.columns[0];
            if self.primary_keys.iter().any(|pk| pk == name) {
                continue;
            }
            if let Some(col) = self.column(name) {
                if !out.iter().any(|c: &&Column| c.name == col.name) {
                    out.push(col);
                }
            }
        }
        out
    }

    /// Set `is_primary_key` on each column to agree with `primary_keys`.
    /// The two representations must never disagree once a table leaves the
    /// introspector.
    pub fn reconcile_primary_keys(&mut self) {
        for col in &mut self.columns {
            col.is_primary_key = self.primary_keys.iter().any(|pk| *pk == col.name);
        }
    }

    /// Verify the position invariant: unique, dense, starting at 1.
    pub fn positions_are_dense(&self) -> bool {
        self.columns
            .iter()
            .enumerate()
            .all(|(i, c)| c.position == i as u32 + 1)
    }
}

/// A table column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Database type name as reported by the catalog
    pub db_type: String,
    /// Mapped Go type, nullable projection applied
    pub go_type: String,
    pub is_primary_key: bool,
    pub is_nullable: bool,
    pub default_value: Option<String>,
    #[serde(default)]
    pub comment: String,
    /// 1-based ordinal position within the table
    pub position: u32,
}

/// A secondary index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    /// Indexed columns in key order
    pub columns: Vec<String>,
    pub is_unique: bool,
}

/// A single-column foreign key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,
    /// Referencing column in the source table
    pub column: String,
    /// Referenced table; `other.table` when the target lives in a different
    /// schema than the source table
    pub referenced_table: String,
    pub referenced_column: String,
}

impl ForeignKey {
    /// Split the referenced table into `(schema, table)`. The schema part is
    /// `None` for same-schema references.
    pub fn referenced_parts(&self) -> (Option<&str>, &str) {
        match self.referenced_table.split_once('.') {
            Some((schema, table)) => (Some(schema), table),
            None => (None, self.referenced_table.as_str()),
        }
    }

    /// True when the reference crosses into another schema
    pub fn is_cross_schema(&self) -> bool {
        self.referenced_parts().0.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, position: u32) -> Column {
        Column {
            name: name.to_string(),
            db_type: "text".to_string(),
            go_type: "string".to_string(),
            is_primary_key: false,
            is_nullable: false,
            default_value: None,
            comment: String::new(),
            position,
        }
    }

    fn table_with_pk() -> Table {
        Table {
            name: "users".to_string(),
            comment: String::new(),
            columns: vec![column("id", 1), column("email", 2), column("name", 3)],
            primary_keys: vec!["id".to_string()],
            indexes: vec![Index {
                name: "users_email_key".to_string(),
                columns: vec!["email".to_string()],
                is_unique: true,
            }],
            foreign_keys: Vec::new(),
        }
    }

    #[test]
    fn reconcile_sets_primary_key_flags() {
        let mut table = table_with_pk();
        table.reconcile_primary_keys();
        assert!(table.column("id").unwrap().is_primary_key);
        assert!(!table.column("email").unwrap().is_primary_key);
    }

    #[test]
    fn value_columns_exclude_primary_key() {
        let mut table = table_with_pk();
        table.reconcile_primary_keys();
        let names: Vec<_> = table.value_columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["email", "name"]);
    }

    #[test]
    fn single_primary_key_requires_exactly_one() {
        let mut table = table_with_pk();
        assert_eq!(table.single_primary_key().unwrap().name, "id");

        table.primary_keys.push("email".to_string());
        assert!(table.single_primary_key().is_none());

        table.primary_keys.clear();
        assert!(table.single_primary_key().is_none());
    }

    #[test]
    fn unique_single_columns_skip_primary_key_and_composite() {
        let mut table = table_with_pk();
        table.indexes.push(Index {
            name: "users_id_key".to_string(),
            columns: vec!["id".to_string()],
            is_unique: true,
        });
        table.indexes.push(Index {
            name: "users_email_name_key".to_string(),
            columns: vec!["email".to_string(), "name".to_string()],
            is_unique: true,
        });
        let names: Vec<_> = table
            .unique_single_columns()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["email"]);
    }

    #[test]
    fn positions_are_dense_detects_gaps() {
        let mut table = table_with_pk();
        assert!(table.positions_are_dense());
        table.columns[2].position = 5;
        assert!(!table.positions_are_dense());
    }

    #[test]
    fn foreign_key_cross_schema_split() {
        let fk = ForeignKey {
            name: "fk_orders_user".to_string(),
            column: "user_id".to_string(),
            referenced_table: "auth.users".to_string(),
            referenced_column: "id".to_string(),
        };
        assert!(fk.is_cross_schema());
        assert_eq!(fk.referenced_parts(), (Some("auth"), "users"));

        let local = ForeignKey {
            referenced_table: "users".to_string(),
            ..fk
        };
        assert!(!local.is_cross_schema());
        assert_eq!(local.referenced_parts(), (None, "users"));
    }

    #[test]
    fn sort_tables_orders_by_name() {
        let mut schema = Schema::new("public");
        schema.tables.push(Table {
            name: "orders".to_string(),
            comment: String::new(),
            columns: Vec::new(),
            primary_keys: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        });
        schema.tables.push(Table {
            name: "accounts".to_string(),
            comment: String::new(),
            columns: Vec::new(),
            primary_keys: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        });
        schema.sort_tables();
        let names: Vec<_> = schema.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["accounts", "orders"]);
    }
}
