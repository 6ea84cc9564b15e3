//! PostgreSQL to Go type mapping.
//!
//! The mapping table is closed: anything the table does not know collapses
//! to [`FALLBACK_TYPE`]. Nullable columns are projected to a pointer type
//! unless the base type already carries null (byte slices, raw JSON, the
//! fallback itself).

/// Go type used for database types the mapper does not recognize
pub const FALLBACK_TYPE: &str = "interface{}";

/// Map a database type name to the Go type used in generated code.
///
/// `db_type` is matched case-insensitively and with any length/precision
/// parameters stripped, so `VARCHAR(255)` and `character varying` both map
/// to `string`.
pub fn go_type(db_type: &str, nullable: bool) -> String {
    let base = base_go_type(db_type);
    if nullable && needs_pointer(base) {
        format!("*{}", base)
    } else {
        base.to_string()
    }
}

/// The Go import path a mapped type requires, if any.
pub fn go_import(go_type: &str) -> Option<&'static str> {
    match go_type.trim_start_matches('*') {
        "time.Time" | "time.Duration" => Some("time"),
        "uuid.UUID" => Some("github.com/google/uuid"),
        "json.RawMessage" => Some("encoding/json"),
        _ => None,
    }
}

fn needs_pointer(base: &str) -> bool {
    !matches!(base, FALLBACK_TYPE | "[]byte" | "json.RawMessage")
}

fn base_go_type(db_type: &str) -> &'static str {
    let normalized = normalize(db_type);
    match normalized.as_str() {
        "smallint" | "int2" | "smallserial" => "int16",
        "integer" | "int" | "int4" | "serial" => "int",
        "bigint" | "int8" | "bigserial" => "int64",
        "real" | "float4" => "float32",
        "double precision" | "float8" => "float64",
        "numeric" | "decimal" | "money" => "float64",
        "boolean" | "bool" => "bool",
        "text" | "varchar" | "character varying" | "char" | "character" | "citext" | "name" => {
            "string"
        }
        "uuid" => "uuid.UUID",
        "date"
        | "time"
        | "time without time zone"
        | "time with time zone"
        | "timetz"
        | "timestamp"
        | "timestamp without time zone"
        | "timestamp with time zone"
        | "timestamptz" => "time.Time",
        "interval" => "time.Duration",
        "bytea" => "[]byte",
        "json" | "jsonb" => "json.RawMessage",
        "inet" | "cidr" | "macaddr" | "macaddr8" | "xml" | "bit" | "bit varying" | "varbit" => {
            "string"
        }
        _ => FALLBACK_TYPE,
    }
}

/// Lower-case, trim, and strip a trailing `(...)` parameter list.
fn normalize(db_type: &str) -> String {
    let lowered = db_type.trim().to_lowercase();
    match lowered.find('(') {
        Some(start) => lowered[..start].trim_end().to_string(),
        None => lowered,
    }
}
