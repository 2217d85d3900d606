/// Row Mapping Module
///
/// Populates plain structs from query results through an explicit
/// schema-to-field mapping table: each mapped type declares, once, which
/// column feeds which field and how the value coerces. Column names are
/// resolved against the result exactly once per operation; columns absent
/// from the result and values that fail coercion are skipped, leaving the
/// field at its default.
use super::rowset::RowSet;
use rusqlite::types::Value;
use tracing::debug;

/// One column-to-field binding. The assign function returns whether the
/// value coerced and was written.
pub struct FieldBinding<T> {
    column: &'static str,
    assign: fn(&mut T, &Value) -> bool,
}

/// Ordered mapping table for a target type.
pub struct RowMapping<T> {
    bindings: Vec<FieldBinding<T>>,
}

impl<T> RowMapping<T> {
    pub fn new() -> Self {
        RowMapping { bindings: Vec::new() }
    }

    /// Adds a binding from `column` to a field, via a coercing assign
    /// function (see the `coerce` helpers).
    pub fn column(mut self, column: &'static str, assign: fn(&mut T, &Value) -> bool) -> Self {
        self.bindings.push(FieldBinding { column, assign });
        self
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Builds one `T` per row of the result.
    pub fn map_rows(&self, table: &RowSet) -> Vec<T>
    where
        T: Default,
    {
        // Resolve column names once for the whole result set.
        let resolved: Vec<(usize, fn(&mut T, &Value) -> bool)> = self
            .bindings
            .iter()
            .filter_map(|binding| match table.column_index(binding.column) {
                Some(idx) => Some((idx, binding.assign)),
                None => {
                    debug!(column = binding.column, "mapped column absent from result; skipping");
                    None
                }
            })
            .collect();

        table
            .rows
            .iter()
            .map(|row| {
                let mut target = T::default();
                for (idx, assign) in &resolved {
                    let Some(value) = row.get(*idx) else { continue };
                    if !(assign)(&mut target, value) {
                        debug!(
                            column = %table.columns[*idx],
                            "value did not coerce; field left at default"
                        );
                    }
                }
                target
            })
            .collect()
    }
}

impl<T> Default for RowMapping<T> {
    fn default() -> Self {
        RowMapping::new()
    }
}

/// A type that can be populated from result rows.
pub trait MapRow: Default + Sized {
    /// The mapping table for this type. Built once per operation.
    fn mapping() -> RowMapping<Self>;
}

/// A type whose fields can be bound as command parameters, one input
/// parameter per (name, value) pair.
pub trait ToParams {
    fn to_params(&self) -> Vec<(String, Value)>;
}

/// Coercion helpers for mapping tables.
///
/// The rules: SQL NULL and empty-string text count as absent and populate
/// optional fields with `None`; integers, reals, and text cross-coerce
/// where lossless; anything else fails the coercion (the caller skips the
/// field).
pub mod coerce {
    use rusqlite::types::Value;

    fn is_absent(value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Text(t) => t.is_empty(),
            _ => false,
        }
    }

    pub fn to_i64(value: &Value) -> Option<i64> {
        match value {
            Value::Integer(i) => Some(*i),
            Value::Real(r) if r.fract() == 0.0 => Some(*r as i64),
            Value::Text(t) => t.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn to_f64(value: &Value) -> Option<f64> {
        match value {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            Value::Text(t) => t.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn to_text(value: &Value) -> Option<String> {
        match value {
            Value::Text(t) => Some(t.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(r) => Some(r.to_string()),
            _ => None,
        }
    }

    pub fn to_bool(value: &Value) -> Option<bool> {
        match value {
            Value::Integer(i) => Some(*i != 0),
            Value::Text(t) => t.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn to_blob(value: &Value) -> Option<Vec<u8>> {
        match value {
            Value::Blob(b) => Some(b.clone()),
            _ => None,
        }
    }

    pub fn assign_i64(field: &mut i64, value: &Value) -> bool {
        match to_i64(value) {
            Some(v) => {
                *field = v;
                true
            }
            None => false,
        }
    }

    pub fn assign_f64(field: &mut f64, value: &Value) -> bool {
        match to_f64(value) {
            Some(v) => {
                *field = v;
                true
            }
            None => false,
        }
    }

    pub fn assign_text(field: &mut String, value: &Value) -> bool {
        match to_text(value) {
            Some(v) => {
                *field = v;
                true
            }
            None => false,
        }
    }

    pub fn assign_bool(field: &mut bool, value: &Value) -> bool {
        match to_bool(value) {
            Some(v) => {
                *field = v;
                true
            }
            None => false,
        }
    }

    pub fn assign_opt_i64(field: &mut Option<i64>, value: &Value) -> bool {
        if is_absent(value) {
            *field = None;
            return true;
        }
        match to_i64(value) {
            Some(v) => {
                *field = Some(v);
                true
            }
            None => false,
        }
    }

    pub fn assign_opt_f64(field: &mut Option<f64>, value: &Value) -> bool {
        if is_absent(value) {
            *field = None;
            return true;
        }
        match to_f64(value) {
            Some(v) => {
                *field = Some(v);
                true
            }
            None => false,
        }
    }

    pub fn assign_opt_text(field: &mut Option<String>, value: &Value) -> bool {
        if is_absent(value) {
            *field = None;
            return true;
        }
        match to_text(value) {
            Some(v) => {
                *field = Some(v);
                true
            }
            None => false,
        }
    }

    pub fn assign_opt_bool(field: &mut Option<bool>, value: &Value) -> bool {
        if is_absent(value) {
            *field = None;
            return true;
        }
        match to_bool(value) {
            Some(v) => {
                *field = Some(v);
                true
            }
            None => false,
        }
    }
}
