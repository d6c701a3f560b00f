//! SQL select construction from validated mappings.
//!
//! The only producer of SQL text in the repository. Every identifier and
//! expression comes out of a [`SchemaMap`] lookup, so it has already passed a
//! load-time grammar; caller-supplied values only ever travel as `@p`
//! parameters, never as text.

use crate::error::MappingError;
use crate::schema_map::SchemaMap;

/// A built statement: SQL text plus the canonical field name bound to each
/// `@p` ordinal, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectStatement {
    pub sql: String,
    pub parameters: Vec<String>,
}

/// Builds a flat projection over one entity's source table.
#[derive(Debug)]
pub struct SelectBuilder<'a> {
    map: &'a SchemaMap,
    entity: &'a str,
    columns: Vec<(String, String)>,
    predicates: Vec<String>,
    order_by: Option<String>,
    top: Option<u32>,
    parameters: Vec<String>,
}

impl<'a> SelectBuilder<'a> {
    /// Start a select over `entity` projecting `fields`.
    ///
    /// # Errors
    ///
    /// Returns `MappingError::MissingKey` if any field is unmapped, or
    /// `MappingError::Invalid` if `fields` is empty.
    pub fn new(map: &'a SchemaMap, entity: &'a str, fields: &[&str]) -> Result<Self, MappingError> {
        if fields.is_empty() {
            return Err(MappingError::invalid(format!(
                "select over `{entity}` projects no fields"
            )));
        }
        Ok(Self {
            map,
            entity,
            columns: map.targets(entity, fields)?,
            predicates: Vec::new(),
            order_by: None,
            top: None,
            parameters: Vec::new(),
        })
    }

    /// Add an equality predicate on a canonical field, bound to the next
    /// `@p` ordinal.
    ///
    /// # Errors
    ///
    /// Returns `MappingError::MissingKey` if the field is unmapped.
    pub fn filter_eq(mut self, field: &str) -> Result<Self, MappingError> {
        let expression = self.map.target(&format!("{}.{field}", self.entity))?;
        let ordinal = self.parameters.len() + 1;
        self.predicates.push(format!("{expression} = @p{ordinal}"));
        self.parameters.push(field.to_string());
        Ok(self)
    }

    /// Order by a canonical field.
    ///
    /// # Errors
    ///
    /// Returns `MappingError::MissingKey` if the field is unmapped.
    pub fn order_by(mut self, field: &str, descending: bool) -> Result<Self, MappingError> {
        let expression = self.map.target(&format!("{}.{field}", self.entity))?;
        self.order_by = Some(if descending {
            format!("{expression} DESC")
        } else {
            expression.to_string()
        });
        Ok(self)
    }

    /// Cap the row count. Callers validate the value first (see the adapter
    /// crate's `enforce_limit`).
    #[must_use]
    pub fn top(mut self, rows: u32) -> Self {
        self.top = Some(rows);
        self
    }

    /// Render the statement.
    ///
    /// # Errors
    ///
    /// Returns `MappingError::MissingKey` if the entity declares no
    /// `__source`.
    pub fn build(self) -> Result<SelectStatement, MappingError> {
        let source = self.map.entity_source(self.entity)?;

        let mut sql = String::from("SELECT ");
        if let Some(rows) = self.top {
            sql.push_str(&format!("TOP {rows} "));
        }
        for (index, (alias, expression)) in self.columns.iter().enumerate() {
            if index > 0 {
                sql.push_str(", ");
            }
            if alias == expression {
                sql.push_str(expression);
            } else {
                sql.push_str(&format!("{expression} AS {alias}"));
            }
        }
        sql.push_str(" FROM ");
        sql.push_str(source);
        if !self.predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.predicates.join(" AND "));
        }
        if let Some(order) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }

        Ok(SelectStatement {
            sql,
            parameters: self.parameters,
        })
    }
}
