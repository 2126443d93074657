//! In-memory storage adapter.
//!
//! `MemoryAdapter` keeps tables as ordered string-valued rows and
//! interprets the statement dialect the gateway and query builder emit:
//! CREATE/DROP/ALTER TABLE, SHOW TABLES/FIELDS, INSERT/UPDATE/DELETE,
//! single-table SELECT with WHERE/ORDER BY/LIMIT/COUNT, and the
//! two-table join form used for association loads. It is not a general
//! SQL engine; statements outside that dialect fail with
//! `ExecutionFailed`.
//!
//! Values are stored and returned as strings, like the wire format of
//! the reference driver; typed interpretation happens at hydration.

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;

use strata_common::{Row, StrataError, StrataResult, Value};

use super::adapter::{Adapter, Rows};

type StoredRow = IndexMap<String, String>;

#[derive(Debug, Default)]
struct MemoryTable {
    /// Column names with their native type definitions, in order.
    columns: Vec<(String, String)>,
    rows: Vec<StoredRow>,
    next_id: i64,
    indexes: Vec<String>,
}

impl MemoryTable {
    fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }
}

struct MemoryRows {
    rows: VecDeque<Row>,
    total: usize,
}

impl Rows for MemoryRows {
    fn next_row(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    fn num_rows(&self) -> usize {
        self.total
    }
}

fn result_set(rows: Vec<StoredRow>) -> Box<dyn Rows> {
    let total = rows.len();
    let rows: VecDeque<Row> = rows
        .into_iter()
        .map(|stored| {
            stored
                .into_iter()
                .map(|(column, value)| (column, Value::Str(value)))
                .collect()
        })
        .collect();
    Box::new(MemoryRows { rows, total })
}

/// An adapter backed by in-memory tables.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    tables: HashMap<String, MemoryTable>,
    last_insert_id: i64,
    affected_rows: u64,
}

impl MemoryAdapter {
    /// Creates an empty adapter.
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(sql: &str, message: impl Into<String>) -> StrataError {
        StrataError::execution(sql, message)
    }

    fn table(&self, sql: &str, name: &str) -> StrataResult<&MemoryTable> {
        self.tables
            .get(name)
            .ok_or_else(|| Self::fail(sql, format!("no such table '{name}'")))
    }

    fn table_mut(&mut self, sql: &str, name: &str) -> StrataResult<&mut MemoryTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Self::fail(sql, format!("no such table '{name}'")))
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn run_create_table(&mut self, sql: &str, rest: &str) -> StrataResult<Box<dyn Rows>> {
        let open = rest
            .find('(')
            .ok_or_else(|| Self::fail(sql, "malformed CREATE TABLE"))?;
        let name = strip_ticks(&rest[..open]).to_string();
        let defs_part = parens_body(&rest[open..])
            .ok_or_else(|| Self::fail(sql, "malformed CREATE TABLE"))?;

        if self.tables.contains_key(&name) {
            return Err(Self::fail(sql, format!("table '{name}' already exists")));
        }

        let mut columns = Vec::new();
        for def in split_top_level(defs_part, ',') {
            if def.starts_with("PRIMARY KEY") {
                continue;
            }
            let (column, definition) = def
                .split_once(' ')
                .ok_or_else(|| Self::fail(sql, format!("malformed column definition '{def}'")))?;
            columns.push((strip_ticks(column).to_string(), definition.trim().to_string()));
        }

        self.tables.insert(
            name,
            MemoryTable {
                columns,
                rows: Vec::new(),
                next_id: 1,
                indexes: Vec::new(),
            },
        );
        Ok(result_set(Vec::new()))
    }

    fn run_drop_table(&mut self, sql: &str, rest: &str) -> StrataResult<Box<dyn Rows>> {
        let name = strip_ticks(rest);
        if self.tables.remove(name).is_none() {
            return Err(Self::fail(sql, format!("no such table '{name}'")));
        }
        Ok(result_set(Vec::new()))
    }

    fn run_show_tables(&mut self, sql: &str, rest: &str) -> StrataResult<Box<dyn Rows>> {
        let pattern =
            unquote(rest.trim()).ok_or_else(|| Self::fail(sql, "malformed SHOW TABLES"))?;
        let mut rows = Vec::new();
        for name in self.tables.keys() {
            if like_match(name, &pattern) {
                let mut row = StoredRow::new();
                row.insert("Tables".to_string(), name.clone());
                rows.push(row);
            }
        }
        Ok(result_set(rows))
    }

    fn run_show_fields(&mut self, sql: &str, rest: &str) -> StrataResult<Box<dyn Rows>> {
        let (table_part, like_part) = rest
            .split_once(" LIKE ")
            .ok_or_else(|| Self::fail(sql, "malformed SHOW FIELDS"))?;
        let name = strip_ticks(table_part).to_string();
        let pattern =
            unquote(like_part.trim()).ok_or_else(|| Self::fail(sql, "malformed SHOW FIELDS"))?;
        let table = self.table(sql, &name)?;

        let mut rows = Vec::new();
        for (column, definition) in &table.columns {
            if like_match(column, &pattern) {
                let mut row = StoredRow::new();
                row.insert("Field".to_string(), column.clone());
                row.insert("Type".to_string(), definition.clone());
                rows.push(row);
            }
        }
        Ok(result_set(rows))
    }

    fn run_alter(&mut self, sql: &str, rest: &str) -> StrataResult<Box<dyn Rows>> {
        let (table_part, action) = rest
            .split_once(' ')
            .ok_or_else(|| Self::fail(sql, "malformed ALTER TABLE"))?;
        let name = strip_ticks(table_part).to_string();
        let action = action.trim();

        if let Some(clause) = action.strip_prefix("ADD COLUMN ") {
            let (column, definition) = clause
                .split_once(' ')
                .ok_or_else(|| Self::fail(sql, "malformed ADD COLUMN"))?;
            let column = strip_ticks(column).to_string();
            let table = self.table_mut(sql, &name)?;
            if table.has_column(&column) {
                return Err(Self::fail(sql, format!("duplicate column '{column}'")));
            }
            table.columns.push((column.clone(), definition.trim().to_string()));
            for row in &mut table.rows {
                row.insert(column.clone(), String::new());
            }
        } else if let Some(clause) = action.strip_prefix("DROP COLUMN ") {
            let column = strip_ticks(clause).to_string();
            let table = self.table_mut(sql, &name)?;
            table.columns.retain(|(n, _)| *n != column);
            for row in &mut table.rows {
                row.shift_remove(&column);
            }
        } else if let Some(clause) = action.strip_prefix("CHANGE COLUMN ") {
            let mut parts = clause.splitn(3, ' ');
            let old = parts.next().map(strip_ticks);
            let new = parts.next().map(strip_ticks);
            let definition = parts.next().unwrap_or_default().trim().to_string();
            let (old, new) = match (old, new) {
                (Some(old), Some(new)) => (old.to_string(), new.to_string()),
                _ => return Err(Self::fail(sql, "malformed CHANGE COLUMN")),
            };
            let table = self.table_mut(sql, &name)?;
            match table.columns.iter_mut().find(|(n, _)| *n == old) {
                Some(entry) => *entry = (new.clone(), definition),
                None => return Err(Self::fail(sql, format!("no such column '{old}'"))),
            }
            for row in &mut table.rows {
                *row = row
                    .iter()
                    .map(|(column, value)| {
                        let column = if *column == old { new.clone() } else { column.clone() };
                        (column, value.clone())
                    })
                    .collect();
            }
        } else if let Some(clause) = action.strip_prefix("ADD INDEX ") {
            let index = strip_ticks(clause.split(' ').next().unwrap_or_default()).to_string();
            let table = self.table_mut(sql, &name)?;
            table.indexes.push(index);
        } else {
            return Err(Self::fail(sql, "unsupported ALTER TABLE action"));
        }
        Ok(result_set(Vec::new()))
    }

    fn run_drop_index(&mut self, sql: &str, rest: &str) -> StrataResult<Box<dyn Rows>> {
        let (index_part, table_part) = rest
            .split_once(" ON ")
            .ok_or_else(|| Self::fail(sql, "malformed DROP INDEX"))?;
        let index = strip_ticks(index_part).to_string();
        let name = strip_ticks(table_part).to_string();
        let table = self.table_mut(sql, &name)?;
        table.indexes.retain(|n| *n != index);
        Ok(result_set(Vec::new()))
    }

    fn run_insert(&mut self, sql: &str, rest: &str) -> StrataResult<Box<dyn Rows>> {
        let open = rest
            .find('(')
            .ok_or_else(|| Self::fail(sql, "malformed INSERT"))?;
        let name = strip_ticks(&rest[..open]).to_string();
        let after = &rest[open..];
        let close = matching_paren(after).ok_or_else(|| Self::fail(sql, "malformed INSERT"))?;
        let columns_part = &after[1..close];
        let values_part = after[close + 1..]
            .trim()
            .strip_prefix("VALUES")
            .map(str::trim)
            .and_then(parens_body)
            .ok_or_else(|| Self::fail(sql, "malformed INSERT"))?;

        let columns: Vec<String> = split_top_level(columns_part, ',')
            .into_iter()
            .map(|c| strip_ticks(&c).to_string())
            .collect();
        let values: Vec<String> = split_top_level(values_part, ',')
            .iter()
            .map(|v| unquote(v).ok_or_else(|| Self::fail(sql, format!("unquoted value {v}"))))
            .collect::<StrataResult<_>>()?;
        if columns.len() != values.len() {
            return Err(Self::fail(sql, "column/value count mismatch"));
        }

        let table = self.table_mut(sql, &name)?;
        let mut provided: HashMap<&str, &str> = HashMap::new();
        for (column, value) in columns.iter().zip(values.iter()) {
            if !table.has_column(column) {
                return Err(Self::fail(sql, format!("unknown column '{column}'")));
            }
            provided.insert(column.as_str(), value.as_str());
        }

        let id = match provided.get("id").filter(|v| !v.is_empty()) {
            Some(v) => v
                .parse::<i64>()
                .map_err(|_| Self::fail(sql, "non-numeric id"))?,
            None => table.next_id,
        };
        table.next_id = table.next_id.max(id + 1);

        let column_names: Vec<String> = table.columns.iter().map(|(n, _)| n.clone()).collect();
        let mut row = StoredRow::new();
        for column in column_names {
            let value = if column == "id" {
                id.to_string()
            } else {
                provided.get(column.as_str()).map_or_else(String::new, |v| (*v).to_string())
            };
            row.insert(column, value);
        }
        table.rows.push(row);

        self.last_insert_id = id;
        self.affected_rows = 1;
        Ok(result_set(Vec::new()))
    }

    fn run_update(&mut self, sql: &str, rest: &str) -> StrataResult<Box<dyn Rows>> {
        let (table_part, after) = rest
            .split_once(" SET ")
            .ok_or_else(|| Self::fail(sql, "malformed UPDATE"))?;
        let name = strip_ticks(table_part).to_string();
        let (set_part, where_part) = match find_outside_quotes(after, " WHERE ") {
            Some(i) => (&after[..i], Some(&after[i + 7..])),
            None => (after, None),
        };

        let mut assignments = Vec::new();
        for assignment in split_top_level(set_part, ',') {
            let (column, value) = split_condition_eq(&assignment)
                .ok_or_else(|| Self::fail(sql, format!("malformed assignment '{assignment}'")))?;
            let value =
                unquote(&value).ok_or_else(|| Self::fail(sql, format!("unquoted value {value}")))?;
            assignments.push((column, value));
        }
        let conditions = match where_part {
            Some(part) => parse_conditions(sql, part)?,
            None => Vec::new(),
        };

        let table = self.table_mut(sql, &name)?;
        let mut affected = 0;
        for row in &mut table.rows {
            let matched = {
                let row: &StoredRow = row;
                conditions.iter().all(|c| c.matches(&[("", row)]))
            };
            if matched {
                for (column, value) in &assignments {
                    if !row.contains_key(column) {
                        return Err(Self::fail(sql, format!("unknown column '{column}'")));
                    }
                    row.insert(column.clone(), value.clone());
                }
                affected += 1;
            }
        }
        self.affected_rows = affected;
        Ok(result_set(Vec::new()))
    }

    fn run_delete(&mut self, sql: &str, rest: &str) -> StrataResult<Box<dyn Rows>> {
        let (table_part, where_part) = match find_outside_quotes(rest, " WHERE ") {
            Some(i) => (&rest[..i], Some(&rest[i + 7..])),
            None => (rest, None),
        };
        let name = strip_ticks(table_part).to_string();
        let conditions = match where_part {
            Some(part) => parse_conditions(sql, part)?,
            None => Vec::new(),
        };

        let table = self.table_mut(sql, &name)?;
        let before = table.rows.len();
        table
            .rows
            .retain(|row| !conditions.iter().all(|c| c.matches(&[("", row)])));
        self.affected_rows = (before - table.rows.len()) as u64;
        Ok(result_set(Vec::new()))
    }

    fn run_select(&mut self, sql: &str, rest: &str) -> StrataResult<Box<dyn Rows>> {
        let from = find_outside_quotes(rest, " FROM ")
            .ok_or_else(|| Self::fail(sql, "malformed SELECT"))?;
        let fields_part = rest[..from].trim().to_string();
        let after = &rest[from + 6..];

        // Split off the trailing clause sections in their fixed order.
        let markers = [" WHERE ", " GROUP BY ", " HAVING ", " ORDER BY ", " LIMIT "];
        let mut boundary = after.len();
        let mut sections: Vec<(usize, &str)> = Vec::new();
        for marker in markers {
            if let Some(i) = find_outside_quotes(after, marker) {
                boundary = boundary.min(i);
                sections.push((i, marker));
            }
        }
        let tables_part = &after[..boundary];
        let mut section_text: HashMap<&str, &str> = HashMap::new();
        sections.sort_by_key(|(i, _)| *i);
        for (pos, (start, marker)) in sections.iter().enumerate() {
            let end = sections
                .get(pos + 1)
                .map_or(after.len(), |(next, _)| *next);
            section_text.insert(*marker, &after[start + marker.len()..end]);
        }

        if section_text.contains_key(" GROUP BY ") || section_text.contains_key(" HAVING ") {
            return Err(Self::fail(sql, "GROUP BY/HAVING not supported in memory"));
        }

        let table_names: Vec<String> = split_top_level(tables_part, ',')
            .iter()
            .map(|t| strip_ticks(t).to_string())
            .collect();
        let conditions = match section_text.get(" WHERE ") {
            Some(part) => parse_conditions(sql, part)?,
            None => Vec::new(),
        };

        let mut already_projected = false;
        let mut out: Vec<StoredRow> = match table_names.len() {
            1 => {
                let table = self.table(sql, &table_names[0])?;
                table
                    .rows
                    .iter()
                    .filter(|row| {
                        conditions
                            .iter()
                            .all(|c| c.matches(&[(table_names[0].as_str(), *row)]))
                    })
                    .cloned()
                    .collect()
            }
            2 => {
                already_projected = true;
                let first = self.table(sql, &table_names[0])?;
                let second = self.table(sql, &table_names[1])?;
                let mut rows = Vec::new();
                for r1 in &first.rows {
                    for r2 in &second.rows {
                        let context = [
                            (table_names[0].as_str(), r1),
                            (table_names[1].as_str(), r2),
                        ];
                        if conditions.iter().all(|c| c.matches(&context)) {
                            rows.push(project_join(&fields_part, &table_names, r1, r2));
                        }
                    }
                }
                rows
            }
            _ => return Err(Self::fail(sql, "unsupported table list")),
        };

        // COUNT aggregates over the filtered set before ordering/limits.
        if let Some(inner) = fields_part.strip_prefix("COUNT(") {
            let alias = inner
                .split_once(')')
                .and_then(|(_, rest)| rest.trim().strip_prefix("AS "))
                .unwrap_or("count")
                .trim();
            let mut row = StoredRow::new();
            row.insert(alias.to_string(), out.len().to_string());
            return Ok(result_set(vec![row]));
        }

        if let Some(order) = section_text.get(" ORDER BY ") {
            let mut parts = order.split_whitespace();
            let column = parts.next().unwrap_or_default().to_string();
            let descending = parts.next() == Some("DESC");
            out.sort_by(|a, b| {
                let ordering = compare_values(
                    a.get(&column).map_or("", String::as_str),
                    b.get(&column).map_or("", String::as_str),
                );
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        if let Some(limit) = section_text.get(" LIMIT ") {
            let (lower, upper) = limit
                .split_once(',')
                .ok_or_else(|| Self::fail(sql, "malformed LIMIT"))?;
            let lower: usize = lower.trim().parse().map_err(|_| Self::fail(sql, "bad LIMIT"))?;
            let upper: usize = upper.trim().parse().map_err(|_| Self::fail(sql, "bad LIMIT"))?;
            out = out.into_iter().skip(lower).take(upper).collect();
        }

        if !already_projected && fields_part != "*" {
            let fields = split_top_level(&fields_part, ',');
            out = out
                .into_iter()
                .map(|row| project_fields(sql, &fields, &row))
                .collect::<StrataResult<_>>()?;
        }

        Ok(result_set(out))
    }
}

impl Adapter for MemoryAdapter {
    fn execute(&mut self, sql: &str) -> StrataResult<Box<dyn Rows>> {
        let sql = sql.trim();
        if let Some(rest) = sql.strip_prefix("SELECT ") {
            self.run_select(sql, rest)
        } else if let Some(rest) = sql.strip_prefix("INSERT INTO ") {
            self.run_insert(sql, rest)
        } else if let Some(rest) = sql.strip_prefix("UPDATE ") {
            self.run_update(sql, rest)
        } else if let Some(rest) = sql.strip_prefix("DELETE FROM ") {
            self.run_delete(sql, rest)
        } else if let Some(rest) = sql.strip_prefix("CREATE TABLE ") {
            self.run_create_table(sql, rest)
        } else if let Some(rest) = sql.strip_prefix("DROP TABLE ") {
            self.run_drop_table(sql, rest)
        } else if let Some(rest) = sql.strip_prefix("SHOW TABLES LIKE ") {
            self.run_show_tables(sql, rest)
        } else if let Some(rest) = sql.strip_prefix("SHOW FIELDS FROM ") {
            self.run_show_fields(sql, rest)
        } else if let Some(rest) = sql.strip_prefix("ALTER TABLE ") {
            self.run_alter(sql, rest)
        } else if let Some(rest) = sql.strip_prefix("DROP INDEX ") {
            self.run_drop_index(sql, rest)
        } else {
            Err(Self::fail(sql, "unsupported statement"))
        }
    }

    fn escape(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            if matches!(c, '\\' | '"' | '\'') {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }

    fn last_insert_id(&self) -> i64 {
        self.last_insert_id
    }

    fn affected_rows(&self) -> u64 {
        self.affected_rows
    }
}

// =============================================================================
// Statement text helpers
// =============================================================================

fn strip_ticks(text: &str) -> &str {
    text.trim().trim_matches('`')
}

/// Returns the body of a leading parenthesized group.
fn parens_body(text: &str) -> Option<&str> {
    if !text.starts_with('(') {
        return None;
    }
    matching_paren(text).map(|close| &text[1..close])
}

/// Returns the index of the parenthesis closing the one at position 0.
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quote.is_some() => escaped = true,
            '"' | '\'' => match quote {
                Some(q) if q == c => quote = None,
                None => quote = Some(c),
                _ => {}
            },
            '(' if quote.is_none() => depth += 1,
            ')' if quote.is_none() => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits on a separator outside quotes and parentheses.
fn split_top_level(text: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in text.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if quote.is_some() => {
                current.push(c);
                escaped = true;
            }
            '"' | '\'' => {
                match quote {
                    Some(q) if q == c => quote = None,
                    None => quote = Some(c),
                    _ => {}
                }
                current.push(c);
            }
            '(' if quote.is_none() => {
                depth += 1;
                current.push(c);
            }
            ')' if quote.is_none() => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if c == separator && depth == 0 && quote.is_none() => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Finds a marker outside quoted sections.
fn find_outside_quotes(text: &str, marker: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if quote.is_none() && text[i..].starts_with(marker) {
            return Some(i);
        }
        match c {
            '\\' if quote.is_some() => escaped = true,
            '"' | '\'' => match quote {
                Some(q) if q == c => quote = None,
                None => quote = Some(c),
                _ => {}
            },
            _ => {}
        }
    }
    None
}

fn split_on_marker<'a>(text: &'a str, marker: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(i) = find_outside_quotes(rest, marker) {
        parts.push(rest[..i].trim());
        rest = &rest[i + marker.len()..];
    }
    parts.push(rest.trim());
    parts
}

/// Removes surrounding quotes and resolves backslash escapes.
fn unquote(text: &str) -> Option<String> {
    let text = text.trim();
    let mut chars = text.chars();
    let first = chars.next()?;
    if !matches!(first, '"' | '\'') || !text.ends_with(first) || text.len() < 2 {
        return None;
    }
    let inner = &text[1..text.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut escaped = false;
    for c in inner.chars() {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Splits a `column=value` assignment at the first bare `=`.
fn split_condition_eq(text: &str) -> Option<(String, String)> {
    let i = find_outside_quotes(text, "=")?;
    Some((
        text[..i].trim().to_string(),
        text[i + 1..].trim().to_string(),
    ))
}

// =============================================================================
// Condition evaluation
// =============================================================================

struct Condition {
    left: String,
    op: &'static str,
    right: String,
    upper: Option<String>,
}

impl Condition {
    fn matches(&self, context: &[(&str, &StoredRow)]) -> bool {
        let left = resolve(&self.left, context);
        let right = resolve(&self.right, context);
        match self.op {
            "=" => compare_values(&left, &right) == Ordering::Equal,
            "!=" => compare_values(&left, &right) != Ordering::Equal,
            ">" => compare_values(&left, &right) == Ordering::Greater,
            ">=" => compare_values(&left, &right) != Ordering::Less,
            "<" => compare_values(&left, &right) == Ordering::Less,
            "<=" => compare_values(&left, &right) != Ordering::Greater,
            "LIKE" => like_match(&left, &right),
            "NOT LIKE" => !like_match(&left, &right),
            "BETWEEN" | "NOT BETWEEN" => {
                let upper = self
                    .upper
                    .as_ref()
                    .map_or(String::new(), |u| resolve(u, context));
                let within = compare_values(&left, &right) != Ordering::Less
                    && compare_values(&left, &upper) != Ordering::Greater;
                if self.op == "BETWEEN" {
                    within
                } else {
                    !within
                }
            }
            _ => false,
        }
    }
}

/// Resolves an operand: quoted text is a literal, known (possibly
/// qualified) columns read from the row context, anything else is taken
/// as a bare literal.
fn resolve(operand: &str, context: &[(&str, &StoredRow)]) -> String {
    if let Some(literal) = unquote(operand) {
        return literal;
    }
    if let Some((prefix, column)) = operand.split_once('.') {
        let prefix = strip_ticks(prefix);
        for (name, row) in context {
            if *name == prefix {
                if let Some(value) = row.get(strip_ticks(column)) {
                    return value.clone();
                }
            }
        }
    }
    for (_, row) in context {
        if let Some(value) = row.get(operand) {
            return value.clone();
        }
    }
    operand.to_string()
}

fn parse_conditions(sql: &str, part: &str) -> StrataResult<Vec<Condition>> {
    let pieces = split_on_marker(part.trim(), " AND ");
    let mut conditions = Vec::new();
    let mut i = 0;
    while i < pieces.len() {
        let piece = pieces[i];
        if let Some(p) = find_outside_quotes(piece, " NOT BETWEEN ") {
            let upper = pieces.get(i + 1).copied().unwrap_or_default();
            conditions.push(Condition {
                left: piece[..p].trim().to_string(),
                op: "NOT BETWEEN",
                right: piece[p + 13..].trim().to_string(),
                upper: Some(upper.to_string()),
            });
            i += 2;
            continue;
        }
        if let Some(p) = find_outside_quotes(piece, " BETWEEN ") {
            let upper = pieces.get(i + 1).copied().unwrap_or_default();
            conditions.push(Condition {
                left: piece[..p].trim().to_string(),
                op: "BETWEEN",
                right: piece[p + 9..].trim().to_string(),
                upper: Some(upper.to_string()),
            });
            i += 2;
            continue;
        }

        let operators: [(&str, &'static str); 8] = [
            (" NOT LIKE ", "NOT LIKE"),
            (" LIKE ", "LIKE"),
            ("!=", "!="),
            (">=", ">="),
            ("<=", "<="),
            ("=", "="),
            (">", ">"),
            ("<", "<"),
        ];
        let mut parsed = None;
        for (pattern, op) in operators {
            if let Some(p) = find_outside_quotes(piece, pattern) {
                parsed = Some(Condition {
                    left: piece[..p].trim().to_string(),
                    op,
                    right: piece[p + pattern.len()..].trim().to_string(),
                    upper: None,
                });
                break;
            }
        }
        conditions.push(parsed.ok_or_else(|| {
            StrataError::execution(sql, format!("unsupported predicate '{piece}'"))
        })?);
        i += 1;
    }
    Ok(conditions)
}

/// Numeric-aware comparison falling back to string order.
fn compare_values(left: &str, right: &str) -> Ordering {
    match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(l), Ok(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
        _ => left.cmp(right),
    }
}

fn like_match(value: &str, pattern: &str) -> bool {
    let leading = pattern.starts_with('%');
    let trailing = pattern.len() > 1 && pattern.ends_with('%');
    let needle = pattern.trim_matches('%');
    match (leading, trailing) {
        (true, true) => value.contains(needle),
        (true, false) => value.ends_with(needle),
        (false, true) => value.starts_with(needle),
        (false, false) => value == pattern,
    }
}

// =============================================================================
// Projection
// =============================================================================

fn project_join(
    fields: &str,
    tables: &[String],
    first: &StoredRow,
    second: &StoredRow,
) -> StoredRow {
    if fields == "*" {
        let mut merged = first.clone();
        for (column, value) in second {
            merged.entry(column.clone()).or_insert_with(|| value.clone());
        }
        return merged;
    }
    if let Some(prefix) = fields.strip_suffix(".*") {
        let prefix = strip_ticks(prefix);
        for (name, row) in [(&tables[0], first), (&tables[1], second)] {
            if prefix == name.as_str() {
                return row.clone();
            }
        }
    }
    let context = [(tables[0].as_str(), first), (tables[1].as_str(), second)];
    let mut row = StoredRow::new();
    for field in split_top_level(fields, ',') {
        let (source, alias) = match find_outside_quotes(&field, " AS ") {
            Some(i) => (field[..i].trim().to_string(), field[i + 4..].trim().to_string()),
            None => (field.clone(), field.clone()),
        };
        row.insert(alias, resolve(&source, &context));
    }
    row
}

fn project_fields(sql: &str, fields: &[String], source: &StoredRow) -> StrataResult<StoredRow> {
    let mut row = StoredRow::new();
    for field in fields {
        let (column, alias) = match find_outside_quotes(field, " AS ") {
            Some(i) => (field[..i].trim(), field[i + 4..].trim()),
            None => (field.as_str(), field.as_str()),
        };
        let value = source.get(strip_ticks(column)).cloned().ok_or_else(|| {
            StrataError::execution(sql, format!("unknown column '{column}'"))
        })?;
        row.insert(alias.to_string(), value);
    }
    Ok(row)
}
