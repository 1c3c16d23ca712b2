//! In-memory tables and the fill-nulls-only upsert

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;

use super::markers::Markers;
use super::schema::{Category, TableKind, HAS_POLYLINE, START_TIME_LOCAL};
use crate::error::{GarminError, Result};
use crate::models::{parse_date, DateRange};

/// A non-null cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    /// Interpret a CSV cell; `None` for an empty cell.
    ///
    /// Numbers and booleans are only recognised in their canonical spelling so
    /// that writing a loaded cell back produces the same text.
    pub fn from_cell(cell: &str) -> Option<Self> {
        if cell.is_empty() {
            return None;
        }
        if let Ok(i) = cell.parse::<i64>() {
            if i.to_string() == cell {
                return Some(Value::Int(i));
            }
        }
        if let Ok(f) = cell.parse::<f64>() {
            if f.is_finite() && f.to_string() == cell {
                return Some(Value::Float(f));
            }
        }
        match cell {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => Some(Value::Text(cell.to_string())),
        }
    }

    /// Lenient boolean view; accepts `True`/`False` from older exports
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::Text(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Value::Text(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// Named values produced by a fetch; absent names are null
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet(BTreeMap<String, Value>);

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.0.insert(name.to_string(), value.into());
    }

    /// Set `name` when `value` is present; a `None` leaves the field null
    pub fn set_opt<V: Into<Value>>(&mut self, name: &str, value: Option<V>) {
        if let Some(v) = value {
            self.set(name, v);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy of the set restricted to `names`
    pub fn only(&self, names: &[&str]) -> FieldSet {
        FieldSet(
            self.0
                .iter()
                .filter(|(k, _)| names.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

/// Stable row identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKey {
    Activity(i64),
    Day(NaiveDate),
}

impl RecordKey {
    /// Parse the key cell of a row in a table of the given kind
    pub fn parse(kind: TableKind, cell: &str) -> Result<Self> {
        let cell = cell.trim();
        match kind {
            TableKind::Activities => cell
                .parse::<i64>()
                .map(RecordKey::Activity)
                .map_err(|_| GarminError::database(format!("Invalid activity id '{}'", cell))),
            TableKind::Days => parse_date(cell)
                .map(RecordKey::Day)
                .map_err(|_| GarminError::database(format!("Invalid date '{}'", cell))),
        }
    }

    pub fn kind(&self) -> TableKind {
        match self {
            RecordKey::Activity(_) => TableKind::Activities,
            RecordKey::Day(_) => TableKind::Days,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RecordKey::Activity(id) => Value::Int(*id),
            RecordKey::Day(date) => Value::Text(date.to_string()),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Activity(id) => write!(f, "{}", id),
            RecordKey::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

/// Non-null values of one row, the key column excluded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: BTreeMap<String, Value>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn is_null(&self, column: &str) -> bool {
        !self.values.contains_key(column)
    }

    pub(crate) fn set(&mut self, column: &str, value: Value) {
        self.values.insert(column.to_string(), value);
    }
}

/// Whether a row still needs a category fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    /// Every completeness field is populated
    Present,
    /// The service confirmed it has no data; fields stay null
    Unavailable,
    Missing,
}

impl FetchState {
    /// Present or unavailable: nothing left to fetch
    pub fn is_settled(&self) -> bool {
        !matches!(self, FetchState::Missing)
    }
}

/// What an upsert changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertReport {
    pub created: bool,
    /// Null fields that received a value
    pub filled: usize,
}

/// One exported table, rows ordered by key
#[derive(Debug, Clone)]
pub struct Table {
    kind: TableKind,
    rows: BTreeMap<RecordKey, Row>,
    extra_columns: Vec<String>,
}

impl Table {
    /// Empty table with the canonical schema
    pub fn new(kind: TableKind) -> Self {
        Self {
            kind,
            rows: BTreeMap::new(),
            extra_columns: Vec::new(),
        }
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn lookup(&self, key: &RecordKey) -> Option<&Row> {
        self.rows.get(key)
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.rows.contains_key(key)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&RecordKey, &Row)> {
        self.rows.iter()
    }

    /// Columns outside the canonical schema, in file order
    pub fn extra_columns(&self) -> &[String] {
        &self.extra_columns
    }

    pub(crate) fn add_extra_column(&mut self, column: &str) {
        if !self.kind.is_known(column) && !self.extra_columns.iter().any(|c| c == column) {
            self.extra_columns.push(column.to_string());
        }
    }

    /// Header written on save
    pub fn columns(&self) -> Vec<String> {
        self.kind
            .columns()
            .into_iter()
            .map(str::to_string)
            .chain(self.extra_columns.iter().cloned())
            .collect()
    }

    fn check_kind(&self, key: &RecordKey) -> Result<()> {
        if key.kind() != self.kind {
            return Err(GarminError::invalid_param(format!(
                "Key {} does not belong to the {} table",
                key, self.kind
            )));
        }
        Ok(())
    }

    /// Create a row from listing fields. An existing row is left untouched
    /// since core fields never change after creation. Returns whether a row
    /// was created.
    pub fn insert_core(&mut self, key: RecordKey, fields: &FieldSet) -> Result<bool> {
        self.check_kind(&key)?;
        if self.rows.contains_key(&key) {
            return Ok(false);
        }
        let key_column = self.kind.key_column();
        let mut row = Row::default();
        for (name, value) in fields.iter().filter(|(n, _)| *n != key_column) {
            row.set(name, value.clone());
        }
        self.rows.insert(key, row);
        Ok(true)
    }

    /// Merge `fields` into the row for `key`, creating it if absent.
    ///
    /// Only null cells are written: a populated value is never replaced and
    /// core columns of an existing row are never touched.
    pub fn upsert(&mut self, key: RecordKey, fields: &FieldSet) -> Result<UpsertReport> {
        self.check_kind(&key)?;
        let kind = self.kind;
        let key_column = kind.key_column();

        let created = !self.rows.contains_key(&key);
        let row = self.rows.entry(key).or_default();
        let mut filled = 0;
        for (name, value) in fields.iter() {
            if name == key_column || (!created && kind.is_core(name)) {
                continue;
            }
            if row.is_null(name) {
                row.set(name, value.clone());
                filled += 1;
            }
        }
        Ok(UpsertReport { created, filled })
    }

    /// Date a row belongs to: the key for days, the local start date for activities
    pub fn record_date(&self, key: &RecordKey) -> Option<NaiveDate> {
        match key {
            RecordKey::Day(date) => Some(*date),
            RecordKey::Activity(_) => self
                .rows
                .get(key)
                .and_then(|row| row.get(START_TIME_LOCAL))
                .map(|v| v.to_string())
                .and_then(|s| s.get(..10).and_then(|d| parse_date(d).ok())),
        }
    }

    /// Keys whose record date lies in `range`, ascending
    pub fn keys_in(&self, range: &DateRange) -> Vec<RecordKey> {
        self.rows
            .keys()
            .filter(|key| self.record_date(key).is_some_and(|d| range.contains(d)))
            .cloned()
            .collect()
    }

    /// Categories that apply to a row; tracks only exist for activities with GPS
    pub fn categories_for(&self, key: &RecordKey) -> Vec<Category> {
        let row = self.rows.get(key);
        self.kind
            .categories()
            .iter()
            .copied()
            .filter(|category| match category {
                Category::Track => row
                    .and_then(|r| r.get(HAS_POLYLINE))
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                _ => true,
            })
            .collect()
    }

    /// Derived state of one category, a function of the row and the markers
    pub fn fetch_state(&self, key: &RecordKey, category: Category, markers: &Markers) -> FetchState {
        let complete = self.rows.get(key).is_some_and(|row| {
            category
                .completeness()
                .is_met(|field| !row.is_null(field))
        });

        if complete {
            FetchState::Present
        } else if markers.contains(key, category) {
            FetchState::Unavailable
        } else {
            FetchState::Missing
        }
    }
}
