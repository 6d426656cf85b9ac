use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A single cell of the loaded table
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Any numeric cell; integers from the sheet are widened to f64
    Number(f64),

    /// Text, booleans, dates and anything else that is not a plain number
    Text(String),

    /// Blank or error cell
    Missing,
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{:.0}", n),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::Missing => Ok(()),
        }
    }
}

/// Inferred type of a column
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Every present cell is a number, and at least one cell is present
    Numeric,

    /// At least one present cell is text
    Categorical,

    /// No present cells at all
    Empty,
}

impl ColumnKind {
    fn infer(values: &[Value]) -> Self {
        let mut seen_number = false;
        for value in values {
            match value {
                Value::Text(_) => return ColumnKind::Categorical,
                Value::Number(_) => seen_number = true,
                Value::Missing => {}
            }
        }
        if seen_number {
            ColumnKind::Numeric
        } else {
            ColumnKind::Empty
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Categorical => "categorical",
            ColumnKind::Empty => "empty",
        };
        f.write_str(name)
    }
}

/// Name and type of one column
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub kind: ColumnKind,
}

/// Ordered set of column descriptors
///
/// Column lookups are exact and case-sensitive.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    columns: Vec<ColumnDescriptor>,
    index: HashMap<String, usize>,
}

impl Schema {
    fn new(columns: Vec<ColumnDescriptor>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        Schema { columns, index }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    /// Names from `required` that the schema does not have, in the order given
    pub fn missing<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|name| !self.contains(name))
            .map(String::as_str)
            .collect()
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Numeric)
    }

    pub fn numeric_count(&self) -> usize {
        self.numeric_columns().count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<Value>,
}

impl Column {
    /// Finite numeric cells, skipping text and blanks
    pub fn numbers(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().filter_map(Value::as_number)
    }

    /// Display labels of all present cells, used for categorical counts
    pub fn labels(&self) -> impl Iterator<Item = String> + '_ {
        self.values
            .iter()
            .filter(|v| !v.is_missing())
            .map(|v| v.to_string())
    }
}

/// First rows of the table, for the overview panel
#[derive(Clone, Debug, Serialize)]
pub struct Preview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Immutable in-memory table loaded from the source file
#[derive(Clone, Debug)]
pub struct Dataset {
    schema: Schema,
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    /// Builds a dataset from a header row and data rows.
    ///
    /// Short rows are padded with `Missing`; cells beyond the header width are
    /// dropped. Blank header names become `Unnamed: {index}` and repeated names
    /// get `.1`, `.2`, ... suffixes so every column stays addressable.
    pub fn new(header: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let names = normalize_header(header);
        let width = names.len();
        let mut values: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); width];

        for row in &rows {
            for (c, column) in values.iter_mut().enumerate() {
                column.push(row.get(c).cloned().unwrap_or(Value::Missing));
            }
        }

        let columns: Vec<Column> = names
            .into_iter()
            .zip(values)
            .map(|(name, values)| Column {
                kind: ColumnKind::infer(&values),
                name,
                values,
            })
            .collect();

        Self::assemble(columns, rows.len())
    }

    /// Builds a dataset column by column. Shorter columns are padded.
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<Value>)>) -> Self {
        let rows = columns.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
        let (names, values): (Vec<String>, Vec<Vec<Value>>) = columns
            .into_iter()
            .map(|(name, mut values)| {
                values.resize(rows, Value::Missing);
                (name.into(), values)
            })
            .unzip();

        let columns = normalize_header(names)
            .into_iter()
            .zip(values)
            .map(|(name, values)| Column {
                kind: ColumnKind::infer(&values),
                name,
                values,
            })
            .collect();

        Self::assemble(columns, rows)
    }

    fn assemble(columns: Vec<Column>, rows: usize) -> Self {
        let schema = Schema::new(
            columns
                .iter()
                .map(|c| ColumnDescriptor {
                    name: c.name.clone(),
                    kind: c.kind,
                })
                .collect(),
        );
        Dataset {
            schema,
            columns,
            rows,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.schema.index.get(name).map(|&i| &self.columns[i])
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// The first `n` rows, all columns
    pub fn head(&self, n: usize) -> Preview {
        let take = n.min(self.rows);
        Preview {
            columns: self.columns.iter().map(|c| c.name.clone()).collect(),
            rows: (0..take)
                .map(|r| self.columns.iter().map(|c| c.values[r].clone()).collect())
                .collect(),
        }
    }
}

fn normalize_header(header: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::with_capacity(header.len());

    for (i, raw) in header.into_iter().enumerate() {
        let base = if raw.trim().is_empty() {
            format!("Unnamed: {}", i)
        } else {
            raw
        };

        let mut name = base.clone();
        while seen.contains(&name) {
            let n = counts.entry(base.clone()).or_insert(0);
            *n += 1;
            name = format!("{}.{}", base, n);
        }
        seen.insert(name.clone());
        names.push(name);
    }

    names
}
