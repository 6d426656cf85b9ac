//! Declared dashboard slots.
//!
//! The registry is fixed when the dashboard is built and does not depend on
//! the loaded dataset: every render evaluates the same slots, and a slot whose
//! columns are absent reports its fallback message instead of a chart.

use crate::dataset::{Dataset, Schema};
use crate::error::{RegistryError, RenderError};
use crate::graph::{self, ChartHandle, ChartKind, ColumnSpec, GraphOptions};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

pub type RenderFn = Arc<dyn Fn(&Dataset) -> Result<ChartHandle, RenderError> + Send + Sync>;

/// Most slots a single layout row may hold
pub const MAX_ROW_WIDTH: usize = 3;

/// Precondition a slot checks against the schema before rendering
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    /// Every named column must be present
    Columns(Vec<String>),

    /// At least `min` numeric columns must be present
    NumericColumns { min: usize },
}

/// Outcome of checking a requirement
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Availability {
    Satisfied,
    Missing(Vec<String>),
}

impl Requirement {
    pub fn columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Requirement::Columns(names.into_iter().map(Into::into).collect())
    }

    pub fn evaluate(&self, schema: &Schema) -> Availability {
        match self {
            Requirement::Columns(names) => {
                let missing = schema.missing(names);
                if missing.is_empty() {
                    Availability::Satisfied
                } else {
                    Availability::Missing(missing.into_iter().map(str::to_string).collect())
                }
            }
            Requirement::NumericColumns { min } => {
                if schema.numeric_count() >= *min {
                    Availability::Satisfied
                } else {
                    Availability::Missing(Vec::new())
                }
            }
        }
    }
}

/// One dashboard slot: what it needs, how it draws, what it says otherwise
#[derive(Clone)]
pub struct VisualizationSpec {
    pub id: String,
    pub heading: String,
    pub requirement: Requirement,
    pub fallback_message: String,
    render: RenderFn,
}

impl VisualizationSpec {
    /// A slot drawn by the built-in chart renderer.
    ///
    /// Named columns in `columns` become the requirement; `AllNumeric` requires
    /// at least one numeric column.
    pub fn chart(
        id: impl Into<String>,
        kind: ChartKind,
        columns: ColumnSpec,
        options: GraphOptions,
        fallback_message: impl Into<String>,
    ) -> Self {
        let requirement = match &columns {
            ColumnSpec::AllNumeric => Requirement::NumericColumns { min: 1 },
            named => Requirement::Columns(named.names()),
        };
        let heading = options.title.clone();
        let render: RenderFn = Arc::new(move |dataset: &Dataset| {
            graph::render_chart(kind, dataset, &columns, &options)
        });

        VisualizationSpec {
            id: id.into(),
            heading,
            requirement,
            fallback_message: fallback_message.into(),
            render,
        }
    }

    /// A slot with a caller-supplied renderer
    pub fn custom<F>(
        id: impl Into<String>,
        heading: impl Into<String>,
        requirement: Requirement,
        fallback_message: impl Into<String>,
        render: F,
    ) -> Self
    where
        F: Fn(&Dataset) -> Result<ChartHandle, RenderError> + Send + Sync + 'static,
    {
        VisualizationSpec {
            id: id.into(),
            heading: heading.into(),
            requirement,
            fallback_message: fallback_message.into(),
            render: Arc::new(render),
        }
    }

    pub fn render(&self, dataset: &Dataset) -> Result<ChartHandle, RenderError> {
        (self.render)(dataset)
    }
}

impl fmt::Debug for VisualizationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisualizationSpec")
            .field("id", &self.id)
            .field("heading", &self.heading)
            .field("requirement", &self.requirement)
            .field("fallback_message", &self.fallback_message)
            .finish_non_exhaustive()
    }
}

/// Where a slot sits in the dashboard grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct SlotPosition {
    pub row: usize,
    pub column: usize,
    pub row_width: usize,
}

/// Ordered dashboard slots, grouped into rows of one to three
#[derive(Clone, Debug)]
pub struct Registry {
    rows: Vec<Vec<VisualizationSpec>>,
}

impl Registry {
    pub fn new(rows: Vec<Vec<VisualizationSpec>>) -> Result<Self, RegistryError> {
        let mut ids = HashSet::new();
        for (r, row) in rows.iter().enumerate() {
            if row.is_empty() || row.len() > MAX_ROW_WIDTH {
                return Err(RegistryError::RowWidth {
                    row: r,
                    len: row.len(),
                });
            }
            for spec in row {
                if !ids.insert(spec.id.as_str()) {
                    return Err(RegistryError::DuplicateId {
                        id: spec.id.clone(),
                    });
                }
                if matches!(&spec.requirement, Requirement::Columns(names) if names.is_empty()) {
                    return Err(RegistryError::NoRequiredColumns {
                        id: spec.id.clone(),
                    });
                }
            }
        }
        Ok(Registry { rows })
    }

    /// The standard exploration dashboard
    ///
    /// Allocation pie and age histogram, BMI boxplot and height/weight
    /// scatter, allocation bar and correlation heatmap.
    pub fn standard() -> Self {
        Self::standard_sized(GraphOptions::default().width, GraphOptions::default().height)
    }

    /// The standard dashboard with charts drawn at the given pixel size
    pub fn standard_sized(width: u32, height: u32) -> Self {
        let opts = |title: &str, x: &str, y: &str| {
            GraphOptions::titled(title).labels(x, y).size(width, height)
        };

        let rows = vec![
            vec![
                VisualizationSpec::chart(
                    "allocation_pie",
                    ChartKind::Pie,
                    ColumnSpec::single("alo"),
                    opts("Pie Chart of Allocation", "", ""),
                    "Column 'alo' not found in the dataset.",
                ),
                VisualizationSpec::chart(
                    "age_histogram",
                    ChartKind::Histogram,
                    ColumnSpec::single("agegrp"),
                    opts("Age Distribution", "agegrp", "Frequency"),
                    "age not found in the dataset.",
                ),
            ],
            vec![
                VisualizationSpec::chart(
                    "bmi_boxplot",
                    ChartKind::Boxplot,
                    ColumnSpec::pair("alo", "bmi2"),
                    opts("Boxplot of BMI by Allocation Category", "alo", "bmi2"),
                    "Required columns not found in the dataset.",
                ),
                VisualizationSpec::chart(
                    "height_weight_scatter",
                    ChartKind::Scatter,
                    ColumnSpec::pair("height", "weight"),
                    opts("Scatter Plot of Height and Weight", "height", "weight"),
                    "Required columns not found in the dataset.",
                ),
            ],
            vec![
                VisualizationSpec::chart(
                    "allocation_bar",
                    ChartKind::Bar,
                    ColumnSpec::single("alo"),
                    opts("Distribution of Allocation", "alo Categories", "Count"),
                    "Allocation not found in the dataset.",
                ),
                VisualizationSpec::chart(
                    "correlation_heatmap",
                    ChartKind::CorrelationHeatmap,
                    ColumnSpec::AllNumeric,
                    opts("Correlation Heatmap", "", ""),
                    "No numeric columns found in the dataset.",
                ),
            ],
        ];

        // Static declaration above always satisfies the row and id rules
        Registry { rows }
    }

    pub fn rows(&self) -> &[Vec<VisualizationSpec>] {
        &self.rows
    }

    /// All slots in registry order with their grid positions
    pub fn slots(&self) -> impl Iterator<Item = (SlotPosition, &VisualizationSpec)> + Clone + '_ {
        self.rows.iter().enumerate().flat_map(|(r, row)| {
            let width = row.len();
            row.iter().enumerate().map(move |(c, spec)| {
                (
                    SlotPosition {
                        row: r,
                        column: c,
                        row_width: width,
                    },
                    spec,
                )
            })
        })
    }

    pub fn len(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
