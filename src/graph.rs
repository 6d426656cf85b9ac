use crate::dataset::{Column, ColumnKind, Dataset};
use crate::error::RenderError;
use crate::stats::{self, Bin};
use plotters::prelude::*;
use serde::Serialize;
use std::error::Error;
use std::f64::consts::{FRAC_PI_2, TAU};
use std::fmt;
use std::ops::Range;

/// Chart types the dashboard can draw
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    /// Share of each category as a pie, starting at twelve o'clock
    Pie,

    /// Binned distribution of a numeric column, with a density curve;
    /// text columns fall back to one bar per category
    Histogram,

    /// Quartiles of a numeric column, one box per category of another column
    Boxplot,

    /// One point per row for two numeric columns
    Scatter,

    /// Pearson correlation between every pair of numeric columns
    CorrelationHeatmap,

    /// Count of each category as vertical bars
    Bar,
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChartKind::Pie => "pie",
            ChartKind::Histogram => "histogram",
            ChartKind::Boxplot => "boxplot",
            ChartKind::Scatter => "scatter",
            ChartKind::CorrelationHeatmap => "correlation heatmap",
            ChartKind::Bar => "bar",
        };
        f.write_str(name)
    }
}

/// Which columns a chart reads
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnSpec {
    Single(String),
    Pair { x: String, y: String },
    AllNumeric,
}

impl ColumnSpec {
    pub fn single(name: impl Into<String>) -> Self {
        ColumnSpec::Single(name.into())
    }

    pub fn pair(x: impl Into<String>, y: impl Into<String>) -> Self {
        ColumnSpec::Pair {
            x: x.into(),
            y: y.into(),
        }
    }

    /// Column names referenced explicitly
    pub fn names(&self) -> Vec<String> {
        match self {
            ColumnSpec::Single(name) => vec![name.clone()],
            ColumnSpec::Pair { x, y } => vec![x.clone(), y.clone()],
            ColumnSpec::AllNumeric => Vec::new(),
        }
    }
}

impl fmt::Display for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSpec::Single(name) => write!(f, "column '{}'", name),
            ColumnSpec::Pair { x, y } => write!(f, "columns '{}' and '{}'", x, y),
            ColumnSpec::AllNumeric => f.write_str("all numeric columns"),
        }
    }
}

/// Configuration options for chart generation
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Title displayed at the top of the chart
    pub title: String,

    /// Label for the X-axis
    pub x_label: String,

    /// Label for the Y-axis
    pub y_label: String,

    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,

    /// Number of histogram bins
    pub bins: usize,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            title: "Chart".to_string(),
            x_label: String::new(),
            y_label: String::new(),
            width: 640,
            height: 480,
            bins: 20,
        }
    }
}

impl GraphOptions {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn labels(mut self, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        self.x_label = x_label.into();
        self.y_label = y_label.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// A finished chart as a standalone SVG document
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartHandle {
    pub kind: ChartKind,
    pub title: String,
    pub svg: String,
}

/// Draws one chart from the dataset
///
/// This is the entry point the visualization registry renders through. Data
/// is prepared first, so a chart that cannot be built never leaves a partial
/// drawing behind; plotters failures surface as `RenderError::Draw`.
///
/// # Arguments
/// * `kind` - Chart type to draw
/// * `dataset` - Loaded dataset to read columns from
/// * `columns` - Which columns feed the chart
/// * `options` - Title, axis labels and size
///
/// # Examples
/// ```
/// use dashboard::dataset::{Dataset, Value};
/// use dashboard::graph::{ChartKind, ColumnSpec, GraphOptions, render_chart};
///
/// let ds = Dataset::from_columns(vec![("alo", vec![Value::Text("A".into())])]);
/// let options = GraphOptions::titled("Allocation");
/// let chart = render_chart(ChartKind::Bar, &ds, &ColumnSpec::single("alo"), &options);
/// assert!(chart.unwrap().svg.contains("<svg"));
/// ```
pub fn render_chart(
    kind: ChartKind,
    dataset: &Dataset,
    columns: &ColumnSpec,
    options: &GraphOptions,
) -> Result<ChartHandle, RenderError> {
    let drawn = match (kind, columns) {
        (ChartKind::Pie, ColumnSpec::Single(name)) => {
            let counts = category_counts(dataset, name)?;
            create_pie_chart(&counts, options)
        }
        (ChartKind::Bar, ColumnSpec::Single(name)) => {
            let counts = category_counts(dataset, name)?;
            create_bar_chart(&counts, options)
        }
        (ChartKind::Histogram, ColumnSpec::Single(name)) => {
            let column = column(dataset, name)?;
            if column.kind == ColumnKind::Numeric {
                let values: Vec<f64> = column.numbers().collect();
                let bins = stats::histogram(&values, options.bins.max(1));
                create_histogram(&values, &bins, options)
            } else {
                let counts = category_counts(dataset, name)?;
                create_bar_chart(&counts, options)
            }
        }
        (ChartKind::Boxplot, ColumnSpec::Pair { x, y }) => {
            let groups = grouped_numbers(dataset, x, y)?;
            create_boxplot(&groups, options)
        }
        (ChartKind::Scatter, ColumnSpec::Pair { x, y }) => {
            let points = numeric_pairs(dataset, x, y)?;
            create_scatter_plot(&points, options)
        }
        (ChartKind::CorrelationHeatmap, ColumnSpec::AllNumeric) => {
            let matrix = stats::correlation_matrix(dataset);
            if matrix.names.is_empty() {
                return Err(RenderError::NoData {
                    chart: kind.to_string(),
                });
            }
            create_heatmap(&matrix, options)
        }
        (kind, columns) => {
            return Err(RenderError::ColumnSpecMismatch {
                chart: kind.to_string(),
                columns: columns.to_string(),
            });
        }
    };

    let svg = drawn.map_err(|e| RenderError::Draw {
        reason: e.to_string(),
    })?;

    Ok(ChartHandle {
        kind,
        title: options.title.clone(),
        svg,
    })
}

fn column<'a>(dataset: &'a Dataset, name: &str) -> Result<&'a Column, RenderError> {
    dataset.column(name).ok_or_else(|| RenderError::UnknownColumn {
        column: name.to_string(),
    })
}

fn category_counts(dataset: &Dataset, name: &str) -> Result<Vec<(String, usize)>, RenderError> {
    let counts = stats::value_counts(column(dataset, name)?);
    if counts.is_empty() {
        return Err(RenderError::NoData {
            chart: format!("column '{}'", name),
        });
    }
    Ok(counts)
}

// Numeric `y` values grouped by the label of `x`, groups in first-seen order
fn grouped_numbers(
    dataset: &Dataset,
    x: &str,
    y: &str,
) -> Result<Vec<(String, Vec<f64>)>, RenderError> {
    let xs = column(dataset, x)?;
    let ys = column(dataset, y)?;

    let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
    for (xv, yv) in xs.values.iter().zip(&ys.values) {
        let Some(n) = yv.as_number() else { continue };
        if xv.is_missing() {
            continue;
        }
        let label = xv.to_string();
        match groups.iter_mut().find(|(l, _)| *l == label) {
            Some((_, values)) => values.push(n),
            None => groups.push((label, vec![n])),
        }
    }

    if groups.is_empty() {
        return Err(RenderError::NotNumeric {
            column: y.to_string(),
        });
    }
    Ok(groups)
}

fn numeric_pairs(dataset: &Dataset, x: &str, y: &str) -> Result<Vec<(f64, f64)>, RenderError> {
    let xs = column(dataset, x)?;
    let ys = column(dataset, y)?;

    let points: Vec<(f64, f64)> = xs
        .values
        .iter()
        .zip(&ys.values)
        .filter_map(|(a, b)| Some((a.as_number()?, b.as_number()?)))
        .collect();

    if points.is_empty() {
        return Err(RenderError::NoData {
            chart: format!("columns '{}' and '{}'", x, y),
        });
    }
    Ok(points)
}

// Axis range with a little headroom; never zero-width or infinite
fn padded(lo: f64, hi: f64) -> Range<f64> {
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    if lo == hi {
        return lo - 1.0..hi + 1.0;
    }
    let pad = (hi - lo) * 0.05;
    lo - pad..hi + pad
}

// Category name for a tick placed on an integer slot position
fn slot_label(names: &[String], value: f64) -> String {
    let rounded = value.round();
    if (value - rounded).abs() > 1e-6 || rounded < 0.0 {
        return String::new();
    }
    names.get(rounded as usize).cloned().unwrap_or_default()
}

/// Creates a pie chart of category shares
///
/// Wedges run counter-clockwise from twelve o'clock, each labelled with its
/// category and percentage. A single category draws as a full disc.
fn create_pie_chart(
    counts: &[(String, usize)],
    options: &GraphOptions,
) -> Result<String, Box<dyn Error>> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;
        let area = root.titled(&options.title, ("sans-serif", 24).into_font())?;

        let (w, h) = area.dim_in_pixel();
        let center = (w as i32 / 2, h as i32 / 2);
        let radius = (w.min(h) as f64 / 2.0 - 40.0).max(10.0);
        let total: usize = counts.iter().map(|(_, c)| c).sum();
        let at = |angle: f64, r: f64| {
            (
                center.0 + (r * angle.cos()).round() as i32,
                center.1 - (r * angle.sin()).round() as i32,
            )
        };

        let mut angle = FRAC_PI_2;
        for (i, (label, count)) in counts.iter().enumerate() {
            let fraction = *count as f64 / total as f64;
            let sweep = fraction * TAU;
            let steps = (fraction * 120.0).ceil().max(2.0) as usize;

            let mut wedge = Vec::with_capacity(steps + 2);
            wedge.push(center);
            for s in 0..=steps {
                wedge.push(at(angle + sweep * s as f64 / steps as f64, radius));
            }
            area.draw(&Polygon::new(wedge, Palette99::pick(i).filled()))?;

            let mid = angle + sweep / 2.0;
            area.draw(&Text::new(
                format!("{:.1}%", fraction * 100.0),
                at(mid, radius * 0.6),
                ("sans-serif", 14).into_font(),
            ))?;
            area.draw(&Text::new(
                label.clone(),
                at(mid, radius * 1.08),
                ("sans-serif", 14).into_font(),
            ))?;

            angle += sweep;
        }

        root.present()?;
    }
    Ok(svg)
}

/// Creates a bar chart with one bar per category
fn create_bar_chart(
    counts: &[(String, usize)],
    options: &GraphOptions,
) -> Result<String, Box<dyn Error>> {
    let names: Vec<String> = counts.iter().map(|(n, _)| n.clone()).collect();
    let max_count = counts.iter().map(|(_, c)| *c).max().unwrap_or(1) as f64;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 24).into_font())
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(-0.5..names.len() as f64 - 0.5, 0.0..max_count * 1.1)?;

        let label_fmt = |v: &f64| slot_label(&names, *v);
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(names.len().max(2))
            .x_label_formatter(&label_fmt)
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()?;

        chart.draw_series(counts.iter().enumerate().map(|(i, (_, c))| {
            let x = i as f64;
            Rectangle::new([(x - 0.4, 0.0), (x + 0.4, *c as f64)], Palette99::pick(i).filled())
        }))?;

        root.present()?;
    }
    Ok(svg)
}

/// Creates a histogram with a Gaussian density curve scaled to counts
fn create_histogram(
    values: &[f64],
    bins: &[Bin],
    options: &GraphOptions,
) -> Result<String, Box<dyn Error>> {
    let (Some(first), Some(last)) = (bins.first(), bins.last()) else {
        return Err("no values to bin".into());
    };
    let x_range = first.start..last.end;
    let bin_width = first.end - first.start;
    let max_count = bins.iter().map(|b| b.count).max().unwrap_or(1) as f64;
    let density = density_curve(values, x_range.clone(), bin_width);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;

        let y_top = density
            .iter()
            .map(|(_, y)| *y)
            .fold(max_count, f64::max)
            * 1.1;

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 24).into_font())
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(x_range, 0.0..y_top)?;

        chart
            .configure_mesh()
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()?;

        chart.draw_series(bins.iter().map(|b| {
            Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], BLUE.mix(0.5).filled())
        }))?;

        if !density.is_empty() {
            chart.draw_series(LineSeries::new(density, BLUE.stroke_width(2)))?;
        }

        root.present()?;
    }
    Ok(svg)
}

// Gaussian kernel density with Scott's bandwidth, in count units.
// Constant or single-value input has no spread and yields no curve.
fn density_curve(values: &[f64], range: Range<f64>, bin_width: f64) -> Vec<(f64, f64)> {
    let n = values.len() as f64;
    if values.len() < 2 {
        return Vec::new();
    }
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let sd = var.sqrt();
    if sd == 0.0 || !sd.is_finite() {
        return Vec::new();
    }

    let h = 1.06 * sd * n.powf(-0.2);
    let norm = 1.0 / (h * TAU.sqrt());
    let scale = n * bin_width;
    let steps = 100;

    (0..=steps)
        .map(|i| {
            let x = range.start + (range.end - range.start) * i as f64 / steps as f64;
            let d: f64 = values
                .iter()
                .map(|v| norm * (-0.5 * ((x - v) / h).powi(2)).exp())
                .sum::<f64>()
                / n;
            (x, d * scale)
        })
        .collect()
}

/// Creates a box-and-whisker plot, one box per category
fn create_boxplot(
    groups: &[(String, Vec<f64>)],
    options: &GraphOptions,
) -> Result<String, Box<dyn Error>> {
    let names: Vec<String> = groups.iter().map(|(n, _)| n.clone()).collect();
    let summaries: Vec<stats::BoxStats> = groups
        .iter()
        .filter_map(|(_, values)| stats::box_stats(values))
        .collect();
    let all: Vec<f64> = groups.iter().flat_map(|(_, v)| v.iter().copied()).collect();
    let (lo, hi) = stats::min_max(&all);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 24).into_font())
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(-0.5..names.len() as f64 - 0.5, padded(lo, hi))?;

        let label_fmt = |v: &f64| slot_label(&names, *v);
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(names.len().max(2))
            .x_label_formatter(&label_fmt)
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()?;

        for (i, s) in summaries.iter().enumerate() {
            let x = i as f64;
            chart.draw_series(std::iter::once(Rectangle::new(
                [(x - 0.3, s.q1), (x + 0.3, s.q3)],
                Palette99::pick(i).mix(0.7).filled(),
            )))?;
            chart.draw_series(std::iter::once(Rectangle::new(
                [(x - 0.3, s.q1), (x + 0.3, s.q3)],
                BLACK.stroke_width(1),
            )))?;
            chart.draw_series(vec![
                PathElement::new(
                    vec![(x - 0.3, s.median), (x + 0.3, s.median)],
                    BLACK.stroke_width(2),
                ),
                PathElement::new(vec![(x, s.q3), (x, s.upper_whisker)], BLACK.stroke_width(1)),
                PathElement::new(vec![(x, s.q1), (x, s.lower_whisker)], BLACK.stroke_width(1)),
                PathElement::new(
                    vec![(x - 0.15, s.upper_whisker), (x + 0.15, s.upper_whisker)],
                    BLACK.stroke_width(1),
                ),
                PathElement::new(
                    vec![(x - 0.15, s.lower_whisker), (x + 0.15, s.lower_whisker)],
                    BLACK.stroke_width(1),
                ),
            ])?;
            chart.draw_series(
                s.outliers
                    .iter()
                    .map(|&v| Circle::new((x, v), 3, BLACK.stroke_width(1))),
            )?;
        }

        root.present()?;
    }
    Ok(svg)
}

/// Creates a scatter plot of numeric (x, y) pairs
fn create_scatter_plot(
    points: &[(f64, f64)],
    options: &GraphOptions,
) -> Result<String, Box<dyn Error>> {
    let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
    let (min_x, max_x) = stats::min_max(&xs);
    let (min_y, max_y) = stats::min_max(&ys);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 24).into_font())
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(padded(min_x, max_x), padded(min_y, max_y))?;

        chart
            .configure_mesh()
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()?;

        chart.draw_series(
            points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 4, BLUE.mix(0.7).filled())),
        )?;

        root.present()?;
    }
    Ok(svg)
}

// White at zero, red towards +1, blue towards -1, grey when undefined
fn correlation_color(r: Option<f64>) -> RGBColor {
    match r {
        None => RGBColor(200, 200, 200),
        Some(r) => {
            let t = r.abs().min(1.0);
            let fade = (255.0 * (1.0 - t)).round() as u8;
            if r >= 0.0 {
                RGBColor(255, fade, fade)
            } else {
                RGBColor(fade, fade, 255)
            }
        }
    }
}

/// Creates an annotated correlation heatmap
///
/// Rows run top to bottom in column order. Undefined coefficients (constant
/// columns, too few complete rows) are drawn grey and labelled "nan".
fn create_heatmap(
    matrix: &stats::CorrelationMatrix,
    options: &GraphOptions,
) -> Result<String, Box<dyn Error>> {
    let n = matrix.names.len();
    let reversed: Vec<String> = matrix.names.iter().rev().cloned().collect();

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 24).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(80)
            .build_cartesian_2d(-0.5..n as f64 - 0.5, -0.5..n as f64 - 0.5)?;

        let x_fmt = |v: &f64| slot_label(&matrix.names, *v);
        let y_fmt = |v: &f64| slot_label(&reversed, *v);
        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(n.max(2))
            .y_labels(n.max(2))
            .x_label_formatter(&x_fmt)
            .y_label_formatter(&y_fmt)
            .draw()?;

        for (row, coefficients) in matrix.values.iter().enumerate() {
            let y = (n - 1 - row) as f64;
            for (col, r) in coefficients.iter().enumerate() {
                let x = col as f64;
                chart.draw_series(std::iter::once(Rectangle::new(
                    [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
                    correlation_color(*r).filled(),
                )))?;
                let text = match r {
                    Some(r) => format!("{:.2}", r),
                    None => "nan".to_string(),
                };
                chart.draw_series(std::iter::once(Text::new(
                    text,
                    (x - 0.15, y + 0.05),
                    ("sans-serif", 14).into_font(),
                )))?;
            }
        }

        root.present()?;
    }
    Ok(svg)
}
