/*!
# Data Exploration Dashboard

A dashboard over a single spreadsheet dataset: a preview of the first rows and
a fixed set of statistical charts, each shown only when the columns it needs
exist in the loaded file.

## Overview

The dashboard reads one spreadsheet (xlsx, xls, xlsb, ods or csv) from a
deployer-configured path, keeps the parsed table in memory until the file
changes, and on every page load evaluates a registry of chart slots against the
table's columns. Slots whose columns are absent show a short message instead of
a chart; a slot whose chart fails to draw shows the error and leaves every
other slot alone.

Alongside the charts, the dashboard hosts a sheet view whose per-session
backend state is dropped at most once every twelve hours.

## Architecture

### Render pass
- **Dataset Loader** - memoized load keyed by modification time, content hash,
  or nothing at all
- **Visualization Registry** - ordered chart slots in rows of one to three
- **Dispatch Loop** - requirement check, then render or fallback, per slot
- **Cache-Invalidation Scheduler** - cooldown-gated clear of the sheet backend

### Collaborators
- **Import** - calamine for workbooks, a small reader for csv
- **Charts** - plotters, drawn to in-memory SVG
- **Layout** - a wide HTML page with one grid row per registry row
- **Host** - axum server (`web` feature) or a one-shot HTML report

## Standard Charts

- Pie chart and bar chart of the allocation column (`alo`)
- Histogram of the age group column (`agegrp`)
- Boxplot of BMI (`bmi2`) by allocation
- Scatter plot of `height` against `weight`
- Correlation heatmap over all numeric columns

## Modules

- **dataset**: typed table, schema and preview
- **loader**: csv/workbook import and the memoizing loader
- **stats**: value counts, histogram bins, quartiles, correlation
- **graph**: chart drawing
- **registry**: slot declarations
- **dispatch**: per-slot render-or-report
- **scheduler**: cooldown-gated backend cache clearing
- **editor**: sheet view backend state
- **layout**: HTML surface
- **dashboard**: one render pass
- **config**: environment configuration
- **app**: HTTP routes (`web` feature)

## HTTP Endpoints

- `/` - Dashboard page
- `/api/slots` - Slot outcomes as JSON
- `/api/preview` - First rows as JSON
- `/api/sheet` - Sheet view grid for the caller's session
- `/api/config` - Active configuration
- `/chart/{id}` - One chart as SVG
- `/api/reload` (POST) - Drop the dataset memo
*/

pub mod config;
pub mod dashboard;
pub mod dataset;
pub mod dispatch;
pub mod editor;
pub mod error;
pub mod graph;
pub mod layout;
pub mod loader;
pub mod registry;
pub mod scheduler;
pub mod stats;

#[cfg(feature = "web")]
pub mod app;

/// Re-export the types most callers need
pub use config::DashboardConfig;
pub use dashboard::{Dashboard, RenderedDashboard};
pub use dataset::{ColumnKind, Dataset, Schema, Value};
pub use dispatch::{SlotOutcome, SlotResult, dispatch};
pub use error::{CacheClearError, DataLoadError, RenderError};
pub use loader::{DatasetLoader, InvalidationPolicy};
pub use registry::{Registry, Requirement, VisualizationSpec};
pub use scheduler::{BackendCache, ClearOutcome, Clock, SchedulerState, maybe_clear_cache};
