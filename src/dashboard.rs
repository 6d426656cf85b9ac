//! One dashboard render pass.
//!
//! Load (memoized) → dispatch every slot → cooldown-gated backend clear.

use crate::config::DashboardConfig;
use crate::dataset::Dataset;
use crate::dispatch::{self, SlotResult};
use crate::error::{CacheClearError, DataLoadError};
use crate::layout::{self, HtmlSurface};
use crate::loader::DatasetLoader;
use crate::registry::Registry;
use crate::scheduler::{self, BackendCache, ClearOutcome, Clock, SchedulerState, SystemClock};
use chrono::TimeDelta;
use std::sync::Arc;

pub const DEFAULT_TITLE: &str = "Data Exploration Dashboard";

/// Everything one render produced
///
/// `cache` carries the scheduler step's own result; a failed clear does not
/// take the slots down with it.
#[derive(Debug)]
pub struct RenderedDashboard {
    pub dataset: Arc<Dataset>,
    pub slots: Vec<SlotResult>,
    pub cache: Result<ClearOutcome, CacheClearError>,
}

pub struct Dashboard {
    loader: DatasetLoader,
    registry: Registry,
    scheduler: SchedulerState,
    backend: Arc<dyn BackendCache>,
    clock: Arc<dyn Clock>,
    preview_rows: usize,
}

impl Dashboard {
    pub fn new(
        loader: DatasetLoader,
        registry: Registry,
        scheduler: SchedulerState,
        backend: Arc<dyn BackendCache>,
    ) -> Self {
        Dashboard {
            loader,
            registry,
            scheduler,
            backend,
            clock: Arc::new(SystemClock),
            preview_rows: 5,
        }
    }

    /// Standard dashboard wired from deployment settings
    pub fn from_config(config: &DashboardConfig, backend: Arc<dyn BackendCache>) -> Self {
        Dashboard::new(
            DatasetLoader::new(config.data_path.clone(), config.invalidation),
            Registry::standard_sized(config.chart_width, config.chart_height),
            SchedulerState::new(
                TimeDelta::try_hours(config.clear_cooldown_hours).unwrap_or(TimeDelta::max_value()),
            ),
            backend,
        )
        .with_preview_rows(config.preview_rows)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_preview_rows(mut self, rows: usize) -> Self {
        self.preview_rows = rows;
        self
    }

    pub fn loader(&self) -> &DatasetLoader {
        &self.loader
    }

    pub fn scheduler(&self) -> &SchedulerState {
        &self.scheduler
    }

    pub fn preview_rows(&self) -> usize {
        self.preview_rows
    }

    /// Runs one full dashboard load.
    ///
    /// A due backend clear that fails is reported in `RenderedDashboard::cache`;
    /// the scheduler keeps its previous state so the next render retries.
    ///
    /// # Errors
    /// Returns `DataLoadError` when the dataset cannot be loaded; no slot is
    /// evaluated and the backend is not touched.
    pub fn render(&self) -> Result<RenderedDashboard, DataLoadError> {
        let dataset = self.loader.load()?;
        let slots: Vec<SlotResult> = dispatch::dispatch(&dataset, &self.registry).collect();
        let cache =
            scheduler::maybe_clear_cache(&self.scheduler, self.backend.as_ref(), self.clock.now());

        Ok(RenderedDashboard {
            dataset,
            slots,
            cache,
        })
    }

    /// Renders the dashboard page, or an error notice page when the dataset cannot be loaded
    pub fn render_html(&self) -> String {
        let mut surface = HtmlSurface::new(DEFAULT_TITLE);
        match self.render() {
            Ok(rendered) => {
                surface.overview(
                    &rendered.dataset.head(self.preview_rows),
                    rendered.dataset.row_count(),
                );
                layout::place_slots(&mut surface, &rendered.slots);
                if let Err(err) = &rendered.cache {
                    surface.notice("The sheet view cache could not be cleared", &err.to_string());
                }
            }
            Err(err) => {
                surface.notice("The dataset could not be loaded", &err.to_string());
            }
        }
        surface.finish()
    }

    /// Evaluates a single slot without running the scheduler
    pub fn render_slot(&self, id: &str) -> Result<Option<SlotResult>, DataLoadError> {
        let Some((position, spec)) = self.registry.slots().find(|(_, spec)| spec.id == id) else {
            return Ok(None);
        };
        let dataset = self.loader.load()?;
        Ok(Some(dispatch::evaluate(&dataset, position, spec)))
    }
}
