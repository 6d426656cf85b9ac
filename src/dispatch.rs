use crate::dataset::Dataset;
use crate::error::RenderError;
use crate::graph::ChartHandle;
use crate::registry::{Availability, Registry, SlotPosition, VisualizationSpec};
use log::{debug, warn};
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// What a slot produced on one render pass
#[derive(Clone, Debug, PartialEq)]
pub enum SlotOutcome {
    /// Requirement held and the chart was drawn
    Chart(ChartHandle),

    /// Requirement did not hold; carries the slot's fallback message
    MissingColumns {
        missing: Vec<String>,
        message: String,
    },

    /// Requirement held but drawing failed
    RenderFailed(RenderError),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SlotResult {
    pub spec_id: String,
    pub heading: String,
    pub position: SlotPosition,
    pub outcome: SlotOutcome,
}

impl SlotResult {
    pub fn chart(&self) -> Option<&ChartHandle> {
        match &self.outcome {
            SlotOutcome::Chart(chart) => Some(chart),
            _ => None,
        }
    }

    /// Text shown in place of a chart, if any
    pub fn message(&self) -> Option<String> {
        match &self.outcome {
            SlotOutcome::Chart(_) => None,
            SlotOutcome::MissingColumns { message, .. } => Some(message.clone()),
            SlotOutcome::RenderFailed(err) => Some(format!("Could not draw this chart: {}", err)),
        }
    }

    pub fn summary(&self) -> SlotSummary {
        let status = match &self.outcome {
            SlotOutcome::Chart(_) => SlotStatus::Chart,
            SlotOutcome::MissingColumns { .. } => SlotStatus::MissingColumns,
            SlotOutcome::RenderFailed(_) => SlotStatus::RenderError,
        };
        let missing = match &self.outcome {
            SlotOutcome::MissingColumns { missing, .. } => missing.clone(),
            _ => Vec::new(),
        };
        SlotSummary {
            id: self.spec_id.clone(),
            heading: self.heading.clone(),
            position: self.position,
            status,
            message: self.message(),
            missing,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Chart,
    MissingColumns,
    RenderError,
}

/// Serializable view of a slot result without the chart body
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SlotSummary {
    pub id: String,
    pub heading: String,
    pub position: SlotPosition,
    pub status: SlotStatus,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

/// Lazy pass over the registry against one dataset
///
/// Yields one `SlotResult` per slot in registry order. Nothing is evaluated
/// until the iterator is advanced; cloning or calling [`dispatch`] again
/// starts a fresh pass.
#[derive(Clone)]
pub struct Dispatch<'a, I> {
    dataset: &'a Dataset,
    slots: I,
}

/// Evaluates every registry slot against `dataset`
pub fn dispatch<'a>(
    dataset: &'a Dataset,
    registry: &'a Registry,
) -> Dispatch<'a, impl Iterator<Item = (SlotPosition, &'a VisualizationSpec)> + Clone + 'a> {
    Dispatch {
        dataset,
        slots: registry.slots(),
    }
}

impl<'a, I> Iterator for Dispatch<'a, I>
where
    I: Iterator<Item = (SlotPosition, &'a VisualizationSpec)>,
{
    type Item = SlotResult;

    fn next(&mut self) -> Option<SlotResult> {
        let (position, spec) = self.slots.next()?;
        Some(evaluate(self.dataset, position, spec))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.slots.size_hint()
    }
}

/// Checks one slot's requirement and renders or reports
pub fn evaluate(dataset: &Dataset, position: SlotPosition, spec: &VisualizationSpec) -> SlotResult {
    let outcome = match spec.requirement.evaluate(dataset.schema()) {
        Availability::Missing(missing) => {
            debug!("slot {} skipped, missing columns {:?}", spec.id, missing);
            SlotOutcome::MissingColumns {
                missing,
                message: spec.fallback_message.clone(),
            }
        }
        Availability::Satisfied => match render_isolated(spec, dataset) {
            Ok(chart) => SlotOutcome::Chart(chart),
            Err(err) => {
                warn!("slot {} failed to render: {}", spec.id, err);
                SlotOutcome::RenderFailed(err)
            }
        },
    };

    SlotResult {
        spec_id: spec.id.clone(),
        heading: spec.heading.clone(),
        position,
        outcome,
    }
}

// A panicking renderer must not take the rest of the dashboard down with it
fn render_isolated(
    spec: &VisualizationSpec,
    dataset: &Dataset,
) -> Result<ChartHandle, RenderError> {
    panic::catch_unwind(AssertUnwindSafe(|| spec.render(dataset))).unwrap_or_else(|payload| {
        Err(RenderError::Panicked {
            reason: panic_reason(payload.as_ref()),
        })
    })
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
