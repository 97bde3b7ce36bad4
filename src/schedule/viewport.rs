//! Scroll positioning for the Gantt panes. `ScrollSync` runs on the client
//! side of the API and is kept here with the layout it belongs to.
#![cfg_attr(not(test), allow(dead_code))]

use serde::{Deserialize, Serialize};

use crate::schedule::layout::GanttMetrics;

/// Horizontal scroll offset that centers today's column in the viewport,
/// clamped to the scrollable range.
pub fn initial_scroll_left(
    today_column: usize,
    columns: usize,
    viewport_width: f64,
    metrics: &GanttMetrics,
) -> f64 {
    let content_width = columns as f64 * metrics.column_width;
    let max_scroll = (content_width - viewport_width).max(0.0);
    let today_center = (today_column as f64 + 0.5) * metrics.column_width;

    (today_center - viewport_width / 2.0).clamp(0.0, max_scroll)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pane {
    TaskList,
    Grid,
}

impl Pane {
    pub fn other(self) -> Self {
        match self {
            Self::TaskList => Self::Grid,
            Self::Grid => Self::TaskList,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScrollCommand {
    pub pane: Pane,
    pub top: f64,
}

/// Keeps the task list and the grid body scrolled to the same vertical
/// offset. Applying a command makes the other pane emit its own scroll
/// event; that echo is swallowed once instead of being mirrored back.
#[derive(Debug, Default)]
pub struct ScrollSync {
    echo_expected: Option<ScrollCommand>,
}

impl ScrollSync {
    pub fn on_scroll(&mut self, source: Pane, top: f64) -> Option<ScrollCommand> {
        if let Some(expected) = self.echo_expected.take() {
            if expected.pane == source && (expected.top - top).abs() < 0.5 {
                return None;
            }
        }

        let command = ScrollCommand {
            pane: source.other(),
            top,
        };
        self.echo_expected = Some(command);
        Some(command)
    }
}
