use chrono::NaiveDate;
use serde::Serialize;

use crate::model::common::days_between;
use crate::model::{Task, TaskStatus};
use crate::schedule::arrows::{route_connectors, Connector, UnresolvedDependency};
use crate::schedule::axis::{DayAxis, MonthSpan};
use crate::schedule::graph::TaskGraph;
use crate::schedule::viewport::initial_scroll_left;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GanttMetrics {
    pub column_width: f64,
    pub row_height: f64,
    /// Length of the horizontal stub leaving a predecessor.
    pub stub: f64,
    /// Distance below the predecessor row used by backward connectors.
    pub backward_drop: f64,
    /// Per-arrow shift applied when connectors share a target column.
    pub collision_step: f64,
}

impl Default for GanttMetrics {
    fn default() -> Self {
        Self::new(30.0, 40.0)
    }
}

impl GanttMetrics {
    pub fn new(column_width: f64, row_height: f64) -> Self {
        Self {
            column_width,
            row_height,
            stub: column_width / 3.0,
            backward_drop: row_height / 2.0,
            collision_step: 4.0,
        }
    }
}

/// Grid columns are `[offset, offset + width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
    Bar { offset: usize, width: usize },
    Dot { column: usize },
    Unscheduled,
}

impl Placement {
    /// A start after the due date is drawn over the same days, reversed.
    /// A lone start date renders as a marker just like a lone due date.
    pub fn for_task(task: &Task, axis: &DayAxis) -> Self {
        let column = |date: NaiveDate| days_between(axis.start, date).max(0) as usize;

        match (task.start_date, task.due_date) {
            (Some(start), Some(due)) => {
                let (first, last) = if start <= due { (start, due) } else { (due, start) };
                Self::Bar {
                    offset: column(first),
                    width: days_between(first, last) as usize + 1,
                }
            }
            (None, Some(due)) => Self::Dot { column: column(due) },
            (Some(start), None) => Self::Dot {
                column: column(start),
            },
            (None, None) => Self::Unscheduled,
        }
    }

    pub fn is_placed(&self) -> bool {
        !matches!(self, Self::Unscheduled)
    }

    /// Anchor positions in half-column units so equal anchors compare exactly.
    pub(crate) fn exit_anchor(&self) -> Option<i64> {
        match *self {
            Self::Bar { offset, width } => Some(2 * (offset + width) as i64),
            Self::Dot { column } => Some(2 * column as i64 + 1),
            Self::Unscheduled => None,
        }
    }

    pub(crate) fn entry_anchor(&self) -> Option<i64> {
        match *self {
            Self::Bar { offset, .. } => Some(2 * offset as i64),
            Self::Dot { column } => Some(2 * column as i64 + 1),
            Self::Unscheduled => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRow {
    pub row: usize,
    pub task_id: String,
    pub title: String,
    pub status: TaskStatus,
    pub placement: Placement,
}

#[derive(Debug, Clone, Copy)]
pub struct LayoutRequest {
    pub window_start: Option<NaiveDate>,
    pub window_end: Option<NaiveDate>,
    pub today: NaiveDate,
    pub viewport_width: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GanttLayout {
    pub axis: DayAxis,
    pub columns: usize,
    pub today_column: usize,
    pub months: Vec<MonthSpan>,
    pub metrics: GanttMetrics,
    pub rows: Vec<TaskRow>,
    /// Rows with no date, listed but not drawn on the grid.
    pub unscheduled: Vec<String>,
    pub connectors: Vec<Connector>,
    pub unresolved: Vec<UnresolvedDependency>,
    pub cycles: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_scroll_left: Option<f64>,
}

/// Every task gets a row (the list view shows unscheduled tasks too); only
/// dated tasks are placed on the grid. The axis also stretches to cover every
/// task date so offsets are never negative.
pub fn build_layout(tasks: &[Task], request: LayoutRequest, metrics: GanttMetrics) -> GanttLayout {
    let task_dates = tasks
        .iter()
        .flat_map(|task| [task.start_date, task.due_date])
        .flatten();
    let earliest = task_dates.clone().min();
    let latest = task_dates.max();

    let window_start = [request.window_start, earliest]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(request.today);
    let window_end = [request.window_end, latest]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(request.today);

    let axis = DayAxis::around(window_start, window_end, request.today);
    let today_column = axis.column_of(request.today).unwrap_or(0);

    let rows: Vec<TaskRow> = tasks
        .iter()
        .enumerate()
        .map(|(row, task)| TaskRow {
            row,
            task_id: task.id.clone(),
            title: task.title.clone(),
            status: task.status,
            placement: Placement::for_task(task, &axis),
        })
        .collect();

    let unscheduled = rows
        .iter()
        .filter(|row| !row.placement.is_placed())
        .map(|row| row.task_id.clone())
        .collect();

    let graph = TaskGraph::new(tasks);
    let cycles = graph.cycles();
    if !cycles.is_empty() {
        tracing::warn!(cycle_count = cycles.len(), "task dependencies contain cycles");
    }

    let (connectors, unresolved) = route_connectors(tasks, &rows, &graph, &metrics);

    GanttLayout {
        columns: axis.column_count(),
        months: axis.month_headers(),
        initial_scroll_left: request
            .viewport_width
            .map(|width| initial_scroll_left(today_column, axis.column_count(), width, &metrics)),
        axis,
        today_column,
        metrics,
        rows,
        unscheduled,
        connectors,
        unresolved,
        cycles,
    }
}

#[cfg(test)]
mod tests {
    use crate::model::TaskDraft;

    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn task(id: &str, start: Option<NaiveDate>, due: Option<NaiveDate>) -> Task {
        Task::from_draft(
            TaskDraft {
                id: Some(id.to_string()),
                title: id.to_string(),
                start_date: start,
                due_date: due,
                ..TaskDraft::default()
            },
            "p",
        )
    }

    fn axis() -> DayAxis {
        DayAxis {
            start: date(2024, 1, 1),
            end: date(2024, 12, 31),
        }
    }

    #[test]
    fn bar_spans_start_through_due_inclusive() {
        let placement = Placement::for_task(
            &task("a", Some(date(2024, 1, 5)), Some(date(2024, 1, 7))),
            &axis(),
        );
        assert_eq!(placement, Placement::Bar { offset: 4, width: 3 });
    }

    #[test]
    fn due_only_task_renders_as_dot() {
        let placement = Placement::for_task(&task("a", None, Some(date(2024, 1, 10))), &axis());
        assert_eq!(placement, Placement::Dot { column: 9 });
    }

    #[test]
    fn undated_task_is_not_placed() {
        let placement = Placement::for_task(&task("a", None, None), &axis());
        assert_eq!(placement, Placement::Unscheduled);
        assert!(!placement.is_placed());
    }

    #[test]
    fn inverted_range_covers_the_same_days() {
        let placement = Placement::for_task(
            &task("a", Some(date(2024, 1, 7)), Some(date(2024, 1, 5))),
            &axis(),
        );
        assert_eq!(placement, Placement::Bar { offset: 4, width: 3 });
    }

    #[test]
    fn layout_widens_window_and_keeps_every_row() {
        let today = date(2024, 6, 15);
        let tasks = vec![
            task("early", Some(date(2020, 1, 1)), Some(date(2020, 1, 3))),
            task("undated", None, None),
        ];
        let layout = build_layout(
            &tasks,
            LayoutRequest {
                window_start: Some(date(2024, 6, 1)),
                window_end: Some(date(2024, 6, 30)),
                today,
                viewport_width: None,
            },
            GanttMetrics::default(),
        );

        assert_eq!(layout.axis.start, date(2020, 1, 1));
        assert_eq!(layout.axis.end, date(2025, 6, 15));
        assert_eq!(layout.rows.len(), 2);
        assert_eq!(layout.rows[0].placement, Placement::Bar { offset: 0, width: 3 });
        assert_eq!(layout.rows[1].placement, Placement::Unscheduled);
        assert_eq!(layout.unscheduled, vec!["undated".to_string()]);
        assert_eq!(layout.axis.days().nth(layout.today_column), Some(today));
        assert!(layout.initial_scroll_left.is_none());
    }

    #[test]
    fn layout_reports_cycles_but_still_routes() {
        let mut a = task("a", Some(date(2024, 1, 1)), Some(date(2024, 1, 2)));
        let mut b = task("b", Some(date(2024, 1, 3)), Some(date(2024, 1, 4)));
        a.dependencies = vec!["b".to_string()];
        b.dependencies = vec!["a".to_string()];

        let layout = build_layout(
            &[a, b],
            LayoutRequest {
                window_start: None,
                window_end: None,
                today: date(2024, 1, 1),
                viewport_width: Some(600.0),
            },
            GanttMetrics::default(),
        );

        assert_eq!(layout.cycles, vec![vec!["a".to_string(), "b".to_string()]]);
        assert_eq!(layout.connectors.len(), 2);
        assert!(layout.initial_scroll_left.is_some());
    }
}
