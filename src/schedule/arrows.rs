use std::collections::HashMap;

use serde::Serialize;

use crate::model::Task;
use crate::schedule::graph::TaskGraph;
use crate::schedule::layout::{GanttMetrics, TaskRow};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connector {
    pub from_task: String,
    pub to_task: String,
    pub direction: Direction,
    /// Position among connectors converging on the same target column.
    pub lane: usize,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    UnknownTask,
    SelfReference,
    Unscheduled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedDependency {
    pub from_task: String,
    pub to_task: String,
    pub reason: UnresolvedReason,
}

/// One connector per (predecessor, dependent) pair, discovered in row order
/// and then dependency-list order. Routing only looks at the two endpoints,
/// so cyclic dependency sets need no special handling.
pub fn route_connectors(
    tasks: &[Task],
    rows: &[TaskRow],
    graph: &TaskGraph<'_>,
    metrics: &GanttMetrics,
) -> (Vec<Connector>, Vec<UnresolvedDependency>) {
    let mut connectors = Vec::new();
    let mut unresolved = Vec::new();
    let mut lanes_by_target: HashMap<i64, usize> = HashMap::new();

    for (dependent_row, dependent) in rows.iter().zip(tasks) {
        for dependency in &dependent.dependencies {
            let unresolved_as = |reason| UnresolvedDependency {
                from_task: dependency.clone(),
                to_task: dependent.id.clone(),
                reason,
            };

            if dependency == &dependent.id {
                unresolved.push(unresolved_as(UnresolvedReason::SelfReference));
                continue;
            }

            let Some(predecessor_row) = graph.position(dependency).map(|position| &rows[position])
            else {
                unresolved.push(unresolved_as(UnresolvedReason::UnknownTask));
                continue;
            };

            let (Some(exit), Some(entry)) = (
                predecessor_row.placement.exit_anchor(),
                dependent_row.placement.entry_anchor(),
            ) else {
                unresolved.push(unresolved_as(UnresolvedReason::Unscheduled));
                continue;
            };

            let lane = lanes_by_target.entry(entry).or_insert(0);
            let current_lane = *lane;
            *lane += 1;

            let from = anchor_point(exit, predecessor_row.row, metrics);
            let to = anchor_point(entry, dependent_row.row, metrics);
            let (direction, points) = if entry >= exit {
                (Direction::Forward, forward_route(from, to, current_lane, metrics))
            } else {
                (Direction::Backward, backward_route(from, to, current_lane, metrics))
            };

            connectors.push(Connector {
                from_task: predecessor_row.task_id.clone(),
                to_task: dependent_row.task_id.clone(),
                direction,
                lane: current_lane,
                points,
            });
        }
    }

    (connectors, unresolved)
}

fn anchor_point(half_columns: i64, row: usize, metrics: &GanttMetrics) -> Point {
    Point {
        x: half_columns as f64 * metrics.column_width / 2.0,
        y: (row as f64 + 0.5) * metrics.row_height,
    }
}

/// Stub out of the predecessor, across to a midpoint, down (or up) to the
/// dependent's row, then into the dependent.
fn forward_route(from: Point, to: Point, lane: usize, metrics: &GanttMetrics) -> Vec<Point> {
    let stub_x = from.x + metrics.stub.min((to.x - from.x) / 2.0);
    let mid_x = stub_x.max(from.x + (to.x - from.x) / 2.0) + lane as f64 * metrics.collision_step;

    dedup_points(vec![
        from,
        Point { x: stub_x, y: from.y },
        Point { x: mid_x, y: from.y },
        Point { x: mid_x, y: to.y },
        to,
    ])
}

/// Drops below the predecessor row, runs back past the dependent's start and
/// enters it from the left.
fn backward_route(from: Point, to: Point, lane: usize, metrics: &GanttMetrics) -> Vec<Point> {
    let shift = lane as f64 * metrics.collision_step;
    let out_x = from.x + metrics.stub;
    let lane_y = from.y + metrics.backward_drop + shift;
    let approach_x = to.x - metrics.stub - shift;

    dedup_points(vec![
        from,
        Point { x: out_x, y: from.y },
        Point { x: out_x, y: lane_y },
        Point { x: approach_x, y: lane_y },
        Point { x: approach_x, y: to.y },
        to,
    ])
}

fn dedup_points(mut points: Vec<Point>) -> Vec<Point> {
    points.dedup_by(|next, previous| {
        (next.x - previous.x).abs() < f64::EPSILON && (next.y - previous.y).abs() < f64::EPSILON
    });
    points
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::model::TaskDraft;
    use crate::schedule::layout::{build_layout, LayoutRequest};

    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).expect("valid date")
    }

    fn task(id: &str, start: Option<u32>, due: Option<u32>, dependencies: &[&str]) -> Task {
        Task::from_draft(
            TaskDraft {
                id: Some(id.to_string()),
                title: id.to_string(),
                start_date: start.map(date),
                due_date: due.map(date),
                dependencies: dependencies.iter().map(|id| id.to_string()).collect(),
                ..TaskDraft::default()
            },
            "p",
        )
    }

    fn connectors(tasks: &[Task]) -> (Vec<Connector>, Vec<UnresolvedDependency>) {
        let layout = build_layout(
            tasks,
            LayoutRequest {
                window_start: None,
                window_end: None,
                today: date(1),
                viewport_width: None,
            },
            GanttMetrics::default(),
        );
        (layout.connectors, layout.unresolved)
    }

    #[test]
    fn one_connector_per_dependency_and_none_once_removed() {
        let a = task("a", Some(2), Some(4), &[]);
        let mut b = task("b", Some(6), Some(8), &["a"]);

        let (routed, unresolved) = connectors(&[a.clone(), b.clone()]);
        assert_eq!(routed.len(), 1);
        assert!(unresolved.is_empty());
        assert_eq!(routed[0].from_task, "a");
        assert_eq!(routed[0].to_task, "b");
        assert_eq!(routed[0].direction, Direction::Forward);

        let metrics = GanttMetrics::default();
        let points = &routed[0].points;
        let first = points.first().expect("route has a start");
        let last = points.last().expect("route has an end");
        assert_eq!(first.y, metrics.row_height / 2.0);
        assert_eq!(last.y, metrics.row_height * 1.5);
        assert!(last.x > first.x);
        for pair in points.windows(2) {
            assert!(
                pair[0].x == pair[1].x || pair[0].y == pair[1].y,
                "elbow segments must be axis aligned"
            );
        }

        b.dependencies.clear();
        let (routed, _) = connectors(&[a, b]);
        assert!(routed.is_empty());
    }

    #[test]
    fn predecessor_after_dependent_routes_backward() {
        let a = task("a", Some(10), Some(12), &[]);
        let b = task("b", Some(3), Some(5), &["a"]);

        let (routed, _) = connectors(&[a, b]);
        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].direction, Direction::Backward);

        let metrics = GanttMetrics::default();
        let points = &routed[0].points;
        let lane_y = metrics.row_height / 2.0 + metrics.backward_drop;
        assert!(points.iter().any(|point| point.y == lane_y));
        let target = points.last().expect("route has an end");
        assert!(points[points.len() - 2].x < target.x);
    }

    #[test]
    fn converging_connectors_get_distinct_lanes() {
        let a = task("a", Some(2), Some(3), &[]);
        let c = task("c", Some(8), Some(9), &["a"]);
        let d = task("d", Some(8), Some(12), &["a"]);

        let (routed, _) = connectors(&[a, c, d]);
        assert_eq!(routed.len(), 2);
        assert_eq!(routed[0].lane, 0);
        assert_eq!(routed[1].lane, 1);

        let vertical_x = |connector: &Connector| connector.points[connector.points.len() - 2].x;
        assert_ne!(vertical_x(&routed[0]), vertical_x(&routed[1]));
    }

    #[test]
    fn dot_anchors_use_the_due_column_center() {
        let a = task("a", None, Some(2), &[]);
        let b = task("b", None, Some(5), &["a"]);

        let (routed, _) = connectors(&[a, b]);
        let metrics = GanttMetrics::default();
        let axis_offset = routed[0].points[0].x - 1.5 * metrics.column_width;
        let end = routed[0].points.last().expect("route has an end");
        assert_eq!(end.x - axis_offset, 4.5 * metrics.column_width);
    }

    #[test]
    fn unresolvable_dependencies_are_reported() {
        let a = task("a", None, None, &[]);
        let b = task("b", Some(2), Some(3), &["a", "ghost", "b"]);

        let (routed, unresolved) = connectors(&[a, b]);
        assert!(routed.is_empty());
        let reasons: Vec<UnresolvedReason> = unresolved.iter().map(|item| item.reason).collect();
        assert_eq!(
            reasons,
            vec![
                UnresolvedReason::Unscheduled,
                UnresolvedReason::UnknownTask,
                UnresolvedReason::SelfReference,
            ]
        );
    }
}
