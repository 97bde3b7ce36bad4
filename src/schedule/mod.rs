pub mod arrows;
pub mod axis;
pub mod graph;
pub mod layout;
pub mod viewport;

pub use layout::{build_layout, GanttLayout, GanttMetrics, LayoutRequest, Placement};
