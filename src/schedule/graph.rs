//! Dependency queries over one project's tasks.
//!
//! Dependency sets are never checked for acyclicity when written, so every
//! traversal here must terminate on cyclic input. Auto-scheduling (shifting
//! dependents after their predecessors) is not supported.

use std::collections::HashMap;

use crate::model::Task;

#[derive(Debug)]
pub struct TaskGraph<'a> {
    index: HashMap<&'a str, usize>,
    tasks: &'a [Task],
    successors: Vec<Vec<usize>>,
}

impl<'a> TaskGraph<'a> {
    pub fn new(tasks: &'a [Task]) -> Self {
        let index: HashMap<&str, usize> = tasks
            .iter()
            .enumerate()
            .map(|(position, task)| (task.id.as_str(), position))
            .collect();

        let mut successors = vec![Vec::new(); tasks.len()];
        for (dependent, task) in tasks.iter().enumerate() {
            for dependency in &task.dependencies {
                if let Some(&predecessor) = index.get(dependency.as_str()) {
                    successors[predecessor].push(dependent);
                }
            }
        }

        Self {
            index,
            tasks,
            successors,
        }
    }

    pub fn position(&self, task_id: &str) -> Option<usize> {
        self.index.get(task_id).copied()
    }

    pub fn predecessors(&self, task_id: &str) -> Vec<&'a Task> {
        let Some(&position) = self.index.get(task_id) else {
            return Vec::new();
        };

        self.tasks[position]
            .dependencies
            .iter()
            .filter_map(|id| self.index.get(id.as_str()))
            .map(|&predecessor| &self.tasks[predecessor])
            .collect()
    }

    pub fn successors(&self, task_id: &str) -> Vec<&'a Task> {
        let Some(&position) = self.index.get(task_id) else {
            return Vec::new();
        };

        self.successors[position]
            .iter()
            .map(|&dependent| &self.tasks[dependent])
            .collect()
    }

    /// Strongly connected components with more than one task, plus tasks
    /// that depend on themselves. Each cycle lists task ids in input order.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut search = CycleSearch::new(self.tasks.len());
        for node in 0..self.tasks.len() {
            if search.order[node].is_none() {
                search.visit(node, &self.successors);
            }
        }

        let mut cycles: Vec<Vec<String>> = search
            .components
            .into_iter()
            .filter(|component| {
                component.len() > 1 || self.successors[component[0]].contains(&component[0])
            })
            .map(|mut component| {
                component.sort_unstable();
                component
                    .into_iter()
                    .map(|node| self.tasks[node].id.clone())
                    .collect()
            })
            .collect();

        cycles.sort();
        cycles
    }
}

/// Iterative Tarjan so deep dependency chains cannot overflow the stack.
struct CycleSearch {
    next_order: usize,
    order: Vec<Option<usize>>,
    low: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    components: Vec<Vec<usize>>,
}

impl CycleSearch {
    fn new(size: usize) -> Self {
        Self {
            next_order: 0,
            order: vec![None; size],
            low: vec![0; size],
            on_stack: vec![false; size],
            stack: Vec::new(),
            components: Vec::new(),
        }
    }

    fn enter(&mut self, node: usize) {
        self.order[node] = Some(self.next_order);
        self.low[node] = self.next_order;
        self.next_order += 1;
        self.stack.push(node);
        self.on_stack[node] = true;
    }

    fn visit(&mut self, root: usize, successors: &[Vec<usize>]) {
        let mut frames: Vec<(usize, usize)> = vec![(root, 0)];
        self.enter(root);

        while let Some(frame) = frames.last_mut() {
            let (node, cursor) = *frame;

            if let Some(&next) = successors[node].get(cursor) {
                frame.1 += 1;
                match self.order[next] {
                    None => {
                        self.enter(next);
                        frames.push((next, 0));
                    }
                    Some(next_order) if self.on_stack[next] => {
                        self.low[node] = self.low[node].min(next_order);
                    }
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                self.low[parent] = self.low[parent].min(self.low[node]);
            }

            if Some(self.low[node]) == self.order[node] {
                let mut component = Vec::new();
                while let Some(member) = self.stack.pop() {
                    self.on_stack[member] = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                self.components.push(component);
            }
        }
    }
}
