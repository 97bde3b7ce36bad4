use std::collections::HashMap;

use crate::model::{Company, Project, User};

pub trait Entity: Clone {
    const KIND: &'static str;

    fn id(&self) -> &str;
}

impl Entity for Project {
    const KIND: &'static str = "project";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for User {
    const KIND: &'static str = "user";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Company {
    const KIND: &'static str = "company";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Insertion-ordered entities with an id index for O(1) lookups.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Entity> Collection<T> {
    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&position| &self.items[position])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.index
            .get(id)
            .copied()
            .map(move |position| &mut self.items[position])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Replaces an entity with the same id in place, otherwise appends.
    pub fn upsert(&mut self, item: T) {
        match self.index.get(item.id()) {
            Some(&position) => self.items[position] = item,
            None => {
                self.index.insert(item.id().to_string(), self.items.len());
                self.items.push(item);
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        let position = self.index.remove(id)?;
        let removed = self.items.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.clone()
    }
}
