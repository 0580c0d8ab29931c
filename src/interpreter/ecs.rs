//! Entity/component store
//!
//! Entities are plain integer ids handed out in increasing order starting at
//! 1. They are never reclaimed. Operations on an id that has no component
//! table behave as if the table were empty.

use std::collections::HashMap;

use super::types::Val;

#[derive(Debug)]
pub struct EntityStore {
    next_id: u64,
    components: HashMap<u64, HashMap<String, Val>>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self {
            next_id: 1,
            components: HashMap::new(),
        }
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_entity(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.components.insert(id, HashMap::new());
        id
    }

    /// Creates the entity's table if it has none yet
    pub fn set_component(&mut self, id: u64, name: &str, value: Val) {
        self.components
            .entry(id)
            .or_default()
            .insert(name.to_string(), value);
    }

    /// `Null` when the component is absent
    pub fn get_component(&self, id: u64, name: &str) -> Val {
        self.components
            .get(&id)
            .and_then(|table| table.get(name))
            .cloned()
            .unwrap_or(Val::Null)
    }

    pub fn has_component(&self, id: u64, name: &str) -> bool {
        self.components
            .get(&id)
            .is_some_and(|table| table.contains_key(name))
    }

    pub fn delete_component(&mut self, id: u64, name: &str) {
        if let Some(table) = self.components.get_mut(&id) {
            table.remove(name);
        }
    }
}
