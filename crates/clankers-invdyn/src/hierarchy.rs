//! Priority levels of name references into the registry.

/// What a hierarchy entry stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryRole {
    /// A registered task, emitted through its objective.
    Task,
    /// Motion constraint of a contact.
    ContactMotion,
    /// Friction pyramid and normal force bounds of a contact.
    ContactForceBounds,
    /// Force regularization cost of a contact.
    ContactForceRegularization,
}

/// One slot in a priority level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelEntry {
    pub name: String,
    pub role: EntryRole,
}

/// Ordered priority levels. Level 0 holds hard constraints; higher levels
/// hold weighted objectives in decreasing priority.
///
/// Entries keep their insertion order within a level so the emitted row
/// layout is identical from one cycle to the next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hierarchy {
    levels: Vec<Vec<LevelEntry>>,
}

impl Default for Hierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl Hierarchy {
    /// Hierarchy with an empty level 0.
    pub fn new() -> Self {
        Self {
            levels: vec![Vec::new()],
        }
    }

    /// Append `name` with `role` at `level`, creating levels as needed.
    pub fn insert(&mut self, level: usize, name: &str, role: EntryRole) {
        if self.levels.len() <= level {
            self.levels.resize_with(level + 1, Vec::new);
        }
        self.levels[level].push(LevelEntry {
            name: name.to_string(),
            role,
        });
    }

    /// Remove every entry referring to `name`. Returns the number removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let mut removed = 0;
        for level in &mut self.levels {
            let before = level.len();
            level.retain(|entry| entry.name != name);
            removed += before - level.len();
        }
        self.trim();
        removed
    }

    /// Level holding `(name, role)`, if present.
    pub fn level_of(&self, name: &str, role: EntryRole) -> Option<usize> {
        self.levels
            .iter()
            .position(|entries| entries.iter().any(|e| e.name == name && e.role == role))
    }

    /// Levels up to the highest non-empty one (level 0 always included).
    pub fn levels(&self) -> &[Vec<LevelEntry>] {
        &self.levels
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    // Drop empty trailing levels, keeping level 0.
    fn trim(&mut self) {
        while self.levels.len() > 1 && self.levels.last().is_some_and(Vec::is_empty) {
            self.levels.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_hierarchy_has_level_zero() {
        let h = Hierarchy::new();
        assert_eq!(h.level_count(), 1);
        assert!(h.levels()[0].is_empty());
    }

    #[test]
    fn insert_creates_intermediate_levels() {
        let mut h = Hierarchy::new();
        h.insert(3, "posture", EntryRole::Task);
        assert_eq!(h.level_count(), 4);
        assert!(h.levels()[1].is_empty());
        assert_eq!(h.level_of("posture", EntryRole::Task), Some(3));
    }

    #[test]
    fn insertion_order_is_stable() {
        let mut h = Hierarchy::new();
        h.insert(1, "b", EntryRole::Task);
        h.insert(1, "a", EntryRole::Task);
        h.insert(1, "c", EntryRole::Task);
        h.remove("a");
        let names: Vec<&str> = h.levels()[1].iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn remove_drops_all_roles_and_trims() {
        let mut h = Hierarchy::new();
        h.insert(0, "lf", EntryRole::ContactMotion);
        h.insert(0, "lf", EntryRole::ContactForceBounds);
        h.insert(1, "lf", EntryRole::ContactForceRegularization);
        assert_eq!(h.remove("lf"), 3);
        assert_eq!(h.level_count(), 1);
        assert_eq!(h.remove("lf"), 0);
    }
}
