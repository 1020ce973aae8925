//! Owning store for every objective, contact and measured force.
//!
//! Entities live in an insertion-ordered arena keyed by [`EntityId`], with a
//! name index on the side. Everything else in the crate refers to entities
//! by name and resolves them here, so removal is a single eviction.

use std::collections::{BTreeMap, HashMap};

use crate::constraint::ConstraintKind;
use crate::contact::RigidContact;
use crate::error::FormulationError;
use crate::measured::MeasuredForce;
use crate::task::Objective;

/// Monotonic insertion id; orders entities for a reproducible layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(u64);

/// A registered objective with its priority and weight.
#[derive(Debug)]
pub struct TaskEntry {
    pub objective: Objective,
    pub weight: f64,
    pub priority_level: usize,
    /// Row count and kind recorded for the current layout.
    pub(crate) rows: usize,
    pub(crate) kind: ConstraintKind,
}

impl TaskEntry {
    pub fn new(objective: Objective, weight: f64, priority_level: usize) -> Self {
        let rows = objective.task().dim();
        let kind = objective.task().kind();
        Self {
            objective,
            weight,
            priority_level,
            rows,
            kind,
        }
    }

    pub const fn rows(&self) -> usize {
        self.rows
    }

    pub const fn kind(&self) -> ConstraintKind {
        self.kind
    }
}

/// A registered rigid contact with its cost weights.
#[derive(Clone, Debug, PartialEq)]
pub struct ContactEntry {
    pub contact: RigidContact,
    pub force_regularization_weight: f64,
    pub motion_weight: f64,
    pub motion_priority_level: usize,
}

/// Anything the registry can own.
#[derive(Debug)]
pub enum Entity {
    Task(TaskEntry),
    Contact(ContactEntry),
    MeasuredForce(MeasuredForce),
}

impl Entity {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Task(_) => "task",
            Self::Contact(_) => "contact",
            Self::MeasuredForce(_) => "measured force",
        }
    }
}

#[derive(Debug)]
struct Slot {
    name: String,
    entity: Entity,
}

/// Name-unique, insertion-ordered entity store.
#[derive(Debug, Default)]
pub struct Registry {
    slots: BTreeMap<EntityId, Slot>,
    names: HashMap<String, EntityId>,
    next_id: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Insert a new entity. Fails without side effects if `name` is taken.
    pub fn insert(&mut self, name: &str, entity: Entity) -> Result<EntityId, FormulationError> {
        if self.names.contains_key(name) {
            return Err(FormulationError::DuplicateName(name.to_string()));
        }
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.names.insert(name.to_string(), id);
        self.slots.insert(
            id,
            Slot {
                name: name.to_string(),
                entity,
            },
        );
        Ok(id)
    }

    /// Evict an entity by name.
    pub fn remove(&mut self, name: &str) -> Result<Entity, FormulationError> {
        let id = self
            .names
            .remove(name)
            .ok_or_else(|| FormulationError::UnknownName(name.to_string()))?;
        self.slots
            .remove(&id)
            .map(|slot| slot.entity)
            .ok_or_else(|| FormulationError::UnknownName(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        let id = self.names.get(name)?;
        self.slots.get(id).map(|slot| &slot.entity)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Entity> {
        let id = self.names.get(name)?;
        self.slots.get_mut(id).map(|slot| &mut slot.entity)
    }

    pub fn task(&self, name: &str) -> Result<&TaskEntry, FormulationError> {
        match self.get(name) {
            Some(Entity::Task(entry)) => Ok(entry),
            _ => Err(FormulationError::UnknownName(name.to_string())),
        }
    }

    pub fn task_mut(&mut self, name: &str) -> Result<&mut TaskEntry, FormulationError> {
        match self.get_mut(name) {
            Some(Entity::Task(entry)) => Ok(entry),
            _ => Err(FormulationError::UnknownName(name.to_string())),
        }
    }

    pub fn contact(&self, name: &str) -> Result<&ContactEntry, FormulationError> {
        match self.get(name) {
            Some(Entity::Contact(entry)) => Ok(entry),
            _ => Err(FormulationError::UnknownName(name.to_string())),
        }
    }

    pub fn contact_mut(&mut self, name: &str) -> Result<&mut ContactEntry, FormulationError> {
        match self.get_mut(name) {
            Some(Entity::Contact(entry)) => Ok(entry),
            _ => Err(FormulationError::UnknownName(name.to_string())),
        }
    }

    pub fn measured_force(&self, name: &str) -> Result<&MeasuredForce, FormulationError> {
        match self.get(name) {
            Some(Entity::MeasuredForce(force)) => Ok(force),
            _ => Err(FormulationError::UnknownName(name.to_string())),
        }
    }

    pub fn measured_force_mut(&mut self, name: &str) -> Result<&mut MeasuredForce, FormulationError> {
        match self.get_mut(name) {
            Some(Entity::MeasuredForce(force)) => Ok(force),
            _ => Err(FormulationError::UnknownName(name.to_string())),
        }
    }

    /// All entities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entity)> {
        self.slots.values().map(|slot| (slot.name.as_str(), &slot.entity))
    }

    pub fn tasks(&self) -> impl Iterator<Item = (&str, &TaskEntry)> {
        self.slots.values().filter_map(|slot| match &slot.entity {
            Entity::Task(entry) => Some((slot.name.as_str(), entry)),
            _ => None,
        })
    }

    pub fn tasks_mut(&mut self) -> impl Iterator<Item = (&str, &mut TaskEntry)> {
        self.slots.values_mut().filter_map(|slot| match &mut slot.entity {
            Entity::Task(entry) => Some((slot.name.as_str(), entry)),
            _ => None,
        })
    }

    pub fn contacts(&self) -> impl Iterator<Item = (&str, &ContactEntry)> {
        self.slots.values().filter_map(|slot| match &slot.entity {
            Entity::Contact(entry) => Some((slot.name.as_str(), entry)),
            _ => None,
        })
    }

    pub fn measured_forces(&self) -> impl Iterator<Item = (&str, &MeasuredForce)> {
        self.slots.values().filter_map(|slot| match &slot.entity {
            Entity::MeasuredForce(force) => Some((slot.name.as_str(), force)),
            _ => None,
        })
    }
}
