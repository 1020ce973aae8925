//! The inverse-dynamics formulation with acceleration and contact-force variables.
//!
//! [`InverseDynamicsFormulation`] owns the registry, the priority hierarchy,
//! the transition scheduler and the current [`ProblemLayout`]. Its mutation
//! API validates every argument before touching any state, so a failed call
//! leaves the formulation exactly as it was.
//!
//! Per-cycle assembly lives in [`crate::assembler`], decoding in
//! [`crate::decoder`].

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::config::{ContactOptions, FormulationConfig};
use crate::contact::RigidContact;
use crate::decoder::DecodedSolution;
use crate::error::{ConfigError, FormulationError};
use crate::hierarchy::{EntryRole, Hierarchy};
use crate::hqp::HqpData;
use crate::layout::ProblemLayout;
use crate::measured::MeasuredForce;
use crate::registry::{ContactEntry, Entity, Registry, TaskEntry};
use crate::task::{Objective, Task};
use crate::transition::{TransitionKind, TransitionScheduler, TransitionTarget, TransitionWindow};
use crate::types::{ModelDimensions, StateProvider};

/// Quantities from the last assembly needed to decode its solution.
#[derive(Clone, Debug)]
pub(crate) struct CycleTerms {
    pub layout: ProblemLayout,
    /// `S M` (`na x nv`).
    pub m_a: DMatrix<f64>,
    /// `S (h - τ_ext)` (`na`).
    pub h_a: DVector<f64>,
    /// `S Jcᵀ` (`na x n_force`).
    pub j_a_t: DMatrix<f64>,
}

/// Task-space inverse-dynamics formulation for one controller instance.
pub struct InverseDynamicsFormulation<P: StateProvider> {
    pub(crate) config: FormulationConfig,
    pub(crate) provider: P,
    pub(crate) dims: ModelDimensions,
    pub(crate) registry: Registry,
    pub(crate) hierarchy: Hierarchy,
    pub(crate) transitions: TransitionScheduler,
    pub(crate) layout: ProblemLayout,
    /// Time of the last assembly; transition windows start here.
    pub(crate) time: f64,
    pub(crate) hqp: HqpData,
    pub(crate) cycle: Option<CycleTerms>,
    pub(crate) decoded: Option<DecodedSolution>,
    /// Whether `decoded` belongs to the current assembly.
    pub(crate) solution_decoded: bool,
}

impl<P: StateProvider> InverseDynamicsFormulation<P> {
    /// Create a formulation with the default configuration.
    pub fn new(provider: P) -> Self {
        Self::build(provider, FormulationConfig::default())
    }

    /// Create a formulation with a validated configuration.
    pub fn with_config(provider: P, config: FormulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(provider, config))
    }

    fn build(provider: P, config: FormulationConfig) -> Self {
        let dims = provider.dimensions();
        let registry = Registry::new();
        let layout = ProblemLayout::compute(&dims, &registry);
        debug!(
            name = %config.name,
            nv = dims.nv,
            na = dims.na,
            "created inverse-dynamics formulation"
        );
        Self {
            config,
            provider,
            dims,
            registry,
            hierarchy: Hierarchy::new(),
            transitions: TransitionScheduler::new(),
            layout,
            time: 0.0,
            hqp: Vec::new(),
            cycle: None,
            decoded: None,
            solution_decoded: false,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub const fn config(&self) -> &FormulationConfig {
        &self.config
    }

    pub const fn dimensions(&self) -> &ModelDimensions {
        &self.dims
    }

    pub const fn layout(&self) -> &ProblemLayout {
        &self.layout
    }

    pub const fn n_var(&self) -> usize {
        self.layout.n_var
    }

    pub const fn n_eq(&self) -> usize {
        self.layout.n_eq
    }

    pub const fn n_in(&self) -> usize {
        self.layout.n_in
    }

    /// Time of the last call to `compute_problem_data`.
    pub const fn time(&self) -> f64 {
        self.time
    }

    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    pub const fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub const fn transitions(&self) -> &TransitionScheduler {
        &self.transitions
    }

    pub const fn provider(&self) -> &P {
        &self.provider
    }

    pub const fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// Problem data from the last assembly (empty before the first one).
    pub const fn problem_data(&self) -> &HqpData {
        &self.hqp
    }

    pub fn contact(&self, name: &str) -> Result<&RigidContact, FormulationError> {
        self.registry.contact(name).map(|entry| &entry.contact)
    }

    pub fn task_weight(&self, name: &str) -> Result<f64, FormulationError> {
        self.registry.task(name).map(|entry| entry.weight)
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    /// Register a motion task over generalized accelerations.
    pub fn add_motion_task(
        &mut self,
        name: &str,
        task: impl Task + 'static,
        weight: f64,
        priority_level: usize,
        transition_duration: f64,
    ) -> Result<(), FormulationError> {
        self.add_task(
            name,
            Objective::Motion(Box::new(task)),
            weight,
            priority_level,
            transition_duration,
        )
    }

    /// Register a force task over the force block of `contact`.
    pub fn add_force_task(
        &mut self,
        name: &str,
        task: impl Task + 'static,
        contact: &str,
        weight: f64,
        priority_level: usize,
        transition_duration: f64,
    ) -> Result<(), FormulationError> {
        self.registry.contact(contact)?;
        self.add_task(
            name,
            Objective::ContactForce {
                task: Box::new(task),
                contact: contact.to_string(),
            },
            weight,
            priority_level,
            transition_duration,
        )
    }

    /// Register an actuation task over actuator torques.
    pub fn add_actuation_task(
        &mut self,
        name: &str,
        task: impl Task + 'static,
        weight: f64,
        priority_level: usize,
        transition_duration: f64,
    ) -> Result<(), FormulationError> {
        self.add_task(
            name,
            Objective::Actuation(Box::new(task)),
            weight,
            priority_level,
            transition_duration,
        )
    }

    fn add_task(
        &mut self,
        name: &str,
        objective: Objective,
        weight: f64,
        priority_level: usize,
        transition_duration: f64,
    ) -> Result<(), FormulationError> {
        check_weight(name, weight)?;
        check_duration(transition_duration)?;
        if self.registry.contains(name) {
            warn!(entity = %name, "rejected task: name already registered");
            return Err(FormulationError::DuplicateName(name.to_string()));
        }

        let window = if transition_duration > 0.0 && priority_level > 0 {
            Some(TransitionWindow::new(
                name,
                TransitionTarget::Task,
                TransitionKind::Activation,
                self.time,
                self.time + transition_duration,
            )?)
        } else {
            if transition_duration > 0.0 {
                debug!(entity = %name, "hard constraints cannot be blended in; activating immediately");
            }
            None
        };

        let kind = objective.label();
        self.registry
            .insert(name, Entity::Task(TaskEntry::new(objective, weight, priority_level)))?;
        self.hierarchy.insert(priority_level, name, EntryRole::Task);
        if let Some(window) = window {
            self.transitions.schedule(window);
        }
        self.refresh_layout();
        debug!(entity = %name, kind, weight, priority_level, transition_duration, "added task");
        Ok(())
    }

    /// Change a task's weight. Applies from the next assembly.
    pub fn update_task_weight(&mut self, name: &str, weight: f64) -> Result<(), FormulationError> {
        check_weight(name, weight)?;
        let entry = self.registry.task_mut(name)?;
        entry.weight = weight;
        debug!(entity = %name, weight, "updated task weight");
        Ok(())
    }

    /// Remove a task, immediately or blended out over `transition_duration`.
    pub fn remove_task(&mut self, name: &str, transition_duration: f64) -> Result<(), FormulationError> {
        check_duration(transition_duration)?;
        self.registry.task(name)?;

        if transition_duration > 0.0 {
            self.schedule_removal(name, TransitionTarget::Task, transition_duration, None)
        } else {
            self.evict(name)
        }
    }

    // -----------------------------------------------------------------------
    // Contacts
    // -----------------------------------------------------------------------

    /// Register a rigid contact.
    ///
    /// The motion constraint goes to `options.motion_priority_level`, the
    /// force bounds to level 0 and the force regularization to the configured
    /// regularization level. With a positive `transition_duration` the max
    /// normal force ramps up from `activation_force_start`.
    pub fn add_rigid_contact(
        &mut self,
        contact: RigidContact,
        options: ContactOptions,
        transition_duration: f64,
    ) -> Result<(), FormulationError> {
        let name = contact.name().to_string();
        contact.validate()?;
        check_weight(&name, options.force_regularization_weight)?;
        check_weight(&name, options.motion_weight)?;
        check_duration(transition_duration)?;
        if self.registry.contains(&name) {
            warn!(entity = %name, "rejected contact: name already registered");
            return Err(FormulationError::DuplicateName(name));
        }

        let mut contact = contact;
        let window = if transition_duration > 0.0 {
            let start = self.config.activation_force_start.min(contact.max_normal_force());
            contact.set_current_max_normal_force(start);
            Some(
                TransitionWindow::new(
                    name.as_str(),
                    TransitionTarget::Contact,
                    TransitionKind::Activation,
                    self.time,
                    self.time + transition_duration,
                )?
                .with_force_ramp(start, contact.max_normal_force()),
            )
        } else {
            None
        };

        self.registry.insert(
            &name,
            Entity::Contact(ContactEntry {
                contact,
                force_regularization_weight: options.force_regularization_weight,
                motion_weight: options.motion_weight,
                motion_priority_level: options.motion_priority_level,
            }),
        )?;
        self.hierarchy
            .insert(options.motion_priority_level, &name, EntryRole::ContactMotion);
        self.hierarchy.insert(0, &name, EntryRole::ContactForceBounds);
        self.hierarchy.insert(
            self.config.force_regularization_level,
            &name,
            EntryRole::ContactForceRegularization,
        );
        if let Some(window) = window {
            self.transitions.schedule(window);
        }
        self.refresh_layout();
        debug!(
            entity = %name,
            motion_priority_level = options.motion_priority_level,
            transition_duration,
            "added rigid contact"
        );
        Ok(())
    }

    /// Register a rigid contact with the configured default options.
    pub fn add_rigid_contact_default(
        &mut self,
        contact: RigidContact,
        transition_duration: f64,
    ) -> Result<(), FormulationError> {
        let options = self.config.default_contact;
        self.add_rigid_contact(contact, options, transition_duration)
    }

    /// Change a contact's cost weights. `None` keeps the motion weight.
    pub fn update_rigid_contact_weights(
        &mut self,
        name: &str,
        force_regularization_weight: f64,
        motion_weight: Option<f64>,
    ) -> Result<(), FormulationError> {
        check_weight(name, force_regularization_weight)?;
        if let Some(w) = motion_weight {
            check_weight(name, w)?;
        }
        let entry = self.registry.contact_mut(name)?;
        entry.force_regularization_weight = force_regularization_weight;
        if let Some(w) = motion_weight {
            entry.motion_weight = w;
        }
        debug!(entity = %name, force_regularization_weight, ?motion_weight, "updated contact weights");
        Ok(())
    }

    /// Change a contact's steady-state normal force bounds.
    ///
    /// A running transition keeps blending and picks up the new values on the
    /// next assembly.
    pub fn update_rigid_contact_force_bounds(
        &mut self,
        name: &str,
        min: f64,
        max: f64,
    ) -> Result<(), FormulationError> {
        if !(min.is_finite() && max.is_finite() && 0.0 <= min && min <= max) {
            return Err(FormulationError::InvalidForceBounds {
                name: name.to_string(),
                min,
                max,
            });
        }
        let entry = self.registry.contact_mut(name)?;
        entry.contact.set_force_bounds(min, max);
        debug!(entity = %name, min, max, "updated contact force bounds");
        Ok(())
    }

    /// Remove a contact, immediately or by ramping its max normal force down
    /// to `min + removal_force_margin` over `transition_duration`.
    pub fn remove_rigid_contact(
        &mut self,
        name: &str,
        transition_duration: f64,
    ) -> Result<(), FormulationError> {
        check_duration(transition_duration)?;
        let entry = self.registry.contact(name)?;

        if transition_duration > 0.0 {
            let f_max_start = self
                .decoded
                .as_ref()
                .filter(|_| self.solution_decoded)
                .and_then(|decoded| decoded.contact_force(name))
                .map_or(entry.contact.current_max_normal_force(), |f| {
                    entry.contact.normal_force(f)
                });
            let f_max_end = entry.contact.min_normal_force() + self.config.removal_force_margin;
            self.schedule_removal(
                name,
                TransitionTarget::Contact,
                transition_duration,
                Some((f_max_start, f_max_end)),
            )
        } else {
            self.evict(name)
        }
    }

    // -----------------------------------------------------------------------
    // Measured forces
    // -----------------------------------------------------------------------

    pub fn add_measured_force(&mut self, force: MeasuredForce) -> Result<(), FormulationError> {
        let name = force.name().to_string();
        self.registry.insert(&name, Entity::MeasuredForce(force))?;
        debug!(entity = %name, "added measured force");
        Ok(())
    }

    /// Replace a measured force's value with a new reading.
    pub fn update_measured_force(
        &mut self,
        name: &str,
        value: DVector<f64>,
    ) -> Result<(), FormulationError> {
        self.registry.measured_force_mut(name)?.set_value(value);
        Ok(())
    }

    pub fn remove_measured_force(&mut self, name: &str) -> Result<(), FormulationError> {
        self.registry.measured_force(name)?;
        self.evict(name)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn schedule_removal(
        &mut self,
        name: &str,
        target: TransitionTarget,
        duration: f64,
        force_ramp: Option<(f64, f64)>,
    ) -> Result<(), FormulationError> {
        if self
            .transitions
            .get(name)
            .is_some_and(|w| w.kind == TransitionKind::Removal)
        {
            warn!(entity = %name, "removal already scheduled");
            return Err(FormulationError::TransitionPending(name.to_string()));
        }
        let mut window = TransitionWindow::new(
            name,
            target,
            TransitionKind::Removal,
            self.time,
            self.time + duration,
        )?;
        if let Some((start, end)) = force_ramp {
            window = window.with_force_ramp(start, end);
        }
        self.transitions.schedule(window);
        debug!(entity = %name, duration, "scheduled removal");
        Ok(())
    }

    /// Drop an entity and every reference to it, then recount the layout.
    pub(crate) fn evict(&mut self, name: &str) -> Result<(), FormulationError> {
        let entity = self.registry.remove(name)?;
        self.hierarchy.remove(name);
        self.transitions.cancel(name);
        self.refresh_layout();
        debug!(entity = %name, kind = entity.label(), "removed");
        Ok(())
    }

    pub(crate) fn refresh_layout(&mut self) {
        self.layout = ProblemLayout::compute(&self.dims, &self.registry);
    }
}

fn check_weight(name: &str, weight: f64) -> Result<(), FormulationError> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(())
    } else {
        Err(FormulationError::InvalidWeight {
            name: name.to_string(),
            weight,
        })
    }
}

fn check_duration(duration: f64) -> Result<(), FormulationError> {
    if duration.is_finite() && duration >= 0.0 {
        Ok(())
    } else {
        Err(FormulationError::InvalidDuration(duration))
    }
}
