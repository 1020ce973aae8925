//! Decision-vector partition and constraint row counts.
//!
//! ```text
//! x = [ dv (nv) | f_1 (k_1) | ... | f_n (k_n) | s (nu) ]
//! ```
//!
//! `s` is the residual of the unactuated (floating-base) dynamics rows.

use crate::constraint::ConstraintKind;
use crate::registry::Registry;
use crate::types::ModelDimensions;

/// Column range of one contact's force variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContactBlock {
    pub name: String,
    pub offset: usize,
    pub size: usize,
}

impl ContactBlock {
    pub const fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.size
    }
}

/// Problem sizes derived from the registry. Never carried across a
/// structural change: recomputed from scratch each time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProblemLayout {
    pub nv: usize,
    pub na: usize,
    pub nu: usize,
    /// Total contact force variables.
    pub n_force: usize,
    pub n_var: usize,
    pub n_eq: usize,
    pub n_in: usize,
    /// Force blocks in registry order.
    pub contact_blocks: Vec<ContactBlock>,
}

impl ProblemLayout {
    /// Recount everything from the registry contents.
    pub fn compute(dims: &ModelDimensions, registry: &Registry) -> Self {
        let nv = dims.nv;
        let nu = dims.nu();

        // Base dynamics rows and the slack bound.
        let mut n_eq = nu;
        let mut n_in = nu;

        let mut contact_blocks = Vec::new();
        let mut offset = nv;
        for (name, entry) in registry.contacts() {
            let size = entry.contact.n_force();
            contact_blocks.push(ContactBlock {
                name: name.to_string(),
                offset,
                size,
            });
            offset += size;
            n_in += entry.contact.n_force_rows();
            if entry.motion_priority_level == 0 {
                n_eq += entry.contact.n_motion();
            }
        }
        let n_force = offset - nv;

        for (_, entry) in registry.tasks() {
            if entry.priority_level != 0 {
                continue;
            }
            match entry.kind {
                ConstraintKind::Equality => n_eq += entry.rows,
                ConstraintKind::Inequality | ConstraintKind::Bound => n_in += entry.rows,
            }
        }

        Self {
            nv,
            na: dims.na,
            nu,
            n_force,
            n_var: nv + n_force + nu,
            n_eq,
            n_in,
            contact_blocks,
        }
    }

    /// First column of the contact force variables.
    pub const fn force_offset(&self) -> usize {
        self.nv
    }

    /// First column of the unactuated slack block.
    pub const fn slack_offset(&self) -> usize {
        self.nv + self.n_force
    }

    pub fn contact_block(&self, name: &str) -> Option<&ContactBlock> {
        self.contact_blocks.iter().find(|block| block.name == name)
    }
}
