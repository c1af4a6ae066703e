// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Civil view setup phases

use crate::{Result, ViewerError};
use std::fmt;

/// Ordered setup phases of the civil view
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum CivilPhase {
    #[default]
    Unloaded,
    /// Road model decoded and inserted into the shared world
    ModelAttached,
    /// 3D, plan and cross-section navigators drawn and bound
    NavigatorsWired,
    /// Every classified category has a clip style
    StylesApplied,
    /// Forced clip update done, the view is interactive
    ClippingReady,
}

impl CivilPhase {
    /// The only phase this one may advance to
    pub fn successor(self) -> Option<CivilPhase> {
        match self {
            CivilPhase::Unloaded => Some(CivilPhase::ModelAttached),
            CivilPhase::ModelAttached => Some(CivilPhase::NavigatorsWired),
            CivilPhase::NavigatorsWired => Some(CivilPhase::StylesApplied),
            CivilPhase::StylesApplied => Some(CivilPhase::ClippingReady),
            CivilPhase::ClippingReady => None,
        }
    }
}

impl fmt::Display for CivilPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CivilPhase::Unloaded => "unloaded",
            CivilPhase::ModelAttached => "model attached",
            CivilPhase::NavigatorsWired => "navigators wired",
            CivilPhase::StylesApplied => "styles applied",
            CivilPhase::ClippingReady => "clipping ready",
        };
        f.write_str(name)
    }
}

/// Enforces that phases are entered one at a time, in order
#[derive(Clone, Debug, Default)]
pub struct PhaseTracker {
    current: CivilPhase,
}

impl PhaseTracker {
    pub fn current(&self) -> CivilPhase {
        self.current
    }

    /// Fail unless `next` is the immediate successor
    pub fn check(&self, next: CivilPhase) -> Result<()> {
        if self.current.successor() != Some(next) {
            return Err(ViewerError::PhaseOrder {
                actual: self.current,
                requested: next,
            });
        }
        Ok(())
    }

    /// Move to `next`, which must be the immediate successor
    pub fn advance(&mut self, next: CivilPhase) -> Result<()> {
        self.check(next)?;
        log::debug!("[Civil] Phase {} -> {}", self.current, next);
        self.current = next;
        Ok(())
    }

    /// Fail unless at least `phase` has been reached
    pub fn require(&self, phase: CivilPhase) -> Result<()> {
        if self.current < phase {
            return Err(ViewerError::PhaseOrder {
                actual: self.current,
                requested: phase,
            });
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.current = CivilPhase::Unloaded;
    }

    pub fn is_ready(&self) -> bool {
        self.current == CivilPhase::ClippingReady
    }
}
