// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Setup sequencing and cancellation
//!
//! Every world-mutating setup (an IFC load, the civil road) is queued in a
//! [`SetupQueue`] and runs alone. Each one carries a [`SetupToken`]; tearing
//! down cancels the token and every later step refuses to touch the scene.

use crate::{
    apply_category_styles, codec, CivilPhase, Classifier, ClipStyler, ColorSource,
    CrossSectionNavigator, CrossSectionRelay, FragmentsManager, ModelId, Navigator3d,
    PhaseTracker, PlanLayout, PropertyTable, Result, StyleReport, ViewerError, WorldId,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation handle shared between a setup and its owner
#[derive(Clone, Debug)]
pub struct SetupToken {
    cancelled: Arc<AtomicBool>,
    generation: u64,
}

impl SetupToken {
    pub fn new(generation: u64) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            generation,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the token has been cancelled
    pub fn ensure_live(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ViewerError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// What a queued setup does
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SetupKind {
    IfcLoad { name: String },
    CivilRoad,
}

/// FIFO of world setups, at most one active
#[derive(Debug, Default)]
pub struct SetupQueue {
    pending: VecDeque<(SetupKind, SetupToken)>,
    active: Option<(SetupKind, SetupToken)>,
    next_generation: u64,
}

impl SetupQueue {
    pub fn enqueue(&mut self, kind: SetupKind) -> SetupToken {
        self.next_generation += 1;
        let token = SetupToken::new(self.next_generation);
        log::debug!(
            "[Setup] Queued {:?} (#{}, {} pending)",
            kind,
            token.generation(),
            self.pending.len()
        );
        self.pending.push_back((kind, token.clone()));
        token
    }

    /// Promote the oldest live pending setup if nothing is running
    pub fn start_next(&mut self) -> Option<(SetupKind, SetupToken)> {
        if self.active.is_some() {
            return None;
        }
        while let Some((kind, token)) = self.pending.pop_front() {
            if token.is_cancelled() {
                continue;
            }
            self.active = Some((kind.clone(), token.clone()));
            return Some((kind, token));
        }
        None
    }

    /// Mark the active setup with `generation` as done
    pub fn finish(&mut self, generation: u64) -> bool {
        match &self.active {
            Some((_, token)) if token.generation() == generation => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    pub fn active(&self) -> Option<&(SetupKind, SetupToken)> {
        self.active.as_ref()
    }

    /// Cancel every setup (active or pending) matching `pred`
    pub fn cancel_where(&mut self, pred: impl Fn(&SetupKind) -> bool) {
        if let Some((kind, token)) = &self.active {
            if pred(kind) {
                token.cancel();
                self.active = None;
            }
        }
        self.pending.retain(|(kind, token)| {
            if pred(kind) {
                token.cancel();
                false
            } else {
                true
            }
        });
    }

    pub fn cancel_all(&mut self) {
        self.cancel_where(|_| true);
    }

    pub fn len(&self) -> usize {
        self.pending.len() + usize::from(self.active.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Raw resources fetched for the civil view
#[derive(Clone, Debug, Default)]
pub struct CivilPayload {
    pub model: Vec<u8>,
    pub properties: Vec<u8>,
}

/// Step-by-step setup of the civil view
#[derive(Debug)]
pub struct CivilSetup {
    token: SetupToken,
    phases: PhaseTracker,
    model: Option<ModelId>,
    relay: CrossSectionRelay,
}

impl CivilSetup {
    pub fn new(token: SetupToken) -> Self {
        Self {
            token,
            phases: PhaseTracker::default(),
            model: None,
            relay: CrossSectionRelay::default(),
        }
    }

    /// Decode the fetched road and insert it into the shared world
    pub fn attach_model(
        &mut self,
        payload: &CivilPayload,
        fragments: &mut FragmentsManager,
    ) -> Result<ModelId> {
        self.token.ensure_live()?;
        self.phases.check(CivilPhase::ModelAttached)?;

        let mut group = codec::decode_group(&payload.model)?;
        let properties: PropertyTable = serde_json::from_slice(&payload.properties)?;
        group.set_local_properties(properties);

        let model = fragments.insert(group);
        self.model = Some(model);
        self.phases.advance(CivilPhase::ModelAttached)?;
        Ok(model)
    }

    /// Draw alignments in 3D and plan, then bind the cross section
    pub fn wire_navigators(
        &mut self,
        fragments: &FragmentsManager,
        nav3d: &mut dyn Navigator3d,
        plan: &mut PlanLayout,
        cross: &mut dyn CrossSectionNavigator,
    ) -> Result<()> {
        self.token.ensure_live()?;
        self.phases.check(CivilPhase::NavigatorsWired)?;
        let model = self.model()?;
        let group = fragments
            .group(model)
            .ok_or(ViewerError::ModelNotFound(model))?;

        nav3d.draw(&group.alignments);
        plan.draw(group)?;
        cross.bind(WorldId::PLAN, WorldId::MAIN);
        self.relay.attach();

        self.phases.advance(CivilPhase::NavigatorsWired)
    }

    /// Classify the road and register one clip style per category
    pub fn apply_styles(
        &mut self,
        classifier: &mut Classifier,
        fragments: &FragmentsManager,
        clipper: &mut dyn ClipStyler,
        colors: &mut dyn ColorSource,
    ) -> Result<StyleReport> {
        self.token.ensure_live()?;
        self.phases.check(CivilPhase::StylesApplied)?;
        let model = self.model()?;
        let group = fragments
            .group(model)
            .ok_or(ViewerError::ModelNotFound(model))?;

        classifier.by_entity(group);
        let report = apply_category_styles(classifier, fragments, WorldId::MAIN, clipper, colors)?;
        self.phases.advance(CivilPhase::StylesApplied)?;
        self.phases.advance(CivilPhase::ClippingReady)?;
        Ok(report)
    }

    /// Cancel, detach the relay and remove the road from the world
    pub fn teardown(&mut self, fragments: &mut FragmentsManager) {
        self.token.cancel();
        self.relay.detach();
        if let Some(model) = self.model.take() {
            fragments.remove(model);
        }
        self.phases.reset();
        log::info!("[Civil] Torn down setup #{}", self.token.generation());
    }

    pub fn phase(&self) -> CivilPhase {
        self.phases.current()
    }

    pub fn token(&self) -> &SetupToken {
        &self.token
    }

    pub fn model_id(&self) -> Option<ModelId> {
        self.model
    }

    pub fn relay_mut(&mut self) -> &mut CrossSectionRelay {
        &mut self.relay
    }

    fn model(&self) -> Result<ModelId> {
        self.model.ok_or(ViewerError::PhaseOrder {
            actual: self.phases.current(),
            requested: CivilPhase::ModelAttached,
        })
    }
}
