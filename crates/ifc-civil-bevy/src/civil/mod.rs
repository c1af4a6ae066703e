//! Civil plan / 3D / cross-section triple view
//!
//! Toggling the view queues a `CivilRoad` setup. When the queue starts it,
//! the road model and its property table are fetched on the I/O pool, then
//! attached to the shared world, wired to the three navigators and styled
//! per IFC category. Plan events flow through the setup's relay as Bevy
//! messages; closing the view detaches the relay and removes the road.

mod cross_section;
mod navigator3d;
mod plan;

pub use cross_section::{station_plane, CrossSectionCamera, CrossSectionState, Station};
pub use navigator3d::Navigator3dState;
pub use plan::{fit_plan, pointer_events, PlanCamera};

use crate::camera::CameraController;
use crate::scene::SceneOverlay;
use crate::{
    fetch, log, log_info, EntityClassifier, Fragments, SectionEdges, SetupStarted, ViewerSettings,
    ViewerStatus, WorldSetups,
};
use bevy::camera::visibility::RenderLayers;
use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy::tasks::{IoTaskPool, Task};
use ifc_civil_model::{
    CameraControls, CivilPayload, CivilSetup, Classifier, ClipEdges, FragmentsManager, PlanEvent,
    PlanLayout, RandomColors, SetupKind, SetupToken, StyleReport, ViewerError,
};
use nalgebra::Point3;

/// Render layer of the plan view
pub const PLAN_LAYER: usize = 1;
/// Render layer of the section edges
pub const SECTION_LAYER: usize = 2;

/// Logical size of each civil overlay
pub const OVERLAY_SIZE: Vec2 = Vec2::new(300.0, 200.0);
pub const OVERLAY_BOTTOM: f32 = 20.0;
pub const PLAN_OVERLAY_LEFT: f32 = 20.0;
pub const SECTION_OVERLAY_LEFT: f32 = 340.0;
const OVERLAY_BORDER: f32 = 2.0;

pub struct CivilPlugin;

impl Plugin for CivilPlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<CivilState>()
            .add_message::<ToggleCivilView>()
            .add_message::<PlanEventMessage>()
            .init_resource::<CivilSession>()
            .init_resource::<Navigator3dState>()
            .init_resource::<CrossSectionState>()
            .init_gizmo_group::<PlanGizmos>()
            .init_gizmo_group::<CrossSectionGizmos>()
            .add_systems(Startup, configure_civil_gizmos)
            .add_systems(OnEnter(CivilState::Ready), spawn_civil_views)
            .add_systems(OnExit(CivilState::Ready), despawn_civil_views)
            .add_systems(
                Update,
                (
                    handle_civil_toggle,
                    start_civil_fetch,
                    poll_civil_fetch,
                    close_when_road_removed.run_if(in_state(CivilState::Ready)),
                    plan::plan_pointer_system.run_if(in_state(CivilState::Ready)),
                    relay_plan_events,
                    cross_section::update_cross_section,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (
                    plan::update_plan_camera,
                    cross_section::update_section_camera,
                    plan::draw_plan,
                    cross_section::draw_section_edges,
                    navigator3d::draw_navigator3d,
                )
                    .run_if(in_state(CivilState::Ready)),
            );
    }
}

/// Lifecycle of the civil view
#[derive(States, Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CivilState {
    #[default]
    Inactive,
    /// Queued or fetching
    Loading,
    Ready,
    /// Fetch or setup failed; toggling closes the view
    Failed,
}

/// "Civil" toolbar button
#[derive(Message)]
pub struct ToggleCivilView;

/// A plan navigator event on its way to the relay
#[derive(Message, Clone, Debug)]
pub struct PlanEventMessage(pub PlanEvent);

/// Gizmos drawn only in the plan overlay
#[derive(Default, Reflect, GizmoConfigGroup)]
pub struct PlanGizmos;

/// Gizmos drawn only in the cross-section overlay
#[derive(Default, Reflect, GizmoConfigGroup)]
pub struct CrossSectionGizmos;

/// Cameras and overlay nodes of the civil view
#[derive(Component)]
pub struct CivilView;

/// The running civil setup and its plan
#[derive(Resource, Default)]
pub struct CivilSession {
    setup: Option<CivilSetup>,
    pub plan: PlanLayout,
    /// Token of the queued setup, until the queue starts it
    queued: Option<SetupToken>,
    fetch: Option<Task<ifc_civil_model::Result<CivilPayload>>>,
}

impl CivilSession {
    /// Setup exists and has not been torn down
    pub fn is_active(&self) -> bool {
        self.setup
            .as_ref()
            .is_some_and(|setup| !setup.token().is_cancelled())
    }

    /// Take over a setup the queue just started
    pub(crate) fn begin(&mut self, setup: CivilSetup) {
        self.setup = Some(setup);
    }
}

pub(crate) fn to_vec3(p: &Point3<f64>) -> Vec3 {
    Vec3::new(p.x as f32, p.y as f32, p.z as f32)
}

/// Physical viewport inside a civil overlay anchored `left` px from the left
/// and [`OVERLAY_BOTTOM`] from the bottom
pub fn overlay_viewport(left: f32, window_size: UVec2, scale_factor: f32) -> Option<(UVec2, UVec2)> {
    let width = ((OVERLAY_SIZE.x - 2.0 * OVERLAY_BORDER) * scale_factor).round();
    let height = ((OVERLAY_SIZE.y - 2.0 * OVERLAY_BORDER) * scale_factor).round();
    let x = ((left + OVERLAY_BORDER) * scale_factor).round();
    let y = window_size.y as f32 - ((OVERLAY_BOTTOM + OVERLAY_BORDER) * scale_factor).round() - height;
    if y < 0.0 || x + width > window_size.x as f32 {
        return None;
    }
    Some((
        UVec2::new(x as u32, y as u32),
        UVec2::new(width as u32, height as u32),
    ))
}

fn configure_civil_gizmos(mut store: ResMut<GizmoConfigStore>) {
    let (plan, _) = store.config_mut::<PlanGizmos>();
    plan.render_layers = RenderLayers::layer(PLAN_LAYER);
    plan.line.width = 2.0;
    let (section, _) = store.config_mut::<CrossSectionGizmos>();
    section.render_layers = RenderLayers::layer(SECTION_LAYER);
    section.line.width = 2.0;
}

/// Everything closing the civil view touches
#[derive(SystemParam)]
pub(crate) struct CivilTeardown<'w> {
    session: ResMut<'w, CivilSession>,
    pub(crate) fragments: ResMut<'w, Fragments>,
    pub(crate) setups: ResMut<'w, WorldSetups>,
    edges: ResMut<'w, SectionEdges>,
    classifier: ResMut<'w, EntityClassifier>,
    nav3d: ResMut<'w, Navigator3dState>,
    cross: ResMut<'w, CrossSectionState>,
    next_state: ResMut<'w, NextState<CivilState>>,
}

impl CivilTeardown<'_> {
    /// Cancel the setup, detach its relay and remove the road
    pub(crate) fn close(&mut self) {
        self.setups
            .cancel_where(|kind| matches!(kind, SetupKind::CivilRoad));
        if let Some(token) = self.session.queued.take() {
            token.cancel();
        }
        // Dropping the task cancels the fetch
        self.session.fetch = None;
        let session = &mut *self.session;
        clear_civil_world(
            session.setup.take(),
            &mut self.fragments,
            &mut session.plan,
            &mut self.nav3d,
            &mut self.cross,
            &mut self.classifier,
            &mut self.edges,
        );
        self.next_state.set(CivilState::Inactive);
    }
}

/// Tear the setup down and empty everything it filled in
fn clear_civil_world(
    setup: Option<CivilSetup>,
    fragments: &mut FragmentsManager,
    plan: &mut PlanLayout,
    nav3d: &mut Navigator3dState,
    cross: &mut CrossSectionState,
    classifier: &mut Classifier,
    edges: &mut ClipEdges,
) {
    if let Some(mut setup) = setup {
        setup.teardown(fragments);
    }
    plan.clear();
    edges.clear();
    classifier.clear();
    nav3d.clear();
    cross.clear();
}

fn handle_civil_toggle(
    mut toggles: MessageReader<ToggleCivilView>,
    state: Res<State<CivilState>>,
    mut teardown: CivilTeardown,
    mut status: ResMut<ViewerStatus>,
) {
    // Several clicks in one frame count once
    if toggles.read().count() == 0 {
        return;
    }
    match state.get() {
        CivilState::Inactive => {
            let token = teardown.setups.enqueue(SetupKind::CivilRoad);
            teardown.session.queued = Some(token);
            teardown.next_state.set(CivilState::Loading);
            status.loading = true;
            status.set("Loading civil road...");
        }
        CivilState::Loading | CivilState::Ready | CivilState::Failed => {
            teardown.close();
            status.loading = false;
            status.set("Civil view closed");
            log_info("[Civil] View closed");
        }
    }
}

fn start_civil_fetch(
    mut started: MessageReader<SetupStarted>,
    mut session: ResMut<CivilSession>,
    mut setups: ResMut<WorldSetups>,
    settings: Res<ViewerSettings>,
) {
    for SetupStarted { kind, token } in started.read() {
        if *kind != SetupKind::CivilRoad {
            continue;
        }
        let ours = session
            .queued
            .as_ref()
            .is_some_and(|queued| queued.generation() == token.generation());
        if !ours || token.is_cancelled() {
            setups.finish(token.generation());
            continue;
        }
        session.queued = None;

        let sources = settings
            .road_sources()
            .map(|(model, properties)| (model.to_string(), properties.to_string()));
        log(&format!("[Civil] Fetching road from {:?}", sources));
        session.fetch = Some(IoTaskPool::get().spawn(fetch::fetch_payload(sources)));
        session.begin(CivilSetup::new(token.clone()));
    }
}

/// Attach, wire and style the fetched road
#[allow(clippy::too_many_arguments)]
fn complete_setup(
    setup: &mut CivilSetup,
    payload: &CivilPayload,
    plan: &mut PlanLayout,
    fragments: &mut Fragments,
    nav3d: &mut Navigator3dState,
    cross: &mut CrossSectionState,
    classifier: &mut EntityClassifier,
    edges: &mut SectionEdges,
) -> ifc_civil_model::Result<StyleReport> {
    setup.attach_model(payload, fragments)?;
    setup.wire_navigators(fragments, nav3d, plan, cross)?;
    setup.apply_styles(classifier, fragments, &mut **edges, &mut RandomColors)
}

#[allow(clippy::too_many_arguments)]
fn poll_civil_fetch(
    mut session: ResMut<CivilSession>,
    mut fragments: ResMut<Fragments>,
    mut setups: ResMut<WorldSetups>,
    mut nav3d: ResMut<Navigator3dState>,
    mut cross: ResMut<CrossSectionState>,
    mut classifier: ResMut<EntityClassifier>,
    mut edges: ResMut<SectionEdges>,
    mut status: ResMut<ViewerStatus>,
    mut next_state: ResMut<NextState<CivilState>>,
) {
    let session = &mut *session;
    let Some(task) = session.fetch.as_mut() else {
        return;
    };
    let Some(fetched) = bevy::tasks::block_on(bevy::tasks::poll_once(task)) else {
        return;
    };
    session.fetch = None;
    status.loading = false;

    let Some(setup) = session.setup.as_mut() else {
        return;
    };
    setups.finish(setup.token().generation());

    let result = fetched.and_then(|payload| {
        complete_setup(
            setup,
            &payload,
            &mut session.plan,
            &mut fragments,
            &mut nav3d,
            &mut cross,
            &mut classifier,
            &mut edges,
        )
    });
    match result {
        Ok(report) => {
            log_info(&format!(
                "[Civil] Ready: {} clip styles, {} fragments skipped",
                report.styles, report.skipped_fragments
            ));
            status.set("Civil view ready");
            next_state.set(CivilState::Ready);
        }
        Err(ViewerError::Cancelled) => log("[Civil] Setup cancelled"),
        Err(e) => {
            log::error!("[Civil] Setup failed: {}", e);
            clear_civil_world(
                session.setup.take(),
                &mut fragments,
                &mut session.plan,
                &mut nav3d,
                &mut cross,
                &mut classifier,
                &mut edges,
            );
            status.set(format!("Civil view failed: {}", e));
            next_state.set(CivilState::Failed);
        }
    }
}

/// Disposing the fragments also takes the road away
fn close_when_road_removed(mut teardown: CivilTeardown, mut status: ResMut<ViewerStatus>) {
    let removed = teardown
        .session
        .setup
        .as_ref()
        .and_then(CivilSetup::model_id)
        .is_some_and(|model| teardown.fragments.group(model).is_none());
    if removed {
        teardown.close();
        status.set("Civil view closed");
        log_info("[Civil] Road model removed, view closed");
    }
}

fn relay_plan_events(
    mut events: MessageReader<PlanEventMessage>,
    mut session: ResMut<CivilSession>,
    mut nav3d: ResMut<Navigator3dState>,
    mut cross: ResMut<CrossSectionState>,
    mut controller: ResMut<CameraController>,
) {
    let Some(setup) = session.setup.as_mut() else {
        events.clear();
        return;
    };
    for PlanEventMessage(event) in events.read() {
        let outcome = setup.relay_mut().handle(
            event,
            &mut *nav3d,
            &mut *cross,
            Some(&mut *controller as &mut dyn CameraControls),
        );
        log(&format!("[Civil] Plan event -> {:?}", outcome));
    }
}

fn overlay_node(name: &'static str, left: f32) -> impl Bundle {
    (
        CivilView,
        SceneOverlay,
        Name::new(name),
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(left),
            bottom: Val::Px(OVERLAY_BOTTOM),
            width: Val::Px(OVERLAY_SIZE.x),
            height: Val::Px(OVERLAY_SIZE.y),
            border: UiRect::all(Val::Px(OVERLAY_BORDER)),
            border_radius: BorderRadius::all(Val::Px(8.0)),
            ..default()
        },
        BorderColor::all(Color::WHITE),
        BackgroundColor(Color::NONE),
        // Blocks main-camera input over the overlay
        Interaction::default(),
    )
}

fn spawn_civil_views(mut commands: Commands, session: Res<CivilSession>) {
    commands.spawn(overlay_node("scene-2d-left", PLAN_OVERLAY_LEFT));
    commands.spawn(overlay_node("scene-2d-right", SECTION_OVERLAY_LEFT));
    plan::spawn_plan_camera(&mut commands, &session.plan);
    cross_section::spawn_section_camera(&mut commands);
    log("[Civil] Views spawned");
}

fn despawn_civil_views(mut commands: Commands, views: Query<Entity, With<CivilView>>) {
    for entity in views.iter() {
        commands.entity(entity).despawn();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_civil_model::{
        CivilPhase, CrossSectionNavigator, MarkerType, RelayOutcome, SetupQueue,
    };

    #[test]
    fn test_overlays_sit_side_by_side() {
        let window = UVec2::new(1280, 720);
        let (plan_pos, plan_size) = overlay_viewport(PLAN_OVERLAY_LEFT, window, 1.0).unwrap();
        let (section_pos, _) = overlay_viewport(SECTION_OVERLAY_LEFT, window, 1.0).unwrap();
        assert_eq!(plan_size, UVec2::new(296, 196));
        assert_eq!(plan_pos, UVec2::new(22, 720 - 22 - 196));
        assert_eq!(section_pos.x, 342);
        assert_eq!(section_pos.y, plan_pos.y);
        assert!(overlay_viewport(SECTION_OVERLAY_LEFT, UVec2::new(400, 720), 1.0).is_none());
    }

    /// Full setup with the Bevy-side navigators, then a select on the plan
    #[test]
    fn test_select_on_plan_cuts_section() {
        let mut queue = SetupQueue::default();
        queue.enqueue(SetupKind::CivilRoad);
        let (_, token) = queue.start_next().unwrap();

        let mut setup = CivilSetup::new(token);
        let mut plan = PlanLayout::default();
        let mut fragments = Fragments(FragmentsManager::default());
        let mut nav3d = Navigator3dState::default();
        let mut cross = CrossSectionState::default();
        let mut classifier = EntityClassifier(Classifier::default());
        let mut edges = SectionEdges(ClipEdges::default());

        let payload = fetch::demo_payload().unwrap();
        let report = complete_setup(
            &mut setup,
            &payload,
            &mut plan,
            &mut fragments,
            &mut nav3d,
            &mut cross,
            &mut classifier,
            &mut edges,
        )
        .unwrap();
        assert_eq!(setup.phase(), CivilPhase::ClippingReady);
        assert_eq!(report.styles, 3);
        assert!(cross.is_bound());

        let hit = plan.locate(20.0, 0.0, 1.0).unwrap();
        let select = PlanLayout::marker_event(&hit, MarkerType::Select);
        let outcome = setup
            .relay_mut()
            .handle(&select, &mut nav3d, &mut cross, None);
        assert_eq!(outcome, RelayOutcome::CrossSection);

        let (mesh, point) = cross.take_pending().unwrap();
        let (plane, _) = station_plane(nav3d.alignments(), mesh, &point).unwrap();
        edges.set_plane(plane);
        edges.compute_edges(&fragments);
        assert!(edges.edges().count() > 0);
        assert!(nav3d.marker(MarkerType::Select).is_some());
    }

    #[test]
    fn test_failed_setup_leaves_world_clean() {
        let mut setup = CivilSetup::new(SetupToken::new(1));
        let mut plan = PlanLayout::default();
        let mut fragments = Fragments(FragmentsManager::default());
        let broken = CivilPayload {
            model: b"not a fragment file".to_vec(),
            properties: b"{}".to_vec(),
        };
        let result = complete_setup(
            &mut setup,
            &broken,
            &mut plan,
            &mut fragments,
            &mut Navigator3dState::default(),
            &mut CrossSectionState::default(),
            &mut EntityClassifier::default(),
            &mut SectionEdges::default(),
        );
        assert!(result.is_err());
        assert!(fragments.is_empty());
        assert!(plan.alignments().is_empty());
    }

    #[test]
    fn test_clearing_after_styles_empties_classifier_and_edges() {
        let mut setup = CivilSetup::new(SetupToken::new(1));
        let token = setup.token().clone();
        let mut plan = PlanLayout::default();
        let mut fragments = Fragments(FragmentsManager::default());
        let mut nav3d = Navigator3dState::default();
        let mut cross = CrossSectionState::default();
        let mut classifier = EntityClassifier::default();
        let mut edges = SectionEdges::default();

        complete_setup(
            &mut setup,
            &fetch::demo_payload().unwrap(),
            &mut plan,
            &mut fragments,
            &mut nav3d,
            &mut cross,
            &mut classifier,
            &mut edges,
        )
        .unwrap();
        assert!(!classifier.is_empty());
        assert!(edges.styles().count() > 0);

        clear_civil_world(
            Some(setup),
            &mut fragments,
            &mut plan,
            &mut nav3d,
            &mut cross,
            &mut classifier,
            &mut edges,
        );
        assert!(token.is_cancelled());
        assert!(fragments.is_empty());
        assert!(classifier.is_empty());
        assert_eq!(edges.styles().count(), 0);
        assert!(plan.alignments().is_empty());
        assert!(!cross.is_bound());
    }

    #[test]
    fn test_unbound_cross_section_after_clear() {
        let mut cross = CrossSectionState::default();
        cross.bind(ifc_civil_model::WorldId::PLAN, ifc_civil_model::WorldId::MAIN);
        cross.clear();
        assert!(!cross.is_bound());
    }
}
