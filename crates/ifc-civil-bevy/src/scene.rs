//! Scene bootstrap and teardown
//!
//! Lights and the area-measurement input scope are created at startup.
//! Every UI root the viewer appends (toolbar, options panel, minimap frame,
//! civil views) carries [`SceneOverlay`] so that teardown can find and
//! remove it along with its children.

use crate::civil::CivilTeardown;
use crate::measure::MeasureInput;
use crate::log_info;
use bevy::app::AppExit;
use bevy::prelude::*;

pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SceneLifecycle>()
            .add_systems(Startup, (setup_lights, open_input_scope))
            .add_systems(Last, teardown_on_exit);
    }
}

/// Marker for UI roots owned by the scene
#[derive(Component)]
pub struct SceneOverlay;

/// Whether the scene has been torn down
#[derive(Resource, Default)]
pub struct SceneLifecycle {
    pub torn_down: bool,
}

fn setup_lights(mut commands: Commands) {
    commands.spawn(AmbientLight {
        color: Color::WHITE,
        brightness: 120.0,
        affects_lightmapped_meshes: true,
    });

    // Key light
    commands.spawn((
        DirectionalLight {
            color: Color::srgb(1.0, 0.98, 0.95),
            illuminance: 20000.0,
            shadows_enabled: false,
            ..default()
        },
        Transform::from_xyz(0.4, 1.0, 0.6).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    // Fill
    commands.spawn((
        DirectionalLight {
            color: Color::srgb(0.85, 0.9, 1.0),
            illuminance: 6000.0,
            shadows_enabled: false,
            ..default()
        },
        Transform::from_xyz(-0.6, 0.4, -0.4).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

/// Double-click / right-click / Delete handlers are live while this exists
fn open_input_scope(mut commands: Commands) {
    commands.insert_resource(MeasureInput::default());
}

/// Release everything the scene created, once
fn teardown_on_exit(
    mut exits: MessageReader<AppExit>,
    mut commands: Commands,
    mut lifecycle: ResMut<SceneLifecycle>,
    mut civil: CivilTeardown,
    overlays: Query<Entity, With<SceneOverlay>>,
) {
    if exits.read().next().is_none() || lifecycle.torn_down {
        return;
    }
    lifecycle.torn_down = true;

    // Also reaches a civil setup that already left the queue
    civil.close();
    civil.setups.cancel_all();
    let mut removed = 0;
    for entity in overlays.iter() {
        commands.entity(entity).despawn();
        removed += 1;
    }
    commands.remove_resource::<MeasureInput>();
    let disposed = civil.fragments.dispose();

    log_info(&format!(
        "[Scene] Teardown: {} overlays removed, {} models disposed",
        removed, disposed
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::civil::{CivilSession, CivilState, CrossSectionState, Navigator3dState};
    use crate::{fetch, EntityClassifier, Fragments, SectionEdges, WorldSetups};
    use bevy::state::app::StatesPlugin;
    use ifc_civil_model::{demo_road, CivilSetup, PlanLayout, SetupKind};

    fn teardown_app() -> App {
        let mut app = App::new();
        app.add_plugins(StatesPlugin)
            .init_state::<CivilState>()
            .init_resource::<Fragments>()
            .init_resource::<WorldSetups>()
            .init_resource::<EntityClassifier>()
            .init_resource::<SectionEdges>()
            .init_resource::<CivilSession>()
            .init_resource::<Navigator3dState>()
            .init_resource::<CrossSectionState>()
            .init_resource::<SceneLifecycle>()
            .insert_resource(MeasureInput::default())
            .add_systems(Last, teardown_on_exit);
        app
    }

    fn overlay_count(app: &mut App) -> usize {
        app.world_mut()
            .query_filtered::<Entity, With<SceneOverlay>>()
            .iter(app.world())
            .count()
    }

    #[test]
    fn test_teardown_runs_once_and_releases_everything() {
        let mut app = teardown_app();

        // A civil setup the queue already started, wired and attached
        let mut setups = WorldSetups::default();
        setups.enqueue(SetupKind::CivilRoad);
        let (_, token) = setups.start_next().unwrap();
        let pending = setups.enqueue(SetupKind::IfcLoad {
            name: "small.ifc".to_string(),
        });

        let mut fragments = Fragments::default();
        let mut nav3d = Navigator3dState::default();
        let mut cross = CrossSectionState::default();
        let mut plan = PlanLayout::default();
        let mut setup = CivilSetup::new(token.clone());
        setup
            .attach_model(&fetch::demo_payload().unwrap(), &mut fragments)
            .unwrap();
        setup
            .wire_navigators(&fragments, &mut nav3d, &mut plan, &mut cross)
            .unwrap();
        assert!(setup.relay_mut().is_attached());
        fragments.insert(demo_road());

        let mut session = CivilSession::default();
        session.plan = plan;
        session.begin(setup);
        app.insert_resource(setups)
            .insert_resource(fragments)
            .insert_resource(nav3d)
            .insert_resource(cross)
            .insert_resource(session);

        // Toolbar root with a child button, options panel, minimap frame
        app.world_mut()
            .spawn((SceneOverlay, Node::default()))
            .with_children(|toolbar| {
                toolbar.spawn((Button, Node::default()));
            });
        app.world_mut().spawn((SceneOverlay, Node::default()));
        app.world_mut().spawn((SceneOverlay, Node::default()));

        app.update();
        assert!(!app.world().resource::<SceneLifecycle>().torn_down);
        assert_eq!(overlay_count(&mut app), 3);

        app.world_mut().write_message(AppExit::Success);
        app.update();

        assert!(app.world().resource::<SceneLifecycle>().torn_down);
        assert_eq!(overlay_count(&mut app), 0);
        let leftover_nodes = app
            .world_mut()
            .query::<&Node>()
            .iter(app.world())
            .count();
        assert_eq!(leftover_nodes, 0);
        assert!(!app.world().contains_resource::<MeasureInput>());
        assert!(app.world().resource::<Fragments>().is_empty());
        assert!(app.world().resource::<WorldSetups>().is_empty());
        assert!(token.is_cancelled());
        assert!(pending.is_cancelled());
        assert!(!app.world().resource::<CivilSession>().is_active());
        assert!(!app.world().resource::<CrossSectionState>().is_bound());

        // A second exit leaves whatever exists now alone
        app.world_mut().spawn((SceneOverlay, Node::default()));
        app.world_mut().resource_mut::<Fragments>().insert(demo_road());
        app.world_mut().write_message(AppExit::Success);
        app.update();

        assert_eq!(overlay_count(&mut app), 1);
        assert_eq!(app.world().resource::<Fragments>().len(), 1);
    }
}
