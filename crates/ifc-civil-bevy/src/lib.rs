//! IFC-Civil Bevy Viewer
//!
//! Bevy-based BIM / civil viewer with WebGPU rendering. Loads IFC files into
//! the shared fragment registry, shows them with a reference grid and a
//! minimap, measures areas, and runs the civil plan / 3D / cross-section
//! triple view on a road model.
//!
//! Pure Bevy UI, works on both web (WASM) and native platforms.

pub mod camera;
pub mod civil;
pub mod download;
pub mod fetch;
pub mod grid;
pub mod loader;
pub mod measure;
pub mod mesh;
pub mod minimap;
pub mod scene;
pub mod ui;

use bevy::prelude::*;
use ifc_civil_model::{
    Classifier, ClipEdges, FragmentsManager, GridConfig, MinimapConfig, SetupKind, SetupQueue,
    SetupToken, ViewerConfig,
};
use std::sync::atomic::{AtomicBool, Ordering};

/// Global debug mode flag (set from URL parameter ?debug=1 or the DEBUG env var)
static DEBUG_MODE: AtomicBool = AtomicBool::new(false);

/// Check if debug mode is enabled
pub fn is_debug() -> bool {
    DEBUG_MODE.load(Ordering::Relaxed)
}

/// Initialize debug mode from URL parameters
#[cfg(target_arch = "wasm32")]
fn init_debug_from_url() {
    if let Some(window) = web_sys::window() {
        if let Ok(search) = window.location().search() {
            if search.contains("debug=1") || search.contains("debug=true") {
                DEBUG_MODE.store(true, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn init_debug_from_url() {
    // Native: check env var
    if std::env::var("DEBUG").is_ok() {
        DEBUG_MODE.store(true, Ordering::Relaxed);
    }
}

// Re-exports
pub use camera::{CameraController, CameraMode, CameraPlugin, MainCamera};
pub use civil::{CivilPlugin, CivilState};
pub use loader::{LoadIfcFileEvent, LoaderPlugin, OpenFileDialogRequest};
pub use measure::MeasurePlugin;
pub use mesh::{AutoFitState, FragmentMesh, MeshPlugin};
pub use minimap::MinimapPlugin;
pub use scene::{SceneOverlay, ScenePlugin};
pub use ui::CivilUiPlugin;

/// Main viewer plugin - combines all subsystems
pub struct CivilViewerPlugin {
    pub config: ViewerConfig,
}

impl Plugin for CivilViewerPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(ViewerSettings(self.config.clone()))
            .insert_resource(GridSettings(self.config.grid.clone()))
            .insert_resource(MinimapSettings(self.config.minimap.clone()))
            .init_resource::<Fragments>()
            .init_resource::<EntityClassifier>()
            .init_resource::<SectionEdges>()
            .init_resource::<WorldSetups>()
            .init_resource::<ViewerStatus>()
            .add_message::<SetupStarted>()
            .add_systems(PreUpdate, dispatch_world_setups)
            .add_plugins((
                ScenePlugin,
                CameraPlugin,
                MeshPlugin,
                grid::GridPlugin,
                MinimapPlugin,
                MeasurePlugin,
                LoaderPlugin,
                CivilPlugin,
                CivilUiPlugin,
            ));
    }
}

/// Shared fragment registry: every loaded model lives here
#[derive(Resource, Default, Deref, DerefMut)]
pub struct Fragments(pub FragmentsManager);

/// IFC category classification of the loaded models
#[derive(Resource, Default, Deref, DerefMut)]
pub struct EntityClassifier(pub Classifier);

/// Clip styles and the cross-section edges computed from them
#[derive(Resource, Default, Deref, DerefMut)]
pub struct SectionEdges(pub ClipEdges);

/// Serialized queue of world-mutating setups (IFC loads, civil road)
#[derive(Resource, Default, Deref, DerefMut)]
pub struct WorldSetups(pub SetupQueue);

/// A queued setup got its turn; the plugin owning `kind` runs it and calls
/// `finish` on the queue when done
#[derive(Message, Clone, Debug)]
pub struct SetupStarted {
    pub kind: SetupKind,
    pub token: SetupToken,
}

/// Start the next queued setup when none is running
fn dispatch_world_setups(mut setups: ResMut<WorldSetups>, mut started: MessageWriter<SetupStarted>) {
    if let Some((kind, token)) = setups.start_next() {
        log(&format!("[Setup] Starting {:?} (#{})", kind, token.generation()));
        started.write(SetupStarted { kind, token });
    }
}

/// Startup configuration
#[derive(Resource, Clone, Default, Deref)]
pub struct ViewerSettings(pub ViewerConfig);

/// Live reference grid settings, edited by the options panel
#[derive(Resource, Clone, Default, Deref, DerefMut)]
pub struct GridSettings(pub GridConfig);

/// Live minimap settings, edited by the options panel
#[derive(Resource, Clone, Default, Deref, DerefMut)]
pub struct MinimapSettings(pub MinimapConfig);

/// Text shown in the status bar
#[derive(Resource, Default)]
pub struct ViewerStatus {
    pub message: String,
    pub loading: bool,
}

impl ViewerStatus {
    pub fn set(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }
}

/// Verbose trace, only in debug mode
pub fn log(msg: &str) {
    if is_debug() {
        log::debug!("{}", msg);
    }
}

/// Log info that should always be shown
pub fn log_info(msg: &str) {
    log::info!("{}", msg);
}

/// Log level for Bevy's log plugin
fn log_level() -> bevy::log::Level {
    if is_debug() {
        bevy::log::Level::DEBUG
    } else {
        bevy::log::Level::INFO
    }
}

/// Read the JSON configuration named by `IFC_CIVIL_CONFIG`, defaults otherwise
#[cfg(not(target_arch = "wasm32"))]
pub fn load_config() -> anyhow::Result<ViewerConfig> {
    use anyhow::Context;

    match std::env::var(ifc_civil_model::CONFIG_ENV) {
        Ok(path) => ViewerConfig::load(&path)
            .with_context(|| format!("failed to read viewer config '{}'", path)),
        Err(_) => Ok(ViewerConfig::default()),
    }
}

/// Run the viewer on a canvas element (WASM)
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn run_on_canvas(canvas_selector: &str) {
    console_error_panic_hook::set_once();
    init_debug_from_url();

    App::new()
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "IFC-Civil Viewer".to_string(),
                        canvas: Some(canvas_selector.to_string()),
                        fit_canvas_to_parent: true,
                        // Right-click ends an area measurement, no context menu
                        prevent_default_event_handling: true,
                        ..default()
                    }),
                    ..default()
                })
                .set(bevy::log::LogPlugin {
                    level: log_level(),
                    ..default()
                }),
        )
        .add_plugins(CivilViewerPlugin {
            config: ViewerConfig::default(),
        })
        .run();
}

/// Run the viewer in a native window (desktop)
#[cfg(not(target_arch = "wasm32"))]
pub fn run_on_canvas(_canvas_selector: &str) {
    run_native();
}

/// Run native desktop viewer
#[cfg(not(target_arch = "wasm32"))]
pub fn run_native() {
    init_debug_from_url();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}, using defaults", e);
            ViewerConfig::default()
        }
    };

    App::new()
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "IFC-Civil Viewer".to_string(),
                        resolution: (1280u32, 720u32).into(),
                        ..default()
                    }),
                    ..default()
                })
                .set(bevy::log::LogPlugin {
                    level: log_level(),
                    ..default()
                }),
        )
        .insert_resource(ClearColor(Color::srgb(0.1, 0.1, 0.15)))
        .add_plugins(CivilViewerPlugin { config })
        .run();
}

#[cfg(target_arch = "wasm32")]
pub fn run_native() {
    run_on_canvas("#bevy-canvas");
}

/// WASM entry point
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn wasm_start() {
    run_native();
}
