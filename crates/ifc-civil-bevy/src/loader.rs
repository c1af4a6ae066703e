//! IFC file loading, export and dispose
//!
//! Files arrive from the file dialog, drag-and-drop or (web) the host page.
//! Non-IFC names are rejected with a message. Accepted files are queued as
//! world setups and decoded on the compute pool; the result is attached to
//! the shared fragment registry.

use crate::mesh::get_default_color;
use crate::{log, log_info, Fragments, SetupStarted, ViewerSettings, ViewerStatus, WorldSetups};
use bevy::prelude::*;
use bevy::tasks::{AsyncComputeTaskPool, Task};
#[cfg(not(target_arch = "wasm32"))]
use bevy::tasks::IoTaskPool;
use ifc_civil_model::{
    Fragment, FragmentGroup, FragmentId, IfcDecoder, ItemId, LoaderSettings, MeshGeometry,
    ModelLoader, Result, SetupKind, SetupToken, ViewerError, REJECTION_MESSAGE,
};
use ifc_lite_core::{EntityDecoder, EntityScanner};
use ifc_lite_geometry::GeometryRouter;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Plugin for file loading functionality
pub struct LoaderPlugin;

impl Plugin for LoaderPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<LoadIfcFileEvent>()
            .add_message::<OpenFileDialogRequest>()
            .add_message::<ExportRequest>()
            .add_message::<DisposeRequest>()
            .init_resource::<FileDialogState>()
            .init_resource::<IfcLoads>()
            .add_systems(Startup, init_model_loader)
            .add_systems(
                Update,
                (
                    handle_open_dialog_request,
                    poll_file_dialog,
                    handle_file_drop,
                    poll_host_files,
                    handle_load_file_event,
                    start_ifc_decode,
                    poll_ifc_decode,
                    handle_export_request,
                    handle_dispose_request,
                )
                    .chain(),
            );
    }
}

/// Message to request opening a file dialog
#[derive(Message)]
pub struct OpenFileDialogRequest;

/// A file picked, dropped or handed over by the host page
#[derive(Message, Clone)]
pub struct LoadIfcFileEvent {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// "Export fragments" button
#[derive(Message)]
pub struct ExportRequest;

/// "Dispose fragments" button
#[derive(Message)]
pub struct DisposeRequest;

/// State for tracking async file dialog
#[derive(Resource, Default)]
pub struct FileDialogState {
    task: Option<Task<Option<(String, Vec<u8>)>>>,
}

/// Loader configuration for this session
#[derive(Resource, Default, Deref)]
pub struct LoaderState(pub ModelLoader);

/// IFC loads waiting in the setup queue or decoding
#[derive(Resource, Default)]
pub struct IfcLoads {
    /// Bytes of queued loads, keyed by setup generation
    pending: FxHashMap<u64, (String, Vec<u8>)>,
    decoding: Option<DecodeJob>,
}

struct DecodeJob {
    name: String,
    token: SetupToken,
    task: Task<Result<FragmentGroup>>,
}

fn init_model_loader(mut commands: Commands, settings: Res<ViewerSettings>) {
    commands.insert_resource(LoaderState(ModelLoader::new(settings.loader.clone())));
}

/// Spawn the native file picker
#[cfg(not(target_arch = "wasm32"))]
fn handle_open_dialog_request(
    mut requests: MessageReader<OpenFileDialogRequest>,
    mut state: ResMut<FileDialogState>,
) {
    for _ in requests.read() {
        if state.task.is_some() {
            log("[Loader] File dialog already open");
            continue;
        }

        let task = IoTaskPool::get().spawn(async {
            use rfd::AsyncFileDialog;

            let file = AsyncFileDialog::new()
                .add_filter("IFC Files", &["ifc", "IFC"])
                .add_filter("All Files", &["*"])
                .set_title("Load IFC File")
                .pick_file()
                .await?;
            let bytes = file.read().await;
            Some((file.file_name(), bytes))
        });
        state.task = Some(task);
    }
}

/// The host page owns the file picker on the web
#[cfg(target_arch = "wasm32")]
fn handle_open_dialog_request(
    mut requests: MessageReader<OpenFileDialogRequest>,
    mut status: ResMut<ViewerStatus>,
) {
    for _ in requests.read() {
        status.set("Drop an IFC file onto the viewer to load it");
    }
}

/// Poll async file dialog result
fn poll_file_dialog(
    mut state: ResMut<FileDialogState>,
    mut load_events: MessageWriter<LoadIfcFileEvent>,
) {
    let Some(task) = state.task.as_mut() else {
        return;
    };
    let Some(result) = bevy::tasks::block_on(bevy::tasks::poll_once(task)) else {
        return;
    };
    state.task = None;
    match result {
        Some((name, bytes)) => {
            log_info(&format!("[Loader] File selected: {}", name));
            load_events.write(LoadIfcFileEvent { name, bytes });
        }
        None => log("[Loader] File dialog cancelled"),
    }
}

/// Drag-and-drop onto the window
fn handle_file_drop(
    mut drops: MessageReader<bevy::window::FileDragAndDrop>,
    mut load_events: MessageWriter<LoadIfcFileEvent>,
    mut status: ResMut<ViewerStatus>,
) {
    for event in drops.read() {
        let bevy::window::FileDragAndDrop::DroppedFile { path_buf, .. } = event else {
            continue;
        };
        let name = path_buf
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match std::fs::read(path_buf) {
            Ok(bytes) => {
                log_info(&format!("[Loader] File dropped: {}", name));
                load_events.write(LoadIfcFileEvent { name, bytes });
            }
            Err(e) => {
                log::warn!("[Loader] Cannot read dropped file {:?}: {}", path_buf, e);
                status.set(format!("Cannot read {}", name));
            }
        }
    }
}

#[cfg(target_arch = "wasm32")]
static HOST_FILES: std::sync::Mutex<Vec<(String, Vec<u8>)>> = std::sync::Mutex::new(Vec::new());

/// Hand a file to the viewer from JavaScript
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn load_ifc_bytes(name: &str, bytes: &[u8]) {
    if let Ok(mut files) = HOST_FILES.lock() {
        files.push((name.to_string(), bytes.to_vec()));
    }
}

/// Drain files handed over by the host page
fn poll_host_files(mut _load_events: MessageWriter<LoadIfcFileEvent>) {
    #[cfg(target_arch = "wasm32")]
    {
        let files = match HOST_FILES.lock() {
            Ok(mut files) => std::mem::take(&mut *files),
            Err(_) => return,
        };
        for (name, bytes) in files {
            _load_events.write(LoadIfcFileEvent { name, bytes });
        }
    }
}

/// Show the rejection to the user. Blocking dialog on desktop.
fn show_rejection(status: &mut ViewerStatus) {
    status.set(REJECTION_MESSAGE);
    #[cfg(not(target_arch = "wasm32"))]
    IoTaskPool::get()
        .spawn(async {
            rfd::AsyncMessageDialog::new()
                .set_title("IFC-Civil Viewer")
                .set_description(REJECTION_MESSAGE)
                .set_level(rfd::MessageLevel::Warning)
                .show()
                .await;
        })
        .detach();
}

/// Validate the name and queue the load
fn handle_load_file_event(
    mut events: MessageReader<LoadIfcFileEvent>,
    loader: Res<LoaderState>,
    mut setups: ResMut<WorldSetups>,
    mut loads: ResMut<IfcLoads>,
    mut status: ResMut<ViewerStatus>,
) {
    for event in events.read() {
        if let Err(e) = loader.check_file(&event.name) {
            log::warn!("[Loader] {}", e);
            show_rejection(&mut status);
            continue;
        }
        let token = setups.enqueue(SetupKind::IfcLoad {
            name: event.name.clone(),
        });
        loads
            .pending
            .insert(token.generation(), (event.name.clone(), event.bytes.clone()));
        status.loading = true;
        status.set(format!("Loading {}...", event.name));
    }
}

/// Start decoding once the queue hands us our turn
fn start_ifc_decode(
    mut started: MessageReader<SetupStarted>,
    loader: Res<LoaderState>,
    mut loads: ResMut<IfcLoads>,
    mut setups: ResMut<WorldSetups>,
) {
    for SetupStarted { kind, token } in started.read() {
        if !matches!(kind, SetupKind::IfcLoad { .. }) {
            continue;
        }
        let Some((name, bytes)) = loads.pending.remove(&token.generation()) else {
            setups.finish(token.generation());
            continue;
        };

        let settings = loader.settings().clone();
        let task_name = name.clone();
        let task = AsyncComputeTaskPool::get().spawn(async move {
            ModelLoader::new(settings).decode(&task_name, &bytes, &IfcLiteDecoder)
        });
        loads.decoding = Some(DecodeJob {
            name,
            token: token.clone(),
            task,
        });
    }
}

/// Attach the decoded model, unless the load was cancelled meanwhile
fn poll_ifc_decode(
    mut loads: ResMut<IfcLoads>,
    mut fragments: ResMut<Fragments>,
    mut setups: ResMut<WorldSetups>,
    mut status: ResMut<ViewerStatus>,
) {
    let Some(job) = loads.decoding.as_mut() else {
        return;
    };
    let Some(result) = bevy::tasks::block_on(bevy::tasks::poll_once(&mut job.task)) else {
        return;
    };
    let Some(job) = loads.decoding.take() else {
        return;
    };
    setups.finish(job.token.generation());
    status.loading = false;

    if job.token.ensure_live().is_err() {
        log(&format!("[Loader] Dropped cancelled load of {}", job.name));
        return;
    }
    match result {
        Ok(group) => {
            let items = group.item_count();
            let model = fragments.insert(group);
            log_info(&format!(
                "[Loader] Attached {} as {} ({} items)",
                job.name, model, items
            ));
            status.set(format!("Loaded {}", job.name));
        }
        Err(e) => {
            log::error!("[Loader] {}", e);
            status.set(format!("Failed to load {}", job.name));
        }
    }
}

fn handle_export_request(
    mut requests: MessageReader<ExportRequest>,
    loader: Res<LoaderState>,
    fragments: Res<Fragments>,
    mut status: ResMut<ViewerStatus>,
    #[cfg(not(target_arch = "wasm32"))] settings: Res<ViewerSettings>,
) {
    for _ in requests.read() {
        #[cfg(not(target_arch = "wasm32"))]
        let mut downloader = crate::download::FileDownloader {
            dir: settings.export_dir.clone(),
        };
        #[cfg(target_arch = "wasm32")]
        let mut downloader = crate::download::BrowserDownloader;

        match loader.export(&fragments, &mut downloader) {
            Ok(ifc_civil_model::ExportOutcome::NothingLoaded) => status.set("Nothing to export"),
            Ok(ifc_civil_model::ExportOutcome::Exported { .. }) => status.set("Fragments exported"),
            Err(e) => {
                log::error!("[Loader] Export failed: {}", e);
                status.set("Export failed");
            }
        }
    }
}

fn handle_dispose_request(
    mut requests: MessageReader<DisposeRequest>,
    loader: Res<LoaderState>,
    mut fragments: ResMut<Fragments>,
    mut status: ResMut<ViewerStatus>,
) {
    for _ in requests.read() {
        let count = loader.dispose(&mut fragments);
        log_info(&format!("[Loader] Disposed {} models", count));
        status.set("Fragments disposed");
    }
}

/// IFC decoder backed by the ifc-lite parser and geometry router.
///
/// Product geometry is grouped into one fragment per IFC category; item ids
/// are the STEP entity ids.
pub struct IfcLiteDecoder;

impl IfcDecoder for IfcLiteDecoder {
    fn decode(&self, name: &str, bytes: &[u8], settings: &LoaderSettings) -> Result<FragmentGroup> {
        let content = std::str::from_utf8(bytes)
            .map_err(|e| ViewerError::decode(name, format!("not a STEP text file: {}", e)))?;

        let mut decoder = EntityDecoder::new(content);
        let router = GeometryRouter::with_units(content, &mut decoder);

        let mut element_ids: Vec<(u32, String)> = Vec::new();
        let mut scanner = EntityScanner::new(content);
        while let Some((id, type_name, _, _)) = scanner.next_entity() {
            if !ifc_lite_core::has_geometry_by_name(type_name) {
                continue;
            }
            if matches!(
                ifc_lite_core::IfcType::from_str(type_name),
                ifc_lite_core::IfcType::Unknown(_)
            ) {
                continue;
            }
            let category = type_name.to_ascii_uppercase();
            if settings.is_excluded(&category) {
                continue;
            }
            element_ids.push((id, category));
        }
        log(&format!(
            "[Loader] {}: {} building elements",
            name,
            element_ids.len()
        ));

        let mut by_category: BTreeMap<String, (MeshGeometry, BTreeMap<ItemId, String>)> =
            BTreeMap::new();
        for (id, category) in element_ids {
            let Ok(entity) = decoder.decode_by_id(id) else {
                continue;
            };
            let mesh = match router.process_element(&entity, &mut decoder) {
                Ok(mesh) => mesh,
                Err(e) => {
                    log(&format!("[Loader] Skipping #{} ({}): {}", id, category, e));
                    continue;
                }
            };
            if mesh.is_empty() {
                continue;
            }

            let (geometry, items) = by_category.entry(category.clone()).or_default();
            append_z_up(geometry, &mesh.positions, &mesh.normals, &mesh.indices);
            items.insert(ItemId(id), category);
        }

        if by_category.is_empty() {
            return Err(ViewerError::decode(name, "no renderable geometry"));
        }

        let mut group = FragmentGroup::new(name);
        for (category, (geometry, items)) in by_category {
            group.fragments.push(Fragment::new(
                FragmentId::generate(),
                Arc::new(geometry),
                items,
                get_default_color(&category),
            ));
        }
        Ok(group)
    }
}

/// Append IFC (Z-up) buffers to Y-up geometry: (x, y, z) -> (x, z, -y)
pub fn append_z_up(geometry: &mut MeshGeometry, positions: &[f32], normals: &[f32], indices: &[u32]) {
    let offset = geometry.vertex_count() as u32;
    let has_normals = normals.len() == positions.len();
    // Keep normals either for every vertex or for none
    let keep_normals = has_normals && geometry.normals.len() == geometry.positions.len();

    for p in positions.chunks_exact(3) {
        geometry.positions.extend_from_slice(&[p[0], p[2], -p[1]]);
    }
    if keep_normals {
        for n in normals.chunks_exact(3) {
            geometry.normals.extend_from_slice(&[n[0], n[2], -n[1]]);
        }
    } else {
        geometry.normals.clear();
    }
    geometry.indices.extend(indices.iter().map(|i| i + offset));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_z_up_converts_axes() {
        let mut geometry = MeshGeometry::default();
        append_z_up(
            &mut geometry,
            &[1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            &[0, 1, 2],
        );
        assert_eq!(&geometry.positions[..3], &[1.0, 3.0, -2.0]);
        // Up in IFC is up in the viewer
        assert_eq!(&geometry.normals[..3], &[0.0, 1.0, 0.0]);

        append_z_up(&mut geometry, &[0.0; 9], &[], &[0, 1, 2]);
        assert_eq!(geometry.indices, vec![0, 1, 2, 3, 4, 5]);
        assert!(geometry.normals.is_empty());
    }

    #[test]
    fn test_decoder_rejects_binary() {
        let result = IfcLiteDecoder.decode("broken.ifc", &[0xff, 0xfe, 0x00], &LoaderSettings::default());
        assert!(matches!(result, Err(ViewerError::Decode { .. })));
    }
}
