//! Fetching the civil road model and its property table
//!
//! Sources are `http(s)://` URLs (reqwest) or, on desktop, local paths.
//! Without configured sources the built-in demo road is served.
//!
//! On desktop the request itself runs on a small shared tokio runtime and
//! the I/O pool task only awaits its handle. Dropping the fetch aborts the
//! request.

use ifc_civil_model::{demo_road, encode_group, CivilPayload, Result, ViewerError};

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// GET one URL. Non-2xx responses are errors.
async fn request_bytes(url: String) -> Result<Vec<u8>> {
    let response = reqwest::Client::new()
        .get(&url)
        .send()
        .await
        .map_err(|e| ViewerError::fetch(&url, e.to_string()))?;
    if !response.status().is_success() {
        return Err(ViewerError::fetch(&url, format!("HTTP {}", response.status())));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ViewerError::fetch(&url, e.to_string()))?;
    Ok(bytes.to_vec())
}

#[cfg(not(target_arch = "wasm32"))]
fn runtime() -> Result<&'static tokio::runtime::Runtime> {
    static RUNTIME: std::sync::OnceLock<tokio::runtime::Runtime> = std::sync::OnceLock::new();
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime);
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("civil-fetch")
        .enable_all()
        .build()?;
    Ok(RUNTIME.get_or_init(|| runtime))
}

/// Aborts the spawned request when the awaiting task goes away
#[cfg(not(target_arch = "wasm32"))]
struct AbortOnDrop<T>(tokio::task::JoinHandle<T>);

#[cfg(not(target_arch = "wasm32"))]
impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Fetch one resource
#[cfg(not(target_arch = "wasm32"))]
pub async fn fetch_bytes(source: &str) -> Result<Vec<u8>> {
    if !is_remote(source) {
        return std::fs::read(source).map_err(|e| ViewerError::fetch(source, e.to_string()));
    }
    let mut request = AbortOnDrop(runtime()?.spawn(request_bytes(source.to_string())));
    (&mut request.0)
        .await
        .map_err(|e| ViewerError::fetch(source, e.to_string()))?
}

/// Fetch one resource
#[cfg(target_arch = "wasm32")]
pub async fn fetch_bytes(source: &str) -> Result<Vec<u8>> {
    if !is_remote(source) {
        return Err(ViewerError::fetch(source, "only http(s) URLs work in the browser"));
    }
    request_bytes(source.to_string()).await
}

/// The demo road, encoded the same way a fetched one would be
pub fn demo_payload() -> Result<CivilPayload> {
    let road = demo_road();
    let properties = road
        .local_properties()
        .map(serde_json::to_vec)
        .transpose()?
        .unwrap_or_else(|| b"{}".to_vec());
    Ok(CivilPayload {
        model: encode_group(&road)?,
        properties,
    })
}

/// Model then properties; both must succeed
pub async fn fetch_payload(sources: Option<(String, String)>) -> Result<CivilPayload> {
    let Some((model_url, properties_url)) = sources else {
        return demo_payload();
    };
    let model = fetch_bytes(&model_url).await?;
    let properties = fetch_bytes(&properties_url).await?;
    crate::log(&format!(
        "[Fetch] Road: {} bytes, properties: {} bytes",
        model.len(),
        properties.len()
    ));
    Ok(CivilPayload { model, properties })
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use ifc_civil_model::{decode_group, FragmentsManager};
    use std::time::{Duration, Instant};

    #[test]
    fn test_demo_payload_decodes() {
        let payload = demo_payload().unwrap();
        let group = decode_group(&payload.model).unwrap();
        assert!(group.is_civil());
        let table: serde_json::Value = serde_json::from_slice(&payload.properties).unwrap();
        assert!(table.get("1").is_some());
        assert!(FragmentsManager::default().load(&payload.model).is_ok());
    }

    #[test]
    fn test_missing_local_file_is_fetch_error() {
        let result = bevy::tasks::block_on(fetch_payload(Some((
            "/no/such/road.frag".to_string(),
            "/no/such/road.json".to_string(),
        ))));
        assert!(matches!(result, Err(ViewerError::Fetch { .. })));
    }

    #[test]
    fn test_local_files_are_read() {
        let dir = std::env::temp_dir().join(format!("ifc-civil-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let demo = demo_payload().unwrap();
        std::fs::write(dir.join("road.frag"), &demo.model).unwrap();
        std::fs::write(dir.join("road.json"), &demo.properties).unwrap();

        let payload = bevy::tasks::block_on(fetch_payload(Some((
            dir.join("road.frag").display().to_string(),
            dir.join("road.json").display().to_string(),
        ))))
        .unwrap();
        assert_eq!(payload.model, demo.model);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unreachable_host_is_fetch_error() {
        // Port 9 on localhost has nothing listening
        let result = bevy::tasks::block_on(fetch_bytes("http://127.0.0.1:9/road.frag"));
        assert!(matches!(result, Err(ViewerError::Fetch { .. })));
    }

    #[test]
    fn test_dropping_the_fetch_aborts_the_request() {
        let request = AbortOnDrop(runtime().unwrap().spawn(std::future::pending::<()>()));
        let abort = request.0.abort_handle();
        assert!(!abort.is_finished());

        drop(request);
        let deadline = Instant::now() + Duration::from_secs(5);
        while !abort.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(abort.is_finished());
    }
}
