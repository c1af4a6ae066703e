//! Delivery of exported files
//!
//! Desktop writes into the configured export directory; the browser gets an
//! in-memory blob behind a clicked anchor.

use ifc_civil_model::{Downloader, Result};

/// Writes each download into a directory
#[cfg(not(target_arch = "wasm32"))]
pub struct FileDownloader {
    pub dir: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl Downloader for FileDownloader {
    fn download(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        std::fs::write(&path, bytes)?;
        crate::log_info(&format!(
            "[Download] Wrote {} ({} bytes)",
            path.display(),
            bytes.len()
        ));
        Ok(())
    }
}

/// Triggers a browser download per file
#[cfg(target_arch = "wasm32")]
pub struct BrowserDownloader;

/// Grace period before a download's object URL is released
#[cfg(target_arch = "wasm32")]
const REVOKE_DELAY_MS: i32 = 1000;

#[cfg(target_arch = "wasm32")]
fn js_err(e: wasm_bindgen::JsValue) -> ifc_civil_model::ViewerError {
    ifc_civil_model::ViewerError::other(format!("{:?}", e))
}

/// Blob URL holding `bytes`
#[cfg(target_arch = "wasm32")]
fn object_url(bytes: &[u8]) -> Result<String> {
    let parts = js_sys::Array::new();
    parts.push(&js_sys::Uint8Array::from(bytes));
    let options = web_sys::BlobPropertyBag::new();
    options.set_type("application/octet-stream");
    let blob =
        web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &options).map_err(js_err)?;
    web_sys::Url::create_object_url_with_blob(&blob).map_err(js_err)
}

/// Release `url` once the browser has picked the download up
#[cfg(target_arch = "wasm32")]
fn revoke_later(window: &web_sys::Window, url: String) -> Result<()> {
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::JsCast;

    let revoke = Closure::once_into_js(move || {
        if let Err(e) = web_sys::Url::revoke_object_url(&url) {
            crate::log(&format!("[Download] Revoke failed: {:?}", e));
        }
    });
    window
        .set_timeout_with_callback_and_timeout_and_arguments_0(
            revoke.unchecked_ref(),
            REVOKE_DELAY_MS,
        )
        .map_err(js_err)?;
    Ok(())
}

#[cfg(target_arch = "wasm32")]
impl Downloader for BrowserDownloader {
    fn download(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        use ifc_civil_model::ViewerError;
        use wasm_bindgen::JsCast;

        let window = web_sys::window().ok_or_else(|| ViewerError::other("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| ViewerError::other("no document"))?;

        let url = object_url(bytes)?;
        let anchor: web_sys::HtmlAnchorElement = document
            .create_element("a")
            .map_err(js_err)?
            .dyn_into()
            .map_err(|_| ViewerError::other("anchor element"))?;
        anchor.set_href(&url);
        anchor.set_download(name);
        anchor.click();
        revoke_later(&window, url)?;

        crate::log_info(&format!("[Download] {} ({} bytes)", name, bytes.len()));
        Ok(())
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn test_file_downloader_writes_into_dir() {
        let dir = std::env::temp_dir().join(format!("ifc-civil-{}", uuid::Uuid::new_v4()));
        let mut downloader = FileDownloader { dir: dir.clone() };
        downloader.download("small.frag", b"FRAG").unwrap();
        assert_eq!(std::fs::read(dir.join("small.frag")).unwrap(), b"FRAG");
        std::fs::remove_dir_all(&dir).unwrap();
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod browser_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_object_url_outlives_the_click() {
        let window = web_sys::window().unwrap();
        let url = object_url(b"FRAG").unwrap();
        revoke_later(&window, url.clone()).unwrap();

        // Still readable right after the download was handed off
        let request = web_sys::XmlHttpRequest::new().unwrap();
        request.open_with_async("GET", &url, false).unwrap();
        request.send().unwrap();
        assert_eq!(request.status().unwrap(), 200);
    }
}
