//! Writing rendered pages to a directory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{ViewerError, ViewerResult};
use crate::render::RenderedPage;

/// Directory, under the export directory, holding page resources.
pub const RESOURCES_DIR: &str = "resources";

static TMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn export_error(path: &Path, err: impl std::fmt::Display) -> ViewerError {
    ViewerError::Export {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

/// Keep a resource name inside its directory.
fn safe_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// Point resource references of exported HTML at the resources directory.
fn link_resources(page: &RenderedPage) -> Option<String> {
    let html = page.html()?;
    let mut linked = html.to_string();
    for resource in &page.resources {
        let target = format!("{}/{}", RESOURCES_DIR, safe_file_name(&resource.name));
        linked = linked
            .replace(&format!("=\"{}\"", resource.name), &format!("=\"{}\"", target))
            .replace(&format!("url({})", resource.name), &format!("url({})", target));
    }
    Some(linked)
}

/// Write `data` to `path` through a temporary sibling, removing the
/// temporary file if anything fails.
async fn write_atomic(path: &Path, data: &[u8]) -> ViewerResult<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let seq = TMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_file_name(format!(".{}.tmp-{}-{}", file_name, std::process::id(), seq));

    let result = async {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp).await;
        return Err(export_error(path, e));
    }
    Ok(())
}

/// Write pages as `page_{n}.{ext}` into `dir`, and their resources into
/// `dir/resources/`. Returns the written page paths in page order.
///
/// Directory creation is idempotent, so concurrent exports into the same
/// directory do not fail.
pub async fn export_pages(dir: impl AsRef<Path>, pages: &[Arc<RenderedPage>]) -> ViewerResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).await.map_err(|e| export_error(dir, e))?;

    let resources_dir = dir.join(RESOURCES_DIR);
    if pages.iter().any(|p| !p.resources.is_empty()) {
        fs::create_dir_all(&resources_dir)
            .await
            .map_err(|e| export_error(&resources_dir, e))?;
    }

    let mut written = Vec::with_capacity(pages.len());
    for page in pages {
        let path = dir.join(page.file_name());
        match link_resources(page) {
            Some(html) => write_atomic(&path, html.as_bytes()).await?,
            None => write_atomic(&path, &page.content()).await?,
        }

        for resource in &page.resources {
            let path = resources_dir.join(safe_file_name(&resource.name));
            write_atomic(&path, &resource.data).await?;
        }
        written.push(path);
    }

    debug!(dir = %dir.display(), pages = written.len(), "Exported pages");
    Ok(written)
}
