//! Static file handler rooted at the configured website directory.

use futures_util::future::BoxFuture;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::http::packet::ResponsePacket;
use crate::http::request::Params;
use crate::routing::router::{HandlerError, HandlerResult};
use crate::session::Session;

/// Content type for a file extension, with whether it is text.
pub fn content_type_for(path: &Path) -> Option<(&'static str, bool)> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let found = match ext.as_str() {
        "html" | "htm" => ("text/html", true),
        "css" => ("text/css", true),
        "js" | "mjs" => ("text/javascript", true),
        "json" => ("application/json", true),
        "txt" => ("text/plain", true),
        "xml" => ("application/xml", true),
        "svg" => ("image/svg+xml", true),
        "png" => ("image/png", false),
        "jpg" | "jpeg" => ("image/jpeg", false),
        "gif" => ("image/gif", false),
        "ico" => ("image/x-icon", false),
        "webp" => ("image/webp", false),
        "woff2" => ("font/woff2", false),
        "pdf" => ("application/pdf", false),
        "wasm" => ("application/wasm", false),
        _ => return None,
    };
    Some(found)
}

/// Resolve a request path to a file under `root`.
///
/// Directory paths resolve to their `index.html`. Paths that try to leave
/// the root resolve to nothing.
pub fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = request_path.trim_start_matches('/');
    let relative = if relative.is_empty() || relative.ends_with('/') {
        format!("{}index.html", relative)
    } else {
        relative.to_string()
    };

    let relative = Path::new(&relative);
    let contained = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    contained.then(|| root.join(relative))
}

/// Read the file behind `request_path`.
pub async fn serve_file(root: &Path, request_path: &str) -> HandlerResult {
    let Some(path) = resolve(root, request_path) else {
        return Err(HandlerError::NotFound(request_path.to_string()));
    };

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(HandlerError::NotFound(request_path.to_string())),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(HandlerError::NotFound(request_path.to_string()))
        }
        Err(e) => return Err(HandlerError::internal(e)),
    }

    let Some((content_type, is_text)) = content_type_for(&path) else {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        return Err(HandlerError::UnknownType(ext));
    };

    let bytes = tokio::fs::read(&path).await.map_err(HandlerError::internal)?;
    let encoding = is_text.then(|| "utf-8".to_string());
    Ok(ResponsePacket::bytes(bytes, content_type).with_encoding(encoding))
}

/// Handler serving files under `root` for the request path.
pub fn static_files(
    root: impl Into<PathBuf>,
) -> impl Fn(Arc<Session>, Params) -> BoxFuture<'static, HandlerResult> + Send + Sync + Clone + 'static {
    let root = Arc::new(root.into());
    move |_session: Arc<Session>, params: Params| -> BoxFuture<'static, HandlerResult> {
        let root = Arc::clone(&root);
        Box::pin(async move { serve_file(&root, params.path()).await })
    }
}
