//! Static file serving handler
//!
//! Serves a directory tree for GET and HEAD: index files, directory
//! listings, ETag revalidation. Every other method gets 501.

use crate::request::percent_encode_segment;
use crate::{Method, Request, Response, ResponseBuilder, StatusCode};
use std::path::{Component, Path, PathBuf};

/// Static file configuration
#[derive(Debug, Clone)]
pub struct StaticFileConfig {
    /// Root directory
    pub root: PathBuf,
    /// Index file name
    pub index: String,
    /// Enable directory listing
    pub listing: bool,
    /// Enable ETag
    pub etag: bool,
    /// Serve hidden files (dot files)
    pub hidden: bool,
}

impl Default for StaticFileConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            index: "index.html".to_string(),
            listing: true,
            etag: true,
            hidden: false,
        }
    }
}

impl StaticFileConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn listing(mut self, enabled: bool) -> Self {
        self.listing = enabled;
        self
    }

    pub fn hidden(mut self, enabled: bool) -> Self {
        self.hidden = enabled;
        self
    }
}

/// Static file handler
#[derive(Debug, Clone)]
pub struct StaticFiles {
    config: StaticFileConfig,
}

impl StaticFiles {
    pub fn new(config: StaticFileConfig) -> Self {
        Self { config }
    }

    /// Serve static files from directory
    pub fn serve(root: impl Into<PathBuf>) -> Self {
        Self::new(StaticFileConfig::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Handle request for static file
    pub async fn handle(&self, req: &Request) -> Response {
        if req.method != Method::Get && req.method != Method::Head {
            return Response::error(StatusCode::NOT_IMPLEMENTED);
        }

        let path = match self.sanitize_path(&req.path) {
            Some(p) => p,
            None => return Response::error(StatusCode::NOT_FOUND),
        };

        let full_path = self.config.root.join(&path);

        let meta = match tokio::fs::metadata(&full_path).await {
            Ok(meta) => meta,
            Err(_) => return Response::error(StatusCode::NOT_FOUND),
        };

        if !meta.is_dir() {
            return self.serve_file(&full_path, &meta, req).await;
        }

        // Relative links in listings need the trailing slash
        if !req.path.ends_with('/') {
            let encoded: Vec<String> = req.path.split('/').map(percent_encode_segment).collect();
            let mut location = format!("{}/", encoded.join("/"));
            if let Some(query) = &req.query {
                location.push('?');
                location.push_str(query);
            }
            return Response::moved_permanently(&location);
        }

        let index_path = full_path.join(&self.config.index);
        if let Ok(index_meta) = tokio::fs::metadata(&index_path).await {
            if index_meta.is_file() {
                return self.serve_file(&index_path, &index_meta, req).await;
            }
        }

        if self.config.listing {
            return self.list_directory(&full_path, req).await;
        }

        Response::error(StatusCode::NOT_FOUND)
    }

    /// Sanitize request path to prevent directory traversal
    fn sanitize_path(&self, path: &str) -> Option<PathBuf> {
        let path = path.trim_start_matches('/');

        if !self.config.hidden && path.split('/').any(|s| s.starts_with('.') && s != ".") {
            return None;
        }

        let mut result = PathBuf::new();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(c) => result.push(c),
                Component::ParentDir => return None,
                _ => {}
            }
        }

        Some(result)
    }

    async fn serve_file(&self, path: &Path, meta: &std::fs::Metadata, req: &Request) -> Response {
        let etag = self.config.etag.then(|| generate_etag(meta));

        if let (Some(etag), Some(if_none_match)) = (&etag, req.header("if-none-match")) {
            if if_none_match == etag.as_str() {
                return ResponseBuilder::new(StatusCode::NOT_MODIFIED)
                    .header("ETag", etag.as_str())
                    .build();
            }
        }

        let content = match tokio::fs::read(path).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read file");
                return Response::error(StatusCode::NOT_FOUND);
            }
        };

        let mut builder = ResponseBuilder::new(StatusCode::OK)
            .header("Content-Type", mime_type(path))
            .header("Content-Length", content.len().to_string());

        if let Some(etag) = etag {
            builder = builder.header("ETag", etag);
        }

        // HEAD request - no body
        if req.method == Method::Head {
            builder.build()
        } else {
            builder.body(content).build()
        }
    }

    async fn list_directory(&self, path: &Path, req: &Request) -> Response {
        let mut dir = match tokio::fs::read_dir(path).await {
            Ok(d) => d,
            Err(_) => return Response::error(StatusCode::NOT_FOUND),
        };

        let mut entries = Vec::new();
        while let Ok(Some(entry)) = dir.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if !self.config.hidden && name.starts_with('.') {
                continue;
            }

            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            entries.push((name, is_dir));
        }

        entries.sort_by(|a, b| match (a.1, b.1) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => a.0.to_lowercase().cmp(&b.0.to_lowercase()),
        });

        let html = render_listing(&req.path, &entries);
        let builder = ResponseBuilder::new(StatusCode::OK)
            .header("Content-Type", "text/html; charset=utf-8")
            .header("Content-Length", html.len().to_string());

        if req.method == Method::Head {
            builder.build()
        } else {
            builder.body(html).build()
        }
    }
}

fn render_listing(path: &str, entries: &[(String, bool)]) -> String {
    let title = format!("Directory listing for {}", escape_html(path));

    let mut html = String::from("<!DOCTYPE html><html><head><meta charset=\"utf-8\">");
    html.push_str(&format!("<title>{}</title></head><body>", title));
    html.push_str(&format!("<h1>{}</h1><hr><ul>", title));

    if path != "/" {
        html.push_str("<li><a href=\"../\">../</a></li>");
    }

    for (name, is_dir) in entries {
        let suffix = if *is_dir { "/" } else { "" };
        html.push_str(&format!(
            "<li><a href=\"{}{}\">{}{}</a></li>",
            percent_encode_segment(name),
            suffix,
            escape_html(name),
            suffix
        ));
    }

    html.push_str("</ul><hr></body></html>");
    html
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn generate_etag(meta: &std::fs::Metadata) -> String {
    use std::time::UNIX_EPOCH;

    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);

    format!("\"{:x}-{:x}\"", mtime, meta.len())
}

fn mime_type(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext.to_lowercase().as_str() {
        // Text
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" | "log" => "text/plain; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        "csv" => "text/csv",

        // Images
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",

        // Certificates
        "crt" | "cer" | "der" => "application/x-x509-ca-cert",
        "pem" => "application/x-pem-file",

        // Archives
        "zip" => "application/zip",
        "gz" | "gzip" => "application/gzip",
        "tar" => "application/x-tar",

        // Documents
        "pdf" => "application/pdf",

        _ => "application/octet-stream",
    }
}
