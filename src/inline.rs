//! Resource inliner – embeds external stylesheets and images into a finished
//! HTML document.
//!
//! Both passes rewrite tags in source order, one at a time. Any failure to
//! fetch, read or resolve a resource leaves that tag exactly as it was and is
//! logged; the passes themselves never fail.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use ureq::Agent;

static LINK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<link\b[^>]*>").expect("link regex is valid"));

static TAG_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\s([a-z-]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("attribute regex is valid")
});

static IMG_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)(<img\b[^>]*?\ssrc\s*=\s*)(?:"([^"]*)"|'([^']*)')"#)
        .expect("img regex is valid")
});

/// Failure to load one external resource.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("unrecognised content type {0:?}")]
    ContentType(Option<String>),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} is empty")]
    Empty(PathBuf),
    #[error("no known MIME type for {0}")]
    UnknownMime(String),
    #[error("{0} is not inside a public directory")]
    NotPublic(String),
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

/// A fetched remote resource.
#[derive(Debug, Clone, Default)]
pub struct Fetched {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Retrieves remote resources by URL.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<Fetched, ResourceError>;
}

/// Blocking HTTP fetcher backed by a pooled `ureq` agent.
pub struct HttpFetcher {
    agent: Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Fetched, ResourceError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| ResourceError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(ResourceError::Status {
                url: url.to_string(),
                status,
            });
        }
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut body = response.into_body();
        let body = body
            .read_to_vec()
            .map_err(|e| ResourceError::Http(e.to_string()))?;
        Ok(Fetched { content_type, body })
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// A local directory served publicly under `remote`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicDir {
    pub local: String,
    pub remote: String,
}

#[derive(Debug, Clone, Default)]
pub struct InlineOptions {
    /// Directory relative resource paths are resolved against, usually the
    /// template directory.
    pub resources_root: PathBuf,
    /// Rewrite local images to public URLs and leave remote ones alone,
    /// instead of embedding them.
    pub load_images_as_urls: bool,
    pub public_dirs: Vec<PublicDir>,
    /// Prefix for rewritten image URLs, e.g. `http://example.com/server`.
    pub public_base_url: String,
}

// ---------------------------------------------------------------------------
// Inliner
// ---------------------------------------------------------------------------

pub struct ResourceInliner<'f> {
    fetcher: &'f dyn Fetcher,
    options: InlineOptions,
}

impl<'f> ResourceInliner<'f> {
    pub fn new(fetcher: &'f dyn Fetcher, options: InlineOptions) -> Self {
        Self { fetcher, options }
    }

    pub fn options(&self) -> &InlineOptions {
        &self.options
    }

    /// Replace `<link rel="stylesheet">` tags with inline `<style>` blocks.
    pub fn inline_styles(&self, html: &str) -> String {
        LINK_TAG
            .replace_all(html, |caps: &Captures| {
                let tag = &caps[0];
                let (rel, href) = link_attributes(tag);
                let is_stylesheet = rel.is_some_and(|rel| {
                    rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet"))
                });
                let Some(href) = href.filter(|h| is_stylesheet && !h.is_empty()) else {
                    return tag.to_string();
                };
                match self.stylesheet(&href) {
                    Ok(css) => format!("<style type=\"text/css\">\n{css}\n</style>"),
                    Err(e) => {
                        log::warn!("stylesheet {href} not inlined, keeping {tag}: {e}");
                        tag.to_string()
                    }
                }
            })
            .into_owned()
    }

    /// Rewrite `<img src>` values to data URLs, or to public URLs when
    /// `load_images_as_urls` is set.
    pub fn inline_images(&self, html: &str) -> String {
        IMG_SRC
            .replace_all(html, |caps: &Captures| {
                let (src, quote) = match (caps.get(2), caps.get(3)) {
                    (Some(src), _) => (src.as_str(), '"'),
                    (None, Some(src)) => (src.as_str(), '\''),
                    (None, None) => return caps[0].to_string(),
                };
                match self.image_src(src) {
                    Ok(Some(new_src)) => format!("{}{quote}{new_src}{quote}", &caps[1]),
                    Ok(None) => caps[0].to_string(),
                    Err(e) => {
                        log::warn!("image {src} not inlined, keeping {}: {e}", &caps[0]);
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    fn stylesheet(&self, href: &str) -> Result<String, ResourceError> {
        if is_remote(href) {
            let fetched = self.fetcher.fetch(href)?;
            let is_css = fetched
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.contains("text/css"));
            if !is_css {
                return Err(ResourceError::ContentType(fetched.content_type));
            }
            return Ok(String::from_utf8_lossy(&fetched.body).into_owned());
        }

        let root = &self.options.resources_root;
        let base = root.parent().unwrap_or(root);
        let (path, bytes) = read_local(href, base)?;
        if bytes.is_empty() {
            return Err(ResourceError::Empty(path));
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// New `src` value, or `None` to leave the tag untouched.
    fn image_src(&self, src: &str) -> Result<Option<String>, ResourceError> {
        if src.is_empty() || src.starts_with("data:") {
            return Ok(None);
        }
        if is_remote(src) {
            if self.options.load_images_as_urls {
                return Ok(None);
            }
            let fetched = self.fetcher.fetch(src)?;
            let mime = fetched
                .content_type
                .or_else(|| mime_guess::from_path(src).first().map(|m| m.to_string()))
                .unwrap_or_else(|| "application/octet-stream".to_string());
            return Ok(Some(data_url(&mime, &fetched.body)));
        }

        let (path, bytes) = read_local(src, &self.options.resources_root)?;
        let mime = mime_guess::from_path(src)
            .first()
            .ok_or_else(|| ResourceError::UnknownMime(src.to_string()))?;

        if self.options.load_images_as_urls {
            return self.public_url(&path.to_string_lossy()).map(Some);
        }
        Ok(Some(data_url(mime.essence_str(), &bytes)))
    }

    fn public_url(&self, path: &str) -> Result<String, ResourceError> {
        let cleaned = clean_path(path);
        for dir in &self.options.public_dirs {
            if !cleaned.contains(&format!("/{}/", dir.local)) {
                continue;
            }
            let marker = format!("{}/", dir.local);
            if let Some(at) = cleaned.find(&marker) {
                let rest = &cleaned[at + marker.len()..];
                let base = self.options.public_base_url.trim_end_matches('/');
                return Ok(format!("{base}/{}/{rest}", dir.remote));
            }
        }
        Err(ResourceError::NotPublic(cleaned))
    }
}

fn is_remote(reference: &str) -> bool {
    let lower = reference.get(..8).unwrap_or(reference).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// `rel` and `href` of a `<link>` tag.
fn link_attributes(tag: &str) -> (Option<String>, Option<String>) {
    let mut rel = None;
    let mut href = None;
    for caps in TAG_ATTRIBUTE.captures_iter(tag) {
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str().trim().to_string());
        match caps[1].to_ascii_lowercase().as_str() {
            "rel" => rel = value,
            "href" => href = value,
            _ => {}
        }
    }
    (rel, href)
}

/// Read `path` as given; if it does not exist, read it relative to `base`.
fn read_local(path: &str, base: &Path) -> Result<(PathBuf, Vec<u8>), ResourceError> {
    match fs::read(path) {
        Ok(bytes) => Ok((PathBuf::from(path), bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let retry = base.join(path.trim_start_matches('/'));
            match fs::read(&retry) {
                Ok(bytes) => Ok((retry, bytes)),
                Err(source) => Err(ResourceError::Io { path: retry, source }),
            }
        }
        Err(source) => Err(ResourceError::Io {
            path: PathBuf::from(path),
            source,
        }),
    }
}

fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64_STD.encode(bytes))
}

/// Resolve `.` and `..` segments without touching the filesystem:
/// `"path/to/../unclean/./directory"` becomes `"path/unclean/directory"`.
pub fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[derive(Default)]
    struct StubFetcher {
        responses: HashMap<String, Fetched>,
    }

    impl StubFetcher {
        fn with(mut self, url: &str, content_type: &str, body: &[u8]) -> Self {
            self.responses.insert(
                url.to_string(),
                Fetched {
                    content_type: Some(content_type.to_string()),
                    body: body.to_vec(),
                },
            );
            self
        }
    }

    impl Fetcher for StubFetcher {
        fn fetch(&self, url: &str) -> Result<Fetched, ResourceError> {
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| ResourceError::Http(format!("connection refused: {url}")))
        }
    }

    fn options(root: &Path) -> InlineOptions {
        InlineOptions {
            resources_root: root.to_path_buf(),
            ..InlineOptions::default()
        }
    }

    #[test]
    fn clean_path_resolves_dot_segments() {
        assert_eq!(clean_path("path/to/../unclean/./directory"), "path/unclean/directory");
        assert_eq!(clean_path("/srv/app/./public/../public/img/a.png"), "/srv/app/public/img/a.png");
    }

    #[test]
    fn local_stylesheet_by_literal_path() {
        let dir = tempfile::tempdir().unwrap();
        let css = dir.path().join("site.css");
        fs::write(&css, "p { color: red; }").unwrap();
        let html = format!("<head><link rel=\"stylesheet\" href=\"{}\"></head>", css.display());

        let fetcher = StubFetcher::default();
        let out = ResourceInliner::new(&fetcher, options(dir.path())).inline_styles(&html);
        assert_eq!(out, "<head><style type=\"text/css\">\np { color: red; }\n</style></head>");
    }

    #[test]
    fn local_stylesheet_falls_back_to_parent_of_resources_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("templates").join("report");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(dir.path().join("templates/shared")).unwrap();
        fs::write(dir.path().join("templates/shared/base.css"), "body{}").unwrap();

        let fetcher = StubFetcher::default();
        let inliner = ResourceInliner::new(&fetcher, options(&root));
        let out = inliner.inline_styles("<link href='shared/base.css' rel='stylesheet' />");
        assert_eq!(out, "<style type=\"text/css\">\nbody{}\n</style>");

        let missing = "<link rel=\"stylesheet\" href=\"shared/missing.css\">";
        assert_eq!(inliner.inline_styles(missing), missing);
    }

    #[test]
    fn remote_stylesheet_requires_css_content_type() {
        let fetcher = StubFetcher::default()
            .with("https://cdn.test/a.css", "text/css; charset=utf-8", b"a{}")
            .with("https://cdn.test/b.css", "text/html", b"<html>");
        let inliner = ResourceInliner::new(&fetcher, InlineOptions::default());

        let html = "<link rel=\"stylesheet\" href=\"https://cdn.test/a.css\">\
                    <link rel=\"stylesheet\" href=\"https://cdn.test/b.css\">\
                    <link rel=\"stylesheet\" href=\"https://cdn.test/down.css\">";
        let out = inliner.inline_styles(html);
        assert_eq!(
            out,
            "<style type=\"text/css\">\na{}\n</style>\
             <link rel=\"stylesheet\" href=\"https://cdn.test/b.css\">\
             <link rel=\"stylesheet\" href=\"https://cdn.test/down.css\">"
        );
    }

    #[test]
    fn non_stylesheet_links_are_untouched() {
        let fetcher = StubFetcher::default().with("https://cdn.test/icon.css", "text/css", b"x");
        let html = "<link rel=\"icon\" href=\"https://cdn.test/icon.css\"><link href=\"x.css\">";
        let out = ResourceInliner::new(&fetcher, InlineOptions::default()).inline_styles(html);
        assert_eq!(out, html);
    }

    #[test]
    fn local_images_become_data_urls() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("img")).unwrap();
        fs::write(dir.path().join("img/logo.png"), [1u8, 2, 3]).unwrap();
        fs::write(dir.path().join("img/blob"), [1u8]).unwrap();

        let fetcher = StubFetcher::default();
        let inliner = ResourceInliner::new(&fetcher, options(dir.path()));
        let out = inliner.inline_images("<img class=\"l\" src=\"img/logo.png\" alt=\"\"/>");
        assert_eq!(out, "<img class=\"l\" src=\"data:image/png;base64,AQID\" alt=\"\"/>");

        let unknown = "<img src='img/blob'>";
        assert_eq!(inliner.inline_images(unknown), unknown);
        let missing = "<img src=\"img/none.png\">";
        assert_eq!(inliner.inline_images(missing), missing);
        let inline = "<img src=\"data:image/png;base64,AA==\">";
        assert_eq!(inliner.inline_images(inline), inline);
    }

    #[test]
    fn remote_images_are_embedded_unless_loading_as_urls() {
        let fetcher = StubFetcher::default().with("http://img.test/a.jpg", "image/jpeg", &[255]);
        let html = "<img src=\"http://img.test/a.jpg\">";

        let embed = ResourceInliner::new(&fetcher, InlineOptions::default());
        assert_eq!(embed.inline_images(html), "<img src=\"data:image/jpeg;base64,/w==\">");

        let as_urls = ResourceInliner::new(
            &fetcher,
            InlineOptions {
                load_images_as_urls: true,
                ..InlineOptions::default()
            },
        );
        assert_eq!(as_urls.inline_images(html), html);
    }

    #[test]
    fn unreachable_remote_image_keeps_its_tag() {
        let fetcher = StubFetcher::default();
        let inliner = ResourceInliner::new(&fetcher, InlineOptions::default());
        let html = "<p><img alt='x' src='https://down.test/a.png' width=\"3\"></p>";
        assert_eq!(inliner.inline_images(html), html);
    }

    #[test]
    fn local_images_rewrite_to_public_urls() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("templates");
        fs::create_dir_all(root.join("public/img")).unwrap();
        fs::write(root.join("public/img/logo.svg"), "<svg/>").unwrap();
        fs::write(root.join("private.png"), [0u8]).unwrap();

        let fetcher = StubFetcher::default();
        let inliner = ResourceInliner::new(
            &fetcher,
            InlineOptions {
                resources_root: root,
                load_images_as_urls: true,
                public_dirs: vec![PublicDir {
                    local: "public".into(),
                    remote: "files".into(),
                }],
                public_base_url: "http://reports.test/server/".into(),
            },
        );
        assert_eq!(
            inliner.inline_images("<img src=\"./public/../public/img/logo.svg\">"),
            "<img src=\"http://reports.test/server/files/img/logo.svg\">"
        );
        let private = "<img src=\"private.png\">";
        assert_eq!(inliner.inline_images(private), private);
    }
}
