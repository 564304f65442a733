//! Pipeline – ties together template loading, section extraction, content
//! processing, wrapping, printing and saving into a single call.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::context::Scope;
use crate::expr::{ExpressionEvaluator, SafeEvaluator};
use crate::inline::{Fetcher, HttpFetcher, InlineOptions, ResourceInliner};
use crate::printer::{PagePrinter, PdfOptions, PrintError};
use crate::registry::SectionRegistry;
use crate::render::Renderer;
use crate::skeleton::{DocumentStyle, Margins, Skeleton};
use crate::source::{DirectoryTemplates, LoadedTemplate, TemplateError, TemplateSource};
use crate::store::{DocumentStore, StoredFile};
use crate::style::{inject_before_head_end, paper_css, style_block, Paper};

/// Top and bottom margin when the skeleton sets none.
pub const DEFAULT_MARGIN: &str = "0.3cm";

static BODY_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)(<body\b[^>]*>).*?(</body\s*>)").expect("body regex is valid")
});

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Print(#[from] PrintError),
    #[error("cannot save document files: {0}")]
    Store(#[from] io::Error),
    #[error("invalid skeleton: {0}")]
    Skeleton(#[from] serde_json::Error),
}

/// Everything produced for one skeleton.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub template: LoadedTemplate,
    pub registry: SectionRegistry,
    /// The processed content tree.
    pub body_html: String,
    /// The body placed into the template, when wrapping was requested.
    pub wrapped_html: Option<String>,
    pub header_html: Option<String>,
    pub footer_html: Option<String>,
    /// Margins after defaults were applied.
    pub margin: Margins,
    pub pdf: Option<Vec<u8>>,
}

impl RenderedDocument {
    /// The final HTML: the wrapped document if there is one, else the body.
    pub fn html(&self) -> &str {
        self.wrapped_html.as_deref().unwrap_or(&self.body_html)
    }
}

/// Renders skeletons with a fixed set of collaborators.
pub struct DocumentEngine {
    config: EngineConfig,
    templates: Box<dyn TemplateSource>,
    evaluator: Box<dyn ExpressionEvaluator>,
    fetcher: Box<dyn Fetcher>,
}

impl DocumentEngine {
    /// Engine with the default collaborators: templates from
    /// `config.templates_dir`, the sandboxed evaluator and an HTTP fetcher.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            templates: Box::new(DirectoryTemplates::new(config.templates_dir.clone())),
            evaluator: Box::new(SafeEvaluator),
            fetcher: Box::new(HttpFetcher::new(config.http_timeout())),
            config,
        }
    }

    pub fn with_templates(mut self, templates: impl TemplateSource + 'static) -> Self {
        self.templates = Box::new(templates);
        self
    }

    pub fn with_evaluator(mut self, evaluator: impl ExpressionEvaluator + 'static) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    pub fn with_fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Render a skeleton.
    ///
    /// Only an unresolvable template or a failing printer abort the call;
    /// problems inside the content are logged and rendered as nothing.
    pub fn render(
        &self,
        skeleton: &Skeleton,
        printer: Option<&mut dyn PagePrinter>,
    ) -> Result<RenderedDocument, DocumentError> {
        let template = self.templates.load(&skeleton.template.name)?;
        let registry = SectionRegistry::extract(&template.html);
        log::info!("available template sections: {:?}", registry.names());

        let renderer = Renderer::new(&registry, self.evaluator.as_ref());
        let images = self.inliner(&template.directory, skeleton.style.load_images_as_urls);
        let header_html = page_furniture(&renderer, &images, skeleton.template.header.as_ref(), "header");
        let footer_html = page_furniture(&renderer, &images, skeleton.template.footer.as_ref(), "footer");

        let body_html = renderer.process(&skeleton.content);
        let margin = resolve_margins(&skeleton.template.margin);
        let wrapped_html = skeleton
            .style
            .wrap
            .then(|| self.wrap(&body_html, &template, &skeleton.style, &margin));

        let wants_pdf = skeleton.save.as_ref().is_some_and(|save| save.pdf);
        let pdf = match printer {
            Some(printer) if wants_pdf && !skeleton.no_printer => {
                let options = PdfOptions {
                    paper: skeleton.style.paper.as_deref().and_then(Paper::from_name),
                    margin: margin.clone(),
                    header_html: header_html.clone(),
                    footer_html: footer_html.clone(),
                };
                log::info!("generating pdf with margins {:?}", options.margin);
                let html = wrapped_html.as_deref().unwrap_or(&body_html);
                Some(printer.print_pdf(html, &options)?)
            }
            _ => None,
        };

        Ok(RenderedDocument {
            template,
            registry,
            body_html,
            wrapped_html,
            header_html,
            footer_html,
            margin,
            pdf,
        })
    }

    /// Place `body` into the template document and apply the style options:
    /// stylesheet and image inlining, paper size and extra CSS.
    pub fn wrap(&self, body: &str, template: &LoadedTemplate, style: &DocumentStyle, margin: &Margins) -> String {
        let mut html = place_body(&template.html, body);
        let inliner = self.inliner(&template.directory, style.load_images_as_urls);
        if style.load_css {
            html = inliner.inline_styles(&html);
        }
        if style.load_images {
            html = inliner.inline_images(&html);
        }
        if let Some(paper) = style.paper.as_deref().and_then(Paper::from_name) {
            let top = margin.top.as_deref().unwrap_or(DEFAULT_MARGIN);
            let bottom = margin.bottom.as_deref().unwrap_or(DEFAULT_MARGIN);
            html = inject_before_head_end(&html, &paper_css(paper, top, bottom));
        }
        if let Some(css) = style.css.as_deref().filter(|css| !css.is_empty()) {
            html = inject_before_head_end(&html, &style_block(css));
        }
        html
    }

    fn inliner(&self, resources_root: &Path, load_images_as_urls: bool) -> ResourceInliner<'_> {
        ResourceInliner::new(
            self.fetcher.as_ref(),
            InlineOptions {
                resources_root: resources_root.to_path_buf(),
                load_images_as_urls,
                public_dirs: self.config.public_dirs.clone(),
                public_base_url: self.config.public_base_url.clone(),
            },
        )
    }
}

/// Render a header or footer node with its section, then inline its images.
fn page_furniture(
    renderer: &Renderer<'_>,
    images: &ResourceInliner<'_>,
    node: Option<&Value>,
    default_section: &str,
) -> Option<String> {
    let node = node.filter(|node| node.is_object())?;
    let section = node
        .get("section")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .unwrap_or(default_section);
    let Some(markup) = renderer.registry().get(section) else {
        log::debug!("no `{section}` section in template, skipping {default_section}");
        return None;
    };
    let html = renderer.render(&Scope::node(node), markup);
    Some(images.inline_images(&html))
}

fn resolve_margins(margin: &Margins) -> Margins {
    let or_default = |m: &Option<String>| {
        m.clone()
            .filter(|m| !m.is_empty())
            .or_else(|| Some(DEFAULT_MARGIN.to_string()))
    };
    Margins {
        top: or_default(&margin.top),
        bottom: or_default(&margin.bottom),
        ..margin.clone()
    }
}

/// Replace the contents of the template's `<body>` element with `body`,
/// keeping the body tag's attributes.
pub fn place_body(template_html: &str, body: &str) -> String {
    if !BODY_ELEMENT.is_match(template_html) {
        log::warn!("template has no <body> element, leaving it unchanged");
        return template_html.to_string();
    }
    BODY_ELEMENT
        .replacen(template_html, 1, |caps: &Captures| format!("{}\n{body}\n{}", &caps[1], &caps[2]))
        .into_owned()
}

/// Persist the artefacts the skeleton's `save` options ask for.
///
/// Returns the stored paths; nothing is written when no directory is set.
pub fn save_files(
    skeleton: &Skeleton,
    document: &RenderedDocument,
    store: &dyn DocumentStore,
) -> Result<Vec<PathBuf>, DocumentError> {
    let Some(save) = skeleton.save.as_ref() else {
        return Ok(Vec::new());
    };
    let Some(dir) = save.dir.as_deref() else {
        return Ok(Vec::new());
    };

    let mut files = Vec::new();
    if save.data && !skeleton.data.is_null() {
        files.push(StoredFile::new(
            "data.json",
            "application/json",
            serde_json::to_string_pretty(&skeleton.data)?,
        ));
    }
    if save.skeleton {
        files.push(StoredFile::new(
            "skeleton.json",
            "application/json",
            serde_json::to_string_pretty(skeleton)?,
        ));
    }
    if save.rendered_template {
        files.push(StoredFile::new("rendered_template.html", "text/html", document.html()));
    }
    if let Some(pdf) = document.pdf.as_ref().filter(|_| save.pdf) {
        files.push(StoredFile::new("doc.pdf", "application/pdf", pdf.clone()));
    }
    if files.is_empty() {
        return Ok(Vec::new());
    }
    Ok(store.persist(dir, &files)?)
}
