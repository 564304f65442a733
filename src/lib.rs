//! # report-forge – Section-template report engine
//!
//! Turns a JSON content tree and an HTML template into a rendered document.
//! The template defines named *sections*; each content node names the
//! section that renders it. The stages are:
//!
//! 1. **Load** – resolve the template by name ([`source`])
//! 2. **Extract** – collect section definitions ([`registry`])
//! 3. **Render** – expand directives in each node's section ([`directive`],
//!    [`render`], [`expr`])
//! 4. **Wrap** – place the body into the template, inline stylesheets and
//!    images, add paper CSS ([`pipeline`], [`inline`], [`style`])
//! 5. **Print / save** – hand the HTML to a [`printer`] and persist the
//!    artefacts through a [`store`]
//!
//! [`DocumentEngine`] runs the whole pipeline for a [`Skeleton`].

pub mod config;
pub mod context;
pub mod directive;
pub mod expr;
pub mod inline;
mod marker;
pub mod pipeline;
pub mod printer;
pub mod registry;
pub mod render;
pub mod skeleton;
pub mod source;
pub mod store;
pub mod style;
pub mod templates;

// Re-exports for convenience
pub use config::EngineConfig;
pub use context::Scope;
pub use expr::{EvalError, ExpressionEvaluator, SafeEvaluator};
pub use inline::{HttpFetcher, InlineOptions, ResourceInliner};
pub use pipeline::{save_files, DocumentEngine, DocumentError, RenderedDocument};
pub use printer::{PagePrinter, PdfOptions, PrinterManager};
pub use registry::SectionRegistry;
pub use render::{process, render, Renderer};
pub use skeleton::Skeleton;
pub use source::{DirectoryTemplates, TemplateSource};
pub use store::{DirectoryStore, DocumentStore};
