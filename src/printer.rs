//! Page printer seam – turns finished HTML into PDF bytes.
//!
//! The engine does not ship a browser. Hosts implement [`PagePrinter`] over
//! whatever headless renderer they run, and describe how to start one with
//! [`PrinterLauncher`]s. A [`PrinterManager`] owns the live session and the
//! ordered list of ways to start it.

use crate::skeleton::Margins;
use crate::style::Paper;

#[derive(Debug, thiserror::Error)]
pub enum PrintError {
    #[error("printer `{launcher}` failed to start: {message}")]
    Launch { launcher: String, message: String },
    #[error("no printer launchers configured")]
    NoLaunchers,
    #[error("printing failed: {0}")]
    Print(String),
}

/// Options for one PDF print.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfOptions {
    pub paper: Option<Paper>,
    pub margin: Margins,
    pub header_html: Option<String>,
    pub footer_html: Option<String>,
}

/// A live headless rendering session.
pub trait PagePrinter {
    fn print_pdf(&mut self, html: &str, options: &PdfOptions) -> Result<Vec<u8>, PrintError>;

    /// Whether the session can still be used. Dead sessions are relaunched.
    fn is_alive(&self) -> bool {
        true
    }
}

/// One way of starting a printer session.
pub trait PrinterLauncher {
    fn name(&self) -> &str;
    fn launch(&self) -> Result<Box<dyn PagePrinter>, PrintError>;
}

/// Owns at most one printer session, started on demand by trying each
/// launcher in order.
pub struct PrinterManager {
    launchers: Vec<Box<dyn PrinterLauncher>>,
    session: Option<Box<dyn PagePrinter>>,
}

impl PrinterManager {
    pub fn new(launchers: Vec<Box<dyn PrinterLauncher>>) -> Self {
        Self {
            launchers,
            session: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// The live session, launching one if needed. The first launcher that
    /// succeeds wins; if all fail, the last failure is returned.
    pub fn acquire(&mut self) -> Result<&mut dyn PagePrinter, PrintError> {
        if self.session.as_ref().is_some_and(|s| !s.is_alive()) {
            log::info!("printer session died, relaunching");
            self.session = None;
        }
        if self.session.is_none() {
            self.session = Some(self.launch()?);
        }
        self.session
            .as_deref_mut()
            .map(|session| session as &mut dyn PagePrinter)
            .ok_or(PrintError::NoLaunchers)
    }

    /// Drop the live session, if any.
    pub fn release(&mut self) {
        if self.session.take().is_some() {
            log::debug!("printer session released");
        }
    }

    fn launch(&self) -> Result<Box<dyn PagePrinter>, PrintError> {
        let mut last_error = PrintError::NoLaunchers;
        for launcher in &self.launchers {
            match launcher.launch() {
                Ok(session) => {
                    log::info!("printer session started with `{}`", launcher.name());
                    return Ok(session);
                }
                Err(e) => {
                    log::warn!("printer launcher `{}` failed: {e}", launcher.name());
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}
