//! Markdown → HTML, with math protection around the parser and a
//! typesetting pass after it.
//!
//! Both external steps sit behind narrow traits so tests (and embedders with
//! their own toolchain) can swap them:
//!
//! * [`MarkdownEngine`]: `parse_to_html(text) -> html`, default [`ComrakEngine`]
//! * [`Typesetter`]: `typeset(html) -> html`, default [`PassthroughTypesetter`]
//!   (math is left as TeX for a client-side typesetter such as MathJax)

use super::math::protect_math;
use crate::error::RenderError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Converts Markdown text to an HTML fragment.
pub trait MarkdownEngine: Send + Sync {
    fn parse_to_html(&self, text: &str) -> String;
}

/// Turns the TeX left in rendered HTML into its final form.
#[async_trait]
pub trait Typesetter: Send + Sync {
    async fn typeset(&self, html: String) -> Result<String, RenderError>;
}

/// GitHub-flavoured Markdown via comrak.
#[derive(Debug, Clone)]
pub struct ComrakEngine {
    /// A single newline inside a paragraph becomes `<br />`. Default: on.
    pub hard_breaks: bool,
    /// Raw HTML in the source is escaped rather than passed through.
    /// Default: on.
    pub escape_html: bool,
}

impl Default for ComrakEngine {
    fn default() -> Self {
        Self {
            hard_breaks: true,
            escape_html: true,
        }
    }
}

impl MarkdownEngine for ComrakEngine {
    fn parse_to_html(&self, text: &str) -> String {
        let mut options = comrak::Options::default();
        options.extension.table = true;
        options.extension.strikethrough = true;
        options.extension.autolink = true;
        options.extension.tasklist = true;
        options.render.hardbreaks = self.hard_breaks;
        options.render.escape = self.escape_html;
        comrak::markdown_to_html(text, &options)
    }
}

/// Leaves the HTML as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTypesetter;

#[async_trait]
impl Typesetter for PassthroughTypesetter {
    async fn typeset(&self, html: String) -> Result<String, RenderError> {
        Ok(html)
    }
}

/// Protect math, parse, restore math. No typesetting.
pub fn render_markdown_html(engine: &dyn MarkdownEngine, text: &str) -> String {
    let protected = protect_math(text);
    let html = engine.parse_to_html(&protected.text);
    protected.restore(&html)
}

/// The full render pass.
#[derive(Clone)]
pub struct RenderPipeline {
    engine: Arc<dyn MarkdownEngine>,
    typesetter: Arc<dyn Typesetter>,
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self::new(Arc::new(ComrakEngine::default()), Arc::new(PassthroughTypesetter))
    }
}

impl RenderPipeline {
    pub fn new(engine: Arc<dyn MarkdownEngine>, typesetter: Arc<dyn Typesetter>) -> Self {
        Self { engine, typesetter }
    }

    /// Render `text` to HTML.
    ///
    /// Never fails: if typesetting fails the error is logged and the
    /// untypeset HTML is returned, so the rest of the document still shows.
    pub async fn render(&self, text: &str) -> String {
        let html = render_markdown_html(self.engine.as_ref(), text);
        match self.typesetter.typeset(html.clone()).await {
            Ok(typeset) => typeset,
            Err(e) => {
                warn!("{}", e);
                html
            }
        }
    }
}
