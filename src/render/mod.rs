//! Markdown preview: loading, image-link rewriting, math-safe rendering.
//!
//! ## Render pass
//!
//! ```text
//! raw Markdown
//!  │
//!  ├─ 1. Rewrite   relative image links → files-prefix URLs
//!  ├─ 2. Protect   $$…$$ then $…$ → placeholder tokens
//!  ├─ 3. Parse     Markdown → HTML (comrak, GFM, hard breaks, raw HTML escaped)
//!  ├─ 4. Restore   block tokens, then inline tokens → original math
//!  └─ 5. Typeset   math → final form (failures logged, HTML kept)
//! ```

mod debounce;
mod engine;
mod math;
mod paths;
mod renderer;

pub use debounce::Debouncer;
pub use engine::{
    render_markdown_html, ComrakEngine, MarkdownEngine, PassthroughTypesetter, RenderPipeline,
    Typesetter,
};
pub use math::{protect_math, ProtectedText};
pub use paths::rewrite_image_paths;
pub use renderer::{LoadNotice, MarkdownRenderer, Preview, RenderState};
