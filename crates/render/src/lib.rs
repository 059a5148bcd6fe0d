//! Report renderers.
//!
//! [`Renderer`] is the contract the job pipeline dispatches to for each
//! platform/template pair; [`MarkdownRenderer`] is the built-in implementation.

pub mod markdown;
pub mod templating;
pub mod traits;

pub use markdown::MarkdownRenderer;
pub use templating::{ReportContext, TemplateRenderer};
pub use traits::{ProgressFn, RenderError, RenderRequest, Renderer};
