//! Template rendering for archetype files.
//!
//! File names and text contents are both Handlebars templates evaluated
//! against the run's bound [`TemplateContext`](crate::binder::TemplateContext).
//! The engine is configured once per run by [`renderer::TemplateRenderer`]
//! and never mutated afterwards; [`helpers`] holds the function library.

pub mod helpers;
pub mod renderer;

pub use renderer::TemplateRenderer;
