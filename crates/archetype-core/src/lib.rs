//! Core library for the archetype toolkit.
//!
//! An *archetype* is a template repository: a tree of files whose names and
//! contents are Handlebars templates, plus a `.archetype/metadata.yml`
//! declaring the parameters it accepts. Materializing it means binding
//! user settings against that schema and rendering every file into an
//! output directory.
//!
//! The pipeline, per run:
//!
//! 1. [`source::open_snapshot`] opens a local directory or a git commit
//! 2. [`metadata::Metadata::load`] reads the parameter schema
//! 3. [`binder::bind`] validates [`metadata::Settings`] into a
//!    [`binder::TemplateContext`]
//! 4. [`materialize::Materializer`] filters ([`filter`]), classifies
//!    ([`classify`]) and renders ([`render`]) each file
//!
//! [`escape`] and [`prepare`] provide the reverse direction: neutralizing
//! literal template syntax so it survives materialization.

pub mod binder;
pub mod classify;
pub mod config;
pub mod error;
pub mod escape;
pub mod filter;
pub mod materialize;
pub mod metadata;
pub mod prepare;
pub mod render;
pub mod source;
pub mod style;
pub mod value;
