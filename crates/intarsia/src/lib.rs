//! # Intarsia
//!
//! A client-side UI component runtime: templates written as tagged literals
//! are parsed once into static DOM skeletons with dynamic-value locations
//! ("parts"), cloned per instance, and incrementally updated in place. A
//! reactive property system batches writes into microtask-timed flushes
//! that drive re-rendering.
//!
//! This crate re-exports all Intarsia sub-crates for unified documentation:
//!
//! - [`armature`] - arena DOM, fragment parser, tree walker, events
//! - [`fresco`] - scheduler, template engine, parts, reactivity, components
//! - [`musea`] - presentational widgets (radio, checkbox, button, progress,
//!   poll)

pub use intarsia_armature as armature;
pub use intarsia_fresco as fresco;
pub use intarsia_musea as musea;

pub use intarsia_fresco::{html, html_ext, svg, template_strings};

/// Intarsia version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
