//! Fresco - the Intarsia rendering runtime.
//!
//! Templates are written as tagged literals over static string segments; the
//! engine parses each distinct literal once into a reusable [`Template`]
//! (a static DOM skeleton plus ordered part descriptors), clones it per use,
//! and on every update writes only changed values back into the live tree.
//!
//! # Architecture
//!
//! ```text
//! property write ──▶ reactive core ──▶ microtask flush ──▶ render hook
//!                                                              │
//!                                                              ▼
//!                 live DOM ◀── parts ◀── TemplateInstance ◀── render()
//! ```
//!
//! - [`schedule`] - microtask batching queue
//! - [`value`] - the bindable [`Value`] sum type, directives, eventual values
//! - [`template`] - template parse, instances and parts
//! - [`render`] - render entry point, template cache, scoped styles
//! - [`properties`] - reactive property core
//! - [`element`] - component base and host shell

pub mod element;
pub mod properties;
pub mod render;
pub mod schedule;
pub mod template;
pub mod value;

pub use element::{
    with_style, with_style_link, Component, Element, ElementRef, PropertySnapshot,
};
pub use properties::{PropertyDeclarations, PropertyType, ReactiveProperties};
pub use render::{render, reset_render_registry, set_style_registry, StyleRegistry};
pub use schedule::{microtask, ScheduleError, TaskHandle};
pub use template::{
    PartStrategy, Template, TemplateError, TemplateInstance, TemplateKind, TemplateResult,
    TemplateStrings,
};
pub use value::{
    class_string, Directive, DirectiveLocation, DirectiveScope, Eventual, Listener, Value,
};

/// Fresco version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
