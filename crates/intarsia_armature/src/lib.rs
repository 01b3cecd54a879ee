//! Armature - the DOM skeleton for Intarsia.
//!
//! This crate provides the structural half of the runtime: an arena-backed
//! [`Document`] with element, text and comment nodes, a lenient HTML fragment
//! tokenizer/parser, a depth-first [`TreeWalker`], HTML serialization, and
//! event listener plumbing with bubbling dispatch.
//!
//! The template engine in `intarsia_fresco` builds its static skeletons out of
//! these pieces and mutates live documents through them.

pub mod dom;
pub mod event;
pub mod parser;
pub mod serialize;
pub mod tokenizer;
pub mod walker;

pub use dom::{
    clone_into, Attribute, Document, DocumentHandle, ElementData, NodeData, NodeId, PropValue,
};
pub use event::{dispatch_custom, dispatch_event, Event, EventHandler, ListenerId};
pub use parser::{parse_fragment, ParseOptions};
pub use serialize::{inner_html, outer_html};
pub use walker::{NodeFilter, TreeWalker};

/// Armature version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
