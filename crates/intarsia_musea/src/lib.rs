//! Musea - presentational widgets built on the Intarsia runtime.
//!
//! Thin consumers of the template macros and the property/attribute
//! declaration mechanism: stateless template functions for radio, checkbox,
//! button and progress markup, and the stateful [`Poll`] component that
//! composes them.

pub mod button;
pub mod checkbox;
pub mod poll;
pub mod progress;
pub mod radio;
pub mod util;

pub use button::{button, ButtonArgs};
pub use checkbox::{checkbox, CheckboxArgs};
pub use poll::{Poll, PollItem};
pub use progress::{progress, ProgressArgs};
pub use radio::{radio, RadioArgs};
pub use util::cn;
