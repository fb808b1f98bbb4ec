//! Structured backing storage for heap-allocated runtime values.
//!
//! Trimmed to what this interpreter's value model (spec.md §3) actually
//! needs: `class`/`dict`/`set` hold their own internal storage shape, and
//! `generator` holds the suspended-frame state for generators and
//! coroutines (spec.md §4.6). Everything the teacher's `types/` carries for
//! its much larger standard-library surface (`decimal`, `fraction`,
//! `datetime`, `path`, `re`, ...) has no counterpart in spec.md's scope and
//! was dropped; see `DESIGN.md`.

pub mod class;
pub mod dict;
pub mod generator;
pub mod iterator;
pub mod set;
