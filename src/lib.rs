//! proto-table: a single-threaded table of named slots for emulating
//! prototype-style objects, with explicit per-slot ownership.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a string-keyed slot store whose release rules are carried by
//!   the slot itself, so overwrite and teardown cannot leak or double-free.
//! - Layers:
//!   - `hash`: djb2 over identifier bytes, used only for bucket selection.
//!   - `payload`: the four slot kinds (`Callable`, `OwnedValue`,
//!     `OwnedHandle`, `UnmanagedValue`) and their release rules.
//!   - `node_store`: per-bucket binary search trees in one generational
//!     arena; insert-or-update, lookup, in-order walk, teardown.
//!   - `Prototype<S>`: fixed array of bucket roots plus lifecycle
//!     (idempotent teardown, also run on drop).
//!   - `fields`: typed helpers for declaring and reading fields and
//!     methods.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` (callables are `Rc`, destructors
//!   are not `Send`).
//! - Bucket count is fixed at construction. No rehashing.
//! - Identifiers are unique per table. Inserting an existing identifier
//!   replaces its payload, whatever the old and new kinds are; the old
//!   payload is released with its own destructor before `insert` returns.
//! - Inline slots are `INLINE_WIDTH` bytes; only `Inline` types, checked
//!   at compile time, are stored there.
//!
//! Release rules
//! - `Callable`: dropped, no destructor.
//! - `OwnedValue`: boxed; destructor receives the box, or it is dropped.
//! - `OwnedHandle`: inline; destructor receives the value if supplied.
//! - `UnmanagedValue`: inline; nothing runs.
//!
//! Handles
//! - `insert` and `find` return a `Handle`, a generational arena key
//!   stamped with the issuing table's id. It stays valid across overwrites
//!   of its slot and resolves to `None` after teardown or against any
//!   other table.
//! - `lookup` returns a `SlotRef` shaped by kind: callables and boxed
//!   values directly, inline kinds as their slot.
//!
//! Notes and non-goals
//! - No removal of individual slots, no resizing, no persistence.
//! - Typed accessors check kind and Rust type; raw inline slots are not
//!   tagged with the type written into them.

mod error;
mod fields;
pub mod hash;
pub mod inline;
mod node_store;
mod node_store_proptest;
pub mod payload;
mod prototype;

// Public surface
pub use error::{Result, TableError};
pub use inline::{Inline, InlineValue, INLINE_WIDTH};
pub use payload::{Destructor, Kind, Method, Payload, SlotMut, SlotRef};
pub use prototype::{Handle, Prototype, DEFAULT_BUCKET_COUNT};
