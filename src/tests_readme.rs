// #![include_doc("../README.md", start)]
//! # sigtree
//!
//! [![Crates.io](https://img.shields.io/crates/v/sigtree.svg)](https://crates.io/crates/sigtree)
//! [![Docs.rs](https://docs.rs/sigtree/badge.svg)](https://docs.rs/sigtree/)
//!
//! Fine-grained reactive ownership tree for declarative user interfaces.
//!
//! - `State` / `Signal`: reactive values with automatic dependency tracking.
//! - `root` / `cleanup` / `effect`: an ownership tree of scopes; disposing a scope stops everything created in it.
//! - `memo`, `create_selector`: derived values and key-based fan-out.
//! - `create_context` / `use_context` / `Context::provider`: values scoped to a subtree.
//! - `resolve_children`: flattens static, dynamic and nested children.
//! - `map`: keyed list reconciliation that reuses the mapped value and scope of every item still present.
//!
//! ## Example
//!
//! ```rust
//! use sigtree::{map, root, Runtime, State};
//!
//! let mut rt = Runtime::new();
//! let list = State::new(vec!["a", "b"]);
//! let list0 = list.clone();
//! let (mapped, dispose) = root(&mut rt.sc(), |sc, dispose| {
//!     let mapped = map(sc, move |sc| list0.get(sc), |_, item, _| item.to_uppercase());
//!     (mapped, dispose)
//! });
//! assert_eq!(mapped.get(&mut rt.sc()), ["A", "B"]);
//!
//! list.set(vec!["b", "c"]);
//! assert_eq!(mapped.get(&mut rt.sc()), ["B", "C"]);
//! dispose.dispose();
//! ```
//!
//! ## License
//!
//! This project is dual licensed under Apache-2.0/MIT.
//!
//! ## Contribution
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted for inclusion in the work by you, as defined in the Apache-2.0 license, shall be dual licensed as above, without any additional terms or conditions.
// #![include_doc("../README.md", end)]
