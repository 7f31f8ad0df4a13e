//! Reactive filtered, searched and merged list views
//!
//! Built on the *View-Projection* model: a *View* is an accessor interface that also
//! defines its update protocol (the diff), *Observers* register on a view and are
//! notified with diff messages, and *Projections* transform one view into another,
//! updating *incrementally* from the diffs of their source.
//!
//! This crate provides
//! - [`buffer::rows::RowBuffer`], an in-memory source feed of records,
//! - [`projection::filter_list::Projection`], a filtered or searched subset of a feed
//!   that keeps a sorted visible-row → source-row mapping in sync with every source
//!   mutation and narrows/widens without a full rebuild,
//! - [`projection::merge_list::MergeEngine`], which merges several projections into one
//!   deduplicated, priority-ordered list,
//! - [`projection::concat_list::CompositeList`], which lists several projections
//!   one after another.
//!
//! Notifications are delivered synchronously, in order, as range-based
//! [`view::list::ListDiff`] messages. A projection delivers once its lock is
//! released, so observers may read it from their `notify`.
//!
//!# Examples
//!
//! ```
//! use r3vi_search::{
//!     buffer::rows::RowBuffer,
//!     predicate::search::SearchPredicate,
//!     view::list::ListView,
//! };
//!
//! let mut fruit = RowBuffer::with_data(vec![
//!     "apple".to_string(),
//!     "banana".to_string(),
//!     "apricot".to_string(),
//! ]);
//!
//! let (search, port) = fruit.get_port().project(SearchPredicate::new(&["text"], "ap"));
//! assert_eq!(port.get_view().map(|v| v.len()), Some(2));
//!
//! search.set_pattern("apr");
//! assert_eq!(port.get_view().map(|v| v.len()), Some(1));
//!
//! fruit.push("aprons".to_string());
//! assert_eq!(port.get_view().map(|v| v.len()), Some(2));
//! ```

pub mod error;
pub mod view;
pub mod buffer;
pub mod predicate;
pub mod projection;

pub use error::{Error, Result};
