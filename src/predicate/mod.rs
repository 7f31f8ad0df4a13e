pub mod filter;
pub mod search;
pub mod tokenize;

use {
    crate::view::feed::{FieldId, SourceFeed},
    log::warn,
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// How a new predicate relates to the one it replaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    /// Nothing can be concluded, the projection rebuilds.
    Unrelated,
    /// Every row the new predicate accepts was accepted before.
    Narrowing,
    /// Every row accepted before is still accepted.
    Widening,
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                 Predicate
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Row test of a [`Projection`](crate::projection::filter_list::Projection).
///
/// `accepts` takes `&mut self` so implementations can resolve field names and
/// cache per-row data lazily. The `rows_*` hooks keep such caches aligned with
/// the source; they run before the projection evaluates the affected rows.
pub trait Predicate: Send + Sync + 'static {
    /// `false` if every row passes, in which case the projection is the identity.
    fn is_filtering(&self) -> bool;

    fn accepts(&mut self, feed: &dyn SourceFeed, row: usize) -> bool;

    /// The projection was (re)bound to `feed`; drop resolved fields and caches.
    fn bind(&mut self, _feed: Option<&dyn SourceFeed>) {}

    fn rows_inserted(&mut self, _first: usize, _count: usize) {}
    fn rows_removed(&mut self, _first: usize, _count: usize) {}
    fn rows_moved(&mut self, _first: usize, _count: usize, _dest: usize) {}
    fn rows_changed(&mut self, _first: usize, _count: usize) {}
    fn rows_cleared(&mut self) {}
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Field named by a criterion, resolved against the bound feed on first use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldRef {
    Unresolved(String),
    /// `id` is `None` if the feed has no such field.
    Resolved { name: String, id: Option<FieldId> },
}

impl FieldRef {
    pub fn new(name: impl Into<String>) -> Self {
        FieldRef::Unresolved(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            FieldRef::Unresolved(name) | FieldRef::Resolved { name, .. } => name,
        }
    }

    pub fn resolve(&mut self, feed: &dyn SourceFeed) -> Option<FieldId> {
        match self {
            FieldRef::Resolved { id, .. } => *id,
            FieldRef::Unresolved(name) => {
                let id = feed.fields().id_of(name);
                if id.is_none() {
                    warn!("feed {:?} has no field named {:?}", feed.feed_id(), name);
                }
                *self = FieldRef::Resolved {
                    name: std::mem::take(name),
                    id,
                };
                id
            }
        }
    }

    pub fn unresolve(&mut self) {
        if let FieldRef::Resolved { name, .. } = self {
            *self = FieldRef::Unresolved(std::mem::take(name));
        }
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Predicate from a plain function of `(feed, row)`.
pub struct FnPredicate<F>
where
    F: Fn(&dyn SourceFeed, usize) -> bool + Send + Sync + 'static,
{
    f: F,
}

impl<F> FnPredicate<F>
where
    F: Fn(&dyn SourceFeed, usize) -> bool + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        FnPredicate { f }
    }
}

impl<F> Predicate for FnPredicate<F>
where
    F: Fn(&dyn SourceFeed, usize) -> bool + Send + Sync + 'static,
{
    fn is_filtering(&self) -> bool {
        true
    }

    fn accepts(&mut self, feed: &dyn SourceFeed, row: usize) -> bool {
        (self.f)(feed, row)
    }
}

/// Accepts every row.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl Predicate for AcceptAll {
    fn is_filtering(&self) -> bool {
        false
    }

    fn accepts(&mut self, _feed: &dyn SourceFeed, _row: usize) -> bool {
        true
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[cfg(test)]
mod tests {
    use {
        super::FieldRef,
        crate::{buffer::rows::RowBuffer, view::feed::FieldId},
    };

    #[test]
    fn field_ref_resolves_once_per_bind() {
        let buf = RowBuffer::with_data(vec!["a".to_string()]);
        let feed = buf.get_port().get_view().unwrap();

        let mut known = FieldRef::new("text");
        assert_eq!(known.resolve(&*feed), Some(FieldId(0)));
        assert_eq!(known, FieldRef::Resolved { name: "text".into(), id: Some(FieldId(0)) });

        let mut missing = FieldRef::new("phone");
        assert_eq!(missing.resolve(&*feed), None);
        assert_eq!(missing.resolve(&*feed), None);
        assert_eq!(missing.name(), "phone");

        known.unresolve();
        assert_eq!(known, FieldRef::Unresolved("text".into()));
    }
}
