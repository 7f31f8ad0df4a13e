pub mod sync;

use {
    crate::{
        error::Result,
        view::{feed::{RowIdentity, Value}, View},
    },
    serde::{Deserialize, Serialize},
    std::collections::BTreeMap,
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Range based list diff.
///
/// Indices of each message refer to the list as left behind by the previous
/// message. `Remove` carries the removed items so observers never have to
/// read them back from the emitter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ListDiff<T>
where T: Clone + Send + Sync + 'static
{
    Reset(Vec<T>),
    Insert { idx: usize, vals: Vec<T> },
    Remove { idx: usize, vals: Vec<T> },
    /// Items `idx..idx+count` now sit before what was item `dest` prior to the move.
    Move { idx: usize, count: usize, dest: usize },
    /// Field values of items `idx..idx+count` changed; an empty `fields` means all.
    Change { idx: usize, count: usize, fields: Vec<String> },
    /// Row count after a structural change that altered it.
    Count(usize),
    Populated(bool),
}

impl<T> ListDiff<T>
where T: Clone + Send + Sync + 'static
{
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ListDiff::Reset(_) | ListDiff::Insert { .. } | ListDiff::Remove { .. } | ListDiff::Move { .. }
        )
    }

    /// Replays the diff on a mirror of the emitting list.
    ///
    /// # Panics
    /// If the indices do not fit `target`, i.e. the mirror is out of sync.
    pub fn apply(&self, target: &mut Vec<T>) {
        match self {
            ListDiff::Reset(vals) => {
                *target = vals.clone();
            }
            ListDiff::Insert { idx, vals } => {
                target.splice(*idx..*idx, vals.iter().cloned());
            }
            ListDiff::Remove { idx, vals } => {
                target.drain(*idx..*idx + vals.len());
            }
            ListDiff::Move { idx, count, dest } => {
                let block: Vec<T> = target.drain(*idx..*idx + *count).collect();
                let at = if *dest > *idx { *dest - *count } else { *dest };
                target.splice(at..at, block);
            }
            ListDiff::Change { .. } | ListDiff::Count(_) | ListDiff::Populated(_) => {}
        }
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

pub trait ListView<Item>: View<Msg = ListDiff<Item>>
where Item: Clone + Send + Sync + 'static
{
    fn len(&self) -> usize;
    fn get(&self, idx: &usize) -> Option<Item>;

    /// Field value of the row at `idx`, `Ok(None)` for unknown fields.
    fn field(&self, idx: usize, field: &str) -> Result<Option<Value>>;

    /// All non-null field values of the row at `idx`, by name.
    fn fields(&self, idx: usize) -> Result<BTreeMap<String, Value>>;

    fn is_populated(&self) -> bool {
        true
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A filtered subset of one source feed.
pub trait ProjectionView: ListView<RowIdentity> {
    fn source_row_of(&self, idx: usize) -> Result<usize>;
    fn visible_index_of(&self, source_row: usize) -> Option<usize>;

    /// Whether the predicate can reject rows at all.
    fn is_filtered(&self) -> bool;
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

pub trait ListViewExt<T>: ListView<T>
where T: Clone + Send + Sync + 'static
{
    fn iter<'a>(&'a self) -> ListViewIter<'a, T, Self> {
        ListViewIter { _phantom: std::marker::PhantomData, view: self, cur: 0 }
    }
}

impl<T, V: ListView<T> + ?Sized> ListViewExt<T> for V
where T: Clone + Send + Sync + 'static
{}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

pub struct ListViewIter<'a, T, V>
where
    T: Clone + Send + Sync + 'static,
    V: ListView<T> + ?Sized,
{
    _phantom: std::marker::PhantomData<T>,
    view: &'a V,
    cur: usize,
}

impl<'a, T, V> Iterator for ListViewIter<'a, T, V>
where
    T: Clone + Send + Sync + 'static,
    V: ListView<T> + ?Sized,
{
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.cur;
        self.cur += 1;
        self.view.get(&i)
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

use std::sync::RwLock;

impl<Item: Clone + Send + Sync + 'static, V: ListView<Item> + ?Sized> ListView<Item> for RwLock<V> {
    fn len(&self) -> usize {
        self.read().unwrap().len()
    }

    fn get(&self, idx: &usize) -> Option<Item> {
        self.read().unwrap().get(idx)
    }

    fn field(&self, idx: usize, field: &str) -> Result<Option<Value>> {
        self.read().unwrap().field(idx, field)
    }

    fn fields(&self, idx: usize) -> Result<BTreeMap<String, Value>> {
        self.read().unwrap().fields(idx)
    }

    fn is_populated(&self) -> bool {
        self.read().unwrap().is_populated()
    }
}

impl<V: ProjectionView + ?Sized> ProjectionView for RwLock<V> {
    fn source_row_of(&self, idx: usize) -> Result<usize> {
        self.read().unwrap().source_row_of(idx)
    }

    fn visible_index_of(&self, source_row: usize) -> Option<usize> {
        self.read().unwrap().visible_index_of(source_row)
    }

    fn is_filtered(&self) -> bool {
        self.read().unwrap().is_filtered()
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
