pub mod value;

pub use value::Value;

use {
    crate::view::View,
    serde::{Deserialize, Serialize},
    std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Identifies one source feed for the lifetime of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeedId(pub u64);

impl FeedId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        FeedId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Key a feed assigns to a row when it enters the feed.
/// It survives insertions, removals and moves of other rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowKey(pub u64);

/// The item behind a source row, independent of its current position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowIdentity {
    pub feed: FeedId,
    pub key: RowKey,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldId(pub usize);

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Enumerable field id ↔ name table of a feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldTable {
    names: Arc<[String]>,
}

impl FieldTable {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        FieldTable {
            names: names.iter().map(|n| n.as_ref().to_string()).collect(),
        }
    }

    pub fn empty() -> Self {
        FieldTable::new::<&str>(&[])
    }

    pub fn id_of(&self, name: &str) -> Option<FieldId> {
        self.names.iter().position(|n| n == name).map(FieldId)
    }

    pub fn name_of(&self, id: FieldId) -> Option<&str> {
        self.names.get(id.0).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldId, &str)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(|(i, n)| (FieldId(i), n.as_str()))
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Row type stored in a [`RowBuffer`](crate::buffer::rows::RowBuffer).
pub trait Record: Clone + Send + Sync + 'static {
    fn field_names() -> &'static [&'static str];
    fn field(&self, id: FieldId) -> Value;
}

impl Record for String {
    fn field_names() -> &'static [&'static str] {
        &["text"]
    }

    fn field(&self, id: FieldId) -> Value {
        match id.0 {
            0 => Value::Text(self.clone()),
            _ => Value::Null,
        }
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Change notification of a source feed, emitted after the mutation happened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FeedDiff {
    /// Contents replaced wholesale.
    Reset,
    Inserted { first: usize, count: usize },
    /// Rows `first..=last` are gone.
    Removed { first: usize, last: usize },
    /// Rows `first..=last` now sit before what was row `dest` prior to the move.
    Moved { first: usize, last: usize, dest: usize },
    /// Field values of rows `first..=last` changed; an empty `fields` means all.
    Changed { first: usize, last: usize, fields: Vec<String> },
    Populated(bool),
    /// A mutation inside the child container of row `parent`.
    Nested { parent: usize, diff: Box<FeedDiff> },
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                Source Feed
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
pub trait SourceFeed: View<Msg = FeedDiff> {
    fn feed_id(&self) -> FeedId;
    fn row_count(&self) -> usize;
    fn fields(&self) -> FieldTable;
    fn read(&self, row: usize, field: FieldId) -> Option<Value>;
    fn row_key(&self, row: usize) -> Option<RowKey>;

    /// Feeds that load asynchronously report `false` until their initial
    /// contents are in place.
    fn is_populated(&self) -> bool {
        true
    }

    fn read_by_name(&self, row: usize, field: &str) -> Option<Value> {
        self.read(row, self.fields().id_of(field)?)
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
