use {
    crate::{
        error::{Error, Result},
        view::{
            feed::{FeedDiff, FeedId, FieldId, FieldTable, Record, RowKey, SourceFeed, Value},
            InnerViewPort, OuterViewPort, View, ViewPort,
        },
    },
    serde::{Deserialize, Serialize},
    std::sync::{Arc, RwLock},
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Mutation of a [`RowBuffer`], carrying the new row values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum RowDiff<R> {
    Clear,
    Reset(Vec<R>),
    Push(R),
    Insert { idx: usize, vals: Vec<R> },
    Remove { first: usize, last: usize },
    Move { first: usize, last: usize, dest: usize },
    Update { idx: usize, val: R },
    Populated(bool),
}

struct RowState<R> {
    rows: Vec<(RowKey, R)>,
    next_key: u64,
    populated: bool,
}

impl<R> RowState<R> {
    fn keyed(&mut self, vals: impl IntoIterator<Item = R>) -> Vec<(RowKey, R)> {
        vals.into_iter()
            .map(|val| {
                let key = RowKey(self.next_key);
                self.next_key += 1;
                (key, val)
            })
            .collect()
    }
}

/// The data behind a [`RowBuffer`] port.
pub struct RowBufferView<R: Record> {
    id: FeedId,
    fields: FieldTable,
    state: RwLock<RowState<R>>,
}

impl<R: Record> View for RowBufferView<R> {
    type Msg = FeedDiff;
}

impl<R: Record> SourceFeed for RowBufferView<R> {
    fn feed_id(&self) -> FeedId {
        self.id
    }

    fn row_count(&self) -> usize {
        self.state.read().unwrap().rows.len()
    }

    fn fields(&self) -> FieldTable {
        self.fields.clone()
    }

    fn read(&self, row: usize, field: FieldId) -> Option<Value> {
        if field.0 >= self.fields.len() {
            return None;
        }
        self.state.read().unwrap().rows.get(row).map(|(_, r)| r.field(field))
    }

    fn row_key(&self, row: usize) -> Option<RowKey> {
        self.state.read().unwrap().rows.get(row).map(|(key, _)| *key)
    }

    fn is_populated(&self) -> bool {
        self.state.read().unwrap().populated
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// In-memory source feed of records.
///
/// Every mutation is applied under the data lock, the lock is released and
/// only then the matching [`FeedDiff`] is emitted, so observers may read the
/// buffer from their `notify`.
pub struct RowBuffer<R: Record> {
    data: Arc<RowBufferView<R>>,
    port: InnerViewPort<dyn SourceFeed>,
}

impl<R: Record> Clone for RowBuffer<R> {
    fn clone(&self) -> Self {
        RowBuffer {
            data: self.data.clone(),
            port: self.port.clone(),
        }
    }
}

impl<R: Record> RowBuffer<R> {
    pub fn with_data_port(data: Vec<R>, populated: bool, port: InnerViewPort<dyn SourceFeed>) -> Self {
        let mut state = RowState {
            rows: vec![],
            next_key: 0,
            populated,
        };
        state.rows = state.keyed(data);

        let data = Arc::new(RowBufferView {
            id: FeedId::next(),
            fields: FieldTable::new(R::field_names()),
            state: RwLock::new(state),
        });
        port.set_view(Some(data.clone()));

        RowBuffer { data, port }
    }

    pub fn with_data(data: Vec<R>) -> Self {
        RowBuffer::with_data_port(data, true, ViewPort::new().into_inner())
    }

    pub fn new() -> Self {
        RowBuffer::with_data(vec![])
    }

    /// A buffer whose initial contents are still loading.
    pub fn unpopulated() -> Self {
        RowBuffer::with_data_port(vec![], false, ViewPort::new().into_inner())
    }

    pub fn get_port(&self) -> OuterViewPort<dyn SourceFeed> {
        self.port.0.outer()
    }

    pub fn feed_id(&self) -> FeedId {
        self.data.id
    }

    pub fn apply_diff(&mut self, diff: RowDiff<R>) -> Result<()> {
        let mut state = self.data.state.write().unwrap();
        let len = state.rows.len();

        let msg = match diff {
            RowDiff::Clear => {
                state.rows.clear();
                FeedDiff::Reset
            }
            RowDiff::Reset(vals) => {
                state.rows = state.keyed(vals);
                FeedDiff::Reset
            }
            RowDiff::Push(val) => {
                let row = state.keyed(Some(val));
                state.rows.extend(row);
                FeedDiff::Inserted { first: len, count: 1 }
            }
            RowDiff::Insert { idx, vals } => {
                if idx > len {
                    return Err(Error::out_of_range(idx, len));
                }
                let count = vals.len();
                let rows = state.keyed(vals);
                state.rows.splice(idx..idx, rows);
                if count == 0 {
                    return Ok(());
                }
                FeedDiff::Inserted { first: idx, count }
            }
            RowDiff::Remove { first, last } => {
                if first > last || last >= len {
                    return Err(Error::out_of_range(last, len));
                }
                state.rows.drain(first..=last);
                FeedDiff::Removed { first, last }
            }
            RowDiff::Move { first, last, dest } => {
                if first > last || last >= len {
                    return Err(Error::out_of_range(last, len));
                }
                if dest > len {
                    return Err(Error::out_of_range(dest, len));
                }
                if dest >= first && dest <= last + 1 {
                    // rows stay where they are
                    return Ok(());
                }
                let block: Vec<_> = state.rows.drain(first..=last).collect();
                let at = if dest > last { dest - block.len() } else { dest };
                state.rows.splice(at..at, block);
                FeedDiff::Moved { first, last, dest }
            }
            RowDiff::Update { idx, val } => {
                match state.rows.get_mut(idx) {
                    Some((_, row)) => *row = val,
                    None => return Err(Error::out_of_range(idx, len)),
                }
                FeedDiff::Changed { first: idx, last: idx, fields: vec![] }
            }
            RowDiff::Populated(populated) => {
                if state.populated == populated {
                    return Ok(());
                }
                state.populated = populated;
                FeedDiff::Populated(populated)
            }
        };
        drop(state);

        self.port.notify(&msg);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.row_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, idx: usize) -> Option<R> {
        self.data.state.read().unwrap().rows.get(idx).map(|(_, r)| r.clone())
    }

    pub fn to_vec(&self) -> Vec<R> {
        self.data.state.read().unwrap().rows.iter().map(|(_, r)| r.clone()).collect()
    }

    pub fn clear(&mut self) {
        let _ = self.apply_diff(RowDiff::Clear);
    }

    pub fn reset(&mut self, vals: Vec<R>) {
        let _ = self.apply_diff(RowDiff::Reset(vals));
    }

    pub fn push(&mut self, val: R) {
        let _ = self.apply_diff(RowDiff::Push(val));
    }

    pub fn insert(&mut self, idx: usize, val: R) -> Result<()> {
        self.apply_diff(RowDiff::Insert { idx, vals: vec![val] })
    }

    pub fn insert_many(&mut self, idx: usize, vals: Vec<R>) -> Result<()> {
        self.apply_diff(RowDiff::Insert { idx, vals })
    }

    pub fn remove(&mut self, idx: usize) -> Result<()> {
        self.apply_diff(RowDiff::Remove { first: idx, last: idx })
    }

    pub fn remove_range(&mut self, first: usize, last: usize) -> Result<()> {
        self.apply_diff(RowDiff::Remove { first, last })
    }

    /// Moves rows `first..=last` before row `dest` (counted before the move).
    pub fn move_rows(&mut self, first: usize, last: usize, dest: usize) -> Result<()> {
        self.apply_diff(RowDiff::Move { first, last, dest })
    }

    pub fn update(&mut self, idx: usize, val: R) -> Result<()> {
        self.apply_diff(RowDiff::Update { idx, val })
    }

    pub fn set_populated(&mut self, populated: bool) {
        let _ = self.apply_diff(RowDiff::Populated(populated));
    }
}

impl<R: Record + PartialEq> RowBuffer<R> {
    /// Index of the first row equal to `val`.
    pub fn position(&self, val: &R) -> Option<usize> {
        self.data.state.read().unwrap().rows.iter().position(|(_, r)| r == val)
    }

    /// Removes the first row equal to `val`, `false` if there is none.
    pub fn remove_item(&mut self, val: &R) -> bool {
        match self.position(val) {
            Some(idx) => self.remove(idx).is_ok(),
            None => false,
        }
    }
}

impl<R: Record> Default for RowBuffer<R> {
    fn default() -> Self {
        RowBuffer::new()
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
