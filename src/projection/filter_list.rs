use {
    crate::{
        error::{Error, Result},
        predicate::{
            filter::{Criterion, FilterPredicate, Requirement},
            search::SearchPredicate,
            tokenize::MatchMode,
            Predicate, Relation,
        },
        projection::projection_helper::{Emitter, Handle, ProjectionHelper},
        view::{
            feed::{FeedDiff, FeedId, RowIdentity, RowKey, SourceFeed, Value},
            list::{ListDiff, ListView, ProjectionView},
            InnerViewPort, Outbox, OuterViewPort, View, ViewPort,
        },
    },
    log::{debug, error, trace, warn},
    std::{
        collections::BTreeMap,
        sync::{Arc, RwLock},
    },
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

impl OuterViewPort<dyn SourceFeed> {
    /// Projects the rows of this feed accepted by `predicate`.
    ///
    /// The returned handle adjusts the predicate, the port exposes the
    /// projected list.
    pub fn project<P: Predicate>(
        &self,
        predicate: P,
    ) -> (Handle<Projection<P>>, OuterViewPort<dyn ProjectionView>) {
        let port = ViewPort::new();
        let proj = Projection::new(predicate, port.inner());
        proj.set_source(Some(self.clone()));
        (proj, port.into_outer())
    }
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                Projection
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Sorted subset of the rows of one source feed.
///
/// `mapping[i]` is the source row shown at visible index `i`. It is strictly
/// increasing and renumbered with every source mutation, so it always equals
/// what a full rebuild would produce. `keys` runs parallel to `mapping` and
/// holds the row keys, which make up the identities of the visible rows and
/// are needed to describe removed rows after the feed has dropped them.
pub struct Projection<P: Predicate> {
    feed: Option<Arc<dyn SourceFeed>>,
    feed_id: FeedId,
    predicate: P,

    mapping: Vec<usize>,
    keys: Vec<RowKey>,
    populated: bool,

    outbox: Outbox<dyn ProjectionView>,
    proj_helper: ProjectionHelper<(), Self>,
}

impl<P: Predicate> Projection<P> {
    pub fn new(predicate: P, port: InnerViewPort<dyn ProjectionView>) -> Handle<Self> {
        let proj = Arc::new(RwLock::new(Projection {
            feed: None,
            feed_id: FeedId(0),
            predicate,
            mapping: Vec::new(),
            keys: Vec::new(),
            populated: false,
            outbox: port.outbox(),
            proj_helper: ProjectionHelper::new(),
        }));

        proj.write().unwrap().proj_helper.set_proj(&proj);
        port.set_view(Some(proj.clone()));
        Handle::new(proj)
    }

    /// Binds the projection to another feed (or none) and rebuilds.
    pub fn set_source(&mut self, source: Option<OuterViewPort<dyn SourceFeed>>) {
        let feed = match source {
            Some(port) => self.proj_helper.new_arg(
                (),
                port,
                |p: &mut Self, diff| p.on_feed_diff(diff),
                |p: &mut Self, feed| p.bind(feed),
            ),
            None => {
                self.proj_helper.remove_arg(&());
                None
            }
        };
        self.bind(feed);
    }

    fn bind(&mut self, feed: Option<Arc<dyn SourceFeed>>) {
        self.feed_id = feed.as_ref().map_or(FeedId(0), |f| f.feed_id());
        self.feed = feed;
        self.predicate.bind(self.feed.as_deref());

        let populated = self.feed.as_ref().map_or(false, |f| f.is_populated());
        let was_populated = self.populated;
        self.populated = populated;
        self.rebuild();

        if populated != was_populated {
            self.emit(ListDiff::Populated(populated));
        }
    }

    pub fn source(&self) -> Option<Arc<dyn SourceFeed>> {
        self.feed.clone()
    }

    pub fn predicate(&self) -> &P {
        &self.predicate
    }

    /// Visible index → source row.
    pub fn mapping(&self) -> &[usize] {
        &self.mapping
    }

    /// Replaces the predicate and re-filters according to how the new
    /// predicate relates to the old one.
    pub fn set_predicate(&mut self, predicate: P, relation: Relation) {
        self.predicate = predicate;
        self.predicate.bind(self.feed.as_deref());
        self.reevaluate(relation);
    }

    /// Adjusts the predicate in place. `f` reports how the adjusted predicate
    /// relates to the previous one, or `None` if nothing changed.
    pub fn update_predicate(&mut self, f: impl FnOnce(&mut P) -> Option<Relation>) {
        if let Some(relation) = f(&mut self.predicate) {
            self.reevaluate(relation);
        }
    }

    fn reevaluate(&mut self, relation: Relation) {
        match relation {
            Relation::Narrowing => self.refine(),
            Relation::Widening => self.unrefine(),
            Relation::Unrelated => self.rebuild(),
        }
    }

    //<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

    fn emit(&mut self, msg: ListDiff<RowIdentity>) {
        trace!("projection of {:?}: {:?}", self.feed_id, msg);
        self.outbox.push(msg);
    }

    fn emit_count(&mut self, old_len: usize) {
        if self.mapping.len() != old_len {
            self.emit(ListDiff::Count(self.mapping.len()));
        }
    }

    fn identities(&self, keys: &[RowKey]) -> Vec<RowIdentity> {
        keys.iter()
            .map(|&key| RowIdentity { feed: self.feed_id, key })
            .collect()
    }

    fn bound_feed(&self) -> Result<Arc<dyn SourceFeed>> {
        self.feed
            .clone()
            .ok_or_else(|| Error::invariant("projection received a diff without a source"))
    }

    fn key_of(feed: &dyn SourceFeed, row: usize) -> Result<RowKey> {
        feed.row_key(row)
            .ok_or_else(|| Error::out_of_range(row, feed.row_count()))
    }

    fn test(&mut self, feed: &dyn SourceFeed, row: usize) -> bool {
        !self.predicate.is_filtering() || self.predicate.accepts(feed, row)
    }

    /// Visible range of the mapped source rows in `first..=last`.
    fn visible_range(&self, first: usize, last: usize) -> (usize, usize) {
        (
            self.mapping.partition_point(|&r| r < first),
            self.mapping.partition_point(|&r| r <= last),
        )
    }

    //<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

    /// Recomputes the mapping from scratch and emits a reset.
    pub fn rebuild(&mut self) {
        let old_len = self.mapping.len();
        self.mapping.clear();
        self.keys.clear();
        self.predicate.rows_cleared();

        if let (Some(feed), true) = (self.feed.clone(), self.populated) {
            let n = feed.row_count();
            self.predicate.rows_inserted(0, n);
            for row in 0..n {
                if self.test(&*feed, row) {
                    if let Some(key) = feed.row_key(row) {
                        self.mapping.push(row);
                        self.keys.push(key);
                    }
                }
            }
            debug!("rebuilt projection of {:?}: {} of {} rows", self.feed_id, self.mapping.len(), n);
        }

        self.emit(ListDiff::Reset(self.identities(&self.keys)));
        self.emit_count(old_len);
    }

    /// Drops the visible rows the predicate no longer accepts.
    pub fn refine(&mut self) {
        let feed = match (self.feed.clone(), self.populated) {
            (Some(feed), true) => feed,
            _ => return,
        };
        let old_len = self.mapping.len();

        let mut failing = Vec::new();
        for i in 0..self.mapping.len() {
            let row = self.mapping[i];
            if !self.test(&*feed, row) {
                failing.push(i);
            }
        }

        // maximal runs, highest first
        let mut runs: Vec<(usize, usize)> = Vec::new();
        for i in failing {
            match runs.last_mut() {
                Some((_, end)) if *end == i => *end += 1,
                _ => runs.push((i, i + 1)),
            }
        }

        for &(start, end) in runs.iter().rev() {
            self.mapping.drain(start..end);
            let keys: Vec<RowKey> = self.keys.drain(start..end).collect();
            self.emit(ListDiff::Remove {
                idx: start,
                vals: self.identities(&keys),
            });
        }

        debug!("refined projection of {:?}: {} -> {} rows", self.feed_id, old_len, self.mapping.len());
        self.emit_count(old_len);
    }

    /// Adds the hidden rows the predicate now accepts.
    pub fn unrefine(&mut self) {
        let feed = match (self.feed.clone(), self.populated) {
            (Some(feed), true) => feed,
            _ => return,
        };
        let old_len = self.mapping.len();
        let n = feed.row_count();

        // (visible index of the gap, accepted source rows in it)
        let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
        let mut next = 0;
        for gap in 0..=self.mapping.len() {
            let end = self.mapping.get(gap).copied().unwrap_or(n);
            let mut found = Vec::new();
            for row in next..end {
                if self.test(&*feed, row) {
                    found.push(row);
                }
            }
            if !found.is_empty() {
                groups.push((gap, found));
            }
            next = end + 1;
        }

        for (at, rows) in groups.into_iter().rev() {
            let mut keys = Vec::with_capacity(rows.len());
            for &row in rows.iter() {
                match Self::key_of(&*feed, row) {
                    Ok(key) => keys.push(key),
                    Err(err) => {
                        error!("unrefine of {:?}: {}", self.feed_id, err);
                        return self.rebuild();
                    }
                }
            }
            self.mapping.splice(at..at, rows);
            self.keys.splice(at..at, keys.iter().copied());
            self.emit(ListDiff::Insert {
                idx: at,
                vals: self.identities(&keys),
            });
        }

        debug!("unrefined projection of {:?}: {} -> {} rows", self.feed_id, old_len, self.mapping.len());
        self.emit_count(old_len);
    }

    //<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

    /// Translates one diff of the source feed.
    pub fn on_feed_diff(&mut self, diff: &FeedDiff) {
        match self.handle(diff) {
            Ok(()) => {}
            Err(Error::UnsupportedMutation(what)) => {
                warn!("projection of {:?} ignores {}", self.feed_id, what);
            }
            Err(err) => {
                error!("projection of {:?} lost track of its source: {}", self.feed_id, err);
                self.rebuild();
            }
        }
    }

    fn handle(&mut self, diff: &FeedDiff) -> Result<()> {
        if !self.populated && !matches!(diff, FeedDiff::Populated(_) | FeedDiff::Nested { .. }) {
            // contents are picked up by the rebuild once the feed is populated
            return Ok(());
        }

        match diff {
            FeedDiff::Reset => {
                self.rebuild();
                Ok(())
            }
            FeedDiff::Inserted { first, count } => self.rows_inserted(*first, *count),
            FeedDiff::Removed { first, last } => self.rows_removed(*first, *last),
            FeedDiff::Moved { first, last, dest } => self.rows_moved(*first, *last, *dest),
            FeedDiff::Changed { first, last, fields } => self.rows_changed(*first, *last, fields),
            FeedDiff::Populated(populated) => {
                if *populated != self.populated {
                    self.populated = *populated;
                    self.rebuild();
                    self.emit(ListDiff::Populated(*populated));
                }
                Ok(())
            }
            FeedDiff::Nested { parent, .. } => Err(Error::UnsupportedMutation(format!(
                "nested mutation below row {}",
                parent
            ))),
        }
    }

    fn rows_inserted(&mut self, first: usize, count: usize) -> Result<()> {
        let feed = self.bound_feed()?;
        if first + count > feed.row_count() {
            return Err(Error::out_of_range(first + count, feed.row_count()));
        }
        if count == 0 {
            return Ok(());
        }
        let old_len = self.mapping.len();

        self.predicate.rows_inserted(first, count);
        for row in self.mapping.iter_mut() {
            if *row >= first {
                *row += count;
            }
        }

        let mut rows = Vec::new();
        let mut keys = Vec::new();
        for row in first..first + count {
            if self.test(&*feed, row) {
                rows.push(row);
                keys.push(Self::key_of(&*feed, row)?);
            }
        }
        if rows.is_empty() {
            return Ok(());
        }

        let at = self.mapping.partition_point(|&r| r < first);
        self.mapping.splice(at..at, rows);
        self.keys.splice(at..at, keys.iter().copied());

        self.emit(ListDiff::Insert {
            idx: at,
            vals: self.identities(&keys),
        });
        self.emit_count(old_len);
        Ok(())
    }

    fn rows_removed(&mut self, first: usize, last: usize) -> Result<()> {
        if first > last {
            return Err(Error::out_of_range(first, last + 1));
        }
        let count = last - first + 1;
        let old_len = self.mapping.len();

        self.predicate.rows_removed(first, count);

        let (lo, hi) = self.visible_range(first, last);
        self.mapping.drain(lo..hi);
        let keys: Vec<RowKey> = self.keys.drain(lo..hi).collect();

        for row in self.mapping.iter_mut() {
            if *row > last {
                *row -= count;
            }
        }

        if !keys.is_empty() {
            self.emit(ListDiff::Remove {
                idx: lo,
                vals: self.identities(&keys),
            });
            self.emit_count(old_len);
        }
        Ok(())
    }

    fn rows_moved(&mut self, first: usize, last: usize, dest: usize) -> Result<()> {
        if first > last {
            return Err(Error::out_of_range(first, last + 1));
        }
        if dest >= first && dest <= last + 1 {
            return Ok(());
        }
        let count = last - first + 1;

        self.predicate.rows_moved(first, count, dest);

        let (lo, hi) = self.visible_range(first, last);
        let vdest = self.mapping.partition_point(|&r| r < dest);

        let remap = |r: usize| {
            if dest > last {
                if r >= first && r <= last {
                    r - first + dest - count
                } else if r > last && r < dest {
                    r - count
                } else {
                    r
                }
            } else if r >= first && r <= last {
                r - first + dest
            } else if r >= dest && r < first {
                r + count
            } else {
                r
            }
        };

        let mut entries: Vec<(usize, RowKey)> = self
            .mapping
            .iter()
            .zip(self.keys.iter())
            .map(|(&r, &k)| (remap(r), k))
            .collect();
        entries.sort_by_key(|&(r, _)| r);
        self.mapping = entries.iter().map(|&(r, _)| r).collect();
        self.keys = entries.into_iter().map(|(_, k)| k).collect();

        if hi > lo && vdest != lo && vdest != hi {
            self.emit(ListDiff::Move {
                idx: lo,
                count: hi - lo,
                dest: vdest,
            });
        }
        Ok(())
    }

    fn rows_changed(&mut self, first: usize, last: usize, fields: &[String]) -> Result<()> {
        if first > last {
            return Err(Error::out_of_range(first, last + 1));
        }
        self.predicate.rows_changed(first, last - first + 1);

        let (lo, hi) = self.visible_range(first, last);
        if hi > lo {
            self.emit(ListDiff::Change {
                idx: lo,
                count: hi - lo,
                fields: fields.to_vec(),
            });
        }
        Ok(())
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

impl<P: Predicate> Emitter for Projection<P> {
    type Out = dyn ProjectionView;

    fn outbox(&mut self) -> &mut Outbox<dyn ProjectionView> {
        &mut self.outbox
    }
}

impl<P: Predicate> Handle<Projection<P>> {
    pub fn set_source(&self, source: Option<OuterViewPort<dyn SourceFeed>>) {
        self.edit(|p| p.set_source(source));
    }

    pub fn set_predicate(&self, predicate: P, relation: Relation) {
        self.edit(|p| p.set_predicate(predicate, relation));
    }

    pub fn update_predicate(&self, f: impl FnOnce(&mut P) -> Option<Relation>) {
        self.edit(|p| p.update_predicate(f));
    }

    pub fn rebuild(&self) {
        self.edit(|p| p.rebuild());
    }
}

impl Handle<Projection<SearchPredicate>> {
    pub fn set_pattern(&self, pattern: &str) {
        self.update_predicate(|p| p.set_pattern(pattern));
    }

    pub fn set_case_sensitive(&self, case_sensitive: bool) {
        self.update_predicate(|p| p.set_case_sensitive(case_sensitive));
    }

    pub fn set_match_mode(&self, mode: MatchMode) {
        self.update_predicate(|p| p.set_match_mode(mode));
    }

    pub fn set_search_fields(&self, fields: &[&str]) {
        self.update_predicate(|p| p.set_fields(fields));
    }
}

impl Handle<Projection<FilterPredicate>> {
    pub fn set_filters(&self, criteria: Vec<Criterion>) {
        self.update_predicate(|p| p.set_criteria(criteria));
    }

    pub fn set_requirement(&self, requirement: Requirement) {
        self.update_predicate(|p| p.set_requirement(requirement));
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

impl<P: Predicate> View for Projection<P> {
    type Msg = ListDiff<RowIdentity>;
}

impl<P: Predicate> ListView<RowIdentity> for Projection<P> {
    fn len(&self) -> usize {
        self.mapping.len()
    }

    fn get(&self, idx: &usize) -> Option<RowIdentity> {
        self.keys.get(*idx).map(|&key| RowIdentity { feed: self.feed_id, key })
    }

    fn field(&self, idx: usize, field: &str) -> Result<Option<Value>> {
        let row = self.source_row_of(idx)?;
        Ok(self.feed.as_ref().and_then(|f| f.read_by_name(row, field)))
    }

    fn fields(&self, idx: usize) -> Result<BTreeMap<String, Value>> {
        let row = self.source_row_of(idx)?;
        let mut values = BTreeMap::new();
        if let Some(feed) = self.feed.as_ref() {
            for (id, name) in feed.fields().iter() {
                match feed.read(row, id) {
                    Some(value) if !value.is_null() => {
                        values.insert(name.to_string(), value);
                    }
                    _ => {}
                }
            }
        }
        Ok(values)
    }

    fn is_populated(&self) -> bool {
        self.populated
    }
}

impl<P: Predicate> ProjectionView for Projection<P> {
    fn source_row_of(&self, idx: usize) -> Result<usize> {
        self.mapping
            .get(idx)
            .copied()
            .ok_or_else(|| Error::out_of_range(idx, self.mapping.len()))
    }

    fn visible_index_of(&self, source_row: usize) -> Option<usize> {
        self.mapping.binary_search(&source_row).ok()
    }

    fn is_filtered(&self) -> bool {
        self.predicate.is_filtering()
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            buffer::rows::RowBuffer,
            predicate::{AcceptAll, FnPredicate},
            view::list::ListViewExt,
        },
        assert_matches::assert_matches,
        pretty_assertions::assert_eq,
    };

    fn words(ws: &[&str]) -> Vec<String> {
        ws.iter().map(|w| w.to_string()).collect()
    }

    fn texts(port: &OuterViewPort<dyn ProjectionView>) -> Vec<String> {
        let view = port.get_view().unwrap();
        (0..view.len())
            .map(|i| view.field(i, "text").unwrap().unwrap().to_string())
            .collect()
    }

    fn rebuilt<P: Predicate>(buf: &RowBuffer<String>, predicate: P) -> Vec<usize> {
        let (proj, _port) = buf.get_port().project(predicate);
        let mapping = proj.read().mapping().to_vec();
        mapping
    }

    fn structural(diffs: Vec<ListDiff<RowIdentity>>) -> Vec<ListDiff<RowIdentity>> {
        diffs.into_iter().filter(|d| d.is_structural()).collect()
    }

    #[test]
    fn narrowing_removes_one_run() {
        let buf = RowBuffer::with_data(words(&["apple", "banana", "apricot"]));
        let (search, port) = buf.get_port().project(SearchPredicate::new(&["text"], "ap"));
        assert_eq!(search.read().mapping(), &[0, 2]);

        let apple = port.get_view().unwrap().get(&0).unwrap();
        let queue = port.diff_queue();

        search.set_pattern("apr");
        assert_eq!(search.read().mapping(), &[2]);
        assert_eq!(
            queue.drain(),
            vec![
                ListDiff::Remove { idx: 0, vals: vec![apple] },
                ListDiff::Count(1),
            ]
        );
    }

    #[test]
    fn widening_matches_rebuild() {
        let buf = RowBuffer::with_data(words(&["apple", "banana", "apricot", "ape", "grape", "apex"]));
        let (search, port) = buf.get_port().project(SearchPredicate::new(&["text"], "apr"));
        let queue = port.diff_queue();

        search.set_pattern("ap");
        assert_eq!(search.read().mapping(), rebuilt(&buf, SearchPredicate::new(&["text"], "ap")).as_slice());
        assert_eq!(texts(&port), words(&["apple", "apricot", "ape", "apex"]));

        // gaps are filled from the back, one insert per gap
        assert_eq!(
            structural(queue.drain())
                .iter()
                .map(|d| match d {
                    ListDiff::Insert { idx, vals } => (*idx, vals.len()),
                    other => panic!("unexpected {:?}", other),
                })
                .collect::<Vec<_>>(),
            vec![(1, 2), (0, 1)]
        );

        search.set_pattern("");
        assert_eq!(search.read().mapping(), &[0, 1, 2, 3, 4, 5]);
        assert!(!port.get_view().unwrap().is_filtered());
    }

    #[test]
    fn source_mutations_renumber_mapping() {
        let mut buf = RowBuffer::with_data(words(&["a1", "b1", "a2", "b2", "a3"]));
        let (search, port) = buf.get_port().project(SearchPredicate::new(&["text"], "a"));
        let view = port.get_view().unwrap();
        let queue = port.diff_queue();
        assert_eq!(search.read().mapping(), &[0, 2, 4]);

        buf.insert(1, "a9".into()).unwrap();
        let a9 = view.get(&1).unwrap();
        assert_eq!(search.read().mapping(), &[0, 1, 3, 5]);
        assert_eq!(queue.drain(), vec![ListDiff::Insert { idx: 1, vals: vec![a9] }, ListDiff::Count(4)]);

        let a2 = view.get(&2).unwrap();
        buf.remove_range(2, 3).unwrap();
        assert_eq!(search.read().mapping(), &[0, 1, 3]);
        assert_eq!(queue.drain(), vec![ListDiff::Remove { idx: 2, vals: vec![a2] }, ListDiff::Count(3)]);

        buf.move_rows(3, 3, 0).unwrap();
        assert_eq!(search.read().mapping(), &[0, 1, 2]);
        assert_eq!(queue.drain(), vec![ListDiff::Move { idx: 2, count: 1, dest: 0 }]);
        assert_eq!(texts(&port), words(&["a3", "a1", "a9"]));

        buf.update(3, "b3".into()).unwrap();
        assert!(queue.drain().is_empty());
        buf.update(0, "a0".into()).unwrap();
        assert_eq!(queue.drain(), vec![ListDiff::Change { idx: 0, count: 1, fields: vec![] }]);

        assert_eq!(search.read().mapping(), rebuilt(&buf, SearchPredicate::new(&["text"], "a")).as_slice());
    }

    #[test]
    fn moves_keep_consumer_mirror_in_sync() {
        let mut buf = RowBuffer::with_data(words(&["a1", "b1", "a2", "b2", "a3", "b3", "a4"]));
        let (_proj, port) = buf.get_port().project(SearchPredicate::new(&["text"], "a"));
        let view = port.get_view().unwrap();
        let mut mirror: Vec<RowIdentity> = view.iter().collect();
        let queue = port.diff_queue();

        buf.move_rows(0, 2, 6).unwrap();
        buf.move_rows(5, 6, 1).unwrap();
        buf.move_rows(1, 1, 7).unwrap();

        for diff in queue.drain() {
            diff.apply(&mut mirror);
        }
        assert_eq!(mirror, view.iter().collect::<Vec<_>>());
    }

    #[test]
    fn insert_without_match_is_silent() {
        let mut buf = RowBuffer::with_data(words(&["a"]));
        let (proj, port) = buf.get_port().project(SearchPredicate::new(&["text"], "a"));
        let queue = port.diff_queue();

        buf.insert(0, "b".into()).unwrap();
        assert!(queue.drain().is_empty());
        assert_eq!(proj.read().mapping(), &[1]);
    }

    #[test]
    fn nested_mutation_is_ignored() {
        let buf = RowBuffer::with_data(words(&["a", "b"]));
        let (proj, port) = buf.get_port().project(AcceptAll);
        let queue = port.diff_queue();

        proj.edit(|p| {
            p.on_feed_diff(&FeedDiff::Nested {
                parent: 0,
                diff: Box::new(FeedDiff::Inserted { first: 0, count: 1 }),
            })
        });
        assert!(queue.drain().is_empty());
        assert_eq!(proj.read().mapping(), &[0, 1]);
    }

    #[test]
    fn row_access() {
        let buf = RowBuffer::with_data(words(&["x", "y", "z"]));
        let (_proj, port) = buf.get_port().project(FnPredicate::new(|feed: &dyn SourceFeed, row: usize| {
            feed.read_by_name(row, "text") != Some(Value::from("y"))
        }));
        let view = port.get_view().unwrap();

        assert_eq!(view.source_row_of(1), Ok(2));
        assert_eq!(view.visible_index_of(2), Some(1));
        assert_eq!(view.visible_index_of(1), None);
        assert_matches!(view.source_row_of(2), Err(Error::IndexOutOfRange { index: 2, len: 2 }));
        assert_eq!(view.field(0, "missing"), Ok(None));
        assert_eq!(
            view.fields(1).unwrap(),
            vec![("text".to_string(), Value::from("z"))].into_iter().collect::<BTreeMap<_, _>>()
        );
    }

    #[test]
    fn waits_for_population() {
        let mut buf = RowBuffer::<String>::unpopulated();
        let (proj, port) = buf.get_port().project(AcceptAll);
        let view = port.get_view().unwrap();
        let queue = port.diff_queue();
        assert!(!view.is_populated());

        buf.push("a".into());
        buf.push("b".into());
        assert_eq!(view.len(), 0);
        assert!(queue.drain().is_empty());

        buf.set_populated(true);
        assert!(view.is_populated());
        assert_eq!(proj.read().mapping(), &[0, 1]);
        assert_matches!(
            queue.drain().as_slice(),
            [ListDiff::Reset(rows), ListDiff::Count(2), ListDiff::Populated(true)] if rows.len() == 2
        );
    }

    #[test]
    fn rebinding_resets() {
        let first = RowBuffer::with_data(words(&["a", "b"]));
        let second = RowBuffer::with_data(words(&["c"]));
        let (proj, port) = first.get_port().project(AcceptAll);
        let queue = port.diff_queue();

        proj.set_source(Some(second.get_port()));
        assert_eq!(texts(&port), words(&["c"]));
        assert_matches!(queue.drain().as_slice(), [ListDiff::Reset(rows), ListDiff::Count(1)] if rows.len() == 1);

        proj.set_source(None);
        assert!(port.get_view().unwrap().is_empty());
        assert!(!port.get_view().unwrap().is_populated());
    }

    #[test]
    fn filter_projection() {
        let buf = RowBuffer::with_data(words(&["alpha", "beta", "gamma", "delta"]));
        let (proj, port) = buf.get_port().project(FilterPredicate::default());
        assert_eq!(port.get_view().unwrap().len(), 4);

        proj.set_filters(vec![Criterion::parse("text", "match", "a$").unwrap()]);
        assert_eq!(texts(&port), words(&["alpha", "beta", "gamma", "delta"]));

        proj.set_filters(vec![
            Criterion::parse("text", "match", "^[ab]").unwrap(),
            Criterion::parse("text", "==", "delta").unwrap(),
        ]);
        assert!(texts(&port).is_empty());

        proj.set_requirement(Requirement::Any);
        assert_eq!(texts(&port), words(&["alpha", "beta", "delta"]));
    }

    #[test]
    fn observers_may_read_the_projection() {
        let mut buf = RowBuffer::with_data(words(&["apple", "banana"]));
        let (search, port) = buf.get_port().project(SearchPredicate::new(&["text"], "a"));
        let view = port.get_view().unwrap();

        let seen = Arc::new(RwLock::new(Vec::new()));
        let _obs = port.add_notify_fn({
            let seen = seen.clone();
            let view = view.clone();
            move |_| {
                let first = view.field(0, "text").ok().flatten();
                seen.write().unwrap().push((view.len(), first));
            }
        });

        buf.insert(0, "avocado".into()).unwrap();
        search.set_pattern("av");
        assert_eq!(
            *seen.read().unwrap(),
            vec![
                (2, Some(Value::from("avocado"))),
                (2, Some(Value::from("avocado"))),
                (1, Some(Value::from("avocado"))),
                (1, Some(Value::from("avocado"))),
            ]
        );
    }

    #[test]
    fn recovers_from_an_insert_past_the_end() {
        let buf = RowBuffer::with_data(words(&["a", "b", "c"]));
        let (proj, port) = buf.get_port().project(FnPredicate::new(|feed: &dyn SourceFeed, row: usize| {
            feed.read_by_name(row, "text") != Some(Value::from("b"))
        }));
        let view = port.get_view().unwrap();
        let mut mirror: Vec<RowIdentity> = view.iter().collect();
        let queue = port.diff_queue();

        proj.edit(|p| p.on_feed_diff(&FeedDiff::Inserted { first: 99, count: 1 }));

        let diffs = queue.drain();
        assert_matches!(diffs.as_slice(), [ListDiff::Reset(rows)] if rows.len() == 2);
        for diff in diffs {
            diff.apply(&mut mirror);
        }
        assert_eq!(mirror, view.iter().collect::<Vec<_>>());
        assert_eq!(proj.read().mapping(), &[0, 2]);
    }
}
