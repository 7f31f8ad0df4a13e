use {
    crate::{
        error::{Error, Result},
        projection::projection_helper::{Emitter, Handle, ProjectionHelper},
        view::{
            feed::{RowIdentity, Value},
            list::{sync, ListDiff, ListView, ListViewExt, ProjectionView},
            InnerViewPort, Outbox, OuterViewPort, View, ViewPort,
        },
    },
    log::{debug, error, trace},
    serde::{Deserialize, Serialize},
    std::{
        collections::{BTreeMap, HashMap, HashSet},
        sync::{Arc, RwLock},
    },
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// One row of the merged list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowRef {
    pub identity: RowIdentity,
    /// Index of the owning projection, 0 is the highest priority.
    pub projection: usize,
    /// Index of the row in the owning projection.
    pub projection_row: usize,
}

/// Run of `rows` belonging to one projection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Extent {
    pub start: usize,
    pub count: usize,
}

/// Merges projections into one list.
pub fn merge(
    projections: Vec<OuterViewPort<dyn ProjectionView>>,
) -> (Handle<MergeEngine>, OuterViewPort<dyn ListView<RowRef>>) {
    let port = ViewPort::new();
    let engine = MergeEngine::new(port.inner());
    engine.set_projections(projections);
    (engine, port.into_outer())
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
               Merge Engine
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Deduplicating, priority-ordered merge of several projections.
///
/// `rows` holds one entry per distinct identity, taken from the highest
/// priority projection offering it, grouped into one extent per projection
/// in priority order and ordered by projection row within an extent. Rows of
/// lower priority projections whose identity is already shown are kept in
/// `duplicates` and promoted once their owner goes away.
///
/// Each projection is mirrored as a list of identities, updated from its
/// diffs, so removed rows can be described and recovery never has to read
/// back from a projection that is in the middle of notifying.
pub struct MergeEngine {
    sources: Vec<Option<Arc<dyn ProjectionView>>>,
    mirrors: Vec<Vec<RowIdentity>>,
    ready: Vec<bool>,

    rows: Vec<RowRef>,
    duplicates: Vec<RowRef>,
    row_index_of: HashMap<(usize, usize), usize>,
    extents: Vec<Extent>,

    /// rows of a removal, captured before the mirror drops them
    pending: Vec<RowRef>,
    populated: bool,

    outbox: Outbox<dyn ListView<RowRef>>,
    proj_helper: ProjectionHelper<usize, Self>,
}

impl MergeEngine {
    pub fn new(port: InnerViewPort<dyn ListView<RowRef>>) -> Handle<Self> {
        let engine = Arc::new(RwLock::new(MergeEngine {
            sources: Vec::new(),
            mirrors: Vec::new(),
            ready: Vec::new(),
            rows: Vec::new(),
            duplicates: Vec::new(),
            row_index_of: HashMap::new(),
            extents: Vec::new(),
            pending: Vec::new(),
            populated: false,
            outbox: port.outbox(),
            proj_helper: ProjectionHelper::new(),
        }));

        engine.write().unwrap().proj_helper.set_proj(&engine);
        port.set_view(Some(engine.clone()));
        Handle::new(engine)
    }

    /// Replaces the merged projections, index 0 has the highest priority.
    pub fn set_projections(&mut self, projections: Vec<OuterViewPort<dyn ProjectionView>>) {
        self.proj_helper.clear();
        self.sources.clear();
        self.mirrors.clear();
        self.ready.clear();

        for (p, port) in projections.into_iter().enumerate() {
            let view = self.proj_helper.new_arg(
                p,
                port,
                move |e: &mut Self, diff| e.on_projection_diff(p, diff),
                move |e: &mut Self, view| e.rebind(p, view),
            );
            self.mirrors.push(view.as_ref().map(|v| v.iter().collect()).unwrap_or_default());
            self.ready.push(view.as_ref().map_or(false, |v| v.is_populated()));
            self.sources.push(view);
        }

        self.extents = vec![Extent::default(); self.sources.len()];
        self.populate();
    }

    fn rebind(&mut self, p: usize, view: Option<Arc<dyn ProjectionView>>) {
        if p >= self.sources.len() {
            return;
        }
        self.mirrors[p] = view.as_ref().map(|v| v.iter().collect()).unwrap_or_default();
        self.ready[p] = view.as_ref().map_or(false, |v| v.is_populated());
        self.sources[p] = view;
        self.populate();
    }

    pub fn rows(&self) -> &[RowRef] {
        &self.rows
    }

    pub fn duplicates(&self) -> &[RowRef] {
        &self.duplicates
    }

    pub fn extents(&self) -> &[Extent] {
        &self.extents
    }

    pub fn projection_count(&self) -> usize {
        self.sources.len()
    }

    //<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

    fn emit(&mut self, msg: ListDiff<RowRef>) {
        trace!("merge engine: {:?}", msg);
        self.outbox.push(msg);
    }

    /// Replaces `rows` by `updated`, emitting the patch between the two.
    fn synchronize(&mut self, updated: Vec<RowRef>) {
        let old_len = self.rows.len();
        let patch = sync::diff_apply(&mut self.rows, &updated, |r| (r.identity, r.projection));
        self.rows = updated;

        for step in patch {
            self.emit(step);
        }
        if self.rows.len() != old_len {
            self.emit(ListDiff::Count(self.rows.len()));
        }
    }

    /// Rebuilds all bookkeeping from the projection mirrors.
    ///
    /// The first population waits until every projection is populated and
    /// emits a reset, later ones emit the patch against the current rows.
    pub fn populate(&mut self) {
        if !self.populated && !self.ready.iter().all(|r| *r) {
            return;
        }

        let mut updated = Vec::new();
        let mut duplicates = Vec::new();
        let mut row_index_of = HashMap::new();
        let mut extents = Vec::with_capacity(self.mirrors.len());
        let mut seen = HashSet::new();

        for (p, mirror) in self.mirrors.iter().enumerate() {
            let start = updated.len();
            for (r, &identity) in mirror.iter().enumerate() {
                let row = RowRef {
                    identity,
                    projection: p,
                    projection_row: r,
                };
                if seen.insert(identity) {
                    row_index_of.insert((p, r), updated.len());
                    updated.push(row);
                } else {
                    duplicates.push(row);
                }
            }
            extents.push(Extent {
                start,
                count: updated.len() - start,
            });
        }

        debug!(
            "populated merge of {} projections: {} rows, {} duplicates",
            self.mirrors.len(),
            updated.len(),
            duplicates.len()
        );

        self.duplicates = duplicates;
        self.row_index_of = row_index_of;
        self.extents = extents;

        if self.populated {
            self.synchronize(updated);
        } else {
            let old_len = self.rows.len();
            self.rows = updated;
            self.populated = true;
            self.emit(ListDiff::Reset(self.rows.clone()));
            if self.rows.len() != old_len {
                self.emit(ListDiff::Count(self.rows.len()));
            }
            self.emit(ListDiff::Populated(true));
        }
    }

    //<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

    /// Translates one diff of projection `p`.
    pub fn on_projection_diff(&mut self, p: usize, diff: &ListDiff<RowIdentity>) {
        if let Err(err) = self.handle(p, diff) {
            error!("merge engine lost track of projection {}: {}", p, err);
            self.populate();
        }
    }

    fn handle(&mut self, p: usize, diff: &ListDiff<RowIdentity>) -> Result<()> {
        let len = match self.mirrors.get(p) {
            Some(mirror) => mirror.len(),
            None => return Err(Error::out_of_range(p, self.mirrors.len())),
        };

        match diff {
            ListDiff::Reset(vals) => {
                self.mirrors[p] = vals.clone();
                self.populate();
            }
            ListDiff::Insert { idx, vals } => {
                if *idx > len {
                    return Err(Error::out_of_range(*idx, len));
                }
                self.mirrors[p].splice(*idx..*idx, vals.iter().copied());
                if self.populated {
                    self.rows_inserted(p, *idx, vals)?;
                }
            }
            ListDiff::Remove { idx, vals } => {
                if vals.is_empty() {
                    return Ok(());
                }
                if *idx + vals.len() > len {
                    return Err(Error::out_of_range(*idx + vals.len() - 1, len));
                }
                self.rows_about_to_be_removed(p, *idx, *idx + vals.len() - 1);
                self.mirrors[p].drain(*idx..*idx + vals.len());
                if self.populated {
                    self.rows_removed()?;
                } else {
                    self.pending.clear();
                }
            }
            ListDiff::Move { idx, count, dest } => {
                if *idx + *count > len || *dest > len {
                    return Err(Error::out_of_range(*idx + *count, len));
                }
                diff.apply(&mut self.mirrors[p]);
                self.populate();
            }
            ListDiff::Change { idx, count, fields } => {
                if self.populated {
                    self.rows_changed(p, *idx, *count, fields);
                }
            }
            ListDiff::Populated(populated) => {
                self.ready[p] = *populated;
                if *populated && !self.populated {
                    self.populate();
                }
            }
            ListDiff::Count(_) => {}
        }
        Ok(())
    }

    fn rows_inserted(&mut self, p: usize, first: usize, vals: &[RowIdentity]) -> Result<()> {
        let mut updated = self.rows.clone();
        self.renumber(&mut updated, p, first, vals.len() as isize);

        for (k, &identity) in vals.iter().enumerate() {
            let row = RowRef {
                identity,
                projection: p,
                projection_row: first + k,
            };
            match updated.iter().position(|r| r.identity == identity) {
                None => self.inject(&mut updated, row, false)?,
                Some(j) if updated[j].projection > p => self.inject(&mut updated, row, true)?,
                Some(_) => self.duplicates.push(row),
            }
        }

        self.synchronize(updated);
        Ok(())
    }

    fn rows_about_to_be_removed(&mut self, p: usize, first: usize, last: usize) {
        self.pending = (first..=last)
            .map(|r| RowRef {
                identity: self.mirrors[p][r],
                projection: p,
                projection_row: r,
            })
            .collect();
    }

    fn rows_removed(&mut self) -> Result<()> {
        let mut pending = std::mem::take(&mut self.pending);
        pending.sort_by(|a, b| b.projection_row.cmp(&a.projection_row));

        let mut updated = self.rows.clone();
        for row in pending {
            self.excise(&mut updated, row)?;
        }

        self.synchronize(updated);
        Ok(())
    }

    fn rows_changed(&mut self, p: usize, first: usize, count: usize, fields: &[String]) {
        let mut positions: Vec<usize> = (first..first + count)
            .filter_map(|r| self.row_index_of.get(&(p, r)).copied())
            .collect();
        positions.sort_unstable();

        let mut runs: Vec<(usize, usize)> = Vec::new();
        for pos in positions {
            match runs.last_mut() {
                Some((start, count)) if *start + *count == pos => *count += 1,
                _ => runs.push((pos, 1)),
            }
        }
        for (idx, count) in runs {
            self.emit(ListDiff::Change {
                idx,
                count,
                fields: fields.to_vec(),
            });
        }
    }

    //<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

    /// Adds `delta` to the projection row of every row of projection `p`
    /// at or after `pivot`, shown or duplicate.
    fn renumber(&mut self, updated: &mut [RowRef], p: usize, pivot: usize, delta: isize) {
        let shift = |r: usize| (r as isize + delta) as usize;

        for row in updated.iter_mut().chain(self.duplicates.iter_mut()) {
            if row.projection == p && row.projection_row >= pivot {
                row.projection_row = shift(row.projection_row);
            }
        }

        let stale: Vec<((usize, usize), usize)> = self
            .row_index_of
            .iter()
            .filter(|((q, r), _)| *q == p && *r >= pivot)
            .map(|(k, v)| (*k, *v))
            .collect();
        for (key, _) in stale.iter() {
            self.row_index_of.remove(key);
        }
        for ((q, r), pos) in stale {
            self.row_index_of.insert((q, shift(r)), pos);
        }
    }

    /// Drops the bookkeeping of the row that was at position `pos`.
    fn forget_position(&mut self, pos: usize, row: RowRef) -> Result<()> {
        let count = self
            .extents
            .get(row.projection)
            .and_then(|e| e.count.checked_sub(1))
            .ok_or_else(|| Error::invariant(format!("extent of projection {} is already empty", row.projection)))?;

        self.row_index_of.remove(&(row.projection, row.projection_row));
        for idx in self.row_index_of.values_mut() {
            if *idx > pos {
                *idx -= 1;
            }
        }

        for (q, extent) in self.extents.iter_mut().enumerate() {
            if q == row.projection {
                extent.count = count;
            } else if extent.start > pos {
                extent.start -= 1;
            }
        }
        Ok(())
    }

    /// Inserts `row` into the extent of its projection. With `demote`, the
    /// lower priority row showing the same identity moves to `duplicates`.
    fn inject(&mut self, updated: &mut Vec<RowRef>, row: RowRef, demote: bool) -> Result<()> {
        let extent = *self
            .extents
            .get(row.projection)
            .ok_or_else(|| Error::invariant(format!("no extent for projection {}", row.projection)))?;

        let overrun = || Error::invariant(format!("extent of projection {} runs past the merged rows", row.projection));
        let mut pos = extent.start;
        while pos < extent.start + extent.count {
            match updated.get(pos) {
                Some(r) if r.projection_row < row.projection_row => pos += 1,
                Some(_) => break,
                None => return Err(overrun()),
            }
        }
        if pos > updated.len() {
            return Err(overrun());
        }

        for idx in self.row_index_of.values_mut() {
            if *idx >= pos {
                *idx += 1;
            }
        }
        for (q, e) in self.extents.iter_mut().enumerate() {
            if q != row.projection && (e.start > pos || (e.start == pos && q > row.projection)) {
                e.start += 1;
            }
        }

        updated.insert(pos, row);
        self.row_index_of.insert((row.projection, row.projection_row), pos);
        self.extents[row.projection].count += 1;

        if demote {
            let j = (pos + 1..updated.len())
                .find(|&j| updated[j].identity == row.identity)
                .ok_or_else(|| Error::invariant(format!("no row to demote for {:?}", row.identity)))?;
            let old = updated.remove(j);
            self.forget_position(j, old)?;
            self.duplicates.push(old);
        }
        Ok(())
    }

    /// Removes `row` from the merge, promoting the best duplicate of its
    /// identity if `row` was the one shown.
    fn excise(&mut self, updated: &mut Vec<RowRef>, row: RowRef) -> Result<()> {
        let j = updated
            .iter()
            .position(|r| r.identity == row.identity)
            .ok_or_else(|| Error::invariant(format!("{:?} is not merged", row.identity)))?;

        if updated[j] == row {
            let old = updated.remove(j);
            self.forget_position(j, old)?;
            self.renumber(updated, row.projection, row.projection_row + 1, -1);

            let best = self
                .duplicates
                .iter()
                .enumerate()
                .filter(|(_, d)| d.identity == row.identity)
                .min_by_key(|(_, d)| d.projection)
                .map(|(i, _)| i);
            if let Some(i) = best {
                let promoted = self.duplicates.swap_remove(i);
                self.inject(updated, promoted, false)?;
            }
        } else {
            let i = self
                .duplicates
                .iter()
                .position(|d| *d == row)
                .ok_or_else(|| Error::invariant(format!("{:?} is neither shown nor a duplicate", row)))?;
            self.duplicates.swap_remove(i);
            self.renumber(updated, row.projection, row.projection_row + 1, -1);
        }
        Ok(())
    }

    //<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

    /// Verifies the bookkeeping against `rows` and the projection mirrors.
    pub fn check_invariants(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::InvariantViolation(msg));

        if self.row_index_of.len() != self.rows.len() {
            return fail(format!("{} indexed of {} rows", self.row_index_of.len(), self.rows.len()));
        }

        let mut identities = HashSet::new();
        for (i, row) in self.rows.iter().enumerate() {
            if self.row_index_of.get(&(row.projection, row.projection_row)) != Some(&i) {
                return fail(format!("row {} ({:?}) is indexed wrongly", i, row));
            }
            if !identities.insert(row.identity) {
                return fail(format!("{:?} is shown twice", row.identity));
            }
            if self.mirrors.get(row.projection).and_then(|m| m.get(row.projection_row)) != Some(&row.identity) {
                return fail(format!("row {} ({:?}) does not match its projection", i, row));
            }
        }

        let mut start = 0;
        for (p, extent) in self.extents.iter().enumerate() {
            if extent.start != start {
                return fail(format!("extent of projection {} starts at {}, expected {}", p, extent.start, start));
            }
            let run = match self.rows.get(start..start + extent.count) {
                Some(run) => run,
                None => return fail(format!("extent of projection {} runs past {} rows", p, self.rows.len())),
            };
            if run.iter().any(|r| r.projection != p) {
                return fail(format!("extent of projection {} holds foreign rows", p));
            }
            if run.windows(2).any(|w| w[0].projection_row >= w[1].projection_row) {
                return fail(format!("extent of projection {} is not ordered", p));
            }
            start += extent.count;
        }
        if start != self.rows.len() {
            return fail(format!("extents cover {} of {} rows", start, self.rows.len()));
        }

        for dup in self.duplicates.iter() {
            if self.mirrors.get(dup.projection).and_then(|m| m.get(dup.projection_row)) != Some(&dup.identity) {
                return fail(format!("duplicate {:?} does not match its projection", dup));
            }
            match self.rows.iter().find(|r| r.identity == dup.identity) {
                Some(owner) if owner.projection < dup.projection => {}
                _ => return fail(format!("duplicate {:?} has no higher priority owner", dup)),
            }
        }

        let offered: usize = self.mirrors.iter().map(Vec::len).sum();
        if self.populated && offered != self.rows.len() + self.duplicates.len() {
            return fail(format!(
                "{} rows offered, {} shown and {} duplicates",
                offered,
                self.rows.len(),
                self.duplicates.len()
            ));
        }
        Ok(())
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

impl Emitter for MergeEngine {
    type Out = dyn ListView<RowRef>;

    fn outbox(&mut self) -> &mut Outbox<dyn ListView<RowRef>> {
        &mut self.outbox
    }
}

impl Handle<MergeEngine> {
    pub fn set_projections(&self, projections: Vec<OuterViewPort<dyn ProjectionView>>) {
        self.edit(|e| e.set_projections(projections));
    }

    pub fn populate(&self) {
        self.edit(|e| e.populate());
    }
}

impl View for MergeEngine {
    type Msg = ListDiff<RowRef>;
}

impl ListView<RowRef> for MergeEngine {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn get(&self, idx: &usize) -> Option<RowRef> {
        self.rows.get(*idx).copied()
    }

    fn field(&self, idx: usize, field: &str) -> Result<Option<Value>> {
        let row = self.rows.get(idx).ok_or_else(|| Error::out_of_range(idx, self.rows.len()))?;
        match self.sources.get(row.projection) {
            Some(Some(source)) => source.field(row.projection_row, field),
            _ => Err(Error::invariant(format!("projection {} is gone", row.projection))),
        }
    }

    fn fields(&self, idx: usize) -> Result<BTreeMap<String, Value>> {
        let row = self.rows.get(idx).ok_or_else(|| Error::out_of_range(idx, self.rows.len()))?;
        match self.sources.get(row.projection) {
            Some(Some(source)) => source.fields(row.projection_row),
            _ => Err(Error::invariant(format!("projection {} is gone", row.projection))),
        }
    }

    fn is_populated(&self) -> bool {
        self.populated
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            buffer::rows::RowBuffer,
            predicate::{AcceptAll, Predicate, Relation},
            projection::filter_list::Projection,
            view::feed::{RowKey, SourceFeed},
        },
        pretty_assertions::assert_eq,
    };

    /// Accepts the rows whose text is listed.
    struct Allow(Vec<&'static str>);

    impl Predicate for Allow {
        fn is_filtering(&self) -> bool {
            true
        }

        fn accepts(&mut self, feed: &dyn SourceFeed, row: usize) -> bool {
            feed.read_by_name(row, "text")
                .map_or(false, |v| self.0.contains(&v.to_string().as_str()))
        }
    }

    fn words(ws: &[&str]) -> Vec<String> {
        ws.iter().map(|w| w.to_string()).collect()
    }

    /// (projection, text) of every merged row
    fn shown(port: &OuterViewPort<dyn ListView<RowRef>>) -> Vec<(usize, String)> {
        let view = port.get_view().unwrap();
        (0..view.len())
            .map(|i| {
                let row = view.get(&i).unwrap();
                (row.projection, view.field(i, "text").unwrap().unwrap().to_string())
            })
            .collect()
    }

    /// What a consumer can tell rows apart by.
    fn keys(rows: &[RowRef]) -> Vec<(RowIdentity, usize)> {
        rows.iter().map(|r| (r.identity, r.projection)).collect()
    }

    fn project<P: Predicate>(
        buf: &RowBuffer<String>,
        predicate: P,
    ) -> (Handle<Projection<P>>, OuterViewPort<dyn ProjectionView>) {
        buf.get_port().project(predicate)
    }

    #[test]
    fn promotes_duplicate_when_owner_leaves() {
        let mut feed = RowBuffer::with_data(words(&["x", "y", "z"]));
        let (a, a_port) = project(&feed, Allow(vec!["x", "y"]));
        let (_b, b_port) = project(&feed, Allow(vec!["y", "z"]));
        let (engine, port) = merge(vec![a_port, b_port]);

        assert_eq!(shown(&port), vec![(0, "x".into()), (0, "y".into()), (1, "z".into())]);
        assert_eq!(engine.read().duplicates().len(), 1);
        assert_eq!(engine.read().duplicates()[0].projection, 1);

        let queue = port.diff_queue();
        feed.remove(0).unwrap();
        assert_eq!(shown(&port), vec![(0, "y".into()), (1, "z".into())]);
        let diffs = queue.drain();
        assert!(matches!(diffs.as_slice(), [ListDiff::Remove { idx: 0, .. }, ListDiff::Count(2)]));

        a.set_predicate(Allow(vec!["x"]), Relation::Narrowing);
        assert_eq!(shown(&port), vec![(1, "y".into()), (1, "z".into())]);
        assert!(engine.read().duplicates().is_empty());
        engine.read().check_invariants().unwrap();

        let diffs = queue.drain();
        assert_eq!(diffs.len(), 2);
        assert!(matches!(&diffs[0], ListDiff::Remove { idx: 0, vals } if vals[0].projection == 0));
        assert!(matches!(&diffs[1], ListDiff::Insert { idx: 0, vals } if vals[0].projection == 1));
    }

    #[test]
    fn higher_priority_insert_demotes() {
        let feed = RowBuffer::with_data(words(&["a", "b", "c"]));
        let (a, a_port) = project(&feed, Allow(vec!["a"]));
        let (_b, b_port) = project(&feed, AcceptAll);
        let (engine, port) = merge(vec![a_port, b_port]);
        assert_eq!(shown(&port), vec![(0, "a".into()), (1, "b".into()), (1, "c".into())]);

        a.set_predicate(Allow(vec!["a", "b"]), Relation::Widening);
        assert_eq!(shown(&port), vec![(0, "a".into()), (0, "b".into()), (1, "c".into())]);

        let engine = engine.read();
        engine.check_invariants().unwrap();
        assert_eq!(engine.duplicates().len(), 2);
        assert_eq!(engine.extents(), &[Extent { start: 0, count: 2 }, Extent { start: 2, count: 1 }]);
    }

    #[test]
    fn removal_renumbers_duplicates() {
        let mut feed = RowBuffer::with_data(words(&["a", "b", "c"]));
        let (_a, a_port) = project(&feed, AcceptAll);
        let (_b, b_port) = project(&feed, AcceptAll);
        let (engine, port) = merge(vec![a_port, b_port]);
        let view = port.get_view().unwrap();
        let mut mirror: Vec<RowRef> = view.iter().collect();
        let queue = port.diff_queue();

        feed.remove(1).unwrap();
        for diff in queue.drain() {
            diff.apply(&mut mirror);
        }

        let engine = engine.read();
        engine.check_invariants().unwrap();
        assert_eq!(keys(&mirror), keys(engine.rows()));
        assert_eq!(shown(&port), vec![(0, "a".into()), (0, "c".into())]);
        let mut dup_rows: Vec<usize> = engine.duplicates().iter().map(|d| d.projection_row).collect();
        dup_rows.sort();
        assert_eq!(dup_rows, vec![0, 1]);
    }

    #[test]
    fn changes_map_to_merged_rows() {
        let mut first = RowBuffer::with_data(words(&["a", "b", "c"]));
        let mut second = RowBuffer::with_data(words(&["d", "e"]));
        let (_a, a_port) = project(&first, AcceptAll);
        let (_b, b_port) = project(&second, AcceptAll);
        let (_c, c_port) = project(&first, AcceptAll);
        let (_engine, port) = merge(vec![a_port, b_port, c_port]);
        let queue = port.diff_queue();

        first.update(1, "B".into()).unwrap();
        second.update(0, "D".into()).unwrap();
        assert_eq!(
            queue.drain(),
            vec![
                ListDiff::Change { idx: 1, count: 1, fields: vec![] },
                ListDiff::Change { idx: 3, count: 1, fields: vec![] },
            ]
        );
        assert_eq!(port.get_view().unwrap().field(3, "text"), Ok(Some(Value::from("D"))));
    }

    #[test]
    fn inserts_land_in_priority_order() {
        let mut first = RowBuffer::with_data(words(&["a"]));
        let mut second = RowBuffer::with_data(words(&["b"]));
        let (_a, a_port) = project(&first, AcceptAll);
        let (_b, b_port) = project(&second, AcceptAll);
        let (engine, port) = merge(vec![a_port, b_port]);
        let queue = port.diff_queue();

        second.insert(0, "b0".into()).unwrap();
        first.push("a1".into());
        assert_eq!(
            shown(&port),
            vec![(0, "a".into()), (0, "a1".into()), (1, "b0".into()), (1, "b".into())]
        );
        engine.read().check_invariants().unwrap();

        let inserts: Vec<usize> = queue
            .drain()
            .into_iter()
            .filter_map(|d| match d {
                ListDiff::Insert { idx, .. } => Some(idx),
                _ => None,
            })
            .collect();
        assert_eq!(inserts, vec![1, 1]);
    }

    #[test]
    fn moves_are_patched() {
        let mut feed = RowBuffer::with_data(words(&["a", "b", "c", "d"]));
        let (_a, a_port) = project(&feed, AcceptAll);
        let (engine, port) = merge(vec![a_port]);
        let view = port.get_view().unwrap();
        let mut mirror: Vec<RowRef> = view.iter().collect();
        let queue = port.diff_queue();

        feed.move_rows(0, 0, 4).unwrap();
        let diffs = queue.drain();
        assert!(diffs.iter().all(|d| !matches!(d, ListDiff::Reset(_))));
        for diff in diffs {
            diff.apply(&mut mirror);
        }
        assert_eq!(keys(&mirror), keys(engine.read().rows()));
        assert_eq!(shown(&port), vec![(0, "b".into()), (0, "c".into()), (0, "d".into()), (0, "a".into())]);
        engine.read().check_invariants().unwrap();
    }

    #[test]
    fn waits_for_every_projection() {
        let mut slow = RowBuffer::<String>::unpopulated();
        let fast = RowBuffer::with_data(words(&["f"]));
        let (_a, a_port) = project(&slow, AcceptAll);
        let (_b, b_port) = project(&fast, AcceptAll);
        let (_engine, port) = merge(vec![a_port, b_port]);
        let view = port.get_view().unwrap();
        assert!(!view.is_populated());
        assert_eq!(view.len(), 0);

        let queue = port.diff_queue();
        slow.push("s".into());
        assert!(queue.drain().is_empty());

        slow.set_populated(true);
        assert!(view.is_populated());
        assert_eq!(shown(&port), vec![(0, "s".into()), (1, "f".into())]);
        assert!(matches!(
            queue.drain().as_slice(),
            [ListDiff::Reset(rows), ListDiff::Count(2), ListDiff::Populated(true)] if rows.len() == 2
        ));
    }

    #[test]
    fn field_access_is_range_checked() {
        let feed = RowBuffer::with_data(words(&["a"]));
        let (_a, a_port) = project(&feed, AcceptAll);
        let (_engine, port) = merge(vec![a_port]);
        let view = port.get_view().unwrap();

        assert_eq!(view.fields(0).unwrap().get("text"), Some(&Value::from("a")));
        assert_eq!(view.field(1, "text"), Err(Error::IndexOutOfRange { index: 1, len: 1 }));
    }

    #[test]
    fn observers_may_read_the_merge() {
        let mut feed = RowBuffer::with_data(words(&["a"]));
        let (_a, a_port) = project(&feed, AcceptAll);
        let (_engine, port) = merge(vec![a_port]);
        let view = port.get_view().unwrap();

        let seen = Arc::new(RwLock::new(Vec::new()));
        let _obs = port.add_notify_fn({
            let seen = seen.clone();
            let view = view.clone();
            move |_| {
                let last = view.len().checked_sub(1).and_then(|i| view.field(i, "text").ok().flatten());
                seen.write().unwrap().push((view.len(), last));
            }
        });

        feed.push("b".into());
        assert_eq!(
            *seen.read().unwrap(),
            vec![(2, Some(Value::from("b"))), (2, Some(Value::from("b")))]
        );
    }

    #[test]
    fn recovers_from_an_insert_past_the_end() {
        let feed = RowBuffer::with_data(words(&["a", "b"]));
        let (_a, a_port) = project(&feed, AcceptAll);
        let (engine, port) = merge(vec![a_port]);
        let view = port.get_view().unwrap();
        let mut mirror: Vec<RowRef> = view.iter().collect();
        let queue = port.diff_queue();

        let stray = RowIdentity { feed: feed.feed_id(), key: RowKey(99) };
        engine.edit(|e| e.on_projection_diff(0, &ListDiff::Insert { idx: 99, vals: vec![stray] }));

        for diff in queue.drain() {
            diff.apply(&mut mirror);
        }
        assert_eq!(keys(&mirror), keys(engine.read().rows()));
        assert_eq!(shown(&port), vec![(0, "a".into()), (0, "b".into())]);
        engine.read().check_invariants().unwrap();
    }

    #[test]
    fn recovers_from_an_emptied_extent() {
        let mut feed = RowBuffer::with_data(words(&["a", "b", "c"]));
        let (_a, a_port) = project(&feed, AcceptAll);
        let (engine, port) = merge(vec![a_port]);
        let view = port.get_view().unwrap();
        let mut mirror: Vec<RowRef> = view.iter().collect();
        let queue = port.diff_queue();

        engine.edit(|e| e.extents[0].count = 0);
        assert!(engine.read().check_invariants().is_err());

        feed.remove(1).unwrap();
        for diff in queue.drain() {
            diff.apply(&mut mirror);
        }
        assert_eq!(keys(&mirror), keys(engine.read().rows()));
        assert_eq!(shown(&port), vec![(0, "a".into()), (0, "c".into())]);
        engine.read().check_invariants().unwrap();
    }

    #[test]
    fn recovers_from_an_overlong_extent() {
        let mut feed = RowBuffer::with_data(words(&["a", "b"]));
        let (_a, a_port) = project(&feed, AcceptAll);
        let (engine, port) = merge(vec![a_port]);
        let view = port.get_view().unwrap();
        let mut mirror: Vec<RowRef> = view.iter().collect();
        let queue = port.diff_queue();

        engine.edit(|e| e.extents[0].count = 5);
        assert!(engine.read().check_invariants().is_err());

        feed.push("c".into());
        for diff in queue.drain() {
            diff.apply(&mut mirror);
        }
        assert_eq!(keys(&mirror), keys(engine.read().rows()));
        assert_eq!(shown(&port), vec![(0, "a".into()), (0, "b".into()), (0, "c".into())]);
        engine.read().check_invariants().unwrap();
    }
}
