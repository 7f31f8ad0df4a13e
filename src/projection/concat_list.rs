use {
    crate::{
        error::{Error, Result},
        projection::{
            merge_list::RowRef,
            projection_helper::{Emitter, Handle, ProjectionHelper},
        },
        view::{
            feed::{RowIdentity, Value},
            list::{ListDiff, ListView, ListViewExt, ProjectionView},
            InnerViewPort, Outbox, OuterViewPort, View, ViewPort,
        },
    },
    log::{debug, error, trace},
    std::{
        collections::BTreeMap,
        sync::{Arc, RwLock},
    },
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Lists the rows of several projections one after another.
pub fn concat(
    projections: Vec<OuterViewPort<dyn ProjectionView>>,
) -> (Handle<CompositeList>, OuterViewPort<dyn ListView<RowRef>>) {
    let port = ViewPort::new();
    let list = CompositeList::new(port.inner());
    list.set_projections(projections);
    (list, port.into_outer())
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
              Composite List
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Concatenation of projections, without deduplication.
///
/// Row `i` of argument `p` is shown at `i` plus the lengths of the arguments
/// before `p`. Diffs are forwarded with that offset. The `projection_row` of
/// a [`RowRef`] is current as of `get`; rows that merely shift are not
/// restated.
pub struct CompositeList {
    sources: Vec<Option<Arc<dyn ProjectionView>>>,
    mirrors: Vec<Vec<RowIdentity>>,
    ready: Vec<bool>,
    populated: bool,

    outbox: Outbox<dyn ListView<RowRef>>,
    proj_helper: ProjectionHelper<usize, Self>,
}

impl CompositeList {
    pub fn new(port: InnerViewPort<dyn ListView<RowRef>>) -> Handle<Self> {
        let list = Arc::new(RwLock::new(CompositeList {
            sources: Vec::new(),
            mirrors: Vec::new(),
            ready: Vec::new(),
            populated: false,
            outbox: port.outbox(),
            proj_helper: ProjectionHelper::new(),
        }));

        list.write().unwrap().proj_helper.set_proj(&list);
        port.set_view(Some(list.clone()));
        Handle::new(list)
    }

    pub fn set_projections(&mut self, projections: Vec<OuterViewPort<dyn ProjectionView>>) {
        self.proj_helper.clear();
        self.sources.clear();
        self.mirrors.clear();
        self.ready.clear();

        for (p, port) in projections.into_iter().enumerate() {
            let view = self.proj_helper.new_arg(
                p,
                port,
                move |c: &mut Self, diff| c.on_projection_diff(p, diff),
                move |c: &mut Self, view| c.rebind(p, view),
            );
            self.mirrors.push(view.as_ref().map(|v| v.iter().collect()).unwrap_or_default());
            self.ready.push(view.as_ref().map_or(false, |v| v.is_populated()));
            self.sources.push(view);
        }

        debug!("concatenated {} projections: {} rows", self.mirrors.len(), self.len());
        self.reset();
    }

    fn rebind(&mut self, p: usize, view: Option<Arc<dyn ProjectionView>>) {
        if p >= self.sources.len() {
            return;
        }
        self.mirrors[p] = view.as_ref().map(|v| v.iter().collect()).unwrap_or_default();
        self.ready[p] = view.as_ref().map_or(false, |v| v.is_populated());
        self.sources[p] = view;
        self.reset();
    }

    pub fn projection_count(&self) -> usize {
        self.sources.len()
    }

    /// Index of the first row of projection `p`.
    pub fn offset(&self, p: usize) -> usize {
        self.mirrors.iter().take(p).map(Vec::len).sum()
    }

    /// (projection, projection row) shown at `idx`.
    pub fn locate(&self, mut idx: usize) -> Option<(usize, usize)> {
        for (p, mirror) in self.mirrors.iter().enumerate() {
            if idx < mirror.len() {
                return Some((p, idx));
            }
            idx -= mirror.len();
        }
        None
    }

    fn row_ref(&self, p: usize, r: usize, identity: RowIdentity) -> RowRef {
        RowRef {
            identity,
            projection: p,
            projection_row: r,
        }
    }

    fn rows(&self) -> Vec<RowRef> {
        self.mirrors
            .iter()
            .enumerate()
            .flat_map(|(p, mirror)| {
                mirror.iter().enumerate().map(move |(r, &identity)| RowRef {
                    identity,
                    projection: p,
                    projection_row: r,
                })
            })
            .collect()
    }

    //<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

    fn emit(&mut self, msg: ListDiff<RowRef>) {
        trace!("composite list: {:?}", msg);
        self.outbox.push(msg);
    }

    fn update_populated(&mut self) {
        let populated = !self.ready.is_empty() && self.ready.iter().all(|r| *r);
        if populated != self.populated {
            self.populated = populated;
            self.emit(ListDiff::Populated(populated));
        }
    }

    /// Emits the whole list anew.
    fn reset(&mut self) {
        let rows = self.rows();
        let len = rows.len();
        self.emit(ListDiff::Reset(rows));
        self.emit(ListDiff::Count(len));
        self.update_populated();
    }

    /// Forwards one diff of projection `p`.
    pub fn on_projection_diff(&mut self, p: usize, diff: &ListDiff<RowIdentity>) {
        if let Err(err) = self.handle(p, diff) {
            error!("composite list lost track of projection {}: {}", p, err);
            self.reset();
        }
    }

    fn handle(&mut self, p: usize, diff: &ListDiff<RowIdentity>) -> Result<()> {
        let len = match self.mirrors.get(p) {
            Some(mirror) => mirror.len(),
            None => return Err(Error::out_of_range(p, self.mirrors.len())),
        };
        let offset = self.offset(p);

        match diff {
            ListDiff::Reset(vals) => {
                self.mirrors[p] = vals.clone();
                self.reset();
            }
            ListDiff::Insert { idx, vals } => {
                if *idx > len {
                    return Err(Error::out_of_range(*idx, len));
                }
                if vals.is_empty() {
                    return Ok(());
                }
                self.mirrors[p].splice(*idx..*idx, vals.iter().copied());
                let vals = vals
                    .iter()
                    .enumerate()
                    .map(|(k, &identity)| self.row_ref(p, idx + k, identity))
                    .collect();
                self.emit(ListDiff::Insert { idx: offset + idx, vals });
                self.emit(ListDiff::Count(self.len()));
            }
            ListDiff::Remove { idx, vals } => {
                if vals.is_empty() {
                    return Ok(());
                }
                if *idx + vals.len() > len {
                    return Err(Error::out_of_range(*idx + vals.len() - 1, len));
                }
                let vals = self.mirrors[p]
                    .drain(*idx..*idx + vals.len())
                    .enumerate()
                    .map(|(k, identity)| RowRef {
                        identity,
                        projection: p,
                        projection_row: idx + k,
                    })
                    .collect();
                self.emit(ListDiff::Remove { idx: offset + idx, vals });
                self.emit(ListDiff::Count(self.len()));
            }
            ListDiff::Move { idx, count, dest } => {
                if *idx + *count > len || *dest > len {
                    return Err(Error::out_of_range(*idx + *count, len));
                }
                diff.apply(&mut self.mirrors[p]);
                self.emit(ListDiff::Move {
                    idx: offset + idx,
                    count: *count,
                    dest: offset + dest,
                });
            }
            ListDiff::Change { idx, count, fields } => {
                if *idx + *count > len {
                    return Err(Error::out_of_range(*idx + *count, len));
                }
                self.emit(ListDiff::Change {
                    idx: offset + idx,
                    count: *count,
                    fields: fields.clone(),
                });
            }
            ListDiff::Populated(populated) => {
                self.ready[p] = *populated;
                self.update_populated();
            }
            ListDiff::Count(_) => {}
        }
        Ok(())
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

impl Emitter for CompositeList {
    type Out = dyn ListView<RowRef>;

    fn outbox(&mut self) -> &mut Outbox<dyn ListView<RowRef>> {
        &mut self.outbox
    }
}

impl Handle<CompositeList> {
    pub fn set_projections(&self, projections: Vec<OuterViewPort<dyn ProjectionView>>) {
        self.edit(|c| c.set_projections(projections));
    }
}

impl View for CompositeList {
    type Msg = ListDiff<RowRef>;
}

impl ListView<RowRef> for CompositeList {
    fn len(&self) -> usize {
        self.mirrors.iter().map(Vec::len).sum()
    }

    fn get(&self, idx: &usize) -> Option<RowRef> {
        let (p, r) = self.locate(*idx)?;
        Some(self.row_ref(p, r, self.mirrors[p][r]))
    }

    fn field(&self, idx: usize, field: &str) -> Result<Option<Value>> {
        let (p, r) = self.locate(idx).ok_or_else(|| Error::out_of_range(idx, self.len()))?;
        match self.sources.get(p) {
            Some(Some(source)) => source.field(r, field),
            _ => Err(Error::invariant(format!("projection {} is gone", p))),
        }
    }

    fn fields(&self, idx: usize) -> Result<BTreeMap<String, Value>> {
        let (p, r) = self.locate(idx).ok_or_else(|| Error::out_of_range(idx, self.len()))?;
        match self.sources.get(p) {
            Some(Some(source)) => source.fields(r),
            _ => Err(Error::invariant(format!("projection {} is gone", p))),
        }
    }

    fn is_populated(&self) -> bool {
        self.populated
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
