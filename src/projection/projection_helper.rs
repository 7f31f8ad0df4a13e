use {
    crate::view::{Observer, Outbox, OuterViewPort, View},
    std::sync::{RwLock, RwLockReadGuard},
    std::{
        any::Any,
        collections::HashMap,
        hash::Hash,
        sync::{Arc, Weak},
    },
};

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                 Emitter
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// A view living behind an `RwLock` which queues its diffs instead of
/// notifying while locked.
pub trait Emitter: Send + Sync + 'static {
    type Out: View + ?Sized + 'static;

    fn outbox(&mut self) -> &mut Outbox<Self::Out>;
}

/// Runs `f` under the write lock of `proj`, then delivers the diffs it
/// queued. Observers run after the lock is released and may read the view.
pub fn edit<P, R>(proj: &RwLock<P>, f: impl FnOnce(&mut P) -> R) -> R
where
    P: Emitter,
    <P::Out as View>::Msg: Clone,
{
    let (ret, delivery) = {
        let mut p = proj.write().unwrap();
        let ret = f(&mut *p);
        (ret, p.outbox().take())
    };
    delivery.send();
    ret
}

/// Shared handle to a projection.
///
/// Reads go straight to the lock. Every mutation goes through
/// [`Handle::edit`] so the observers never run while the projection is
/// locked.
pub struct Handle<P: Emitter>(Arc<RwLock<P>>);

impl<P: Emitter> Handle<P>
where
    <P::Out as View>::Msg: Clone,
{
    pub(crate) fn new(proj: Arc<RwLock<P>>) -> Self {
        Handle(proj)
    }

    pub fn read(&self) -> RwLockReadGuard<'_, P> {
        self.0.read().unwrap()
    }

    pub fn edit<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        edit(&self.0, f)
    }
}

impl<P: Emitter> Clone for Handle<P> {
    fn clone(&self) -> Self {
        Handle(self.0.clone())
    }
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
              Projection Helper
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/

/// Subscribes a projection `P` to its argument ports.
///
/// Each argument is observed through a [`ProjectionArg`] which forwards the
/// diffs to `P` through [`edit`]. The helper owns the argument observers,
/// dropping the helper (and with it the projection) unsubscribes them.
pub struct ProjectionHelper<ArgKey, P>
where
    ArgKey: Clone + Hash + Eq,
    P: Emitter,
{
    keepalive: HashMap<ArgKey, Arc<dyn Any + Send + Sync>>,
    proj: Arc<RwLock<Weak<RwLock<P>>>>,
}

impl<ArgKey, P> ProjectionHelper<ArgKey, P>
where
    ArgKey: Clone + Hash + Eq,
    P: Emitter,
{
    pub fn new() -> Self {
        ProjectionHelper {
            keepalive: HashMap::new(),
            proj: Arc::new(RwLock::new(Weak::new())),
        }
    }

    pub fn set_proj(&mut self, proj: &Arc<RwLock<P>>) {
        *self.proj.write().unwrap() = Arc::downgrade(proj);
    }

    /// Observes `port` under `arg_key`, replacing the previous argument of
    /// that key, and returns the current view of the port.
    ///
    /// The initial reset only records the view: the caller typically holds
    /// the lock of `P` and handles the returned view itself. Later resets and
    /// all diffs are forwarded to `reset` and `notify`.
    pub fn new_arg<V: View + ?Sized + 'static>(
        &mut self,
        arg_key: ArgKey,
        port: OuterViewPort<V>,
        notify: impl Fn(&mut P, &V::Msg) + Send + Sync + 'static,
        reset: impl Fn(&mut P, Option<Arc<V>>) + Send + Sync + 'static,
    ) -> Option<Arc<V>>
    where
        V::Msg: Clone + Send + Sync,
        <P::Out as View>::Msg: Clone,
    {
        self.remove_arg(&arg_key);

        let arg = Arc::new(RwLock::new(ProjectionArg {
            src: None,
            armed: false,
            notify: Box::new(notify),
            reset: Box::new(reset),
            proj: self.proj.clone(),
        }));

        port.add_observer(arg.clone());
        arg.write().unwrap().armed = true;

        let view = arg.read().unwrap().src.clone();
        self.keepalive.insert(arg_key, arg);
        view
    }

    pub fn remove_arg(&mut self, arg_key: &ArgKey) {
        self.keepalive.remove(arg_key);
    }

    pub fn clear(&mut self) {
        self.keepalive.clear();
    }
}

impl<ArgKey, P> Default for ProjectionHelper<ArgKey, P>
where
    ArgKey: Clone + Hash + Eq,
    P: Emitter,
{
    fn default() -> Self {
        ProjectionHelper::new()
    }
}

/// Special Observer which can access the state of the projection on notify
/// also handles the reset()
pub struct ProjectionArg<P, V>
where
    P: Emitter,
    V: View + ?Sized,
{
    src: Option<Arc<V>>,
    armed: bool,
    notify: Box<dyn Fn(&mut P, &V::Msg) + Send + Sync + 'static>,
    reset: Box<dyn Fn(&mut P, Option<Arc<V>>) + Send + Sync + 'static>,
    proj: Arc<RwLock<Weak<RwLock<P>>>>,
}

impl<P, V> ProjectionArg<P, V>
where
    P: Emitter,
    V: View + ?Sized,
{
    fn target(&self) -> Option<Arc<RwLock<P>>> {
        self.proj.read().unwrap().upgrade()
    }
}

impl<P, V> Observer<V> for ProjectionArg<P, V>
where
    P: Emitter,
    V: View + ?Sized,
    <P::Out as View>::Msg: Clone,
{
    fn reset(&mut self, new_src: Option<Arc<V>>) {
        self.src = new_src.clone();
        if self.armed {
            if let Some(p) = self.target() {
                edit(&p, |p| (self.reset)(p, new_src));
            }
        }
    }

    fn notify(&mut self, msg: &V::Msg) {
        if let Some(p) = self.target() {
            edit(&p, |p| (self.notify)(p, msg));
        }
    }
}
