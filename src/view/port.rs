use {
    crate::view::{NotifyFnObserver, Observer, ObserverBroadcast, View},
    std::sync::{Arc, RwLock},
};

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                 View Port
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
pub struct ViewPort<V: View + ?Sized> {
    view: Arc<RwLock<Option<Arc<V>>>>,
    cast: Arc<RwLock<ObserverBroadcast<V>>>,
}

impl<V: View + ?Sized> ViewPort<V>
where
    V::Msg: Clone,
{
    pub fn new() -> Self {
        ViewPort {
            view: Arc::new(RwLock::new(None)),
            cast: Arc::new(RwLock::new(ObserverBroadcast::new())),
        }
    }

    pub fn set_view(&self, view: Option<Arc<V>>) {
        *self.view.write().unwrap() = view.clone();
        self.cast.write().unwrap().reset(view);
    }

    pub fn get_view(&self) -> Option<Arc<V>> {
        self.view.read().unwrap().clone()
    }

    pub fn get_cast(&self) -> Arc<RwLock<ObserverBroadcast<V>>> {
        self.cast.clone()
    }

    /// Registers `observer` and immediately resets it with the current view.
    /// The broadcast only keeps a weak reference, the caller owns the observer.
    pub fn add_observer(&self, observer: Arc<RwLock<dyn Observer<V>>>) {
        self.cast
            .write()
            .unwrap()
            .add_observer(Arc::downgrade(&observer));

        let view = self.view.read().unwrap().clone();
        observer.write().unwrap().reset(view);
    }

    pub fn inner(&self) -> InnerViewPort<V> {
        InnerViewPort(self.clone())
    }

    pub fn outer(&self) -> OuterViewPort<V> {
        OuterViewPort(self.clone())
    }

    pub fn into_inner(self) -> InnerViewPort<V> {
        InnerViewPort(self)
    }

    pub fn into_outer(self) -> OuterViewPort<V> {
        OuterViewPort(self)
    }
}

impl<V: View + ?Sized> Clone for ViewPort<V>
where
    V::Msg: Clone,
{
    fn clone(&self) -> Self {
        ViewPort {
            view: self.view.clone(),
            cast: self.cast.clone(),
        }
    }
}

impl<V: View + ?Sized> Default for ViewPort<V>
where
    V::Msg: Clone,
{
    fn default() -> Self {
        ViewPort::new()
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

/// Producer side of a port: sets the view and emits its diffs.
pub struct InnerViewPort<V: View + ?Sized>(pub ViewPort<V>)
where
    V::Msg: Clone;

/// Consumer side of a port: reads the view and registers observers.
pub struct OuterViewPort<V: View + ?Sized>(pub ViewPort<V>)
where
    V::Msg: Clone;

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

impl<V: View + ?Sized> InnerViewPort<V>
where
    V::Msg: Clone,
{
    pub fn get_broadcast(&self) -> Arc<RwLock<ObserverBroadcast<V>>> {
        self.0.cast.clone()
    }

    pub fn set_view(&self, view: Option<Arc<V>>) -> Arc<RwLock<ObserverBroadcast<V>>> {
        self.0.set_view(view);
        self.get_broadcast()
    }

    pub fn get_view(&self) -> Option<Arc<V>> {
        self.0.get_view()
    }

    pub fn notify(&self, msg: &V::Msg) {
        self.0.cast.write().unwrap().notify(msg);
    }

    pub fn outbox(&self) -> Outbox<V> {
        Outbox {
            queue: Vec::new(),
            cast: self.get_broadcast(),
        }
    }
}

impl<V: View + ?Sized> Clone for InnerViewPort<V>
where
    V::Msg: Clone,
{
    fn clone(&self) -> Self {
        InnerViewPort(self.0.clone())
    }
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                  Outbox
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Diffs an emitter queued while it was locked.
///
/// A view that is itself behind an `RwLock` cannot notify in place: an
/// observer reading the view from its `notify` would wait for the lock the
/// emitter still holds. Such views push into their outbox and hand the
/// queue over with [`Outbox::take`] once the lock is released.
pub struct Outbox<V: View + ?Sized> {
    queue: Vec<V::Msg>,
    cast: Arc<RwLock<ObserverBroadcast<V>>>,
}

/// Queued diffs on their way to the observers of one port.
#[must_use = "a delivery does nothing until it is sent"]
pub struct Delivery<V: View + ?Sized> {
    msgs: Vec<V::Msg>,
    cast: Arc<RwLock<ObserverBroadcast<V>>>,
}

impl<V: View + ?Sized> Outbox<V>
where
    V::Msg: Clone,
{
    pub fn push(&mut self, msg: V::Msg) {
        self.queue.push(msg);
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn take(&mut self) -> Delivery<V> {
        Delivery {
            msgs: std::mem::take(&mut self.queue),
            cast: self.cast.clone(),
        }
    }
}

impl<V: View + ?Sized> Delivery<V>
where
    V::Msg: Clone,
{
    pub fn len(&self) -> usize {
        self.msgs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.msgs.is_empty()
    }

    /// Notifies the observers, in queue order.
    pub fn send(self) {
        for msg in self.msgs.iter() {
            self.cast.write().unwrap().notify(msg);
        }
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

impl<V: View + ?Sized + 'static> OuterViewPort<V>
where
    V::Msg: Clone,
{
    pub fn get_view(&self) -> Option<Arc<V>> {
        self.0.get_view()
    }

    pub fn add_observer(&self, observer: Arc<RwLock<dyn Observer<V>>>) {
        self.0.add_observer(observer);
    }

    /// Number of observers still alive.
    pub fn observer_count(&self) -> usize {
        self.0.cast.read().unwrap().len()
    }

    pub fn add_notify_fn<F: Fn(&V::Msg) + Send + Sync + 'static>(
        &self,
        notify: F,
    ) -> Arc<RwLock<NotifyFnObserver<V, F>>> {
        let obs = Arc::new(RwLock::new(NotifyFnObserver::new(notify)));
        self.add_observer(obs.clone());
        obs
    }
}

impl<V: View + ?Sized> Clone for OuterViewPort<V>
where
    V::Msg: Clone,
{
    fn clone(&self) -> Self {
        OuterViewPort(self.0.clone())
    }
}

impl<V: View + ?Sized> Default for OuterViewPort<V>
where
    V::Msg: Clone,
{
    fn default() -> Self {
        ViewPort::new().into_outer()
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[cfg(test)]
mod tests {
    use {
        crate::{
            buffer::rows::RowBuffer,
            view::{
                feed::{FeedDiff, SourceFeed},
                Observer, ViewPort,
            },
        },
        std::sync::{Arc, RwLock},
    };

    #[derive(Default)]
    struct CountResets {
        resets: usize,
        rows: Option<usize>,
    }

    impl Observer<dyn SourceFeed> for CountResets {
        fn reset(&mut self, view: Option<Arc<dyn SourceFeed>>) {
            self.resets += 1;
            self.rows = view.map(|v| v.row_count());
        }

        fn notify(&mut self, _msg: &FeedDiff) {}
    }

    #[test]
    fn late_observers_see_the_current_view() {
        let buf = RowBuffer::with_data(vec!["a".to_string(), "b".to_string()]);
        let port = buf.get_port();

        let obs = Arc::new(RwLock::new(CountResets::default()));
        port.add_observer(obs.clone());
        assert_eq!(obs.read().unwrap().resets, 1);
        assert_eq!(obs.read().unwrap().rows, Some(2));
        assert_eq!(port.observer_count(), 1);

        drop(obs);
        assert_eq!(port.observer_count(), 0);
    }

    #[test]
    fn outbox_holds_diffs_until_sent() {
        let port = ViewPort::<dyn SourceFeed>::new();
        let queue = port.outer().diff_queue();
        let mut outbox = port.inner().outbox();

        outbox.push(FeedDiff::Inserted { first: 0, count: 1 });
        outbox.push(FeedDiff::Reset);
        assert!(queue.drain().is_empty());

        let delivery = outbox.take();
        assert!(outbox.is_empty());
        assert_eq!(delivery.len(), 2);
        delivery.send();
        assert_eq!(queue.drain(), vec![FeedDiff::Inserted { first: 0, count: 1 }, FeedDiff::Reset]);
    }

    #[test]
    fn set_view_resets_observers() {
        let port = ViewPort::<dyn SourceFeed>::new();
        let obs = Arc::new(RwLock::new(CountResets::default()));
        port.outer().add_observer(obs.clone());
        assert_eq!(obs.read().unwrap().rows, None);

        let buf = RowBuffer::with_data(vec!["x".to_string()]);
        port.inner().set_view(buf.get_port().get_view());
        assert_eq!(obs.read().unwrap().resets, 2);
        assert_eq!(obs.read().unwrap().rows, Some(1));

        port.inner().set_view(None);
        assert_eq!(obs.read().unwrap().rows, None);
    }
}
