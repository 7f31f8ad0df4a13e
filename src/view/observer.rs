use {
    crate::view::View,
    std::sync::RwLock,
    std::sync::{Arc, Weak},
};

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                 Observer
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
pub trait Observer<V: View + ?Sized>: Send + Sync {
    fn reset(&mut self, _view: Option<Arc<V>>) {}
    fn notify(&mut self, msg: &V::Msg);
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                 Broadcast
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Fans a diff out to every live observer before returning.
///
/// Delivery is synchronous and in registration order, so an observer has
/// finished reacting to message N when the emitter goes on to message N+1.
/// Observers must not mutate the emitting view from inside `notify`.
pub struct ObserverBroadcast<V: View + ?Sized>
where
    V::Msg: Send + Sync,
{
    observers: Vec<Weak<RwLock<dyn Observer<V>>>>,
}

impl<V: View + ?Sized> ObserverBroadcast<V>
where
    V::Msg: Clone + Send + Sync,
{
    pub fn new() -> Self {
        ObserverBroadcast {
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, obs: Weak<RwLock<dyn Observer<V>>>) {
        self.cleanup();
        self.observers.push(obs);
    }

    pub fn len(&self) -> usize {
        self.observers.iter().filter(|o| o.strong_count() > 0).count()
    }

    fn cleanup(&mut self) {
        self.observers.retain(|o| o.strong_count() > 0);
    }

    fn iter(&self) -> impl Iterator<Item = Arc<RwLock<dyn Observer<V>>>> + '_ {
        self.observers.iter().filter_map(|o| o.upgrade())
    }
}

impl<V: View + ?Sized> Default for ObserverBroadcast<V>
where
    V::Msg: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V: View + ?Sized> Observer<V> for ObserverBroadcast<V>
where
    V::Msg: Clone,
{
    fn reset(&mut self, view: Option<Arc<V>>) {
        for o in self.iter() {
            o.write().unwrap().reset(view.clone());
        }
    }

    fn notify(&mut self, msg: &V::Msg) {
        for o in self.iter() {
            o.write().unwrap().notify(msg);
        }
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

pub struct NotifyFnObserver<V, F>
where
    V: View + ?Sized,
    F: Fn(&V::Msg) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<V>,
}

impl<V, F> NotifyFnObserver<V, F>
where
    V: View + ?Sized,
    F: Fn(&V::Msg) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        NotifyFnObserver {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<V, F> Observer<V> for NotifyFnObserver<V, F>
where
    V: View + ?Sized,
    F: Fn(&V::Msg) + Send + Sync,
{
    fn notify(&mut self, msg: &V::Msg) {
        (self.f)(msg);
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

#[cfg(test)]
mod tests {
    use {
        crate::view::{feed::FeedDiff, feed::SourceFeed, ViewPort},
        std::sync::{Arc, RwLock},
    };

    #[test]
    fn broadcast_is_synchronous_and_skips_dropped_observers() {
        let port = ViewPort::<dyn SourceFeed>::new();
        let seen = Arc::new(RwLock::new(Vec::new()));

        let s = seen.clone();
        let first = port.outer().add_notify_fn(move |msg: &FeedDiff| s.write().unwrap().push((1, msg.clone())));
        let s = seen.clone();
        let second = port.outer().add_notify_fn(move |msg: &FeedDiff| s.write().unwrap().push((2, msg.clone())));

        port.inner().notify(&FeedDiff::Inserted { first: 0, count: 1 });
        assert_eq!(
            *seen.read().unwrap(),
            vec![
                (1, FeedDiff::Inserted { first: 0, count: 1 }),
                (2, FeedDiff::Inserted { first: 0, count: 1 }),
            ]
        );

        drop(first);
        port.inner().notify(&FeedDiff::Reset);
        assert_eq!(seen.read().unwrap().len(), 3);
        assert_eq!(seen.read().unwrap()[2], (2, FeedDiff::Reset));
        assert_eq!(port.get_cast().read().unwrap().len(), 1);
        drop(second);
    }
}
