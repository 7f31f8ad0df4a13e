use {
    crate::view::{Observer, OuterViewPort, View},
    async_std::stream::Stream,
    core::{
        pin::Pin,
        task::{Context, Poll, Waker},
    },
    std::sync::{Arc, Mutex, RwLock},
};

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                  Traits
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
pub trait ChannelData: Default + IntoIterator + Send + Sync {
    fn channel_insert(&mut self, x: Self::Item);
}

                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
               Queue Channel
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
impl<T> ChannelData for Vec<T>
where
    T: Send + Sync,
{
    fn channel_insert(&mut self, x: T) {
        self.push(x);
    }
}

/*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                  Channel
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
struct ChannelState<Data: ChannelData> {
    send_buf: Option<Data>,
    recv_iter: Option<Data::IntoIter>,
    num_senders: usize,
    waker: Option<Waker>,
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

pub struct ChannelSender<Data: ChannelData>(Arc<Mutex<ChannelState<Data>>>);
pub struct ChannelReceiver<Data: ChannelData>(Arc<Mutex<ChannelState<Data>>>);

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

impl<Data: ChannelData> ChannelSender<Data>
where
    Data::IntoIter: Send + Sync,
{
    pub fn send(&self, msg: Data::Item) {
        let mut state = self.0.lock().unwrap();
        state
            .send_buf
            .get_or_insert_with(Data::default)
            .channel_insert(msg);

        if let Some(waker) = state.waker.take() {
            waker.wake();
        }
    }
}

impl<V: View + ?Sized, Data: ChannelData<Item = V::Msg>> Observer<V> for ChannelSender<Data>
where
    V::Msg: Clone,
    Data::IntoIter: Send + Sync,
{
    fn notify(&mut self, msg: &V::Msg) {
        self.send(msg.clone());
    }
}

impl<Data: ChannelData> Clone for ChannelSender<Data> {
    fn clone(&self) -> Self {
        self.0.lock().unwrap().num_senders += 1;
        ChannelSender(self.0.clone())
    }
}

impl<Data: ChannelData> Drop for ChannelSender<Data> {
    fn drop(&mut self) {
        let mut state = self.0.lock().unwrap();
        state.num_senders -= 1;
        if let Some(waker) = state.waker.take() {
            waker.wake();
        }
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

impl<Data: ChannelData> ChannelReceiver<Data> {
    pub fn try_recv(&self) -> Option<Data> {
        self.0.lock().unwrap().send_buf.take()
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

impl<Data: ChannelData> Stream for ChannelReceiver<Data> {
    type Item = Data::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut state = self.0.lock().unwrap();

        if let Some(recv_iter) = state.recv_iter.as_mut() {
            if let Some(val) = recv_iter.next() {
                return Poll::Ready(Some(val));
            }
            state.recv_iter = None;
        }

        if let Some(send_buf) = state.send_buf.take() {
            let mut recv_iter = send_buf.into_iter();
            let next = recv_iter.next();
            state.recv_iter = Some(recv_iter);
            Poll::Ready(next)
        } else if state.num_senders == 0 {
            Poll::Ready(None)
        } else {
            state.waker = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}

/*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
             Factory Functions
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
pub fn channel<Data: ChannelData>() -> (ChannelSender<Data>, ChannelReceiver<Data>) {
    let state = Arc::new(Mutex::new(ChannelState {
        send_buf: None,
        recv_iter: None,
        num_senders: 1,
        waker: None,
    }));

    (ChannelSender(state.clone()), ChannelReceiver(state))
}

pub fn queue_channel<T: Send + Sync>() -> (ChannelSender<Vec<T>>, ChannelReceiver<Vec<T>>) {
    channel::<Vec<T>>()
}

/*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                Diff Queue
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
/// Buffers every diff a port emits until it is drained.
///
/// The subscription lives as long as the queue; once the queue is dropped the
/// port no longer delivers to it.
pub struct DiffQueue<V: View + ?Sized>
where
    V::Msg: Clone,
{
    _sender: Arc<RwLock<ChannelSender<Vec<V::Msg>>>>,
    rx: ChannelReceiver<Vec<V::Msg>>,
}

impl<V: View + ?Sized> DiffQueue<V>
where
    V::Msg: Clone,
{
    /// All diffs received since the last drain, in emission order.
    pub fn drain(&self) -> Vec<V::Msg> {
        self.rx.try_recv().unwrap_or_default()
    }

    pub fn receiver(&mut self) -> &mut ChannelReceiver<Vec<V::Msg>> {
        &mut self.rx
    }
}

impl<V: View + ?Sized + 'static> OuterViewPort<V>
where
    V::Msg: Clone,
{
    pub fn diff_queue(&self) -> DiffQueue<V> {
        let (tx, rx) = queue_channel::<V::Msg>();
        let sender = Arc::new(RwLock::new(tx));
        self.add_observer(sender.clone());
        DiffQueue { _sender: sender, rx }
    }
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
