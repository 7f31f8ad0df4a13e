
                    /*\
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                   View
<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>
                    \*/
pub trait View: Send + Sync {
    /// Notification message for the observers
    type Msg: Send + Sync;
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

use std::sync::{Arc, RwLock};

impl<V: View + ?Sized> View for RwLock<V> {
    type Msg = V::Msg;
}

impl<V: View + ?Sized> View for Arc<V> {
    type Msg = V::Msg;
}

impl<V: View> View for Option<V> {
    type Msg = V::Msg;
}

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

pub mod channel;
pub mod observer;
pub mod port;

pub use {
    channel::{queue_channel, ChannelReceiver, ChannelSender, DiffQueue},
    observer::{NotifyFnObserver, Observer, ObserverBroadcast},
    port::{Delivery, InnerViewPort, OuterViewPort, Outbox, ViewPort},
};

//<<<<>>>><<>><><<>><<<*>>><<>><><<>><<<<>>>>

pub mod feed;
pub mod list;
