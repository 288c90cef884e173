//! Typed event channels
//!
//! The two logical channels of a binding:
//!
//! - **Inbound** carries [`InboundEvent`]s from the remote session to the
//!   terminal surface.
//! - **Outbound** carries [`OutboundEvent`]s from the terminal surface to the
//!   remote session, the controller and the presentation layer.
//!
//! An [`EventChannel`] fans every emitted event out to the FIFO queue of each
//! attached [`Listener`]. A listener only queues the events its filter
//! accepts, so each event name has an explicit consumer. Dropping a listener
//! detaches it; later emissions never reach it.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::geometry::Geometry;

/// Events flowing from the remote session to the terminal surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Raw output bytes from the remote session
    Data(Vec<u8>),
    /// Title announced by the remote side
    Title(String),
}

/// Events flowing from the terminal surface towards the remote session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// Input bytes produced by the surface (keystrokes, replies)
    Data(Vec<u8>),
    /// The surface was fitted to a new size
    Resize(Geometry),
    /// The surface title changed
    Title(String),
}

impl OutboundEvent {
    pub fn is_data(&self) -> bool {
        matches!(self, OutboundEvent::Data(_))
    }

    pub fn is_resize(&self) -> bool {
        matches!(self, OutboundEvent::Resize(_))
    }

    pub fn is_title(&self) -> bool {
        matches!(self, OutboundEvent::Title(_))
    }
}

pub type Inbound = EventChannel<InboundEvent>;
pub type Outbound = EventChannel<OutboundEvent>;

type ListenerId = u64;

struct Subscriber<E> {
    id: ListenerId,
    accepts: fn(&E) -> bool,
    tx: Sender<E>,
}

struct Registry<E> {
    next_id: ListenerId,
    subscribers: Vec<Subscriber<E>>,
}

fn lock<E>(registry: &Mutex<Registry<E>>) -> MutexGuard<'_, Registry<E>> {
    // A panicking listener thread must not wedge the channel
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A named, cloneable handle to one logical event channel
pub struct EventChannel<E> {
    name: &'static str,
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E> Clone for EventChannel<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E: Clone> EventChannel<E> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            registry: Arc::new(Mutex::new(Registry {
                next_id: 1,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Attach a listener that receives every event
    pub fn subscribe(&self) -> Listener<E> {
        self.subscribe_where(|_| true)
    }

    /// Attach a listener that only queues events accepted by `accepts`
    pub fn subscribe_where(&self, accepts: fn(&E) -> bool) -> Listener<E> {
        let (tx, rx) = mpsc::channel();
        let mut registry = lock(&*self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.push(Subscriber { id, accepts, tx });

        tracing::trace!(channel = self.name, listener = id, "Listener attached");

        Listener {
            id,
            channel: self.name,
            rx,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver an event to every interested listener.
    ///
    /// Returns the number of listeners the event was queued for.
    pub fn emit(&self, event: E) -> usize {
        let mut registry = lock(&*self.registry);
        let mut delivered = 0;
        registry.subscribers.retain(|sub| {
            if !(sub.accepts)(&event) {
                return true;
            }
            match sub.tx.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                // Receiver gone without a detach (listener leaked across threads)
                Err(_) => false,
            }
        });
        delivered
    }

    /// Number of attached listeners
    #[cfg(test)]
    pub fn listener_count(&self) -> usize {
        lock(&*self.registry).subscribers.len()
    }
}

/// The consuming end of one subscription
pub struct Listener<E> {
    id: ListenerId,
    channel: &'static str,
    rx: Receiver<E>,
    registry: Weak<Mutex<Registry<E>>>,
}

impl<E> Listener<E> {
    /// Take the oldest queued event, if any
    pub fn try_next(&self) -> Option<E> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Take every queued event in arrival order
    pub fn drain(&self) -> Vec<E> {
        self.rx.try_iter().collect()
    }

    /// Detach from the channel, discarding anything still queued
    pub fn detach(self) {
        drop(self);
    }

    fn unregister(&self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&*registry).subscribers.retain(|sub| sub.id != self.id);
            tracing::trace!(channel = self.channel, listener = self.id, "Listener detached");
        }
    }
}

impl<E> Drop for Listener<E> {
    fn drop(&mut self) {
        self.unregister();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fifo_per_listener() {
        let channel = Inbound::new("inbound");
        let listener = channel.subscribe();

        for chunk in [b"a".to_vec(), b"b".to_vec(), b"c".to_vec()] {
            channel.emit(InboundEvent::Data(chunk));
        }

        assert_eq!(
            listener.drain(),
            vec![
                InboundEvent::Data(b"a".to_vec()),
                InboundEvent::Data(b"b".to_vec()),
                InboundEvent::Data(b"c".to_vec()),
            ]
        );
        assert_eq!(listener.try_next(), None);
    }

    #[test]
    fn test_filtered_listener_only_sees_its_events() {
        let channel = Outbound::new("outbound");
        let resizes = channel.subscribe_where(OutboundEvent::is_resize);
        let all = channel.subscribe();

        channel.emit(OutboundEvent::Data(b"ls\r".to_vec()));
        let geometry = Geometry::new(100, 30).unwrap();
        assert_eq!(channel.emit(OutboundEvent::Resize(geometry)), 2);

        assert_eq!(resizes.drain(), vec![OutboundEvent::Resize(geometry)]);
        assert_eq!(all.drain().len(), 2);
    }

    #[test]
    fn test_dropped_listener_is_detached() {
        let channel = Inbound::new("inbound");
        let first = channel.subscribe();
        let second = channel.subscribe();
        assert_eq!(channel.listener_count(), 2);

        first.detach();
        assert_eq!(channel.listener_count(), 1);
        assert_eq!(channel.emit(InboundEvent::Title("t".into())), 1);

        drop(second);
        assert_eq!(channel.listener_count(), 0);
        assert_eq!(channel.emit(InboundEvent::Data(b"late".to_vec())), 0);
    }

    #[test]
    fn test_emit_from_another_thread_keeps_order() {
        let channel = Inbound::new("inbound");
        let listener = channel.subscribe();

        let producer = channel.clone();
        thread::spawn(move || {
            for i in 0..100u8 {
                producer.emit(InboundEvent::Data(vec![i]));
            }
        })
        .join()
        .unwrap();

        let bytes: Vec<u8> = listener
            .drain()
            .into_iter()
            .flat_map(|event| match event {
                InboundEvent::Data(bytes) => bytes,
                InboundEvent::Title(_) => Vec::new(),
            })
            .collect();
        assert_eq!(bytes, (0..100u8).collect::<Vec<_>>());
    }
}
