// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Control events from the input thread.
//!
//! Input handlers never touch renderer state directly. They push
//! [`ControlEvent`]s into an unbounded `crossbeam-channel` queue (see
//! [`control_channel`], `std` only) and the render thread drains the queue at
//! the top of each frame, so parameter changes never land mid-fill.

use alloc::string::String;

use kurbo::Vec2;

/// A request from the UI or input layer.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlEvent {
    /// Pan by a pixel delta and zoom by scroll ticks. Soft invalidation.
    Navigate {
        /// Drag delta in window pixels.
        pan: Vec2,
        /// Scroll ticks; positive zooms in.
        zoom_ticks: f64,
    },
    /// Replace parameters from a JSON preset. Hard invalidation.
    Preset(String),
}

impl ControlEvent {
    /// Whether applying this event cannot change the image.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Navigate { pan, zoom_ticks } if *pan == Vec2::ZERO && *zoom_ticks == 0.0)
    }
}

/// How much of the rendered state an update invalidates.
///
/// Ordered by strength, so several updates merge with [`Ord::max`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Invalidation {
    /// Nothing changed.
    #[default]
    None,
    /// Restart refinement; keep the estimator history (by default).
    Soft,
    /// Restart refinement and drop the estimator history.
    Hard,
}

impl Invalidation {
    /// The stronger of `self` and `other`.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        self.max(other)
    }
}

#[cfg(feature = "std")]
pub use channel::{ControlReceiver, ControlSender, control_channel};

#[cfg(feature = "std")]
mod channel {
    use alloc::vec::Vec;
    use core::cell::Cell;

    use crossbeam_channel::{Receiver, SendError, Sender, TryRecvError};

    use super::ControlEvent;

    /// Creates a connected sender/receiver pair.
    #[must_use]
    pub fn control_channel() -> (ControlSender, ControlReceiver) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            ControlSender { tx },
            ControlReceiver {
                rx,
                disconnected: Cell::new(false),
            },
        )
    }

    /// Input-thread end of the control queue. Not `Clone`: one producer.
    #[derive(Debug)]
    pub struct ControlSender {
        tx: Sender<ControlEvent>,
    }

    impl ControlSender {
        /// Queues an event. Returns it back if the receiver is gone.
        pub fn send(&self, event: ControlEvent) -> Result<(), ControlEvent> {
            self.tx.send(event).map_err(SendError::into_inner)
        }
    }

    /// Render-thread end of the control queue.
    #[derive(Debug)]
    pub struct ControlReceiver {
        rx: Receiver<ControlEvent>,
        disconnected: Cell<bool>,
    }

    impl ControlReceiver {
        /// Takes every queued event, oldest first, without blocking.
        #[must_use]
        pub fn drain(&self) -> Vec<ControlEvent> {
            let mut events = Vec::new();
            loop {
                match self.rx.try_recv() {
                    Ok(event) => events.push(event),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        self.disconnected.set(true);
                        break;
                    }
                }
            }
            events
        }

        /// Number of queued events.
        #[must_use]
        pub fn pending(&self) -> usize {
            self.rx.len()
        }

        /// Whether the sender was alive at the last [`drain`](Self::drain).
        ///
        /// Turns false once a drain has emptied the queue of a dropped
        /// sender, so no event is ever left behind.
        #[must_use]
        pub fn is_connected(&self) -> bool {
            !self.disconnected.get()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strongest_invalidation_wins() {
        let (none, soft, hard) = (Invalidation::None, Invalidation::Soft, Invalidation::Hard);
        assert_eq!(none.merge(soft), soft);
        assert_eq!(hard.merge(soft), hard);
        assert_eq!(none.merge(none), none);
        let merged = [soft, none, hard, soft].into_iter().fold(none, Invalidation::merge);
        assert_eq!(merged, hard);
    }

    #[test]
    fn zero_navigation_is_noop() {
        let e = ControlEvent::Navigate {
            pan: Vec2::ZERO,
            zoom_ticks: 0.0,
        };
        assert!(e.is_noop());
        assert!(!ControlEvent::Preset(String::new()).is_noop());
    }

    #[cfg(feature = "std")]
    #[test]
    fn channel_delivers_in_order_across_threads() {
        use alloc::vec::Vec;

        let (tx, rx) = control_channel();
        let handle = std::thread::spawn(move || {
            for i in 0..4 {
                let pan = Vec2::new(f64::from(i), 0.0);
                tx.send(ControlEvent::Navigate { pan, zoom_ticks: 0.0 })
                    .unwrap();
            }
        });
        handle.join().unwrap();
        assert!(rx.is_connected());
        assert_eq!(rx.pending(), 4);
        let xs: Vec<f64> = rx
            .drain()
            .into_iter()
            .map(|e| match e {
                ControlEvent::Navigate { pan, .. } => pan.x,
                ControlEvent::Preset(_) => -1.0,
            })
            .collect();
        assert_eq!(xs, [0.0, 1.0, 2.0, 3.0]);
        assert_eq!(rx.pending(), 0);
        assert!(!rx.is_connected());
    }

    #[cfg(feature = "std")]
    #[test]
    fn live_sender_keeps_the_receiver_connected() {
        let (tx, rx) = control_channel();
        tx.send(ControlEvent::Preset(String::from("{}"))).unwrap();
        assert_eq!(rx.drain().len(), 1);
        assert!(rx.is_connected());
        assert!(rx.drain().is_empty());
        assert!(rx.is_connected());
        drop(tx);
        assert!(rx.drain().is_empty());
        assert!(!rx.is_connected());
    }

    #[cfg(feature = "std")]
    #[test]
    fn send_fails_after_receiver_drops() {
        let (tx, rx) = control_channel();
        drop(rx);
        let event = ControlEvent::Preset(String::from("{}"));
        assert_eq!(tx.send(event.clone()), Err(event));
    }
}
