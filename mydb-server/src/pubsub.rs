//! # Pub/Sub broker (C10)
//!
//! Channel → subscriber-set registry behind one mutex, grounded on
//! `examples/original_source/include/pubsub.h`'s `PubSubManager`. Each
//! subscriber is represented by its connection id and an
//! `mpsc::Sender<Vec<u8>>` the connection thread drains between reads.

use std::collections::HashMap;
use std::sync::mpsc::Sender;

use parking_lot::Mutex;

use mydb_common::line_protocol::format_line;

/// Registry of channel name to the set of subscribers listening on it.
#[derive(Default)]
pub struct PubSub {
    channels: Mutex<HashMap<String, HashMap<u64, Sender<Vec<u8>>>>>,
}

impl PubSub {
    pub fn new() -> Self {
        PubSub::default()
    }

    /// Registers `conn_id` as a subscriber of `channel`.
    pub fn subscribe(&self, channel: &str, conn_id: u64, sender: Sender<Vec<u8>>) {
        self.channels
            .lock()
            .entry(channel.to_string())
            .or_default()
            .insert(conn_id, sender);
    }

    /// Removes `conn_id` from `channel`. Drops the channel entry once empty.
    pub fn unsubscribe(&self, channel: &str, conn_id: u64) {
        let mut channels = self.channels.lock();
        if let Some(subscribers) = channels.get_mut(channel) {
            subscribers.remove(&conn_id);
            if subscribers.is_empty() {
                channels.remove(channel);
            }
        }
    }

    /// Removes `conn_id` from every channel it is subscribed to, called
    /// when a connection closes.
    pub fn unsubscribe_all(&self, conn_id: u64) {
        let mut channels = self.channels.lock();
        channels.retain(|_, subscribers| {
            subscribers.remove(&conn_id);
            !subscribers.is_empty()
        });
    }

    /// Fans `message` out to every current subscriber of `channel`,
    /// returning the number of subscribers it was delivered to. Dead
    /// senders (the connection thread already exited) are pruned. Each
    /// subscriber receives a textual
    /// `*PUBLISH channel message` record rather than the bare payload.
    pub fn publish(&self, channel: &str, message: &[u8]) -> i64 {
        let mut channels = self.channels.lock();
        let Some(subscribers) = channels.get_mut(channel) else {
            return 0;
        };
        let record = format!("{}\r\n", format_line("*PUBLISH", &[channel.as_bytes().to_vec(), message.to_vec()]));
        let record = record.into_bytes();
        let mut delivered = 0i64;
        subscribers.retain(|_, sender| {
            let ok = sender.send(record.clone()).is_ok();
            if ok {
                delivered += 1;
            }
            ok
        });
        if subscribers.is_empty() {
            channels.remove(channel);
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn publish_delivers_to_every_subscriber() {
        let broker = PubSub::new();
        let (tx1, rx1) = channel();
        let (tx2, rx2) = channel();
        broker.subscribe("news", 1, tx1);
        broker.subscribe("news", 2, tx2);

        let delivered = broker.publish("news", b"hello");
        assert_eq!(delivered, 2);
        assert_eq!(rx1.recv().unwrap(), b"*PUBLISH news hello\r\n".to_vec());
        assert_eq!(rx2.recv().unwrap(), b"*PUBLISH news hello\r\n".to_vec());
    }

    #[test]
    fn publish_to_unknown_channel_delivers_to_nobody() {
        let broker = PubSub::new();
        assert_eq!(broker.publish("nobody-home", b"x"), 0);
    }

    #[test]
    fn unsubscribe_all_removes_every_membership() {
        let broker = PubSub::new();
        let (tx, _rx) = channel();
        broker.subscribe("a", 1, tx.clone());
        broker.subscribe("b", 1, tx);
        broker.unsubscribe_all(1);
        assert_eq!(broker.publish("a", b"x"), 0);
        assert_eq!(broker.publish("b", b"x"), 0);
    }
}
