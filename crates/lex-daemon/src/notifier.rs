//! Notification delivery over the SSE bus.
//!
//! The daemon does not own a chat transport. A due notification is published
//! as a `notification` event; whatever consumes `/v1/stream` forwards it to
//! the subscriber. With nobody listening the delivery fails and the
//! scheduler reports it.

use anyhow::anyhow;
use async_trait::async_trait;
use lex_runtime::Notifier;
use tokio::sync::broadcast;

use crate::state::BusMsg;

pub struct BusNotifier {
    bus: broadcast::Sender<BusMsg>,
}

impl BusNotifier {
    pub fn new(bus: broadcast::Sender<BusMsg>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl Notifier for BusNotifier {
    async fn deliver(&self, subscriber_id: &str, message: &str) -> anyhow::Result<()> {
        self.bus
            .send(BusMsg::Notification {
                subscriber_id: subscriber_id.to_string(),
                message: message.to_string(),
            })
            .map(|_| ())
            .map_err(|_| anyhow!("no stream consumer connected"))
    }
}
