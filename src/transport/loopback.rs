use serde_json::Value;
use tracing::debug;

use crate::bus::{BusError, SubscriptionId};
use crate::hub::Hub;
use crate::message::RawMessage;

/// In-process responder turning outbound commands into inbound events.
///
/// `respond` sees each command in its outbound form and returns the event to
/// deliver on the events channel, or `None` to leave the command unanswered.
/// The event is delivered before `Command::emit` returns.
pub struct Loopback {
    hub: Hub,
    subscription: SubscriptionId,
}

impl Loopback {
    pub fn attach<F>(hub: &Hub, respond: F) -> Result<Self, BusError>
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        let target = hub.downgrade();
        let subscription = hub.on_commands(move |command| {
            let Some(hub) = target.upgrade() else {
                return Ok(());
            };
            match respond(command) {
                Some(event) => {
                    let delivery = hub.deliver(RawMessage::Structured(event))?;
                    debug!(
                        delivered = delivery.delivered,
                        failed = delivery.failed,
                        "loopback answered command"
                    );
                }
                None => debug!("loopback left command unanswered"),
            }
            Ok(())
        })?;
        Ok(Self {
            hub: hub.clone(),
            subscription,
        })
    }

    /// Stop answering commands.
    pub fn detach(self) -> Result<bool, BusError> {
        self.hub.unsubscribe_commands(self.subscription)
    }
}
