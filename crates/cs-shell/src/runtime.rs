//! Async driver for hosts that deliver events over a channel.

use crate::Coordinator;
use cs_host::EventResponse;
use cs_host::HostEvent;
use cs_host::ShellHost;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;

/// One host event, with a reply slot for cancellable events.
#[derive(Debug)]
pub struct HostMessage {
    pub event: HostEvent,
    pub reply: Option<oneshot::Sender<EventResponse>>,
}

impl HostMessage {
    /// Event whose answer the host does not wait for.
    pub fn notify(event: HostEvent) -> Self {
        Self { event, reply: None }
    }

    /// Event the host blocks on; the answer arrives on the returned receiver.
    pub fn request(event: HostEvent) -> (Self, oneshot::Receiver<EventResponse>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                event,
                reply: Some(tx),
            },
            rx,
        )
    }
}

/// Runs the coordinator until it shuts down, or until the channel is closed
/// and no deferred work remains. Returns the number of messages handled.
pub async fn run_event_loop<H>(
    coordinator: &mut Coordinator<H>,
    mut messages: mpsc::UnboundedReceiver<HostMessage>,
) -> usize
where
    H: ShellHost,
{
    let mut handled = 0_usize;
    let mut open = true;
    coordinator.pump_host_events(Instant::now().into_std());

    loop {
        if coordinator.is_shut_down() {
            break;
        }
        let wake = coordinator.next_deadline().map(Instant::from_std);

        tokio::select! {
            message = messages.recv(), if open => match message {
                Some(message) => {
                    let now = Instant::now().into_std();
                    let response = coordinator.handle_event(message.event, now);
                    if let Some(reply) = message.reply {
                        if reply.send(response).is_err() {
                            debug!("host stopped waiting for an event reply");
                        }
                    }
                    coordinator.pump_host_events(now);
                    handled += 1;
                }
                None => {
                    debug!("host event channel closed");
                    open = false;
                }
            },
            () = tokio::time::sleep_until(wake.unwrap_or_else(Instant::now)), if wake.is_some() => {
                let now = Instant::now().into_std();
                coordinator.run_due_tasks(now);
                coordinator.pump_host_events(now);
            }
            else => break,
        }
    }

    info!(handled, shut_down = coordinator.is_shut_down(), "event loop finished");
    handled
}
