//! Sources of raw input events for the polling path.

use crate::controller::event_collector::CollectorError;
use crate::controller::input_types::RawInputEvent;
use std::sync::mpsc;
use std::time::Duration;

/// A blocking producer of raw input events.
///
/// `next_event` waits at most `timeout` and returns `Ok(None)` when nothing
/// arrived, so the caller can check for cancellation between polls.
pub trait RawEventSource: Send {
    fn next_event(&mut self, timeout: Duration) -> Result<Option<RawInputEvent>, CollectorError>;
}

/// Source fed through a channel by any producer thread
#[derive(Debug)]
pub struct ChannelSource {
    receiver: mpsc::Receiver<RawInputEvent>,
}

impl ChannelSource {
    pub fn new() -> (mpsc::Sender<RawInputEvent>, Self) {
        let (sender, receiver) = mpsc::channel();
        (sender, Self { receiver })
    }
}

impl RawEventSource for ChannelSource {
    fn next_event(&mut self, timeout: Duration) -> Result<Option<RawInputEvent>, CollectorError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(CollectorError::SourceClosed(
                "event channel disconnected".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_source_yields_then_times_out_then_closes() {
        let (sender, mut source) = ChannelSource::new();
        sender
            .send(RawInputEvent::ButtonDown { button: 1 })
            .unwrap();

        assert_eq!(
            source.next_event(Duration::from_millis(10)).unwrap(),
            Some(RawInputEvent::ButtonDown { button: 1 })
        );
        assert_eq!(source.next_event(Duration::from_millis(10)).unwrap(), None);

        drop(sender);
        assert!(matches!(
            source.next_event(Duration::from_millis(10)),
            Err(CollectorError::SourceClosed(_))
        ));
    }
}
