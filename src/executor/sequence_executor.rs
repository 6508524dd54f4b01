//! Single-occupancy playback of key sequences.
//!
//! The execution slot is a one-permit semaphore. Accepting a sequence moves
//! the permit into a watcher task on the runtime, so the slot frees itself
//! when playback ends, panics or is aborted. A busy slot rejects immediately;
//! triggers are never queued.

use crate::controller::InputId;
use crate::executor::output_sink::KeyOutputSink;
use crate::mapping::{ActionConfig, HookRef, KeyId, SequenceStep};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("A sequence is already playing")]
    Busy,

    #[error("Executor has been shut down")]
    ShutDown,

    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),
}

/// What happens to an in-flight sequence on shutdown
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ShutdownPolicy {
    /// Wait for the sequence and its after-run hook to finish
    #[default]
    Drain,
    /// Cancel the sequence at its next suspension point; the after-run hook
    /// may not run
    Abort,
}

struct Running {
    trigger: InputId,
    playback: AbortHandle,
    watcher: JoinHandle<()>,
}

#[derive(Clone)]
pub struct SequenceExecutor {
    slot: Arc<Semaphore>,
    sink: Arc<dyn KeyOutputSink>,
    runtime: Handle,
    running: Arc<Mutex<Option<Running>>>,
}

impl SequenceExecutor {
    /// Creates an executor on the current tokio runtime
    pub fn new(sink: Arc<dyn KeyOutputSink>) -> Result<Self, ExecutorError> {
        let runtime = Handle::try_current().map_err(|e| ExecutorError::NoRuntime(e.to_string()))?;
        Ok(Self::with_runtime(sink, runtime))
    }

    pub fn with_runtime(sink: Arc<dyn KeyOutputSink>, runtime: Handle) -> Self {
        Self {
            slot: Arc::new(Semaphore::new(1)),
            sink,
            runtime,
            running: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts `action` if the slot is free. Returns whether it was accepted.
    pub fn try_execute(&self, action: Arc<ActionConfig>) -> bool {
        match self.submit(action) {
            Ok(()) => true,
            Err(e) => {
                debug!("Sequence rejected: {}", e);
                false
            }
        }
    }

    /// Like [`try_execute`](Self::try_execute) but reports why a sequence was rejected
    pub fn submit(&self, action: Arc<ActionConfig>) -> Result<(), ExecutorError> {
        let permit = match Arc::clone(&self.slot).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                warn!("Busy, dropping trigger {}", action.trigger);
                return Err(ExecutorError::Busy);
            }
            Err(TryAcquireError::Closed) => {
                warn!("Shut down, dropping trigger {}", action.trigger);
                return Err(ExecutorError::ShutDown);
            }
        };

        let trigger = action.trigger;
        info!(
            "Executing sequence for {} ({} step(s), {} press(es))",
            trigger,
            action.sequence.len(),
            action.press_count()
        );

        let playback = self.runtime.spawn(play(action, Arc::clone(&self.sink)));
        let abort = playback.abort_handle();
        let watcher = self.runtime.spawn(watch(trigger, playback, permit));

        if let Ok(mut running) = self.running.lock() {
            *running = Some(Running {
                trigger,
                playback: abort,
                watcher,
            });
        }
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        self.slot.available_permits() == 0
    }

    /// Waits until no sequence is playing
    pub async fn wait_idle(&self) {
        // a closed slot has nothing left to wait for except a draining watcher
        if let Ok(permit) = self.slot.acquire().await {
            drop(permit);
        } else if let Some(watcher) = self.take_running().map(|r| r.watcher) {
            let _ = watcher.await;
        }
    }

    /// Closes the slot so every later trigger is rejected, then settles the
    /// in-flight sequence according to `policy`.
    pub async fn shutdown(&self, policy: ShutdownPolicy) {
        info!("Shutting down sequence executor ({:?})", policy);
        match policy {
            ShutdownPolicy::Drain => {
                match self.slot.acquire().await {
                    Ok(permit) => {
                        self.slot.close();
                        drop(permit);
                    }
                    Err(_) => debug!("Executor already shut down"),
                }
                self.take_running();
            }
            ShutdownPolicy::Abort => {
                self.slot.close();
                if let Some(running) = self.take_running() {
                    if !running.watcher.is_finished() {
                        warn!("Aborting sequence for {}", running.trigger);
                    }
                    running.playback.abort();
                    let _ = running.watcher.await;
                }
            }
        }
        info!("Sequence executor stopped");
    }

    fn take_running(&self) -> Option<Running> {
        self.running.lock().ok().and_then(|mut running| running.take())
    }
}

/// Holds the slot until playback ends, however it ends
async fn watch(trigger: InputId, playback: JoinHandle<()>, permit: OwnedSemaphorePermit) {
    match playback.await {
        Ok(()) => debug!("Sequence for {} finished", trigger),
        Err(e) if e.is_cancelled() => warn!("Sequence for {} was cancelled", trigger),
        Err(e) => error!("Sequence for {} aborted: {}", trigger, e),
    }
    drop(permit);
}

async fn play(action: Arc<ActionConfig>, sink: Arc<dyn KeyOutputSink>) {
    let trigger = action.trigger;

    if let Some(hook) = &action.pre_run {
        run_hook("pre-run", hook, trigger).await;
    }

    let steps = action.sequence.len();
    for (index, step) in action.sequence.iter().enumerate() {
        let more_steps = index + 1 < steps;
        match step {
            SequenceStep::KeyPress { key, repeat } => {
                let repeat = repeat.get();
                for i in 1..=repeat {
                    press(sink.as_ref(), *key, index + 1);
                    if i < repeat || more_steps {
                        tokio::time::sleep(action.inter_press_delay).await;
                    }
                }
            }
            SequenceStep::Wait { duration } => {
                debug!("Step {}: waiting {:?}", index + 1, duration);
                tokio::time::sleep(*duration).await;
            }
        }
    }

    if let Some(hook) = &action.after_run {
        run_hook("after-run", hook, trigger).await;
    }
}

fn press(sink: &dyn KeyOutputSink, key: KeyId, step: usize) {
    if let Err(e) = sink.key_down(key) {
        warn!("Step {}: {}", step, e);
        return;
    }
    if let Err(e) = sink.key_up(key) {
        warn!("Step {}: {}", step, e);
    }
}

async fn run_hook(phase: &str, hook: &HookRef, trigger: InputId) {
    let name = hook.name().to_string();
    let hook = hook.clone();
    match tokio::task::spawn_blocking(move || hook.run(&trigger)).await {
        Ok(Ok(())) => debug!("{} hook '{}' done", phase, name),
        Ok(Err(e)) => warn!("{} hook failed: {}", phase, e),
        Err(e) => warn!("{} hook '{}' panicked: {}", phase, name, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::HatDirection;
    use crate::executor::output_sink::{KeyEvent, MemorySink, SinkError};
    use crate::mapping::{Hook, HookError};
    use std::time::Duration;
    use tokio::time::Instant;

    const V: KeyId = KeyId::Char('v');
    const X: KeyId = KeyId::Char('x');

    /// Records the phase and how many key events the sink had seen when it ran
    struct Recorder {
        name: &'static str,
        sink: MemorySink,
        calls: Arc<Mutex<Vec<(&'static str, usize)>>>,
        fail: bool,
    }

    impl Hook for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn run(&self, _trigger: &InputId) -> Result<(), HookError> {
            self.calls
                .lock()
                .unwrap()
                .push((self.name, self.sink.events().len()));
            if self.fail {
                return Err(HookError {
                    hook: self.name.to_string(),
                    reason: "recorder failure".to_string(),
                });
            }
            Ok(())
        }
    }

    struct Panicking;

    impl KeyOutputSink for Panicking {
        fn key_down(&self, _key: KeyId) -> Result<(), SinkError> {
            panic!("sink exploded");
        }

        fn key_up(&self, _key: KeyId) -> Result<(), SinkError> {
            Ok(())
        }
    }

    struct PanickingHook;

    impl Hook for PanickingHook {
        fn name(&self) -> &str {
            "panicking"
        }

        fn run(&self, _trigger: &InputId) -> Result<(), HookError> {
            panic!("hook exploded");
        }
    }

    fn executor(sink: &MemorySink) -> SequenceExecutor {
        SequenceExecutor::new(Arc::new(sink.clone())).unwrap()
    }

    fn pip_action() -> Arc<ActionConfig> {
        Arc::new(ActionConfig::new(
            InputId::hat(0, HatDirection::Up),
            vec![SequenceStep::press(V), SequenceStep::press_n(X, 2).unwrap()],
        ))
    }

    fn recorders(
        sink: &MemorySink,
        fail_pre: bool,
    ) -> (HookRef, HookRef, Arc<Mutex<Vec<(&'static str, usize)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let pre = HookRef::new(Recorder {
            name: "pre",
            sink: sink.clone(),
            calls: calls.clone(),
            fail: fail_pre,
        });
        let after = HookRef::new(Recorder {
            name: "after",
            sink: sink.clone(),
            calls: calls.clone(),
            fail: false,
        });
        (pre, after, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn plays_repeats_with_inter_press_delay() {
        let sink = MemorySink::new();
        let executor = executor(&sink);

        assert!(executor.try_execute(pip_action()));
        executor.wait_idle().await;

        let events = sink.timed_events();
        let kinds: Vec<KeyEvent> = events.iter().map(|(e, _)| *e).collect();
        assert_eq!(
            kinds,
            vec![
                KeyEvent::Down(V),
                KeyEvent::Up(V),
                KeyEvent::Down(X),
                KeyEvent::Up(X),
                KeyEvent::Down(X),
                KeyEvent::Up(X),
            ]
        );
        assert!(events[2].1 - events[1].1 >= Duration::from_millis(100));
        assert!(events[4].1 - events[3].1 >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_step_emits_nothing_and_takes_its_duration() {
        let sink = MemorySink::new();
        let executor = executor(&sink);
        let action = Arc::new(ActionConfig::new(
            InputId::Button(1),
            vec![SequenceStep::wait(Duration::from_millis(1500))],
        ));

        let started = Instant::now();
        assert!(executor.try_execute(action));
        executor.wait_idle().await;

        assert!(started.elapsed() >= Duration::from_millis(1500));
        assert!(sink.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn busy_slot_rejects_without_output() {
        let sink = MemorySink::new();
        let executor = executor(&sink);
        let long = Arc::new(ActionConfig::new(
            InputId::Button(1),
            vec![SequenceStep::wait(Duration::from_secs(5)), SequenceStep::press(V)],
        ));
        let other = Arc::new(ActionConfig::new(
            InputId::Button(2),
            vec![SequenceStep::press(X)],
        ));

        assert!(executor.try_execute(long));
        assert!(executor.is_busy());
        assert_eq!(executor.submit(other.clone()), Err(ExecutorError::Busy));
        assert!(!executor.try_execute(other));

        executor.wait_idle().await;
        assert!(!executor.is_busy());
        assert_eq!(sink.events(), vec![KeyEvent::Down(V), KeyEvent::Up(V)]);
    }

    #[tokio::test(start_paused = true)]
    async fn hooks_wrap_the_sequence() {
        let sink = MemorySink::new();
        let executor = executor(&sink);
        let (pre, after, calls) = recorders(&sink, false);
        let action = ActionConfig::new(InputId::Button(29), pip_action().sequence.clone())
            .with_pre_run(pre)
            .with_after_run(after);

        assert!(executor.try_execute(Arc::new(action)));
        executor.wait_idle().await;

        assert_eq!(*calls.lock().unwrap(), vec![("pre", 0), ("after", 6)]);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_hook_does_not_stop_the_sequence() {
        let sink = MemorySink::new();
        let executor = executor(&sink);
        let (pre, after, calls) = recorders(&sink, true);
        let action = ActionConfig::new(InputId::Button(3), vec![SequenceStep::press(V)])
            .with_pre_run(pre)
            .with_after_run(after);

        assert!(executor.try_execute(Arc::new(action)));
        executor.wait_idle().await;

        assert_eq!(sink.events().len(), 2);
        assert_eq!(*calls.lock().unwrap(), vec![("pre", 0), ("after", 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_hooks_neither_stop_playback_nor_hold_the_slot() {
        let sink = MemorySink::new();
        let executor = executor(&sink);
        let hook = HookRef::new(PanickingHook);
        let q = KeyId::Char('q');
        let action = ActionConfig::new(InputId::Button(7), vec![SequenceStep::press(q)])
            .with_pre_run(hook.clone())
            .with_after_run(hook);

        assert!(executor.try_execute(Arc::new(action)));
        executor.wait_idle().await;

        assert_eq!(sink.events(), vec![KeyEvent::Down(q), KeyEvent::Up(q)]);
        assert!(!executor.is_busy());
        assert!(executor.try_execute(pip_action()));
        executor.wait_idle().await;
        assert_eq!(sink.events().len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn sink_failure_skips_only_that_press() {
        let sink = MemorySink::new();
        sink.fail_on(X);
        let executor = executor(&sink);
        let action = ActionConfig::new(
            InputId::Button(4),
            vec![
                SequenceStep::press(V),
                SequenceStep::press(X),
                SequenceStep::press(KeyId::Char('c')),
            ],
        );

        assert!(executor.try_execute(Arc::new(action)));
        executor.wait_idle().await;

        assert_eq!(
            sink.events(),
            vec![
                KeyEvent::Down(V),
                KeyEvent::Up(V),
                KeyEvent::Down(KeyId::Char('c')),
                KeyEvent::Up(KeyId::Char('c')),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn panic_during_playback_releases_the_slot() {
        let executor = SequenceExecutor::new(Arc::new(Panicking)).unwrap();
        let action = Arc::new(ActionConfig::new(
            InputId::Button(5),
            vec![SequenceStep::press(V)],
        ));

        assert!(executor.try_execute(action.clone()));
        executor.wait_idle().await;
        assert!(!executor.is_busy());
        assert!(executor.try_execute(action));
    }

    #[tokio::test(start_paused = true)]
    async fn drain_shutdown_finishes_in_flight_sequence() {
        let sink = MemorySink::new();
        let executor = executor(&sink);
        let (pre, after, calls) = recorders(&sink, false);
        let action = ActionConfig::new(
            InputId::Button(6),
            vec![SequenceStep::wait(Duration::from_secs(2)), SequenceStep::press(V)],
        )
        .with_pre_run(pre)
        .with_after_run(after);

        assert!(executor.try_execute(Arc::new(action)));
        executor.shutdown(ShutdownPolicy::Drain).await;

        assert_eq!(sink.events().len(), 2);
        assert_eq!(*calls.lock().unwrap(), vec![("pre", 0), ("after", 2)]);
        assert_eq!(
            executor.submit(pip_action()),
            Err(ExecutorError::ShutDown)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn abort_shutdown_skips_the_rest_of_the_sequence() {
        let sink = MemorySink::new();
        let executor = executor(&sink);
        let (pre, after, calls) = recorders(&sink, false);
        let action = ActionConfig::new(
            InputId::Button(7),
            vec![SequenceStep::wait(Duration::from_secs(60)), SequenceStep::press(V)],
        )
        .with_pre_run(pre)
        .with_after_run(after);

        assert!(executor.try_execute(Arc::new(action)));
        // let playback reach the wait step
        tokio::time::sleep(Duration::from_millis(10)).await;
        executor.shutdown(ShutdownPolicy::Abort).await;

        assert!(sink.events().is_empty());
        assert!(calls.lock().unwrap().iter().all(|(name, _)| *name == "pre"));
        assert!(!executor.is_busy());
        assert!(!executor.try_execute(pip_action()));
    }
}
