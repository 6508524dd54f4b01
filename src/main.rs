use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use joymacro::config::{CliArgs, Mode, Settings};
use joymacro::controller::event_collector::Collecting;
use joymacro::controller::{
    CollectorError, CollectorSettings, GamepadCollector, GamepadInfo, InputStateTracker, RawEventSource,
};
use joymacro::engine::{load_or_default, Engine, EngineError, EngineHandle, EngineSettings};
use joymacro::executor::{SequenceExecutor, TracingSink};
use joymacro::logging;
use joymacro::mapping::{write_default_config, HookRegistry, TomlFileSource};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = CliArgs::parse().into_settings();
    let _log_guard = setup(&settings)?;
    debug!("Settings: {:?}", settings);

    match settings.mode {
        Mode::CreateConfig => create_config(&settings),
        Mode::MonitorEvents => monitor_events(&settings).await,
        Mode::Run => run(settings).await,
    }
}

fn setup(settings: &Settings) -> Result<Option<WorkerGuard>> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    let guard = logging::init(settings.log_level, settings.log_file.as_deref())?;
    Ok(guard)
}

fn create_config(settings: &Settings) -> Result<()> {
    let path = &settings.bindings_path;
    if write_default_config(path)? {
        info!("Created {}", path.display());
    } else {
        warn!("{} already exists and was not overwritten", path.display());
    }
    Ok(())
}

fn open_gamepad(settings: &Settings) -> Result<GamepadCollector<Collecting>, EngineError> {
    info!("Initializing gamepad collector");
    GamepadCollector::create(Some(CollectorSettings {
        gamepad_index: settings.gamepad_index,
    }))
    .and_then(|collector| collector.initialize())
    .map_err(|e| EngineError::DeviceUnavailable(e.to_string()))
}

async fn run(settings: Settings) -> Result<()> {
    let mut collector = open_gamepad(&settings)?;

    let hooks = HookRegistry::with_builtins();
    let table = load_or_default(&settings.bindings_path, &hooks);
    let executor = SequenceExecutor::new(Arc::new(TracingSink))?;
    let mut engine = Engine::new(
        table,
        Arc::new(TomlFileSource::new(&settings.bindings_path)),
        hooks,
        executor,
        EngineSettings::default(),
    );
    let handle = engine.handle();

    let mut poller = tokio::task::spawn_blocking(move || engine.run(&mut collector));
    reload_on_hangup(handle.clone())?;

    info!(
        "Ready. Send SIGHUP to reload {}, Ctrl-C to exit",
        settings.bindings_path.display()
    );

    let polled = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Ctrl-C received");
            None
        }
        result = &mut poller => Some(result),
    };

    handle.shutdown(settings.shutdown).await;
    let result = match polled {
        Some(result) => result,
        None => poller.await,
    };
    result.map_err(|e| EngineError::ThreadError(e.to_string()))??;

    info!("Bye");
    Ok(())
}

#[cfg(unix)]
fn reload_on_hangup(handle: EngineHandle) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    let cancel = handle.cancellation_token();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    let reloader = handle.clone();
                    match tokio::task::spawn_blocking(move || reloader.reload()).await {
                        Ok(Ok(report)) => info!(
                            "Reloaded {}: {} binding(s), {} skipped",
                            report.origin,
                            report.loaded,
                            report.skipped.len()
                        ),
                        Ok(Err(_)) => {}
                        Err(e) => error!("Reload task failed: {}", e),
                    }
                }
            }
        }
        debug!("Reload listener stopped");
    });
    Ok(())
}

#[cfg(not(unix))]
fn reload_on_hangup(_handle: EngineHandle) -> Result<()> {
    debug!("Reload on SIGHUP is not available on this platform");
    Ok(())
}

fn describe(pad: &GamepadInfo) -> String {
    let uuid: String = pad.uuid.iter().map(|b| format!("{:02x}", b)).collect();
    format!("[{}] {} (id {}, uuid {})", pad.index, pad.name, pad.id, uuid)
}

async fn monitor_events(settings: &Settings) -> Result<()> {
    let mut collector = open_gamepad(settings)?;
    for pad in collector.gamepads() {
        info!("Gamepad {}", describe(&pad));
    }
    info!("Monitoring input events, Ctrl-C to exit");

    let cancel = CancellationToken::new();
    let stop = cancel.clone();
    let monitor = tokio::task::spawn_blocking(move || {
        let mut tracker = InputStateTracker::new();
        while !stop.is_cancelled() {
            let Some(event) = collector.next_event(Duration::from_millis(100))? else {
                continue;
            };
            match tracker.on_raw_event(&event) {
                Some(fired) => info!("{} (fires {})", event, fired),
                None => info!("{}", event),
            }
        }
        Ok::<(), CollectorError>(())
    });

    tokio::signal::ctrl_c().await?;
    cancel.cancel();
    monitor
        .await
        .map_err(|e| eyre!("Monitor thread failed: {}", e))??;
    Ok(())
}
