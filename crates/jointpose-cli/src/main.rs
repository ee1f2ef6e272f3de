//! `jointpose` – teleoperate, record and replay robot joint poses.
//!
//! 1. Loads `~/.jointpose/config.toml` (or `--config`), then applies
//!    `JOINTPOSE_*` overrides and command-line flags.
//! 2. Builds the command controller on the selected transport: a rosbridge
//!    WebSocket (default) or the logging sim sink.
//! 3. Runs one input loop (keyboard, joystick or file playback) on the main
//!    thread until it stops.
//! 4. Ctrl-C raises the session shutdown flag and publishes a system alert
//!    so the transport closes cleanly.

mod args;
mod config;
mod terminal;

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tracing::{debug, error, info, warn};

use jointpose_hal::PrefixPartition;
use jointpose_hal::sim::SimSink;
use jointpose_hal::CommandSink;
use jointpose_middleware::{
    BusSink, EventBus, JoyStream, LimbTopics, RosbridgeClient, Topic, spawn_feedback_pump,
};
use jointpose_runtime::{
    CommandController, FileDriver, InputDriver, JointCommander, JoystickDriver, KeyboardDriver,
    ModalBindingTable, Player, Recorder, Session, SharedController, init_tracing,
};
use jointpose_types::{Event, EventPayload, PoseError};

use crate::args::{Args, InputMode, Settings};
use crate::config::TransportKind;
use crate::terminal::TerminalKeys;

fn main() -> ExitCode {
    let args = Args::parse();
    let _guard = init_tracing("jointpose");

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "jointpose failed");
            eprintln!("{}: {e}", "error".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), PoseError> {
    if args.init_config {
        let path = args.config.clone().unwrap_or_else(config::config_path);
        config::save_to(&config::Config::default(), &path)?;
        println!("  Wrote default config to {}", path.display().to_string().bold());
        return Ok(());
    }

    let cfg = match &args.config {
        Some(path) => config::load_required(path)?,
        None => config::load_or_default()?,
    };
    let settings = Settings::resolve(&args, &cfg)?;
    let table = load_bindings(&settings)?;

    let bus = EventBus::default();
    let shutdown = Arc::new(AtomicBool::new(false));
    install_ctrlc(&bus, shutdown.clone());
    let mut session = Session::new().with_shutdown(shutdown.clone());

    let mut controller = CommandController::new(
        PrefixPartition::new(settings.groups.iter().cloned()),
        sink_for(&settings, &bus),
    );
    if let Some(path) = &settings.output {
        println!("  Recording to {}", path.display().to_string().bold());
        controller = controller.with_recorder(Recorder::new(path));
    }

    match settings.transport {
        TransportKind::Sim => {
            println!("  Transport: {}", "sim (commands are only logged)".yellow());
            drive(&settings, table, &mut controller, &mut session, None)
        }
        TransportKind::Rosbridge => {
            run_on_rosbridge(&settings, table, controller, &mut session, &bus, shutdown)
        }
    }
}

fn run_on_rosbridge(
    settings: &Settings,
    table: ModalBindingTable,
    controller: CommandController,
    session: &mut Session,
    bus: &EventBus,
    shutdown: Arc<AtomicBool>,
) -> Result<(), PoseError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| PoseError::Transport(format!("failed to start async runtime: {e}")))?;

    print!("  Connecting to {} … ", settings.rosbridge_url.dimmed());
    let client = runtime.block_on(RosbridgeClient::connect(
        &settings.rosbridge_url,
        LimbTopics::baxter(settings.groups.iter().cloned()),
        bus.clone(),
    ));
    let client = match client {
        Ok(client) => {
            println!("{}", "online".green());
            client
        }
        Err(e) => {
            println!("{}", "offline".red());
            return Err(e);
        }
    };

    let mut shared = SharedController::new(controller);
    let pump = {
        let _ctx = runtime.enter();
        spawn_feedback_pump(bus, shared.clone())
    };
    let transport = runtime.spawn(async move {
        if let Err(e) = client.run().await {
            error!(error = %e, "rosbridge session ended");
        }
    });

    let joy = (settings.input == InputMode::Joystick)
        .then(|| JoyStream::new(bus, runtime.handle().clone()).with_shutdown(shutdown));
    let result = drive(settings, table, &mut shared, session, joy);

    let _ = bus.publish_to(
        Topic::SystemAlerts,
        Event::now(
            "jointpose-cli",
            EventPayload::Fault {
                component: "cli".to_string(),
                message: "session finished".to_string(),
            },
        ),
    );
    pump.abort();
    if !wait_for_task(&runtime, transport, Duration::from_secs(1)) {
        warn!("rosbridge client did not close in time");
    }
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

/// Block the calling thread until `task` ends or `limit` passes.
///
/// Returns `false` on timeout. The timer is built inside the runtime, so
/// this is safe to call from a thread that has not entered it.
fn wait_for_task(
    runtime: &tokio::runtime::Runtime,
    task: tokio::task::JoinHandle<()>,
    limit: Duration,
) -> bool {
    runtime
        .block_on(async { tokio::time::timeout(limit, task).await })
        .is_ok()
}

/// Run the selected input loop to completion.
fn drive(
    settings: &Settings,
    table: ModalBindingTable,
    commander: &mut dyn JointCommander,
    session: &mut Session,
    joy: Option<JoyStream>,
) -> Result<(), PoseError> {
    match &settings.input {
        InputMode::Keyboard => {
            info!("keyboard teleoperation started");
            KeyboardDriver::new(table, TerminalKeys::new(), std::io::stdout()).run(commander, session)
        }
        InputMode::Joystick => {
            let joy = joy.ok_or_else(|| {
                PoseError::Config("joystick input requires the rosbridge transport".to_string())
            })?;
            JoystickDriver::baxter(joy)
                .with_layout(settings.pad)
                .with_scale(settings.joystick_scale)
                .run(commander, session)
        }
        InputMode::File(path) => {
            let player = Player::open(path)?;
            println!(
                "  playing back {} @ {}Hz",
                path.display().to_string().bold(),
                settings.rate
            );
            FileDriver::new(player, f64::from(settings.rate)).run(commander, session)
        }
    }
}

fn sink_for(settings: &Settings, bus: &EventBus) -> Box<dyn CommandSink> {
    match settings.transport {
        TransportKind::Sim => Box::new(SimSink::new()),
        TransportKind::Rosbridge => Box::new(BusSink::new(bus.clone())),
    }
}

fn load_bindings(settings: &Settings) -> Result<ModalBindingTable, PoseError> {
    match &settings.bindings_path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| PoseError::io(path.display(), e))?;
            debug!(path = %path.display(), "loaded key map");
            ModalBindingTable::from_toml_str(&text)
        }
        None => Ok(ModalBindingTable::baxter_keyboard()),
    }
}

fn install_ctrlc(bus: &EventBus, shutdown: Arc<AtomicBool>) {
    let bus = bus.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping …".yellow().bold());
        let alert = Event::now(
            "jointpose-cli",
            EventPayload::Fault {
                component: "cli".to_string(),
                message: "operator Ctrl-C".to_string(),
            },
        );
        if let Err(e) = bus.publish_to(Topic::SystemAlerts, alert) {
            debug!(error = %e, "no transport to notify");
        }
        shutdown.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; Ctrl-C will not stop the session cleanly");
    }
}
