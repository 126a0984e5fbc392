use scrubseq::cli::Args;
use scrubseq::config::{self, EngineConfig, PathConfig};
use scrubseq::core::fetch::FileFetcher;
use scrubseq::core::sequence_events::{
    AnimationComplete, InitialLoadComplete, InitialLoadProgress, SwitchComplete,
};
use scrubseq::core::workers::Workers;
use scrubseq::{downcast_event, EventBus, RgbaSurface, SequenceController, SequenceState, Surface};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, info, trace, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Pump interval while waiting on fetch workers
const PUMP_WAIT: Duration = Duration::from_millis(50);

fn init_logging(args: &Args) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| config::config_file("scrubseq.log", &PathConfig::from_env()));
        if let Some(dir) = log_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
        }
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// Drain the bus queue, logging lifecycle events
fn drain_events(bus: &EventBus) {
    for event in bus.poll() {
        if let Some(e) = downcast_event::<InitialLoadProgress>(&event) {
            debug!("Initial load: {:.0}%", e.percent);
        } else if let Some(e) = downcast_event::<InitialLoadComplete>(&event) {
            info!("Initial load complete: '{}'", e.variant_id);
        } else if let Some(e) = downcast_event::<SwitchComplete>(&event) {
            info!("Switch complete: '{}'", e.variant_id);
        } else if let Some(e) = downcast_event::<AnimationComplete>(&event) {
            trace!("Animation complete: {}", e.complete);
        }
    }
}

/// Pump settles until the initial batch is in
fn wait_ready(
    ctrl: &mut SequenceController,
    surface: &mut dyn Surface,
    bus: &EventBus,
    timeout: Duration,
) -> Result<()> {
    let start = Instant::now();
    while ctrl.state() != SequenceState::Ready {
        if start.elapsed() > timeout {
            bail!("Initial batch not ready after {:?}", timeout);
        }
        ctrl.pump_blocking(surface, PUMP_WAIT);
        drain_events(bus);
    }
    Ok(())
}

/// Pump settles until every frame of the active variant has loaded or failed
fn wait_settled(ctrl: &mut SequenceController, surface: &mut dyn Surface, timeout: Duration) {
    let start = Instant::now();
    loop {
        let Some(store) = ctrl.store() else { return };
        if store.settled_count() == store.len() {
            return;
        }
        if start.elapsed() > timeout {
            warn!(
                "{} of {} frames settled after {:?}",
                store.settled_count(),
                store.len(),
                timeout
            );
            return;
        }
        ctrl.pump_blocking(surface, PUMP_WAIT);
    }
}

fn drive_input(
    args: &Args,
    ctrl: &mut SequenceController,
    surface: &mut dyn Surface,
    bus: &EventBus,
) {
    if let Some(offset) = args.scroll {
        let viewport = surface.size().1 as f64;
        if ctrl.on_scroll(surface, offset, args.page_height, viewport).is_none() {
            warn!("--scroll ignored (policy {:?})", ctrl.options().mapping);
        }
    }
    if let Some(progress) = args.progress {
        if ctrl.on_progress(surface, progress).is_none() {
            warn!("--progress ignored (policy {:?})", ctrl.options().mapping);
        }
    }

    let mut handle = None;
    for &delta in &args.wheel {
        if let Some(h) = ctrl.on_wheel(surface, delta) {
            handle = Some(h);
        }
    }
    if !args.wheel.is_empty() && !ctrl.options().mapping.is_damped() {
        warn!("--wheel ignored (policy {:?})", ctrl.options().mapping);
    }

    // Headless pursuit: one step per iteration, settles applied in between
    let mut ticks = 0usize;
    while let Some(h) = handle {
        ctrl.pump(surface);
        handle = ctrl.tick(surface, h);
        drain_events(bus);
        ticks += 1;
    }
    if ticks > 0 {
        debug!("Pursuit converged after {} ticks at frame {}", ticks, ctrl.frame());
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    info!("scrubseq starting...");
    debug!("Command-line args: {:?}", args);

    let config_path = config::resolve_config_path(args.config.as_deref());
    info!("Config path: {}", config_path.display());
    let mut engine_config = EngineConfig::load(&config_path)?;
    args.apply_overrides(&mut engine_config);

    if args.save_config {
        return engine_config.save(&config_path);
    }

    let (first, mut catalog_index) = args.initial_variant(&engine_config)?;
    let timeout = Duration::from_secs(args.timeout);

    let bus = EventBus::with_queue();

    let workers = Arc::new(Workers::new(engine_config.worker_threads()));
    let fetcher = Arc::new(match &args.root {
        Some(root) => FileFetcher::with_root(root),
        None => FileFetcher::new(),
    });
    let options = engine_config.sequence_options();
    let mut ctrl = SequenceController::new(options, fetcher, workers, &bus);
    let mut surface = RgbaSurface::new(args.width, args.height);

    ctrl.activate(first);
    wait_ready(&mut ctrl, &mut surface, &bus, timeout)?;

    // Catalog cycling, like next/prev variant buttons
    for _ in 0..args.cycle.unsigned_abs() {
        let Some(index) = catalog_index else {
            warn!("--cycle needs a config catalog, ignored");
            break;
        };
        let next = if args.cycle > 0 {
            engine_config.variants.next_index(index)
        } else {
            engine_config.variants.prev_index(index)
        };
        let Some(variant) = engine_config.variants.get(next) else { break };
        ctrl.activate(variant.clone());
        catalog_index = Some(next);
        wait_ready(&mut ctrl, &mut surface, &bus, timeout)?;
    }

    drive_input(&args, &mut ctrl, &mut surface, &bus);
    wait_settled(&mut ctrl, &mut surface, timeout);
    drain_events(&bus);

    if let Some(size) = &args.resize {
        ctrl.on_resize(&mut surface, size[0], size[1]);
    }

    let variant_id = ctrl.variant().map(|v| v.id().to_string()).unwrap_or_default();
    let frame = ctrl.frame();
    let shown = ctrl.shown_frame();
    ctrl.teardown();

    surface
        .into_image()
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    match shown {
        Some(shown) => println!(
            "{}: frame {} (showing {}) -> {}",
            variant_id,
            frame,
            shown,
            args.output.display()
        ),
        None => println!(
            "{}: frame {} (nothing loaded) -> {}",
            variant_id,
            frame,
            args.output.display()
        ),
    }
    Ok(())
}
