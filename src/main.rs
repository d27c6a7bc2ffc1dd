use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};
use simplelog::{Config, LevelFilter, WriteLogger};

use inkdeck::canvas::PixelCanvas;
use inkdeck::event_source::{EventSource, InputEvent, Key, SimulatedEventSource};
use inkdeck::geometry::Size;
use inkdeck::input::FrameContext;
use inkdeck::panic_handler::initialize_panic_handler;
use inkdeck::registry::LocalLibrary;
use inkdeck::renderer::Backends;
use inkdeck::settings;
use inkdeck::viewer::{CloseOutcome, DocumentViewer, RendererState, ViewerAction, ViewerServices};

const FRAME_TIME: Duration = Duration::from_millis(16);

#[derive(Parser, Debug)]
#[command(name = "inkdeck")]
#[command(about = "Headless viewer session for a synced document")]
struct Args {
    /// Document UUID in the local library
    uuid: String,

    /// Number of frames to run before closing
    #[arg(short, long, default_value_t = 30)]
    frames: u32,

    /// Pages to turn forward once the document has loaded
    #[arg(short, long, default_value_t = 0)]
    next: u32,

    /// Write the last frame to this PNG
    #[arg(short, long)]
    snapshot: Option<PathBuf>,

    /// Library directory, overriding the configured one
    #[arg(short, long)]
    library: Option<PathBuf>,

    #[arg(long, default_value_t = 1404)]
    width: u32,

    #[arg(long, default_value_t = 1872)]
    height: u32,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    WriteLogger::init(
        LevelFilter::Debug,
        Config::default(),
        File::create("inkdeck.log")?,
    )?;
    initialize_panic_handler();

    settings::load_settings();
    let settings = settings::snapshot();
    if !settings.debug {
        log::set_max_level(LevelFilter::Info);
    }

    info!("Starting inkdeck for {}", args.uuid);

    let library_dir = args
        .library
        .clone()
        .or_else(|| settings.resolved_library_dir())
        .context("Could not determine the library directory")?;
    let library = LocalLibrary::open(library_dir)?;
    let services = ViewerServices::new(Arc::new(library), Backends::native());

    let size = Size::new(args.width, args.height);
    let mut viewer = DocumentViewer::open(&services, &args.uuid, settings, size)
        .with_context(|| format!("Failed to open {}", args.uuid))?;

    let mut script = Vec::new();
    for _ in 0..args.next {
        script.extend(SimulatedEventSource::tap(Key::Right));
    }
    let mut events = SimulatedEventSource::new(script);
    let mut canvas = PixelCanvas::new(size);

    let res = run_session(&mut viewer, &mut events, &mut canvas, args.frames);
    if let Err(e) = &res {
        error!("Session error: {e:?}");
    }

    match viewer.close(&services) {
        CloseOutcome::Uploading => info!("Waiting for upload of {}", args.uuid),
        CloseOutcome::Unloaded => debug!("Released {}", args.uuid),
        CloseOutcome::AlreadyClosed => {}
    }
    services.uploads.wait_all();

    if let Some(path) = &args.snapshot {
        canvas
            .image()
            .save(path)
            .with_context(|| format!("Failed to write snapshot {path:?}"))?;
        info!("Saved snapshot to {path:?}");
    }

    info!("Shutting down inkdeck");
    res
}

fn run_session(
    viewer: &mut DocumentViewer,
    events: &mut dyn EventSource,
    canvas: &mut PixelCanvas,
    frames: u32,
) -> Result<()> {
    let mut last_frame = Instant::now();
    let mut last_state = "";

    for index in 0..frames {
        let now = Instant::now();
        let frame = FrameContext::new(now, viewer.renderer().size())
            .with_delta(now.duration_since(last_frame).as_secs_f32());
        last_frame = now;

        // Scripted input waits until the document is ready
        if *viewer.renderer().state() == RendererState::Ready && events.poll(Duration::ZERO)? {
            let event = events.read()?;
            if event == InputEvent::Quit
                || viewer.handle_event(&event, &frame) == ViewerAction::CloseRequested
            {
                info!("Session ended at frame {index}");
                return Ok(());
            }
        }

        canvas.resize(viewer.renderer().size());
        viewer.frame(canvas, &frame);

        let state = viewer.renderer().state();
        if state.name() != last_state {
            match state.error() {
                Some(display) => warn!("Frame {index}: {}", display.message),
                None => debug!(
                    "Frame {index}: {} on page {}",
                    state.name(),
                    viewer.renderer().current_page_index()
                ),
            }
            last_state = state.name();
        }

        thread::sleep(FRAME_TIME);
    }
    Ok(())
}
