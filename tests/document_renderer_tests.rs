use std::sync::Arc;
use std::time::Instant;

use inkdeck::canvas::RecordingCanvas;
use inkdeck::event_source::{InputEvent, Key};
use inkdeck::geometry::{Point, Size};
use inkdeck::input::{FrameContext, Modifiers};
use inkdeck::model::{Content, Document, FileType, Metadata, Page, SharedDocument};
use inkdeck::renderer::Backends;
use inkdeck::settings::{NotebookRenderMode, PdfRenderMode, Settings};
use inkdeck::test_utils::{
    FakeBrowserBackend, FakeInk, notebook_document, pdf_document, test_backends, unusable_document,
    wait_until,
};
use inkdeck::viewer::{DocumentRenderer, RendererState, select_primary};
use inkdeck::ViewerError;

const SIZE: Size = Size::new(300, 400);

fn frame_context() -> FrameContext {
    FrameContext::new(Instant::now(), SIZE)
}

fn with_pdf_mode(mode: PdfRenderMode) -> Settings {
    Settings {
        pdf_render_mode: mode,
        ..Settings::default()
    }
}

fn renderer(document: Document, settings: Settings, backends: Backends) -> DocumentRenderer {
    DocumentRenderer::new(document.into_shared(), settings, backends, SIZE).unwrap()
}

fn error_after_load(document: Document, settings: Settings, backends: Backends) -> String {
    let mut renderer = renderer(document, settings, backends);
    renderer.load();
    match renderer.state() {
        RendererState::Error(display) => display.message.clone(),
        other => panic!("expected an error, got {}", other.name()),
    }
}

fn run_until(renderer: &mut DocumentRenderer, mut done: impl FnMut(&RendererState) -> bool) -> RecordingCanvas {
    let mut canvas = RecordingCanvas::new(SIZE);
    wait_until(|| {
        canvas.clear();
        renderer.frame(&mut canvas, &frame_context());
        done(renderer.state())
    });
    canvas
}

#[test]
fn test_unusable_content_fails_construction() {
    let shared: SharedDocument = unusable_document("bad").into_shared();
    let result = DocumentRenderer::new(shared, Settings::default(), test_backends(1), SIZE);
    assert!(matches!(result, Err(ViewerError::UnusableContent { uuid }) if uuid == "bad"));
}

#[test]
fn test_pdf_mode_dispatch_errors() {
    let cases = [
        (PdfRenderMode::None, "Could not render PDF"),
        (PdfRenderMode::Retry, "Could not render PDF. Check your configuration"),
        (
            PdfRenderMode::Cef,
            "Could not render PDF. Make sure you have a compatible PDF renderer",
        ),
        (
            PdfRenderMode::Other("webkit".to_string()),
            "Could not render PDF. Make sure you have a compatible PDF renderer",
        ),
    ];
    for (mode, expected) in cases {
        let message = error_after_load(pdf_document("paper", 2), with_pdf_mode(mode.clone()), test_backends(2));
        assert_eq!(message, expected, "mode {}", mode.as_str());
    }
}

#[test]
fn test_native_mode_without_rasterizer() {
    let backends = Backends {
        browser: None,
        rasterizer: None,
        ink: Arc::new(FakeInk::blank()),
    };
    let message = error_after_load(pdf_document("paper", 2), Settings::default(), backends);
    assert_eq!(message, "Could not render PDF. Make sure you have a compatible PDF renderer");
}

#[test]
fn test_unknown_file_type_is_reported() {
    let content = Content::new(FileType::Unknown("djvu".to_string()), vec![Page::new("p0")]);
    let document = Document::new("odd", Metadata::new("Odd"), content);
    let message = error_after_load(document, Settings::default(), test_backends(1));
    assert_eq!(message, "Unknown format. Could not render document");
}

#[test]
fn test_dispatch_reports_error_kinds() {
    let settings = Settings::default();
    let backends = test_backends(1);

    let unknown = select_primary(&FileType::Unknown("djvu".to_string()), &settings, &backends);
    let error = unknown.err().unwrap();
    assert!(matches!(&error, ViewerError::UnsupportedFormat(message) if message == "Unknown format. Could not render document"));
    assert!(error.is_displayable());

    let disabled = select_primary(&FileType::Pdf, &with_pdf_mode(PdfRenderMode::None), &backends);
    assert!(matches!(disabled.err(), Some(ViewerError::RenderBackendUnavailable(_))));

    let no_browser = select_primary(&FileType::Epub, &with_pdf_mode(PdfRenderMode::Cef), &backends);
    assert!(matches!(no_browser.err(), Some(ViewerError::RenderBackendUnavailable(_))));

    let native = select_primary(&FileType::Pdf, &settings, &backends).ok().flatten();
    assert_eq!(native.map(|renderer| renderer.name()), Some("native"));
    assert!(select_primary(&FileType::Notebook, &settings, &backends).ok().unwrap().is_none());
}

#[test]
fn test_unknown_notebook_mode_detaches_overlay() {
    let settings = Settings {
        notebook_render_mode: NotebookRenderMode::Other("rm_lines_png".to_string()),
        ..Settings::default()
    };
    let mut renderer = renderer(notebook_document("notes", &["a"]), settings, test_backends(1));
    assert!(!renderer.has_overlay());
    renderer.load();
    assert_eq!(
        renderer.state().error().map(|display| display.message.as_str()),
        Some("Notebook render mode `rm_lines_png` unavailable")
    );
}

#[test]
fn test_error_state_keeps_drawing_message() {
    let mut renderer = renderer(
        pdf_document("paper", 2),
        with_pdf_mode(PdfRenderMode::None),
        test_backends(2),
    );
    let canvas = run_until(&mut renderer, |state| state.error().is_some());
    assert!(canvas.texts().contains(&"Could not render PDF"));
    // Ink overlay still runs under the message
    assert!(renderer.has_overlay());
}

#[test]
fn test_native_pdf_becomes_ready_and_blits() {
    let mut renderer = renderer(pdf_document("paper", 3), Settings::default(), test_backends(3));
    run_until(&mut renderer, |state| *state == RendererState::Ready);
    assert_eq!(renderer.primary_renderer(), Some("native"));
    assert_eq!(renderer.loading_counter().count(), 0);

    let mut canvas = RecordingCanvas::new(SIZE);
    wait_until(|| {
        canvas.clear();
        renderer.frame(&mut canvas, &frame_context());
        !canvas.blits().is_empty()
    });
    let blits = canvas.blits();
    let page = renderer.page_rect();
    assert!(blits.iter().any(|rect| page.intersects(rect)));
}

#[test]
fn test_native_open_failure_becomes_error() {
    let mut document = pdf_document("paper", 2);
    document.insert_file("paper.pdf", b"not a pdf".to_vec());
    let mut renderer = renderer(document, Settings::default(), test_backends(2));
    run_until(&mut renderer, |state| state.error().is_some());
    let message = renderer.state().error().map(|display| display.message.clone()).unwrap();
    assert!(message.starts_with("Could not open PDF"), "{message}");
}

#[test]
fn test_browser_mode_injects_bootstrap_once() {
    let browser = Arc::new(FakeBrowserBackend::new());
    let log = browser.log();
    let backends = test_backends(2).with_browser(browser);
    let mut renderer = renderer(pdf_document("paper", 2), with_pdf_mode(PdfRenderMode::Cef), backends);

    run_until(&mut renderer, |state| *state == RendererState::Ready);
    assert_eq!(renderer.primary_renderer(), Some("browser"));
    for _ in 0..3 {
        run_until(&mut renderer, |_| true);
    }

    let log = log.lock().unwrap();
    assert_eq!(log.spawned.len(), 1);
    assert!(log.spawned[0].ends_with("pdf.html"));
    let bootstraps = log.scripts.iter().filter(|script| script.contains("window.loadPdf(")).count();
    assert_eq!(bootstraps, 1);
}

#[test]
fn test_browser_spawn_failure() {
    let backends = test_backends(2).with_browser(Arc::new(FakeBrowserBackend::failing()));
    let message = error_after_load(pdf_document("paper", 2), with_pdf_mode(PdfRenderMode::Cef), backends);
    assert_eq!(message, "CEF not available, try restarting the application");
}

#[test]
fn test_input_is_dropped_while_loading() {
    let mut renderer = renderer(pdf_document("paper", 3), Settings::default(), test_backends(3));
    let ticket = renderer.loading_counter().begin();
    renderer.handle_event(&InputEvent::KeyDown(Key::Right), &frame_context());
    assert_eq!(renderer.current_page_index(), 0);

    ticket.complete();
    renderer.handle_event(&InputEvent::KeyDown(Key::Right), &frame_context());
    assert_eq!(renderer.current_page_index(), 1);
}

#[test]
fn test_ctrl_wheel_zooms_towards_cursor() {
    let mut renderer = renderer(notebook_document("notes", &["a"]), Settings::default(), test_backends(1));
    let frame = frame_context()
        .with_delta(0.0625)
        .with_modifiers(Modifiers::CTRL)
        .with_mouse(Point::new(300, 200));

    renderer.handle_event(&InputEvent::Wheel { dx: 0.0, dy: 1.0 }, &frame);
    assert_eq!(renderer.zoom(), 1.625);
    // Cursor on the right edge drags the pan left by offset * delta
    assert_eq!(renderer.zoom_state().pos, Point::new(-93, 0));

    // Without ctrl the wheel does nothing
    let plain = frame_context().with_delta(0.0625);
    renderer.handle_event(&InputEvent::Wheel { dx: 0.0, dy: 1.0 }, &plain);
    assert_eq!(renderer.zoom(), 1.625);
}

#[test]
fn test_drag_pans_page() {
    let mut renderer = renderer(notebook_document("notes", &["a"]), Settings::default(), test_backends(1));
    let before = renderer.page_rect();
    let frame = frame_context();
    for event in [
        InputEvent::PointerDown {
            button: inkdeck::input::MouseButton::Left,
            pos: Point::new(100, 100),
        },
        InputEvent::PointerMoved {
            pos: Point::new(130, 80),
        },
        InputEvent::PointerUp {
            button: inkdeck::input::MouseButton::Left,
            pos: Point::new(130, 80),
        },
    ] {
        renderer.handle_event(&event, &frame);
    }
    let after = renderer.page_rect();
    assert_eq!((after.x - before.x, after.y - before.y), (30, -20));
}

#[test]
fn test_resumes_at_last_opened_page() {
    let mut document = notebook_document("notes", &["a", "b", "c"]);
    document.content.c_pages.last_opened.value = "b".to_string();
    let mut renderer = renderer(document, Settings::default(), test_backends(1));
    assert_eq!(renderer.current_page_index(), 1);
    assert_eq!(renderer.last_opened_uuid(), "b");

    renderer.do_next();
    renderer.do_next();
    assert_eq!(renderer.current_page_index(), 2);
    renderer.do_previous();
    assert_eq!(renderer.current_page_index(), 1);
}
