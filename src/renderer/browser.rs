//! PDF rendering through an embedded browser
//!
//! The browser loads a local bootstrap page that hosts a PDF viewer script.
//! Startup runs in three phases, one step per frame:
//! 1. wait until the page reports that its script runtime is up
//! 2. inject the base64 PDF payload via `window.loadPdf`
//! 3. on every frame, turn pages via `window.loadPage` and blit the snapshot

use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::RgbaImage;
use log::{debug, info, warn};

use super::{LoadContext, RenderContext, RenderStatus, Renderer};
use crate::error::{ViewerError, ViewerResult};
use crate::geometry::{Point, Rect, Size};
use crate::input::{InputEvent, MouseButton};

/// Blue channel of the bootstrap page's background while its script is loading
const LOADING_MARKER_BLUE: u8 = 51;
const BOOTSTRAP_PAGE: &str = "pdf.html";

/// Spawns embedded browser instances
pub trait BrowserBackend: Send + Sync {
    fn spawn(&self, url: &str, viewport: Size) -> anyhow::Result<Box<dyn BrowserSession>>;
}

/// A running embedded browser
pub trait BrowserSession {
    fn current_url(&self) -> Option<String>;

    fn execute_js(&mut self, code: &str);

    /// Latest rendered frame of the browser viewport
    fn snapshot(&self) -> &RgbaImage;

    /// Explicit readiness from the page, for backends that can report it
    fn ready_signal(&self) -> Option<bool> {
        None
    }

    fn motion_at(&mut self, pos: Point);

    fn mouse_down_at(&mut self, pos: Point, button: u8);

    fn mouse_up_at(&mut self, pos: Point, button: u8);

    /// Terminate the browser process
    fn exit(&mut self);
}

/// Readiness probe for sessions without an explicit signal
fn marker_pixel_ready(snapshot: &RgbaImage) -> bool {
    if snapshot.width() == 0 || snapshot.height() == 0 {
        return false;
    }
    snapshot.get_pixel(0, 0)[2] != LOADING_MARKER_BLUE
}

pub struct BrowserPdfRenderer {
    backend: Arc<dyn BrowserBackend>,
    bootstrap_url: String,
    session: Option<Box<dyn BrowserSession>>,
    injected_js: bool,
    js_code: Option<String>,
    /// URL the browser settled on once the bootstrap page was ready
    url_should_be: Option<String>,
    current_page: usize,
}

impl BrowserPdfRenderer {
    pub fn new(backend: Arc<dyn BrowserBackend>, html_dir: &Path) -> Self {
        let page = html_dir.join(BOOTSTRAP_PAGE);
        let page = std::path::absolute(&page).unwrap_or(page);
        Self {
            backend,
            bootstrap_url: page.to_string_lossy().into_owned(),
            session: None,
            injected_js: false,
            js_code: None,
            url_should_be: None,
            current_page: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn injected(&self) -> bool {
        self.injected_js
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    fn bootstrap_script(pdf: &[u8], size: Size, page: usize) -> String {
        let payload = STANDARD.encode(pdf);
        format!(
            r#"
            (function checkLoadPdf() {{
                if (typeof window.loadPdf === 'function') {{
                    window.loadPdf("{payload}", {width}, {height}, {page});
                }} else {{
                    setTimeout(checkLoadPdf, 100);
                }}
            }})();
            "#,
            width = size.width,
            height = size.height,
        )
    }
}

impl Renderer for BrowserPdfRenderer {
    fn load(&mut self, ctx: LoadContext<'_>) -> ViewerResult<()> {
        let LoadContext {
            document,
            size,
            ticket,
            ..
        } = ctx;

        let Some(pdf) = document.pdf_raw() else {
            warn!("No PDF data for {}, browser renderer stays idle", document.uuid);
            ticket.complete();
            return Ok(());
        };

        self.current_page = document
            .content
            .c_pages
            .last_opened_index()
            .and_then(|index| document.content.c_pages.pages.get(index))
            .and_then(|page| page.pdf_page())
            .unwrap_or(0);

        let session = match self.backend.spawn(&self.bootstrap_url, size) {
            Ok(session) => session,
            Err(e) => {
                warn!("Embedded browser failed to start: {e:#}");
                return Err(ViewerError::backend_unavailable(
                    "CEF not available, try restarting the application",
                ));
            }
        };
        info!("Embedded browser started at {}", self.bootstrap_url);

        self.session = Some(session);
        self.injected_js = false;
        self.url_should_be = None;
        self.js_code = Some(Self::bootstrap_script(pdf, size, self.current_page));
        ticket.complete();
        Ok(())
    }

    fn handle_event(&mut self, event: &InputEvent, debug: bool) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        // Only the primary button reaches the page outside debug mode, which
        // keeps the browser context menu away
        let forwarded = |button: &MouseButton| debug || *button == MouseButton::Left;
        match event {
            InputEvent::PointerMoved { pos } => session.motion_at(*pos),
            InputEvent::PointerDown { button, pos } if forwarded(button) => {
                session.mouse_down_at(*pos, button.id());
            }
            InputEvent::PointerUp { button, pos } if forwarded(button) => {
                session.mouse_up_at(*pos, button.id());
            }
            _ => {}
        }
    }

    fn render(&mut self, page_id: &str, ctx: &mut RenderContext<'_>) -> ViewerResult<RenderStatus> {
        let Some(session) = self.session.as_mut() else {
            return Ok(RenderStatus::Waiting);
        };

        let Some(expected) = self.url_should_be.clone() else {
            let ready = session
                .ready_signal()
                .unwrap_or_else(|| marker_pixel_ready(session.snapshot()));
            if ready {
                if let Some(url) = session.current_url() {
                    debug!("Browser bootstrap ready at {url}");
                    self.url_should_be = Some(url);
                }
            }
            return Ok(RenderStatus::Waiting);
        };

        if session.current_url().as_deref() != Some(expected.as_str()) {
            info!("Browser navigated away from {expected}, reloading");
            self.close();
            return Ok(RenderStatus::ReloadRequested);
        }

        if !self.injected_js {
            if let Some(code) = self.js_code.as_deref() {
                session.execute_js(code);
            }
            self.injected_js = true;
        }

        let Some(pdf_page) = ctx
            .document
            .content
            .c_pages
            .page(page_id)
            .and_then(|page| page.pdf_page())
        else {
            return Ok(RenderStatus::Waiting);
        };

        if self.current_page != pdf_page {
            self.current_page = pdf_page;
            session.execute_js(&format!("window.loadPage({pdf_page})"));
        }

        let snapshot = session.snapshot();
        ctx.canvas.blit(
            snapshot,
            Rect::new(0, 0, snapshot.width(), snapshot.height()),
        );
        Ok(RenderStatus::Rendered)
    }

    fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            debug!("Closing embedded browser");
            session.exit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::RecordingCanvas;
    use crate::model::{Content, Document, Metadata};
    use crate::renderer::LoadingCounter;
    use crate::settings::Settings;
    use image::Rgba;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Log {
        scripts: Vec<String>,
        exits: usize,
        url: Option<String>,
        downs: Vec<u8>,
    }

    struct FakeSession {
        log: Arc<Mutex<Log>>,
        frame: RgbaImage,
    }

    impl BrowserSession for FakeSession {
        fn current_url(&self) -> Option<String> {
            self.log.lock().unwrap().url.clone()
        }

        fn execute_js(&mut self, code: &str) {
            self.log.lock().unwrap().scripts.push(code.to_string());
        }

        fn snapshot(&self) -> &RgbaImage {
            &self.frame
        }

        fn motion_at(&mut self, _pos: Point) {}

        fn mouse_down_at(&mut self, _pos: Point, button: u8) {
            self.log.lock().unwrap().downs.push(button);
        }

        fn mouse_up_at(&mut self, _pos: Point, _button: u8) {}

        fn exit(&mut self) {
            self.log.lock().unwrap().exits += 1;
        }
    }

    struct FakeBackend {
        log: Arc<Mutex<Log>>,
        ready: bool,
        fail: bool,
    }

    impl BrowserBackend for FakeBackend {
        fn spawn(&self, url: &str, viewport: Size) -> anyhow::Result<Box<dyn BrowserSession>> {
            if self.fail {
                anyhow::bail!("no browser");
            }
            self.log.lock().unwrap().url = Some(format!("file://{url}"));
            let blue = if self.ready { 0 } else { LOADING_MARKER_BLUE };
            Ok(Box::new(FakeSession {
                log: Arc::clone(&self.log),
                frame: RgbaImage::from_pixel(viewport.width, viewport.height, Rgba([0, 0, blue, 255])),
            }))
        }
    }

    fn pdf_document() -> Document {
        let mut document = Document::new("doc", Metadata::new("Doc"), Content::pdf(3));
        document.insert_file("doc.pdf", b"%PDF-1.7".to_vec());
        document
    }

    fn renderer(ready: bool, fail: bool) -> (BrowserPdfRenderer, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let backend = Arc::new(FakeBackend {
            log: Arc::clone(&log),
            ready,
            fail,
        });
        (BrowserPdfRenderer::new(backend, Path::new("html")), log)
    }

    fn load(renderer: &mut BrowserPdfRenderer, document: &Document, counter: &LoadingCounter) -> ViewerResult<()> {
        let settings = Settings::default();
        renderer.load(LoadContext {
            document,
            settings: &settings,
            size: Size::new(40, 30),
            ticket: counter.begin(),
        })
    }

    fn render(renderer: &mut BrowserPdfRenderer, document: &Document, page: &str) -> (RenderStatus, RecordingCanvas) {
        let mut canvas = RecordingCanvas::new(Size::new(40, 30));
        let mut ctx = RenderContext {
            document,
            canvas: &mut canvas,
            size: Size::new(40, 30),
            zoom: 1.0,
            page_rect: Rect::new(0, 0, 40, 30),
            zoom_ready: true,
            debug: false,
        };
        let status = renderer.render(page, &mut ctx).unwrap();
        (status, canvas)
    }

    #[test]
    fn three_phase_startup() {
        let document = pdf_document();
        let counter = LoadingCounter::new();
        let (mut renderer, log) = renderer(true, false);

        load(&mut renderer, &document, &counter).unwrap();
        assert!(!counter.is_loading());
        assert!(renderer.is_active());

        // Phase 1: readiness detected, nothing injected yet
        let (status, _) = render(&mut renderer, &document, "page-0");
        assert_eq!(status, RenderStatus::Waiting);
        assert!(log.lock().unwrap().scripts.is_empty());

        // Phase 2 and 3: payload injected once, page drawn
        let (status, canvas) = render(&mut renderer, &document, "page-0");
        assert_eq!(status, RenderStatus::Rendered);
        assert_eq!(canvas.blits().len(), 1);
        {
            let log = log.lock().unwrap();
            assert_eq!(log.scripts.len(), 1);
            assert!(log.scripts[0].contains(&STANDARD.encode(b"%PDF-1.7")));
            assert!(log.scripts[0].contains("40, 30, 0"));
        }

        // Page change issues exactly one navigation call
        render(&mut renderer, &document, "page-2");
        render(&mut renderer, &document, "page-2");
        let log = log.lock().unwrap();
        assert_eq!(log.scripts.len(), 2);
        assert_eq!(log.scripts[1], "window.loadPage(2)");
        assert_eq!(renderer.current_page(), 2);
    }

    #[test]
    fn waits_for_marker_pixel() {
        let document = pdf_document();
        let counter = LoadingCounter::new();
        let (mut renderer, log) = renderer(false, false);
        load(&mut renderer, &document, &counter).unwrap();

        for _ in 0..3 {
            let (status, _) = render(&mut renderer, &document, "page-0");
            assert_eq!(status, RenderStatus::Waiting);
        }
        assert!(log.lock().unwrap().scripts.is_empty());
    }

    #[test]
    fn url_drift_requests_reload() {
        let document = pdf_document();
        let counter = LoadingCounter::new();
        let (mut renderer, log) = renderer(true, false);
        load(&mut renderer, &document, &counter).unwrap();
        render(&mut renderer, &document, "page-0");

        log.lock().unwrap().url = Some("https://elsewhere".to_string());
        let (status, _) = render(&mut renderer, &document, "page-0");
        assert_eq!(status, RenderStatus::ReloadRequested);
        assert!(!renderer.is_active());
        assert_eq!(log.lock().unwrap().exits, 1);
    }

    #[test]
    fn spawn_failure_is_backend_unavailable() {
        let document = pdf_document();
        let counter = LoadingCounter::new();
        let (mut renderer, _) = renderer(true, true);
        let err = load(&mut renderer, &document, &counter).unwrap_err();
        assert!(matches!(err, ViewerError::RenderBackendUnavailable(_)));
        assert_eq!(err.to_string(), "CEF not available, try restarting the application");
        assert!(!counter.is_loading());

        let (status, _) = render(&mut renderer, &document, "page-0");
        assert_eq!(status, RenderStatus::Waiting);
    }

    #[test]
    fn missing_pdf_leaves_renderer_idle() {
        let document = Document::new("doc", Metadata::new("Doc"), Content::pdf(1));
        let counter = LoadingCounter::new();
        let (mut renderer, _) = renderer(true, false);
        load(&mut renderer, &document, &counter).unwrap();
        assert!(!renderer.is_active());
        assert!(!counter.is_loading());
    }

    #[test]
    fn close_is_idempotent_and_filters_buttons() {
        let document = pdf_document();
        let counter = LoadingCounter::new();
        let (mut renderer, log) = renderer(true, false);
        load(&mut renderer, &document, &counter).unwrap();

        let pos = Point::new(1, 1);
        renderer.handle_event(&InputEvent::PointerDown { button: MouseButton::Right, pos }, false);
        renderer.handle_event(&InputEvent::PointerDown { button: MouseButton::Left, pos }, false);
        renderer.handle_event(&InputEvent::PointerDown { button: MouseButton::Right, pos }, true);
        assert_eq!(log.lock().unwrap().downs, vec![1, 3]);

        renderer.close();
        renderer.close();
        assert_eq!(log.lock().unwrap().exits, 1);
    }
}
