//! Scriptable in-memory browser.
//!
//! [`MockBrowser`] implements [`BrowserDriver`] over fixture pages so the
//! step objects can be exercised without chromium. Elements are keyed by the
//! exact [`Selector`] the step objects use; role selectors with a name filter
//! are answered from the elements registered under the bare role.

use crate::driver::{BrowserDriver, HttpResponse, PageId, PageWatcher};
use crate::locator::{Nth, Selector};
use crate::result::{ProbeError, ProbeResult};
use crate::wait::LoadState;
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc::UnboundedSender;

/// What clicking an element does
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ClickEffect {
    /// Nothing observable
    #[default]
    None,
    /// The clicked page navigates to a URL
    Navigate(String),
    /// A tab opens and is announced to watchers; its URL reads through the
    /// sequence, repeating the last entry
    OpenTab(Vec<String>),
    /// A tab opens without a page event
    OpenTabSilently(Vec<String>),
}

/// A fixture element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    text: Option<String>,
    name: Option<String>,
    attributes: HashMap<String, String>,
    visible: bool,
    checked: bool,
    on_click: ClickEffect,
}

impl Default for MockElement {
    fn default() -> Self {
        Self::new()
    }
}

impl MockElement {
    /// A visible element with no content
    #[must_use]
    pub fn new() -> Self {
        Self {
            text: None,
            name: None,
            attributes: HashMap::new(),
            visible: true,
            checked: false,
            on_click: ClickEffect::None,
        }
    }

    /// A link with text and href
    #[must_use]
    pub fn link(text: impl Into<String>, href: impl Into<String>) -> Self {
        Self::new().with_text(text).with_attribute("href", href)
    }

    /// Set the text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set an accessible name distinct from the text
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.attributes.insert(name.into(), value.into());
        self
    }

    /// Mark as not rendered
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Set the checked state
    #[must_use]
    pub const fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    /// Set the click effect
    #[must_use]
    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.on_click = effect;
        self
    }

    fn accessible_name(&self) -> String {
        self.name
            .as_deref()
            .or(self.text.as_deref())
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

/// A fixture page
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    urls: Vec<String>,
    title: String,
    ready_state: Option<String>,
    elements: HashMap<Selector, Vec<MockElement>>,
    after_fill: HashMap<Selector, Vec<MockElement>>,
}

impl MockPage {
    /// A loaded page at `url`
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            ..Self::default()
        }
    }

    /// Set the document title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set `document.readyState` (default `complete`)
    #[must_use]
    pub fn with_ready_state(mut self, state: impl Into<String>) -> Self {
        self.ready_state = Some(state.into());
        self
    }

    /// Add an element under a selector
    #[must_use]
    pub fn with_element(mut self, selector: Selector, element: MockElement) -> Self {
        self.elements.entry(selector).or_default().push(element);
        self
    }

    /// Add elements that only appear once any input is filled
    #[must_use]
    pub fn with_elements_after_fill(
        mut self,
        selector: Selector,
        elements: impl IntoIterator<Item = MockElement>,
    ) -> Self {
        self.after_fill.entry(selector).or_default().extend(elements);
        self
    }
}

#[derive(Debug)]
struct PageState {
    id: PageId,
    urls: VecDeque<String>,
    title: String,
    ready_state: String,
    elements: HashMap<Selector, Vec<MockElement>>,
    after_fill: HashMap<Selector, Vec<MockElement>>,
    values: HashMap<Selector, String>,
    open: bool,
}

impl PageState {
    fn new(id: PageId, fixture: MockPage) -> Self {
        Self {
            id,
            urls: fixture.urls.into(),
            title: fixture.title,
            ready_state: fixture.ready_state.unwrap_or_else(|| "complete".to_string()),
            elements: fixture.elements,
            after_fill: fixture.after_fill,
            values: HashMap::new(),
            open: true,
        }
    }

    fn load(&mut self, url: &str, fixture: Option<&MockPage>) {
        self.urls = VecDeque::from([url.to_string()]);
        self.values.clear();
        if let Some(fixture) = fixture {
            self.title.clone_from(&fixture.title);
            self.ready_state = fixture
                .ready_state
                .clone()
                .unwrap_or_else(|| "complete".to_string());
            self.elements.clone_from(&fixture.elements);
            self.after_fill.clone_from(&fixture.after_fill);
        } else {
            self.title.clear();
            self.elements.clear();
            self.after_fill.clear();
        }
    }

    /// Storage key and positions of the elements a selector matches
    fn matches(&self, selector: &Selector) -> (Selector, Vec<usize>) {
        match selector {
            Selector::Role {
                role,
                name: Some(name),
                exact,
            } => {
                let key = Selector::role(role.clone());
                let positions = self
                    .elements
                    .get(&key)
                    .map(|elements| {
                        elements
                            .iter()
                            .enumerate()
                            .filter(|(_, el)| name_matches(&el.accessible_name(), name, *exact))
                            .map(|(i, _)| i)
                            .collect()
                    })
                    .unwrap_or_default();
                (key, positions)
            }
            _ => {
                let len = self.elements.get(selector).map_or(0, Vec::len);
                (selector.clone(), (0..len).collect())
            }
        }
    }

    fn element(&self, selector: &Selector, nth: Nth) -> ProbeResult<&MockElement> {
        let (key, positions) = self.matches(selector);
        nth.resolve(positions.len())
            .and_then(|i| self.elements.get(&key)?.get(positions[i]))
            .ok_or_else(|| not_found(selector))
    }

    fn element_mut(&mut self, selector: &Selector, nth: Nth) -> ProbeResult<&mut MockElement> {
        let (key, positions) = self.matches(selector);
        nth.resolve(positions.len())
            .and_then(|i| self.elements.get_mut(&key)?.get_mut(positions[i]))
            .ok_or_else(|| not_found(selector))
    }
}

fn name_matches(actual: &str, wanted: &str, exact: bool) -> bool {
    if exact {
        actual == wanted
    } else {
        actual.to_lowercase().contains(&wanted.to_lowercase())
    }
}

fn not_found(selector: &Selector) -> ProbeError {
    ProbeError::ElementNotFound {
        selector: selector.to_string(),
    }
}

#[derive(Debug, Default)]
struct MockState {
    pages: Vec<PageState>,
    next_id: usize,
    watchers: Vec<UnboundedSender<PageId>>,
    routes: HashMap<String, MockPage>,
    responses: HashMap<String, HttpResponse>,
    call_history: Vec<String>,
}

impl MockState {
    fn page(&self, id: &PageId) -> ProbeResult<&PageState> {
        self.pages
            .iter()
            .find(|p| &p.id == id && p.open)
            .ok_or_else(|| ProbeError::page(format!("page {id} is closed or unknown")))
    }

    fn page_mut(&mut self, id: &PageId) -> ProbeResult<&mut PageState> {
        self.pages
            .iter_mut()
            .find(|p| &p.id == id && p.open)
            .ok_or_else(|| ProbeError::page(format!("page {id} is closed or unknown")))
    }

    fn open(&mut self, fixture: MockPage) -> PageId {
        self.next_id += 1;
        let id = PageId::new(format!("page-{}", self.next_id));
        self.pages.push(PageState::new(id.clone(), fixture));
        id
    }

    fn open_tab(&mut self, urls: Vec<String>, announce: bool) -> PageId {
        let routed = urls.last().and_then(|url| self.routes.get(url)).cloned();
        let mut fixture = routed.unwrap_or_default();
        fixture.urls = urls;
        let id = self.open(fixture);
        if announce {
            self.watchers.retain(|tx| tx.send(id.clone()).is_ok());
        }
        id
    }
}

/// In-memory [`BrowserDriver`]
#[derive(Debug, Default)]
pub struct MockBrowser {
    state: Mutex<MockState>,
}

impl MockBrowser {
    /// Create an empty browser
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> ProbeResult<MutexGuard<'_, MockState>> {
        self.state
            .lock()
            .map_err(|_| ProbeError::page("mock browser state poisoned"))
    }

    /// Open a page without announcing it
    pub fn open_page(&self, fixture: MockPage) -> ProbeResult<PageId> {
        Ok(self.state()?.open(fixture))
    }

    /// Serve `fixture` when a page navigates to `url`
    #[must_use]
    pub fn with_route(self, url: impl Into<String>, fixture: MockPage) -> Self {
        if let Ok(mut state) = self.state.lock() {
            let _ = state.routes.insert(url.into(), fixture);
        }
        self
    }

    /// Answer authenticated fetches of `url`
    #[must_use]
    pub fn with_response(self, url: impl Into<String>, response: HttpResponse) -> Self {
        if let Ok(mut state) = self.state.lock() {
            let _ = state.responses.insert(url.into(), response);
        }
        self
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|state| state.call_history.clone())
            .unwrap_or_default()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.history().iter().any(|c| c.starts_with(method))
    }

    /// Whether a page is still open
    #[must_use]
    pub fn is_open(&self, page: &PageId) -> bool {
        self.state
            .lock()
            .map(|state| state.page(page).is_ok())
            .unwrap_or(false)
    }

    /// Value last typed into an input
    #[must_use]
    pub fn value_of(&self, page: &PageId, selector: &Selector) -> Option<String> {
        let state = self.state.lock().ok()?;
        state.page(page).ok()?.values.get(selector).cloned()
    }

    fn record(state: &mut MockState, call: String) {
        state.call_history.push(call);
    }
}

#[async_trait]
impl BrowserDriver for MockBrowser {
    async fn goto(&self, page: &PageId, url: &str) -> ProbeResult<()> {
        let mut state = self.state()?;
        Self::record(&mut state, format!("goto:{url}"));
        let fixture = state.routes.get(url).cloned();
        state.page_mut(page)?.load(url, fixture.as_ref());
        Ok(())
    }

    async fn current_url(&self, page: &PageId) -> ProbeResult<String> {
        let mut state = self.state()?;
        let page = state.page_mut(page)?;
        let url = if page.urls.len() > 1 {
            page.urls.pop_front()
        } else {
            page.urls.front().cloned()
        };
        Ok(url.unwrap_or_default())
    }

    async fn title(&self, page: &PageId) -> ProbeResult<String> {
        Ok(self.state()?.page(page)?.title.clone())
    }

    async fn load_state_reached(&self, page: &PageId, load_state: LoadState) -> ProbeResult<bool> {
        let state = self.state()?;
        Ok(load_state.is_reached_by(&state.page(page)?.ready_state))
    }

    async fn count(&self, page: &PageId, selector: &Selector) -> ProbeResult<usize> {
        Ok(self.state()?.page(page)?.matches(selector).1.len())
    }

    async fn is_visible(&self, page: &PageId, selector: &Selector, nth: Nth) -> ProbeResult<bool> {
        let state = self.state()?;
        Ok(state
            .page(page)?
            .element(selector, nth)
            .is_ok_and(|el| el.visible))
    }

    async fn clear(&self, page: &PageId, selector: &Selector) -> ProbeResult<()> {
        let mut state = self.state()?;
        Self::record(&mut state, format!("clear:{selector}"));
        let page = state.page_mut(page)?;
        let _ = page.element(selector, Nth::First)?;
        let _ = page.values.insert(selector.clone(), String::new());
        Ok(())
    }

    async fn fill(&self, page: &PageId, selector: &Selector, text: &str) -> ProbeResult<()> {
        let mut state = self.state()?;
        Self::record(&mut state, format!("fill:{selector}:{text}"));
        let page = state.page_mut(page)?;
        let _ = page.element(selector, Nth::First)?;
        let _ = page.values.insert(selector.clone(), text.to_string());
        for (key, elements) in std::mem::take(&mut page.after_fill) {
            page.elements.entry(key).or_default().extend(elements);
        }
        Ok(())
    }

    async fn click(&self, page: &PageId, selector: &Selector, nth: Nth) -> ProbeResult<()> {
        let mut state = self.state()?;
        let effect = state.page(page)?.element(selector, nth)?.on_click.clone();
        Self::record(&mut state, format!("click:{selector}"));
        match effect {
            ClickEffect::None => {}
            ClickEffect::Navigate(url) => {
                let fixture = state.routes.get(&url).cloned();
                state.page_mut(page)?.load(&url, fixture.as_ref());
            }
            ClickEffect::OpenTab(urls) => {
                let _ = state.open_tab(urls, true);
            }
            ClickEffect::OpenTabSilently(urls) => {
                let _ = state.open_tab(urls, false);
            }
        }
        Ok(())
    }

    async fn scroll_into_view(&self, page: &PageId, selector: &Selector, nth: Nth) -> ProbeResult<()> {
        let state = self.state()?;
        let _ = state.page(page)?.element(selector, nth)?;
        Ok(())
    }

    async fn attribute(
        &self,
        page: &PageId,
        selector: &Selector,
        nth: Nth,
        name: &str,
    ) -> ProbeResult<Option<String>> {
        let state = self.state()?;
        let element = state.page(page)?.element(selector, nth)?;
        Ok(element.attributes.get(name).cloned())
    }

    async fn text_content(
        &self,
        page: &PageId,
        selector: &Selector,
        nth: Nth,
    ) -> ProbeResult<Option<String>> {
        let state = self.state()?;
        Ok(state.page(page)?.element(selector, nth)?.text.clone())
    }

    async fn accessible_names(&self, page: &PageId, selector: &Selector) -> ProbeResult<Vec<String>> {
        let state = self.state()?;
        let page = state.page(page)?;
        let (key, positions) = page.matches(selector);
        Ok(page
            .elements
            .get(&key)
            .map(|elements| {
                positions
                    .iter()
                    .filter_map(|&i| elements.get(i))
                    .map(MockElement::accessible_name)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn is_checked(&self, page: &PageId, selector: &Selector) -> ProbeResult<bool> {
        let state = self.state()?;
        Ok(state.page(page)?.element(selector, Nth::First)?.checked)
    }

    async fn set_checked(&self, page: &PageId, selector: &Selector, checked: bool) -> ProbeResult<()> {
        let mut state = self.state()?;
        Self::record(&mut state, format!("set_checked:{selector}:{checked}"));
        state.page_mut(page)?.element_mut(selector, Nth::First)?.checked = checked;
        Ok(())
    }

    async fn watch_new_pages(&self) -> ProbeResult<PageWatcher> {
        let (tx, watcher) = PageWatcher::channel();
        self.state()?.watchers.push(tx);
        Ok(watcher)
    }

    async fn pages(&self) -> ProbeResult<Vec<PageId>> {
        let state = self.state()?;
        Ok(state
            .pages
            .iter()
            .filter(|p| p.open)
            .map(|p| p.id.clone())
            .collect())
    }

    async fn close_page(&self, page: &PageId) -> ProbeResult<()> {
        let mut state = self.state()?;
        Self::record(&mut state, format!("close_page:{page}"));
        state.page_mut(page)?.open = false;
        Ok(())
    }

    async fn fetch(&self, page: &PageId, url: &str) -> ProbeResult<HttpResponse> {
        let mut state = self.state()?;
        let _ = state.page(page)?;
        Self::record(&mut state, format!("fetch:{url}"));
        Ok(state
            .responses
            .get(url)
            .cloned()
            .unwrap_or_else(HttpResponse::not_found))
    }
}

/// Build a one-page PDF with one text line per entry
pub fn text_pdf(title: Option<&str>, lines: &[&str]) -> ProbeResult<Vec<u8>> {
    let pdf_err = |e: lopdf::Error| ProbeError::Pdf {
        message: e.to_string(),
    };

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let y = 800 - 20 * i64::try_from(i).unwrap_or(0);
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
        operations.push(Operation::new("Td", vec![50.into(), y.into()]));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("ET", vec![]));
    }
    let content = Content { operations }.encode().map_err(pdf_err)?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
    };
    let _ = doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    if let Some(title) = title {
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
            "Producer" => Object::string_literal("planprobe"),
        });
        doc.trailer.set("Info", info_id);
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(|e| ProbeError::Pdf {
        message: e.to_string(),
    })?;
    Ok(bytes)
}
