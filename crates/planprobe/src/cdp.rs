//! Real browser control over the Chrome DevTools Protocol.

use crate::config::ProbeConfig;
use crate::driver::{BrowserDriver, HttpResponse, PageId, PageWatcher};
use crate::locator::{js_string, Nth, Selector, ACCESSIBLE_NAME_JS};
use crate::result::{ProbeError, ProbeResult};
use crate::wait::{LoadState, NETWORK_IDLE_THRESHOLD_MS};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::InsertTextParams;
use chromiumoxide::cdp::browser_protocol::network::GetCookiesParams;
use chromiumoxide::cdp::browser_protocol::target::EventTargetCreated;
use chromiumoxide::layout::Point;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type Watchers = Arc<StdMutex<Vec<UnboundedSender<PageId>>>>;

fn page_err(e: impl std::fmt::Display) -> ProbeError {
    ProbeError::page(e.to_string())
}

fn launch_err(e: impl std::fmt::Display) -> ProbeError {
    ProbeError::BrowserLaunch {
        message: e.to_string(),
    }
}

/// Resolve `nth` against the current match count
async fn require_index(
    driver: &dyn BrowserDriver,
    page: &PageId,
    selector: &Selector,
    nth: Nth,
) -> ProbeResult<usize> {
    let count = driver.count(page, selector).await?;
    nth.resolve(count).ok_or_else(|| ProbeError::ElementNotFound {
        selector: selector.to_string(),
    })
}

/// Cookie lookup scoped to the fetched URL, not the page it is fetched from
fn cookie_query(url: &str) -> GetCookiesParams {
    GetCookiesParams::builder().urls(vec![url.to_string()]).build()
}

/// `Cookie` header value for cookies already scoped to the request URL
fn cookie_header<'a>(cookies: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    cookies
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Deserialize)]
struct Center {
    x: f64,
    y: f64,
}

/// [`BrowserDriver`] backed by a launched chromium
#[derive(Debug)]
pub struct ChromiumDriver {
    browser: Mutex<Browser>,
    /// Known pages in first-seen order
    pages: Mutex<Vec<(PageId, Page)>>,
    watchers: Watchers,
    http: reqwest::Client,
    handler: tokio::task::JoinHandle<()>,
    events: tokio::task::JoinHandle<()>,
}

impl ChromiumDriver {
    /// Launch chromium with the configured window, user agent and head mode
    pub async fn launch(config: &ProbeConfig) -> ProbeResult<Self> {
        let (width, height) = config.window_size;
        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .no_sandbox()
            .arg(format!("--user-agent={}", config.user_agent));
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(ref path) = config.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder.build().map_err(|message| {
            if config.chromium_path.is_none() && message.to_lowercase().contains("executable") {
                ProbeError::BrowserNotFound
            } else {
                ProbeError::BrowserLaunch { message }
            }
        })?;

        let (browser, mut handler) = Browser::launch(cdp_config).await.map_err(launch_err)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let watchers: Watchers = Arc::default();
        let mut created = browser
            .event_listener::<EventTargetCreated>()
            .await
            .map_err(launch_err)?;
        let forward = Arc::clone(&watchers);
        let events = tokio::spawn(async move {
            while let Some(event) = created.next().await {
                if event.target_info.r#type != "page" {
                    continue;
                }
                let id = PageId::new(event.target_info.target_id.inner().clone());
                debug!(page = %id, "target created");
                if let Ok(mut watchers) = forward.lock() {
                    watchers.retain(|tx| tx.send(id.clone()).is_ok());
                }
            }
        });

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(launch_err)?;

        info!(headless = config.headless, width, height, "browser launched");
        Ok(Self {
            browser: Mutex::new(browser),
            pages: Mutex::new(Vec::new()),
            watchers,
            http,
            handler,
            events,
        })
    }

    /// Open a blank page
    pub async fn new_page(&self) -> ProbeResult<PageId> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(page_err)?;
        let id = PageId::new(page.target_id().inner().clone());
        self.pages.lock().await.push((id.clone(), page));
        Ok(id)
    }

    /// Close the browser
    pub async fn close(self) -> ProbeResult<()> {
        let mut browser = self.browser.lock().await;
        browser.close().await.map_err(launch_err)?;
        let _ = browser.wait().await;
        self.events.abort();
        self.handler.abort();
        Ok(())
    }

    /// Sync the known page list with the browser's targets
    async fn refresh(&self) -> ProbeResult<Vec<PageId>> {
        let live = self.browser.lock().await.pages().await.map_err(page_err)?;
        let mut pages = self.pages.lock().await;
        pages.retain(|(id, _)| live.iter().any(|p| p.target_id().inner() == id.as_str()));
        for page in live {
            let id = PageId::new(page.target_id().inner().clone());
            if !pages.iter().any(|(known, _)| known == &id) {
                pages.push((id, page));
            }
        }
        Ok(pages.iter().map(|(id, _)| id.clone()).collect())
    }

    async fn page(&self, id: &PageId) -> ProbeResult<Page> {
        if let Some((_, page)) = self.pages.lock().await.iter().find(|(known, _)| known == id) {
            return Ok(page.clone());
        }
        let _ = self.refresh().await?;
        self.pages
            .lock()
            .await
            .iter()
            .find(|(known, _)| known == id)
            .map(|(_, page)| page.clone())
            .ok_or_else(|| ProbeError::page(format!("page {id} is closed or unknown")))
    }

    async fn eval<T: DeserializeOwned>(&self, id: &PageId, expr: String) -> ProbeResult<T> {
        self.page(id)
            .await?
            .evaluate(expr)
            .await
            .map_err(page_err)?
            .into_value()
            .map_err(page_err)
    }

    /// Evaluate `body` with `el` bound to the selected element
    async fn eval_on<T: DeserializeOwned>(
        &self,
        id: &PageId,
        selector: &Selector,
        nth: Nth,
        body: &str,
    ) -> ProbeResult<T> {
        let index = require_index(self, id, selector, nth).await?;
        self.eval(
            id,
            format!("((el) => {{ {body} }})({})", selector.to_nth_query(index)),
        )
        .await
    }

    async fn resource_count(&self, id: &PageId) -> ProbeResult<usize> {
        self.eval(id, "performance.getEntriesByType('resource').length".to_string())
            .await
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn goto(&self, page: &PageId, url: &str) -> ProbeResult<()> {
        debug!(%page, %url, "goto");
        let _ = self
            .page(page)
            .await?
            .goto(url)
            .await
            .map_err(|e| ProbeError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn current_url(&self, page: &PageId) -> ProbeResult<String> {
        Ok(self
            .page(page)
            .await?
            .url()
            .await
            .map_err(page_err)?
            .unwrap_or_default())
    }

    async fn title(&self, page: &PageId) -> ProbeResult<String> {
        Ok(self
            .page(page)
            .await?
            .get_title()
            .await
            .map_err(page_err)?
            .unwrap_or_default())
    }

    async fn load_state_reached(&self, page: &PageId, state: LoadState) -> ProbeResult<bool> {
        let ready: String = self.eval(page, "document.readyState".to_string()).await?;
        if !state.is_reached_by(&ready) {
            return Ok(false);
        }
        if state != LoadState::NetworkIdle {
            return Ok(true);
        }
        let before = self.resource_count(page).await?;
        tokio::time::sleep(Duration::from_millis(NETWORK_IDLE_THRESHOLD_MS)).await;
        Ok(self.resource_count(page).await? == before)
    }

    async fn count(&self, page: &PageId, selector: &Selector) -> ProbeResult<usize> {
        self.eval(page, selector.to_count_query()).await
    }

    async fn is_visible(&self, page: &PageId, selector: &Selector, nth: Nth) -> ProbeResult<bool> {
        let count = self.count(page, selector).await?;
        let Some(index) = nth.resolve(count) else {
            return Ok(false);
        };
        self.eval(
            page,
            format!(
                "((el) => {{ if (!el) return false; const r = el.getBoundingClientRect(); \
                 const s = getComputedStyle(el); return r.width > 0 && r.height > 0 \
                 && s.visibility !== 'hidden' && s.display !== 'none'; }})({})",
                selector.to_nth_query(index)
            ),
        )
        .await
    }

    async fn clear(&self, page: &PageId, selector: &Selector) -> ProbeResult<()> {
        let _: bool = self
            .eval_on(
                page,
                selector,
                Nth::First,
                "el.focus(); el.value = ''; \
                 el.dispatchEvent(new Event('input', { bubbles: true })); return true;",
            )
            .await?;
        Ok(())
    }

    async fn fill(&self, page: &PageId, selector: &Selector, text: &str) -> ProbeResult<()> {
        let _: bool = self
            .eval_on(page, selector, Nth::First, "el.focus(); return true;")
            .await?;
        let _ = self
            .page(page)
            .await?
            .execute(InsertTextParams::new(text))
            .await
            .map_err(page_err)?;
        Ok(())
    }

    async fn click(&self, page: &PageId, selector: &Selector, nth: Nth) -> ProbeResult<()> {
        self.scroll_into_view(page, selector, nth).await?;
        let center: Center = self
            .eval_on(
                page,
                selector,
                nth,
                "const r = el.getBoundingClientRect(); \
                 return { x: r.left + r.width / 2, y: r.top + r.height / 2 };",
            )
            .await?;
        debug!(%page, %selector, x = center.x, y = center.y, "click");
        let _ = self
            .page(page)
            .await?
            .click(Point::new(center.x, center.y))
            .await
            .map_err(page_err)?;
        Ok(())
    }

    async fn scroll_into_view(&self, page: &PageId, selector: &Selector, nth: Nth) -> ProbeResult<()> {
        let _: bool = self
            .eval_on(
                page,
                selector,
                nth,
                "el.scrollIntoView({ block: 'center', inline: 'center' }); return true;",
            )
            .await?;
        Ok(())
    }

    async fn attribute(
        &self,
        page: &PageId,
        selector: &Selector,
        nth: Nth,
        name: &str,
    ) -> ProbeResult<Option<String>> {
        self.eval_on(
            page,
            selector,
            nth,
            &format!("return el.getAttribute({});", js_string(name)),
        )
        .await
    }

    async fn text_content(
        &self,
        page: &PageId,
        selector: &Selector,
        nth: Nth,
    ) -> ProbeResult<Option<String>> {
        self.eval_on(page, selector, nth, "return el.textContent;").await
    }

    async fn accessible_names(&self, page: &PageId, selector: &Selector) -> ProbeResult<Vec<String>> {
        self.eval(
            page,
            format!("{}.map({ACCESSIBLE_NAME_JS})", selector.to_query_all()),
        )
        .await
    }

    async fn is_checked(&self, page: &PageId, selector: &Selector) -> ProbeResult<bool> {
        self.eval_on(
            page,
            selector,
            Nth::First,
            "return !!el.checked || el.getAttribute('aria-checked') === 'true';",
        )
        .await
    }

    async fn set_checked(&self, page: &PageId, selector: &Selector, checked: bool) -> ProbeResult<()> {
        if self.is_checked(page, selector).await? == checked {
            return Ok(());
        }
        self.click(page, selector, Nth::First).await?;
        if self.is_checked(page, selector).await? != checked {
            warn!(%selector, checked, "checkbox did not change state");
            return Err(ProbeError::page(format!(
                "{selector} did not become {}",
                if checked { "checked" } else { "unchecked" }
            )));
        }
        Ok(())
    }

    async fn watch_new_pages(&self) -> ProbeResult<PageWatcher> {
        let (tx, watcher) = PageWatcher::channel();
        self.watchers
            .lock()
            .map_err(|_| ProbeError::page("page watcher registry poisoned"))?
            .push(tx);
        Ok(watcher)
    }

    async fn pages(&self) -> ProbeResult<Vec<PageId>> {
        self.refresh().await
    }

    async fn close_page(&self, page: &PageId) -> ProbeResult<()> {
        let handle = self.page(page).await?;
        self.pages.lock().await.retain(|(id, _)| id != page);
        handle.close().await.map_err(page_err)
    }

    async fn fetch(&self, page: &PageId, url: &str) -> ProbeResult<HttpResponse> {
        let cookies = self
            .page(page)
            .await?
            .execute(cookie_query(url))
            .await
            .map_err(page_err)?
            .result
            .cookies;
        let header = cookie_header(cookies.iter().map(|c| (c.name.as_str(), c.value.as_str())));
        debug!(%url, cookies = cookies.len(), "fetching with browser cookies");

        let mut request = self.http.get(url);
        if !header.is_empty() {
            request = request.header(reqwest::header::COOKIE, header);
        }
        let response = request.send().await.map_err(|e| ProbeError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| ProbeError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}
