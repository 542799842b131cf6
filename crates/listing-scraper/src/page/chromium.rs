//! Chromium-backed listing pages using chromiumoxide.
//!
//! The browser process and its tabs belong to whoever launches them. The
//! scraping loop only borrows a [`ChromiumPage`] for the length of a run;
//! callers close the page and shut the browser down on every exit path.

use super::{HandleTable, ListingPage, NodeHandle};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Environment variable pointing at a Chromium binary.
pub const CHROMIUM_PATH_ENV: &str = "LISTING_SCRAPER_CHROMIUM";

/// Delay after clicking "next" before the settle check starts.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(2000);

const READY_POLL: Duration = Duration::from_millis(100);

const INTERACTABLE_JS: &str = "function() {
    const style = window.getComputedStyle(this);
    return !this.disabled
        && this.getAttribute('aria-disabled') !== 'true'
        && style.display !== 'none'
        && style.visibility !== 'hidden'
        && style.pointerEvents !== 'none';
}";

/// Binary names looked up on `PATH`.
const PATH_BINARIES: [&str; 3] = ["google-chrome", "chromium", "chromium-browser"];

/// Locate a Chromium binary.
///
/// Checked in order: `LISTING_SCRAPER_CHROMIUM`, a browser unpacked under
/// `~/.listing-scraper/chromium`, `PATH`, then the stock macOS install.
pub fn find_chromium() -> Option<PathBuf> {
    let from_env = std::env::var_os(CHROMIUM_PATH_ENV).map(PathBuf::from);
    let bundled = dirs::home_dir()
        .map(|home| bundled_candidates(&home.join(".listing-scraper").join("chromium")))
        .unwrap_or_default();

    from_env
        .into_iter()
        .chain(bundled)
        .find(|p| p.exists())
        .or_else(|| PATH_BINARIES.iter().find_map(|name| which::which(name).ok()))
        .or_else(|| {
            let app = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
            (cfg!(target_os = "macos") && app.exists()).then_some(app)
        })
}

/// Where a Chrome-for-Testing download lands under `root`.
fn bundled_candidates(root: &Path) -> Vec<PathBuf> {
    const TESTING_APP: &str =
        "Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing";
    let mut candidates = if cfg!(target_os = "macos") {
        vec![
            root.join("chrome-mac-arm64").join(TESTING_APP),
            root.join("chrome-mac-x64").join(TESTING_APP),
        ]
    } else {
        vec![root.join("chrome-linux64").join("chrome")]
    };
    candidates.push(root.join("chrome"));
    candidates
}

/// How to launch the browser.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Explicit binary; falls back to [`find_chromium`].
    pub executable: Option<PathBuf>,
    /// Run without a window. Turn off to log in by hand.
    pub headless: bool,
    pub navigation_timeout: Duration,
    pub settle_delay: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            navigation_timeout: Duration::from_secs(30),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// A launched Chromium process.
pub struct ChromiumRenderer {
    browser: Browser,
    handler: JoinHandle<()>,
    options: LaunchOptions,
}

impl ChromiumRenderer {
    /// Launch Chromium with the given options.
    pub async fn launch(options: LaunchOptions) -> Result<Self> {
        let chrome_path = match &options.executable {
            Some(path) => path.clone(),
            None => find_chromium().with_context(|| {
                format!("Chromium not found. Install Chrome or set {CHROMIUM_PATH_ENV}.")
            })?,
        };

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-extensions");
        builder = if options.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        tracing::info!(headless = options.headless, "Chromium launched");
        Ok(Self {
            browser,
            handler,
            options,
        })
    }

    /// Open a new tab and navigate it to `url`.
    pub async fn open_page(&self, url: &str) -> Result<ChromiumPage> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        let start = Instant::now();
        let timeout = self.options.navigation_timeout;
        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => {
                let _ = page.wait_for_navigation().await;
            }
            Ok(Err(e)) => bail!("navigation to {url} failed: {e}"),
            Err(_) => bail!("navigation to {url} timed out after {}ms", timeout.as_millis()),
        }
        tracing::info!(url, load_ms = start.elapsed().as_millis() as u64, "page opened");

        Ok(ChromiumPage::new(page, self.options.settle_delay))
    }

    /// Close the browser and wait for the process to exit.
    pub async fn shutdown(mut self) -> Result<()> {
        let closed = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler.abort();
        closed.context("failed to close Chromium")?;
        Ok(())
    }
}

/// A single Chromium tab seen as a listing page.
pub struct ChromiumPage {
    page: Page,
    nodes: HandleTable<Element>,
    settle_delay: Duration,
}

impl ChromiumPage {
    pub fn new(page: Page, settle_delay: Duration) -> Self {
        Self {
            page,
            nodes: HandleTable::new(),
            settle_delay,
        }
    }

    /// Close the tab.
    pub async fn close(self) -> Result<()> {
        self.page.close().await.context("failed to close page")?;
        Ok(())
    }

    async fn ready_state(&self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.readyState")
            .await
            .context("failed to read document.readyState")?;
        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert readyState: {e:?}"))
    }
}

#[async_trait]
impl ListingPage for ChromiumPage {
    async fn query_all(
        &mut self,
        scope: Option<NodeHandle>,
        selector: &str,
    ) -> Result<Vec<NodeHandle>> {
        let elements = match scope {
            None => self.page.find_elements(selector).await,
            Some(handle) => self.nodes.get(handle)?.find_elements(selector).await,
        }
        .with_context(|| format!("query {selector:?} failed"))?;

        Ok(elements.into_iter().map(|el| self.nodes.insert(el)).collect())
    }

    async fn text(&mut self, node: NodeHandle) -> Result<String> {
        let text = self
            .nodes
            .get(node)?
            .inner_text()
            .await
            .context("failed to read innerText")?;
        Ok(text.unwrap_or_default())
    }

    async fn attribute(&mut self, node: NodeHandle, name: &str) -> Result<Option<String>> {
        self.nodes
            .get(node)?
            .attribute(name)
            .await
            .with_context(|| format!("failed to read attribute {name:?}"))
    }

    async fn is_interactable(&mut self, node: NodeHandle) -> Result<bool> {
        let returns = self
            .nodes
            .get(node)?
            .call_js_fn(INTERACTABLE_JS, false)
            .await
            .context("interactability check failed")?;
        Ok(returns
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn activate(&mut self, node: NodeHandle) -> Result<()> {
        self.nodes
            .get(node)?
            .click()
            .await
            .context("click failed")?;
        self.nodes.invalidate();
        Ok(())
    }

    async fn wait_settled(&mut self, timeout: Duration) -> Result<()> {
        tokio::time::sleep(self.settle_delay).await;

        let waited = tokio::time::timeout(timeout, async {
            loop {
                if self.ready_state().await? == "complete" {
                    return Ok::<_, anyhow::Error>(());
                }
                tokio::time::sleep(READY_POLL).await;
            }
        })
        .await;

        match waited {
            Ok(result) => result,
            Err(_) => bail!("page did not settle within {}ms", timeout.as_millis()),
        }
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .map(|u| u.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    async fn html(&self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .context("failed to get HTML")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert HTML result: {e:?}"))
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.page
            .screenshot(params)
            .await
            .context("screenshot failed")
    }
}
