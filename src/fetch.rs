//! Page title and favicon lookup for `Link` entries.

use crate::config::{self, FetchConfig};
use crate::error::{Error, Result};
use log::{debug, info};
use reqwest::Client;
use scraper::{Html, Selector};
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("link[rel]").expect("valid selector"));

/// Host part of a URL as written, i.e. the third `/`-separated segment.
pub fn domain(url: &str) -> Option<&str> {
    url.split('/').nth(2).filter(|d| !d.is_empty())
}

/// Directory downloaded favicons are stored in, one file per domain.
#[derive(Debug, Clone)]
pub struct IconCache {
    dir: PathBuf,
}

impl IconCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache under the per-user data directory.
    pub fn from_project_dirs() -> Result<Self> {
        config::project_dirs()
            .map(|dirs| Self::new(dirs.data_dir()))
            .ok_or(Error::NoDataDir)
    }

    pub fn store(&self, domain: &str, bytes: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        let path = self.dir.join(domain);
        std::fs::write(&path, bytes).map_err(|e| Error::io(&path, e))?;
        Ok(path)
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub icon: Option<PathBuf>,
}

pub struct MetadataFetcher {
    client: Client,
    timeout: Duration,
    icons: IconCache,
}

impl MetadataFetcher {
    pub fn new(config: &FetchConfig, icons: IconCache) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::http("<client>", e))?;
        Ok(Self::with_client(client, config.timeout(), icons))
    }

    pub fn with_client(client: Client, timeout: Duration, icons: IconCache) -> Self {
        Self { client, timeout, icons }
    }

    /// Fetches `url`, reads its title and downloads its favicon into the cache.
    /// A non-success status on either request is an error.
    pub async fn fetch_metadata(&self, url: &str) -> Result<PageMetadata> {
        let base = Url::parse(url).map_err(|_| Error::InvalidUrl(url.to_string()))?;
        let html = self.get(url).await?.text().await.map_err(|e| Error::http(url, e))?;

        let (title, icon_url) = parse_page(&html, &base);
        debug!("{}: title={:?} icon={:?}", url, title, icon_url);

        let icon = match icon_url {
            Some(icon_url) => {
                let bytes = self
                    .get(icon_url.as_str())
                    .await?
                    .bytes()
                    .await
                    .map_err(|e| Error::http(icon_url.as_str(), e))?;
                let name = domain(url).ok_or_else(|| Error::InvalidUrl(url.to_string()))?;
                let path = self.icons.store(name, &bytes)?;
                info!("Saved icon for {} to {:?}", url, path);
                Some(path)
            }
            None => None,
        };

        Ok(PageMetadata { title, icon })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        self.client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::http(url, e))
    }
}

/// Title text and the absolute URL of the first `<link rel="...icon...">`.
fn parse_page(html: &str, base: &Url) -> (Option<String>, Option<Url>) {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let icon = document
        .select(&LINK_SELECTOR)
        .find(|link| {
            link.value()
                .attr("rel")
                .is_some_and(|rel| rel.to_lowercase().contains("icon"))
        })
        .and_then(|link| link.value().attr("href"))
        .and_then(|href| base.join(href).ok());

    (title, icon)
}

#[cfg(test)]
pub(crate) mod test_server {
    use std::collections::HashMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Loopback HTTP server answering GETs from a fixed path table; unknown paths get 404.
    pub async fn serve(routes: Vec<(&'static str, &'static str, Vec<u8>)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: HashMap<_, _> = routes
            .into_iter()
            .map(|(path, content_type, body)| (path, (content_type, body)))
            .collect();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { return };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&request);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                let (status, content_type, body) = match routes.get(path.as_str()) {
                    Some((content_type, body)) => ("200 OK", *content_type, body.clone()),
                    None => ("404 Not Found", "text/plain", b"not found".to_vec()),
                };
                let head = format!(
                    "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    content_type,
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            }
        });

        format!("http://{}", addr)
    }

    pub fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }
}
