use anyhow::Result;
use reqwest::header::{CONNECTION, USER_AGENT};
use reqwest::{Client, Response};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::error::JobError;
use super::page::{self, PageInspector, PageVerdict};
use super::task::{Job, JobResult, JobStatus};
use crate::cli::config::HarvesterConfig;
use crate::identity::{Identities, ProxyEndpoint, UserAgent};

/// Settings every job of a run shares
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Prefix the base-36 index is appended to
    pub page_base_url: String,

    /// Directory images are written into
    pub images_dir: PathBuf,

    /// Total timeout of each request
    pub request_timeout: Duration,
}

impl From<&HarvesterConfig> for PipelineSettings {
    fn from(config: &HarvesterConfig) -> Self {
        Self {
            page_base_url: config.harvest.page_base_url.clone(),
            images_dir: config.storage.images.clone(),
            request_timeout: Duration::from_secs(config.harvest.request_timeout_secs),
        }
    }
}

/// Fetch, inspect and download stages for one index
pub struct Pipeline {
    identities: Arc<Identities>,
    settings: PipelineSettings,
    inspector: PageInspector,
}

impl Pipeline {
    pub fn new(identities: Arc<Identities>, settings: PipelineSettings) -> Result<Self> {
        Ok(Self {
            identities,
            settings,
            inspector: PageInspector::new()?,
        })
    }

    /// Run a job to its terminal status
    ///
    /// Never fails as a whole: a failing stage becomes the job's status and
    /// its error travels with the result.
    pub async fn process(&self, job: Job) -> JobResult {
        match self.run_stages(job.index).await {
            Ok(status) => {
                debug!(index = job.index, %status, "Job finished");
                JobResult {
                    job: job.finish(status),
                    error: None,
                }
            }
            Err(error) => {
                warn!(index = job.index, status = %error.status(), "Job failed: {}", error);
                JobResult {
                    job: job.finish(error.status()),
                    error: Some(error),
                }
            }
        }
    }

    async fn run_stages(&self, index: u64) -> Result<JobStatus, JobError> {
        let proxy = self.identities.proxies().get().ok_or(JobError::NoIdentity("proxy"))?;
        let user_agent = self.identities.user_agents().get().ok_or(JobError::NoIdentity("user agent"))?;

        let page_url = page::page_url(&self.settings.page_base_url, index);
        debug!(index, proxy = %proxy, "Fetching page {}", page_url);

        let client = self.build_client(proxy).map_err(JobError::PageRequest)?;

        let request = client.get(&page_url)
            .header(USER_AGENT, user_agent.as_str())
            .header(CONNECTION, "close")
            .build()
            .map_err(JobError::PageRequest)?;

        let response = client.execute(request)
            .await
            .map_err(JobError::PageResponse)?;

        let body = response.bytes()
            .await
            .map_err(JobError::PageContent)?;
        let body = String::from_utf8_lossy(&body);

        let image_url = match self.inspector.inspect(&body) {
            PageVerdict::AccessDenied => return Ok(JobStatus::AccessDenied),
            PageVerdict::Captcha => return Ok(JobStatus::Captcha),
            PageVerdict::NoImage => return Ok(JobStatus::NoImage),
            PageVerdict::Image(url) => url,
        };

        let file_name = page::image_file_name(index, &image_url);
        debug!(index, "Downloading image {}", image_url);

        let request = self.image_request(&client, &image_url, user_agent)
            .map_err(JobError::ImageRequest)?;

        let mut response = client.execute(request)
            .await
            .map_err(JobError::ImageResponse)?;

        let path = self.settings.images_dir.join(&file_name);
        let mut file = File::create(&path)
            .await
            .map_err(|source| JobError::ImageFile { path: path.clone(), source })?;

        let written = copy_body(&mut response, &mut file)
            .await
            .map_err(|source| JobError::ImageFileWrite { path: path.clone(), source })?;

        debug!(index, "Saved {} bytes to {}", written, path.display());

        Ok(JobStatus::Success)
    }

    /// Fresh client per job: its own proxy, cookie store and timeout
    fn build_client(&self, proxy: &ProxyEndpoint) -> reqwest::Result<Client> {
        Client::builder()
            .proxy(proxy.to_proxy()?)
            .cookie_store(true)
            .timeout(self.settings.request_timeout)
            .build()
    }

    fn image_request(&self, client: &Client, image_url: &str, user_agent: &UserAgent) -> reqwest::Result<reqwest::Request> {
        client.get(image_url)
            .header(USER_AGENT, user_agent.as_str())
            .header(CONNECTION, "close")
            .build()
    }
}

/// Stream a response body into a file, returning the byte count
async fn copy_body(response: &mut Response, file: &mut File) -> io::Result<u64> {
    let mut written = 0u64;

    while let Some(chunk) = response.chunk()
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::harvest::page::{ACCESS_DENIED_MARKER, CAPTCHA_MARKER};
    use crate::identity::{IdentityPool, PoolEntry};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Host the pages live on; only ever reached through the proxy
    pub(crate) const PAGE_BASE: &str = "http://screenshots.test/";

    pub(crate) fn identities_via(proxy: &str) -> Arc<Identities> {
        let proxies = IdentityPool::from_entries(vec![ProxyEndpoint::from_record(proxy).unwrap()]);
        let user_agents = IdentityPool::from_entries(vec![
            UserAgent::from_record("harvester-test/1.0").unwrap(),
        ]);

        Arc::new(Identities::new(proxies, user_agents).unwrap())
    }

    pub(crate) fn pipeline_via(proxy: &str, images_dir: &std::path::Path) -> Pipeline {
        Pipeline::new(
            identities_via(proxy),
            PipelineSettings {
                page_base_url: PAGE_BASE.to_string(),
                images_dir: images_dir.to_path_buf(),
                request_timeout: Duration::from_secs(10),
            },
        )
        .unwrap()
    }

    async fn serve_page(server: &MockServer, index: u64, body: String) {
        Mock::given(method("GET"))
            .and(path(format!("/{}", page::encode_base36(index))))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    fn image_page(image_url: &str) -> String {
        format!(
            r#"<html><head><meta property="og:image" content="{}"/></head></html>"#,
            image_url
        )
    }

    fn entries(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_successful_download() {
        let server = MockServer::start().await;
        let images = tempfile::tempdir().unwrap();
        let image_bytes: Vec<u8> = (0..=255u8).cycle().take(4096).collect();

        serve_page(&server, 1000, image_page("http://screenshots.test/img/Xy9.png")).await;
        Mock::given(method("GET"))
            .and(path("/img/Xy9.png"))
            .and(header("user-agent", "harvester-test/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(image_bytes.clone()))
            .mount(&server)
            .await;

        let pipeline = pipeline_via(&server.uri(), images.path());
        let result = pipeline.process(Job::new(1000)).await;

        assert_eq!(result.job.status, JobStatus::Success);
        assert!(result.error.is_none());

        let saved = std::fs::read(images.path().join("1000.Xy9.png")).unwrap();
        assert_eq!(saved, image_bytes);
    }

    #[tokio::test]
    async fn test_access_denied_page() {
        let server = MockServer::start().await;
        let images = tempfile::tempdir().unwrap();
        serve_page(&server, 5, format!("<html>{}</html>", ACCESS_DENIED_MARKER)).await;

        let result = pipeline_via(&server.uri(), images.path()).process(Job::new(5)).await;

        assert_eq!(result.job.status, JobStatus::AccessDenied);
        assert!(result.error.is_none());
        assert_eq!(entries(images.path()), 0);
    }

    #[tokio::test]
    async fn test_captcha_page() {
        let server = MockServer::start().await;
        let images = tempfile::tempdir().unwrap();
        serve_page(&server, 6, format!("<html>{}</html>", CAPTCHA_MARKER)).await;

        let result = pipeline_via(&server.uri(), images.path()).process(Job::new(6)).await;

        assert_eq!(result.job.status, JobStatus::Captcha);
        assert!(result.error.is_none());
        assert_eq!(entries(images.path()), 0);
    }

    #[tokio::test]
    async fn test_page_without_image() {
        let server = MockServer::start().await;
        let images = tempfile::tempdir().unwrap();
        serve_page(&server, 7, "<html><title>removed</title></html>".to_string()).await;

        let result = pipeline_via(&server.uri(), images.path()).process(Job::new(7)).await;

        assert_eq!(result.job.status, JobStatus::NoImage);
        assert!(result.error.is_none());
        assert_eq!(entries(images.path()), 0);
    }

    #[tokio::test]
    async fn test_unreachable_proxy_fails_page_response() {
        // Reserve a port, then free it so nothing listens there
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let images = tempfile::tempdir().unwrap();

        let pipeline = pipeline_via(&format!("127.0.0.1:{}", port), images.path());
        let result = pipeline.process(Job::new(8)).await;

        assert_eq!(result.job.status, JobStatus::ErrorPageResponse);
        assert!(matches!(result.error, Some(JobError::PageResponse(_))));
        assert_eq!(entries(images.path()), 0);
    }

    #[tokio::test]
    async fn test_malformed_image_url_fails_image_request() {
        let server = MockServer::start().await;
        let images = tempfile::tempdir().unwrap();
        serve_page(&server, 9, image_page("not a url")).await;

        let result = pipeline_via(&server.uri(), images.path()).process(Job::new(9)).await;

        assert_eq!(result.job.status, JobStatus::ErrorImageRequest);
        assert!(result.error.is_some());
    }

    /// Proxy answering each connection with the next canned response, then hanging up
    ///
    /// Responses promise more body than they carry, so reading the body fails.
    fn truncating_proxy(responses: Vec<String>) -> String {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        std::thread::spawn(move || {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };

                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });

        address
    }

    fn cut_short(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len() + 100,
            body
        )
    }

    fn complete(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    #[tokio::test]
    async fn test_truncated_page_fails_page_content() {
        let images = tempfile::tempdir().unwrap();
        let proxy = truncating_proxy(vec![cut_short("<html><head>")]);

        let result = pipeline_via(&proxy, images.path()).process(Job::new(12)).await;

        assert_eq!(result.job.status, JobStatus::ErrorPageContent);
        assert!(matches!(result.error, Some(JobError::PageContent(_))));
        assert_eq!(entries(images.path()), 0);
    }

    #[tokio::test]
    async fn test_unsupported_image_scheme_fails_image_response() {
        let server = MockServer::start().await;
        let images = tempfile::tempdir().unwrap();
        serve_page(&server, 13, image_page("ftp://host/a.png")).await;

        let result = pipeline_via(&server.uri(), images.path()).process(Job::new(13)).await;

        assert_eq!(result.job.status, JobStatus::ErrorImageResponse);
        assert!(matches!(result.error, Some(JobError::ImageResponse(_))));
        assert_eq!(entries(images.path()), 0);
    }

    #[tokio::test]
    async fn test_truncated_image_fails_file_write() {
        let images = tempfile::tempdir().unwrap();
        let proxy = truncating_proxy(vec![
            complete(&image_page("http://screenshots.test/img/cut.png")),
            cut_short("PNGDATA"),
        ]);

        let result = pipeline_via(&proxy, images.path()).process(Job::new(14)).await;

        assert_eq!(result.job.status, JobStatus::ErrorImageFileWrite);
        assert!(matches!(result.error, Some(JobError::ImageFileWrite { .. })));
        // File is created before the body breaks off
        assert!(images.path().join("14.cut.png").exists());
    }

    #[tokio::test]
    async fn test_missing_images_dir_fails_file_creation() {
        let server = MockServer::start().await;
        let images = tempfile::tempdir().unwrap();
        serve_page(&server, 10, image_page("http://screenshots.test/img/a.png")).await;
        Mock::given(method("GET"))
            .and(path("/img/a.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let pipeline = pipeline_via(&server.uri(), &images.path().join("missing"));
        let result = pipeline.process(Job::new(10)).await;

        assert_eq!(result.job.status, JobStatus::ErrorImageFile);
        assert!(matches!(result.error, Some(JobError::ImageFile { .. })));
    }

    #[tokio::test]
    async fn test_page_request_carries_identity_headers() {
        let server = MockServer::start().await;
        let images = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path(format!("/{}", page::encode_base36(11))))
            .and(header("user-agent", "harvester-test/1.0"))
            .and(header("connection", "close"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .expect(1)
            .mount(&server)
            .await;

        let result = pipeline_via(&server.uri(), images.path()).process(Job::new(11)).await;

        assert_eq!(result.job.status, JobStatus::NoImage);
    }
}
