//! Shared fixtures: a mock TESSA site served by wiremock

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tessa_harvest::config::{
    CacheConfig, Config, CrawlerConfig, OutputConfig, SiteConfig, UnknownKindPolicy, UserAgentConfig,
};
use tessa_harvest::crawler::{build_http_client, Fetcher, HttpFetcher};
use wiremock::matchers::{path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const COURSE: &str = "/openlearncreate/course/view.php";
pub const SUBPAGE: &str = "/openlearncreate/mod/subpage/view.php";
pub const OUCONTENT: &str = "/openlearncreate/mod/oucontent/view.php";
pub const RESOURCE: &str = "/openlearncreate/mod/resource/view.php";

/// Creates a test configuration scoped to the mock server
pub fn create_test_config(base_url: &str, work_dir: &Path) -> Config {
    let host = url::Url::parse(base_url)
        .expect("Failed to parse base URL")
        .host_str()
        .expect("Failed to extract host")
        .to_string();

    let mut entry_urls = BTreeMap::new();
    entry_urls.insert("en".to_string(), format!("{}{}?id=2042", base_url, COURSE));

    Config {
        crawler: CrawlerConfig {
            page_limit: 100,
            request_timeout: 5,
            unknown_kinds: UnknownKindPolicy::Exclude,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            trees_dir: work_dir.join("trees").display().to_string(),
            downloads_dir: work_dir.join("downloads").display().to_string(),
            report_path: work_dir.join("report.md").display().to_string(),
        },
        site: SiteConfig {
            source_domains: vec![host],
            entry_urls,
            ..SiteConfig::default()
        },
        cache: CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        },
    }
}

/// Plain HTTP fetcher, no response cache
pub fn create_fetcher(config: &Config) -> Arc<dyn Fetcher> {
    let client = build_http_client(&config.user_agent, config.crawler.request_timeout)
        .expect("Failed to build client");
    Arc::new(HttpFetcher::new(client))
}

/// Absolute URL of a Moodle page on the mock server
pub fn page_url(base_url: &str, page_path: &str, id: &str) -> String {
    format!("{}{}?id={}", base_url, page_path, id)
}

/// Serves `body` as HTML for `page_path?id=...`
pub async fn mount_html(server: &MockServer, page_path: &str, id: &str, body: String) {
    Mock::given(path(page_path))
        .and(query_param("id", id))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8"))
        .mount(server)
        .await;
}

/// Serves raw bytes with `content_type` for `page_path?id=...`
pub async fn mount_file(server: &MockServer, page_path: &str, id: &str, content_type: &str, bytes: &[u8]) {
    Mock::given(path(page_path))
        .and(query_param("id", id))
        .respond_with(ResponseTemplate::new(200).set_body_raw(bytes.to_vec(), content_type))
        .mount(server)
        .await;
}

/// Root page: a description label, two topics and an off-site link
pub fn root_page(base_url: &str) -> String {
    format!(
        r#"<html><head><title>TESSA English</title></head><body>
        <div class="course-content"><ul>
            <li class="activity modtype_label"><p>Teacher Education in Sub-Saharan Africa.</p></li>
            <li><a href="{}">Literacy <span class="accesshide">Module</span></a></li>
            <li><a href="{}">Key resources</a></li>
            <li><a href="https://example.org/elsewhere">Partner site</a></li>
        </ul></div></body></html>"#,
        page_url(base_url, SUBPAGE, "10"),
        page_url(base_url, OUCONTENT, "20"),
    )
}

/// Literacy subpage: one module, one PDF resource, a repeated link and a link back home
pub fn literacy_page(base_url: &str) -> String {
    format!(
        r#"<html><head><title>Literacy</title></head><body>
        <div class="pagecontent-content">
            <a href="{}">Investigating reading</a>
            <a href="{}">Reading worksheet</a>
            <a href="{}">Key resources</a>
            <a href="{}">Back to course</a>
        </div></body></html>"#,
        page_url(base_url, OUCONTENT, "21"),
        page_url(base_url, RESOURCE, "30"),
        page_url(base_url, OUCONTENT, "20"),
        page_url(base_url, COURSE, "2042"),
    )
}

/// Module page with optional table of contents
pub fn module_page(base_url: &str, id: &str, text: &str, toc: bool) -> String {
    let toc = if toc {
        format!(
            r#"<div class="oucontent-toc"><ul>
                <li><a href="{base}{path}?id={id}">Introduction</a></li>
                <li><a href="{base}{path}?id={id}&section=1">1 Reading aloud</a></li>
            </ul></div>"#,
            base = base_url,
            path = OUCONTENT,
            id = id
        )
    } else {
        String::new()
    };
    format!(
        r#"<html><head><title>Module {id}</title>
        <link rel="stylesheet" href="{base}/theme/styles.css"></head><body>
        <div id="page-navbar">Home / Literacy</div>{toc}
        <div id="oucontent-content"><h2>Module {id}</h2><p>{text}</p>
            <img src="{base}/pix/reading.png"></div>
        <div id="page-footer">Footer</div></body></html>"#,
        base = base_url,
        id = id,
        toc = toc,
        text = text
    )
}

/// Mounts the whole English site used by the crawl tests
pub async fn mount_site(server: &MockServer) {
    let base_url = server.uri();
    mount_html(server, COURSE, "2042", root_page(&base_url)).await;
    mount_html(server, SUBPAGE, "10", literacy_page(&base_url)).await;
    mount_html(server, OUCONTENT, "20", module_page(&base_url, "20", "Key resources text", false)).await;
    mount_html(server, OUCONTENT, "21", module_page(&base_url, "21", "Reading text", true)).await;
    mount_file(server, RESOURCE, "30", "application/pdf", b"%PDF-1.4 worksheet").await;
}
