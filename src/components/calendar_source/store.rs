use super::models::StoreEntry;
use crate::error::{config_error, connection_error, store_error, BotResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::events::Event as XmlEvent;
use quick_xml::reader::Reader;
use reqwest::{Client, Method, Response};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Remote store holding one directory of calendar files per calendar
#[async_trait]
pub trait CalendarStore: Send + Sync {
    /// Check that the store is reachable with the configured credentials
    async fn connect(&self) -> BotResult<()>;

    /// List the entries of a directory
    async fn list(&self, path: &str) -> BotResult<Vec<StoreEntry>>;

    /// Read the raw bytes of a file
    async fn read(&self, path: &str) -> BotResult<Vec<u8>>;
}

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:resourcetype/>
    <d:getlastmodified/>
  </d:prop>
</d:propfind>"#;

/// WebDAV client for a Nextcloud calendar root
pub struct WebDavStore {
    client: Client,
    propfind: Method,
    root: String,
    user: String,
    password: String,
}

impl WebDavStore {
    /// Create a client for the given root URL and credentials
    pub fn new(
        root: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> BotResult<Self> {
        let root = root.into();
        Url::parse(&root)
            .map_err(|e| config_error(&format!("Invalid calendar root URL {}: {}", root, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| config_error(&format!("Failed to build HTTP client: {}", e)))?;
        let propfind = Method::from_bytes(b"PROPFIND")
            .map_err(|e| store_error(&format!("Invalid PROPFIND method: {}", e)))?;

        Ok(Self {
            client,
            propfind,
            root,
            user: user.into(),
            password: password.into(),
        })
    }

    /// Append a store path to the root, keeping the root's own path prefix
    fn url_for(&self, path: &str) -> BotResult<Url> {
        let joined = format!(
            "{}/{}",
            self.root.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| store_error(&format!("Invalid path {}: {}", path, e)))
    }

    async fn propfind(&self, url: Url, depth: &str) -> Result<Response, reqwest::Error> {
        self.client
            .request(self.propfind.clone(), url)
            .basic_auth(&self.user, Some(&self.password))
            .header("Depth", depth)
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(PROPFIND_BODY)
            .send()
            .await
    }
}

#[async_trait]
impl CalendarStore for WebDavStore {
    async fn connect(&self) -> BotResult<()> {
        let url = self.url_for("/")?;
        let response = self
            .propfind(url, "0")
            .await
            .map_err(|e| connection_error(&format!("Failed to reach {}: {}", self.root, e)))?;

        if !response.status().is_success() {
            return Err(connection_error(&format!(
                "Calendar root {} answered HTTP {}",
                self.root,
                response.status()
            )));
        }

        Ok(())
    }

    async fn list(&self, path: &str) -> BotResult<Vec<StoreEntry>> {
        let url = self.url_for(&format!("{}/", path.trim_end_matches('/')))?;
        let response = self
            .propfind(url, "1")
            .await
            .map_err(|e| store_error(&format!("Failed to list {}: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(store_error(&format!("Failed to list {}: HTTP {}", path, status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| store_error(&format!("Failed to read listing of {}: {}", path, e)))?;

        let entries: Vec<StoreEntry> = parse_multistatus(&body)?
            .into_iter()
            .filter(|entry| !entry.is_collection)
            .collect();
        debug!("Listed {} files under {}", entries.len(), path);

        Ok(entries)
    }

    async fn read(&self, path: &str) -> BotResult<Vec<u8>> {
        let url = self.url_for(path)?;
        let response = self
            .client
            .get(url)
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await
            .map_err(|e| store_error(&format!("Failed to read {}: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(store_error(&format!("Failed to read {}: HTTP {}", path, status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| store_error(&format!("Failed to read body of {}: {}", path, e)))?;

        Ok(bytes.to_vec())
    }
}

#[derive(Clone, Copy)]
enum Field {
    Href,
    LastModified,
}

#[derive(Default)]
struct PartialEntry {
    href: String,
    modified: Option<DateTime<Utc>>,
    is_collection: bool,
}

impl PartialEntry {
    fn finish(self) -> Option<StoreEntry> {
        let name = self.href.trim_end_matches('/').rsplit('/').next()?;
        if name.is_empty() {
            return None;
        }
        Some(StoreEntry {
            name: name.to_string(),
            modified: self.modified,
            is_collection: self.is_collection,
        })
    }
}

/// Parse a WebDAV multistatus body into directory entries
pub fn parse_multistatus(body: &str) -> BotResult<Vec<StoreEntry>> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<PartialEntry> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(element)) => match element.local_name().as_ref() {
                b"response" => current = Some(PartialEntry::default()),
                b"href" => field = Some(Field::Href),
                b"getlastmodified" => field = Some(Field::LastModified),
                b"collection" => {
                    if let Some(entry) = current.as_mut() {
                        entry.is_collection = true;
                    }
                }
                _ => {}
            },
            Ok(XmlEvent::Empty(element)) => {
                if element.local_name().as_ref() == b"collection" {
                    if let Some(entry) = current.as_mut() {
                        entry.is_collection = true;
                    }
                }
            }
            Ok(XmlEvent::Text(text)) => {
                if let (Some(field), Some(entry)) = (field, current.as_mut()) {
                    let value = text
                        .unescape()
                        .map_err(|e| store_error(&format!("Malformed listing text: {}", e)))?;
                    match field {
                        Field::Href => entry.href.push_str(&value),
                        Field::LastModified => {
                            entry.modified = DateTime::parse_from_rfc2822(value.trim())
                                .ok()
                                .map(|dt| dt.with_timezone(&Utc));
                        }
                    }
                }
            }
            Ok(XmlEvent::End(element)) => match element.local_name().as_ref() {
                b"response" => {
                    if let Some(entry) = current.take().and_then(PartialEntry::finish) {
                        entries.push(entry);
                    }
                }
                b"href" | b"getlastmodified" => field = None,
                _ => {}
            },
            Ok(XmlEvent::Eof) => break,
            Err(e) => {
                return Err(store_error(&format!(
                    "Malformed listing at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const LISTING: &str = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:" xmlns:s="http://sabredav.org/ns">
  <d:response>
    <d:href>/remote.php/dav/calendars/alice/work/</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype><d:collection/><cal:calendar xmlns:cal="urn:ietf:params:xml:ns:caldav"/></d:resourcetype>
        <d:getlastmodified>Mon, 12 Oct 2026 08:00:00 GMT</d:getlastmodified>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/remote.php/dav/calendars/alice/work/standup.ics</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype/>
        <d:getlastmodified>Fri, 16 Oct 2026 09:30:15 GMT</d:getlastmodified>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/remote.php/dav/calendars/alice/work/no-date.ics</d:href>
    <d:propstat>
      <d:prop><d:resourcetype/></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
    <d:propstat>
      <d:prop><d:getlastmodified/></d:prop>
      <d:status>HTTP/1.1 404 Not Found</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

    #[test]
    fn parses_files_and_collections() {
        let entries = parse_multistatus(LISTING).unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "work");
        assert!(entries[0].is_collection);

        assert_eq!(entries[1].name, "standup.ics");
        assert!(!entries[1].is_collection);
        assert_eq!(
            entries[1].modified,
            Some(Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 15).unwrap())
        );

        assert_eq!(entries[2].name, "no-date.ics");
        assert_eq!(entries[2].modified, None);
    }

    #[test]
    fn rejects_broken_xml() {
        assert!(parse_multistatus("<d:multistatus xmlns:d=\"DAV:\"><d:response></d:href>").is_err());
    }

    #[test]
    fn joins_paths_under_root() {
        let store = WebDavStore::new(
            "https://cloud.example.com/remote.php/dav/calendars/alice/",
            "alice",
            "secret",
            Duration::from_secs(5),
        )
        .unwrap();

        let url = store.url_for("/work/standup.ics").unwrap();
        assert_eq!(
            url.as_str(),
            "https://cloud.example.com/remote.php/dav/calendars/alice/work/standup.ics"
        );
    }

    #[test]
    fn listing_requests_use_propfind() {
        let store =
            WebDavStore::new("https://cloud.example/dav", "alice", "secret", Duration::from_secs(5))
                .unwrap();

        assert_eq!(store.propfind.as_str(), "PROPFIND");
        assert_ne!(store.propfind, Method::GET);
    }

    #[test]
    fn rejects_invalid_root() {
        assert!(WebDavStore::new("not a url", "alice", "secret", Duration::from_secs(5)).is_err());
    }
}
