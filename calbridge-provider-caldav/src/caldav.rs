//! Blocking CalDAV client.
//!
//! Implements [`RemoteStore`] with plain WebDAV/CalDAV requests: PROPFIND for
//! collection discovery, calendar-query REPORTs for ranged and UID lookups,
//! and conditional PUT/DELETE for writes.

use calbridge_core::datetime::format_utc;
use chrono::{DateTime, Utc};
use http::header::{CONTENT_TYPE, ETAG, IF_MATCH, IF_NONE_MATCH};
use http::{Method, StatusCode};
use reqwest::blocking::{Client, RequestBuilder, Response};
use url::Url;

use crate::error::{BridgeError, BridgeResult};
use crate::store::{
    CalendarCollection, ComponentKind, Credentials, ETag, Href, Precondition, RemoteItem,
    RemoteStore,
};

const PROPFIND_COLLECTIONS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:propfind xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <D:prop>
    <D:displayname/>
    <D:resourcetype/>
  </D:prop>
</D:propfind>"#;

struct Session {
    home: Href,
    credentials: Credentials,
}

pub struct CalDavClient {
    http: Client,
    server_url: Url,
    session: Option<Session>,
}

impl CalDavClient {
    /// Create a client for the server at `server_url`; hrefs are resolved
    /// against it.
    pub fn new(server_url: &str) -> BridgeResult<Self> {
        let http = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(CalDavClient {
            http,
            server_url: Url::parse(server_url)?,
            session: None,
        })
    }

    fn session(&self) -> BridgeResult<&Session> {
        self.session.as_ref().ok_or(BridgeError::NotLoggedOn)
    }

    fn request(&self, method: Method, href: &Href) -> BridgeResult<(RequestBuilder, Url)> {
        let session = self.session()?;
        let url = self.server_url.join(href.as_str())?;
        let builder = self
            .http
            .request(method, url.clone())
            .basic_auth(&session.credentials.username, Some(&session.credentials.password));
        Ok((builder, url))
    }

    /// Send an XML request expecting a 207 Multi-Status body.
    fn multistatus(&self, method: &[u8], href: &Href, depth: &str, body: String) -> BridgeResult<String> {
        let method = Method::from_bytes(method)?;
        let (builder, url) = self.request(method.clone(), href)?;

        let response = builder
            .header(CONTENT_TYPE, "application/xml; charset=utf-8")
            .header("Depth", depth)
            .body(body)
            .send()?;

        let response = expect_status(response, &method, &url, |s| s == StatusCode::MULTI_STATUS)?;
        Ok(response.text()?)
    }

    fn report(&self, collection: &Href, filter: &str) -> BridgeResult<Vec<RemoteItem>> {
        let body = format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<C:calendar-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <D:prop>
    <D:getetag/>
    <C:calendar-data/>
  </D:prop>
  <C:filter>
    <C:comp-filter name="VCALENDAR">
      {filter}
    </C:comp-filter>
  </C:filter>
</C:calendar-query>"#
        );

        let xml = self.multistatus(b"REPORT", collection, "1", body)?;
        parse_calendar_resources(&xml)
    }
}

impl RemoteStore for CalDavClient {
    fn login(&mut self, home: Href, credentials: Credentials) {
        self.session = Some(Session { home, credentials });
    }

    fn options(&self) -> BridgeResult<Vec<String>> {
        let home = &self.session()?.home;
        let (builder, url) = self.request(Method::OPTIONS, home)?;
        let response = expect_status(builder.send()?, &Method::OPTIONS, &url, |s| s.is_success())?;

        let allow = response
            .headers()
            .get_all(http::header::ALLOW)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(",");
        Ok(parse_allow(&allow))
    }

    fn list_collections(&self) -> BridgeResult<Vec<CalendarCollection>> {
        let home = &self.session()?.home;
        let xml = self.multistatus(b"PROPFIND", home, "1", PROPFIND_COLLECTIONS.to_string())?;
        let collections = parse_collections(&xml)?;
        tracing::debug!(count = collections.len(), "Found calendar collections");
        Ok(collections)
    }

    fn collection_details(&self, collection: &Href) -> BridgeResult<CalendarCollection> {
        let xml = self.multistatus(b"PROPFIND", collection, "0", PROPFIND_COLLECTIONS.to_string())?;
        let details = parse_collections(&xml)?.into_iter().next();
        Ok(details.unwrap_or_else(|| CalendarCollection {
            href: collection.clone(),
            display_name: None,
        }))
    }

    fn fetch_range(
        &self,
        collection: &Href,
        kind: ComponentKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BridgeResult<Vec<RemoteItem>> {
        let filter = format!(
            r#"<C:comp-filter name="{}">
        <C:time-range start="{}" end="{}"/>
      </C:comp-filter>"#,
            kind.as_ics_str(),
            format_utc(&start),
            format_utc(&end)
        );
        self.report(collection, &filter)
    }

    fn fetch_by_uid(
        &self,
        collection: &Href,
        kind: ComponentKind,
        uid: &str,
    ) -> BridgeResult<Option<RemoteItem>> {
        let filter = format!(
            r#"<C:comp-filter name="{}">
        <C:prop-filter name="UID">
          <C:text-match collation="i;octet">{}</C:text-match>
        </C:prop-filter>
      </C:comp-filter>"#,
            kind.as_ics_str(),
            xml_escape(uid)
        );
        Ok(self.report(collection, &filter)?.into_iter().next())
    }

    fn put(&mut self, href: &Href, data: &str, precondition: &Precondition) -> BridgeResult<Option<ETag>> {
        let (builder, url) = self.request(Method::PUT, href)?;
        let builder = builder
            .header(CONTENT_TYPE, "text/calendar; charset=utf-8")
            .body(data.to_string());

        let builder = match precondition {
            Precondition::CreateOnly => builder.header(IF_NONE_MATCH, "*"),
            Precondition::IfMatch(etag) => builder.header(IF_MATCH, etag.as_str()),
            Precondition::Unconditional => builder,
        };

        let response = builder.send()?;
        if response.status() == StatusCode::PRECONDITION_FAILED {
            return Err(BridgeError::PreconditionFailed(href.to_string()));
        }
        let response = expect_status(response, &Method::PUT, &url, |s| s.is_success())?;

        Ok(response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(ETag::new))
    }

    fn delete(&mut self, href: &Href) -> BridgeResult<u16> {
        let (builder, _) = self.request(Method::DELETE, href)?;
        let status = builder.send()?.status();
        Ok(status.as_u16())
    }
}

fn expect_status(
    response: Response,
    method: &Method,
    url: &Url,
    accept: impl Fn(StatusCode) -> bool,
) -> BridgeResult<Response> {
    let status = response.status();
    if accept(status) {
        return Ok(response);
    }

    tracing::warn!(%method, %url, status = status.as_u16(), "Unexpected CalDAV response");
    Err(BridgeError::Status {
        method: method.clone(),
        url: url.to_string(),
        status: status.as_u16(),
    })
}

/// Method names from one or more `Allow` header values.
fn parse_allow(allow: &str) -> Vec<String> {
    allow
        .split(',')
        .map(|m| m.trim().to_ascii_uppercase())
        .filter(|m| !m.is_empty())
        .collect()
}

/// Resources with calendar data from a calendar-query multistatus.
fn parse_calendar_resources(xml: &str) -> BridgeResult<Vec<RemoteItem>> {
    let doc = roxmltree::Document::parse(xml)?;

    let mut resources = Vec::new();
    for response in doc.descendants().filter(|n| n.has_tag_name(("DAV:", "response"))) {
        let Some(href) = child_text(response, "href") else {
            continue;
        };

        let etag = child_text(response, "getetag").map(ETag::new);

        // Only include resources that have calendar data
        if let Some(data) = child_text(response, "calendar-data") {
            resources.push(RemoteItem {
                href: Href::new(href),
                etag,
                data,
            });
        }
    }

    Ok(resources)
}

/// Calendar collections from a PROPFIND multistatus. Plain collections (such
/// as the calendar home itself) are skipped.
fn parse_collections(xml: &str) -> BridgeResult<Vec<CalendarCollection>> {
    let doc = roxmltree::Document::parse(xml)?;

    let collections = doc
        .descendants()
        .filter(|n| n.has_tag_name(("DAV:", "response")))
        .filter(|response| {
            response
                .descendants()
                .filter(|n| n.tag_name().name() == "resourcetype")
                .flat_map(|n| n.children())
                .any(|n| n.tag_name().name() == "calendar")
        })
        .filter_map(|response| {
            let href = child_text(response, "href")?;
            Some(CalendarCollection {
                href: Href::new(href),
                display_name: child_text(response, "displayname").filter(|n| !n.is_empty()),
            })
        })
        .collect();

    Ok(collections)
}

fn child_text(node: roxmltree::Node<'_, '_>, name: &str) -> Option<String> {
    node.descendants()
        .find(|n| n.tag_name().name() == name)
        .and_then(|n| n.text())
        .map(|s| s.trim().to_string())
}

/// roxmltree only reads XML. Request bodies are format strings, so the one
/// caller-supplied value (the UID in a text-match filter) is escaped here.
fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
