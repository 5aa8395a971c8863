//! Request template model.
//!
//! A [`RequestTemplate`] is compiled once from a [`Descriptor`] and then shared
//! read-only by every task of the run. [`RequestTemplate::materialize`] turns it
//! into a fresh [`Invocation`] carrying its own correlation identifier.

pub mod body;
pub mod descriptor;
pub mod media_type;
pub mod method;

use std::{fmt, path::Path, sync::Arc};

use url::Url;

pub use body::{BodyVariant, MultipartPart, PartContent};
pub use descriptor::{Descriptor, DescriptorError};
pub use media_type::MediaType;
pub use method::RequestMethod;

use crate::correlation::{CORRELATION_HEADER, CorrelationIds, RandomIds};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Immutable, validated description of one HTTP call.
#[derive(Clone)]
pub struct RequestTemplate {
    method: RequestMethod,
    url: Option<Url>,
    media_type: Option<MediaType>,
    body: BodyVariant,
    headers: Arc<[Header]>,
    cookies: Arc<[Cookie]>,
    ids: Arc<dyn CorrelationIds>,
}

impl RequestTemplate {
    pub(crate) fn from_parts(
        method: RequestMethod,
        url: Option<Url>,
        media_type: Option<MediaType>,
        body: BodyVariant,
        headers: Vec<Header>,
        cookies: Vec<Cookie>,
    ) -> Self {
        Self {
            method,
            url,
            media_type,
            body,
            headers: headers.into(),
            cookies: cookies.into(),
            ids: Arc::new(RandomIds::default()),
        }
    }

    /// Parses and compiles a JSON descriptor.
    pub fn parse(document: &str) -> Result<Self, DescriptorError> {
        Descriptor::from_json(document)?.compile()
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DescriptorError> {
        Descriptor::from_path(path)?.compile()
    }

    /// Replaces the correlation identifier source.
    pub fn with_correlation_ids(mut self, ids: Arc<dyn CorrelationIds>) -> Self {
        self.ids = ids;
        self
    }

    pub fn method(&self) -> RequestMethod {
        self.method
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn media_type(&self) -> Option<&MediaType> {
        self.media_type.as_ref()
    }

    pub fn body(&self) -> &BodyVariant {
        &self.body
    }

    /// Headers exactly as declared.
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Builds a new invocation of this template.
    ///
    /// Headers keep their declared order. A declared content type replaces
    /// any same-named header and is appended after them, followed by the
    /// correlation header. Bodies are shared, never copied or read.
    pub fn materialize(&self) -> Invocation {
        let correlation_id = self.ids.next_id();

        let mut headers = Vec::with_capacity(self.headers.len() + 2);
        match &self.media_type {
            Some(media_type) => {
                headers.extend(
                    self.headers
                        .iter()
                        .filter(|header| !header.name.eq_ignore_ascii_case("content-type"))
                        .cloned(),
                );
                headers.push(Header::new("Content-Type", media_type.to_string()));
            }
            None => headers.extend(self.headers.iter().cloned()),
        }
        headers.push(Header::new(CORRELATION_HEADER, correlation_id.as_str()));

        Invocation {
            method: self.method,
            url: self.url.clone(),
            headers,
            cookies: self.cookies.clone(),
            body: self.body.clone(),
            correlation_id,
        }
    }
}

impl fmt::Debug for RequestTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestTemplate")
            .field("method", &self.method)
            .field("url", &self.url.as_ref().map(Url::as_str))
            .field("media_type", &self.media_type)
            .field("body", &self.body)
            .field("headers", &self.headers)
            .field("cookies", &self.cookies)
            .finish_non_exhaustive()
    }
}

/// One send-ready request. Consumed by a single send, never reused.
#[derive(Clone, Debug)]
pub struct Invocation {
    method: RequestMethod,
    url: Option<Url>,
    headers: Vec<Header>,
    cookies: Arc<[Cookie]>,
    body: BodyVariant,
    correlation_id: String,
}

impl Invocation {
    pub fn method(&self) -> RequestMethod {
        self.method
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Outbound headers, including content type and correlation header.
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Values of every header whose name matches case-insensitively.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// `name=value` pairs joined for a `Cookie` header, if any cookies are set.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|cookie| format!("{}={}", cookie.name, cookie.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn body(&self) -> &BodyVariant {
        &self.body
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, thread};

    use serde_json::json;

    use super::*;
    use crate::{correlation::SequentialIds, test_utils::TempFile};

    fn template(value: serde_json::Value) -> RequestTemplate {
        RequestTemplate::parse(&value.to_string()).unwrap()
    }

    #[test]
    fn invocations_share_everything_but_the_correlation_id() {
        let template = template(json!({
            "method": "GET",
            "url": "http://h/x",
            "headers": [{ "name": "A", "value": "1" }]
        }));

        let first = template.materialize();
        let second = template.materialize();

        for invocation in [&first, &second] {
            assert_eq!(invocation.method(), RequestMethod::Get);
            assert_eq!(invocation.url().map(Url::as_str), Some("http://h/x"));
            assert_eq!(invocation.header_values("A").collect::<Vec<_>>(), ["1"]);
            assert_eq!(
                invocation.header_values(CORRELATION_HEADER).collect::<Vec<_>>(),
                [invocation.correlation_id()]
            );
            assert!(invocation.correlation_id().starts_with("ab"));
        }
        assert_ne!(first.correlation_id(), second.correlation_id());
    }

    #[test]
    fn k_invocations_have_pairwise_distinct_ids() {
        let file = TempFile::with_contents("data");
        let template = template(json!({
            "method": "PUT",
            "url": "http://h/put",
            "contentType": "application/octet-stream",
            "body": file.path().to_str().unwrap(),
            "headers": [{ "name": "X", "value": "y" }],
            "cookies": [{ "name": "s", "value": "1" }]
        }))
        .with_correlation_ids(Arc::new(SequentialIds::default()));

        let invocations: Vec<_> = (0..64).map(|_| template.materialize()).collect();
        let ids: HashSet<_> = invocations.iter().map(Invocation::correlation_id).collect();
        assert_eq!(ids.len(), invocations.len());

        let first = &invocations[0];
        for invocation in &invocations {
            assert_eq!(invocation.method(), first.method());
            assert_eq!(invocation.url(), first.url());
            assert_eq!(invocation.cookies(), first.cookies());
            assert_eq!(invocation.body(), first.body());
            assert_eq!(
                invocation.headers()[..invocation.headers().len() - 1],
                first.headers()[..first.headers().len() - 1]
            );
        }
    }

    #[test]
    fn content_type_overrides_declared_header() {
        let template = template(json!({
            "method": "POST",
            "url": "http://h/",
            "contentType": "application/json",
            "body": "{}",
            "headers": [
                { "name": "content-type", "value": "text/plain" },
                { "name": "B", "value": "2" }
            ]
        }));

        let invocation = template.materialize();
        assert_eq!(
            invocation.header_values("Content-Type").collect::<Vec<_>>(),
            ["application/json"]
        );
        let names: Vec<_> = invocation.headers().iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["B", "Content-Type", CORRELATION_HEADER]);
        // the template itself is untouched
        assert_eq!(template.headers()[0], Header::new("content-type", "text/plain"));
    }

    #[test]
    fn declared_headers_pass_through_without_content_type() {
        let template = template(json!({
            "method": "GET",
            "url": "http://h/",
            "headers": [
                { "name": "Content-Type", "value": "text/plain" },
                { "name": "X-Dup", "value": "1" },
                { "name": "X-Dup", "value": "2" }
            ]
        }));

        let invocation = template.materialize();
        assert_eq!(
            invocation.header_values("x-dup").collect::<Vec<_>>(),
            ["1", "2"]
        );
        assert_eq!(
            invocation.header_values("content-type").collect::<Vec<_>>(),
            ["text/plain"]
        );
    }

    #[test]
    fn cookie_header_joins_pairs() {
        let template = template(json!({
            "method": "GET",
            "url": "http://h/",
            "cookies": [{ "name": "a", "value": "1" }, { "name": "b", "value": "2" }]
        }));
        assert_eq!(template.materialize().cookie_header().as_deref(), Some("a=1; b=2"));

        let bare = template_without_cookies();
        assert_eq!(bare.materialize().cookie_header(), None);
    }

    fn template_without_cookies() -> RequestTemplate {
        template(json!({ "method": "GET", "url": "http://h/" }))
    }

    #[test]
    fn file_body_is_referenced_not_read() {
        let file = TempFile::with_contents("large");
        let template = template(json!({
            "method": "POST",
            "url": "http://h/",
            "contentType": "application/octet-stream",
            "body": file.path().to_str().unwrap()
        }));

        let invocation = template.materialize();
        let (BodyVariant::FileRef(a), BodyVariant::FileRef(b)) = (template.body(), invocation.body())
        else {
            panic!("expected file bodies");
        };
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn materialize_is_shareable_across_threads() {
        let template = Arc::new(template_without_cookies());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let template = template.clone();
                thread::spawn(move || {
                    (0..100)
                        .map(|_| template.materialize().correlation_id().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let ids: HashSet<_> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        assert_eq!(ids.len(), 400);
    }
}
