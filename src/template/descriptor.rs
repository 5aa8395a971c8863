//! Declarative request descriptor and its compilation into a [`RequestTemplate`].
//!
//! A descriptor is a JSON document:
//!
//! ```json
//! {
//!   "method": "POST",
//!   "url": "http://localhost:8080/upload",
//!   "contentType": "multipart/form-data",
//!   "body": [
//!     { "name": "meta", "text": "{\"a\":1}", "contentType": "application/json" },
//!     { "name": "blob", "file": "./payload.bin" }
//!   ],
//!   "headers": [ { "name": "X-Env", "value": "bench" } ],
//!   "cookies": [ { "name": "session", "value": "abc" } ]
//! }
//! ```
//!
//! Every structural check happens here, once. A descriptor either compiles
//! completely or not at all.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;
use serde_json::Value;
use snafu::{OptionExt, ResultExt, Snafu};
use url::Url;

use super::{
    Cookie, Header, RequestTemplate,
    body::{BodyVariant, MultipartPart, PartContent},
    media_type::MediaType,
    method::RequestMethod,
};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DescriptorError {
    #[snafu(display("Failed to read request descriptor {}: {}", path.display(), source))]
    ReadDescriptor {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Malformed request descriptor: {}", source))]
    Json { source: serde_json::Error },

    #[snafu(display("Request descriptor has no method"))]
    MissingMethod,

    #[snafu(display("Unrecognized request method '{}'", method))]
    UnknownMethod { method: String },

    #[snafu(display("Invalid target url '{}': {}", url, source))]
    InvalidUrl { url: String, source: url::ParseError },

    #[snafu(display("Invalid content type '{}': {}", content_type, source))]
    InvalidContentType {
        content_type: String,
        source: mime::FromStrError,
    },

    #[snafu(display("Content type '{}' requires an array body", content_type))]
    MultipartBodyNotArray { content_type: String },

    #[snafu(display("Multipart part #{} is malformed: {}", index, source))]
    MalformedPart {
        index: usize,
        source: serde_json::Error,
    },

    #[snafu(display("Multipart part #{} has no name", index))]
    PartMissingName { index: usize },

    #[snafu(display("Multipart part '{}' sets both text and file", name))]
    PartContentConflict { name: String },

    #[snafu(display("Multipart part '{}' sets neither text nor file", name))]
    PartContentMissing { name: String },

    #[snafu(display("Multipart part '{}' references missing file {}", name, path.display()))]
    PartFileMissing { name: String, path: PathBuf },

    #[snafu(display(
        "Multipart part '{}' has invalid content type '{}': {}",
        name,
        content_type,
        source
    ))]
    InvalidPartContentType {
        name: String,
        content_type: String,
        source: mime::FromStrError,
    },

    #[snafu(display("Invalid header '{}': {}", name, details))]
    InvalidHeader { name: String, details: String },

    #[snafu(display("Invalid cookie '{}': {}", name, details))]
    InvalidCookie { name: String, details: String },
}

/// Serialized form of a request descriptor.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub headers: Option<Vec<NameValue>>,
    #[serde(default)]
    pub cookies: Option<Vec<NameValue>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NameValue {
    pub name: String,
    /// Numbers and booleans are taken as their JSON text.
    #[serde(deserialize_with = "scalar_text")]
    pub value: String,
}

fn scalar_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(serde::de::Error::invalid_type(
            unexpected(&other),
            &"a string, number or boolean",
        )),
    }
}

fn unexpected(value: &Value) -> serde::de::Unexpected<'_> {
    match value {
        Value::Null => serde::de::Unexpected::Unit,
        Value::Array(_) => serde::de::Unexpected::Seq,
        _ => serde::de::Unexpected::Map,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartDescriptor {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
}

impl Descriptor {
    pub fn from_json(document: &str) -> Result<Self, DescriptorError> {
        serde_json::from_str(document).context(JsonSnafu)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DescriptorError> {
        let path = path.as_ref();
        let document = fs::read_to_string(path).context(ReadDescriptorSnafu { path })?;
        Self::from_json(&document)
    }

    /// Validates the descriptor and builds the immutable template.
    ///
    /// Relative file paths in the body are resolved against the current
    /// working directory.
    pub fn compile(self) -> Result<RequestTemplate, DescriptorError> {
        let method = parse_method(self.method.as_deref())?;
        let url = parse_url(self.url.as_deref())?;
        let media_type = parse_content_type(self.content_type.as_deref())?;
        let body = parse_body(media_type.as_ref(), self.body)?;
        let headers = parse_headers(self.headers.unwrap_or_default())?;
        let cookies = parse_cookies(self.cookies.unwrap_or_default())?;

        debug!(
            target: "http_pressure::template",
            %method,
            url = url.as_ref().map(Url::as_str),
            content_type = media_type.as_ref().map(ToString::to_string),
            headers = headers.len(),
            cookies = cookies.len(),
            body = body_kind(&body),
            "Compiled request descriptor"
        );

        Ok(RequestTemplate::from_parts(
            method, url, media_type, body, headers, cookies,
        ))
    }
}

fn parse_method(method: Option<&str>) -> Result<RequestMethod, DescriptorError> {
    let method = method.context(MissingMethodSnafu)?;
    method
        .parse()
        .map_err(|_| DescriptorError::UnknownMethod {
            method: method.to_string(),
        })
}

/// A missing url is accepted here and fails when the invocation is sent.
fn parse_url(url: Option<&str>) -> Result<Option<Url>, DescriptorError> {
    url.map(|url| Url::parse(url).context(InvalidUrlSnafu { url }))
        .transpose()
}

fn parse_content_type(content_type: Option<&str>) -> Result<Option<MediaType>, DescriptorError> {
    match content_type {
        None | Some("") => Ok(None),
        Some(content_type) => content_type
            .parse()
            .map(Some)
            .context(InvalidContentTypeSnafu { content_type }),
    }
}

fn parse_body(
    media_type: Option<&MediaType>,
    body: Option<Value>,
) -> Result<BodyVariant, DescriptorError> {
    if let Some(media_type) = media_type.filter(|media| media.is_multipart()) {
        return match body {
            None | Some(Value::Null) => Ok(BodyVariant::None),
            Some(Value::Array(parts)) => parse_multipart(parts),
            Some(_) => MultipartBodyNotArraySnafu {
                content_type: media_type.to_string(),
            }
            .fail(),
        };
    }

    let text = match body {
        None | Some(Value::Null) => return Ok(BodyVariant::None),
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
    };

    // The body value doubles as a file path: an existing regular file wins,
    // anything else is sent verbatim.
    match fs::canonicalize(&text) {
        Ok(path) if path.is_file() => Ok(BodyVariant::FileRef(path.into())),
        _ => Ok(BodyVariant::Inline(text.into())),
    }
}

fn parse_multipart(parts: Vec<Value>) -> Result<BodyVariant, DescriptorError> {
    if parts.is_empty() {
        return Ok(BodyVariant::None);
    }

    let parts = parts
        .into_iter()
        .enumerate()
        .map(|(index, part)| parse_part(index, part))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BodyVariant::Multipart(Arc::from(parts)))
}

fn parse_part(index: usize, part: Value) -> Result<MultipartPart, DescriptorError> {
    let part: PartDescriptor = serde_json::from_value(part).context(MalformedPartSnafu { index })?;
    let name = part.name.context(PartMissingNameSnafu { index })?;

    let content = match (part.text, part.file) {
        (Some(_), Some(_)) => return PartContentConflictSnafu { name }.fail(),
        (None, None) => return PartContentMissingSnafu { name }.fail(),
        (Some(text), None) => PartContent::Text(text.into()),
        (None, Some(file)) => match fs::canonicalize(&file) {
            Ok(path) if path.is_file() => PartContent::File(path.into()),
            _ => {
                return PartFileMissingSnafu {
                    name,
                    path: PathBuf::from(file),
                }
                .fail();
            }
        },
    };

    if let Some(content_type) = part.content_type.as_deref() {
        content_type
            .parse::<MediaType>()
            .context(InvalidPartContentTypeSnafu {
                name: name.as_str(),
                content_type,
            })?;
    }

    Ok(MultipartPart::new(
        &name,
        content,
        part.content_type.as_deref(),
    ))
}

fn parse_headers(headers: Vec<NameValue>) -> Result<Vec<Header>, DescriptorError> {
    headers
        .into_iter()
        .map(|NameValue { name, value }| {
            if let Err(e) = http::HeaderName::from_bytes(name.as_bytes()) {
                return InvalidHeaderSnafu {
                    name,
                    details: e.to_string(),
                }
                .fail();
            }
            if let Err(e) = http::HeaderValue::from_str(&value) {
                return InvalidHeaderSnafu {
                    name,
                    details: e.to_string(),
                }
                .fail();
            }
            Ok(Header { name, value })
        })
        .collect()
}

fn parse_cookies(cookies: Vec<NameValue>) -> Result<Vec<Cookie>, DescriptorError> {
    cookies
        .into_iter()
        .map(|NameValue { name, value }| {
            if name.is_empty() || name.contains(['=', ';']) {
                return InvalidCookieSnafu {
                    name,
                    details: "name must be non-empty and contain neither '=' nor ';'",
                }
                .fail();
            }
            if value.contains(';') || http::HeaderValue::from_str(&value).is_err() {
                return InvalidCookieSnafu {
                    name,
                    details: "value must be a valid header value without ';'",
                }
                .fail();
            }
            Ok(Cookie { name, value })
        })
        .collect()
}

fn body_kind(body: &BodyVariant) -> &'static str {
    match body {
        BodyVariant::None => "none",
        BodyVariant::Inline(_) => "inline",
        BodyVariant::FileRef(_) => "file",
        BodyVariant::Multipart(_) => "multipart",
    }
}
