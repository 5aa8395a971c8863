use std::{fmt, str::FromStr};

use snafu::Snafu;

/// The closed set of request methods a descriptor may declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Patch,
    Trace,
    Options,
}

#[derive(Debug, Snafu)]
#[snafu(display("Unrecognized request method '{}'", method))]
pub struct UnknownMethod {
    pub method: String,
}

impl RequestMethod {
    pub const ALL: [RequestMethod; 8] = [
        RequestMethod::Get,
        RequestMethod::Post,
        RequestMethod::Put,
        RequestMethod::Delete,
        RequestMethod::Head,
        RequestMethod::Patch,
        RequestMethod::Trace,
        RequestMethod::Options,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
            RequestMethod::Put => "PUT",
            RequestMethod::Delete => "DELETE",
            RequestMethod::Head => "HEAD",
            RequestMethod::Patch => "PATCH",
            RequestMethod::Trace => "TRACE",
            RequestMethod::Options => "OPTIONS",
        }
    }
}

impl FromStr for RequestMethod {
    type Err = UnknownMethod;

    /// Case-insensitive; surrounding whitespace is not trimmed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestMethod::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownMethod {
                method: s.to_string(),
            })
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RequestMethod> for http::Method {
    fn from(method: RequestMethod) -> Self {
        match method {
            RequestMethod::Get => http::Method::GET,
            RequestMethod::Post => http::Method::POST,
            RequestMethod::Put => http::Method::PUT,
            RequestMethod::Delete => http::Method::DELETE,
            RequestMethod::Head => http::Method::HEAD,
            RequestMethod::Patch => http::Method::PATCH,
            RequestMethod::Trace => http::Method::TRACE,
            RequestMethod::Options => http::Method::OPTIONS,
        }
    }
}
