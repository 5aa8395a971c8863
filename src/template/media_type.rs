use std::{fmt, str::FromStr};

use mime::Mime;

/// A declared content type. Absence (`Option::None` at the use site) means
/// the descriptor did not declare one.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaType(Mime);

impl MediaType {
    /// Primary type, e.g. `multipart` for `multipart/form-data`.
    pub fn primary_type(&self) -> &str {
        self.0.type_().as_str()
    }

    pub fn subtype(&self) -> &str {
        self.0.subtype().as_str()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.0.get_param(name).map(|value| value.as_str())
    }

    pub fn is_multipart(&self) -> bool {
        self.0.type_() == mime::MULTIPART
    }

    pub fn as_mime(&self) -> &Mime {
        &self.0
    }
}

impl FromStr for MediaType {
    type Err = mime::FromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Mime>().map(MediaType)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
