use std::{path::Path, sync::Arc};

/// Request body of a template.
///
/// Contents are reference counted so that every invocation can carry the
/// body without copying it. File-backed variants hold an absolute path that
/// existed when the template was built; the file is opened again for every
/// send and is never read into memory here.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum BodyVariant {
    #[default]
    None,
    Inline(Arc<str>),
    FileRef(Arc<Path>),
    Multipart(Arc<[MultipartPart]>),
}

impl BodyVariant {
    pub const fn is_none(&self) -> bool {
        matches!(self, BodyVariant::None)
    }

    pub const fn is_multipart(&self) -> bool {
        matches!(self, BodyVariant::Multipart(_))
    }
}

/// One named part of a multipart body.
#[derive(Clone, Debug, PartialEq)]
pub struct MultipartPart {
    name: Arc<str>,
    content: PartContent,
    content_type: Option<Arc<str>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PartContent {
    Text(Arc<str>),
    File(Arc<Path>),
}

impl MultipartPart {
    pub(crate) fn new(name: &str, content: PartContent, content_type: Option<&str>) -> Self {
        Self {
            name: name.into(),
            content,
            content_type: content_type.map(Into::into),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &PartContent {
        &self.content
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// File name sent in the part's `Content-Disposition`.
    pub fn file_name(&self) -> Option<String> {
        match &self.content {
            PartContent::File(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            PartContent::Text(_) => None,
        }
    }
}
