//! Shareable link rendering and file classification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg", "ico"];
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "json", "xml", "html", "css", "js", "ts", "log", "csv",
];
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "doc", "docx", "ppt", "pptx", "xls", "xlsx", "pdf", "odt", "ods", "odp",
];
const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "rar", "7z", "tar", "gz", "bz2", "iso"];
const FALLBACK_IMAGE_EXTENSION: &str = "png";

/// Markup used when copying links for uploaded objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkFormat {
    #[default]
    Markdown,
    Html,
    Url,
    Ubb,
    Custom,
}

impl LinkFormat {
    pub const ALL: [Self; 5] = [
        Self::Markdown,
        Self::Html,
        Self::Url,
        Self::Ubb,
        Self::Custom,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Url => "url",
            Self::Ubb => "ubb",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for LinkFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Unknown link format '{wanted}' (expected markdown, html, url, ubb or custom)"
                ))
            })
    }
}

/// Coarse file category derived from the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Text,
    Document,
    Archive,
    Other,
}

impl FileKind {
    pub fn of(file_name: &str) -> Self {
        let Some(extension) = extension_of(file_name) else {
            return Self::Other;
        };
        let extension = extension.as_str();
        if IMAGE_EXTENSIONS.contains(&extension) {
            Self::Image
        } else if TEXT_EXTENSIONS.contains(&extension) {
            Self::Text
        } else if DOCUMENT_EXTENSIONS.contains(&extension) {
            Self::Document
        } else if ARCHIVE_EXTENSIONS.contains(&extension) {
            Self::Archive
        } else {
            Self::Other
        }
    }
}

/// Lowercased extension without the dot.
pub fn extension_of(file_name: &str) -> Option<String> {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let (stem, extension) = base.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

/// File extension for an `image/*` content type; `None` for anything else.
///
/// `image/svg+xml` maps to `svg`; a bare `image/` maps to `png`.
pub fn image_extension(content_type: &str) -> Option<&str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    let subtype = essence
        .get(..6)
        .filter(|head| head.eq_ignore_ascii_case("image/"))
        .map(|_| &essence[6..])?;
    let subtype = subtype.split('+').next().unwrap_or_default().trim();
    Some(if subtype.is_empty() {
        FALLBACK_IMAGE_EXTENSION
    } else {
        subtype
    })
}

/// Render one uploaded object as text in the chosen format.
///
/// `custom_template` is only consulted for [`LinkFormat::Custom`]; its first
/// `$fileName` and first `$url` placeholders are substituted.
pub fn format_link(format: LinkFormat, file_name: &str, url: &str, custom_template: &str) -> String {
    let is_image = FileKind::of(file_name) == FileKind::Image;
    match format {
        LinkFormat::Markdown if is_image => format!("![{file_name}]({url})"),
        LinkFormat::Markdown => format!("[{file_name}]({url})"),
        LinkFormat::Html if is_image => format!("<img src=\"{url}\" alt=\"{file_name}\" />"),
        LinkFormat::Html => format!("<a href=\"{url}\">{file_name}</a>"),
        LinkFormat::Ubb if is_image => format!("[img]{url}[/img]"),
        LinkFormat::Ubb => format!("[url={url}]{file_name}[/url]"),
        LinkFormat::Url => url.to_string(),
        LinkFormat::Custom => custom_template
            .replacen("$fileName", file_name, 1)
            .replacen("$url", url, 1),
    }
}
