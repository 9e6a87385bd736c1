//! Reader mode: cached readability results rendered as a locked-down
//! internal page.

pub mod cache;
pub mod handler;
pub mod render;
pub mod style;

pub use cache::{cache_key, DiskReaderModeCache, MemoryReaderModeCache, ReaderModeCache};
pub use handler::ReaderModeHandler;
pub use render::generate_reader_content;
pub use style::{ReaderModeFontSize, ReaderModeFontType, ReaderModeStyle, ReaderModeTheme};

use serde::{Deserialize, Serialize};

/// Article extracted from a page, as stored in the reader cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadabilityResult {
    pub title: String,
    pub byline: String,
    /// Cleaned article HTML
    pub content: String,
    pub excerpt: String,
    /// Text direction, `ltr` or `rtl`
    pub dir: String,
    /// Page the article came from
    pub url: String,
}
