//! Sitemap XML decoding.
//!
//! Handles both document kinds defined by the sitemaps protocol:
//!
//! - **Sitemap index**: `<sitemapindex>` with `<sitemap><loc>` entries pointing
//!   at child sitemaps
//! - **URL set**: `<urlset>` with `<url><loc>` entries pointing at pages
//!
//! Some sites mix both kinds in one document, so entries are classified
//! individually rather than by root element.

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::warn;

/// One `<loc>`-bearing entry from a sitemap document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapEntry {
    /// Points at another sitemap document.
    Index(String),
    /// Points at a candidate page.
    Leaf(String),
}

impl SitemapEntry {
    pub fn location(&self) -> &str {
        match self {
            SitemapEntry::Index(loc) | SitemapEntry::Leaf(loc) => loc,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Index,
    Leaf,
}

/// Parse a sitemap document into its entries, in document order.
///
/// Entries without a `<loc>` are skipped. Malformed XML yields an empty list.
pub fn parse_sitemap(xml: &str) -> Vec<SitemapEntry> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut buf = Vec::new();

    let mut current_kind: Option<EntryKind> = None;
    let mut current_loc: Option<String> = None;
    let mut entry_depth = 0usize;
    let mut depth = 0usize;
    let mut in_loc = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                match e.local_name().as_ref() {
                    b"sitemap" => {
                        current_kind = Some(EntryKind::Index);
                        current_loc = None;
                        entry_depth = depth;
                    }
                    b"url" => {
                        current_kind = Some(EntryKind::Leaf);
                        current_loc = None;
                        entry_depth = depth;
                    }
                    // Only the entry's own <loc>, not e.g. <image:loc>
                    b"loc" if current_kind.is_some() && depth == entry_depth + 1 => {
                        in_loc = true;
                    }
                    _ => {}
                }
                depth += 1;
            }
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                match e.local_name().as_ref() {
                    b"sitemap" | b"url" if depth == entry_depth => {
                        if let (Some(kind), Some(loc)) = (current_kind.take(), current_loc.take())
                            && !loc.is_empty()
                        {
                            entries.push(match kind {
                                EntryKind::Index => SitemapEntry::Index(loc),
                                EntryKind::Leaf => SitemapEntry::Leaf(loc),
                            });
                        }
                    }
                    b"loc" => in_loc = false,
                    _ => {}
                }
            }
            Ok(Event::Text(e)) if in_loc => match e.unescape() {
                Ok(text) => append_loc(&mut current_loc, &text),
                Err(e) => {
                    warn!("Malformed sitemap XML: {}", e);
                    return Vec::new();
                }
            },
            Ok(Event::CData(e)) if in_loc => {
                append_loc(&mut current_loc, &String::from_utf8_lossy(&e));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(
                    "Malformed sitemap XML at position {}: {}",
                    reader.buffer_position(),
                    e
                );
                return Vec::new();
            }
            _ => {}
        }
        buf.clear();
    }

    entries
}

fn append_loc(current: &mut Option<String>, text: &str) {
    current.get_or_insert_with(String::new).push_str(text.trim());
}
