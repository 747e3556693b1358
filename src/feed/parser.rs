use feed_rs::model::Feed;
use feed_rs::parser::{self, ParseFeedError};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

use crate::feed::RawEntry;
use crate::util::strip_invalid_xml_chars;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Child elements carrying an entry date, highest priority first.
/// Matched on local name, so `dc:date` is `date`.
const DATE_ELEMENTS: [&[u8]; 6] = [
    b"pubDate",
    b"published",
    b"date",
    b"issued",
    b"updated",
    b"modified",
];

/// HTML named entities that show up in hand-rolled feeds, as numeric references.
const HTML_ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", "&#160;"),
    ("&ndash;", "&#8211;"),
    ("&mdash;", "&#8212;"),
    ("&lsquo;", "&#8216;"),
    ("&rsquo;", "&#8217;"),
    ("&ldquo;", "&#8220;"),
    ("&rdquo;", "&#8221;"),
    ("&hellip;", "&#8230;"),
    ("&laquo;", "&#171;"),
    ("&raquo;", "&#187;"),
    ("&copy;", "&#169;"),
    ("&reg;", "&#174;"),
    ("&trade;", "&#8482;"),
    ("&middot;", "&#183;"),
    ("&bull;", "&#8226;"),
    ("&eacute;", "&#233;"),
    ("&egrave;", "&#232;"),
    ("&aacute;", "&#225;"),
    ("&ouml;", "&#246;"),
    ("&uuml;", "&#252;"),
    ("&auml;", "&#228;"),
];

#[derive(Debug, Error)]
pub enum ParseError {
    /// Neither the document nor its repaired form is a recognizable feed.
    #[error("{0}")]
    Feed(#[from] ParseFeedError),
}

/// Entries extracted from a feed document.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub entries: Vec<RawEntry>,
    /// The document failed strict XML checks; entries come from a lenient parse.
    pub malformed: bool,
}

/// Parses an RSS, Atom or JSON Feed document into raw entries.
///
/// The bytes are first inspected for XML well-formedness. A document that
/// fails inspection is still used: `feed-rs` gets the original bytes, then
/// a repaired copy, and whatever parses is returned with `malformed` set.
/// Only a document that yields no feed at all is an error.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, ParseError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let inspection = inspect(bytes);
    let malformed = !inspection.well_formed;

    let (feed, entry_dates) = match parser::parse(bytes) {
        Ok(feed) => (feed, inspection.entry_dates),
        Err(err) if !malformed => return Err(ParseError::Feed(err)),
        Err(err) => {
            tracing::debug!(error = %err, "Strict parse failed, retrying with repaired document");
            let (feed, recovered) = recover(bytes).ok_or(ParseError::Feed(err))?;
            (feed, inspect(recovered.as_bytes()).entry_dates)
        }
    };

    let entry_count = feed.entries.len();
    let mut dates = match entry_dates {
        Some(dates) if dates.len() == entry_count => dates,
        Some(dates) => {
            tracing::debug!(
                inspected = dates.len(),
                parsed = entry_count,
                "Entry count mismatch, raw date text not attached"
            );
            vec![None; entry_count]
        }
        None => vec![None; entry_count],
    }
    .into_iter();

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| raw_entry(entry, dates.next().flatten()))
        .collect();

    Ok(ParsedFeed { entries, malformed })
}

fn raw_entry(entry: feed_rs::model::Entry, published_text: Option<String>) -> RawEntry {
    let link = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| entry.links.first())
        .map(|l| l.href.clone());
    let summary = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body));
    let id = if entry.id.trim().is_empty() {
        None
    } else {
        Some(entry.id)
    };

    RawEntry {
        id,
        title: entry.title.map(|t| t.content),
        link,
        summary,
        published: entry.published.or(entry.updated),
        published_text,
    }
}

// ============================================================================
// Well-formedness inspection
// ============================================================================

struct Inspection {
    well_formed: bool,
    /// Raw date text per `<item>`/`<entry>`, in document order. `None` when
    /// the document is not XML at all (JSON Feed).
    entry_dates: Option<Vec<Option<String>>>,
}

/// Date candidates collected while inside one entry element.
struct EntryScan {
    depth: usize,
    child: Option<usize>,
    text: String,
    found: [Option<String>; DATE_ELEMENTS.len()],
}

impl EntryScan {
    fn new(depth: usize) -> Self {
        Self {
            depth,
            child: None,
            text: String::new(),
            found: Default::default(),
        }
    }

    fn open_child(&mut self, local_name: &[u8]) {
        self.child = DATE_ELEMENTS.iter().position(|name| *name == local_name);
        self.text.clear();
    }

    fn push_text(&mut self, text: &str) {
        if self.child.is_some() {
            self.text.push_str(text);
        }
    }

    fn close_child(&mut self) {
        if let Some(index) = self.child.take() {
            let value = self.text.trim();
            if self.found[index].is_none() && !value.is_empty() {
                self.found[index] = Some(value.to_string());
            }
        }
        self.text.clear();
    }

    fn finish(self) -> Option<String> {
        self.found.into_iter().flatten().next()
    }
}

fn is_entry_element(local_name: &[u8]) -> bool {
    matches!(local_name, b"item" | b"entry")
}

/// Strict XML pass: matching tags, a single root, no stray text outside it,
/// only resolvable entity references. Collects entry date text on the way.
fn inspect(bytes: &[u8]) -> Inspection {
    if bytes.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{') {
        return Inspection {
            well_formed: true,
            entry_dates: None,
        };
    }

    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut depth: usize = 0;
    let mut roots: usize = 0;
    let mut dates = Vec::new();
    let mut current: Option<EntryScan> = None;

    let well_formed = loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(
                    position = reader.buffer_position(),
                    error = %e,
                    "Feed document is not well-formed"
                );
                break false;
            }
        };

        match event {
            Event::Start(e) => {
                if depth == 0 {
                    roots += 1;
                }
                if roots > 1 || !attributes_ok(&e, &reader) {
                    break false;
                }
                depth += 1;
                let local_name = e.local_name();
                if let Some(scan) = current.as_mut() {
                    if depth == scan.depth + 1 {
                        scan.open_child(local_name.as_ref());
                    }
                } else if is_entry_element(local_name.as_ref()) {
                    current = Some(EntryScan::new(depth));
                }
            }
            Event::Empty(e) => {
                if depth == 0 {
                    roots += 1;
                }
                if roots > 1 || !attributes_ok(&e, &reader) {
                    break false;
                }
                if current.is_none() && is_entry_element(e.local_name().as_ref()) {
                    dates.push(None);
                }
            }
            Event::End(_) => {
                let closes_entry = current.as_ref().is_some_and(|scan| depth == scan.depth);
                if closes_entry {
                    dates.push(current.take().and_then(EntryScan::finish));
                } else if let Some(scan) = current.as_mut() {
                    if depth == scan.depth + 1 {
                        scan.close_child();
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Text(e) => {
                let text = match e.unescape() {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::debug!(error = %err, "Unresolvable text in feed document");
                        break false;
                    }
                };
                if depth == 0 {
                    if !text.trim().is_empty() {
                        break false;
                    }
                } else if let Some(scan) = current.as_mut() {
                    scan.push_text(&text);
                }
            }
            Event::CData(e) => {
                if depth == 0 {
                    break false;
                }
                if let Some(scan) = current.as_mut() {
                    scan.push_text(&String::from_utf8_lossy(&e));
                }
            }
            Event::Eof => break depth == 0 && roots == 1,
            _ => {}
        }
        buf.clear();
    };

    Inspection {
        well_formed,
        entry_dates: Some(dates),
    }
}

fn attributes_ok(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> bool {
    e.attributes().all(|attr| match attr {
        Ok(attr) => attr.decode_and_unescape_value(reader.decoder()).is_ok(),
        Err(_) => false,
    })
}

// ============================================================================
// Repair
// ============================================================================

/// Repairs a malformed document until `feed-rs` accepts it: character-level
/// fixes first, then tag rebalancing. Returns the feed and the text it came from.
fn recover(bytes: &[u8]) -> Option<(Feed, String)> {
    let repaired = repair(bytes);
    if let Ok(feed) = parser::parse(repaired.as_bytes()) {
        return Some((feed, repaired));
    }

    let balanced = rebalance(&repaired)?;
    match parser::parse(balanced.as_bytes()) {
        Ok(feed) => {
            tracing::debug!("Recovered feed after rebalancing tags");
            Some((feed, balanced))
        }
        Err(e) => {
            tracing::debug!(error = %e, "Rebalanced document is still not a feed");
            None
        }
    }
}

/// Best-effort cleanup of a document that failed strict parsing.
fn repair(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{FEFF}');
    // Leading junk before the prolog or root element
    let start = text.find('<').unwrap_or(0);

    let mut repaired = text[start..].to_string();
    for (entity, numeric) in HTML_ENTITIES {
        repaired = repaired.replace(entity, numeric);
    }
    let repaired = escape_bare_ampersands(&repaired);
    strip_invalid_xml_chars(&repaired).into_owned()
}

fn escape_bare_ampersands(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        if c == '&' && !starts_with_reference(&text[i + 1..]) {
            out.push_str("&amp;");
        } else {
            out.push(c);
        }
    }
    out
}

/// Whether `rest` (the text after an `&`) begins a reference XML can resolve.
fn starts_with_reference(rest: &str) -> bool {
    let Some(end) = rest.find(';').filter(|&end| end <= 10) else {
        return false;
    };
    let name = &rest[..end];
    match name.strip_prefix('#') {
        Some(number) => match number.strip_prefix(['x', 'X']) {
            Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
            None => !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()),
        },
        None => matches!(name, "amp" | "lt" | "gt" | "quot" | "apos"),
    }
}

/// HTML void elements that appear unclosed inside feed markup. `link` and
/// `source` are feed elements with content, so they are not listed.
const VOID_ELEMENTS: &[&str] = &[
    "br", "hr", "img", "input", "meta", "wbr", "area", "col", "embed", "param", "track",
];

fn is_void_element(name: &[u8]) -> bool {
    !name.contains(&b':')
        && VOID_ELEMENTS
            .iter()
            .any(|void| void.as_bytes().eq_ignore_ascii_case(name))
}

/// Rewrites a document so every element is closed and properly nested.
///
/// - HTML void tags (`<br>`) become empty elements
/// - an end tag closes every element opened after its match
/// - end tags with no open match are dropped
/// - the document ends where the root element closes, or where reading
///   fails; anything still open is closed there
///
/// Doctypes, comments and processing instructions are dropped.
fn rebalance(text: &str) -> Option<String> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().check_end_names = false;
    reader.config_mut().allow_unmatched_ends = true;

    let mut writer = Writer::new(Vec::with_capacity(text.len()));
    let mut open: Vec<Vec<u8>> = Vec::new();
    let mut started = false;

    loop {
        let event = match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(
                    position = reader.buffer_position(),
                    error = %e,
                    "Stopped reading broken document, closing open elements"
                );
                break;
            }
        };

        match event {
            Event::Decl(decl) if !started => writer.write_event(Event::Decl(decl)).ok()?,
            Event::Start(e) => {
                started = true;
                let start = clean_start(&e);
                if is_void_element(e.name().as_ref()) {
                    writer.write_event(Event::Empty(start)).ok()?;
                } else {
                    open.push(e.name().as_ref().to_vec());
                    writer.write_event(Event::Start(start)).ok()?;
                }
            }
            Event::Empty(e) => {
                started = true;
                writer.write_event(Event::Empty(clean_start(&e))).ok()?;
            }
            Event::End(e) => {
                let Some(index) = open.iter().rposition(|name| name == e.name().as_ref()) else {
                    continue;
                };
                for name in open.drain(index..).rev() {
                    writer
                        .write_event(Event::End(BytesEnd::new(String::from_utf8_lossy(&name))))
                        .ok()?;
                }
                if open.is_empty() {
                    break;
                }
            }
            Event::Text(t) if !open.is_empty() => writer.write_event(Event::Text(t)).ok()?,
            Event::CData(c) if !open.is_empty() => writer.write_event(Event::CData(c)).ok()?,
            _ => {}
        }
    }

    for name in open.into_iter().rev() {
        writer
            .write_event(Event::End(BytesEnd::new(String::from_utf8_lossy(&name))))
            .ok()?;
    }

    String::from_utf8(writer.into_inner()).ok()
}

/// Copy of a start tag keeping only attributes that serialize cleanly.
/// HTML-style attributes (unquoted or bare) are accepted and re-quoted.
fn clean_start(e: &BytesStart<'_>) -> BytesStart<'static> {
    let mut start = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.html_attributes().flatten() {
        if !attr.value.iter().any(|b| matches!(b, b'"' | b'<')) {
            start.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
        }
    }
    start
}
