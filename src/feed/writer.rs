use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::feed::NormalizedEntry;
use crate::util::{format_rfc822, strip_invalid_xml_chars};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to render RSS document: {0}")]
    Render(String),

    #[error("Failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Channel-level metadata for the combined feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub title: String,
    pub link: Option<String>,
    pub description: Option<String>,
}

impl ChannelInfo {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: None,
            description: None,
        }
    }
}

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn emit(writer: &mut XmlWriter, event: Event<'_>) -> Result<(), OutputError> {
    writer
        .write_event(event)
        .map_err(|e| OutputError::Render(e.to_string()))
}

fn text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<(), OutputError> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(
        writer,
        Event::Text(BytesText::new(&strip_invalid_xml_chars(text))),
    )?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

/// Renders entries as an indented RSS 2.0 document, in the order given.
///
/// ```text
/// <rss version="2.0">
///   <channel>
///     <title>..</title>
///     <item><title/><link/><description/><pubDate/></item> ...
///   </channel>
/// </rss>
/// ```
pub fn render_rss(channel: &ChannelInfo, entries: &[NormalizedEntry]) -> Result<Vec<u8>, OutputError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    emit(&mut writer, Event::Start(rss))?;
    emit(&mut writer, Event::Start(BytesStart::new("channel")))?;

    text_element(&mut writer, "title", &channel.title)?;
    if let Some(link) = &channel.link {
        text_element(&mut writer, "link", link)?;
    }
    if let Some(description) = &channel.description {
        text_element(&mut writer, "description", description)?;
    }

    for entry in entries {
        emit(&mut writer, Event::Start(BytesStart::new("item")))?;
        text_element(&mut writer, "title", &entry.title)?;
        text_element(&mut writer, "link", &entry.link)?;
        text_element(&mut writer, "description", &entry.summary)?;
        text_element(&mut writer, "pubDate", &format_rfc822(&entry.published_at))?;
        emit(&mut writer, Event::End(BytesEnd::new("item")))?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("channel")))?;
    emit(&mut writer, Event::End(BytesEnd::new("rss")))?;

    let mut bytes = writer.into_inner().into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

/// Renders the feed and writes it to `path` atomically.
///
/// Writes to a temporary file in the same directory, syncs to disk, then
/// renames over the destination, so readers never see a partial document.
pub fn write_feed(
    path: &Path,
    channel: &ChannelInfo,
    entries: &[NormalizedEntry],
) -> Result<(), OutputError> {
    let content = render_rss(channel, entries)?;
    write_atomic(path, &content)
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<(), OutputError> {
    use std::time::{SystemTime, UNIX_EPOCH};

    let io_error = |source: std::io::Error| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };

    // Unique per process and instant; `create_new` refuses an existing file
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{}.{:x}", std::process::id(), stamp));

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .map_err(io_error)?;

    let written = file.write_all(content).and_then(|()| file.sync_all());
    drop(file);

    if let Err(e) = written.and_then(|()| std::fs::rename(&temp_path, path)) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(io_error(e));
    }

    Ok(())
}
