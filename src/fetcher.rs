use std::borrow::Cow;

use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info};

pub const USER_AGENT: &str = "gator";

#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection failure, non-success status, or unreadable body
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Body is not a feed document we can decode
    #[error("could not parse feed: {0}")]
    Parse(String),
}

/// Channel of a fetched feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RssFeed {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<RssItem>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RssItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Kept verbatim; feeds disagree on date formats.
    pub pub_date: Option<String>,
    pub guid: Option<String>,
}

/// Resolves HTML entities (named and numeric). Anything that is not a known
/// entity, such as the bare `&` in `AT&T`, is copied through unchanged, so
/// running this on already-unescaped text changes nothing.
pub fn unescape_html(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '#'))
            .filter(|&end| after[end..].starts_with(';'));
        match name_len.and_then(|end| resolve_entity(&after[..end]).map(|r| (end, r))) {
            Some((end, resolved)) => {
                out.push_str(&resolved);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// `name` is the part between `&` and `;`.
fn resolve_entity(name: &str) -> Option<Cow<'static, str>> {
    let Some(number) = name.strip_prefix('#') else {
        return resolve_html5_entity(name).map(Cow::Borrowed);
    };

    let hex = number.strip_prefix('x').or_else(|| number.strip_prefix('X'));
    let code = match hex {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => number.parse::<u32>().ok()?,
    };
    char::from_u32(code).map(|c| Cow::Owned(c.to_string()))
}

impl RssItem {
    /// Key used to recognise the same item across fetches.
    pub fn key(&self) -> &str {
        match self.guid.as_deref() {
            Some(guid) => guid,
            None if !self.link.is_empty() => self.link.as_str(),
            None => self.title.as_str(),
        }
    }

    pub fn unescape_html(&mut self) {
        self.title = unescape_html(&self.title).into_owned();
        self.description = unescape_html(&self.description).into_owned();
    }
}

impl RssFeed {
    pub fn unescape_items(&mut self) {
        for item in &mut self.items {
            item.unescape_html();
        }
    }
}

impl From<feed_rs::model::Feed> for RssFeed {
    fn from(feed: feed_rs::model::Feed) -> Self {
        let items = feed
            .entries
            .into_iter()
            .map(|entry| RssItem {
                title: entry.title.map(|t| t.content).unwrap_or_default(),
                link: entry
                    .links
                    .first()
                    .map(|l| l.href.clone())
                    .unwrap_or_default(),
                description: entry
                    .summary
                    .map(|s| s.content)
                    .or_else(|| entry.content.and_then(|c| c.body))
                    .unwrap_or_default(),
                pub_date: entry.published.or(entry.updated).map(|dt| dt.to_rfc2822()),
                guid: (!entry.id.is_empty()).then_some(entry.id),
            })
            .collect();

        Self {
            title: feed.title.map(|t| t.content).unwrap_or_default(),
            link: feed
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default(),
            description: feed.description.map(|d| d.content).unwrap_or_default(),
            items,
        }
    }
}

const ROOT: &[&[u8]] = &[b"rss"];
const CHANNEL: &[&[u8]] = &[b"rss", b"channel"];
const ITEM: &[&[u8]] = &[b"rss", b"channel", b"item"];

fn path_is(path: &[Vec<u8>], expected: &[&[u8]]) -> bool {
    path.len() == expected.len() && path.iter().zip(expected).all(|(a, b)| a.as_slice() == *b)
}

/// Text-bearing child of `<channel>` or `<item>`.
#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    Description,
    PubDate,
    Guid,
}

impl Field {
    /// Matches on the qualified name, so `<atom:link>` is never taken for `<link>`.
    fn of_channel(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" => Some(Field::Description),
            _ => None,
        }
    }

    fn of_item(name: &[u8]) -> Option<Self> {
        match name {
            b"pubDate" => Some(Field::PubDate),
            b"guid" => Some(Field::Guid),
            other => Self::of_channel(other),
        }
    }

    fn set_on_channel(self, feed: &mut RssFeed, value: String) {
        match self {
            Field::Title => feed.title = value,
            Field::Link if feed.link.is_empty() => feed.link = value,
            Field::Description => feed.description = value,
            _ => {}
        }
    }

    fn set_on_item(self, item: &mut RssItem, value: String) {
        match self {
            Field::Title => item.title = value,
            Field::Link => item.link = value,
            Field::Description => item.description = value,
            Field::PubDate => item.pub_date = Some(value).filter(|v| !v.is_empty()),
            Field::Guid => item.guid = Some(value).filter(|v| !v.is_empty()),
        }
    }
}

/// Reads an RSS 2.0 document. Any other root element is an error so the
/// caller can try another format.
fn decode_rss(bytes: &[u8]) -> Result<RssFeed, String> {
    let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
    let mut reader = Reader::from_str(text.trim_start_matches('\u{feff}'));

    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut channel: Option<RssFeed> = None;
    let mut item: Option<RssItem> = None;
    // The field being read and the depth of its element.
    let mut field: Option<(Field, usize)> = None;
    let mut value = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                if path.is_empty() && name.as_slice() != b"rss" {
                    return Err(format!(
                        "root element is <{}>, not <rss>",
                        String::from_utf8_lossy(&name)
                    ));
                }

                let child_of = if path_is(&path, ROOT) && name.as_slice() == b"channel" {
                    channel.get_or_insert_with(RssFeed::default);
                    None
                } else if path_is(&path, CHANNEL) && name.as_slice() == b"item" {
                    item = Some(RssItem::default());
                    None
                } else if path_is(&path, CHANNEL) {
                    Field::of_channel(&name)
                } else if path_is(&path, ITEM) {
                    Field::of_item(&name)
                } else {
                    None
                };

                path.push(name);
                if let Some(f) = child_of {
                    field = Some((f, path.len()));
                    value.clear();
                }
            }
            Ok(Event::Text(e)) => {
                if matches!(field, Some((_, depth)) if depth == path.len()) {
                    let raw = std::str::from_utf8(&e).map_err(|e| e.to_string())?;
                    value.push_str(&unescape_html(raw));
                }
            }
            Ok(Event::CData(e)) => {
                if matches!(field, Some((_, depth)) if depth == path.len()) {
                    value.push_str(std::str::from_utf8(&e).map_err(|e| e.to_string())?);
                }
            }
            Ok(Event::End(_)) => {
                if let Some((f, depth)) = field {
                    if depth == path.len() {
                        let text = value.trim().to_string();
                        match (item.as_mut(), channel.as_mut()) {
                            (Some(item), _) if depth == ITEM.len() + 1 => f.set_on_item(item, text),
                            (_, Some(feed)) if depth == CHANNEL.len() + 1 => {
                                f.set_on_channel(feed, text)
                            }
                            _ => {}
                        }
                        field = None;
                    }
                }

                if path_is(&path, ITEM) {
                    if let (Some(done), Some(feed)) = (item.take(), channel.as_mut()) {
                        feed.items.push(done);
                    }
                }
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
    }

    channel.ok_or_else(|| "no <channel> element".to_string())
}

/// Decodes a feed body and unescapes every item's title and description.
///
/// RSS 2.0 is read directly so that `pubDate` survives untouched; anything else
/// (Atom, RSS 1.0, JSON Feed) goes through `feed_rs`.
pub fn parse_feed(bytes: &[u8]) -> Result<RssFeed, FetchError> {
    let mut feed = match decode_rss(bytes) {
        Ok(feed) => feed,
        Err(rss_err) => {
            debug!("Not an RSS 2.0 document ({}), trying other formats", rss_err);
            feed_rs::parser::parse(bytes)
                .map(RssFeed::from)
                .map_err(|e| FetchError::Parse(format!("{rss_err}; {e}")))?
        }
    };

    feed.unescape_items();
    Ok(feed)
}

pub struct FeedClient {
    client: Client,
}

impl FeedClient {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }

    /// One GET, no retries.
    pub async fn fetch(&self, url: &str) -> Result<RssFeed, FetchError> {
        info!("Fetching feed: {}", url);

        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        let feed = parse_feed(&bytes)?;

        info!("Parsed {} items from '{}'", feed.items.len(), url);
        Ok(feed)
    }
}
