use tracing::{debug, warn};

use crate::domain::{
    Enclosure, FeedDialect, FeedDocument, MediaContent, RawEntry, UNTITLED_FEED,
};
use crate::errors::ParseError;
use crate::pipeline::xml_tree::{self, XmlElement};

/// Elements that hold one feed entry; they never nest.
const ENTRY_ELEMENTS: &[&str] = &["item", "entry"];

/// Turns raw feed text into a `FeedDocument`. Holds no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, raw_text: &str, source_url: &str) -> Result<FeedDocument, ParseError> {
        let raw_text = raw_text.trim_start_matches('\u{feff}');
        if raw_text.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let parsed = xml_tree::parse_lenient(raw_text, ENTRY_ELEMENTS);
        let root = match (parsed.root, parsed.error) {
            (Some(root), error) => {
                if let Some(error) = error {
                    warn!(url = source_url, %error, "feed XML is malformed, keeping what was read");
                }
                root
            }
            (None, Some(error)) => return Err(ParseError::Malformed(error)),
            (None, None) => return Err(ParseError::Malformed("no elements found".to_string())),
        };

        let document = match root.local_name().to_ascii_lowercase().as_str() {
            "rss" => {
                let channel = root.child("channel").ok_or(ParseError::MissingChannel)?;
                Self::from_channel(FeedDialect::Rss, channel, channel, source_url)
            }
            "rdf" => {
                let channel = root.child("channel");
                let metadata = channel.unwrap_or(&root);
                Self::from_channel(FeedDialect::Rdf, metadata, &root, source_url)
            }
            "feed" => Self::from_atom(&root, source_url),
            _ => return Err(ParseError::UnrecognizedRoot(root.name.clone())),
        };

        debug!(
            url = source_url,
            dialect = %document.dialect,
            entries = document.entries.len(),
            skipped = document.skipped_entries,
            "normalized feed"
        );

        Ok(document)
    }

    /// RSS 2.0 and RDF. For RDF, items are siblings of the channel, so the
    /// item container is passed separately.
    fn from_channel(
        dialect: FeedDialect,
        channel: &XmlElement,
        item_container: &XmlElement,
        source_url: &str,
    ) -> FeedDocument {
        let image_url = channel
            .child("image")
            .and_then(|image| image.child_text("url"))
            .or_else(|| item_container.child("image").and_then(|image| image.child_text("url")))
            .or_else(|| itunes_image(channel))
            .or_else(|| media_thumbnail(channel));

        let (entries, skipped_entries) =
            collect_entries(item_container.children_named("item"), Self::rss_entry);

        FeedDocument {
            dialect,
            title: channel
                .child_text("title")
                .unwrap_or_else(|| UNTITLED_FEED.to_string()),
            description: channel.child_text("description"),
            site_url: channel.child_text("link"),
            feed_url: self_link(channel).unwrap_or_else(|| source_url.to_string()),
            image_url,
            language: channel
                .child_text("language")
                .or_else(|| channel.child_text("dc:language")),
            entries,
            skipped_entries,
        }
    }

    fn from_atom(feed: &XmlElement, source_url: &str) -> FeedDocument {
        let image_url = feed
            .child_text("logo")
            .or_else(|| feed.child_text("icon"))
            .or_else(|| itunes_image(feed))
            .or_else(|| media_thumbnail(feed));

        let (entries, skipped_entries) =
            collect_entries(feed.children_named("entry"), Self::atom_entry);

        FeedDocument {
            dialect: FeedDialect::Atom,
            title: atom_text(feed, "title").unwrap_or_else(|| UNTITLED_FEED.to_string()),
            description: atom_text(feed, "subtitle"),
            site_url: atom_link(feed, "alternate"),
            feed_url: self_link(feed).unwrap_or_else(|| source_url.to_string()),
            image_url,
            language: feed.attr("xml:lang").map(str::to_string),
            entries,
            skipped_entries,
        }
    }

    fn rss_entry(item: &XmlElement) -> RawEntry {
        let categories = item
            .children_named("category")
            .chain(item.children_named("dc:subject"))
            .map(|c| c.text())
            .filter(|c| !c.is_empty())
            .collect();

        let enclosure = item.child("enclosure").and_then(|e| {
            e.attr("url").map(|url| Enclosure {
                url: url.trim().to_string(),
                mime_type: e.attr("type").map(str::to_string),
                length: e.attr("length").and_then(|l| l.trim().parse().ok()),
            })
        });

        RawEntry {
            guid: item.child_text("guid"),
            title: item.child_text("title"),
            link: item
                .child_text("link")
                .or_else(|| item.attr("rdf:about").map(str::to_string)),
            pub_date: item.child_text("pubDate"),
            iso_date: None,
            dc_date: item.child_text("dc:date"),
            author: item
                .child_text("author")
                .or_else(|| item.child_text("dc:creator"))
                .or_else(|| item.child_text("itunes:author")),
            content_encoded: item.child_text("content:encoded"),
            content: None,
            content_snippet: item.child_text("itunes:subtitle"),
            summary: item.child_text("itunes:summary"),
            description: item.child_text("description"),
            categories,
            enclosure,
            media_thumbnail: media_thumbnail(item),
            media_content: media_content(item),
        }
    }

    fn atom_entry(entry: &XmlElement) -> RawEntry {
        let categories = entry
            .children_named("category")
            .filter_map(|c| c.attr("term").map(str::to_string).or_else(|| Some(c.text())))
            .filter(|c| !c.is_empty())
            .collect();

        let enclosure = entry
            .children_named("link")
            .find(|l| l.attr("rel").is_some_and(|rel| rel.eq_ignore_ascii_case("enclosure")))
            .and_then(|l| {
                l.attr("href").map(|href| Enclosure {
                    url: href.trim().to_string(),
                    mime_type: l.attr("type").map(str::to_string),
                    length: l.attr("length").and_then(|len| len.trim().parse().ok()),
                })
            });

        RawEntry {
            guid: entry.child_text("id"),
            title: atom_text(entry, "title"),
            link: atom_link(entry, "alternate"),
            pub_date: entry.child_text("published"),
            iso_date: entry.child_text("updated"),
            dc_date: entry.child_text("dc:date"),
            author: entry
                .child("author")
                .and_then(|a| a.child_text("name").or_else(|| Some(a.text())))
                .filter(|a| !a.is_empty()),
            content_encoded: entry.child_text("content:encoded"),
            content: atom_text(entry, "content"),
            content_snippet: None,
            summary: atom_text(entry, "summary"),
            description: None,
            categories,
            enclosure,
            media_thumbnail: media_thumbnail(entry),
            media_content: media_content(entry),
        }
    }
}

/// Map well-formed entry elements, counting the ones that are dropped.
fn collect_entries<'a, I, F>(elements: I, map: F) -> (Vec<RawEntry>, usize)
where
    I: Iterator<Item = &'a XmlElement>,
    F: Fn(&XmlElement) -> RawEntry,
{
    let mut entries = Vec::new();
    let mut skipped = 0;

    for (index, element) in elements.enumerate() {
        if !element.is_well_formed() {
            warn!(index, "skipping malformed entry");
            skipped += 1;
            continue;
        }
        let entry = map(element);
        if entry.is_empty() {
            warn!(index, "skipping entry without identity or content");
            skipped += 1;
            continue;
        }
        entries.push(entry);
    }

    (entries, skipped)
}

/// Atom text construct: xhtml content is kept as markup, text/html as text.
fn atom_text(parent: &XmlElement, name: &str) -> Option<String> {
    let element = parent.child(name)?;
    let value = match element.attr("type") {
        Some(kind) if kind.eq_ignore_ascii_case("xhtml") => element.inner_xml(),
        _ => element.text(),
    };
    Some(value).filter(|v| !v.is_empty())
}

/// Atom link with the given rel; links without rel count as alternate.
fn atom_link(parent: &XmlElement, rel: &str) -> Option<String> {
    parent
        .children_named("link")
        .find(|link| match link.attr("rel") {
            Some(r) => r.eq_ignore_ascii_case(rel),
            None => rel == "alternate",
        })
        .and_then(|link| link.attr("href").map(|href| href.trim().to_string()))
}

/// `rel="self"` link, written as `atom:link` inside RSS or plain `link` in Atom.
fn self_link(parent: &XmlElement) -> Option<String> {
    parent
        .elements()
        .filter(|e| e.local_name().eq_ignore_ascii_case("link"))
        .find(|e| e.attr("rel").is_some_and(|rel| rel.eq_ignore_ascii_case("self")))
        .and_then(|e| e.attr("href").map(|href| href.trim().to_string()))
}

fn itunes_image(parent: &XmlElement) -> Option<String> {
    parent
        .child("itunes:image")
        .and_then(|image| image.attr("href").map(str::to_string).or_else(|| image.child_text("url")))
}

/// `media:thumbnail` directly under the element or inside a `media:group`.
fn media_thumbnail(parent: &XmlElement) -> Option<String> {
    media_scopes(parent)
        .flat_map(|scope| scope.children_named("media:thumbnail"))
        .find_map(|thumb| thumb.attr("url").map(|url| url.trim().to_string()))
}

fn media_content(parent: &XmlElement) -> Option<MediaContent> {
    media_scopes(parent)
        .flat_map(|scope| scope.children_named("media:content"))
        .find_map(|content| {
            content.attr("url").map(|url| MediaContent {
                url: url.trim().to_string(),
                mime_type: content.attr("type").map(str::to_string),
                medium: content.attr("medium").map(str::to_string),
            })
        })
}

fn media_scopes(parent: &XmlElement) -> impl Iterator<Item = &XmlElement> {
    std::iter::once(parent).chain(parent.children_named("media:group"))
}
