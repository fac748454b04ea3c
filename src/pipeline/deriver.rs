use crate::domain::{ArticleCandidate, RawEntry};
use crate::pipeline::text;

pub const UNTITLED: &str = "Untitled";

/// Tunables for derivation. Defaults: 200 character summaries, 400 CJK
/// characters or 200 Latin words per minute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeriveOptions {
    pub summary_length: usize,
    pub cjk_chars_per_minute: u32,
    pub words_per_minute: u32,
    pub untitled_placeholder: String,
}

impl Default for DeriveOptions {
    fn default() -> Self {
        Self {
            summary_length: 200,
            cjk_chars_per_minute: 400,
            words_per_minute: 200,
            untitled_placeholder: UNTITLED.to_string(),
        }
    }
}

/// Maps raw entries to article candidates. Stateless and pure; safe to share
/// across threads.
#[derive(Debug, Clone, Default)]
pub struct ArticleDeriver {
    options: DeriveOptions,
}

impl ArticleDeriver {
    pub fn new(options: DeriveOptions) -> Self {
        Self { options }
    }

    pub fn derive(&self, entry: &RawEntry) -> ArticleCandidate {
        let guid = Self::resolve_guid(entry);
        let url = non_empty(&entry.link).unwrap_or_default().to_string();

        let content = Self::resolve_content(entry).map(str::to_string);
        let content_text = content
            .as_deref()
            .map(text::html_to_text)
            .filter(|t| !t.is_empty());

        let summary = self.resolve_summary(entry, content_text.as_deref());
        let title = self.resolve_title(entry);

        let published_at = [&entry.pub_date, &entry.iso_date, &entry.dc_date]
            .into_iter()
            .filter_map(|raw| raw.as_deref())
            .find_map(text::parse_date);

        let content_hash = match (content.as_deref(), url.as_str()) {
            (Some(body), _) if !body.trim().is_empty() => text::sha256_hex(body),
            (_, link) if !link.is_empty() => text::sha256_hex(link),
            _ => text::sha256_hex(&guid),
        };

        let reading_time = content_text.as_deref().map_or(0, |t| {
            text::reading_time(
                t,
                self.options.cjk_chars_per_minute,
                self.options.words_per_minute,
            )
        });

        ArticleCandidate {
            guid,
            title,
            url,
            image_url: Self::resolve_image(entry, content.as_deref()),
            content,
            content_text,
            summary,
            author: non_empty(&entry.author).map(text::clean_title).filter(|a| !a.is_empty()),
            published_at,
            content_hash,
            reading_time,
            categories: entry.categories.clone(),
        }
    }

    /// guid → link → hash of title, content and pubDate.
    fn resolve_guid(entry: &RawEntry) -> String {
        if let Some(guid) = non_empty(&entry.guid) {
            return guid.to_string();
        }
        if let Some(link) = non_empty(&entry.link) {
            return link.to_string();
        }

        let seed = format!(
            "{}{}{}",
            entry.title.as_deref().unwrap_or_default(),
            Self::resolve_content(entry).unwrap_or_default(),
            entry.pub_date.as_deref().unwrap_or_default(),
        );
        text::sha256_hex(&seed)
    }

    fn resolve_content(entry: &RawEntry) -> Option<&str> {
        [
            &entry.content_encoded,
            &entry.content,
            &entry.content_snippet,
            &entry.summary,
            &entry.description,
        ]
        .into_iter()
        .find_map(non_empty)
    }

    fn resolve_summary(&self, entry: &RawEntry, content_text: Option<&str>) -> Option<String> {
        let explicit = [&entry.summary, &entry.content_snippet]
            .into_iter()
            .filter_map(non_empty)
            .map(text::html_to_text)
            .find(|s| !s.is_empty());

        explicit.or_else(|| {
            content_text.map(|t| text::truncate_chars(t, self.options.summary_length))
        })
    }

    fn resolve_title(&self, entry: &RawEntry) -> String {
        non_empty(&entry.title)
            .map(text::clean_title)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.options.untitled_placeholder.clone())
    }

    fn resolve_image(entry: &RawEntry, content: Option<&str>) -> Option<String> {
        if let Some(thumbnail) = non_empty(&entry.media_thumbnail) {
            return Some(thumbnail.to_string());
        }

        let media = entry
            .media_content
            .as_ref()
            .filter(|m| is_image_mime(m.mime_type.as_deref()) && !m.url.trim().is_empty())
            .map(|m| m.url.trim().to_string());
        if media.is_some() {
            return media;
        }

        let enclosure = entry
            .enclosure
            .as_ref()
            .filter(|e| is_image_mime(e.mime_type.as_deref()) && !e.url.trim().is_empty())
            .map(|e| e.url.trim().to_string());
        if enclosure.is_some() {
            return enclosure;
        }

        content.and_then(text::first_image_src)
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.trim().is_empty())
}

fn is_image_mime(mime: Option<&str>) -> bool {
    mime.is_some_and(|m| m.trim().to_ascii_lowercase().starts_with("image/"))
}
