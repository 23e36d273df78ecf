//! Structured article content.
//!
//! Content is a tree of tagged block variants rather than free-form JSON, so
//! asset references and text extraction are exhaustively checked at compile
//! time instead of assumed from dynamic shapes.

use serde::{Deserialize, Serialize};

/// Maximum length of the plain-text preview sent to the search index.
const PREVIEW_LIMIT: usize = 1000;

/// A binary asset referenced from a content block.
///
/// `name` is the bare file name; the bucket key is derived from it together
/// with the owning article (`{draft_id}/{name}` in the draft bucket,
/// `{canonical_url}/{name}` in the published bucket). `url` is the public
/// URL for the current bucket and is rewritten on publish/unpublish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    pub url: String,
}

/// One block of article content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Header {
        text: String,
        level: u8,
    },
    Paragraph {
        text: String,
    },
    List {
        items: Vec<String>,
    },
    Quote {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Image {
        file: FileRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Attachment {
        file: FileRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
}

impl ContentBlock {
    fn file_ref(&self) -> Option<&FileRef> {
        match self {
            ContentBlock::Image { file, .. } | ContentBlock::Attachment { file, .. } => Some(file),
            _ => None,
        }
    }

    fn file_ref_mut(&mut self) -> Option<&mut FileRef> {
        match self {
            ContentBlock::Image { file, .. } | ContentBlock::Attachment { file, .. } => Some(file),
            _ => None,
        }
    }
}

/// The full content of one article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleContent {
    pub blocks: Vec<ContentBlock>,
}

impl ArticleContent {
    /// All assets referenced by image/attachment blocks, in document order.
    pub fn asset_refs(&self) -> impl Iterator<Item = &FileRef> {
        self.blocks.iter().filter_map(ContentBlock::file_ref)
    }

    /// Rewrite every asset URL, e.g. when moving assets between buckets.
    /// The callback receives the file name and returns the new public URL.
    pub fn rewrite_asset_urls(&mut self, url_for: impl Fn(&str) -> String) {
        for block in &mut self.blocks {
            if let Some(file) = block.file_ref_mut() {
                file.url = url_for(&file.name);
            }
        }
    }

    /// Plain-text preview for search indexing, built from paragraph, list and
    /// quote blocks and capped at a fixed length.
    pub fn preview_text(&self) -> String {
        let mut text = String::new();
        for block in &self.blocks {
            let piece = match block {
                ContentBlock::Paragraph { text } => text.clone(),
                ContentBlock::Quote { text, .. } => text.clone(),
                ContentBlock::List { items } => items.join("\n"),
                _ => continue,
            };
            if piece.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&piece);
            if text.len() >= PREVIEW_LIMIT {
                break;
            }
        }

        // Truncate on a char boundary.
        if text.len() > PREVIEW_LIMIT {
            let mut end = PREVIEW_LIMIT;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ArticleContent {
        ArticleContent {
            blocks: vec![
                ContentBlock::Header {
                    text: "Title".into(),
                    level: 1,
                },
                ContentBlock::Paragraph {
                    text: "First paragraph.".into(),
                },
                ContentBlock::Image {
                    file: FileRef {
                        name: "dam.jpg".into(),
                        url: "https://draft.example/1/dam.jpg".into(),
                    },
                    caption: Some("The dam".into()),
                },
                ContentBlock::List {
                    items: vec!["one".into(), "two".into()],
                },
            ],
        }
    }

    #[test]
    fn blocks_round_trip_with_type_tags() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["blocks"][0]["type"], "header");
        assert_eq!(json["blocks"][2]["type"], "image");

        let back: ArticleContent = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn asset_refs_cover_images_and_attachments_only() {
        let content = sample();
        let names: Vec<_> = content.asset_refs().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["dam.jpg"]);
    }

    #[test]
    fn rewrite_asset_urls_touches_every_reference() {
        let mut content = sample();
        content.rewrite_asset_urls(|name| format!("https://pub.example/potop/{name}"));
        let urls: Vec<_> = content.asset_refs().map(|f| f.url.clone()).collect();
        assert_eq!(urls, vec!["https://pub.example/potop/dam.jpg"]);
    }

    #[test]
    fn preview_skips_headers_and_images() {
        let text = sample().preview_text();
        assert_eq!(text, "First paragraph.\none\ntwo");
    }

    #[test]
    fn preview_is_capped() {
        let content = ArticleContent {
            blocks: vec![ContentBlock::Paragraph {
                text: "x".repeat(5000),
            }],
        };
        assert_eq!(content.preview_text().len(), 1000);
    }
}
