//! A minimal rich-text model: text plus non-overlapping attribute runs.
//!
//! Styles are set the way Cocoa's `setAttributes(_:range:)` does it. Every
//! call replaces whatever covered the range before, so with overlapping
//! ranges the last one applied wins and nothing is merged.

use std::fmt;
use std::ops::Range;

use tracing::debug;
use url::{ParseError, Url};

use crate::render::Rendered;
use crate::style::{Style, Styles, TextStyle};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    pub font: Option<TextStyle>,
    pub color: Option<String>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub link: Option<Link>,
}

/// A link target taken from an anchor's `href`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    Absolute(Url),
    /// A reference such as `demo.html`, left for the host to resolve
    Relative(String),
}

// Only used to check that a relative reference resolves
const RESOLVE_BASE: &str = "http://localhost/";

impl Link {
    /// Parse an `href`. Absolute URLs and relative references that resolve
    /// against a base are accepted.
    pub fn parse(href: &str) -> Result<Self, ParseError> {
        match Url::parse(href) {
            Ok(url) => Ok(Link::Absolute(url)),
            Err(ParseError::RelativeUrlWithoutBase) if !href.trim().is_empty() => {
                Url::parse(RESOLVE_BASE)?.join(href)?;
                Ok(Link::Relative(href.to_string()))
            }
            Err(err) => Err(err),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Link::Absolute(url) => url.as_str(),
            Link::Relative(href) => href,
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&Style> for Attributes {
    fn from(style: &Style) -> Self {
        Self {
            font: style.font,
            color: style.color.clone(),
            bold: style.bold,
            italic: style.italic,
            underline: style.underline,
            link: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRun {
    /// Byte range into the text
    pub range: Range<usize>,
    pub attributes: Attributes,
}

/// Text with attribute runs that cover it end to end without gaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributedText {
    text: String,
    runs: Vec<AttributeRun>,
}

impl AttributedText {
    pub fn new(text: String) -> Self {
        let runs = if text.is_empty() {
            Vec::new()
        } else {
            vec![AttributeRun {
                range: 0..text.len(),
                attributes: Attributes::default(),
            }]
        };
        Self { text, runs }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn runs(&self) -> &[AttributeRun] {
        &self.runs
    }

    /// Replace the attributes over `range`. The range is clamped to the text.
    pub fn set_attributes(&mut self, range: Range<usize>, attributes: Attributes) {
        let end = range.end.min(self.text.len());
        let start = range.start.min(end);
        if start == end {
            return;
        }

        let mut runs = Vec::with_capacity(self.runs.len() + 2);
        for run in self.runs.drain(..) {
            if run.range.end <= start || run.range.start >= end {
                runs.push(run);
                continue;
            }
            if run.range.start < start {
                runs.push(AttributeRun {
                    range: run.range.start..start,
                    attributes: run.attributes.clone(),
                });
            }
            if run.range.end > end {
                runs.push(AttributeRun {
                    range: end..run.range.end,
                    attributes: run.attributes,
                });
            }
        }

        let at = runs.partition_point(|run| run.range.start < start);
        runs.insert(at, AttributeRun {
            range: start..end,
            attributes,
        });
        self.runs = coalesce(runs);
    }

    pub fn attributes_at(&self, offset: usize) -> Option<&Attributes> {
        self.runs
            .iter()
            .find(|run| run.range.contains(&offset))
            .map(|run| &run.attributes)
    }

    /// Runs carrying a link, with their target.
    pub fn links(&self) -> impl Iterator<Item = (Range<usize>, &Link)> + '_ {
        self.runs
            .iter()
            .filter_map(|run| Some((run.range.clone(), run.attributes.link.as_ref()?)))
    }
}

fn coalesce(runs: Vec<AttributeRun>) -> Vec<AttributeRun> {
    let mut merged: Vec<AttributeRun> = Vec::with_capacity(runs.len());
    for run in runs {
        match merged.last_mut() {
            Some(last) if last.attributes == run.attributes && last.range.end == run.range.start => {
                last.range.end = run.range.end;
            }
            _ => merged.push(run),
        }
    }
    merged
}

/// Build attributed text from rendered output.
///
/// The `root` style covers everything first, then each tagged range gets
/// its tag's style in document order. Ranges whose tag has no style are
/// skipped. Anchors whose `href` parses as a URL or a relative reference
/// also get a link.
pub fn apply_styles(rendered: &Rendered, styles: &Styles) -> AttributedText {
    let mut out = AttributedText::new(rendered.text.clone());
    out.set_attributes(0..rendered.text.len(), Attributes::from(&styles.root()));

    for tagged in &rendered.ranges {
        let Some(style) = styles.get(&tagged.tag) else {
            continue;
        };
        let mut attributes = Attributes::from(style);

        if tagged.tag == "a" {
            if let Some(href) = tagged.attr("href") {
                match Link::parse(href) {
                    Ok(link) => attributes.link = Some(link),
                    Err(err) => debug!(href, %err, "not linking unparsable href"),
                }
            }
        }

        out.set_attributes(tagged.range.clone(), attributes);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use crate::render::{render, RenderOptions};

    fn styled(markup: &str) -> AttributedText {
        let rendered = render(&parse(markup).unwrap(), RenderOptions::default());
        apply_styles(&rendered, &Styles::compiled_default())
    }

    fn plain(color: &str) -> Attributes {
        Attributes {
            color: Some(color.to_string()),
            ..Attributes::default()
        }
    }

    #[test]
    fn runs_cover_text_without_gaps() {
        let mut text = AttributedText::new("abcdef".to_string());
        text.set_attributes(2..4, plain("red"));
        text.set_attributes(3..6, plain("blue"));

        let ranges: Vec<_> = text.runs().iter().map(|r| r.range.clone()).collect();
        assert_eq!(ranges, vec![0..2, 2..3, 3..6]);
        assert_eq!(text.attributes_at(3), Some(&plain("blue")));
        assert_eq!(text.attributes_at(0), Some(&Attributes::default()));
    }

    #[test]
    fn later_application_wins_without_merging() {
        let mut text = AttributedText::new("abcdef".to_string());
        text.set_attributes(0..6, Attributes {
            bold: true,
            ..Attributes::default()
        });
        text.set_attributes(1..2, plain("red"));

        let inner = text.attributes_at(1).unwrap();
        assert!(!inner.bold);
        assert_eq!(inner.color.as_deref(), Some("red"));
        assert!(text.attributes_at(2).unwrap().bold);
    }

    #[test]
    fn equal_neighbours_coalesce() {
        let mut text = AttributedText::new("abcdef".to_string());
        text.set_attributes(1..3, plain("red"));
        text.set_attributes(3..5, plain("red"));
        assert_eq!(text.runs().len(), 3);
        assert_eq!(text.runs()[1].range, 1..5);
    }

    #[test]
    fn out_of_range_is_clamped() {
        let mut text = AttributedText::new("abc".to_string());
        text.set_attributes(2..10, plain("red"));
        text.set_attributes(7..9, plain("blue"));
        assert_eq!(text.runs().last().unwrap().range, 2..3);
        assert!(AttributedText::new(String::new()).runs().is_empty());
    }

    #[test]
    fn root_style_covers_everything() {
        let text = styled("Aliens?");
        assert_eq!(text.runs().len(), 1);
        assert_eq!(text.runs()[0].attributes.font, Some(TextStyle::Body));
    }

    #[test]
    fn heading_style_over_heading_range() {
        let text = styled("<h1>Aliens?</h1>Why yes.");
        assert_eq!(text.text(), "Aliens?\n\nWhy yes.");
        assert_eq!(text.attributes_at(0).unwrap().font, Some(TextStyle::Title1));
        assert_eq!(text.attributes_at(10).unwrap().font, Some(TextStyle::Body));
    }

    #[test]
    fn one_link_per_resolvable_anchor() {
        let text = styled(
            "<p>Read <a href=\"https://example.com/one\">one</a>, \
             <a href=\"demo.html\">two</a> and \
             <a href=\"http://[::1\">three</a>.</p>",
        );
        assert_eq!(text.text(), "Read one, two and three.");

        let links: Vec<(String, String)> = text
            .links()
            .map(|(range, link)| (text.text()[range].to_string(), link.to_string()))
            .collect();
        assert_eq!(
            links,
            vec![
                ("one".to_string(), "https://example.com/one".to_string()),
                ("two".to_string(), "demo.html".to_string()),
            ]
        );

        // The broken href gets anchor styling but no link
        let three = text.text().find("three").unwrap();
        let attributes = text.attributes_at(three).unwrap();
        assert!(attributes.underline);
        assert_eq!(attributes.link, None);
    }

    #[test]
    fn relative_hrefs_stay_relative() {
        assert_eq!(
            Link::parse("demo.html"),
            Ok(Link::Relative("demo.html".to_string()))
        );
        assert_eq!(Link::parse("../episodes/36?t=1").unwrap().as_str(), "../episodes/36?t=1");
        assert!(matches!(Link::parse("https://example.com"), Ok(Link::Absolute(_))));
        assert!(Link::parse("").is_err());
        assert!(Link::parse("http://[::1").is_err());
    }

    #[test]
    fn unstyled_tags_keep_root_style() {
        let text = styled("<p>Plain <em>emphasis</em></p>");
        let root = Attributes::from(&Styles::compiled_default().root());
        assert!(text.runs().iter().all(|run| run.attributes == root));
    }
}
