use std::collections::BTreeMap;
use std::ops::Range;

use tracing::debug;

use crate::node::{Element, Node, NodeKind, Tag, Tree};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Append ` (href)` after link text. Meant for debugging output.
    pub bracket_links: bool,
}

/// A span of rendered text attributed to the element that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedRange {
    pub tag: String,
    pub attributes: Option<BTreeMap<String, String>>,
    /// Byte range into `Rendered::text`
    pub range: Range<usize>,
}

impl TaggedRange {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.as_ref()?.get(key).map(String::as_str)
    }

    /// The covered text. Empty if `text` is not the string this range was
    /// rendered into.
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        text.get(self.range.clone()).unwrap_or_default()
    }

    /// The range in UTF-16 code units, as used by Cocoa and JavaScript hosts.
    pub fn utf16_range(&self, text: &str) -> Range<usize> {
        let start = prefix(text, self.range.start).encode_utf16().count();
        start..start + self.slice(text).encode_utf16().count()
    }

    /// The range in Unicode scalar values.
    pub fn char_range(&self, text: &str) -> Range<usize> {
        let start = prefix(text, self.range.start).chars().count();
        start..start + self.slice(text).chars().count()
    }
}

fn prefix(text: &str, end: usize) -> &str {
    text.get(..end).unwrap_or_default()
}

/// Normalized text plus the ranges to style, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub ranges: Vec<TaggedRange>,
}

/// Flatten a tree into text, recording which element each piece of text
/// came from.
///
/// Elements open with spacing (blank lines around blocks, a newline for
/// `<br>`, a space before links). Text closes with spacing decided by its
/// parent. The output never holds more than one blank line in a row and
/// never ends in whitespace.
pub fn render(tree: &Tree, options: RenderOptions) -> Rendered {
    let mut out = Rendered::default();
    let mut nodes = tree.iter().peekable();

    while let Some(node) = nodes.next() {
        let is_last = nodes.peek().is_none();
        match node.kind() {
            NodeKind::Element(element) => prepend(&element.tag, &mut out.text),
            NodeKind::Text(text) => append(tree, node, text, is_last, options, &mut out),
        }
    }

    trim_tail(&mut out);
    debug!(
        bytes = out.text.len(),
        ranges = out.ranges.len(),
        "rendered tree"
    );

    out
}

/// Render with bracketed links and return the text alone.
pub fn render_debug(tree: &Tree) -> String {
    render(
        tree,
        RenderOptions {
            bracket_links: true,
        },
    )
    .text
}

fn prepend(tag: &Tag, out: &mut String) {
    match tag {
        Tag::Anchor => {
            if needs_space(out) {
                out.push(' ');
            }
        }
        // At most one blank line, and none at the very start
        Tag::LineBreak => {
            if !out.is_empty() && !out.ends_with("\n\n") {
                out.push('\n');
            }
        }
        tag if tag.is_block() => {
            if out.is_empty() || out.ends_with("\n\n") {
                return;
            }
            out.push_str(if out.ends_with('\n') { "\n" } else { "\n\n" });
        }
        _ => {}
    }
}

fn append(
    tree: &Tree,
    node: &Node,
    text: &str,
    is_last: bool,
    options: RenderOptions,
    out: &mut Rendered,
) {
    let text = sanitize(text);
    if text.is_empty() {
        return;
    }

    let Some(element) = tree.parent(node.id()).and_then(Node::as_element) else {
        return;
    };

    let leading = if needs_space(&out.text) && !text.starts_with(is_closing) {
        " "
    } else {
        ""
    };
    let trailing = if is_last {
        String::new()
    } else {
        trailing_separator(tree, node, element, options)
    };

    let start = out.text.len();
    out.text.push_str(leading);
    out.text.push_str(&text);
    out.text.push_str(&trailing);

    out.ranges.push(TaggedRange {
        tag: element.name.clone(),
        attributes: (!element.attributes.is_empty()).then(|| element.attributes.clone()),
        range: start..out.text.len(),
    });
}

fn trailing_separator(tree: &Tree, node: &Node, parent: &Element, options: RenderOptions) -> String {
    match &parent.tag {
        Tag::Anchor => match parent.attr("href") {
            Some(href) if options.bracket_links => {
                format!(" ({})", href.split_whitespace().collect::<Vec<_>>().join(" "))
            }
            _ => String::new(),
        },
        tag if tag.is_block() => {
            let is_last_child = tree
                .parent(node.id())
                .and_then(|p| tree.last_child(p.id()))
                == Some(node.id());
            if is_last_child {
                "\n\n".to_string()
            } else {
                String::new()
            }
        }
        Tag::ListItem => "\n".to_string(),
        _ => String::new(),
    }
}

/// Drop trailing spacing left by elements after the last text, for example
/// `<h1>A</h1><br/>`, and pull ranges back inside the text.
fn trim_tail(out: &mut Rendered) {
    let len = out.text.trim_end().len();
    out.text.truncate(len);
    for tagged in &mut out.ranges {
        tagged.range.end = tagged.range.end.min(len);
        tagged.range.start = tagged.range.start.min(tagged.range.end);
    }
}

/// Trim the text, strip control characters and cap blank lines at one.
///
/// Tabs become spaces. Each line is trimmed; runs of empty lines collapse
/// into a single blank line.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank = false;

    for line in text.lines() {
        let line: String = line
            .chars()
            .map(|c| if c == '\t' { ' ' } else { c })
            .filter(|c| !c.is_control())
            .collect();
        let line = line.trim();

        if line.is_empty() {
            blank = true;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank { "\n\n" } else { "\n" });
        }
        out.push_str(line);
        blank = false;
    }

    out
}

fn needs_space(out: &str) -> bool {
    let mut chars = out.chars().rev();
    match chars.next() {
        // A straight quote opens after whitespace or at the start
        Some('"' | '\'') => chars.next().is_some_and(|c| !c.is_whitespace()),
        Some(c) => !c.is_whitespace() && !is_opening(c),
        None => false,
    }
}

fn is_opening(c: char) -> bool {
    matches!(c, '(' | '[' | '{' | '“' | '‘' | '«' | '‹' | '¿' | '¡')
}

/// Punctuation that attaches to the preceding word. Straight quotes starting
/// a text close the quote opened before it.
fn is_closing(c: char) -> bool {
    matches!(
        c,
        '.' | ',' | ';' | ':' | '!' | '?' | ')' | ']' | '}' | '”' | '’' | '"' | '\'' | '»' | '›'
            | '…' | '%' | '_' | '‿'
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn text(markup: &str) -> String {
        render(&parse(markup).unwrap(), RenderOptions::default()).text
    }

    fn debug_text(markup: &str) -> String {
        render_debug(&parse(markup).unwrap())
    }

    const SHOW_NOTES: [&str; 3] = [
        "Here are three of our favorite segments. Check out our<a href=\"https://slate.com/culture/video.html\"> inaugural video </a>in this series.<br /><br />Hear more in <a href=\"http://www.slate.com/episode_36.html\">episode 36</a>.<br /><br />Tell a friend to subscribe! Share this link: <a href=\"http://megaphone.link/represent\">megaphone.link/represent</a><br /><br />Email: represent@slate.com<br />Facebook:<a href=\"https://www.facebook.com/SlateRepresent/\"> Slate Represent</a><br />Twitter:<a href=\"http://www.twitter.com/SlateRepresent\"> @SlateRepresent</a>,<a href=\"http://www.twitter.com/craftingmystyle\"> @craftingmystyle</a><br />",
        "There's been a drowning at the Pancake House.\n\nThis episode was co-written with Brie Williams.\n\n\n\nWeather: “Lake Full of Regrets” by Devine Carama.\n<a href=\"https://devinecarama.bandcamp.com\">https://devinecarama.bandcamp.com</a>\n\nADDED USA TOUR DATES of &quot;All Hail&quot;. \n<a href=\"http://welcometonightvale.com/\">http://welcometonightvale.com</a>, click on live shows\n\nWritten by Joseph Fink &amp; Jeffrey Cranor. \n",
        "In the late 1920s, the Ford Motor Company bought up millions of acres of land in Brazil.\n\n<a href=\"https://99percentinvisible.org/?p=24181&amp;post_type=episode\" target=\"_blank\">Fordlandia</a>\n\nIn the second segment, we discuss <a href=\"https://trumpconlaw.com/\" target=\"_blank\">Con Law</a>",
    ];

    #[test]
    fn plain_and_headings() {
        assert_eq!(text(""), "");
        assert_eq!(text("Aliens?"), "Aliens?");
        assert_eq!(text("<h1>Aliens?</h1>"), "Aliens?");
        assert_eq!(text("<h1>Aliens?</h1>Why yes."), "Aliens?\n\nWhy yes.");
        assert_eq!(
            text("<h1>Aliens?</h1>Why yes.<br/>Oh noes …"),
            "Aliens?\n\nWhy yes.\nOh noes …"
        );
        assert_eq!(text("<h1>First</h1><h1>Second</h1>"), "First\n\nSecond");
        assert_eq!(
            text("Root copy followed by<h1>A Headline</h1>"),
            "Root copy followed by\n\nA Headline"
        );
    }

    #[test]
    fn lists() {
        assert_eq!(text("<ul><li>a</li><li>b</li><li>c</li></ul>"), "a\nb\nc");
        assert_eq!(text("<ol><li>a</li></ol><p>b</p>"), "a\n\nb");
    }

    #[test]
    fn bracketed_links() {
        let markup = "<p>This is a <a href=\"demo.html\">simple</a> sample.</p>";
        assert_eq!(debug_text(markup), "This is a simple (demo.html) sample.");
        assert_eq!(text(markup), "This is a simple sample.");
    }

    #[test]
    fn bracketed_href_whitespace_collapses() {
        let rendered = debug_text("<a href=\"x&#10;&#10;&#10;y\">t</a>z");
        assert_eq!(rendered, "t (x y) z");
        assert!(!rendered.contains('\n'));
    }

    #[test]
    fn anchor_ranges() {
        let tree = parse("<p>This is a <a href=\"demo.html\">simple</a> sample.</p>").unwrap();
        let rendered = render(
            &tree,
            RenderOptions {
                bracket_links: true,
            },
        );

        let anchors: Vec<_> = rendered.ranges.iter().filter(|r| r.tag == "a").collect();
        assert_eq!(anchors.len(), 1);
        let anchor = anchors[0];
        assert_eq!(anchor.attr("href"), Some("demo.html"));
        assert_eq!(
            anchor.attributes,
            Some(BTreeMap::from([("href".to_string(), "demo.html".to_string())]))
        );
        assert_eq!(anchor.slice(&rendered.text), "simple (demo.html)");

        let tags: Vec<&str> = rendered.ranges.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["p", "a", "p"]);
        assert_eq!(rendered.ranges[0].attributes, None);
        assert_eq!(rendered.ranges[2].slice(&rendered.text), " sample.");
    }

    #[test]
    fn block_range_covers_trailing_blank_line() {
        let rendered = render(
            &parse("<h1>Aliens?</h1>Why yes.").unwrap(),
            RenderOptions::default(),
        );
        assert_eq!(rendered.ranges[0].tag, "h1");
        assert_eq!(rendered.ranges[0].range, 0..9);
        assert_eq!(rendered.ranges[1].tag, "root");
        assert_eq!(rendered.ranges[1].slice(&rendered.text), "Why yes.");
    }

    #[test]
    fn spacing_around_links() {
        assert_eq!(
            text("Check out our<a href=\"x\"> inaugural video </a>in this series."),
            "Check out our inaugural video in this series."
        );
        assert_eq!(
            text("Twitter:<a href=\"t\"> @a</a>,<a href=\"u\"> @b</a>"),
            "Twitter: @a, @b"
        );
        assert_eq!(text("(<a href=\"x\">link</a>)"), "(link)");
        assert_eq!(text("<a href=\"x\">Roman</a>'s show"), "Roman's show");
    }

    #[test]
    fn straight_quotes_hug_links() {
        assert_eq!(text("Say \"<a href=\"x\">hi</a>\" now"), "Say \"hi\" now");
        assert_eq!(text("Say '<a href=\"x\">hi</a>' now"), "Say 'hi' now");
        assert_eq!(text("\"<a href=\"x\">Quoted</a>\""), "\"Quoted\"");
        // A quote glued to a word closes, so the link still gets its space
        assert_eq!(text("\"All Hail\"<a href=\"x\">tour</a>"), "\"All Hail\" tour");
    }

    #[test]
    fn trailing_breaks_are_dropped() {
        assert_eq!(text("<h1>A</h1><br/><br/>"), "A");
        assert_eq!(text("<p>x</p><p> </p>"), "x");

        let rendered = render(&parse("<h1>A</h1><br/>").unwrap(), RenderOptions::default());
        assert_eq!(rendered.ranges[0].range, 0..1);
    }

    #[test]
    fn breaks_never_stack_past_one_blank_line() {
        assert_eq!(text("a<br/><br/><br/><br/>b"), "a\n\nb");
        assert_eq!(text("<ul><li>a</li></ul><br/><br/><h2>b</h2>"), "a\n\nb");
    }

    #[test]
    fn newlines_inside_text_survive() {
        let rendered = text(SHOW_NOTES[1]);
        assert!(rendered.starts_with(
            "There's been a drowning at the Pancake House.\n\nThis episode was co-written with Brie Williams.\n\nWeather:"
        ));
        // Newlines at the edges of a text node are trimmed away
        assert!(rendered.contains("Carama. https://devinecarama.bandcamp.com ADDED"));
        assert!(rendered.contains(
            "of \"All Hail\". http://welcometonightvale.com, click on live shows\n\nWritten"
        ));
        assert!(rendered.ends_with("Joseph Fink & Jeffrey Cranor."));
    }

    #[test]
    fn output_properties_hold_for_show_notes() {
        for markup in SHOW_NOTES {
            for options in [
                RenderOptions::default(),
                RenderOptions {
                    bracket_links: true,
                },
            ] {
                let tree = parse(markup).unwrap();
                let rendered = render(&tree, options);
                assert!(!rendered.text.contains("\n\n\n"), "{:?}", rendered.text);
                assert_eq!(rendered.text.trim_end(), rendered.text);
                assert_eq!(rendered.text.trim_start(), rendered.text);
                for tagged in &rendered.ranges {
                    assert!(tagged.range.end <= rendered.text.len());
                    assert!(rendered.text.is_char_boundary(tagged.range.start));
                }
                assert_eq!(render(&tree, options), rendered);
            }
        }
    }

    #[test]
    fn anchors_in_order() {
        let rendered = render(&parse(SHOW_NOTES[0]).unwrap(), RenderOptions::default());
        let links: Vec<&str> = rendered
            .ranges
            .iter()
            .filter(|r| r.tag == "a")
            .map(|r| r.slice(&rendered.text))
            .collect();
        assert_eq!(
            links,
            vec![
                "inaugural video",
                "episode 36",
                "megaphone.link/represent",
                "Slate Represent",
                "@SlateRepresent",
                "@craftingmystyle",
            ]
        );
    }

    #[test]
    fn sanitize_is_idempotent() {
        for raw in [
            "  plain  ",
            "\n\tTabbed\tline\r\n",
            "a\n\n\n\nb",
            "\u{1} a \u{7}b\n \n c",
            "",
        ] {
            let once = sanitize(raw);
            assert_eq!(sanitize(&once), once, "{raw:?}");
        }
        assert_eq!(sanitize("a\n\n\n\nb"), "a\n\nb");
        assert_eq!(sanitize("\u{1} a \u{7}b"), "a b");
        assert_eq!(sanitize("x\ty"), "x y");
    }

    #[test]
    fn utf16_and_char_ranges() {
        let rendered = render(
            &parse("<p>Oh noes … <a href=\"x\">😱</a></p>").unwrap(),
            RenderOptions::default(),
        );
        assert_eq!(rendered.text, "Oh noes … 😱");

        let anchor = &rendered.ranges[1];
        assert_eq!(anchor.slice(&rendered.text), "😱");
        assert_eq!(anchor.range, 12..16);
        assert_eq!(anchor.char_range(&rendered.text), 10..11);
        assert_eq!(anchor.utf16_range(&rendered.text), 10..12);
    }
}
