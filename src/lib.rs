mod attributed;
mod error;
mod node;
mod parser;
mod render;
mod style;

pub use attributed::{apply_styles, AttributeRun, AttributedText, Attributes, Link};
pub use error::{InvariantViolation, ParseError, StyleError};
pub use node::{Descendants, Element, Node, NodeId, NodeKind, Tag, Tree};
pub use render::{render, render_debug, sanitize, RenderOptions, Rendered, TaggedRange};
pub use style::{Style, Styles, TextStyle};

/// Parse show-note markup into a node tree.
pub fn parse(markup: &str) -> Result<Tree, ParseError> {
    parser::parse(markup)
}

/// Convert markup to normalized plain text.
pub fn markup_to_text(markup: &str) -> Result<String, ParseError> {
    let tree = parse(markup)?;
    Ok(render(&tree, RenderOptions::default()).text)
}

/// Render a tree and style it with the given sheet.
pub fn attributed_text(tree: &Tree, styles: &Styles) -> AttributedText {
    let rendered = render(tree, RenderOptions::default());
    apply_styles(&rendered, styles)
}

/// Convert markup to styled text.
pub fn markup_to_attributed(markup: &str, styles: &Styles) -> Result<AttributedText, ParseError> {
    let tree = parse(markup)?;
    Ok(attributed_text(&tree, styles))
}
