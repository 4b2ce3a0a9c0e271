use std::collections::BTreeMap;
use std::fmt;

use quick_xml::escape::{resolve_html5_entity, resolve_predefined_entity};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::{debug, trace};

use crate::error::{ParseError, Result};
use crate::node::{Element, NodeId, NodeKind, Tree};

const WRAPPER_OPEN: &str = "<root>";
const WRAPPER_CLOSE: &str = "</root>";

/// Parse show-note markup into a node tree.
///
/// The markup is wrapped in a synthetic `<root>` element first, so bare text
/// and sibling fragments are accepted. Content addressed to a void element
/// such as `<br>` is attached to the nearest element that can hold it.
pub fn parse(markup: &str) -> Result<Tree> {
    let wrapped = format!("{WRAPPER_OPEN}{markup}{WRAPPER_CLOSE}");
    let mut reader = Reader::from_str(&wrapped);
    reader.config_mut().trim_text(false);

    let mut state = ParseState::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|err| malformed(err, reader.error_position()))?;

        // Markup that closes the wrapper early would open a second top level
        if state.closed() && !matches!(event, Event::Eof) {
            return Err(malformed(
                "content after the root element",
                reader.buffer_position(),
            ));
        }

        match event {
            Event::Start(e) => {
                if state.started {
                    let element = element_from_start(&reader, &e)?;
                    state.start_element(element);
                } else {
                    state.start_root();
                }
            }
            // Self-closing tags arrive as one event
            Event::Empty(e) => {
                let element = element_from_start(&reader, &e)?;
                state.start_element(element);
                state.end_element();
            }
            Event::Text(e) => {
                let text = e
                    .unescape_with(resolve_entity)
                    .map_err(|err| malformed(err, reader.buffer_position()))?;
                state.characters(&text);
            }
            Event::CData(e) => {
                let text = reader
                    .decoder()
                    .decode(&e)
                    .map_err(|err| malformed(err, reader.buffer_position()))?;
                state.characters(&text);
            }
            Event::End(_) => state.end_element(),
            Event::Eof => {
                state.end_document();
                break;
            }
            // Comments, processing instructions, doctype
            _ => {}
        }
    }

    let tree = state.tree;
    debug_assert!(tree.validate().is_ok(), "parser broke tree invariants");
    debug!(nodes = tree.len(), bytes = markup.len(), "parsed markup");

    Ok(tree)
}

struct ParseState {
    tree: Tree,
    // Whether the synthetic root has been opened
    started: bool,
    // Open elements, innermost last. The top is the cursor.
    open: Vec<NodeId>,
    // Characters accumulated since the last element boundary
    text: String,
}

impl ParseState {
    fn new() -> Self {
        Self {
            tree: Tree::new(),
            started: false,
            open: Vec::new(),
            text: String::new(),
        }
    }

    fn cursor(&self) -> NodeId {
        match self.open.last() {
            Some(&id) => id,
            None => panic!("no open element to append to"),
        }
    }

    fn closed(&self) -> bool {
        self.started && self.open.is_empty()
    }

    fn start_root(&mut self) {
        self.started = true;
        self.open.push(NodeId::ROOT);
    }

    fn start_element(&mut self, element: Element) {
        // Text seen so far belongs before the new element
        self.flush_text();

        let parent = self.candidate(self.cursor());
        let id = self.tree.append(parent, NodeKind::Element(element));
        self.open.push(id);
    }

    fn characters(&mut self, chunk: &str) {
        self.text.push_str(chunk);
    }

    fn end_element(&mut self) {
        self.flush_text();
        self.open.pop();
        if self.open.is_empty() {
            trace!("closed synthetic root");
        }
    }

    fn end_document(&mut self) {
        self.flush_text();
        self.open.clear();
    }

    fn flush_text(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let parent = self.candidate(self.cursor());
        let text = std::mem::take(&mut self.text);
        self.tree.append(parent, NodeKind::Text(text));
    }

    /// Walk up from `id` to the nearest node that may receive children.
    /// The root always qualifies, so this terminates.
    fn candidate(&self, mut id: NodeId) -> NodeId {
        loop {
            if !self.tree.get(id).is_leaf_only() {
                return id;
            }
            let parent = self.container_of(id);
            trace!(from = %id, to = %parent, "redirecting content off void node");
            id = parent;
        }
    }

    fn container_of(&self, id: NodeId) -> NodeId {
        match self.tree.parent(id) {
            Some(parent) if !parent.is_leaf_only() => parent.id(),
            Some(parent) => panic!("node {id} is owned by leaf node {}", parent.id()),
            None => panic!("node {id} is an orphan"),
        }
    }
}

fn element_from_start(reader: &Reader<&[u8]>, start: &BytesStart<'_>) -> Result<Element> {
    let decoder = reader.decoder();
    let qname = start.name();
    let name = decoder
        .decode(qname.as_ref())
        .map_err(|err| malformed(err, reader.buffer_position()))?;

    let mut attributes = BTreeMap::new();
    for attr in start.html_attributes() {
        let attr = match attr {
            Ok(attr) => attr,
            Err(err) => {
                trace!(tag = %name, %err, "skipping unreadable attribute");
                continue;
            }
        };
        let key = decoder
            .decode(attr.key.as_ref())
            .map_err(|err| malformed(err, reader.buffer_position()))?
            .to_ascii_lowercase();
        let value = attr
            .unescape_value_with(resolve_entity)
            .map_err(|err| malformed(err, reader.buffer_position()))?;
        attributes.insert(key, value.into_owned());
    }

    Ok(Element::new(&name, attributes))
}

/// XML's predefined entities plus the HTML5 named set (`&nbsp;`, `&hellip;`).
fn resolve_entity(name: &str) -> Option<&'static str> {
    resolve_predefined_entity(name).or_else(|| resolve_html5_entity(name))
}

/// Map a reader failure to a position in the caller's markup.
fn malformed<P: TryInto<usize>>(err: impl fmt::Display, position: P) -> ParseError {
    let position = position.try_into().unwrap_or(usize::MAX);
    ParseError::MalformedMarkup {
        message: err.to_string(),
        position: position.saturating_sub(WRAPPER_OPEN.len()),
    }
}
