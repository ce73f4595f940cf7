//! Arena-backed document.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use cssparser::{Parser as CssParser, ParserInput};
use indexmap::IndexMap;
use reinhardt_reactive::Effect;
use scraper::Html;
use scraper::selector::{
	CssLocalName, CssString, NonTSPseudoClass, Parser as SelectorParser, PseudoElement, Simple,
};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::bloom::BloomFilter;
use selectors::matching::{
	ElementSelectorFlags, MatchingContext, MatchingForInvalidation, MatchingMode,
	NeedsSelectorFlags, QuirksMode, SelectorCaches, matches_selector_list,
};
use selectors::parser::ParseRelative;
use selectors::{Element, OpaqueElement, SelectorImpl, SelectorList};

use super::EventType;
use crate::component::{ViewEventHandler, is_void_element};
use crate::ssr::markers::{Anchor, SlotId, html_escape_attr, parse_anchor};
use crate::ssr::renderer::html_escape;

/// Handle to a node in a [`Document`].
///
/// Keys stay valid for the lifetime of the document. A removed node keeps its
/// key but is no longer reachable from the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(usize);

/// Node contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
	/// The document root.
	Document,
	/// `<!DOCTYPE name>`
	Doctype(String),
	/// An element with its attributes in source order.
	Element {
		/// Lowercase tag name.
		tag: String,
		/// Attributes.
		attrs: IndexMap<String, String>,
	},
	/// A text node.
	Text(String),
	/// A comment node.
	Comment(String),
}

struct Node {
	kind: NodeKind,
	parent: Option<NodeKey>,
	children: Vec<NodeKey>,
}

/// A pair of island anchor comments found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorSite {
	/// Slot id carried by the anchors.
	pub slot: SlotId,
	/// The start comment.
	pub start: NodeKey,
	/// The matching end comment, if present under the same parent.
	pub end: Option<NodeKey>,
	/// Host element of the anchor pair.
	pub parent: Option<NodeKey>,
}

/// In-memory DOM.
///
/// All operations take `&self`; interior state is borrowed only for the
/// duration of one call, so event handlers and effects may mutate the
/// document while it is being dispatched on.
pub struct Document {
	nodes: RefCell<Vec<Node>>,
	handlers: RefCell<HashMap<NodeKey, Vec<(EventType, ViewEventHandler)>>>,
	effects: RefCell<Vec<Effect>>,
}

const ROOT: NodeKey = NodeKey(0);

const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

impl Document {
	/// Creates an empty document.
	pub fn new() -> Rc<Self> {
		Rc::new(Self::empty())
	}

	fn empty() -> Self {
		Self {
			nodes: RefCell::new(vec![Node {
				kind: NodeKind::Document,
				parent: None,
				children: Vec::new(),
			}]),
			handlers: RefCell::new(HashMap::new()),
			effects: RefCell::new(Vec::new()),
		}
	}

	/// Parses an HTML document.
	pub fn parse(html: &str) -> Rc<Self> {
		let parsed = Html::parse_document(html);
		let document = Self::empty();
		{
			let mut nodes = document.nodes.borrow_mut();
			let mut keys = HashMap::new();
			for node in parsed.tree.root().descendants() {
				let Some(parent) = node.parent() else {
					keys.insert(node.id(), ROOT);
					continue;
				};
				let kind = match node.value() {
					scraper::Node::Doctype(doctype) => NodeKind::Doctype(doctype.name().to_string()),
					scraper::Node::Element(element) => NodeKind::Element {
						tag: element.name().to_string(),
						attrs: element
							.attrs()
							.map(|(name, value)| (name.to_string(), value.to_string()))
							.collect(),
					},
					scraper::Node::Text(text) => NodeKind::Text(String::from(&**text)),
					scraper::Node::Comment(comment) => NodeKind::Comment(String::from(&**comment)),
					_ => continue,
				};
				let Some(&parent) = keys.get(&parent.id()) else {
					continue;
				};
				let key = push_node(&mut nodes, kind);
				attach(&mut nodes, parent, key, None);
				keys.insert(node.id(), key);
			}
		}
		Rc::new(document)
	}

	/// The document root.
	pub fn root(&self) -> NodeKey {
		ROOT
	}

	/// Creates a detached element.
	pub fn create_element(&self, tag: &str) -> NodeKey {
		push_node(
			&mut self.nodes.borrow_mut(),
			NodeKind::Element {
				tag: tag.to_ascii_lowercase(),
				attrs: IndexMap::new(),
			},
		)
	}

	/// Creates a detached text node.
	pub fn create_text(&self, text: &str) -> NodeKey {
		push_node(&mut self.nodes.borrow_mut(), NodeKind::Text(text.to_string()))
	}

	/// Creates a detached comment node.
	pub fn create_comment(&self, text: &str) -> NodeKey {
		push_node(&mut self.nodes.borrow_mut(), NodeKind::Comment(text.to_string()))
	}

	/// Appends `child` to `parent`, detaching it from its previous parent.
	pub fn append_child(&self, parent: NodeKey, child: NodeKey) {
		self.insert_before(parent, child, None);
	}

	/// Inserts `child` into `parent` before `reference`, or last when
	/// `reference` is `None` or not a child of `parent`.
	pub fn insert_before(&self, parent: NodeKey, child: NodeKey, reference: Option<NodeKey>) {
		let mut nodes = self.nodes.borrow_mut();
		if parent == child || !contains_key(&nodes, parent) || !contains_key(&nodes, child) {
			return;
		}
		if is_ancestor(&nodes, child, parent) {
			return;
		}
		detach(&mut nodes, child);
		attach(&mut nodes, parent, child, reference);
	}

	/// Detaches `node` from the tree and drops the event handlers of its
	/// subtree.
	pub fn remove(&self, node: NodeKey) {
		let subtree = {
			let mut nodes = self.nodes.borrow_mut();
			if node == ROOT || !contains_key(&nodes, node) {
				return;
			}
			detach(&mut nodes, node);
			let mut subtree = preorder(&nodes, node);
			subtree.push(node);
			subtree
		};

		let dropped: Vec<_> = {
			let mut handlers = self.handlers.borrow_mut();
			subtree.iter().filter_map(|key| handlers.remove(key)).collect()
		};
		drop(dropped);
	}

	/// Replaces the siblings strictly between `start` and `end` with
	/// `replacement`.
	pub fn replace_between(&self, start: NodeKey, end: NodeKey, replacement: &[NodeKey]) {
		let (parent, stale) = {
			let nodes = self.nodes.borrow();
			let Some(parent) = nodes.get(end.0).and_then(|n| n.parent) else {
				return;
			};
			let children = &nodes[parent.0].children;
			let (Some(from), Some(to)) = (
				children.iter().position(|&c| c == start),
				children.iter().position(|&c| c == end),
			) else {
				return;
			};
			let stale = if from < to {
				children[from + 1..to].to_vec()
			} else {
				Vec::new()
			};
			(parent, stale)
		};

		for node in stale {
			self.remove(node);
		}
		for &node in replacement {
			self.insert_before(parent, node, Some(end));
		}
	}

	/// Contents of a node.
	pub fn kind(&self, node: NodeKey) -> Option<NodeKind> {
		self.nodes.borrow().get(node.0).map(|n| n.kind.clone())
	}

	/// Tag name of an element.
	pub fn tag(&self, node: NodeKey) -> Option<String> {
		match self.nodes.borrow().get(node.0).map(|n| &n.kind) {
			Some(NodeKind::Element { tag, .. }) => Some(tag.clone()),
			_ => None,
		}
	}

	/// Parent of a node.
	pub fn parent(&self, node: NodeKey) -> Option<NodeKey> {
		self.nodes.borrow().get(node.0).and_then(|n| n.parent)
	}

	/// Children of a node.
	pub fn children(&self, node: NodeKey) -> Vec<NodeKey> {
		self.nodes
			.borrow()
			.get(node.0)
			.map(|n| n.children.clone())
			.unwrap_or_default()
	}

	/// All nodes below `node`, in document order.
	pub fn descendants(&self, node: NodeKey) -> Vec<NodeKey> {
		preorder(&self.nodes.borrow(), node)
	}

	/// Whether `node` is reachable from the root.
	pub fn is_connected(&self, node: NodeKey) -> bool {
		let nodes = self.nodes.borrow();
		node == ROOT || is_ancestor(&nodes, ROOT, node)
	}

	/// Attribute value of an element.
	pub fn attribute(&self, node: NodeKey, name: &str) -> Option<String> {
		match self.nodes.borrow().get(node.0).map(|n| &n.kind) {
			Some(NodeKind::Element { attrs, .. }) => attrs.get(name).cloned(),
			_ => None,
		}
	}

	/// Sets an attribute on an element. Other nodes are left unchanged.
	pub fn set_attribute(&self, node: NodeKey, name: &str, value: &str) {
		if let Some(Node {
			kind: NodeKind::Element { attrs, .. },
			..
		}) = self.nodes.borrow_mut().get_mut(node.0)
		{
			attrs.insert(name.to_string(), value.to_string());
		}
	}

	/// Adds `token` to the space separated list in attribute `name`.
	pub fn add_token(&self, node: NodeKey, name: &str, token: &str) {
		if self.has_token(node, name, token) {
			return;
		}
		let value = match self.attribute(node, name) {
			Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), token),
			_ => token.to_string(),
		};
		self.set_attribute(node, name, &value);
	}

	/// Whether the space separated list in attribute `name` holds `token`.
	pub fn has_token(&self, node: NodeKey, name: &str, token: &str) -> bool {
		self.attribute(node, name)
			.is_some_and(|value| value.split_ascii_whitespace().any(|t| t == token))
	}

	/// Concatenated text of all text nodes below `node`.
	pub fn text_content(&self, node: NodeKey) -> String {
		let nodes = self.nodes.borrow();
		let mut text = String::new();
		if let Some(NodeKind::Text(own)) = nodes.get(node.0).map(|n| &n.kind) {
			text.push_str(own);
		}
		for key in preorder(&nodes, node) {
			if let NodeKind::Text(t) = &nodes[key.0].kind {
				text.push_str(t);
			}
		}
		text
	}

	/// First element in document order matching `selector`.
	///
	/// Accepts CSS selector groups as parsed by `scraper`. An invalid
	/// selector matches nothing.
	pub fn query_selector(&self, selector: &str) -> Option<NodeKey> {
		self.query_selector_all(selector).into_iter().next()
	}

	/// All elements in document order matching `selector`.
	pub fn query_selector_all(&self, selector: &str) -> Vec<NodeKey> {
		let mut input = ParserInput::new(selector);
		let Ok(list) = SelectorList::parse(
			&SelectorParser,
			&mut CssParser::new(&mut input),
			ParseRelative::No,
		) else {
			tracing::debug!(selector, "invalid selector");
			return Vec::new();
		};
		let nodes = self.nodes.borrow();
		let mut caches = SelectorCaches::default();
		let mut context = MatchingContext::new(
			MatchingMode::Normal,
			None,
			&mut caches,
			QuirksMode::NoQuirks,
			NeedsSelectorFlags::No,
			MatchingForInvalidation::No,
		);
		preorder(&nodes, ROOT)
			.into_iter()
			.filter(|&key| {
				ElementHandle::wrap(&nodes, key)
					.is_some_and(|element| matches_selector_list(&list, &element, &mut context))
			})
			.collect()
	}

	/// Element with the given `id` attribute.
	pub fn get_element_by_id(&self, id: &str) -> Option<NodeKey> {
		let nodes = self.nodes.borrow();
		preorder(&nodes, ROOT).into_iter().find(|key| {
			matches!(&nodes[key.0].kind, NodeKind::Element { attrs, .. } if attrs.get("id").is_some_and(|v| v == id))
		})
	}

	/// Attaches an event handler to a node.
	pub fn add_listener(&self, node: NodeKey, event: EventType, handler: ViewEventHandler) {
		self.handlers
			.borrow_mut()
			.entry(node)
			.or_default()
			.push((event, handler));
	}

	/// Number of handlers attached to a node.
	pub fn listener_count(&self, node: NodeKey) -> usize {
		self.handlers.borrow().get(&node).map_or(0, Vec::len)
	}

	/// Dispatches `event` at `target`, bubbling to the root.
	///
	/// The propagation path is fixed before the first handler runs. Returns
	/// the number of handlers invoked.
	pub fn dispatch(&self, target: NodeKey, event: &EventType) -> usize {
		let path = {
			let nodes = self.nodes.borrow();
			let mut path = vec![target];
			let mut current = nodes.get(target.0).and_then(|n| n.parent);
			while let Some(key) = current {
				path.push(key);
				current = nodes[key.0].parent;
			}
			path
		};

		let mut invoked = 0;
		for key in path {
			let matching: Vec<ViewEventHandler> = self
				.handlers
				.borrow()
				.get(&key)
				.map(|handlers| {
					handlers
						.iter()
						.filter(|(kind, _)| kind == event)
						.map(|(_, handler)| Rc::clone(handler))
						.collect()
				})
				.unwrap_or_default();
			for handler in matching {
				handler();
				invoked += 1;
			}
		}
		invoked
	}

	/// Keeps an effect alive as long as the document.
	pub fn retain_effect(&self, effect: Effect) {
		self.effects.borrow_mut().push(effect);
	}

	/// Anchor pairs reachable from the root, in document order of their
	/// start comments.
	pub fn island_anchors(&self) -> Vec<AnchorSite> {
		let nodes = self.nodes.borrow();
		let mut sites: Vec<AnchorSite> = Vec::new();
		let mut open: HashMap<SlotId, usize> = HashMap::new();

		for key in preorder(&nodes, ROOT) {
			let NodeKind::Comment(text) = &nodes[key.0].kind else {
				continue;
			};
			match parse_anchor(text) {
				Some(Anchor::Start(slot)) => {
					open.insert(slot.clone(), sites.len());
					sites.push(AnchorSite {
						slot,
						start: key,
						end: None,
						parent: nodes[key.0].parent,
					});
				}
				Some(Anchor::End(slot)) => {
					if let Some(index) = open.remove(&slot)
						&& sites[index].parent == nodes[key.0].parent
					{
						sites[index].end = Some(key);
					}
				}
				None => {}
			}
		}
		sites
	}

	/// Serializes the whole document.
	pub fn to_html(&self) -> String {
		self.inner_html(ROOT)
	}

	/// Serializes a node and its subtree.
	pub fn outer_html(&self, node: NodeKey) -> String {
		let nodes = self.nodes.borrow();
		let mut out = String::new();
		if contains_key(&nodes, node) {
			write_node(&nodes, node, &mut out);
		}
		out
	}

	/// Serializes the children of a node.
	pub fn inner_html(&self, node: NodeKey) -> String {
		let nodes = self.nodes.borrow();
		let mut out = String::new();
		if let Some(n) = nodes.get(node.0) {
			for &child in &n.children {
				write_node(&nodes, child, &mut out);
			}
		}
		out
	}
}

impl fmt::Debug for Document {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Document")
			.field("nodes", &self.nodes.borrow().len())
			.field("listeners", &self.handlers.borrow().len())
			.field("effects", &self.effects.borrow().len())
			.finish()
	}
}

fn push_node(nodes: &mut Vec<Node>, kind: NodeKind) -> NodeKey {
	nodes.push(Node {
		kind,
		parent: None,
		children: Vec::new(),
	});
	NodeKey(nodes.len() - 1)
}

fn contains_key(nodes: &[Node], key: NodeKey) -> bool {
	key.0 < nodes.len()
}

fn attach(nodes: &mut [Node], parent: NodeKey, child: NodeKey, reference: Option<NodeKey>) {
	let siblings = &mut nodes[parent.0].children;
	let index = reference
		.and_then(|r| siblings.iter().position(|&c| c == r))
		.unwrap_or(siblings.len());
	siblings.insert(index, child);
	nodes[child.0].parent = Some(parent);
}

fn detach(nodes: &mut [Node], child: NodeKey) {
	if let Some(parent) = nodes[child.0].parent.take() {
		nodes[parent.0].children.retain(|&c| c != child);
	}
}

/// Whether `ancestor` is a proper ancestor of `node`.
fn is_ancestor(nodes: &[Node], ancestor: NodeKey, node: NodeKey) -> bool {
	let mut current = nodes.get(node.0).and_then(|n| n.parent);
	while let Some(key) = current {
		if key == ancestor {
			return true;
		}
		current = nodes[key.0].parent;
	}
	false
}

fn preorder(nodes: &[Node], node: NodeKey) -> Vec<NodeKey> {
	let mut order = Vec::new();
	let Some(start) = nodes.get(node.0) else {
		return order;
	};
	let mut stack: Vec<NodeKey> = start.children.iter().rev().copied().collect();
	while let Some(key) = stack.pop() {
		order.push(key);
		stack.extend(nodes[key.0].children.iter().rev().copied());
	}
	order
}

fn write_node(nodes: &[Node], key: NodeKey, out: &mut String) {
	let node = &nodes[key.0];
	match &node.kind {
		NodeKind::Document => {
			for &child in &node.children {
				write_node(nodes, child, out);
			}
		}
		NodeKind::Doctype(name) => {
			out.push_str("<!DOCTYPE ");
			out.push_str(name);
			out.push('>');
		}
		NodeKind::Text(text) => {
			let raw = node.parent.is_some_and(|p| {
				matches!(&nodes[p.0].kind, NodeKind::Element { tag, .. } if tag == "script" || tag == "style")
			});
			if raw {
				out.push_str(text);
			} else {
				out.push_str(&html_escape(text));
			}
		}
		NodeKind::Comment(text) => {
			out.push_str("<!--");
			out.push_str(text);
			out.push_str("-->");
		}
		NodeKind::Element { tag, attrs } => {
			out.push('<');
			out.push_str(tag);
			for (name, value) in attrs {
				out.push(' ');
				out.push_str(name);
				out.push_str("=\"");
				out.push_str(&html_escape_attr(value));
				out.push('"');
			}
			out.push('>');
			if is_void_element(tag) {
				return;
			}
			for &child in &node.children {
				write_node(nodes, child, out);
			}
			out.push_str("</");
			out.push_str(tag);
			out.push('>');
		}
	}
}

/// Arena element seen through the `selectors` matching engine.
#[derive(Clone)]
struct ElementHandle<'a> {
	nodes: &'a [Node],
	key: NodeKey,
}

impl<'a> ElementHandle<'a> {
	fn wrap(nodes: &'a [Node], key: NodeKey) -> Option<Self> {
		matches!(nodes.get(key.0)?.kind, NodeKind::Element { .. }).then_some(Self { nodes, key })
	}

	fn node(&self) -> &'a Node {
		&self.nodes[self.key.0]
	}

	fn tag(&self) -> &'a str {
		match &self.node().kind {
			NodeKind::Element { tag, .. } => tag,
			_ => "",
		}
	}

	fn attr(&self, name: &str) -> Option<&'a str> {
		match &self.node().kind {
			NodeKind::Element { attrs, .. } => attrs.get(name).map(String::as_str),
			_ => None,
		}
	}

	fn siblings(&self) -> &'a [NodeKey] {
		self.node()
			.parent
			.map(|parent| self.nodes[parent.0].children.as_slice())
			.unwrap_or_default()
	}

	fn position(&self) -> usize {
		self.siblings()
			.iter()
			.position(|&k| k == self.key)
			.unwrap_or_default()
	}
}

impl fmt::Debug for ElementHandle<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ElementHandle").field(&self.key).field(&self.tag()).finish()
	}
}

/// Never matches non-tree-structural pseudo-classes.
impl Element for ElementHandle<'_> {
	type Impl = Simple;

	fn opaque(&self) -> OpaqueElement {
		OpaqueElement::new(self.node())
	}

	fn parent_element(&self) -> Option<Self> {
		Self::wrap(self.nodes, self.node().parent?)
	}

	fn parent_node_is_shadow_root(&self) -> bool {
		false
	}

	fn containing_shadow_host(&self) -> Option<Self> {
		None
	}

	fn is_pseudo_element(&self) -> bool {
		false
	}

	fn prev_sibling_element(&self) -> Option<Self> {
		let siblings = self.siblings();
		siblings[..self.position()]
			.iter()
			.rev()
			.find_map(|&key| Self::wrap(self.nodes, key))
	}

	fn next_sibling_element(&self) -> Option<Self> {
		let siblings = self.siblings();
		siblings
			.get(self.position() + 1..)
			.unwrap_or_default()
			.iter()
			.find_map(|&key| Self::wrap(self.nodes, key))
	}

	fn first_element_child(&self) -> Option<Self> {
		self.node()
			.children
			.iter()
			.find_map(|&key| Self::wrap(self.nodes, key))
	}

	fn is_html_element_in_html_document(&self) -> bool {
		true
	}

	fn has_local_name(&self, name: &CssLocalName) -> bool {
		self.tag() == &*name.0
	}

	fn has_namespace(&self, ns: &<Simple as SelectorImpl>::BorrowedNamespaceUrl) -> bool {
		&**ns == XHTML_NAMESPACE
	}

	fn is_same_type(&self, other: &Self) -> bool {
		self.tag() == other.tag()
	}

	fn attr_matches(
		&self,
		ns: &NamespaceConstraint<&<Simple as SelectorImpl>::NamespaceUrl>,
		local_name: &CssLocalName,
		operation: &AttrSelectorOperation<&CssString>,
	) -> bool {
		let NodeKind::Element { attrs, .. } = &self.node().kind else {
			return false;
		};
		!matches!(*ns, NamespaceConstraint::Specific(url) if !url.is_empty())
			&& attrs
				.get(&*local_name.0)
				.is_some_and(|value| operation.eval_str(value))
	}

	fn match_non_ts_pseudo_class(
		&self,
		_pc: &NonTSPseudoClass,
		_context: &mut MatchingContext<'_, Simple>,
	) -> bool {
		false
	}

	fn match_pseudo_element(
		&self,
		_pe: &PseudoElement,
		_context: &mut MatchingContext<'_, Simple>,
	) -> bool {
		false
	}

	fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

	fn is_link(&self) -> bool {
		false
	}

	fn is_html_slot_element(&self) -> bool {
		false
	}

	fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
		self.attr("id")
			.is_some_and(|value| case_sensitivity.eq(id.0.as_bytes(), value.as_bytes()))
	}

	fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
		self.attr("class").is_some_and(|classes| {
			classes
				.split_ascii_whitespace()
				.any(|class| case_sensitivity.eq(name.0.as_bytes(), class.as_bytes()))
		})
	}

	fn has_custom_state(&self, _name: &CssLocalName) -> bool {
		false
	}

	fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
		None
	}

	fn is_part(&self, _name: &CssLocalName) -> bool {
		false
	}

	fn is_empty(&self) -> bool {
		!self.node().children.iter().any(|&key| match &self.nodes[key.0].kind {
			NodeKind::Element { .. } => true,
			NodeKind::Text(text) => !text.is_empty(),
			_ => false,
		})
	}

	fn is_root(&self) -> bool {
		self.node()
			.parent
			.is_some_and(|parent| matches!(self.nodes[parent.0].kind, NodeKind::Document))
	}

	fn add_element_unique_hashes(&self, _filter: &mut BloomFilter) -> bool {
		false
	}
}
