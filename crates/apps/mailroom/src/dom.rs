//! Arena-backed document tree
//!
//! Views render into a [`Document`]: element and text nodes stored in one
//! arena and addressed by [`NodeId`]. Slots of removed nodes are reused,
//! and each reuse bumps the slot generation, so a view holding a stale id
//! simply finds nothing. Clicks are dispatched through delegated bindings
//! registered on an ancestor with a selector, and bubble from the target
//! towards the root.

use log::debug;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// Tags serialized without children or a closing tag
const VOID_TAGS: [&str; 4] = ["br", "hr", "img", "input"];

/// Simple HTML escape for user-generated content
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Handle to a node of one [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

/// Markup tree produced by templates
#[derive(Debug, Clone, PartialEq)]
pub enum Markup {
    Element(Element),
    Text(String),
    /// Siblings without a wrapping element
    Fragment(Vec<Markup>),
}

/// Element under construction, built with chained calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    classes: Vec<String>,
    children: Vec<Markup>,
}

/// Start building an element
pub fn el(tag: &str) -> Element {
    Element {
        tag: tag.to_string(),
        ..Default::default()
    }
}

pub fn text(content: impl Into<String>) -> Markup {
    Markup::Text(content.into())
}

pub fn fragment(items: impl IntoIterator<Item = Markup>) -> Markup {
    Markup::Fragment(items.into_iter().collect())
}

impl Element {
    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    /// Add one or more space-separated classes
    pub fn class(mut self, class: &str) -> Self {
        for name in class.split_whitespace() {
            if !self.classes.iter().any(|c| c == name) {
                self.classes.push(name.to_string());
            }
        }
        self
    }

    pub fn class_if(self, condition: bool, class: &str) -> Self {
        if condition { self.class(class) } else { self }
    }

    /// Set an attribute, replacing an earlier value
    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        if name == "class" {
            return self.class(&value.into());
        }
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
        self
    }

    pub fn attr_if(self, condition: bool, name: &str, value: impl Into<String>) -> Self {
        if condition { self.attr(name, value) } else { self }
    }

    pub fn child(mut self, child: impl Into<Markup>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<M: Into<Markup>>(mut self, items: impl IntoIterator<Item = M>) -> Self {
        self.children.extend(items.into_iter().map(Into::into));
        self
    }

    pub fn text(self, content: impl Into<String>) -> Self {
        self.child(Markup::Text(content.into()))
    }
}

impl From<Element> for Markup {
    fn from(element: Element) -> Self {
        Markup::Element(element)
    }
}

impl Markup {
    /// Serialize to an HTML string
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Markup::Text(content) => out.push_str(&html_escape(content)),
            Markup::Fragment(items) => items.iter().for_each(|item| item.write_html(out)),
            Markup::Element(element) => {
                open_tag(out, &element.tag, &element.attributes, &element.classes);
                if is_void(&element.tag) {
                    return;
                }
                element.children.iter().for_each(|child| child.write_html(out));
                close_tag(out, &element.tag);
            }
        }
    }
}

fn is_void(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

fn open_tag(out: &mut String, tag: &str, attributes: &[(String, String)], classes: &[String]) {
    out.push('<');
    out.push_str(tag);
    for (name, value) in attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&html_escape(value));
        out.push('"');
    }
    if !classes.is_empty() {
        out.push_str(" class=\"");
        out.push_str(&html_escape(&classes.join(" ")));
        out.push('"');
    }
    out.push('>');
}

fn close_tag(out: &mut String, tag: &str) {
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

/// Simple selector: `#id`, `.class`, `tag` or `tag.class`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    tag: Option<String>,
    id: Option<String>,
    class: Option<String>,
}

impl Selector {
    pub fn parse(selector: &str) -> Self {
        let selector = selector.trim();
        if let Some(id) = selector.strip_prefix('#') {
            return Self {
                tag: None,
                id: Some(id.to_string()),
                class: None,
            };
        }
        match selector.split_once('.') {
            Some((tag, class)) => Self {
                tag: (!tag.is_empty()).then(|| tag.to_string()),
                id: None,
                class: Some(class.to_string()),
            },
            None => Self {
                tag: Some(selector.to_string()),
                id: None,
                class: None,
            },
        }
    }
}

/// A click delivered to a delegated binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickEvent {
    /// Closest node between the click target and the binding's node
    /// matching the selector
    pub current: NodeId,
}

/// Handle returned by [`Document::on_click`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(u64);

type ClickHandler = Rc<dyn Fn(&Document, &ClickEvent)>;

struct Binding {
    id: BindingId,
    node: NodeId,
    selector: Selector,
    handler: ClickHandler,
}

enum NodeKind {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        classes: Vec<String>,
    },
    Text(String),
}

struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

fn node_at(slots: &[Slot], id: NodeId) -> Option<&Node> {
    slots
        .get(id.index)
        .filter(|slot| slot.generation == id.generation)
        .and_then(|slot| slot.node.as_ref())
}

fn node_at_mut(slots: &mut [Slot], id: NodeId) -> Option<&mut Node> {
    slots
        .get_mut(id.index)
        .filter(|slot| slot.generation == id.generation)
        .and_then(|slot| slot.node.as_mut())
}

struct DocumentInner {
    slots: RefCell<Vec<Slot>>,
    /// Indices of empty slots, reused before the arena grows
    free: RefCell<Vec<usize>>,
    bindings: RefCell<Vec<Binding>>,
    next_binding: Cell<u64>,
}

/// Shared handle to a document
#[derive(Clone)]
pub struct Document {
    inner: Rc<DocumentInner>,
}

impl Document {
    /// Create a document holding an empty `body` root
    pub fn new() -> Self {
        let root = Node {
            kind: NodeKind::Element {
                tag: "body".to_string(),
                attributes: Vec::new(),
                classes: Vec::new(),
            },
            parent: None,
            children: Vec::new(),
        };
        Self {
            inner: Rc::new(DocumentInner {
                slots: RefCell::new(vec![Slot {
                    generation: 0,
                    node: Some(root),
                }]),
                free: RefCell::new(Vec::new()),
                bindings: RefCell::new(Vec::new()),
                next_binding: Cell::new(0),
            }),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId {
            index: 0,
            generation: 0,
        }
    }

    /// Number of nodes currently in the document, attached or not
    pub fn node_count(&self) -> usize {
        self.inner
            .slots
            .borrow()
            .iter()
            .filter(|slot| slot.node.is_some())
            .count()
    }

    /// Number of arena slots, including empty ones awaiting reuse
    pub fn capacity(&self) -> usize {
        self.inner.slots.borrow().len()
    }

    /// Create a detached element, to be placed with [`Document::append`]
    pub fn create_element(&self, tag: &str, class: &str) -> NodeId {
        self.push_node(
            NodeKind::Element {
                tag: tag.to_string(),
                attributes: Vec::new(),
                classes: class.split_whitespace().map(str::to_string).collect(),
            },
            None,
        )
    }

    fn push_node(&self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let node = Node {
            kind,
            parent,
            children: Vec::new(),
        };
        let mut slots = self.inner.slots.borrow_mut();
        let id = match self.inner.free.borrow_mut().pop() {
            Some(index) => {
                let slot = &mut slots[index];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index: slots.len() - 1,
                    generation: 0,
                }
            }
        };
        if let Some(parent) = parent
            && let Some(node) = node_at_mut(&mut slots, parent)
        {
            node.children.push(id);
        }
        id
    }

    fn build(&self, markup: &Markup, parent: NodeId, created: &mut Vec<NodeId>) {
        match markup {
            Markup::Fragment(items) => {
                for item in items {
                    self.build(item, parent, created);
                }
            }
            Markup::Text(content) => {
                created.push(self.push_node(NodeKind::Text(content.clone()), Some(parent)));
            }
            Markup::Element(element) => {
                let id = self.push_node(
                    NodeKind::Element {
                        tag: element.tag.clone(),
                        attributes: element.attributes.clone(),
                        classes: element.classes.clone(),
                    },
                    Some(parent),
                );
                let mut nested = Vec::new();
                for child in &element.children {
                    self.build(child, id, &mut nested);
                }
                created.push(id);
            }
        }
    }

    /// Replace every child of `anchor` with `markup`.
    /// Returns the top-level nodes created.
    pub fn set_content(&self, anchor: NodeId, markup: Markup) -> Vec<NodeId> {
        if !self.is_live(anchor) {
            debug!("set_content on dead node {:?}", anchor);
            return Vec::new();
        }
        let old = self
            .with_node_mut(anchor, |node| std::mem::take(&mut node.children))
            .unwrap_or_default();
        for child in old {
            self.discard(child);
        }
        self.append_markup(anchor, markup)
    }

    /// Build `markup` after the existing children of `anchor`
    pub fn append_markup(&self, anchor: NodeId, markup: Markup) -> Vec<NodeId> {
        let mut created = Vec::new();
        if self.is_live(anchor) {
            self.build(&markup, anchor, &mut created);
        }
        created
    }

    /// Move `child` under `parent`, after its existing children
    pub fn append(&self, parent: NodeId, child: NodeId) -> bool {
        self.insert(parent, child, usize::MAX)
    }

    /// Move `child` under `parent` at position `index` among its children.
    /// An index past the end appends.
    pub fn insert(&self, parent: NodeId, child: NodeId, index: usize) -> bool {
        if !self.is_live(parent) || !self.is_live(child) || self.ancestry(parent).contains(&child) {
            return false;
        }
        self.unlink(child);
        let mut slots = self.inner.slots.borrow_mut();
        if let Some(node) = node_at_mut(&mut slots, child) {
            node.parent = Some(parent);
        }
        if let Some(node) = node_at_mut(&mut slots, parent) {
            let index = index.min(node.children.len());
            node.children.insert(index, child);
        }
        true
    }

    /// Take a node and its subtree out of the document.
    /// Returns false if it was already removed.
    pub fn remove(&self, node: NodeId) -> bool {
        if node == self.root() || !self.is_live(node) {
            return false;
        }
        self.unlink(node);
        self.discard(node);
        true
    }

    fn unlink(&self, node: NodeId) {
        let mut slots = self.inner.slots.borrow_mut();
        let parent = node_at_mut(&mut slots, node).and_then(|n| n.parent.take());
        if let Some(parent) = parent
            && let Some(parent) = node_at_mut(&mut slots, parent)
        {
            parent.children.retain(|c| *c != node);
        }
    }

    /// Free the slots of a subtree and drop the bindings registered inside it
    fn discard(&self, node: NodeId) {
        let mut discarded = HashSet::new();
        {
            let mut slots = self.inner.slots.borrow_mut();
            let mut free = self.inner.free.borrow_mut();
            let mut stack = vec![node];
            while let Some(id) = stack.pop() {
                let Some(slot) = slots
                    .get_mut(id.index)
                    .filter(|slot| slot.generation == id.generation)
                else {
                    continue;
                };
                if let Some(n) = slot.node.take() {
                    slot.generation = slot.generation.wrapping_add(1);
                    free.push(id.index);
                    stack.extend(n.children);
                    discarded.insert(id);
                }
            }
        }
        self.inner
            .bindings
            .borrow_mut()
            .retain(|b| !discarded.contains(&b.node));
    }

    fn with_node<T>(&self, id: NodeId, f: impl FnOnce(&Node) -> T) -> Option<T> {
        node_at(&self.inner.slots.borrow(), id).map(f)
    }

    fn with_node_mut<T>(&self, id: NodeId, f: impl FnOnce(&mut Node) -> T) -> Option<T> {
        node_at_mut(&mut self.inner.slots.borrow_mut(), id).map(f)
    }

    /// Whether the node exists and has not been removed
    pub fn is_live(&self, node: NodeId) -> bool {
        self.with_node(node, |_| ()).is_some()
    }

    /// Whether the node is reachable from the root
    pub fn is_attached(&self, node: NodeId) -> bool {
        self.is_live(node) && self.ancestry(node).last() == Some(&self.root())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.with_node(node, |n| n.parent).flatten()
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.with_node(node, |n| n.children.clone()).unwrap_or_default()
    }

    /// The node followed by its ancestors, innermost first
    pub fn ancestry(&self, node: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            path.push(id);
            current = self.parent(id);
        }
        path
    }

    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.with_node(node, |n| match &n.kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            NodeKind::Text(_) => None,
        })
        .flatten()
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        if name == "class" {
            return self.with_node(node, |n| match &n.kind {
                NodeKind::Element { classes, .. } => Some(classes.join(" ")),
                NodeKind::Text(_) => None,
            })?;
        }
        self.with_node(node, |n| match &n.kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone()),
            NodeKind::Text(_) => None,
        })
        .flatten()
    }

    pub fn set_attr(&self, node: NodeId, name: &str, value: &str) {
        self.with_node_mut(node, |n| {
            if let NodeKind::Element { attributes, .. } = &mut n.kind {
                match attributes.iter_mut().find(|(n, _)| n == name) {
                    Some(slot) => slot.1 = value.to_string(),
                    None => attributes.push((name.to_string(), value.to_string())),
                }
            }
        });
    }

    /// Current value of a form input
    pub fn value(&self, node: NodeId) -> Option<String> {
        self.attr(node, "value")
    }

    /// Type into a form input
    pub fn set_value(&self, node: NodeId, value: &str) {
        self.set_attr(node, "value", value);
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.with_node(node, |n| match &n.kind {
            NodeKind::Element { classes, .. } => classes.iter().any(|c| c == class),
            NodeKind::Text(_) => false,
        })
        .unwrap_or(false)
    }

    pub fn add_class(&self, node: NodeId, class: &str) {
        self.with_node_mut(node, |n| {
            if let NodeKind::Element { classes, .. } = &mut n.kind
                && !classes.iter().any(|c| c == class)
            {
                classes.push(class.to_string());
            }
        });
    }

    pub fn remove_class(&self, node: NodeId, class: &str) {
        self.with_node_mut(node, |n| {
            if let NodeKind::Element { classes, .. } = &mut n.kind {
                classes.retain(|c| c != class);
            }
        });
    }

    fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        self.with_node(node, |n| match &n.kind {
            NodeKind::Element {
                tag,
                attributes,
                classes,
            } => {
                selector.tag.as_ref().is_none_or(|t| t == tag)
                    && selector.id.as_ref().is_none_or(|id| {
                        attributes.iter().any(|(n, v)| n == "id" && v == id)
                    })
                    && selector
                        .class
                        .as_ref()
                        .is_none_or(|class| classes.iter().any(|c| c == class))
            }
            NodeKind::Text(_) => false,
        })
        .unwrap_or(false)
    }

    /// Descendants of `scope` matching `selector`, in document order
    pub fn query_all(&self, scope: NodeId, selector: &str) -> Vec<NodeId> {
        let selector = Selector::parse(selector);
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            if self.matches(id, &selector) {
                found.push(id);
            }
            stack.extend(self.children(id).into_iter().rev());
        }
        found
    }

    /// First descendant of `scope` matching `selector`
    pub fn query(&self, scope: NodeId, selector: &str) -> Option<NodeId> {
        self.query_all(scope, selector).into_iter().next()
    }

    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.query(self.root(), &format!("#{id}"))
    }

    pub fn find_by_class(&self, scope: NodeId, class: &str) -> Vec<NodeId> {
        self.query_all(scope, &format!(".{class}"))
    }

    /// Concatenated text of the node and its descendants
    pub fn text_content(&self, node: NodeId) -> String {
        let slots = self.inner.slots.borrow();
        let mut out = String::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Some(n) = node_at(&slots, id) else {
                continue;
            };
            match &n.kind {
                NodeKind::Text(content) => out.push_str(content),
                NodeKind::Element { .. } => stack.extend(n.children.iter().rev().copied()),
            }
        }
        out
    }

    /// Register a delegated click handler on `node`.
    ///
    /// The handler runs when a click lands on a descendant of `node`
    /// matching `selector`, or inside such a descendant. It is dropped
    /// when `node` leaves the document.
    pub fn on_click(
        &self,
        node: NodeId,
        selector: &str,
        handler: impl Fn(&Document, &ClickEvent) + 'static,
    ) -> BindingId {
        let id = BindingId(self.inner.next_binding.get());
        self.inner.next_binding.set(id.0 + 1);
        self.inner.bindings.borrow_mut().push(Binding {
            id,
            node,
            selector: Selector::parse(selector),
            handler: Rc::new(handler),
        });
        id
    }

    pub fn off(&self, binding: BindingId) -> bool {
        let mut bindings = self.inner.bindings.borrow_mut();
        let before = bindings.len();
        bindings.retain(|b| b.id != binding);
        bindings.len() != before
    }

    fn is_bound(&self, binding: BindingId) -> bool {
        self.inner.bindings.borrow().iter().any(|b| b.id == binding)
    }

    /// Number of bindings registered on `node`
    pub fn bindings_on(&self, node: NodeId) -> usize {
        self.inner
            .bindings
            .borrow()
            .iter()
            .filter(|b| b.node == node)
            .count()
    }

    /// Simulate a click on `target`, bubbling towards the root.
    ///
    /// Each binding fires at most once, for the closest matching node.
    /// Bindings removed by an earlier handler do not fire. Returns how
    /// many handlers ran.
    pub fn click(&self, target: NodeId) -> usize {
        if !self.is_live(target) {
            return 0;
        }
        let path = self.ancestry(target);
        let bindings: Vec<(BindingId, NodeId, Selector, ClickHandler)> = self
            .inner
            .bindings
            .borrow()
            .iter()
            .map(|b| (b.id, b.node, b.selector.clone(), b.handler.clone()))
            .collect();

        let mut fired = 0;
        for (depth, delegate) in path.iter().enumerate() {
            for (id, node, selector, handler) in &bindings {
                if node != delegate {
                    continue;
                }
                let Some(current) = path[..depth].iter().find(|n| self.matches(**n, selector))
                else {
                    continue;
                };
                if !self.is_bound(*id) {
                    continue;
                }
                debug!(
                    "click {:?} handled by binding {:?} on {:?}",
                    target, id, delegate
                );
                handler(self, &ClickEvent { current: *current });
                fired += 1;
            }
        }
        fired
    }

    /// Serialize the node including its own tag
    pub fn outer_html(&self, node: NodeId) -> String {
        let slots = self.inner.slots.borrow();
        let mut out = String::new();
        Self::write_node(&slots, node, &mut out);
        out
    }

    /// Serialize the node's children
    pub fn inner_html(&self, node: NodeId) -> String {
        let slots = self.inner.slots.borrow();
        let mut out = String::new();
        if let Some(n) = node_at(&slots, node) {
            for child in &n.children {
                Self::write_node(&slots, *child, &mut out);
            }
        }
        out
    }

    fn write_node(slots: &[Slot], id: NodeId, out: &mut String) {
        let Some(node) = node_at(slots, id) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(content) => out.push_str(&html_escape(content)),
            NodeKind::Element {
                tag,
                attributes,
                classes,
            } => {
                open_tag(out, tag, attributes, classes);
                if is_void(tag) {
                    return;
                }
                for child in &node.children {
                    Self::write_node(slots, *child, out);
                }
                close_tag(out, tag);
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.node_count())
            .field("capacity", &self.capacity())
            .field("bindings", &self.inner.bindings.borrow().len())
            .finish()
    }
}
