//! The object variant algebra and the arena-backed `ObjStore` (spec §3).
//!
//! Containers hold `Uid`s of their children rather than nested owned
//! objects: the store is a single flat arena, so a dictionary pointing
//! back to one of its own ancestors through a `Ref` never needs `Rc`,
//! `RefCell`, or a cycle collector. Ownership is unambiguous - every node
//! lives in `ObjStore::nodes` until the store itself is dropped; parent
//! pointers and `Ref.indirect` links are plain, non-owning `Uid`s.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use super::error::{PDFError, PDFResult};
use super::token::{Identifier, TokenKind};
use super::xref::XrefEntry;

/// Arena index. Monotonically increasing; never reused, even across a
/// chain of incremental updates.
pub type Uid = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Pdf,
    Utf8,
    Utf16Be,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateValue {
    pub year: u32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// `None` means unspecified/UT; `Some(minutes)` is the signed offset
    /// from UT in minutes.
    pub tz_offset_minutes: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct IndirectNode {
    pub identifier: Identifier,
    pub direct: Option<Uid>,
}

#[derive(Debug, Clone)]
pub struct RefNode {
    pub identifier: Identifier,
    /// Resolved in orchestrator phase 3/6; points at the `Indirect` node,
    /// never directly at its `direct` child (see invariant 3).
    pub indirect: Option<Uid>,
}

#[derive(Debug, Clone)]
pub struct StreamNode {
    pub dictionary: Option<Uid>,
    pub source_start: Option<usize>,
    pub source_end: Option<usize>,
    pub stream_type: Option<String>,
    pub direct: Option<Uid>,
}

#[derive(Debug, Clone)]
pub struct XrefNode {
    pub widths: [u8; 3],
    pub subsections: Vec<(u64, u64)>,
    pub entries: Vec<(u64, XrefEntry)>,
}

#[derive(Debug, Clone, Default)]
pub struct TableNode {
    pub children: Vec<Uid>,
    pub xref_table: Option<Uid>,
    pub xref_obj: Option<Uid>,
    pub trailer: Option<Uid>,
    pub startxref: Option<u64>,
}

#[derive(Debug, Clone)]
pub enum Node {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(String),
    Text {
        value: String,
        encoding: TextEncoding,
        token_kind: TokenKind,
    },
    Bytes(Vec<u8>),
    Date(DateValue),
    Comment(String),
    Junk(String),
    Op(String),
    Array(Vec<Uid>),
    Dictionary(IndexMap<String, Uid>),
    Content(Vec<Uid>),
    Root(Vec<Uid>),
    Table(TableNode),
    Indirect(IndirectNode),
    Ref(RefNode),
    Stream(StreamNode),
    Xref(XrefNode),
}

impl Node {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Null => "null",
            Node::Boolean(_) => "boolean",
            Node::Integer(_) => "integer",
            Node::Real(_) => "real",
            Node::Name(_) => "name",
            Node::Text { .. } => "text",
            Node::Bytes(_) => "bytes",
            Node::Date(_) => "date",
            Node::Comment(_) => "comment",
            Node::Junk(_) => "junk",
            Node::Op(_) => "op",
            Node::Array(_) => "array",
            Node::Dictionary(_) => "dictionary",
            Node::Content(_) => "content",
            Node::Root(_) => "root",
            Node::Table(_) => "table",
            Node::Indirect(_) => "indirect",
            Node::Ref(_) => "ref",
            Node::Stream(_) => "stream",
            Node::Xref(_) => "xref",
        }
    }
}

/// The engine's single arena, owning every `Node` produced during a run.
pub struct ObjStore {
    nodes: Vec<Node>,
    parents: Vec<Option<Uid>>,
    indirects: FxHashMap<Identifier, Uid>,
    refs: Vec<Uid>,
    streams: Vec<Uid>,
    pub root: Uid,
    pub catalog: Option<Uid>,
    pub pdf_version: Option<String>,
}

impl ObjStore {
    pub fn new() -> Self {
        let mut store = ObjStore {
            nodes: Vec::new(),
            parents: Vec::new(),
            indirects: FxHashMap::default(),
            refs: Vec::new(),
            streams: Vec::new(),
            root: 0,
            catalog: None,
            pdf_version: None,
        };
        store.root = store.alloc(Node::Root(Vec::new()), None);
        store
    }

    fn alloc(&mut self, node: Node, parent: Option<Uid>) -> Uid {
        let uid = self.nodes.len();
        self.nodes.push(node);
        self.parents.push(parent);
        uid
    }

    /// Creates a node and records `parent` as its non-owning back-pointer.
    /// Does not insert it into the parent's children - callers (the
    /// lexer's insertion rules) do that via the `append_*` helpers below,
    /// since the insertion rule depends on the parent's kind.
    pub fn create(&mut self, node: Node, parent: Uid) -> Uid {
        match &node {
            Node::Ref(_) => {
                let uid = self.alloc(node, Some(parent));
                self.refs.push(uid);
                uid
            }
            Node::Stream(_) => {
                let uid = self.alloc(node, Some(parent));
                self.streams.push(uid);
                uid
            }
            _ => self.alloc(node, Some(parent)),
        }
    }

    pub fn create_indirect(&mut self, identifier: Identifier, parent: Uid) -> Uid {
        let uid = self.alloc(
            Node::Indirect(IndirectNode {
                identifier,
                direct: None,
            }),
            Some(parent),
        );
        // Invariant 2: later redefinitions overwrite only the identifier
        // index; the prior Indirect node remains reachable from its
        // original parent.
        self.indirects.insert(identifier, uid);
        uid
    }

    pub fn get(&self, uid: Uid) -> &Node {
        &self.nodes[uid]
    }

    pub fn get_mut(&mut self, uid: Uid) -> &mut Node {
        &mut self.nodes[uid]
    }

    pub fn parent_of(&self, uid: Uid) -> Option<Uid> {
        self.parents[uid]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Uid, &Node)> {
        self.nodes.iter().enumerate()
    }

    pub fn indirect_uid(&self, identifier: Identifier) -> Option<Uid> {
        self.indirects.get(&identifier).copied()
    }

    pub fn ref_uids(&self) -> &[Uid] {
        &self.refs
    }

    pub fn stream_uids(&self) -> &[Uid] {
        &self.streams
    }

    /// Appends `child` to `parent`'s ordered children, per the insertion
    /// rule for that parent kind (spec §4.4 "Insertion rules by parent
    /// type"). Returns an error only for parent kinds that cannot accept
    /// positional children (`Stream`, `Ref`, scalars) - the lexer treats
    /// that as a warning-worthy event, not a hard failure.
    pub fn append_child(&mut self, parent: Uid, child: Uid) -> PDFResult<()> {
        match &mut self.nodes[parent] {
            Node::Array(children) | Node::Content(children) => {
                children.push(child);
                Ok(())
            }
            Node::Root(tables) => {
                tables.push(child);
                Ok(())
            }
            Node::Table(table) => {
                table.children.push(child);
                Ok(())
            }
            Node::Indirect(indirect) => {
                if indirect.direct.is_some() {
                    return Err(PDFError::Generic("multiple_children".into()));
                }
                indirect.direct = Some(child);
                Ok(())
            }
            other => Err(PDFError::Generic(format!(
                "cannot insert into parent of kind {}",
                other.kind_name()
            ))),
        }
    }

    pub fn insert_dict_entry(&mut self, parent: Uid, key: String, value: Uid) -> PDFResult<()> {
        match &mut self.nodes[parent] {
            Node::Dictionary(map) => {
                map.insert(key, value);
                Ok(())
            }
            other => Err(PDFError::Generic(format!(
                "cannot insert dictionary entry into parent of kind {}",
                other.kind_name()
            ))),
        }
    }

    pub fn table_mut(&mut self, uid: Uid) -> Option<&mut TableNode> {
        match &mut self.nodes[uid] {
            Node::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Walks `parent` pointers up from `uid` until a `Table` node is
    /// found (used to attach a decoded xref stream to its enclosing
    /// revision, spec §4.5.2).
    pub fn enclosing_table(&self, uid: Uid) -> Option<Uid> {
        let mut cur = Some(uid);
        while let Some(u) = cur {
            if matches!(self.nodes[u], Node::Table(_)) {
                return Some(u);
            }
            cur = self.parents[u];
        }
        None
    }

    pub fn dict_get<'a>(&'a self, dict_uid: Uid, key: &str) -> Option<Uid> {
        match &self.nodes[dict_uid] {
            Node::Dictionary(map) => map.get(key).copied(),
            _ => None,
        }
    }

    /// Dereferences `uid` once if it's a `Ref` whose `indirect` has been
    /// resolved, returning the `Indirect`'s `direct` child. Otherwise
    /// returns `uid` unchanged (including unresolved refs).
    pub fn deref(&self, uid: Uid) -> Uid {
        if let Node::Ref(r) = &self.nodes[uid] {
            if let Some(indirect_uid) = r.indirect {
                if let Node::Indirect(ind) = &self.nodes[indirect_uid] {
                    if let Some(direct) = ind.direct {
                        return direct;
                    }
                }
            }
        }
        uid
    }
}

impl Default for ObjStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_store_has_root_at_uid_zero() {
        let store = ObjStore::new();
        assert_eq!(store.root, 0);
        assert!(matches!(store.get(0), Node::Root(children) if children.is_empty()));
    }

    #[test]
    fn indirect_redefinition_overwrites_index_but_keeps_old_node_reachable() {
        let mut store = ObjStore::new();
        let id = Identifier { num: 1, gen: 0 };
        let first = store.create_indirect(id, store.root);
        let second = store.create_indirect(id, store.root);
        assert_ne!(first, second);
        assert_eq!(store.indirect_uid(id), Some(second));
        // The first node is still present in the arena.
        assert!(matches!(store.get(first), Node::Indirect(_)));
    }

    #[test]
    fn append_child_rejects_second_indirect_child() {
        let mut store = ObjStore::new();
        let id = Identifier { num: 1, gen: 0 };
        let indirect = store.create_indirect(id, store.root);
        let a = store.create(Node::Integer(1), indirect);
        let b = store.create(Node::Integer(2), indirect);
        assert!(store.append_child(indirect, a).is_ok());
        assert!(store.append_child(indirect, b).is_err());
    }

    #[test]
    fn deref_follows_ref_to_indirect_direct() {
        let mut store = ObjStore::new();
        let id = Identifier { num: 5, gen: 0 };
        let indirect = store.create_indirect(id, store.root);
        let value = store.create(Node::Integer(42), indirect);
        store.append_child(indirect, value).unwrap();

        let r = store.create(
            Node::Ref(RefNode {
                identifier: id,
                indirect: Some(indirect),
            }),
            store.root,
        );
        assert_eq!(store.deref(r), value);
    }
}
