//! Token sequence → object tree (spec §4.4). The `Lexer` is a
//! push-automaton: each `push_token` call advances a parent stack and
//! returns whatever object (if any) that token produced, plus any
//! warnings raised along the way. It never looks back at the tokenizer;
//! all lookahead PDF needs lives in the `Tokenizer`'s buffering.

use super::constants::{DATE_PREFIX, UTF16BE_BOM, UTF8_BOM};
use super::date::parse_date;
use super::error::Warning;
use super::object::{Node, ObjStore, RefNode, StreamNode, TableNode, TextEncoding, Uid};
use super::token::{Token, TokenKind, TokenPayload};

pub struct LexResult {
    pub produced: Option<Uid>,
    pub warnings: Vec<Warning>,
}

enum PendingKey {
    None,
    /// Dictionary is expecting a key next.
    AwaitingKey,
    /// Dictionary has `key`, awaiting its value.
    AwaitingValue(String),
}

struct Frame {
    uid: Uid,
    key_state: PendingKey,
}

pub struct Lexer {
    stack: Vec<Frame>,
    pending_xref: Option<(super::token::XrefSectionPayload, usize)>,
    pending_trailer: bool,
}

impl Lexer {
    /// Starts a lexer whose bottom-of-stack frame is `root_parent`
    /// (typically the store's `root` for a document-level parse, or any
    /// container for a sub-parse such as an `ObjStm` expansion or a
    /// content stream).
    pub fn new(root_parent: Uid) -> Self {
        Lexer {
            stack: vec![Frame {
                uid: root_parent,
                key_state: PendingKey::None,
            }],
            pending_xref: None,
            pending_trailer: false,
        }
    }

    fn top(&self) -> Uid {
        self.stack.last().unwrap().uid
    }

    pub fn push_token(&mut self, store: &mut ObjStore, token: Token) -> LexResult {
        let mut warnings = Vec::new();
        if let Some(w) = token.warning.clone() {
            warnings.push(w);
        }

        let produced = match token.kind {
            TokenKind::Space => None,
            TokenKind::Comment => {
                let text = token.as_text().unwrap_or_default().to_string();
                Some(self.insert_scalar(store, Node::Comment(text), &mut warnings, &token))
            }
            TokenKind::Junk => {
                let text = token.as_text().unwrap_or_default().to_string();
                Some(self.insert_scalar(store, Node::Junk(text), &mut warnings, &token))
            }
            TokenKind::Null => Some(self.insert_scalar(store, Node::Null, &mut warnings, &token)),
            TokenKind::Boolean => {
                let value = matches!(token.payload, TokenPayload::Bool(true));
                Some(self.insert_scalar(store, Node::Boolean(value), &mut warnings, &token))
            }
            TokenKind::Integer => {
                let n = token.as_number().unwrap_or(0.0) as i64;
                Some(self.insert_scalar(store, Node::Integer(n), &mut warnings, &token))
            }
            TokenKind::Real => {
                let n = token.as_number().unwrap_or(0.0);
                Some(self.insert_scalar(store, Node::Real(n), &mut warnings, &token))
            }
            TokenKind::Name => {
                let name = token.as_text().unwrap_or_default().to_string();
                Some(self.insert_scalar(store, Node::Name(name), &mut warnings, &token))
            }
            TokenKind::Op => {
                let op = token.as_text().unwrap_or_default().to_string();
                Some(self.insert_scalar(store, Node::Op(op), &mut warnings, &token))
            }
            TokenKind::String | TokenKind::HexString => {
                let bytes = token.as_bytes().unwrap_or_default().to_vec();
                let is_hex = token.kind == TokenKind::HexString;
                let node = classify_string(&bytes, is_hex);
                Some(self.insert_scalar(store, node, &mut warnings, &token))
            }
            TokenKind::ArrayStart => {
                let uid = store.create(Node::Array(Vec::new()), self.top());
                self.insert_into_parent(store, uid, &mut warnings, &token);
                self.stack.push(Frame {
                    uid,
                    key_state: PendingKey::None,
                });
                None
            }
            TokenKind::DictStart => {
                let uid = store.create(Node::Dictionary(Default::default()), self.top());
                self.insert_into_parent(store, uid, &mut warnings, &token);
                self.stack.push(Frame {
                    uid,
                    key_state: PendingKey::AwaitingKey,
                });
                None
            }
            TokenKind::ArrayEnd => {
                self.pop_matching(store, |n| matches!(n, Node::Array(_)), &mut warnings, &token);
                None
            }
            TokenKind::DictEnd => {
                self.pop_matching(store, |n| matches!(n, Node::Dictionary(_)), &mut warnings, &token);
                None
            }
            TokenKind::IndirectStart => {
                let identifier = token.as_identifier().unwrap_or(super::token::Identifier::UNKNOWN);
                let uid = store.create_indirect(identifier, self.top());
                self.insert_into_parent(store, uid, &mut warnings, &token);
                self.stack.push(Frame {
                    uid,
                    key_state: PendingKey::None,
                });
                None
            }
            TokenKind::IndirectEnd => {
                self.pop_matching(store, |n| matches!(n, Node::Indirect(_)), &mut warnings, &token);
                None
            }
            TokenKind::Ref => {
                let identifier = token.as_identifier().unwrap_or(super::token::Identifier::UNKNOWN);
                let uid = store.create(
                    Node::Ref(RefNode {
                        identifier,
                        indirect: None,
                    }),
                    self.top(),
                );
                self.insert_into_parent(store, uid, &mut warnings, &token);
                Some(uid)
            }
            TokenKind::Stream => {
                Some(self.handle_stream(store, &token, &mut warnings))
            }
            TokenKind::Xref => {
                if let TokenPayload::Xref(payload) = token.payload.clone() {
                    self.pending_xref = Some((payload, token.start));
                }
                None
            }
            TokenKind::Trailer => {
                self.pending_trailer = true;
                None
            }
            TokenKind::Eof => {
                Some(self.handle_eof(store, &token, &mut warnings))
            }
        };

        LexResult { produced, warnings }
    }

    fn insert_scalar(&mut self, store: &mut ObjStore, node: Node, warnings: &mut Vec<Warning>, token: &Token) -> Uid {
        let uid = store.create(node, self.top());
        self.insert_into_parent(store, uid, warnings, token);
        uid
    }

    /// Implements the "insertion rules by parent type" table (spec
    /// §4.4): arrays/content/tables append positionally; dictionaries
    /// alternate key/value; indirects take exactly one child.
    fn insert_into_parent(&mut self, store: &mut ObjStore, child: Uid, warnings: &mut Vec<Warning>, token: &Token) {
        let parent_uid = self.top();
        let is_dict = matches!(store.get(parent_uid), Node::Dictionary(_));
        if is_dict {
            self.insert_into_dictionary(store, child, warnings, token);
            return;
        }
        if let Err(_) = store.append_child(parent_uid, child) {
            warnings.push(
                Warning::new("lexer:invalid_token:misplaced_child", format!(
                    "token of kind {:?} cannot be inserted here", token.kind
                ))
                .at(token.start),
            );
        }
    }

    fn insert_into_dictionary(&mut self, store: &mut ObjStore, child: Uid, warnings: &mut Vec<Warning>, token: &Token) {
        let frame = self.stack.last_mut().unwrap();
        match std::mem::replace(&mut frame.key_state, PendingKey::None) {
            PendingKey::None | PendingKey::AwaitingKey => {
                let key = match store.get(child) {
                    Node::Name(s) => Some(s.clone()),
                    Node::Text { value, .. } => Some(value.clone()),
                    _ => None,
                };
                match key {
                    Some(key) => {
                        frame.key_state = PendingKey::AwaitingValue(key);
                    }
                    None => {
                        warnings.push(
                            Warning::new(
                                "lexer:invalid_token:integer:invalid_key",
                                "non-scalar token used as dictionary key",
                            )
                            .at(token.start),
                        );
                        frame.key_state = PendingKey::AwaitingValue(String::new());
                    }
                }
            }
            PendingKey::AwaitingValue(key) => {
                let parent_uid = self.top();
                let _ = store.insert_dict_entry(parent_uid, key, child);
                self.stack.last_mut().unwrap().key_state = PendingKey::AwaitingKey;
            }
        }
    }

    fn pop_matching(&mut self, store: &mut ObjStore, matches_kind: impl Fn(&Node) -> bool, warnings: &mut Vec<Warning>, token: &Token) {
        if self.stack.len() <= 1 {
            warnings.push(
                Warning::new("lexer:invalid_token:missing_start", "container close with empty stack")
                    .at(token.start),
            );
            return;
        }
        if matches_kind(store.get(self.top())) {
            self.stack.pop();
            return;
        }
        warnings.push(
            Warning::new("lexer:invalid_token:missing_end", "mismatched container close; unwinding stack")
                .at(token.start),
        );
        while self.stack.len() > 1 && !matches_kind(store.get(self.top())) {
            self.stack.pop();
        }
        if self.stack.len() > 1 {
            self.stack.pop();
        } else {
            warnings.push(
                Warning::new("lexer:invalid_token:missing_start", "no matching opener found on stack")
                    .at(token.start),
            );
        }
    }

    fn handle_stream(&mut self, store: &mut ObjStore, token: &Token, warnings: &mut Vec<Warning>) -> Uid {
        let (body_start, body_end) = match token.payload {
            TokenPayload::Stream { start, end } => (start, end),
            _ => (0, 0),
        };
        let parent_uid = self.top();
        let dict_uid = match store.get(parent_uid) {
            Node::Indirect(ind) => ind.direct,
            _ => None,
        };
        let dict_is_dictionary = dict_uid.map(|u| matches!(store.get(u), Node::Dictionary(_))).unwrap_or(false);

        if !matches!(store.get(parent_uid), Node::Indirect(_)) || !dict_is_dictionary {
            warnings.push(
                Warning::new(
                    "lexer:invalid_token:misplaced_stream",
                    "'stream' token outside an Indirect whose direct child is a Dictionary",
                )
                .at(token.start),
            );
            return store.create(
                Node::Stream(StreamNode {
                    dictionary: None,
                    source_start: Some(body_start),
                    source_end: Some(body_end),
                    stream_type: None,
                    direct: None,
                }),
                parent_uid,
            );
        }

        // detach the dictionary from the Indirect, then attach a Stream
        // wrapping it in its place.
        if let Node::Indirect(ind) = store.get_mut(parent_uid) {
            ind.direct = None;
        }
        let stream_uid = store.create(
            Node::Stream(StreamNode {
                dictionary: dict_uid,
                source_start: Some(body_start),
                source_end: Some(body_end),
                stream_type: None,
                direct: None,
            }),
            parent_uid,
        );
        let _ = store.append_child(parent_uid, stream_uid);
        stream_uid
    }

    fn handle_eof(&mut self, store: &mut ObjStore, token: &Token, warnings: &mut Vec<Warning>) -> Uid {
        // pop until a Table is on top
        while self.stack.len() > 1 && !matches!(store.get(self.top()), Node::Table(_)) {
            self.stack.pop();
        }
        let table_uid = if matches!(store.get(self.top()), Node::Table(_)) {
            self.top()
        } else {
            // no table was ever opened (degenerate input); create one now
            let root = store.root;
            let uid = store.create(Node::Table(TableNode::default()), root);
            let _ = store.append_child(root, uid);
            uid
        };

        if let Some((payload, xref_start)) = self.pending_xref.take() {
            let entries: Vec<_> = payload
                .entries
                .iter()
                .map(|raw| super::xref::classical_entry(*raw))
                .collect();
            let numbered: Vec<(u64, super::xref::XrefEntry)> = entries
                .into_iter()
                .enumerate()
                .map(|(i, e)| (payload.start_num + i as u64, e))
                .collect();
            let xref_uid = store.create(
                Node::Xref(super::object::XrefNode {
                    widths: [1, 4, 1],
                    subsections: vec![(payload.start_num, payload.entries.len() as u64)],
                    entries: numbered,
                }),
                table_uid,
            );
            let _ = xref_start;
            if let Some(table) = store.table_mut(table_uid) {
                table.xref_table = Some(xref_uid);
            }
        }

        if self.pending_trailer {
            // the trailer dictionary, if any, was already lexed as a
            // normal child of the current frame before this eof token
            // arrived; find the most recent Dictionary child of the
            // table and claim it as the trailer.
            if let Node::Table(table) = store.get(table_uid) {
                let trailer_child = table.children.iter().rev().find(|&&uid| matches!(store.get(uid), Node::Dictionary(_))).copied();
                if let Some(uid) = trailer_child {
                    if let Some(table) = store.table_mut(table_uid) {
                        table.trailer = Some(uid);
                    }
                } else {
                    warnings.push(
                        Warning::new("lexer:invalid_token:missing_trailer", "'trailer' keyword with no following dictionary")
                            .at(token.start),
                    );
                }
            }
            self.pending_trailer = false;
        }

        if let TokenPayload::Eof(offset) = token.payload {
            if let Some(table) = store.table_mut(table_uid) {
                table.startxref = Some(offset);
            }
        }

        // reset to Root and open a fresh Table for a possible incremental update.
        self.stack.truncate(1);
        self.stack[0].uid = store.root;
        let root = store.root;
        let new_table = store.create(Node::Table(TableNode::default()), root);
        let _ = store.append_child(root, new_table);
        self.stack.push(Frame {
            uid: new_table,
            key_state: PendingKey::None,
        });

        table_uid
    }
}

/// String classification per spec §4.4.1: date sniff, BOM sniff, hex vs.
/// literal fallback to PDFDocEncoding.
fn classify_string(bytes: &[u8], was_hex: bool) -> Node {
    if bytes.starts_with(&DATE_PREFIX) {
        if let Some(date) = parse_date(bytes) {
            return Node::Date(date);
        }
    }
    if bytes.starts_with(&UTF8_BOM) {
        let text = String::from_utf8_lossy(&bytes[UTF8_BOM.len()..]).into_owned();
        return Node::Text {
            value: text,
            encoding: TextEncoding::Utf8,
            token_kind: TokenKind::String,
        };
    }
    if bytes.starts_with(&UTF16BE_BOM) {
        let rest = &bytes[UTF16BE_BOM.len()..];
        let units: Vec<u16> = rest
            .chunks(2)
            .map(|c| if c.len() == 2 { u16::from_be_bytes([c[0], c[1]]) } else { c[0] as u16 })
            .collect();
        let text = String::from_utf16_lossy(&units);
        return Node::Text {
            value: text,
            encoding: TextEncoding::Utf16Be,
            token_kind: TokenKind::String,
        };
    }
    if was_hex {
        return Node::Bytes(bytes.to_vec());
    }
    let text: String = bytes.iter().map(|&b| super::constants::pdfdoc_to_char(b)).collect();
    Node::Text {
        value: text,
        encoding: TextEncoding::Pdf,
        token_kind: TokenKind::String,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reader::MemoryReader;
    use crate::core::tokenizer::Tokenizer;

    fn run(input: &[u8]) -> (ObjStore, Vec<Warning>) {
        let mut store = ObjStore::new();
        let root = store.root;
        let table = store.create(Node::Table(TableNode::default()), root);
        let _ = store.append_child(root, table);
        let mut lexer = Lexer::new(table);
        let mut tokenizer = Tokenizer::new(MemoryReader::new(input.to_vec()));
        let mut warnings = Vec::new();
        while let Some(tok) = tokenizer.next_token().unwrap() {
            let is_eof = tok.kind == TokenKind::Eof;
            let result = lexer.push_token(&mut store, tok);
            warnings.extend(result.warnings);
            if is_eof {
                break;
            }
        }
        (store, warnings)
    }

    #[test]
    fn dictionary_key_value_pairs_round_trip() {
        let (store, warnings) = run(b"<< /Type /Catalog >>");
        assert!(warnings.is_empty());
        let dict_uid = 1; // table at 0? root at0/table at1/dict at2 -- find by scan
        let _ = dict_uid;
        let dict = store.iter().find_map(|(uid, n)| match n {
            Node::Dictionary(m) if m.contains_key("Type") => Some(uid),
            _ => None,
        });
        assert!(dict.is_some());
        let uid = dict.unwrap();
        let type_uid = store.dict_get(uid, "Type").unwrap();
        assert!(matches!(store.get(type_uid), Node::Name(n) if n == "Catalog"));
    }

    #[test]
    fn non_name_key_warns_but_continues() {
        let (store, warnings) = run(b"<< 1 (X) >>");
        assert!(warnings.iter().any(|w| w.code.contains("invalid_key")));
        let dict = store.iter().find(|(_, n)| matches!(n, Node::Dictionary(_)));
        assert!(dict.is_some());
    }

    #[test]
    fn indirect_object_attaches_single_direct_child() {
        let (store, _warnings) = run(b"1 0 obj\n<< /A 1 >>\nendobj\n");
        let indirect = store.iter().find_map(|(uid, n)| match n {
            Node::Indirect(i) if i.identifier.num == 1 => Some(uid),
            _ => None,
        }).unwrap();
        if let Node::Indirect(i) = store.get(indirect) {
            assert!(i.direct.is_some());
        } else {
            panic!("expected indirect");
        }
    }

    #[test]
    fn mismatched_close_unwinds_to_matching_opener() {
        let (_store, warnings) = run(b"[ 1 2 >> 3 ]");
        assert!(warnings.iter().any(|w| w.code.contains("missing") || w.code.contains("invalid_token")));
    }
}
