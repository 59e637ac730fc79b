//! The parser orchestrator (spec §4.5): drives header check, body parse,
//! reference resolution, stream classification, stream sub-parsing, and
//! catalog detection in strict phase order. This is the engine's single
//! public entry point; everything else in `core` is a callee.

use std::path::Path;

use super::decode::{decode_filters, FilterSpec, PredictorParams};
use super::error::{PDFError, PDFResult, Warning};
use super::lexer::Lexer;
use super::object::{Node, ObjStore, TableNode, Uid, XrefNode};
use super::reader::{MemoryReader, OffsetReader, SequentialReader};
use super::token::{Identifier, TokenKind};
use super::tokenizer::Tokenizer;
use super::xref::{decode_xref_stream, XrefStreamLayout};

/// Result of a completed `run`: the populated object store plus every
/// warning raised along the way, in phase order.
pub struct Document {
    pub store: ObjStore,
    pub warnings: Vec<Warning>,
}

/// Tuning knobs for a single `run` (spec §4.5).
///
/// `on_token`/`on_lexer` mirror the spec's observable callbacks. They see a
/// `Uid` rather than a borrowed `&Node` - the store is being mutated for the
/// remainder of the phase, so handing back a live reference would pin it;
/// callers can resolve the `Uid` against `Document::store` once `run`
/// returns.
#[derive(Default)]
pub struct ParserOptions {
    pub abort_on_warning: bool,
    pub on_token: Option<Box<dyn FnMut(&super::token::Token)>>,
    pub on_lexer: Option<Box<dyn FnMut(Option<Uid>, &[Warning])>>,
}

/// Namespace for the engine's three loading entry points (spec §6).
pub struct Engine;

impl Engine {
    pub fn load_document_from_array(bytes: Vec<u8>, options: ParserOptions) -> PDFResult<Document> {
        Self::load_document_from_reader(MemoryReader::new(bytes), options)
    }

    pub fn load_document_from_reader<R>(reader: R, options: ParserOptions) -> PDFResult<Document>
    where
        R: SequentialReader + OffsetReader,
    {
        run(reader, options)
    }

    pub fn load_document_from_file(
        path: impl AsRef<Path>,
        options: ParserOptions,
    ) -> PDFResult<Document> {
        let bytes = std::fs::read(path).map_err(PDFError::from)?;
        Self::load_document_from_array(bytes, options)
    }
}

/// Drives the eight orchestrator phases in strict order (spec §4.5, §5).
pub fn run<R>(mut reader: R, mut options: ParserOptions) -> PDFResult<Document>
where
    R: SequentialReader + OffsetReader,
{
    let mut store = ObjStore::new();
    let mut warnings = Vec::new();

    // Phase 1: header.
    let version = parse_header(&mut reader)?;
    store.pdf_version = Some(version.clone());
    if !super::constants::SUPPORTED_VERSIONS.contains(&version.as_str()) {
        warnings.push(Warning::new(
            "parser:unsupported_version",
            format!("PDF version {} is not in the supported set", version),
        ));
    }
    if options.abort_on_warning && !warnings.is_empty() {
        return Ok(Document { store, warnings });
    }

    // Phase 2: body parse. A `Tokenizer` latches `finished` the moment it
    // emits one `Eof` token (the `%%EOF` after a revision's `startxref`),
    // so a document with incremental updates needs one `Tokenizer` per
    // revision, all driving the same `Lexer` - its `handle_eof` already
    // closes the current `Table` and opens the next one, so the lexer
    // itself carries no per-revision state that needs resetting here.
    let phase2_start = warnings.len();
    let root = store.root;
    let first_table = store.create(Node::Table(TableNode::default()), root);
    store.append_child(root, first_table).ok();
    let mut lexer = Lexer::new(first_table);
    let mut reader = reader;
    loop {
        let mut tokenizer = Tokenizer::new(reader);
        loop {
            let token = match tokenizer.next_token()? {
                Some(t) => t,
                None => break,
            };
            if let Some(cb) = options.on_token.as_mut() {
                cb(&token);
            }
            let result = lexer.push_token(&mut store, token);
            if let Some(cb) = options.on_lexer.as_mut() {
                cb(result.produced, &result.warnings);
            }
            warnings.extend(result.warnings);
        }
        reader = tokenizer.into_reader();
        if reader.offset() >= reader.length() {
            break;
        }
    }
    if options.abort_on_warning && warnings.len() > phase2_start {
        return Ok(Document { store, warnings });
    }

    // Phase 3: resolve refs, first pass.
    let phase3_start = warnings.len();
    resolve_refs(&mut store);
    if options.abort_on_warning && warnings.len() > phase3_start {
        return Ok(Document { store, warnings });
    }

    // Phase 4: classify streams.
    let phase4_start = warnings.len();
    classify_streams(&mut store);
    if options.abort_on_warning && warnings.len() > phase4_start {
        return Ok(Document { store, warnings });
    }

    // Phase 5: decode + sub-parse streams.
    let phase5_start = warnings.len();
    decode_streams(&mut store, &reader, &mut warnings, options.abort_on_warning);

    // Phase 6: resolve refs, second pass (ObjStm expansion added Indirects).
    resolve_refs(&mut store);
    if options.abort_on_warning && warnings.len() > phase5_start {
        return Ok(Document { store, warnings });
    }

    // Phase 7: resolve catalog.
    resolve_catalog(&mut store);

    // Phase 8: missing refs.
    for &ref_uid in store.ref_uids().to_vec().iter() {
        let (identifier, unresolved) = match store.get(ref_uid) {
            Node::Ref(r) => (r.identifier, r.indirect.is_none()),
            _ => continue,
        };
        if unresolved {
            warnings.push(Warning::new(
                "invalid:ref:identifier",
                format!(
                    "unresolved reference to {} {} R",
                    identifier.num, identifier.gen
                ),
            ));
        }
    }

    Ok(Document { store, warnings })
}

/// Matches `^%PDF-(\d+\.\d+)[\r\n]+` against the first bytes of `reader`
/// (spec §4.5 phase 1), consuming exactly the matched span so the body
/// parse starts immediately after it.
fn parse_header<R: SequentialReader>(reader: &mut R) -> PDFResult<String> {
    if reader.length() < 255 {
        return Err(PDFError::NotAPdf {
            reason: "not_pdf:filesize".into(),
        });
    }
    let peek = reader.read_array(20, false)?;
    let text: String = peek.iter().map(|&b| b as char).collect();
    let (version, consumed) = match_pdf_header(&text).ok_or_else(|| PDFError::NotAPdf {
        reason: "not_pdf:invalid_header".into(),
    })?;
    reader.consume(consumed)?;
    Ok(version)
}

fn match_pdf_header(text: &str) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    let prefix = b"%PDF-";
    if bytes.len() < prefix.len() || &bytes[..prefix.len()] != prefix {
        return None;
    }
    let mut pos = prefix.len();
    let major_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos == major_start || pos >= bytes.len() || bytes[pos] != b'.' {
        return None;
    }
    pos += 1;
    let minor_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos == minor_start {
        return None;
    }
    let version = text[major_start..pos].to_string();
    let eol_start = pos;
    while pos < bytes.len() && (bytes[pos] == b'\r' || bytes[pos] == b'\n') {
        pos += 1;
    }
    if pos == eol_start {
        return None;
    }
    Some((version, pos))
}

/// Spec §4.5 phase 3/6: points every `Ref.indirect` at its identifier's
/// current entry in the store's index. Idempotent - re-running it after
/// nothing has changed leaves every resolved `Ref` untouched (spec §8
/// property 2).
fn resolve_refs(store: &mut ObjStore) {
    let ref_uids: Vec<Uid> = store.ref_uids().to_vec();
    for uid in ref_uids {
        let identifier = match store.get(uid) {
            Node::Ref(r) => r.identifier,
            _ => continue,
        };
        if let Some(indirect_uid) = store.indirect_uid(identifier) {
            if let Node::Ref(r) = store.get_mut(uid) {
                r.indirect = Some(indirect_uid);
            }
        }
    }
}

fn dict_lookup(store: &ObjStore, dict: Uid, key: &str) -> Option<Uid> {
    store.dict_get(dict, key).map(|uid| store.deref(uid))
}

fn dict_name(store: &ObjStore, dict: Uid, key: &str) -> Option<String> {
    match dict_lookup(store, dict, key) {
        Some(uid) => match store.get(uid) {
            Node::Name(n) => Some(n.clone()),
            _ => None,
        },
        None => None,
    }
}

fn dict_int(store: &ObjStore, dict: Uid, key: &str) -> Option<i64> {
    match dict_lookup(store, dict, key) {
        Some(uid) => match store.get(uid) {
            Node::Integer(n) => Some(*n),
            Node::Real(n) => Some(*n as i64),
            _ => None,
        },
        None => None,
    }
}

/// Spec §4.5 phase 4: derives each stream's `streamType` from its
/// dictionary's `/Type` and `/Subtype` (or `/S`), defaulting to `XObject`
/// when the subtype alone identifies a form or image. A stream with
/// neither key defaults to `Content` - a page's `/Contents` stream is
/// never self-describing; it's only identifiable by the page dictionary
/// pointing at it, which this phase doesn't have in view, so "no /Type at
/// all" is treated as the content-stream case.
fn classify_streams(store: &mut ObjStore) {
    let stream_uids: Vec<Uid> = store.stream_uids().to_vec();
    for stream_uid in stream_uids {
        let dict_uid = match store.get(stream_uid) {
            Node::Stream(s) => s.dictionary,
            _ => None,
        };
        let Some(dict_uid) = dict_uid else { continue };

        let type_name = dict_name(store, dict_uid, "Type");
        let subtype_name = dict_name(store, dict_uid, "Subtype").or_else(|| dict_name(store, dict_uid, "S"));

        let effective_type = type_name.clone().or_else(|| {
            subtype_name
                .as_deref()
                .filter(|s| *s == "Form" || *s == "Image")
                .map(|_| "XObject".to_string())
        });

        let combined = match (&effective_type, &subtype_name) {
            (Some(t), Some(s)) => format!("{}/{}", t, s),
            (Some(t), None) => t.clone(),
            (None, Some(s)) => s.clone(),
            (None, None) => "Content".to_string(),
        };

        if let Node::Stream(s) = store.get_mut(stream_uid) {
            s.stream_type = Some(combined);
        }
    }
}

/// Spec §4.5 phase 5: for each classified stream, adjusts its byte range
/// against `/Length`, assembles its filter chain, decodes it, and
/// dispatches the decoded bytes to the sub-parser appropriate for its
/// `streamType`.
fn decode_streams<R: OffsetReader>(
    store: &mut ObjStore,
    reader: &R,
    warnings: &mut Vec<Warning>,
    abort_on_warning: bool,
) {
    let stream_uids: Vec<Uid> = store.stream_uids().to_vec();
    for stream_uid in stream_uids {
        let before = warnings.len();
        let (dict_uid, mut start, mut end, stream_type) = match store.get(stream_uid) {
            Node::Stream(s) => (s.dictionary, s.source_start.unwrap_or(0), s.source_end.unwrap_or(0), s.stream_type.clone()),
            _ => continue,
        };
        let Some(dict_uid) = dict_uid else {
            continue;
        };

        if dict_lookup(store, dict_uid, "F").is_some() {
            warnings.push(Warning::new(
                "parser:invalid_stream:external_file",
                "stream declares /F (external file); external-file streams are unsupported",
            ));
        }

        if let Some(length) = dict_int(store, dict_uid, "Length") {
            let length = length.max(0) as usize;
            let actual = end.saturating_sub(start);
            if length != actual {
                let diff = (length as i64 - actual as i64).abs();
                if diff > 2 {
                    warnings.push(Warning::new(
                        "parser:invalid_stream:length_mismatch",
                        format!("/Length {} differs from observed body length {} by {} bytes", length, actual, diff),
                    ));
                }
                end = start + length;
            }
        }
        start = start.min(end);

        let filters = assemble_filters(store, dict_uid);
        let raw = match reader.read_array(start, end) {
            Ok(bytes) => bytes,
            Err(e) => {
                warnings.push(
                    Warning::new("parser:error:stream:decode", "could not read stream body from source")
                        .with_cause(e),
                );
                Vec::new()
            }
        };
        let (decoded, decode_warnings) = decode_filters(&raw, &filters);
        warnings.extend(decode_warnings);

        let produced = match stream_type.as_deref() {
            Some("Content") | Some("XObject/Form") => {
                Some(subparse_content(store, stream_uid, &decoded, warnings))
            }
            Some("XObject/Image") => Some(store.create(Node::Bytes(decoded), stream_uid)),
            Some("ObjStm") => Some(expand_objstm(store, dict_uid, stream_uid, &decoded, warnings)),
            Some("XRef") => decode_xref_stream_object(store, dict_uid, stream_uid, &decoded, warnings),
            _ => Some(store.create(Node::Bytes(decoded), stream_uid)),
        };

        if let Node::Stream(s) = store.get_mut(stream_uid) {
            s.direct = produced;
        }

        if abort_on_warning && warnings.len() > before {
            break;
        }
    }
}

/// Builds the ordered filter chain from `/Filter` and `/DecodeParms`
/// (spec §4.5 step 5), pairing each filter name with its decode
/// parameters positionally when both are arrays.
fn assemble_filters(store: &ObjStore, dict_uid: Uid) -> Vec<FilterSpec> {
    let filter_uid = match store.dict_get(dict_uid, "Filter") {
        Some(u) => store.deref(u),
        None => return Vec::new(),
    };
    let names: Vec<String> = match store.get(filter_uid) {
        Node::Name(n) => vec![n.clone()],
        Node::Array(items) => items
            .iter()
            .filter_map(|&u| match store.get(store.deref(u)) {
                Node::Name(n) => Some(n.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    if names.is_empty() {
        return Vec::new();
    }

    let parms_uid = store
        .dict_get(dict_uid, "DecodeParms")
        .or_else(|| store.dict_get(dict_uid, "DP"))
        .map(|u| store.deref(u));
    let parms_list: Vec<Option<Uid>> = match parms_uid.map(|u| store.get(u)) {
        Some(Node::Array(items)) => items.iter().map(|&u| Some(store.deref(u))).collect(),
        Some(Node::Dictionary(_)) => vec![parms_uid],
        _ => Vec::new(),
    };

    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let predictor = parms_list
                .get(i)
                .copied()
                .flatten()
                .and_then(|parms_dict| predictor_params(store, parms_dict));
            FilterSpec { name, predictor }
        })
        .collect()
}

fn predictor_params(store: &ObjStore, parms_dict: Uid) -> Option<PredictorParams> {
    if !matches!(store.get(parms_dict), Node::Dictionary(_)) {
        return None;
    }
    let predictor = dict_int(store, parms_dict, "Predictor")?;
    if predictor < 2 {
        return None;
    }
    Some(PredictorParams {
        predictor: predictor as u8,
        colors: dict_int(store, parms_dict, "Colors").unwrap_or(1).max(1) as usize,
        bits_per_component: dict_int(store, parms_dict, "BitsPerComponent").unwrap_or(8).max(1) as usize,
        columns: dict_int(store, parms_dict, "Columns").unwrap_or(1).max(1) as usize,
    })
}

/// Sub-parses a decoded content-stream body as a flat `Content` tree of
/// operators and operands (spec §4.5 step 5, "Content" / "XObject/Form").
/// Operator *execution* is explicitly out of scope (spec §1 Non-goals);
/// this only builds the object tree a downstream interpreter would walk.
///
/// The sub-buffer's terminal `Eof` token is never pushed into the lexer:
/// `Lexer::handle_eof` is written for the document-level `Table` chain and
/// would otherwise manufacture a phantom `Table` under the store's root
/// the moment a sub-parse runs dry.
fn subparse_content(store: &mut ObjStore, stream_uid: Uid, decoded: &[u8], warnings: &mut Vec<Warning>) -> Uid {
    let content_uid = store.create(Node::Content(Vec::new()), stream_uid);
    let mut lexer = Lexer::new(content_uid);
    let mut tokenizer = Tokenizer::new(MemoryReader::new(decoded.to_vec()));
    while let Ok(Some(token)) = tokenizer.next_token() {
        if token.kind == TokenKind::Eof {
            break;
        }
        let result = lexer.push_token(store, token);
        warnings.extend(result.warnings);
    }
    content_uid
}

/// Expands an `ObjStm` (spec §4.5.1): the decoded prefix `[0..First)` is a
/// whitespace-separated `(objectNumber, relativeOffset)` sequence; each
/// named object is re-parsed from its slice of the payload and inserted as
/// a fresh `Indirect` into the wrapping `Array` (spec scenario S3).
fn expand_objstm(
    store: &mut ObjStore,
    dict_uid: Uid,
    stream_uid: Uid,
    payload: &[u8],
    warnings: &mut Vec<Warning>,
) -> Uid {
    let array_uid = store.create(Node::Array(Vec::new()), stream_uid);
    let first = dict_int(store, dict_uid, "First").unwrap_or(0).max(0) as usize;
    let declared_n = dict_int(store, dict_uid, "N").unwrap_or(0).max(0) as usize;

    let prefix_end = first.min(payload.len());
    let prefix: String = payload[..prefix_end].iter().map(|&b| b as char).collect();
    let nums: Vec<u64> = prefix
        .split_whitespace()
        .filter_map(|s| s.parse().ok())
        .collect();
    let pairs: Vec<(u64, u64)> = nums.chunks_exact(2).map(|c| (c[0], c[1])).collect();

    if pairs.len() != declared_n {
        warnings.push(Warning::new(
            "parser:invalid_stream:objstm_count_mismatch",
            format!("ObjStm declares N={} but prefix yielded {} pairs", declared_n, pairs.len()),
        ));
    }

    for (i, &(num, rel_offset)) in pairs.iter().enumerate() {
        let start = (first + rel_offset as usize).min(payload.len());
        let end = if i + 1 < pairs.len() {
            (first + pairs[i + 1].1 as usize).min(payload.len())
        } else {
            payload.len()
        };
        let end = end.max(start);

        let identifier = Identifier { num: num as i64, gen: 0 };
        let indirect_uid = store.create_indirect(identifier, array_uid);
        let _ = store.append_child(array_uid, indirect_uid);

        let mut lexer = Lexer::new(indirect_uid);
        let mut tokenizer = Tokenizer::new(MemoryReader::new(payload[start..end].to_vec()));
        while let Ok(Some(token)) = tokenizer.next_token() {
            if token.kind == TokenKind::Eof {
                break;
            }
            let result = lexer.push_token(store, token);
            warnings.extend(result.warnings);
        }
    }

    array_uid
}

/// Decodes an `XRef` stream's packed fixed-width records (spec §4.5.2,
/// scenario S4) and attaches the result both as the stream's `direct`
/// child and as its enclosing `Table`'s `xref_obj`.
fn decode_xref_stream_object(
    store: &mut ObjStore,
    dict_uid: Uid,
    stream_uid: Uid,
    payload: &[u8],
    warnings: &mut Vec<Warning>,
) -> Option<Uid> {
    let w_uid = store.dict_get(dict_uid, "W").map(|u| store.deref(u))?;
    let w_items = match store.get(w_uid) {
        Node::Array(items) => items.clone(),
        _ => {
            warnings.push(Warning::new(
                "parser:invalid_stream:xref_missing_w",
                "XRef stream dictionary has no /W array",
            ));
            return None;
        }
    };
    if w_items.len() != 3 {
        warnings.push(Warning::new(
            "parser:invalid_stream:xref_bad_w",
            "XRef stream /W must have exactly 3 entries",
        ));
        return None;
    }
    let mut widths = [0u8; 3];
    for (i, &uid) in w_items.iter().enumerate() {
        let resolved = store.deref(uid);
        let value = match store.get(resolved) {
            Node::Integer(n) => *n,
            _ => -1,
        };
        if !(0..=4).contains(&value) {
            warnings.push(Warning::new(
                "parser:invalid_stream:xref_bad_width",
                format!("xref stream column width {} out of range 0..=4", value),
            ));
            return None;
        }
        widths[i] = value as u8;
    }

    let size = dict_int(store, dict_uid, "Size").unwrap_or(0).max(0) as u64;
    let subsections = match store.dict_get(dict_uid, "Index").map(|u| store.deref(u)) {
        Some(index_uid) => match store.get(index_uid) {
            Node::Array(items) => {
                let nums: Vec<i64> = items
                    .iter()
                    .filter_map(|&u| match store.get(store.deref(u)) {
                        Node::Integer(n) => Some(*n),
                        _ => None,
                    })
                    .collect();
                nums.chunks_exact(2).map(|c| (c[0] as u64, c[1] as u64)).collect()
            }
            _ => vec![(0, size)],
        },
        None => vec![(0, size)],
    };

    let layout = XrefStreamLayout { widths, subsections: subsections.clone() };
    let (entries, decode_warnings) = decode_xref_stream(payload, &layout);
    warnings.extend(decode_warnings);

    let xref_uid = store.create(
        Node::Xref(XrefNode {
            widths,
            subsections,
            entries,
        }),
        stream_uid,
    );

    if let Some(table_uid) = store.enclosing_table(stream_uid) {
        if let Some(table) = store.table_mut(table_uid) {
            table.xref_obj = Some(xref_uid);
        }
    }

    Some(xref_uid)
}

/// Spec §4.5 phase 7: each `Table` (one per revision) is checked for a
/// trailer's `/Root`, falling back to the dictionary backing its xref
/// stream. Revisions are walked most-recent-first - an incremental
/// update's trailer is authoritative over an earlier one, which the spec
/// text leaves as an implementation choice (recorded in DESIGN.md).
fn resolve_catalog(store: &mut ObjStore) {
    let tables: Vec<Uid> = match store.get(store.root) {
        Node::Root(children) => children.clone(),
        _ => Vec::new(),
    };
    for &table_uid in tables.iter().rev() {
        let (trailer, xref_obj) = match store.get(table_uid) {
            Node::Table(t) => (t.trailer, t.xref_obj),
            _ => continue,
        };
        if let Some(trailer_uid) = trailer {
            if let Some(root_uid) = dict_lookup(store, trailer_uid, "Root") {
                if matches!(store.get(root_uid), Node::Dictionary(_)) {
                    store.catalog = Some(root_uid);
                    return;
                }
            }
        }
        if let Some(xref_obj_uid) = xref_obj {
            if let Some(stream_uid) = store.parent_of(xref_obj_uid) {
                let xref_dict = match store.get(stream_uid) {
                    Node::Stream(s) => s.dictionary,
                    _ => None,
                };
                if let Some(xref_dict) = xref_dict {
                    if let Some(root_uid) = dict_lookup(store, xref_dict, "Root") {
                        if matches!(store.get(root_uid), Node::Dictionary(_)) {
                            store.catalog = Some(root_uid);
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reader::MemoryReader;

    fn pad_to_255(mut bytes: Vec<u8>) -> Vec<u8> {
        if bytes.len() < 255 {
            bytes.resize(255, b'\n');
        }
        bytes
    }

    fn minimal_pdf() -> Vec<u8> {
        let body = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog >>\nendobj\n\
xref\n0 2\n0000000000 65535 f \n0000000015 00000 n \n\
trailer\n<< /Size 2 /Root 1 0 R >>\n\
startxref\n60\n%%EOF\n";
        pad_to_255(body.to_vec())
    }

    #[test]
    fn s1_minimal_valid_pdf_has_catalog_and_no_warnings() {
        let doc = Engine::load_document_from_array(minimal_pdf(), ParserOptions::default()).unwrap();
        assert_eq!(doc.store.pdf_version.as_deref(), Some("1.4"));
        let catalog = doc.store.catalog.expect("catalog resolved");
        match doc.store.get(catalog) {
            Node::Dictionary(_) => {}
            other => panic!("expected dictionary catalog, got {:?}", other.kind_name()),
        }
        let type_uid = doc.store.dict_get(catalog, "Type").unwrap();
        assert!(matches!(doc.store.get(type_uid), Node::Name(n) if n == "Catalog"));
        assert!(doc.warnings.is_empty(), "unexpected warnings: {:?}", doc.warnings.iter().map(|w| &w.code).collect::<Vec<_>>());
    }

    #[test]
    fn s2_chained_ref_resolves_through_pdfdoc_text() {
        let body = b"%PDF-1.4\n\
1 0 obj\n2 0 R\nendobj\n\
2 0 obj\n<< /Title (Hi) >>\nendobj\n\
xref\n0 3\n0000000000 65535 f \n0000000009 00000 n \n0000000030 00000 n \n\
trailer\n<< /Size 3 /Root 2 0 R >>\n\
startxref\n120\n%%EOF\n";
        let doc = Engine::load_document_from_array(pad_to_255(body.to_vec()), ParserOptions::default()).unwrap();
        let one = doc.store.indirect_uid(Identifier { num: 1, gen: 0 }).unwrap();
        let direct = match doc.store.get(one) {
            Node::Indirect(i) => i.direct.unwrap(),
            _ => panic!("expected indirect"),
        };
        let resolved = doc.store.deref(direct);
        let title_uid = doc.store.dict_get(resolved, "Title").unwrap();
        match doc.store.get(title_uid) {
            Node::Text { value, .. } => assert_eq!(value, "Hi"),
            other => panic!("expected text, got {:?}", other.kind_name()),
        }
    }

    #[test]
    fn s5_non_name_dictionary_key_warns_but_continues() {
        let body = format!(
            "%PDF-1.4\n1 0 obj\n<< 1 (X) >>\nendobj\nxref\n0 2\n0000000000 65535 f \n0000000009 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n80\n%%EOF\n"
        );
        let doc = Engine::load_document_from_array(pad_to_255(body.into_bytes()), ParserOptions::default()).unwrap();
        assert!(doc.warnings.iter().any(|w| w.code.contains("invalid_key")));
    }

    fn stream_with_declared_length(declared: usize) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(b"%PDF-1.4\n");
        body.extend_from_slice(format!("1 0 obj\n<< /Length {} >>\nstream\n", declared).as_bytes());
        body.extend_from_slice(b"ABCDEFGH");
        body.extend_from_slice(b"\nendstream\nendobj\n");
        body.extend_from_slice(b"xref\n0 2\n0000000000 65535 f \n0000000009 00000 n \n");
        body.extend_from_slice(b"trailer\n<< /Size 2 /Root 1 0 R >>\n");
        body.extend_from_slice(b"startxref\n9\n%%EOF\n");
        pad_to_255(body)
    }

    #[test]
    fn s6_length_within_two_bytes_is_adjusted_without_warning() {
        // Actual body is 8 bytes; /Length says 10 (off by 2, within tolerance).
        let doc = Engine::load_document_from_array(stream_with_declared_length(10), ParserOptions::default())
            .unwrap();
        assert!(!doc.warnings.iter().any(|w| w.code == "parser:invalid_stream:length_mismatch"));
        let one = doc.store.indirect_uid(Identifier { num: 1, gen: 0 }).unwrap();
        let stream_uid = match doc.store.get(one) {
            Node::Indirect(i) => i.direct.unwrap(),
            _ => panic!("expected indirect"),
        };
        match doc.store.get(stream_uid) {
            Node::Stream(s) => {
                let len = s.source_end.unwrap() - s.source_start.unwrap();
                assert_eq!(len, 10, "end should have been adjusted to start + declared length");
            }
            other => panic!("expected stream, got {:?}", other.kind_name()),
        }
    }

    #[test]
    fn s6_length_off_by_more_than_two_bytes_warns() {
        // Actual body is 8 bytes; /Length says 13 (off by 5, beyond tolerance).
        let doc = Engine::load_document_from_array(stream_with_declared_length(13), ParserOptions::default())
            .unwrap();
        assert!(doc.warnings.iter().any(|w| w.code == "parser:invalid_stream:length_mismatch"));
    }

    #[test]
    fn file_under_255_bytes_is_rejected_for_size_alone() {
        let err = Engine::load_document_from_array(b"%PDF-1.4\ntiny".to_vec(), ParserOptions::default())
            .unwrap_err();
        assert!(matches!(err, PDFError::NotAPdf { reason } if reason.contains("filesize")));
    }

    #[test]
    fn missing_header_fails_even_at_adequate_size() {
        let bytes = pad_to_255(b"no header here".to_vec());
        let err = Engine::load_document_from_array(bytes, ParserOptions::default()).unwrap_err();
        assert!(matches!(err, PDFError::NotAPdf { reason } if reason.contains("invalid_header")));
    }

    #[test]
    fn abort_on_warning_stops_after_first_warning_producing_phase() {
        let body = b"%PDF-1.4\n1 0 obj\n<< 1 (X) >>\nendobj\nxref\n0 2\n0000000000 65535 f \n0000000009 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n80\n%%EOF\n";
        let options = ParserOptions { abort_on_warning: true, ..Default::default() };
        let doc = Engine::load_document_from_array(pad_to_255(body.to_vec()), options).unwrap();
        // The warning-producing phase (body parse) ran, but catalog
        // resolution (phase 7) never got a chance to run.
        assert!(!doc.warnings.is_empty());
        assert!(doc.store.catalog.is_none());
    }

    #[test]
    fn objstm_expansion_matches_scenario_s3() {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        // Prefix "3 0 4 10\n" is 9 bytes, then two 10-byte dictionaries
        // back to back: object 3 at relative offset 0, object 4 at 10.
        let payload = b"3 0 4 10\n<< /A 1 >><< /B 2 >>";
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut body = Vec::new();
        body.extend_from_slice(b"%PDF-1.5\n");
        body.extend_from_slice(b"1 0 obj\n<< /Type /ObjStm /N 2 /First 9 /Length ");
        body.extend_from_slice(compressed.len().to_string().as_bytes());
        body.extend_from_slice(b" /Filter /FlateDecode >>\nstream\n");
        body.extend_from_slice(&compressed);
        body.extend_from_slice(b"\nendstream\nendobj\n");
        body.extend_from_slice(b"5 0 obj\n3 0 R\nendobj\n");
        body.extend_from_slice(b"xref\n0 1\n0000000000 65535 f \n");
        body.extend_from_slice(b"trailer\n<< /Size 6 /Root 3 0 R >>\n");
        body.extend_from_slice(b"startxref\n9\n%%EOF\n");

        let doc = Engine::load_document_from_array(pad_to_255(body), ParserOptions::default()).unwrap();
        let obj3 = doc.store.indirect_uid(Identifier { num: 3, gen: 0 }).unwrap();
        let direct3 = match doc.store.get(obj3) {
            Node::Indirect(i) => i.direct.unwrap(),
            _ => panic!("expected indirect"),
        };
        let a_uid = doc.store.dict_get(direct3, "A").unwrap();
        assert!(matches!(doc.store.get(a_uid), Node::Integer(1)));
    }

    #[test]
    fn header_match_accepts_crlf_and_bare_lf() {
        assert_eq!(match_pdf_header("%PDF-1.7\r\nbinary"), Some(("1.7".to_string(), 10)));
        assert_eq!(match_pdf_header("%PDF-2.0\nbinary"), Some(("2.0".to_string(), 9)));
        assert_eq!(match_pdf_header("%PDF-1.4binary"), None);
    }

    #[test]
    fn offset_reader_backed_memory_reader_round_trips() {
        let r = MemoryReader::new(minimal_pdf());
        assert_eq!(
            OffsetReader::read_array(&r, 0, 5).unwrap(),
            b"%PDF-".to_vec()
        );
    }

    #[test]
    fn load_document_from_file_matches_from_array() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&minimal_pdf()).unwrap();
        file.flush().unwrap();

        let doc = Engine::load_document_from_file(file.path(), ParserOptions::default()).unwrap();
        assert_eq!(doc.store.pdf_version.as_deref(), Some("1.4"));
        assert!(doc.store.catalog.is_some());
        assert!(doc.warnings.is_empty());
    }

    #[test]
    fn file_reader_rejects_missing_path() {
        let err = Engine::load_document_from_file("/no/such/path.pdf", ParserOptions::default())
            .unwrap_err();
        assert!(matches!(err, PDFError::Io(_)));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use super::super::object::RefNode;
    use proptest::prelude::*;

    /// Spec §8 property 2: re-running ref resolution is a no-op once every
    /// resolvable ref has already been resolved.
    fn arbitrary_identifier() -> impl Strategy<Value = Identifier> {
        (0i64..50, 0i64..3).prop_map(|(num, gen)| Identifier { num, gen })
    }

    proptest! {
        #[test]
        fn resolve_refs_is_idempotent(ids in prop::collection::vec(arbitrary_identifier(), 0..20)) {
            let mut store = ObjStore::new();
            let root = store.root;
            // Define one Indirect per distinct identifier so some refs resolve
            // and others (referencing an id never defined) stay dangling.
            for &id in &ids {
                if store.indirect_uid(id).is_none() {
                    let indirect = store.create_indirect(id, root);
                    let value = store.create(Node::Integer(id.num), indirect);
                    store.append_child(indirect, value).ok();
                }
            }
            for &id in &ids {
                let dangling_id = Identifier { num: id.num + 1000, gen: id.gen };
                store.create(
                    Node::Ref(RefNode { identifier: dangling_id, indirect: None }),
                    root,
                );
            }

            resolve_refs(&mut store);
            let after_first: Vec<Option<Uid>> = store
                .ref_uids()
                .iter()
                .map(|&uid| match store.get(uid) {
                    Node::Ref(r) => r.indirect,
                    _ => None,
                })
                .collect();

            resolve_refs(&mut store);
            let after_second: Vec<Option<Uid>> = store
                .ref_uids()
                .iter()
                .map(|&uid| match store.get(uid) {
                    Node::Ref(r) => r.indirect,
                    _ => None,
                })
                .collect();

            prop_assert_eq!(after_first, after_second);
        }

        /// Spec §8 property 3: every registered identifier round-trips
        /// through the store's index regardless of how many distinct
        /// identifiers are registered or in what order.
        #[test]
        fn indirect_identifiers_round_trip_through_index(ids in prop::collection::vec(arbitrary_identifier(), 1..30)) {
            let mut store = ObjStore::new();
            let root = store.root;
            let mut last_uid_for: std::collections::HashMap<Identifier, Uid> = std::collections::HashMap::new();
            for &id in &ids {
                let uid = store.create_indirect(id, root);
                last_uid_for.insert(id, uid);
            }
            for (&id, &expected_uid) in &last_uid_for {
                prop_assert_eq!(store.indirect_uid(id), Some(expected_uid));
            }
        }
    }
}
