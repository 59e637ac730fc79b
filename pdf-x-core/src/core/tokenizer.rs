//! Byte stream → token sequence (spec §4.3). The raw scanner implements
//! the decision tree verbatim; a small lookahead buffer sits in front of
//! it to rewrite `N G obj` / `N G R` into `indirect_start`/`ref` tokens
//! carrying the preceding integers as their identifier payload, since PDF
//! doesn't delimit that syntax any other way.

use std::collections::VecDeque;

use super::constants::*;
use super::error::{PDFResult, Warning};
use super::reader::SequentialReader;
use super::token::{Identifier, RawXrefEntry, Token, TokenKind, TokenPayload, XrefSectionPayload};

pub struct Tokenizer<R> {
    reader: R,
    buffer: VecDeque<Token>,
    output: VecDeque<Token>,
    finished: bool,
}

impl<R: SequentialReader> Tokenizer<R> {
    pub fn new(reader: R) -> Self {
        Tokenizer {
            reader,
            buffer: VecDeque::new(),
            output: VecDeque::new(),
            finished: false,
        }
    }

    pub fn into_reader(self) -> R {
        self.reader
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Pulls the next token, or `None` at true stream end. This is the
    /// "lazy sequence" interface from §9 - callers should not materialize
    /// the full token list.
    pub fn next_token(&mut self) -> PDFResult<Option<Token>> {
        loop {
            if let Some(tok) = self.output.pop_front() {
                return Ok(Some(tok));
            }
            if self.finished {
                return Ok(None);
            }
            let tok = self.scan_raw()?;
            match tok.kind {
                TokenKind::Integer | TokenKind::Space | TokenKind::Junk => {
                    self.buffer.push_back(tok);
                }
                TokenKind::IndirectStart | TokenKind::Ref => {
                    let mut tok = tok;
                    tok.payload = TokenPayload::Identifier(self.compose_identifier(&mut tok));
                    self.buffer.clear();
                    self.output.push_back(tok);
                }
                TokenKind::Eof => {
                    self.output.extend(self.buffer.drain(..));
                    self.output.push_back(tok);
                    self.finished = true;
                }
                _ => {
                    self.output.extend(self.buffer.drain(..));
                    self.output.push_back(tok);
                }
            }
        }
    }

    /// Takes the two most-recently-buffered integers (ignoring
    /// interleaved space/junk) as `{num, gen}`, oldest first.
    fn compose_identifier(&mut self, tok: &mut Token) -> Identifier {
        let ints: Vec<i64> = self
            .buffer
            .iter()
            .rev()
            .filter_map(|t| match t.kind {
                TokenKind::Integer => t.as_number().map(|n| n as i64),
                _ => None,
            })
            .take(2)
            .collect();
        if ints.len() == 2 {
            Identifier {
                num: ints[1],
                gen: ints[0],
            }
        } else {
            tok.warning = Some(Warning::new(
                "tokenizer:invalid_token:missing_identifier",
                "obj/R keyword without two preceding integers",
            ));
            Identifier::UNKNOWN
        }
    }

    fn scan_raw(&mut self) -> PDFResult<Token> {
        let start = self.reader.offset();
        let first = match self.reader.read_byte(false)? {
            None => {
                return Ok(Token::new(
                    TokenKind::Eof,
                    start,
                    start,
                    TokenPayload::Eof(0),
                ))
            }
            Some(b) => b,
        };

        if is_space(first) {
            self.reader.read_array_while(is_space)?;
            return Ok(Token::new(TokenKind::Space, start, self.reader.offset(), TokenPayload::None));
        }
        if first == b'%' {
            return self.scan_comment(start);
        }
        if first == b'[' {
            self.reader.consume(1)?;
            return Ok(Token::new(TokenKind::ArrayStart, start, self.reader.offset(), TokenPayload::None));
        }
        if first == b']' {
            self.reader.consume(1)?;
            return Ok(Token::new(TokenKind::ArrayEnd, start, self.reader.offset(), TokenPayload::None));
        }
        if first == b'<' {
            return self.scan_angle(start);
        }
        if first == b'>' {
            self.reader.consume(1)?;
            if self.reader.read_byte(false)? == Some(b'>') {
                self.reader.consume(1)?;
                return Ok(Token::new(TokenKind::DictEnd, start, self.reader.offset(), TokenPayload::None));
            }
            return Ok(Token::new(TokenKind::Junk, start, self.reader.offset(), TokenPayload::None)
                .with_warning(Warning::new("tokenizer:invalid_token:bare_gt", "stray '>' outside dictionary close").at(start)));
        }
        if first == b'/' {
            return self.scan_name(start);
        }
        if first == b'(' {
            return self.scan_literal_string(start);
        }
        if is_number(first) {
            return self.scan_number(start);
        }
        if is_keyword(first) {
            return self.scan_keyword(start);
        }

        self.reader.consume(1)?;
        Ok(Token::new(TokenKind::Junk, start, self.reader.offset(), TokenPayload::None))
    }

    fn scan_comment(&mut self, start: usize) -> PDFResult<Token> {
        self.reader.consume(1)?;
        let (bytes, term) = self.reader.read_array_until(is_eol, false)?;
        let text: String = bytes.iter().map(|&b| b as char).collect();
        let end_before_warn = self.reader.offset();
        if term.is_none() {
            return Ok(Token::new(TokenKind::Comment, start, end_before_warn, TokenPayload::Text(text))
                .with_warning(Warning::new("tokenizer:unexpected_eof:comment", "comment not terminated by EOL").at(start)));
        }
        // consume the single EOL byte (or CRLF pair) that terminates the comment
        self.reader.consume(1)?;
        if term == Some(b'\r') && self.reader.read_byte(false)? == Some(b'\n') {
            self.reader.consume(1)?;
        }
        Ok(Token::new(TokenKind::Comment, start, self.reader.offset(), TokenPayload::Text(text)))
    }

    fn scan_angle(&mut self, start: usize) -> PDFResult<Token> {
        self.reader.consume(1)?;
        if self.reader.read_byte(false)? == Some(b'<') {
            self.reader.consume(1)?;
            return Ok(Token::new(TokenKind::DictStart, start, self.reader.offset(), TokenPayload::None));
        }
        let (hex, term) = self.reader.read_array_until(|b| b == b'>', true)?;
        let mut digits: Vec<u8> = hex.into_iter().filter(|b| b.is_ascii_hexdigit()).collect();
        let mut warning = None;
        if term.is_none() {
            warning = Some(Warning::new("tokenizer:unexpected_eof:hexstring", "hex string missing terminating '>'").at(start));
        }
        if digits.len() % 2 != 0 {
            digits.push(b'0');
        }
        let mut bytes = Vec::with_capacity(digits.len() / 2);
        for pair in digits.chunks(2) {
            let s = std::str::from_utf8(pair).unwrap_or("0");
            bytes.push(u8::from_str_radix(s, 16).unwrap_or(0));
        }
        let mut tok = Token::new(TokenKind::HexString, start, self.reader.offset(), TokenPayload::Bytes(bytes));
        if let Some(w) = warning.take() {
            tok = tok.with_warning(w);
        }
        Ok(tok)
    }

    fn scan_name(&mut self, start: usize) -> PDFResult<Token> {
        self.reader.consume(1)?;
        let raw = self.reader.read_array_while(is_name_char)?;
        let mut name = String::new();
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'#' && i + 2 < raw.len() {
                let hex = &raw[i + 1..i + 3];
                if let Ok(s) = std::str::from_utf8(hex) {
                    if let Ok(byte) = u8::from_str_radix(s, 16) {
                        name.push(byte as char);
                        i += 3;
                        continue;
                    }
                }
            }
            name.push(raw[i] as char);
            i += 1;
        }
        Ok(Token::new(TokenKind::Name, start, self.reader.offset(), TokenPayload::Text(name)))
    }

    fn scan_literal_string(&mut self, start: usize) -> PDFResult<Token> {
        self.reader.consume(1)?;
        let mut depth = 1i32;
        let mut raw: Vec<u8> = Vec::new();
        let mut eof_hit = false;
        loop {
            match self.reader.read_byte(true)? {
                None => {
                    eof_hit = true;
                    break;
                }
                Some(b'\\') => {
                    raw.push(b'\\');
                    if let Some(next) = self.reader.read_byte(true)? {
                        raw.push(next);
                        // up to two further octal digits
                        if next.is_ascii_digit() {
                            for _ in 0..2 {
                                match self.reader.read_byte(false)? {
                                    Some(d) if d.is_ascii_digit() => {
                                        raw.push(d);
                                        self.reader.consume(1)?;
                                    }
                                    _ => break,
                                }
                            }
                        }
                    }
                }
                Some(b'(') => {
                    depth += 1;
                    raw.push(b'(');
                }
                Some(b')') => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    raw.push(b')');
                }
                Some(b) => raw.push(b),
            }
        }
        let decoded = unescape_literal_string(&raw);
        let end = self.reader.offset();
        let mut tok = Token::new(TokenKind::String, start, end, TokenPayload::Bytes(decoded));
        if eof_hit {
            tok = tok.with_warning(Warning::new("tokenizer:unexpected_eof:string", "literal string not balanced before EOF").at(start));
        }
        Ok(tok)
    }

    fn scan_number(&mut self, start: usize) -> PDFResult<Token> {
        let run = self.reader.read_array_while(is_number)?;
        let text: String = run.iter().map(|&b| b as char).collect();
        let is_real = text.contains('.');
        // tolerate a stray second sign and bare '.' by falling back to 0
        let cleaned = normalize_number_text(&text);
        let value: f64 = cleaned.parse().unwrap_or(0.0);
        let mut tok = Token::new(
            if is_real { TokenKind::Real } else { TokenKind::Integer },
            start,
            self.reader.offset(),
            TokenPayload::Number(value),
        );
        if cleaned.parse::<f64>().is_err() {
            tok = tok.with_warning(Warning::new("tokenizer:invalid_token:number", format!("unparsable number literal '{}'", text)).at(start));
        }
        Ok(tok)
    }

    fn scan_keyword(&mut self, start: usize) -> PDFResult<Token> {
        let raw = self.reader.read_array_while(is_keyword)?;
        let word: String = raw.iter().map(|&b| b as char).collect();
        let end = self.reader.offset();
        match word.as_str() {
            "null" => Ok(Token::new(TokenKind::Null, start, end, TokenPayload::None)),
            "true" => Ok(Token::new(TokenKind::Boolean, start, end, TokenPayload::Bool(true))),
            "false" => Ok(Token::new(TokenKind::Boolean, start, end, TokenPayload::Bool(false))),
            "obj" => Ok(Token::new(TokenKind::IndirectStart, start, end, TokenPayload::None)),
            "endobj" => Ok(Token::new(TokenKind::IndirectEnd, start, end, TokenPayload::None)),
            "R" => Ok(Token::new(TokenKind::Ref, start, end, TokenPayload::None)),
            "stream" => self.scan_stream_body(start),
            "xref" => self.scan_xref_section(start),
            "trailer" => {
                self.consume_single_eol()?;
                Ok(Token::new(TokenKind::Trailer, start, self.reader.offset(), TokenPayload::None))
            }
            "startxref" => self.scan_startxref(start),
            _ => Ok(Token::new(TokenKind::Op, start, end, TokenPayload::Text(word))),
        }
    }

    fn consume_single_eol(&mut self) -> PDFResult<()> {
        match self.reader.read_byte(false)? {
            Some(b'\r') => {
                self.reader.consume(1)?;
                if self.reader.read_byte(false)? == Some(b'\n') {
                    self.reader.consume(1)?;
                }
            }
            Some(b'\n') => {
                self.reader.consume(1)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn scan_stream_body(&mut self, start: usize) -> PDFResult<Token> {
        self.consume_single_eol()?;
        let body_start = self.reader.offset();
        const SENTINEL: &[u8] = b"endstream";
        let mut collected: Vec<u8> = Vec::new();
        let mut found = false;
        loop {
            match self.reader.read_byte(true)? {
                None => break,
                Some(b) => {
                    collected.push(b);
                    if collected.len() >= SENTINEL.len()
                        && &collected[collected.len() - SENTINEL.len()..] == SENTINEL
                    {
                        found = true;
                        break;
                    }
                }
            }
        }
        let mut warning = None;
        let body_end = if found {
            let mut idx = collected.len() - SENTINEL.len();
            // strip one preceding EOL (CRLF, CR, or LF) from the body per
            // spec §4.3 item 9; open question in §9 tolerates a bare '\r'.
            if idx >= 2 && collected[idx - 2] == b'\r' && collected[idx - 1] == b'\n' {
                idx -= 2;
            } else if idx >= 1 && (collected[idx - 1] == b'\r' || collected[idx - 1] == b'\n') {
                idx -= 1;
            }
            body_start + idx
        } else {
            warning = Some(Warning::new(
                "tokenizer:unexpected_eof:stream",
                "'endstream' sentinel not found",
            ).at(start));
            body_start + collected.len()
        };
        let mut tok = Token::new(
            TokenKind::Stream,
            start,
            self.reader.offset(),
            TokenPayload::Stream {
                start: body_start,
                end: body_end,
            },
        );
        if let Some(w) = warning {
            tok = tok.with_warning(w);
        }
        Ok(tok)
    }

    /// Peeks whether the literal byte string `lit` follows at the
    /// current cursor, consuming it only on a full match.
    fn try_match_literal(&mut self, lit: &str) -> PDFResult<bool> {
        let bytes = lit.as_bytes();
        let peek = self.reader.read_array(bytes.len(), false)?;
        if peek == bytes {
            self.reader.consume(bytes.len())?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn scan_xref_section(&mut self, start: usize) -> PDFResult<Token> {
        self.consume_single_eol()?;
        let mut entries = Vec::new();
        let mut start_num = 0u64;
        let mut first_subsection = true;
        let mut warning = None;
        loop {
            let save = self.reader.offset();
            let (head, _) = self.reader.read_string_until(is_eol, true)?;
            let parts: Vec<&str> = head.split_whitespace().collect();
            if parts.len() != 2 {
                // not a subsection header; rewind (by not consuming further) and stop
                let _ = save;
                break;
            }
            let (sub_start, count): (u64, u64) = match (parts[0].parse(), parts[1].parse()) {
                (Ok(a), Ok(b)) => (a, b),
                _ => {
                    warning = Some(Warning::new("tokenizer:invalid_token:xref_header", "malformed xref subsection header").at(start));
                    break;
                }
            };
            if first_subsection {
                start_num = sub_start;
                first_subsection = false;
            }
            for _ in 0..count {
                let line = self.reader.read_string(20, true)?;
                let trimmed = line.trim_end_matches(|c| c == '\r' || c == '\n');
                let parts: Vec<&str> = trimmed.split_whitespace().collect();
                if parts.len() != 3 {
                    warning = Some(Warning::new("tokenizer:invalid_token:xref_entry", "malformed 20-byte xref entry").at(start));
                    continue;
                }
                let f1: u64 = parts[0].parse().unwrap_or(0);
                let f2: u32 = parts[1].parse().unwrap_or(0);
                let type_char = parts[2].chars().next().unwrap_or('n');
                entries.push(RawXrefEntry { f1, f2, type_char });
            }
            if self.reader.read_byte(false)? == Some(b't') {
                // next keyword is "trailer"; let the keyword scanner see it
                break;
            }
            if self.reader.eof() {
                break;
            }
        }
        let mut tok = Token::new(
            TokenKind::Xref,
            start,
            self.reader.offset(),
            TokenPayload::Xref(XrefSectionPayload { start_num, entries }),
        );
        if let Some(w) = warning {
            tok = tok.with_warning(w);
        }
        Ok(tok)
    }

    fn scan_startxref(&mut self, start: usize) -> PDFResult<Token> {
        self.consume_single_eol()?;
        let digits = self.reader.read_string_while(is_digit)?;
        let offset: u64 = digits.parse().unwrap_or(0);
        self.consume_single_eol()?;
        let matched = self.try_match_literal("%%EOF")?;
        let mut tok = Token::new(TokenKind::Eof, start, self.reader.offset(), TokenPayload::Eof(offset));
        if !matched {
            tok = tok.with_warning(Warning::new("tokenizer:invalid_token:eof_marker", "expected '%%EOF' after startxref offset").at(start));
        }
        Ok(tok)
    }
}

fn normalize_number_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut seen_sign = false;
    let mut seen_dot = false;
    for (i, c) in text.chars().enumerate() {
        match c {
            '+' | '-' => {
                if i == 0 && !seen_sign {
                    out.push(c);
                    seen_sign = true;
                }
            }
            '.' => {
                if !seen_dot {
                    out.push(c);
                    seen_dot = true;
                }
            }
            _ => out.push(c),
        }
    }
    if out.is_empty() || out == "+" || out == "-" || out == "." {
        "0".to_string()
    } else {
        out
    }
}

/// Second-pass unescape of a literal string's raw backslash sequences
/// into their byte values (spec §4.3 item 7).
fn unescape_literal_string(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\\' && i + 1 < raw.len() {
            let next = raw[i + 1];
            match next {
                b'n' => {
                    out.push(b'\n');
                    i += 2;
                }
                b'r' => {
                    out.push(b'\r');
                    i += 2;
                }
                b't' => {
                    out.push(b'\t');
                    i += 2;
                }
                b'b' => {
                    out.push(0x08);
                    i += 2;
                }
                b'f' => {
                    out.push(0x0C);
                    i += 2;
                }
                b'(' => {
                    out.push(b'(');
                    i += 2;
                }
                b')' => {
                    out.push(b')');
                    i += 2;
                }
                b'\\' => {
                    out.push(b'\\');
                    i += 2;
                }
                b'\r' | b'\n' => {
                    // line continuation: escaped EOL produces no byte
                    i += 2;
                    if next == b'\r' && raw.get(i) == Some(&b'\n') {
                        i += 1;
                    }
                }
                d if d.is_ascii_digit() => {
                    let mut j = i + 1;
                    let mut value: u32 = 0;
                    let mut digits = 0;
                    while digits < 3 && j < raw.len() && raw[j].is_ascii_digit() {
                        value = value * 8 + (raw[j] - b'0') as u32;
                        j += 1;
                        digits += 1;
                    }
                    out.push((value & 0xFF) as u8);
                    i = j;
                }
                _ => {
                    // unknown escape maps to nothing
                    i += 2;
                }
            }
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reader::MemoryReader;

    fn tokenize_all(input: &[u8]) -> Vec<Token> {
        let mut t = Tokenizer::new(MemoryReader::new(input.to_vec()));
        let mut out = Vec::new();
        while let Some(tok) = t.next_token().unwrap() {
            let is_eof = tok.kind == TokenKind::Eof;
            out.push(tok);
            if is_eof {
                break;
            }
        }
        out
    }

    #[test]
    fn composes_indirect_start_identifier() {
        let toks = tokenize_all(b"1 0 obj\nnull\nendobj\n");
        assert_eq!(toks[0].kind, TokenKind::IndirectStart);
        assert_eq!(toks[0].as_identifier(), Some(Identifier { num: 1, gen: 0 }));
    }

    #[test]
    fn composes_ref_identifier() {
        let toks = tokenize_all(b"3 0 R");
        assert_eq!(toks[0].kind, TokenKind::Ref);
        assert_eq!(toks[0].as_identifier(), Some(Identifier { num: 3, gen: 0 }));
    }

    #[test]
    fn missing_identifier_warns_with_unknown() {
        let toks = tokenize_all(b"obj\nendobj\n");
        assert_eq!(toks[0].kind, TokenKind::IndirectStart);
        assert_eq!(toks[0].as_identifier(), Some(Identifier::UNKNOWN));
        assert!(toks[0].warning.is_some());
    }

    #[test]
    fn name_hex_escape_decodes() {
        let toks = tokenize_all(b"/A#23B");
        assert_eq!(toks[0].kind, TokenKind::Name);
        assert_eq!(toks[0].as_text(), Some("A#B"));
    }

    #[test]
    fn literal_string_handles_escapes_and_nesting() {
        let toks = tokenize_all(b"(a\\(b\\)c\\101)");
        assert_eq!(toks[0].kind, TokenKind::String);
        assert_eq!(toks[0].as_bytes(), Some(&b"a(b)cA"[..]));
    }

    #[test]
    fn hex_string_pads_odd_digit() {
        let toks = tokenize_all(b"<48656C6C6>");
        assert_eq!(toks[0].kind, TokenKind::HexString);
        assert_eq!(toks[0].as_bytes(), Some(&[0x48, 0x65, 0x6C, 0x6C, 0x60][..]));
    }

    #[test]
    fn stream_body_span_excludes_endstream() {
        let toks = tokenize_all(b"stream\nABCD\nendstream\n");
        assert_eq!(toks[0].kind, TokenKind::Stream);
        match toks[0].payload {
            TokenPayload::Stream { start, end } => {
                assert_eq!(start, 7);
                assert_eq!(end - start, 4); // trailing EOL before 'endstream' is stripped
            }
            _ => panic!("expected stream payload"),
        }
    }

    #[test]
    fn classical_xref_section_tokenizes_entries() {
        let toks = tokenize_all(
            b"xref\n0 2\n0000000000 65535 f \n0000000015 00000 n \ntrailer\n",
        );
        assert_eq!(toks[0].kind, TokenKind::Xref);
        match &toks[0].payload {
            TokenPayload::Xref(payload) => {
                assert_eq!(payload.start_num, 0);
                assert_eq!(payload.entries.len(), 2);
                assert_eq!(payload.entries[0].type_char, 'f');
                assert_eq!(payload.entries[1].f1, 15);
            }
            _ => panic!("expected xref payload"),
        }
    }

    #[test]
    fn startxref_eof_reports_offset() {
        let toks = tokenize_all(b"startxref\n1234\n%%EOF");
        let eof = toks.last().unwrap();
        assert_eq!(eof.kind, TokenKind::Eof);
        match eof.payload {
            TokenPayload::Eof(offset) => assert_eq!(offset, 1234),
            _ => panic!("expected eof payload"),
        }
        assert!(eof.warning.is_none());
    }

    #[test]
    fn file_exactly_two_fifty_five_bytes_still_tokenizes() {
        let mut input = b"%PDF-1.4\n".to_vec();
        input.resize(255, b' ');
        let toks = tokenize_all(&input);
        assert!(!toks.is_empty());
    }
}
