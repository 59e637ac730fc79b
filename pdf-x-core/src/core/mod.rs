pub mod constants;
pub mod date;
pub mod decode;
pub mod error;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod reader;
pub mod token;
pub mod tokenizer;
pub mod xref;

pub use decode::{
    decode_ascii85, decode_ascii_hex, decode_filters, decode_flate, decode_png_predictor,
    FilterSpec, PredictorParams,
};
pub use error::{PDFError, PDFResult, Warning};
pub use lexer::{LexResult, Lexer};
pub use object::{
    DateValue, IndirectNode, Node, ObjStore, RefNode, StreamNode, TableNode, TextEncoding, Uid,
    XrefNode,
};
pub use parser::{Document, Engine, ParserOptions};
pub use reader::{FileReader, MemoryReader, OffsetReader, SequentialReader};
pub use token::{Identifier, Token, TokenKind, TokenPayload};
pub use tokenizer::Tokenizer;
pub use xref::{classical_entry, decode_xref_stream, XrefEntry, XrefStreamLayout};
