//! # pdf-x-core
//!
//! A two-stage PDF parsing engine: a byte-level [`core::Tokenizer`] feeds a
//! token-level [`core::Lexer`], which builds an in-memory, arena-backed
//! object graph (`core::ObjStore`). The [`core::Engine`] orchestrator drives
//! both stages plus reference resolution, stream classification, and stream
//! decoding across a document's full revision chain.
//!
//! ## Quick start
//!
//! ```no_run
//! use pdf_x_core::core::{Engine, ParserOptions};
//!
//! let doc = Engine::load_document_from_file("document.pdf", ParserOptions::default())?;
//! println!("parsed with {} warnings", doc.warnings.len());
//! if let Some(catalog) = doc.store.catalog {
//!     println!("catalog is object {}", catalog);
//! }
//! # Ok::<(), pdf_x_core::core::PDFError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`core::tokenizer`] - byte stream to token sequence
//! - [`core::lexer`] - token sequence to object tree (`core::Node`/`core::ObjStore`)
//! - [`core::parser`] - the orchestrator: header check, body parse across
//!   incremental updates, reference resolution, stream classification and
//!   decoding, catalog detection
//! - [`core::xref`] - classical and cross-reference-stream entry decoding
//! - [`core::decode`] - stream filter codecs (Flate, ASCIIHex, ASCII85, PNG
//!   predictors)
//!
//! No object in the graph is ever reference-counted: `ObjStore` is a single
//! flat arena and every pointer between nodes is a non-owning `Uid`, so the
//! cyclic graphs PDF documents routinely produce (a dictionary referencing
//! its own containing object, for instance) never need a cycle collector.

pub mod core;
