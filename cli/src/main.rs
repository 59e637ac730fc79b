use pdf_x_core::core::{Engine, Node, ObjStore, ParserOptions, Uid};
use std::env;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("PDF Object Tree Inspector");
        eprintln!("Usage: {} <pdf-file> [options]", args[0]);
        eprintln!("\nOptions:");
        eprintln!("  --tree           Dump the parsed object tree (default)");
        eprintln!("  --depth <n>      Limit tree dump to n levels (default: unlimited)");
        eprintln!("  --warnings       Show every warning in full detail");
        eprintln!("  --warnings-summary  Show warnings deduped by code, with counts");
        eprintln!("  --object <num>   Show a single indirect object by number");
        eprintln!("  --abort-on-warning  Stop parsing at the first warning-producing phase");
        process::exit(1);
    }

    let pdf_path = &args[1];
    let show_tree = args.len() == 2 || args.iter().any(|a| a == "--tree");
    let show_warnings = args.iter().any(|a| a == "--warnings");
    let show_warnings_summary = args.iter().any(|a| a == "--warnings-summary");
    let abort_on_warning = args.iter().any(|a| a == "--abort-on-warning");

    let max_depth = args
        .iter()
        .position(|a| a == "--depth")
        .and_then(|pos| args.get(pos + 1))
        .and_then(|s| s.parse::<usize>().ok());

    let object_num = if let Some(pos) = args.iter().position(|a| a == "--object") {
        match args.get(pos + 1).and_then(|s| s.parse::<i64>().ok()) {
            Some(n) => Some(n),
            None => {
                eprintln!("Error: --object requires an object number");
                process::exit(1);
            }
        }
    } else {
        None
    };

    let options = ParserOptions {
        abort_on_warning,
        ..Default::default()
    };

    let doc = match Engine::load_document_from_file(pdf_path, options) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error parsing PDF: {}", e);
            process::exit(1);
        }
    };

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║              PDF Object Tree Inspector                      ║");
    println!("╚══════════════════════════════════════════════════════════╝");
    println!("\nFile: {}\n", pdf_path);

    println!("═══════════════ BASIC INFORMATION ═══════════════");
    println!(
        "PDF Version: {}",
        doc.store.pdf_version.as_deref().unwrap_or("unknown")
    );
    println!("Objects in store: {}", doc.store.len());
    println!("References: {}", doc.store.ref_uids().len());
    println!("Streams: {}", doc.store.stream_uids().len());
    match doc.store.catalog {
        Some(uid) => println!("Catalog: object at arena index {}", uid),
        None => println!("Catalog: not found"),
    }
    println!("Warnings: {}", doc.warnings.len());
    println!();

    if let Some(num) = object_num {
        println!("═══════════════ OBJECT {} 0 ═══════════════", num);
        match find_indirect(&doc.store, num) {
            Some(uid) => print_node(&doc.store, uid, 0, max_depth),
            None => println!("No indirect object numbered {} found", num),
        }
        println!();
    }

    if show_tree && object_num.is_none() {
        println!("═══════════════ OBJECT TREE ═══════════════");
        print_node(&doc.store, doc.store.root, 0, max_depth);
        println!();
    }

    if show_warnings_summary {
        println!("═══════════════ WARNINGS (SUMMARY) ═══════════════");
        print_warnings_summary(&doc.warnings);
        println!();
    }

    if show_warnings {
        println!("═══════════════ WARNINGS (FULL) ═══════════════");
        if doc.warnings.is_empty() {
            println!("No warnings.");
        }
        for w in &doc.warnings {
            println!("{}", w);
        }
        println!();
    }
}

fn find_indirect(store: &ObjStore, num: i64) -> Option<Uid> {
    store
        .iter()
        .find_map(|(uid, node)| match node {
            Node::Indirect(ind) if ind.identifier.num == num => Some(uid),
            _ => None,
        })
}

fn print_warnings_summary(warnings: &[pdf_x_core::core::Warning]) {
    use std::collections::BTreeMap;
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for w in warnings {
        *counts.entry(w.wire_code()).or_insert(0) += 1;
    }
    if counts.is_empty() {
        println!("No warnings.");
        return;
    }
    for (code, count) in counts {
        println!("{:<5} {}", count, code);
    }
}

fn print_node(store: &ObjStore, uid: Uid, indent: usize, max_depth: Option<usize>) {
    if let Some(limit) = max_depth {
        if indent > limit {
            println!("{}...", "  ".repeat(indent));
            return;
        }
    }
    let pad = "  ".repeat(indent);
    match store.get(uid) {
        Node::Null => println!("{}null", pad),
        Node::Boolean(b) => println!("{}{}", pad, b),
        Node::Integer(n) => println!("{}{}", pad, n),
        Node::Real(n) => println!("{}{}", pad, n),
        Node::Name(n) => println!("{}/{}", pad, n),
        Node::Text { value, .. } => println!("{}({})", pad, truncate(value, 100)),
        Node::Bytes(b) => println!("{}<bytes: {} bytes>", pad, b.len()),
        Node::Date(d) => println!(
            "{}D:{:04}{:02}{:02}{:02}{:02}{:02}",
            pad, d.year, d.month, d.day, d.hour, d.minute, d.second
        ),
        Node::Comment(c) => println!("{}% {}", pad, truncate(c, 80)),
        Node::Junk(j) => println!("{}<junk: {}>", pad, truncate(j, 80)),
        Node::Op(op) => println!("{}{}", pad, op),
        Node::Array(items) => {
            if items.is_empty() {
                println!("{}[]", pad);
            } else {
                println!("{}[", pad);
                for &child in items {
                    print_node(store, child, indent + 1, max_depth);
                }
                println!("{}]", pad);
            }
        }
        Node::Dictionary(map) => {
            if map.is_empty() {
                println!("{}<< >>", pad);
            } else {
                println!("{}<<", pad);
                for (key, &child) in map {
                    println!("{}  /{}:", pad, key);
                    print_node(store, child, indent + 2, max_depth);
                }
                println!("{}>>", pad);
            }
        }
        Node::Content(ops) => {
            println!("{}content ({} nodes)", pad, ops.len());
            for &child in ops {
                print_node(store, child, indent + 1, max_depth);
            }
        }
        Node::Root(tables) => {
            println!("{}root ({} revision(s))", pad, tables.len());
            for &child in tables {
                print_node(store, child, indent + 1, max_depth);
            }
        }
        Node::Table(t) => {
            println!(
                "{}table: {} child object(s), trailer={}, xref_obj={}",
                pad,
                t.children.len(),
                t.trailer.is_some(),
                t.xref_obj.is_some()
            );
            if let Some(trailer) = t.trailer {
                println!("{}  trailer:", pad);
                print_node(store, trailer, indent + 2, max_depth);
            }
        }
        Node::Indirect(ind) => {
            println!("{}{} {} obj", pad, ind.identifier.num, ind.identifier.gen);
            if let Some(direct) = ind.direct {
                print_node(store, direct, indent + 1, max_depth);
            }
        }
        Node::Ref(r) => println!(
            "{}{} {} R{}",
            pad,
            r.identifier.num,
            r.identifier.gen,
            if r.indirect.is_some() { "" } else { " (unresolved)" }
        ),
        Node::Stream(s) => {
            let len = match (s.source_start, s.source_end) {
                (Some(start), Some(end)) => end.saturating_sub(start),
                _ => 0,
            };
            println!(
                "{}stream [{}] ({} source bytes)",
                pad,
                s.stream_type.as_deref().unwrap_or("unclassified"),
                len
            );
            if let Some(direct) = s.direct {
                print_node(store, direct, indent + 1, max_depth);
            }
        }
        Node::Xref(x) => println!(
            "{}xref table: widths={:?}, {} subsection(s), {} entries",
            pad,
            x.widths,
            x.subsections.len(),
            x.entries.len()
        ),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() > max {
        format!("{}...", &s[..max])
    } else {
        s.to_string()
    }
}
