//! `json-observe-replay`: replay a script of writes against a document and
//! print every delivered change batch.
//!
//! Usage:
//!   json-observe-replay '<script-array-json>'
//!
//! The document is read from stdin. The script is the first argument. Output
//! is one JSON object per line: each flush as `{"path", "changes"}`, then the
//! final `{"document"}`.

use std::io::{self, Read, Write};

use json_observe::replay::{render, replay};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let script = match args.get(1) {
        Some(s) => s.clone(),
        None => {
            eprintln!("First argument must be a JSON script array.");
            std::process::exit(1);
        }
    };

    let mut buf = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut buf) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    match replay(buf.trim(), &script) {
        Ok(lines) => {
            let mut out = io::stdout().lock();
            if let Err(e) = writeln!(out, "{}", render(&lines)) {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
