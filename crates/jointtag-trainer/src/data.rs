//! Data loading for CoNLL-2000 style POS/chunk files.
//!
//! One token per line as `word POS CHUNK` (whitespace separated), a blank
//! line between sentences. Extra middle columns are ignored; the chunk tag
//! is always the last column.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A sentence with its gold POS and chunk tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedSentence {
    pub words: Vec<String>,
    pub pos: Vec<String>,
    pub chunks: Vec<String>,
}

impl TaggedSentence {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Load a CoNLL-2000 file.
pub fn load_conll<P: AsRef<Path>>(path: P) -> std::io::Result<Vec<TaggedSentence>> {
    let file = File::open(path)?;
    parse_conll(BufReader::new(file))
}

/// Parse CoNLL-2000 text from any reader.
pub fn parse_conll<R: BufRead>(reader: R) -> std::io::Result<Vec<TaggedSentence>> {
    let mut sentences = Vec::new();
    let mut current = TaggedSentence {
        words: Vec::new(),
        pos: Vec::new(),
        chunks: Vec::new(),
    };

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();

        if line.is_empty() {
            if !current.is_empty() {
                sentences.push(std::mem::replace(
                    &mut current,
                    TaggedSentence {
                        words: Vec::new(),
                        pos: Vec::new(),
                        chunks: Vec::new(),
                    },
                ));
            }
            continue;
        }

        if line.starts_with('#') || line.starts_with("-DOCSTART-") {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }

        current.words.push(parts[0].to_string());
        current.pos.push(parts[1].to_string());
        current.chunks.push(parts[parts.len() - 1].to_string());
    }

    // Don't forget the last sentence
    if !current.is_empty() {
        sentences.push(current);
    }

    Ok(sentences)
}
