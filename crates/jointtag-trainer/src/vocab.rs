//! Word and tag vocabularies.
//!
//! Id 0 is always `<pad>`. Word vocabularies also reserve id 1 for `<unk>`;
//! tag vocabularies have no unknown entry, so an unseen tag is an error.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::batcher::EncodedSentence;
use crate::data::TaggedSentence;

pub const PAD: &str = "<pad>";
pub const UNK: &str = "<unk>";

/// Bidirectional string/id map.
#[derive(Debug, Clone)]
pub struct Vocab {
    tokens: Vec<String>,
    index: HashMap<String, u32>,
    unk: Option<u32>,
}

impl Vocab {
    /// Build from an id-ordered token list.
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        let index: HashMap<String, u32> = tokens
            .iter()
            .enumerate()
            .map(|(i, token)| (token.clone(), i as u32))
            .collect();
        let unk = index.get(UNK).copied();
        Self { tokens, index, unk }
    }

    /// Word vocabulary: `<pad>`, `<unk>`, then every distinct item in sorted order.
    pub fn words<'a>(items: impl IntoIterator<Item = &'a str>) -> Self {
        Self::with_reserved(&[PAD, UNK], items)
    }

    /// Tag vocabulary: `<pad>`, then every distinct tag in sorted order.
    pub fn tags<'a>(items: impl IntoIterator<Item = &'a str>) -> Self {
        Self::with_reserved(&[PAD], items)
    }

    fn with_reserved<'a>(reserved: &[&str], items: impl IntoIterator<Item = &'a str>) -> Self {
        let distinct: BTreeSet<&str> = items
            .into_iter()
            .filter(|item| !reserved.contains(item))
            .collect();
        let tokens = reserved
            .iter()
            .copied()
            .chain(distinct)
            .map(str::to_string)
            .collect();
        Self::from_tokens(tokens)
    }

    /// Id of `token`, falling back to `<unk>` when the vocabulary has one.
    pub fn id(&self, token: &str) -> Option<u32> {
        self.index.get(token).copied().or(self.unk)
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

#[derive(Serialize, Deserialize)]
struct VocabFile {
    words: Vec<String>,
    pos: Vec<String>,
    chunks: Vec<String>,
}

/// The three vocabularies a tagger needs.
#[derive(Debug, Clone)]
pub struct Vocabularies {
    pub words: Vocab,
    pub pos: Vocab,
    pub chunks: Vocab,
}

impl Vocabularies {
    /// Collect every word and tag seen in `sentences`.
    pub fn build(sentences: &[TaggedSentence]) -> Self {
        Self {
            words: Vocab::words(sentences.iter().flat_map(|s| s.words.iter().map(String::as_str))),
            pos: Vocab::tags(sentences.iter().flat_map(|s| s.pos.iter().map(String::as_str))),
            chunks: Vocab::tags(sentences.iter().flat_map(|s| s.chunks.iter().map(String::as_str))),
        }
    }

    /// Map a sentence to ids. Unknown words become `<unk>`; unknown tags fail.
    pub fn encode(&self, sentence: &TaggedSentence) -> Result<EncodedSentence> {
        let lookup = |vocab: &Vocab, kind: &str, items: &[String]| -> Result<Vec<u32>> {
            items
                .iter()
                .map(|item| match vocab.id(item) {
                    Some(id) => Ok(id),
                    None => bail!("unknown {kind} tag {item:?}"),
                })
                .collect()
        };

        Ok(EncodedSentence {
            tokens: lookup(&self.words, "word", &sentence.words)?,
            pos: lookup(&self.pos, "POS", &sentence.pos)?,
            chunks: lookup(&self.chunks, "chunk", &sentence.chunks)?,
        })
    }

    /// Encode many sentences.
    pub fn encode_all(&self, sentences: &[TaggedSentence]) -> Result<Vec<EncodedSentence>> {
        sentences.iter().map(|s| self.encode(s)).collect()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = VocabFile {
            words: self.words.tokens().to_vec(),
            pos: self.pos.tokens().to_vec(),
            chunks: self.chunks.tokens().to_vec(),
        };
        std::fs::write(path.as_ref(), serde_json::to_string_pretty(&file)?)
            .with_context(|| format!("writing vocabularies to {:?}", path.as_ref()))?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading vocabularies from {:?}", path.as_ref()))?;
        let file: VocabFile = serde_json::from_str(&content)?;
        Ok(Self {
            words: Vocab::from_tokens(file.words),
            pos: Vocab::from_tokens(file.pos),
            chunks: Vocab::from_tokens(file.chunks),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parse_conll;

    fn sentences() -> Vec<TaggedSentence> {
        parse_conll("He PRP B-NP\nran VBD B-VP\n\nShe PRP B-NP\nran VBD B-VP\n".as_bytes()).unwrap()
    }

    #[test]
    fn reserved_ids() {
        let vocab = Vocab::words(["b", "a", "b"]);
        assert_eq!(vocab.tokens(), &["<pad>", "<unk>", "a", "b"]);
        assert_eq!(vocab.id("a"), Some(2));
        assert_eq!(vocab.id("zzz"), Some(1));
        assert_eq!(vocab.token(3), Some("b"));

        let tags = Vocab::tags(["NN", "DT"]);
        assert_eq!(tags.tokens(), &["<pad>", "DT", "NN"]);
        assert_eq!(tags.id("VB"), None);
    }

    #[test]
    fn encode_sentence() {
        let vocabs = Vocabularies::build(&sentences());
        assert_eq!(vocabs.words.len(), 5);
        assert_eq!(vocabs.pos.len(), 3);

        let encoded = vocabs.encode(&sentences()[0]).unwrap();
        assert_eq!(encoded.tokens, vec![2, 4]);
        assert_eq!(encoded.pos, vec![1, 2]);
        assert_eq!(encoded.chunks, vec![1, 2]);
    }

    #[test]
    fn unseen_tag_is_error() {
        let vocabs = Vocabularies::build(&sentences());
        let other = parse_conll("It PRP B-ADJP\n".as_bytes()).unwrap();
        let err = vocabs.encode(&other[0]).unwrap_err();
        assert!(err.to_string().contains("B-ADJP"));
    }

    #[test]
    fn save_and_load() {
        let vocabs = Vocabularies::build(&sentences());
        let path = std::env::temp_dir().join(format!("jointtag-vocab-{}.json", std::process::id()));
        vocabs.save(&path).unwrap();
        let loaded = Vocabularies::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.words.tokens(), vocabs.words.tokens());
        assert_eq!(loaded.chunks.id("B-VP"), vocabs.chunks.id("B-VP"));
        assert_eq!(loaded.words.id("nobody"), Some(1));
    }
}
