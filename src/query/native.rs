//! Engine-level query plan and its evaluation against one segment.
//!
//! A `NativeQuery` is a pure value: it hashes and compares structurally so it
//! can key the result cache. Compiling it against a `LiveSegment` yields a
//! `MatchTree`, the matching doc set plus what is needed to score a doc.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Bound;
use regex::Regex;
use roaring::RoaringBitmap;
use crate::analysis::tokenizer::{contains_phrase, StandardTokenizer, Tokenizer};
use crate::core::error::Result;
use crate::index::generation::{Generation, LiveSegment};
use crate::index::term::{self, encode_str, term_key};
use crate::scoring::scorer::{Scorer, TermStats};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NativeQuery {
    Term { key: Vec<u8> },
    Range { lower: Bound<Vec<u8>>, upper: Bound<Vec<u8>> },
    Prefix { field: String, prefix: Vec<u8> },
    Pattern { field: String, pattern: TermPattern },
    Phrase { field: String, tokens: Vec<String> },
    Exists { field: String },
    Boolean(BooleanQuery),
    All,
    ConstantScore(Box<NativeQuery>),
}

/// `must` and `filter` clauses are intersected; `filter` does not score.
/// Without either, at least one `should` clause has to match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BooleanQuery {
    pub must: Vec<NativeQuery>,
    pub should: Vec<NativeQuery>,
    pub must_not: Vec<NativeQuery>,
    pub filter: Vec<NativeQuery>,
}

/// Compiled wildcard pattern, compared by its source.
#[derive(Clone)]
pub struct TermPattern {
    source: String,
    ignore_case: bool,
    regex: Regex,
}

impl TermPattern {
    /// `*` matches any run of characters, `?` exactly one.
    pub fn wildcard(pattern: &str, ignore_case: bool) -> Result<Self> {
        let mut expr = String::with_capacity(pattern.len() + 8);
        if ignore_case {
            expr.push_str("(?i)");
        }
        expr.push('^');
        for c in pattern.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        expr.push('$');

        Ok(TermPattern {
            source: pattern.to_string(),
            ignore_case,
            regex: Regex::new(&expr)?,
        })
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

impl fmt::Debug for TermPattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TermPattern({:?}, ignore_case={})", self.source, self.ignore_case)
    }
}

impl PartialEq for TermPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.ignore_case == other.ignore_case
    }
}

impl Eq for TermPattern {}

impl Hash for TermPattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
        self.ignore_case.hash(state);
    }
}

/// Matching docs of one query node in one segment.
#[derive(Debug, Clone)]
pub struct MatchTree {
    docs: RoaringBitmap,
    weight: f32,
    children: Vec<MatchTree>,
}

impl MatchTree {
    fn leaf(docs: RoaringBitmap, weight: f32) -> Self {
        MatchTree {
            docs,
            weight,
            children: Vec::new(),
        }
    }

    pub fn docs(&self) -> &RoaringBitmap {
        &self.docs
    }

    pub fn into_docs(self) -> RoaringBitmap {
        self.docs
    }

    /// Sum of the weights of the matching scoring leaves.
    pub fn score(&self, doc: u32) -> f32 {
        if !self.docs.contains(doc) {
            return 0.0;
        }
        if self.children.is_empty() {
            return self.weight;
        }
        self.children.iter().map(|child| child.score(doc)).sum()
    }
}

/// What a compile step needs beyond the segment itself.
pub struct CompileContext<'a> {
    pub generation: &'a Generation,
    pub scorer: &'a dyn Scorer,
}

impl NativeQuery {
    /// Conjunction of `query` and an optional non-scoring filter.
    pub fn filtered(query: NativeQuery, filter: Option<NativeQuery>) -> NativeQuery {
        match filter {
            None => query,
            Some(filter) => NativeQuery::Boolean(BooleanQuery {
                must: vec![query],
                filter: vec![filter],
                ..BooleanQuery::default()
            }),
        }
    }

    pub fn constant_score(self) -> NativeQuery {
        match self {
            already @ NativeQuery::ConstantScore(_) => already,
            other => NativeQuery::ConstantScore(Box::new(other)),
        }
    }

    /// Match this query against one segment. Deleted docs are not removed
    /// here; callers intersect with the segment's live docs.
    pub fn compile(&self, live: &LiveSegment, ctx: &CompileContext) -> Result<MatchTree> {
        let segment = live.segment();
        let tree = match self {
            NativeQuery::Term { key } => {
                let docs = segment.postings(key).cloned().unwrap_or_default();
                MatchTree::leaf(docs, term_weight(ctx, key))
            }
            NativeQuery::Range { lower, upper } => MatchTree::leaf(segment.union_range(lower, upper), 1.0),
            NativeQuery::Prefix { field, prefix } => MatchTree::leaf(segment.union_prefix(field, prefix), 1.0),
            NativeQuery::Pattern { field, pattern } => {
                MatchTree::leaf(segment.union_matching(field, pattern.regex()), 1.0)
            }
            NativeQuery::Phrase { field, tokens } => self.compile_phrase(live, ctx, field, tokens)?,
            NativeQuery::Exists { field } => {
                MatchTree::leaf(segment.field_docs(field).cloned().unwrap_or_default(), 1.0)
            }
            NativeQuery::Boolean(boolean) => boolean.compile(live, ctx)?,
            NativeQuery::All => MatchTree::leaf(segment.all_docs(), 1.0),
            NativeQuery::ConstantScore(inner) => MatchTree::leaf(inner.compile(live, ctx)?.into_docs(), 1.0),
        };
        Ok(tree)
    }

    fn compile_phrase(
        &self,
        live: &LiveSegment,
        ctx: &CompileContext,
        field: &str,
        tokens: &[String],
    ) -> Result<MatchTree> {
        let segment = live.segment();
        let text_field = term::text_field(field);

        let mut weight = 0.0;
        let mut candidates: Option<RoaringBitmap> = None;
        for token in tokens {
            let key = term_key(&text_field, &encode_str(token));
            weight += term_weight(ctx, &key);
            let postings = segment.postings(&key).cloned().unwrap_or_default();
            candidates = Some(match candidates {
                Some(docs) => docs & postings,
                None => postings,
            });
        }
        let candidates = candidates.unwrap_or_default() & live.live_docs();

        // Postings carry no positions; confirm word order on the stored text
        let tokenizer = StandardTokenizer::default();
        let mut docs = RoaringBitmap::new();
        for doc in &candidates {
            for text in segment.stored_strings(doc, field)? {
                let words = tokenizer.terms(&text);
                if contains_phrase(&words, tokens) {
                    docs.insert(doc);
                    break;
                }
            }
        }
        Ok(MatchTree::leaf(docs, weight))
    }
}

impl BooleanQuery {
    fn compile(&self, live: &LiveSegment, ctx: &CompileContext) -> Result<MatchTree> {
        let mut scoring = Vec::with_capacity(self.must.len() + self.should.len());
        let mut required: Option<RoaringBitmap> = None;

        for clause in &self.must {
            let tree = clause.compile(live, ctx)?;
            required = Some(intersect(required, tree.docs()));
            scoring.push(tree);
        }
        for clause in &self.filter {
            let tree = clause.compile(live, ctx)?;
            required = Some(intersect(required, tree.docs()));
        }

        let mut any_should = RoaringBitmap::new();
        for clause in &self.should {
            let tree = clause.compile(live, ctx)?;
            any_should |= tree.docs();
            scoring.push(tree);
        }

        let mut docs = match required {
            Some(docs) => docs,
            None if !self.should.is_empty() => any_should,
            None => live.segment().all_docs(),
        };
        for clause in &self.must_not {
            docs -= clause.compile(live, ctx)?.docs();
        }

        let tree = if scoring.is_empty() {
            MatchTree::leaf(docs, 1.0)
        } else {
            MatchTree {
                docs,
                weight: 0.0,
                children: scoring,
            }
        };
        Ok(tree)
    }
}

fn intersect(acc: Option<RoaringBitmap>, docs: &RoaringBitmap) -> RoaringBitmap {
    match acc {
        Some(acc) => acc & docs,
        None => docs.clone(),
    }
}

fn term_weight(ctx: &CompileContext, key: &[u8]) -> f32 {
    ctx.scorer.term_weight(TermStats {
        doc_freq: ctx.generation.doc_freq(key),
        total_docs: ctx.generation.num_docs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::core::types::PropertyName;
    use crate::index::document::IndexDocument;
    use crate::index::generation::GenerationKey;
    use crate::index::segment::SegmentBuilder;
    use crate::scoring::scorer::Bm25Scorer;
    use crate::security::acl::Acl;

    fn generation() -> Generation {
        let title = PropertyName::local("title");
        let mut builder = SegmentBuilder::new();
        for (uri, text) in [
            ("/a", "quick brown fox"),
            ("/b", "brown quick fox"),
            ("/c", "lazy dog"),
        ] {
            let doc = IndexDocument::new(uri, "file", "alice", Acl::owner_default())
                .unwrap()
                .with_property(title.clone(), text);
            builder.add(&doc).unwrap();
        }
        let segment = Arc::new(builder.build().unwrap());
        Generation::new(
            GenerationKey(1),
            vec![LiveSegment::new(segment, Arc::new(RoaringBitmap::new()))],
        )
    }

    fn run(generation: &Generation, query: &NativeQuery) -> Vec<u32> {
        let ctx = CompileContext {
            generation,
            scorer: &Bm25Scorer,
        };
        query
            .compile(&generation.segments()[0], &ctx)
            .unwrap()
            .docs()
            .iter()
            .collect()
    }

    #[test]
    fn wildcard_patterns_are_anchored() {
        let pattern = TermPattern::wildcard("/a*.t?t", false).unwrap();
        assert!(pattern.is_match("/abc.txt"));
        assert!(!pattern.is_match("x/abc.txt"));
        assert!(!pattern.is_match("/abc.text"));
        assert!(TermPattern::wildcard("A*", true).unwrap().is_match("abc"));
    }

    #[test]
    fn phrases_respect_word_order() {
        let generation = generation();
        let query = NativeQuery::Phrase {
            field: ":title".to_string(),
            tokens: vec!["quick".to_string(), "brown".to_string()],
        };
        assert_eq!(run(&generation, &query), vec![0]);
    }

    #[test]
    fn boolean_clauses_combine() {
        let generation = generation();
        let fox = NativeQuery::Term {
            key: term_key(&term::text_field(":title"), &encode_str("fox")),
        };
        let first = NativeQuery::Term {
            key: term_key(term::URI, &encode_str("/a")),
        };

        let only_not = NativeQuery::Boolean(BooleanQuery {
            must_not: vec![fox.clone()],
            ..BooleanQuery::default()
        });
        assert_eq!(run(&generation, &only_not), vec![2]);

        let filtered = NativeQuery::filtered(fox, Some(NativeQuery::Boolean(BooleanQuery {
            must_not: vec![first],
            ..BooleanQuery::default()
        })));
        assert_eq!(run(&generation, &filtered), vec![1]);
    }

    #[test]
    fn rarer_terms_score_higher() {
        let generation = generation();
        let ctx = CompileContext {
            generation: &generation,
            scorer: &Bm25Scorer,
        };
        let query = NativeQuery::Boolean(BooleanQuery {
            should: vec![
                NativeQuery::Term { key: term_key(&term::text_field(":title"), &encode_str("fox")) },
                NativeQuery::Term { key: term_key(&term::text_field(":title"), &encode_str("lazy")) },
            ],
            ..BooleanQuery::default()
        });
        let tree = query.compile(&generation.segments()[0], &ctx).unwrap();
        assert!(tree.score(2) > tree.score(0));
        assert_eq!(tree.score(7), 0.0);

        let constant = query.constant_score().compile(&generation.segments()[0], &ctx).unwrap();
        assert_eq!(constant.score(0), constant.score(2));
    }
}
