//! In-memory inverted index over pages.
//!
//! Terms are kept in a `BTreeMap` so a prefix query is a range scan. Every
//! page also records its length and distinct terms, which makes removal
//! proportional to the page size instead of the vocabulary size.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::analysis::Analyzer;
use crate::config::LexicalConfig;
use crate::document::PageKey;
use crate::lexical::bm25::Bm25;
use crate::lexical::posting::{Posting, PostingList, difference, intersect, union};
use crate::query::{LexicalQuery, PhraseTerm};
use crate::search::RankedList;

#[derive(Debug, Clone, Default)]
struct PageStats {
    /// Number of indexed tokens.
    length: u32,
    /// Distinct terms of the page.
    terms: Vec<String>,
}

/// Summary of the index contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LexicalStats {
    pub pages: usize,
    pub terms: usize,
    pub postings: usize,
    pub avg_page_length: f32,
}

/// Inverted index with BM25 ranking.
#[derive(Debug, Clone)]
pub struct LexicalIndex {
    analyzer: Analyzer,
    bm25: Bm25,
    postings: BTreeMap<String, PostingList>,
    pages: BTreeMap<PageKey, PageStats>,
    total_length: u64,
}

impl LexicalIndex {
    pub fn new(analyzer: Analyzer, bm25: Bm25) -> Self {
        LexicalIndex {
            analyzer,
            bm25,
            postings: BTreeMap::new(),
            pages: BTreeMap::new(),
            total_length: 0,
        }
    }

    pub fn from_config(config: &LexicalConfig) -> Self {
        Self::new(Analyzer::from_config(config), Bm25::from_config(config))
    }

    /// The analyzer used for indexing. Queries must be parsed with the same one.
    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn bm25(&self) -> Bm25 {
        self.bm25
    }

    /// Tokenize and index a page, replacing any previous version of it.
    ///
    /// Returns the page length in tokens.
    pub fn add_page(&mut self, doc_id: &str, page_num: u32, text: &str) -> u32 {
        let key = PageKey::new(doc_id, page_num);
        if self.pages.contains_key(&key) {
            self.remove_key(&key);
        }

        let tokens = self.analyzer.analyze(text);
        let length = tokens.len() as u32;

        let mut positions: AHashMap<String, Vec<u32>> = AHashMap::new();
        for token in tokens {
            positions.entry(token.term).or_default().push(token.position);
        }

        let mut terms = Vec::with_capacity(positions.len());
        for (term, term_positions) in positions {
            self.postings
                .entry(term.clone())
                .or_default()
                .upsert(Posting::new(key.clone(), term_positions));
            terms.push(term);
        }
        terms.sort_unstable();

        self.total_length += u64::from(length);
        self.pages.insert(key, PageStats { length, terms });

        length
    }

    /// Remove every posting of a page. Returns whether the page was indexed.
    pub fn remove_page(&mut self, doc_id: &str, page_num: u32) -> bool {
        self.remove_key(&PageKey::new(doc_id, page_num))
    }

    /// Remove every page of a document. Returns the number of pages removed.
    pub fn remove_document(&mut self, doc_id: &str) -> usize {
        let keys = self.document_pages(doc_id);
        for key in &keys {
            self.remove_key(key);
        }
        keys.len()
    }

    fn remove_key(&mut self, key: &PageKey) -> bool {
        let Some(stats) = self.pages.remove(key) else {
            return false;
        };

        for term in &stats.terms {
            if let Some(list) = self.postings.get_mut(term) {
                list.remove(key);
                if list.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
        self.total_length -= u64::from(stats.length);
        true
    }

    /// Indexed pages of a document, in page order.
    pub fn document_pages(&self, doc_id: &str) -> Vec<PageKey> {
        let start = PageKey::new(doc_id, 0);
        let end = PageKey::new(doc_id, u32::MAX);
        self.pages.range(start..=end).map(|(k, _)| k.clone()).collect()
    }

    pub fn clear(&mut self) {
        self.postings.clear();
        self.pages.clear();
        self.total_length = 0;
    }

    /// Number of pages containing `term` (already normalized).
    pub fn df(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, PostingList::len)
    }

    pub fn postings(&self, term: &str) -> Option<&PostingList> {
        self.postings.get(term)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    pub fn contains_page(&self, key: &PageKey) -> bool {
        self.pages.contains_key(key)
    }

    pub fn page_length(&self, key: &PageKey) -> Option<u32> {
        self.pages.get(key).map(|s| s.length)
    }

    /// Average page length in tokens, maintained incrementally.
    pub fn avg_page_length(&self) -> f32 {
        if self.pages.is_empty() {
            0.0
        } else {
            self.total_length as f32 / self.pages.len() as f32
        }
    }

    pub fn stats(&self) -> LexicalStats {
        LexicalStats {
            pages: self.pages.len(),
            terms: self.postings.len(),
            postings: self.postings.values().map(PostingList::len).sum(),
            avg_page_length: self.avg_page_length(),
        }
    }

    /// Indexed terms starting with `prefix`, in lexicographic order.
    pub fn expand_prefix(&self, prefix: &str) -> Vec<&str> {
        self.prefix_range(prefix).map(|(term, _)| term.as_str()).collect()
    }

    fn prefix_range<'a, 'p>(&'a self, prefix: &'p str) -> impl Iterator<Item = (&'a String, &'a PostingList)> {
        self.postings
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(term, _)| term.starts_with(prefix))
    }

    /// Evaluate a query and rank the matching pages by BM25.
    ///
    /// `limit` and `offset` select a window of the full ranking; ranks in the
    /// returned list are absolute.
    pub fn query(&self, query: &LexicalQuery, limit: usize, offset: usize) -> RankedList {
        if query.is_empty() || self.pages.is_empty() {
            return RankedList::empty();
        }

        let matched = self.evaluate(query);
        if matched.is_empty() {
            return RankedList::empty();
        }

        let scorer = self.scorer(query);
        let scored = matched
            .into_iter()
            .map(|key| (key.clone(), scorer.score(self, key)))
            .collect();

        RankedList::from_scored(scored, limit, offset)
    }

    /// Pages matching the query, without scoring, in key order.
    pub fn matching_pages(&self, query: &LexicalQuery) -> Vec<PageKey> {
        self.evaluate(query).into_iter().cloned().collect()
    }

    fn evaluate<'a>(&'a self, query: &LexicalQuery) -> Vec<&'a PageKey> {
        match query {
            LexicalQuery::Term(term) => self.postings.get(term).map(PostingList::pages).unwrap_or_default(),
            LexicalQuery::Prefix(prefix) => self
                .prefix_range(prefix)
                .fold(Vec::new(), |acc, (_, list)| union(&acc, &list.pages())),
            LexicalQuery::Phrase(terms) => self
                .phrase_frequencies(terms)
                .into_iter()
                .map(|(key, _)| key)
                .collect(),
            LexicalQuery::And(children) => {
                let mut required = Vec::new();
                let mut excluded = Vec::new();
                for child in children {
                    match child {
                        LexicalQuery::Not(inner) => excluded.push(inner.as_ref()),
                        other => required.push(other),
                    }
                }

                let mut iter = required.into_iter();
                let Some(first) = iter.next() else {
                    return Vec::new();
                };
                let mut result = self.evaluate(first);
                for child in iter {
                    if result.is_empty() {
                        return result;
                    }
                    result = intersect(&result, &self.evaluate(child));
                }
                for child in excluded {
                    if result.is_empty() {
                        break;
                    }
                    result = difference(&result, &self.evaluate(child));
                }
                result
            }
            LexicalQuery::Or(children) => children
                .iter()
                .fold(Vec::new(), |acc, child| union(&acc, &self.evaluate(child))),
            LexicalQuery::Not(_) | LexicalQuery::Empty => Vec::new(),
        }
    }

    /// Pages where the phrase occurs, with the number of occurrences.
    fn phrase_frequencies<'a>(&'a self, terms: &[PhraseTerm]) -> Vec<(&'a PageKey, u32)> {
        let Some(first) = terms.first() else {
            return Vec::new();
        };

        let mut lists = Vec::with_capacity(terms.len());
        for phrase_term in terms {
            match self.postings.get(&phrase_term.term) {
                Some(list) => lists.push(list),
                None => return Vec::new(),
            }
        }

        let mut candidates = lists[0].pages();
        for list in &lists[1..] {
            candidates = intersect(&candidates, &list.pages());
        }

        candidates
            .into_iter()
            .filter_map(|key| {
                let freq = phrase_frequency(terms, first.offset, &lists, key);
                (freq > 0).then_some((key, freq))
            })
            .collect()
    }

    fn scorer(&self, query: &LexicalQuery) -> QueryScorer {
        let mut terms = BTreeSet::new();
        let mut phrases: Vec<Vec<PhraseTerm>> = Vec::new();
        self.collect_scoring(query, &mut terms, &mut phrases);

        let n = self.pages.len();
        let term_idfs = terms
            .into_iter()
            .map(|term| {
                let idf = self.bm25.idf(n, self.df(&term));
                (term, idf)
            })
            .collect();
        let phrase_idfs = phrases
            .into_iter()
            .map(|phrase| {
                let idf = phrase.iter().map(|t| self.bm25.idf(n, self.df(&t.term))).sum::<f32>();
                (phrase, idf)
            })
            .collect();

        QueryScorer {
            terms: term_idfs,
            phrases: phrase_idfs,
        }
    }

    fn collect_scoring(&self, query: &LexicalQuery, terms: &mut BTreeSet<String>, phrases: &mut Vec<Vec<PhraseTerm>>) {
        match query {
            LexicalQuery::Term(term) => {
                terms.insert(term.clone());
            }
            LexicalQuery::Prefix(prefix) => {
                terms.extend(self.expand_prefix(prefix).into_iter().map(str::to_string));
            }
            LexicalQuery::Phrase(phrase) => {
                if !phrases.contains(phrase) {
                    phrases.push(phrase.clone());
                }
            }
            LexicalQuery::And(children) | LexicalQuery::Or(children) => {
                for child in children {
                    self.collect_scoring(child, terms, phrases);
                }
            }
            LexicalQuery::Not(_) | LexicalQuery::Empty => {}
        }
    }
}

fn phrase_frequency(terms: &[PhraseTerm], base_offset: u32, lists: &[&PostingList], key: &PageKey) -> u32 {
    let mut postings = Vec::with_capacity(lists.len());
    for list in lists {
        match list.get(key) {
            Some(posting) => postings.push(posting),
            None => return 0,
        }
    }

    let mut freq = 0;
    for &start in &postings[0].positions {
        let anchored = terms.iter().zip(&postings).skip(1).all(|(term, posting)| {
            let target = i64::from(start) + i64::from(term.offset) - i64::from(base_offset);
            u32::try_from(target).is_ok_and(|p| posting.has_position(p))
        });
        if anchored {
            freq += 1;
        }
    }
    freq
}

/// Scoring components of one query with their precomputed IDFs.
///
/// Each distinct non-negated term contributes once; prefix expansions are
/// scored as independent terms, so a prefix matching several terms in a page
/// scores higher than any single one of them. A phrase contributes the sum of
/// its terms' IDFs weighted by the saturated phrase frequency.
struct QueryScorer {
    terms: Vec<(String, f32)>,
    phrases: Vec<(Vec<PhraseTerm>, f32)>,
}

impl QueryScorer {
    fn score(&self, index: &LexicalIndex, key: &PageKey) -> f32 {
        let page_length = index.page_length(key).unwrap_or(0) as f32;
        let avgdl = index.avg_page_length();
        let bm25 = index.bm25;

        let mut score = 0.0;
        for (term, idf) in &self.terms {
            let tf = index
                .postings
                .get(term)
                .and_then(|list| list.get(key))
                .map_or(0, Posting::frequency);
            if tf > 0 {
                score += bm25.term_score(*idf, tf as f32, page_length, avgdl);
            }
        }

        for (phrase, idf) in &self.phrases {
            let Some(first) = phrase.first() else {
                continue;
            };
            let lists: Option<Vec<&PostingList>> = phrase.iter().map(|t| index.postings.get(&t.term)).collect();
            let Some(lists) = lists else {
                continue;
            };
            let freq = phrase_frequency(phrase, first.offset, &lists, key);
            if freq > 0 {
                score += bm25.term_score(*idf, freq as f32, page_length, avgdl);
            }
        }

        score
    }
}
