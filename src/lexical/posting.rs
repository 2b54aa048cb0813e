//! Posting lists and sorted-set operations over page keys.
//!
//! A posting list holds one [`Posting`] per page containing the term, sorted
//! by [`PageKey`], so boolean evaluation is a linear merge.

use serde::{Deserialize, Serialize};

use crate::document::PageKey;

/// Occurrences of one term in one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub page: PageKey,
    /// Token positions, ascending. Term frequency is their count.
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn new(page: PageKey, mut positions: Vec<u32>) -> Self {
        positions.sort_unstable();
        Posting { page, positions }
    }

    /// Term frequency in the page.
    pub fn frequency(&self) -> u32 {
        self.positions.len() as u32
    }

    /// Whether the term occurs at `position`.
    pub fn has_position(&self, position: u32) -> bool {
        self.positions.binary_search(&position).is_ok()
    }
}

/// Postings of one term, sorted by page key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingList {
    postings: Vec<Posting>,
}

impl PostingList {
    pub fn new() -> Self {
        PostingList::default()
    }

    /// Insert or replace the posting for its page.
    pub fn upsert(&mut self, posting: Posting) {
        match self.postings.binary_search_by(|p| p.page.cmp(&posting.page)) {
            Ok(idx) => self.postings[idx] = posting,
            Err(idx) => self.postings.insert(idx, posting),
        }
    }

    /// Remove the posting for a page; returns whether one existed.
    pub fn remove(&mut self, page: &PageKey) -> bool {
        match self.postings.binary_search_by(|p| p.page.cmp(page)) {
            Ok(idx) => {
                self.postings.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    pub fn get(&self, page: &PageKey) -> Option<&Posting> {
        self.postings
            .binary_search_by(|p| p.page.cmp(page))
            .ok()
            .map(|idx| &self.postings[idx])
    }

    /// Document frequency: number of pages containing the term.
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Posting> {
        self.postings.iter()
    }

    /// Page keys in posting order.
    pub fn pages(&self) -> Vec<&PageKey> {
        self.postings.iter().map(|p| &p.page).collect()
    }
}

/// Intersection of two sorted key lists.
pub fn intersect<'a>(a: &[&'a PageKey], b: &[&'a PageKey]) -> Vec<&'a PageKey> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Union of two sorted key lists, without duplicates.
pub fn union<'a>(a: &[&'a PageKey], b: &[&'a PageKey]) -> Vec<&'a PageKey> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Keys of `a` that are not in `b`.
pub fn difference<'a>(a: &[&'a PageKey], b: &[&'a PageKey]) -> Vec<&'a PageKey> {
    let mut out = Vec::with_capacity(a.len());
    let mut j = 0;
    for key in a {
        while j < b.len() && b[j] < *key {
            j += 1;
        }
        if j < b.len() && b[j] == *key {
            continue;
        }
        out.push(*key);
    }
    out
}
