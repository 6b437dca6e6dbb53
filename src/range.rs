//! Page range expressions
//!
//! Turns user-supplied expressions such as `"1-3, 5, 7-9"` into a validated,
//! deduplicated set of zero-based page indices. Parsing is permissive (parts
//! that are not numbers are skipped) while bounds are strict (anything outside
//! the document is dropped). Only a selection that ends up empty is an error.

use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// One comma-separated part of a range expression, 1-based as typed by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeToken {
    /// A single page number: `"5"`
    Single(usize),
    /// An inclusive interval: `"1-3"`
    Interval(usize, usize),
}

impl RangeToken {
    /// Parse one trimmed, non-empty part of an expression
    ///
    /// Returns `None` for anything that is not a plain number or a pair of
    /// numbers joined by exactly one hyphen.
    fn parse(part: &str) -> Option<Self> {
        if part.contains('-') {
            let mut sides = part.split('-');
            let start = sides.next()?.trim().parse().ok()?;
            let end = sides.next()?.trim().parse().ok()?;
            if sides.next().is_some() {
                return None;
            }
            Some(RangeToken::Interval(start, end))
        } else {
            part.parse().ok().map(RangeToken::Single)
        }
    }

    /// Zero-based indices this token contributes to a document of `page_count` pages
    fn indices(self, page_count: usize) -> Option<std::ops::RangeInclusive<usize>> {
        match self {
            RangeToken::Single(page) if (1..=page_count).contains(&page) => {
                Some(page - 1..=page - 1)
            }
            RangeToken::Interval(start, end) if start >= 1 && end <= page_count && start <= end => {
                Some(start - 1..=end - 1)
            }
            _ => None,
        }
    }
}

/// Split an expression into tokens
///
/// Parts are separated by `,` and trimmed; empty parts and parts that fail to
/// parse are skipped. The iterator is lazy and keeps the order of the input.
///
/// # Example
///
/// ```
/// use pdf_toolkit::range::{tokens, RangeToken};
///
/// let parsed: Vec<RangeToken> = tokens("1-3, ,x,5").collect();
/// assert_eq!(parsed, vec![RangeToken::Interval(1, 3), RangeToken::Single(5)]);
/// ```
pub fn tokens(expression: &str) -> impl Iterator<Item = RangeToken> + '_ {
    expression
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(RangeToken::parse)
}

/// Validated set of zero-based page indices, iterated in ascending order
///
/// A successfully built set always holds at least one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageIndexSet {
    indices: BTreeSet<usize>,
}

impl PageIndexSet {
    /// Resolve tokens against a page count
    ///
    /// Tokens outside `1..=page_count` and reversed intervals are dropped.
    /// Fails with [`Error::NoValidPages`] if nothing survives.
    pub fn from_tokens<I>(tokens: I, page_count: usize) -> Result<Self>
    where
        I: IntoIterator<Item = RangeToken>,
    {
        let indices: BTreeSet<usize> = tokens
            .into_iter()
            .filter_map(|token| token.indices(page_count))
            .flatten()
            .collect();

        if indices.is_empty() {
            return Err(Error::NoValidPages);
        }

        Ok(Self { indices })
    }

    /// Whether the zero-based page index is selected
    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    /// Number of selected pages
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Always false for a constructed set
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Selected indices in ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    /// Selected indices as a sorted vector
    pub fn to_vec(&self) -> Vec<usize> {
        self.iter().collect()
    }
}

/// Parse and resolve a range expression in one step
///
/// # Example
///
/// ```
/// use pdf_toolkit::range::resolve_pages;
///
/// let pages = resolve_pages("1-3,7,20", 10).unwrap();
/// assert_eq!(pages.to_vec(), vec![0, 1, 2, 6]);
/// ```
pub fn resolve_pages(expression: &str, page_count: usize) -> Result<PageIndexSet> {
    PageIndexSet::from_tokens(tokens(expression), page_count)
}
