//! Ordered page-index ranges
//!
//! A [`PageRange`] is an ordered collection of index segments used to scope
//! an operation (import, export, rewrite) to a subset of pages. Segments
//! need not be contiguous or ascending, and the expansion order is the
//! order segments were added, which is what makes a range usable as a
//! destination ordering for page import.

use crate::error::{PdfError, Result};

/// An ordered set of inclusive index intervals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRange {
    segments: Vec<(usize, usize)>,
}

impl PageRange {
    pub fn new() -> Self {
        Self::default()
    }

    /// A range covering `0..count`.
    pub fn all(count: usize) -> Self {
        let mut range = Self::new();
        if count > 0 {
            range.segments.push((0, count - 1));
        }
        range
    }

    /// Append a single index.
    pub fn add_single(&mut self, index: usize) -> &mut Self {
        self.segments.push((index, index));
        self
    }

    /// Append an inclusive interval.
    pub fn add(&mut self, start: usize, end: usize) -> Result<&mut Self> {
        if start > end {
            return Err(PdfError::Param(format!(
                "Range start {start} is after end {end}"
            )));
        }
        self.segments.push((start, end));
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Expand to the full index sequence, in insertion order, duplicates
    /// included.
    pub fn indices(&self) -> Vec<usize> {
        let mut out = Vec::new();
        for &(start, end) in &self.segments {
            out.extend(start..=end);
        }
        out
    }

    /// Expand with duplicate indices collapsed to the position of their
    /// last occurrence.
    pub fn ordered_unique(&self) -> Vec<usize> {
        let expanded = self.indices();
        let mut out = Vec::with_capacity(expanded.len());
        for (pos, &index) in expanded.iter().enumerate() {
            let last = expanded
                .iter()
                .rposition(|&other| other == index)
                .unwrap_or(pos);
            if last == pos {
                out.push(index);
            }
        }
        out
    }

    /// Expand and bounds-check every index against `count`.
    pub fn resolve(&self, count: usize) -> Result<Vec<usize>> {
        let indices = self.ordered_unique();
        for &index in &indices {
            if index >= count {
                return Err(PdfError::Param(format!(
                    "Page index {index} out of bounds (document has {count} pages)"
                )));
            }
        }
        Ok(indices)
    }

    /// Parse a range expression such as `"0,2-4,7"` (zero-based).
    pub fn parse(spec: &str) -> Result<Self> {
        let mut range = Self::new();
        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(PdfError::Param(format!("Empty range segment in '{spec}'")));
            }
            match part.split_once('-') {
                Some((a, b)) => {
                    let start = parse_index(a)?;
                    let end = parse_index(b)?;
                    range.add(start, end)?;
                }
                None => {
                    range.add_single(parse_index(part)?);
                }
            }
        }
        Ok(range)
    }
}

fn parse_index(s: &str) -> Result<usize> {
    s.trim()
        .parse::<usize>()
        .map_err(|_| PdfError::Param(format!("Invalid page index '{s}'")))
}
