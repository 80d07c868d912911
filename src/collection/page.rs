use crate::filter::cancel::OpToken;
use crate::reader::{LineSource, SourceError};
use std::ops::{ControlFlow, Range};
use std::sync::Arc;

/// Turns raw line text into the collection's item type
pub type ItemFactory<T> = Arc<dyn Fn(&str) -> T + Send + Sync>;

/// Which source lines the collection exposes, in display order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// Every line `0..total`
    Unfiltered { total: usize },
    /// Only these line indices, ascending
    Filtered(Vec<usize>),
}

impl Default for View {
    fn default() -> Self {
        View::Unfiltered { total: 0 }
    }
}

impl View {
    pub fn len(&self) -> usize {
        match self {
            View::Unfiltered { total } => *total,
            View::Filtered(indices) => indices.len(),
        }
    }

    /// Source lines backing `request`, clamped to the view
    pub fn lines_for(&self, request: PageRequest) -> PageLines {
        let start = request.start.min(self.len());
        let end = request.start.saturating_add(request.size).min(self.len());
        match self {
            View::Unfiltered { .. } => PageLines::Range(start..end),
            View::Filtered(indices) => PageLines::Indices(indices[start..end].to_vec()),
        }
    }

    /// Account for lines appended to a growing source
    pub fn grow(&mut self, total: usize, matches: Option<Vec<usize>>) {
        match (self, matches) {
            (View::Unfiltered { total: current }, _) => *current = total.max(*current),
            (View::Filtered(indices), Some(mut added)) => indices.append(&mut added),
            (View::Filtered(_), None) => {}
        }
    }
}

/// A contiguous slice `[start, start + size)` of the view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub start: usize,
    pub size: usize,
}

impl PageRequest {
    pub fn new(start: usize, size: usize) -> Self {
        Self { start, size }
    }
}

/// Source line numbers for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageLines {
    Range(Range<usize>),
    Indices(Vec<usize>),
}

impl PageLines {
    pub fn len(&self) -> usize {
        match self {
            PageLines::Range(range) => range.len(),
            PageLines::Indices(indices) => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Materializes pages of items from a source
pub struct PageLoader<T> {
    item_factory: ItemFactory<T>,
    page_size: usize,
}

impl<T> Clone for PageLoader<T> {
    fn clone(&self) -> Self {
        Self {
            item_factory: Arc::clone(&self.item_factory),
            page_size: self.page_size,
        }
    }
}

impl<T> PageLoader<T> {
    pub fn new(item_factory: ItemFactory<T>, page_size: usize) -> Self {
        Self {
            item_factory,
            page_size: page_size.max(1),
        }
    }

    /// The page that follows `materialized` already visible items
    pub fn next_request(&self, materialized: usize) -> PageRequest {
        PageRequest::new(materialized, self.page_size)
    }

    /// Build the items for `lines`, in order.
    ///
    /// Returns `Ok(None)` once `token` is superseded; a page is either
    /// complete or not produced at all.
    pub fn materialize(
        &self,
        source: &dyn LineSource,
        lines: &PageLines,
        token: &OpToken,
    ) -> Result<Option<Vec<T>>, SourceError> {
        let mut items = Vec::with_capacity(lines.len());
        match lines {
            PageLines::Range(range) => {
                let mut short = false;
                let expected = range.len();
                source.scan_lines(range.clone(), &mut |_, text| {
                    if token.is_superseded() {
                        short = true;
                        return ControlFlow::Break(());
                    }
                    items.push((self.item_factory)(text));
                    ControlFlow::Continue(())
                })?;
                if !short && items.len() < expected {
                    // The source ended before the range did
                    let count = source.line_count()?;
                    return Err(SourceError::IndexOutOfRange {
                        index: range.start + items.len(),
                        count,
                    });
                }
            }
            PageLines::Indices(indices) => {
                for &index in indices {
                    if token.is_superseded() {
                        break;
                    }
                    let text = source.read_line(index)?;
                    items.push((self.item_factory)(&text));
                }
            }
        }

        if token.is_superseded() {
            return Ok(None);
        }
        Ok(Some(items))
    }
}
