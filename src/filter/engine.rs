use super::cancel::OpToken;
use super::LinePredicate;
use crate::reader::{LineSource, SourceError};
use rayon::prelude::*;
use std::ops::{ControlFlow, Range};

/// Lines per chunk when a scan is split across the rayon pool
const PARALLEL_CHUNK_SIZE: usize = 16_384;

/// Below this many lines a sequential scan is faster than fanning out
const PARALLEL_THRESHOLD: usize = 65_536;

/// How often (in lines) a scan re-checks its token
const SUPERSEDE_CHECK_INTERVAL: usize = 1024;

/// Narrows a source to the lines matching a filter, without touching the
/// source itself.
pub struct FilterEngine;

impl FilterEngine {
    /// Indices in `range` whose line satisfies `predicate(line, filter)`,
    /// in ascending order.
    ///
    /// Returns `Ok(None)` when `token` was superseded before the scan
    /// finished; partial results are never returned.
    pub fn scan(
        source: &dyn LineSource,
        predicate: &dyn LinePredicate,
        filter: &str,
        range: Range<usize>,
        token: &OpToken,
    ) -> Result<Option<Vec<usize>>, SourceError> {
        if token.is_superseded() {
            return Ok(None);
        }

        let matches = if source.supports_parallel_scan() && range.len() >= PARALLEL_THRESHOLD {
            Self::scan_parallel(source, predicate, filter, range, token)?
        } else {
            Self::scan_range(source, predicate, filter, range, token)?
        };

        if token.is_superseded() {
            tracing::trace!(op = token.id(), "Discarding superseded filter scan");
            return Ok(None);
        }
        Ok(Some(matches))
    }

    fn scan_range(
        source: &dyn LineSource,
        predicate: &dyn LinePredicate,
        filter: &str,
        range: Range<usize>,
        token: &OpToken,
    ) -> Result<Vec<usize>, SourceError> {
        let mut matches = Vec::new();
        let mut seen = 0usize;
        source.scan_lines(range, &mut |index, line| {
            seen += 1;
            if seen % SUPERSEDE_CHECK_INTERVAL == 0 && token.is_superseded() {
                return ControlFlow::Break(());
            }
            if predicate.matches(line, filter) {
                matches.push(index);
            }
            ControlFlow::Continue(())
        })?;
        Ok(matches)
    }

    fn scan_parallel(
        source: &dyn LineSource,
        predicate: &dyn LinePredicate,
        filter: &str,
        range: Range<usize>,
        token: &OpToken,
    ) -> Result<Vec<usize>, SourceError> {
        let chunks: Vec<Range<usize>> = (range.start..range.end)
            .step_by(PARALLEL_CHUNK_SIZE)
            .map(|start| start..(start + PARALLEL_CHUNK_SIZE).min(range.end))
            .collect();

        // Indexed collect keeps chunk order, so the result stays ascending
        let per_chunk: Vec<Vec<usize>> = chunks
            .into_par_iter()
            .map(|chunk| {
                if token.is_superseded() {
                    return Ok(Vec::new());
                }
                Self::scan_range(source, predicate, filter, chunk, token)
            })
            .collect::<Result<_, SourceError>>()?;

        Ok(per_chunk.into_iter().flatten().collect())
    }
}
