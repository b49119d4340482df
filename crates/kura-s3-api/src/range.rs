use kura_common::error::{KuraError, Result};
use kura_storage::ByteSpan;

/// Parses a `bytes=start-end` range expression. Returns `None` for anything
/// not shaped like that (wrong unit, suffix form, multiple ranges); callers
/// fall back to the full-object path.
pub(crate) fn parse_range_header(header: &str) -> Option<(u64, Option<u64>)> {
    let expr = header.strip_prefix("bytes=")?;
    let (start, end) = expr.split_once('-')?;

    let start = start.trim().parse::<u64>().ok()?;
    let end = match end.trim() {
        "" => None,
        end => Some(end.parse::<u64>().ok()?),
    };

    Some((start, end))
}

/// Resolves a parsed range against the object size. A start past the last
/// byte or an inverted range is unsatisfiable (416); an end past the last
/// byte is clamped.
pub(crate) fn resolve_span(start: u64, end: Option<u64>, size: u64) -> Result<ByteSpan> {
    let end = end.unwrap_or_else(|| size.saturating_sub(1));
    if start >= size || end < start {
        return Err(KuraError::RangeNotSatisfiable { start, end, size });
    }

    Ok(ByteSpan {
        start,
        end: end.min(size - 1),
    })
}
