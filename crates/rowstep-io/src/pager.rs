//! Filtering, ordering and cursor paging over materialized rows.
//!
//! Every datasource that serves rows from memory funnels them through
//! `build_frame`: filter (constraints, then expression), order by the frame
//! sorting extended with key columns, cut the page at the cursor, project.

use rowstep_core::error::Result;
use rowstep_core::filter::{CursorToken, Paging, PagingCursor, RowFilter, SortExpr, SortExprSet};
use rowstep_core::schema::{FrameColumn, FrameDescription};
use rowstep_core::types::Row;
use rowstep_expr::Evaluator;

use crate::frame::{Frame, FrameDefinition};

/// Sort order used for cursors: `sort` followed by every key column it does
/// not already cover, ascending. Keys make the order total so a cursor
/// identifies exactly one row.
pub fn cursor_order(sort: &SortExprSet, key: &[String]) -> SortExprSet {
    let mut order = sort.clone();
    for k in key {
        if order.get(k).is_none() {
            order.push(SortExpr::asc(k.clone()));
        }
    }
    order
}

/// Capture `row`'s values for every column of `order`.
pub fn collect_cursor(row: &Row, order: &SortExprSet, reverse: bool) -> PagingCursor {
    let mut cur = PagingCursor::default();
    for s in order.iter() {
        cur.set(s.column.clone(), row.value(&s.column), s.descending);
    }
    cur.r_order = reverse;
    cur
}

/// Keep rows satisfying the constraints and then the boolean expression.
pub fn filter_rows(rows: Vec<Row>, filter: &RowFilter, evaluator: &dyn Evaluator) -> Result<Vec<Row>> {
    if filter.is_empty() {
        return Ok(rows);
    }
    let program = match filter.expression.as_deref().map(str::trim) {
        Some(src) if !src.is_empty() => Some(evaluator.parse(src)?),
        _ => None,
    };

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        if !filter.satisfies_constraints(&row) {
            continue;
        }
        if let Some(p) = &program {
            if !p.eval_bool(&row)? {
                continue;
            }
        }
        out.push(row);
    }
    Ok(out)
}

/// Smallest non-zero of the two limits; `0` when both are unbounded.
pub fn effective_limit(a: usize, b: usize) -> usize {
    match (a, b) {
        (0, x) | (x, 0) => x,
        (x, y) => x.min(y),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub rows: Vec<Row>,
    pub next: Option<PagingCursor>,
    pub prev: Option<PagingCursor>,
}

/// Cut one page out of `rows`, which must already be sorted by `order`.
///
/// A forward cursor selects rows strictly after it, a reverse cursor rows
/// strictly before it (the page closest to the cursor).
pub fn paginate(
    rows: Vec<Row>,
    order: &SortExprSet,
    cursor: Option<&PagingCursor>,
    limit: usize,
) -> Page {
    let len = rows.len();
    let take = |n: usize| if limit == 0 { n } else { n.min(limit) };

    let (start, end) = match cursor {
        Some(c) if c.r_order => {
            let end = rows.partition_point(|r| c.position(r) == std::cmp::Ordering::Less);
            (end - take(end), end)
        }
        Some(c) => {
            let start = rows.partition_point(|r| c.position(r) != std::cmp::Ordering::Greater);
            (start, start + take(len - start))
        }
        None => (0, take(len)),
    };

    let mut rows = rows;
    rows.truncate(end);
    let rows: Vec<Row> = rows.drain(start..).collect();

    let next = (end < len)
        .then(|| rows.last().map(|r| collect_cursor(r, order, false)))
        .flatten();
    let prev = (start > 0)
        .then(|| rows.first().map(|r| collect_cursor(r, order, true)))
        .flatten();
    Page { rows, next, prev }
}

/// Keep only the requested columns; an empty projection keeps everything.
pub fn project(rows: Vec<Row>, columns: &[FrameColumn]) -> Vec<Row> {
    if columns.is_empty() {
        return rows;
    }
    rows.into_iter()
        .map(|r| {
            columns
                .iter()
                .filter_map(|c| r.get(&c.name).map(|v| (c.name.clone(), v.clone())))
                .collect()
        })
        .collect()
}

/// Turn `rows` into the frame requested by `def`.
pub fn build_frame(
    description: &FrameDescription,
    def: &FrameDefinition,
    rows: Vec<Row>,
    key: &[String],
    evaluator: &dyn Evaluator,
    limit: usize,
) -> Result<Frame> {
    let mut rows = filter_rows(rows, &def.filter, evaluator)?;

    let order = match def.paging.as_ref().and_then(Paging::page_cursor) {
        Some(c) => c.sorting(),
        None => cursor_order(&def.sorting.clone().unwrap_or_default(), key),
    };
    rows.sort_by(|a, b| order.compare(a, b));

    Ok(frame_from_sorted(description, def, rows, &order, limit))
}

/// Page, project and wrap rows already filtered and sorted by `order`.
pub fn frame_from_sorted(
    description: &FrameDescription,
    def: &FrameDefinition,
    rows: Vec<Row>,
    order: &SortExprSet,
    limit: usize,
) -> Frame {
    let cursor = def.paging.as_ref().and_then(Paging::page_cursor);
    let limit = effective_limit(def.limit(), limit);
    let page = paginate(rows, order, cursor, limit);

    let mut paging = def.paging.clone().unwrap_or_default();
    paging.limit = limit;
    paging.next_page = page.next.map(CursorToken);
    paging.prev_page = page.prev.map(CursorToken);

    let columns = if def.columns.is_empty() {
        description.columns.clone()
    } else {
        def.columns.clone()
    };

    Frame {
        name: if def.name.is_empty() {
            description.source.clone()
        } else {
            def.name.clone()
        },
        source: description.source.clone(),
        reference: def.reference.clone(),
        columns,
        rows: project(page.rows, &def.columns),
        paging,
        sorting: def.sorting.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowstep_core::row;
    use rowstep_core::types::Scalar;
    use rowstep_expr::ExprEngine;

    fn numbers(n: i64) -> Vec<Row> {
        (1..=n).map(|i| row! { "id" => i, "even" => i % 2 == 0 }).collect()
    }

    fn ids(rows: &[Row]) -> Vec<Scalar> {
        rows.iter().map(|r| r.value("id")).collect()
    }

    #[test]
    fn cursor_order_appends_uncovered_keys() {
        let sort = SortExprSet::parse("b DESC").unwrap();
        let order = cursor_order(&sort, &["a".into(), "b".into()]);
        assert_eq!(order.to_string(), "b DESC, a");
    }

    #[test]
    fn forward_and_back_pages() {
        let order = SortExprSet::parse("id").unwrap();
        let first = paginate(numbers(5), &order, None, 2);
        assert_eq!(ids(&first.rows), vec![Scalar::I64(1), Scalar::I64(2)]);
        assert!(first.prev.is_none());
        let next = first.next.unwrap();

        let second = paginate(numbers(5), &order, Some(&next), 2);
        assert_eq!(ids(&second.rows), vec![Scalar::I64(3), Scalar::I64(4)]);
        let prev = second.prev.unwrap();
        assert!(prev.r_order);

        let back = paginate(numbers(5), &order, Some(&prev), 2);
        assert_eq!(ids(&back.rows), vec![Scalar::I64(1), Scalar::I64(2)]);
        assert!(back.prev.is_none());

        let last = paginate(numbers(5), &order, second.next.as_ref(), 2);
        assert_eq!(ids(&last.rows), vec![Scalar::I64(5)]);
        assert!(last.next.is_none());
    }

    #[test]
    fn unbounded_limit() {
        let order = SortExprSet::parse("id").unwrap();
        let page = paginate(numbers(3), &order, None, 0);
        assert_eq!(page.rows.len(), 3);
        assert!(page.next.is_none());
    }

    #[test]
    fn constraints_then_expression() {
        let engine = ExprEngine::default();
        let mut f = RowFilter::default();
        f.constraints.insert("even".into(), vec![Scalar::Bool(true)]);
        f.expression = Some("id > 2".into());
        let rows = filter_rows(numbers(6), &f, &engine).unwrap();
        assert_eq!(ids(&rows), vec![Scalar::I64(4), Scalar::I64(6)]);
    }

    #[test]
    fn frame_from_definition() {
        let engine = ExprEngine::default();
        let desc = FrameDescription::new("nums", vec![]);
        let def = FrameDefinition::new("nums")
            .with_sorting(SortExprSet::parse("id DESC").unwrap())
            .with_paging(Paging::with_limit(10))
            .with_columns(vec![FrameColumn::new("id", Default::default())]);

        let frame = build_frame(&desc, &def, numbers(3), &[], &engine, 2).unwrap();
        assert_eq!(frame.name, "nums");
        assert_eq!(frame.paging.limit, 2);
        assert_eq!(ids(&frame.rows), vec![Scalar::I64(3), Scalar::I64(2)]);
        assert!(!frame.rows[0].contains("even"));
        assert!(frame.paging.next_page.is_some());
    }

    #[test]
    fn effective_limits() {
        assert_eq!(effective_limit(0, 0), 0);
        assert_eq!(effective_limit(0, 5), 5);
        assert_eq!(effective_limit(7, 5), 5);
    }
}
