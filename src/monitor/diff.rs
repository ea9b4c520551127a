//! Pure snapshot comparison. No I/O, deterministic output.
//!
//! Every comparison renders one line per change record; the report is
//! empty exactly when nothing changed. All cell coordinates are 1-based
//! and printed as `(row, column)` regardless of the watch kind.

use super::types::{Region, Snapshot};

/// Outcome of diffing one region.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegionDiff {
    pub changed: bool,
    pub report: String,
}

impl RegionDiff {
    fn from_report(report: String) -> Self {
        RegionDiff {
            changed: !report.is_empty(),
            report,
        }
    }
}

/// Compare two snapshots of the same watched region.
///
/// A watch only ever pairs snapshots of its own kind; a shape mismatch
/// cannot arise from well-formed callers and is reported as no change.
pub fn diff_region(region: &Region, old: &Snapshot, new: &Snapshot) -> RegionDiff {
    match (region, old, new) {
        (Region::Cell { address }, Snapshot::Cell(old), Snapshot::Cell(new)) => {
            diff_cell(address, old, new)
        }
        (Region::Row { index }, Snapshot::Row(old), Snapshot::Row(new)) => {
            // Row: the row coordinate is fixed, the position varies along
            // the columns.
            diff_axis("row", *index, old, new, |fixed, position| (fixed, position))
        }
        (Region::Column { index }, Snapshot::Column(old), Snapshot::Column(new)) => {
            // Column: the position varies along the rows.
            diff_axis("column", *index, old, new, |fixed, position| (position, fixed))
        }
        (Region::Sheet, Snapshot::Sheet(old), Snapshot::Sheet(new)) => diff_sheet(old, new),
        _ => {
            debug_assert!(false, "snapshot shape does not match watch kind");
            RegionDiff::default()
        }
    }
}

fn diff_cell(address: &str, old: &Option<String>, new: &Option<String>) -> RegionDiff {
    let mut report = String::new();
    if old != new {
        report = format!(
            "Cell {} changed from {} to {}\n",
            address,
            render_value(old.as_deref()),
            render_value(new.as_deref())
        );
    }
    RegionDiff::from_report(report)
}

/// Shared row/column comparison: an optional size record first, then an
/// element-wise pass over the overlap. Tail elements past the overlap
/// are covered by the size record alone.
fn diff_axis(
    label: &str,
    fixed: u32,
    old: &[String],
    new: &[String],
    coordinate: impl Fn(u32, u32) -> (u32, u32),
) -> RegionDiff {
    let mut report = String::new();
    if old.len() != new.len() {
        report.push_str(&format!(
            "Size of {} {} changed from {} to {}\n",
            label,
            fixed,
            old.len(),
            new.len()
        ));
    }
    for (position, (old_value, new_value)) in old.iter().zip(new.iter()).enumerate() {
        if old_value != new_value {
            let (row, column) = coordinate(fixed, position as u32 + 1);
            push_cell_change(&mut report, row, column, old_value, new_value);
        }
    }
    RegionDiff::from_report(report)
}

fn diff_sheet(old: &[Vec<String>], new: &[Vec<String>]) -> RegionDiff {
    let mut report = String::new();
    if old.len() != new.len() {
        report.push_str(&format!(
            "Sheet height changed from {} to {} rows\n",
            old.len(),
            new.len()
        ));
    }
    // Width is the widest row of each snapshot, so ragged and empty
    // sheets compare without touching any particular row.
    let old_width = max_width(old);
    let new_width = max_width(new);
    if old_width != new_width {
        report.push_str(&format!(
            "Sheet width changed from {} to {} columns\n",
            old_width, new_width
        ));
    }
    for (row_index, (old_row, new_row)) in old.iter().zip(new.iter()).enumerate() {
        // The column counter restarts for every row.
        for (column_index, (old_value, new_value)) in
            old_row.iter().zip(new_row.iter()).enumerate()
        {
            if old_value != new_value {
                push_cell_change(
                    &mut report,
                    row_index as u32 + 1,
                    column_index as u32 + 1,
                    old_value,
                    new_value,
                );
            }
        }
    }
    RegionDiff::from_report(report)
}

fn push_cell_change(report: &mut String, row: u32, column: u32, old: &str, new: &str) {
    report.push_str(&format!(
        "Cell ({}, {}) changed from {} to {}\n",
        row,
        column,
        render_value(Some(old)),
        render_value(Some(new))
    ));
}

fn render_value(value: Option<&str>) -> &str {
    match value {
        Some("") | None => "(empty)",
        Some(value) => value,
    }
}

fn max_width(rows: &[Vec<String>]) -> usize {
    rows.iter().map(Vec::len).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter().map(|row| strings(row)).collect()
    }

    #[test]
    fn identical_snapshots_never_report() {
        let cases = [
            (
                Region::Cell {
                    address: "B3".to_string(),
                },
                Snapshot::Cell(Some("x".to_string())),
            ),
            (Region::Row { index: 2 }, Snapshot::Row(strings(&["a", "b"]))),
            (
                Region::Column { index: 1 },
                Snapshot::Column(strings(&["a", "b"])),
            ),
            (
                Region::Sheet,
                Snapshot::Sheet(grid(&[&["a", "b"], &["c", "d"]])),
            ),
        ];
        for (region, snapshot) in cases {
            let diff = diff_region(&region, &snapshot, &snapshot);
            assert!(!diff.changed, "{} diff should be idempotent", region.kind_name());
            assert!(diff.report.is_empty());
        }
    }

    #[test]
    fn cell_appearing_or_vanishing_is_a_change() {
        let region = Region::Cell {
            address: "B3".to_string(),
        };
        let empty = Snapshot::Cell(None);
        let filled = Snapshot::Cell(Some("x".to_string()));

        let appeared = diff_region(&region, &empty, &filled);
        assert!(appeared.changed);
        assert_eq!(appeared.report, "Cell B3 changed from (empty) to x\n");

        let vanished = diff_region(&region, &filled, &empty);
        assert!(vanished.changed);
        assert_eq!(vanished.report, "Cell B3 changed from x to (empty)\n");

        assert!(!diff_region(&region, &filled, &filled).changed);
    }

    #[test]
    fn row_reports_single_change_with_row_column_coordinates() {
        let diff = diff_region(
            &Region::Row { index: 3 },
            &Snapshot::Row(strings(&["a", "b", "c"])),
            &Snapshot::Row(strings(&["a", "z", "c"])),
        );
        assert!(diff.changed);
        assert_eq!(diff.report, "Cell (3, 2) changed from b to z\n");
    }

    #[test]
    fn column_reports_coordinates_in_row_column_order_too() {
        let diff = diff_region(
            &Region::Column { index: 3 },
            &Snapshot::Column(strings(&["a", "b", "c"])),
            &Snapshot::Column(strings(&["a", "z", "c"])),
        );
        assert!(diff.changed);
        // The varying position is the row; the fixed column comes second.
        assert_eq!(diff.report, "Cell (2, 3) changed from b to z\n");
    }

    #[test]
    fn row_growth_reports_only_the_size_record() {
        let diff = diff_region(
            &Region::Row { index: 1 },
            &Snapshot::Row(strings(&["a", "b"])),
            &Snapshot::Row(strings(&["a", "b", "c"])),
        );
        assert!(diff.changed);
        assert_eq!(diff.report, "Size of row 1 changed from 2 to 3\n");
    }

    #[test]
    fn column_shrink_reports_size_and_overlap_changes() {
        let diff = diff_region(
            &Region::Column { index: 2 },
            &Snapshot::Column(strings(&["a", "b", "c"])),
            &Snapshot::Column(strings(&["x"])),
        );
        let lines: Vec<&str> = diff.report.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Size of column 2 changed from 3 to 1",
                "Cell (1, 2) changed from a to x",
            ]
        );
    }

    #[test]
    fn sheet_reports_single_cell_change() {
        let diff = diff_region(
            &Region::Sheet,
            &Snapshot::Sheet(grid(&[&["a", "b"], &["c", "d"]])),
            &Snapshot::Sheet(grid(&[&["a", "x"], &["c", "d"]])),
        );
        assert!(diff.changed);
        assert_eq!(diff.report, "Cell (1, 2) changed from b to x\n");
    }

    #[test]
    fn sheet_column_counter_restarts_every_row() {
        let diff = diff_region(
            &Region::Sheet,
            &Snapshot::Sheet(grid(&[&["a", "b"], &["c", "d"]])),
            &Snapshot::Sheet(grid(&[&["a", "x"], &["c", "y"]])),
        );
        let lines: Vec<&str> = diff.report.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Cell (1, 2) changed from b to x",
                "Cell (2, 2) changed from d to y",
            ]
        );
    }

    #[test]
    fn sheet_size_records_cover_height_and_ragged_width() {
        let diff = diff_region(
            &Region::Sheet,
            &Snapshot::Sheet(grid(&[&["a"], &["b", "c"]])),
            &Snapshot::Sheet(grid(&[&["a"]])),
        );
        let lines: Vec<&str> = diff.report.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Sheet height changed from 2 to 1 rows",
                "Sheet width changed from 2 to 1 columns",
            ]
        );
    }

    #[test]
    fn empty_sheets_compare_without_panicking() {
        let empty = Snapshot::Sheet(Vec::new());
        assert!(!diff_region(&Region::Sheet, &empty, &empty).changed);

        let diff = diff_region(&Region::Sheet, &empty, &Snapshot::Sheet(grid(&[&["a"]])));
        assert!(diff.changed);
        let lines: Vec<&str> = diff.report.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Sheet height changed from 0 to 1 rows",
                "Sheet width changed from 0 to 1 columns",
            ]
        );
    }
}
