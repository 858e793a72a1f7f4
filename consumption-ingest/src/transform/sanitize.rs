use crate::sources::Cell;

/// Substrings that mark a spreadsheet error or "no value" cell.
const ERROR_MARKERS: [&str; 4] = ["DIV", "#", "N/A", "ERR"];

/// Placeholders people type into empty consumption cells.
const PLACEHOLDERS: [&str; 2] = ["--", "-"];

/// Turn any cell into a finite, non-negative number.
///
/// Blanks, placeholders, error markers and unparseable text all read as 0;
/// negative readings are clamped to 0. Never fails.
pub fn clean(cell: &Cell) -> f64 {
    let value = match cell {
        Cell::Empty => 0.0,
        Cell::Bool(true) => 1.0,
        Cell::Bool(false) => 0.0,
        Cell::Number(n) => *n,
        Cell::Text(s) => clean_text(s),
    };

    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

fn clean_text(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() || PLACEHOLDERS.contains(&trimmed) {
        return 0.0;
    }

    let upper = trimmed.to_ascii_uppercase();
    if ERROR_MARKERS.iter().any(|m| upper.contains(m)) {
        return 0.0;
    }

    let digits: String = trimmed
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    digits.parse::<f64>().unwrap_or(0.0)
}

/// Whether a raw cell carries a division-by-zero formula error.
///
/// Checked before sanitizing: such a row comes from a broken formula, not a
/// day with zero consumption.
pub fn has_division_error(cell: &Cell) -> bool {
    cell.as_text()
        .is_some_and(|s| s.to_ascii_uppercase().contains("DIV/0"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blanks_and_placeholders_are_zero() {
        for cell in [
            Cell::Empty,
            Cell::text(""),
            Cell::text("   "),
            Cell::text("--"),
            Cell::text("-"),
            Cell::text(" - "),
        ] {
            assert_eq!(clean(&cell), 0.0, "{cell:?}");
        }
    }

    #[test]
    fn error_markers_are_zero() {
        for raw in ["#DIV/0!", "#VALUE!", "#REF!", "N/A", "#N/A", "ERR:502", "err", "div"] {
            assert_eq!(clean(&Cell::text(raw)), 0.0, "{raw}");
        }
    }

    #[test]
    fn thousands_separators_and_spaces_are_stripped() {
        assert_eq!(clean(&Cell::text("1,234,567.5")), 1_234_567.5);
        assert_eq!(clean(&Cell::text(" 12 345 ")), 12_345.0);
        assert_eq!(clean(&Cell::text("42")), 42.0);
    }

    #[test]
    fn never_negative_or_non_finite() {
        for cell in [
            Cell::Number(-3.5),
            Cell::text("-1,000"),
            Cell::Number(f64::NAN),
            Cell::Number(f64::INFINITY),
            Cell::text("inf"),
            Cell::text("NaN"),
            Cell::text("12 kWh"),
        ] {
            let v = clean(&cell);
            assert!(v == 0.0, "{cell:?} cleaned to {v}");
        }
    }

    #[test]
    fn booleans_coerce_like_spreadsheets() {
        assert_eq!(clean(&Cell::Bool(true)), 1.0);
        assert_eq!(clean(&Cell::Bool(false)), 0.0);
    }

    #[test]
    fn division_error_is_detected_on_raw_text_only() {
        assert!(has_division_error(&Cell::text("#DIV/0!")));
        assert!(has_division_error(&Cell::text("#div/0!")));
        assert!(!has_division_error(&Cell::text("#N/A")));
        assert!(!has_division_error(&Cell::Number(0.0)));
    }
}
