//! Fuzzy header matching.
//!
//! Every sheet names its columns differently ("Electricity Consumption (kWh)",
//! "ELEC", "Power"...). Each target field has an ordered synonym list that is
//! matched against normalized headers.

use std::fmt;

/// Target fields of a consumption record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Date,
    Production,
    Electricity,
    Cng,
    Water,
    Air,
    ElectricityTarget,
    WaterTarget,
    CngTarget,
    AirTarget,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Date => "date",
            Field::Production => "production",
            Field::Electricity => "electricity",
            Field::Cng => "cng",
            Field::Water => "water",
            Field::Air => "air",
            Field::ElectricityTarget => "electricity_target",
            Field::WaterTarget => "water_target",
            Field::CngTarget => "cng_target",
            Field::AirTarget => "air_target",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one field is recognised in a header row.
#[derive(Debug, Clone, Copy)]
pub struct FieldPattern {
    pub field: Field,
    pub synonyms: &'static [&'static str],
    /// Consulted only when nothing matched `synonyms`.
    pub fallback: &'static [&'static str],
    /// Skip per-car, average and target columns when looking for raw totals.
    pub exclude_derived: bool,
}

pub const FIELD_PATTERNS: [FieldPattern; 10] = [
    FieldPattern {
        field: Field::Date,
        synonyms: &["date", "dt", "day", "dated"],
        fallback: &[],
        exclude_derived: false,
    },
    FieldPattern {
        field: Field::Production,
        synonyms: &[
            "productioncount", "production", "prod", "prodcount", "cars", "bodycount", "body",
            "paintedcars", "output", "units", "qty", "quantity",
        ],
        fallback: &[],
        exclude_derived: true,
    },
    FieldPattern {
        field: Field::Electricity,
        synonyms: &["electricityconsumption", "electricity", "elec", "electric", "kwh", "power"],
        fallback: &[],
        exclude_derived: true,
    },
    FieldPattern {
        field: Field::Cng,
        synonyms: &["cngconsumption", "cng", "gas", "scm", "naturalgas"],
        fallback: &[],
        exclude_derived: true,
    },
    FieldPattern {
        field: Field::Water,
        synonyms: &["waterconsumption", "water", "h2o", "waterm3"],
        fallback: &[],
        exclude_derived: true,
    },
    FieldPattern {
        field: Field::Air,
        synonyms: &["airconsumption", "air", "compressedair", "airm3", "compr"],
        fallback: &[],
        exclude_derived: true,
    },
    FieldPattern {
        field: Field::ElectricityTarget,
        synonyms: &[
            "electricitytarget", "electrictarget", "electricitytargetpercar",
            "electrictargetpercar", "electricitytargetcar", "electarget", "targetkwh", "kwhtarget",
        ],
        fallback: &["target", "targetcar"],
        exclude_derived: false,
    },
    FieldPattern {
        field: Field::WaterTarget,
        synonyms: &["watertarget", "watertargetpercar", "watertargetm3", "targetm3water", "targetwater"],
        fallback: &[],
        exclude_derived: false,
    },
    FieldPattern {
        field: Field::CngTarget,
        synonyms: &["cngtarget", "cngtargetpercar", "cngtargetscm", "targetscmcng", "targetcng"],
        fallback: &[],
        exclude_derived: false,
    },
    FieldPattern {
        field: Field::AirTarget,
        synonyms: &["airtarget", "airtargetpercar", "airtargetm3", "targetm3air", "targetair"],
        fallback: &[],
        exclude_derived: false,
    },
];

const DERIVED_MARKERS: [&str; 9] = [
    "/car", "/ car", "percar", "per car", "/unit", "per unit", "avg", "average", "target",
];

/// Lowercase and drop everything but ASCII letters and digits.
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Whether a header names a ratio, average or target rather than a raw total.
pub fn is_derived_header(header: &str) -> bool {
    let lower = header.to_lowercase();
    DERIVED_MARKERS.iter().any(|m| lower.contains(m))
}

/// Position of the first header (in header order) matching any synonym.
pub fn resolve_index(headers: &[String], synonyms: &[&str], exclude_derived: bool) -> Option<usize> {
    headers.iter().position(|header| {
        if exclude_derived && is_derived_header(header) {
            return false;
        }
        let normalized = normalize_header(header);
        !normalized.is_empty() && synonyms.iter().any(|s| normalized.contains(s))
    })
}

/// The first header matching any synonym, if one does.
pub fn resolve<'a>(headers: &'a [String], synonyms: &[&str], exclude_derived: bool) -> Option<&'a str> {
    resolve_index(headers, synonyms, exclude_derived).map(|i| headers[i].as_str())
}

fn resolve_pattern(headers: &[String], pattern: &FieldPattern) -> Option<usize> {
    resolve_index(headers, pattern.synonyms, pattern.exclude_derived).or_else(|| {
        if pattern.fallback.is_empty() {
            None
        } else {
            resolve_index(headers, pattern.fallback, pattern.exclude_derived)
        }
    })
}

/// Column position per field for one sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    /// Falls back to the first column when no header looks like a date.
    pub date: usize,
    pub production: Option<usize>,
    pub electricity: Option<usize>,
    pub cng: Option<usize>,
    pub water: Option<usize>,
    pub air: Option<usize>,
    pub electricity_target: Option<usize>,
    pub water_target: Option<usize>,
    pub cng_target: Option<usize>,
    pub air_target: Option<usize>,
}

impl ColumnMap {
    pub fn resolve(headers: &[String]) -> Self {
        let find = |field: Field| {
            FIELD_PATTERNS
                .iter()
                .find(|p| p.field == field)
                .and_then(|p| resolve_pattern(headers, p))
        };

        Self {
            date: find(Field::Date).unwrap_or(0),
            production: find(Field::Production),
            electricity: find(Field::Electricity),
            cng: find(Field::Cng),
            water: find(Field::Water),
            air: find(Field::Air),
            electricity_target: find(Field::ElectricityTarget),
            water_target: find(Field::WaterTarget),
            cng_target: find(Field::CngTarget),
            air_target: find(Field::AirTarget),
        }
    }

    pub fn get(&self, field: Field) -> Option<usize> {
        match field {
            Field::Date => Some(self.date),
            Field::Production => self.production,
            Field::Electricity => self.electricity,
            Field::Cng => self.cng,
            Field::Water => self.water,
            Field::Air => self.air,
            Field::ElectricityTarget => self.electricity_target,
            Field::WaterTarget => self.water_target,
            Field::CngTarget => self.cng_target,
            Field::AirTarget => self.air_target,
        }
    }

    /// `(field, header)` for every mapped column.
    pub fn describe<'a>(&self, headers: &'a [String]) -> Vec<(Field, &'a str)> {
        FIELD_PATTERNS
            .iter()
            .filter_map(|p| {
                let idx = self.get(p.field)?;
                headers.get(idx).map(|h| (p.field, h.as_str()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalization_strips_punctuation_and_case() {
        assert_eq!(normalize_header("Electricity Consumption (kWh)"), "electricityconsumptionkwh");
        assert_eq!(normalize_header("H2O_m3"), "h2om3");
        assert_eq!(normalize_header(" -- "), "");
    }

    #[test]
    fn target_header_is_not_the_raw_total() {
        let h = headers(&["Date", "Electricity Target Per Car", "Electricity", "Production Count"]);
        let map = ColumnMap::resolve(&h);

        assert_eq!(map.electricity, Some(2));
        assert_eq!(map.electricity_target, Some(1));
        assert_eq!(map.production, Some(3));
    }

    #[test]
    fn per_car_columns_are_skipped_for_raw_fields() {
        let h = headers(&["Day", "Water/Car", "Avg Water", "Water (m3)"]);
        assert_eq!(resolve(&h, &["water"], true), Some("Water (m3)"));
        assert_eq!(resolve(&h, &["water"], false), Some("Water/Car"));
    }

    #[test]
    fn first_matching_header_wins() {
        let h = headers(&["CNG SCM", "Gas"]);
        assert_eq!(resolve(&h, &["gas", "cng"], true), Some("CNG SCM"));
    }

    #[test]
    fn date_falls_back_to_first_column() {
        let h = headers(&["Sl", "Cars", "Power"]);
        let map = ColumnMap::resolve(&h);
        assert_eq!(map.date, 0);
        assert_eq!(map.production, Some(1));
        assert_eq!(map.electricity, Some(2));
        assert_eq!(map.water, None);
    }

    #[test]
    fn generic_target_column_is_electricity_target_only_as_fallback() {
        let h = headers(&["Date", "Target", "Water Target"]);
        let map = ColumnMap::resolve(&h);
        assert_eq!(map.electricity_target, Some(1));
        assert_eq!(map.water_target, Some(2));

        let h = headers(&["Date", "Target", "kWh Target"]);
        assert_eq!(ColumnMap::resolve(&h).electricity_target, Some(2));
    }

    #[test]
    fn every_target_field_resolves_in_a_full_sheet() {
        let h = headers(&[
            "Date",
            "Production Count",
            "Electricity Consumption",
            "Water Consumption",
            "CNG Consumption",
            "Air Consumption",
            "Electricity Target per car",
            "Water Target per car",
            "CNG Target per car",
            "Air Target per car",
        ]);
        let map = ColumnMap::resolve(&h);
        let described: Vec<Field> = map.describe(&h).into_iter().map(|(f, _)| f).collect();
        assert_eq!(described.len(), 10);
        assert_eq!(map.air, Some(5));
        assert_eq!(map.air_target, Some(9));
        assert_eq!(map.cng_target, Some(8));
    }
}
