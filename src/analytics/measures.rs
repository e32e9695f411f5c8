use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, info};

use crate::model::{MeasureRow, MetricRow};
use crate::store::{METRIC_FETCH_CHUNK, Repository, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Percent,
    Numeric,
    Star,
}

impl ValueType {
    fn priority(self) -> u8 {
        match self {
            Self::Percent => 3,
            Self::Numeric => 2,
            Self::Star => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Percent => "percent",
            Self::Numeric => "numeric",
            Self::Star => "star",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractMeasureValue {
    pub value: f64,
    pub unit: String,
    pub year: i32,
    pub value_type: ValueType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureDetails {
    pub code: String,
    pub name: String,
    pub canonical_name: String,
    pub domain: Option<String>,
    pub weight: Option<f64>,
    pub unit: String,
    pub value_type: Option<ValueType>,
    pub latest_year: i32,
    pub contract_values: BTreeMap<String, ContractMeasureValue>,
    pub contracts_with_data: usize,
}

impl MeasureDetails {
    /// Display name first, then the canonical name when an alias replaced it.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels = vec![self.name.as_str()];
        if self.canonical_name != self.name {
            labels.push(self.canonical_name.as_str());
        }
        labels
    }

    /// Values reported for exactly `year`; older carry-forward values are dropped.
    pub fn values_for_year(&self, year: i32) -> BTreeMap<String, f64> {
        self.contract_values
            .iter()
            .filter(|(_, value)| value.year == year)
            .map(|(contract_id, value)| (contract_id.clone(), value.value))
            .collect()
    }
}

/// Resolves one measure for a set of contracts. `Ok(None)` means the store
/// holds no metadata for `code` at or before `as_of_year`.
pub fn resolve_measure<R: Repository + ?Sized>(
    repository: &R,
    code: &str,
    contract_ids: &[String],
    as_of_year: Option<i32>,
) -> StoreResult<Option<MeasureDetails>> {
    let metadata_rows = repository.measure_rows(code)?;
    let Some(metadata) = select_metadata(&metadata_rows, as_of_year) else {
        info!(code = %code, as_of_year = ?as_of_year, "no measure metadata");
        return Ok(None);
    };

    let unique_ids = contract_ids
        .iter()
        .cloned()
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect::<Vec<String>>();

    let contract_values = unique_ids
        .chunks(METRIC_FETCH_CHUNK)
        .map(|chunk| {
            repository
                .metric_rows(&metadata.code, chunk, as_of_year)
                .map(|rows| reconcile_rows(&rows))
        })
        .try_fold(BTreeMap::new(), |mut merged, chunk_values| {
            merge_values(&mut merged, chunk_values?);
            Ok::<_, StoreError>(merged)
        })?;

    let details = build_details(metadata, contract_values);
    debug!(
        code = %details.code,
        contracts_requested = unique_ids.len(),
        contracts_with_data = details.contracts_with_data,
        latest_year = details.latest_year,
        "resolved measure"
    );
    Ok(Some(details))
}

/// Latest metadata row at or before `as_of_year`.
pub fn select_metadata(rows: &[MeasureRow], as_of_year: Option<i32>) -> Option<&MeasureRow> {
    rows.iter()
        .filter(|row| as_of_year.is_none_or(|ceiling| row.year <= ceiling))
        .max_by_key(|row| row.year)
}

pub fn extract_value(row: &MetricRow) -> Option<ContractMeasureValue> {
    if let Some(rate) = row.rate_percent.filter(|value| value.is_finite()) {
        return Some(ContractMeasureValue {
            value: rate,
            unit: "%".to_string(),
            year: row.year,
            value_type: ValueType::Percent,
        });
    }

    if let Some(numeric) = row.value_numeric.filter(|value| value.is_finite()) {
        return Some(ContractMeasureValue {
            value: numeric,
            unit: row
                .value_unit
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
            year: row.year,
            value_type: ValueType::Numeric,
        });
    }

    let star_text = row
        .star_rating
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())?;
    match star_text.parse::<f64>() {
        Ok(stars) if stars.is_finite() => Some(ContractMeasureValue {
            value: stars,
            unit: "stars".to_string(),
            year: row.year,
            value_type: ValueType::Star,
        }),
        _ => {
            debug!(
                contract_id = %row.contract_id,
                measure_code = %row.measure_code,
                year = row.year,
                star_rating = %star_text,
                "skipping unparseable star rating"
            );
            None
        }
    }
}

pub fn reconcile_rows(rows: &[MetricRow]) -> BTreeMap<String, ContractMeasureValue> {
    let mut resolved = BTreeMap::new();
    for row in rows {
        if let Some(value) = extract_value(row) {
            upsert_value(&mut resolved, row.contract_id.clone(), value);
        }
    }
    resolved
}

fn merge_values(
    into: &mut BTreeMap<String, ContractMeasureValue>,
    from: BTreeMap<String, ContractMeasureValue>,
) {
    for (contract_id, value) in from {
        upsert_value(into, contract_id, value);
    }
}

fn upsert_value(
    resolved: &mut BTreeMap<String, ContractMeasureValue>,
    contract_id: String,
    candidate: ContractMeasureValue,
) {
    match resolved.get_mut(&contract_id) {
        Some(existing) => {
            if compare_preference(&candidate, existing) == Ordering::Greater {
                *existing = candidate;
            }
        }
        None => {
            resolved.insert(contract_id, candidate);
        }
    }
}

/// Later year wins, then value-type priority. The value itself settles exact
/// ties so merge order never changes the outcome.
fn compare_preference(left: &ContractMeasureValue, right: &ContractMeasureValue) -> Ordering {
    left.year
        .cmp(&right.year)
        .then(left.value_type.priority().cmp(&right.value_type.priority()))
        .then(left.value.total_cmp(&right.value))
        .then_with(|| left.unit.cmp(&right.unit))
}

fn build_details(
    metadata: &MeasureRow,
    contract_values: BTreeMap<String, ContractMeasureValue>,
) -> MeasureDetails {
    let value_type = contract_values
        .values()
        .map(|value| value.value_type)
        .max_by_key(|value_type| value_type.priority());

    let unit = match value_type {
        Some(ValueType::Percent) => "%".to_string(),
        Some(ValueType::Star) => "stars".to_string(),
        Some(ValueType::Numeric) => dominant_numeric_unit(&contract_values),
        None => String::new(),
    };

    let latest_year = contract_values
        .values()
        .map(|value| value.year)
        .max()
        .unwrap_or(metadata.year);

    MeasureDetails {
        code: metadata.code.clone(),
        name: metadata.display_name().to_string(),
        canonical_name: metadata.name.trim().to_string(),
        domain: metadata.domain.clone(),
        weight: metadata.weight,
        unit,
        value_type,
        latest_year,
        contracts_with_data: contract_values.len(),
        contract_values,
    }
}

fn dominant_numeric_unit(contract_values: &BTreeMap<String, ContractMeasureValue>) -> String {
    let mut counts = HashMap::<&str, usize>::new();
    for value in contract_values.values() {
        if value.value_type == ValueType::Numeric && !value.unit.is_empty() {
            *counts.entry(value.unit.as_str()).or_default() += 1;
        }
    }

    counts
        .into_iter()
        .max_by(|left, right| left.1.cmp(&right.1).then(right.0.cmp(left.0)))
        .map(|(unit, _)| unit.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(contract_id: &str, year: i32) -> MetricRow {
        MetricRow {
            contract_id: contract_id.to_string(),
            measure_code: "C01".to_string(),
            year,
            rate_percent: None,
            value_numeric: None,
            value_unit: None,
            star_rating: None,
        }
    }

    fn measure(code: &str, year: i32) -> MeasureRow {
        MeasureRow {
            code: code.to_string(),
            name: format!("Measure {code}"),
            alias: None,
            domain: Some("Staying Healthy".to_string()),
            weight: Some(1.0),
            year,
        }
    }

    #[test]
    fn extract_value_prefers_percent_then_numeric_then_star() {
        let mut row = metric("H0001", 2024);
        row.rate_percent = Some(81.0);
        row.value_numeric = Some(12.0);
        row.star_rating = Some("4".to_string());
        let value = extract_value(&row).expect("percent value");
        assert_eq!(value.value_type, ValueType::Percent);
        assert_eq!(value.unit, "%");

        row.rate_percent = Some(f64::NAN);
        row.value_unit = Some(" days ".to_string());
        let value = extract_value(&row).expect("numeric value");
        assert_eq!(value.value_type, ValueType::Numeric);
        assert_eq!(value.unit, "days");

        row.value_numeric = None;
        let value = extract_value(&row).expect("star value");
        assert_eq!(value.value_type, ValueType::Star);
        assert_eq!(value.value, 4.0);
        assert_eq!(value.unit, "stars");
    }

    #[test]
    fn unparseable_star_rows_are_skipped() {
        let mut row = metric("H0001", 2024);
        row.star_rating = Some("Plan too new to be measured".to_string());
        assert!(extract_value(&row).is_none());

        let mut good = metric("H0002", 2024);
        good.star_rating = Some("3.5".to_string());
        let resolved = reconcile_rows(&[row, good]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved["H0002"].value, 3.5);
    }

    #[test]
    fn percent_beats_star_within_same_year() {
        let mut star = metric("H0001", 2024);
        star.star_rating = Some("5".to_string());
        let mut percent = metric("H0001", 2024);
        percent.rate_percent = Some(72.0);

        for rows in [
            vec![star.clone(), percent.clone()],
            vec![percent.clone(), star.clone()],
        ] {
            let resolved = reconcile_rows(&rows);
            assert_eq!(resolved["H0001"].value_type, ValueType::Percent);
            assert_eq!(resolved["H0001"].value, 72.0);
        }
    }

    #[test]
    fn later_year_beats_higher_priority() {
        let mut old_percent = metric("H0001", 2023);
        old_percent.rate_percent = Some(60.0);
        let mut new_star = metric("H0001", 2024);
        new_star.star_rating = Some("4".to_string());

        let resolved = reconcile_rows(&[old_percent, new_star]);
        assert_eq!(resolved["H0001"].year, 2024);
        assert_eq!(resolved["H0001"].value_type, ValueType::Star);
    }

    #[test]
    fn select_metadata_respects_ceiling() {
        let rows = vec![measure("C01", 2022), measure("C01", 2024), measure("C01", 2023)];
        assert_eq!(select_metadata(&rows, None).map(|row| row.year), Some(2024));
        assert_eq!(
            select_metadata(&rows, Some(2023)).map(|row| row.year),
            Some(2023)
        );
        assert!(select_metadata(&rows, Some(2021)).is_none());
    }

    #[test]
    fn details_pick_highest_priority_type_and_latest_year() {
        let metadata = measure("C01", 2025);
        let mut rows = Vec::new();
        let mut star = metric("H0001", 2023);
        star.star_rating = Some("4".to_string());
        rows.push(star);
        let mut numeric = metric("H0002", 2024);
        numeric.value_numeric = Some(9.0);
        numeric.value_unit = Some("days".to_string());
        rows.push(numeric);

        let details = build_details(&metadata, reconcile_rows(&rows));
        assert_eq!(details.value_type, Some(ValueType::Numeric));
        assert_eq!(details.unit, "days");
        assert_eq!(details.latest_year, 2024);
        assert_eq!(details.contracts_with_data, 2);
        assert_eq!(details.values_for_year(2024).len(), 1);
    }

    #[test]
    fn details_without_values_fall_back_to_metadata_year() {
        let details = build_details(&measure("C01", 2025), BTreeMap::new());
        assert_eq!(details.latest_year, 2025);
        assert_eq!(details.value_type, None);
        assert_eq!(details.contracts_with_data, 0);
        assert!(details.unit.is_empty());
    }

    #[test]
    fn dominant_numeric_unit_breaks_ties_alphabetically() {
        let mut rows = Vec::new();
        for (contract_id, unit) in [("H1", "visits"), ("H2", "days"), ("H3", "visits"), ("H4", "days")] {
            let mut row = metric(contract_id, 2024);
            row.value_numeric = Some(1.0);
            row.value_unit = Some(unit.to_string());
            rows.push(row);
        }

        assert_eq!(dominant_numeric_unit(&reconcile_rows(&rows)), "days");
    }

    #[test]
    fn merge_is_independent_of_chunk_order() {
        let mut star = metric("H0001", 2024);
        star.star_rating = Some("4".to_string());
        let mut percent = metric("H0001", 2024);
        percent.rate_percent = Some(71.0);
        let mut numeric = metric("H0002", 2024);
        numeric.value_numeric = Some(12.0);
        numeric.value_unit = Some("days".to_string());
        let mut other_numeric = metric("H0002", 2024);
        other_numeric.value_numeric = Some(15.0);
        other_numeric.value_unit = Some("days".to_string());
        let mut older = metric("H0003", 2023);
        older.rate_percent = Some(90.0);
        let mut newer = metric("H0003", 2024);
        newer.star_rating = Some("2".to_string());

        let first = reconcile_rows(&[star, numeric, older]);
        let second = reconcile_rows(&[percent, other_numeric, newer]);

        let mut forward = BTreeMap::new();
        merge_values(&mut forward, first.clone());
        merge_values(&mut forward, second.clone());
        let mut backward = BTreeMap::new();
        merge_values(&mut backward, second);
        merge_values(&mut backward, first);

        assert_eq!(forward, backward);
        assert_eq!(forward["H0001"].value_type, ValueType::Percent);
        assert_eq!(forward["H0001"].value, 71.0);
        assert_eq!(forward["H0002"].value, 15.0);
        assert_eq!(forward["H0003"].year, 2024);
        assert_eq!(forward["H0003"].value_type, ValueType::Star);
    }

    #[test]
    fn labels_include_canonical_name_behind_alias() {
        let mut metadata = measure("C28", 2025);
        metadata.name = "Complaints about the Health Plan".to_string();
        metadata.alias = Some("Plan Complaints".to_string());

        let details = build_details(&metadata, BTreeMap::new());
        assert_eq!(details.name, "Plan Complaints");
        assert_eq!(
            details.labels(),
            vec!["Plan Complaints", "Complaints about the Health Plan"]
        );
        assert_eq!(build_details(&measure("C01", 2025), BTreeMap::new()).labels().len(), 1);
    }
}
