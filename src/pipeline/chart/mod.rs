pub mod figure;
pub mod render;
pub mod suggest;

use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Closed set of chart types the selector may choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartType {
    Bar,
    Line,
    Scatter,
    Pie,
    Histogram,
    StackedDoughnut,
}

impl FromStr for ChartType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bar" => Ok(ChartType::Bar),
            "line" => Ok(ChartType::Line),
            "scatter" => Ok(ChartType::Scatter),
            "pie" => Ok(ChartType::Pie),
            "histogram" => Ok(ChartType::Histogram),
            "stacked_doughnut" | "stacked doughnut" => Ok(ChartType::StackedDoughnut),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartType::Bar => write!(f, "bar"),
            ChartType::Line => write!(f, "line"),
            ChartType::Scatter => write!(f, "scatter"),
            ChartType::Pie => write!(f, "pie"),
            ChartType::Histogram => write!(f, "histogram"),
            ChartType::StackedDoughnut => write!(f, "stacked_doughnut"),
        }
    }
}

/// Parsed form of the selector's five-field suggestion block.
#[derive(Debug, Clone)]
pub struct ChartRecommendation {
    pub chart_type: ChartType,
    /// Column name, or a literal list (`['May', 'Jan']`) on the
    /// single-row-wide-result path. `None` for the N/A sentinel.
    pub x: Option<String>,
    pub y: Option<String>,
    pub values: Option<String>,
    /// Pie: one categorical column. Stacked doughnut: 2-3 columns in
    /// inner-to-outer order.
    pub labels: Vec<String>,
}

/// Parses the selector's output. This is the single authoritative parser:
/// it validates the chart type against the closed taxonomy, re-checks the
/// per-type field-nullability rules, and fails closed (no chart) on the
/// "no visualization" sentinel or on anything it does not recognize.
pub fn parse_recommendation(text: &str) -> Option<ChartRecommendation> {
    let lowered = text.to_ascii_lowercase();
    if lowered.contains("visualisation not needed")
        || lowered.contains("visualization not needed")
        || lowered.contains("no visualisation needed")
        || lowered.contains("no visualization needed")
    {
        debug!("Selector declined to visualize");
        return None;
    }

    let mut chart_type: Option<ChartType> = None;
    let mut x: Option<String> = None;
    let mut y: Option<String> = None;
    let mut values: Option<String> = None;
    let mut labels: Vec<String> = Vec::new();

    for line in text.lines() {
        let line = line.trim().trim_start_matches(['-', '*']).trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };

        match key.trim().to_ascii_lowercase().as_str() {
            "chart type" => {
                chart_type = value.trim().trim_matches(['[', ']']).parse().ok();
            }
            "x-axis" => x = clean_axis_field(value),
            "y-axis" => y = clean_axis_field(value),
            "values" => values = clean_column_field(value),
            "labels" => labels = clean_label_list(value),
            _ => {}
        }
    }

    let chart_type = chart_type?;

    // Defensive re-check of the per-type nullability rules. A suggestion
    // that names fields its chart type cannot use is not trusted.
    match chart_type {
        ChartType::Bar | ChartType::Line | ChartType::Scatter => {
            let (x, y) = (x?, y?);
            Some(ChartRecommendation {
                chart_type,
                x: Some(x),
                y: Some(y),
                values: None,
                labels: Vec::new(),
            })
        }
        ChartType::Pie => {
            let values = values?;
            if labels.len() != 1 {
                return None;
            }
            Some(ChartRecommendation {
                chart_type,
                x: None,
                y: None,
                values: Some(values),
                labels,
            })
        }
        ChartType::Histogram => {
            let values = values?;
            Some(ChartRecommendation {
                chart_type,
                x: None,
                y: None,
                values: Some(values),
                labels: Vec::new(),
            })
        }
        ChartType::StackedDoughnut => {
            let values = values?;
            if labels.len() < 2 || labels.len() > 3 {
                return None;
            }
            Some(ChartRecommendation {
                chart_type,
                x: None,
                y: None,
                values: Some(values),
                labels,
            })
        }
    }
}

fn is_na(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("n/a") || value.eq_ignore_ascii_case("none")
}

/// Axis fields keep literal-list syntax intact for the renderer's fallback
/// path; everything else is unquoted.
fn clean_axis_field(raw: &str) -> Option<String> {
    let value = raw.trim().trim_matches(['\'', '"']).trim();
    if is_na(value) {
        return None;
    }
    if raw.trim().starts_with('[') {
        return Some(raw.trim().to_string());
    }
    Some(value.to_string())
}

/// A single column-name field, possibly wrapped in brackets or quotes.
fn clean_column_field(raw: &str) -> Option<String> {
    let value = raw
        .trim()
        .trim_matches(['[', ']'])
        .trim()
        .trim_matches(['\'', '"'])
        .trim();
    if is_na(value) {
        return None;
    }
    Some(value.to_string())
}

/// Labels may be one column or a bracketed list of columns.
fn clean_label_list(raw: &str) -> Vec<String> {
    let inner = raw.trim().trim_matches(['[', ']']);
    inner
        .split(',')
        .map(|item| item.trim().trim_matches(['\'', '"']).trim().to_string())
        .filter(|item| !is_na(item))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_bar_suggestion() {
        let text = "Chart type: bar\nX-axis: neighborhood\nY-axis: request_count\nValues: N/A\nLabels: N/A";
        let rec = parse_recommendation(text).expect("bar parses");
        assert_eq!(rec.chart_type, ChartType::Bar);
        assert_eq!(rec.x.as_deref(), Some("neighborhood"));
        assert_eq!(rec.y.as_deref(), Some("request_count"));
        assert!(rec.values.is_none());
    }

    #[test]
    fn histogram_requires_values_and_ignores_axes() {
        let text = "Chart type: histogram\nX-axis: N/A\nY-axis: N/A\nValues: [resolution_hours]\nLabels: N/A";
        let rec = parse_recommendation(text).expect("histogram parses");
        assert_eq!(rec.chart_type, ChartType::Histogram);
        assert!(rec.x.is_none());
        assert!(rec.y.is_none());
        assert_eq!(rec.values.as_deref(), Some("resolution_hours"));
    }

    #[test]
    fn histogram_without_values_fails_closed() {
        let text = "Chart type: histogram\nX-axis: N/A\nY-axis: N/A\nValues: N/A";
        assert!(parse_recommendation(text).is_none());
    }

    #[test]
    fn doughnut_labels_parse_as_an_ordered_list() {
        let text = "Chart type: stacked_doughnut\nX-axis: N/A\nY-axis: N/A\nValues: [total_count]\nLabels: ['service_name', 'service_subtype', 'status']";
        let rec = parse_recommendation(text).expect("doughnut parses");
        assert_eq!(rec.chart_type, ChartType::StackedDoughnut);
        assert_eq!(rec.labels, vec!["service_name", "service_subtype", "status"]);
        assert_eq!(rec.values.as_deref(), Some("total_count"));
    }

    #[test]
    fn doughnut_with_one_label_fails_closed() {
        let text = "Chart type: stacked_doughnut\nValues: [n]\nLabels: ['only_one']";
        assert!(parse_recommendation(text).is_none());
    }

    #[test]
    fn sentinel_means_no_chart() {
        assert!(parse_recommendation("VISUALISATION NOT NEEDED").is_none());
        assert!(parse_recommendation("No visualization needed for a single value.").is_none());
    }

    #[test]
    fn unknown_chart_type_fails_closed() {
        let text = "Chart type: treemap\nX-axis: a\nY-axis: b";
        assert!(parse_recommendation(text).is_none());
    }

    #[test]
    fn literal_list_axes_survive_parsing() {
        let text = "Chart type: bar\nX-axis: ['May', 'Jan']\nY-axis: [296.53, 273.90]\nValues: N/A";
        let rec = parse_recommendation(text).expect("literal bar parses");
        assert_eq!(rec.x.as_deref(), Some("['May', 'Jan']"));
        assert_eq!(rec.y.as_deref(), Some("[296.53, 273.90]"));
    }

    #[test]
    fn dashed_lines_and_case_are_tolerated() {
        let text = "- Chart type: Pie\n- X-axis: N/A\n- Y-axis: N/A\n- Values: [request_count]\n- Labels: [source]";
        let rec = parse_recommendation(text).expect("pie parses");
        assert_eq!(rec.chart_type, ChartType::Pie);
        assert_eq!(rec.labels, vec!["source"]);
    }
}
