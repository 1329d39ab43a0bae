use crate::pipeline::chart::figure::{Figure, Trace};
use crate::pipeline::chart::{ChartRecommendation, ChartType};
use crate::table::{CellValue, ColumnKind, ResultTable};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Builds the chart object from the table and the selector's recommendation.
///
/// Returns `None` whenever the two disagree — named columns absent from the
/// table, a hierarchy that cannot be detected, literal lists that do not
/// parse. Never panics; a lost chart is a reportable outcome, not an error.
pub fn render_chart(table: &ResultTable, rec: &ChartRecommendation) -> Option<Figure> {
    match rec.chart_type {
        ChartType::Bar | ChartType::Scatter => {
            let (x, y) = (rec.x.as_deref()?, rec.y.as_deref()?);
            if table.column_index(x).is_some() && table.column_index(y).is_some() {
                return Some(render_xy(table, rec.chart_type, x, y));
            }
            if rec.chart_type == ChartType::Bar {
                return render_literal_lists(ChartType::Bar, x, y);
            }
            debug!("Chart columns {} / {} not present in the result", x, y);
            None
        }
        ChartType::Line => {
            let (x, y) = (rec.x.as_deref()?, rec.y.as_deref()?);
            if table.column_index(x).is_some() && table.column_index(y).is_some() {
                return Some(render_line(table, x, y));
            }
            render_literal_lists(ChartType::Line, x, y)
        }
        ChartType::Pie => {
            let labels = rec.labels.first()?.as_str();
            let values = rec.values.as_deref()?;
            let label_idx = table.column_index(labels)?;
            let value_idx = table.column_index(values)?;

            let rows = table.drop_rows_null_in(&[labels, values]);
            let mut figure = Figure::new(format!("Distribution of {}", labels));
            figure.push_trace(Trace::Pie {
                labels: rows.iter().map(|row| row[label_idx].to_json()).collect(),
                values: rows.iter().map(|row| row[value_idx].to_json()).collect(),
            });
            Some(figure)
        }
        ChartType::Histogram => {
            let values = rec.values.as_deref()?;
            let value_idx = table.column_index(values)?;

            let rows = table.drop_rows_null_in(&[values]);
            let mut figure = Figure::new(format!("Histogram of {}", values));
            figure.push_trace(Trace::Histogram {
                x: rows.iter().map(|row| row[value_idx].to_json()).collect(),
            });
            Some(figure)
        }
        ChartType::StackedDoughnut => render_stacked_doughnut(table),
    }
}

fn render_xy(table: &ResultTable, chart_type: ChartType, x: &str, y: &str) -> Figure {
    let x_idx = table.column_index(x).expect("caller checked");
    let y_idx = table.column_index(y).expect("caller checked");
    let rows = table.drop_rows_null_in(&[x, y]);

    let x_values: Vec<Value> = rows.iter().map(|row| row[x_idx].to_json()).collect();
    let y_values: Vec<Value> = rows.iter().map(|row| row[y_idx].to_json()).collect();

    let (title, trace) = match chart_type {
        ChartType::Bar => (
            format!("{} by {}", y, x),
            Trace::Bar {
                name: None,
                x: x_values,
                y: y_values,
            },
        ),
        _ => (
            format!("{} vs {}", y, x),
            Trace::Scatter {
                name: None,
                x: x_values,
                y: y_values,
            },
        ),
    };

    let mut figure = Figure::new(title).with_axes(x, y);
    figure.push_trace(trace);
    figure
}

/// Line chart with an optional series split: the first categorical column
/// that is not an axis colors the series, one trace per category.
fn render_line(table: &ResultTable, x: &str, y: &str) -> Figure {
    let x_idx = table.column_index(x).expect("caller checked");
    let y_idx = table.column_index(y).expect("caller checked");
    let rows = table.drop_rows_null_in(&[x, y]);

    let hue = table
        .columns
        .iter()
        .find(|c| c.name != x && c.name != y && c.kind == ColumnKind::Categorical)
        .map(|c| c.name.clone());

    let mut figure = match &hue {
        Some(hue_col) => Figure::new(format!("{} over {} by {}", y, x, hue_col)),
        None => Figure::new(format!("{} over {}", y, x)),
    }
    .with_axes(x, y);

    match hue {
        Some(hue_col) => {
            let hue_idx = table.column_index(&hue_col).expect("column came from the table");

            // One trace per category, in order of first appearance.
            let mut order: Vec<String> = Vec::new();
            let mut grouped: HashMap<String, (Vec<Value>, Vec<Value>)> = HashMap::new();
            for row in &rows {
                let key = row[hue_idx].to_string();
                if !grouped.contains_key(&key) {
                    order.push(key.clone());
                }
                let series = grouped.entry(key).or_default();
                series.0.push(row[x_idx].to_json());
                series.1.push(row[y_idx].to_json());
            }

            for key in order {
                let (x_values, y_values) = grouped.remove(&key).expect("grouped above");
                figure.push_trace(Trace::Line {
                    name: Some(key),
                    x: x_values,
                    y: y_values,
                });
            }
        }
        None => {
            figure.push_trace(Trace::Line {
                name: None,
                x: rows.iter().map(|row| row[x_idx].to_json()).collect(),
                y: rows.iter().map(|row| row[y_idx].to_json()).collect(),
            });
        }
    }

    figure
}

/// Nested proportional rings. The hierarchy and value columns are detected
/// from the table itself (up to three categorical columns, first numeric
/// column); the selector's Labels field is deliberately not consulted.
fn render_stacked_doughnut(table: &ResultTable) -> Option<Figure> {
    let categorical = table.columns_of_kind(ColumnKind::Categorical);
    let numeric = table.columns_of_kind(ColumnKind::Numeric);

    if categorical.len() < 2 || numeric.is_empty() {
        debug!("Result lacks a detectable hierarchy for a stacked doughnut");
        return None;
    }

    let hierarchy: Vec<String> = categorical.into_iter().take(3).collect();
    let value_col = numeric[0].clone();

    let hierarchy_idx: Vec<usize> = hierarchy
        .iter()
        .map(|name| table.column_index(name).expect("column came from the table"))
        .collect();
    let value_idx = table.column_index(&value_col).expect("column came from the table");

    let mut subset: Vec<&str> = hierarchy.iter().map(String::as_str).collect();
    subset.push(value_col.as_str());
    let rows = table.drop_rows_null_in(&subset);

    // Sum the leaf value up every level of the hierarchy.
    let mut order: Vec<String> = Vec::new();
    let mut nodes: HashMap<String, (String, String, f64)> = HashMap::new();
    for row in &rows {
        let Some(value) = row[value_idx].as_f64() else {
            continue;
        };

        let mut parent_id = String::new();
        for &idx in &hierarchy_idx {
            let label = row[idx].to_string();
            let id = if parent_id.is_empty() {
                label.clone()
            } else {
                format!("{}/{}", parent_id, label)
            };

            let node = nodes.entry(id.clone()).or_insert_with(|| {
                order.push(id.clone());
                (label, parent_id.clone(), 0.0)
            });
            node.2 += value;

            parent_id = id;
        }
    }

    if order.is_empty() {
        return None;
    }

    let mut ids = Vec::with_capacity(order.len());
    let mut labels = Vec::with_capacity(order.len());
    let mut parents = Vec::with_capacity(order.len());
    let mut values = Vec::with_capacity(order.len());
    for id in order {
        let (label, parent, sum) = nodes.remove(&id).expect("collected above");
        ids.push(id);
        labels.push(label);
        parents.push(parent);
        values.push(sum);
    }

    let mut figure = Figure::new("Hierarchical Breakdown");
    figure.push_trace(Trace::Sunburst {
        ids,
        labels,
        parents,
        values,
    });
    Some(figure)
}

/// Fallback for the single-row-wide-result path: the selector hands back
/// literal sequences instead of column names.
fn render_literal_lists(chart_type: ChartType, x: &str, y: &str) -> Option<Figure> {
    if !(x.trim_start().starts_with('[') && y.trim_start().starts_with('[')) {
        return None;
    }

    let x_values = parse_literal_list(x)?;
    let y_values = parse_literal_list(y)?;
    if x_values.len() != y_values.len() {
        debug!("Literal axis lists have mismatched lengths");
        return None;
    }

    // Pairs with a missing side are dropped, as rows would be.
    let pairs: Vec<(Value, Value)> = x_values
        .into_iter()
        .zip(y_values)
        .filter(|(x, y)| !x.is_null() && !y.is_null())
        .collect();

    let x_values: Vec<Value> = pairs.iter().map(|(x, _)| x.clone()).collect();
    let y_values: Vec<Value> = pairs.into_iter().map(|(_, y)| y).collect();

    let figure = match chart_type {
        ChartType::Bar => {
            let mut figure = Figure::new("Comparison").with_axes("Category", "Value");
            figure.push_trace(Trace::Bar {
                name: None,
                x: x_values,
                y: y_values,
            });
            figure
        }
        _ => {
            let mut figure = Figure::new("Trend Comparison").with_axes("Category", "Value");
            figure.push_trace(Trace::Line {
                name: None,
                x: x_values,
                y: y_values,
            });
            figure
        }
    };

    Some(figure)
}

/// Parses `['May', 'Jan']` / `[296.53, 273.90]` style literals. `None` when
/// the text is not a well-formed flat list.
fn parse_literal_list(raw: &str) -> Option<Vec<Value>> {
    let trimmed = raw.trim();
    if !(trimmed.starts_with('[') && trimmed.ends_with(']')) {
        return None;
    }
    let inner = &trimmed[1..trimmed.len() - 1];
    if inner.trim().is_empty() {
        return None;
    }
    if inner.contains('[') || inner.contains(']') {
        // Nested lists are not part of the contract.
        return None;
    }

    let item_re = Regex::new(r#"'([^']*)'|"([^"]*)"|([^,]+)"#).expect("valid regex");
    let mut values = Vec::new();
    for capture in item_re.captures_iter(inner) {
        if let Some(text) = capture.get(1).or_else(|| capture.get(2)) {
            values.push(Value::String(text.as_str().to_string()));
            continue;
        }

        let token = capture.get(3).expect("one group always matches").as_str().trim();
        if token.is_empty() {
            continue;
        }
        if token.eq_ignore_ascii_case("none") || token.eq_ignore_ascii_case("null") {
            values.push(Value::Null);
        } else if let Ok(number) = token.parse::<f64>() {
            values.push(serde_json::json!(number));
        } else {
            values.push(Value::String(token.to_string()));
        }
    }

    if values.is_empty() {
        return None;
    }
    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;
    use serde_json::json;

    fn table(columns: Vec<(&str, ColumnKind)>, rows: Vec<Vec<CellValue>>) -> ResultTable {
        ResultTable::new(
            columns
                .into_iter()
                .map(|(name, kind)| Column {
                    name: name.to_string(),
                    kind,
                })
                .collect(),
            rows,
        )
    }

    fn bar_rec(x: &str, y: &str) -> ChartRecommendation {
        ChartRecommendation {
            chart_type: ChartType::Bar,
            x: Some(x.to_string()),
            y: Some(y.to_string()),
            values: None,
            labels: Vec::new(),
        }
    }

    #[test]
    fn bar_chart_uses_the_stated_axes() {
        let table = table(
            vec![
                ("neighborhood", ColumnKind::Categorical),
                ("count", ColumnKind::Numeric),
            ],
            vec![
                vec![CellValue::Text("Mission".to_string()), CellValue::Int(1200)],
                vec![CellValue::Text("Sunset".to_string()), CellValue::Int(640)],
            ],
        );

        let figure = render_chart(&table, &bar_rec("neighborhood", "count")).expect("renders");
        let value = figure.to_plotly_value();
        assert_eq!(value["data"][0]["type"], "bar");
        assert_eq!(value["data"][0]["x"], json!(["Mission", "Sunset"]));
        assert_eq!(value["data"][0]["y"], json!([1200, 640]));
    }

    #[test]
    fn absent_columns_yield_no_chart() {
        let table = table(
            vec![("neighborhood", ColumnKind::Categorical)],
            vec![vec![CellValue::Text("Mission".to_string())]],
        );
        assert!(render_chart(&table, &bar_rec("neighborhood", "ghost_column")).is_none());
    }

    #[test]
    fn rows_null_in_an_axis_are_dropped() {
        let table = table(
            vec![
                ("neighborhood", ColumnKind::Categorical),
                ("count", ColumnKind::Numeric),
            ],
            vec![
                vec![CellValue::Text("Mission".to_string()), CellValue::Int(1200)],
                vec![CellValue::Text("Sunset".to_string()), CellValue::Null],
            ],
        );

        let figure = render_chart(&table, &bar_rec("neighborhood", "count")).expect("renders");
        let value = figure.to_plotly_value();
        assert_eq!(value["data"][0]["x"], json!(["Mission"]));
    }

    #[test]
    fn line_chart_splits_series_on_a_spare_categorical_column() {
        let table = table(
            vec![
                ("month", ColumnKind::Temporal),
                ("count", ColumnKind::Numeric),
                ("neighborhood", ColumnKind::Categorical),
            ],
            vec![
                vec![
                    CellValue::Text("2023-01".to_string()),
                    CellValue::Int(10),
                    CellValue::Text("Mission".to_string()),
                ],
                vec![
                    CellValue::Text("2023-01".to_string()),
                    CellValue::Int(7),
                    CellValue::Text("Sunset".to_string()),
                ],
                vec![
                    CellValue::Text("2023-02".to_string()),
                    CellValue::Int(12),
                    CellValue::Text("Mission".to_string()),
                ],
            ],
        );

        let rec = ChartRecommendation {
            chart_type: ChartType::Line,
            x: Some("month".to_string()),
            y: Some("count".to_string()),
            values: None,
            labels: Vec::new(),
        };

        let figure = render_chart(&table, &rec).expect("renders");
        assert_eq!(figure.traces.len(), 2);
        let value = figure.to_plotly_value();
        assert_eq!(value["data"][0]["name"], "Mission");
        assert_eq!(value["data"][1]["name"], "Sunset");
    }

    #[test]
    fn pie_chart_renders_label_value_pairs() {
        let table = table(
            vec![
                ("source", ColumnKind::Categorical),
                ("count", ColumnKind::Numeric),
            ],
            vec![
                vec![CellValue::Text("Phone".to_string()), CellValue::Int(40)],
                vec![CellValue::Text("Mobile App".to_string()), CellValue::Int(60)],
            ],
        );

        let rec = ChartRecommendation {
            chart_type: ChartType::Pie,
            x: None,
            y: None,
            values: Some("count".to_string()),
            labels: vec!["source".to_string()],
        };

        let figure = render_chart(&table, &rec).expect("renders");
        let value = figure.to_plotly_value();
        assert_eq!(value["data"][0]["type"], "pie");
        assert_eq!(value["data"][0]["labels"], json!(["Phone", "Mobile App"]));
    }

    #[test]
    fn histogram_renders_the_value_column() {
        let table = table(
            vec![("hours", ColumnKind::Numeric)],
            vec![
                vec![CellValue::Float(1.5)],
                vec![CellValue::Float(2.0)],
                vec![CellValue::Null],
            ],
        );

        let rec = ChartRecommendation {
            chart_type: ChartType::Histogram,
            x: None,
            y: None,
            values: Some("hours".to_string()),
            labels: Vec::new(),
        };

        let figure = render_chart(&table, &rec).expect("renders");
        let value = figure.to_plotly_value();
        assert_eq!(value["data"][0]["type"], "histogram");
        assert_eq!(value["data"][0]["x"], json!([1.5, 2.0]));
    }

    #[test]
    fn doughnut_detects_hierarchy_even_when_labels_diverge() {
        // The selector recommended columns that do not exist; the renderer
        // derives the hierarchy from the table instead.
        let table = table(
            vec![
                ("service_name", ColumnKind::Categorical),
                ("service_subtype", ColumnKind::Categorical),
                ("total", ColumnKind::Numeric),
            ],
            vec![
                vec![
                    CellValue::Text("Street".to_string()),
                    CellValue::Text("Pothole".to_string()),
                    CellValue::Int(5),
                ],
                vec![
                    CellValue::Text("Street".to_string()),
                    CellValue::Text("Graffiti".to_string()),
                    CellValue::Int(3),
                ],
            ],
        );

        let rec = ChartRecommendation {
            chart_type: ChartType::StackedDoughnut,
            x: None,
            y: None,
            values: Some("ghost_value".to_string()),
            labels: vec!["ghost_a".to_string(), "ghost_b".to_string()],
        };

        let figure = render_chart(&table, &rec).expect("renders from auto-detection");
        let value = figure.to_plotly_value();
        assert_eq!(value["data"][0]["type"], "sunburst");
        // Root ring sums both leaves.
        assert_eq!(value["data"][0]["ids"][0], "Street");
        assert_eq!(value["data"][0]["values"][0], json!(8.0));
        assert_eq!(value["data"][0]["parents"][1], "Street");
    }

    #[test]
    fn doughnut_matching_labels_render_the_same_hierarchy() {
        let table = table(
            vec![
                ("service_name", ColumnKind::Categorical),
                ("service_subtype", ColumnKind::Categorical),
                ("total", ColumnKind::Numeric),
            ],
            vec![vec![
                CellValue::Text("Street".to_string()),
                CellValue::Text("Pothole".to_string()),
                CellValue::Int(5),
            ]],
        );

        let rec = ChartRecommendation {
            chart_type: ChartType::StackedDoughnut,
            x: None,
            y: None,
            values: Some("total".to_string()),
            labels: vec!["service_name".to_string(), "service_subtype".to_string()],
        };

        let figure = render_chart(&table, &rec).expect("renders");
        let value = figure.to_plotly_value();
        assert_eq!(value["data"][0]["ids"], json!(["Street", "Street/Pothole"]));
    }

    #[test]
    fn doughnut_without_a_hierarchy_yields_no_chart() {
        let table = table(
            vec![
                ("neighborhood", ColumnKind::Categorical),
                ("count", ColumnKind::Numeric),
            ],
            vec![vec![
                CellValue::Text("Mission".to_string()),
                CellValue::Int(1),
            ]],
        );

        let rec = ChartRecommendation {
            chart_type: ChartType::StackedDoughnut,
            x: None,
            y: None,
            values: Some("count".to_string()),
            labels: vec!["a".to_string(), "b".to_string()],
        };

        assert!(render_chart(&table, &rec).is_none());
    }

    #[test]
    fn literal_lists_build_an_ad_hoc_bar_chart() {
        let table = table(
            vec![
                ("avg_duration_jan", ColumnKind::Numeric),
                ("avg_duration_may", ColumnKind::Numeric),
            ],
            vec![vec![CellValue::Float(273.9), CellValue::Float(296.53)]],
        );

        let rec = ChartRecommendation {
            chart_type: ChartType::Bar,
            x: Some("['Jan', 'May']".to_string()),
            y: Some("[273.90, 296.53]".to_string()),
            values: None,
            labels: Vec::new(),
        };

        let figure = render_chart(&table, &rec).expect("fallback renders");
        let value = figure.to_plotly_value();
        assert_eq!(value["data"][0]["x"], json!(["Jan", "May"]));
        assert_eq!(value["data"][0]["y"], json!([273.9, 296.53]));
        assert_eq!(value["layout"]["xaxis"]["title"]["text"], "Category");
    }

    #[test]
    fn malformed_literal_lists_yield_no_chart() {
        let table = table(
            vec![("a", ColumnKind::Numeric)],
            vec![vec![CellValue::Int(1)]],
        );

        let rec = ChartRecommendation {
            chart_type: ChartType::Bar,
            x: Some("['Jan', 'May']".to_string()),
            y: Some("[273.90]".to_string()), // mismatched lengths
            values: None,
            labels: Vec::new(),
        };
        assert!(render_chart(&table, &rec).is_none());

        let rec = ChartRecommendation {
            chart_type: ChartType::Bar,
            x: Some("[[nested]]".to_string()),
            y: Some("[1]".to_string()),
            values: None,
            labels: Vec::new(),
        };
        assert!(render_chart(&table, &rec).is_none());
    }

    #[test]
    fn scatter_has_no_literal_fallback() {
        let table = table(
            vec![("a", ColumnKind::Numeric)],
            vec![vec![CellValue::Int(1)]],
        );

        let rec = ChartRecommendation {
            chart_type: ChartType::Scatter,
            x: Some("[1, 2]".to_string()),
            y: Some("[3, 4]".to_string()),
            values: None,
            labels: Vec::new(),
        };
        assert!(render_chart(&table, &rec).is_none());
    }
}
