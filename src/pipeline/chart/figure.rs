use minijinja::{context, Environment};
use serde_json::{json, Value};

/// One renderable data series.
#[derive(Debug, Clone)]
pub enum Trace {
    Bar {
        name: Option<String>,
        x: Vec<Value>,
        y: Vec<Value>,
    },
    Line {
        name: Option<String>,
        x: Vec<Value>,
        y: Vec<Value>,
    },
    Scatter {
        name: Option<String>,
        x: Vec<Value>,
        y: Vec<Value>,
    },
    Pie {
        labels: Vec<Value>,
        values: Vec<Value>,
    },
    Histogram {
        x: Vec<Value>,
    },
    Sunburst {
        ids: Vec<String>,
        labels: Vec<String>,
        parents: Vec<String>,
        values: Vec<f64>,
    },
}

impl Trace {
    fn to_plotly_value(&self) -> Value {
        match self {
            Trace::Bar { name, x, y } => with_name(
                json!({ "type": "bar", "x": x, "y": y }),
                name,
            ),
            Trace::Line { name, x, y } => with_name(
                json!({ "type": "scatter", "mode": "lines+markers", "x": x, "y": y }),
                name,
            ),
            Trace::Scatter { name, x, y } => with_name(
                json!({ "type": "scatter", "mode": "markers", "x": x, "y": y }),
                name,
            ),
            Trace::Pie { labels, values } => {
                json!({ "type": "pie", "labels": labels, "values": values })
            }
            Trace::Histogram { x } => json!({ "type": "histogram", "x": x }),
            Trace::Sunburst {
                ids,
                labels,
                parents,
                values,
            } => json!({
                "type": "sunburst",
                "ids": ids,
                "labels": labels,
                "parents": parents,
                "values": values,
                "branchvalues": "total",
            }),
        }
    }
}

fn with_name(mut value: Value, name: &Option<String>) -> Value {
    if let Some(name) = name {
        value["name"] = json!(name);
    }
    value
}

/// A rendered chart: the figure the UI draws and the document it exports.
#[derive(Debug, Clone)]
pub struct Figure {
    pub title: String,
    pub x_title: Option<String>,
    pub y_title: Option<String>,
    pub traces: Vec<Trace>,
}

impl Figure {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x_title: None,
            y_title: None,
            traces: Vec::new(),
        }
    }

    pub fn with_axes(mut self, x_title: impl Into<String>, y_title: impl Into<String>) -> Self {
        self.x_title = Some(x_title.into());
        self.y_title = Some(y_title.into());
        self
    }

    pub fn push_trace(&mut self, trace: Trace) {
        self.traces.push(trace);
    }

    /// Plotly-shaped `{data, layout}` value, consumable by any plotly
    /// frontend as-is.
    pub fn to_plotly_value(&self) -> Value {
        let mut layout = json!({ "title": { "text": self.title } });
        if let Some(x_title) = &self.x_title {
            layout["xaxis"] = json!({ "title": { "text": x_title } });
        }
        if let Some(y_title) = &self.y_title {
            layout["yaxis"] = json!({ "title": { "text": y_title } });
        }

        json!({
            "data": self.traces.iter().map(Trace::to_plotly_value).collect::<Vec<_>>(),
            "layout": layout,
        })
    }

}

/// Renders a plotly figure value into the standalone HTML document offered
/// for download. Takes the JSON form so the export endpoint can round-trip
/// a figure it previously handed to the client.
pub fn document(
    env: &Environment<'_>,
    title: &str,
    figure: &Value,
) -> Result<String, minijinja::Error> {
    let template = env.get_template("chart.html")?;
    template.render(context! {
        title => title,
        figure_json => figure.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plotly_value_carries_data_and_layout() {
        let mut figure = Figure::new("requests by neighborhood")
            .with_axes("neighborhood", "requests");
        figure.push_trace(Trace::Bar {
            name: None,
            x: vec![json!("Mission"), json!("Sunset")],
            y: vec![json!(1200), json!(640)],
        });

        let value = figure.to_plotly_value();
        assert_eq!(value["data"][0]["type"], "bar");
        assert_eq!(value["layout"]["title"]["text"], "requests by neighborhood");
        assert_eq!(value["layout"]["xaxis"]["title"]["text"], "neighborhood");
    }

    #[test]
    fn line_traces_are_scatter_with_lines_mode() {
        let mut figure = Figure::new("trend");
        figure.push_trace(Trace::Line {
            name: Some("Mission".to_string()),
            x: vec![json!("Jan")],
            y: vec![json!(1)],
        });

        let value = figure.to_plotly_value();
        assert_eq!(value["data"][0]["type"], "scatter");
        assert_eq!(value["data"][0]["mode"], "lines+markers");
        assert_eq!(value["data"][0]["name"], "Mission");
    }

    #[test]
    fn document_embeds_the_figure_json() {
        let mut env = Environment::new();
        env.add_template("chart.html", include_str!("../../../templates/chart.html"))
            .expect("template parses");

        let figure = Figure::new("Comparison");
        let html = document(&env, "Comparison", &figure.to_plotly_value()).expect("renders");
        assert!(html.contains("<title>Comparison</title>"));
        assert!(html.contains("\"data\":[]"));
    }

    #[test]
    fn sunburst_trace_totals_branches() {
        let mut figure = Figure::new("Hierarchical Breakdown");
        figure.push_trace(Trace::Sunburst {
            ids: vec!["a".to_string(), "a/b".to_string()],
            labels: vec!["a".to_string(), "b".to_string()],
            parents: vec!["".to_string(), "a".to_string()],
            values: vec![3.0, 3.0],
        });

        let value = figure.to_plotly_value();
        assert_eq!(value["data"][0]["branchvalues"], "total");
    }
}
