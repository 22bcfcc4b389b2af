//! Dashboard widget configurations as a tagged sum type, plus tabular export.
//!
//! The `component` tag selects the variant on the wire. Rendering is not
//! handled here; [`Widget::export_sheet`] flattens any widget into rows that
//! [`ExportSheet::to_csv`] writes out.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("csv output was not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Pie,
    Bar,
    Line,
    Area,
    Scatter,
    Gauge,
    Heatmap,
    Map,
    Treemap,
    Sunburst,
    Sankey,
    Candlestick,
}

impl ChartKind {
    fn sheet_prefix(self) -> &'static str {
        match self {
            ChartKind::Pie => "PieChart",
            ChartKind::Bar => "BarChart",
            ChartKind::Line => "LineChart",
            ChartKind::Area => "AreaChart",
            ChartKind::Scatter => "ScatterChart",
            ChartKind::Gauge => "Gauge",
            ChartKind::Heatmap => "Heatmap",
            ChartKind::Map => "Map",
            ChartKind::Treemap => "Treemap",
            ChartKind::Sunburst => "Sunburst",
            ChartKind::Sankey => "Sankey",
            ChartKind::Candlestick => "Candlestick",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SankeyLink {
    pub source: String,
    pub target: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartOptions {
    pub chart: ChartKind,
    /// X-axis categories for cartesian charts.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub series: Vec<ChartSeries>,
    #[serde(default)]
    pub links: Vec<SankeyLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRow {
    pub symbol: String,
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default)]
    pub change_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "component")]
pub enum WidgetConfig {
    #[serde(rename = "echart")]
    Echart(ChartOptions),
    #[serde(rename = "filter")]
    Filter {
        field: String,
        #[serde(default)]
        values: Vec<String>,
    },
    #[serde(rename = "table")]
    Table {
        columns: Vec<String>,
        #[serde(default)]
        data: Vec<Vec<Value>>,
    },
    #[serde(rename = "tile")]
    Tile {
        #[serde(default)]
        value: Value,
        #[serde(default)]
        change: Value,
        #[serde(default, rename = "changeType")]
        change_type: String,
        #[serde(default)]
        description: String,
    },
    #[serde(rename = "stock-tile")]
    StockTile(StockRow),
    #[serde(rename = "markdownCell")]
    MarkdownCell { content: String },
    #[serde(rename = "codeCell")]
    CodeCell {
        #[serde(default)]
        language: String,
        code: String,
    },
    #[serde(rename = "stock-list-table")]
    StockListTable { stocks: Vec<StockRow> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub config: WidgetConfig,
}

/// A named table ready for spreadsheet or CSV output.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExportSheet {
    pub fn to_csv(&self) -> Result<String, ExportError> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        if !self.headers.is_empty() {
            writer.write_record(&self.headers)?;
        }
        for row in &self.rows {
            writer.write_record(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        Ok(String::from_utf8(bytes)?)
    }
}

impl Widget {
    pub fn export_sheet(&self) -> ExportSheet {
        let (prefix, headers, rows) = match &self.config {
            WidgetConfig::Echart(options) => {
                let (headers, rows) = chart_rows(options);
                (options.chart.sheet_prefix(), headers, rows)
            }
            WidgetConfig::Table { columns, data } => (
                "Table",
                columns.clone(),
                data.iter()
                    .map(|row| row.iter().map(cell).collect())
                    .collect(),
            ),
            WidgetConfig::Tile {
                value,
                change,
                change_type,
                description,
            } => (
                "Tile",
                strings(&["Value", "Change", "Type", "Description"]),
                vec![vec![
                    cell(value),
                    cell(change),
                    change_type.clone(),
                    description.clone(),
                ]],
            ),
            WidgetConfig::StockTile(stock) => ("StockTile", stock_headers(), vec![stock_row(stock)]),
            WidgetConfig::StockListTable { stocks } => (
                "StockList",
                stock_headers(),
                stocks.iter().map(stock_row).collect(),
            ),
            WidgetConfig::Filter { field, values } => (
                "Filter",
                strings(&["Field", "Value"]),
                values
                    .iter()
                    .map(|v| vec![field.clone(), v.clone()])
                    .collect(),
            ),
            WidgetConfig::MarkdownCell { content } => (
                "Markdown",
                strings(&["Content"]),
                vec![vec![content.clone()]],
            ),
            WidgetConfig::CodeCell { language, code } => (
                "Code",
                strings(&["Language", "Code"]),
                vec![vec![language.clone(), code.clone()]],
            ),
        };

        ExportSheet {
            name: self.sheet_name(prefix),
            headers,
            rows,
        }
    }

    /// `{prefix}_{title}` with the title stripped to alphanumerics and
    /// spaces, at most 20 characters. Falls back to the widget id.
    fn sheet_name(&self, prefix: &str) -> String {
        let title = self.title.as_deref().filter(|t| !t.is_empty()).unwrap_or(&self.id);
        let clean: String = title
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
            .take(20)
            .collect();
        format!("{prefix}_{clean}")
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn field(value: &Value, key: &str) -> String {
    value.get(key).map(cell).unwrap_or_default()
}

fn index(value: &Value, i: usize) -> String {
    value.get(i).map(cell).unwrap_or_default()
}

fn stock_headers() -> Vec<String> {
    strings(&["Symbol", "Last Price", "Change %"])
}

fn stock_row(stock: &StockRow) -> Vec<String> {
    let num = |n: Option<f64>| n.map(|v| v.to_string()).unwrap_or_default();
    vec![
        stock.symbol.clone(),
        num(stock.last_price),
        num(stock.change_percent),
    ]
}

fn chart_rows(options: &ChartOptions) -> (Vec<String>, Vec<Vec<String>>) {
    let first = options.series.first();
    let points = || first.into_iter().flat_map(|s| s.data.iter());

    match options.chart {
        ChartKind::Pie | ChartKind::Treemap | ChartKind::Sunburst => (
            strings(&["Name", "Value"]),
            points().map(|p| vec![field(p, "name"), field(p, "value")]).collect(),
        ),
        ChartKind::Gauge => (
            strings(&["Metric", "Value"]),
            points().map(|p| vec![field(p, "name"), field(p, "value")]).collect(),
        ),
        ChartKind::Map => (
            strings(&["Region", "Value"]),
            points().map(|p| vec![field(p, "name"), field(p, "value")]).collect(),
        ),
        ChartKind::Bar | ChartKind::Line | ChartKind::Area => {
            let mut headers = vec!["Category".to_string()];
            headers.extend(options.series.iter().map(|s| s.name.clone()));
            let rows = options
                .categories
                .iter()
                .enumerate()
                .map(|(i, category)| {
                    let mut row = vec![category.clone()];
                    row.extend(options.series.iter().map(|s| {
                        s.data.get(i).map(cell).unwrap_or_default()
                    }));
                    row
                })
                .collect();
            (headers, rows)
        }
        ChartKind::Scatter => (
            strings(&["Series", "X", "Y"]),
            options
                .series
                .iter()
                .flat_map(|s| {
                    s.data
                        .iter()
                        .map(move |p| vec![s.name.clone(), index(p, 0), index(p, 1)])
                })
                .collect(),
        ),
        ChartKind::Heatmap => (
            strings(&["X", "Y", "Value"]),
            points()
                .map(|p| vec![index(p, 0), index(p, 1), index(p, 2)])
                .collect(),
        ),
        ChartKind::Candlestick => (
            strings(&["Category", "Open", "Close", "Low", "High"]),
            points()
                .enumerate()
                .map(|(i, p)| {
                    vec![
                        options.categories.get(i).cloned().unwrap_or_default(),
                        index(p, 0),
                        index(p, 1),
                        index(p, 2),
                        index(p, 3),
                    ]
                })
                .collect(),
        ),
        ChartKind::Sankey => (
            strings(&["Source", "Target", "Value"]),
            options
                .links
                .iter()
                .map(|l| vec![l.source.clone(), l.target.clone(), l.value.to_string()])
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn component_tag_selects_variant() {
        let widget: Widget = serde_json::from_value(json!({
            "id": "w1",
            "title": "Allocation",
            "config": {
                "component": "echart",
                "chart": "pie",
                "series": [{"name": "alloc", "data": [
                    {"name": "Equity", "value": 70},
                    {"name": "Cash", "value": 30}
                ]}]
            }
        }))
        .unwrap();

        assert!(matches!(
            widget.config,
            WidgetConfig::Echart(ChartOptions { chart: ChartKind::Pie, .. })
        ));

        let sheet = widget.export_sheet();
        assert_eq!(sheet.name, "PieChart_Allocation");
        assert_eq!(sheet.headers, vec!["Name", "Value"]);
        assert_eq!(sheet.rows[1], vec!["Cash", "30"]);
    }

    #[test]
    fn unknown_component_is_rejected() {
        let parsed = serde_json::from_value::<WidgetConfig>(json!({"component": "iframe"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn bar_chart_exports_one_column_per_series() {
        let widget = Widget {
            id: "w2".into(),
            title: None,
            config: WidgetConfig::Echart(ChartOptions {
                chart: ChartKind::Bar,
                categories: vec!["Q1".into(), "Q2".into()],
                series: vec![
                    ChartSeries { name: "2023".into(), data: vec![json!(10), json!(12)] },
                    ChartSeries { name: "2024".into(), data: vec![json!(14)] },
                ],
                links: vec![],
            }),
        };
        let sheet = widget.export_sheet();
        assert_eq!(sheet.name, "BarChart_w2");
        assert_eq!(sheet.headers, vec!["Category", "2023", "2024"]);
        assert_eq!(sheet.rows, vec![vec!["Q1", "10", "14"], vec!["Q2", "12", ""]]);
    }

    #[test]
    fn tile_exports_single_row_and_writes_csv() {
        let widget = Widget {
            id: "t1".into(),
            title: Some("Net P&L, today!".into()),
            config: WidgetConfig::Tile {
                value: json!("1,250"),
                change: json!(3.5),
                change_type: "positive".into(),
                description: "vs yesterday".into(),
            },
        };
        let sheet = widget.export_sheet();
        assert_eq!(sheet.name, "Tile_Net PL today");

        let csv = sheet.to_csv().unwrap();
        assert_eq!(
            csv,
            "Value,Change,Type,Description\n\"1,250\",3.5,positive,vs yesterday\n"
        );
    }

    #[test]
    fn sankey_uses_links() {
        let widget: Widget = serde_json::from_value(json!({
            "id": "s",
            "config": {
                "component": "echart",
                "chart": "sankey",
                "links": [{"source": "Cash", "target": "Equity", "value": 5.5}]
            }
        }))
        .unwrap();
        let sheet = widget.export_sheet();
        assert_eq!(sheet.rows, vec![vec!["Cash", "Equity", "5.5"]]);
    }
}
