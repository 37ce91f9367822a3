//! Theo overlay: mid, theo, and each feature's lean stacked around the mid
//!
//! Positive feature values stack upwards from the mid and negative ones
//! downwards, so the band edges show where each feature pushes the theo.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use super::palette::Palette;
use crate::replay::Theo;

const BAND_FILL_ALPHA: f64 = 0.3;

/// How a step line holds its value between points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMode {
    Before,
    Center,
    After,
}

/// One visual layer, referring to columns of the overlay source by name
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layer {
    Step {
        x: String,
        y: String,
        color: String,
        legend: String,
        mode: StepMode,
    },
    Quad {
        left: String,
        right: String,
        bottom: String,
        top: String,
        color: String,
        fill_alpha: f64,
        line_alpha: f64,
        legend: String,
    },
}

/// Legend placement and interaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Legend {
    pub location: String,
    pub click_policy: String,
}

impl Default for Legend {
    fn default() -> Self {
        Self {
            location: "top_left".to_string(),
            click_policy: "hide".to_string(),
        }
    }
}

/// One theo snapshot with its derived stack
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayRow {
    pub time: DateTime<Utc>,
    /// Time of the following row; bands extend until then
    pub next_time: Option<DateTime<Utc>>,
    pub mid: Option<f64>,
    pub theo: Option<f64>,
    /// Feature values in feature order
    pub features: Vec<Option<f64>>,
    /// Sum of present feature values
    pub lean: f64,
    /// `pos_cum[0] = mid`, then each positive part added in turn
    pub pos_cum: Vec<Option<f64>>,
    /// `neg_cum[0] = mid`, then each negative part added in turn
    pub neg_cum: Vec<Option<f64>>,
}

/// Stacked theo/feature data plus the layers that draw it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub feature_names: Vec<String>,
    pub rows: Vec<OverlayRow>,
    pub layers: Vec<Layer>,
    pub legend: Legend,
}

/// Build the theo overlay for `feature_names`
///
/// Rows are sorted by time. A missing feature value leaves its own and all
/// later stack edges of that row missing, and counts as zero in the lean.
pub fn build_theo_overlay<S: AsRef<str>>(
    theos: &[Theo],
    feature_names: &[S],
    palette: &Palette,
) -> Overlay {
    let names: Vec<String> = feature_names.iter().map(|s| s.as_ref().to_string()).collect();

    let mut sorted: Vec<&Theo> = theos.iter().collect();
    sorted.sort_by_key(|t| t.time);

    let mut rows: Vec<OverlayRow> = sorted
        .iter()
        .map(|theo| {
            let mid = theo.value("mid");
            let features: Vec<Option<f64>> = names.iter().map(|n| theo.value(n)).collect();
            stack_row(theo.time, mid, theo.value("theo"), features)
        })
        .collect();

    for i in 1..rows.len() {
        let next = rows[i].time;
        rows[i - 1].next_time = Some(next);
    }

    let layers = build_layers(&names, palette);
    tracing::debug!(
        rows = rows.len(),
        features = names.len(),
        layers = layers.len(),
        "Built theo overlay"
    );

    Overlay {
        feature_names: names,
        rows,
        layers,
        legend: Legend::default(),
    }
}

fn stack_row(
    time: DateTime<Utc>,
    mid: Option<f64>,
    theo: Option<f64>,
    features: Vec<Option<f64>>,
) -> OverlayRow {
    let mut pos_cum = Vec::with_capacity(features.len() + 1);
    let mut neg_cum = Vec::with_capacity(features.len() + 1);
    pos_cum.push(mid);
    neg_cum.push(mid);

    let mut pos = mid;
    let mut neg = mid;
    for value in &features {
        pos = pos.zip(*value).map(|(acc, v)| acc + v.max(0.0));
        neg = neg.zip(*value).map(|(acc, v)| acc + v.min(0.0));
        pos_cum.push(pos);
        neg_cum.push(neg);
    }

    let lean = features.iter().flatten().sum();
    OverlayRow {
        time,
        next_time: None,
        mid,
        theo,
        features,
        lean,
        pos_cum,
        neg_cum,
    }
}

fn build_layers(names: &[String], palette: &Palette) -> Vec<Layer> {
    let mut layers = vec![
        Layer::Step {
            x: "time".into(),
            y: "mid".into(),
            color: "black".into(),
            legend: "mid".into(),
            mode: StepMode::After,
        },
        Layer::Step {
            x: "time".into(),
            y: "theo".into(),
            color: "red".into(),
            legend: "theo".into(),
            mode: StepMode::After,
        },
    ];

    let band = |i: usize, name: &str, bottom: String, top: String| Layer::Quad {
        left: "time".into(),
        right: "next_time".into(),
        bottom,
        top,
        color: palette.color(i).to_string(),
        fill_alpha: BAND_FILL_ALPHA,
        line_alpha: 0.0,
        legend: name.to_string(),
    };

    for (i, name) in names.iter().enumerate() {
        layers.push(band(i, name, format!("pos_cum_{}", i), format!("pos_cum_{}", i + 1)));
    }
    for (i, name) in names.iter().enumerate() {
        layers.push(band(i, name, format!("neg_cum_{}", i + 1), format!("neg_cum_{}", i)));
    }
    layers
}

fn time_value(time: Option<DateTime<Utc>>) -> Value {
    time.map(|t| Value::from(t.timestamp_millis()))
        .unwrap_or(Value::Null)
}

fn number_value(value: Option<f64>) -> Value {
    value
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

impl Overlay {
    /// Column-oriented data source keyed by the names the layers refer to
    ///
    /// Times are epoch milliseconds; missing values are `null`.
    pub fn column_source(&self) -> Map<String, Value> {
        let mut columns: Vec<(String, Vec<Value>)> = vec![
            ("time".into(), Vec::new()),
            ("next_time".into(), Vec::new()),
            ("mid".into(), Vec::new()),
            ("theo".into(), Vec::new()),
            ("lean".into(), Vec::new()),
        ];
        for name in &self.feature_names {
            columns.push((name.clone(), Vec::new()));
            columns.push((format!("{}+", name), Vec::new()));
            columns.push((format!("{}-", name), Vec::new()));
        }
        for i in 0..=self.feature_names.len() {
            columns.push((format!("pos_cum_{}", i), Vec::new()));
            columns.push((format!("neg_cum_{}", i), Vec::new()));
        }

        for row in &self.rows {
            let mut values = vec![
                time_value(Some(row.time)),
                time_value(row.next_time),
                number_value(row.mid),
                number_value(row.theo),
                number_value(Some(row.lean)),
            ];
            for feature in &row.features {
                values.push(number_value(*feature));
                values.push(number_value(feature.map(|v| v.max(0.0))));
                values.push(number_value(feature.map(|v| v.min(0.0))));
            }
            for (pos, neg) in row.pos_cum.iter().zip(&row.neg_cum) {
                values.push(number_value(*pos));
                values.push(number_value(*neg));
            }
            for ((_, column), value) in columns.iter_mut().zip(values) {
                column.push(value);
            }
        }

        columns
            .into_iter()
            .map(|(name, values)| (name, Value::Array(values)))
            .collect()
    }

    /// Everything a renderer needs: data source, layers, legend
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "source": self.column_source(),
            "layers": self.layers,
            "legend": self.legend,
        })
    }
}
