use chrono::{DateTime, SecondsFormat, Utc};

use super::FormatError;

/// Serializes `input_count` feature channels plus `output_count` label
/// columns per timestep.
///
/// Features are channel-major (`features[channel][t]`), labels are row-major
/// (`labels[t][column]`). Values print with `f64`'s `Display`, so `1.0` is
/// written as `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFormatter {
    input_count: usize,
    output_count: usize,
}

impl DataFormatter {
    pub fn new(input_count: usize, output_count: usize) -> Self {
        Self {
            input_count,
            output_count,
        }
    }

    pub fn input_count(&self) -> usize {
        self.input_count
    }

    pub fn output_count(&self) -> usize {
        self.output_count
    }

    /// Validate and render. Returns the number of rows and the CSV text.
    pub fn format(
        &self,
        features: Option<&[Vec<f64>]>,
        labels: Option<&[Vec<f64>]>,
        timestamps: Option<&[DateTime<Utc>]>,
    ) -> Result<(usize, String), FormatError> {
        let features = features.ok_or(FormatError::MissingFeatures)?;
        let labels = labels.ok_or(FormatError::MissingLabels)?;
        let rows = self.validate(features, labels, timestamps)?;

        let mut out = String::with_capacity(rows * (self.input_count + self.output_count) * 4);
        let mut cells: Vec<String> = Vec::with_capacity(1 + self.input_count + self.output_count);
        for t in 0..rows {
            cells.clear();
            if let Some(ts) = timestamps {
                cells.push(ts[t].to_rfc3339_opts(SecondsFormat::Millis, true));
            }
            cells.extend(features.iter().map(|channel| channel[t].to_string()));
            cells.extend(labels[t].iter().map(f64::to_string));

            out.push_str(&cells.join(","));
            out.push('\n');
        }

        Ok((rows, out))
    }

    fn validate(
        &self,
        features: &[Vec<f64>],
        labels: &[Vec<f64>],
        timestamps: Option<&[DateTime<Utc>]>,
    ) -> Result<usize, FormatError> {
        if features.len() != self.input_count {
            return Err(FormatError::FeatureCountMismatch {
                expected: self.input_count,
                actual: features.len(),
            });
        }

        // With zero declared inputs the label rows define T
        let rows = features.first().map_or(labels.len(), Vec::len);
        if rows == 0 {
            return Err(FormatError::EmptySeries);
        }

        for (channel, series) in features.iter().enumerate() {
            if series.len() != rows {
                return Err(FormatError::RaggedFeatures {
                    channel,
                    expected: rows,
                    actual: series.len(),
                });
            }
            if let Some(t) = series.iter().position(|v| !v.is_finite()) {
                return Err(FormatError::NonFinite { row: t, column: channel });
            }
        }

        if labels.len() != rows {
            return Err(FormatError::LabelCountMismatch {
                expected: rows,
                actual: labels.len(),
            });
        }
        for (row, label) in labels.iter().enumerate() {
            if label.len() != self.output_count {
                return Err(FormatError::LabelWidthMismatch {
                    row,
                    expected: self.output_count,
                    actual: label.len(),
                });
            }
            if let Some(col) = label.iter().position(|v| !v.is_finite()) {
                return Err(FormatError::NonFinite {
                    row,
                    column: self.input_count + col,
                });
            }
        }

        if let Some(ts) = timestamps {
            if ts.len() != rows {
                return Err(FormatError::TimestampCountMismatch {
                    expected: rows,
                    actual: ts.len(),
                });
            }
        }

        Ok(rows)
    }
}
