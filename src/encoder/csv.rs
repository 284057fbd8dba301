//! CSV encoder
//!
//! Columns come from the form, not from the records, so the header can be
//! written before the first record arrives: `ID`, `Created`, `Modified`,
//! then one column per exportable form field. Records missing a field get
//! an empty cell.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{EncodingError, Result};
use crate::form::{DataField, Form};
use crate::record::{FieldValue, IDENTITY_FIELD, Record};
use crate::sink::ExportSink;

use super::convert::{BsonConverter, PlainTextConverter};
use super::{Encoder, ExportFormat};

/// Metadata columns written before the form's own fields
const META_COLUMNS: &[(&str, &str)] = &[
    ("ID", IDENTITY_FIELD),
    ("Created", "created"),
    ("Modified", "modified"),
];

/// Encoder for the `csv` format
pub struct CsvEncoder {
    form_id: String,
    columns: Vec<DataField>,
    converter: PlainTextConverter,
    started: bool,
    written: u64,
}

impl CsvEncoder {
    pub fn new(form: &Form) -> Self {
        Self {
            form_id: form.id_string(),
            columns: form.data_columns(),
            converter: PlainTextConverter::new(),
            started: false,
            written: 0,
        }
    }

    pub fn columns(&self) -> &[DataField] {
        &self.columns
    }

    fn header_line(&self) -> String {
        let mut cells: Vec<String> = META_COLUMNS
            .iter()
            .map(|(label, _)| label.to_string())
            .collect();
        cells.extend(self.columns.iter().map(|c| escape_csv_value(&c.label)));
        let mut line = cells.join(",");
        line.push('\n');
        line
    }

    fn row_line(&self, record: &Record) -> Result<String> {
        let mut cells = Vec::with_capacity(META_COLUMNS.len() + self.columns.len());

        for (_, field) in META_COLUMNS {
            cells.push(self.cell(record.get(field))?);
        }

        let data = record.get("data").and_then(FieldValue::as_record);
        for column in &self.columns {
            let value = data.and_then(|d| d.get_path(column.path.as_slice()));
            cells.push(self.cell(value)?);
        }

        let mut line = cells
            .iter()
            .map(|c| escape_csv_value(c))
            .collect::<Vec<_>>()
            .join(",");
        line.push('\n');
        Ok(line)
    }

    fn cell(&self, value: Option<&FieldValue>) -> Result<String> {
        match value {
            None => Ok(String::new()),
            Some(FieldValue::Scalar(v)) => Ok(self.converter.convert(v)),
            // Linked sub-records export as their identity
            Some(FieldValue::Record(r)) if r.identity().is_some() => {
                Ok(self.converter.convert_optional(r.identity()))
            }
            Some(FieldValue::Sequence(items))
                if items.iter().all(|i| matches!(i, FieldValue::Scalar(_))) =>
            {
                Ok(items
                    .iter()
                    .filter_map(FieldValue::as_scalar)
                    .map(|v| self.converter.convert(v))
                    .collect::<Vec<_>>()
                    .join(", "))
            }
            Some(other) => serde_json::to_string(other)
                .map_err(|e| EncodingError::from(e).into()),
        }
    }
}

/// Quote a value if it contains a comma, quote, or line break
fn escape_csv_value(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        // Wrap in quotes and escape internal quotes by doubling them
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[async_trait]
impl Encoder for CsvEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }

    async fn init(&mut self, sink: &mut dyn ExportSink) -> Result<()> {
        if self.columns.is_empty() {
            return Err(EncodingError::NoColumns(self.form_id.clone()).into());
        }

        sink.send(self.header_line().into_bytes()).await?;
        self.started = true;
        debug!("Wrote CSV headers: {} fields", self.columns.len());
        Ok(())
    }

    async fn write_record(&mut self, record: &Record, sink: &mut dyn ExportSink) -> Result<()> {
        if !self.started {
            return Err(EncodingError::InvalidState("write before init").into());
        }
        let line = self.row_line(record)?;
        sink.send(line.into_bytes()).await?;
        self.written += 1;
        Ok(())
    }

    async fn finish(&mut self, sink: &mut dyn ExportSink) -> Result<()> {
        sink.finish().await?;
        debug!("Finished CSV output ({} records)", self.written);
        Ok(())
    }

    fn records_written(&self) -> u64 {
        self.written
    }
}
