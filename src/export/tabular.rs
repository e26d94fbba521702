use super::{Exporter, RenderedFile};
use crate::domain::model::DaeModel;
use crate::utils::error::{ConvertError, Result};
use serde::Serialize;

/// Pretty-printed JSON dump of the whole DAE model.
///
/// JSON has no NaN or infinity, so models carrying such values are refused
/// rather than written with `null` in their place.
#[derive(Debug, Clone, Default)]
pub struct JsonExporter;

fn ensure_finite(model: &DaeModel) -> Result<()> {
    let values = model
        .states
        .iter()
        .map(|s| (s.id.as_str(), s.initial_condition))
        .chain(model.parameters.iter().map(|p| (p.id.as_str(), p.value)))
        .chain([("t_init", model.options.t_init), ("t_end", model.options.t_end)]);

    for (id, value) in values {
        if !value.is_finite() {
            return Err(ConvertError::ExportError {
                message: format!("'{}' is {} and cannot be written as JSON", id, value),
            });
        }
    }
    Ok(())
}

impl Exporter for JsonExporter {
    fn render(&self, model: &DaeModel) -> Result<Vec<RenderedFile>> {
        ensure_finite(model)?;
        let json = serde_json::to_string_pretty(model)?;
        Ok(vec![RenderedFile::new(format!("{}.json", model.name), json)])
    }
}

/// One row per state: `id,type,context,initial_condition,equation`.
#[derive(Debug, Clone, Default)]
pub struct CsvExporter;

#[derive(Serialize)]
struct StateRow<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    state_type: &'static str,
    context: &'a str,
    initial_condition: f64,
    equation: &'a str,
}

impl Exporter for CsvExporter {
    fn render(&self, model: &DaeModel) -> Result<Vec<RenderedFile>> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        for state in &model.states {
            writer.serialize(StateRow {
                id: &state.id,
                state_type: state.state_type.as_str(),
                context: &state.context,
                initial_condition: state.initial_condition,
                equation: &state.equation,
            })?;
        }

        // Without rows serde never writes the header.
        if model.states.is_empty() {
            writer.write_record(["id", "type", "context", "initial_condition", "equation"])?;
        }

        let data = writer.into_inner().map_err(|e| ConvertError::ExportError {
            message: format!("failed to flush CSV output: {}", e),
        })?;

        Ok(vec![RenderedFile::new(
            format!("{}_states.csv", model.name),
            data,
        )])
    }
}
