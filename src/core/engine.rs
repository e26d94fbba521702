use crate::core::Pipeline;
use crate::domain::model::{DaeModel, StateType};
use crate::utils::error::Result;
use std::time::{Duration, Instant};

/// Summary of one finished conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
    pub model_name: String,
    pub ode_states: usize,
    pub algebraic_states: usize,
    pub assignment_states: usize,
    pub parameters: usize,
    pub files: Vec<String>,
    pub elapsed: Duration,
}

impl ConversionReport {
    fn new(model: &DaeModel, files: Vec<String>, elapsed: Duration) -> Self {
        Self {
            model_name: model.name.clone(),
            ode_states: model.count(StateType::Ode),
            algebraic_states: model.count(StateType::Algebraic),
            assignment_states: model.count(StateType::Assignment),
            parameters: model.parameters.len(),
            files,
            elapsed,
        }
    }
}

pub struct ConvertEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> ConvertEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    /// Extract and transform only; nothing is written.
    pub async fn build(&self) -> Result<DaeModel> {
        tracing::info!("Reading SBML model...");
        let phase = Instant::now();
        let document = self.pipeline.extract().await?;
        tracing::info!(
            "Read model '{}': {} species, {} parameters, {} reactions, {} rules ({:?})",
            document.model.id,
            document.model.species.len(),
            document.model.parameters.len(),
            document.model.reactions.len(),
            document.model.rules.len(),
            phase.elapsed()
        );

        tracing::info!("Building DAE system...");
        let phase = Instant::now();
        let model = self.pipeline.transform(document).await?;
        tracing::info!("DAE system ready ({:?})", phase.elapsed());

        Ok(model)
    }

    pub async fn run(&self) -> Result<ConversionReport> {
        let started = Instant::now();
        tracing::info!("Starting conversion...");

        let model = self.build().await?;

        tracing::info!("Writing output files...");
        let phase = Instant::now();
        let files = self.pipeline.load(model.clone()).await?;
        tracing::info!("Wrote {} files ({:?})", files.len(), phase.elapsed());

        Ok(ConversionReport::new(&model, files, started.elapsed()))
    }
}
