use crate::core::builder::DaeBuilder;
use crate::core::{ConfigProvider, Pipeline, Storage};
use crate::domain::model::DaeModel;
use crate::export::{bundle, CsvExporter, Exporter, JsonExporter, MatlabExporter};
use crate::sbml::{parse_sbml, SbmlDocument};
use crate::utils::error::Result;
use std::path::Path;

/// Reads one SBML file, builds its DAE system and writes the selected exports.
pub struct ConvertPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> ConvertPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    fn exporters(&self) -> Vec<Box<dyn Exporter>> {
        let exports = self.config.exports();
        let mut exporters: Vec<Box<dyn Exporter>> =
            vec![Box::new(MatlabExporter::new(exports.example))];
        if exports.json {
            exporters.push(Box::new(JsonExporter));
        }
        if exports.csv {
            exporters.push(Box::new(CsvExporter));
        }
        exporters
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for ConvertPipeline<S, C> {
    async fn extract(&self) -> Result<SbmlDocument> {
        tracing::debug!("Reading SBML from: {}", self.config.input_path());
        let bytes = self.storage.read_file(self.config.input_path()).await?;
        let document = parse_sbml(&bytes)?;
        tracing::debug!(
            level = ?document.level,
            version = ?document.version,
            "Parsed SBML model '{}'",
            document.model.id
        );
        Ok(document)
    }

    async fn transform(&self, document: SbmlDocument) -> Result<DaeModel> {
        DaeBuilder::new(self.config.simulation_options())
            .with_name(self.config.model_name().map(str::to_string))
            .build(&document)
    }

    async fn load(&self, model: DaeModel) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for exporter in self.exporters() {
            files.extend(exporter.render(&model)?);
        }

        if self.config.exports().zip {
            let archive = bundle(&format!("{}_dae.zip", model.name), &files)?;
            files.push(archive);
        }

        let mut written = Vec::with_capacity(files.len());
        for file in &files {
            let path = Path::new(self.config.output_path())
                .join(&file.name)
                .to_string_lossy()
                .into_owned();
            self.storage.write_file(&path, &file.contents).await?;
            tracing::debug!("Wrote {} ({} bytes)", path, file.contents.len());
            written.push(path);
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ExportSelection, SimulationOptions, StateType};
    use crate::utils::error::ConvertError;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    const DECAY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sbml xmlns="http://www.sbml.org/sbml/level3/version1/core" level="3" version="1">
  <model id="decay">
    <listOfCompartments>
      <compartment id="cell" size="1" constant="true"/>
    </listOfCompartments>
    <listOfSpecies>
      <species id="A" compartment="cell" initialAmount="5" boundaryCondition="false" constant="false"/>
    </listOfSpecies>
    <listOfParameters>
      <parameter id="k" value="0.1" constant="true"/>
    </listOfParameters>
    <listOfReactions>
      <reaction id="loss" reversible="false">
        <listOfReactants>
          <speciesReference species="A" stoichiometry="1" constant="true"/>
        </listOfReactants>
        <kineticLaw>
          <math xmlns="http://www.w3.org/1998/Math/MathML">
            <apply><times/><ci>k</ci><ci>A</ci></apply>
          </math>
        </kineticLaw>
      </reaction>
    </listOfReactions>
  </model>
</sbml>"#;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn with_file(path: &str, data: &str) -> Self {
            let storage = Self::new();
            storage
                .files
                .lock()
                .await
                .insert(path.to_string(), data.as_bytes().to_vec());
            storage
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                ConvertError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        name: Option<String>,
        exports: ExportSelection,
    }

    impl MockConfig {
        fn new() -> Self {
            Self {
                name: None,
                exports: ExportSelection::default(),
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn input_path(&self) -> &str {
            "models/decay.xml"
        }

        fn output_path(&self) -> &str {
            "test_output"
        }

        fn model_name(&self) -> Option<&str> {
            self.name.as_deref()
        }

        fn simulation_options(&self) -> SimulationOptions {
            SimulationOptions {
                t_end: 30.0,
                ..SimulationOptions::default()
            }
        }

        fn exports(&self) -> ExportSelection {
            self.exports
        }
    }

    #[tokio::test]
    async fn test_extract_parses_input() {
        let storage = MockStorage::with_file("models/decay.xml", DECAY).await;
        let pipeline = ConvertPipeline::new(storage, MockConfig::new());

        let document = pipeline.extract().await.unwrap();
        assert_eq!(document.level, Some(3));
        assert_eq!(document.model.id, "decay");
        assert_eq!(document.model.species.len(), 1);
    }

    #[tokio::test]
    async fn test_extract_missing_input() {
        let pipeline = ConvertPipeline::new(MockStorage::new(), MockConfig::new());
        let err = pipeline.extract().await.unwrap_err();
        assert!(matches!(err, ConvertError::IoError(_)));
    }

    #[tokio::test]
    async fn test_transform_uses_config() {
        let storage = MockStorage::with_file("models/decay.xml", DECAY).await;
        let mut config = MockConfig::new();
        config.name = Some("Decay".to_string());
        let pipeline = ConvertPipeline::new(storage, config);

        let document = pipeline.extract().await.unwrap();
        let model = pipeline.transform(document).await.unwrap();

        assert_eq!(model.name, "Decay");
        assert_eq!(model.options.t_end, 30.0);
        let a = model.state("A").unwrap();
        assert_eq!(a.state_type, StateType::Ode);
        assert_eq!(a.equation, "-k*A");
        assert_eq!(a.initial_condition, 5.0);
    }

    #[tokio::test]
    async fn test_load_writes_default_exports() {
        let storage = MockStorage::with_file("models/decay.xml", DECAY).await;
        let pipeline = ConvertPipeline::new(storage.clone(), MockConfig::new());

        let document = pipeline.extract().await.unwrap();
        let model = pipeline.transform(document).await.unwrap();
        let written = pipeline.load(model).await.unwrap();

        assert_eq!(
            written,
            vec!["test_output/decay.m", "test_output/decay_example.m"]
        );
        let class = storage.get_file("test_output/decay.m").await.unwrap();
        let class = String::from_utf8(class).unwrap();
        assert!(class.starts_with("classdef decay"));
    }

    #[tokio::test]
    async fn test_load_writes_every_selected_export() {
        let storage = MockStorage::with_file("models/decay.xml", DECAY).await;
        let mut config = MockConfig::new();
        config.exports = ExportSelection {
            example: false,
            json: true,
            csv: true,
            zip: true,
        };
        let pipeline = ConvertPipeline::new(storage.clone(), config);

        let document = pipeline.extract().await.unwrap();
        let model = pipeline.transform(document).await.unwrap();
        let written = pipeline.load(model).await.unwrap();

        assert_eq!(
            written,
            vec![
                "test_output/decay.m",
                "test_output/decay.json",
                "test_output/decay_states.csv",
                "test_output/decay_dae.zip",
            ]
        );
        assert!(storage.get_file("test_output/decay_example.m").await.is_none());

        let archive = storage.get_file("test_output/decay_dae.zip").await.unwrap();
        let zip = zip::ZipArchive::new(std::io::Cursor::new(archive)).unwrap();
        assert_eq!(zip.len(), 3);
    }
}
