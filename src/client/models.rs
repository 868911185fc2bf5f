//! Catalog of the reading-order and OCR models the service can be switched
//! to, and the selection body posted to `update/model_config`.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// An OCR backend: which API to call and which model on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrApiModel {
    pub api_name: String,
    pub model_name: String,
}

impl OcrApiModel {
    fn new(api_name: &str, model_name: &str) -> Self {
        Self {
            api_name: api_name.to_string(),
            model_name: model_name.to_string(),
        }
    }
}

/// Body of `POST update/model_config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelection {
    pub read_model: String,
    pub ocr_api_model: OcrApiModel,
}

/// Models offered to the user. The first entry of each list is the default.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    pub read_models: Vec<String>,
    pub ocr_api_models: Vec<OcrApiModel>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            read_models: vec!["Xy_Cut".to_string(), "LayoutLMv3".to_string()],
            ocr_api_models: vec![
                OcrApiModel::new("siliconflow", "Pro/Qwen/Qwen2.5-VL-7B-Instruct"),
                OcrApiModel::new("siliconflow", "Qwen/Qwen2.5-VL-32B-Instruct"),
                OcrApiModel::new("siliconflow", "Qwen/Qwen2.5-VL-72B-Instruct"),
                OcrApiModel::new("siliconflow", "deepseek-ai/deepseek-vl2"),
                OcrApiModel::new("google", "models/gemma-3-27b-it"),
                OcrApiModel::new("google", "models/gemini-2.0-flash"),
                OcrApiModel::new("google", "models/gemini-2.5-flash"),
            ],
        }
    }
}

impl ModelCatalog {
    /// Resolve a selection by name. `None` picks the first entry of that
    /// list; a name that is not in the catalog is rejected.
    pub fn select(
        &self,
        read_model: Option<&str>,
        ocr_model: Option<&str>,
    ) -> Result<ModelSelection, ConfigError> {
        let read = pick(&self.read_models, read_model, "reading-order", |m| m.as_str())?;
        let ocr = pick(&self.ocr_api_models, ocr_model, "OCR", |m| m.model_name.as_str())?;
        Ok(ModelSelection {
            read_model: read.clone(),
            ocr_api_model: ocr.clone(),
        })
    }
}

fn pick<'a, T>(
    entries: &'a [T],
    wanted: Option<&str>,
    kind: &'static str,
    name_of: impl Fn(&T) -> &str,
) -> Result<&'a T, ConfigError> {
    match wanted {
        None => entries.first().ok_or(ConfigError::EmptyCatalog { kind }),
        Some(name) => entries
            .iter()
            .find(|e| name_of(e) == name)
            .ok_or_else(|| ConfigError::UnknownModel {
                kind,
                name: name.to_string(),
                known: entries.iter().map(&name_of).collect::<Vec<_>>().join(", "),
            }),
    }
}
