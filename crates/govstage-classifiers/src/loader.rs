//! Model acquisition: resolving checkpoint files and constructing the ranker

use crate::config::{ModelConfigSpec, ModelSourceSpec};
use crate::ranker::Ranker;
use govstage_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Weight file formats understood by the NLI ranker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightsFile {
    SafeTensors(PathBuf),
    PyTorch(PathBuf),
}

/// Files making up an NLI checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: WeightsFile,
}

/// Acquire the fallback ranker described by the configuration.
///
/// Failure here is fatal for a run: nothing is classified without a ranker.
pub fn load_ranker(spec: &ModelConfigSpec) -> Result<Arc<dyn Ranker>> {
    #[cfg(feature = "ml-models")]
    {
        let ranker = crate::nli::NliRanker::load(spec)?;
        Ok(Arc::new(ranker))
    }

    #[cfg(not(feature = "ml-models"))]
    {
        let _ = spec;
        Err(Error::model("NLI ranking requires the 'ml-models' feature"))
    }
}

/// Resolve checkpoint files locally or from the Hugging Face Hub
pub fn resolve_model_files(spec: &ModelConfigSpec) -> Result<ModelFiles> {
    match &spec.source {
        ModelSourceSpec::Local { path } => resolve_local(path),
        ModelSourceSpec::HuggingFace { repo, revision } => {
            download_from_huggingface(repo, revision, spec.cache_dir.as_deref())
        }
    }
}

/// Resolve checkpoint files from a local directory
pub fn resolve_local(dir: &Path) -> Result<ModelFiles> {
    if !dir.is_dir() {
        return Err(Error::model(format!(
            "model path does not exist: {}",
            dir.display()
        )));
    }

    let config = dir.join("config.json");
    if !config.exists() {
        return Err(Error::model(format!(
            "config.json not found in {}",
            dir.display()
        )));
    }

    let tokenizer = dir.join("tokenizer.json");
    if !tokenizer.exists() {
        return Err(Error::model(format!(
            "tokenizer.json not found in {}",
            dir.display()
        )));
    }

    let safetensors = dir.join("model.safetensors");
    let pytorch = dir.join("pytorch_model.bin");
    let weights = if safetensors.exists() {
        WeightsFile::SafeTensors(safetensors)
    } else if pytorch.exists() {
        WeightsFile::PyTorch(pytorch)
    } else {
        return Err(Error::model(format!(
            "no model weights found in {} (tried model.safetensors, pytorch_model.bin)",
            dir.display()
        )));
    };

    Ok(ModelFiles {
        config,
        tokenizer,
        weights,
    })
}

fn download_from_huggingface(
    repo: &str,
    revision: &str,
    cache_dir: Option<&Path>,
) -> Result<ModelFiles> {
    tracing::info!("Fetching model from HuggingFace: {} @ {}", repo, revision);

    let mut builder = hf_hub::api::sync::ApiBuilder::new();
    if let Some(cache_dir) = cache_dir {
        builder = builder.with_cache_dir(cache_dir.to_path_buf());
    }
    let api = builder
        .build()
        .map_err(|e| Error::model(format!("Failed to initialize HuggingFace API: {}", e)))?;

    let repo_obj = api.repo(hf_hub::Repo::with_revision(
        repo.to_string(),
        hf_hub::RepoType::Model,
        revision.to_string(),
    ));

    let config = repo_obj
        .get("config.json")
        .map_err(|e| Error::model(format!("Failed to download config.json: {}", e)))?;

    let tokenizer = repo_obj
        .get("tokenizer.json")
        .map_err(|e| Error::model(format!("Failed to download tokenizer.json: {}", e)))?;

    let weights = match repo_obj.get("model.safetensors") {
        Ok(path) => WeightsFile::SafeTensors(path),
        Err(e) => {
            tracing::debug!("model.safetensors unavailable ({}), trying pytorch_model.bin", e);
            let path = repo_obj.get("pytorch_model.bin").map_err(|e| {
                Error::model(format!(
                    "No model weights found (tried model.safetensors, pytorch_model.bin): {}",
                    e
                ))
            })?;
            WeightsFile::PyTorch(path)
        }
    };

    tracing::info!("Model available at: {}", config.parent().unwrap_or(&config).display());

    Ok(ModelFiles {
        config,
        tokenizer,
        weights,
    })
}
