//! Zero-shot NLI ranker backed by a DeBERTa-v2/v3 MNLI checkpoint
//!
//! Each candidate is framed as a hypothesis and scored as a premise /
//! hypothesis pair. The entailment logits of all candidates are then
//! softmaxed together, giving a single-label distribution over candidates.

use crate::config::{DeviceSpec, ModelConfigSpec, ModelSourceSpec};
use crate::loader::{resolve_model_files, WeightsFile};
use crate::ranker::{rank_by_score, softmax, HypothesisTemplate, Prediction, Ranker};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::debertav2::{
    Config as DebertaV2Config, DebertaV2SeqClassificationModel, Id2Label,
};
use govstage_core::{Error, Result};
use std::path::Path;
use std::time::Instant;
use tokenizers::{Tokenizer, TruncationParams, TruncationStrategy};

/// Candle-hosted NLI ranker
pub struct NliRanker {
    name: String,
    tokenizer: Tokenizer,
    model: DebertaV2SeqClassificationModel,
    device: Device,
    entailment_index: usize,
}

impl NliRanker {
    /// Resolve, download if needed, and load the configured checkpoint
    pub fn load(spec: &ModelConfigSpec) -> Result<Self> {
        let start = Instant::now();
        let files = resolve_model_files(spec)?;

        let raw_config: serde_json::Value = parse_json(&files.config)?;
        let id2label = parse_id2label(&raw_config)?;
        let entailment_index = entailment_index(&id2label)?;
        let deberta_config: DebertaV2Config = serde_json::from_value(raw_config).map_err(|e| {
            Error::model(format!(
                "Failed to parse config {}: {}",
                files.config.display(),
                e
            ))
        })?;

        let tokenizer = load_tokenizer(&files.tokenizer, spec.max_length)?;
        let device = get_device(spec.device)?;
        let vb = load_var_builder(&files.weights, &device)?;
        let model = load_sequence_model(&vb, &deberta_config, id2label)?;

        let name = match &spec.source {
            ModelSourceSpec::HuggingFace { repo, .. } => repo.clone(),
            ModelSourceSpec::Local { path } => path.display().to_string(),
        };

        tracing::info!(
            "Loaded NLI ranker '{}' in {}ms (entailment label index {})",
            name,
            start.elapsed().as_millis(),
            entailment_index
        );

        Ok(Self {
            name,
            tokenizer,
            model,
            device,
            entailment_index,
        })
    }

    fn entailment_logit(&self, premise: &str, hypothesis: &str) -> Result<f32> {
        let encoding = self
            .tokenizer
            .encode((premise, hypothesis), true)
            .map_err(|e| Error::ranking(format!("Tokenization failed: {}", e)))?;

        let input_ids = self.batch_of_one(encoding.get_ids())?;
        let token_type_ids = self.batch_of_one(encoding.get_type_ids())?;
        let attention_mask = self.batch_of_one(encoding.get_attention_mask())?;

        let logits = self
            .model
            .forward(&input_ids, Some(token_type_ids), Some(attention_mask))
            .map_err(|e| Error::ranking(format!("Model forward pass failed: {}", e)))?;

        let logits: Vec<f32> = logits
            .squeeze(0)
            .and_then(|l| l.to_vec1())
            .map_err(|e| Error::ranking(format!("Failed to read logits: {}", e)))?;

        logits.get(self.entailment_index).copied().ok_or_else(|| {
            Error::ranking(format!(
                "model produced {} logits, entailment index is {}",
                logits.len(),
                self.entailment_index
            ))
        })
    }

    fn batch_of_one(&self, values: &[u32]) -> Result<Tensor> {
        Tensor::new(values, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| Error::ranking(format!("Failed to create input tensor: {}", e)))
    }
}

#[async_trait]
impl Ranker for NliRanker {
    async fn rank(
        &self,
        text: &str,
        candidates: &[String],
        template: &HypothesisTemplate,
    ) -> Result<Vec<Prediction>> {
        if candidates.is_empty() {
            return Err(Error::ranking("no candidates to rank"));
        }

        let start = Instant::now();
        let mut entailment = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let hypothesis = template.render(candidate);
            entailment.push(self.entailment_logit(text, &hypothesis)?);
        }

        let predictions = rank_by_score(candidates, &softmax(&entailment));
        tracing::debug!(
            "Ranked {} candidates in {}us",
            candidates.len(),
            start.elapsed().as_micros()
        );

        Ok(predictions)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn get_device(device: DeviceSpec) -> Result<Device> {
    match device {
        DeviceSpec::Cpu => Ok(Device::Cpu),
        DeviceSpec::Cuda { index } => Device::new_cuda(index.unwrap_or(0))
            .map_err(|e| Error::model(format!("Failed to initialize CUDA: {}", e))),
        DeviceSpec::Metal { index } => Device::new_metal(index.unwrap_or(0))
            .map_err(|e| Error::model(format!("Failed to initialize Metal: {}", e))),
    }
}

fn parse_json(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::model(format!("Failed to read config {}: {}", path.display(), e))
    })?;

    serde_json::from_str(&content).map_err(|e| {
        Error::model(format!("Failed to parse config {}: {}", path.display(), e))
    })
}

/// Read `id2label` from a checkpoint's `config.json`
fn parse_id2label(raw_config: &serde_json::Value) -> Result<Id2Label> {
    let map = raw_config
        .get("id2label")
        .and_then(|v| v.as_object())
        .ok_or_else(|| Error::model("config.json has no id2label mapping"))?;

    map.iter()
        .map(|(id, label)| {
            let id = id
                .parse::<u32>()
                .map_err(|_| Error::model(format!("invalid id2label key '{}'", id)))?;
            let label = label
                .as_str()
                .ok_or_else(|| Error::model(format!("id2label[{}] is not a string", id)))?;
            Ok((id, label.to_string()))
        })
        .collect()
}

/// Index of the entailment class in the model's output logits
fn entailment_index(id2label: &Id2Label) -> Result<usize> {
    id2label
        .iter()
        .find(|(_, label)| label.to_lowercase().starts_with("entail"))
        .map(|(id, _)| *id as usize)
        .ok_or_else(|| {
            Error::model("model has no entailment label; an NLI checkpoint is required")
        })
}

fn load_tokenizer(path: &Path, max_length: usize) -> Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(path)
        .map_err(|e| Error::model(format!("Failed to load tokenizer.json: {}", e)))?;

    // Only the message is truncated; hypotheses are short and must stay whole.
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            strategy: TruncationStrategy::OnlyFirst,
            ..Default::default()
        }))
        .map_err(|e| Error::model(format!("Failed to configure truncation: {}", e)))?;
    tokenizer.with_padding(None);

    Ok(tokenizer)
}

fn load_var_builder(weights: &WeightsFile, device: &Device) -> Result<VarBuilder<'static>> {
    match weights {
        WeightsFile::SafeTensors(path) => {
            // SAFETY: the weights file is memory-mapped read-only and not
            // modified while the ranker is alive.
            unsafe {
                VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device)
                    .map_err(|e| Error::model(format!("Failed to load weights: {}", e)))
            }
        }
        WeightsFile::PyTorch(path) => VarBuilder::from_pth(path, DType::F32, device)
            .map_err(|e| Error::model(format!("Failed to load weights: {}", e))),
    }
}

fn load_sequence_model(
    vb: &VarBuilder,
    config: &DebertaV2Config,
    id2label: Id2Label,
) -> Result<DebertaV2SeqClassificationModel> {
    // HF checkpoints nest the backbone under `deberta`; some exports do not.
    let attempts = [("deberta", vb.pp("deberta")), ("<root>", vb.clone())];

    let mut failures = Vec::with_capacity(attempts.len());
    for (label, vb) in attempts {
        match DebertaV2SeqClassificationModel::load(vb, config, Some(id2label.clone())) {
            Ok(model) => {
                tracing::info!("Loaded DeBERTa backbone from '{}'", label);
                return Ok(model);
            }
            Err(e) => failures.push(format!("{}: {}", label, e)),
        }
    }

    Err(Error::model(format!(
        "no DeBERTa sequence classifier found in checkpoint [{}]",
        failures.join(" | ")
    )))
}
