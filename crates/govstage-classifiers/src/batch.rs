//! Batch orchestration over a JSON Lines stream
//!
//! Records are processed one at a time in arrival order:
//! - empty text resolves to `other` / 0.0 without touching rules or model
//! - otherwise the rule matcher runs first, the fallback only on a miss
//!
//! Input is drained into fixed-size chunks. After each chunk the working
//! set is released and the ranker gets a release hint, which bounds peak
//! memory when inference holds large intermediate state.

use crate::fallback::{FallbackClassifier, FallbackOutcome};
use crate::framing::{decode_line, encode_result, encode_stage_only};
use crate::rules::RuleMatcher;
use govstage_core::{
    ClassificationRequest, ClassificationResult, Error, Resolution, Result, UNKNOWN_REQUEST_ID,
};
use std::fmt;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Run-level counters, reported at end of run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Results emitted
    pub processed: u64,
    /// Results resolved by a pattern rule
    pub matched_by_rule: u64,
    /// Results resolved by the NLI fallback
    pub matched_by_fallback: u64,
    /// Empty-text or degraded-fallback results
    pub defaulted: u64,
    /// Malformed input lines skipped
    pub skipped: u64,
}

impl RunStats {
    /// Count one emitted result
    pub fn record(&mut self, result: &ClassificationResult) {
        self.processed += 1;
        match result.resolution {
            Resolution::Rule => self.matched_by_rule += 1,
            Resolution::Fallback => self.matched_by_fallback += 1,
            Resolution::Default => self.defaulted += 1,
        }
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} rule={} fallback={} defaulted={} skipped={}",
            self.processed,
            self.matched_by_rule,
            self.matched_by_fallback,
            self.defaulted,
            self.skipped
        )
    }
}

/// Drives rule matching and fallback ranking over request streams
pub struct BatchOrchestrator {
    rules: RuleMatcher,
    fallback: FallbackClassifier,
    chunk_size: usize,
    stats: RunStats,
}

impl BatchOrchestrator {
    /// Create a new orchestrator; `chunk_size` must be at least 1
    pub fn new(rules: RuleMatcher, fallback: FallbackClassifier, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::config("chunk size must be at least 1"));
        }

        Ok(Self {
            rules,
            fallback,
            chunk_size,
            stats: RunStats::default(),
        })
    }

    /// Classify one request. Never fails; faults resolve to `other` / 0.0.
    pub async fn classify_one(&self, request: &ClassificationRequest) -> ClassificationResult {
        let text = request.text.trim();
        if text.is_empty() {
            debug!(id = %request.id, "empty text, defaulting to other");
            return ClassificationResult::default_for(&request.id);
        }

        if let Some(hit) = self.rules.match_text(text) {
            debug!(
                id = %request.id,
                rule = hit.rule_name,
                stage = %hit.stage,
                "rule hit"
            );
            return ClassificationResult::new(
                &request.id,
                hit.stage,
                hit.confidence,
                Resolution::Rule,
            );
        }

        match self.fallback.classify(text).await {
            FallbackOutcome::Ranked { stage, confidence } => {
                debug!(id = %request.id, stage = %stage, confidence, "fallback ranked");
                ClassificationResult::new(&request.id, stage, confidence, Resolution::Fallback)
            }
            FallbackOutcome::Degraded { reason } => {
                warn!(id = %request.id, %reason, "fallback classification failed, defaulting to other");
                ClassificationResult::default_for(&request.id)
            }
        }
    }

    /// Classify every line of `reader`, writing one result line per
    /// well-formed request to `writer` in input order. Counters start from
    /// zero on every run.
    pub async fn run<R, W>(&mut self, reader: R, mut writer: W) -> Result<RunStats>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let start = Instant::now();
        self.stats = RunStats::default();
        let mut reader = reader;
        let mut line = Vec::new();
        let mut line_number: u64 = 0;
        let mut chunk: Vec<ClassificationRequest> = Vec::with_capacity(self.chunk_size);

        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await? == 0 {
                break;
            }
            line_number += 1;

            match decode_line(&line) {
                Ok(Some(request)) => {
                    chunk.push(request);
                    if chunk.len() >= self.chunk_size {
                        self.process_chunk(&mut chunk, &mut writer).await?;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(line = line_number, error = %e, "skipping malformed input line");
                    self.stats.skipped += 1;
                }
            }
        }

        if !chunk.is_empty() {
            self.process_chunk(&mut chunk, &mut writer).await?;
        }
        writer.flush().await?;

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Run complete: {}", self.stats
        );
        Ok(self.stats.clone())
    }

    /// Classify all of `reader` as one message and write a single
    /// `{"stage", "confidence"}` line. Invalid UTF-8 is decoded lossily.
    pub async fn run_single<R, W>(&self, mut reader: R, mut writer: W) -> Result<ClassificationResult>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut input = Vec::new();
        reader.read_to_end(&mut input).await?;
        let text = String::from_utf8_lossy(&input);

        let request = ClassificationRequest::new(UNKNOWN_REQUEST_ID, text.trim());
        let result = self.classify_one(&request).await;

        writer
            .write_all(&encode_stage_only(result.stage, result.confidence)?)
            .await?;
        writer.flush().await?;
        Ok(result)
    }

    async fn process_chunk<W>(
        &mut self,
        chunk: &mut Vec<ClassificationRequest>,
        writer: &mut W,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let size = chunk.len();
        for request in chunk.drain(..) {
            let result = self.classify_one(&request).await;
            self.stats.record(&result);

            writer.write_all(&encode_result(&result)?).await?;
            writer.flush().await?;
        }

        chunk.shrink_to(self.chunk_size);
        self.fallback.release();
        debug!(size, "chunk processed, working set released");
        Ok(())
    }

    /// Counters accumulated so far
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}
