//! Piper binding for the [`SpeechEngine`](crate::SpeechEngine) seam.
//!
//! The engine is a process-wide resource: models are expensive to load, so
//! one [`PiperEngine`] is built at startup from a voices mapfile and shared
//! by reference across requests. Loaded synthesizers are cached per config
//! path with a small LRU-style bound.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use anyhow::Context;
use dashmap::DashMap;
use piper_rs::synth::{PiperSpeechStreamParallel, PiperSpeechSynthesizer};
use tracing::debug;

use crate::error::AudioError;
use crate::{FrameSink, SpeechEngine, StreamRequest, SAMPLE_RATE};

struct CachedSynth {
    synth: Arc<RwLock<PiperSpeechSynthesizer>>,
    last_accessed: Instant,
}

pub struct PiperEngine {
    // voice id -> model config path
    voices: HashMap<String, String>,
    cache: DashMap<String, CachedSynth>,
    max_cache_size: usize,
}

impl PiperEngine {
    /// Create from a prebuilt voice map.
    pub fn new(voices: HashMap<String, String>) -> Self {
        Self {
            voices,
            cache: DashMap::new(),
            max_cache_size: 4,
        }
    }

    /// Load the voice map from a JSON file of `{ "voice_id": "config path" }`.
    pub fn from_mapfile<P: AsRef<Path>>(p: P) -> anyhow::Result<Self> {
        let text = fs::read_to_string(p.as_ref())
            .with_context(|| format!("Failed to load {}", p.as_ref().display()))?;
        let json: serde_json::Value =
            serde_json::from_str(&text).with_context(|| "voices mapfile is not valid JSON")?;

        let obj = json
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("voices mapfile must be a JSON object"))?;

        let mut voices = HashMap::new();
        for (voice, v) in obj {
            let config = v
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("invalid entry for voice {voice} (expected a config path string)"))?;
            voices.insert(voice.clone(), config.to_string());
        }

        Ok(Self::new(voices))
    }

    fn config_for(&self, voice: &str) -> Result<String, AudioError> {
        self.voices.get(voice).cloned().ok_or_else(|| {
            let mut known: Vec<&str> = self.voices.keys().map(String::as_str).collect();
            known.sort_unstable();
            AudioError::Configuration(format!(
                "unknown voice '{voice}'. Available voices: {}",
                known.join(", ")
            ))
        })
    }

    /// Read sample rate from a model config JSON.
    fn read_sample_rate<P: AsRef<Path>>(cfg_path: P) -> anyhow::Result<u32> {
        let text = fs::read_to_string(cfg_path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", cfg_path.as_ref().display()))?;
        let json: serde_json::Value =
            serde_json::from_str(&text).with_context(|| "Config file is not valid JSON")?;

        let sample_rate = json
            .get("audio")
            .and_then(|a| a.get("sample_rate"))
            .and_then(|sr| sr.as_u64())
            .ok_or_else(|| anyhow::anyhow!("Missing or invalid 'audio.sample_rate' in config"))?;

        Ok(sample_rate as u32)
    }

    /// Get or load the synthesizer for a config path.
    fn synth_for(&self, cfg_path: &str) -> anyhow::Result<Arc<RwLock<PiperSpeechSynthesizer>>> {
        if let Some(mut cached) = self.cache.get_mut(cfg_path) {
            cached.last_accessed = Instant::now();
            return Ok(cached.synth.clone());
        }

        let sample_rate = Self::read_sample_rate(cfg_path)?;
        if sample_rate != SAMPLE_RATE {
            return Err(anyhow::anyhow!(
                "model at {cfg_path} runs at {sample_rate} Hz, pipeline requires {SAMPLE_RATE} Hz"
            ));
        }

        debug!("loading piper model from {cfg_path}");
        let model = piper_rs::from_config_path(Path::new(cfg_path))
            .map_err(|e| anyhow::anyhow!("piper load error: {e}"))?;
        let synth = Arc::new(RwLock::new(PiperSpeechSynthesizer::new(model)?));

        // Evict the least recently used entry once the cache is full.
        if self.cache.len() >= self.max_cache_size {
            let mut oldest_key: Option<String> = None;
            let mut oldest_time = Instant::now();
            for entry in self.cache.iter() {
                if entry.last_accessed < oldest_time {
                    oldest_time = entry.last_accessed;
                    oldest_key = Some(entry.key().clone());
                }
            }
            if let Some(key) = oldest_key {
                self.cache.remove(&key);
            }
        }

        self.cache.insert(
            cfg_path.to_string(),
            CachedSynth {
                synth: synth.clone(),
                last_accessed: Instant::now(),
            },
        );

        Ok(synth)
    }
}

impl SpeechEngine for PiperEngine {
    fn voices(&self) -> Vec<String> {
        let mut voices: Vec<String> = self.voices.keys().cloned().collect();
        voices.sort();
        voices
    }

    fn synthesize(&self, request: &StreamRequest, out: &FrameSink) -> Result<(), AudioError> {
        let cfg_path = self.config_for(&request.voice)?;
        let synth = self.synth_for(&cfg_path).map_err(AudioError::Synthesis)?;
        let synth = synth.read().map_err(|_| {
            AudioError::Synthesis(anyhow::anyhow!(
                "synthesizer lock poisoned by an earlier panic"
            ))
        })?;

        // This piper-rs version exposes neither speaker nor rate control,
        // so `speed` is validated upstream but not applied here.
        let parts: PiperSpeechStreamParallel = synth
            .synthesize_parallel(request.text.clone(), None)
            .map_err(|e| AudioError::Synthesis(anyhow::anyhow!("piper synth error: {e}")))?;

        for part in parts {
            let frame = part
                .map_err(|e| AudioError::Synthesis(anyhow::anyhow!("chunk error: {e}")))?
                .into_vec();
            if !out.send(frame) {
                debug!("consumer gone, stopping synthesis early");
                return Ok(());
            }
        }
        Ok(())
    }
}
