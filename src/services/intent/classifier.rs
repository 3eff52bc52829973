use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::IntentModel;
use crate::models::{Intent, IntentMatch};
use crate::services::text::TextNormalizer;

const EMBEDDED_CORPUS: &str = include_str!("../../../data/intents.json");

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("training corpus has no usable examples")]
    EmptyCorpus,

    #[error("model has no classes")]
    Untrained,

    #[error("model file is malformed: {0}")]
    Malformed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Labelled example utterances, one list per intent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainingCorpus {
    pub examples: BTreeMap<String, Vec<String>>,
}

impl TrainingCorpus {
    pub fn embedded() -> Result<Self, ClassifierError> {
        Ok(serde_json::from_str(EMBEDDED_CORPUS)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ClassifierError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Examples paired with their parsed labels; unknown labels are skipped.
    fn labelled(&self) -> Vec<(Intent, &str)> {
        let mut out = Vec::new();
        for (label, examples) in &self.examples {
            let intent = Intent::parse(label);
            if intent == Intent::Unknown && label != "unknown" {
                tracing::warn!(label = %label, "skipping unknown intent label in corpus");
                continue;
            }
            out.extend(examples.iter().map(|e| (intent, e.as_str())));
        }
        out
    }
}

pub type SparseVector = Vec<(usize, f64)>;

pub fn dot(a: &SparseVector, b: &SparseVector) -> f64 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

fn ngrams(text: &str, max_n: usize) -> Vec<String> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut grams = Vec::new();
    for n in 1..=max_n {
        for window in tokens.windows(n) {
            grams.push(window.join(" "));
        }
    }
    grams
}

/// TF-IDF weighting over word n-grams with a fixed vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    max_ngram: usize,
    sublinear_tf: bool,
}

impl TfidfVectorizer {
    /// Fits on already-normalised documents, keeping at most `max_features`
    /// terms ranked by corpus frequency.
    pub fn fit(documents: &[String], max_ngram: usize, max_features: usize, sublinear_tf: bool) -> Self {
        let mut term_freq: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in documents {
            let grams = ngrams(doc, max_ngram);
            for gram in &grams {
                *term_freq.entry(gram.clone()).or_default() += 1;
            }
            let mut unique = grams;
            unique.sort();
            unique.dedup();
            for gram in unique {
                *doc_freq.entry(gram).or_default() += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = term_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(max_features);
        let mut terms: Vec<String> = ranked.into_iter().map(|(term, _)| term).collect();
        terms.sort();

        let n = documents.len() as f64;
        let idf = terms
            .iter()
            .map(|t| {
                let df = doc_freq.get(t).copied().unwrap_or(0) as f64;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();
        let vocabulary = terms.into_iter().enumerate().map(|(i, t)| (t, i)).collect();

        Self {
            vocabulary,
            idf,
            max_ngram,
            sublinear_tf,
        }
    }

    pub fn len(&self) -> usize {
        self.idf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idf.is_empty()
    }

    /// L2-normalised sparse vector, sorted by feature index.
    pub fn transform(&self, document: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for gram in ngrams(document, self.max_ngram) {
            if let Some(&idx) = self.vocabulary.get(&gram) {
                *counts.entry(idx).or_default() += 1.0;
            }
        }
        let mut vector: SparseVector = counts
            .into_iter()
            .map(|(idx, count)| {
                let tf = if self.sublinear_tf { 1.0 + count.ln() } else { count };
                (idx, tf * self.idf[idx])
            })
            .collect();
        let norm = vector.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in vector.iter_mut() {
                *v /= norm;
            }
        }
        vector
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrainingParams {
    pub epochs: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub seed: u64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            epochs: 200,
            learning_rate: 0.5,
            weight_decay: 1e-3,
            seed: 42,
        }
    }
}

/// Multinomial logistic regression over sparse features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftmaxModel {
    labels: Vec<Intent>,
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

impl SoftmaxModel {
    pub fn train(
        samples: &[(SparseVector, usize)],
        labels: Vec<Intent>,
        n_features: usize,
        params: TrainingParams,
    ) -> Self {
        let n_classes = labels.len();
        let mut model = Self {
            labels,
            weights: vec![vec![0.0; n_features]; n_classes],
            bias: vec![0.0; n_classes],
        };

        // balanced class weights: n_samples / (n_classes * class_count)
        let mut class_counts = vec![0usize; n_classes];
        for (_, y) in samples {
            class_counts[*y] += 1;
        }
        let class_weight: Vec<f64> = class_counts
            .iter()
            .map(|&c| {
                if c == 0 {
                    0.0
                } else {
                    samples.len() as f64 / (n_classes as f64 * c as f64)
                }
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut order: Vec<usize> = (0..samples.len()).collect();
        let lr = params.learning_rate;

        for _ in 0..params.epochs {
            order.shuffle(&mut rng);
            for &i in &order {
                let (x, y) = &samples[i];
                let probs = model.probabilities(x);
                for (c, p) in probs.iter().enumerate() {
                    let target = if c == *y { 1.0 } else { 0.0 };
                    let grad = class_weight[*y] * (p - target);
                    model.bias[c] -= lr * grad;
                    for &(j, v) in x {
                        model.weights[c][j] -= lr * grad * v;
                    }
                }
            }
            let decay = 1.0 - lr * params.weight_decay;
            for row in model.weights.iter_mut() {
                for w in row.iter_mut() {
                    *w *= decay;
                }
            }
        }
        model
    }

    pub fn probabilities(&self, x: &SparseVector) -> Vec<f64> {
        let logits: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| b + x.iter().map(|&(j, v)| row.get(j).copied().unwrap_or(0.0) * v).sum::<f64>())
            .collect();
        let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f64 = exps.iter().sum();
        exps.into_iter().map(|e| e / total).collect()
    }
}

/// Trained statistical intent model: vectoriser plus softmax classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentClassifier {
    vectorizer: TfidfVectorizer,
    model: SoftmaxModel,
}

impl IntentClassifier {
    pub fn train(corpus: &TrainingCorpus, normalizer: &TextNormalizer) -> Result<Self, ClassifierError> {
        Self::train_with(corpus, normalizer, TrainingParams::default())
    }

    pub fn train_with(
        corpus: &TrainingCorpus,
        normalizer: &TextNormalizer,
        params: TrainingParams,
    ) -> Result<Self, ClassifierError> {
        let labelled = corpus.labelled();
        if labelled.is_empty() {
            return Err(ClassifierError::EmptyCorpus);
        }

        let mut labels: Vec<Intent> = labelled.iter().map(|(i, _)| *i).collect();
        labels.sort();
        labels.dedup();

        let documents: Vec<String> = labelled.iter().map(|(_, t)| normalizer.normalize(t)).collect();
        let vectorizer = TfidfVectorizer::fit(&documents, 2, 1000, true);
        if vectorizer.is_empty() {
            return Err(ClassifierError::EmptyCorpus);
        }

        let samples: Vec<(SparseVector, usize)> = documents
            .iter()
            .zip(&labelled)
            .filter_map(|(doc, (intent, _))| {
                let y = labels.iter().position(|l| l == intent)?;
                Some((vectorizer.transform(doc), y))
            })
            .collect();

        let model = SoftmaxModel::train(&samples, labels, vectorizer.len(), params);
        tracing::info!(
            examples = samples.len(),
            features = vectorizer.len(),
            classes = model.labels.len(),
            "intent classifier trained"
        );
        Ok(Self { vectorizer, model })
    }

    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let raw = std::fs::read_to_string(path)?;
        let classifier: Self = serde_json::from_str(&raw)?;
        classifier.check()?;
        Ok(classifier)
    }

    pub fn save(&self, path: &Path) -> Result<(), ClassifierError> {
        std::fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    /// Loads a persisted model if it is readable, otherwise trains one and
    /// writes it back to `path`.
    pub fn load_or_train(
        path: Option<&Path>,
        corpus: &TrainingCorpus,
        normalizer: &TextNormalizer,
    ) -> Result<Self, ClassifierError> {
        if let Some(path) = path {
            if path.exists() {
                match Self::load(path) {
                    Ok(classifier) => {
                        tracing::info!(path = %path.display(), "loaded intent model");
                        return Ok(classifier);
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "intent model unreadable, retraining");
                    }
                }
            }
        }

        let classifier = Self::train(corpus, normalizer)?;
        if let Some(path) = path {
            if let Err(e) = classifier.save(path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to persist intent model");
            }
        }
        Ok(classifier)
    }

    fn check(&self) -> Result<(), ClassifierError> {
        let model = &self.model;
        if model.labels.is_empty() {
            return Err(ClassifierError::Untrained);
        }
        if model.weights.len() != model.labels.len()
            || model.bias.len() != model.labels.len()
            || model.weights.iter().any(|row| row.len() != self.vectorizer.len())
        {
            return Err(ClassifierError::Malformed(
                "weight dimensions do not match vocabulary".to_string(),
            ));
        }
        Ok(())
    }

    pub fn labels(&self) -> &[Intent] {
        &self.model.labels
    }
}

impl IntentModel for IntentClassifier {
    fn predict(&self, normalized: &str) -> Result<IntentMatch, ClassifierError> {
        self.check()?;
        let x = self.vectorizer.transform(normalized);
        let probs = self.model.probabilities(&x);
        let (best, confidence) = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .ok_or(ClassifierError::Untrained)?;
        if !confidence.is_finite() {
            return Err(ClassifierError::Malformed("non-finite probability".to_string()));
        }
        Ok(IntentMatch::new(self.model.labels[best], *confidence))
    }
}
