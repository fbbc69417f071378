//! Semantic similarity of column and table names.
//!
//! Names are embedded through a pluggable [`Embedder`] and compared with
//! cosine similarity. This catches relationships that naming rules miss
//! (`buyer_ref` → `customers.id`) and adds a diagnostic score to the ones
//! they find.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use inflector::Inflector;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{SchemaSnapshot, TypeCategory};

use super::inflection::singularize;
use crate::semantic::inference::RelationshipKey;

/// Default embedding dimension for [`HashingEmbedder`].
pub const DEFAULT_DIMENSION: usize = 256;

/// Errors from an embedding backend.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedder returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("embedder returned vectors of unequal length ({expected} vs {actual})")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding backend failed: {0}")]
    Backend(String),
}

/// Text embedding backend.
pub trait Embedder: Send + Sync {
    /// Embed every text into an equal-length vector, in input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Model identifier, for logs.
    fn model_name(&self) -> &str {
        "custom"
    }
}

/// Deterministic local embedder.
///
/// Splits a name into word tokens (snake_case, camelCase and spaces),
/// singularizes each token, and hashes its padded character trigrams into a
/// fixed number of signed buckets. Vectors are L2-normalized.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|part| !part.is_empty())
            .flat_map(|part| {
                part.to_snake_case()
                    .split('_')
                    .filter(|t| !t.is_empty())
                    .map(singularize)
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in Self::tokens(text) {
            let padded: Vec<char> = format!("#{token}#").chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                let digest = Sha256::digest(gram.as_bytes());
                let mut bucket = [0u8; 8];
                bucket.copy_from_slice(&digest[..8]);
                let idx = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
                let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
                vector[idx] += sign;
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Embedder for HashingEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn model_name(&self) -> &str {
        "hashing-trigram"
    }
}

/// Cosine similarity mapped to [0, 1] by clamping negatives to 0.
///
/// Zero vectors have no direction and score 0.
pub fn similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Builds semantic indexes for snapshots.
#[derive(Clone)]
pub struct SemanticScorer {
    embedder: Arc<dyn Embedder>,
    include_table_name: bool,
}

impl std::fmt::Debug for SemanticScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticScorer")
            .field("embedder", &self.embedder.model_name())
            .field("include_table_name", &self.include_table_name)
            .finish()
    }
}

impl SemanticScorer {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            include_table_name: true,
        }
    }

    /// Builder: whether source texts are prefixed with their table name.
    pub fn with_table_name(mut self, include: bool) -> Self {
        self.include_table_name = include;
        self
    }

    fn source_text(&self, table: &str, column: &str) -> String {
        let column = column.replace('_', " ");
        if self.include_table_name {
            format!("{} {}", table.replace('_', " "), column)
        } else {
            column
        }
    }

    fn target_text(table: &str, pk: &str) -> String {
        format!("{} {}", table.replace('_', " "), pk.replace('_', " "))
    }

    /// Embed every column and every single-PK table of the snapshot.
    ///
    /// All distinct texts go to the embedder in one batch. When the embedder
    /// fails the index is empty and marked failed, so every semantic score is
    /// absent.
    pub fn index(&self, snapshot: &SchemaSnapshot) -> SemanticIndex {
        let mut sources: Vec<((String, String), String)> = Vec::new();
        let mut targets: Vec<(String, String, TypeCategory, String)> = Vec::new();

        for table in snapshot.tables() {
            for column in &table.columns {
                sources.push((
                    (table.name.to_lowercase(), column.name.to_lowercase()),
                    self.source_text(&table.name, &column.name),
                ));
            }
            if let Some(pk) = table.sole_primary_key() {
                targets.push((
                    table.name.to_lowercase(),
                    pk.name.to_lowercase(),
                    pk.category,
                    Self::target_text(&table.name, &pk.name),
                ));
            }
        }

        let texts: Vec<String> = sources
            .iter()
            .map(|(_, text)| text.clone())
            .chain(targets.iter().map(|(_, _, _, text)| text.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let vectors = match self.embed_all(&texts) {
            Ok(vectors) => vectors,
            Err(err) => {
                warn!(
                    embedder = self.embedder.model_name(),
                    error = %err,
                    "embedding failed; continuing without semantic signal"
                );
                return SemanticIndex {
                    failure: Some(err.to_string()),
                    ..SemanticIndex::default()
                };
            }
        };

        let by_text: HashMap<&str, &Vec<f32>> =
            texts.iter().map(String::as_str).zip(vectors.iter()).collect();

        let sources = sources
            .iter()
            .filter_map(|(key, text)| by_text.get(text.as_str()).map(|v| (key.clone(), (*v).clone())))
            .collect();
        let targets = targets
            .iter()
            .filter_map(|(table, pk, category, text)| {
                by_text.get(text.as_str()).map(|v| {
                    (
                        table.clone(),
                        TargetEntry {
                            column: pk.clone(),
                            category: *category,
                            vector: (*v).clone(),
                        },
                    )
                })
            })
            .collect();

        debug!(texts = texts.len(), "built semantic index");
        SemanticIndex {
            sources,
            targets,
            failure: None,
        }
    }

    fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.embedder.embed_batch(texts)?;
        if vectors.len() != texts.len() {
            return Err(EmbedError::CountMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }
        let dim = vectors[0].len();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(EmbedError::DimensionMismatch {
                expected: dim,
                actual: bad.len(),
            });
        }
        Ok(vectors)
    }
}

#[derive(Debug, Clone)]
struct TargetEntry {
    column: String,
    category: TypeCategory,
    vector: Vec<f32>,
}

/// Embedded names of one snapshot.
#[derive(Debug, Clone, Default)]
pub struct SemanticIndex {
    sources: HashMap<(String, String), Vec<f32>>,
    targets: HashMap<String, TargetEntry>,
    failure: Option<String>,
}

impl SemanticIndex {
    /// Whether the embedder produced anything.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.targets.is_empty()
    }

    /// The embedder error, if embedding failed.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Similarity between a candidate's source column and target table.
    ///
    /// `None` when either side wasn't embedded (no single PK on the target,
    /// or the embedder failed).
    pub fn score(&self, key: &RelationshipKey) -> Option<f64> {
        let source = self
            .sources
            .get(&(key.from_table.clone(), key.from_column.clone()))?;
        let target = self.targets.get(&key.to_table)?;
        Some(similarity(source, &target.vector))
    }

    /// Semantic-only candidates scoring at least `floor`.
    ///
    /// Bare `id` columns, declared foreign keys and columns whose type can't
    /// hold a key are never sources; a table is never paired with itself. A
    /// primary key named after another table (`profiles.user_id`) is a source
    /// like any other column.
    pub fn proposals(&self, snapshot: &SchemaSnapshot, floor: f64) -> Vec<(RelationshipKey, f64)> {
        let mut out = Vec::new();

        for table in snapshot.tables() {
            for column in &table.columns {
                if column.name.eq_ignore_ascii_case("id") || column.is_declared_foreign_key() {
                    continue;
                }
                if matches!(
                    column.category,
                    TypeCategory::Boolean | TypeCategory::Timestamp | TypeCategory::Decimal
                ) {
                    continue;
                }
                let Some(source) = self
                    .sources
                    .get(&(table.name.to_lowercase(), column.name.to_lowercase()))
                else {
                    continue;
                };

                for (target_table, target) in &self.targets {
                    if target_table.eq_ignore_ascii_case(&table.name)
                        || !column.category.is_compatible_with(target.category)
                    {
                        continue;
                    }
                    let score = similarity(source, &target.vector);
                    if score >= floor {
                        out.push((
                            RelationshipKey::new(
                                &table.name,
                                &column.name,
                                target_table,
                                &target.column,
                            ),
                            score,
                        ));
                    }
                }
            }
        }

        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}
