//! Output types returned by the generation chains.

use serde::{Deserialize, Serialize};

/// Statistics for one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Approximate token count of the raw source (characters / 4).
    pub source_token_count: usize,
    /// Whether the source was condensed chunk-by-chunk before generation.
    pub chunked: bool,
    pub model: String,
    /// Prompt tokens across every model call, condensing included.
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub processing_time_ms: u64,
}

impl GenerationMetadata {
    pub(crate) fn add_usage(&mut self, input_tokens: usize, output_tokens: usize) {
        self.input_tokens += input_tokens;
        self.output_tokens += output_tokens;
    }
}

/// Theory and notebook pages for one lecture, both repaired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LectureOutput {
    pub theory: String,
    pub notebook: String,
    pub metadata: GenerationMetadata,
}

/// Summary and revision notes for one document, both repaired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentOutput {
    pub summary: String,
    pub points: String,
    /// The text the pages were generated from (condensed if the raw text
    /// was too long); follow-up questions are answered against it.
    pub source_text: String,
    pub metadata: GenerationMetadata,
}

/// A repaired answer to a question about a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    pub metadata: GenerationMetadata,
}

/// Material kept for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StudyMaterial {
    Lecture {
        theory: String,
        notebook: String,
    },
    Document {
        summary: String,
        points: String,
        source_text: String,
    },
}

impl From<&LectureOutput> for StudyMaterial {
    fn from(out: &LectureOutput) -> Self {
        StudyMaterial::Lecture {
            theory: out.theory.clone(),
            notebook: out.notebook.clone(),
        }
    }
}

impl From<&DocumentOutput> for StudyMaterial {
    fn from(out: &DocumentOutput) -> Self {
        StudyMaterial::Document {
            summary: out.summary.clone(),
            points: out.points.clone(),
            source_text: out.source_text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_is_tagged_by_kind() {
        let m = StudyMaterial::Lecture {
            theory: "t".into(),
            notebook: "n".into(),
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["kind"], "lecture");
        assert_eq!(json["theory"], "t");
    }

    #[test]
    fn test_add_usage_accumulates() {
        let mut meta = GenerationMetadata::default();
        meta.add_usage(10, 3);
        meta.add_usage(5, 2);
        assert_eq!((meta.input_tokens, meta.output_tokens), (15, 5));
    }
}
