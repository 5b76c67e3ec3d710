use crate::chunker::Chunker;
use crate::core::config::Config;
use crate::core::error::DetectorError;
use crate::core::types::{Chunk, ElementType};
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone)]
struct RawElement {
    element_type: ElementType,
    text: String,
}

#[derive(Debug, Clone)]
pub struct PdfMetadata {
    pub filename: String,
    pub filetype: String,
    pub first_page_number: Option<u32>,
}

pub struct PdfProcessResult {
    pub title: String,
    pub total_pages: u32,
    pub total_elements: usize,
    pub chunks: Vec<Chunk>,
    pub processing_ms: u64,
    pub metadata: PdfMetadata,
}

const TITLE_TYPES: [ElementType; 2] = [ElementType::Title, ElementType::Header];
const SKIP_TYPES: [ElementType; 1] = [ElementType::Footer];

pub struct PdfExtractor<'a> {
    config: &'a Config,
}

impl<'a> PdfExtractor<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Extracts raw text on a blocking thread (pdf-extract performs CPU-bound
    /// parsing and can panic on corrupted PDFs, so the call is wrapped in
    /// `catch_unwind`), then classifies it into typed elements, groups them
    /// into sections, and re-chunks oversized sections.
    pub async fn process(&self, file_path: &Path, document_id: &str) -> Result<PdfProcessResult, DetectorError> {
        let start = Instant::now();
        let path = file_path.to_path_buf();
        let raw_text = tokio::task::spawn_blocking(move || {
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                pdf_extract::extract_text(&path)
            }))
        })
        .await
        .map_err(|e| DetectorError::Dependency(format!("pdf extraction task panicked: {}", e)))?
        .map_err(|_| DetectorError::DataCorruption("pdf extraction panicked".to_string()))?
        .map_err(|e| DetectorError::DataCorruption(format!("failed to extract pdf text: {}", e)))?;

        let elements = classify_elements(&raw_text);
        let total_elements = elements.len();
        let total_pages = 1 + elements
            .iter()
            .filter(|e| e.element_type == ElementType::PageBreak)
            .count() as u32;

        let title = elements
            .iter()
            .find(|e| e.element_type == ElementType::Title && e.text.trim().chars().count() > 3)
            .map(|e| e.text.trim().to_string())
            .unwrap_or_else(|| {
                file_path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("document")
                    .to_string()
            });

        let sections = group_into_sections(&elements);
        let chunks = self.sections_to_chunks(document_id, &sections);

        let metadata = PdfMetadata {
            filename: file_path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string(),
            filetype: "application/pdf".to_string(),
            first_page_number: if total_pages > 0 { Some(1) } else { None },
        };

        Ok(PdfProcessResult {
            title,
            total_pages,
            total_elements,
            chunks,
            processing_ms: start.elapsed().as_millis() as u64,
            metadata,
        })
    }

    fn sections_to_chunks(&self, document_id: &str, sections: &[Section]) -> Vec<Chunk> {
        let chunker = Chunker::new(self.config);
        let mut chunks = Vec::new();
        let mut k = 0usize;

        for section in sections {
            let normalized = crate::chunker::normalize(&section.content);
            let word_count = normalized.split_whitespace().count();

            if word_count <= self.config.chunk_size {
                chunks.push(Chunk {
                    chunk_id: format!("{}_chunk_{}", document_id, k),
                    document_id: document_id.to_string(),
                    position: k,
                    embedding: Vec::new(),
                    text: normalized,
                    word_count,
                    section_title: Some(section.title.clone()),
                    element_type: Some(section.element_type.clone()),
                    metadata: Default::default(),
                    created_at: chrono::Utc::now(),
                });
                k += 1;
            } else {
                let sub_chunks = chunker.chunk_text("placeholder", &section.content);
                let n = sub_chunks.len();
                for (i, mut sub) in sub_chunks.into_iter().enumerate() {
                    sub.chunk_id = format!("{}_chunk_{}", document_id, k);
                    sub.document_id = document_id.to_string();
                    sub.position = k;
                    sub.section_title = Some(if n > 1 {
                        format!("{} (part {}/{})", section.title, i + 1, n)
                    } else {
                        section.title.clone()
                    });
                    sub.element_type = Some(section.element_type.clone());
                    chunks.push(sub);
                    k += 1;
                }
            }
        }
        chunks
    }
}

struct Section {
    title: String,
    element_type: ElementType,
    content: String,
}

/// Two-state machine (`awaitingTitle`, `buildingSection`) driven by element
/// type, with an explicit `flush` step rather than implicit list mutation.
fn group_into_sections(elements: &[RawElement]) -> Vec<Section> {
    enum State {
        AwaitingTitle,
        BuildingSection,
    }

    let mut sections = Vec::new();
    let mut state = State::AwaitingTitle;
    let mut current_title = "Introduction".to_string();
    let mut current_parts: Vec<String> = Vec::new();
    let mut current_element_types: Vec<ElementType> = Vec::new();

    let flush = |sections: &mut Vec<Section>,
                 title: &str,
                 parts: &[String],
                 types: &[ElementType]| {
        if parts.is_empty() {
            return;
        }
        let content = parts.join("\n\n");
        let element_type = dominant_type(types);
        sections.push(Section {
            title: title.to_string(),
            element_type,
            content,
        });
    };

    for element in elements {
        if SKIP_TYPES.contains(&element.element_type) {
            continue;
        }
        if element.element_type == ElementType::PageBreak {
            continue;
        }

        let is_title = TITLE_TYPES.contains(&element.element_type);
        match state {
            State::AwaitingTitle => {
                if is_title {
                    current_title = element.text.trim().to_string();
                    state = State::BuildingSection;
                } else {
                    current_parts.push(element.text.clone());
                    current_element_types.push(element.element_type.clone());
                    state = State::BuildingSection;
                }
            }
            State::BuildingSection => {
                if is_title {
                    flush(&mut sections, &current_title, &current_parts, &current_element_types);
                    current_title = element.text.trim().to_string();
                    current_parts = Vec::new();
                    current_element_types = Vec::new();
                } else {
                    current_parts.push(element.text.clone());
                    current_element_types.push(element.element_type.clone());
                }
            }
        }
    }
    flush(&mut sections, &current_title, &current_parts, &current_element_types);

    sections
}

/// Mode of the contained element types, ties broken by first occurrence.
/// Single-type sections keep that type; mixed sections are labeled `Mixed`.
fn dominant_type(types: &[ElementType]) -> ElementType {
    if types.is_empty() {
        return ElementType::Text;
    }
    let first = &types[0];
    if types.iter().all(|t| t == first) {
        return first.clone();
    }

    let mut counts: Vec<(ElementType, usize)> = Vec::new();
    for t in types {
        if let Some(entry) = counts.iter_mut().find(|(ty, _)| ty == t) {
            entry.1 += 1;
        } else {
            counts.push((t.clone(), 1));
        }
    }
    let max_count = counts.iter().map(|(_, c)| *c).max().unwrap_or(0);
    let modal: Vec<&ElementType> = counts
        .iter()
        .filter(|(_, c)| *c == max_count)
        .map(|(t, _)| t)
        .collect();
    if modal.len() == 1 {
        modal[0].clone()
    } else {
        ElementType::Mixed
    }
}

/// `pdf-extract` only returns raw text, so elements are recovered with
/// line-level heuristics: blank-line-delimited blocks; a short, unpunctuated
/// line followed by content is a title/header; lines dominated by
/// tab/column-like whitespace runs are tables; bullet/numbered lines are list
/// items; form-feed bytes mark page breaks.
fn classify_elements(raw_text: &str) -> Vec<RawElement> {
    let mut elements = Vec::new();
    for page in raw_text.split('\x0c') {
        for block in page.split("\n\n") {
            let trimmed = block.trim();
            if trimmed.is_empty() {
                continue;
            }
            elements.push(RawElement {
                element_type: classify_block(trimmed),
                text: trimmed.to_string(),
            });
        }
        elements.push(RawElement {
            element_type: ElementType::PageBreak,
            text: String::new(),
        });
    }
    // Drop the trailing synthetic page break (no content follows it).
    if matches!(elements.last(), Some(e) if e.element_type == ElementType::PageBreak) {
        elements.pop();
    }
    elements
}

fn classify_block(block: &str) -> ElementType {
    let lines: Vec<&str> = block.lines().collect();
    let first_line = lines[0].trim();

    let looks_like_heading = lines.len() == 1
        && first_line.chars().count() < 90
        && !first_line.ends_with('.')
        && first_line.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);
    if looks_like_heading {
        return ElementType::Title;
    }

    let bullet_marker = first_line.starts_with('-')
        || first_line.starts_with('•')
        || first_line.starts_with('*')
        || first_line
            .split('.')
            .next()
            .map(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false);
    if bullet_marker {
        return ElementType::ListItem;
    }

    let table_like = lines.len() > 1
        && lines
            .iter()
            .filter(|l| l.contains('\t') || l.matches("  ").count() >= 2 || l.contains('|'))
            .count()
            >= lines.len() / 2;
    if table_like {
        return ElementType::Table;
    }

    ElementType::NarrativeText
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominant_type_is_mode_with_first_occurrence_tiebreak() {
        let types = vec![ElementType::NarrativeText, ElementType::ListItem, ElementType::NarrativeText];
        assert_eq!(dominant_type(&types), ElementType::NarrativeText);
    }

    #[test]
    fn dominant_type_labels_even_split_as_mixed() {
        let types = vec![ElementType::NarrativeText, ElementType::ListItem];
        assert_eq!(dominant_type(&types), ElementType::Mixed);
    }

    #[test]
    fn classify_elements_marks_page_breaks() {
        let raw = "Title\n\nSome body text here.\x0cMore text on page two.";
        let elements = classify_elements(raw);
        assert!(elements.iter().any(|e| e.element_type == ElementType::PageBreak));
    }

    #[test]
    fn grouping_defaults_to_introduction_when_no_leading_title() {
        let elements = vec![RawElement {
            element_type: ElementType::NarrativeText,
            text: "Body text with no preceding title.".to_string(),
        }];
        let sections = group_into_sections(&elements);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Introduction");
    }

    #[test]
    fn grouping_flushes_on_next_title() {
        let elements = vec![
            RawElement {
                element_type: ElementType::Title,
                text: "Chapter One".to_string(),
            },
            RawElement {
                element_type: ElementType::NarrativeText,
                text: "Some content.".to_string(),
            },
            RawElement {
                element_type: ElementType::Title,
                text: "Chapter Two".to_string(),
            },
            RawElement {
                element_type: ElementType::NarrativeText,
                text: "More content.".to_string(),
            },
        ];
        let sections = group_into_sections(&elements);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "Chapter One");
        assert_eq!(sections[1].title, "Chapter Two");
    }
}
