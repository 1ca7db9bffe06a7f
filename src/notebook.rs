//! Notebook assembly and Jupyter (`.ipynb`) export.
//!
//! A generated notebook always opens with the same three narrative cells: a
//! title, the full theory page for reference, and a separator. The cells
//! segmented from the notebook page follow in source order.
//!
//! The on-disk format is nbformat 4.5 JSON with keys in sorted order and
//! one-space indentation, the same bytes Jupyter itself writes.

use crate::error::Lecture2CodeError;
use crate::pipeline::segment::{segment, Cell};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Content of the first cell.
pub const TITLE_CELL: &str = "# Lecture2Code — Generated Notebook\n\n---";
/// Label prepended to the theory page in the second cell.
pub const THEORY_HEADING: &str = "## Theory Reference\n\n";
/// Content of the third cell.
pub const SEPARATOR_CELL: &str = "---\n\n## Interactive Notebook";

/// Execution environment the exported notebook targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelSpec {
    pub name: &'static str,
    pub display_name: &'static str,
    pub language: &'static str,
    pub language_version: &'static str,
}

/// The only kernel this system generates code for.
pub const PYTHON3: KernelSpec = KernelSpec {
    name: "python3",
    display_name: "Python 3",
    language: "python",
    language_version: "3.11.0",
};

/// An assembled notebook: three prologue cells, then the segmented notebook page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookDocument {
    cells: Vec<Cell>,
    kernel: KernelSpec,
}

impl NotebookDocument {
    /// Number of fixed cells before the segmented content.
    pub const PROLOGUE_LEN: usize = 3;

    /// Build the notebook from an already-repaired theory page and notebook page.
    ///
    /// The theory text is embedded verbatim; only the notebook text is segmented.
    pub fn assemble(theory: &str, notebook: &str) -> Self {
        let mut cells = vec![
            Cell::Narrative(TITLE_CELL.to_string()),
            Cell::Narrative(format!("{THEORY_HEADING}{theory}")),
            Cell::Narrative(SEPARATOR_CELL.to_string()),
        ];
        cells.extend(segment(notebook));
        debug!(
            "Assembled notebook: {} cells ({} segmented)",
            cells.len(),
            cells.len() - Self::PROLOGUE_LEN
        );

        Self {
            cells,
            kernel: PYTHON3,
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Cells produced by segmenting the notebook page.
    pub fn segmented_cells(&self) -> &[Cell] {
        &self.cells[Self::PROLOGUE_LEN..]
    }

    pub fn kernel(&self) -> &KernelSpec {
        &self.kernel
    }

    /// Serialise to `.ipynb` bytes.
    ///
    /// # Errors
    /// [`Lecture2CodeError::ExportFailed`] if the serializer rejects the
    /// document. Re-running with the same input fails the same way.
    pub fn to_ipynb(&self) -> Result<Vec<u8>, Lecture2CodeError> {
        let ipynb = Ipynb {
            cells: self.cells.iter().map(IpynbCell::from_cell).collect(),
            metadata: IpynbMetadata {
                kernelspec: IpynbKernelSpec {
                    display_name: self.kernel.display_name,
                    language: self.kernel.language,
                    name: self.kernel.name,
                },
                language_info: IpynbLanguageInfo {
                    name: self.kernel.language,
                    version: self.kernel.language_version,
                },
            },
            nbformat: 4,
            nbformat_minor: 5,
        };

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        ipynb.serialize(&mut ser)?;
        buf.push(b'\n');
        Ok(buf)
    }

    /// Write the `.ipynb` file atomically (temp file in the same directory,
    /// then rename) so a failed export never leaves a truncated notebook.
    pub fn write_ipynb(&self, path: impl AsRef<Path>) -> Result<usize, Lecture2CodeError> {
        let path = path.as_ref();
        let bytes = self.to_ipynb()?;
        let write_err = |source: std::io::Error| Lecture2CodeError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(write_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(&bytes).map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;

        info!("Wrote notebook: {} ({} bytes)", path.display(), bytes.len());
        Ok(bytes.len())
    }
}

/// Assemble and serialise in one step.
pub fn export_notebook(theory: &str, notebook: &str) -> Result<Vec<u8>, Lecture2CodeError> {
    NotebookDocument::assemble(theory, notebook).to_ipynb()
}

// ── nbformat v4 wire types ───────────────────────────────────────────────────
//
// Field order is alphabetical so the output matches nbformat's sort_keys.

#[derive(Serialize)]
struct Ipynb<'a> {
    cells: Vec<IpynbCell>,
    metadata: IpynbMetadata<'a>,
    nbformat: u32,
    nbformat_minor: u32,
}

#[derive(Serialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
enum IpynbCell {
    Code {
        execution_count: Option<u32>,
        id: String,
        metadata: serde_json::Map<String, serde_json::Value>,
        outputs: Vec<serde_json::Value>,
        source: Vec<String>,
    },
    Markdown {
        id: String,
        metadata: serde_json::Map<String, serde_json::Value>,
        source: Vec<String>,
    },
}

impl IpynbCell {
    fn from_cell(cell: &Cell) -> Self {
        let id = new_cell_id();
        let source = split_source(cell.content());
        match cell {
            Cell::Code(_) => IpynbCell::Code {
                execution_count: None,
                id,
                metadata: serde_json::Map::new(),
                outputs: Vec::new(),
                source,
            },
            Cell::Narrative(_) => IpynbCell::Markdown {
                id,
                metadata: serde_json::Map::new(),
                source,
            },
        }
    }
}

#[derive(Serialize)]
struct IpynbMetadata<'a> {
    kernelspec: IpynbKernelSpec<'a>,
    language_info: IpynbLanguageInfo<'a>,
}

#[derive(Serialize)]
struct IpynbKernelSpec<'a> {
    display_name: &'a str,
    language: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
struct IpynbLanguageInfo<'a> {
    name: &'a str,
    version: &'a str,
}

/// Jupyter stores source as a list of lines, each keeping its `\n` except the last.
fn split_source(source: &str) -> Vec<String> {
    source.split_inclusive('\n').map(str::to_string).collect()
}

/// Eight hex characters, like the ids Jupyter assigns to new cells.
fn new_cell_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}
