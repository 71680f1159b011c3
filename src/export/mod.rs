//! Backend emitters producing the three generated artifacts.
//!
//! Each artifact is rendered into a memory buffer and only written to disk
//! once rendering has succeeded, so a fatal error never leaves a partial
//! file behind.

pub mod form;
pub mod python;
pub mod qgraf;

use crate::assemble::{assemble_model, AssembleError};
use crate::expressions::{FloatTable, Name, ParseError};
use crate::model::Model;
use log::info;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Namespace prefix keeping model symbols clear of backend keywords.
pub const MODEL_PREFIX: &str = "mdl";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Mutable state shared by the emitters of one export pass. The float table
/// is filled by the Python backend and re-used by the FORM backend, so the
/// same literal maps to the same constant in every artifact.
pub struct ExportContext {
    pub prefix: Name,
    pub floats: FloatTable,
}

impl ExportContext {
    pub fn new() -> ExportContext {
        ExportContext {
            prefix: MODEL_PREFIX.into(),
            floats: FloatTable::new(&format!("{}float", MODEL_PREFIX)),
        }
    }
}

impl Default for ExportContext {
    fn default() -> Self {
        ExportContext::new()
    }
}

/// True for the textual mass/width references that stand for the zero value.
pub fn is_zero_reference(name: &str) -> bool {
    name == "0" || name == "ZERO"
}

/// The emitted symbol for a coupling: prefixed, underscores stripped.
pub fn coupling_symbol(prefix: &str, name: &str) -> Name {
    format!("{}{}", prefix, name.replace('_', "")).into()
}

/// Writes the three artifacts for `model` under `dir`: `<base>.py` (data
/// structures), `<base>` (diagram-generator model) and `<base>.hh` (macro
/// processor program). No other I/O is performed.
pub fn export_model(model: &Model, dir: &Path, base: &str) -> Result<(), ExportError> {
    let mut ctx = ExportContext::new();
    let (vertices, index_book) = assemble_model(model)?;

    info!("  Writing Python file ...");
    let mut buf = Vec::new();
    python::write_python_file(model, &mut ctx, &mut buf)?;
    fs::write(dir.join(format!("{}.py", base)), buf)?;

    info!("  Writing QGraf file ...");
    let mut buf = Vec::new();
    qgraf::write_model_file(model, &vertices, &mut buf)?;
    fs::write(dir.join(base), buf)?;

    info!("  Writing Form file ...");
    let mut buf = Vec::new();
    form::write_form_file(model, &vertices, &index_book, &ctx, &mut buf)?;
    fs::write(dir.join(format!("{}.hh", base)), buf)?;

    Ok(())
}
