use crate::export;
use crate::model::Model;
use clap::Parser;
use color_eyre::Result;
use colored::Colorize;
use log::info;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "feynforge", version, about)]
pub struct Cli {
    /// Path to the model YAML file
    pub model_file: PathBuf,

    /// Directory receiving the generated artifacts
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Base name of the generated files (defaults to the model name)
    #[arg(short, long)]
    pub base_name: Option<String>,
}

impl Cli {
    pub fn run(&self) -> Result<()> {
        let model = Model::from_file(&self.model_file)?;
        info!("Loaded model '{}' from {}", model.name, model.origin);

        let base = self
            .base_name
            .clone()
            .unwrap_or_else(|| model.name.to_string());
        fs::create_dir_all(&self.output_dir)?;
        export::export_model(&model, &self.output_dir, &base)?;

        info!(
            "{}",
            format!(
                "Model '{}' exported to {}",
                model.name,
                self.output_dir.display()
            )
            .green()
        );
        Ok(())
    }
}
