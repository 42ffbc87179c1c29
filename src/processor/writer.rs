//! Canonical artifact writing for validated instances.
//!
//! Each instance produces a pair: `<name>.customers.<ext>` (one row per
//! customer, depot first, sorted by id) and `<name>.params.json`. Both files
//! are staged as temporaries in the output directory and only then moved
//! into place, and a failure while committing the pair removes whatever was
//! already committed, so a mismatched pair is never left on disk.

use crate::config::{CompressionAlgorithm, ConverterConfig, TabularFormat};
use crate::constants::{CUSTOMER_COLUMNS, CUSTOMERS_ARTIFACT_INFIX, PARAMS_ARTIFACT_SUFFIX};
use crate::error::{ConvertError, Result};
use crate::models::{ArtifactPaths, Customer, InstanceParams, ValidInstance};

use polars::prelude::{
    Column, CsvWriter, DataFrame, NamedFrom, ParquetWriter as PolarsParquetWriter, SerWriter,
    StatisticsOptions,
};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Both artifacts of one instance, written but not yet in place
#[derive(Debug)]
struct StagedPair {
    customers: NamedTempFile,
    params: NamedTempFile,
    rows: usize,
}

/// Writer for customer tables and parameter records
#[derive(Debug, Clone)]
pub struct InstanceWriter {
    output_dir: PathBuf,
    format: TabularFormat,
    compression: CompressionAlgorithm,
    enable_statistics: bool,
    overwrite: bool,
}

impl InstanceWriter {
    /// Create a writer from the run configuration
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            format: config.tabular_format,
            compression: config.compression,
            enable_statistics: config.enable_statistics,
            overwrite: config.overwrite,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Output paths for an instance name
    pub fn artifact_paths(&self, name: &str) -> ArtifactPaths {
        ArtifactPaths {
            customers: self.output_dir.join(format!(
                "{}.{}.{}",
                name,
                CUSTOMERS_ARTIFACT_INFIX,
                self.format.extension()
            )),
            params: self
                .output_dir
                .join(format!("{}.{}", name, PARAMS_ARTIFACT_SUFFIX)),
        }
    }

    /// Write the artifact pair for a validated instance, all or nothing
    pub fn write(&self, instance: &ValidInstance) -> Result<ArtifactPaths> {
        let paths = self.artifact_paths(&instance.name);

        if !self.overwrite {
            for path in [&paths.customers, &paths.params] {
                if path.exists() {
                    return Err(ConvertError::OutputExists { path: path.clone() });
                }
            }
        }

        let staged = self.stage_pair(instance, &paths)?;
        let rows = staged.rows;
        self.commit_pair(staged, &paths)?;

        debug!(
            "Wrote {} rows to {} and parameters to {}",
            rows,
            paths.customers.display(),
            paths.params.display()
        );

        Ok(paths)
    }

    /// Write both artifacts to temporaries in the output directory
    fn stage_pair(&self, instance: &ValidInstance, paths: &ArtifactPaths) -> Result<StagedPair> {
        fs::create_dir_all(&self.output_dir)
            .map_err(|e| ConvertError::write(&self.output_dir, e))?;

        // Temporaries are removed on drop if anything fails
        let mut frame = customers_frame(instance)
            .map_err(|e| ConvertError::write(&paths.customers, e))?;
        let customers = self
            .stage(|file| self.write_table(&mut frame, file))
            .map_err(|e| ConvertError::write(&paths.customers, e))?;

        let params = InstanceParams::from_instance(instance);
        let params = self
            .stage(|file| write_params(&params, file))
            .map_err(|e| ConvertError::write(&paths.params, e))?;

        Ok(StagedPair {
            customers,
            params,
            rows: frame.height(),
        })
    }

    /// Move a staged pair into place.
    ///
    /// If the params file cannot be committed, the new table is removed and,
    /// when overwriting, so is any params file left from an earlier run, so
    /// neither half of a pair survives on its own.
    fn commit_pair(&self, staged: StagedPair, paths: &ArtifactPaths) -> Result<()> {
        self.commit(staged.customers, &paths.customers)?;
        if let Err(error) = self.commit(staged.params, &paths.params) {
            remove_partial(&paths.customers);
            if self.overwrite && paths.params.is_file() {
                remove_partial(&paths.params);
            }
            return Err(error);
        }
        Ok(())
    }

    fn stage<F>(&self, write_fn: F) -> Result<NamedTempFile>
    where
        F: FnOnce(&mut fs::File) -> Result<()>,
    {
        let mut staged = NamedTempFile::new_in(&self.output_dir)?;
        write_fn(staged.as_file_mut())?;
        staged.as_file().sync_all()?;
        Ok(staged)
    }

    fn write_table(&self, frame: &mut DataFrame, file: &mut fs::File) -> Result<()> {
        match self.format {
            TabularFormat::Parquet => {
                let statistics = if self.enable_statistics {
                    StatisticsOptions::full()
                } else {
                    StatisticsOptions::empty()
                };
                PolarsParquetWriter::new(file)
                    .with_compression(self.compression.to_polars_compression())
                    .with_statistics(statistics)
                    .finish(frame)?;
            }
            TabularFormat::Csv => {
                CsvWriter::new(file).include_header(true).finish(frame)?;
            }
        }
        Ok(())
    }

    /// Move a staged file into its final place
    fn commit(&self, staged: NamedTempFile, target: &Path) -> Result<()> {
        let result = if self.overwrite {
            staged.persist(target)
        } else {
            staged.persist_noclobber(target)
        };

        result.map(|_| ()).map_err(|e| {
            if !self.overwrite && e.error.kind() == std::io::ErrorKind::AlreadyExists {
                ConvertError::OutputExists {
                    path: target.to_path_buf(),
                }
            } else {
                ConvertError::write(target, e.error)
            }
        })
    }
}

/// Build the customer table: depot and customers, ascending by id
pub fn customers_frame(instance: &ValidInstance) -> Result<DataFrame> {
    let mut rows: Vec<&Customer> = instance.all_customers().collect();
    rows.sort_by_key(|c| c.id);

    let [id, x, y, demand, ready_time, due_time, service_time] = CUSTOMER_COLUMNS;
    let int_column = |name: &str, value: fn(&Customer) -> i64| {
        Column::new(name.into(), rows.iter().map(|c| value(c)).collect::<Vec<i64>>())
    };
    let float_column = |name: &str, value: fn(&Customer) -> f64| {
        Column::new(name.into(), rows.iter().map(|c| value(c)).collect::<Vec<f64>>())
    };

    let frame = DataFrame::new(vec![
        int_column(id, |c| c.id),
        float_column(x, |c| c.x),
        float_column(y, |c| c.y),
        int_column(demand, |c| c.demand),
        int_column(ready_time, |c| c.ready_time),
        int_column(due_time, |c| c.due_time),
        int_column(service_time, |c| c.service_time),
    ])?;

    Ok(frame)
}

fn write_params(params: &InstanceParams, file: &mut fs::File) -> Result<()> {
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, params).map_err(std::io::Error::from)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => warn!("Removed partial artifact {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial artifact {}: {}", path.display(), e),
    }
}
