use crate::core::models::atom::AtomParams;
use crate::core::models::system::{ParticleSystem, SystemError};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtomFileError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Atom file '{path}' contains no atoms")]
    Empty { path: String },
    #[error("Invalid particle system in '{path}': {source}")]
    System { path: String, source: SystemError },
}

/// One row of an atom input file.
///
/// Columns: `x,y,z,radius,gamma,alpha,charge,hydrogen`, with `hydrogen` written as
/// `true`/`false`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtomRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub radius: f64,
    pub gamma: f64,
    pub alpha: f64,
    pub charge: f64,
    pub hydrogen: bool,
}

impl AtomRecord {
    pub fn params(&self) -> AtomParams {
        AtomParams {
            radius: self.radius,
            gamma: self.gamma,
            alpha: self.alpha,
            charge: self.charge,
            is_hydrogen: self.hydrogen,
        }
    }

    pub fn position(&self) -> Point3<f64> {
        Point3::new(self.x, self.y, self.z)
    }
}

/// One row of the per-atom result file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtomResult {
    pub atom: usize,
    pub self_volume: f64,
    pub free_volume: f64,
    pub born_radius: f64,
    pub gx: f64,
    pub gy: f64,
    pub gz: f64,
}

pub fn read_atoms(path: &Path) -> Result<ParticleSystem, AtomFileError> {
    let label = path.to_string_lossy().to_string();
    let file = std::fs::File::open(path).map_err(|e| AtomFileError::Io {
        path: label.clone(),
        source: e,
    })?;
    read_atoms_labeled(file, label)
}

/// Reads atoms from any reader; errors are reported against the pseudo path `<reader>`.
pub fn read_atoms_from(reader: impl Read) -> Result<ParticleSystem, AtomFileError> {
    read_atoms_labeled(reader, "<reader>".to_string())
}

fn read_atoms_labeled(reader: impl Read, label: String) -> Result<ParticleSystem, AtomFileError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut params = Vec::new();
    let mut positions = Vec::new();
    for result in csv_reader.deserialize::<AtomRecord>() {
        let record = result.map_err(|e| AtomFileError::Csv {
            path: label.clone(),
            source: e,
        })?;
        params.push(record.params());
        positions.push(record.position());
    }

    if params.is_empty() {
        return Err(AtomFileError::Empty { path: label });
    }

    ParticleSystem::new(params, positions).map_err(|e| AtomFileError::System {
        path: label,
        source: e,
    })
}

pub fn write_atoms_to(system: &ParticleSystem, writer: impl Write) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for (p, x) in system.params().iter().zip(system.positions()) {
        csv_writer.serialize(AtomRecord {
            x: x.x,
            y: x.y,
            z: x.z,
            radius: p.radius,
            gamma: p.gamma,
            alpha: p.alpha,
            charge: p.charge,
            hydrogen: p.is_hydrogen,
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_results(path: &Path, rows: &[AtomResult]) -> Result<(), AtomFileError> {
    let label = path.to_string_lossy().to_string();
    let file = std::fs::File::create(path).map_err(|e| AtomFileError::Io {
        path: label.clone(),
        source: e,
    })?;
    write_results_to(rows, file).map_err(|e| AtomFileError::Csv {
        path: label,
        source: e,
    })
}

pub fn write_results_to(rows: &[AtomResult], writer: impl Write) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}
