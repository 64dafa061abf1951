//! Configuration and binary persistence helpers.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{self, format_err};
use bincode;
use serde::{de::DeserializeOwned, Serialize};
use serde_yaml;

pub(crate) mod format;


/// An enumerated type for `IntDeriv` file types.
pub enum IntDerivFileType {
    /// Variant for binary files containing derivative buffer lookup tables.
    Lut,

    /// Variant for binary files containing assembled integral-derivative results.
    Der,
}

impl IntDerivFileType {
    /// Returns the extension of the file type.
    pub fn ext(&self) -> String {
        match self {
            IntDerivFileType::Lut => "intderiv.lut".to_string(),
            IntDerivFileType::Der => "intderiv.der".to_string(),
        }
    }
}

/// Returns the full path of an `IntDeriv` binary file.
///
/// # Arguments
///
/// * `name` - The name of the file (without `IntDeriv`-specific extensions).
/// * `file_type` - The type of the `IntDeriv` file.
pub fn intderiv_binary_path<P: AsRef<Path>>(name: P, file_type: &IntDerivFileType) -> PathBuf {
    let mut path = name.as_ref().to_path_buf();
    path.set_extension(file_type.ext());
    path
}

/// Reads an `IntDeriv` binary file and deserialises it into an appropriate structure.
///
/// # Arguments
///
/// * `name` - The name of the file to be read in (without `IntDeriv`-specific extensions).
/// * `file_type` - The type of the `IntDeriv` file to be read in.
///
/// # Returns
///
/// A `Result` containing the structure deserialised from the read-in file.
pub fn read_intderiv_binary<T, P: AsRef<Path>>(
    name: P,
    file_type: IntDerivFileType,
) -> Result<T, anyhow::Error>
where
    T: DeserializeOwned,
{
    let path = intderiv_binary_path(name, &file_type);
    let mut reader = BufReader::new(File::open(path).map_err(|err| format_err!(err))?);
    bincode::deserialize_from(&mut reader).map_err(|err| format_err!(err))
}

/// Serialises a structure and writes into an `IntDeriv` binary file.
///
/// # Arguments
///
/// * `name` - The name of the file to be written (without `IntDeriv`-specific extensions).
/// * `file_type` - The type of the `IntDeriv` file to be written.
///
/// # Returns
///
/// A `Result` indicating if the serialisation and writing processes have been successful.
pub fn write_intderiv_binary<T, P: AsRef<Path>>(
    name: P,
    file_type: IntDerivFileType,
    value: &T,
) -> Result<(), anyhow::Error>
where
    T: Serialize,
{
    let path = intderiv_binary_path(name, &file_type);
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, value).map_err(|err| format_err!(err))
}

/// Reads an `IntDeriv` configuration YAML file and deserialises it into an appropriate structure.
///
/// # Arguments
///
/// * `name` - The name of the file to be read in (with its `.yml` or `.yaml` extension).
///
/// # Returns
///
/// A `Result` containing the structure deserialised from the read-in file.
pub fn read_intderiv_yaml<T, P: AsRef<Path>>(name: P) -> Result<T, anyhow::Error>
where
    T: DeserializeOwned,
{
    let mut reader = BufReader::new(File::open(name).map_err(|err| format_err!(err))?);
    serde_yaml::from_reader(&mut reader).map_err(|err| format_err!(err))
}

/// Serialises a structure and writes into an `IntDeriv` configuration YAML file.
///
/// # Arguments
///
/// * `name` - The name of the YAML file to be written (without extensions). The resulting file
/// will have the `.yml` extension.
///
/// # Returns
///
/// A `Result` indicating if the serialisation and writing processes have been successful.
pub fn write_intderiv_yaml<T, P: AsRef<Path>>(name: P, value: &T) -> Result<(), anyhow::Error>
where
    T: Serialize,
{
    let mut path = name.as_ref().to_path_buf();
    path.set_extension("yml");
    let mut writer = BufWriter::new(File::create(path)?);
    serde_yaml::to_writer(&mut writer, value).map_err(|err| format_err!(err))
}
