use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),

    #[error("record not found: {0}")]
    MissingRecord(String),

    #[error("record '{name}' holds {actual} values, expected {expected}")]
    ShortRecord {
        name: String,
        actual: usize,
        expected: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One opened source file presented as named double-precision records.
///
/// Implementations select the record whose name matches the requested one
/// after trimming non-alphanumeric characters from both ends.
pub trait RecordReader {
    /// Native grid shape `(ni, nj, size)` with `size == ni * nj`.
    fn dims(&self) -> (usize, usize, usize);

    /// Reads the full value array for the named record. Coordinate arrays
    /// use the reserved names `"latitudes"` and `"longitudes"`.
    fn read_f64_array(&mut self, name: &str) -> Result<Vec<f64>, DecodeError>;
}

/// Decoding configuration handed to every source-field constructor.
#[derive(Debug, Clone)]
pub struct DecoderContext {
    /// Wrap longitudes into [-180, 180) on load.
    pub normalize_longitudes: bool,
}

impl Default for DecoderContext {
    fn default() -> Self {
        Self {
            normalize_longitudes: true,
        }
    }
}

impl DecoderContext {
    pub fn open(&self, path: &Path) -> Result<Box<dyn RecordReader>, DecodeError> {
        Ok(Box::new(NetcdfReader::open(path)?))
    }
}

/// NetCDF-backed record reader. The file carries the native grid shape as
/// the `ni` and `nj` dimensions and each record as a flat variable of
/// `ni * nj` doubles.
pub struct NetcdfReader {
    file: netcdf::File,
    ni: usize,
    nj: usize,
}

impl NetcdfReader {
    pub fn open(path: &Path) -> Result<Self, DecodeError> {
        let file = netcdf::open(path)?;
        let ni = file
            .dimension("ni")
            .ok_or_else(|| DecodeError::MissingRecord("ni".to_string()))?
            .len();
        let nj = file
            .dimension("nj")
            .ok_or_else(|| DecodeError::MissingRecord("nj".to_string()))?
            .len();
        Ok(Self { file, ni, nj })
    }
}

impl RecordReader for NetcdfReader {
    fn dims(&self) -> (usize, usize, usize) {
        (self.ni, self.nj, self.ni * self.nj)
    }

    fn read_f64_array(&mut self, name: &str) -> Result<Vec<f64>, DecodeError> {
        let want = trimmed(name);
        let var = self
            .file
            .variables()
            .find(|v| trimmed(&v.name()) == want)
            .ok_or_else(|| DecodeError::MissingRecord(name.to_string()))?;
        let values = var.get_values::<f64>(..)?;
        let expected = self.ni * self.nj;
        if values.len() != expected {
            return Err(DecodeError::ShortRecord {
                name: name.to_string(),
                actual: values.len(),
                expected,
            });
        }
        Ok(values)
    }
}

fn trimmed(name: &str) -> &str {
    name.trim_matches(|c: char| !c.is_ascii_alphanumeric())
}
