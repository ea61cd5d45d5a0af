use std::path::Path;

use log::info;
use traj_store::{LoaderConfig, TrajError, TrajResult, Trajectory};

use crate::loader::{LoadHandle, Loader};
use crate::source::{read_all, SourceReader};
use crate::xyz::{write_xyz, XyzSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Xyz,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> TrajResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "xyz" | "extxyz" => Ok(FileFormat::Xyz),
            _ => Err(TrajError::Unsupported(format!(
                "no reader for {}",
                path.display()
            ))),
        }
    }
}

/// Pick a reader for `path` by extension.
pub fn open_source(path: impl AsRef<Path>) -> TrajResult<Box<dyn SourceReader + Send>> {
    let path = path.as_ref();
    match FileFormat::from_path(path)? {
        FileFormat::Xyz => Ok(Box::new(XyzSource::open(path)?)),
    }
}

/// Read a whole file into memory.
pub fn open_file(path: impl AsRef<Path>) -> TrajResult<Trajectory> {
    let mut source = open_source(path)?;
    read_all(source.as_mut())
}

/// Start loading `path` in the background.
pub fn open_file_streaming(path: impl AsRef<Path>, options: &LoaderConfig) -> TrajResult<LoadHandle> {
    Loader::new(open_source(path)?, options).start()
}

/// Read `path` and append it to `traj`, re-timed to continue `traj`.
pub fn append_file(path: impl AsRef<Path>, traj: &mut Trajectory) -> TrajResult<()> {
    let other = open_file(path)?;
    traj.append(&other)
}

/// Write steps `tbegin, tbegin + step, ...` below `tend`.
pub fn dump(
    traj: &Trajectory,
    path: impl AsRef<Path>,
    tbegin: usize,
    tend: usize,
    step: usize,
) -> TrajResult<usize> {
    if step == 0 {
        return Err(TrajError::Invalid("dump step must be > 0".into()));
    }
    let window = traj.check_times(tbegin, tend)?;
    let path = path.as_ref();
    FileFormat::from_path(path)?;
    let written = write_xyz(traj, path, window.steps().step_by(step))?;
    info!("wrote {written} steps to {}", path.display());
    Ok(written)
}
