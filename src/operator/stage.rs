use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use super::controls::Control;
use super::manifest::{decode, Decoded, Manifest};
use super::resources::ResourceBundle;
use crate::controller::Error;

/// One directory of manifests: the decoded bundle and a readiness check per
/// decoded resource, in the order the files were read.
#[derive(Clone, Debug)]
pub struct Stage {
    pub name: String,
    pub bundle: ResourceBundle,
    pub controls: Vec<Control>,
    /// Kind labels of manifests that were skipped as unsupported.
    pub skipped: Vec<String>,
}

impl Stage {
    pub fn build(dir: &Path) -> Result<Stage, Error> {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());

        let mut manifests = Vec::new();
        let mut skipped = Vec::new();

        for path in manifest_files(dir)? {
            let raw = fs::read(&path).map_err(|source| Error::UnableToReadManifest {
                path: path.clone(),
                source,
            })?;

            let decoded = decode(&raw).map_err(|source| {
                error!("Unable to decode manifest {}: {}", path.display(), source);
                Error::UnableToDecodeManifest {
                    path: path.clone(),
                    source,
                }
            })?;

            match decoded {
                Decoded::Resource(manifest) => {
                    if manifest.metadata().name.is_none() {
                        return Err(Error::ManifestMissingName(path));
                    }
                    manifests.push(manifest);
                }
                Decoded::Unrecognized(kind) => {
                    info!(
                        "Skipping manifest {} with unsupported kind {:?}",
                        path.display(),
                        kind
                    );
                    skipped.push(kind);
                }
            };
        }

        let mut stage = Stage::from_manifests(&name, manifests);
        stage.skipped = skipped;
        info!(
            "Stage {} loaded with {} controls",
            stage.name,
            stage.controls.len()
        );
        Ok(stage)
    }

    /// Stage over already decoded manifests, one control each, in the given order.
    pub fn from_manifests(name: &str, manifests: impl IntoIterator<Item = Manifest>) -> Stage {
        let mut bundle = ResourceBundle::default();
        let controls = manifests
            .into_iter()
            .map(|manifest| Control::for_kind(bundle.insert(manifest)))
            .collect();
        Stage {
            name: name.to_string(),
            bundle,
            controls,
            skipped: Vec::new(),
        }
    }
}

/// Every regular file below `root`, sorted by path so stage order does not
/// depend on the filesystem's directory order.
fn manifest_files(root: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut files = Vec::new();
    collect_files(root, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), Error> {
    let read_err = |source| Error::UnableToReadManifest {
        path: dir.to_path_buf(),
        source,
    };

    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        // Links to directories are not followed; links to files are read.
        let file_type = entry.file_type().map_err(read_err)?;
        if file_type.is_dir() {
            collect_files(&path, files)?;
        } else if file_type.is_symlink() && path.is_dir() {
            debug!("Not descending into linked directory {}", path.display());
        } else {
            files.push(path);
        }
    }
    Ok(())
}
