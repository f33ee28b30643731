//! Checkpoint save/load for TbNet.
//!
//! Weights load with a two-step fallback mirroring how screening
//! deployments ship models: the compact binary record is tried first, then
//! the named-MessagePack record (parameter names included, tolerant of
//! being produced by other tooling). The recorders append their own file
//! extensions, so a weights path of `model/tbnet` resolves to
//! `model/tbnet.bin` or `model/tbnet.mpk`.

use std::path::Path;

use burn::module::Module;
use burn::prelude::*;
use burn::record::{BinFileRecorder, FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use tracing::{debug, info};

use crate::error::{ModelError, Result};
use crate::tbnet::{TbNet, TbNetConfig};

/// Save a model as a compact binary record (`<path>.bin`).
pub fn save_tbnet<B: Backend>(model: &TbNet<B>, path: impl AsRef<Path>) -> Result<()> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    recorder
        .record(model.clone().into_record(), path.as_ref().to_path_buf())
        .map_err(|e| ModelError::Save(e.to_string()))
}

/// Load a model, trying the binary record first and the named record as a
/// fallback.
///
/// Fails with [`ModelError::WeightsNotFound`] when neither candidate file
/// exists, and with [`ModelError::Load`] when a file exists but no
/// recorder can read it into this architecture.
pub fn load_tbnet<B: Backend>(
    config: &TbNetConfig,
    path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<TbNet<B>> {
    let path = path.as_ref();
    if !path.with_extension("bin").exists() && !path.with_extension("mpk").exists() {
        return Err(ModelError::WeightsNotFound(path.to_path_buf()));
    }

    let model = config.init::<B>(device);

    let bin = BinFileRecorder::<FullPrecisionSettings>::new();
    match bin.load(path.to_path_buf(), device) {
        Ok(record) => {
            info!(path = %path.display(), "loaded binary weights record");
            Ok(model.load_record(record))
        }
        Err(bin_err) => {
            debug!(error = %bin_err, "binary record failed, trying named record");
            let mpk = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
            let record = mpk.load(path.to_path_buf(), device).map_err(|mpk_err| {
                ModelError::Load(format!(
                    "binary record: {bin_err}; named record: {mpk_err}"
                ))
            })?;
            info!(path = %path.display(), "loaded named weights record");
            Ok(model.load_record(record))
        }
    }
}
