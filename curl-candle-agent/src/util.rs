//! Utilities.
use anyhow::{anyhow, Context, Result};
use candle_core::{Device, Tensor};
use candle_nn::VarMap;
use curl_core::record::{Record, RecordValue};
use log::trace;
mod crop;
pub use crop::center_crop;

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    trace!("dest");
    let dest = dest
        .data()
        .lock()
        .map_err(|_| anyhow!("Lock of the destination VarMap is poisoned"))?;
    trace!("src");
    let src = src
        .data()
        .lock()
        .map_err(|_| anyhow!("Lock of the source VarMap is poisoned"))?;

    for (k, v_dest) in dest.iter() {
        let v_src = src
            .get(k)
            .with_context(|| format!("Variable {} is not in the source VarMap", k))?;
        let t = (v_src.affine(tau, 0.0)? + v_dest.affine(1.0 - tau, 0.0)?)?;
        v_dest.set(&t)?;
    }

    Ok(())
}

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> i64;

    /// Sets the  output dimension.
    fn set_out_dim(&mut self, v: i64);
}

/// Returns the standard deviation of a tensor.
pub fn std(t: &Tensor) -> Result<f32> {
    Ok(t.broadcast_sub(&t.mean_all()?)?
        .powf(2f64)?
        .mean_all()?
        .sqrt()?
        .to_vec0::<f32>()?)
}

/// Returns the mean and standard deviation of the parameters.
///
/// Keys are `{prefix}/{name}_mean` and `{prefix}/{name}_std`.
pub fn param_stats(varmap: &VarMap, prefix: &str) -> Result<Record> {
    let mut record = Record::empty();
    let data = varmap
        .data()
        .lock()
        .map_err(|_| anyhow!("Lock of the VarMap is poisoned"))?;

    for (k, v) in data.iter() {
        let m: f32 = v.mean_all()?.to_vec0()?;
        record.insert(format!("{}/{}_mean", prefix, k), RecordValue::Scalar(m));

        let s = std(v.as_tensor())?;
        record.insert(format!("{}/{}_std", prefix, k), RecordValue::Scalar(s));
    }

    Ok(record)
}

/// Converts termination flags into the bootstrap mask `not_done = 1 - is_done`.
pub fn not_done(is_done: &[i8], device: &Device) -> Result<Tensor> {
    let not_done = is_done
        .iter()
        .map(|e| 1f32 - *e as f32)
        .collect::<Vec<_>>();
    Ok(Tensor::from_slice(&not_done[..], (is_done.len(),), device)?)
}

/// Converts rewards into a `(B,)` tensor.
pub fn reward(reward: &[f32], device: &Device) -> Result<Tensor> {
    Ok(Tensor::from_slice(reward, (reward.len(),), device)?)
}
