use anyhow::Result;
use candle_core::{Tensor, D};
use curl_core::error::CurlError;

/// Crops the centered `size` x `size` window of a channel-first image.
///
/// `image` has shape `(C, H, W)`, optionally with leading batch dimensions; the
/// crop acts on the last two axes. The window starts at
/// `top = (H - size) / 2`, `left = (W - size) / 2`.
///
/// `size` must not exceed `H` or `W`, otherwise [`CurlError::InvalidCropSize`]
/// is returned.
pub fn center_crop(image: &Tensor, size: usize) -> Result<Tensor> {
    let h = image.dim(D::Minus2)?;
    let w = image.dim(D::Minus1)?;
    if size > h || size > w {
        return Err(CurlError::InvalidCropSize {
            size,
            height: h,
            width: w,
        }
        .into());
    }

    let top = (h - size) / 2;
    let left = (w - size) / 2;

    Ok(image
        .narrow(D::Minus2, top, size)?
        .narrow(D::Minus1, left, size)?)
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::{DType, Device};

    fn image(c: usize, h: usize, w: usize) -> Result<Tensor> {
        Ok(Tensor::arange(0f32, (c * h * w) as f32, &Device::Cpu)?.reshape((c, h, w))?)
    }

    #[test]
    fn test_center_window() -> Result<()> {
        let img = image(1, 4, 6)?;
        let cropped = center_crop(&img, 2)?;

        assert_eq!(cropped.dims(), &[1, 2, 2]);
        assert_eq!(
            cropped.to_vec3::<f32>()?,
            vec![vec![vec![8.0, 9.0], vec![14.0, 15.0]]]
        );
        Ok(())
    }

    #[test]
    fn test_odd_margin_floors() -> Result<()> {
        // top = (5 - 2) / 2 = 1, left = (5 - 2) / 2 = 1
        let img = image(2, 5, 5)?;
        let cropped = center_crop(&img, 2)?;

        assert_eq!(cropped.dims(), &[2, 2, 2]);
        assert_eq!(
            cropped.to_vec3::<f32>()?[1],
            vec![vec![31.0, 32.0], vec![36.0, 37.0]]
        );
        Ok(())
    }

    #[test]
    fn test_same_size_is_identity() -> Result<()> {
        let img = image(3, 4, 4)?;
        let cropped = center_crop(&img, 4)?;
        let diff = (cropped - &img)?.abs()?.sum_all()?.to_scalar::<f32>()?;
        assert_eq!(diff, 0.0);
        Ok(())
    }

    #[test]
    fn test_batched_image() -> Result<()> {
        let img = Tensor::zeros((8, 3, 10, 12), DType::F32, &Device::Cpu)?;
        assert_eq!(center_crop(&img, 6)?.dims(), &[8, 3, 6, 6]);
        Ok(())
    }

    #[test]
    fn test_too_large_crop_fails() -> Result<()> {
        let img = image(1, 4, 6)?;
        let err = center_crop(&img, 5).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CurlError>(),
            Some(CurlError::InvalidCropSize { size: 5, .. })
        ));
        Ok(())
    }
}
