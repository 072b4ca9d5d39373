/*
  Copyright© 2022 Raúl Wolters(1)

  This file is part of wsdt-anisotropic.

  rustronomy is free software: you can redistribute it and/or modify it under
  the terms of the European Union Public License version 1.2 or later, as
  published by the European Commission.

  rustronomy is distributed in the hope that it will be useful, but WITHOUT ANY
  WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
  A PARTICULAR PURPOSE. See the European Union Public License for more details.

  You should have received a copy of the EUPL in an/all official language(s) of
  the European Union along with rustronomy.  If not, see
  <https://ec.europa.eu/info/european-union-public-licence_en/>.

  (1) Resident of the Kingdom of the Netherlands; agreement between licensor and
  licensee subject to Dutch law as per article 15 of the EUPL.
*/

use ndarray as nd;

//Kernels are truncated at this many standard deviations
const TRUNCATE: f64 = 3.0;

/// Returns a normalised, sampled Gaussian of radius `ceil(3σ)`, cut off at
/// `max_radius`. Returns `None` when `2σ²` is not a positive number, in which
/// case the kernel would be a delta peak anyway.
fn gaussian_kernel(sigma: f64, max_radius: usize) -> Option<Vec<f64>> {
  let two_var = 2.0 * sigma * sigma;
  if !(two_var > 0.0) {
    return None;
  }
  //Every offset past the lane length reads the clamped edge voxel
  let radius = (TRUNCATE * sigma).ceil().min(max_radius as f64) as isize;
  let kernel: Vec<f64> = (-radius..=radius).map(|x| (-((x * x) as f64) / two_var).exp()).collect();
  let norm: f64 = kernel.iter().sum();
  Some(kernel.into_iter().map(|w| w / norm).collect())
}

/// Separable Gaussian smoothing of a 3D volume with a separate standard
/// deviation per axis. An axis with `sigma == 0` (or a sigma so small that its
/// variance underflows) is left alone. Borders are handled by replicating the
/// edge voxel, and kernels never reach further than the length of the axis.
///
/// Intermediate results are kept in `f64`; the output is rounded back to `f32`.
pub fn gaussian_smooth(volume: nd::ArrayView3<f32>, sigmas: [f64; 3]) -> nd::Array3<f32> {
  let mut smooth = volume.mapv(f64::from);

  for (axis, &sigma) in sigmas.iter().enumerate().rev() {
    let len = smooth.len_of(nd::Axis(axis));
    if sigma <= 0.0 || len < 2 {
      continue;
    }
    let Some(kernel) = gaussian_kernel(sigma, len - 1) else { continue };
    nd::Zip::from(smooth.lanes_mut(nd::Axis(axis))).par_for_each(|lane| convolve_lane(lane, &kernel));
  }

  smooth.mapv(|px| px as f32)
}

fn convolve_lane(mut lane: nd::ArrayViewMut1<f64>, kernel: &[f64]) {
  let src = lane.to_vec();
  let last = src.len() as isize - 1;
  let radius = (kernel.len() / 2) as isize;
  for (idx, px) in lane.iter_mut().enumerate() {
    *px = kernel
      .iter()
      .enumerate()
      .map(|(k, &w)| w * src[(idx as isize + k as isize - radius).clamp(0, last) as usize])
      .sum();
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn kernel_is_normalised() {
    for sigma in [0.3, 0.5, 1.0, 2.5] {
      let kernel = gaussian_kernel(sigma, 64).unwrap();
      assert_eq!(kernel.len() % 2, 1);
      assert!((kernel.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }
  }

  #[test]
  fn constant_volume_stays_uniform() {
    let volume = nd::Array3::from_elem((2, 5, 6), 3.25f32);
    let smooth = gaussian_smooth(volume.view(), [0.5, 1.5, 1.5]);
    let first = smooth[[0, 0, 0]];
    assert!((first - 3.25).abs() < 1e-5);
    assert!(smooth.iter().all(|&px| px == first));
  }

  #[test]
  fn zero_sigma_is_identity() {
    let volume = nd::Array3::from_shape_fn((2, 4, 4), |(z, y, x)| (z * 16 + y * 4 + x) as f32);
    assert_eq!(gaussian_smooth(volume.view(), [0.0, 0.0, 0.0]), volume);
  }

  #[test]
  fn smoothing_stays_on_its_axis() {
    let mut volume = nd::Array3::<f32>::zeros((3, 5, 5));
    volume[[1, 2, 2]] = 1.0;
    let smooth = gaussian_smooth(volume.view(), [0.0, 1.0, 1.0]);
    assert!(smooth.slice(nd::s![0, .., ..]).iter().all(|&px| px == 0.0));
    assert!(smooth[[1, 2, 2]] < 1.0 && smooth[[1, 2, 3]] > 0.0);
    //Replicated borders leak a little mass, but only a little
    assert!((smooth.sum() - 1.0).abs() < 0.05);
  }

  #[test]
  fn kernel_is_cut_off_at_the_lane_length() {
    let kernel = gaussian_kernel(1e12, 4).unwrap();
    assert_eq!(kernel.len(), 9);
    assert!((kernel.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    assert!(gaussian_kernel(1e-200, 4).is_none());
  }

  #[test]
  fn huge_sigma_stays_finite() {
    let volume = nd::Array3::from_shape_fn((2, 3, 5), |(z, y, x)| (z + y + x) as f32);
    let smooth = gaussian_smooth(volume.view(), [1e12, 1e12, 1e12]);
    assert!(smooth.iter().all(|px| px.is_finite()));
    //Averages never leave the range of the input
    assert!(smooth.iter().all(|&px| (0.0..=7.0).contains(&px)));
  }

  #[test]
  fn vanishing_sigma_is_identity() {
    let volume = nd::Array3::from_shape_fn((2, 4, 4), |(z, y, x)| (z * 16 + y * 4 + x) as f32);
    assert_eq!(gaussian_smooth(volume.view(), [0.0, 1e-200, 1e-200]), volume);
    assert_eq!(gaussian_smooth(volume.view(), [1e-300, 0.0, f64::MIN_POSITIVE]), volume);
  }
}
