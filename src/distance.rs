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

//! Construction of the signed anisotropic distance field.

use ndarray as nd;

use crate::kernels;

/// Thresholds a probability map: `true` marks membrane voxels (`p >= threshold`).
pub fn membrane_mask(pmap: nd::ArrayView3<f32>, threshold: f64) -> nd::Array3<bool> {
  pmap.mapv(|px| f64::from(px) >= threshold)
}

/// Signed anisotropic distance transform of a probability map.
///
/// Voxels outside the thresholded membranes get their (positive) distance to
/// the closest membrane voxel, measured with a z-pitch of `anisotropy` and an
/// in-plane pitch of one. Inside the membranes the field is non-positive:
/// - with `preserve_membrane_pmaps` it holds the negated membrane probability,
/// which keeps the confidence signal of the membrane detector.
/// - otherwise it holds the negated distance to the closest non-membrane voxel,
/// shifted by one voxel so both transforms meet at zero.
///
/// With `anisotropy == 0` moving along z is free, so a voxel directly above or
/// below a membrane voxel gets distance zero even though it is not part of a
/// membrane itself.
pub fn signed_anisotropic_dt(
  pmap: nd::ArrayView3<f32>,
  threshold: f64,
  anisotropy: f64,
  preserve_membrane_pmaps: bool,
) -> nd::Array3<f32> {
  let pitch = [anisotropy, 1.0, 1.0];
  let membranes = membrane_mask(pmap, threshold);
  let mut distance_to_membrane = kernels::distance_transform(membranes.view(), pitch, true);

  if preserve_membrane_pmaps {
    nd::Zip::from(&mut distance_to_membrane).and(&membranes).and(pmap).par_for_each(
      |dist, &is_membrane, &px| {
        if is_membrane {
          *dist = -px;
        }
      },
    );
  } else {
    let distance_to_nonmembrane = kernels::distance_transform(membranes.view(), pitch, false);
    /*
      The inner transform is at least one voxel wherever the outer one is zero,
      so we shift it down by one. Sub-voxel z pitches could push the shifted
      value below zero, which would flip the sign inside the membrane: clamp.
    */
    nd::Zip::from(&mut distance_to_membrane).and(&distance_to_nonmembrane).par_for_each(
      |dist, &inner| {
        if inner > 0.0 {
          *dist -= (inner - 1.0).max(0.0);
        }
      },
    );
  }

  distance_to_membrane
}

#[cfg(test)]
mod test {
  use super::*;

  fn diagonal_band() -> nd::Array3<f32> {
    nd::Array3::from_shape_fn((2, 4, 4), |(_, y, x)| if x == y { 1.0 } else { 0.0 })
  }

  #[test]
  fn preserved_membranes_hold_negated_probabilities() {
    let mut pmap = diagonal_band();
    pmap[[0, 2, 2]] = 0.75;
    let dt = signed_anisotropic_dt(pmap.view(), 0.5, 1.0, true);
    assert_eq!(dt[[0, 0, 0]], -1.0);
    assert_eq!(dt[[0, 2, 2]], -0.75);
    assert_eq!(dt[[1, 0, 1]], 1.0);
    assert!((dt[[0, 0, 3]] - 5f32.sqrt()).abs() < 1e-6);
  }

  #[test]
  fn zero_anisotropy_makes_z_free() {
    let mut pmap = nd::Array3::<f32>::zeros((2, 3, 3));
    pmap[[0, 1, 1]] = 1.0;
    let flat = signed_anisotropic_dt(pmap.view(), 0.5, 0.0, true);
    assert_eq!(flat[[1, 1, 1]], 0.0);
    assert_eq!(flat[[1, 0, 1]], 1.0);
    let stacked = signed_anisotropic_dt(pmap.view(), 0.5, 1.0, true);
    assert_eq!(stacked[[1, 1, 1]], 1.0);
  }

  #[test]
  fn inner_distance_meets_outer_at_zero() {
    //A three voxel wide band in every slice
    let pmap = nd::Array3::from_shape_fn((2, 5, 9), |(_, _, x)| if (3..6).contains(&x) { 1.0 } else { 0.0 });
    let dt = signed_anisotropic_dt(pmap.view(), 0.5, 1.0, false);
    let row: Vec<f32> = dt.slice(nd::s![0, 2, ..]).to_vec();
    assert_eq!(row, vec![3.0, 2.0, 1.0, 0.0, -1.0, 0.0, 1.0, 2.0, 3.0]);
  }

  #[test]
  fn sign_matches_mask() {
    let pmap = nd::Array3::from_shape_fn((3, 6, 7), |(z, y, x)| ((z * 7 + y * 3 + x * 5) % 10) as f32 / 10.0);
    for preserve in [true, false] {
      for anisotropy in [0.5, 1.0, 4.0] {
        let mask = membrane_mask(pmap.view(), 0.6);
        let dt = signed_anisotropic_dt(pmap.view(), 0.6, anisotropy, preserve);
        nd::Zip::from(&mask).and(&dt).for_each(|&m, &d| {
          assert!(d.is_finite());
          if m {
            assert!(d <= 0.0);
          } else {
            assert!(d > 0.0);
          }
        });
      }
    }
  }

  #[test]
  fn mask_grows_as_threshold_drops() {
    let pmap = nd::Array3::from_shape_fn((2, 4, 4), |(z, y, x)| ((z + y * x) % 7) as f32 / 6.0);
    let coverage: Vec<usize> = [1.0, 0.8, 0.5, 0.2, 0.0]
      .iter()
      .map(|&t| membrane_mask(pmap.view(), t).iter().filter(|&&m| m).count())
      .collect();
    assert!(coverage.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(coverage[4], 32);
  }
}
