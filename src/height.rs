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

//! Selection of the height map the watershed floods.

use ndarray as nd;

use crate::kernels;

/// Returns the height map for the watershed.
///
/// With `grow_on_pmap` the probability map itself is flooded, so segments grow
/// from the low-probability cell interiors up to the membranes. Otherwise the
/// negated distance field is used: the flood runs from minima, while the seeds
/// sit at the maxima of the distance field.
///
/// A non-zero `sigma_weights` smooths the result in-plane (y and x) with that
/// standard deviation. No anisotropy correction is applied here.
pub fn select_height_map(
  pmap: nd::ArrayView3<f32>,
  distance: nd::Array3<f32>,
  grow_on_pmap: bool,
  sigma_weights: f64,
) -> nd::Array3<f32> {
  let hmap = if grow_on_pmap {
    pmap.to_owned()
  } else {
    let mut hmap = distance;
    hmap.par_mapv_inplace(|px| -px);
    hmap
  };

  if sigma_weights != 0.0 {
    kernels::gaussian_smooth(hmap.view(), [0.0, sigma_weights, sigma_weights])
  } else {
    hmap
  }
}
