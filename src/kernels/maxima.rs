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

use crate::{neighbours, Connectivity};

/// Marker produced by [`local_maxima`]. Maxima and non-maxima are separate
/// variants, so no sentinel value ever has to ride along with real heights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Extremum {
  /// Part of a (possibly plateau-shaped) local maximum
  Maximum,
  /// Anything else
  #[default]
  Other,
}

impl Extremum {
  #[inline]
  pub fn is_maximum(&self) -> bool {
    *self == Extremum::Maximum
  }
}

/// Finds the local maxima of a 2D slice.
///
/// Connected regions of exactly equal height (plateaus) are treated as one
/// candidate: the whole plateau is marked as a maximum when none of the pixels
/// bordering it is higher. Maxima that touch the border of the slice are kept.
pub fn local_maxima(slice: nd::ArrayView2<f32>, connectivity: Connectivity) -> nd::Array2<Extremum> {
  let shape = slice.dim();
  let mut markers = nd::Array2::<Extremum>::default(shape);
  let mut visited = nd::Array2::from_elem(shape, false);
  let mut stack: Vec<(usize, usize)> = Vec::new();
  let mut plateau: Vec<(usize, usize)> = Vec::new();

  for (start, &height) in slice.indexed_iter() {
    if visited[start] {
      continue;
    }

    /*(1) Flood the plateau that contains `start`
      While flooding we also keep track of whether any pixel bordering the
      plateau is higher than the plateau itself.
    */
    visited[start] = true;
    stack.push(start);
    let mut is_maximum = true;
    while let Some(idx) = stack.pop() {
      plateau.push(idx);
      for neigh in neighbours(&idx, shape, connectivity) {
        let neigh_height = slice[neigh];
        if neigh_height == height {
          if !visited[neigh] {
            visited[neigh] = true;
            stack.push(neigh);
          }
        } else if neigh_height > height {
          is_maximum = false;
        }
      }
    }

    //(2) Mark the whole plateau in one go
    if is_maximum {
      plateau.iter().for_each(|&idx| markers[idx] = Extremum::Maximum);
    }
    plateau.clear();
  }

  markers
}
