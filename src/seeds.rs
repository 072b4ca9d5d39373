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

//! Seed extraction: smoothed local maxima of the distance field, labelled per
//! z-slice and optionally grouped by a distance heuristic.

use ndarray as nd;
use rayon::prelude::*;

use crate::kernels::{self, Extremum};
use crate::{Connectivity, Label};

/// Finds watershed seeds in every z-slice of a signed distance field.
///
/// The field is first smoothed with a Gaussian of standard deviation
/// `sigma_seeds` in-plane and `sigma_seeds / anisotropy` along z, which makes
/// the smoothing radius isotropic in physical units. The local maxima of every
/// smoothed slice are then labelled, either one label per connected maximum or,
/// with `group_seeds`, one label per group found by [`group_seeds_by_distance`].
///
/// Labels are unique *within* a slice only and run from 1 to the number of
/// seeds in that slice. Returns the seed map and the seed count per slice.
pub fn anisotropic_seeds(
  distance: nd::ArrayView3<f32>,
  anisotropy: f64,
  sigma_seeds: f64,
  group_seeds: bool,
  connectivity: Connectivity,
) -> (nd::Array3<Label>, Vec<usize>) {
  //Zero anisotropy means an infinitely thin z pitch: no smoothing across slices
  let sigma_z = if anisotropy > 0.0 { sigma_seeds / anisotropy } else { 0.0 };
  let smoothed = kernels::gaussian_smooth(distance, [sigma_z, sigma_seeds, sigma_seeds]);

  let mut seeds = nd::Array3::<Label>::zeros(distance.raw_dim());
  let counts = seeds
    .axis_iter_mut(nd::Axis(0))
    .into_par_iter()
    .zip(smoothed.axis_iter(nd::Axis(0)))
    .zip(distance.axis_iter(nd::Axis(0)))
    .map(|((mut seeds_z, smoothed_z), distance_z)| {
      let (labels, count) = slice_seeds(smoothed_z, distance_z, group_seeds, connectivity);
      seeds_z.assign(&labels);
      count
    })
    .collect();

  (seeds, counts)
}

/// Seed labels for a single slice, see [`anisotropic_seeds`].
pub fn slice_seeds(
  smoothed: nd::ArrayView2<f32>,
  distance: nd::ArrayView2<f32>,
  group_seeds: bool,
  connectivity: Connectivity,
) -> (nd::Array2<Label>, usize) {
  let maxima = kernels::local_maxima(smoothed, connectivity);
  if group_seeds {
    group_seeds_by_distance(maxima.view(), distance, connectivity)
  } else {
    kernels::label_components(maxima.view(), connectivity, Extremum::is_maximum)
  }
}

/// Groups maxima that sit in the same blob of the distance field.
///
/// Connected maxima always share a label. On top of that, two maximum pixels
/// `a` and `b` are put in the same group when their in-plane distance is
/// smaller than `min(distance[a], distance[b])`, i.e. when each lies well
/// inside the inscribed disc of the other. Pixels on or inside a membrane
/// (`distance <= 0`) are never grouped by distance.
///
/// Groups are numbered `1..=n` in raster order of their first pixel.
pub fn group_seeds_by_distance(
  maxima: nd::ArrayView2<Extremum>,
  distance: nd::ArrayView2<f32>,
  connectivity: Connectivity,
) -> (nd::Array2<Label>, usize) {
  let (mut labels, count) = kernels::label_components(maxima, connectivity, Extremum::is_maximum);
  if count < 2 {
    return (labels, count);
  }

  let (rows, cols) = labels.dim();
  let mut groups = DisjointSets::new(count + 1);
  for ((y, x), &label) in labels.indexed_iter() {
    let radius = distance[(y, x)];
    if label == 0 || radius <= 0.0 {
      continue;
    }

    //Only pixels inside our own inscribed disc can be grouped with us
    let reach = radius.ceil() as usize;
    for ny in y.saturating_sub(reach)..y.saturating_add(reach).saturating_add(1).min(rows) {
      for nx in x.saturating_sub(reach)..x.saturating_add(reach).saturating_add(1).min(cols) {
        let other = labels[(ny, nx)];
        if other == 0 || other == label {
          continue;
        }
        let limit = radius.min(distance[(ny, nx)]);
        let (dy, dx) = (ny as f32 - y as f32, nx as f32 - x as f32);
        if limit > 0.0 && dy * dy + dx * dx < limit * limit {
          groups.union(label as usize, other as usize);
        }
      }
    }
  }

  labels.mapv_inplace(|label| if label == 0 { 0 } else { groups.find(label as usize) as Label });
  let count = kernels::relabel_consecutive(labels.view_mut());
  (labels, count)
}

/// Union-find over seed labels. The smaller root always wins, which keeps the
/// grouping independent of the order in which pairs are found.
struct DisjointSets {
  parent: Vec<usize>,
}

impl DisjointSets {
  fn new(len: usize) -> Self {
    DisjointSets { parent: (0..len).collect() }
  }

  fn find(&mut self, mut idx: usize) -> usize {
    while self.parent[idx] != idx {
      //path halving
      self.parent[idx] = self.parent[self.parent[idx]];
      idx = self.parent[idx];
    }
    idx
  }

  fn union(&mut self, a: usize, b: usize) {
    let (ra, rb) = (self.find(a), self.find(b));
    if ra < rb {
      self.parent[rb] = ra;
    } else {
      self.parent[ra] = rb;
    }
  }
}
