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

/// Anisotropic Euclidean distance transform of a 3D mask.
///
/// Voxels where `mask == foreground` get distance zero. All other voxels get the
/// Euclidean distance to the closest `foreground` voxel, where a step along
/// axis `i` has length `pitch[i]`. A pitch of zero makes movement along that
/// axis free.
///
/// If the mask contains no `foreground` voxel at all, the distance saturates at
/// the physical diagonal of the volume, so the output is always finite.
///
/// The transform is exact: it is the separable lower-envelope-of-parabolas
/// algorithm by Felzenszwalb & Huttenlocher (2012), applied once per axis.
pub fn distance_transform(
  mask: nd::ArrayView3<bool>,
  pitch: [f64; 3],
  foreground: bool,
) -> nd::Array3<f32> {
  //(1) squared distance: zero on the sites, infinite everywhere else
  let mut sq_dist = mask.mapv(|px| if px == foreground { 0.0f64 } else { f64::INFINITY });

  //(2) one pass of the 1D transform along every axis. Lanes are independent
  for (axis, &axis_pitch) in pitch.iter().enumerate().rev() {
    nd::Zip::from(sq_dist.lanes_mut(nd::Axis(axis)))
      .par_for_each(|lane| squared_edt_1d(lane, axis_pitch));
  }

  //(3) take the root and saturate voxels that never saw a site
  let saturated = mask
    .shape()
    .iter()
    .zip(pitch.iter())
    .map(|(&len, &p)| (len as f64 * p).powi(2))
    .sum::<f64>()
    .sqrt();
  sq_dist.mapv(|d2| if d2.is_finite() { d2.sqrt() as f32 } else { saturated as f32 })
}

/// In-place 1D squared distance transform of a sampled function `f`:
/// `d(p) = min_q f(q) + (pitch * (p - q))²`. Infinite samples are not sites.
fn squared_edt_1d(mut line: nd::ArrayViewMut1<f64>, pitch: f64) {
  let f = line.to_vec();
  let sites: Vec<usize> = (0..f.len()).filter(|&q| f[q].is_finite()).collect();
  if sites.is_empty() {
    return;
  }

  //Zero pitch: distance along this axis costs nothing
  if pitch == 0.0 {
    let min = sites.iter().map(|&q| f[q]).fold(f64::INFINITY, f64::min);
    line.fill(min);
    return;
  }

  let w2 = pitch * pitch;
  let intersect = |q: usize, p: usize| -> f64 {
    let (qf, pf) = (q as f64, p as f64);
    ((f[q] + w2 * qf * qf) - (f[p] + w2 * pf * pf)) / (2.0 * w2 * (qf - pf))
  };

  /*(1) Build the lower envelope
    `parabola[k]` is the site of the k-th parabola in the envelope, and the
    k-th parabola is the lowest one on the interval [bound[k], bound[k+1]).
  */
  let mut parabola = vec![0usize; sites.len()];
  let mut bound = vec![0.0f64; sites.len() + 1];
  let mut k = 0;
  parabola[0] = sites[0];
  bound[0] = f64::NEG_INFINITY;
  bound[1] = f64::INFINITY;
  for &q in &sites[1..] {
    let mut s = intersect(q, parabola[k]);
    //bound[0] is -inf, so this never runs past the first parabola
    while s <= bound[k] {
      k -= 1;
      s = intersect(q, parabola[k]);
    }
    k += 1;
    parabola[k] = q;
    bound[k] = s;
    bound[k + 1] = f64::INFINITY;
  }

  //(2) Sample the envelope
  k = 0;
  for (p, px) in line.iter_mut().enumerate() {
    while bound[k + 1] < p as f64 {
      k += 1;
    }
    let dp = p as f64 - parabola[k] as f64;
    *px = w2 * dp * dp + f[parabola[k]];
  }
}
