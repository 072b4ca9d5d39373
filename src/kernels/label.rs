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

use crate::{neighbours, Connectivity, Label};

/// Labels the connected components of all pixels for which `is_foreground`
/// holds. Components are numbered `1..=n` in raster order of their first pixel;
/// background pixels get label zero. Returns the labels and `n`.
pub fn label_components<T, F>(
  img: nd::ArrayView2<T>,
  connectivity: Connectivity,
  is_foreground: F,
) -> (nd::Array2<Label>, usize)
where
  F: Fn(&T) -> bool,
{
  let shape = img.dim();
  let mut labels = nd::Array2::<Label>::zeros(shape);
  let mut stack: Vec<(usize, usize)> = Vec::new();
  let mut count: Label = 0;

  for (start, px) in img.indexed_iter() {
    if !is_foreground(px) || labels[start] != 0 {
      continue;
    }
    count += 1;
    labels[start] = count;
    stack.push(start);
    while let Some(idx) = stack.pop() {
      for neigh in neighbours(&idx, shape, connectivity) {
        if labels[neigh] == 0 && is_foreground(&img[neigh]) {
          labels[neigh] = count;
          stack.push(neigh);
        }
      }
    }
  }

  (labels, count as usize)
}

/// Renumbers the non-zero labels of `labels` to `1..=n` in raster order of
/// first appearance, in place. Zero stays zero. Returns `n`.
pub fn relabel_consecutive(mut labels: nd::ArrayViewMut2<Label>) -> usize {
  let mut lut = std::collections::HashMap::<Label, Label>::new();
  for px in labels.iter_mut().filter(|px| **px != 0) {
    let next = lut.len() as Label + 1;
    *px = *lut.entry(*px).or_insert(next);
  }
  lut.len()
}
