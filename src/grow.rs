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

//! Seeded priority-flood watershed on single z-slices, followed by a
//! minimum-size filter.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};

use ndarray as nd;

use crate::{kernels, neighbours, Connectivity, Label};

/// What happens to segments smaller than the configured minimum size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeFilter {
  /// Merge each small segment into the neighbouring segment it shares the
  /// longest boundary with (ties go to the lower label). Smallest segments are
  /// merged first.
  #[default]
  MergeLongestBoundary,
  /// Remove all small segments and flood the freed pixels again from the
  /// surviving segments.
  Reflood,
}

/// Pixel waiting in the flood queue. Ordered so that `BinaryHeap` pops the
/// lowest height first, and among equal heights the earliest queued pixel.
#[derive(Debug, Clone, Copy)]
struct FloodPx {
  height: f32,
  order: usize,
  idx: (usize, usize),
  label: Label,
}

impl Ord for FloodPx {
  fn cmp(&self, other: &Self) -> Ordering {
    other.height.total_cmp(&self.height).then_with(|| other.order.cmp(&self.order))
  }
}

impl PartialOrd for FloodPx {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl PartialEq for FloodPx {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for FloodPx {}

/// Grows the seeds in `labels` over the whole slice and applies the size
/// filter. `labels` holds the seeds on entry (0 = unlabelled) and the
/// segmentation on return. Returns the highest label in the slice, which is
/// also the number of segments.
///
/// A slice without a single seed cannot be flooded: it becomes one segment
/// with label 1.
pub fn grow_slice(
  height: nd::ArrayView2<f32>,
  mut labels: nd::ArrayViewMut2<Label>,
  min_segment_size: usize,
  size_filter: SizeFilter,
  connectivity: Connectivity,
) -> usize {
  if labels.is_empty() {
    return 0;
  }
  if labels.iter().all(|&label| label == 0) {
    labels.fill(1);
    return 1;
  }

  flood(height, labels.view_mut(), connectivity);

  if min_segment_size > 0 {
    match size_filter {
      SizeFilter::MergeLongestBoundary => {
        merge_small_segments(labels.view_mut(), min_segment_size, connectivity)
      }
      SizeFilter::Reflood => {
        reflood_small_segments(height, labels.view_mut(), min_segment_size, connectivity)
      }
    }
    return kernels::relabel_consecutive(labels);
  }

  labels.iter().copied().max().unwrap_or(0) as usize
}

/// Priority flood: every unlabelled pixel gets the label of the region that
/// reaches it first when pixels are entered in order of increasing height.
/// Equal heights are entered in the order in which they were queued; the
/// seeds' neighbours are queued in raster order.
fn flood(height: nd::ArrayView2<f32>, mut labels: nd::ArrayViewMut2<Label>, connectivity: Connectivity) {
  let shape = labels.dim();
  let mut queue = BinaryHeap::new();
  let mut order = 0usize;

  //(1) Queue the unlabelled neighbours of every labelled pixel
  for (idx, &label) in labels.indexed_iter() {
    if label == 0 {
      continue;
    }
    for neigh in neighbours(&idx, shape, connectivity) {
      if labels[neigh] == 0 {
        queue.push(FloodPx { height: height[neigh], order, idx: neigh, label });
        order += 1;
      }
    }
  }

  //(2) Raise the water level
  while let Some(px) = queue.pop() {
    if labels[px.idx] != 0 {
      //Reached earlier by someone else
      continue;
    }
    labels[px.idx] = px.label;
    for neigh in neighbours(&px.idx, shape, connectivity) {
      if labels[neigh] == 0 {
        queue.push(FloodPx { height: height[neigh], order, idx: neigh, label: px.label });
        order += 1;
      }
    }
  }
}

fn segment_sizes(labels: nd::ArrayView2<Label>) -> Vec<usize> {
  let max = labels.iter().copied().max().unwrap_or(0) as usize;
  let mut sizes = vec![0usize; max + 1];
  labels.iter().for_each(|&label| sizes[label as usize] += 1);
  sizes
}

fn merge_small_segments(mut labels: nd::ArrayViewMut2<Label>, min_size: usize, connectivity: Connectivity) {
  let shape = labels.dim();
  let mut sizes = segment_sizes(labels.view());
  let max = sizes.len() - 1;

  //(1) Boundary length between every pair of touching segments
  let mut borders: Vec<BTreeMap<usize, usize>> = vec![BTreeMap::new(); max + 1];
  for (idx, &label) in labels.indexed_iter() {
    for neigh in neighbours(&idx, shape, connectivity) {
      let other = labels[neigh];
      if other != label {
        *borders[label as usize].entry(other as usize).or_insert(0) += 1;
      }
    }
  }

  /*(2) Merge small segments, smallest first
    `merged_into[l] == l` for segments that are still alive. A segment with no
    neighbours at all (a slice holding a single segment) has nowhere to go and
    is left alone.
  */
  let mut merged_into: Vec<usize> = (0..=max).collect();
  let mut queue: BinaryHeap<Reverse<(usize, usize)>> =
    (1..=max).filter(|&l| sizes[l] > 0 && sizes[l] < min_size).map(|l| Reverse((sizes[l], l))).collect();
  while let Some(Reverse((size, small))) = queue.pop() {
    //Entries go stale once their segment grows or is merged away
    if sizes[small] != size || borders[small].is_empty() {
      continue;
    }

    //Longest boundary wins, the lower label breaks ties
    let into = borders[small]
      .iter()
      .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
      .map(|(&label, _)| label);
    let Some(into) = into else { break };

    for (other, len) in std::mem::take(&mut borders[small]) {
      borders[other].remove(&small);
      if other != into {
        *borders[into].entry(other).or_insert(0) += len;
        *borders[other].entry(into).or_insert(0) += len;
      }
    }
    sizes[into] += sizes[small];
    sizes[small] = 0;
    merged_into[small] = into;
    if sizes[into] < min_size {
      queue.push(Reverse((sizes[into], into)));
    }
  }

  //(3) Follow merge chains to the surviving segment
  labels.mapv_inplace(|label| {
    let mut label = label as usize;
    while merged_into[label] != label {
      label = merged_into[label];
    }
    label as Label
  });
}

fn reflood_small_segments(
  height: nd::ArrayView2<f32>,
  mut labels: nd::ArrayViewMut2<Label>,
  min_size: usize,
  connectivity: Connectivity,
) {
  let sizes = segment_sizes(labels.view());
  if sizes.iter().skip(1).all(|&size| size < min_size) {
    //Nothing would survive to flood from
    return;
  }
  labels.mapv_inplace(|label| if sizes[label as usize] < min_size { 0 } else { label });
  flood(height, labels, connectivity);
}
