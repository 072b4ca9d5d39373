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
use ndarray_rand::{rand_distr::Uniform, RandomExt};
use wsdt_anisotropic::prelude::*;

//This constant determines the randomly generated volumes' sizes
const RF_SIZE: (usize, usize, usize) = (4, 48, 48);

fn diagonal_band() -> nd::Array3<f32> {
  nd::Array3::from_shape_fn((2, 4, 4), |(_, y, x)| if x == y { 1.0 } else { 0.0 })
}

fn random_pmap() -> nd::Array3<f32> {
  nd::Array3::<f32>::random(RF_SIZE, Uniform::new(0.0, 1.0))
}

fn distinct(labels: nd::ArrayView2<Label>) -> Vec<Label> {
  let mut used: Vec<Label> = labels.iter().copied().collect();
  used.sort_unstable();
  used.dedup();
  used
}

/// Labels `0..total` are all used, and no label shows up in two slices
fn assert_globally_unique(labels: &nd::Array3<Label>, total: Label) {
  let mut seen = Vec::new();
  for slice in labels.outer_iter() {
    let used = distinct(slice);
    assert!(used.iter().all(|label| !seen.contains(label)), "label shared between slices");
    seen.extend(used);
  }
  seen.sort_unstable();
  assert_eq!(seen, (0..total).collect::<Vec<_>>());
}

#[test]
fn test_diagonal_membrane() {
  let pmap = diagonal_band();
  let (labels, total) = segment(pmap.view(), 0.5, 1.0, 0.5, 0.0, 0, true, true, false).unwrap();

  assert_eq!(total, 4);
  assert_eq!(distinct(labels.slice(nd::s![0, .., ..])), vec![0, 1]);
  assert_eq!(distinct(labels.slice(nd::s![1, .., ..])), vec![2, 3]);

  //The two halves of every slice end up in different segments
  for z in 0..2 {
    assert_ne!(labels[[z, 0, 3]], labels[[z, 3, 0]]);
    assert_eq!(labels[[z, 0, 2]], labels[[z, 1, 3]]);
    assert_eq!(labels[[z, 2, 0]], labels[[z, 3, 1]]);
  }
}

#[test]
fn test_diagonal_membrane_on_distance_transform() {
  let pmap = diagonal_band();
  for preserve in [true, false] {
    let watershed = SegmentationBuilder::new(0.5, 1.0, 0.5)
      .set_grow_on_pmap(false)
      .set_preserve_membrane_pmaps(preserve)
      .build()
      .unwrap();
    let (labels, total) = watershed.segment(pmap.view()).unwrap();
    assert_eq!(total, 4);
    assert_globally_unique(&labels, total);
  }
}

#[test]
fn test_no_membranes() {
  let pmap = nd::Array3::<f32>::zeros((3, 5, 6));
  let watershed = SegmentationBuilder::new(0.5, 2.0, 1.0).build().unwrap();
  let (labels, total) = watershed.segment(pmap.view()).unwrap();

  //One segment per slice
  assert_eq!(total, 3);
  for (z, slice) in labels.outer_iter().enumerate() {
    assert_eq!(distinct(slice), vec![z as Label]);
  }
}

#[test]
fn test_degenerate_thresholds() {
  let pmap = random_pmap();
  for threshold in [-1.0, 0.0, 1.5] {
    let watershed = SegmentationBuilder::new(threshold, 3.0, 1.0).build().unwrap();
    let (labels, total) = watershed.segment(pmap.view()).unwrap();
    assert!(total >= RF_SIZE.0 as Label);
    assert_globally_unique(&labels, total);
  }
}

#[test]
fn test_invalid_shapes() {
  let cube = nd::Array3::<f32>::zeros((4, 4, 4));
  let watershed = SegmentationBuilder::new(0.5, 1.0, 1.0).build().unwrap();
  assert_eq!(
    watershed.segment(cube.view()).unwrap_err(),
    SegmentError::InvalidShape { shape: vec![4, 4, 4] }
  );

  let tall = nd::Array3::<f32>::zeros((5, 3, 8));
  assert!(matches!(watershed.segment(tall.view()), Err(SegmentError::InvalidShape { .. })));

  let flat = nd::Array2::<f32>::zeros((8, 8));
  assert_eq!(
    segment(flat.view(), 0.5, 1.0, 1.0, 0.0, 0, true, true, false).unwrap_err(),
    SegmentError::InvalidShape { shape: vec![8, 8] }
  );
}

#[test]
fn test_non_finite_input() {
  let mut pmap = nd::Array3::<f64>::zeros((2, 6, 6));
  pmap[[1, 2, 3]] = f64::NAN;
  let watershed = SegmentationBuilder::new(0.5, 1.0, 1.0).build().unwrap();
  assert_eq!(
    watershed.segment(pmap.view()).unwrap_err(),
    SegmentError::NonFiniteProbability { index: [1, 2, 3] }
  );
}

#[test]
fn test_invalid_parameters() {
  assert!(SegmentationBuilder::new(0.5, -1.0, 1.0).build().is_err());
  assert!(SegmentationBuilder::new(0.5, 1.0, f64::INFINITY).build().is_err());
  assert!(SegmentationBuilder::new(f64::NAN, 1.0, 1.0).build().is_err());
  assert!(SegmentationBuilder::new(0.5, 1.0, 1.0).set_sigma_weights(-0.5).build().is_err());
  assert!(SegmentationBuilder::new(0.5, 0.0, 0.0).build().is_ok());
}

#[test]
fn test_integer_input() {
  //Probabilities stored as 0/1 bytes segment just like floats
  let pmap = diagonal_band().mapv(|px| px as u8);
  let (_, total) = segment(pmap.view(), 0.5, 1.0, 0.5, 0.0, 0, true, true, false).unwrap();
  assert_eq!(total, 4);
}

#[test]
fn test_random_field_is_partitioned() {
  let pmap = random_pmap();
  for connectivity in [Connectivity::Four, Connectivity::Eight] {
    for group_seeds in [false, true] {
      let watershed = SegmentationBuilder::new(0.5, 4.0, 1.5)
        .set_group_seeds(group_seeds)
        .set_connectivity(connectivity)
        .set_sigma_weights(1.0)
        .build()
        .unwrap();
      let (labels, total) = watershed.segment(pmap.view()).unwrap();
      assert_eq!(labels.dim(), RF_SIZE);
      assert_globally_unique(&labels, total);
    }
  }
}

#[test]
fn test_grouping_never_adds_seeds() {
  let pmap = random_pmap();
  let split = SegmentationBuilder::new(0.5, 4.0, 1.0).build().unwrap();
  let grouped = SegmentationBuilder::new(0.5, 4.0, 1.0).set_group_seeds(true).build().unwrap();
  let (_, split_total) = split.segment(pmap.view()).unwrap();
  let (_, grouped_total) = grouped.segment(pmap.view()).unwrap();
  assert!(grouped_total <= split_total);
}

#[test]
fn test_min_segment_size() {
  const MIN_SIZE: usize = 40;
  let pmap = random_pmap();
  for filter in [SizeFilter::MergeLongestBoundary, SizeFilter::Reflood] {
    let watershed = SegmentationBuilder::new(0.5, 4.0, 2.0)
      .set_min_segment_size(MIN_SIZE)
      .set_size_filter(filter)
      .build()
      .unwrap();
    let (labels, total) = watershed.segment(pmap.view()).unwrap();
    assert_globally_unique(&labels, total);

    let mut sizes = vec![0usize; total as usize];
    labels.iter().for_each(|&label| sizes[label as usize] += 1);
    assert!(sizes.iter().all(|&size| size >= MIN_SIZE), "{filter:?}: {sizes:?}");
  }
}

#[test]
fn test_deterministic() {
  let pmap = random_pmap();
  let watershed = SegmentationBuilder::new(0.4, 2.5, 1.0)
    .set_group_seeds(true)
    .set_min_segment_size(10)
    .set_grow_on_pmap(false)
    .set_preserve_membrane_pmaps(false)
    .build()
    .unwrap();
  let first = watershed.segment(pmap.view()).unwrap();

  //Thread count must not matter either
  let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
  let second = pool.install(|| watershed.segment(pmap.view()).unwrap());
  assert_eq!(first, second);
}

#[test]
fn test_slices_are_not_merged_across_z() {
  //A single column of cells, perfectly aligned across z
  let pmap = nd::Array3::from_shape_fn((3, 10, 10), |(_, y, _)| if y == 5 { 1.0f32 } else { 0.0 });
  let (labels, total) = segment(pmap.view(), 0.5, 1.0, 1.0, 0.0, 0, true, true, false).unwrap();
  assert_eq!(total, 6);
  assert_ne!(labels[[0, 0, 0]], labels[[1, 0, 0]]);
  assert_ne!(labels[[1, 9, 9]], labels[[2, 9, 9]]);
}

#[test]
fn test_tiny_anisotropy() {
  //The z smoothing scale becomes enormous, but the z axis is only two slices long
  let pmap = diagonal_band();
  let (labels, total) = segment(pmap.view(), 0.5, 1e-12, 1.0, 0.0, 0, true, true, false).unwrap();
  assert_eq!(total, 4);
  assert_globally_unique(&labels, total);
}

#[test]
fn test_vanishing_sigma_matches_zero_sigma() {
  let pmap = diagonal_band();
  let (zero, total) = segment(pmap.view(), 0.5, 1.0, 0.0, 0.0, 0, true, true, false).unwrap();
  assert_eq!(total, 4);
  let (tiny, tiny_total) = segment(pmap.view(), 0.5, 1.0, 1e-200, 1e-200, 0, true, true, false).unwrap();
  assert_eq!(tiny_total, total);
  assert_eq!(tiny, zero);
}
