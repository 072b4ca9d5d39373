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

//! Stitching of independently labelled z-slices into one global label space.
//!
//! Slices are labelled on their own, so segments that touch across a z-boundary
//! still end up with different labels. Stitching only guarantees that labels are
//! unique over the whole volume; it does not merge segments across slices.

use ndarray as nd;
use rayon::prelude::*;

use crate::{Label, Result, SegmentError};

/// Offset of every slice in the global label space (an exclusive prefix sum of
/// `counts`), together with the total number of labels.
///
/// Fails with [`SegmentError::LabelSpaceExhausted`] as soon as the running
/// offset no longer fits in a [`Label`].
pub fn slice_offsets(counts: &[usize]) -> Result<(Vec<Label>, Label)> {
  let mut offsets = Vec::with_capacity(counts.len());
  let total = counts.iter().enumerate().try_fold(0 as Label, |offset, (slice, &count)| {
    offsets.push(offset);
    Label::try_from(count)
      .ok()
      .and_then(|count| offset.checked_add(count))
      .ok_or(SegmentError::LabelSpaceExhausted { slice })
  })?;
  Ok((offsets, total))
}

/// Moves every slice of `labels` into the global label space: positive labels
/// are decremented by one (labels become zero-based), then the slice's offset
/// is added to every voxel. Returns the total number of labels.
///
/// `counts[z]` must be the highest label of slice `z`.
pub fn stitch(labels: &mut nd::Array3<Label>, counts: &[usize]) -> Result<Label> {
  let (offsets, total) = slice_offsets(counts)?;
  labels.axis_iter_mut(nd::Axis(0)).into_par_iter().zip(offsets.par_iter()).for_each(
    |(mut slice, &offset)| {
      slice.mapv_inplace(|label| label.saturating_sub(1) + offset);
    },
  );
  Ok(total)
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn offsets_are_a_prefix_sum() {
    let (offsets, total) = slice_offsets(&[3, 0, 2, 5]).unwrap();
    assert_eq!(offsets, vec![0, 3, 3, 5]);
    assert_eq!(total, 10);
  }

  #[test]
  fn overflow_is_reported() {
    let counts = [Label::MAX as usize, 1];
    assert_eq!(slice_offsets(&counts), Err(SegmentError::LabelSpaceExhausted { slice: 1 }));
  }

  #[test]
  fn slices_never_share_labels() {
    let mut labels = nd::Array3::from_shape_fn((3, 2, 2), |(_, y, x)| (y * 2 + x) as Label % 3 + 1);
    let total = stitch(&mut labels, &[3, 3, 3]).unwrap();
    assert_eq!(total, 9);
    for z in 0..3 {
      let slice = labels.slice(nd::s![z, .., ..]);
      let lo = 3 * z as Label;
      assert!(slice.iter().all(|&l| (lo..lo + 3).contains(&l)));
    }
  }
}
