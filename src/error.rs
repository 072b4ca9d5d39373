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

//! Error types returned by the segmentation pipeline.

use thiserror::Error;

/// Everything that can make [`crate::AnisotropicWatershed::segment`] bail out.
/// Failures are always raised before any voxel of the output is written.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentError {
  /// The probability map is not 3D, or its z-extent is not strictly the
  /// smallest of the three axes.
  #[error("invalid input shape {shape:?}: expected (z, y, x) with z < y and z < x")]
  InvalidShape { shape: Vec<usize> },

  /// A builder parameter was out of range
  #[error("invalid parameter: {0}")]
  InvalidParameter(String),

  /// An input voxel could not be represented as a finite `f32`
  #[error("probability at {index:?} is not a finite number")]
  NonFiniteProbability { index: [usize; 3] },

  /// The running label offset no longer fits in a [`crate::Label`]
  #[error("label space exhausted while stitching slice {slice}")]
  LabelSpaceExhausted { slice: usize },
}

/// Result type for the segmentation pipeline
pub type Result<T> = std::result::Result<T, SegmentError>;
