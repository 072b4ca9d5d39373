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

//! Numeric primitives the pipeline is built on: an anisotropic Euclidean
//! distance transform, separable Gaussian smoothing, plateau-aware local maxima
//! detection and connected-component labelling.
//!
//! All of them work on `ndarray` arrays and use `rayon` to process independent
//! lines or slices. Every line is computed by exactly one task, so the results
//! do not depend on how the work is scheduled.

mod edt;
mod gaussian;
mod label;
mod maxima;

pub use edt::distance_transform;
pub use gaussian::gaussian_smooth;
pub use label::{label_components, relabel_consecutive};
pub use maxima::{local_maxima, Extremum};
