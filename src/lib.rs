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

//! Wsdt-anisotropic segments 3D membrane-probability volumes (e.g. from electron
//! microscopy) into cell interiors with a seeded watershed on an anisotropic
//! signed distance transform.
//!
//! # Features
//! The pipeline consists of five steps:
//! 1. The probability map is thresholded, and a signed distance transform is
//! computed in which the z-axis has a different voxel pitch than the x/y plane
//! (the *anisotropy* factor).
//! 2. Seeds are placed at the local maxima of the (smoothed) distance
//! transform, separately in every z-slice. Plateaus count as single maxima and
//! maxima on the border of a slice are kept. Optionally, nearby maxima inside
//! the same blob are grouped into a single seed.
//! 3. A height map is selected: the probability map itself, or the inverted
//! distance transform.
//! 4. A seeded priority-flood watershed is run on every z-slice, followed by a
//! minimum segment size filter.
//! 5. The labels of all slices are shifted into one global label space.
//!
//! Since the watershed runs in 2D, segments that touch across a z-boundary are
//! *not* merged: they merely get distinct labels.
//!
//! In addition, `wsdt-anisotropic` provides extra functionality which can be
//! accessed via cargo feature gates. A list of all additional features [can be found
//! below](#cargo-feature-gates).
//!
//! # Quickstart
//! To use the latest release of wsdt-anisotropic in a cargo project, add
//! the wsdt-anisotropic crate as a dependency to your `Cargo.toml` file:
//! ```toml
//! [dependencies]
//! wsdt-anisotropic = "0.1.0"
//! ```
//!
//! ## Short example: segmenting a volume split by a membrane
//! `wsdt-anisotropic` uses the "builder pattern" to configure the segmentation
//! before executing it. To configure a segmentation, create an instance of the
//! `SegmentationBuilder` struct. Once you are done specifying options, call the
//! `build()` function to generate a (`Sync`&`Send`) `AnisotropicWatershed`
//! object, which you can now use to segment as many volumes as you like.
//! ```rust
//! use ndarray as nd;
//! use wsdt_anisotropic::prelude::*;
//!
//! //Two z-slices, each cut in half by a vertical membrane
//! let mut pmap = nd::Array3::<f32>::zeros((2, 16, 16));
//! pmap.slice_mut(nd::s![.., .., 8]).fill(1.0);
//!
//! //threshold, anisotropy and seed smoothing
//! let watershed = SegmentationBuilder::new(0.5, 1.0, 1.0).build().unwrap();
//! let (labels, segments) = watershed.segment(pmap.view()).unwrap();
//! assert_eq!(segments, 4);
//! assert_eq!(labels.shape(), &[2, 16, 16]);
//! ```
//! For one-off use, the [`segment`] function takes all parameters at once.
//!
//! # Cargo feature gates
//! *By default, all features behind cargo feature gates are **disabled***
//! - `jemalloc`: this feature enables the [jemalloc allocator](https://jemalloc.net).
//! Enabling this feature can improve run-time performance on machines with many
//! cores, at the cost of longer compile times. To compile `wsdt-anisotropic`
//! with the `jemalloc` feature, jemalloc must be installed on the host system.
//! - `plots`: with this feature enabled, `wsdt-anisotropic` will write a png of
//! the seeds and of the final labels of every z-slice. Plotting support adds the
//! `plotters` crate as a dependency, [see the `plotters` documentation for
//! details](https://docs.rs/plotters/).
//! - `progress`: this feature enables a progress bar that ticks once for every
//! z-slice that has been flooded. Enabling this feature adds the `indicatif`
//! crate as a dependency.
//! - `debug`: this feature enables debug and performance monitoring output. This
//! can negatively impact performance. Enabling this feature does not add additional
//! dependencies.
//!
//! ## `plots` feature gate
//! Enabling the `plots` feature gate adds two new methods to the `SegmentationBuilder`
//! struct: `set_plot_colour_map`, which can be used to set the colour map that
//! will be used by `plotters` to generate the images and `set_plot_folder`, which
//! can be used to specify folder where the generated images should be placed. If
//! no output folder is specified when the `plots` feature is enabled, no plots will
//! be generated (code will still compile).

//Unconditional imports
use ndarray as nd;
use num_traits::ToPrimitive;
use rayon::prelude::*;

//Set Jemalloc as the global allocator for this crate
#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

//Progress bar (conditional)
#[cfg(feature = "progress")]
use indicatif;

pub mod distance;
mod error;
pub mod grow;
pub mod height;
pub mod kernels;
pub mod seeds;
pub mod stitch;

pub use error::{Result, SegmentError};
pub use grow::SizeFilter;

/// Integer type of all seed and segment labels
pub type Label = u32;

//Utility prelude for batch import
pub mod prelude {
  pub use crate::{
    segment, AnisotropicWatershed, Connectivity, Label, SegmentError, SegmentationBuilder,
    SizeFilter,
  };
  #[cfg(feature = "plots")]
  pub mod color_maps {
    pub use crate::plotting::grey_scale;
    pub use crate::plotting::label_colours;
    pub use crate::plotting::segment_colours;
  }
}

/// Pixel neighbourhood used for maxima detection, labelling, flooding and the
/// size filter alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
  /// Edge neighbours only
  #[default]
  Four,
  /// Edge and corner neighbours
  Eight,
}

////////////////////////////////////////////////////////////////////////////////
//                              HELPER FUNCTIONS                              //
////////////////////////////////////////////////////////////////////////////////

#[cfg(feature = "progress")]
fn set_up_bar(num_slices: usize) -> indicatif::ProgressBar {
  const TEMPLATE: &str = "{spinner}[{elapsed}/{duration}] slice {pos}/{len}{bar:60}";
  let style = indicatif::ProgressStyle::with_template(TEMPLATE);
  let bar = indicatif::ProgressBar::new(num_slices as u64);
  if let Ok(style) = style {
    bar.set_style(style);
  }
  bar
}

#[inline]
fn in_bounds(candidates: &[(isize, isize)], shape: (usize, usize)) -> Vec<(usize, usize)> {
  candidates
    .iter()
    .filter_map(|&(y, x)| {
      if y < 0 || x < 0 || y as usize >= shape.0 || x as usize >= shape.1 {
        None
      } else {
        Some((y as usize, x as usize))
      }
    })
    .collect()
}

#[inline]
fn neighbours_8con(index: &(usize, usize), shape: (usize, usize)) -> Vec<(usize, usize)> {
  let (y, x): (isize, isize) = (index.0 as isize, index.1 as isize);
  in_bounds(
    &[
      (y - 1, x - 1),
      (y - 1, x),
      (y - 1, x + 1),
      (y, x - 1),
      (y, x + 1),
      (y + 1, x - 1),
      (y + 1, x),
      (y + 1, x + 1),
    ],
    shape,
  )
}

#[inline]
fn neighbours_4con(index: &(usize, usize), shape: (usize, usize)) -> Vec<(usize, usize)> {
  let (y, x): (isize, isize) = (index.0 as isize, index.1 as isize);
  in_bounds(&[(y - 1, x), (y, x - 1), (y, x + 1), (y + 1, x)], shape)
}

/// In-bounds neighbours of `index` in a 2D array of the given shape, in raster
/// order.
#[inline]
pub(crate) fn neighbours(
  index: &(usize, usize),
  shape: (usize, usize),
  connectivity: Connectivity,
) -> Vec<(usize, usize)> {
  match connectivity {
    Connectivity::Four => neighbours_4con(index, shape),
    Connectivity::Eight => neighbours_8con(index, shape),
  }
}

/// Inputs must be (z, y, x) with z the coarse, shortest axis.
fn check_shape(shape: &[usize]) -> Result<()> {
  if shape.len() != 3 || shape[0] >= shape[1] || shape[0] >= shape[2] {
    Err(SegmentError::InvalidShape { shape: shape.to_vec() })
  } else {
    Ok(())
  }
}

fn to_f32<T>(pmap: nd::ArrayView3<T>) -> Result<nd::Array3<f32>>
where
  T: ToPrimitive + Copy,
{
  let mut out = nd::Array3::<f32>::zeros(pmap.raw_dim());
  for ((z, y, x), px) in pmap.indexed_iter() {
    out[[z, y, x]] = px
      .to_f32()
      .filter(|px| px.is_finite())
      .ok_or(SegmentError::NonFiniteProbability { index: [z, y, x] })?;
  }
  Ok(out)
}

////////////////////////////////////////////////////////////////////////////////
//                             OPTIONAL MODULES                               //
////////////////////////////////////////////////////////////////////////////////
#[cfg(feature = "debug")]
mod performance_monitoring {

  #[derive(Clone, Debug, Default)]
  pub struct PerfReport {
    pub distance_ms: usize,
    pub seeds_ms: usize,
    pub height_ms: usize,
    pub grow_ms: usize,
    pub stitch_ms: usize,
    pub total_ms: usize,
    pub seeds: Vec<usize>,
    pub segments: Vec<usize>,
  }

  impl PerfReport {
    pub fn stages_total(&self) -> usize {
      self.distance_ms + self.seeds_ms + self.height_ms + self.grow_ms + self.stitch_ms
    }
  }

  impl std::fmt::Display for PerfReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      writeln!(f, ">---------[Performance Summary]---------")?;
      writeln!(f, ">  Distance transform: {}ms", self.distance_ms)?;
      writeln!(f, ">  Seeds: {}ms; Σ {} seeds", self.seeds_ms, self.seeds.iter().sum::<usize>())?;
      writeln!(f, ">  Height map: {}ms", self.height_ms)?;
      writeln!(
        f,
        ">  Flooding: {}ms; Σ {} segments",
        self.grow_ms,
        self.segments.iter().sum::<usize>()
      )?;
      writeln!(f, ">  Stitching: {}ms", self.stitch_ms)?;
      for (z, (seeds, segments)) in self.seeds.iter().zip(self.segments.iter()).enumerate() {
        writeln!(f, ">    slice {z:>4}: {seeds} seeds -> {segments} segments")?;
      }
      writeln!(f, ">--------------------------------+ total")?;
      writeln!(
        f,
        ">  {}ms with {}ms overhead (Δt)",
        self.total_ms,
        self.total_ms.saturating_sub(self.stages_total())
      )
    }
  }
}

#[cfg(feature = "plots")]
pub mod plotting;

////////////////////////////////////////////////////////////////////////////////
//                               SEGMENTATION                                 //
////////////////////////////////////////////////////////////////////////////////

#[cfg(feature = "plots")]
use plotters::prelude::*;

#[derive(Debug, Clone)]
/// Builder for configuring the segmentation.
///
/// The three required parameters are passed to `new()`; all others have
/// defaults and can be changed with the `set_*` methods. Once configured, call
/// `build()` to validate the parameters and obtain an `AnisotropicWatershed`.
///
/// | parameter                 | default                              |
/// |---------------------------|--------------------------------------|
/// | `sigma_weights`           | `0.0` (no smoothing of the height map) |
/// | `min_segment_size`        | `0` (no size filter)                 |
/// | `preserve_membrane_pmaps` | `true`                               |
/// | `grow_on_pmap`            | `true`                               |
/// | `group_seeds`             | `false`                              |
/// | `connectivity`            | `Connectivity::Four`                 |
/// | `size_filter`             | `SizeFilter::MergeLongestBoundary`   |
pub struct SegmentationBuilder {
  //Plotting options
  #[cfg(feature = "plots")]
  plot_path: Option<std::path::PathBuf>,
  #[cfg(feature = "plots")]
  plot_colour_map: Option<
    fn(count: Label, min: Label, max: Label) -> std::result::Result<RGBColor, Box<dyn std::error::Error>>,
  >,

  //Basic segmentation options
  threshold: f64,
  anisotropy: f64,
  sigma_seeds: f64,
  sigma_weights: f64,
  min_segment_size: usize,
  preserve_membrane_pmaps: bool,
  grow_on_pmap: bool,
  group_seeds: bool,
  connectivity: Connectivity,
  size_filter: SizeFilter,
}

impl SegmentationBuilder {
  /// creates a new `SegmentationBuilder`.
  /// - `threshold`: probability at or above which a voxel counts as membrane.
  /// - `anisotropy`: voxel pitch along z relative to the in-plane pitch.
  /// - `sigma_seeds`: in-plane smoothing of the distance transform before
  /// looking for seeds.
  pub fn new(threshold: f64, anisotropy: f64, sigma_seeds: f64) -> Self {
    SegmentationBuilder {
      #[cfg(feature = "plots")]
      plot_path: None,
      #[cfg(feature = "plots")]
      plot_colour_map: None,
      threshold,
      anisotropy,
      sigma_seeds,
      sigma_weights: 0.0,
      min_segment_size: 0,
      preserve_membrane_pmaps: true,
      grow_on_pmap: true,
      group_seeds: false,
      connectivity: Connectivity::default(),
      size_filter: SizeFilter::default(),
    }
  }

  /// Smooth the height map in-plane with this standard deviation before
  /// flooding. Zero disables smoothing.
  pub fn set_sigma_weights(mut self, sigma_weights: f64) -> Self {
    self.sigma_weights = sigma_weights;
    self
  }

  /// Segments with fewer voxels than this are merged away after flooding.
  /// Zero disables the filter.
  pub fn set_min_segment_size(mut self, min_segment_size: usize) -> Self {
    self.min_segment_size = min_segment_size;
    self
  }

  /// Keep the (negated) membrane probabilities inside the membranes instead of
  /// computing an inner distance transform.
  pub fn set_preserve_membrane_pmaps(mut self, preserve: bool) -> Self {
    self.preserve_membrane_pmaps = preserve;
    self
  }

  /// Flood the probability map (`true`) or the inverted distance transform.
  pub fn set_grow_on_pmap(mut self, grow_on_pmap: bool) -> Self {
    self.grow_on_pmap = grow_on_pmap;
    self
  }

  /// Group nearby maxima that lie in the same blob into a single seed.
  pub fn set_group_seeds(mut self, group_seeds: bool) -> Self {
    self.group_seeds = group_seeds;
    self
  }

  pub fn set_connectivity(mut self, connectivity: Connectivity) -> Self {
    self.connectivity = connectivity;
    self
  }

  /// Choose how segments below the minimum size are removed.
  pub fn set_size_filter(mut self, size_filter: SizeFilter) -> Self {
    self.size_filter = size_filter;
    self
  }

  #[cfg(feature = "plots")]
  /// Set a custom colour map to be used by `plotters` when generating images
  /// of the seeds and labels. By default, seeds are drawn with
  /// `label_colours` and the stitched labels with `segment_colours`.
  pub fn set_plot_colour_map(
    mut self,
    colour_map: fn(
      count: Label,
      min: Label,
      max: Label,
    ) -> std::result::Result<RGBColor, Box<dyn std::error::Error>>,
  ) -> Self {
    self.plot_colour_map = Some(colour_map);
    self
  }

  #[cfg(feature = "plots")]
  /// Set output folder for the images generated during the segmentation.
  /// If no output folder is specified, no images will be generated, even with
  /// the `plots` feature gate enabled.
  pub fn set_plot_folder(mut self, path: &std::path::Path) -> Self {
    self.plot_path = Some(path.to_path_buf());
    self
  }

  /// Build an `AnisotropicWatershed` from the current builder configuration.
  /// Returns `SegmentError::InvalidParameter` if the threshold is NaN, or if
  /// the anisotropy or one of the smoothing scales is negative or not finite.
  pub fn build(self) -> Result<AnisotropicWatershed> {
    if self.threshold.is_nan() {
      Err(SegmentError::InvalidParameter("threshold is NaN".to_string()))?
    }
    for (name, value) in [
      ("anisotropy", self.anisotropy),
      ("sigma_seeds", self.sigma_seeds),
      ("sigma_weights", self.sigma_weights),
    ] {
      if !value.is_finite() || value < 0.0 {
        Err(SegmentError::InvalidParameter(format!(
          "{name} must be finite and non-negative, but was set to {value}"
        )))?
      }
    }

    Ok(AnisotropicWatershed {
      #[cfg(feature = "plots")]
      plot_path: self.plot_path,
      #[cfg(feature = "plots")]
      plot_colour_map: self.plot_colour_map,
      threshold: self.threshold,
      anisotropy: self.anisotropy,
      sigma_seeds: self.sigma_seeds,
      sigma_weights: self.sigma_weights,
      min_segment_size: self.min_segment_size,
      preserve_membrane_pmaps: self.preserve_membrane_pmaps,
      grow_on_pmap: self.grow_on_pmap,
      group_seeds: self.group_seeds,
      connectivity: self.connectivity,
      size_filter: self.size_filter,
    })
  }
}

/// A configured, validated segmentation. Build one with `SegmentationBuilder`.
///
/// # Memory usage
/// Besides the output labels (`u32` per voxel), the pipeline holds the input
/// converted to `f32`, the distance transform and its smoothed copy, and the
/// height map: roughly five times the size of an `f32` copy of the input at
/// its peak.
///
/// # Output
/// `segment` returns a label volume of the same shape as the input and the
/// total number of segments `n`. Labels run from `0` to `n - 1`; every label is
/// used by exactly one z-slice.
#[derive(Debug, Clone)]
pub struct AnisotropicWatershed {
  //Plot options
  #[cfg(feature = "plots")]
  plot_path: Option<std::path::PathBuf>,
  #[cfg(feature = "plots")]
  plot_colour_map: Option<
    fn(count: Label, min: Label, max: Label) -> std::result::Result<RGBColor, Box<dyn std::error::Error>>,
  >,
  threshold: f64,
  anisotropy: f64,
  sigma_seeds: f64,
  sigma_weights: f64,
  min_segment_size: usize,
  preserve_membrane_pmaps: bool,
  grow_on_pmap: bool,
  group_seeds: bool,
  connectivity: Connectivity,
  size_filter: SizeFilter,
}

impl AnisotropicWatershed {
  /// Segments a (z, y, x) probability map.
  ///
  /// Fails with `SegmentError::InvalidShape` if z is not strictly the shortest
  /// axis, with `SegmentError::NonFiniteProbability` if a voxel cannot be
  /// converted to a finite `f32`, and with `SegmentError::LabelSpaceExhausted`
  /// if the segment count overflows a [`Label`].
  pub fn segment<T>(&self, pmap: nd::ArrayView3<T>) -> Result<(nd::Array3<Label>, Label)>
  where
    T: ToPrimitive + Copy,
  {
    #[cfg(feature = "debug")]
    let mut perf = crate::performance_monitoring::PerfReport::default();
    #[cfg(feature = "debug")]
    let start = std::time::Instant::now();

    //(0) make sure we are in 3d and that the first axis is z
    check_shape(pmap.shape())?;
    let pmap = to_f32(pmap)?;

    //(1) signed distance transform
    #[cfg(feature = "debug")]
    let stage = std::time::Instant::now();
    let distance = distance::signed_anisotropic_dt(
      pmap.view(),
      self.threshold,
      self.anisotropy,
      self.preserve_membrane_pmaps,
    );
    #[cfg(feature = "debug")]
    {
      perf.distance_ms = stage.elapsed().as_millis() as usize;
    }

    //(2) seeds, labelled per slice
    #[cfg(feature = "debug")]
    let stage = std::time::Instant::now();
    #[allow(unused_variables)]
    let (mut labels, seed_counts) = seeds::anisotropic_seeds(
      distance.view(),
      self.anisotropy,
      self.sigma_seeds,
      self.group_seeds,
      self.connectivity,
    );
    #[cfg(feature = "debug")]
    {
      perf.seeds_ms = stage.elapsed().as_millis() as usize;
      perf.seeds = seed_counts;
    }
    #[cfg(feature = "plots")]
    self.plot_volume(labels.view(), "seeds", self.plot_colour_map.unwrap_or(plotting::label_colours));

    //(3) height map. The distance transform is not needed after this
    #[cfg(feature = "debug")]
    let stage = std::time::Instant::now();
    let hmap =
      height::select_height_map(pmap.view(), distance, self.grow_on_pmap, self.sigma_weights);
    #[cfg(feature = "debug")]
    {
      perf.height_ms = stage.elapsed().as_millis() as usize;
    }

    /*(4) flood every slice
      Slices are independent: each task owns its own slice of the label volume.
      The per-slice segment counts come back in z order.
    */
    #[cfg(feature = "debug")]
    let stage = std::time::Instant::now();
    #[cfg(feature = "progress")]
    let bar = set_up_bar(labels.len_of(nd::Axis(0)));
    let counts: Vec<usize> = labels
      .axis_iter_mut(nd::Axis(0))
      .into_par_iter()
      .zip(hmap.axis_iter(nd::Axis(0)))
      .map(|(labels_z, hmap_z)| {
        let count = grow::grow_slice(
          hmap_z,
          labels_z,
          self.min_segment_size,
          self.size_filter,
          self.connectivity,
        );
        #[cfg(feature = "progress")]
        bar.inc(1);
        count
      })
      .collect();
    #[cfg(feature = "progress")]
    bar.finish();
    #[cfg(feature = "debug")]
    {
      perf.grow_ms = stage.elapsed().as_millis() as usize;
      perf.segments = counts.clone();
    }

    //(5) move all slices into one label space
    #[cfg(feature = "debug")]
    let stage = std::time::Instant::now();
    let total = stitch::stitch(&mut labels, &counts)?;
    #[cfg(feature = "debug")]
    {
      perf.stitch_ms = stage.elapsed().as_millis() as usize;
    }
    #[cfg(feature = "plots")]
    self.plot_volume(labels.view(), "labels", self.plot_colour_map.unwrap_or(plotting::segment_colours));

    //(6) print performance report
    #[cfg(feature = "debug")]
    {
      perf.total_ms = start.elapsed().as_millis() as usize;
      println!("{perf}");
    }

    Ok((labels, total))
  }

  #[cfg(feature = "plots")]
  fn plot_volume(
    &self,
    volume: nd::ArrayView3<Label>,
    prefix: &str,
    colour_map: fn(Label, Label, Label) -> std::result::Result<RGBColor, Box<dyn std::error::Error>>,
  ) {
    if let Some(ref path) = self.plot_path {
      for (z, slice) in volume.outer_iter().enumerate() {
        if let Err(err) = plotting::plot_slice(
          slice,
          &path.join(format!("{prefix}_z{z:04}.png")),
          colour_map,
        ) {
          println!("Could not make {prefix} plot of slice {z}. Error: {err}")
        }
      }
    }
  }
}

/// Segments a (z, y, x) probability map in one call.
///
/// This is a shorthand for configuring a `SegmentationBuilder` with these
/// parameters and calling `segment` on the result. Unlike
/// `AnisotropicWatershed::segment`, it accepts arrays of any dimensionality and
/// fails with `SegmentError::InvalidShape` if the input is not 3D.
///
/// Returns the labels and the number of segments.
#[allow(clippy::too_many_arguments)]
pub fn segment<T, D>(
  pmap: nd::ArrayView<T, D>,
  threshold: f64,
  anisotropy: f64,
  sigma_seeds: f64,
  sigma_weights: f64,
  min_segment_size: usize,
  preserve_membrane_pmaps: bool,
  grow_on_pmap: bool,
  group_seeds: bool,
) -> Result<(nd::Array3<Label>, Label)>
where
  T: ToPrimitive + Copy,
  D: nd::Dimension,
{
  let shape = pmap.shape().to_vec();
  let pmap = pmap.into_dimensionality::<nd::Ix3>().map_err(|_| SegmentError::InvalidShape { shape })?;
  SegmentationBuilder::new(threshold, anisotropy, sigma_seeds)
    .set_sigma_weights(sigma_weights)
    .set_min_segment_size(min_segment_size)
    .set_preserve_membrane_pmaps(preserve_membrane_pmaps)
    .set_grow_on_pmap(grow_on_pmap)
    .set_group_seeds(group_seeds)
    .build()?
    .segment(pmap)
}
