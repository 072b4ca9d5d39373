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

//! This module contains all the code required to generate images of the seeds
//! and labels of a segmentation, including the included colour maps.

use ndarray as nd;
use num_traits::ToPrimitive;
use plotters::prelude::*;
use std::{error::Error, path::Path};

//Colour for background (label zero) px
const BACKGROUND_COL: RGBColor = BLACK;

pub fn plot_slice<'a, T>(
  slice: nd::ArrayView2<'a, T>,
  file_name: &Path,
  color_map: fn(count: T, min: T, max: T) -> Result<RGBColor, Box<dyn Error>>,
) -> Result<(), Box<dyn Error>>
where
  T: Default + std::fmt::Display + std::cmp::PartialOrd + ToPrimitive + Copy,
{
  //Get min and max vals of slice
  let min = slice.iter().fold(T::default(), |f: T, x: &T| if *x < f { *x } else { f });
  let max = slice.iter().fold(T::default(), |f: T, x: &T| if *x > f { *x } else { f });

  //Get the size of the slice
  let x_size = slice.shape()[0] as u32;
  let y_size = slice.shape()[1] as u32;

  //Make new fig
  let root = BitMapBackend::new(file_name, (x_size, y_size)).into_drawing_area();
  root.fill(&WHITE)?;

  //make empty drawing area in fig
  let mut chart = ChartBuilder::on(&root).build_cartesian_2d(0..x_size, 0..y_size)?;
  chart.configure_mesh().disable_mesh().disable_axes().draw()?;
  let plotting_area = chart.plotting_area();

  //fill pixels
  for ((x, y), px) in slice.indexed_iter() {
    plotting_area.draw_pixel((x as u32, y as u32), &color_map(*px, min, max)?)?
  }

  //save file
  root.present()?;

  #[cfg(feature = "debug")]
  println!("slice saved as png: {file_name:?}; max:{max:2}, min:{min:2}");
  Ok(())
}

#[inline(always)]
pub fn grey_scale<T>(count: T, min: T, max: T) -> Result<RGBColor, Box<dyn Error>>
where
  T: std::fmt::Display + std::cmp::PartialOrd + ToPrimitive,
{
  if count <= min {
    Ok(BACKGROUND_COL)
  } else {
    let (count, min, max) = (
      count.to_f64().ok_or("pixel value is not a number")?,
      min.to_f64().ok_or("minimum is not a number")?,
      max.to_f64().ok_or("maximum is not a number")?,
    );
    let gray = (255.0 * (count - min) / (max - min)) as u8;
    Ok(RGBColor(gray, gray, gray))
  }
}

/// Gives neighbouring labels clearly distinct colours by walking around the
/// hue circle in golden-ratio steps. Label zero is drawn black, which suits
/// seed images where zero marks unseeded pixels.
#[inline(always)]
pub fn label_colours<T>(count: T, min: T, max: T) -> Result<RGBColor, Box<dyn Error>>
where
  T: std::fmt::Display + std::cmp::PartialOrd + ToPrimitive,
{
  if count.to_u64() == Some(0) {
    return Ok(BACKGROUND_COL);
  }
  segment_colours(count, min, max)
}

/// Same hue walk as [`label_colours`], but label zero is coloured like any
/// other label. Stitched labels start at zero, so this is the map for them.
#[inline(always)]
pub fn segment_colours<T>(count: T, _min: T, _max: T) -> Result<RGBColor, Box<dyn Error>>
where
  T: std::fmt::Display + std::cmp::PartialOrd + ToPrimitive,
{
  const GOLDEN: f64 = 0.618_033_988_749_895;
  let label = count.to_u64().ok_or("labels must be non-negative integers")?;
  //Offset by one so label zero does not land on pure red
  let hue = ((label + 1) as f64 * GOLDEN).fract();
  let (r, g, b) = HSLColor(hue, 0.7, 0.55).rgb();
  Ok(RGBColor(r, g, b))
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn segment_zero_is_not_background() {
    assert_eq!(label_colours(0u32, 0, 4).unwrap(), BACKGROUND_COL);
    assert_ne!(segment_colours(0u32, 0, 4).unwrap(), BACKGROUND_COL);
    assert_eq!(label_colours(3u32, 0, 4).unwrap(), segment_colours(3u32, 0, 4).unwrap());
  }
}
