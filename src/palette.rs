//! Discrete colour palettes sampled from continuous colour maps.

use strum_macros::{Display, EnumIter, EnumString};

use crate::error::{Error, Result};

/// Colour with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub fn to_rgba8(self) -> [u8; 4] {
        let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [channel(self.r), channel(self.g), channel(self.b), channel(self.a)]
    }
}

impl From<colorous::Color> for Rgba {
    fn from(color: colorous::Color) -> Self {
        Self {
            r: color.r as f64 / 255.0,
            g: color.g as f64 / 255.0,
            b: color.b as f64 / 255.0,
            a: 1.0,
        }
    }
}

/// A continuous colour map over `t` in `[0, 1]`.
pub trait Colormap {
    fn eval(&self, t: f64) -> Rgba;
}

impl<F: Fn(f64) -> Rgba> Colormap for F {
    fn eval(&self, t: f64) -> Rgba {
        self(t)
    }
}

impl Colormap for colorous::Gradient {
    fn eval(&self, t: f64) -> Rgba {
        self.eval_continuous(t).into()
    }
}

/// Named colour maps available to [`generate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumIter, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ColormapName {
    #[default]
    GistRainbow,
    Rainbow,
    Sinebow,
    Turbo,
    Viridis,
    Inferno,
    Magma,
    Plasma,
    Cividis,
    Warm,
    Cool,
    Cubehelix,
    Spectral,
    RedBlue,
    Greys,
}

impl ColormapName {
    pub fn gradient(self) -> colorous::Gradient {
        match self {
            // full-hue sweep starting at red, the closest match to gist_rainbow
            Self::GistRainbow | Self::Sinebow => colorous::SINEBOW,
            Self::Rainbow => colorous::RAINBOW,
            Self::Turbo => colorous::TURBO,
            Self::Viridis => colorous::VIRIDIS,
            Self::Inferno => colorous::INFERNO,
            Self::Magma => colorous::MAGMA,
            Self::Plasma => colorous::PLASMA,
            Self::Cividis => colorous::CIVIDIS,
            Self::Warm => colorous::WARM,
            Self::Cool => colorous::COOL,
            Self::Cubehelix => colorous::CUBEHELIX,
            Self::Spectral => colorous::SPECTRAL,
            Self::RedBlue => colorous::RED_BLUE,
            Self::Greys => colorous::GREYS,
        }
    }
}

impl Colormap for ColormapName {
    fn eval(&self, t: f64) -> Rgba {
        self.gradient().eval(t)
    }
}

/// `count` colours from the colour map called `name`, evenly spaced from one
/// end of the map to the other.
pub fn generate(count: usize, name: &str) -> Result<Vec<Rgba>> {
    let colormap: ColormapName = name
        .parse()
        .map_err(|_| Error::invalid(format!("unknown colormap '{name}'")))?;
    generate_with(count, &colormap)
}

/// Sample `colormap` at `t = i / (count - 1)` for `i` in `0..count`.
pub fn generate_with<C: Colormap + ?Sized>(count: usize, colormap: &C) -> Result<Vec<Rgba>> {
    if count < 2 {
        return Err(Error::invalid(format!(
            "a palette needs at least 2 colours, got {count}"
        )));
    }
    let last = (count - 1) as f64;
    Ok((0..count).map(|i| colormap.eval(i as f64 / last)).collect())
}
