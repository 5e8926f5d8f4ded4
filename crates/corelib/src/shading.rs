use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// How the subject mesh is shaded. Exactly one is active per frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShadingMode {
    /// Mirror-like environment map lookup.
    #[default]
    Reflective,
    /// Environment map seen through the surface.
    Refractive,
    /// Direct Phong lighting, no environment.
    PhongWireframe,
}

impl ShadingMode {
    pub const ALL: [ShadingMode; 3] = [
        ShadingMode::Reflective,
        ShadingMode::Refractive,
        ShadingMode::PhongWireframe,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ShadingMode::Reflective => "reflect",
            ShadingMode::Refractive => "refract",
            ShadingMode::PhongWireframe => "phong",
        }
    }
}

impl fmt::Display for ShadingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ShadingMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reflect" | "reflective" | "reflection" => Ok(ShadingMode::Reflective),
            "refract" | "refractive" | "refraction" => Ok(ShadingMode::Refractive),
            "phong" | "wireframe" | "phong-wireframe" => Ok(ShadingMode::PhongWireframe),
            other => Err(CoreError::UnknownMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_back() {
        for mode in ShadingMode::ALL {
            assert_eq!(mode.label().parse::<ShadingMode>(), Ok(mode));
        }
        assert_eq!("Refraction".parse::<ShadingMode>(), Ok(ShadingMode::Refractive));
        assert_eq!(
            "toon".parse::<ShadingMode>(),
            Err(CoreError::UnknownMode("toon".into()))
        );
    }
}
