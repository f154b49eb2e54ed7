//! Diagnostic classification
//!
//! Maps a 0-100 index to one of four ordered severity bands. The thresholds below are
//! the only ones in the codebase; summary text, dimension labels and recommendation
//! selection all go through [`classify`].
//!
//! | Band       | Range     | Color   |
//! |------------|-----------|---------|
//! | CRITICO    | [0, 40)   | red     |
//! | FRAGIL     | [40, 60)  | orange  |
//! | PRECAUCION | [60, 80)  | amber   |
//! | SOLIDO     | [80, 100] | emerald |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::questions::Dimension;
use crate::Error;

/// Maximum index value
pub const SCORE_MAX: u8 = 100;

const FRAGIL_FROM: u8 = 40;
const PRECAUCION_FROM: u8 = 60;
const SOLIDO_FROM: u8 = 80;

/// Severity band, ordered from worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticBand {
    Critico,
    Fragil,
    Precaucion,
    Solido,
}

impl DiagnosticBand {
    /// Stable identifier stored with snapshots
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticBand::Critico => "CRITICO",
            DiagnosticBand::Fragil => "FRAGIL",
            DiagnosticBand::Precaucion => "PRECAUCION",
            DiagnosticBand::Solido => "SOLIDO",
        }
    }

    pub fn color(&self) -> ColorTag {
        match self {
            DiagnosticBand::Critico => ColorTag::Red,
            DiagnosticBand::Fragil => ColorTag::Orange,
            DiagnosticBand::Precaucion => ColorTag::Amber,
            DiagnosticBand::Solido => ColorTag::Emerald,
        }
    }
}

impl fmt::Display for DiagnosticBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiagnosticBand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CRITICO" => Ok(DiagnosticBand::Critico),
            "FRAGIL" => Ok(DiagnosticBand::Fragil),
            "PRECAUCION" => Ok(DiagnosticBand::Precaucion),
            "SOLIDO" => Ok(DiagnosticBand::Solido),
            other => Err(Error::InvalidInput(format!("Unknown diagnostic band: {}", other))),
        }
    }
}

/// Semantic color tag consumed by the front end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTag {
    Red,
    Orange,
    Amber,
    Emerald,
}

/// Classified result with its static presentation copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticState {
    pub band: DiagnosticBand,
    pub label: &'static str,
    pub color: ColorTag,
    pub positive_heading: &'static str,
    pub traffic_light_heading: &'static str,
    pub recommendation: &'static str,
}

/// Classify an index into its band
///
/// Total over `u8`: anything above 100 is treated as 100.
pub fn classify(score: u8) -> DiagnosticState {
    let band = match score.min(SCORE_MAX) {
        s if s < FRAGIL_FROM => DiagnosticBand::Critico,
        s if s < PRECAUCION_FROM => DiagnosticBand::Fragil,
        s if s < SOLIDO_FROM => DiagnosticBand::Precaucion,
        _ => DiagnosticBand::Solido,
    };
    state_for(band)
}

/// Static copy for a band
pub fn state_for(band: DiagnosticBand) -> DiagnosticState {
    match band {
        DiagnosticBand::Critico => DiagnosticState {
            band,
            label: "Crítico",
            color: band.color(),
            positive_heading: "Lo que todavía os une",
            traffic_light_heading: "Semáforo rojo: la relación necesita atención urgente",
            recommendation: "Buscad apoyo profesional de pareja cuanto antes y acordad un espacio seguro para hablar sin reproches.",
        },
        DiagnosticBand::Fragil => DiagnosticState {
            band,
            label: "Frágil",
            color: band.color(),
            positive_heading: "Los cimientos que podéis reforzar",
            traffic_light_heading: "Semáforo naranja: hay grietas que conviene reparar",
            recommendation: "Elegid una sola área de mejora y trabajadla juntos durante las próximas semanas.",
        },
        DiagnosticBand::Precaucion => DiagnosticState {
            band,
            label: "Precaución",
            color: band.color(),
            positive_heading: "Vuestras fortalezas",
            traffic_light_heading: "Semáforo ámbar: buena base con puntos a vigilar",
            recommendation: "Mantened los hábitos que funcionan y revisad periódicamente las áreas más bajas.",
        },
        DiagnosticBand::Solido => DiagnosticState {
            band,
            label: "Sólido",
            color: band.color(),
            positive_heading: "Lo que hacéis especialmente bien",
            traffic_light_heading: "Semáforo verde: una relación sana y estable",
            recommendation: "Seguid cuidando la relación con tiempo de calidad y conversaciones abiertas.",
        },
    }
}

/// One-line summary of a global score
pub fn summary_text(score: u8) -> String {
    let state = classify(score);
    format!("Índice {} / 100: {}", score.min(SCORE_MAX), state.label)
}

/// One-line summary of a dimension score
pub fn dimension_summary(dimension: Dimension, score: u8) -> String {
    let state = classify(score);
    format!("{}: {} ({})", dimension.label(), state.label, score.min(SCORE_MAX))
}
