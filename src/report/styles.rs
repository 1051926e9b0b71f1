//! Shared palette and layout constants for the PDF reports.

use printpdf::{Color, Rgb};

/// Palette entry, linear RGB in 0..=1. Converted lazily because
/// `printpdf::Color` is not const-constructible.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Tone(pub f32, pub f32, pub f32);

impl From<Tone> for Color {
    fn from(t: Tone) -> Self {
        Color::Rgb(Rgb::new(t.0 as _, t.1 as _, t.2 as _, None))
    }
}

// Clinical palette (hex values from the product style guide).
pub(crate) const AZUL_OSCURO: Tone = Tone(0.102, 0.137, 0.196); // #1a2332
pub(crate) const AZUL_MEDIO: Tone = Tone(0.173, 0.243, 0.314); // #2c3e50
pub(crate) const GRIS_TEXTO: Tone = Tone(0.176, 0.216, 0.282); // #2d3748
pub(crate) const GRIS_LINEA: Tone = Tone(0.796, 0.835, 0.878); // #cbd5e0
pub(crate) const VERDE_CLINICO: Tone = Tone(0.020, 0.588, 0.412); // #059669
pub(crate) const ROJO_CLINICO: Tone = Tone(0.863, 0.149, 0.149); // #dc2626
pub(crate) const FONDO_CLARO: Tone = Tone(0.973, 0.980, 0.988); // #f8fafc
pub(crate) const GRIS_CLARO: Tone = Tone(0.392, 0.455, 0.545); // #64748b
pub(crate) const GRIS_MUY_CLARO: Tone = Tone(0.580, 0.639, 0.722); // #94a3b8
pub(crate) const BARRA_FONDO: Tone = Tone(0.886, 0.910, 0.941); // #e2e8f0
pub(crate) const BLANCO: Tone = Tone(1.0, 1.0, 1.0);

use super::IN;

// Shared layout grid, in millimetres.
pub(crate) const MARGIN_H: f32 = 0.6 * IN;
pub(crate) const HEADER_HEIGHT: f32 = 0.9 * IN;
