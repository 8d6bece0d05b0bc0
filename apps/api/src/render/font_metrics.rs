//! Static font-metric tables for the PDF base-14 Helvetica faces.
//!
//! Character widths are in em units (relative to font size), taken from the
//! Adobe AFM files. Oblique faces share the upright widths.
//! All tables cover ASCII 0x20..=0x7E (95 printable characters).
//! Index = (char as usize) - 32.

use printpdf::BuiltinFont;

// ────────────────────────────────────────────────────────────────────────────
// Font face enum
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFace {
    Regular,
    Bold,
    Oblique,
    BoldOblique,
}

impl FontFace {
    pub fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => FontFace::Regular,
            (true, false) => FontFace::Bold,
            (false, true) => FontFace::Oblique,
            (true, true) => FontFace::BoldOblique,
        }
    }

    pub fn builtin(self) -> BuiltinFont {
        match self {
            FontFace::Regular => BuiltinFont::Helvetica,
            FontFace::Bold => BuiltinFont::HelveticaBold,
            FontFace::Oblique => BuiltinFont::HelveticaOblique,
            FontFace::BoldOblique => BuiltinFont::HelveticaBoldOblique,
        }
    }

    pub const ALL: [FontFace; 4] = [
        FontFace::Regular,
        FontFace::Bold,
        FontFace::Oblique,
        FontFace::BoldOblique,
    ];
}

// ────────────────────────────────────────────────────────────────────────────
// Font metric table
// ────────────────────────────────────────────────────────────────────────────

/// Static character-width table for a font face.
///
/// `widths[i]` = width of ASCII character `(i + 32)`, covering 0x20 (space) through 0x7E (~).
pub struct FontMetricTable {
    widths: [f32; 95],
    /// Fallback width for non-ASCII characters (codepoints > 0x7E).
    pub average_char_width: f32,
    /// Width of the inter-word space in em units.
    pub space_width: f32,
}

impl FontMetricTable {
    /// Measures the rendered width of a string in em units.
    ///
    /// Non-ASCII characters fall back to `average_char_width`.
    pub fn measure_str(&self, s: &str) -> f32 {
        s.chars()
            .map(|c| {
                let code = c as usize;
                if (32..=126).contains(&code) {
                    self.widths[code - 32]
                } else {
                    self.average_char_width
                }
            })
            .sum()
    }

    /// Width in millimetres at `size_pt`.
    pub fn measure_mm(&self, s: &str, size_pt: f32) -> f32 {
        self.measure_str(s) * size_pt * PT_TO_MM
    }
}

pub const PT_TO_MM: f32 = 25.4 / 72.0;

// ────────────────────────────────────────────────────────────────────────────
// Static width tables  (95 ASCII printable characters each)
// ────────────────────────────────────────────────────────────────────────────

static HELVETICA_TABLE: FontMetricTable = FontMetricTable {
    #[rustfmt::skip]
    widths: [
        // sp     !      "      #      $      %      &      '      (      )      *      +      ,      -      .      /
        0.278, 0.278, 0.355, 0.556, 0.556, 0.889, 0.667, 0.191, 0.333, 0.333, 0.389, 0.584, 0.278, 0.333, 0.278, 0.278,
        // 0      1      2      3      4      5      6      7      8      9
        0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556,
        // :      ;      <      =      >      ?      @
        0.278, 0.278, 0.584, 0.584, 0.584, 0.556, 1.015,
        // A      B      C      D      E      F      G      H      I      J      K      L      M
        0.667, 0.667, 0.722, 0.722, 0.667, 0.611, 0.778, 0.722, 0.278, 0.500, 0.667, 0.556, 0.833,
        // N      O      P      Q      R      S      T      U      V      W      X      Y      Z
        0.722, 0.778, 0.667, 0.778, 0.722, 0.667, 0.611, 0.722, 0.667, 0.944, 0.667, 0.667, 0.611,
        // [      \      ]      ^      _      `
        0.278, 0.278, 0.278, 0.469, 0.556, 0.333,
        // a      b      c      d      e      f      g      h      i      j      k      l      m
        0.556, 0.556, 0.500, 0.556, 0.556, 0.278, 0.556, 0.556, 0.222, 0.222, 0.500, 0.222, 0.833,
        // n      o      p      q      r      s      t      u      v      w      x      y      z
        0.556, 0.556, 0.556, 0.556, 0.333, 0.500, 0.278, 0.556, 0.500, 0.722, 0.500, 0.500, 0.500,
        // {      |      }      ~
        0.334, 0.260, 0.334, 0.584,
    ],
    average_char_width: 0.556,
    space_width: 0.278,
};

static HELVETICA_BOLD_TABLE: FontMetricTable = FontMetricTable {
    #[rustfmt::skip]
    widths: [
        // sp     !      "      #      $      %      &      '      (      )      *      +      ,      -      .      /
        0.278, 0.333, 0.474, 0.556, 0.556, 0.889, 0.722, 0.238, 0.333, 0.333, 0.389, 0.584, 0.278, 0.333, 0.278, 0.278,
        // 0      1      2      3      4      5      6      7      8      9
        0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556,
        // :      ;      <      =      >      ?      @
        0.333, 0.333, 0.584, 0.584, 0.584, 0.611, 0.975,
        // A      B      C      D      E      F      G      H      I      J      K      L      M
        0.722, 0.722, 0.722, 0.722, 0.667, 0.611, 0.778, 0.722, 0.278, 0.556, 0.722, 0.611, 0.833,
        // N      O      P      Q      R      S      T      U      V      W      X      Y      Z
        0.722, 0.778, 0.667, 0.778, 0.722, 0.667, 0.611, 0.722, 0.667, 0.944, 0.667, 0.667, 0.611,
        // [      \      ]      ^      _      `
        0.333, 0.278, 0.333, 0.584, 0.556, 0.333,
        // a      b      c      d      e      f      g      h      i      j      k      l      m
        0.556, 0.611, 0.556, 0.611, 0.556, 0.333, 0.611, 0.611, 0.278, 0.278, 0.556, 0.278, 0.889,
        // n      o      p      q      r      s      t      u      v      w      x      y      z
        0.611, 0.611, 0.611, 0.611, 0.389, 0.556, 0.333, 0.611, 0.556, 0.778, 0.556, 0.556, 0.500,
        // {      |      }      ~
        0.389, 0.280, 0.389, 0.584,
    ],
    average_char_width: 0.611,
    space_width: 0.278,
};

/// Returns the static metric table for a face.
pub fn get_metrics(face: FontFace) -> &'static FontMetricTable {
    match face {
        FontFace::Regular | FontFace::Oblique => &HELVETICA_TABLE,
        FontFace::Bold | FontFace::BoldOblique => &HELVETICA_BOLD_TABLE,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
