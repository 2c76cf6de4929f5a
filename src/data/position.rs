// ============================================================
// Layer 4 — Tree Position Encodings
// ============================================================
// Optional dense encodings of a formula token's place in its
// tree, fed to the model next to pos_vec/pos_level.
//
//   forte    one-hot of the sibling index per level, levels laid
//            side by side: width = depth * max_formula_width
//   sin_part emb_size split into `depth` equal parts; part l holds
//            a sinusoid of the sibling index at level l
//   sin_add  one emb_size sinusoid per level, summed; level l and
//            sibling index i are folded into l * width + i
//
// Levels whose pos_vec entry is 0 (below the token) contribute
// nothing. TEXT and formula delimiters use the all-zero encoding.

use crate::domain::options::{TrainOptions, Tpe};

/// Sinusoid of `position` written into `out` (sin at even, cos at odd slots).
fn add_sinusoid(out: &mut [f32], position: f32) {
    let dim = out.len() as f32;
    for pair in 0..out.len() / 2 {
        let freq = 1.0 / 10_000f32.powf(2.0 * pair as f32 / dim);
        out[2 * pair] += (position * freq).sin();
        out[2 * pair + 1] += (position * freq).cos();
    }
}

/// Encoding of one formula token.
pub fn encode_pos(pos_vec: &[u32], options: &TrainOptions) -> Vec<f32> {
    let mut encoding = empty_pos_encoding(options);
    let width = options.max_formula_width;
    let levels = pos_vec.iter().take(options.max_formula_depth).enumerate().filter(|(_, p)| **p > 0);

    match options.tpe {
        Tpe::None => {}
        Tpe::Forte => {
            for (level, &index) in levels {
                let slot = (index as usize - 1).min(width - 1);
                encoding[level * width + slot] = 1.0;
            }
        }
        Tpe::SinPart => {
            let part = options.emb_size / options.max_formula_depth;
            for (level, &index) in levels {
                add_sinusoid(&mut encoding[level * part..(level + 1) * part], index as f32);
            }
        }
        Tpe::SinAdd => {
            for (level, &index) in levels {
                add_sinusoid(&mut encoding, (level * width) as f32 + index as f32);
            }
        }
    }
    encoding
}

/// Encoding used by TEXT, START_FORMULA and END_FORMULA tokens.
pub fn empty_pos_encoding(options: &TrainOptions) -> Vec<f32> {
    vec![0.0; options.pos_encoding_width()]
}
