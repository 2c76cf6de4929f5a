// ============================================================
// Layer 4 — Sequence Decoder
// ============================================================
// Turns token runs back into text:
//
//   - decode_formula:  OP/VAR/NUM/END run → LaTeX-like string
//   - decode_sequence: a whole sequence → text with formulas
//                      wrapped in " <m> ... </m> "
//
// Formula runs coming out of generation are not guaranteed to be
// balanced, so the tree rebuild never fails: a stray END with no
// open operator is ignored, operators still open at the end of
// the run are closed, and several top-level trees are rendered
// one after another.

use anyhow::Result;

use crate::data::vocab::{FormulaVocab, UNK_SYMBOL};
use crate::domain::token::{TokenType, END_FORMULA_TEXT, START_FORMULA_TEXT};
use crate::domain::traits::TextTokenizer;

#[derive(Debug)]
struct DecodedNode {
    symbol: String,
    children: Vec<DecodedNode>,
}

/// Rebuild the trees described by a flat formula run.
fn rebuild(ids: &[u32], types: &[TokenType], vocab: &FormulaVocab) -> Vec<DecodedNode> {
    let mut roots = Vec::new();
    let mut open: Vec<DecodedNode> = Vec::new();

    let attach = |node: DecodedNode, open: &mut Vec<DecodedNode>, roots: &mut Vec<DecodedNode>| {
        match open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => roots.push(node),
        }
    };

    for (&id, &kind) in ids.iter().zip(types) {
        match kind {
            TokenType::Op | TokenType::Var | TokenType::Num => {
                let symbol = vocab.symbol(kind, id).unwrap_or(UNK_SYMBOL).to_string();
                let node = DecodedNode { symbol, children: Vec::new() };
                if kind == TokenType::Op {
                    open.push(node);
                } else {
                    attach(node, &mut open, &mut roots);
                }
            }
            TokenType::End => {
                if let Some(node) = open.pop() {
                    attach(node, &mut open, &mut roots);
                }
            }
            _ => {}
        }
    }

    while let Some(node) = open.pop() {
        attach(node, &mut open, &mut roots);
    }
    roots
}

fn infix(symbol: &str) -> Option<&'static str> {
    let op = match symbol {
        "plus" | "+" => "+",
        "minus" | "-" => "-",
        "times" | "*" => "\\times",
        "cdot" => "\\cdot",
        "eq" | "=" => "=",
        "neq" => "\\neq",
        "lt" | "<" => "<",
        "gt" | ">" => ">",
        "leq" => "\\leq",
        "geq" => "\\geq",
        "approx" => "\\approx",
        "in" => "\\in",
        "pm" => "\\pm",
        _ => return None,
    };
    Some(op)
}

fn render(node: &DecodedNode) -> String {
    let args: Vec<String> = node.children.iter().map(render).collect();
    if args.is_empty() {
        return node.symbol.clone();
    }

    match (node.symbol.as_str(), args.as_slice()) {
        ("^" | "SUP" | "superscript", [base, exp]) => format!("{{{base}}}^{{{exp}}}"),
        ("_" | "SUB" | "subscript", [base, sub]) => format!("{{{base}}}_{{{sub}}}"),
        ("divide" | "/", [num, den]) => format!("\\frac{{{num}}}{{{den}}}"),
        ("root" | "sqrt", [arg]) => format!("\\sqrt{{{arg}}}"),
        ("root" | "sqrt", [degree, arg]) => format!("\\sqrt[{degree}]{{{arg}}}"),
        ("minus" | "-", [arg]) => format!("-{arg}"),
        (symbol, _) if args.len() > 1 && infix(symbol).is_some() => {
            let op = infix(symbol).unwrap_or(symbol);
            args.join(&format!(" {op} "))
        }
        (symbol, _) => format!("{symbol}({})", args.join(", ")),
    }
}

/// Render a flat formula run as LaTeX-like text.
pub fn decode_formula(ids: &[u32], types: &[TokenType], vocab: &FormulaVocab) -> String {
    rebuild(ids, types, vocab).iter().map(render).collect::<Vec<_>>().join(" ")
}

/// Render a full token run. TEXT stretches go through the text
/// tokenizer; each formula between START_FORMULA and END_FORMULA is
/// decoded and wrapped in the same delimiters baseline mode uses.
pub fn decode_sequence(
    ids: &[u32],
    types: &[TokenType],
    text_tokenizer: &dyn TextTokenizer,
    vocab: &FormulaVocab,
) -> Result<String> {
    let mut out = String::new();
    let mut text_run: Vec<u32> = Vec::new();
    let mut formula_run: Option<(Vec<u32>, Vec<TokenType>)> = None;

    for (&id, &kind) in ids.iter().zip(types) {
        match kind {
            TokenType::Text => text_run.push(id),
            TokenType::StartFormula => {
                out.push_str(&text_tokenizer.decode(&text_run)?);
                text_run.clear();
                formula_run = Some((Vec::new(), Vec::new()));
            }
            TokenType::EndFormula => {
                if let Some((f_ids, f_types)) = formula_run.take() {
                    out.push_str(START_FORMULA_TEXT);
                    out.push_str(&decode_formula(&f_ids, &f_types, vocab));
                    out.push_str(END_FORMULA_TEXT);
                }
            }
            _ => {
                if let Some((f_ids, f_types)) = formula_run.as_mut() {
                    f_ids.push(id);
                    f_types.push(kind);
                }
            }
        }
    }

    // Generation may stop mid-formula
    if let Some((f_ids, f_types)) = formula_run {
        out.push_str(START_FORMULA_TEXT);
        out.push_str(&decode_formula(&f_ids, &f_types, vocab));
        out.push_str(END_FORMULA_TEXT);
    }
    out.push_str(&text_tokenizer.decode(&text_run)?);
    Ok(out)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::formula_tokenizer::FormulaTokenizer;
    use crate::data::test_support::{options_with_depth, WordTokenizer};
    use crate::domain::formula::OptNode;

    fn vocab() -> FormulaVocab {
        FormulaVocab::from_symbols(
            vec!["^".into(), "plus".into(), "divide".into(), "f".into()],
            vec!["r".into(), "x".into(), "y".into()],
            vec!["1".into(), "2".into()],
        )
    }

    fn decode_tree(tree: &OptNode) -> String {
        let vocab = vocab();
        let words = WordTokenizer::default();
        let opts = options_with_depth(8);
        let run = FormulaTokenizer::new(&vocab, &words, &opts).tokenize(tree).unwrap();
        decode_formula(run.token_ids(), run.token_types(), &vocab)
    }

    #[test]
    fn test_power_renders_as_superscript() {
        let tree = OptNode::op("^", vec![OptNode::var("r"), OptNode::num("2")]);
        assert_eq!(decode_tree(&tree), "{r}^{2}");
    }

    #[test]
    fn test_nested_operators() {
        let tree = OptNode::op(
            "divide",
            vec![OptNode::op("plus", vec![OptNode::var("x"), OptNode::num("1")]), OptNode::var("y")],
        );
        assert_eq!(decode_tree(&tree), "\\frac{x + 1}{y}");
    }

    #[test]
    fn test_unknown_operator_renders_as_call() {
        let tree = OptNode::op("f", vec![OptNode::var("x"), OptNode::var("y")]);
        assert_eq!(decode_tree(&tree), "f(x, y)");
    }

    #[test]
    fn test_unbalanced_runs_are_closed() {
        let vocab = vocab();
        // ^ r   (END missing, NUM never generated)
        let text = decode_formula(&[1, 1], &[TokenType::Op, TokenType::Var], &vocab);
        assert_eq!(text, "^(r)");
        // stray END is ignored
        let text = decode_formula(&[1, 0], &[TokenType::Var, TokenType::End], &vocab);
        assert_eq!(text, "r");
    }

    #[test]
    fn test_sequence_decoding_wraps_formulas() {
        let vocab = vocab();
        let words = WordTokenizer::default();
        let area = words.encode("Area").unwrap()[0];
        let ids = [area, 0, 1, 1, 2, 0, 0];
        let types = [
            TokenType::Text,
            TokenType::StartFormula,
            TokenType::Op,
            TokenType::Var,
            TokenType::Num,
            TokenType::End,
            TokenType::EndFormula,
        ];
        let text = decode_sequence(&ids, &types, &words, &vocab).unwrap();
        assert_eq!(text, "Area <m> {r}^{2} </m> ");
    }
}
