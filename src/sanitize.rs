/// Rewrite display glyphs into the evaluator's grammar.
///
/// `×` and `÷` become `*` and `/`, every `%` becomes `/100`, and a single `+`
/// at the start of the expression or right after `(` is dropped.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    let mut prev: Option<char> = None;

    for c in raw.chars() {
        match c {
            '×' => out.push('*'),
            '÷' => out.push('/'),
            '%' => out.push_str("/100"),
            '+' if matches!(prev, None | Some('(')) => {}
            _ => out.push(c),
        }
        prev = Some(c);
    }

    out
}
