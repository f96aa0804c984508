//! Document assembly: markup + formatting → complete LaTeX source.
//!
//! Two input shapes are accepted:
//!
//! * **Bare body**: the common case, e.g. `E=mc^2`. It is wrapped in a
//!   `minimal` document; without any `$` it is treated as inline math.
//! * **Full document**: markup containing `\begin{document}`. Everything in
//!   front of that marker is the user's preamble and is emitted verbatim;
//!   the text up to the first following `\end{document}` is the body.
//!
//! Either way the `preview` package crops the output to the ink, and the
//! colour and size from [`Formatting`] are applied inside the preview
//! environment.

use crate::config::{Engine, Formatting};
use crate::error::TexRenderError;

const BEGIN_DOCUMENT: &str = "\\begin{document}";
const END_DOCUMENT: &str = "\\end{document}";
const MINIMAL_HEADER: &str = "\\documentclass{minimal}";
const LINE_BREAK: &str = "\\\\";

/// Split full-document markup into `(header, body)`.
///
/// Returns `Ok(None)` for bare-body markup and
/// [`TexRenderError::MissingEndDocument`] when the body is never closed.
pub fn split_document(markup: &str) -> Result<Option<(&str, &str)>, TexRenderError> {
    let Some(begin) = markup.find(BEGIN_DOCUMENT) else {
        return Ok(None);
    };
    let body_start = begin + BEGIN_DOCUMENT.len();
    let body_len = markup[body_start..]
        .find(END_DOCUMENT)
        .ok_or(TexRenderError::MissingEndDocument)?;
    Ok(Some((
        &markup[..begin],
        &markup[body_start..body_start + body_len],
    )))
}

/// Body for bare markup: `$`-wrapped if it has no `$`, newlines → `\\`.
pub fn bare_body(markup: &str) -> String {
    let body = if markup.contains('$') {
        markup.to_string()
    } else {
        format!("${markup}$")
    };
    body.replace('\n', LINE_BREAK)
}

/// Assemble the complete LaTeX source for `engine`.
pub fn assemble(
    markup: &str,
    formatting: &Formatting,
    engine: Engine,
) -> Result<String, TexRenderError> {
    let (header, body) = match split_document(markup)? {
        Some((header, body)) => (header.to_string(), body.to_string()),
        None => (MINIMAL_HEADER.to_string(), bare_body(markup)),
    };

    let mut out = header;

    if engine.supports_font_family() {
        out.push_str("\\usepackage{xltxtra}");
        out.push_str("\\defaultfontfeatures{Ligatures=TeX}");
        if let Some(family) = formatting.family() {
            out.push_str(&format!("\\setmainfont[Mapping=tex-text]{{{family}}}"));
        }
    }

    let c = formatting.font_color;
    out.push_str("\\usepackage{color}");
    out.push_str("\\usepackage[active,displaymath,textmath,tightpage]{preview}");
    out.push_str(&format!(
        "\\definecolor{{fontcolor}}{{rgb}}{{{},{},{}}}",
        format_fraction(c.red_f()),
        format_fraction(c.green_f()),
        format_fraction(c.blue_f())
    ));
    out.push_str(BEGIN_DOCUMENT);
    out.push_str("\\begin{preview}");
    out.push_str(&format!(
        "\\fontsize{{{size}}}{{{size}}}\\selectfont",
        size = formatting.font_size
    ));
    out.push_str("\\color{fontcolor}");
    out.push_str(&body);
    out.push_str("\\end{preview}");
    out.push_str(END_DOCUMENT);
    Ok(out)
}

/// `%g`-style formatting with six significant digits: `0`, `1`, `0.501961`.
pub fn format_fraction(v: f64) -> String {
    if v == 0.0 || !v.is_finite() {
        return "0".to_string();
    }
    let magnitude = v.abs().log10().floor() as i32;
    let decimals = (5 - magnitude).max(0) as usize;
    let s = format!("{v:.decimals$}");
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}
