use std::io;

/// Token-wise writer that breaks lines exceeding a column budget, used by
/// the QGraf and FORM backends. Continuation lines are indented.
///
/// `raw` bypasses the column tracking entirely; callers use it for text that
/// manages its own line breaks.
pub struct LimitedWidthWriter<W: io::Write> {
    inner: W,
    width: usize,
    indent: usize,
    col: usize,
}

impl<W: io::Write> LimitedWidthWriter<W> {
    pub fn new(inner: W, width: usize) -> LimitedWidthWriter<W> {
        LimitedWidthWriter {
            inner,
            width,
            indent: 0,
            col: 0,
        }
    }

    pub fn with_indent(inner: W, width: usize, indent: usize) -> LimitedWidthWriter<W> {
        LimitedWidthWriter {
            inner,
            width,
            indent,
            col: 0,
        }
    }

    /// Writes one token, wrapping first if it would overflow the line.
    pub fn token(&mut self, token: &str) -> io::Result<()> {
        if self.col + token.len() > self.width && self.col > self.indent {
            self.inner.write_all(b"\n")?;
            for _ in 0..self.indent {
                self.inner.write_all(b" ")?;
            }
            self.col = self.indent;
        }
        self.inner.write_all(token.as_bytes())?;
        self.col += token.len();
        Ok(())
    }

    pub fn nl(&mut self) -> io::Result<()> {
        self.inner.write_all(b"\n")?;
        self.col = 0;
        Ok(())
    }

    pub fn raw(&mut self, text: &str) -> io::Result<()> {
        self.inner.write_all(text.as_bytes())
    }
}

/// Python `repr` of a string: single quotes, backslashes and quotes escaped.
pub fn py_repr(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapped(width: usize, indent: usize, tokens: &[&str]) -> String {
        let mut buf = Vec::new();
        let mut w = LimitedWidthWriter::with_indent(&mut buf, width, indent);
        for t in tokens {
            w.token(t).unwrap();
        }
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn tokens_wrap_at_the_width() {
        assert_eq!(wrapped(10, 0, &["aaaa", ",", "bbbb", ",", "cccc"]), "aaaa,bbbb,\ncccc");
        assert_eq!(wrapped(10, 3, &["aaaa", ",", "bbbbbb", ",", "cc"]), "aaaa,\n   bbbbbb,\n   cc");
    }

    #[test]
    fn newline_resets_the_column() {
        let mut buf = Vec::new();
        let mut w = LimitedWidthWriter::new(&mut buf, 8);
        w.token("aaaa").unwrap();
        w.nl().unwrap();
        w.token("bbbb").unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "aaaa\nbbbb");
    }

    #[test]
    fn python_repr_escapes() {
        assert_eq!(py_repr("part1"), "'part1'");
        assert_eq!(py_repr("\\phi"), "'\\\\phi'");
        assert_eq!(py_repr("d'Alembert"), "'d\\'Alembert'");
    }
}
