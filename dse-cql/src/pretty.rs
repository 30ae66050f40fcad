use std::fmt::Display;

pub(crate) struct CqlStringLiteralDisplayer<'a>(pub(crate) &'a str);

impl Display for CqlStringLiteralDisplayer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // CQL string literals use single quotes. The only character that
        // needs escaping is singular quote, and escaping is done by repeating
        // the quote character.
        f.write_str("'")?;
        let mut first = true;
        for part in self.0.split('\'') {
            if first {
                first = false;
            } else {
                f.write_str("''")?;
            }
            f.write_str(part)?;
        }
        f.write_str("'")?;
        Ok(())
    }
}

// Displays an identifier the way it has to be written in a CQL statement:
// bare if it would survive case folding, double-quoted otherwise.
pub(crate) struct CqlIdentifierDisplayer<'a>(pub(crate) &'a str);

impl CqlIdentifierDisplayer<'_> {
    fn needs_quoting(&self) -> bool {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() => {}
            _ => return true,
        }
        !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }
}

impl Display for CqlIdentifierDisplayer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.needs_quoting() {
            return f.write_str(self.0);
        }
        f.write_str("\"")?;
        let mut first = true;
        for part in self.0.split('"') {
            if first {
                first = false;
            } else {
                f.write_str("\"\"")?;
            }
            f.write_str(part)?;
        }
        f.write_str("\"")?;
        Ok(())
    }
}
