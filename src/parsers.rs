#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

peg::parser! {
    /// Grammar for scanning numeric tokens out of captured cell output.
    pub grammar parser() for str {
        /// matches any sequence of 1 or more digits
        rule digits() = ['0'..='9']+

        /// matches one comma-separated thousands group (",234"), but
        /// only when exactly three digits follow the comma
        rule thousands_group() = "," ['0'..='9']*<3> !['0'..='9']

        /// matches the integer part of a number, thousands separators
        /// included
        rule int_part() = digits() thousands_group()*

        /// matches a decimal fraction (".25")
        rule frac_part() = "." digits()

        /// matches a scientific-notation exponent ("e-3", "E+10")
        rule exponent() = ['e' | 'E'] ['+' | '-']? digits()

        /// matches the full text of one numeric literal
        rule number_text() -> &'input str
            = $( ['+' | '-']? (int_part() frac_part()? / frac_part()) exponent()? )

        /// parses and returns one numeric token
        rule number() -> f64
            = n:number_text() {? n.replace(',', "").parse().or(Err("f64")) }

        /// consumes an identifier-like word so its trailing digits do
        /// not read as numeric tokens ("step2", "utf8")
        rule word() = ['a'..='z' | 'A'..='Z' | '_'] ['a'..='z' | 'A'..='Z' | '0'..='9' | '_']*

        /// matches one scan step: a numeric token, a word, or any other
        /// single character
        rule token() -> Option<f64>
            = n:number() { Some(n) }
            / word() { None }
            / [_] { None }

        /// scans free text and returns every numeric token in order
        pub rule numeric_tokens() -> Vec<f64>
            = t:(token()*) { t.into_iter().flatten().collect() }
    }
}

/// Extracts every numeric token from `text`, in order of appearance.
///
/// Words with trailing digits ("step2") do not contribute tokens, while
/// thousands separators, decimals, signs, and exponents all collapse to
/// plain values ("1,234.5" reads as 1234.5).
pub fn numeric_tokens(text: &str) -> Vec<f64> {
    // The grammar consumes arbitrary text, so a parse failure is not
    // reachable; treat it as "no tokens" all the same.
    parser::numeric_tokens(text).unwrap_or_default()
}
