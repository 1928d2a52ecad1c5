use std::sync::Arc;

use miette::SourceSpan;
use winnow::combinator::{alt, cut_err, delimited, eof, not, repeat, terminated};
use winnow::{
    error::{AddContext, FromRecoverableError, ModalResult, ParserError},
    prelude::*,
    stream::{Location, Recoverable, Stream},
    token::{any, take_while},
    LocatingSlice,
};

use crate::error::{MalformedSpan, SyntaxError};

// `ParserError` still names the kind in its required methods.
#[allow(deprecated)]
use winnow::error::ErrorKind;

type Input<'a> = Recoverable<LocatingSlice<&'a str>, LineParserError>;
type ParserResult<T> = ModalResult<T, LineParserError>;

/// Error threaded through the line grammar. Only `cut_err` sections carry text.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct LineParserError {
    message: Option<String>,
    span: Option<SourceSpan>,
    expected: Option<String>,
    help: Option<String>,
}

/// What a grammar section expects, attached with `.context(..)`.
#[derive(Debug, Clone, Copy)]
struct Expectation {
    message: &'static str,
    expected: &'static str,
    help: &'static str,
}

#[allow(deprecated)]
impl<I: Stream> ParserError<I> for LineParserError {
    fn from_input(_input: &I) -> Self {
        Self::default()
    }

    fn from_error_kind(input: &I, _kind: ErrorKind) -> Self {
        Self::from_input(input)
    }

    fn append(
        self,
        _input: &I,
        _token_start: &<I as Stream>::Checkpoint,
        _kind: ErrorKind,
    ) -> Self {
        self
    }
}

impl<I: Stream> AddContext<I, Expectation> for LineParserError {
    fn add_context(
        mut self,
        _input: &I,
        _token_start: &<I as Stream>::Checkpoint,
        ctx: Expectation,
    ) -> Self {
        self.message.get_or_insert_with(|| ctx.message.to_string());
        self.expected.get_or_insert_with(|| ctx.expected.to_string());
        self.help.get_or_insert_with(|| ctx.help.to_string());
        self
    }
}

impl<I: Stream + Location> FromRecoverableError<I, Self> for LineParserError {
    #[inline]
    fn from_recoverable_error(
        token_start: &<I as Stream>::Checkpoint,
        _err_start: &<I as Stream>::Checkpoint,
        input: &I,
        mut e: Self,
    ) -> Self {
        e.span = e
            .span
            .or_else(|| Some(span_from_checkpoint(input, token_start)));
        e
    }
}

fn span_from_checkpoint<I: Stream + Location>(
    input: &I,
    start: &<I as Stream>::Checkpoint,
) -> SourceSpan {
    let offset = input.offset_from(start);
    ((input.location() - offset)..input.location()).into()
}

pub fn try_parse<'a, P, T>(mut parser: P, input: &'a str) -> Result<T, SyntaxError>
where
    P: Parser<Input<'a>, T, LineParserError>,
{
    let (_, maybe_val, errs) = parser.recoverable_parse(LocatingSlice::new(input));
    if let (Some(v), true) = (maybe_val, errs.is_empty()) {
        Ok(v)
    } else {
        Err(failure_from_errs(errs, input))
    }
}

/// Turns collected grammar errors into one report over the whole line.
pub fn failure_from_errs(errs: Vec<LineParserError>, input: &str) -> SyntaxError {
    let line = Arc::new(input.to_string());
    let problems = errs
        .into_iter()
        .map(|err| {
            let span = err.span.unwrap_or_else(|| (0..input.len()).into());
            let expected = err.expected.as_deref().unwrap_or("a word");
            MalformedSpan {
                line: Arc::clone(&line),
                message: err.message.unwrap_or_else(|| format!("Expected {expected}")),
                found: describe_span(input, span, expected),
                span,
                help: err.help,
            }
        })
        .collect();

    SyntaxError { line, problems }
}

/// Label for a malformed span, naming what was found there.
fn describe_span(input: &str, span: SourceSpan, expected: &str) -> String {
    let found = input
        .get(span.offset()..span.offset() + span.len())
        .map(str::trim)
        .unwrap_or_default();
    if found.is_empty() {
        format!("{expected} is missing")
    } else if found.starts_with('"') {
        format!("unterminated {expected}")
    } else {
        format!("{found:?} is not {expected}")
    }
}

/// Splits one line of shell input into words.
///
/// Words are separated by whitespace. A line whose first word is `echo`
/// keeps everything between the first and the last double quote together as
/// one word, quotes removed.
pub struct WinnowLineParser<'a> {
    input: &'a str,
}

impl<'a> WinnowLineParser<'a> {
    pub fn new(input: &'a str) -> Self {
        WinnowLineParser { input }
    }

    /// Words of the line, or a diagnostic pointing at the malformed part.
    pub fn tokens(&self) -> Result<Vec<String>, SyntaxError> {
        try_parse(Self::parse_line, self.input)
    }

    /// # Grammar
    ///
    /// ```md
    /// line := wss (echo_line | word_line) wss eof;
    /// ```
    fn parse_line(input: &mut Input<'_>) -> ParserResult<Vec<String>> {
        delimited(
            Self::wss,
            alt((Self::parse_echo_line, Self::parse_word_line)),
            (Self::wss, eof),
        )
        .parse_next(input)
    }

    /// # Grammar
    ///
    /// ```md
    /// word_line := (word wss)*;
    /// ```
    fn parse_word_line(input: &mut Input<'_>) -> ParserResult<Vec<String>> {
        repeat(0.., terminated(Self::parse_word, Self::wss)).parse_next(input)
    }

    /// Parse an echo line. Once `echo ` is seen the quoted text is mandatory.
    ///
    /// # Grammar
    ///
    /// ```md
    /// echo_line := "echo" wsp (unquoted_word wss)* quoted_text wss (word wss)*;
    /// ```
    fn parse_echo_line(input: &mut Input<'_>) -> ParserResult<Vec<String>> {
        ("echo", Self::wsp).parse_next(input)?;

        cut_err((
            repeat(0.., terminated(Self::parse_unquoted_word, Self::wss)),
            Self::parse_quoted_text,
            Self::wss,
            repeat(0.., terminated(Self::parse_word, Self::wss)),
        ))
        .map(
            |(before, text, _, after): (Vec<String>, &str, (), Vec<String>)| {
                let mut words = vec!["echo".to_string()];
                words.extend(before);
                words.push(text.to_string());
                words.extend(after);
                words
            },
        )
        .context(Expectation {
            message: "Expected text between double quotes for echo",
            expected: "quoted text",
            help: "write the text as echo \"TEXT\"",
        })
        .parse_next(input)
    }

    /// # Grammar
    ///
    /// ```md
    /// quoted_text := "\"" (^closing_quote any)* "\"";
    /// closing_quote := "\"" ^"\""* eof;
    /// ```
    fn parse_quoted_text<'i>(input: &mut Input<'i>) -> ParserResult<&'i str> {
        delimited(
            "\"",
            repeat(0.., (not(Self::closing_quote), any))
                .map(|_: ()| ())
                .take(),
            "\"",
        )
        .parse_next(input)
    }

    fn closing_quote(input: &mut Input<'_>) -> ParserResult<()> {
        ("\"", take_while(0.., |c: char| c != '"'), eof)
            .void()
            .parse_next(input)
    }

    fn parse_word(input: &mut Input<'_>) -> ParserResult<String> {
        take_while(1.., |c: char| !c.is_whitespace())
            .map(String::from)
            .parse_next(input)
    }

    fn parse_unquoted_word(input: &mut Input<'_>) -> ParserResult<String> {
        take_while(1.., |c: char| !c.is_whitespace() && c != '"')
            .map(String::from)
            .parse_next(input)
    }

    /// Parse zero or more whitespace characters from the input
    fn wss(input: &mut Input<'_>) -> ParserResult<()> {
        take_while(0.., char::is_whitespace)
            .void()
            .parse_next(input)
    }

    /// Parse one or more whitespace characters from the input
    fn wsp(input: &mut Input<'_>) -> ParserResult<()> {
        take_while(1.., char::is_whitespace)
            .void()
            .parse_next(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plain_lines() {
        // Arrange
        let inputs = [
            "ls",
            "   mkdir a b   c  ",
            "cd ../x\n",
            "cat\tf1 f2",
            "",
            "    ",
            "grep \"a.*\" f",
        ];
        let outputs = [
            words(&["ls"]),
            words(&["mkdir", "a", "b", "c"]),
            words(&["cd", "../x"]),
            words(&["cat", "f1", "f2"]),
            words(&[]),
            words(&[]),
            words(&["grep", "\"a.*\"", "f"]),
        ];

        for (input, output) in inputs.iter().zip(outputs.iter()) {
            // Act
            let result = WinnowLineParser::new(input).tokens();

            // Assert
            assert_eq!(result.unwrap(), *output, "{input:?}");
        }
    }

    #[test]
    fn test_echo_lines() {
        // Arrange
        let inputs = [
            "echo \"hello world\"",
            "  echo   \"spaced   out\"  > f",
            "echo \"say \"hi\" twice\" >> log",
            "echo \"\"",
            "echo x\"text\"",
            "echoes \"not echo\"",
        ];
        let outputs = [
            words(&["echo", "hello world"]),
            words(&["echo", "spaced   out", ">", "f"]),
            words(&["echo", "say \"hi\" twice", ">>", "log"]),
            words(&["echo", ""]),
            words(&["echo", "x", "text"]),
            words(&["echoes", "\"not", "echo\""]),
        ];

        for (input, output) in inputs.iter().zip(outputs.iter()) {
            // Act
            let result = WinnowLineParser::new(input).tokens();

            // Assert
            assert_eq!(result.unwrap(), *output, "{input:?}");
        }
    }

    #[test]
    fn test_echo_without_quotes_fails() {
        let inputs = ["echo hello", "echo \"unterminated", "echo \""];

        for input in inputs {
            let result = WinnowLineParser::new(input).tokens();

            let err = result.unwrap_err();
            assert_eq!(err.line.as_str(), input);
            assert!(!err.problems.is_empty());
            assert_eq!(
                err.problems[0].message,
                "Expected text between double quotes for echo"
            );
        }
    }

    #[test]
    fn test_malformed_span_labels() {
        // Arrange
        let line = "echo hello \"open";
        let inputs = [(5..10), (11..16), (4..5)];
        let outputs = [
            "\"hello\" is not quoted text",
            "unterminated quoted text",
            "quoted text is missing",
        ];

        for (input, output) in inputs.into_iter().zip(outputs.iter()) {
            // Act
            let label = describe_span(line, input.into(), "quoted text");

            // Assert
            assert_eq!(label, *output);
        }
    }

    #[test]
    fn test_bare_echo_is_a_plain_word() {
        let result = WinnowLineParser::new("echo").tokens();

        assert_eq!(result.unwrap(), words(&["echo"]));
    }
}
