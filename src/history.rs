use crate::error::{ShellError, ShellResult};

/// Every command line the shell has accepted, oldest first.
#[derive(Debug, Default, Clone)]
pub struct CommandHistory {
    lines: Vec<String>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The line numbered `number`, counting from 1.
    pub fn get(&self, number: usize) -> ShellResult<&str> {
        number
            .checked_sub(1)
            .and_then(|index| self.lines.get(index))
            .map(String::as_str)
            .ok_or(ShellError::HistoryOutOfRange {
                requested: number,
                available: self.len(),
            })
    }

    /// Parses the digits typed after `!` and looks up that line.
    pub fn recall(&self, number: &str) -> ShellResult<&str> {
        let number = parse_number(number)?;
        self.get(number)
    }

    /// The last `count` lines with their history numbers.
    pub fn tail(&self, count: usize) -> ShellResult<impl Iterator<Item = (usize, &str)> + '_> {
        if count > self.len() {
            return Err(ShellError::HistoryOutOfRange {
                requested: count,
                available: self.len(),
            });
        }
        let start = self.len() - count;
        Ok(self.lines[start..]
            .iter()
            .enumerate()
            .map(move |(i, line)| (start + i + 1, line.as_str())))
    }

    /// `N. line` rows for the last `count` lines, or every line.
    pub fn render(&self, count: Option<&str>) -> ShellResult<String> {
        let count = match count {
            Some(count) => parse_number(count)?,
            None => self.len(),
        };
        Ok(self
            .tail(count)?
            .map(|(number, line)| format!("{number}. {line}"))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

fn parse_number(arg: &str) -> ShellResult<usize> {
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ShellError::BadHistoryArg { arg: arg.into() });
    }
    arg.parse().map_err(|_| ShellError::BadHistoryArg { arg: arg.into() })
}
