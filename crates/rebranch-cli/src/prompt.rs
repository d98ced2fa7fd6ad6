//! Operator prompts: repository selection and yes/no confirmation.

use std::io::{self, BufRead, Write};

use rebranch_core::MigrationError;
use rebranch_remote::Repository;

/// Parse a 1-based selection from a list of `count` entries into an index.
pub fn parse_selection(input: &str, count: usize) -> Result<usize, MigrationError> {
    let input = input.trim();
    match input.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Ok(n - 1),
        _ => Err(MigrationError::InvalidSelection(input.to_string())),
    }
}

/// `Some(true)` for Y/yes, `Some(false)` for N/no, case-insensitive.
pub fn parse_yes_no(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Line-oriented prompts over any reader/writer pair.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Prompter::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Prompter { input, output }
    }

    /// Print `question` and read one line. `None` at end of input.
    pub fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        write!(self.output, "{question} ")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Ask a `[Y/N]` question until it is answered. End of input means no.
    pub fn confirm(&mut self, question: &str) -> io::Result<bool> {
        loop {
            let Some(answer) = self.ask(&format!("{question} [Y/N]"))? else {
                return Ok(false);
            };
            if let Some(yes) = parse_yes_no(&answer) {
                return Ok(yes);
            }
            writeln!(self.output, "Please answer Y or N.")?;
        }
    }

    /// Print one line of output.
    pub fn say(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.output, "{line}")
    }

    /// Show a numbered repository list and read a choice.
    ///
    /// With `confirm`, the choice is echoed back for a `[Y/N]` check and
    /// `Ok(None)` is returned when the operator declines.
    pub fn select_repository<'a>(
        &mut self,
        repositories: &'a [Repository],
        confirm: bool,
    ) -> anyhow::Result<Option<&'a Repository>> {
        if repositories.is_empty() {
            writeln!(self.output, "No repositories found.")?;
            return Ok(None);
        }
        for (i, repo) in repositories.iter().enumerate() {
            writeln!(self.output, "{:>3}. {}/{}", i + 1, repo.project.name, repo.name)?;
        }
        let answer = self
            .ask(&format!(
                "Select a repository to migrate [1-{}]:",
                repositories.len()
            ))?
            .unwrap_or_default();
        let selected = &repositories[parse_selection(&answer, repositories.len())?];

        if !confirm {
            return Ok(Some(selected));
        }
        let confirmed = self.confirm(&format!(
            "You selected {}/{}. Is that correct?",
            selected.project.name, selected.name
        ))?;
        Ok(confirmed.then_some(selected))
    }

    #[cfg(test)]
    pub(crate) fn into_output(self) -> W {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebranch_remote::fakes::MemoryDevOps;
    use std::io::Cursor;

    fn prompter(input: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn repositories() -> Vec<Repository> {
        let service = MemoryDevOps::new();
        vec![
            service.add_repository("api", "Platform", Some("master")),
            service.add_repository("web", "Platform", Some("master")),
        ]
    }

    #[test]
    fn test_parse_selection_is_one_based() {
        assert_eq!(parse_selection("1", 3).unwrap(), 0);
        assert_eq!(parse_selection(" 3\n", 3).unwrap(), 2);
    }

    #[test]
    fn test_parse_selection_rejects_out_of_range_and_garbage() {
        for bad in ["0", "4", "-1", "two", ""] {
            assert!(
                matches!(parse_selection(bad, 3), Err(MigrationError::InvalidSelection(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_yes_no() {
        assert_eq!(parse_yes_no("Y"), Some(true));
        assert_eq!(parse_yes_no("yes\n"), Some(true));
        assert_eq!(parse_yes_no("n"), Some(false));
        assert_eq!(parse_yes_no("maybe"), None);
    }

    #[test]
    fn test_confirm_reasks_until_answered() {
        let mut p = prompter("what\nY\n");
        assert!(p.confirm("Proceed?").unwrap());
        let output = String::from_utf8(p.into_output()).unwrap();
        assert!(output.contains("Please answer Y or N."));
    }

    #[test]
    fn test_confirm_at_end_of_input_is_no() {
        let mut p = prompter("");
        assert!(!p.confirm("Proceed?").unwrap());
    }

    #[test]
    fn test_select_repository_confirmed() {
        let repos = repositories();
        let mut p = prompter("2\ny\n");
        let selected = p.select_repository(&repos, true).unwrap();
        assert_eq!(selected.map(|r| r.name.as_str()), Some("web"));

        let output = String::from_utf8(p.into_output()).unwrap();
        assert!(output.contains("  1. Platform/api"));
        assert!(output.contains("Is that correct? [Y/N]"));
    }

    #[test]
    fn test_select_repository_declined() {
        let repos = repositories();
        let mut p = prompter("1\nn\n");
        assert!(p.select_repository(&repos, true).unwrap().is_none());
    }

    #[test]
    fn test_select_repository_without_confirmation() {
        let repos = repositories();
        let mut p = prompter("1\n");
        let selected = p.select_repository(&repos, false).unwrap();
        assert_eq!(selected.map(|r| r.name.as_str()), Some("api"));
    }

    #[test]
    fn test_select_repository_out_of_range() {
        let repos = repositories();
        let mut p = prompter("9\n");
        let err = p.select_repository(&repos, true).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MigrationError>(),
            Some(MigrationError::InvalidSelection(_))
        ));
    }
}
