use anyhow::{Context, Result};
use chanvid::reconcile::PartialFile;
use chanvid::{Action, ResumeDecider};
use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use tracing::warn;

/// Asks the operator what to do with each partial file.
pub struct PromptDecider<R, W> {
    input: RefCell<R>,
    output: RefCell<W>,
}

impl PromptDecider<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptDecider<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: RefCell::new(input),
            output: RefCell::new(output),
        }
    }

    fn ask(&self, partial: &PartialFile<'_>) -> io::Result<String> {
        let mut output = self.output.borrow_mut();
        write!(
            output,
            "{}: file exists (Size: {} of {} bytes). [c]ontinue, [n]ew, [s]kip? ",
            partial.path.display(),
            partial.local_size,
            partial.total_size
        )?;
        output.flush()?;

        let mut line = String::new();
        if self.input.borrow_mut().read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
        }
        Ok(line)
    }
}

impl<R: BufRead, W: Write> ResumeDecider for PromptDecider<R, W> {
    fn decide(&self, partial: &PartialFile<'_>) -> Action {
        match self.ask(partial) {
            Ok(answer) => Action::from_choice(&answer).unwrap_or_else(|| {
                warn!(answer = answer.trim(), "invalid choice, skipping");
                Action::Skip
            }),
            Err(err) => {
                warn!("could not read answer ({err}), skipping");
                Action::Skip
            }
        }
    }
}

pub fn prompt_with_default(prompt: &str, default: &str) -> Result<String> {
    print!("{} [{}]: ", prompt, default);
    io::stdout().flush().context("failed to flush stdout")?;
    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("failed to read input")?;
    let value = input.trim();
    if value.is_empty() {
        return Ok(default.to_string());
    }
    Ok(value.to_string())
}

pub fn prompt_optional(prompt: &str, current: Option<&str>) -> Result<Option<String>> {
    match current {
        Some(existing) if !existing.is_empty() => {
            print!("{} [{}] (blank to keep, '-' to clear): ", prompt, existing)
        }
        Some(_) => print!("{} (blank to keep, '-' to clear): ", prompt),
        None => print!("{} (blank to skip): ", prompt),
    }
    io::stdout().flush().context("failed to flush stdout")?;
    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("failed to read input")?;
    let value = input.trim();
    if value.is_empty() {
        return Ok(current.map(|s| s.to_string()));
    }
    if value == "-" {
        return Ok(None);
    }
    Ok(Some(value.to_string()))
}

pub fn prompt_optional_u32<F>(prompt: &str, current: Option<u32>, valid: F) -> Result<Option<u32>>
where
    F: Fn(u32) -> bool,
{
    loop {
        match current {
            Some(existing) => print!("{} [{}] (blank to keep, '-' to clear): ", prompt, existing),
            None => print!("{} (blank to skip): ", prompt),
        }
        io::stdout().flush().context("failed to flush stdout")?;
        let mut input = String::new();
        io::stdin()
            .read_line(&mut input)
            .context("failed to read input")?;
        let value = input.trim();
        if value.is_empty() {
            return Ok(current);
        }
        if value == "-" {
            return Ok(None);
        }
        match value.parse::<u32>() {
            Ok(parsed) if valid(parsed) => return Ok(Some(parsed)),
            _ => println!("Please enter a valid positive integer."),
        }
    }
}
