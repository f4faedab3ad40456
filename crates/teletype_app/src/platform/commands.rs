use std::path::PathBuf;

use anyhow::{anyhow, bail};

pub(crate) const HELP: &str = "\
commands:
  open <url>          navigate to a URL
  links               list links on the current page
  follow <n>          activate link number n
  back | forward      move through history
  sound               toggle sound effects
  wav <path>          export the session audio
  transcript <path>   export the reveal transcript as JSON
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Open(String),
    Links,
    Follow(usize),
    Back,
    Forward,
    Sound,
    Wav(PathBuf),
    Transcript(PathBuf),
    Help,
    Quit,
}

/// Parses one input line. Blank lines yield `Ok(None)`.
pub(crate) fn parse(line: &str) -> anyhow::Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    let command = match (verb, arg) {
        ("open" | "o", Some(url)) => Command::Open(url.to_string()),
        ("links" | "l", None) => Command::Links,
        ("follow" | "f", Some(n)) => {
            let n: usize = n.parse().map_err(|_| anyhow!("not a link number: {n}"))?;
            if n == 0 {
                bail!("links are numbered from 1");
            }
            Command::Follow(n)
        }
        ("back" | "b", None) => Command::Back,
        ("forward", None) => Command::Forward,
        ("sound" | "s", None) => Command::Sound,
        ("wav", Some(path)) => Command::Wav(PathBuf::from(path)),
        ("transcript", Some(path)) => Command::Transcript(PathBuf::from(path)),
        ("help" | "?", None) => Command::Help,
        ("quit" | "q" | "exit", None) => Command::Quit,
        _ => bail!("unknown command: {}", line.trim()),
    };
    if words.next().is_some() {
        bail!("too many arguments: {}", line.trim());
    }
    Ok(Some(command))
}
