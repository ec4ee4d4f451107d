//! Interactive command parsing.

/// One line typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A location fragment such as `#/detail/42`
    Navigate(String),
    Back,
    Forward,
    Search(String),
    Quotes { character: String, show: String },
    RandomQuote,
    Next,
    Prev,
    Retry(String),
    Show,
    CacheStats,
    CacheClear,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  #/home, #/search, #/detail/<id>, #/quotes, #/my-list, #/settings
  back | forward                 move through history
  search <query>                 search anime by title
  quotes [character=..] [show=..]  filter quotes (no filters shows all)
  random-quote                   show a random quote on the quotes page
  next | prev                    page search results or quotes
  retry <container>              re-run a failed load
  show                           print the current page
  cache stats | cache clear
  help | quit";

impl Command {
    /// Parse a command line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if line.starts_with('#') {
            return Ok(Some(Command::Navigate(line.to_string())));
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word {
            "back" => Command::Back,
            "forward" => Command::Forward,
            "search" if rest.is_empty() => return Err("Please enter a search term".to_string()),
            "search" => Command::Search(rest.to_string()),
            "quotes" => {
                let (character, show) = parse_filters(rest)?;
                Command::Quotes { character, show }
            }
            "random-quote" => Command::RandomQuote,
            "next" => Command::Next,
            "prev" => Command::Prev,
            "retry" if rest.is_empty() => return Err("Usage: retry <container>".to_string()),
            "retry" => Command::Retry(rest.to_string()),
            "show" => Command::Show,
            "cache" => match rest {
                "stats" => Command::CacheStats,
                "clear" => Command::CacheClear,
                _ => return Err("Usage: cache stats | cache clear".to_string()),
            },
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("Unknown command '{}'. Type 'help' for a list.", other)),
        };

        Ok(Some(command))
    }
}

/// Split `character=Levi Ackerman show=Attack on Titan` into its two values.
/// Values run until the next key, so they may contain spaces.
fn parse_filters(input: &str) -> Result<(String, String), String> {
    const KEYS: [&str; 2] = ["character=", "show="];

    let mut starts: Vec<(usize, &str)> = Vec::new();
    for key in KEYS {
        let mut from = 0;
        while let Some(offset) = input[from..].find(key) {
            let at = from + offset;
            if at == 0 || input[..at].ends_with(char::is_whitespace) {
                starts.push((at, key));
            }
            from = at + key.len();
        }
    }
    starts.sort_unstable();

    if starts.first().map_or(!input.is_empty(), |(at, _)| *at != 0) {
        return Err("Usage: quotes [character=<name>] [show=<title>]".to_string());
    }

    let (mut character, mut show) = (String::new(), String::new());
    for (i, (at, key)) in starts.iter().enumerate() {
        let end = starts.get(i + 1).map_or(input.len(), |(next, _)| *next);
        let value = input[at + key.len()..end].trim().to_string();
        match *key {
            "character=" => character = value,
            _ => show = value,
        }
    }

    Ok((character, show))
}
