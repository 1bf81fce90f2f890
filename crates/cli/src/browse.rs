//! Line-based browser over a session's navigation stack.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use lumen_engine::{ActionTarget, DispatchOutcome, RuntimeError, Session};
use lumen_types::ValueMap;
use tracing::debug;

use crate::render::render_page;

const HELP: &str = "\
  <n>       run the primary action of item n
  <n>.<m>   run action m of item n
  a<m>      run page action m
  !<key>    run the action bound to key (on the page)
  /text     search (or filter) items; `/` alone clears
  p[<n>]    show the preview of item n, or the page content
  b         back
  r         reload
  q         quit";

/// One line typed by the user. Numbers are zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseCommand {
    Run(ActionTarget),
    Search(String),
    Preview(Option<usize>),
    Back,
    Reload,
    Quit,
    Help,
}

pub fn parse_command(line: &str) -> Option<BrowseCommand> {
    let line = line.trim();
    if let Some(query) = line.strip_prefix('/') {
        return Some(BrowseCommand::Search(query.trim().to_string()));
    }
    if let Some(key) = line.strip_prefix('!') {
        let key = key.trim();
        return (!key.is_empty()).then(|| BrowseCommand::Run(ActionTarget::key(None, key)));
    }

    match line {
        "b" => return Some(BrowseCommand::Back),
        "r" => return Some(BrowseCommand::Reload),
        "q" => return Some(BrowseCommand::Quit),
        "?" | "h" | "help" => return Some(BrowseCommand::Help),
        "p" => return Some(BrowseCommand::Preview(None)),
        _ => {}
    }

    if let Some(item) = line.strip_prefix('p') {
        return ordinal(item).map(|item| BrowseCommand::Preview(Some(item)));
    }
    if let Some(action) = line.strip_prefix('a') {
        return ordinal(action).map(|action| BrowseCommand::Run(ActionTarget::page_action(action)));
    }
    if let Some((item, action)) = line.split_once('.') {
        return Some(BrowseCommand::Run(ActionTarget::item_action(ordinal(item)?, ordinal(action)?)));
    }
    ordinal(line).map(|item| BrowseCommand::Run(ActionTarget::primary(item)))
}

/// Parses a one-based number into a zero-based index.
fn ordinal(text: &str) -> Option<usize> {
    text.trim().parse::<usize>().ok()?.checked_sub(1)
}

/// Reads commands from stdin until the user quits or the session ends.
pub async fn run(session: &Session) -> Result<()> {
    let mut filter: Option<String> = None;
    let mut show_page = true;

    loop {
        let Some(page) = session.top_page() else {
            break;
        };
        if show_page {
            print!("{}", render_page(&page, filter.as_deref(), session.depth()));
            show_page = false;
        }

        eprint!("> ");
        io::stderr().flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            break;
        }
        let Some(command) = parse_command(&line) else {
            if !line.trim().is_empty() {
                eprintln!("unrecognized command; type ? for help");
            }
            continue;
        };
        debug!(?command, "browse command");

        let result = match command {
            BrowseCommand::Quit => {
                session.exit();
                break;
            }
            BrowseCommand::Help => {
                eprintln!("{HELP}");
                continue;
            }
            BrowseCommand::Back => Ok(session.pop()),
            BrowseCommand::Reload => session.reload(&ValueMap::new()).await,
            BrowseCommand::Run(target) => session.dispatch(&target, &ValueMap::new()).await,
            BrowseCommand::Preview(item) => {
                match session.preview(item).await {
                    Ok(Some(content)) => println!("{content}"),
                    Ok(None) => eprintln!("nothing to preview"),
                    Err(error) => report(&error),
                }
                continue;
            }
            BrowseCommand::Search(query) => match session.search(&query).await {
                Ok(DispatchOutcome::Unchanged) => {
                    filter = (!query.is_empty()).then_some(query);
                    show_page = true;
                    continue;
                }
                other => other,
            },
        };

        match result {
            Ok(DispatchOutcome::Exited) => break,
            Ok(DispatchOutcome::Unchanged) => {}
            Ok(outcome) => {
                debug!(?outcome, depth = session.depth(), "stack changed");
                filter = None;
                show_page = true;
            }
            Err(error) => report(&error),
        }
    }

    Ok(())
}

fn report(error: &RuntimeError) {
    eprintln!("error: {error}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_item_and_page_actions() {
        assert_eq!(parse_command("2"), Some(BrowseCommand::Run(ActionTarget::primary(1))));
        assert_eq!(parse_command("2.3"), Some(BrowseCommand::Run(ActionTarget::item_action(1, 2))));
        assert_eq!(parse_command(" a1 "), Some(BrowseCommand::Run(ActionTarget::page_action(0))));
        assert_eq!(parse_command("!ctrl+o"), Some(BrowseCommand::Run(ActionTarget::key(None, "ctrl+o"))));
    }

    #[test]
    fn parses_navigation_commands() {
        assert_eq!(parse_command("b"), Some(BrowseCommand::Back));
        assert_eq!(parse_command("r"), Some(BrowseCommand::Reload));
        assert_eq!(parse_command("q"), Some(BrowseCommand::Quit));
        assert_eq!(parse_command("/ rust "), Some(BrowseCommand::Search("rust".into())));
        assert_eq!(parse_command("p"), Some(BrowseCommand::Preview(None)));
        assert_eq!(parse_command("p4"), Some(BrowseCommand::Preview(Some(3))));
    }

    #[test]
    fn rejects_zero_and_garbage() {
        assert_eq!(parse_command("0"), None);
        assert_eq!(parse_command("1.0"), None);
        assert_eq!(parse_command("x"), None);
        assert_eq!(parse_command("!"), None);
    }
}
