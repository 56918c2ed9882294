//! Commands typed into the live dashboard

use std::str::{FromStr, SplitWhitespace};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCommand {
    /// Redraw the list
    List,
    Refresh,
    Open(String),
    Close,
    Accept {
        order: String,
        preparation_time: Option<u32>,
    },
    Reject {
        order: String,
        reason: String,
    },
    Ready(String),
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  list                      redraw orders
  refresh                   reload active orders
  open <order>              show order detail
  close                     close detail
  accept <order> [minutes]  accept, optionally with preparation time
  reject <order> <reason>   reject with a reason
  ready <order>             mark ready for pickup
  quit";

impl FromStr for WatchCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Ok(WatchCommand::List);
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "list" | "ls" => WatchCommand::List,
            "refresh" | "r" => WatchCommand::Refresh,
            "open" | "o" => WatchCommand::Open(take_order(&mut parts, verb)?),
            "close" | "c" => WatchCommand::Close,
            "ready" => WatchCommand::Ready(take_order(&mut parts, verb)?),
            "help" | "?" => WatchCommand::Help,
            "quit" | "q" | "exit" => WatchCommand::Quit,
            "accept" | "a" => {
                let order = take_order(&mut parts, verb)?;
                let preparation_time = match parts.next() {
                    Some(minutes) => Some(
                        minutes
                            .parse()
                            .map_err(|_| format!("accept: invalid minutes '{minutes}'"))?,
                    ),
                    None => None,
                };
                WatchCommand::Accept {
                    order,
                    preparation_time,
                }
            }
            "reject" => {
                let order = take_order(&mut parts, verb)?;
                let reason = parts.collect::<Vec<_>>().join(" ");
                if reason.is_empty() {
                    return Err("reject: a reason is required".into());
                }
                WatchCommand::Reject { order, reason }
            }
            other => return Err(format!("unknown command '{other}', try 'help'")),
        };
        Ok(command)
    }
}

fn take_order(parts: &mut SplitWhitespace<'_>, verb: &str) -> Result<String, String> {
    parts
        .next()
        .map(str::to_string)
        .ok_or_else(|| format!("{verb}: missing order"))
}
