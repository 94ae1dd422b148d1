use std::fmt;
use std::str::FromStr;

pub const HELP: &str = "\
Commands:
  title <text>                 set the new idea's title
  description <text>           set the new idea's description
  category <text>              set the new idea's category (not stored)
  add                          submit the new idea
  edit <id> <field> <value>    change one field of an idea (id or unique id prefix)
  delete <id>                  delete an idea
  refresh                      reload the list
  help                         show this text
  quit                         leave";

/// Column of the ideas table the user can type into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdeaField {
    Title,
    Description,
    Category,
}

impl fmt::Display for IdeaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Title => "title",
            Self::Description => "description",
            Self::Category => "category",
        })
    }
}

impl FromStr for IdeaField {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, CommandError> {
        match s.to_ascii_lowercase().as_str() {
            "title" => Ok(Self::Title),
            "description" => Ok(Self::Description),
            "category" => Ok(Self::Category),
            other => Err(CommandError::UnknownField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Type into the new-idea form.
    Draft(IdeaField, String),
    Add,
    Edit {
        target: String,
        field: IdeaField,
        value: String,
    },
    Delete(String),
    Refresh,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Empty command, type `help`")]
    Empty,

    #[error("Unknown command `{0}`, type `help`")]
    Unknown(String),

    #[error("Unknown field `{0}` (title, description, category)")]
    UnknownField(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// Split off the first whitespace-delimited word.
fn word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(at) => (&s[..at], s[at..].trim_start()),
        None => (s, ""),
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, CommandError> {
        let (name, rest) = word(line.trim());
        let rest = rest.trim_end();

        match name.to_ascii_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "title" | "description" | "category" => {
                Ok(Self::Draft(name.parse()?, rest.to_string()))
            }
            "add" => Ok(Self::Add),
            "edit" => {
                let (target, rest) = word(rest);
                let (field, value) = word(rest);
                if target.is_empty() || field.is_empty() {
                    return Err(CommandError::Usage("edit <id> <field> <value>"));
                }
                Ok(Self::Edit {
                    target: target.to_string(),
                    field: field.parse()?,
                    value: value.to_string(),
                })
            }
            "delete" | "rm" => match word(rest) {
                ("", _) => Err(CommandError::Usage("delete <id>")),
                (target, _) => Ok(Self::Delete(target.to_string())),
            },
            "refresh" => Ok(Self::Refresh),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_keeps_inner_spaces() {
        assert_eq!(
            "title   Ship faster ".parse::<Command>(),
            Ok(Command::Draft(IdeaField::Title, "Ship faster".into()))
        );
    }

    #[test]
    fn draft_with_no_text_clears() {
        assert_eq!("category".parse::<Command>(), Ok(Command::Draft(IdeaField::Category, String::new())));
    }

    #[test]
    fn edit_takes_rest_as_value() {
        assert_eq!(
            "edit 8d0c2a7e description first draft".parse::<Command>(),
            Ok(Command::Edit {
                target: "8d0c2a7e".into(),
                field: IdeaField::Description,
                value: "first draft".into(),
            })
        );
    }

    #[test]
    fn edit_needs_target_and_field() {
        assert_eq!(
            "edit 8d0c2a7e".parse::<Command>(),
            Err(CommandError::Usage("edit <id> <field> <value>"))
        );
        assert_eq!(
            "edit 8d0c2a7e colour red".parse::<Command>(),
            Err(CommandError::UnknownField("colour".into()))
        );
    }

    #[test]
    fn delete_needs_target() {
        assert_eq!("delete".parse::<Command>(), Err(CommandError::Usage("delete <id>")));
        assert_eq!("rm abc".parse::<Command>(), Ok(Command::Delete("abc".into())));
    }

    #[test]
    fn unknown_and_empty() {
        assert_eq!("   ".parse::<Command>(), Err(CommandError::Empty));
        assert_eq!("launch".parse::<Command>(), Err(CommandError::Unknown("launch".into())));
        assert_eq!("QUIT".parse::<Command>(), Ok(Command::Quit));
    }
}
