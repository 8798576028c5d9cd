use anyhow::Result;
use enigo::Key;
use std::fmt;
use std::str::FromStr;

/// Key pressed to turn to the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextKey {
    Right,
    Left,
    Up,
    Down,
    PageDown,
    PageUp,
    Space,
    Enter,
    Home,
    End,
    Tab,
    Char(char),
}

impl NextKey {
    pub fn to_enigo(self) -> Key {
        match self {
            NextKey::Right => Key::RightArrow,
            NextKey::Left => Key::LeftArrow,
            NextKey::Up => Key::UpArrow,
            NextKey::Down => Key::DownArrow,
            NextKey::PageDown => Key::PageDown,
            NextKey::PageUp => Key::PageUp,
            NextKey::Space => Key::Space,
            NextKey::Enter => Key::Return,
            NextKey::Home => Key::Home,
            NextKey::End => Key::End,
            NextKey::Tab => Key::Tab,
            NextKey::Char(c) => Key::Unicode(c),
        }
    }
}

impl FromStr for NextKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = match s.trim().to_lowercase().as_str() {
            "right" => NextKey::Right,
            "left" => NextKey::Left,
            "up" => NextKey::Up,
            "down" => NextKey::Down,
            "pagedown" | "pgdn" => NextKey::PageDown,
            "pageup" | "pgup" => NextKey::PageUp,
            "space" => NextKey::Space,
            "enter" | "return" => NextKey::Enter,
            "home" => NextKey::Home,
            "end" => NextKey::End,
            "tab" => NextKey::Tab,
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => NextKey::Char(c),
                    _ => anyhow::bail!(
                        "Unknown key '{}'. Use right, left, up, down, pagedown, pageup, space, enter, home, end, tab or a single character",
                        s
                    ),
                }
            }
        };
        Ok(key)
    }
}

impl fmt::Display for NextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NextKey::Right => "RIGHT",
            NextKey::Left => "LEFT",
            NextKey::Up => "UP",
            NextKey::Down => "DOWN",
            NextKey::PageDown => "PAGEDOWN",
            NextKey::PageUp => "PAGEUP",
            NextKey::Space => "SPACE",
            NextKey::Enter => "ENTER",
            NextKey::Home => "HOME",
            NextKey::End => "END",
            NextKey::Tab => "TAB",
            NextKey::Char(c) => return write!(f, "'{}'", c),
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_keys_and_aliases() {
        assert_eq!("right".parse::<NextKey>().unwrap(), NextKey::Right);
        assert_eq!("PageDown".parse::<NextKey>().unwrap(), NextKey::PageDown);
        assert_eq!("pgdn".parse::<NextKey>().unwrap(), NextKey::PageDown);
        assert_eq!(" return ".parse::<NextKey>().unwrap(), NextKey::Enter);
    }

    #[test]
    fn single_character_key() {
        assert_eq!("n".parse::<NextKey>().unwrap(), NextKey::Char('n'));
        assert_eq!(NextKey::Char('n').to_enigo(), Key::Unicode('n'));
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert!("nextpage".parse::<NextKey>().is_err());
        assert!("".parse::<NextKey>().is_err());
    }
}
