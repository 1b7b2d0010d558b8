//! Line commands read from stdin.

use std::fmt;

use life_core::{Coord, DiffError, InputEvent, Species};

pub const HELP: &str = "\
commands:
  draw X Y            click one cell
  drag X1 Y1 X2 Y2    drag the mouse along a line of cells
  tap X Y             tap one cell with a finger
  submit              send pending edits
  hide | show         page visibility
  pan | draw-mode     toggle drawing
  species #RRGGBB     change colour
  stats               print session state
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Draw(Coord),
    Drag(Coord, Coord),
    Tap(Coord),
    Submit,
    Hide,
    Show,
    Pan,
    DrawMode,
    Species(Species),
    Stats,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    Unknown(String),
    Arguments {
        command: &'static str,
        expected: usize,
    },
    NotANumber(String),
    Species(DiffError),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command"),
            Self::Unknown(word) => write!(f, "unknown command {word:?} (try `help`)"),
            Self::Arguments { command, expected } => {
                write!(f, "`{command}` takes {expected} argument(s)")
            }
            Self::NotANumber(raw) => write!(f, "not a cell coordinate: {raw:?}"),
            Self::Species(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ParseError {}

pub fn parse(line: &str) -> Result<Command, ParseError> {
    let mut words = line.split_whitespace();
    let head = words.next().ok_or(ParseError::Empty)?;
    let args: Vec<&str> = words.collect();

    let command = match head.to_ascii_lowercase().as_str() {
        "draw" => {
            let [x, y] = numbers::<2>("draw", &args)?;
            Command::Draw(Coord::new(x, y))
        }
        "drag" => {
            let [x1, y1, x2, y2] = numbers::<4>("drag", &args)?;
            Command::Drag(Coord::new(x1, y1), Coord::new(x2, y2))
        }
        "tap" => {
            let [x, y] = numbers::<2>("tap", &args)?;
            Command::Tap(Coord::new(x, y))
        }
        "species" => match args.as_slice() {
            [raw] => Command::Species(Species::parse(raw).map_err(ParseError::Species)?),
            _ => {
                return Err(ParseError::Arguments {
                    command: "species",
                    expected: 1,
                })
            }
        },
        word => {
            let command = match word {
                "submit" => Command::Submit,
                "hide" => Command::Hide,
                "show" => Command::Show,
                "pan" => Command::Pan,
                "draw-mode" => Command::DrawMode,
                "stats" => Command::Stats,
                "help" | "?" => Command::Help,
                "quit" | "exit" => Command::Quit,
                _ => return Err(ParseError::Unknown(head.to_string())),
            };
            if !args.is_empty() {
                return Err(ParseError::Arguments {
                    command: command.name(),
                    expected: 0,
                });
            }
            command
        }
    };
    Ok(command)
}

fn numbers<const N: usize>(command: &'static str, args: &[&str]) -> Result<[u32; N], ParseError> {
    if args.len() != N {
        return Err(ParseError::Arguments {
            command,
            expected: N,
        });
    }
    let mut out = [0; N];
    for (slot, raw) in out.iter_mut().zip(args) {
        *slot = raw
            .parse()
            .map_err(|_| ParseError::NotANumber(raw.to_string()))?;
    }
    Ok(out)
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Draw(_) => "draw",
            Command::Drag(..) => "drag",
            Command::Tap(_) => "tap",
            Command::Submit => "submit",
            Command::Hide => "hide",
            Command::Show => "show",
            Command::Pan => "pan",
            Command::DrawMode => "draw-mode",
            Command::Species(_) => "species",
            Command::Stats => "stats",
            Command::Help => "help",
            Command::Quit => "quit",
        }
    }

    /// The input events a user would produce for this command. Empty for
    /// commands that are not gestures.
    pub fn input_events(&self) -> Vec<InputEvent> {
        match *self {
            Command::Draw(cell) => vec![InputEvent::PointerDown { cell }, InputEvent::PointerUp],
            Command::Drag(from, to) => {
                let cells = line(from, to);
                let mut events = Vec::with_capacity(cells.len() + 1);
                events.push(InputEvent::PointerDown { cell: from });
                events.extend(
                    cells
                        .into_iter()
                        .skip(1)
                        .map(|cell| InputEvent::PointerEnter { cell }),
                );
                events.push(InputEvent::PointerUp);
                events
            }
            Command::Tap(cell) => vec![
                InputEvent::TouchStart {
                    touches: 1,
                    target: Some(cell),
                },
                InputEvent::TouchEnd {
                    remaining: 0,
                    target: Some(cell),
                },
            ],
            _ => Vec::new(),
        }
    }
}

/// Cells crossed by a straight line, endpoints included.
pub fn line(from: Coord, to: Coord) -> Vec<Coord> {
    let dx = f64::from(to.x) - f64::from(from.x);
    let dy = f64::from(to.y) - f64::from(from.y);
    let steps = dx.abs().max(dy.abs()) as u32;
    if steps == 0 {
        return vec![from];
    }
    let mut cells: Vec<Coord> = (0..=steps)
        .map(|i| {
            let t = f64::from(i) / f64::from(steps);
            Coord::new(
                (f64::from(from.x) + dx * t).round() as u32,
                (f64::from(from.y) + dy * t).round() as u32,
            )
        })
        .collect();
    cells.dedup();
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gestures() {
        assert_eq!(parse("draw 3 4"), Ok(Command::Draw(Coord::new(3, 4))));
        assert_eq!(parse("  TAP 0 0 "), Ok(Command::Tap(Coord::new(0, 0))));
        assert_eq!(
            parse("drag 0 0 2 2"),
            Ok(Command::Drag(Coord::new(0, 0), Coord::new(2, 2)))
        );
    }

    #[test]
    fn test_parse_plain_commands() {
        assert_eq!(parse("submit"), Ok(Command::Submit));
        assert_eq!(parse("draw-mode"), Ok(Command::DrawMode));
        assert_eq!(parse("exit"), Ok(Command::Quit));
        assert_eq!(
            parse("species ABCDEF"),
            Ok(Command::Species(Species::parse("#abcdef").unwrap()))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("   "), Err(ParseError::Empty));
        assert_eq!(parse("jump"), Err(ParseError::Unknown("jump".into())));
        assert_eq!(
            parse("draw 1"),
            Err(ParseError::Arguments {
                command: "draw",
                expected: 2
            })
        );
        assert_eq!(parse("tap 1 -2"), Err(ParseError::NotANumber("-2".into())));
        assert_eq!(
            parse("submit now"),
            Err(ParseError::Arguments {
                command: "submit",
                expected: 0
            })
        );
        assert!(matches!(parse("species red"), Err(ParseError::Species(_))));
    }

    #[test]
    fn test_line() {
        assert_eq!(line(Coord::new(2, 2), Coord::new(2, 2)), vec![Coord::new(2, 2)]);
        assert_eq!(
            line(Coord::new(0, 0), Coord::new(0, 3)),
            (0..=3).map(|y| Coord::new(0, y)).collect::<Vec<_>>()
        );
        let diagonal = line(Coord::new(3, 3), Coord::new(0, 0));
        assert_eq!(diagonal.first(), Some(&Coord::new(3, 3)));
        assert_eq!(diagonal.last(), Some(&Coord::new(0, 0)));
        assert_eq!(diagonal.len(), 4);
    }

    #[test]
    fn test_drag_events() {
        let events = Command::Drag(Coord::new(1, 0), Coord::new(1, 2)).input_events();
        assert_eq!(
            events,
            vec![
                InputEvent::PointerDown { cell: Coord::new(1, 0) },
                InputEvent::PointerEnter { cell: Coord::new(1, 1) },
                InputEvent::PointerEnter { cell: Coord::new(1, 2) },
                InputEvent::PointerUp,
            ]
        );
        assert!(Command::Stats.input_events().is_empty());
    }
}
