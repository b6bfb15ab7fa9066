//! Console commands.

use claims_core::WorldId;

/// Commands that can be sent from the input thread.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Stats,
    Save,
    Reload,
    /// Every region, or those of one owner name.
    List(Option<String>),
    /// Region covering a block position.
    Info { world: WorldId, x: f64, z: f64 },
    Flags,
    Quit,
    Help,
    Unknown(String),
}

pub fn parse_command(input: &str) -> Command {
    let mut words = input.split_whitespace();
    let Some(head) = words.next() else {
        return Command::Unknown(String::new());
    };

    match head.to_lowercase().as_str() {
        "s" | "stats" => Command::Stats,
        "save" => Command::Save,
        "r" | "reload" => Command::Reload,
        "l" | "list" => Command::List(words.next().map(str::to_owned)),
        "i" | "info" => {
            let args: Vec<&str> = words.collect();
            match args.as_slice() {
                [world, x, z] => match (x.parse(), z.parse()) {
                    (Ok(x), Ok(z)) => Command::Info {
                        world: WorldId::new(world),
                        x,
                        z,
                    },
                    _ => Command::Unknown(input.trim().to_owned()),
                },
                _ => Command::Unknown(input.trim().to_owned()),
            }
        }
        "f" | "flags" => Command::Flags,
        "q" | "quit" | "exit" => Command::Quit,
        "help" | "h" | "?" => Command::Help,
        other => Command::Unknown(other.to_owned()),
    }
}
