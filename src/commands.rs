/// Palette commands and autocomplete

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
  Networks,
  Vms,
  Templates,
  SshKeys,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub kind: CommandKind,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "networks",
    aliases: &["n", "net", "ipam"],
    description: "IPAM networks",
    kind: CommandKind::Networks,
  },
  Command {
    name: "vms",
    aliases: &["v", "vm", "machines"],
    description: "Virtual machines",
    kind: CommandKind::Vms,
  },
  Command {
    name: "templates",
    aliases: &["t", "tpl"],
    description: "VM templates",
    kind: CommandKind::Templates,
  },
  Command {
    name: "keys",
    aliases: &["k", "ssh", "ssh-keys"],
    description: "SSH keys",
    kind: CommandKind::SshKeys,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit netcon",
    kind: CommandKind::Quit,
  },
];

/// Get autocomplete suggestions for a given input, best match first
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();

  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| rank(cmd, &input).map(|r| (cmd, r)))
    .collect();

  // Stable sort keeps declaration order within a rank
  matches.sort_by_key(|(_, rank)| *rank);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Lower is better; `None` means no match.
fn rank(cmd: &Command, input: &str) -> Option<u32> {
  if cmd.name == input {
    Some(0)
  } else if cmd.aliases.contains(&input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) || cmd.aliases.iter().any(|a| a.contains(input)) {
    Some(4)
  } else {
    None
  }
}

/// Resolve typed input to a command.
pub fn resolve(input: &str) -> Option<&'static Command> {
  get_suggestions(input).into_iter().next()
}
